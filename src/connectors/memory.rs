// Copyright © 2024 Pathway

use std::sync::Arc;

use super::data_storage::{ReadError, RecordReader, RecordWriter, WriteError};
use crate::engine::error::Result;
use crate::engine::{Record, RecordMetadata, Value};

/// Replays a fixed list of records.
#[derive(Debug, Clone)]
pub struct VecReader {
    metadata: Arc<RecordMetadata>,
    records: Vec<Record>,
    position: usize,
}

impl VecReader {
    pub fn new(metadata: Arc<RecordMetadata>, records: Vec<Record>) -> Self {
        Self {
            metadata,
            records,
            position: 0,
        }
    }

    pub fn from_rows(
        metadata: Arc<RecordMetadata>,
        rows: impl IntoIterator<Item = Vec<Value>>,
    ) -> Result<Self> {
        let records = rows
            .into_iter()
            .map(|row| Record::from_values(metadata.clone(), row))
            .collect::<Result<_>>()?;
        Ok(Self::new(metadata, records))
    }

    pub fn remaining(&self) -> usize {
        self.records.len() - self.position
    }
}

impl RecordReader for VecReader {
    fn metadata(&self) -> &Arc<RecordMetadata> {
        &self.metadata
    }

    fn read(&mut self, record: &mut Record) -> Result<bool, ReadError> {
        let Some(next) = self.records.get(self.position) else {
            return Ok(false);
        };
        record.copy_from(next);
        self.position += 1;
        Ok(true)
    }
}

/// Collects everything written to it.
#[derive(Debug, Clone)]
pub struct VecWriter {
    metadata: Arc<RecordMetadata>,
    records: Vec<Record>,
    flushes: usize,
}

impl VecWriter {
    pub fn new(metadata: Arc<RecordMetadata>) -> Self {
        Self {
            metadata,
            records: Vec::new(),
            flushes: 0,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl RecordWriter for VecWriter {
    fn metadata(&self) -> &Arc<RecordMetadata> {
        &self.metadata
    }

    fn write(&mut self, record: &Record) -> Result<(), WriteError> {
        self.records.push(record.duplicate());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        self.flushes += 1;
        Ok(())
    }
}
