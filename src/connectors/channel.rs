// Copyright © 2024 Pathway

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, RecvError, Sender};

use super::data_storage::{ReadError, RecordReader, RecordWriter, WriteError};
use crate::engine::{Record, RecordMetadata};

/// Creates a connected port pair holding at most `capacity` records in flight.
///
/// The stream ends for the reader once every [`ChannelWriter`] is dropped.
pub fn channel(metadata: Arc<RecordMetadata>, capacity: usize) -> (ChannelWriter, ChannelReader) {
    let (sender, receiver) = bounded(capacity);
    (
        ChannelWriter {
            metadata: metadata.clone(),
            sender,
        },
        ChannelReader { metadata, receiver },
    )
}

#[derive(Debug, Clone)]
pub struct ChannelWriter {
    metadata: Arc<RecordMetadata>,
    sender: Sender<Record>,
}

impl RecordWriter for ChannelWriter {
    fn metadata(&self) -> &Arc<RecordMetadata> {
        &self.metadata
    }

    fn write(&mut self, record: &Record) -> Result<(), WriteError> {
        self.sender
            .send(record.duplicate())
            .map_err(|_| WriteError::Disconnected)
    }
}

#[derive(Debug)]
pub struct ChannelReader {
    metadata: Arc<RecordMetadata>,
    receiver: Receiver<Record>,
}

impl RecordReader for ChannelReader {
    fn metadata(&self) -> &Arc<RecordMetadata> {
        &self.metadata
    }

    fn read(&mut self, record: &mut Record) -> Result<bool, ReadError> {
        match self.receiver.recv() {
            Ok(next) => {
                *record = next;
                Ok(true)
            }
            Err(RecvError) => Ok(false),
        }
    }
}
