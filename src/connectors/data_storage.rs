// Copyright © 2024 Pathway

use std::io;
use std::sync::Arc;

use bincode::ErrorKind as BincodeError;

use crate::engine::error::{DataError, DynError};
use crate::engine::{Record, RecordMetadata};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Bincode(#[from] BincodeError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Other(DynError),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WriteError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Bincode(#[from] BincodeError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("the receiving end of the port is gone")]
    Disconnected,

    #[error(transparent)]
    Other(DynError),
}

/// The input port of an engine.
pub trait RecordReader: Send {
    fn metadata(&self) -> &Arc<RecordMetadata>;

    /// Overwrites `record` with the next record of the stream. Blocks until
    /// one is available and returns `false` once the stream has ended.
    fn read(&mut self, record: &mut Record) -> Result<bool, ReadError>;
}

/// The output port of an engine.
pub trait RecordWriter: Send {
    fn metadata(&self) -> &Arc<RecordMetadata>;

    fn write(&mut self, record: &Record) -> Result<(), WriteError>;

    fn flush(&mut self) -> Result<(), WriteError> {
        Ok(())
    }
}

impl<R: RecordReader + ?Sized> RecordReader for Box<R> {
    fn metadata(&self) -> &Arc<RecordMetadata> {
        (**self).metadata()
    }

    fn read(&mut self, record: &mut Record) -> Result<bool, ReadError> {
        (**self).read(record)
    }
}

impl<W: RecordWriter + ?Sized> RecordWriter for Box<W> {
    fn metadata(&self) -> &Arc<RecordMetadata> {
        (**self).metadata()
    }

    fn write(&mut self, record: &Record) -> Result<(), WriteError> {
        (**self).write(record)
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        (**self).flush()
    }
}

/// Sends every record to all of its outputs, in order.
pub struct BroadcastWriter<'a> {
    metadata: Arc<RecordMetadata>,
    outputs: Vec<&'a mut dyn RecordWriter>,
}

impl<'a> BroadcastWriter<'a> {
    pub fn new(metadata: Arc<RecordMetadata>, outputs: Vec<&'a mut dyn RecordWriter>) -> Self {
        Self { metadata, outputs }
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }
}

impl RecordWriter for BroadcastWriter<'_> {
    fn metadata(&self) -> &Arc<RecordMetadata> {
        &self.metadata
    }

    fn write(&mut self, record: &Record) -> Result<(), WriteError> {
        for output in &mut self.outputs {
            output.write(record)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        for output in &mut self.outputs {
            output.flush()?;
        }
        Ok(())
    }
}
