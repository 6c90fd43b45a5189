// Copyright © 2024 Pathway

use std::error;
use std::io::Error as IoError;
use std::result;

use bincode::ErrorKind as BincodeError;

use super::config::Error as ConfigError;
use super::Value;
use crate::connectors::{ReadError, WriteError};

#[allow(clippy::module_name_repetitions)]
pub type DynError = Box<dyn error::Error + Send + Sync>;
pub type DynResult<T> = result::Result<T, DynError>;

pub type Result<T, E = Error> = result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DataError {
    #[error("type mismatch: expected {expected}, got {value:?}")]
    TypeMismatch {
        expected: &'static str,
        value: Value,
    },

    #[error("field {position} is out of bounds for record {record:?} with {len} fields")]
    FieldOutOfBounds {
        record: String,
        position: usize,
        len: usize,
    },

    #[error("record {record:?} has no field named {field:?}")]
    UnknownField { record: String, field: String },

    #[error("serialized record has {actual} fields, record {record:?} expects {expected}")]
    FieldCountMismatch {
        record: String,
        expected: usize,
        actual: usize,
    },

    #[error("null value for non-nullable field {field:?}")]
    NullNotAllowed { field: String },
}

/// How bad a failure is for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The operation failed and was aborted; the caller may re-run it.
    Error,
    /// A precondition was violated (e.g. unsorted input); re-running won't help.
    Fatal,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Bincode(#[from] BincodeError),

    #[error("failed to read input: {0}")]
    Read(#[from] ReadError),

    #[error("failed to write output: {0}")]
    Write(#[from] WriteError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("transformation for key {key} finished with code {code}: {message}")]
    TransformFailed {
        key: String,
        code: i32,
        message: String,
    },

    #[error("transformation failed: {0}")]
    Transform(#[source] DynError),

    #[error("transformation selected output {0}, which does not exist")]
    NoSuchOutput(i32),

    #[error("can't store record into the sort buffer even after it was flushed")]
    SortBufferRejected,

    #[error("input {input} is not sorted: record out of order")]
    OutOfOrder { input: usize },

    #[error("tape {0} has no data chunk open for writing")]
    NoOpenChunk(usize),

    #[error("tape carousel is not open")]
    CarouselClosed,
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Config(_)
            | Self::Io(_)
            | Self::Bincode(_)
            | Self::Read(_)
            | Self::Write(_)
            | Self::TransformFailed { .. } => Severity::Error,
            Self::Data(_)
            | Self::Transform(_)
            | Self::NoSuchOutput(_)
            | Self::SortBufferRejected
            | Self::OutOfOrder { .. }
            | Self::NoOpenChunk(_)
            | Self::CarouselClosed => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<Box<BincodeError>> for Error {
    fn from(error: Box<BincodeError>) -> Self {
        match *error {
            BincodeError::Io(io_error) => Self::Io(io_error),
            other => Self::Bincode(other),
        }
    }
}
