// Copyright © 2024 Pathway

pub mod error;
pub use self::error::{DataError, DynError, DynResult, Error, Result, Severity};

pub mod value;
pub use self::value::{Type, Value};

pub mod record;
pub use self::record::{FieldMetadata, Record, RecordMetadata};

pub mod key;
pub use self::key::{Collation, KeyFieldSpec, RecordKey, SortOrder};

pub mod config;
pub use self::config::{
    parse_key_list, ErrorAction, ErrorActions, JoinConfig, JoinType, SortConfig,
};

pub mod control;
pub use self::control::{Outcome, RunningFlag};

pub mod transform;
pub use self::transform::{RecordTransform, ALL};

pub mod sort;
pub use sort::{ExternalSorter, SortStats};

pub mod join;
pub use join::{JoinStats, MergeJoin};
