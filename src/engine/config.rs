// Copyright © 2024 Pathway

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use log::warn;

use super::key::{KeyFieldSpec, RecordKey, SortOrder};
use super::record::RecordMetadata;
use super::value::Type;
use crate::env::{parse_env_paths, parse_env_var, Error as EnvError};

pub const DEFAULT_NUMBER_OF_TAPES: usize = 6;
pub const DEFAULT_IN_MEMORY_CAPACITY: usize = 8000;
pub const DEFAULT_RUN_BUFFER_MEMORY: usize = 64 * 1024;

const SORT_BUFFER_CAPACITY_ENV: &str = "TAPEJOIN_SORT_BUFFER_CAPACITY";
const TMP_DIRS_ENV: &str = "TAPEJOIN_TMP_DIRS";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid key field {0:?}")]
    InvalidKey(String),

    #[error("empty key for record {0:?}")]
    EmptyKey(String),

    #[error("record {record:?} has no key field {field:?}")]
    UnknownKeyField { record: String, field: String },

    #[error("key of record {record:?} has {actual} fields, expected {expected}")]
    KeyLengthMismatch {
        record: String,
        expected: usize,
        actual: usize,
    },

    #[error("key field {field:?} has type {actual}, expected {expected}")]
    KeyTypeMismatch {
        field: String,
        expected: Type,
        actual: Type,
    },

    #[error("key field {field:?} is sorted {actual:?}, expected {expected:?}")]
    KeyOrderMismatch {
        field: String,
        expected: SortOrder,
        actual: SortOrder,
    },

    #[error("number of tapes must be even and greater than 2, got {0}")]
    BadTapeCount(usize),

    #[error("in-memory capacity must be positive")]
    ZeroCapacity,

    #[error("at least one temporary directory is required")]
    NoTempDirectories,

    #[error("unknown join type {0:?}")]
    BadJoinType(String),

    #[error("invalid error action {0:?}")]
    BadErrorAction(String),

    #[error("join needs at least one input")]
    NoInputs,

    #[error(transparent)]
    Env(#[from] EnvError),
}

fn default_temp_directories() -> Vec<PathBuf> {
    parse_env_paths(TMP_DIRS_ENV).unwrap_or_else(|| vec![std::env::temp_dir()])
}

/// Parses a key list, optionally overriding directions with a legacy order
/// list like `"a;d"`. Fields beyond the end of the order list take its last
/// entry.
pub fn parse_key_list(fields: &str, legacy_orders: Option<&str>) -> Result<Vec<KeyFieldSpec>, Error> {
    let mut specs = KeyFieldSpec::parse_list(fields)?;
    let orders: Vec<SortOrder> = legacy_orders
        .into_iter()
        .flat_map(|orders| orders.split(';'))
        .map(str::trim)
        .filter(|flag| !flag.is_empty())
        .map(SortOrder::from_flag)
        .collect();
    if let Some(last) = orders.last() {
        for (i, spec) in specs.iter_mut().enumerate() {
            spec.order = orders.get(i).copied().unwrap_or(*last);
        }
    }
    Ok(specs)
}

#[derive(Debug, Clone)]
pub struct SortConfig {
    sort_key: Vec<KeyFieldSpec>,
    number_of_tapes: usize,
    in_memory_capacity: usize,
    temp_directories: Vec<PathBuf>,
    sync_tapes: bool,
}

impl SortConfig {
    pub fn new(sort_key: Vec<KeyFieldSpec>) -> Result<Self, Error> {
        let in_memory_capacity =
            parse_env_var(SORT_BUFFER_CAPACITY_ENV)?.unwrap_or(DEFAULT_IN_MEMORY_CAPACITY);
        Ok(Self {
            sort_key,
            number_of_tapes: DEFAULT_NUMBER_OF_TAPES,
            in_memory_capacity,
            temp_directories: default_temp_directories(),
            sync_tapes: false,
        })
    }

    pub fn from_key_string(key: &str, legacy_orders: Option<&str>) -> Result<Self, Error> {
        Self::new(parse_key_list(key, legacy_orders)?)
    }

    #[must_use]
    pub fn with_number_of_tapes(mut self, number_of_tapes: usize) -> Self {
        self.number_of_tapes = number_of_tapes;
        self
    }

    #[must_use]
    pub fn with_in_memory_capacity(mut self, in_memory_capacity: usize) -> Self {
        self.in_memory_capacity = in_memory_capacity;
        self
    }

    #[must_use]
    pub fn with_temp_directories(mut self, temp_directories: Vec<PathBuf>) -> Self {
        self.temp_directories = temp_directories;
        self
    }

    #[must_use]
    pub fn with_sync_tapes(mut self, sync_tapes: bool) -> Self {
        self.sync_tapes = sync_tapes;
        self
    }

    pub fn sort_key(&self) -> &[KeyFieldSpec] {
        &self.sort_key
    }

    pub fn number_of_tapes(&self) -> usize {
        self.number_of_tapes
    }

    pub fn in_memory_capacity(&self) -> usize {
        self.in_memory_capacity
    }

    pub fn temp_directories(&self) -> &[PathBuf] {
        &self.temp_directories
    }

    pub fn sync_tapes(&self) -> bool {
        self.sync_tapes
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.sort_key.is_empty() {
            return Err(Error::EmptyKey(String::new()));
        }
        if self.number_of_tapes <= 2 || self.number_of_tapes % 2 != 0 {
            return Err(Error::BadTapeCount(self.number_of_tapes));
        }
        if self.in_memory_capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        if self.temp_directories.is_empty() {
            return Err(Error::NoTempDirectories);
        }
        Ok(())
    }

    pub(crate) fn build_key(&self, metadata: Arc<RecordMetadata>) -> Result<RecordKey, Error> {
        self.validate()?;
        RecordKey::new(metadata, &self.sort_key)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    #[default]
    Inner,
    LeftOuter,
    FullOuter,
}

impl FromStr for JoinType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Ok(Self::Inner),
            "leftouter" => Ok(Self::LeftOuter),
            "fullouter" => Ok(Self::FullOuter),
            _ => Err(Error::BadJoinType(s.to_string())),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    #[default]
    Stop,
    Continue,
}

impl FromStr for ErrorAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STOP" => Ok(Self::Stop),
            "CONTINUE" => Ok(Self::Continue),
            _ => Err(Error::BadErrorAction(s.to_string())),
        }
    }
}

/// Maps negative transform results to what the join does about them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorActions {
    actions: HashMap<i32, ErrorAction>,
    fallback: ErrorAction,
}

impl ErrorActions {
    pub fn new(fallback: ErrorAction) -> Self {
        Self {
            actions: HashMap::new(),
            fallback,
        }
    }

    #[must_use]
    pub fn with_action(mut self, code: i32, action: ErrorAction) -> Self {
        self.actions.insert(code, action);
        self
    }

    pub fn action(&self, code: i32) -> ErrorAction {
        self.actions.get(&code).copied().unwrap_or(self.fallback)
    }
}

impl FromStr for ErrorActions {
    type Err = Error;

    /// Parses `"-1=CONTINUE;MIN_INT=STOP"`. `MIN_INT` sets the action for
    /// every code not listed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut result = Self::default();
        for item in s.split(';').map(str::trim).filter(|item| !item.is_empty()) {
            let (code, action) = item
                .split_once('=')
                .ok_or_else(|| Error::BadErrorAction(item.to_string()))?;
            let action: ErrorAction = action.parse()?;
            match code.trim() {
                "MIN_INT" => result.fallback = action,
                code => {
                    let code: i32 = code
                        .parse()
                        .map_err(|_| Error::BadErrorAction(item.to_string()))?;
                    result.actions.insert(code, action);
                }
            }
        }
        Ok(result)
    }
}

#[derive(Debug, Clone)]
pub struct JoinConfig {
    join_keys: Vec<Vec<KeyFieldSpec>>,
    join_type: JoinType,
    allow_slave_duplicates: bool,
    error_actions: ErrorActions,
    error_log: Option<PathBuf>,
    run_buffer_memory: usize,
    temp_directories: Vec<PathBuf>,
}

impl JoinConfig {
    /// `join_keys[0]` is the driver's key; slaves without their own list use it too.
    pub fn new(join_keys: Vec<Vec<KeyFieldSpec>>) -> Self {
        Self {
            join_keys,
            join_type: JoinType::default(),
            allow_slave_duplicates: true,
            error_actions: ErrorActions::default(),
            error_log: None,
            run_buffer_memory: DEFAULT_RUN_BUFFER_MEMORY,
            temp_directories: default_temp_directories(),
        }
    }

    /// Builds the configuration from `#`-separated per-input key lists,
    /// e.g. `"id;name#cust_id;cust_name"`.
    pub fn from_key_string(keys: &str) -> Result<Self, Error> {
        let join_keys = keys
            .split('#')
            .map(|list| parse_key_list(list, None))
            .collect::<Result<_, _>>()?;
        Ok(Self::new(join_keys))
    }

    #[must_use]
    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    #[must_use]
    pub fn with_slave_duplicates(mut self, allow_slave_duplicates: bool) -> Self {
        self.allow_slave_duplicates = allow_slave_duplicates;
        self
    }

    #[must_use]
    pub fn with_error_actions(mut self, error_actions: ErrorActions) -> Self {
        self.error_actions = error_actions;
        self
    }

    #[must_use]
    pub fn with_error_log(mut self, error_log: impl Into<PathBuf>) -> Self {
        self.error_log = Some(error_log.into());
        self
    }

    #[must_use]
    pub fn with_run_buffer_memory(mut self, run_buffer_memory: usize) -> Self {
        self.run_buffer_memory = run_buffer_memory;
        self
    }

    #[must_use]
    pub fn with_temp_directories(mut self, temp_directories: Vec<PathBuf>) -> Self {
        self.temp_directories = temp_directories;
        self
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn allow_slave_duplicates(&self) -> bool {
        self.allow_slave_duplicates
    }

    pub fn error_actions(&self) -> &ErrorActions {
        &self.error_actions
    }

    pub fn error_log(&self) -> Option<&PathBuf> {
        self.error_log.as_ref()
    }

    pub fn run_buffer_memory(&self) -> usize {
        self.run_buffer_memory
    }

    pub fn temp_directories(&self) -> &[PathBuf] {
        &self.temp_directories
    }

    pub fn validate(&self) -> Result<(), Error> {
        let Some(driver_key) = self.join_keys.first() else {
            return Err(Error::EmptyKey(String::new()));
        };
        if driver_key.is_empty() {
            return Err(Error::EmptyKey(String::new()));
        }
        if self.temp_directories.is_empty() {
            return Err(Error::NoTempDirectories);
        }
        Ok(())
    }

    /// Binds the key lists to the input schemas and checks that every slave
    /// key can be compared with the driver's.
    pub(crate) fn build_keys(&self, inputs: &[Arc<RecordMetadata>]) -> Result<Vec<RecordKey>, Error> {
        self.validate()?;
        if inputs.is_empty() {
            return Err(Error::NoInputs);
        }
        let mut keys: Vec<RecordKey> = Vec::with_capacity(inputs.len());
        for (i, metadata) in inputs.iter().enumerate() {
            let specs = match self.join_keys.get(i) {
                Some(specs) => specs,
                None => {
                    warn!(
                        "no join key given for input {i} ({}), using the driver key",
                        metadata.name()
                    );
                    &self.join_keys[0]
                }
            };
            let key = RecordKey::new(metadata.clone(), specs)?;
            if let Some(driver_key) = keys.first() {
                driver_key.check_compatible(&key)?;
            }
            keys.push(key);
        }
        Ok(keys)
    }
}
