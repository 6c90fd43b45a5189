// Copyright © 2024 Pathway

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

use itertools::Itertools as _;

use super::config::Error as ConfigError;
use super::record::{Record, RecordMetadata};
use super::value::Value;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }

    /// `a...` means ascending, anything else descending.
    pub fn from_flag(flag: &str) -> Self {
        if flag.trim_start().starts_with(['a', 'A']) {
            Self::Ascending
        } else {
            Self::Descending
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collation {
    #[default]
    Binary,
    CaseInsensitive,
}

/// One field of a key as the user names it, before it is bound to a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFieldSpec {
    pub name: String,
    pub order: SortOrder,
    pub collation: Collation,
}

impl KeyFieldSpec {
    pub fn new(name: impl Into<String>, order: SortOrder) -> Self {
        Self {
            name: name.into(),
            order,
            collation: Collation::Binary,
        }
    }

    pub fn ascending(name: impl Into<String>) -> Self {
        Self::new(name, SortOrder::Ascending)
    }

    pub fn descending(name: impl Into<String>) -> Self {
        Self::new(name, SortOrder::Descending)
    }

    #[must_use]
    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    /// Parses a `;`-separated list such as `"id(a);name(d)"`.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, ConfigError> {
        list.split(';')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for KeyFieldSpec {
    type Err = ConfigError;

    /// Accepts `name`, `name(a)` or `name(d)`.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        let (name, order) = match spec.strip_suffix(')') {
            Some(rest) => {
                let (name, flag) = rest
                    .split_once('(')
                    .ok_or_else(|| ConfigError::InvalidKey(spec.to_string()))?;
                (name.trim(), SortOrder::from_flag(flag))
            }
            None => (spec, SortOrder::Ascending),
        };
        if name.is_empty() || name.contains(['(', ')']) {
            return Err(ConfigError::InvalidKey(spec.to_string()));
        }
        Ok(Self::new(name, order))
    }
}

impl Display for KeyFieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = match self.order {
            SortOrder::Ascending => 'a',
            SortOrder::Descending => 'd',
        };
        write!(f, "{}({flag})", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyField {
    position: usize,
    order: SortOrder,
    collation: Collation,
}

/// An ordered list of fields of one schema, used for every record comparison.
#[derive(Debug, Clone)]
pub struct RecordKey {
    metadata: Arc<RecordMetadata>,
    fields: Vec<KeyField>,
}

impl RecordKey {
    pub fn new(metadata: Arc<RecordMetadata>, specs: &[KeyFieldSpec]) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::EmptyKey(metadata.name().to_string()));
        }
        let fields = specs
            .iter()
            .map(|spec| {
                let position = metadata
                    .field_position(&spec.name)
                    .map_err(|_| ConfigError::UnknownKeyField {
                        record: metadata.name().to_string(),
                        field: spec.name.clone(),
                    })?;
                Ok(KeyField {
                    position,
                    order: spec.order,
                    collation: spec.collation,
                })
            })
            .collect::<Result<_, ConfigError>>()?;
        Ok(Self { metadata, fields })
    }

    pub fn metadata(&self) -> &Arc<RecordMetadata> {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.fields.iter().map(|field| field.position)
    }

    pub fn compare(&self, lhs: &Record, rhs: &Record) -> Ordering {
        self.compare_with(self, lhs, rhs)
    }

    /// Compares `lhs` (this key's schema) with `rhs` (the other key's schema)
    /// field by field. Direction and collation are taken from this key.
    pub fn compare_with(&self, other: &RecordKey, lhs: &Record, rhs: &Record) -> Ordering {
        for (field, other_field) in self.fields.iter().zip(&other.fields) {
            let left = &lhs.values()[field.position];
            let right = &rhs.values()[other_field.position];
            let ordering = match field.collation {
                Collation::Binary => left.cmp(right),
                Collation::CaseInsensitive => left.cmp_case_insensitive(right),
            };
            if ordering != Ordering::Equal {
                return field.order.apply(ordering);
            }
        }
        Ordering::Equal
    }

    /// Checks that records of the two schemas can be compared positionally
    /// and are sorted in the same direction.
    pub fn check_compatible(&self, other: &RecordKey) -> Result<(), ConfigError> {
        if self.len() != other.len() {
            return Err(ConfigError::KeyLengthMismatch {
                expected: self.len(),
                actual: other.len(),
                record: other.metadata.name().to_string(),
            });
        }
        for (field, other_field) in self.fields.iter().zip(&other.fields) {
            let type_ = self.metadata.fields()[field.position].type_;
            let other_type = other.metadata.fields()[other_field.position].type_;
            if type_ != other_type {
                return Err(ConfigError::KeyTypeMismatch {
                    field: other.metadata.fields()[other_field.position].name.clone(),
                    expected: type_,
                    actual: other_type,
                });
            }
            if field.order != other_field.order {
                return Err(ConfigError::KeyOrderMismatch {
                    field: other.metadata.fields()[other_field.position].name.clone(),
                    expected: field.order,
                    actual: other_field.order,
                });
            }
        }
        Ok(())
    }

    /// Renders the key values of `record`, for error messages and error logs.
    pub fn key_string(&self, record: &Record) -> String {
        self.fields
            .iter()
            .map(|field| &record.values()[field.position])
            .map(Value::to_string)
            .join(",")
    }
}
