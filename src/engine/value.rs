// Copyright © 2024 Pathway

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::sync::Arc;

use arcstr::ArcStr;
use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::error::DataError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    String(ArcStr),
    Bytes(Arc<[u8]>),
    DateTime(NaiveDateTime),
}

impl Value {
    #[inline(never)]
    #[cold]
    fn type_mismatch(&self, expected: &'static str) -> DataError {
        DataError::TypeMismatch {
            expected,
            value: self.clone(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_int(&self) -> Result<i64, DataError> {
        if let Value::Int(i) = self {
            Ok(*i)
        } else {
            Err(self.type_mismatch("integer"))
        }
    }

    pub fn as_bool(&self) -> Result<bool, DataError> {
        if let Value::Bool(b) = self {
            Ok(*b)
        } else {
            Err(self.type_mismatch("bool"))
        }
    }

    pub fn as_float(&self) -> Result<f64, DataError> {
        if let Self::Float(f) = self {
            Ok(f.into_inner())
        } else {
            Err(self.type_mismatch("float"))
        }
    }

    pub fn as_string(&self) -> Result<&ArcStr, DataError> {
        if let Self::String(s) = self {
            Ok(s)
        } else {
            Err(self.type_mismatch("string"))
        }
    }

    pub fn as_date_time(&self) -> Result<NaiveDateTime, DataError> {
        if let Self::DateTime(dt) = self {
            Ok(*dt)
        } else {
            Err(self.type_mismatch("DateTime"))
        }
    }

    #[must_use]
    pub fn type_(&self) -> Option<Type> {
        match self {
            Self::None => None,
            Self::Bool(_) => Some(Type::Bool),
            Self::Int(_) => Some(Type::Int),
            Self::Float(_) => Some(Type::Float),
            Self::String(_) => Some(Type::String),
            Self::Bytes(_) => Some(Type::Bytes),
            Self::DateTime(_) => Some(Type::DateTime),
        }
    }

    /// Compares strings ignoring case; other values fall back to the total order.
    pub fn cmp_case_insensitive(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::String(lhs), Self::String(rhs)) => lhs
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(rhs.chars().flat_map(char::to_lowercase)),
            (lhs, rhs) => lhs.cmp(rhs),
        }
    }
}

impl Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => write!(fmt, "None"),
            Self::Bool(b) => write!(fmt, "{}", if *b { "True" } else { "False" }),
            Self::Int(i) => write!(fmt, "{i}"),
            Self::Float(OrderedFloat(f)) => write!(fmt, "{f:?}"),
            Self::String(s) => write!(fmt, "{s:?}"),
            Self::Bytes(b) => write!(fmt, "{b:?}"),
            Self::DateTime(date_time) => write!(fmt, "{date_time}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(OrderedFloat(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<ArcStr> for Value {
    fn from(s: ArcStr) -> Self {
        Self::String(s)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.into())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(o: Option<T>) -> Self {
        match o {
            None => Self::None,
            Some(v) => v.into(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    #[default]
    Any,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    DateTime,
}

impl Type {
    pub fn matches(self, value: &Value) -> bool {
        match (self, value.type_()) {
            (Type::Any, _) => true,
            (type_, Some(value_type)) => type_ == value_type,
            (_, None) => false,
        }
    }

    /// The value a freshly reset field of this type holds.
    pub fn default_value(self) -> Value {
        match self {
            Type::Any => Value::None,
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::Float => Value::Float(OrderedFloat(0.0)),
            Type::String => Value::String(ArcStr::new()),
            Type::Bytes => Value::Bytes(Arc::from(Vec::new())),
            Type::DateTime => Value::DateTime(NaiveDateTime::default()),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
