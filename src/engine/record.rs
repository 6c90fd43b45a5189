// Copyright © 2024 Pathway

use std::fmt::{self, Display};
use std::sync::Arc;

use itertools::Itertools as _;

use super::error::{DataError, Result};
use super::value::{Type, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    pub name: String,
    pub type_: Type,
    pub nullable: bool,
}

impl FieldMetadata {
    pub fn new(name: impl Into<String>, type_: Type) -> Self {
        Self {
            name: name.into(),
            type_,
            nullable: true,
        }
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    fn default_value(&self) -> Value {
        if self.nullable {
            Value::None
        } else {
            self.type_.default_value()
        }
    }
}

/// The schema shared by every record read from one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    name: String,
    fields: Vec<FieldMetadata>,
}

impl RecordMetadata {
    pub fn new(name: impl Into<String>, fields: Vec<FieldMetadata>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldMetadata] {
        &self.fields
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, position: usize) -> Option<&FieldMetadata> {
        self.fields.get(position)
    }

    pub fn field_position(&self, name: &str) -> Result<usize, DataError> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .ok_or_else(|| DataError::UnknownField {
                record: self.name.clone(),
                field: name.to_string(),
            })
    }
}

/// A mutable, fixed-schema sequence of values.
///
/// Engines keep a few instances around and overwrite them on every read,
/// so most mutation happens through [`Record::copy_from`] and
/// [`Record::deserialize`] rather than by building new records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    metadata: Arc<RecordMetadata>,
    values: Vec<Value>,
}

impl Record {
    pub fn new(metadata: Arc<RecordMetadata>) -> Self {
        let values = metadata
            .fields
            .iter()
            .map(FieldMetadata::default_value)
            .collect();
        Self { metadata, values }
    }

    pub fn from_values(
        metadata: Arc<RecordMetadata>,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self> {
        let mut record = Self::new(metadata);
        let values: Vec<Value> = values.into_iter().collect();
        record.check_len(values.len())?;
        for (position, value) in values.into_iter().enumerate() {
            record.set_field(position, value)?;
        }
        Ok(record)
    }

    pub fn metadata(&self) -> &Arc<RecordMetadata> {
        &self.metadata
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn field(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }

    pub fn field_by_name(&self, name: &str) -> Result<&Value> {
        let position = self.metadata.field_position(name)?;
        Ok(&self.values[position])
    }

    pub fn set_field(&mut self, position: usize, value: Value) -> Result<()> {
        let Some(field) = self.metadata.field(position) else {
            return Err(DataError::FieldOutOfBounds {
                record: self.metadata.name.clone(),
                position,
                len: self.values.len(),
            }
            .into());
        };
        if value.is_none() {
            if !field.nullable {
                return Err(DataError::NullNotAllowed {
                    field: field.name.clone(),
                }
                .into());
            }
        } else if !field.type_.matches(&value) {
            return Err(DataError::TypeMismatch {
                expected: type_name(field.type_),
                value,
            }
            .into());
        }
        self.values[position] = value;
        Ok(())
    }

    pub fn set_field_by_name(&mut self, name: &str, value: Value) -> Result<()> {
        let position = self.metadata.field_position(name)?;
        self.set_field(position, value)
    }

    /// Puts every field back to its default.
    pub fn reset(&mut self) {
        for (value, field) in self.values.iter_mut().zip(&self.metadata.fields) {
            *value = field.default_value();
        }
    }

    /// Deep copy, sharing only the schema.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Overwrites this record in place, reusing its allocation.
    pub fn copy_from(&mut self, other: &Record) {
        self.values.clone_from(&other.values);
    }

    pub fn serialize(&self, buffer: &mut Vec<u8>) -> Result<()> {
        bincode::serialize_into(buffer, &self.values)?;
        Ok(())
    }

    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
        let values: Vec<Value> = bincode::deserialize(bytes)?;
        self.check_len(values.len())?;
        self.values = values;
        Ok(())
    }

    fn check_len(&self, actual: usize) -> Result<(), DataError> {
        if actual == self.metadata.num_fields() {
            Ok(())
        } else {
            Err(DataError::FieldCountMismatch {
                record: self.metadata.name.clone(),
                expected: self.metadata.num_fields(),
                actual,
            })
        }
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.metadata.name, self.values.iter().format(", "))
    }
}

fn type_name(type_: Type) -> &'static str {
    match type_ {
        Type::Any => "any",
        Type::Bool => "bool",
        Type::Int => "integer",
        Type::Float => "float",
        Type::String => "string",
        Type::Bytes => "bytes",
        Type::DateTime => "DateTime",
    }
}
