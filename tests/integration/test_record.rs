// Copyright © 2024 Pathway

use std::cmp::Ordering;

use assert_matches::assert_matches;

use tapejoin_engine::engine::{
    Collation, DataError, Error, FieldMetadata, KeyFieldSpec, Record, RecordKey, RecordMetadata,
    Type, Value,
};

use super::helpers::keyed_schema;

#[test]
fn test_new_record_has_defaults() {
    let record = Record::new(keyed_schema("input"));
    assert_eq!(record.values(), &[Value::Int(0), Value::None]);
    assert_eq!(record.metadata().num_fields(), 2);
}

#[test]
fn test_set_field_checks_schema() -> eyre::Result<()> {
    let mut record = Record::new(keyed_schema("input"));
    record.set_field(0, Value::Int(42))?;
    record.set_field_by_name("name", Value::from("x"))?;
    assert_eq!(record.to_string(), "input(42, \"x\")");

    assert_matches!(
        record.set_field(0, Value::from("text")),
        Err(Error::Data(DataError::TypeMismatch { .. }))
    );
    assert_matches!(
        record.set_field(0, Value::None),
        Err(Error::Data(DataError::NullNotAllowed { field })) if field == "id"
    );
    assert_matches!(
        record.set_field(2, Value::Int(1)),
        Err(Error::Data(DataError::FieldOutOfBounds { position: 2, len: 2, .. }))
    );
    assert_matches!(
        record.field_by_name("missing"),
        Err(Error::Data(DataError::UnknownField { .. }))
    );

    // failed writes leave the record untouched
    assert_eq!(record.field(0), Some(&Value::Int(42)));
    record.set_field(1, Value::None)?;
    record.reset();
    assert_eq!(record.values(), &[Value::Int(0), Value::None]);
    Ok(())
}

#[test]
fn test_serialized_record_must_match_schema() -> eyre::Result<()> {
    let wide = RecordMetadata::new(
        "wide",
        vec![
            FieldMetadata::new("a", Type::Int),
            FieldMetadata::new("b", Type::Int),
            FieldMetadata::new("c", Type::Float),
        ],
    );
    let record = Record::from_values(wide, [Value::Int(1), Value::None, Value::from(0.5)])?;
    let mut buffer = Vec::new();
    record.serialize(&mut buffer)?;

    let mut narrow = Record::new(keyed_schema("narrow"));
    assert_matches!(
        narrow.deserialize(&buffer),
        Err(Error::Data(DataError::FieldCountMismatch { expected: 2, actual: 3, .. }))
    );
    assert_matches!(
        Record::from_values(keyed_schema("narrow"), [Value::Int(1)]),
        Err(Error::Data(DataError::FieldCountMismatch { expected: 2, actual: 1, .. }))
    );
    Ok(())
}

#[test]
fn test_copy_from_reuses_record() -> eyre::Result<()> {
    let metadata = keyed_schema("input");
    let source = Record::from_values(metadata.clone(), [Value::Int(5), Value::from("five")])?;
    let mut target = Record::new(metadata);
    target.copy_from(&source);
    assert_eq!(target, source);
    assert_eq!(source.duplicate(), source);
    Ok(())
}

#[test]
fn test_case_insensitive_collation() -> eyre::Result<()> {
    let metadata = keyed_schema("input");
    let lower = Record::from_values(metadata.clone(), [Value::Int(1), Value::from("apple")])?;
    let upper = Record::from_values(metadata.clone(), [Value::Int(2), Value::from("APPLE")])?;
    let banana = Record::from_values(metadata.clone(), [Value::Int(3), Value::from("Banana")])?;

    let binary = RecordKey::new(metadata.clone(), &[KeyFieldSpec::ascending("name")])?;
    assert_eq!(binary.compare(&lower, &upper), Ordering::Greater);
    assert_eq!(binary.compare(&lower, &banana), Ordering::Greater);

    let folded = RecordKey::new(
        metadata,
        &[KeyFieldSpec::ascending("name").with_collation(Collation::CaseInsensitive)],
    )?;
    assert_eq!(folded.compare(&lower, &upper), Ordering::Equal);
    assert_eq!(folded.compare(&lower, &banana), Ordering::Less);
    Ok(())
}

#[test]
fn test_null_orders_first() -> eyre::Result<()> {
    let metadata = keyed_schema("input");
    let key = RecordKey::new(metadata.clone(), &[KeyFieldSpec::ascending("name")])?;
    let null = Record::from_values(metadata.clone(), [Value::Int(1), Value::None])?;
    let empty = Record::from_values(metadata, [Value::Int(1), Value::from("")])?;
    assert_eq!(key.compare(&null, &empty), Ordering::Less);
    Ok(())
}
