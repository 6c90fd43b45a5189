// Copyright © 2024 Pathway

use std::cmp::Ordering;

use assert_matches::assert_matches;
use tempfile::tempdir;

use tapejoin_engine::engine::config::Error as ConfigError;
use tapejoin_engine::engine::{
    parse_key_list, ErrorAction, ErrorActions, Error, ExternalSorter, FieldMetadata, JoinConfig,
    JoinType, KeyFieldSpec, MergeJoin, Record, RecordKey, RecordMetadata, SortConfig, SortOrder,
    Type, Value,
};

use super::helpers::{keyed_schema, sort_config};

fn orders(specs: &[KeyFieldSpec]) -> Vec<SortOrder> {
    specs.iter().map(|spec| spec.order).collect()
}

#[test]
fn test_key_field_parsing() -> eyre::Result<()> {
    let specs = KeyFieldSpec::parse_list(" id ; name(d);stamp(a) ;")?;
    assert_eq!(
        specs,
        vec![
            KeyFieldSpec::ascending("id"),
            KeyFieldSpec::descending("name"),
            KeyFieldSpec::ascending("stamp"),
        ]
    );
    assert_eq!(specs[1].to_string(), "name(d)");

    assert_matches!("id(d".parse::<KeyFieldSpec>(), Err(ConfigError::InvalidKey(_)));
    assert_matches!("(d)".parse::<KeyFieldSpec>(), Err(ConfigError::InvalidKey(_)));
    Ok(())
}

#[test]
fn test_legacy_orders_repeat_last() -> eyre::Result<()> {
    let specs = parse_key_list("a;b;c", Some("d;a"))?;
    assert_eq!(
        orders(&specs),
        vec![SortOrder::Descending, SortOrder::Ascending, SortOrder::Ascending]
    );

    let specs = parse_key_list("a(d);b", None)?;
    assert_eq!(orders(&specs), vec![SortOrder::Descending, SortOrder::Ascending]);

    let specs = parse_key_list("a;b", Some("x"))?;
    assert_eq!(orders(&specs), vec![SortOrder::Descending; 2]);
    Ok(())
}

#[test]
fn test_sort_config_validation() -> eyre::Result<()> {
    let directory = tempdir()?;
    let key = [KeyFieldSpec::ascending("id")];
    let metadata = keyed_schema("input");

    for tapes in [0, 2, 5, 7] {
        let config = sort_config(directory.path(), &key, 10, tapes)?;
        assert_matches!(config.validate(), Err(ConfigError::BadTapeCount(n)) if n == tapes);
    }
    for tapes in [4, 6, 10] {
        sort_config(directory.path(), &key, 10, tapes)?.validate()?;
    }

    let config = sort_config(directory.path(), &key, 0, 6)?;
    assert_matches!(
        ExternalSorter::new(config, metadata.clone()),
        Err(Error::Config(ConfigError::ZeroCapacity))
    );

    let config = sort_config(directory.path(), &key, 10, 6)?.with_temp_directories(Vec::new());
    assert_matches!(
        ExternalSorter::new(config, metadata.clone()),
        Err(Error::Config(ConfigError::NoTempDirectories))
    );

    let config = SortConfig::new(Vec::new())?;
    assert_matches!(config.validate(), Err(ConfigError::EmptyKey(_)));

    let config = SortConfig::from_key_string("missing", None)?
        .with_temp_directories(vec![directory.path().to_path_buf()]);
    assert_matches!(
        ExternalSorter::new(config, metadata),
        Err(Error::Config(ConfigError::UnknownKeyField { field, .. })) if field == "missing"
    );
    Ok(())
}

#[test]
fn test_sort_config_defaults() -> eyre::Result<()> {
    let config = SortConfig::new(vec![KeyFieldSpec::ascending("id")])?;
    assert_eq!(config.number_of_tapes(), 6);
    assert!(config.in_memory_capacity() > 0);
    assert!(!config.temp_directories().is_empty());
    assert!(!config.sync_tapes());
    Ok(())
}

#[test]
fn test_join_type_parsing() -> eyre::Result<()> {
    assert_eq!("inner".parse::<JoinType>()?, JoinType::Inner);
    assert_eq!("leftOuter".parse::<JoinType>()?, JoinType::LeftOuter);
    assert_eq!(" FULLOUTER ".parse::<JoinType>()?, JoinType::FullOuter);
    assert_matches!("cross".parse::<JoinType>(), Err(ConfigError::BadJoinType(name)) if name == "cross");
    assert_eq!(JoinType::default(), JoinType::Inner);
    Ok(())
}

#[test]
fn test_error_actions_parsing() -> eyre::Result<()> {
    let actions: ErrorActions = "-1=CONTINUE; -3=stop ;MIN_INT=Continue".parse()?;
    assert_eq!(actions.action(-1), ErrorAction::Continue);
    assert_eq!(actions.action(-3), ErrorAction::Stop);
    assert_eq!(actions.action(-42), ErrorAction::Continue);

    let actions: ErrorActions = "-2=CONTINUE".parse()?;
    assert_eq!(actions.action(-2), ErrorAction::Continue);
    assert_eq!(actions.action(-1), ErrorAction::Stop);

    assert_eq!("".parse::<ErrorActions>()?, ErrorActions::default());
    assert_eq!(
        ErrorActions::new(ErrorAction::Continue).with_action(-7, ErrorAction::Stop).action(-7),
        ErrorAction::Stop
    );

    assert_matches!("-1".parse::<ErrorActions>(), Err(ConfigError::BadErrorAction(_)));
    assert_matches!("x=STOP".parse::<ErrorActions>(), Err(ConfigError::BadErrorAction(_)));
    assert_matches!("-1=IGNORE".parse::<ErrorActions>(), Err(ConfigError::BadErrorAction(_)));
    Ok(())
}

#[test]
fn test_join_config_validation() -> eyre::Result<()> {
    assert_matches!(
        MergeJoin::new(JoinConfig::new(Vec::new())),
        Err(Error::Config(ConfigError::EmptyKey(_)))
    );
    assert_matches!(
        MergeJoin::new(JoinConfig::new(vec![vec![KeyFieldSpec::ascending("id")]]).with_temp_directories(Vec::new())),
        Err(Error::Config(ConfigError::NoTempDirectories))
    );

    let config = JoinConfig::from_key_string("id(d);name#cust_id;cust_name")?;
    assert_eq!(config.join_type(), JoinType::Inner);
    assert!(config.allow_slave_duplicates());
    assert!(config.error_log().is_none());
    MergeJoin::new(config)?;
    Ok(())
}

#[test]
fn test_record_key_binding() -> eyre::Result<()> {
    let metadata = keyed_schema("input");
    assert_matches!(
        RecordKey::new(metadata.clone(), &[]),
        Err(ConfigError::EmptyKey(record)) if record == "input"
    );
    assert_matches!(
        RecordKey::new(metadata.clone(), &[KeyFieldSpec::ascending("nope")]),
        Err(ConfigError::UnknownKeyField { record, field }) if record == "input" && field == "nope"
    );

    let key = RecordKey::new(
        metadata.clone(),
        &[KeyFieldSpec::ascending("name"), KeyFieldSpec::descending("id")],
    )?;
    assert_eq!(key.positions().collect::<Vec<_>>(), vec![1, 0]);

    let low = Record::from_values(metadata.clone(), [Value::Int(9), Value::from("a")])?;
    let high = Record::from_values(metadata.clone(), [Value::Int(1), Value::from("a")])?;
    assert_eq!(key.compare(&low, &high), Ordering::Less);
    assert_eq!(key.key_string(&low), "\"a\",9");

    let floats = RecordMetadata::new(
        "floats",
        vec![
            FieldMetadata::new("label", Type::String),
            FieldMetadata::new("id", Type::Float),
        ],
    );
    let other = RecordKey::new(
        floats,
        &[KeyFieldSpec::ascending("label"), KeyFieldSpec::ascending("id")],
    )?;
    assert_matches!(
        key.check_compatible(&other),
        Err(ConfigError::KeyTypeMismatch { field, expected: Type::Int, actual: Type::Float }) if field == "id"
    );
    Ok(())
}
