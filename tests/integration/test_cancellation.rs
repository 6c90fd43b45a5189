// Copyright © 2024 Pathway

use std::sync::Arc;

use tempfile::tempdir;

use tapejoin_engine::connectors::{
    ReadError, RecordReader, RecordWriter, VecReader, VecWriter, WriteError,
};
use tapejoin_engine::engine::error::DynResult;
use tapejoin_engine::engine::transform::from_fn;
use tapejoin_engine::engine::{
    ExternalSorter, JoinConfig, KeyFieldSpec, MergeJoin, Outcome, Record, RecordMetadata,
    RunningFlag,
};

use super::helpers::{int_reader, keyed_reader, keyed_schema, sort_config};

/// Stops the run once its inner reader is drained.
struct StopAtEnd {
    inner: VecReader,
    running: RunningFlag,
}

impl RecordReader for StopAtEnd {
    fn metadata(&self) -> &Arc<RecordMetadata> {
        self.inner.metadata()
    }

    fn read(&mut self, record: &mut Record) -> Result<bool, ReadError> {
        let has_record = self.inner.read(record)?;
        if !has_record {
            self.running.stop();
        }
        Ok(has_record)
    }
}

/// Stops the run once `limit` records were written.
struct StopAfter {
    inner: VecWriter,
    running: RunningFlag,
    limit: usize,
}

impl RecordWriter for StopAfter {
    fn metadata(&self) -> &Arc<RecordMetadata> {
        self.inner.metadata()
    }

    fn write(&mut self, record: &Record) -> Result<(), WriteError> {
        self.inner.write(record)?;
        if self.inner.records().len() >= self.limit {
            self.running.stop();
        }
        Ok(())
    }
}

fn copy_driver(inputs: &[Option<&Record>], outputs: &mut [Record]) -> DynResult<i32> {
    if let Some(driver) = inputs[0] {
        outputs[0].copy_from(driver);
    }
    Ok(0)
}

fn join_until_stopped(
    driver_rows: &[(i64, &str)],
    slave_rows: &[(i64, &str)],
    limit: usize,
) -> eyre::Result<(Outcome, usize, MergeJoin)> {
    let directory = tempdir()?;
    let running = RunningFlag::new();
    let config = JoinConfig::new(vec![vec![KeyFieldSpec::ascending("id")]])
        .with_temp_directories(vec![directory.path().to_path_buf()]);
    let mut join = MergeJoin::new(config)?.with_running_flag(running.clone());
    let mut driver = keyed_reader(&keyed_schema("driver"), driver_rows)?;
    let mut slave = keyed_reader(&keyed_schema("slave"), slave_rows)?;
    let mut output = StopAfter {
        inner: VecWriter::new(keyed_schema("output")),
        running,
        limit,
    };
    let outcome = join.run(
        &mut [&mut driver as &mut dyn RecordReader, &mut slave],
        &mut [&mut output as &mut dyn RecordWriter],
        &mut from_fn(copy_driver),
    )?;
    Ok((outcome, output.inner.records().len(), join))
}

#[test]
fn test_sort_aborts_during_merge() -> eyre::Result<()> {
    let directory = tempdir()?;
    let metadata = keyed_schema("input");
    let running = RunningFlag::new();
    let config = sort_config(directory.path(), &[KeyFieldSpec::ascending("id")], 1, 4)?;
    let mut sorter = ExternalSorter::new(config, metadata.clone())?.with_running_flag(running.clone());
    let mut reader = StopAtEnd {
        inner: int_reader(&metadata, &[9, 8, 7, 6, 5, 4, 3, 2, 1, 0])?,
        running: running.clone(),
    };
    let mut writer = VecWriter::new(metadata);

    assert_eq!(sorter.run(&mut reader, &mut writer)?, Outcome::Aborted);
    assert!(!running.is_running());
    assert_eq!(sorter.stats().spills, 10);
    assert_eq!(sorter.stats().merge_passes, 0);
    assert!(writer.records().is_empty());
    assert_eq!(std::fs::read_dir(directory.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_sort_stopped_before_start() -> eyre::Result<()> {
    let directory = tempdir()?;
    let metadata = keyed_schema("input");
    let running = RunningFlag::new();
    running.stop();
    let config = sort_config(directory.path(), &[KeyFieldSpec::ascending("id")], 4, 6)?;
    let mut sorter = ExternalSorter::new(config, metadata.clone())?.with_running_flag(running);
    let mut reader = int_reader(&metadata, &[3, 2, 1])?;
    let mut writer = VecWriter::new(metadata);
    assert_eq!(sorter.run(&mut reader, &mut writer)?, Outcome::Aborted);
    assert_eq!(sorter.stats().records, 0);
    assert_eq!(reader.remaining(), 3);
    Ok(())
}

#[test]
fn test_join_aborts_inside_key_group() -> eyre::Result<()> {
    let rows: Vec<(i64, &str)> = vec![(1, "same"); 50];
    let (outcome, written, join) = join_until_stopped(&rows, &rows, 1)?;
    assert_eq!(outcome, Outcome::Aborted);
    assert_eq!(written, 1);
    assert_eq!(join.stats().tuples, 1);
    Ok(())
}

#[test]
fn test_join_aborts_between_keys() -> eyre::Result<()> {
    let (outcome, written, join) = join_until_stopped(
        &[(1, "a"), (2, "b"), (3, "c")],
        &[(1, "x"), (2, "z"), (3, "w")],
        1,
    )?;
    assert_eq!(outcome, Outcome::Aborted);
    assert_eq!(written, 1);
    assert_eq!(join.stats().tuples, 1);
    Ok(())
}

#[test]
fn test_join_stopped_in_last_group_is_aborted() -> eyre::Result<()> {
    let (outcome, written, _) =
        join_until_stopped(&[(1, "a"), (2, "b")], &[(1, "x"), (2, "y")], 2)?;
    assert_eq!(written, 2);
    assert_eq!(outcome, Outcome::Aborted);

    let (outcome, written, _) =
        join_until_stopped(&[(1, "a"), (2, "b")], &[(1, "x"), (2, "y")], 3)?;
    assert_eq!(written, 2);
    assert_eq!(outcome, Outcome::Finished);
    Ok(())
}
