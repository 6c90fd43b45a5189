// Copyright © 2024 Pathway

use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Arc;

use log::{debug, info, warn};
use smallvec::SmallVec;

use super::reader::InputReader;
use super::run_buffer::RunBuffer;
use crate::connectors::{RecordReader, RecordWriter};
use crate::engine::config::{ErrorAction, ErrorActions, JoinConfig, JoinType};
use crate::engine::control::{Outcome, RunningFlag};
use crate::engine::error::{Error, Result};
use crate::engine::record::{Record, RecordMetadata};
use crate::engine::transform::{RecordTransform, ALL};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JoinStats {
    /// Tuples handed to the transform.
    pub tuples: u64,
    pub records_written: u64,
    /// Tuples whose failure was tolerated by a `CONTINUE` action.
    pub failed: u64,
}

/// Joins sorted inputs on their keys.
///
/// Input 0 is the driver, the others are slaves. For every key the Cartesian
/// product of the matching runs is passed to the transform, filtered by the
/// join type.
#[derive(Debug)]
pub struct MergeJoin {
    config: JoinConfig,
    running: RunningFlag,
    stats: JoinStats,
}

impl MergeJoin {
    pub fn new(config: JoinConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            running: RunningFlag::new(),
            stats: JoinStats::default(),
        })
    }

    #[must_use]
    pub fn with_running_flag(mut self, running: RunningFlag) -> Self {
        self.running = running;
        self
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    pub fn stats(&self) -> JoinStats {
        self.stats
    }

    /// Runs the join to the end of its inputs. `transform.finished()` is
    /// called exactly once, however the join ends.
    pub fn run<T>(
        &mut self,
        inputs: &mut [&mut dyn RecordReader],
        outputs: &mut [&mut dyn RecordWriter],
        transform: &mut T,
    ) -> Result<Outcome>
    where
        T: RecordTransform + ?Sized,
    {
        let result = self.execute(inputs, outputs, transform);
        transform.finished();
        match &result {
            Ok(outcome) => info!(
                "join finished ({outcome:?}): {} tuples, {} records written, {} failures tolerated",
                self.stats.tuples, self.stats.records_written, self.stats.failed
            ),
            Err(error) => debug!("join failed: {error}"),
        }
        result
    }

    fn execute<T>(
        &mut self,
        inputs: &mut [&mut dyn RecordReader],
        outputs: &mut [&mut dyn RecordWriter],
        transform: &mut T,
    ) -> Result<Outcome>
    where
        T: RecordTransform + ?Sized,
    {
        let metadata: Vec<Arc<RecordMetadata>> =
            inputs.iter().map(|input| input.metadata().clone()).collect();
        let keys = self.config.build_keys(&metadata)?;
        let error_log = match self.config.error_log() {
            Some(path) => Some(BufWriter::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            None => None,
        };

        let readers: Vec<InputReader<'_>> = inputs
            .iter_mut()
            .zip(keys)
            .enumerate()
            .map(|(i, (input, key))| {
                let source: &mut dyn RecordReader = &mut **input;
                if i == 0 {
                    InputReader::driver(source, key)
                } else if self.config.allow_slave_duplicates() {
                    let buffer = RunBuffer::new(
                        self.config.run_buffer_memory(),
                        self.config.temp_directories().to_vec(),
                    );
                    InputReader::slave_with_duplicates(i, source, key, buffer)
                } else {
                    InputReader::slave(i, source, key)
                }
            })
            .collect();
        debug!(
            "joining {} inputs into {} outputs, join type {:?}",
            readers.len(),
            outputs.len(),
            self.config.join_type()
        );

        let mut state = JoinState {
            min_indicator: vec![true; readers.len()],
            readers,
            min_cnt: 0,
            any_input_empty: false,
            output_records: outputs
                .iter()
                .map(|output| Record::new(output.metadata().clone()))
                .collect(),
            join_type: self.config.join_type(),
            error_actions: self.config.error_actions().clone(),
            error_log,
            stats: JoinStats::default(),
        };
        let result = state.run(&self.running, outputs, transform);
        self.stats = state.stats;
        result
    }
}

struct JoinState<'a> {
    readers: Vec<InputReader<'a>>,
    min_indicator: Vec<bool>,
    min_cnt: usize,
    any_input_empty: bool,
    output_records: Vec<Record>,
    join_type: JoinType,
    error_actions: ErrorActions,
    error_log: Option<BufWriter<File>>,
    stats: JoinStats,
}

impl JoinState<'_> {
    fn run<T>(
        &mut self,
        running: &RunningFlag,
        outputs: &mut [&mut dyn RecordWriter],
        transform: &mut T,
    ) -> Result<Outcome>
    where
        T: RecordTransform + ?Sized,
    {
        while self.load_next()? > 0 {
            if !running.is_running() {
                return Ok(Outcome::Aborted);
            }
            match self.join_type {
                JoinType::Inner => {
                    if self.any_input_empty {
                        break;
                    }
                    if self.min_cnt != self.readers.len() {
                        continue;
                    }
                }
                JoinType::LeftOuter => {
                    if !self.min_indicator[0] {
                        continue;
                    }
                }
                JoinType::FullOuter => {}
            }
            if self.flush_min(running, outputs, transform)? == Outcome::Aborted {
                return Ok(Outcome::Aborted);
            }
        }
        if !running.is_running() {
            return Ok(Outcome::Aborted);
        }
        for output in outputs.iter_mut() {
            output.flush()?;
        }
        if let Some(error_log) = &mut self.error_log {
            error_log.flush()?;
        }
        Ok(Outcome::Finished)
    }

    /// Moves the readers of the last minimal set to their next runs and
    /// finds the new minimal set. Returns its size, 0 when all inputs are
    /// exhausted.
    fn load_next(&mut self) -> Result<usize> {
        self.any_input_empty = false;
        for (reader, &is_min) in self.readers.iter_mut().zip(&self.min_indicator) {
            if is_min {
                reader.load_next_run()?;
            }
            self.any_input_empty |= reader.sample().is_none();
        }

        let mut min_idx = 0;
        let mut min_cnt = 0;
        for i in 0..self.readers.len() {
            let ordering = if i == min_idx {
                Ordering::Equal
            } else {
                self.readers[min_idx].compare(&self.readers[i])
            };
            match ordering {
                Ordering::Less => self.min_indicator[i] = false,
                Ordering::Equal => {
                    min_cnt += 1;
                    self.min_indicator[i] = true;
                }
                Ordering::Greater => {
                    min_cnt = 1;
                    min_idx = i;
                    self.min_indicator[i] = true;
                }
            }
        }
        for indicator in &mut self.min_indicator[..min_idx] {
            *indicator = false;
        }
        if self.readers[min_idx].sample().is_none() {
            min_cnt = 0;
        }
        self.min_cnt = min_cnt;
        Ok(min_cnt)
    }

    /// Emits every combination of one record per minimal reader, counting
    /// like an odometer: the rightmost reader advances, and when its run
    /// ends it is rewound and the carry moves left. The running flag is
    /// checked before every tuple.
    fn flush_min<T>(
        &mut self,
        running: &RunningFlag,
        outputs: &mut [&mut dyn RecordWriter],
        transform: &mut T,
    ) -> Result<Outcome>
    where
        T: RecordTransform + ?Sized,
    {
        for (reader, &is_min) in self.readers.iter_mut().zip(&self.min_indicator) {
            if is_min {
                reader.next()?;
            }
        }
        loop {
            if !running.is_running() {
                return Ok(Outcome::Aborted);
            }
            self.emit(outputs, transform)?;
            let mut changed = 0;
            let mut i = self.readers.len();
            loop {
                if i == 0 {
                    return Ok(Outcome::Finished);
                }
                i -= 1;
                if !self.min_indicator[i] {
                    continue;
                }
                changed += 1;
                if self.readers[i].next()? {
                    break;
                }
                if changed == self.min_cnt {
                    return Ok(Outcome::Finished);
                }
                self.readers[i].rewind_run()?;
                self.readers[i].next()?;
            }
        }
    }

    fn emit<T>(&mut self, outputs: &mut [&mut dyn RecordWriter], transform: &mut T) -> Result<()>
    where
        T: RecordTransform + ?Sized,
    {
        let inputs: SmallVec<[Option<&Record>; 4]> = self
            .readers
            .iter()
            .zip(&self.min_indicator)
            .map(|(reader, &is_min)| if is_min { reader.current() } else { None })
            .collect();
        for record in &mut self.output_records {
            record.reset();
        }
        self.stats.tuples += 1;
        let code = match transform.transform(&inputs, &mut self.output_records) {
            Ok(code) => Ok(code),
            Err(error) => transform.transform_on_error(error, &inputs, &mut self.output_records),
        }
        .map_err(Error::Transform)?;

        if code == ALL {
            for (output, record) in outputs.iter_mut().zip(&self.output_records) {
                output.write(record)?;
                self.stats.records_written += 1;
            }
        } else if let Ok(slot) = usize::try_from(code) {
            match (outputs.get_mut(slot), self.output_records.get(slot)) {
                (Some(output), Some(record)) => {
                    output.write(record)?;
                    self.stats.records_written += 1;
                }
                _ => return Err(Error::NoSuchOutput(code)),
            }
        } else {
            let key = inputs
                .iter()
                .enumerate()
                .find_map(|(i, record)| record.map(|record| self.readers[i].key().key_string(record)))
                .unwrap_or_default();
            drop(inputs);
            let message = transform.message().unwrap_or_default();
            self.report_failure(key, code, message)?;
        }
        Ok(())
    }

    fn report_failure(&mut self, key: String, code: i32, message: String) -> Result<()> {
        match self.error_actions.action(code) {
            ErrorAction::Stop => Err(Error::TransformFailed { key, code, message }),
            ErrorAction::Continue => {
                self.stats.failed += 1;
                if let Some(error_log) = &mut self.error_log {
                    writeln!(error_log, "{key};{code};{message}")?;
                } else if !message.is_empty() {
                    warn!("transformation for key {key} finished with code {code}: {message}");
                }
                Ok(())
            }
        }
    }
}
