// Copyright © 2024 Pathway

use std::cmp::Ordering;
use std::mem::{swap, take};

use super::run_buffer::RunBuffer;
use crate::connectors::RecordReader;
use crate::engine::error::{Error, Result};
use crate::engine::key::RecordKey;
use crate::engine::record::Record;

/// A sorted input with one record of lookahead.
///
/// Every record taken is checked against the one following it, so an
/// unsorted input is reported as soon as the disorder is seen.
struct SortedInput<'a> {
    input: usize,
    source: &'a mut dyn RecordReader,
    key: RecordKey,
    next: Record,
    has_next: bool,
    started: bool,
}

impl<'a> SortedInput<'a> {
    fn new(input: usize, source: &'a mut dyn RecordReader, key: RecordKey) -> Self {
        let next = Record::new(source.metadata().clone());
        Self {
            input,
            source,
            key,
            next,
            has_next: false,
            started: false,
        }
    }

    fn prime(&mut self) -> Result<()> {
        if !self.started {
            self.started = true;
            self.has_next = self.source.read(&mut self.next)?;
        }
        Ok(())
    }

    /// Moves the lookahead record into `record` and reads a new one.
    fn take_into(&mut self, record: &mut Record) -> Result<bool> {
        self.prime()?;
        if !self.has_next {
            return Ok(false);
        }
        swap(record, &mut self.next);
        self.has_next = self.source.read(&mut self.next)?;
        if self.has_next && self.key.compare(record, &self.next) == Ordering::Greater {
            return Err(Error::OutOfOrder { input: self.input });
        }
        Ok(true)
    }

    /// Whether the lookahead record has the same key as `record`.
    fn continues_run_of(&mut self, record: &Record) -> Result<bool> {
        self.prime()?;
        Ok(self.has_next && self.key.compare(record, &self.next) == Ordering::Equal)
    }
}

/// Reads the driving input in a single forward pass.
pub struct DriverReader<'a> {
    input: SortedInput<'a>,
    current: Record,
    has_current: bool,
    served_first: bool,
    run_exhausted: bool,
}

impl<'a> DriverReader<'a> {
    fn new(input: SortedInput<'a>) -> Self {
        let current = input.next.duplicate();
        Self {
            input,
            current,
            has_current: false,
            served_first: false,
            run_exhausted: false,
        }
    }

    fn load_next_run(&mut self) -> Result<bool> {
        if self.has_current {
            while self.input.continues_run_of(&self.current)? {
                self.input.take_into(&mut self.current)?;
            }
        }
        self.has_current = self.input.take_into(&mut self.current)?;
        self.served_first = false;
        self.run_exhausted = false;
        Ok(self.has_current)
    }

    fn next(&mut self) -> Result<bool> {
        if !self.has_current || self.run_exhausted {
            return Ok(false);
        }
        if !self.served_first {
            self.served_first = true;
            return Ok(true);
        }
        if self.input.continues_run_of(&self.current)? {
            self.input.take_into(&mut self.current)?;
            Ok(true)
        } else {
            self.run_exhausted = true;
            Ok(false)
        }
    }

    fn current(&self) -> Option<&Record> {
        self.has_current.then_some(&self.current)
    }
}

/// Reads a slave input, keeping every record of the run for replay.
pub struct SlaveDupReader<'a> {
    input: SortedInput<'a>,
    sample: Record,
    has_sample: bool,
    current: Record,
    buffer: RunBuffer,
    position: ReplayPosition,
    scratch: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayPosition {
    BeforeFirst,
    First,
    InBuffer,
    Exhausted,
}

impl<'a> SlaveDupReader<'a> {
    fn new(input: SortedInput<'a>, buffer: RunBuffer) -> Self {
        let sample = input.next.duplicate();
        let current = input.next.duplicate();
        Self {
            input,
            sample,
            has_sample: false,
            current,
            buffer,
            position: ReplayPosition::BeforeFirst,
            scratch: Vec::new(),
        }
    }

    fn load_next_run(&mut self) -> Result<bool> {
        self.has_sample = self.input.take_into(&mut self.sample)?;
        self.position = ReplayPosition::BeforeFirst;
        if !self.has_sample {
            return Ok(false);
        }
        self.buffer.clear()?;
        while self.input.continues_run_of(&self.sample)? {
            self.input.take_into(&mut self.current)?;
            self.scratch.clear();
            self.current.serialize(&mut self.scratch)?;
            self.buffer.push(&self.scratch)?;
        }
        self.buffer.rewind()?;
        Ok(true)
    }

    fn next(&mut self) -> Result<bool> {
        match self.position {
            ReplayPosition::BeforeFirst if self.has_sample => {
                self.position = ReplayPosition::First;
                Ok(true)
            }
            ReplayPosition::First | ReplayPosition::InBuffer => {
                let mut scratch = take(&mut self.scratch);
                let shifted = self.buffer.shift(&mut scratch);
                if let Ok(true) = shifted {
                    self.current.deserialize(&scratch)?;
                    self.position = ReplayPosition::InBuffer;
                } else {
                    self.position = ReplayPosition::Exhausted;
                }
                self.scratch = scratch;
                shifted
            }
            ReplayPosition::BeforeFirst | ReplayPosition::Exhausted => Ok(false),
        }
    }

    fn rewind_run(&mut self) -> Result<()> {
        self.buffer.rewind()?;
        self.position = ReplayPosition::BeforeFirst;
        Ok(())
    }

    fn current(&self) -> Option<&Record> {
        match self.position {
            ReplayPosition::First => Some(&self.sample),
            ReplayPosition::InBuffer => Some(&self.current),
            ReplayPosition::BeforeFirst | ReplayPosition::Exhausted => None,
        }
    }
}

/// Reads a slave input whose runs collapse to their last record.
pub struct SlaveReader<'a> {
    input: SortedInput<'a>,
    sample: Record,
    has_sample: bool,
    served: bool,
}

impl<'a> SlaveReader<'a> {
    fn new(input: SortedInput<'a>) -> Self {
        let sample = input.next.duplicate();
        Self {
            input,
            sample,
            has_sample: false,
            served: false,
        }
    }

    fn load_next_run(&mut self) -> Result<bool> {
        self.has_sample = self.input.take_into(&mut self.sample)?;
        self.served = false;
        if self.has_sample {
            while self.input.continues_run_of(&self.sample)? {
                self.input.take_into(&mut self.sample)?;
            }
        }
        Ok(self.has_sample)
    }

    fn next(&mut self) -> bool {
        if self.has_sample && !self.served {
            self.served = true;
            true
        } else {
            false
        }
    }

    fn rewind_run(&mut self) {
        self.served = false;
    }
}

/// One input of a merge join, positioned on a run of equal keys.
pub enum InputReader<'a> {
    Driver(DriverReader<'a>),
    SlaveDup(SlaveDupReader<'a>),
    Slave(SlaveReader<'a>),
}

impl<'a> InputReader<'a> {
    pub fn driver(source: &'a mut dyn RecordReader, key: RecordKey) -> Self {
        Self::Driver(DriverReader::new(SortedInput::new(0, source, key)))
    }

    pub fn slave_with_duplicates(
        input: usize,
        source: &'a mut dyn RecordReader,
        key: RecordKey,
        buffer: RunBuffer,
    ) -> Self {
        Self::SlaveDup(SlaveDupReader::new(
            SortedInput::new(input, source, key),
            buffer,
        ))
    }

    pub fn slave(input: usize, source: &'a mut dyn RecordReader, key: RecordKey) -> Self {
        Self::Slave(SlaveReader::new(SortedInput::new(input, source, key)))
    }

    /// Positions the reader on the next run; `false` once the input is exhausted.
    pub fn load_next_run(&mut self) -> Result<bool> {
        match self {
            Self::Driver(reader) => reader.load_next_run(),
            Self::SlaveDup(reader) => reader.load_next_run(),
            Self::Slave(reader) => reader.load_next_run(),
        }
    }

    /// Advances to the next record of the run; `false` past its end.
    pub fn next(&mut self) -> Result<bool> {
        match self {
            Self::Driver(reader) => reader.next(),
            Self::SlaveDup(reader) => reader.next(),
            Self::Slave(reader) => Ok(reader.next()),
        }
    }

    /// The record [`InputReader::next`] moved to.
    pub fn current(&self) -> Option<&Record> {
        match self {
            Self::Driver(reader) => reader.current(),
            Self::SlaveDup(reader) => reader.current(),
            Self::Slave(reader) => reader.has_sample.then_some(&reader.sample),
        }
    }

    /// Restarts the current run. The driver cannot replay and ignores this.
    pub fn rewind_run(&mut self) -> Result<()> {
        match self {
            Self::Driver(_) => Ok(()),
            Self::SlaveDup(reader) => reader.rewind_run(),
            Self::Slave(reader) => {
                reader.rewind_run();
                Ok(())
            }
        }
    }

    /// A record of the current run, `None` once the input is exhausted.
    pub fn sample(&self) -> Option<&Record> {
        match self {
            Self::Driver(reader) => reader.current(),
            Self::SlaveDup(reader) => reader.has_sample.then_some(&reader.sample),
            Self::Slave(reader) => reader.has_sample.then_some(&reader.sample),
        }
    }

    pub fn key(&self) -> &RecordKey {
        match self {
            Self::Driver(reader) => &reader.input.key,
            Self::SlaveDup(reader) => &reader.input.key,
            Self::Slave(reader) => &reader.input.key,
        }
    }

    /// Compares the current runs of two readers. An exhausted reader sorts
    /// after every other one.
    pub fn compare(&self, other: &InputReader<'_>) -> Ordering {
        match (self.sample(), other.sample()) {
            (Some(lhs), Some(rhs)) => self.key().compare_with(other.key(), lhs, rhs),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}
