// Copyright © 2024 Pathway

use std::mem::swap;
use std::sync::Arc;

use log::{debug, info};

use super::buffer::SortBuffer;
use super::carousel::TapeCarousel;
use crate::connectors::{RecordReader, RecordWriter};
use crate::engine::config::SortConfig;
use crate::engine::control::{Outcome, RunningFlag};
use crate::engine::error::{Error, Result};
use crate::engine::key::RecordKey;
use crate::engine::record::{Record, RecordMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Collect,
    DirectEmit,
    Merge,
    Done,
}

/// Sorts a stream of any length using a bounded buffer and spill tapes.
///
/// Records are collected with [`ExternalSorter::put`]. When the buffer
/// overflows it is sorted and spilled to the next tape of the source
/// carousel as one chunk. [`ExternalSorter::sort`] then either sorts the
/// buffer in place (nothing was spilled) or merges the chunks, pass after
/// pass, until every tape holds at most one chunk. The last k-way merge
/// happens lazily while records are pulled with [`ExternalSorter::get`].
#[derive(Debug)]
pub struct ExternalSorter {
    config: SortConfig,
    metadata: Arc<RecordMetadata>,
    key: RecordKey,
    buffer: SortBuffer,
    source: TapeCarousel,
    target: TapeCarousel,
    phase: Phase,
    slots: Vec<Record>,
    has_data: Vec<bool>,
    pending_refill: Option<usize>,
    scratch: Vec<u8>,
    running: RunningFlag,
    stats: SortStats,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SortStats {
    pub records: u64,
    pub spills: usize,
    pub merge_passes: usize,
}

impl ExternalSorter {
    pub fn new(config: SortConfig, metadata: Arc<RecordMetadata>) -> Result<Self> {
        let key = config.build_key(metadata.clone())?;
        let num_tapes = config.number_of_tapes();
        let directories = config.temp_directories().to_vec();
        let sync = config.sync_tapes();
        Ok(Self {
            buffer: SortBuffer::new(key.clone(), config.in_memory_capacity()),
            source: TapeCarousel::new(num_tapes, directories.clone(), sync),
            target: TapeCarousel::new(num_tapes, directories, sync),
            config,
            metadata,
            key,
            phase: Phase::Collect,
            slots: Vec::new(),
            has_data: Vec::new(),
            pending_refill: None,
            scratch: Vec::new(),
            running: RunningFlag::new(),
            stats: SortStats::default(),
        })
    }

    #[must_use]
    pub fn with_running_flag(mut self, running: RunningFlag) -> Self {
        self.running = running;
        self
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    pub fn stats(&self) -> SortStats {
        self.stats
    }

    pub fn put(&mut self, record: &Record) -> Result<()> {
        if !self.buffer.put(record) {
            self.buffer.sort();
            self.spill()?;
            self.buffer.reset();
            if !self.buffer.put(record) {
                return Err(Error::SortBufferRejected);
            }
        }
        self.stats.records += 1;
        Ok(())
    }

    /// Finishes collecting. Afterwards records can be pulled in order.
    pub fn sort(&mut self) -> Result<Outcome> {
        if self.stats.spills == 0 {
            self.buffer.sort();
            self.phase = Phase::DirectEmit;
            return Ok(Outcome::Finished);
        }
        if !self.buffer.is_empty() {
            self.buffer.sort();
            self.spill()?;
        }
        self.buffer.free();
        let outcome = self.merge()?;
        if outcome == Outcome::Finished {
            self.phase = Phase::Merge;
        }
        Ok(outcome)
    }

    /// Borrows the next record in sorted order.
    pub fn next_record(&mut self) -> Result<Option<&Record>> {
        match self.phase {
            Phase::DirectEmit => Ok(self.buffer.next_record()),
            Phase::Merge => self.next_merged(),
            Phase::Collect | Phase::Done => Ok(None),
        }
    }

    pub fn get(&mut self, record: &mut Record) -> Result<bool> {
        match self.next_record()? {
            Some(next) => {
                record.copy_from(next);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn get_raw(&mut self, buffer: &mut Vec<u8>) -> Result<bool> {
        match self.next_record()? {
            Some(next) => {
                buffer.clear();
                next.serialize(buffer)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Prepares the sorter for another stream.
    pub fn reset(&mut self) -> Result<()> {
        self.buffer.reset();
        self.source.clear()?;
        self.target.free();
        self.slots.clear();
        self.has_data.clear();
        self.pending_refill = None;
        self.phase = Phase::Collect;
        self.stats = SortStats::default();
        Ok(())
    }

    pub fn free(&mut self) {
        self.buffer.free();
        self.source.free();
        self.target.free();
        self.slots = Vec::new();
        self.has_data = Vec::new();
        self.pending_refill = None;
        self.phase = Phase::Done;
    }

    /// Reads `input` to its end and writes it sorted to `output`. Tapes are
    /// released however the run ends.
    pub fn run(
        &mut self,
        input: &mut dyn RecordReader,
        output: &mut dyn RecordWriter,
    ) -> Result<Outcome> {
        let result = self.run_to_end(input, output);
        if let Err(error) = &result {
            debug!("sort failed after {} records: {error}", self.stats.records);
            self.free();
        }
        result
    }

    fn run_to_end(
        &mut self,
        input: &mut dyn RecordReader,
        output: &mut dyn RecordWriter,
    ) -> Result<Outcome> {
        let running = self.running.clone();
        let mut record = Record::new(self.metadata.clone());
        loop {
            if !running.is_running() {
                return Ok(self.abort());
            }
            if !input.read(&mut record)? {
                break;
            }
            self.put(&record)?;
        }
        if self.sort()? == Outcome::Aborted {
            return Ok(self.abort());
        }
        loop {
            if !running.is_running() {
                return Ok(self.abort());
            }
            let Some(next) = self.next_record()? else {
                break;
            };
            output.write(next)?;
        }
        output.flush()?;
        info!(
            "sorted {} records with {} spills and {} merge passes",
            self.stats.records, self.stats.spills, self.stats.merge_passes
        );
        self.free();
        Ok(Outcome::Finished)
    }

    fn abort(&mut self) -> Outcome {
        debug!("sort aborted after {} records", self.stats.records);
        self.free();
        Outcome::Aborted
    }

    /// Writes the sorted buffer as a new chunk. The first spill opens the
    /// carousel and uses its first tape; later spills rotate.
    fn spill(&mut self) -> Result<()> {
        let tape = if self.stats.spills == 0 {
            self.source.open()?;
            self.source.current_tape()
        } else {
            self.source.rotate()
        }
        .ok_or(Error::CarouselClosed)?;
        tape.add_data_chunk();
        self.buffer.rewind();
        while self.buffer.get(&mut self.scratch)? {
            tape.put(&self.scratch)?;
        }
        tape.flush()?;
        self.stats.spills += 1;
        debug!(
            "spilled {} records to tape {} (chunk {})",
            self.buffer.len(),
            tape.index(),
            tape.num_chunks()
        );
        Ok(())
    }

    fn merge(&mut self) -> Result<Outcome> {
        let num_tapes = self.source.num_tapes();
        self.slots = (0..num_tapes)
            .map(|_| Record::new(self.metadata.clone()))
            .collect();
        self.has_data = vec![false; num_tapes];
        self.source.rewind()?;

        while self.source.tape(0).map_or(0, |tape| tape.num_chunks()) > 1 {
            if !self.running.is_running() {
                return Ok(Outcome::Aborted);
            }
            self.target.open()?;
            let mut groups = 0;
            loop {
                self.load_up_records()?;
                if !self.has_data.contains(&true) {
                    break;
                }
                let target = self.target.current_tape().ok_or(Error::CarouselClosed)?;
                target.add_data_chunk();
                while let Some(index) = lowest_index(&self.key, &self.slots, &self.has_data) {
                    if !self.running.is_running() {
                        return Ok(Outcome::Aborted);
                    }
                    self.scratch.clear();
                    self.slots[index].serialize(&mut self.scratch)?;
                    target.put(&self.scratch)?;
                    self.has_data[index] = match self.source.tape_mut(index) {
                        Some(tape) => tape.get(&mut self.slots[index])?,
                        None => false,
                    };
                }
                target.flush()?;
                self.target.rotate();
                groups += 1;
                if !self.source.next_data_chunks()? {
                    break;
                }
            }
            self.target.rewind()?;
            self.source.clear()?;
            swap(&mut self.source, &mut self.target);
            self.stats.merge_passes += 1;
            debug!(
                "merge pass {} wrote {groups} chunks, first tape now has {}",
                self.stats.merge_passes,
                self.source.tape(0).map_or(0, |tape| tape.num_chunks())
            );
        }

        self.target.free();
        self.source.rewind()?;
        self.load_up_records()?;
        self.pending_refill = None;
        Ok(Outcome::Finished)
    }

    fn load_up_records(&mut self) -> Result<()> {
        for (index, tape) in self.source.tapes_mut().iter_mut().enumerate() {
            self.has_data[index] = tape.get(&mut self.slots[index])?;
        }
        Ok(())
    }

    fn next_merged(&mut self) -> Result<Option<&Record>> {
        if let Some(index) = self.pending_refill.take() {
            self.has_data[index] = match self.source.tape_mut(index) {
                Some(tape) => tape.get(&mut self.slots[index])?,
                None => false,
            };
        }
        match lowest_index(&self.key, &self.slots, &self.has_data) {
            Some(index) => {
                self.pending_refill = Some(index);
                Ok(Some(&self.slots[index]))
            }
            None => {
                self.source.free();
                self.phase = Phase::Done;
                Ok(None)
            }
        }
    }
}

/// Linear scan for the smallest live slot; the first one wins ties.
fn lowest_index(key: &RecordKey, slots: &[Record], has_data: &[bool]) -> Option<usize> {
    let mut lowest: Option<usize> = None;
    for (index, slot) in slots.iter().enumerate() {
        if !has_data[index] {
            continue;
        }
        match lowest {
            Some(current) if key.compare(&slots[current], slot).is_le() => {}
            _ => lowest = Some(index),
        }
    }
    lowest
}
