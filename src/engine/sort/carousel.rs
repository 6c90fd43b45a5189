// Copyright © 2024 Pathway

use std::path::PathBuf;

use log::debug;

use super::tape::Tape;
use crate::engine::error::Result;
use crate::fs_helpers::spill_directory;

/// Fixed-size round-robin pool of tapes.
///
/// Tape files are created by [`TapeCarousel::open`] and removed by
/// [`TapeCarousel::free`] or on drop.
#[derive(Debug)]
pub struct TapeCarousel {
    directories: Vec<PathBuf>,
    num_tapes: usize,
    sync: bool,
    tapes: Vec<Tape>,
    current: usize,
}

impl TapeCarousel {
    pub fn new(num_tapes: usize, directories: Vec<PathBuf>, sync: bool) -> Self {
        Self {
            directories,
            num_tapes,
            sync,
            tapes: Vec::new(),
            current: 0,
        }
    }

    pub fn open(&mut self) -> Result<()> {
        if self.tapes.is_empty() {
            for index in 0..self.num_tapes {
                let directory = spill_directory(&self.directories, index)?;
                self.tapes.push(Tape::new(index, directory, self.sync)?);
            }
            debug!("opened {} tapes", self.num_tapes);
        }
        self.current = 0;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        !self.tapes.is_empty()
    }

    pub fn num_tapes(&self) -> usize {
        self.num_tapes
    }

    pub fn first_tape(&mut self) -> Option<&mut Tape> {
        self.current = 0;
        self.tapes.first_mut()
    }

    /// Moves to the following tape; `None` past the last one.
    pub fn next_tape(&mut self) -> Option<&mut Tape> {
        if self.current + 1 < self.tapes.len() {
            self.current += 1;
            self.tapes.get_mut(self.current)
        } else {
            None
        }
    }

    /// Moves to the following tape, wrapping to the first one. `None` if
    /// the carousel is not open.
    pub fn rotate(&mut self) -> Option<&mut Tape> {
        if self.tapes.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.tapes.len();
        self.tapes.get_mut(self.current)
    }

    pub fn current_tape(&mut self) -> Option<&mut Tape> {
        self.tapes.get_mut(self.current)
    }

    pub fn tape(&self, index: usize) -> Option<&Tape> {
        self.tapes.get(index)
    }

    pub fn tape_mut(&mut self, index: usize) -> Option<&mut Tape> {
        self.tapes.get_mut(index)
    }

    pub fn tapes_mut(&mut self) -> &mut [Tape] {
        &mut self.tapes
    }

    /// Moves every tape to its next chunk. Returns whether any tape had one.
    pub fn next_data_chunks(&mut self) -> Result<bool> {
        let mut has_more = false;
        for tape in &mut self.tapes {
            has_more |= tape.next_data_chunk()?;
        }
        Ok(has_more)
    }

    pub fn rewind(&mut self) -> Result<()> {
        for tape in &mut self.tapes {
            tape.rewind()?;
        }
        self.current = 0;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        for tape in &mut self.tapes {
            tape.clear()?;
        }
        self.current = 0;
        Ok(())
    }

    pub fn free(&mut self) {
        self.tapes.clear();
        self.current = 0;
    }
}
