// Copyright © 2024 Pathway

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::debug;
use tempfile::NamedTempFile;

use crate::engine::error::Result;
use crate::fs_helpers::spill_directory;

const LENGTH_PREFIX: usize = size_of::<u32>();

struct SpillFile {
    file: NamedTempFile,
    writer: BufWriter<File>,
    reader: BufReader<File>,
    dirty: bool,
}

impl SpillFile {
    fn create(directories: &[PathBuf]) -> Result<Self> {
        let file = NamedTempFile::with_prefix_in("run-", spill_directory(directories, 0)?)?;
        let writer = BufWriter::new(file.reopen()?);
        let reader = BufReader::new(file.reopen()?);
        debug!("run buffer spills to {}", file.path().display());
        Ok(Self {
            file,
            writer,
            reader,
            dirty: false,
        })
    }
}

/// Holds the records of one key group so that they can be replayed.
///
/// Records stay in memory until `memory_limit` bytes are used, the rest go
/// to a temporary file created on first need. Replay order is push order.
pub struct RunBuffer {
    memory: Vec<u8>,
    memory_limit: usize,
    directories: Vec<PathBuf>,
    spill: Option<SpillFile>,
    len: usize,
    memory_records: usize,
    read_offset: usize,
    read_count: usize,
}

impl RunBuffer {
    pub fn new(memory_limit: usize, directories: Vec<PathBuf>) -> Self {
        Self {
            memory: Vec::new(),
            memory_limit,
            directories,
            spill: None,
            len: 0,
            memory_records: 0,
            read_offset: 0,
            read_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether some records of the current run live in the file.
    pub fn is_spilled(&self) -> bool {
        self.len > self.memory_records
    }

    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record too large for a run buffer"))?;
        if !self.is_spilled() && self.memory.len() + LENGTH_PREFIX + data.len() <= self.memory_limit {
            self.memory.extend_from_slice(&len.to_le_bytes());
            self.memory.extend_from_slice(data);
            self.memory_records += 1;
        } else {
            let spill = match self.spill.take() {
                Some(spill) => spill,
                None => SpillFile::create(&self.directories)?,
            };
            let spill = self.spill.insert(spill);
            spill.writer.write_all(&len.to_le_bytes())?;
            spill.writer.write_all(data)?;
            spill.dirty = true;
        }
        self.len += 1;
        Ok(())
    }

    /// Takes the next record in push order; `false` when all were read.
    pub fn shift(&mut self, buffer: &mut Vec<u8>) -> Result<bool> {
        if self.read_count == self.len {
            return Ok(false);
        }
        if self.read_offset < self.memory.len() {
            let start = self.read_offset + LENGTH_PREFIX;
            let mut prefix = [0; LENGTH_PREFIX];
            prefix.copy_from_slice(&self.memory[self.read_offset..start]);
            let end = start + u32::from_le_bytes(prefix) as usize;
            buffer.clear();
            buffer.extend_from_slice(&self.memory[start..end]);
            self.read_offset = end;
        } else if let Some(spill) = &mut self.spill {
            if spill.dirty {
                spill.writer.flush()?;
                spill.dirty = false;
            }
            let mut prefix = [0; LENGTH_PREFIX];
            spill.reader.read_exact(&mut prefix)?;
            buffer.resize(u32::from_le_bytes(prefix) as usize, 0);
            spill.reader.read_exact(buffer)?;
        } else {
            return Ok(false);
        }
        self.read_count += 1;
        Ok(true)
    }

    /// Starts the replay over from the first record.
    pub fn rewind(&mut self) -> Result<()> {
        self.read_offset = 0;
        self.read_count = 0;
        if let Some(spill) = &mut self.spill {
            spill.writer.flush()?;
            spill.dirty = false;
            spill.reader.seek(SeekFrom::Start(0))?;
        }
        Ok(())
    }

    /// Forgets all records. A spill file is kept for reuse.
    pub fn clear(&mut self) -> Result<()> {
        self.memory.clear();
        self.memory_records = 0;
        self.len = 0;
        self.read_offset = 0;
        self.read_count = 0;
        if let Some(spill) = &mut self.spill {
            spill.writer.seek(SeekFrom::Start(0))?;
            spill.writer.get_ref().set_len(0)?;
            spill.reader.seek(SeekFrom::Start(0))?;
            spill.dirty = false;
        }
        Ok(())
    }
}

impl fmt::Debug for RunBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunBuffer")
            .field("len", &self.len)
            .field("memory_records", &self.memory_records)
            .field("memory_bytes", &self.memory.len())
            .field("spill_file", &self.spill.as_ref().map(|spill| spill.file.path()))
            .finish_non_exhaustive()
    }
}
