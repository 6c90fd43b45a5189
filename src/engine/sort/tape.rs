// Copyright © 2024 Pathway

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::mem::take;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::engine::error::{Error, Result};
use crate::engine::record::Record;

const LENGTH_PREFIX: u64 = size_of::<u32>() as u64;

#[derive(Debug, Clone, Copy)]
struct DataChunk {
    offset: u64,
    records: u64,
}

/// Append-only file of serialized records, split into chunks.
///
/// Each record is stored as a little-endian `u32` length followed by its
/// bytes. Writing and reading go through separate file handles, so the two
/// cursors move independently. The file is removed when the tape is dropped.
pub struct Tape {
    index: usize,
    file: NamedTempFile,
    writer: BufWriter<File>,
    reader: BufReader<File>,
    sync: bool,
    chunks: Vec<DataChunk>,
    chunk_open: bool,
    write_offset: u64,
    read_chunk: usize,
    remaining_in_chunk: u64,
    scratch: Vec<u8>,
}

impl Tape {
    pub fn new(index: usize, directory: &Path, sync: bool) -> Result<Self> {
        let file = NamedTempFile::with_prefix_in("tape-", directory)?;
        let writer = BufWriter::new(file.reopen()?);
        let reader = BufReader::new(file.reopen()?);
        Ok(Self {
            index,
            file,
            writer,
            reader,
            sync,
            chunks: Vec::new(),
            chunk_open: false,
            write_offset: 0,
            read_chunk: 0,
            remaining_in_chunk: 0,
            scratch: Vec::new(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Starts a new chunk; subsequent writes go there.
    pub fn add_data_chunk(&mut self) {
        self.chunks.push(DataChunk {
            offset: self.write_offset,
            records: 0,
        });
        self.chunk_open = true;
    }

    pub fn put(&mut self, data: &[u8]) -> Result<()> {
        let chunk = match self.chunks.last_mut() {
            Some(chunk) if self.chunk_open => chunk,
            _ => return Err(Error::NoOpenChunk(self.index)),
        };
        let len = u32::try_from(data.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record too large for a tape"))?;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(data)?;
        self.write_offset += LENGTH_PREFIX + u64::from(len);
        chunk.records += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        if self.sync {
            self.writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    /// Reads the next record of the current chunk; `false` at chunk end.
    pub fn get_raw(&mut self, buffer: &mut Vec<u8>) -> Result<bool> {
        if self.remaining_in_chunk == 0 {
            return Ok(false);
        }
        let mut len = [0; LENGTH_PREFIX as usize];
        self.reader.read_exact(&mut len)?;
        buffer.resize(u32::from_le_bytes(len) as usize, 0);
        self.reader.read_exact(buffer)?;
        self.remaining_in_chunk -= 1;
        Ok(true)
    }

    pub fn get(&mut self, record: &mut Record) -> Result<bool> {
        let mut buffer = take(&mut self.scratch);
        let result = self.get_raw(&mut buffer);
        if let Ok(true) = result {
            record.deserialize(&buffer)?;
        }
        self.scratch = buffer;
        result
    }

    /// Moves the read cursor to the next chunk; `false` if there is none.
    pub fn next_data_chunk(&mut self) -> Result<bool> {
        if self.read_chunk + 1 < self.chunks.len() {
            self.read_chunk += 1;
            self.seek_to_chunk()?;
            Ok(true)
        } else {
            self.read_chunk = self.chunks.len();
            self.remaining_in_chunk = 0;
            Ok(false)
        }
    }

    /// Flushes pending writes and moves the read cursor to the first chunk.
    pub fn rewind(&mut self) -> Result<()> {
        self.flush()?;
        self.chunk_open = false;
        self.read_chunk = 0;
        self.seek_to_chunk()
    }

    /// Drops all data, keeping the file.
    pub fn clear(&mut self) -> Result<()> {
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.get_ref().set_len(0)?;
        self.reader.seek(SeekFrom::Start(0))?;
        self.chunks.clear();
        self.chunk_open = false;
        self.write_offset = 0;
        self.read_chunk = 0;
        self.remaining_in_chunk = 0;
        Ok(())
    }

    fn seek_to_chunk(&mut self) -> Result<()> {
        match self.chunks.get(self.read_chunk) {
            Some(chunk) => {
                self.reader.seek(SeekFrom::Start(chunk.offset))?;
                self.remaining_in_chunk = chunk.records;
            }
            None => self.remaining_in_chunk = 0,
        }
        Ok(())
    }
}

impl fmt::Debug for Tape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tape")
            .field("index", &self.index)
            .field("path", &self.file.path())
            .field("chunks", &self.chunks)
            .field("write_offset", &self.write_offset)
            .finish_non_exhaustive()
    }
}
