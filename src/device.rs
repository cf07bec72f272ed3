//! Positioned byte-level and block-granular I/O against the backing image.
//!
//! Seek-then-`read_exact`/`write_all` against a plain [`std::fs::File`];
//! the block sentinels (`0` invalid, `-1` a logical hole) are specific to
//! this format.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::error::{FsError, Result};

/// The fixed block size of the device image, in bytes.
pub const BLOCK_SIZE: usize = 512;

/// Positioned I/O over a single backing file.
pub struct Device {
    file: File,
    capacity: u64,
}

impl Device {
    /// Opens `path` for read/write and measures its length.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let capacity = file.metadata()?.len();
        debug!("opened device {} ({} bytes)", path.display(), capacity);
        Ok(Self { file, capacity })
    }

    /// The image's total length in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Reads `len` bytes starting at byte offset `offset`.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; len];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Writes `data` starting at byte offset `offset`.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Reads `len` bytes at `shift` within block `block`.
    ///
    /// `block == 0` is diagnostic corruption: it is never a valid target.
    /// `block == -1` is the "logical hole" sentinel and returns zeros
    /// without touching the device.
    pub fn read_block(&mut self, block: i64, len: usize, shift: usize) -> Result<Vec<u8>> {
        if block == 0 {
            log::warn!("attempt to read corrupted block reference (block = 0)");
            return Err(FsError::Corruption);
        }
        if block < 0 {
            return Ok(vec![0; len]);
        }
        self.read_at(block as u64 * BLOCK_SIZE as u64 + shift as u64, len)
    }

    /// Writes `data` at `shift` within block `block`. `block` must be a real,
    /// positive block index.
    pub fn write_block(&mut self, block: u64, data: &[u8], shift: usize) -> Result<()> {
        self.write_at(block * BLOCK_SIZE as u64 + shift as u64, data)
    }
}
