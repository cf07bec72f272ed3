//! The inode format: type, link count, logical size, and a direct-block
//! table, serialized explicitly by packing/unpacking each field rather
//! than reinterpreting an in-memory struct, so on-disk layout never
//! depends on how the compiler happens to lay the struct out in memory.

use crate::device::{Device, BLOCK_SIZE};
use crate::error::{FsError, Result};

/// Number of direct block pointers an inode carries.
pub const BPI: usize = (BLOCK_SIZE - 1 - 8) / 4;

/// The kind of filesystem object an inode describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular = 0,
    Directory = 1,
    Symlink = 2,
}

impl FileType {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(FileType::Regular),
            1 => Ok(FileType::Directory),
            2 => Ok(FileType::Symlink),
            _ => Err(FsError::Corruption),
        }
    }
}

/// One entry of an inode's direct-block table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSlot {
    /// Slot beyond the inode's current block count; unused.
    Empty,
    /// A logical hole within the inode's size: reads as zeros, not yet
    /// backed by a data block.
    Hole,
    /// A real data block index.
    Bound(u32),
}

impl BlockSlot {
    fn to_raw(self) -> i32 {
        match self {
            BlockSlot::Empty => 0,
            BlockSlot::Hole => -1,
            BlockSlot::Bound(b) => b as i32,
        }
    }

    fn from_raw(v: i32) -> Self {
        match v {
            0 => BlockSlot::Empty,
            -1 => BlockSlot::Hole,
            b if b > 0 => BlockSlot::Bound(b as u32),
            _ => BlockSlot::Empty,
        }
    }

    /// The block index, if this slot is bound to one.
    pub fn block(self) -> Option<u32> {
        match self {
            BlockSlot::Bound(b) => Some(b),
            _ => None,
        }
    }
}

/// A single on-disk inode record.
#[derive(Debug, Clone)]
pub struct Inode {
    pub file_type: FileType,
    pub links: u32,
    pub size: u32,
    pub blocks: [BlockSlot; BPI],
}

impl Inode {
    /// A fresh, empty inode of the given type with one link.
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            links: 1,
            size: 0,
            blocks: [BlockSlot::Empty; BPI],
        }
    }

    /// Number of direct-block slots touched by the inode's current size.
    pub fn blocks_in_use(&self) -> usize {
        (self.size as usize).div_ceil(BLOCK_SIZE)
    }

    fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0] = self.file_type as u8;
        buf[1..5].copy_from_slice(&self.links.to_le_bytes());
        buf[5..9].copy_from_slice(&self.size.to_le_bytes());
        for (i, slot) in self.blocks.iter().enumerate() {
            let off = 9 + i * 4;
            buf[off..off + 4].copy_from_slice(&slot.to_raw().to_le_bytes());
        }
        buf
    }

    fn from_bytes(buf: &[u8]) -> Result<Self> {
        let file_type = FileType::from_byte(buf[0])?;
        let links = u32::from_le_bytes(buf[1..5].try_into().unwrap());
        let size = u32::from_le_bytes(buf[5..9].try_into().unwrap());
        let mut blocks = [BlockSlot::Empty; BPI];
        for (i, slot) in blocks.iter_mut().enumerate() {
            let off = 9 + i * 4;
            let raw = i32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
            *slot = BlockSlot::from_raw(raw);
        }
        Ok(Self {
            file_type,
            links,
            size,
            blocks,
        })
    }
}

/// Reads the inode stored at block `block`.
pub fn load(dev: &mut Device, block: u64) -> Result<Inode> {
    let buf = dev.read_at(block * BLOCK_SIZE as u64, BLOCK_SIZE)?;
    Inode::from_bytes(&buf)
}

/// Writes `inode` to block `block`.
pub fn store(dev: &mut Device, block: u64, inode: &Inode) -> Result<()> {
    dev.write_at(block * BLOCK_SIZE as u64, &inode.to_bytes())
}
