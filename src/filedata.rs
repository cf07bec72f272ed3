//! Maps a logical byte range of a file onto an inode's direct-block table,
//! extending the table through the allocator as needed. This is the layer
//! every other mutation (directories included) is built on.

use log::debug;

use crate::bitmap;
use crate::device::{Device, BLOCK_SIZE};
use crate::error::{FsError, Result};
use crate::inode::{self, BlockSlot, Inode, BPI};

/// Largest logical size an inode can describe.
pub const MAX_FILE_SIZE: usize = BPI * BLOCK_SIZE;

fn blocks_for(size: usize) -> usize {
    size.div_ceil(BLOCK_SIZE)
}

fn slot_raw(slot: BlockSlot) -> i64 {
    match slot {
        BlockSlot::Empty => 0,
        BlockSlot::Hole => -1,
        BlockSlot::Bound(b) => b as i64,
    }
}

/// Reads `size` bytes starting at `shift` from the inode's logical data.
pub fn read(dev: &mut Device, inode_block: u64, size: usize, shift: usize) -> Result<Vec<u8>> {
    if size > MAX_FILE_SIZE {
        return Err(FsError::OutOfRange);
    }
    let inode = inode::load(dev, inode_block)?;
    if shift + size > inode.size as usize {
        return Err(FsError::OutOfRange);
    }

    let mut out = Vec::with_capacity(size);
    let mut pos = shift;
    let mut remaining = size;
    while remaining > 0 {
        let idx = pos / BLOCK_SIZE;
        let block_shift = pos % BLOCK_SIZE;
        let take = remaining.min(BLOCK_SIZE - block_shift);
        let chunk = dev.read_block(slot_raw(inode.blocks[idx]), take, block_shift)?;
        out.extend_from_slice(&chunk);
        pos += take;
        remaining -= take;
    }
    Ok(out)
}

/// Writes `data` at `shift`, growing the inode first if necessary.
pub fn write(dev: &mut Device, bm: u64, nb: u64, inode_block: u64, data: &[u8], shift: usize) -> Result<()> {
    let size = data.len();
    if size == 0 {
        return Ok(());
    }
    if size > MAX_FILE_SIZE {
        return Err(FsError::SizeTooBig);
    }

    let mut inode = inode::load(dev, inode_block)?;
    if shift + size > inode.size as usize {
        truncate(dev, bm, nb, inode_block, (shift + size) as i64)?;
        inode = inode::load(dev, inode_block)?;
    }

    let first_idx = shift / BLOCK_SIZE;
    let last_idx = (shift + size - 1) / BLOCK_SIZE;
    let mut newly_allocated = Vec::new();
    for idx in first_idx..=last_idx {
        if matches!(inode.blocks[idx], BlockSlot::Hole) {
            match bitmap::find_free(dev, bm, nb) {
                Ok(block) => {
                    bitmap::mark_used(dev, bm, block)?;
                    inode.blocks[idx] = BlockSlot::Bound(block as u32);
                    newly_allocated.push(block);
                }
                Err(e) => {
                    for block in newly_allocated {
                        bitmap::mark_free(dev, bm, block)?;
                    }
                    return Err(e);
                }
            }
        }
    }

    let mut pos = shift;
    let mut written = 0;
    while written < size {
        let idx = pos / BLOCK_SIZE;
        let block_shift = pos % BLOCK_SIZE;
        let take = (size - written).min(BLOCK_SIZE - block_shift);
        let block = inode.blocks[idx].block().ok_or(FsError::Corruption)?;
        dev.write_block(block as u64, &data[written..written + take], block_shift)?;
        pos += take;
        written += take;
    }

    inode::store(dev, inode_block, &inode)?;
    Ok(())
}

/// Resizes the inode's logical data to `new_size`, freeing or holing out
/// blocks as needed.
pub fn truncate(dev: &mut Device, bm: u64, _nb: u64, inode_block: u64, new_size: i64) -> Result<()> {
    if new_size < 0 {
        return Err(FsError::NegativeSize);
    }
    if new_size as usize > MAX_FILE_SIZE {
        return Err(FsError::SizeTooBig);
    }
    let new_size = new_size as u32;

    let mut inode = inode::load(dev, inode_block)?;
    let old_blocks = blocks_for(inode.size as usize);
    let new_blocks = blocks_for(new_size as usize);

    if new_size > inode.size {
        if inode.size > 0 {
            let last_idx = (inode.size as usize - 1) / BLOCK_SIZE;
            if let Some(block) = inode.blocks[last_idx].block() {
                let tail_start = inode.size as usize - last_idx * BLOCK_SIZE;
                dev.write_block(block as u64, &vec![0u8; BLOCK_SIZE - tail_start], tail_start)?;
            }
        }
        let start = if inode.size > 0 { old_blocks } else { 0 };
        for slot in inode.blocks.iter_mut().take(new_blocks).skip(start) {
            *slot = BlockSlot::Hole;
        }
    } else if new_size < inode.size {
        for slot in inode.blocks.iter_mut().take(old_blocks).skip(new_blocks) {
            if let Some(block) = slot.block() {
                bitmap::mark_free(dev, bm, block as u64)?;
            }
            *slot = BlockSlot::Empty;
        }
    }

    inode.size = new_size;
    inode::store(dev, inode_block, &inode)?;
    debug!("truncate inode {inode_block} to {new_size} bytes");
    Ok(())
}
