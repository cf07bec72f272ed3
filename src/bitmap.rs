//! The packed block-allocation bitmap.
//!
//! One bit per managed block, LSB-first within each byte, stored in the
//! image's bitmap region starting at byte 0.

use log::warn;

use crate::device::Device;
use crate::error::{FsError, Result};

/// Returns `true` if block `block` is marked used.
pub fn is_used(dev: &mut Device, bm: u64, block: u64) -> Result<bool> {
    let (byte_off, bit) = locate(bm, block);
    let byte = dev.read_at(byte_off, 1)?[0];
    Ok(byte & (1 << bit) != 0)
}

/// Marks block `block` used. Idempotent.
pub fn mark_used(dev: &mut Device, bm: u64, block: u64) -> Result<()> {
    let (byte_off, bit) = locate(bm, block);
    let byte = dev.read_at(byte_off, 1)?[0];
    dev.write_at(byte_off, &[byte | (1 << bit)])
}

/// Marks block `block` free. Idempotent.
pub fn mark_free(dev: &mut Device, bm: u64, block: u64) -> Result<()> {
    let (byte_off, bit) = locate(bm, block);
    let byte = dev.read_at(byte_off, 1)?[0];
    dev.write_at(byte_off, &[byte & !(1 << bit)])
}

/// Scans from `bm` upward through `nb - 1` and returns the first free block.
pub fn find_free(dev: &mut Device, bm: u64, nb: u64) -> Result<u64> {
    for block in bm..nb {
        if !is_used(dev, bm, block)? {
            return Ok(block);
        }
    }
    warn!("allocator exhausted: no free block in [{bm}, {nb})");
    Err(FsError::NoSpace)
}

/// Byte offset (from the start of the bitmap region) and bit index for `block`.
fn locate(bm: u64, block: u64) -> (u64, u32) {
    let rel = block - bm;
    (rel / 8, (rel % 8) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dev_with(len: usize) -> Device {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&vec![0u8; len]).unwrap();
        Device::open(f.path()).unwrap()
    }

    #[test]
    fn mark_and_query_round_trips() {
        let mut dev = dev_with(4096);
        let bm = 2;
        assert!(!is_used(&mut dev, bm, bm).unwrap());
        mark_used(&mut dev, bm, bm).unwrap();
        assert!(is_used(&mut dev, bm, bm).unwrap());
        mark_free(&mut dev, bm, bm).unwrap();
        assert!(!is_used(&mut dev, bm, bm).unwrap());
    }

    #[test]
    fn find_free_returns_lowest_free_block() {
        let mut dev = dev_with(4096);
        let bm = 2;
        mark_used(&mut dev, bm, bm).unwrap();
        mark_used(&mut dev, bm, bm + 1).unwrap();
        let free = find_free(&mut dev, bm, 10).unwrap();
        assert_eq!(free, bm + 2);
    }

    #[test]
    fn find_free_exhausted_reports_no_space() {
        let mut dev = dev_with(4096);
        let bm = 2;
        let nb = 5;
        for b in bm..nb {
            mark_used(&mut dev, bm, b).unwrap();
        }
        assert!(matches!(find_free(&mut dev, bm, nb), Err(FsError::NoSpace)));
    }
}
