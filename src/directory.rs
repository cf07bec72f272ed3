//! A directory's data, viewed as a packed array of fixed-size link records.
//!
//! Built entirely on top of [`crate::filedata`]: a directory is just a file
//! whose bytes happen to decode as `Link` records, so appending a record is
//! an ordinary grow-write and removing one is a shrink-truncate followed by
//! a rewrite of the compacted bytes.

use crate::device::{Device, BLOCK_SIZE};
use crate::error::Result;
use crate::filedata;
use crate::inode;

/// Maximum stored length of a link's name, NUL-padded (effective length `FNAME_LEN - 1`).
pub const FNAME_LEN: usize = 12;
/// On-disk size of one directory entry: the name field plus a 4-byte inode index.
pub const LINK_SIZE: usize = FNAME_LEN + 4;

/// One directory entry: a name paired with the inode block it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub inode: u32,
}

impl Link {
    fn to_bytes(&self) -> [u8; LINK_SIZE] {
        let mut buf = [0u8; LINK_SIZE];
        let name = self.name.as_bytes();
        buf[..name.len()].copy_from_slice(name);
        buf[FNAME_LEN..].copy_from_slice(&self.inode.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        let nul = buf[..FNAME_LEN].iter().position(|&b| b == 0).unwrap_or(FNAME_LEN);
        let name = String::from_utf8_lossy(&buf[..nul]).into_owned();
        let inode = u32::from_le_bytes(buf[FNAME_LEN..LINK_SIZE].try_into().unwrap());
        Self { name, inode }
    }
}

/// Appends a new `(name, target_block)` record to `dir_block`'s data.
///
/// Growing the underlying file (and allocating a fresh data block when the
/// append crosses a block boundary) is handled by `filedata::write`'s own
/// grow-on-demand logic; this layer only knows about the record encoding.
pub fn add_record(
    dev: &mut Device,
    bm: u64,
    nb: u64,
    dir_block: u64,
    name: &str,
    target_block: u32,
) -> Result<()> {
    let link = Link {
        name: name.to_string(),
        inode: target_block,
    };
    let inode = inode::load(dev, dir_block)?;
    let shift = inode.size as usize;
    filedata::write(dev, bm, nb, dir_block, &link.to_bytes(), shift)
}

/// Removes the first record whose inode field equals `target_block`.
///
/// Returns `false` if no such record exists. Compacts the tail left by one
/// record, then shrinks the file (freeing the data block if the removal
/// emptied it) and rewrites the compacted payload.
pub fn remove_record(dev: &mut Device, bm: u64, nb: u64, dir_block: u64, target_block: u32) -> Result<bool> {
    let inode = inode::load(dev, dir_block)?;
    let old_size = inode.size as usize;
    if old_size == 0 {
        return Ok(false);
    }
    let mut data = filedata::read(dev, dir_block, old_size, 0)?;
    let idx = match data
        .chunks(LINK_SIZE)
        .position(|chunk| Link::from_bytes(chunk).inode == target_block)
    {
        Some(i) => i,
        None => return Ok(false),
    };
    data.drain(idx * LINK_SIZE..(idx + 1) * LINK_SIZE);
    let new_size = old_size - LINK_SIZE;

    filedata::truncate(dev, bm, nb, dir_block, new_size as i64)?;
    filedata::write(dev, bm, nb, dir_block, &data, 0)?;
    Ok(true)
}

/// Returns every record of `dir_block` in stored (insertion) order.
pub fn list(dev: &mut Device, dir_block: u64) -> Result<Vec<Link>> {
    let inode = inode::load(dev, dir_block)?;
    let data = filedata::read(dev, dir_block, inode.size as usize, 0)?;
    Ok(data.chunks(LINK_SIZE).map(Link::from_bytes).collect())
}

/// Looks up `name` among `dir_block`'s records.
pub fn find(dev: &mut Device, dir_block: u64, name: &str) -> Result<Option<u32>> {
    Ok(list(dev, dir_block)?.into_iter().find(|l| l.name == name).map(|l| l.inode))
}

const _: () = assert!(LINK_SIZE <= BLOCK_SIZE);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap;
    use crate::device::Device;
    use crate::inode::{FileType, Inode};
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn dev_with(len: usize) -> Device {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&vec![0u8; len]).unwrap();
        Device::open(f.path()).unwrap()
    }

    fn new_dir(dev: &mut Device, bm: u64, block: u64) {
        inode::store(dev, block, &Inode::new(FileType::Directory)).unwrap();
        bitmap::mark_used(dev, bm, block).unwrap();
    }

    #[test]
    fn add_list_and_find_round_trip() {
        let mut dev = dev_with(1 << 16);
        let bm = 2;
        let nb = 120;
        new_dir(&mut dev, bm, bm);

        add_record(&mut dev, bm, nb, bm, ".", bm as u32).unwrap();
        add_record(&mut dev, bm, nb, bm, "..", bm as u32).unwrap();
        add_record(&mut dev, bm, nb, bm, "child", 9).unwrap();

        let links = list(&mut dev, bm).unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].name, ".");
        assert_eq!(links[1].name, "..");
        assert_eq!(links[2], Link { name: "child".into(), inode: 9 });

        assert_eq!(find(&mut dev, bm, "child").unwrap(), Some(9));
        assert_eq!(find(&mut dev, bm, "missing").unwrap(), None);
    }

    #[test]
    fn remove_compacts_and_frees_emptied_block() {
        let mut dev = dev_with(1 << 16);
        let bm = 2;
        let nb = 120;
        new_dir(&mut dev, bm, bm);

        // fill one block exactly (BLOCK_SIZE / LINK_SIZE = 32 records), then one more
        let per_block = BLOCK_SIZE / LINK_SIZE;
        for i in 0..per_block as u32 {
            add_record(&mut dev, bm, nb, bm, &format!("f{i}"), i + 10).unwrap();
        }
        add_record(&mut dev, bm, nb, bm, "last", 999).unwrap();

        let inode = inode::load(&mut dev, bm).unwrap();
        let second_block = inode.blocks[1].block().unwrap();
        assert!(bitmap::is_used(&mut dev, bm, second_block as u64).unwrap());

        assert!(remove_record(&mut dev, bm, nb, bm, 999).unwrap());
        assert!(!bitmap::is_used(&mut dev, bm, second_block as u64).unwrap());
        assert_eq!(find(&mut dev, bm, "last").unwrap(), None);
    }

    #[test]
    fn remove_missing_returns_false() {
        let mut dev = dev_with(1 << 16);
        let bm = 2;
        let nb = 120;
        new_dir(&mut dev, bm, bm);
        add_record(&mut dev, bm, nb, bm, "a", 5).unwrap();
        assert!(!remove_record(&mut dev, bm, nb, bm, 42).unwrap());
    }
}
