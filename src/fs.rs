//! The externally visible namespace verbs: thin orchestrators over the
//! bitmap, inode, file-data, directory, and path-resolution layers below.
//! `Filesystem` is the single value that owns everything mount/umount
//! bracket — no other state is global.

use std::collections::HashSet;
use std::path::Path;

use log::{info, warn};

use crate::bitmap;
use crate::device::{Device, BLOCK_SIZE};
use crate::directory::{self, FNAME_LEN};
use crate::error::{FsError, Result};
use crate::filedata;
use crate::inode::{self, FileType, Inode};
use crate::path;

fn ceil_div(a: u64, b: u64) -> u64 {
    a.div_ceil(b)
}

/// A snapshot of an inode's externally visible metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub file_type: FileType,
    pub size: u32,
    pub links: u32,
}

/// Process-wide filesystem state: backing device, derived sizes, open
/// descriptors, and the current working directory. Created by [`mount`] and
/// torn down by [`umount`].
pub struct Filesystem {
    device: Option<Device>,
    bm: u64,
    nb: u64,
    root: u32,
    open: HashSet<u32>,
    cwd: String,
}

impl Default for Filesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem {
    /// An unmounted filesystem handle. Every verb fails with `NotMounted`
    /// until [`Filesystem::mount`] succeeds.
    pub fn new() -> Self {
        Self {
            device: None,
            bm: 0,
            nb: 0,
            root: 0,
            open: HashSet::new(),
            cwd: "/".to_string(),
        }
    }

    fn device_mut(&mut self) -> Result<&mut Device> {
        self.device.as_mut().ok_or(FsError::NotMounted)
    }

    /// Opens the backing image at `path`, deriving block-count and
    /// bitmap-region sizes from its length. Bootstraps a fresh root
    /// directory if the image has never been mounted before.
    pub fn mount(&mut self, path: &Path) -> Result<bool> {
        let mut dev = Device::open(path)?;
        let capacity = dev.capacity();
        let bm = ceil_div(capacity, (BLOCK_SIZE as u64).pow(2) * 8);
        let nb = ceil_div(capacity, BLOCK_SIZE as u64);
        let root = bm as u32;

        let fresh = !bitmap::is_used(&mut dev, bm, bm)?;
        if fresh {
            bitmap::mark_used(&mut dev, bm, bm)?;
            inode::store(&mut dev, bm, &Inode::new(FileType::Directory))?;
            directory::add_record(&mut dev, bm, nb, bm, ".", root)?;
            directory::add_record(&mut dev, bm, nb, bm, "..", root)?;
            info!("mount {}: bootstrapped fresh root at block {root}", path.display());
        } else {
            info!("mount {}: attached to existing root at block {root}", path.display());
        }

        self.device = Some(dev);
        self.bm = bm;
        self.nb = nb;
        self.root = root;
        self.open.clear();
        self.cwd = "/".to_string();
        Ok(true)
    }

    /// Clears all in-memory state and closes the backing file. Idempotent.
    pub fn umount(&mut self) {
        self.device = None;
        self.open.clear();
        self.cwd = "/".to_string();
        info!("umount");
    }

    fn to_absolute(&self, path: &str) -> String {
        let mut p = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}{}", self.cwd, path)
        };
        if !p.ends_with('/') {
            p.push('/');
        }
        p
    }

    fn resolve(&mut self, raw_path: &str) -> Result<path::Resolved> {
        let absolute = self.to_absolute(raw_path);
        let root = self.root;
        let dev = self.device_mut()?;
        path::resolve(dev, root, &absolute)
    }

    /// Creates a new inode of the given type, named `path`. `link_target`
    /// supplies the symlink payload when `file_type` is `Symlink`.
    pub fn create(&mut self, raw_path: &str, file_type: FileType, link_target: Option<&str>) -> Result<u32> {
        let result = self.create_inner(raw_path, file_type, link_target);
        log_outcome("create", raw_path, &result);
        result
    }

    fn create_inner(&mut self, raw_path: &str, file_type: FileType, link_target: Option<&str>) -> Result<u32> {
        let absolute = self.to_absolute(raw_path);
        let name = path::last_component(&absolute).ok_or(FsError::BadPath)?;
        if name.as_bytes().len() > FNAME_LEN - 1 {
            return Err(FsError::NameTooLong);
        }

        let root = self.root;
        let dev = self.device_mut()?;
        let resolved = path::resolve(dev, root, &absolute)?;
        if resolved.inode.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let parent = resolved.parent.ok_or(FsError::BadPath)?;

        let bm = self.bm;
        let nb = self.nb;
        let dev = self.device_mut()?;
        let block = bitmap::find_free(dev, bm, nb)?;
        bitmap::mark_used(dev, bm, block)?;
        directory::add_record(dev, bm, nb, parent as u64, &name, block as u32)?;
        inode::store(dev, block, &Inode::new(file_type))?;

        match file_type {
            FileType::Directory => {
                directory::add_record(dev, bm, nb, block, ".", block as u32)?;
                directory::add_record(dev, bm, nb, block, "..", parent)?;
            }
            FileType::Symlink => {
                let target = link_target.ok_or(FsError::BadPath)?;
                let mut payload = target.as_bytes().to_vec();
                payload.push(0);
                filedata::write(dev, bm, nb, block, &payload, 0)?;
            }
            FileType::Regular => {}
        }

        Ok(block as u32)
    }

    /// Reads `size` bytes at `shift` from `inode`'s logical data.
    pub fn read(&mut self, inode: u32, size: usize, shift: usize) -> Result<Vec<u8>> {
        let dev = self.device_mut()?;
        filedata::read(dev, inode as u64, size, shift)
    }

    /// Writes `data` at `shift` into `inode`'s logical data, growing it first if needed.
    pub fn write(&mut self, inode: u32, data: &[u8], shift: usize) -> Result<()> {
        let bm = self.bm;
        let nb = self.nb;
        let dev = self.device_mut()?;
        let result = filedata::write(dev, bm, nb, inode as u64, data, shift);
        log_outcome("write", &format!("inode {inode}"), &result);
        result
    }

    /// Resizes `inode`'s logical data to `new_size`.
    pub fn truncate(&mut self, inode: u32, new_size: i64) -> Result<()> {
        let bm = self.bm;
        let nb = self.nb;
        let dev = self.device_mut()?;
        let result = filedata::truncate(dev, bm, nb, inode as u64, new_size);
        log_outcome("truncate", &format!("inode {inode}"), &result);
        result
    }

    /// Resolves `path` and truncates the inode it names.
    pub fn truncate_path(&mut self, raw_path: &str, new_size: i64) -> Result<()> {
        let resolved = self.resolve(raw_path)?;
        let inode = resolved.inode.ok_or(FsError::NotFound)?;
        self.truncate(inode, new_size)
    }

    /// Resolves `name`, requires a regular file, and registers it as open.
    pub fn open(&mut self, name: &str) -> Result<u32> {
        let resolved = self.resolve(name)?;
        let block = resolved.inode.ok_or(FsError::NotFound)?;
        let dev = self.device_mut()?;
        let obj = inode::load(dev, block as u64)?;
        if obj.file_type != FileType::Regular {
            return Err(FsError::NotFile);
        }
        if block > 0 {
            self.open.insert(block);
        }
        Ok(block)
    }

    /// Removes `inode` from the open-descriptor set. Idempotent.
    pub fn close(&mut self, inode: u32) {
        self.open.remove(&inode);
    }

    /// Adds a new name for an existing inode, in `new_name`'s parent directory.
    pub fn link(&mut self, existing: &str, new_name: &str) -> Result<()> {
        let result = self.link_inner(existing, new_name);
        log_outcome("link", new_name, &result);
        result
    }

    fn link_inner(&mut self, existing: &str, new_name: &str) -> Result<()> {
        let existing_resolved = self.resolve(existing)?;
        let existing_inode = existing_resolved.inode.ok_or(FsError::NotFound)?;

        let absolute_new = self.to_absolute(new_name);
        let name = path::last_component(&absolute_new).ok_or(FsError::BadPath)?;
        if name.as_bytes().len() > FNAME_LEN - 1 {
            return Err(FsError::NameTooLong);
        }
        let new_resolved = self.resolve(new_name)?;
        if new_resolved.inode.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let parent = new_resolved.parent.ok_or(FsError::BadPath)?;

        let bm = self.bm;
        let nb = self.nb;
        let dev = self.device_mut()?;
        directory::add_record(dev, bm, nb, parent as u64, &name, existing_inode)?;
        let mut obj = inode::load(dev, existing_inode as u64)?;
        obj.links += 1;
        inode::store(dev, existing_inode as u64, &obj)
    }

    /// Removes `name`'s directory entry, freeing the inode once its link
    /// count reaches zero. Fails if the inode is open.
    pub fn unlink(&mut self, raw_path: &str) -> Result<()> {
        let result = self.unlink_inner(raw_path);
        log_outcome("unlink", raw_path, &result);
        result
    }

    fn unlink_inner(&mut self, raw_path: &str) -> Result<()> {
        let resolved = self.resolve(raw_path)?;
        let target = resolved.inode.ok_or(FsError::NotFound)?;
        if self.open.contains(&target) {
            return Err(FsError::Busy);
        }
        let parent = resolved.parent.ok_or(FsError::BadPath)?;

        let bm = self.bm;
        let nb = self.nb;
        let dev = self.device_mut()?;
        let mut obj = inode::load(dev, target as u64)?;
        if obj.links > 1 {
            directory::remove_record(dev, bm, nb, parent as u64, target)?;
            obj.links -= 1;
            inode::store(dev, target as u64, &obj)
        } else {
            filedata::truncate(dev, bm, nb, target as u64, 0)?;
            directory::remove_record(dev, bm, nb, parent as u64, target)?;
            bitmap::mark_free(dev, bm, target as u64)
        }
    }

    /// `create(path, Directory, None)`.
    pub fn mkdir(&mut self, raw_path: &str) -> Result<u32> {
        self.create(raw_path, FileType::Directory, None)
    }

    /// Resolves `path`, requires an empty directory, and delegates to `unlink`.
    pub fn rmdir(&mut self, raw_path: &str) -> Result<()> {
        let result = self.rmdir_inner(raw_path);
        log_outcome("rmdir", raw_path, &result);
        result
    }

    fn rmdir_inner(&mut self, raw_path: &str) -> Result<()> {
        let resolved = self.resolve(raw_path)?;
        let target = resolved.inode.ok_or(FsError::NotFound)?;
        let dev = self.device_mut()?;
        let obj = inode::load(dev, target as u64)?;
        if obj.file_type != FileType::Directory {
            return Err(FsError::NotDirectory);
        }
        if obj.size as usize > 2 * directory::LINK_SIZE {
            return Err(FsError::DirNotEmpty);
        }
        self.unlink_inner(raw_path)
    }

    /// `create(name, Symlink, Some(target))`.
    pub fn symlink(&mut self, target: &str, name: &str) -> Result<u32> {
        self.create(name, FileType::Symlink, Some(target))
    }

    /// Lists `path`'s entries in stored order (defaults to the working directory).
    pub fn ls(&mut self, raw_path: Option<&str>) -> Result<Vec<(String, u32)>> {
        let resolved = self.resolve(raw_path.unwrap_or("."))?;
        let block = resolved.inode.ok_or(FsError::NotFound)?;
        let dev = self.device_mut()?;
        let obj = inode::load(dev, block as u64)?;
        if obj.file_type != FileType::Directory {
            return Err(FsError::NotDirectory);
        }
        Ok(directory::list(dev, block as u64)?
            .into_iter()
            .map(|l| (l.name, l.inode))
            .collect())
    }

    /// Resolves `path`, requires a directory, and updates the working directory.
    pub fn cd(&mut self, raw_path: &str) -> Result<()> {
        let resolved = self.resolve(raw_path)?;
        let block = resolved.inode.ok_or(FsError::NotFound)?;
        let dev = self.device_mut()?;
        let obj = inode::load(dev, block as u64)?;
        if obj.file_type != FileType::Directory {
            return Err(FsError::NotDirectory);
        }
        let absolute_canonical = format!("/{}", resolved.canonical);
        let tokens = path::tokenize(&absolute_canonical);
        self.cwd = path::format_path(&path::simplify(&tokens));
        Ok(())
    }

    /// The current working directory, `/`-terminated.
    pub fn pwd(&mut self) -> Result<String> {
        self.device_mut()?;
        Ok(self.cwd.clone())
    }

    /// Reports `inode`'s type, size, and link count. `BadId` if the inode
    /// is not live (consulting the bitmap, not a size heuristic).
    pub fn filestat(&mut self, inode: u32) -> Result<Stat> {
        let bm = self.bm;
        let root = self.root;
        let dev = self.device_mut()?;
        let live = inode == root || bitmap::is_used(dev, bm, inode as u64)?;
        if !live {
            return Err(FsError::BadId);
        }
        let obj = inode::load(dev, inode as u64)?;
        Ok(Stat {
            file_type: obj.file_type,
            size: obj.size,
            links: obj.links,
        })
    }
}

fn log_outcome<T>(verb: &str, detail: &str, result: &Result<T>) {
    match result {
        Ok(_) => info!("{verb} {detail}: ok"),
        Err(e) => warn!("{verb} {detail}: {e}"),
    }
}
