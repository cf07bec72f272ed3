//! A miniature UNIX-style filesystem stored inside a single fixed-size
//! backing file: block-addressed storage, a bitmap allocator, on-disk
//! inodes with direct-block file data, directories encoded as link-record
//! arrays, and a path resolver that expands symlinks mid-walk.
//!
//! The REPL and the image formatter are external collaborators (see the
//! `nanofs-shell` and `nanofs-mkfs` binaries); this crate only implements
//! the verb surface they drive.

pub mod bitmap;
pub mod device;
pub mod directory;
pub mod error;
pub mod filedata;
pub mod fs;
pub mod inode;
pub mod path;

pub use device::BLOCK_SIZE;
pub use directory::{Link, FNAME_LEN};
pub use error::{FsError, Result};
pub use fs::{Filesystem, Stat};
pub use inode::{BlockSlot, FileType, BPI};
