//! The error model shared by every layer of the filesystem.
//!
//! Every verb boundary returns one of these variants instead of printing a
//! message and carrying on; nothing here is caught and hidden by a lower
//! layer.

use std::io;

/// Behavioral error kinds surfaced by the filesystem.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("object already exists")]
    AlreadyExists,
    #[error("no such file or directory")]
    NotFound,
    #[error("bad path")]
    BadPath,
    #[error("not a directory")]
    NotDirectory,
    #[error("not a file")]
    NotFile,
    #[error("name too long")]
    NameTooLong,
    #[error("no space left on device")]
    NoSpace,
    #[error("size too big")]
    SizeTooBig,
    #[error("negative size is not allowed")]
    NegativeSize,
    #[error("directory is not empty")]
    DirNotEmpty,
    #[error("file is open, close it first")]
    Busy,
    #[error("incorrect id")]
    BadId,
    #[error("byte range out of bounds")]
    OutOfRange,
    #[error("corrupted block reference")]
    Corruption,
    #[error("filesystem is not mounted")]
    NotMounted,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;
