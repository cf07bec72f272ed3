//! Splits an absolute path into tokens, walks directories, and dereferences
//! symlink inodes mid-walk. Expressed as an explicit token-queue state
//! machine (rather than recursion) so the cycle-budget cap is easy to
//! enforce.

use std::collections::VecDeque;

use crate::device::Device;
use crate::directory;
use crate::error::{FsError, Result};
use crate::inode::{self, FileType};

/// Outcome of resolving a path: the target inode (if it exists), its
/// parent directory (if resolvable), and the canonical traversal path.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub inode: Option<u32>,
    pub parent: Option<u32>,
    pub canonical: String,
}

/// Splits `path` on `/`. A leading slash becomes a literal `"/"` token;
/// empty tokens from repeated or trailing slashes are dropped.
pub fn tokenize(path: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    if path.starts_with('/') {
        tokens.push("/".to_string());
    }
    for part in path.split('/') {
        if !part.is_empty() {
            tokens.push(part.to_string());
        }
    }
    tokens
}

/// Folds `..` (popping the previous non-root segment) and drops `.`.
pub fn simplify(tokens: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for t in tokens {
        match t.as_str() {
            "/" => {
                out.clear();
                out.push("/".to_string());
            }
            "." => {}
            ".." => {
                if out.len() > 1 {
                    out.pop();
                }
            }
            other => out.push(other.to_string()),
        }
    }
    out
}

/// Renders a simplified token list back into a `/`-terminated path string.
pub fn format_path(tokens: &[String]) -> String {
    let mut s = String::new();
    for t in tokens {
        if t == "/" {
            s.push('/');
        } else {
            s.push_str(t);
            s.push('/');
        }
    }
    if s.is_empty() {
        s.push('/');
    }
    s
}

/// The last non-root token of an absolute path, i.e. the name a `create`
/// or `link` call would bind. `None` for the root path itself.
pub fn last_component(path: &str) -> Option<String> {
    let tokens = tokenize(path);
    match tokens.last() {
        Some(last) if last != "/" => Some(last.clone()),
        _ => None,
    }
}

fn read_symlink_target(dev: &mut Device, inode_block: u32, size: u32) -> Result<String> {
    let bytes = crate::filedata::read(dev, inode_block as u64, size as usize, 0)?;
    let nul = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..nul]).into_owned())
}

/// Resolves an absolute, `/`-terminated path against `root`.
pub fn resolve(dev: &mut Device, root: u32, path: &str) -> Result<Resolved> {
    let tokens = tokenize(path);
    let mut traversal: VecDeque<String> = tokens.into_iter().skip(1).collect();
    let initial_len = traversal.len();
    let cap = (16 * initial_len).max(256);

    let mut current = Some(root);
    let mut parent: Option<u32> = None;
    let mut canonical = String::new();
    let mut consumed = 0usize;

    while let Some(name) = traversal.pop_front() {
        consumed += 1;
        if consumed > cap {
            return Err(FsError::BadPath);
        }
        canonical.push_str(&name);
        canonical.push('/');

        // Invariant: `current` is only `None` after the loop has already
        // broken out below, so this unwrap never fires mid-traversal.
        let dir_block = current.expect("current is Some while traversal continues");

        let entry_inode = match directory::find(dev, dir_block as u64, &name)? {
            Some(inode) => inode,
            None => {
                parent = Some(dir_block);
                current = None;
                break;
            }
        };

        let prev_current = current;
        let prev_parent = parent;
        parent = Some(dir_block);
        current = Some(entry_inode);

        let entry = inode::load(dev, entry_inode as u64)?;
        if entry.file_type == FileType::Symlink {
            let target = read_symlink_target(dev, entry_inode, entry.size)?;
            let mut sym_tokens: VecDeque<String> = tokenize(&target).into();
            if sym_tokens.front().map(String::as_str) == Some("/") {
                sym_tokens.pop_front();
                current = Some(root);
                parent = None;
            } else {
                current = prev_current;
                parent = prev_parent;
            }
            for t in sym_tokens.into_iter().rev() {
                traversal.push_front(t);
            }
            // recompute the cap's remaining budget is implicit: `consumed`
            // already accounts for this step, expansion is bounded by `cap`.
        }
    }

    Ok(Resolved {
        inode: current,
        parent,
        canonical,
    })
}
