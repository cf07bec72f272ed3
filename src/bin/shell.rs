//! `nanofs-shell` is a line-oriented REPL over the namespace verbs: it
//! parses a command line, calls into [`nanofs::Filesystem`], and prints the
//! result or a human-readable error. None of its dispatch, prompt, or exit
//! code decisions are part of the filesystem's specified contract.

use std::env;
use std::io::{self, BufRead, Write};
use std::process::exit;

use nanofs::{FileType, Filesystem, FsError};

fn print_usage(bin: &str) {
    eprintln!("Usage: {bin} <image>");
}

fn file_type_char(t: FileType) -> char {
    match t {
        FileType::Regular => '-',
        FileType::Directory => 'd',
        FileType::Symlink => 'l',
    }
}

/// Dispatches one already-tokenized command line. Returns `Ok(true)` to
/// keep looping, `Ok(false)` on `exit`/`quit`.
fn dispatch(fs: &mut Filesystem, parts: &[&str]) -> Result<bool, FsError> {
    match parts {
        [] => {}

        ["exit"] | ["quit"] => return Ok(false),

        ["pwd"] => println!("{}", fs.pwd()?),

        ["ls"] => print_ls(fs, None)?,
        ["ls", path] => print_ls(fs, Some(path))?,

        ["cd", path] => fs.cd(path)?,

        ["mkdir", path] => {
            fs.mkdir(path)?;
        }

        ["rmdir", path] => fs.rmdir(path)?,

        ["create", path] => {
            fs.create(path, FileType::Regular, None)?;
        }

        ["symlink", target, name] => {
            fs.symlink(target, name)?;
        }

        ["link", existing, new_name] => fs.link(existing, new_name)?,

        ["unlink", path] => fs.unlink(path)?,

        ["open", path] => println!("{}", fs.open(path)?),

        ["close", inode] => fs.close(parse_inode(inode)?),

        ["truncate", path, size] => {
            let size: i64 = size.parse().map_err(|_| FsError::NegativeSize)?;
            fs.truncate_path(path, size)?;
        }

        ["cat", path] => {
            let inode = fs.open(path)?;
            let size = fs.filestat(inode)?.size as usize;
            let data = fs.read(inode, size, 0)?;
            io::stdout().write_all(&data).ok();
            println!();
            fs.close(inode);
        }

        ["write", path, text] => {
            let inode = fs.open(path)?;
            fs.write(inode, text.as_bytes(), 0)?;
            fs.close(inode);
        }

        ["stat", path] => {
            let inode = fs.open(path)?;
            let stat = fs.filestat(inode)?;
            println!(
                "{} type={:?} size={} links={}",
                file_type_char(stat.file_type),
                stat.file_type,
                stat.size,
                stat.links
            );
            fs.close(inode);
        }

        _ => eprintln!("unrecognized command: {}", parts.join(" ")),
    }
    Ok(true)
}

fn parse_inode(s: &str) -> Result<u32, FsError> {
    s.parse().map_err(|_| FsError::BadId)
}

fn print_ls(fs: &mut Filesystem, path: Option<&str>) -> Result<(), FsError> {
    for (name, inode) in fs.ls(path)? {
        println!("{inode}\t{name}");
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    let bin = args.first().map(String::as_str).unwrap_or("nanofs-shell");

    let image = match args.get(1) {
        Some(path) => path,
        None => {
            print_usage(bin);
            exit(1);
        }
    };

    let mut fs = Filesystem::new();
    fs.mount(image.as_ref()).unwrap_or_else(|e| {
        eprintln!("{bin}: {image}: {e}");
        exit(1);
    });

    let stdin = io::stdin();
    loop {
        print!("{}> ", fs.pwd().unwrap_or_default());
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        match dispatch(&mut fs, &parts) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("{bin}: {e}"),
        }
    }

    fs.umount();
}
