//! `nanofs-mkfs` builds a zero-filled backing image for a fresh device.
//!
//! An all-zero image already satisfies the bitmap invariants of a bare
//! device (every bit clear), so formatting is just sizing the file; the
//! first `mount` bootstraps the root directory.

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::exit;

use nanofs::BLOCK_SIZE;

const DEFAULT_CAPACITY_MB: u64 = 50;

struct Args {
    prog: String,
    capacity_mb: u64,
    image_path: Option<PathBuf>,
}

fn print_usage(bin: &str) {
    eprintln!("Usage:");
    eprintln!(" {bin} [-h]");
    eprintln!(" {bin} [-s SIZE_MB] <image>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -h, --help:\tprints usage");
    eprintln!(" -s SIZE_MB:\timage capacity in mebibytes (default {DEFAULT_CAPACITY_MB})");
}

fn parse_args() -> Args {
    let mut args = Args {
        prog: "nanofs-mkfs".to_string(),
        capacity_mb: DEFAULT_CAPACITY_MB,
        image_path: None,
    };
    let mut iter = env::args();
    args.prog = iter.next().unwrap_or(args.prog);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage(&args.prog);
                exit(0);
            }
            "-s" => {
                let value = iter.next().unwrap_or_else(|| {
                    eprintln!("{}: -s requires an argument", args.prog);
                    exit(1);
                });
                args.capacity_mb = value.parse().unwrap_or_else(|_| {
                    eprintln!("{}: invalid size `{value}`", args.prog);
                    exit(1);
                });
            }
            _ => args.image_path = Some(PathBuf::from(arg)),
        }
    }
    args
}

fn main() {
    env_logger::init();
    let args = parse_args();
    let image_path = args.image_path.unwrap_or_else(|| {
        eprintln!("{}: specify path to an image file", args.prog);
        exit(1);
    });

    let capacity = args.capacity_mb * 1024 * 1024;
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&image_path)
        .unwrap_or_else(|e| {
            eprintln!("{}: {}: {e}", args.prog, image_path.display());
            exit(1);
        });
    file.set_len(capacity).unwrap_or_else(|e| {
        eprintln!("{}: {}: {e}", args.prog, image_path.display());
        exit(1);
    });

    println!(
        "{}: created a {} MiB image at {} ({} blocks)",
        args.prog,
        args.capacity_mb,
        image_path.display(),
        capacity / BLOCK_SIZE as u64
    );
}
