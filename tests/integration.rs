//! End-to-end scenarios driving a temporary device image through the
//! namespace verbs, mirroring the reference walkthroughs: symlink
//! traversal, working-directory normalization, truncate/read, hard links,
//! non-empty directory removal, and allocator exhaustion/recovery.

use nanofs::{FileType, Filesystem, FsError};
use tempfile::NamedTempFile;

const FIFTY_MIB: u64 = 50 * 1024 * 1024;

fn fresh_image(len: u64) -> (Filesystem, NamedTempFile) {
    let file = NamedTempFile::new().expect("create temp file");
    file.as_file().set_len(len).expect("size temp file");
    let mut fs = Filesystem::new();
    fs.mount(file.path()).expect("mount fresh image");
    (fs, file)
}

#[test]
fn symlinked_directory_lists_through_the_link() {
    let (mut fs, _file) = fresh_image(FIFTY_MIB);
    fs.mkdir("dir1").unwrap();
    fs.symlink("dir1", "symlink").unwrap();
    fs.mkdir("symlink/dir2").unwrap();

    let entries = fs.ls(Some("dir1")).unwrap();
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec![".", "..", "dir2"]);
}

#[test]
fn cd_up_and_down_returns_to_the_same_directory() {
    let (mut fs, _file) = fresh_image(FIFTY_MIB);
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    fs.cd("/a/b").unwrap();
    fs.cd("..").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/a/");
}

#[test]
fn write_truncate_read_reports_the_shrunk_contents() {
    let (mut fs, _file) = fresh_image(FIFTY_MIB);
    let f = fs.create("/f", FileType::Regular, None).unwrap();
    fs.write(f, b"hello", 0).unwrap();
    fs.truncate(f, 3).unwrap();
    assert_eq!(fs.read(f, 3, 0).unwrap(), b"hel");
    assert_eq!(fs.filestat(f).unwrap().size, 3);
}

#[test]
fn unlinking_one_hard_link_leaves_the_other_reachable() {
    let (mut fs, _file) = fresh_image(FIFTY_MIB);
    fs.create("/f", FileType::Regular, None).unwrap();
    fs.link("/f", "/g").unwrap();
    fs.unlink("/f").unwrap();

    let g = fs.open("/g").unwrap();
    assert_eq!(fs.filestat(g).unwrap().links, 1);
}

#[test]
fn rmdir_refuses_a_non_empty_directory_then_succeeds_once_emptied() {
    let (mut fs, _file) = fresh_image(FIFTY_MIB);
    fs.mkdir("/d").unwrap();
    fs.create("/d/x", FileType::Regular, None).unwrap();

    assert!(matches!(fs.rmdir("/d"), Err(FsError::DirNotEmpty)));

    fs.unlink("/d/x").unwrap();
    fs.rmdir("/d").unwrap();
    assert!(matches!(fs.open("/d"), Err(FsError::NotFound)));
}

#[test]
fn exhausted_allocator_recovers_after_an_unlink() {
    // A small image runs out of inode/data blocks quickly; confirm the
    // allocator reports NoSpace and that freeing one file makes room again.
    let (mut fs, _file) = fresh_image(16 * 1024);
    let mut created = Vec::new();
    loop {
        match fs.create(&format!("/f{}", created.len()), FileType::Regular, None) {
            Ok(inode) => created.push(inode),
            Err(FsError::NoSpace) => break,
            Err(e) => panic!("unexpected error while filling the image: {e}"),
        }
    }
    assert!(!created.is_empty(), "image should accept at least one file before NoSpace");

    fs.unlink("/f0").unwrap();
    fs.create("/after-free", FileType::Regular, None).unwrap();
}

#[test]
fn name_length_boundary_is_enforced() {
    let (mut fs, _file) = fresh_image(FIFTY_MIB);
    let max_name = "a".repeat(nanofs::FNAME_LEN - 1);
    let too_long = "a".repeat(nanofs::FNAME_LEN);

    fs.create(&format!("/{max_name}"), FileType::Regular, None).unwrap();
    assert!(matches!(
        fs.create(&format!("/{too_long}"), FileType::Regular, None),
        Err(FsError::NameTooLong)
    ));
}

#[test]
fn write_size_boundary_is_enforced() {
    let (mut fs, _file) = fresh_image(FIFTY_MIB);
    let f = fs.create("/big", FileType::Regular, None).unwrap();

    let max = vec![0u8; nanofs::BPI * nanofs::BLOCK_SIZE];
    fs.write(f, &max, 0).unwrap();

    let too_big = vec![0u8; nanofs::BPI * nanofs::BLOCK_SIZE + 1];
    assert!(matches!(fs.write(f, &too_big, 0), Err(FsError::SizeTooBig)));
}

#[test]
fn unlink_refuses_an_open_file() {
    let (mut fs, _file) = fresh_image(FIFTY_MIB);
    fs.create("/f", FileType::Regular, None).unwrap();
    let f = fs.open("/f").unwrap();

    assert!(matches!(fs.unlink("/f"), Err(FsError::Busy)));

    fs.close(f);
    fs.unlink("/f").unwrap();
}

#[test]
fn verbs_fail_with_not_mounted_after_umount() {
    let (mut fs, _file) = fresh_image(FIFTY_MIB);
    fs.umount();
    assert!(matches!(fs.pwd(), Err(FsError::NotMounted)));
    assert!(matches!(fs.create("/f", FileType::Regular, None), Err(FsError::NotMounted)));
}

#[test]
fn remounting_an_existing_image_preserves_its_namespace() {
    let file = NamedTempFile::new().unwrap();
    file.as_file().set_len(FIFTY_MIB).unwrap();

    let mut fs = Filesystem::new();
    fs.mount(file.path()).unwrap();
    fs.mkdir("/persisted").unwrap();
    fs.umount();

    fs.mount(file.path()).unwrap();
    let entries = fs.ls(Some("/")).unwrap();
    assert!(entries.iter().any(|(name, _)| name == "persisted"));
}
