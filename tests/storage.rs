//! End-to-end scenarios exercising the engine through `Storage`'s public
//! path-keyed API, against real temp-file-backed images.

use nufs::error::Errno;
use nufs::storage::Storage;

fn temp_image(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("nufs-storage-test-{name}-{}", std::process::id()))
}

fn open(name: &str) -> (std::path::PathBuf, Storage) {
    let path = temp_image(name);
    let storage = Storage::init(&path).unwrap();
    (path, storage)
}

#[test]
fn mkdir_then_list_has_dot_entries() {
    let (path, mut storage) = open("mkdir_list");
    storage.mkdir("/a", 0o755).unwrap();

    let entries = storage.list("/a").unwrap();
    assert!(entries.contains(&".".to_string()));
    assert!(entries.contains(&"..".to_string()));

    let st = storage.stat("/a").unwrap();
    assert_eq!(st.mode & libc::S_IFMT, libc::S_IFDIR);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn mknod_write_read_roundtrip() {
    let (path, mut storage) = open("write_read");
    storage.mknod("/f.txt", libc::S_IFREG | 0o644).unwrap();

    let written = storage.write("/f.txt", b"hello, nufs", 0).unwrap();
    assert_eq!(written, 11);

    let mut buf = [0u8; 11];
    let read = storage.read("/f.txt", &mut buf, 0).unwrap();
    assert_eq!(read, 11);
    assert_eq!(&buf, b"hello, nufs");

    let st = storage.stat("/f.txt").unwrap();
    assert_eq!(st.size, 11);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn large_file_forces_indirect_inode_and_reads_back_holes_as_zero() {
    let (path, mut storage) = open("large_file");
    storage.mknod("/big.bin", libc::S_IFREG | 0o644).unwrap();

    let payload = vec![0xab; 1024];
    storage.write("/big.bin", &payload, 30_000).unwrap();

    let st = storage.stat("/big.bin").unwrap();
    assert!(st.size > 5 * 4096);

    let mut hole = vec![1u8; 30_000 - 20_480];
    let n = storage.read("/big.bin", &mut hole, 20_480).unwrap();
    assert_eq!(n, hole.len());
    assert!(hole.iter().all(|&b| b == 0));

    let mut tail = vec![0u8; 1024];
    let n = storage.read("/big.bin", &mut tail, 30_000).unwrap();
    assert_eq!(n, 1024);
    assert!(tail.iter().all(|&b| b == 0xab));

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn hard_link_shares_data_and_survives_one_unlink() {
    let (path, mut storage) = open("hardlink");
    storage.mknod("/a.txt", libc::S_IFREG | 0o644).unwrap();
    storage.write("/a.txt", b"shared", 0).unwrap();
    storage.link("/a.txt", "/b.txt").unwrap();

    assert_eq!(storage.stat("/a.txt").unwrap().nlink, 2);
    assert_eq!(storage.stat("/b.txt").unwrap().nlink, 2);

    storage.unlink("/a.txt").unwrap();
    assert_eq!(storage.stat("/a.txt"), Err(Errno::ENOENT));

    let mut buf = [0u8; 6];
    let n = storage.read("/b.txt", &mut buf, 0).unwrap();
    assert_eq!(n, 6);
    assert_eq!(&buf, b"shared");

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn symlink_readlink_roundtrip() {
    let (path, mut storage) = open("symlink");
    storage.mknod("/target.txt", libc::S_IFREG | 0o644).unwrap();
    storage.symlink("/target.txt", "/link").unwrap();

    let target = storage.readlink("/link", 4096).unwrap();
    assert_eq!(target, b"/target.txt");

    let st = storage.stat("/link").unwrap();
    assert_eq!(st.mode & libc::S_IFMT, libc::S_IFLNK);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn rename_within_same_directory_succeeds_across_directories_rejected() {
    let (path, mut storage) = open("rename");
    storage.mknod("/old.txt", libc::S_IFREG | 0o644).unwrap();
    storage.rename("/old.txt", "/new.txt").unwrap();
    assert!(storage.stat("/new.txt").is_ok());
    assert_eq!(storage.stat("/old.txt"), Err(Errno::ENOENT));

    storage.mkdir("/dir", 0o755).unwrap();
    assert_eq!(
        storage.rename("/new.txt", "/dir/new.txt"),
        Err(Errno::UNSPECIFIED)
    );

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn rmdir_recursively_unlinks_and_reverts_bitmaps() {
    let (path, mut storage) = open("rmdir");

    let before = storage.stat("/").unwrap();

    storage.mkdir("/sub", 0o755).unwrap();
    storage.mknod("/sub/a.txt", libc::S_IFREG | 0o644).unwrap();
    storage.mknod("/sub/b.txt", libc::S_IFREG | 0o644).unwrap();
    storage.write("/sub/a.txt", b"data", 0).unwrap();

    storage.rmdir("/sub").unwrap();

    assert_eq!(storage.stat("/sub"), Err(Errno::ENOENT));
    assert_eq!(storage.stat("/sub/a.txt"), Err(Errno::ENOENT));

    let after = storage.stat("/").unwrap();
    assert_eq!(before.size, after.size);

    std::fs::remove_file(&path).unwrap();
}
