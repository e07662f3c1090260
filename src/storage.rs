//! Path-keyed operations: the thin translation from textual paths to
//! directory and inode operations.

use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::bitmap;
use crate::directory::{self, DIR_NAME};
use crate::error::{Errno, Result};
use crate::inode::{Inodes, DIRECT_SPAN};
use crate::pages::{Pages, PAGE_SIZE, ROOT_DATA_PAGE};
use crate::path;

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

fn is_dir(mode: u32) -> bool {
    mode & libc::S_IFMT == libc::S_IFDIR
}

fn is_link(mode: u32) -> bool {
    mode & libc::S_IFMT == libc::S_IFLNK
}

fn join_path(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Metadata returned by [`Storage::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub mode: u32,
    pub size: i64,
    pub uid: u32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub nlink: u32,
}

/// The filesystem engine: a single memory-mapped image addressed through
/// a POSIX-like path namespace.
pub struct Storage {
    pages: Pages,
}

impl Storage {
    /// Opens (creating if necessary) the image at `path` and ensures the
    /// root directory exists.
    pub fn init(path: &Path) -> io::Result<Self> {
        let mut pages = Pages::init(path)?;
        Inodes::init(&mut pages);

        if bitmap::get(pages.inode_bitmap(), 0) == 0 {
            let root_page = pages.alloc_page().expect("root data page reservation");
            debug_assert_eq!(root_page, ROOT_DATA_PAGE);
            let root_inum = Inodes::alloc(&mut pages).expect("root inode allocation");
            debug_assert_eq!(root_inum, 0);

            let now = now_secs();
            let root = Inodes::get(&pages, root_inum).unwrap();
            root.mode = libc::S_IFDIR | 0o755;
            root.ptrs[0] = root_page as i32;
            root.size = PAGE_SIZE as i64;
            root.atime = now;
            root.mtime = now;
            root.ctime = now;

            directory::put(&mut pages, root_inum, ".", root_inum).expect("root `.` entry");
            directory::put(&mut pages, root_inum, "..", root_inum).expect("root `..` entry");
        }

        Ok(Storage { pages })
    }

    /// Populates a [`Stat`] for `path`.
    pub fn stat(&self, path: &str) -> Result<Stat> {
        let inum = directory::tree_lookup(&self.pages, path)?;
        let node = Inodes::get(&self.pages, inum).expect("resolved inode must be allocated");
        Ok(Stat {
            mode: node.mode,
            size: node.size,
            uid: unsafe { libc::getuid() },
            atime: node.atime,
            mtime: node.mtime,
            ctime: node.ctime,
            nlink: (node.refs + 1) as u32,
        })
    }

    /// Creates a new inode of `mode` at `path` and links it into its
    /// parent directory.
    pub fn mknod(&mut self, path: &str, mode: u32) -> Result<()> {
        let (parent, name) = path::split(path);
        let dir_inum = directory::tree_lookup(&self.pages, &parent)?;
        if name.is_empty() {
            return Err(Errno::ENOENT);
        }

        let new_inum = Inodes::alloc(&mut self.pages);
        let new_page = self.pages.alloc_page();
        let (new_inum, new_page) = match (new_inum, new_page) {
            (Ok(inum), Ok(page)) => (inum, page),
            (Ok(inum), Err(e)) => {
                Inodes::free(&mut self.pages, inum);
                return Err(e);
            }
            (Err(e), Ok(page)) => {
                self.pages.free_page(page);
                return Err(e);
            }
            (Err(e), Err(_)) => return Err(e),
        };

        let now = now_secs();
        let node = Inodes::get(&self.pages, new_inum).unwrap();
        node.ptrs[0] = new_page as i32;
        node.mode = mode;
        node.atime = now;
        node.mtime = now;
        node.ctime = now;
        if is_dir(mode) || is_link(mode) {
            node.size = PAGE_SIZE as i64;
        }

        directory::put(&mut self.pages, dir_inum, &name, new_inum)?;
        Ok(())
    }

    /// Creates a directory at `path`, populated with `.` and `..`.
    pub fn mkdir(&mut self, path: &str, mode: u32) -> Result<()> {
        self.mknod(path, libc::S_IFDIR | mode)?;

        let (parent, _) = path::split(path);
        let dir_inum = directory::tree_lookup(&self.pages, path)?;
        let parent_inum = directory::tree_lookup(&self.pages, &parent)?;
        directory::put(&mut self.pages, dir_inum, ".", dir_inum)?;
        directory::put(&mut self.pages, dir_inum, "..", parent_inum)?;
        Ok(())
    }

    /// Recursively unlinks every entry of `dir_inum` other than `.`/`..`.
    fn empty_directory(&mut self, dir_inum: usize, dir_path: &str) -> Result<()> {
        for entry_name in directory::list_inode(&self.pages, dir_inum) {
            if entry_name == "." || entry_name == ".." {
                continue;
            }
            self.unlink(&join_path(dir_path, &entry_name))?;
        }
        Ok(())
    }

    /// Removes the directory at `path`: recursively unlinks its contents,
    /// frees its inode, then removes its entry from its parent.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let dir_inum = directory::tree_lookup(&self.pages, path)?;
        let node = Inodes::get(&self.pages, dir_inum).unwrap();
        if !is_dir(node.mode) {
            return Err(Errno::ENOTDIR);
        }

        self.empty_directory(dir_inum, path)?;
        Inodes::free(&mut self.pages, dir_inum);

        let (parent, name) = path::split(path);
        let parent_inum = directory::tree_lookup(&self.pages, &parent)?;
        directory::delete(&mut self.pages, parent_inum, &name)
    }

    /// Removes the directory entry at `path`. Frees the inode (recursing
    /// into directory removal) when its link count drops to zero,
    /// otherwise decrements it.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let (parent, name) = path::split(path);
        let dir_inum = directory::tree_lookup(&self.pages, &parent)?;
        let entry = directory::lookup(&self.pages, dir_inum, &name).ok_or(Errno::ENOENT)?;
        let target_inum = entry.inum as usize;

        let node = Inodes::get(&self.pages, target_inum).unwrap();
        if node.refs == 0 {
            if is_dir(node.mode) {
                self.empty_directory(target_inum, path)?;
            }
            Inodes::free(&mut self.pages, target_inum);
        } else {
            node.refs -= 1;
        }

        directory::delete(&mut self.pages, dir_inum, &name)
    }

    /// Adds a hard link at `to` pointing at the same inode as `from`.
    pub fn link(&mut self, from: &str, to: &str) -> Result<()> {
        let from_inum = directory::tree_lookup(&self.pages, from)?;
        if directory::tree_lookup(&self.pages, to).is_ok() {
            return Err(Errno::EEXIST);
        }
        let (to_parent, to_name) = path::split(to);
        let to_parent_inum = directory::tree_lookup(&self.pages, &to_parent)?;

        let from_node = Inodes::get(&self.pages, from_inum).unwrap();
        if is_dir(from_node.mode) {
            return Err(Errno::EISDIR);
        }

        directory::put(&mut self.pages, to_parent_inum, &to_name, from_inum)?;
        Inodes::get(&self.pages, from_inum).unwrap().refs += 1;
        Ok(())
    }

    /// Creates a symlink at `linkpath` whose stored target is `target`
    /// (truncated to one page).
    pub fn symlink(&mut self, target: &str, linkpath: &str) -> Result<()> {
        if directory::tree_lookup(&self.pages, linkpath).is_ok() {
            return Err(Errno::EEXIST);
        }
        self.mknod(linkpath, libc::S_IFLNK | 0o777)?;

        let link_inum = directory::tree_lookup(&self.pages, linkpath)?;
        let node = Inodes::get(&self.pages, link_inum).unwrap();
        let page = self.pages.get_page(node.ptrs[0] as usize);
        page.fill(0);
        let bytes = target.as_bytes();
        let len = bytes.len().min(PAGE_SIZE);
        page[..len].copy_from_slice(&bytes[..len]);
        Ok(())
    }

    /// Returns the target stored by the symlink at `path`, up to
    /// `max_len` bytes.
    pub fn readlink(&self, path: &str, max_len: usize) -> Result<Vec<u8>> {
        let inum = directory::tree_lookup(&self.pages, path)?;
        let node = Inodes::get(&self.pages, inum).unwrap();
        if !is_link(node.mode) {
            return Err(Errno::EPERM);
        }
        let page = self.pages.get_page(node.ptrs[0] as usize);
        let stored_len = page.iter().position(|&b| b == 0).unwrap_or(PAGE_SIZE);
        let copy_len = stored_len.min(max_len).min(PAGE_SIZE);
        Ok(page[..copy_len].to_vec())
    }

    /// Renames a directory entry. Only in-directory renames are
    /// supported; cross-directory renames are rejected.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let (from_parent, from_name) = path::split(from);
        let (to_parent, to_name) = path::split(to);
        if from_parent != to_parent {
            return Err(Errno::UNSPECIFIED);
        }

        let dir_inum = directory::tree_lookup(&self.pages, &from_parent)?;
        let entry = directory::lookup(&self.pages, dir_inum, &from_name).ok_or(Errno::ENOENT)?;

        let mut stored = [0u8; DIR_NAME];
        let bytes = to_name.as_bytes();
        let len = bytes.len().min(DIR_NAME);
        stored[..len].copy_from_slice(&bytes[..len]);
        entry.name = stored;
        Ok(())
    }

    /// Reads up to `buf.len()` bytes from `path` starting at `offset`.
    /// Returns the number of bytes copied into `buf`.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: i64) -> Result<usize> {
        let file_inum = directory::tree_lookup(&self.pages, path)?;
        let file = Inodes::get(&self.pages, file_inum).unwrap();
        if is_dir(file.mode) {
            return Err(Errno::EISDIR);
        }
        if offset >= file.size {
            return Ok(0);
        }

        let size = (buf.len() as i64).min(file.size - offset) as usize;
        let mut hops = offset / DIRECT_SPAN;
        let mut local_offset = offset % DIRECT_SPAN;
        let mut cur = file_inum;
        while hops > 0 {
            cur = Inodes::get(&self.pages, cur).unwrap().iptr as usize;
            hops -= 1;
        }

        let mut bytes_left = size;
        let mut buf_off = 0usize;
        while bytes_left > 0 {
            let next;
            {
                let node = Inodes::get(&self.pages, cur).unwrap();
                for slot in 0..5 {
                    if bytes_left == 0 {
                        break;
                    }
                    if local_offset >= PAGE_SIZE as i64 {
                        local_offset -= PAGE_SIZE as i64;
                        continue;
                    }
                    let page = self.pages.get_page(node.ptrs[slot] as usize);
                    let start = local_offset as usize;
                    let n = bytes_left.min(PAGE_SIZE - start);
                    buf[buf_off..buf_off + n].copy_from_slice(&page[start..start + n]);
                    local_offset = 0;
                    buf_off += n;
                    bytes_left -= n;
                }
                next = node.iptr;
            }
            if bytes_left == 0 {
                break;
            }
            cur = next as usize;
        }
        Ok(size)
    }

    /// Writes `buf` into `path` at `offset`, growing the file first if
    /// needed. Returns the number of bytes written.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: i64) -> Result<usize> {
        let file_inum = directory::tree_lookup(&self.pages, path)?;
        let file = Inodes::get(&self.pages, file_inum).unwrap();
        if is_dir(file.mode) {
            return Err(Errno::EISDIR);
        }

        let size = buf.len();
        if offset + size as i64 > file.size {
            Inodes::grow(&mut self.pages, file_inum, offset + size as i64)?;
        }

        let mut hops = offset / DIRECT_SPAN;
        let mut local_offset = offset % DIRECT_SPAN;
        let mut cur = file_inum;
        while hops > 0 {
            cur = Inodes::get(&self.pages, cur).unwrap().iptr as usize;
            hops -= 1;
        }

        let mut bytes_left = size;
        let mut buf_off = 0usize;
        while bytes_left > 0 {
            let next;
            {
                let node = Inodes::get(&self.pages, cur).unwrap();
                for slot in 0..5 {
                    if bytes_left == 0 {
                        break;
                    }
                    if local_offset >= PAGE_SIZE as i64 {
                        local_offset -= PAGE_SIZE as i64;
                        continue;
                    }
                    let page = self.pages.get_page(node.ptrs[slot] as usize);
                    let start = local_offset as usize;
                    let n = bytes_left.min(PAGE_SIZE - start);
                    page[start..start + n].copy_from_slice(&buf[buf_off..buf_off + n]);
                    local_offset = 0;
                    buf_off += n;
                    bytes_left -= n;
                }
                next = node.iptr;
            }
            if bytes_left == 0 {
                break;
            }
            cur = next as usize;
        }
        Ok(size)
    }

    /// Grows or shrinks the file at `path` to exactly `size` bytes.
    pub fn truncate(&mut self, path: &str, size: i64) -> Result<()> {
        let inum = directory::tree_lookup(&self.pages, path)?;
        let node = Inodes::get(&self.pages, inum).unwrap();
        if size > node.size {
            Inodes::grow(&mut self.pages, inum, size)
        } else {
            Inodes::shrink(&mut self.pages, inum, size);
            Ok(())
        }
    }

    /// ORs `mode` into the inode's mode word and refreshes `ctime`.
    pub fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let inum = directory::tree_lookup(&self.pages, path)?;
        let node = Inodes::get(&self.pages, inum).unwrap();
        node.mode |= mode;
        node.ctime = now_secs();
        Ok(())
    }

    /// Overwrites the access and modification timestamps.
    pub fn set_time(&mut self, path: &str, atime: i64, mtime: i64) -> Result<()> {
        let inum = directory::tree_lookup(&self.pages, path)?;
        let node = Inodes::get(&self.pages, inum).unwrap();
        node.atime = atime;
        node.mtime = mtime;
        Ok(())
    }

    /// Returns `Ok(())` if `path` resolves, `Err(ENOENT)` otherwise.
    /// Mask bits are accepted but not enforced (mode bits are stored, not
    /// checked, per the engine's non-goals).
    pub fn access(&self, path: &str, _mask: i32) -> Result<()> {
        directory::tree_lookup(&self.pages, path).map(|_| ())
    }

    /// Lists the entries of the directory at `path`.
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        let inum = directory::tree_lookup(&self.pages, path)?;
        Ok(directory::list_inode(&self.pages, inum))
    }
}
