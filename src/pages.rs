//! Fixed-size page allocator over a single memory-mapped image.
//!
//! Page 0 hosts the page bitmap followed immediately by the inode bitmap.
//! Page 0 is never handed out by [`Pages::alloc_page`]; index `0` is the
//! null sentinel used throughout the inode/directory pointer fields.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::slice;

use memmap2::MmapMut;

use crate::bitmap;
use crate::error::{Errno, Result};

/// Size of a page, in bytes.
pub const PAGE_SIZE: usize = 4096;
/// Total size of the backing image, in bytes.
pub const NUFS_SIZE: u64 = 1024 * 1024;
/// Total number of pages in the image.
pub const PAGE_COUNT: usize = (NUFS_SIZE as usize) / PAGE_SIZE;
/// Number of entries in the inode table.
pub const INODE_COUNT: usize = 256;

/// Byte size of a bitmap covering `PAGE_COUNT` (equivalently `INODE_COUNT`,
/// both 256) objects.
const BITMAP_BYTES: usize = PAGE_COUNT / 8;

/// Page index of the root directory's first data page, reserved at init
/// time so that a fresh image always places it at the same offset.
pub const ROOT_DATA_PAGE: usize = 5;

/// The memory-mapped backing image, sliced into fixed-size pages.
pub struct Pages {
    mmap: MmapMut,
    _file: File,
}

impl Pages {
    /// Ensures the backing file at `path` exists with size [`NUFS_SIZE`],
    /// maps it, and marks page 0 (the bitmaps) reserved. Idempotent: an
    /// existing image carrying prior bitmap bits is accepted as-is.
    pub fn init(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(NUFS_SIZE)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let pages = Pages { mmap, _file: file };
        bitmap::put(pages.page_bitmap(), 0, 1);
        Ok(pages)
    }

    /// Returns the in-image bytes of page `index` as a mutable slice.
    ///
    /// # Safety invariant
    /// Pages are disjoint, non-overlapping byte ranges of the image, so
    /// slices for distinct indices never alias; the engine is
    /// single-threaded and never calls this twice for the same index
    /// within one borrow's lifetime.
    #[allow(clippy::mut_from_ref)]
    pub fn get_page(&self, index: usize) -> &mut [u8] {
        let base = unsafe { self.mmap.as_ptr().add(index * PAGE_SIZE) as *mut u8 };
        unsafe { slice::from_raw_parts_mut(base, PAGE_SIZE) }
    }

    /// Returns the page bitmap region within page 0.
    pub fn page_bitmap(&self) -> &mut [u8] {
        &mut self.get_page(0)[0..BITMAP_BYTES]
    }

    /// Returns the inode bitmap region within page 0, immediately
    /// following the page bitmap.
    pub fn inode_bitmap(&self) -> &mut [u8] {
        &mut self.get_page(0)[BITMAP_BYTES..BITMAP_BYTES * 2]
    }

    /// Scans the page bitmap for the lowest clear bit, sets it, and
    /// returns its index.
    pub fn alloc_page(&mut self) -> Result<usize> {
        bitmap::alloc(self.page_bitmap(), PAGE_COUNT).ok_or(Errno::ENOSPC)
    }

    /// Clears the page bitmap bit for `index`. Page contents are left
    /// untouched.
    pub fn free_page(&mut self, index: usize) {
        bitmap::put(self.page_bitmap(), index, 0);
    }
}
