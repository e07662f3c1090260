//! A small user-space filesystem storage engine backed by a single
//! fixed-size memory-mapped image: a page bitmap, an inode table with
//! direct and single-indirect chaining, and directory entries addressed
//! through a POSIX-like path namespace.

pub mod bitmap;
pub mod directory;
pub mod error;
pub mod inode;
pub mod pages;
pub mod path;
pub mod storage;

pub use error::{Errno, Result};
pub use pages::{NUFS_SIZE, PAGE_SIZE};
pub use storage::{Stat, Storage};
