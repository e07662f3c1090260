//! Error codes returned by storage operations.

use std::fmt;

/// A negative, errno-style error code.
///
/// Mirrors the `pub type Errno = i32` convention used for the same purpose
/// elsewhere in this codebase's lineage, but reuses `libc`'s error
/// constants instead of redeclaring them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Errno(pub i32);

impl Errno {
    /// No such file or directory.
    pub const ENOENT: Errno = Errno(-libc::ENOENT);
    /// No space left on device (pages or inodes exhausted).
    pub const ENOSPC: Errno = Errno(-libc::ENOSPC);
    /// Is a directory.
    pub const EISDIR: Errno = Errno(-libc::EISDIR);
    /// Not a directory.
    pub const ENOTDIR: Errno = Errno(-libc::ENOTDIR);
    /// File exists.
    pub const EEXIST: Errno = Errno(-libc::EEXIST);
    /// Operation not permitted.
    pub const EPERM: Errno = Errno(-libc::EPERM);
    /// Unspecified / residual catch-all.
    pub const UNSPECIFIED: Errno = Errno(-1);
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Errno::ENOENT => "ENOENT",
            Errno::ENOSPC => "ENOSPC",
            Errno::EISDIR => "EISDIR",
            Errno::ENOTDIR => "ENOTDIR",
            Errno::EEXIST => "EEXIST",
            Errno::EPERM => "EPERM",
            _ => "unspecified error",
        };
        write!(f, "{name} ({})", self.0)
    }
}

impl std::error::Error for Errno {}

/// Result type used throughout the storage engine.
pub type Result<T> = std::result::Result<T, Errno>;
