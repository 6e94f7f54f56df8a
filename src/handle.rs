//! Opaque NFS file handles.
//!
//! A handle is, on the wire, an opaque byte string (`nfs_fh3`). Internally we
//! treat it as a `u64` so it can be used directly as a `DashMap` key (see
//! `crate::mux`). The root handle is a fixed, reserved value; every other
//! handle is minted from a process-wide monotonic counter so handle identity
//! never depends on where an object happens to live in memory.

use crate::nfs;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u64);

impl FileHandle {
    /// The well-known handle of the filesystem root, bound before any client
    /// connects and never unbound.
    pub const ROOT: FileHandle = FileHandle(0xDEAD_BEEF_DEAD_BEEF);

    pub fn to_bytes(self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<FileHandle> {
        let arr: [u8; 8] = bytes.try_into().ok()?;
        Some(FileHandle(u64::from_be_bytes(arr)))
    }

    pub fn from_fh3(fh: &nfs::nfs_fh3) -> Option<FileHandle> {
        Self::from_bytes(&fh.data)
    }

    pub fn to_fh3(self) -> nfs::nfs_fh3 {
        nfs::nfs_fh3 {
            data: self.to_bytes(),
        }
    }
}

/// Monotonic counter used to mint fresh handles (and fileids, which share the
/// same identity). Starts at 1 so it never collides with `FileHandle::ROOT`.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_handle_round_trips() {
        let fh = FileHandle::ROOT.to_fh3();
        assert_eq!(fh.data, vec![0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(FileHandle::from_fh3(&fh), Some(FileHandle::ROOT));
    }

    #[test]
    fn minted_handles_are_distinct() {
        let a = next_id();
        let b = next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_handle_bytes_reject() {
        assert_eq!(FileHandle::from_bytes(&[1, 2, 3]), None);
    }
}
