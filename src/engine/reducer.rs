//! Per-file reductions and the merge that combines partial aggregates.

use std::io;
use std::sync::Arc;

use crate::pipeline::FileSystem;
use crate::{FileEntry, ReducerKind};

use super::hashing::{digest_prefix, hash_file};

/// Combine two partial aggregates. Wrapping addition: associative, commutative, identity 0, and
/// the same operation `AtomicU64::fetch_add` performs, so every strategy combines identically.
#[inline]
pub fn merge(a: u64, b: u64) -> u64 {
    a.wrapping_add(b)
}

/// Maps one directory entry to its contribution to the aggregate.
///
/// `reduce_file` is only called for regular files. An `Err` is absorbed by the walker: the file
/// contributes 0 and the error is counted.
pub trait Reducer: Send + Sync {
    fn name(&self) -> &'static str;

    fn reduce_file(&self, fs: &dyn FileSystem, entry: &FileEntry) -> io::Result<u64>;

    /// Contribution of a symbolic link. Links are never followed.
    fn reduce_link(&self, _entry: &FileEntry) -> u64 {
        0
    }
}

/// Size in bytes, as reported by a no-follow stat.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteSize;

impl Reducer for ByteSize {
    fn name(&self) -> &'static str {
        "bytes"
    }

    fn reduce_file(&self, fs: &dyn FileSystem, entry: &FileEntry) -> io::Result<u64> {
        fs.size(&entry.path)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FileCount;

impl Reducer for FileCount {
    fn name(&self) -> &'static str {
        "count"
    }

    fn reduce_file(&self, _fs: &dyn FileSystem, _entry: &FileEntry) -> io::Result<u64> {
        Ok(1)
    }
}

/// Sum of blake3 prefixes of file contents. Equal trees give equal digests regardless of
/// traversal order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentDigest;

impl Reducer for ContentDigest {
    fn name(&self) -> &'static str {
        "digest"
    }

    fn reduce_file(&self, fs: &dyn FileSystem, entry: &FileEntry) -> io::Result<u64> {
        let size = fs.size(&entry.path)?;
        let file = fs.open(&entry.path)?;
        Ok(digest_prefix(&hash_file(file, size)?))
    }
}

impl ReducerKind {
    pub fn reducer(self) -> Arc<dyn Reducer> {
        match self {
            ReducerKind::Bytes => Arc::new(ByteSize),
            ReducerKind::Count => Arc::new(FileCount),
            ReducerKind::Digest => Arc::new(ContentDigest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_wraps_instead_of_overflowing() {
        assert_eq!(merge(u64::MAX, 2), 1);
        assert_eq!(merge(0, 7), 7);
        assert_eq!(merge(merge(1, 2), 3), merge(1, merge(2, 3)));
    }

    #[test]
    fn kinds_map_to_named_reducers() {
        assert_eq!(ReducerKind::Bytes.reducer().name(), "bytes");
        assert_eq!(ReducerKind::Count.reducer().name(), "count");
        assert_eq!(ReducerKind::Digest.reducer().name(), "digest");
    }
}
