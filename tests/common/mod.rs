//! Fixture trees and test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use treesum::{FileEntry, FileKind, FileSystem, LocalFs, TraversalObserver};

/// Write `size` bytes at `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, size: usize) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, vec![b'x'; size]).unwrap();
}

/// ```text
/// root/
///   a.txt      10
///   f.txt       5
///   empty/
///   b/
///     c.txt    20
///     d/
///       e.txt  30
/// ```
/// Total size 65 over 4 files and 4 directories.
pub fn small_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_file(root, "a.txt", 10);
    write_file(root, "f.txt", 5);
    write_file(root, "b/c.txt", 20);
    write_file(root, "b/d/e.txt", 30);
    fs::create_dir(root.join("empty")).unwrap();
    dir
}

pub const SMALL_TREE_TOTAL: u64 = 65;
pub const SMALL_TREE_FILES: u64 = 4;

/// Balanced tree of `depth` levels below the root with `branching` subdirectories per
/// directory; every directory (root included) holds one 1-byte file. The total equals the
/// number of directories.
pub fn balanced_tree(depth: u32, branching: usize) -> (TempDir, u64) {
    let dir = TempDir::new().unwrap();
    let mut count = 0;
    fill_level(dir.path(), depth, branching, &mut count);
    (dir, count)
}

fn fill_level(dir: &Path, depth: u32, branching: usize, count: &mut u64) {
    fs::write(dir.join("leaf"), b"1").unwrap();
    *count += 1;
    if depth == 0 {
        return;
    }
    for i in 0..branching {
        let sub = dir.join(format!("d{i}"));
        fs::create_dir(&sub).unwrap();
        fill_level(&sub, depth - 1, branching, count);
    }
}

/// Local filesystem that refuses to list directories, or to stat files, with one of the given
/// names.
#[derive(Default)]
pub struct FailingFs {
    deny: HashSet<String>,
    unreadable: HashSet<String>,
}

impl FailingFs {
    pub fn denying(names: &[&str]) -> Self {
        Self {
            deny: to_set(names),
            ..Self::default()
        }
    }

    /// Files with one of these names fail `size`.
    pub fn unreadable_files(names: &[&str]) -> Self {
        Self {
            unreadable: to_set(names),
            ..Self::default()
        }
    }
}

fn to_set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn name_in(set: &HashSet<String>, path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| set.contains(n))
}

fn permission_denied() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "permission denied")
}

impl FileSystem for FailingFs {
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<FileEntry>> {
        if name_in(&self.deny, dir) {
            return Err(permission_denied());
        }
        LocalFs.list_dir(dir)
    }

    fn kind_of(&self, path: &Path, follow_links: bool) -> io::Result<FileKind> {
        LocalFs.kind_of(path, follow_links)
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        if name_in(&self.unreadable, path) {
            return Err(permission_denied());
        }
        LocalFs.size(path)
    }
}

/// In-memory tree with listings in insertion order. Each directory can be made slow to list.
/// Parents must be added before their children.
#[derive(Default)]
pub struct ScriptedFs {
    dirs: HashMap<PathBuf, (Vec<FileEntry>, Duration)>,
    files: HashMap<PathBuf, u64>,
}

impl ScriptedFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add directory `path` whose listing takes `delay`.
    pub fn dir(mut self, path: &str, delay: Duration) -> Self {
        let path = PathBuf::from(path);
        self.link_to_parent(&path, FileKind::Directory);
        self.dirs.insert(path, (Vec::new(), delay));
        self
    }

    pub fn file(mut self, path: &str, size: u64) -> Self {
        let path = PathBuf::from(path);
        self.link_to_parent(&path, FileKind::RegularFile);
        self.files.insert(path, size);
        self
    }

    fn link_to_parent(&mut self, path: &Path, kind: FileKind) {
        let parent = path.parent().and_then(|p| self.dirs.get_mut(p));
        if let Some((entries, _)) = parent {
            entries.push(FileEntry {
                path: path.to_path_buf(),
                kind,
            });
        }
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
}

impl FileSystem for ScriptedFs {
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<FileEntry>> {
        let (entries, delay) = self.dirs.get(dir).ok_or_else(|| not_found(dir))?;
        thread::sleep(*delay);
        Ok(entries.clone())
    }

    fn kind_of(&self, path: &Path, _follow_links: bool) -> io::Result<FileKind> {
        if self.dirs.contains_key(path) {
            Ok(FileKind::Directory)
        } else if self.files.contains_key(path) {
            Ok(FileKind::RegularFile)
        } else {
            Err(not_found(path))
        }
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        self.files.get(path).copied().ok_or_else(|| not_found(path))
    }
}

/// Observer that keeps every pending count and counts pool starts and scans.
#[derive(Default)]
pub struct RecordingObserver {
    pub pending: Mutex<Vec<usize>>,
    pub pools_started: AtomicUsize,
    pub scanned: AtomicUsize,
}

impl RecordingObserver {
    pub fn last_pending(&self) -> Option<usize> {
        self.pending.lock().unwrap().last().copied()
    }

    pub fn max_pending(&self) -> usize {
        self.pending.lock().unwrap().iter().copied().max().unwrap_or(0)
    }
}

impl TraversalObserver for RecordingObserver {
    fn directory_scanned(&self, _dir: &Path, _partial: u64) {
        self.scanned.fetch_add(1, Ordering::Relaxed);
    }

    fn pending_changed(&self, pending: usize) {
        self.pending.lock().unwrap().push(pending);
    }

    fn pool_started(&self, _workers: usize) {
        self.pools_started.fetch_add(1, Ordering::Relaxed);
    }
}
