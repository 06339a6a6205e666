//! Tree walker: the filesystem collaborator and the single-directory scan every strategy shares.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use crate::engine::reducer::merge;
use crate::error::AbsorbedErrorKind;
use crate::{FileEntry, FileKind};

use super::context::TraversalContext;

/// Filesystem operations the engine needs. Every method may fail with an I/O error.
pub trait FileSystem: Send + Sync {
    /// Immediate entries of `dir`, classified without following symbolic links.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<FileEntry>>;

    /// Kind of `path`. With `follow_links` the target of a link is classified instead.
    fn kind_of(&self, path: &Path, follow_links: bool) -> io::Result<FileKind>;

    /// Size in bytes of `path`, without following links.
    fn size(&self, path: &Path) -> io::Result<u64>;

    /// Open a regular file for reading (used by content reducers).
    fn open(&self, path: &Path) -> io::Result<File> {
        File::open(path)
    }
}

/// The local filesystem via `std::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<FileEntry>> {
        fs::read_dir(dir)?
            .map(|res| {
                let entry = res?;
                // DirEntry::file_type does not traverse links.
                let kind = FileKind::from(entry.file_type()?);
                Ok(FileEntry {
                    path: entry.path(),
                    kind,
                })
            })
            .collect()
    }

    fn kind_of(&self, path: &Path, follow_links: bool) -> io::Result<FileKind> {
        let meta = if follow_links {
            fs::metadata(path)?
        } else {
            fs::symlink_metadata(path)?
        };
        Ok(FileKind::from(meta.file_type()))
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::symlink_metadata(path)?.len())
    }
}

/// Result of listing one directory: reduced files plus the subdirectories still to visit.
#[derive(Debug, Default)]
pub struct DirScan {
    pub partial: u64,
    pub subdirs: Vec<PathBuf>,
}

/// List `dir`, reduce its regular files and push its subdirectories onto `subdirs`.
///
/// Returns the partial aggregate of this directory alone. A listing failure is absorbed: it is
/// recorded in the error log and the directory contributes 0 with no subdirectories. A file
/// whose reduction fails contributes 0 on its own. Links and special files are never followed.
pub fn scan_dir(ctx: &TraversalContext, dir: &Path, subdirs: &mut Vec<PathBuf>) -> u64 {
    let entries = match ctx.fs.list_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            ctx.errors.record(dir, AbsorbedErrorKind::ListDir, &err);
            return 0;
        }
    };
    ctx.stats.directories.fetch_add(1, Ordering::Relaxed);

    let mut partial = 0_u64;
    for entry in entries {
        match entry.kind {
            FileKind::Directory => subdirs.push(entry.path),
            FileKind::RegularFile => match ctx.reducer.reduce_file(ctx.fs.as_ref(), &entry) {
                Ok(v) => {
                    ctx.stats.files.fetch_add(1, Ordering::Relaxed);
                    partial = merge(partial, v);
                }
                Err(err) => ctx
                    .errors
                    .record(&entry.path, AbsorbedErrorKind::ReduceFile, &err),
            },
            FileKind::SymbolicLink => {
                ctx.stats.symlinks.fetch_add(1, Ordering::Relaxed);
                partial = merge(partial, ctx.reducer.reduce_link(&entry));
            }
            FileKind::Other => {
                ctx.stats.other.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    if let Some(obs) = &ctx.observer {
        obs.directory_scanned(dir, partial);
    }
    partial
}

/// Owned variant of [`scan_dir`] for tasks that hand their listing back to a coordinator.
pub fn scan_dir_owned(ctx: &TraversalContext, dir: &Path) -> DirScan {
    let mut subdirs = Vec::new();
    let partial = scan_dir(ctx, dir, &mut subdirs);
    DirScan { partial, subdirs }
}
