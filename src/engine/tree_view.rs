//! Text rendering of a directory tree (CLI `--tree`).

use log::debug;
use std::fmt::Write;
use std::path::Path;
use walkdir::WalkDir;

use super::tools::{display_name, is_hidden};

const INDENT: &str = "    |";
const BRANCH: &str = "---";

/// Render the tree under `root`, one entry per line, sorted by name.
///
/// Directories nest one [`INDENT`] deeper per level; files show their size in bytes and links
/// are marked with `@` and never followed. Hidden directories (dot names) are skipped with
/// their subtree. Unreadable entries are left out.
pub fn render_tree(root: &Path) -> String {
    let mut out = String::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_hidden(e.path())));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("tree: skipping {}", e);
                continue;
            }
        };
        let name = display_name(entry.path());
        if entry.depth() == 0 {
            let _ = writeln!(out, "{}", name);
            continue;
        }
        let prefix = INDENT.repeat(entry.depth());
        let ft = entry.file_type();
        let _ = if ft.is_symlink() {
            writeln!(out, "{}{}{}@", prefix, BRANCH, name)
        } else if ft.is_file() {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            writeln!(out, "{}{}{} {}", prefix, BRANCH, name, size)
        } else {
            writeln!(out, "{}{}{}", prefix, BRANCH, name)
        };
    }
    out
}
