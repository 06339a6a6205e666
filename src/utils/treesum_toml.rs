//! Load `.treesum.toml` from a directory (CLI only). Lib callers pass `AggregateOpts` directly.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct TreesumToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    strategy: Option<String>,
    threads: Option<usize>,
    /// Seconds.
    timeout: Option<f64>,
    /// Seconds.
    task_timeout: Option<f64>,
    reducer: Option<String>,
    repeat: Option<usize>,
    verbose: Option<bool>,
    json: Option<bool>,
}

/// Parse config text. Errors name the offending field.
pub fn parse_treesum_toml(s: &str) -> Result<TreesumToml> {
    toml::from_str(s).context("parse config")
}

/// Load `.treesum.toml` from `dir`. Ok(None) when there is no such file.
pub fn load_treesum_toml(dir: &Path) -> Result<Option<TreesumToml>> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    parse_treesum_toml(&s)
        .with_context(|| path.display().to_string())
        .map(Some)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident => $opts_field:ident) => {
        if let Some(v) = $section.$field {
            $opts.$opts_field = v;
        }
    };
}

/// Seconds from config or flags as a Duration. Negative, NaN or overflowing values are errors.
pub fn secs_to_duration(field: &str, v: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(v).map_err(|e| anyhow!("{}: {}", field, e))
}

/// Apply file config to opts (only set fields present in the file). Call before applying CLI.
pub fn apply_file_to_opts(file: &TreesumToml, opts: &mut Opts) -> Result<()> {
    let section = &file.settings;
    if let Some(ref s) = section.strategy {
        opts.strategy = s.parse().map_err(|e: String| anyhow!(e))?;
    }
    if let Some(ref s) = section.reducer {
        opts.reducer = s.parse().map_err(|e: String| anyhow!(e))?;
    }
    if let Some(n) = section.threads {
        opts.threads = Some(n);
    }
    if let Some(t) = section.timeout {
        opts.timeout = Some(secs_to_duration("timeout", t)?);
    }
    if let Some(t) = section.task_timeout {
        opts.task_timeout = secs_to_duration("task_timeout", t)?;
    }
    apply_file_opt!(section, opts, repeat => repeat);
    apply_file_opt!(section, opts, verbose => verbose);
    apply_file_opt!(section, opts, json => json);
    Ok(())
}
