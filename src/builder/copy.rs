//! Static asset copying.
//!
//! Each `[[copy]]` rule mirrors a source directory into a destination,
//! preserving relative paths and overwriting whatever is already there.
//! Files are copied verbatim and in parallel.

use std::path::{Path, PathBuf};

use anyhow::Result;
use glob::Pattern;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::{CopyRule, LogLevel};
use crate::util::diagnostic::{suggestions, KpackError};
use crate::util::fs::{clean_path, copy_file, ensure_dir, to_slash};
use crate::util::shell::Shell;

/// Totals for one or more copy rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    pub files: u64,
    pub bytes: u64,
    /// Files left out by `ignore` patterns
    pub skipped: u64,
}

impl CopyReport {
    fn merge(&mut self, other: CopyReport) {
        self.files += other.files;
        self.bytes += other.bytes;
        self.skipped += other.skipped;
    }
}

/// Run every rule in order. The first failure aborts; files already
/// copied stay in place.
pub fn copy_all(rules: &[CopyRule], shell: &Shell) -> Result<CopyReport> {
    let mut report = CopyReport::default();
    for rule in rules {
        report.merge(copy_rule(rule, shell)?);
    }
    Ok(report)
}

/// Mirror `rule.from` into `rule.to`. Paths must already be absolute.
pub fn copy_rule(rule: &CopyRule, shell: &Shell) -> Result<CopyReport> {
    if !rule.from.exists() {
        return Err(KpackError::NotFound {
            path: rule.from.clone(),
            help: Some(suggestions::MISSING_COPY_SOURCE.to_string()),
        }
        .into());
    }

    let ignore = ignore_patterns(rule)?;
    let (files, skipped) = collect_files(rule, &ignore)?;
    ensure_dir(&rule.to)?;

    if files.is_empty() {
        if skipped == 0 && rule.log_level >= LogLevel::Warn {
            warn!("copy source {} is empty", rule.from.display());
        } else if rule.log_level >= LogLevel::Info {
            info!("nothing to copy from {}", rule.from.display());
        }
        return Ok(CopyReport {
            skipped,
            ..CopyReport::default()
        });
    }

    let progress = shell.progress(files.len() as u64, "copying");
    let sizes = files
        .par_iter()
        .map(|(src, rel)| {
            let dst = rule.to.join(rel);
            let bytes = copy_file(src, &dst)?;
            match rule.log_level {
                LogLevel::Debug => debug!("copied {} ({} bytes)", to_slash(rel), bytes),
                LogLevel::Info => info!("copied {}", to_slash(rel)),
                LogLevel::Warn | LogLevel::Error => {}
            }
            progress.inc(1);
            Ok(bytes)
        })
        .collect::<Result<Vec<u64>>>();
    progress.finish();
    let sizes = sizes?;

    Ok(CopyReport {
        files: sizes.len() as u64,
        bytes: sizes.iter().sum(),
        skipped,
    })
}

/// Every file the rules would write, lexically cleaned. Rules whose source
/// does not exist contribute nothing; copying them reports the error.
pub fn destinations(rules: &[CopyRule]) -> Result<Vec<PathBuf>> {
    let mut planned = Vec::new();
    for rule in rules.iter().filter(|rule| rule.from.exists()) {
        let (files, _) = collect_files(rule, &ignore_patterns(rule)?)?;
        planned.extend(
            files
                .into_iter()
                .map(|(_, rel)| clean_path(&rule.to.join(rel))),
        );
    }
    Ok(planned)
}

fn ignore_patterns(rule: &CopyRule) -> Result<Vec<Pattern>> {
    let patterns = rule
        .ignore
        .iter()
        .map(|p| Pattern::new(p))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| KpackError::config(format!("invalid ignore pattern: {}", e)))?;
    Ok(patterns)
}

/// Files under the rule's source with their relative paths, sorted.
fn collect_files(rule: &CopyRule, ignore: &[Pattern]) -> Result<(Vec<(PathBuf, PathBuf)>, u64)> {
    if rule.from.is_file() {
        let name = rule
            .from
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default();
        return Ok((vec![(rule.from.clone(), name)], 0));
    }

    let mut files = Vec::new();
    let mut skipped = 0;
    // A destination nested inside the source is not copied into itself
    let nested = rule.to != rule.from && rule.to.starts_with(&rule.from);
    let walker = WalkDir::new(&rule.from)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !nested || e.depth() == 0 || !e.path().starts_with(&rule.to));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| rule.from.clone());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            KpackError::io(path, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(&rule.from)
            .unwrap_or(entry.path())
            .to_path_buf();
        let rel_str = to_slash(&rel);
        if ignore.iter().any(|p| p.matches(&rel_str)) {
            debug!("ignoring {}", rel_str);
            skipped += 1;
            continue;
        }
        files.push((entry.path().to_path_buf(), rel));
    }

    Ok((files, skipped))
}
