//! Utilities for name ordering, input path collection and size formatting.

use crate::error::{Result, StitchError};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use walkdir::WalkDir;

/// Compare two display names the way people expect file lists to sort.
///
/// Accents are folded to their base letters, then the names compare
/// case-insensitively with digit runs ordered by numeric value, so
/// `"file2"` sorts before `"file10"` and `"éclair"` before `"file"`.
/// Names that are equal under those rules fall back to a plain byte
/// comparison so the ordering stays total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natord::compare_ignore_case(&fold_diacritics(a), &fold_diacritics(b)).then_with(|| a.cmp(b))
}

fn fold_diacritics(name: &str) -> String {
    name.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Expand input arguments into PDF file paths.
///
/// Each argument may be:
/// - a directory, scanned recursively for `*.pdf` files (sorted naturally)
/// - a glob pattern such as `"./docs/*.pdf"`
/// - a plain file path
///
/// Order across arguments is preserved.
///
/// Errors:
/// - Propagates `glob` parse errors.
/// - Propagates filesystem errors from directory walking.
pub fn collect_paths_for_patterns<T>(patterns: T) -> Result<Vec<PathBuf>>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    let mut resolved_paths = Vec::new();

    for pattern in patterns.into_iter() {
        let pattern = pattern.as_ref();
        let as_path = PathBuf::from(pattern);
        if as_path.is_dir() {
            resolved_paths.extend(collect_paths_in_dir(&as_path)?);
        } else {
            resolved_paths.extend(collect_paths_for_pattern(pattern)?);
        }
    }

    Ok(resolved_paths)
}

fn collect_paths_for_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut resolved_paths = Vec::new();

    let paths = glob::glob(pattern).map_err(|err| {
        StitchError::validation(format!("Invalid input pattern '{pattern}': {err}"))
    })?;

    for entry in paths {
        let path = entry.map_err(|err| StitchError::Io {
            source: err.into_error(),
        })?;
        resolved_paths.push(path);
    }

    // A literal path that matched nothing is reported instead of dropped.
    if resolved_paths.is_empty() && !pattern.contains(['*', '?', '[']) {
        return Err(StitchError::not_found(format!("input file {pattern}")));
    }

    Ok(resolved_paths)
}

fn collect_paths_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|err| StitchError::Io {
            source: err.into(),
        })?;
        let is_pdf = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if entry.file_type().is_file() && is_pdf {
            paths.push(entry.into_path());
        }
    }
    paths.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(paths)
}

/// Format a byte count as a human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
