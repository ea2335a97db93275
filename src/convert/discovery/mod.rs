// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Input discovery.
//!
//! Walks the input root in parallel with `ignore::WalkParallel`, keeps
//! `.dgn`/`.dwg` files (extension compared case-insensitively), drops
//! anything matching an exclude glob and returns the rest sorted so runs
//! are reproducible.
//!
//! Hidden files are included and ignore files are not honoured: a design
//! archive is not a source tree.

use bon::Builder;
use flume::unbounded;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};
use wax::{Glob, Program};

use crate::error::{FsError, Result};

/// Extensions accepted as converter input.
pub const INPUT_EXTENSIONS: [&str; 2] = ["dgn", "dwg"];

/// Options for input discovery.
#[derive(Debug, Clone, Default, Builder)]
pub struct DiscoveryOptions {
    /// Glob patterns, relative to the input root, to leave out.
    #[builder(setters(name = with_exclude), default)]
    exclude: Vec<String>,
}

impl DiscoveryOptions {
    #[must_use]
    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }
}

/// Files found below an input root.
#[derive(Debug, Default)]
pub struct Discovery {
    files: Vec<PathBuf>,
    excluded: usize,
    error_count: usize,
}

impl Discovery {
    /// Input files in path order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[must_use]
    pub fn into_files(self) -> Vec<PathBuf> {
        self.files
    }

    /// Number of inputs dropped by exclude globs.
    #[must_use]
    pub const fn excluded(&self) -> usize {
        self.excluded
    }

    /// Number of entries the walker could not read.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.error_count
    }
}

/// Returns `true` if `path` has a `.dgn` or `.dwg` extension in any case.
#[must_use]
pub fn is_input_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| INPUT_EXTENSIONS.iter().any(|x| ext.eq_ignore_ascii_case(x)))
}

/// Directory links are not followed, so a link cycle cannot loop the walk.
fn build_walker(root: &Path) -> WalkBuilder {
    let mut builder = WalkBuilder::new(root);

    builder.follow_links(false);
    builder.hidden(false);
    builder.ignore(false);
    builder.parents(false);
    builder.git_ignore(false);
    builder.git_global(false);
    builder.git_exclude(false);

    builder
}

/// A regular file, or a link that resolves to one.
fn is_regular_file(entry: &ignore::DirEntry) -> bool {
    if entry.path_is_symlink() {
        return entry.path().is_file();
    }
    entry.file_type().is_some_and(|ft| ft.is_file())
}

fn compile_excludes(patterns: &[String]) -> Result<Vec<Glob<'_>>> {
    patterns
        .iter()
        .map(|pattern| {
            Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid exclude pattern '{pattern}': {e}"))
        })
        .collect()
}

/// Finds every convertible file below `root`.
///
/// # Errors
///
/// Returns `FsError::NotFound`/`FsError::NotADirectory` if `root` is not an
/// existing directory, or an error if an exclude pattern is not a valid glob.
pub fn discover(root: &Path, options: &DiscoveryOptions) -> Result<Discovery> {
    if !root.exists() {
        return Err(FsError::NotFound(root.display().to_string()).into());
    }
    if !root.is_dir() {
        return Err(FsError::NotADirectory(root.display().to_string()).into());
    }

    let excludes = compile_excludes(options.exclude())?;

    let (file_tx, file_rx) = unbounded::<PathBuf>();
    let error_count = Arc::new(AtomicUsize::new(0));

    build_walker(root).build_parallel().run(|| {
        let file_tx = file_tx.clone();
        let error_count = Arc::clone(&error_count);

        Box::new(move |entry_result| {
            match entry_result {
                Ok(entry) => {
                    if is_regular_file(&entry) && is_input_file(entry.path()) {
                        let _ = file_tx.send(entry.into_path());
                    }
                }
                Err(e) => {
                    warn!(error = %e, "walk error");
                    error_count.fetch_add(1, Ordering::Relaxed);
                }
            }
            ignore::WalkState::Continue
        })
    });
    drop(file_tx);

    let mut files = Vec::new();
    let mut excluded = 0;
    for path in file_rx.iter() {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        if excludes.iter().any(|glob| glob.is_match(relative)) {
            debug!(file = %relative.display(), "excluded");
            excluded += 1;
        } else {
            files.push(path);
        }
    }
    files.sort();

    Ok(Discovery {
        files,
        excluded,
        error_count: error_count.load(Ordering::Relaxed),
    })
}
