//! Config file discovery: name-filtered scans, repository discovery, and
//! same-name lookups, all built on [`FileWalker`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, instrument};

use crate::core::classify::ConfigFile;
use crate::infra::walk::FileWalker;

/// Collect every non-directory entry under `root` whose file name satisfies
/// `predicate`, pruning entries named in `ignored_names`.
pub fn scan<P, I, S, F>(root: P, ignored_names: I, predicate: F) -> Vec<PathBuf>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: Fn(&str) -> bool,
{
    FileWalker::new(ignored_names).walk_with_filter(root, predicate)
}

/// Compile the config file-name glob. Matching ignores ASCII case, as
/// `appsettings.Development.json` and `AppSettings.json` both occur.
pub fn config_matcher(glob: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(glob)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .with_context(|| format!("Invalid file_glob pattern: {glob}"))?;
    Ok(glob.compile_matcher())
}

/// Scan `root` for config files and classify each against `root`.
#[instrument(skip_all, fields(root = %root.display(), glob = %glob))]
pub fn scan_config_files(root: &Path, glob: &str, walker: &FileWalker) -> Result<Vec<ConfigFile>> {
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {}", root.display());
    }

    let matcher = config_matcher(glob)?;
    let files: Vec<ConfigFile> = walker
        .walk_with_filter(root, |name| matcher.is_match(name))
        .iter()
        .map(|path| ConfigFile::from_scan(path, root))
        .collect();

    debug!(count = files.len(), "config files found");
    Ok(files)
}

/// Directories under `root` (root included) holding a `.git` entry, at
/// most `max_depth` levels down. Repositories nested inside another
/// discovered repository are not reported.
#[instrument(skip_all, fields(root = %root.display(), max_depth = max_depth))]
pub fn find_git_repositories(root: &Path, walker: &FileWalker, max_depth: usize) -> Vec<PathBuf> {
    let candidates = walker
        .clone()
        .with_max_depth(Some(max_depth))
        .walk_dirs(root, |dir| dir.join(".git").exists());

    // Sorted order puts every repository before anything nested in it.
    let mut repos: Vec<PathBuf> = Vec::new();
    for dir in candidates {
        if !repos.iter().any(|r| dir.starts_with(r)) {
            repos.push(dir);
        }
    }

    debug!(count = repos.len(), "repositories found");
    repos
}

/// Files under `root` whose name equals `name` exactly.
pub fn find_files_named(root: &Path, name: &str, walker: &FileWalker) -> Vec<PathBuf> {
    walker.walk_with_filter(root, |candidate| candidate == name)
}
