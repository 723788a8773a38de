//! Filepath: src/infra/walk.rs
//! Name-based directory walker for config discovery.
//! - Skips entries whose name is in the ignore list (exact, case-sensitive)
//! - Applies the caller's predicate to non-directory entries only
//! - Never follows symbolic links, so link cycles cannot recurse
//! - Optional max depth (used by repository discovery)
//! - Unreadable directories are logged and skipped; the walk goes on
//! - Deterministic ordering for stable tests/CI
//!
//! Backed by ripgrep's `ignore` crate with every gitignore-style filter
//! turned off: config files are frequently git-ignored and still have to
//! be found.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use ignore::{DirEntry, WalkBuilder};
use tracing::{debug, warn};

/// Directory names skipped by default during scans.
pub const DEFAULT_IGNORED_NAMES: &[&str] = &[".git", "node_modules", "bin", "obj", "dist", "build"];

/// Walker pruning entries by exact name.
#[derive(Debug, Clone)]
pub struct FileWalker
{
    /// Entry names never yielded nor descended into
    ignored_names: Arc<BTreeSet<String>>,

    /// Maximum recursion depth; default None (unbounded)
    max_depth: Option<usize>,
}

impl Default for FileWalker
{
    fn default() -> Self
    {
        Self::new(
            DEFAULT_IGNORED_NAMES
                .iter()
                .map(|s| s.to_string()),
        )
    }
}

impl FileWalker
{
    /// Build a walker skipping the given entry names (e.g. ".git",
    /// "node_modules"). Names match a single path component exactly.
    pub fn new<I, S>(ignored_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored_names: Arc::new(
                ignored_names
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            ),
            max_depth: None,
        }
    }

    /// (Optional) Limit recursion depth (`None` = unbounded).
    /// Depth 0 is the root itself.
    pub fn with_max_depth(
        mut self,
        depth: Option<usize>,
    ) -> Self
    {
        self.max_depth = depth;
        self
    }

    /// Names this walker prunes.
    pub fn ignored_names(&self) -> impl Iterator<Item = &str>
    {
        self.ignored_names
            .iter()
            .map(String::as_str)
    }

    /// Internal: construct a configured WalkBuilder for `root`.
    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // Plain traversal: no hidden/gitignore/.ignore/parent filtering.
        b.standard_filters(false);

        // Never recurse through links; a link is reported as a plain entry.
        b.follow_links(false);
        b.max_depth(self.max_depth);

        // Depth-first, sorted by name for deterministic output.
        b.sort_by_file_name(|a, b| a.cmp(b));

        let ignored = Arc::clone(&self.ignored_names);
        b.filter_entry(move |ent: &DirEntry| {
            // The root is always walked, whatever its name.
            if ent.depth() == 0
            {
                return true;
            }

            let name = ent
                .file_name()
                .to_string_lossy();
            !ignored.contains(name.as_ref())
        });

        b
    }

    /// Traverse `root` and return every non-directory entry whose file
    /// name satisfies `predicate`. Returns a **sorted** list.
    pub fn walk_with_filter<P, F>(
        &self,
        root: P,
        predicate: F,
    ) -> Vec<PathBuf>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> bool,
    {
        let root_path = root.as_ref();
        let mut out = Vec::new();

        for res in self
            .build_walk(root_path)
            .build()
        {
            let entry = match res
            {
                Ok(entry) => entry,
                Err(err) =>
                {
                    // Permissions, races: keep the partial result.
                    warn!(root = %root_path.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            let is_dir = entry
                .file_type()
                .is_some_and(|ft| ft.is_dir());
            if is_dir
            {
                continue;
            }

            let name = entry
                .file_name()
                .to_string_lossy();
            if predicate(name.as_ref())
            {
                out.push(entry.into_path());
            }
        }

        out.sort();
        debug!(root = %root_path.display(), found = out.len(), "walk finished");

        out
    }

    /// Traverse `root` and return every directory (root included) that
    /// satisfies `predicate`. Returns a **sorted** list.
    pub fn walk_dirs<P, F>(
        &self,
        root: P,
        predicate: F,
    ) -> Vec<PathBuf>
    where
        P: AsRef<Path>,
        F: Fn(&Path) -> bool,
    {
        let root_path = root.as_ref();
        let mut out: Vec<PathBuf> = self
            .build_walk(root_path)
            .build()
            .filter_map(|res| match res
            {
                Ok(entry) => Some(entry),
                Err(err) =>
                {
                    warn!(root = %root_path.display(), error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_dir())
            })
            .map(DirEntry::into_path)
            .filter(|p| predicate(p))
            .collect();

        out.sort();
        out
    }
}
