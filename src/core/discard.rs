//! Discard working-tree edits to config files, in one repository or in
//! every repository next to it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::classify::environment_of;
use crate::core::git::{CONFIG_FILE_PATTERN, GitBackend, GitRepository, discard_changes, list_tracked_matching};
use crate::core::scan::find_git_repositories;
use crate::core::sync::{BatchReport, search_root};
use crate::infra::config::Config;

/// Levels above the current repository searched for sibling repositories.
const SIBLING_LEVELS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscardScope {
    /// Only the repository holding the target
    #[default]
    Current,
    /// Every repository found near the target's repository
    AllRepos,
}

/// Files to restore in one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoFiles {
    pub repo: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Repositories in scope for `target` (a file or directory).
#[instrument(skip_all, fields(target = %target.display(), scope = ?scope))]
pub fn resolve_repositories(
    backend: &dyn GitBackend,
    target: &Path,
    scope: DiscardScope,
    config: &Config,
) -> Result<Vec<GitRepository>> {
    let current = backend.find_root(target)?;

    if scope == DiscardScope::Current {
        return Ok(vec![current]);
    }

    let parent = search_root(&current.root, SIBLING_LEVELS);
    let found = find_git_repositories(&parent, &config.walker(), config.git.max_depth);
    if found.is_empty() {
        warn!(parent = %parent.display(), "no repositories found nearby, using the current one");
        return Ok(vec![current]);
    }
    Ok(found.into_iter().map(GitRepository::new).collect())
}

/// Tracked config files per repository, optionally limited to one
/// environment (case-insensitive). Repositories without files are left
/// out.
pub fn collect_files(
    backend: &dyn GitBackend,
    repos: &[GitRepository],
    environment: Option<&str>,
    config: &Config,
) -> Result<Vec<RepoFiles>> {
    let pattern = Regex::new(CONFIG_FILE_PATTERN).context("Invalid config file pattern")?;
    let walker = config.walker();

    let groups = repos
        .iter()
        .map(|repo| {
            let files: Vec<PathBuf> = list_tracked_matching(backend, repo, &pattern, &walker)
                .into_iter()
                .filter(|f| environment.is_none_or(|env| file_environment(f).eq_ignore_ascii_case(env)))
                .collect();
            RepoFiles { repo: repo.root.clone(), files }
        })
        .filter(|group| !group.files.is_empty())
        .collect();

    Ok(groups)
}

fn file_environment(path: &Path) -> String {
    environment_of(&path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default())
}

/// Discard each group with one git call. Every file of a group shares
/// that call's outcome.
#[instrument(skip_all, fields(repos = groups.len()))]
pub fn discard_groups(backend: &dyn GitBackend, groups: &[RepoFiles], dry_run: bool) -> BatchReport {
    let mut report = BatchReport::default();

    for group in groups {
        let result = if dry_run {
            Ok(())
        } else {
            discard_changes(backend, &GitRepository::new(&group.repo), &group.files)
        };

        match result {
            Ok(()) => group.files.iter().for_each(|f| report.succeed(f, None)),
            Err(err) => {
                warn!(repo = %group.repo.display(), error = %err, "discard failed");
                let message = err.to_string();
                group.files.iter().for_each(|f| report.fail(f, message.clone()));
            }
        }
    }

    info!(ok = report.succeeded(), failed = report.failed(), "discard finished");
    report
}
