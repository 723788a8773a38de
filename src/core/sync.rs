//! Propagate a config file's changes to same-named files in sibling
//! projects.
//!
//! The project root is the nearest ancestor holding a project marker; the
//! search then widens a fixed number of levels above it so neighbouring
//! projects are included. Targets are processed one by one; a failure
//! leaves earlier writes in place.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::patch::{PendingChange, apply_changes};
use crate::core::scan::find_files_named;
use crate::infra::config::Config;
use crate::infra::io::{overwrite_existing, read_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SyncMode {
    /// Re-apply the dotted-path changes to each target's own text
    #[default]
    Patch,
    /// Copy the source file's text over each target
    Overwrite,
}

/// What to do to every target.
#[derive(Debug, Clone)]
pub enum SyncAction {
    Patch(Vec<PendingChange>),
    Overwrite(String),
}

/// Per-item outcome of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub path: PathBuf,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Success/failure tally for a sequential, non-transactional batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeed(&mut self, path: impl Into<PathBuf>, detail: Option<String>) {
        self.items.push(BatchItem { path: path.into(), ok: true, detail });
    }

    pub fn fail(&mut self, path: impl Into<PathBuf>, detail: impl Into<String>) {
        self.items.push(BatchItem { path: path.into(), ok: false, detail: Some(detail.into()) });
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// One-line outcome. `verb` is the bare form, e.g. "update".
    pub fn summary(&self, verb: &str) -> String {
        let past = if verb.ends_with('e') { format!("{verb}d") } else { format!("{verb}ed") };
        match (self.succeeded(), self.failed()) {
            (0, 0) => "Nothing to do".to_string(),
            (ok, 0) => format!("Successfully {past} {ok} files"),
            (0, failed) => format!("Failed to {verb} any files ({failed} failed)"),
            (ok, failed) => format!("{} {ok} files, but {failed} failed", capitalize(&past)),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Source, roots, and the files a sync would touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub source: PathBuf,
    pub project_root: PathBuf,
    pub search_root: PathBuf,
    pub targets: Vec<PathBuf>,
}

fn matches_marker(name: &str, marker: &str) -> bool {
    match marker.strip_prefix('*') {
        Some(suffix) => name.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()),
        None => name.eq_ignore_ascii_case(marker),
    }
}

fn has_marker(dir: &Path, markers: &[String]) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|e| {
        let name = e.file_name();
        let name = name.to_string_lossy();
        markers.iter().any(|m| matches_marker(&name, m))
    })
}

/// Nearest ancestor of `file` (its own directory first, at most `levels`
/// directories) holding a project marker. Without one, the parent of the
/// file's directory.
pub fn find_project_root(file: &Path, markers: &[String], levels: usize) -> PathBuf {
    let dir = file.parent().unwrap_or(file);
    if let Some(found) = dir.ancestors().take(levels).find(|d| has_marker(d, markers)) {
        return found.to_path_buf();
    }
    dir.parent().unwrap_or(dir).to_path_buf()
}

/// `levels` directories above `project_root`, stopping at the filesystem
/// root.
pub fn search_root(project_root: &Path, levels: usize) -> PathBuf {
    project_root
        .ancestors()
        .take(levels + 1)
        .last()
        .unwrap_or(project_root)
        .to_path_buf()
}

/// Locate same-named files around `source`'s project.
#[instrument(skip_all, fields(source = %source.display()))]
pub fn plan_sync(source: &Path, config: &Config) -> Result<SyncPlan> {
    let source = dunce::canonicalize(source).with_context(|| format!("File not found: {}", source.display()))?;
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Source has no file name")?;

    let project_root = find_project_root(&source, &config.sync.project_markers, config.sync.project_levels);
    let search_root = search_root(&project_root, config.sync.search_levels);
    debug!(project_root = %project_root.display(), search_root = %search_root.display(), "sync roots");

    let targets = find_files_named(&search_root, &name, &config.walker())
        .into_iter()
        .filter(|p| dunce::canonicalize(p).map_or(true, |c| c != source))
        .collect();

    Ok(SyncPlan { source, project_root, search_root, targets })
}

/// Apply `action` to every target in order.
#[instrument(skip_all, fields(targets = targets.len()))]
pub fn sync_files(targets: &[PathBuf], action: &SyncAction, dry_run: bool) -> BatchReport {
    let mut report = BatchReport::default();

    for target in targets {
        match sync_one(target, action, dry_run) {
            Ok(detail) => report.succeed(target, detail),
            Err(err) => {
                let message = format!("{err:#}");
                warn!(target = %target.display(), error = %message, "sync failed");
                report.fail(target, message);
            }
        }
    }

    info!(ok = report.succeeded(), failed = report.failed(), "sync finished");
    report
}

fn sync_one(target: &Path, action: &SyncAction, dry_run: bool) -> Result<Option<String>> {
    let (text, detail) = match action {
        SyncAction::Overwrite(source_text) => (source_text.clone(), None),
        SyncAction::Patch(changes) => {
            let current = read_text(target)?;
            let outcome = apply_changes(&current, changes);
            if outcome.applied.is_empty() && !changes.is_empty() {
                anyhow::bail!("None of the {} changes could be located", changes.len());
            }
            let detail = (!outcome.skipped.is_empty()).then(|| {
                let paths: Vec<&str> = outcome.skipped.iter().map(|s| s.path.as_str()).collect();
                format!("skipped {}", paths.join(", "))
            });
            if outcome.text == current {
                return Ok(Some(detail.unwrap_or_else(|| "already up to date".to_string())));
            }
            (outcome.text, detail)
        }
    };

    if !dry_run {
        overwrite_existing(target, &text)?;
    }
    Ok(detail)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, rel: &str, body: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    /// workspace/
    ///   team/
    ///     Orders_API/Orders.csproj, Config/appsettings.Dev.json
    ///     Billing_API/Billing.csproj, Config/appsettings.Dev.json
    ///   Legacy/appsettings.Dev.json
    fn fixture() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let ws = tmp.path().join("workspace");
        write(&ws, "team/Orders_API/Orders.csproj", "");
        let source = write(&ws, "team/Orders_API/Config/appsettings.Dev.json", r#"{"Db": {"Port": 1}, "Name": "o"}"#);
        write(&ws, "team/Billing_API/Billing.csproj", "");
        write(&ws, "team/Billing_API/Config/appsettings.Dev.json", "{\n  // billing\n  \"Db\": {\"Port\": 9}\n}");
        write(&ws, "team/Billing_API/bin/appsettings.Dev.json", "{}");
        write(&ws, "Legacy/appsettings.Dev.json", r#"{"Other": true}"#);
        (tmp, source)
    }

    #[test]
    fn markers_match_case_insensitively() {
        assert!(matches_marker("Orders.CSPROJ", "*.csproj"));
        assert!(matches_marker("Program.cs", "program.cs"));
        assert!(!matches_marker("package.json.bak", "package.json"));
    }

    #[test]
    fn project_root_is_nearest_marked_ancestor() {
        let (tmp, source) = fixture();
        let markers = Config::default().sync.project_markers;

        let root = find_project_root(&source, &markers, 5);
        assert_eq!(root, tmp.path().join("workspace/team/Orders_API"));

        let lonely = write(tmp.path(), "a/b/c/appsettings.json", "{}");
        assert_eq!(find_project_root(&lonely, &markers, 2), tmp.path().join("a/b"));
    }

    #[test]
    fn search_root_stops_at_filesystem_root() {
        assert_eq!(search_root(Path::new("/a/b/c"), 2), PathBuf::from("/a"));
        assert_eq!(search_root(Path::new("/a"), 5), PathBuf::from("/"));
    }

    #[test]
    fn plan_excludes_source_and_ignored_dirs() {
        let (tmp, source) = fixture();
        let plan = plan_sync(&source, &Config::default()).unwrap();
        let ws = dunce::canonicalize(tmp.path().join("workspace")).unwrap();

        assert_eq!(plan.search_root, ws);
        assert_eq!(
            plan.targets,
            vec![ws.join("Legacy/appsettings.Dev.json"), ws.join("team/Billing_API/Config/appsettings.Dev.json")]
        );
    }

    #[test]
    fn patch_mode_keeps_target_formatting() {
        let (_tmp, source) = fixture();
        let plan = plan_sync(&source, &Config::default()).unwrap();

        let action = SyncAction::Patch(vec![PendingChange::new("Db.Port", json!(5432))]);
        let report = sync_files(&plan.targets, &action, false);

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.summary("update"), "Updated 1 files, but 1 failed");
        assert_eq!(
            fs::read_to_string(&plan.targets[1]).unwrap(),
            "{\n  // billing\n  \"Db\": {\"Port\": 5432}\n}"
        );
        assert_eq!(fs::read_to_string(&plan.targets[0]).unwrap(), r#"{"Other": true}"#);
    }

    #[test]
    fn overwrite_mode_copies_text_and_dry_run_writes_nothing() {
        let (_tmp, source) = fixture();
        let plan = plan_sync(&source, &Config::default()).unwrap();
        let text = fs::read_to_string(&source).unwrap();
        let before = fs::read_to_string(&plan.targets[0]).unwrap();

        let report = sync_files(&plan.targets, &SyncAction::Overwrite(text.clone()), true);
        assert!(report.is_success());
        assert_eq!(fs::read_to_string(&plan.targets[0]).unwrap(), before);

        let report = sync_files(&plan.targets, &SyncAction::Overwrite(text.clone()), false);
        assert_eq!(report.summary("update"), "Successfully updated 2 files");
        for target in &plan.targets {
            assert_eq!(fs::read_to_string(target).unwrap(), text);
        }
    }

    #[test]
    fn missing_target_is_a_failed_item() {
        let tmp = TempDir::new().unwrap();
        let report = sync_files(&[tmp.path().join("gone.json")], &SyncAction::Overwrite("{}".into()), false);

        assert!(!report.is_success());
        assert_eq!(report.summary("update"), "Failed to update any files (1 failed)");
        assert!(!tmp.path().join("gone.json").exists());
    }
}
