//! Session state: the persisted last-folder snapshot, the workspace that
//! owns it, and per-file edit sessions.
//!
//! Lifecycle events map onto explicit calls instead of global state:
//! folder selected → [`Workspace::select_folder`], file loaded →
//! [`EditSession::load`], file saved → [`EditSession::save`].

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::core::classify::ConfigFile;
use crate::core::patch::{PatchOutcome, PendingChange, SkippedChange, apply_changes, set_path};
use crate::core::scan::scan_config_files;
use crate::core::tolerant::{self, ParseOutcome};
use crate::infra::config::Config;
use crate::infra::io::{read_text, write_atomic};

/// State key holding the last scanned folder.
pub const LAST_FOLDER_KEY: &str = "lastFolder";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to access state file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state entry `{key}` has an unexpected shape: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write state file {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

/// Result of one folder scan, persisted under [`LAST_FOLDER_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSnapshot {
    pub path: PathBuf,
    pub files: Vec<ConfigFile>,
    #[serde(default)]
    pub scanned_at: DateTime<Utc>,
}

/// JSON key-value file. Every access holds an advisory lock on a sibling
/// `.lock` file; writes replace the file atomically.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> SessionError {
        SessionError::Io { path: self.path.clone(), source }
    }

    fn lock_file(&self) -> Result<RwLock<fs::File>, SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let mut lock_path = self.path.clone().into_os_string();
        lock_path.push(".lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(PathBuf::from(lock_path))
            .map_err(|e| self.io_err(e))?;
        Ok(RwLock::new(file))
    }

    fn read_map(&self) -> Result<Map<String, Value>, SessionError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&text).map_err(|source| SessionError::Corrupt { path: self.path.clone(), source })
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), SessionError> {
        let text = serde_json::to_string_pretty(map)
            .map_err(|source| SessionError::Corrupt { path: self.path.clone(), source })?;
        write_atomic(&self.path, &text)
            .map_err(|e| SessionError::Write { path: self.path.clone(), message: format!("{e:#}") })
    }

    /// Read-modify-write under the exclusive lock.
    fn update<T>(&self, f: impl FnOnce(&mut Map<String, Value>) -> T) -> Result<T, SessionError> {
        let mut lock = self.lock_file()?;
        let _guard = lock.write().map_err(|e| self.io_err(e))?;

        let mut map = self.read_map()?;
        let out = f(&mut map);
        self.write_map(&map)?;
        Ok(out)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        let mut lock = self.lock_file()?;
        let _guard = lock.read().map_err(|e| self.io_err(e))?;

        match self.read_map()?.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v)
                .map(Some)
                .map_err(|source| SessionError::Decode { key: key.to_string(), source }),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        let value =
            serde_json::to_value(value).map_err(|source| SessionError::Decode { key: key.to_string(), source })?;
        self.update(|map| {
            map.insert(key.to_string(), value);
        })
    }

    /// Remove `key`; true when it was present.
    pub fn remove(&self, key: &str) -> Result<bool, SessionError> {
        self.update(|map| map.remove(key).is_some())
    }
}

/// Folder-level context: configuration plus the persisted snapshot.
#[derive(Debug, Clone)]
pub struct Workspace {
    config: Config,
    store: StateStore,
}

impl Workspace {
    pub fn new(config: Config, store: StateStore) -> Self {
        Self { config, store }
    }

    /// Workspace using the configured state file.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = StateStore::new(config.state_path()?);
        Ok(Self::new(config, store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scan `root`, classify what was found, and persist the snapshot.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn select_folder(&self, root: &Path) -> Result<FolderSnapshot> {
        let root = dunce::canonicalize(root).with_context(|| format!("Folder not found: {}", root.display()))?;
        let files = scan_config_files(&root, &self.config.file_glob, &self.config.walker())?;

        let snapshot = FolderSnapshot { path: root, files, scanned_at: Utc::now() };
        if let Err(err) = self.store.set(LAST_FOLDER_KEY, &snapshot) {
            // The scan result is still useful without persistence.
            warn!(error = %err, "could not persist last folder");
        }

        info!(files = snapshot.files.len(), "folder selected");
        Ok(snapshot)
    }

    /// The last persisted snapshot, if any.
    pub fn restore(&self) -> Result<Option<FolderSnapshot>, SessionError> {
        self.store.get(LAST_FOLDER_KEY)
    }

    pub fn clear(&self) -> Result<bool, SessionError> {
        self.store.remove(LAST_FOLDER_KEY)
    }
}

/// One loaded file: its original text, tolerant parse, and staged changes
/// keyed by dotted path (last write wins, first-staged order kept).
#[derive(Debug, Clone)]
pub struct EditSession {
    path: PathBuf,
    original: String,
    parsed: ParseOutcome,
    pending: IndexMap<String, Value>,
}

impl EditSession {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let original = read_text(&path)?;
        let parsed = tolerant::parse(&original);
        debug!(path = %path.display(), parsed = parsed.is_parsed(), "file loaded");

        Ok(Self { path, original, parsed, pending: IndexMap::new() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn outcome(&self) -> &ParseOutcome {
        &self.parsed
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn stage(&mut self, path: impl Into<String>, value: Value) {
        self.pending.insert(path.into(), value);
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }

    pub fn changes(&self) -> Vec<PendingChange> {
        self.pending
            .iter()
            .map(|(path, value)| PendingChange::new(path.clone(), value.clone()))
            .collect()
    }

    /// The patched text without touching the file.
    pub fn preview(&self) -> PatchOutcome {
        apply_changes(&self.original, &self.changes())
    }

    /// Parsed value with staged changes applied, for display.
    pub fn display_value(&self) -> Value {
        let mut value = self.parsed.clone().into_display_value();
        if self.parsed.is_parsed() {
            for (path, new) in &self.pending {
                set_path(&mut value, path, new.clone());
            }
        }
        value
    }

    /// Write staged changes to disk and start over from the new text.
    /// Nothing is written when no change could be applied.
    #[instrument(skip_all, fields(path = %self.path.display(), changes = self.pending.len()))]
    pub fn save(&mut self) -> Result<PatchOutcome> {
        let outcome = self.preview();
        if !outcome.applied.is_empty() {
            write_atomic(&self.path, &outcome.text)?;
            self.original = outcome.text.clone();
            self.parsed = tolerant::parse(&self.original);
        }
        self.pending.clear();
        info!(applied = outcome.applied.len(), skipped = outcome.skipped.len(), "file saved");
        Ok(outcome)
    }
}

/// Dotted-path change request for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub path: PathBuf,
    pub original_content: String,
    pub changed_paths: Vec<PendingChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedChange>,
}

impl SaveResponse {
    fn failure(err: &anyhow::Error) -> Self {
        Self { success: false, error: Some(format!("{err:#}")), applied: Vec::new(), skipped: Vec::new() }
    }
}

/// Patch `request.original_content` and write it to `request.path`.
/// Failures come back in the envelope; the file is left as it was.
#[instrument(skip_all, fields(path = %request.path.display()))]
pub fn save_file(request: &SaveRequest) -> SaveResponse {
    match try_save(request) {
        Ok(outcome) => SaveResponse { success: true, error: None, applied: outcome.applied, skipped: outcome.skipped },
        Err(err) => {
            let message = format!("{err:#}");
            warn!(error = %message, "save failed");
            SaveResponse::failure(&err)
        }
    }
}

fn try_save(request: &SaveRequest) -> Result<PatchOutcome> {
    let meta = fs::metadata(&request.path)
        .with_context(|| format!("Path does not point to a valid file: {}", request.path.display()))?;
    if !meta.is_file() {
        anyhow::bail!("Path does not point to a valid file: {}", request.path.display());
    }

    let outcome = apply_changes(&request.original_content, &request.changed_paths);
    if !outcome.applied.is_empty() {
        write_atomic(&request.path, &outcome.text)?;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::core::patch::SkipReason;

    fn workspace(tmp: &TempDir) -> Workspace {
        Workspace::new(Config::default(), StateStore::new(tmp.path().join("state/state.json")))
    }

    #[test]
    fn store_round_trips_and_removes() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join("nested/state.json"));

        assert_eq!(store.get::<Value>("k").unwrap(), None);
        store.set("k", &json!({ "a": 1 })).unwrap();
        store.set("other", &json!(true)).unwrap();

        assert_eq!(store.get::<Value>("k").unwrap(), Some(json!({ "a": 1 })));
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert_eq!(store.get::<bool>("other").unwrap(), Some(true));
    }

    #[test]
    fn corrupt_state_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let err = StateStore::new(&path).get::<Value>(LAST_FOLDER_KEY).unwrap_err();
        assert!(matches!(err, SessionError::Corrupt { .. }));
    }

    #[test]
    fn workspace_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repos/Pay_API");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("appsettings.Dev.json"), "{}").unwrap();
        let ws = workspace(&tmp);

        assert_eq!(ws.restore().unwrap(), None);

        let snap = ws.select_folder(&root).unwrap();
        assert_eq!(snap.files.len(), 1);
        assert_eq!(snap.files[0].environment, "Dev");

        let restored = ws.restore().unwrap().unwrap();
        assert_eq!(restored, snap);

        let raw: Value = serde_json::from_str(&fs::read_to_string(tmp.path().join("state/state.json")).unwrap()).unwrap();
        assert!(raw[LAST_FOLDER_KEY]["scannedAt"].is_string());

        assert!(ws.clear().unwrap());
        assert_eq!(ws.restore().unwrap(), None);
    }

    #[test]
    fn legacy_snapshot_without_timestamp_loads() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join("state.json"));
        store.set(LAST_FOLDER_KEY, &json!({ "path": "/r", "files": [] })).unwrap();

        let snap: FolderSnapshot = store.get(LAST_FOLDER_KEY).unwrap().unwrap();
        assert_eq!(snap.path, PathBuf::from("/r"));
        assert!(snap.files.is_empty());
    }

    #[test]
    fn edit_session_stages_and_saves() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("appsettings.json");
        fs::write(&file, "{\n  // db\n  \"Db\": { \"Port\": 1 },\n  \"Name\": \"a\"\n}\n").unwrap();

        let mut session = EditSession::load(&file).unwrap();
        session.stage("Name", json!("b"));
        session.stage("Db.Port", json!(2));
        session.stage("Name", json!("c"));

        assert_eq!(session.changes().len(), 2);
        assert_eq!(session.changes()[0].path, "Name");
        assert_eq!(session.display_value()["Name"], json!("c"));
        assert_eq!(fs::read_to_string(&file).unwrap(), session.original());

        let outcome = session.save().unwrap();
        assert!(outcome.is_complete());
        assert!(!session.has_changes());
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "{\n  // db\n  \"Db\": { \"Port\": 2 },\n  \"Name\": \"c\"\n}\n"
        );
        assert_eq!(session.outcome().value().unwrap()["Db"]["Port"], json!(2));
    }

    #[test]
    fn reset_discards_staged_changes() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.json");
        fs::write(&file, r#"{"A": 1}"#).unwrap();

        let mut session = EditSession::load(&file).unwrap();
        session.stage("A", json!(5));
        session.reset();

        assert!(session.save().unwrap().applied.is_empty());
        assert_eq!(fs::read_to_string(&file).unwrap(), r#"{"A": 1}"#);
    }

    #[test]
    fn save_request_uses_camel_case() {
        let req: SaveRequest = serde_json::from_value(json!({
            "path": "/x/appsettings.json",
            "originalContent": "{}",
            "changedPaths": [{ "path": "A.B", "value": 3 }]
        }))
        .unwrap();
        assert_eq!(req.changed_paths, vec![PendingChange::new("A.B", json!(3))]);
    }

    #[test]
    fn save_file_reports_per_change_results() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("appsettings.Dev.json");
        let original = r#"{"A": 1, "B": "x"} // keep"#;
        fs::write(&file, original).unwrap();

        let resp = save_file(&SaveRequest {
            path: file.clone(),
            original_content: original.to_string(),
            changed_paths: vec![PendingChange::new("B", json!("y")), PendingChange::new("Nope", json!(0))],
        });

        assert!(resp.success);
        assert_eq!(resp.applied, vec!["B".to_string()]);
        assert_eq!(resp.skipped[0].reason, SkipReason::NotFound);
        assert_eq!(fs::read_to_string(&file).unwrap(), r#"{"A": 1, "B": "y"} // keep"#);
    }

    #[test]
    fn save_file_rejects_directories() {
        let tmp = TempDir::new().unwrap();
        let resp = save_file(&SaveRequest {
            path: tmp.path().to_path_buf(),
            original_content: "{}".into(),
            changed_paths: vec![],
        });

        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("valid file"));
    }
}
