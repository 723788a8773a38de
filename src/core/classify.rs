//! Environment and project classification for discovered config files.

use std::path::{Component, Path, PathBuf};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Environment reported for files without an environment token.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Key whose value is stored encrypted by the service configs.
pub const ENCRYPTED_FIELD: &str = "AppSettingvalue";

/// A config file found by a scan. Identity is `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub filename: String,
    pub environment: String,
    pub project: String,
    pub hierarchy: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub environment: String,
    pub project: String,
    pub hierarchy: Vec<String>,
}

impl ConfigFile {
    pub fn from_scan(file: &Path, root: &Path) -> Self {
        let Classification { environment, project, hierarchy } = classify(file, root);
        Self {
            path: file.to_path_buf(),
            filename: file_name(file),
            environment,
            project,
            hierarchy,
        }
    }
}

/// `appsettings.Dev.json` → `Dev`; `appsettings.json` → `default`.
pub fn environment_of(filename: &str) -> String {
    let lower = filename.to_ascii_lowercase();
    if !lower.starts_with("appsettings") {
        return DEFAULT_ENVIRONMENT.to_string();
    }

    let mut parts = filename.split('.');
    parts.next();
    match (parts.next(), parts.next()) {
        (Some(env), Some(_)) if !env.is_empty() => env.to_string(),
        _ => DEFAULT_ENVIRONMENT.to_string(),
    }
}

pub fn is_encrypted_field(key: &str) -> bool {
    key == ENCRYPTED_FIELD
}

fn is_api_segment(segment: &str) -> bool {
    segment.to_ascii_uppercase().contains("API")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory names between `root` and the file, top down.
fn relative_dirs(file: &Path, root: &Path) -> Vec<String> {
    let dir = file.parent().unwrap_or(file);
    dir.strip_prefix(root)
        .unwrap_or(dir)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

pub fn classify(file: &Path, root: &Path) -> Classification {
    let environment = environment_of(&file_name(file));
    let dirs = relative_dirs(file, root);
    let root_name = file_name(root);

    if let Some(idx) = dirs.iter().position(|s| is_api_segment(s)) {
        return Classification {
            environment,
            project: dirs[idx].clone(),
            hierarchy: dirs[..=idx].iter().unique().cloned().collect(),
        };
    }

    if root_name.contains("API") {
        return Classification {
            environment,
            project: root_name.clone(),
            hierarchy: vec![root_name],
        };
    }

    let project = file.parent().map(file_name).unwrap_or_default();
    let hierarchy = if dirs.is_empty() {
        vec![project.clone()]
    } else {
        dirs.into_iter().unique().collect()
    };

    Classification { environment, project, hierarchy }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_tokens() {
        assert_eq!(environment_of("appsettings.Dev.json"), "Dev");
        assert_eq!(environment_of("AppSettings.Production.json"), "Production");
        assert_eq!(environment_of("appsettings.json"), "default");
        assert_eq!(environment_of("appsettings..json"), "default");
        assert_eq!(environment_of("appsettings.Dev.Local.json"), "Dev");
        assert_eq!(environment_of("settings.Dev.json"), "default");
    }

    #[test]
    fn file_at_api_root() {
        let root = Path::new("/work/MyProj_API");
        let c = classify(&root.join("appsettings.Dev.json"), root);

        assert_eq!(c.environment, "Dev");
        assert_eq!(c.project, "MyProj_API");
        assert_eq!(c.hierarchy, vec!["MyProj_API"]);
    }

    #[test]
    fn api_segment_below_root() {
        let root = Path::new("/work/services");
        let c = classify(&root.join("billing/Billing.Api/config/appsettings.json"), root);

        assert_eq!(c.project, "Billing.Api");
        assert_eq!(c.hierarchy, vec!["billing", "Billing.Api"]);
        assert_eq!(c.environment, "default");
    }

    #[test]
    fn falls_back_to_parent_directory() {
        let root = Path::new("/work/tools");
        let nested = classify(&root.join("worker/settings/appsettings.Qa.json"), root);
        assert_eq!(nested.project, "settings");
        assert_eq!(nested.hierarchy, vec!["worker", "settings"]);

        let at_root = classify(&root.join("appsettings.json"), root);
        assert_eq!(at_root.project, "tools");
        assert_eq!(at_root.hierarchy, vec!["tools"]);
    }

    #[test]
    fn hierarchy_is_duplicate_free() {
        let root = Path::new("/r");
        let c = classify(&root.join("app/app/app_api/appsettings.json"), root);
        assert_eq!(c.hierarchy, vec!["app", "app_api"]);
    }

    #[test]
    fn encrypted_field_is_exact() {
        assert!(is_encrypted_field("AppSettingvalue"));
        assert!(!is_encrypted_field("AppSettingValue"));
    }

    #[test]
    fn config_file_snapshot() {
        let root = Path::new("/repos");
        let file = ConfigFile::from_scan(&root.join("Orders_API/src/appsettings.Staging.json"), root);

        insta::assert_yaml_snapshot!(file, @r#"
        path: /repos/Orders_API/src/appsettings.Staging.json
        filename: appsettings.Staging.json
        environment: Staging
        project: Orders_API
        hierarchy:
          - Orders_API
        "#);
    }
}
