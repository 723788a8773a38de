use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::infra::walk::{DEFAULT_IGNORED_NAMES, FileWalker};

/// Config file names looked up in the working directory, in priority order.
const CONFIG_FILES: [&str; 4] = ["cfgpatch.toml", "cfgpatch.yaml", "cfgpatch.json", ".cfgpatch.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Directory/file names never scanned (exact match)
    pub ignored_names: Vec<String>,

    /// Glob selecting config files by name
    pub file_glob: String,

    /// Session state file (supports ~ and $VAR)
    pub state_file: String,

    /// Git interop settings
    pub git: GitConfig,

    /// Cross-project sync settings
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig
{
    /// Depth cap for downward repository discovery
    pub max_depth: usize,

    /// Parent levels checked for a `.git` marker
    pub upward_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig
{
    /// Ancestor levels above the project root searched for siblings
    pub search_levels: usize,

    /// Parent levels checked when looking for a project root
    pub project_levels: usize,

    /// Entry names (or `*.ext` suffixes) marking a project root
    pub project_markers: Vec<String>,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            ignored_names: DEFAULT_IGNORED_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            file_glob: "appsettings*.json".to_string(),
            state_file: "~/.cfgpatch/state.json".to_string(),
            git: GitConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for GitConfig
{
    fn default() -> Self
    {
        Self { max_depth: 5, upward_limit: 10 }
    }
}

impl Default for SyncConfig
{
    fn default() -> Self
    {
        Self {
            search_levels: 2,
            project_levels: 5,
            project_markers: vec![
                "*.csproj".to_string(),
                "package.json".to_string(),
                ".git".to_string(),
                "program.cs".to_string(),
            ],
        }
    }
}

impl Config
{
    /// Walker honoring `ignored_names`.
    pub fn walker(&self) -> FileWalker
    {
        FileWalker::new(
            self.ignored_names
                .iter()
                .cloned(),
        )
    }

    /// `state_file` with `~` and environment variables expanded.
    pub fn state_path(&self) -> Result<PathBuf>
    {
        let expanded = shellexpand::full(&self.state_file)
            .with_context(|| format!("Failed to expand state_file {}", self.state_file))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Load the first config file found in `dir`, then `CFGPATCH_*` overrides.
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    for name in &CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    // CFGPATCH_STATE_FILE, CFGPATCH_GIT__MAX_DEPTH, ...
    builder = builder.add_source(
        config::Environment::with_prefix("CFGPATCH")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("ignored_names")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("cfgpatch.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        println!("{toml_string}");
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults_apply_without_a_file() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let cfg = load_config_from(tmp.path())?;

        assert_eq!(cfg.file_glob, "appsettings*.json");
        assert_eq!(cfg.git.max_depth, 5);
        assert!(
            cfg.ignored_names
                .contains(&"node_modules".to_string())
        );
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()>
    {
        let tmp = TempDir::new()?;
        std::fs::write(
            tmp.path()
                .join("cfgpatch.toml"),
            "ignored_names = [\"vendor\"]\n\n[git]\nmax_depth = 2\n",
        )?;

        let cfg = load_config_from(tmp.path())?;

        assert_eq!(cfg.ignored_names, vec!["vendor".to_string()]);
        assert_eq!(cfg.git.max_depth, 2);
        assert_eq!(cfg.git.upward_limit, 10);
        assert_eq!(cfg.sync.search_levels, 2);
        Ok(())
    }

    #[test]
    fn default_config_round_trips_through_toml() -> Result<()>
    {
        let text = toml::to_string_pretty(&Config::default())?;
        let back: Config = toml::from_str(&text)?;

        assert_eq!(back.sync.project_markers.len(), 4);
        assert_eq!(back.state_file, "~/.cfgpatch/state.json");
        Ok(())
    }
}
