use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::core::sync::SyncMode;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

impl AppContext {
    /// Colors only on a terminal, and never with --no-color or NO_COLOR.
    pub fn color(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
    }
}

#[derive(Parser)]
#[command(name = "cfgp")]
#[command(
    about = "Find, inspect and surgically patch appsettings.*.json files across a multi-repo workspace"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress spinners and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a folder for config files and remember it
    Scan(ScanArgs),

    /// Show the last scanned folder
    Last(LastArgs),

    /// Display a config file, tolerating comments and stray characters
    Show(ShowArgs),

    /// Print the value at a dotted path
    Get(GetArgs),

    /// Change values in place, keeping comments and formatting
    Set(SetArgs),

    /// Apply a JSON save request ({path, originalContent, changedPaths})
    Apply(ApplyArgs),

    /// Report environment, project and hierarchy of a file
    Classify(ClassifyArgs),

    /// List git repositories below a folder
    Repos(ReposArgs),

    /// Discard uncommitted changes to tracked config files
    Discard(DiscardArgs),

    /// Copy changes to same-named files in sibling projects
    Sync(SyncArgs),

    /// Initialize a cfgpatch.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Root directory to scan
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Group files by project hierarchy
    #[arg(long, conflicts_with = "json")]
    pub tree: bool,

    /// Emit the snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct LastArgs {
    /// Group files by project hierarchy
    #[arg(long, conflicts_with = "json")]
    pub tree: bool,

    /// Emit the snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// Forget the last scanned folder
    #[arg(long, conflicts_with_all = ["tree", "json"])]
    pub clear: bool,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Config file to display
    pub file: PathBuf,

    /// Print the parsed value as pretty JSON
    #[arg(long, conflicts_with = "raw")]
    pub json: bool,

    /// Print the file text unchanged
    #[arg(long)]
    pub raw: bool,
}

#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Config file to read
    pub file: PathBuf,

    /// Dotted property path (e.g. ConnectionStrings.Default)
    pub path: String,

    /// Copy the value to the clipboard
    #[arg(long)]
    pub clipboard: bool,
}

#[derive(Parser, Debug)]
pub struct SetArgs {
    /// Config file to edit
    pub file: PathBuf,

    /// Changes as PATH=VALUE; VALUE is parsed as JSON, else taken as a string
    #[arg(value_name = "PATH=VALUE", required = true)]
    pub changes: Vec<String>,

    /// Treat every VALUE as a string
    #[arg(long)]
    pub string: bool,

    /// Print a unified diff of the change
    #[arg(long)]
    pub diff: bool,
}

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// Save request JSON file, or - for stdin
    pub request: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Config file to classify
    pub file: PathBuf,

    /// Scan root the classification is relative to
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ReposArgs {
    /// Directory to search
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Emit JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct DiscardArgs {
    /// File or directory inside the repository
    pub target: PathBuf,

    /// Include every repository found two levels above the current one
    #[arg(long)]
    pub all_repos: bool,

    /// Only files of this environment (e.g. Dev)
    #[arg(long)]
    pub env: Option<String>,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Source config file
    pub file: PathBuf,

    /// Changes as PATH=VALUE, applied to the source first
    #[arg(value_name = "PATH=VALUE")]
    pub changes: Vec<String>,

    /// How targets are updated
    #[arg(long, value_enum, default_value_t = SyncMode::Patch)]
    pub mode: SyncMode,

    /// Treat every VALUE as a string
    #[arg(long)]
    pub string: bool,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; required unless --stdout is set
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
