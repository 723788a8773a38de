//! **cfgpatch** - Find, inspect and surgically patch `appsettings*.json` files
//!
//! Tolerant parsing of commented JSON, byte-exact value replacement that keeps
//! comments and formatting, cross-project sync and git discard of config edits.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Command handlers and terminal output
pub mod cli_ext {
    /// Colored status lines, spinners, confirmations and batch reports
    pub mod output;

    /// `scan`, `last`, `repos` and `classify`
    pub mod scan_cmd;

    /// `show`, `get`, `set` and `apply`
    pub mod edit_cmd;

    /// `discard` and `sync`
    pub mod vcs_cmd;
}

/// Config file model - parsing, locating, patching and git plumbing
pub mod core {
    /// Tolerant JSON parse with comment stripping and trailing-comma repair
    pub mod tolerant;
    pub use tolerant::{ParseErrorMarker, ParseOutcome, Repair};

    /// Byte spans of property values addressed by dotted path
    pub mod locate;
    pub use locate::{PropertySpan, locate};

    /// Span splicing, change application and unified diffs
    pub mod patch;
    pub use patch::{PatchOutcome, PendingChange, apply_changes};

    /// Environment, project and hierarchy of a config file
    pub mod classify;
    pub use classify::{ConfigFile, classify};

    /// Config file and repository discovery
    pub mod scan;
    pub use scan::{find_git_repositories, scan_config_files};

    /// Git backend trait with a CLI implementation
    pub mod git;
    pub use git::{GitBackend, GitCli, GitRepository};

    /// Remembered folder and per-file edit sessions
    pub mod session;
    pub use session::{EditSession, SaveRequest, SaveResponse, Workspace, save_file};

    /// Same-named file propagation across sibling projects
    pub mod sync;
    pub use sync::{BatchReport, SyncAction, SyncMode};

    /// Working-tree discard of config edits across repositories
    pub mod discard;

    /// Folder tree rendering with ptree
    pub mod tree;
}

/// Infrastructure - Configuration, I/O, logging and walking
pub mod infra {
    /// Configuration management with TOML support and env overrides
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Whole-file reads and atomic writes
    pub mod io;
    pub use io::{read_text, write_atomic};

    /// tracing-subscriber setup
    pub mod logging;

    /// Directory walking that prunes ignored names and never follows links
    pub mod walk;
    pub use walk::FileWalker;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use infra::{Config, FileWalker, load_config};
