use anyhow::Result;
use cfgpatch::cli::{AppContext, Cli, Commands};
use cfgpatch::cli_ext::{edit_cmd, scan_cmd, vcs_cmd};
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cfgpatch::infra::logging::init(cli.quiet);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Scan(args) => scan_cmd::scan(args, &ctx),
        Commands::Last(args) => scan_cmd::last(args, &ctx),
        Commands::Show(args) => edit_cmd::show(args, &ctx),
        Commands::Get(args) => edit_cmd::get(args, &ctx),
        Commands::Set(args) => edit_cmd::set(args, &ctx),
        Commands::Apply(args) => edit_cmd::apply(args, &ctx),
        Commands::Classify(args) => scan_cmd::classify(args, &ctx),
        Commands::Repos(args) => scan_cmd::repos(args, &ctx),
        Commands::Discard(args) => vcs_cmd::discard(args, &ctx),
        Commands::Sync(args) => vcs_cmd::sync(args, &ctx),
        Commands::Init(args) => cfgpatch::infra::config::init(args, &ctx),
        Commands::Completions(args) => cfgpatch::completion::run(args, &ctx),
    }
}
