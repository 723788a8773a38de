//! Command handlers for folder scans, the remembered folder, repository
//! listing and classification.

use anyhow::{Context, Result};
use serde_json::json;
use tabled::{Table, Tabled};
use tracing::instrument;

use crate::cli::{AppContext, ClassifyArgs, LastArgs, ReposArgs, ScanArgs};
use crate::cli_ext::output::{display_relative, heading, spinner, success};
use crate::core::classify::ConfigFile;
use crate::core::scan::find_git_repositories;
use crate::core::session::{FolderSnapshot, Workspace};
use crate::core::tree;
use crate::infra::config::load_config;

#[derive(Tabled)]
struct FileRow
{
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "File")]
    file: String,
}

fn rows(snapshot: &FolderSnapshot) -> Vec<FileRow>
{
    snapshot
        .files
        .iter()
        .map(|f: &ConfigFile| FileRow {
            project: f
                .project
                .clone(),
            environment: f
                .environment
                .clone(),
            file: display_relative(&f.path, &snapshot.path),
        })
        .collect()
}

fn print_snapshot(
    snapshot: &FolderSnapshot,
    as_tree: bool,
    as_json: bool,
    ctx: &AppContext,
) -> Result<()>
{
    if as_json
    {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }

    if as_tree
    {
        let label = snapshot
            .path
            .file_name()
            .map(|n| {
                n.to_string_lossy()
                    .into_owned()
            })
            .unwrap_or_else(|| {
                snapshot
                    .path
                    .display()
                    .to_string()
            });
        print!("{}", tree::render(&label, &snapshot.files, ctx.color())?);
        return Ok(());
    }

    if snapshot
        .files
        .is_empty()
    {
        println!("No config files found in {}", snapshot.path.display());
        return Ok(());
    }

    println!("{}", Table::new(rows(snapshot)));
    if !ctx.quiet
    {
        println!(
            "{}",
            heading(
                ctx,
                &format!("{} files in {}", snapshot.files.len(), snapshot.path.display())
            )
        );
    }
    Ok(())
}

#[instrument(skip_all, fields(root = %args.root.display()))]
pub fn scan(
    args: ScanArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config()?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("DRY RUN: Would scan:");
            println!("  Root: {}", args.root.display());
            println!("  Pattern: {}", config.file_glob);
            println!("  Ignored: {:?}", config.ignored_names);
        }
        return Ok(());
    }

    let workspace = Workspace::from_config(config)?;
    let pb = spinner(ctx, &format!("Scanning {}", args.root.display()));
    let snapshot = workspace.select_folder(&args.root);
    pb.finish_and_clear();

    print_snapshot(&snapshot?, args.tree, args.json, ctx)
}

pub fn last(
    args: LastArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let workspace = Workspace::from_config(load_config()?)?;

    if args.clear
    {
        if ctx.dry_run
        {
            println!("Would forget the last scanned folder");
            return Ok(());
        }
        let removed = workspace.clear()?;
        if !ctx.quiet
        {
            let msg = if removed { "Forgot the last scanned folder" } else { "No folder was remembered" };
            println!("{}", success(ctx, msg));
        }
        return Ok(());
    }

    match workspace.restore()?
    {
        Some(snapshot) => print_snapshot(&snapshot, args.tree, args.json, ctx),
        None if args.json =>
        {
            println!("null");
            Ok(())
        }
        None =>
        {
            println!("No folder scanned yet. Run `cfgp scan <ROOT>` first.");
            Ok(())
        }
    }
}

pub fn repos(
    args: ReposArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config()?;
    let root = dunce::canonicalize(&args.root)
        .with_context(|| format!("Folder not found: {}", args.root.display()))?;

    let pb = spinner(ctx, "Searching for repositories");
    let repos = find_git_repositories(&root, &config.walker(), config.git.max_depth);
    pb.finish_and_clear();

    if args.json
    {
        println!("{}", serde_json::to_string_pretty(&json!({ "root": root, "repositories": repos }))?);
        return Ok(());
    }

    for repo in &repos
    {
        println!("{}", repo.display());
    }
    if !ctx.quiet
    {
        println!("{}", heading(ctx, &format!("{} repositories", repos.len())));
    }
    Ok(())
}

pub fn classify(
    args: ClassifyArgs,
    _ctx: &AppContext,
) -> Result<()>
{
    let root = dunce::canonicalize(&args.root)
        .with_context(|| format!("Folder not found: {}", args.root.display()))?;
    let file = dunce::canonicalize(&args.file)
        .with_context(|| format!("File not found: {}", args.file.display()))?;

    let record = ConfigFile::from_scan(&file, &root);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
