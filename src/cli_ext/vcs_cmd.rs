//! Command handlers that touch many files at once: discarding git edits
//! and propagating a file to its siblings.

use anyhow::Result;
use tracing::instrument;

use crate::cli::{AppContext, DiscardArgs, SyncArgs};
use crate::cli_ext::edit_cmd::{parse_assignments, report_outcome};
use crate::cli_ext::output::{confirm, display_relative, heading, print_report, spinner};
use crate::core::discard::{DiscardScope, collect_files, discard_groups, resolve_repositories};
use crate::core::git::GitCli;
use crate::core::session::EditSession;
use crate::core::sync::{SyncAction, SyncMode, plan_sync, sync_files};
use crate::infra::config::load_config;

/// Ask unless --yes or --dry-run. Returns false when the user declined.
fn proceed(
    ctx: &AppContext,
    yes: bool,
    prompt: &str,
) -> Result<bool>
{
    if yes || ctx.dry_run
    {
        return Ok(true);
    }
    confirm(prompt)
}

#[instrument(skip_all, fields(target = %args.target.display(), all_repos = args.all_repos))]
pub fn discard(
    args: DiscardArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config()?;
    let git = GitCli::new(
        config
            .git
            .upward_limit,
    );
    let scope = if args.all_repos { DiscardScope::AllRepos } else { DiscardScope::Current };

    let pb = spinner(ctx, "Looking for modified config files");
    let repos = resolve_repositories(&git, &args.target, scope, &config)?;
    let groups = collect_files(&git, &repos, args.env.as_deref(), &config);
    pb.finish_and_clear();
    let groups = groups?;

    if groups.is_empty()
    {
        println!("No appsettings.*.json files found in Git repositories");
        return Ok(());
    }

    let total: usize = groups
        .iter()
        .map(|g| g.files.len())
        .sum();
    if !ctx.quiet
    {
        for group in &groups
        {
            println!("{}", heading(ctx, &group.repo.display().to_string()));
            for file in &group.files
            {
                println!("  {}", display_relative(file, &group.repo));
            }
        }
    }

    let prompt = format!(
        "Discard changes to {total} files in {} repositories? This cannot be undone.",
        groups.len()
    );
    if !proceed(ctx, args.yes, &prompt)?
    {
        println!("Operation cancelled");
        return Ok(());
    }

    let report = discard_groups(&git, &groups, ctx.dry_run);
    print_report(ctx, &report, "discard");
    if !report.is_success()
    {
        anyhow::bail!(report.summary("discard"));
    }
    Ok(())
}

#[instrument(skip_all, fields(file = %args.file.display(), mode = ?args.mode))]
pub fn sync(
    args: SyncArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config()?;
    let changes = parse_assignments(&args.changes, args.string)?;

    if args.mode == SyncMode::Patch && changes.is_empty()
    {
        anyhow::bail!("Nothing to sync: pass PATH=VALUE changes or use --mode overwrite");
    }

    let mut session = EditSession::load(&args.file)?;
    for change in &changes
    {
        session.stage(
            change
                .path
                .clone(),
            change
                .value
                .clone(),
        );
    }

    // Nothing is written until the targets are known and confirmed.
    let preview = session.preview();
    if !changes.is_empty()
    {
        report_outcome(ctx, &preview);
        if preview
            .applied
            .is_empty()
        {
            anyhow::bail!("No property could be updated in {}", args.file.display());
        }
    }

    let plan = plan_sync(&args.file, &config)?;
    if plan
        .targets
        .is_empty()
    {
        println!("No other copies of {} found under {}", args.file.display(), plan.search_root.display());
        return Ok(());
    }

    if !ctx.quiet
    {
        println!("{}", heading(ctx, &format!("Targets under {}", plan.search_root.display())));
        for target in &plan.targets
        {
            println!("  {}", display_relative(target, &plan.search_root));
        }
    }

    let prompt = format!("Update {} files?", plan.targets.len());
    if !proceed(ctx, args.yes, &prompt)?
    {
        println!("Operation cancelled");
        return Ok(());
    }

    // Source first; targets follow its new text.
    if session.has_changes() && !ctx.dry_run
    {
        session.save()?;
    }
    let source_text = preview.text;

    let action = match args.mode
    {
        SyncMode::Patch => SyncAction::Patch(changes),
        SyncMode::Overwrite => SyncAction::Overwrite(source_text),
    };

    let report = sync_files(&plan.targets, &action, ctx.dry_run);
    print_report(ctx, &report, "update");
    if !report.is_success()
    {
        anyhow::bail!(report.summary("update"));
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn dry_run_and_yes_skip_the_prompt()
    {
        let dry = AppContext { quiet: true, no_color: true, dry_run: true };
        assert!(proceed(&dry, false, "unused").unwrap());

        let wet = AppContext { quiet: true, no_color: true, dry_run: false };
        assert!(proceed(&wet, true, "unused").unwrap());
    }
}
