//! Command handlers that read and edit a single config file.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde_json::Value;
use tabled::{Table, Tabled};
use tracing::instrument;

use crate::cli::{AppContext, ApplyArgs, GetArgs, SetArgs, ShowArgs};
use crate::cli_ext::output::{failure, heading, success, warning};
use crate::core::classify::is_encrypted_field;
use crate::core::patch::{PatchOutcome, PendingChange, apply_changes, read_path, render_diff};
use crate::core::session::{EditSession, SaveRequest, save_file};
use crate::core::tolerant::{ParseOutcome, Repair};

/// Parse `PATH=VALUE`. VALUE is read as JSON when it parses, otherwise
/// (or with `force_string`) kept as a string.
pub fn parse_assignment(
    raw: &str,
    force_string: bool,
) -> Result<PendingChange>
{
    let (path, value) = raw
        .split_once('=')
        .with_context(|| format!("Expected PATH=VALUE, got `{raw}`"))?;
    let path = path.trim();
    if path.is_empty()
        || path
            .split('.')
            .any(str::is_empty)
    {
        anyhow::bail!("Invalid property path `{path}`");
    }

    let value = if force_string
    {
        Value::String(value.to_string())
    }
    else
    {
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
    };

    Ok(PendingChange::new(path, value))
}

pub fn parse_assignments(
    raw: &[String],
    force_string: bool,
) -> Result<Vec<PendingChange>>
{
    raw.iter()
        .map(|r| parse_assignment(r, force_string))
        .collect()
}

/// Leaf values by dotted path, in document order. Empty containers are
/// leaves.
pub fn flatten(value: &Value) -> Vec<(String, Value)>
{
    fn walk(
        prefix: &str,
        value: &Value,
        out: &mut Vec<(String, Value)>,
    )
    {
        let join = |key: &str| {
            if prefix.is_empty() { key.to_string() } else { format!("{prefix}.{key}") }
        };

        match value
        {
            Value::Object(map) if !map.is_empty() =>
            {
                for (k, v) in map
                {
                    walk(&join(k), v, out);
                }
            }
            Value::Array(items) if !items.is_empty() =>
            {
                for (i, v) in items
                    .iter()
                    .enumerate()
                {
                    walk(&join(&i.to_string()), v, out);
                }
            }
            leaf => out.push((prefix.to_string(), leaf.clone())),
        }
    }

    let mut out = Vec::new();
    walk("", value, &mut out);
    out
}

#[derive(Tabled)]
struct PropertyRow
{
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn value_text(value: &Value) -> String
{
    match value
    {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn last_segment(path: &str) -> &str
{
    path.rsplit('.')
        .next()
        .unwrap_or(path)
}

pub fn show(
    args: ShowArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let session = EditSession::load(&args.file)?;

    if args.raw
    {
        print!("{}", session.original());
        return Ok(());
    }

    match session.outcome()
    {
        ParseOutcome::Failed(marker) =>
        {
            if args.json
            {
                println!("{}", serde_json::to_string_pretty(&marker.to_value())?);
                return Ok(());
            }
            let name = args
                .file
                .display()
                .to_string();
            let report = miette::Report::new(marker.diagnostic(&name, session.original()));
            eprintln!("{report:?}");
            print!("{}", session.original());
            Ok(())
        }
        ParseOutcome::Parsed { value, repair } =>
        {
            if *repair != Repair::None && !ctx.quiet
            {
                eprintln!("{}", warning(ctx, &format!("parsed after cleanup: {repair}")));
            }

            if args.json
            {
                println!("{}", serde_json::to_string_pretty(value)?);
                return Ok(());
            }

            let rows: Vec<PropertyRow> = flatten(value)
                .into_iter()
                .map(|(path, v)| {
                    let mut text = value_text(&v);
                    if is_encrypted_field(last_segment(&path))
                    {
                        text = if ctx.color()
                        {
                            format!("{} {}", text, "(encrypted)".dimmed())
                        }
                        else
                        {
                            format!("{text} (encrypted)")
                        };
                    }
                    PropertyRow { path, value: text }
                })
                .collect();

            println!("{}", Table::new(rows));
            Ok(())
        }
    }
}

#[instrument(skip_all, fields(file = %args.file.display(), path = %args.path))]
pub fn get(
    args: GetArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let session = EditSession::load(&args.file)?;
    let value = session
        .outcome()
        .value()
        .with_context(|| format!("{} could not be parsed", args.file.display()))?;
    let found = read_path(value, &args.path)
        .with_context(|| format!("Property `{}` not found in {}", args.path, args.file.display()))?;

    let text = value_text(found);
    println!("{text}");

    if args.clipboard
    {
        let mut clipboard = arboard::Clipboard::new().context("Failed to access clipboard")?;
        clipboard
            .set_text(text)
            .context("Failed to copy to clipboard")?;
        if !ctx.quiet
        {
            eprintln!("{}", success(ctx, "Copied to clipboard"));
        }
    }
    Ok(())
}

pub(crate) fn report_outcome(
    ctx: &AppContext,
    outcome: &PatchOutcome,
)
{
    for skipped in &outcome.skipped
    {
        eprintln!(
            "{}",
            warning(ctx, &format!("could not find property `{}`; skipped", skipped.path))
        );
    }
    if !ctx.quiet
    {
        for path in &outcome.applied
        {
            println!("{}", success(ctx, &format!("updated {path}")));
        }
    }
}

#[instrument(skip_all, fields(file = %args.file.display()))]
pub fn set(
    args: SetArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let changes = parse_assignments(&args.changes, args.string)?;
    let mut session = EditSession::load(&args.file)?;
    for change in changes
    {
        session.stage(change.path, change.value);
    }

    let preview = session.preview();
    if args.diff || ctx.dry_run
    {
        let label = args
            .file
            .display()
            .to_string();
        print!("{}", render_diff(&label, session.original(), &preview.text));
    }

    if preview
        .applied
        .is_empty()
    {
        report_outcome(ctx, &preview);
        anyhow::bail!("No property could be updated in {}", args.file.display());
    }

    if ctx.dry_run
    {
        report_outcome(ctx, &preview);
        if !ctx.quiet
        {
            println!("{}", heading(ctx, "DRY RUN: file not written"));
        }
        return Ok(());
    }

    let outcome = session.save()?;
    report_outcome(ctx, &outcome);
    Ok(())
}

fn read_request(path: &Path) -> Result<String>
{
    if path == Path::new("-")
    {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read request from stdin")?;
        return Ok(text);
    }
    crate::infra::io::read_text(path)
}

pub fn apply(
    args: ApplyArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let text = read_request(&args.request)?;
    let request: SaveRequest = serde_json::from_str(&text).context("Invalid save request")?;

    if ctx.dry_run
    {
        let outcome = apply_changes(&request.original_content, &request.changed_paths);
        let label = request
            .path
            .display()
            .to_string();
        print!("{}", render_diff(&label, &request.original_content, &outcome.text));
        report_outcome(ctx, &outcome);
        return Ok(());
    }

    let response = save_file(&request);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success
    {
        let message = response
            .error
            .unwrap_or_default();
        eprintln!("{}", failure(ctx, &message));
        anyhow::bail!("Save failed for {}", request.path.display());
    }
    Ok(())
}
