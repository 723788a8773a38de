//! Terminal output helpers shared by the command handlers.

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::cli::AppContext;
use crate::core::sync::BatchReport;

pub fn success(
    ctx: &AppContext,
    msg: &str,
) -> String
{
    if ctx.color()
    {
        format!("{} {}", "✓".green(), msg)
    }
    else
    {
        format!("✓ {msg}")
    }
}

pub fn failure(
    ctx: &AppContext,
    msg: &str,
) -> String
{
    if ctx.color()
    {
        format!("{} {}", "✗".red(), msg)
    }
    else
    {
        format!("✗ {msg}")
    }
}

pub fn warning(
    ctx: &AppContext,
    msg: &str,
) -> String
{
    if ctx.color()
    {
        format!("{} {}", "!".yellow(), msg.yellow())
    }
    else
    {
        format!("! {msg}")
    }
}

pub fn heading(
    ctx: &AppContext,
    msg: &str,
) -> String
{
    if ctx.color() { msg.bold().to_string() } else { msg.to_string() }
}

/// Spinner for long scans; hidden with --quiet or off a terminal.
pub fn spinner(
    ctx: &AppContext,
    msg: &str,
) -> ProgressBar
{
    if ctx.quiet || !std::io::stderr().is_terminal()
    {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Ask a yes/no question on stdin. Anything but y/yes is a no.
pub fn confirm(prompt: &str) -> Result<bool>
{
    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush().ok();

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read confirmation")?;

    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// `path` relative to `base` when possible, for compact listings.
pub fn display_relative(
    path: &Path,
    base: &Path,
) -> String
{
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Per-item lines followed by the summary. `verb` is the bare form.
pub fn print_report(
    ctx: &AppContext,
    report: &BatchReport,
    verb: &str,
)
{
    if ctx.dry_run && !ctx.quiet
    {
        println!("{}", heading(ctx, "DRY RUN: no files were changed"));
    }
    for item in &report.items
    {
        let mut line = item
            .path
            .display()
            .to_string();
        if let Some(detail) = &item.detail
        {
            line = format!("{line} ({detail})");
        }

        if item.ok
        {
            if !ctx.quiet
            {
                println!("{}", success(ctx, &line));
            }
        }
        else
        {
            eprintln!("{}", failure(ctx, &line));
        }
    }

    let summary = report.summary(verb);
    if report.is_success()
    {
        if !ctx.quiet
        {
            println!("{}", heading(ctx, &summary));
        }
    }
    else
    {
        eprintln!("{}", warning(ctx, &summary));
    }
}
