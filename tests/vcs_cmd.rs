//! Integration tests for `discard` against a real git repository.
//! Skipped when `git` is not installed.

use std::path::Path;
use std::process::Command;

use assert_fs::prelude::*;
use predicates::prelude::*;

mod util;
use util::{cfgp, git_available};

fn git(
    root: &Path,
    args: &[&str],
)
{
    let status = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .expect("run git")
        .status;
    assert!(status.success(), "git {args:?} failed");
}

/// One repository with tracked Dev and Prod files, both modified.
fn setup_repo() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().unwrap();
    let repo = tmp.child("Orders_API");
    repo.create_dir_all()
        .unwrap();

    git(repo.path(), &["init", "-q"]);
    git(repo.path(), &["config", "user.name", "Test"]);
    git(repo.path(), &["config", "user.email", "t@example.com"]);

    repo.child("appsettings.json")
        .write_str("{ \"Base\": 1 }\n")
        .unwrap();
    repo.child("appsettings.Dev.json")
        .write_str("{ \"Port\": 80 }\n")
        .unwrap();
    repo.child("appsettings.Prod.json")
        .write_str("{ \"Port\": 443 }\n")
        .unwrap();
    git(repo.path(), &["add", "."]);
    git(repo.path(), &["commit", "-q", "-m", "init"]);

    repo.child("appsettings.json")
        .write_str("{ \"Base\": 2 }\n")
        .unwrap();
    repo.child("appsettings.Dev.json")
        .write_str("{ \"Port\": 8080 }\n")
        .unwrap();
    repo.child("appsettings.Prod.json")
        .write_str("{ \"Port\": 8443 }\n")
        .unwrap();

    tmp
}

#[test]
fn discard_restores_environment_files_only()
{
    if !git_available()
    {
        eprintln!("git not available; skipping");
        return;
    }
    let tmp = setup_repo();

    cfgp(&tmp)
        .args(["discard", "Orders_API", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully discarded 2 files"));

    let repo = tmp.child("Orders_API");
    repo.child("appsettings.Dev.json")
        .assert("{ \"Port\": 80 }\n");
    repo.child("appsettings.Prod.json")
        .assert("{ \"Port\": 443 }\n");
    // The base file never matches the environment pattern
    repo.child("appsettings.json")
        .assert("{ \"Base\": 2 }\n");
}

#[test]
fn discard_env_filter_and_dry_run()
{
    if !git_available()
    {
        eprintln!("git not available; skipping");
        return;
    }
    let tmp = setup_repo();
    let repo = tmp.child("Orders_API");

    cfgp(&tmp)
        .args(["--dry-run", "discard", "Orders_API/appsettings.Dev.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN"));
    repo.child("appsettings.Dev.json")
        .assert("{ \"Port\": 8080 }\n");

    cfgp(&tmp)
        .args(["discard", "Orders_API", "--env", "prod", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully discarded 1 files"));
    repo.child("appsettings.Prod.json")
        .assert("{ \"Port\": 443 }\n");
    repo.child("appsettings.Dev.json")
        .assert("{ \"Port\": 8080 }\n");
}

#[test]
fn discard_outside_a_repository_fails()
{
    let tmp = assert_fs::TempDir::new().unwrap();
    tmp.child("loose/appsettings.Dev.json")
        .write_str("{}")
        .unwrap();

    cfgp(&tmp)
        .args(["discard", "loose", "--yes"])
        .assert()
        .failure();
}
