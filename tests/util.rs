//! Shared test utilities for integration tests
//!
//! Provides the fixture workspace and a preconfigured `cfgp` command
//! used across multiple test files.

#![allow(dead_code)]

use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;

pub const ORDERS_BASE: &str = r#"{
  // shared settings
  "Logging": {
    "LogLevel": {
      "Default": "Information", // noisy in prod
      "Microsoft": "Warning",
    }
  },
  "ConnectionStrings": {
    "Main": "Server=db;Database=orders"
  }
}
"#;

pub const ORDERS_DEV: &str = r#"{
  "Api": {
    "Timeout": 10,
    "BaseUrl": "http://localhost:5000"
  },
  "AppSettings": {
    "AppSettingvalue": "cipher-text"
  }
}
"#;

pub const BILLING_DEV: &str = r#"{
  /* billing dev overrides */
  "Api": {
    "Timeout": 10,
    "Retries": 3
  }
}
"#;

/// workspace/
///   team/Orders_API/Orders.csproj, appsettings.json, appsettings.Dev.json
///   team/Billing_API/Billing.csproj, appsettings.Dev.json
///   team/Billing_API/node_modules/pkg/appsettings.json (ignored)
pub fn make_workspace() -> assert_fs::TempDir
{
    // Initialize the temporary workspace root
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("team/Orders_API/Orders.csproj")
        .write_str("<Project />\n")
        .expect("write csproj");
    tmp.child("team/Orders_API/appsettings.json")
        .write_str(ORDERS_BASE)
        .expect("write base");
    tmp.child("team/Orders_API/appsettings.Dev.json")
        .write_str(ORDERS_DEV)
        .expect("write dev");

    tmp.child("team/Billing_API/Billing.csproj")
        .write_str("<Project />\n")
        .expect("write csproj");
    tmp.child("team/Billing_API/appsettings.Dev.json")
        .write_str(BILLING_DEV)
        .expect("write dev");

    // Dependency folders are never scanned
    tmp.child("team/Billing_API/node_modules/pkg/appsettings.json")
        .write_str("{}")
        .expect("write ignored");

    tmp
}

/// `cfgp` running inside `tmp`, with colors off and session state kept
/// next to the fixture instead of the user's home directory.
pub fn cfgp(tmp: &assert_fs::TempDir) -> assert_cmd::Command
{
    let mut cmd = assert_cmd::Command::cargo_bin("cfgp").expect("cfgp binary");
    cmd.current_dir(tmp.path())
        .env("CFGPATCH_STATE_FILE", tmp.path().join(".state/state.json"))
        .env("NO_COLOR", "1")
        .env_remove("CFGPATCH_LOG")
        .arg("--no-color");
    cmd
}

/// Whether a usable `git` binary is on PATH.
pub fn git_available() -> bool
{
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
