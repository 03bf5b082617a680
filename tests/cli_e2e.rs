//! CLI surface tests for xload.
//!
//! These exercise argument parsing and error reporting through the real
//! binary. Anything touching Postgres is out of reach here; the loading
//! paths themselves are covered by the library tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn xload() -> Command {
    let mut cmd = Command::cargo_bin("xload").unwrap();
    cmd.env_remove("XLOAD_DB");
    cmd
}

#[test]
fn help_lists_both_strategies() {
    xload()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("load"))
        .stdout(predicate::str::contains("load-batch"));
}

#[test]
fn version_prints() {
    xload()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("xload"));
}

#[test]
fn db_url_is_required() {
    xload()
        .args(["load", "archive.zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--db"));
}

#[test]
fn load_requires_inputs() {
    xload()
        .args(["--db", "postgres://localhost/tweets", "load"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("INPUTS"));
}

#[test]
fn load_batch_requires_inputs() {
    xload()
        .args(["--db", "postgres://localhost/tweets", "load-batch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("INPUTS"));
}
