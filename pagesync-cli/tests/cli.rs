use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_help_lists_flags() {
    let mut cmd = Command::cargo_bin("pagesync").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--server"))
        .stdout(predicate::str::contains("--pages"))
        .stdout(predicate::str::contains("--document"));
}

#[test]
fn test_version_flag() {
    let mut cmd = Command::cargo_bin("pagesync").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("pagesync"));
}

#[test]
fn test_rejects_non_numeric_page_count() {
    let mut cmd = Command::cargo_bin("pagesync").unwrap();
    cmd.args(["--pages", "many"]);
    cmd.assert().failure().stderr(predicate::str::contains("--pages"));
}
