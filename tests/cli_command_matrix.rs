use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

fn run_help(root: &TempDir, args: &[&str]) {
    let mut cmd = cargo_bin_cmd!("stdmap");
    cmd.env("STDMAP_ROOT", root.path())
        .args(args)
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn every_cli_command_has_help_path() {
    let root = TempDir::new().expect("temp root");

    run_help(&root, &[]);

    // setup
    run_help(&root, &["init-mapping"]);
    run_help(&root, &["scaffold-progress"]);
    run_help(&root, &["migrate-mappings"]);

    // verification workflow
    run_help(&root, &["verify-batch"]);
    run_help(&root, &["record-decision"]);
    run_help(&root, &["merge-decisions"]);
    run_help(&root, &["apply-verification"]);
    run_help(&root, &["reset-batch"]);

    // inspection
    run_help(&root, &["status"]);
    run_help(&root, &["validate"]);
}

#[test]
fn record_decision_rejects_usage_and_waiver_together() {
    let root = TempDir::new().expect("temp root");
    let mut cmd = cargo_bin_cmd!("stdmap");
    cmd.env("STDMAP_ROOT", root.path())
        .args([
            "record-decision",
            "--batch",
            "1",
            "--guideline",
            "Rule 1.1",
            "--context",
            "all_rust",
            "--decision",
            "reject",
            "--confidence",
            "low",
            "--rationale-type",
            "no_equivalent",
            "--search-used",
            "s-1:keyword_search:0:x",
            "--search-waiver",
            "tool_unavailable",
        ])
        .assert()
        .failure()
        .stderr(contains("cannot be used with"));
}

#[test]
fn missing_workspace_reports_not_found() {
    let root = TempDir::new().expect("temp root");
    let mut cmd = cargo_bin_cmd!("stdmap");
    cmd.env("STDMAP_ROOT", root.path())
        .args(["status"])
        .assert()
        .failure()
        .stderr(contains("NOT_FOUND"));
}

#[test]
fn unknown_schema_version_is_rejected_by_the_parser() {
    let root = TempDir::new().expect("temp root");
    let mut cmd = cargo_bin_cmd!("stdmap");
    cmd.env("STDMAP_ROOT", root.path())
        .args(["migrate-mappings", "--to", "5.0"])
        .assert()
        .failure()
        .stderr(contains("unknown schema version"));
}
