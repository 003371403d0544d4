//! Integration tests for the command-line interface
//!
//! Runs the built `treegraft` binary against rule files and JSON trees

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const KINDS: &str = r#"
[[kinds]]
name = "Expr"

[[kinds]]
name = "Int"
parent = "Expr"
value = true

[[kinds]]
name = "Add"
parent = "Expr"
members = [{ name = "lhs", category = "single" }, { name = "rhs", category = "single" }]
"#;

/// Helper to create a workspace with a rule directory and a subject tree
fn setup_test_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();

    let rules_dir = dir.path().join("rules");
    fs::create_dir(&rules_dir).unwrap();

    fs::write(
        rules_dir.join("10-add-zero.toml"),
        format!(
            r#"{KINDS}
[meta]
name = "identities"
description = "Arithmetic identities"

[[rules]]
id = "add-zero"
description = "x + 0 = x"
search = {{ agent = "standard", kind = "Add", members = {{ lhs = {{ agent = "standard", kind = "Expr", name = "x" }}, rhs = {{ agent = "standard", kind = "Int", value = 0 }} }} }}
replace = {{ agent = "ref", name = "x" }}
"#
        ),
    )
    .unwrap();

    fs::write(
        rules_dir.join("20-seven.toml"),
        format!(
            r#"{KINDS}
[[rules]]
id = "seven-to-eight"
mode = "search"
search = {{ agent = "standard", kind = "Int", value = 7 }}
replace = {{ agent = "standard", kind = "Int", value = 8 }}
"#
        ),
    )
    .unwrap();

    fs::write(
        dir.path().join("tree.json"),
        r#"{"kind": "Add", "members": {
    "lhs": {"kind": "Int", "value": 7},
    "rhs": {"kind": "Int", "value": 0}
}}"#,
    )
    .unwrap();

    dir
}

fn treegraft(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_treegraft"))
        .args(args)
        .output()
        .unwrap()
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

fn read_json(p: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(p).unwrap()).unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    let output = treegraft(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("apply"));
    assert!(stdout.contains("check"));
    assert!(stdout.contains("list"));
}

#[test]
fn test_apply_writes_output() {
    let workspace = setup_test_workspace();
    let rules = workspace.path().join("rules/10-add-zero.toml");
    let tree = workspace.path().join("tree.json");
    let out = workspace.path().join("out.json");

    let output = treegraft(&[
        "apply",
        "--rules",
        path(&rules),
        "--tree",
        path(&tree),
        "--output",
        path(&out),
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("add-zero: 1 hit(s)"));

    let result = read_json(&out);
    assert_eq!(result["kind"], "Int");
    assert_eq!(result["value"], 7);
}

#[test]
fn test_apply_dry_run_does_not_write() {
    let workspace = setup_test_workspace();
    let rules = workspace.path().join("rules");
    let tree = workspace.path().join("tree.json");
    let out = workspace.path().join("out.json");

    let output = treegraft(&[
        "apply",
        "-r",
        path(&rules),
        "-t",
        path(&tree),
        "-o",
        path(&out),
        "--dry-run",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN"));
    assert!(stdout.contains("Would write"));
    assert!(!out.exists());
}

#[test]
fn test_apply_directory_runs_files_in_name_order() {
    let workspace = setup_test_workspace();
    let rules = workspace.path().join("rules");
    let tree = workspace.path().join("tree.json");
    let out = workspace.path().join("out.json");

    let output = treegraft(&[
        "apply",
        "--rules",
        path(&rules),
        "--tree",
        path(&tree),
        "--output",
        path(&out),
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.find("add-zero").unwrap();
    let second = stdout.find("seven-to-eight").unwrap();
    assert!(first < second);

    // add-zero leaves a bare Int 7, which the second file then rewrites.
    let result = read_json(&out);
    assert_eq!(result["kind"], "Int");
    assert_eq!(result["value"], 8);
}

#[test]
fn test_apply_without_output_prints_tree() {
    let workspace = setup_test_workspace();
    let rules = workspace.path().join("rules/20-seven.toml");
    let tree = workspace.path().join("tree.json");

    let output = treegraft(&["apply", "-r", path(&rules), "-t", path(&tree)]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("seven-to-eight: 1 hit(s)"));
    assert!(stdout.contains("\"value\": 8"));
}

#[test]
fn test_apply_reports_rules_without_match() {
    let workspace = setup_test_workspace();
    let rules = workspace.path().join("rules/10-add-zero.toml");
    let tree = workspace.path().join("plain.json");
    fs::write(&tree, r#"{"kind": "Int", "value": 3}"#).unwrap();

    let output = treegraft(&["apply", "-r", path(&rules), "-t", path(&tree)]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("add-zero: No match"));
}

#[test]
fn test_apply_strict_runaway_rule_fails() {
    let workspace = setup_test_workspace();
    let rules = workspace.path().join("runaway.toml");
    fs::write(
        &rules,
        format!(
            r#"{KINDS}
[meta]
max_repetitions = 3
strict = true

[[rules]]
id = "forever"
search = {{ agent = "standard", kind = "Int" }}
"#
        ),
    )
    .unwrap();
    let tree = workspace.path().join("tree.json");

    let output = treegraft(&["apply", "-r", path(&rules), "-t", path(&tree)]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("forever"));
}

#[test]
fn test_check_valid_rules() {
    let workspace = setup_test_workspace();
    let rules = workspace.path().join("rules");

    let output = treegraft(&["check", "--rules", path(&rules)]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("10-add-zero.toml: 1 rule(s)"));
    assert!(stdout.contains("20-seven.toml: 1 rule(s)"));
}

#[test]
fn test_check_invalid_rules_fails() {
    let workspace = setup_test_workspace();
    let rules = workspace.path().join("bad.toml");
    fs::write(
        &rules,
        format!(
            r#"{KINDS}
[[rules]]
id = "typo"
search = {{ agent = "standard", kind = "Intt" }}
replace = {{ agent = "ref", name = "missing" }}
"#
        ),
    )
    .unwrap();

    let output = treegraft(&["check", "--rules", path(&rules)]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("INVALID"));
    assert!(stderr.contains("Intt"));
    assert!(stderr.contains("missing"));
}

#[test]
fn test_list_shows_rules() {
    let workspace = setup_test_workspace();
    let rules = workspace.path().join("rules");

    let output = treegraft(&["list", "--rules", path(&rules)]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("identities"));
    assert!(stdout.contains("add-zero [search, max 1000]"));
    assert!(stdout.contains("seven-to-eight"));
    assert!(stdout.contains("x + 0 = x"));
}

#[test]
fn test_missing_rule_path_fails() {
    let workspace = setup_test_workspace();
    let rules = workspace.path().join("nowhere");

    let output = treegraft(&["list", "--rules", path(&rules)]);

    assert!(!output.status.success());
}
