#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn specd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("specd").unwrap();
    cmd.current_dir(dir.path())
        .env("SPECD_ROOT", dir.path())
        .env_remove("SPECD_CONCURRENCY");
    cmd
}

fn init_project(dir: &TempDir) {
    specd(dir).args(["init", "--name", "demo"]).assert().success();
}

fn write(dir: &TempDir, rel: &str, text: &str) -> PathBuf {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, text).unwrap();
    path
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

fn archive_entries(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path().join("specd/changes/archive"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

const AUTH_SPEC: &str = "# auth Specification

## Purpose
Authenticate users and manage their sessions across all clients.

## Requirements

### Requirement: Login
The system SHALL accept valid credentials.

#### Scenario: valid credentials
- **WHEN** a user submits a correct password
- **THEN** a session is created

### Requirement: Lockout
The system SHALL lock an account after five failures.

#### Scenario: too many failures
- **WHEN** five logins fail
- **THEN** the account is locked
";

const BILLING_SPEC: &str = "# billing Specification

## Purpose
Charge customers for their subscriptions on a monthly schedule.

## Requirements

### Requirement: Invoice
The system SHALL issue an invoice every month.

#### Scenario: monthly run
- **WHEN** the billing day arrives
- **THEN** an invoice is issued
";

const ADD_LOGOUT: &str = "## ADDED Requirements

### Requirement: Logout
The system SHALL end the session on request.

#### Scenario: user logs out
- **WHEN** the user clicks logout
- **THEN** the session is destroyed
";

const AUDIT_DELTA: &str = "## ADDED Requirements

### Requirement: Audit trail
The system SHALL record every login attempt.

#### Scenario: attempt recorded
- **WHEN** a login is attempted
- **THEN** an audit entry is written
";

const MODIFY_MISSING: &str = "## MODIFIED Requirements

### Requirement: Refund
The system SHALL refund on request.

#### Scenario: refund
- **WHEN** asked
- **THEN** refunded
";

fn seed_specs(dir: &TempDir) -> (PathBuf, PathBuf) {
    let auth = write(dir, "specd/specs/auth/spec.md", AUTH_SPEC);
    let billing = write(dir, "specd/specs/billing/spec.md", BILLING_SPEC);
    (auth, billing)
}

// ---------------------------------------------------------------------------
// specd init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_directory_tree() {
    let dir = TempDir::new().unwrap();
    specd(&dir)
        .args(["init", "--name", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created: specd/config.yaml"));

    assert!(dir.path().join("specd/specs").is_dir());
    assert!(dir.path().join("specd/changes").is_dir());
    assert!(dir.path().join("specd/changes/archive").is_dir());
    let config = read(&dir.path().join("specd/config.yaml"));
    assert!(config.contains("name: demo"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specd(&dir)
        .args(["init", "--name", "other"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  specd/config.yaml"));

    let config = read(&dir.path().join("specd/config.yaml"));
    assert!(config.contains("name: demo"));
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    specd(&dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// specd list
// ---------------------------------------------------------------------------

#[test]
fn list_changes_with_delta_counts() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "specd/changes/add-logout/specs/auth/spec.md", ADD_LOGOUT);
    write(&dir, "specd/changes/add-logout/specs/audit/spec.md", AUDIT_DELTA);

    specd(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("add-logout"))
        .stdout(predicate::str::contains("2"))
        .stdout(predicate::str::contains("archive").not());
}

#[test]
fn list_specs_json() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    seed_specs(&dir);

    let output = specd(&dir)
        .args(["list", "--specs", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["capability"], "auth");
    assert_eq!(rows[0]["requirements"], 2);
    assert_eq!(rows[1]["capability"], "billing");
    assert_eq!(rows[1]["requirements"], 1);
}

#[test]
fn list_empty_workspace() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specd(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No active changes."));
}

// ---------------------------------------------------------------------------
// specd validate
// ---------------------------------------------------------------------------

#[test]
fn validate_valid_change() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    seed_specs(&dir);
    write(&dir, "specd/changes/add-logout/specs/auth/spec.md", ADD_LOGOUT);

    specd(&dir)
        .args(["validate", "add-logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ change add-logout"));
}

#[test]
fn validate_reports_missing_scenario() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(
        &dir,
        "specd/changes/vague/specs/auth/spec.md",
        "## ADDED Requirements\n\n### Requirement: Vague\nThe system SHALL do things.\n",
    );

    specd(&dir)
        .args(["validate", "vague"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] specs/auth/spec.md: ADDED[0]"))
        .stderr(predicate::str::contains("'vague' failed validation"));
}

#[test]
fn validate_spec_by_name() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    seed_specs(&dir);

    specd(&dir)
        .args(["validate", "billing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ spec billing"));
}

#[test]
fn validate_unknown_item_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specd(&dir)
        .args(["validate", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no change or spec named 'ghost'"));
}

#[test]
fn validate_strict_fails_on_warnings() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(
        &dir,
        "specd/specs/tiny/spec.md",
        "# tiny Specification\n\n## Purpose\nShort.\n\n## Requirements\n\n### Requirement: A\nx\n\n#### Scenario: s\n- y\n",
    );

    specd(&dir).args(["validate", "tiny"]).assert().success();
    specd(&dir)
        .args(["validate", "tiny", "--strict"])
        .assert()
        .failure();
}

#[test]
fn bulk_validate_reports_every_item() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    seed_specs(&dir);
    write(&dir, "specd/changes/add-logout/specs/auth/spec.md", ADD_LOGOUT);
    write(&dir, "specd/specs/broken/spec.md", "# broken\n");

    specd(&dir)
        .args(["validate", "--all", "--concurrency", "2"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("✓ change add-logout"))
        .stdout(predicate::str::contains("✓ spec auth"))
        .stdout(predicate::str::contains("✗ spec broken"))
        .stdout(predicate::str::contains("Totals: 4 item(s), 3 passed, 1 failed"));
}

#[test]
fn bulk_validate_json_is_sorted() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    seed_specs(&dir);
    write(&dir, "specd/changes/z-change/specs/auth/spec.md", ADD_LOGOUT);
    write(&dir, "specd/changes/a-change/specs/audit/spec.md", AUDIT_DELTA);

    let output = specd(&dir)
        .args(["validate", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = report["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["a-change", "z-change", "auth", "billing"]);
    assert_eq!(report["totals"]["failed"], 0);
}

#[test]
fn bulk_validate_changes_only() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    seed_specs(&dir);
    write(&dir, "specd/changes/add-logout/specs/auth/spec.md", ADD_LOGOUT);

    specd(&dir)
        .args(["validate", "--changes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Totals: 1 item(s)"));
}

#[test]
fn zero_concurrency_is_rejected() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specd(&dir)
        .args(["validate", "--all", "--concurrency", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--concurrency must be at least 1"));
}

// ---------------------------------------------------------------------------
// specd archive
// ---------------------------------------------------------------------------

#[test]
fn archive_applies_deltas_and_moves_change() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let (auth, _) = seed_specs(&dir);
    write(&dir, "specd/changes/add-logout/proposal.md", "# Add logout\n");
    write(&dir, "specd/changes/add-logout/specs/auth/spec.md", ADD_LOGOUT);
    write(&dir, "specd/changes/add-logout/specs/audit/spec.md", AUDIT_DELTA);

    specd(&dir)
        .args(["archive", "add-logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "update auth: + 1 added, ~ 0 modified, - 0 removed, → 0 renamed",
        ))
        .stdout(predicate::str::contains("create audit:"))
        .stdout(predicate::str::contains(
            "Totals: + 2 added, ~ 0 modified, - 0 removed, → 0 renamed",
        ));

    let updated = read(&auth);
    let login = updated.find("### Requirement: Login").unwrap();
    let lockout = updated.find("### Requirement: Lockout").unwrap();
    let logout = updated.find("### Requirement: Logout").unwrap();
    assert!(login < lockout && lockout < logout);

    let audit = read(&dir.path().join("specd/specs/audit/spec.md"));
    assert!(audit.starts_with("# audit Specification\n\n## Purpose\nTBD - created by archiving change add-logout."));
    assert!(audit.contains("### Requirement: Audit trail"));

    assert!(!dir.path().join("specd/changes/add-logout").exists());
    let entries = archive_entries(&dir);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ends_with("-add-logout"));
    let archived = dir.path().join("specd/changes/archive").join(&entries[0]);
    assert!(archived.join("proposal.md").exists());
}

#[test]
fn archive_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let (auth, billing) = seed_specs(&dir);
    write(&dir, "specd/changes/mixed/specs/auth/spec.md", ADD_LOGOUT);
    write(&dir, "specd/changes/mixed/specs/billing/spec.md", MODIFY_MISSING);

    specd(&dir)
        .args(["archive", "mixed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no files were changed"))
        .stderr(predicate::str::contains("billing"));

    assert_eq!(read(&auth), AUTH_SPEC);
    assert_eq!(read(&billing), BILLING_SPEC);
    assert!(dir.path().join("specd/changes/mixed").is_dir());
    assert!(archive_entries(&dir).is_empty());
}

#[test]
fn archive_aborts_when_rebuilt_spec_is_invalid() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let (auth, _) = seed_specs(&dir);
    write(
        &dir,
        "specd/changes/vague/specs/auth/spec.md",
        "## ADDED Requirements\n\n### Requirement: Vague\nThe system SHALL do things.\n",
    );

    specd(&dir)
        .args(["archive", "vague"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rebuilt spec failed validation"));
    assert_eq!(read(&auth), AUTH_SPEC);
}

#[test]
fn archive_no_validate_writes_anyway() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let (auth, _) = seed_specs(&dir);
    write(
        &dir,
        "specd/changes/vague/specs/auth/spec.md",
        "## ADDED Requirements\n\n### Requirement: Vague\nThe system SHALL do things.\n",
    );

    specd(&dir)
        .args(["archive", "vague", "--no-validate"])
        .assert()
        .success();
    assert!(read(&auth).contains("### Requirement: Vague"));
}

#[test]
fn archive_skip_specs_leaves_specs_alone() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let (auth, _) = seed_specs(&dir);
    write(&dir, "specd/changes/add-logout/specs/auth/spec.md", ADD_LOGOUT);

    specd(&dir)
        .args(["archive", "add-logout", "--skip-specs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped spec updates."));

    assert_eq!(read(&auth), AUTH_SPEC);
    assert_eq!(archive_entries(&dir).len(), 1);
}

#[test]
fn archive_rename_and_remove() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let (auth, _) = seed_specs(&dir);
    write(
        &dir,
        "specd/changes/rework/specs/auth/spec.md",
        "## RENAMED Requirements\n\
         - FROM: `### Requirement: Login`\n\
         - TO: `### Requirement: Sign in`\n\
         \n\
         ## REMOVED Requirements\n\
         \n\
         ### Requirement: Lockout\n",
    );

    specd(&dir)
        .args(["archive", "rework"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- 1 removed, → 1 renamed"));

    let updated = read(&auth);
    assert!(updated.contains("### Requirement: Sign in"));
    assert!(!updated.contains("### Requirement: Login"));
    assert!(!updated.contains("Lockout"));
}

#[test]
fn archive_with_nothing_to_apply_reports_no_changes() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(
        &dir,
        "specd/changes/drop-legacy/specs/legacy/spec.md",
        "## REMOVED Requirements\n\n### Requirement: Old flow\n",
    );

    specd(&dir)
        .args(["archive", "drop-legacy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning] legacy: target spec does not exist"))
        .stdout(predicate::str::contains("Totals: no requirement changes"));
}

#[test]
fn archive_json_output() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    seed_specs(&dir);
    write(&dir, "specd/changes/add-logout/specs/auth/spec.md", ADD_LOGOUT);

    let output = specd(&dir)
        .args(["archive", "add-logout", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["specs"]["change_id"], "add-logout");
    assert_eq!(value["specs"]["totals"]["added"], 1);
    assert_eq!(value["specs"]["targets"][0]["capability"], "auth");
    assert!(value["archived_to"]
        .as_str()
        .unwrap()
        .ends_with("-add-logout"));
}

#[test]
fn archive_unknown_change_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specd(&dir)
        .args(["archive", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("change not found"));
}

// ---------------------------------------------------------------------------
// specd config
// ---------------------------------------------------------------------------

#[test]
fn config_validate_default_is_clean() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specd(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid."));
}

#[test]
fn config_validate_rejects_zero_concurrency() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(
        &dir,
        "specd/config.yaml",
        "version: 1\nproject:\n  name: demo\nvalidation:\n  concurrency: 0\n",
    );
    specd(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] validation.concurrency must be at least 1"));
}

#[test]
fn config_strict_applies_to_validate() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(
        &dir,
        "specd/config.yaml",
        "version: 1\nproject:\n  name: demo\nvalidation:\n  strict: true\n",
    );
    write(
        &dir,
        "specd/specs/tiny/spec.md",
        "# tiny Specification\n\n## Purpose\nShort.\n\n## Requirements\n\n### Requirement: A\nx\n\n#### Scenario: s\n- y\n",
    );
    specd(&dir).args(["validate", "tiny"]).assert().failure();
}
