//! Integration Tests for the migration-diff tool
//!
//! Runs the binary against temporary migration directories and ledgers.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use common_cache::migrations::{read_ledger, read_migration_dir, MigrationDiff};
use tempfile::TempDir;

// == Helpers ==

fn migrations_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in names {
        fs::write(dir.path().join(name), "-- migration\n").unwrap();
    }
    dir
}

fn write_ledger(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("ledger.txt");
    fs::write(&path, contents).unwrap();
    path
}

fn run(path: &Path, ledger: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_migration-diff"))
        .arg("--path")
        .arg(path)
        .arg("--ledger")
        .arg(ledger)
        .output()
        .unwrap()
}

// == Library ==

#[test]
fn test_read_migration_dir_uses_stems_of_known_extensions() {
    let dir = migrations_dir(&[
        "2024_01_01_create_handlers.php",
        "2024_02_01_add_priority.sql",
        "m003_backfill.rs",
        "README.md",
    ]);
    fs::create_dir(dir.path().join("nested.sql")).unwrap();

    let names: Vec<String> = read_migration_dir(dir.path()).unwrap().into_iter().collect();

    assert_eq!(
        names,
        vec![
            "2024_01_01_create_handlers",
            "2024_02_01_add_priority",
            "m003_backfill"
        ]
    );
}

#[test]
fn test_diff_from_files() {
    let dir = migrations_dir(&["a.sql", "b.sql"]);
    let ledger_dir = TempDir::new().unwrap();
    let ledger = write_ledger(&ledger_dir, "# ran\nb\nc\n");

    let diff = MigrationDiff::compute(
        &read_migration_dir(dir.path()).unwrap(),
        &read_ledger(&ledger).unwrap(),
    );

    assert!(diff.missing_from_filesystem.contains("c"));
    assert!(diff.missing_from_database.contains("a"));
}

// == Binary ==

#[test]
fn test_in_sync_exits_zero() {
    let dir = migrations_dir(&["a.sql", "b.php"]);
    let ledger_dir = TempDir::new().unwrap();
    let ledger = write_ledger(&ledger_dir, "a\n\nb\n");

    let output = run(dir.path(), &ledger);

    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_mismatch_exits_one_and_lists_names() {
    let dir = migrations_dir(&["only_on_disk.sql", "shared.sql"]);
    let ledger_dir = TempDir::new().unwrap();
    let ledger = write_ledger(&ledger_dir, "shared\nonly_in_db\n");

    let output = run(dir.path(), &ledger);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing from filesystem"));
    assert!(stderr.contains("only_in_db"));
    assert!(stderr.contains("missing from database"));
    assert!(stderr.contains("only_on_disk"));
}

#[test]
fn test_unreadable_ledger_exits_two() {
    let dir = migrations_dir(&["a.sql"]);

    let output = run(dir.path(), &dir.path().join("no-such-ledger.txt"));

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("cannot read ledger").count(), 1);
}

#[test]
fn test_missing_directory_exits_two() {
    let ledger_dir = TempDir::new().unwrap();
    let ledger = write_ledger(&ledger_dir, "a\n");

    let output = run(&ledger_dir.path().join("absent"), &ledger);

    assert_eq!(output.status.code(), Some(2));
}
