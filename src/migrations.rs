//! Migration consistency check
//!
//! Compares the migrations present on disk with the ledger of migrations that
//! have run against the database.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// File extensions recognised as migrations.
const MIGRATION_EXTENSIONS: [&str; 3] = ["rs", "sql", "php"];

// == Migration Diff ==
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationDiff {
    /// Recorded as run but with no file on disk
    pub missing_from_filesystem: BTreeSet<String>,
    /// Present on disk but never recorded as run
    pub missing_from_database: BTreeSet<String>,
}

impl MigrationDiff {
    pub fn compute(on_disk: &BTreeSet<String>, ran: &BTreeSet<String>) -> Self {
        Self {
            missing_from_filesystem: ran.difference(on_disk).cloned().collect(),
            missing_from_database: on_disk.difference(ran).cloned().collect(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.missing_from_filesystem.is_empty() && self.missing_from_database.is_empty()
    }

    /// Writes both lists, one name per line, skipping empty ones.
    pub fn report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (title, names) in [
            ("missing from filesystem", &self.missing_from_filesystem),
            ("missing from database", &self.missing_from_database),
        ] {
            if names.is_empty() {
                continue;
            }
            writeln!(out, "{} ({}):", title, names.len())?;
            for name in names {
                writeln!(out, "  {}", name)?;
            }
        }
        Ok(())
    }
}

/// Migration names in `dir`: the file stems of recognised migration files.
pub fn read_migration_dir(dir: &Path) -> io::Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let recognised = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MIGRATION_EXTENSIONS.contains(&ext));
        if !recognised {
            continue;
        }

        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            names.insert(stem.to_string());
        }
    }
    Ok(names)
}

/// Parses a ledger: one migration per line, blank lines and `#` comments ignored.
pub fn parse_ledger(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_ledger(path: &Path) -> io::Result<BTreeSet<String>> {
    Ok(parse_ledger(&fs::read_to_string(path)?))
}
