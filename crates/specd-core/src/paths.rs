use crate::error::{Result, SpecdError};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SPECD_DIR: &str = "specd";
pub const SPECS_DIR: &str = "specd/specs";
pub const CHANGES_DIR: &str = "specd/changes";
pub const ARCHIVE_DIR: &str = "specd/changes/archive";

pub const CONFIG_FILE: &str = "specd/config.yaml";

/// Directory name under `changes/` reserved for archived changes.
pub const ARCHIVE_DIR_NAME: &str = "archive";
pub const SPEC_FILE: &str = "spec.md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn specd_dir(root: &Path) -> PathBuf {
    root.join(SPECD_DIR)
}

pub fn specs_dir(root: &Path) -> PathBuf {
    root.join(SPECS_DIR)
}

pub fn changes_dir(root: &Path) -> PathBuf {
    root.join(CHANGES_DIR)
}

pub fn archive_dir(root: &Path) -> PathBuf {
    root.join(ARCHIVE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn spec_path(root: &Path, capability: &str) -> PathBuf {
    specs_dir(root).join(capability).join(SPEC_FILE)
}

pub fn change_dir(root: &Path, change_id: &str) -> PathBuf {
    changes_dir(root).join(change_id)
}

/// Directory holding a change's delta specs, one subdirectory per capability.
pub fn change_specs_dir(root: &Path, change_id: &str) -> PathBuf {
    change_dir(root, change_id).join("specs")
}

pub fn delta_spec_path(root: &Path, change_id: &str, capability: &str) -> PathBuf {
    change_specs_dir(root, change_id)
        .join(capability)
        .join(SPEC_FILE)
}

/// `changes/archive/<YYYY-MM-DD>-<change-id>`
pub fn archived_change_dir(root: &Path, date: NaiveDate, change_id: &str) -> PathBuf {
    archive_dir(root).join(format!("{}-{change_id}", date.format("%Y-%m-%d")))
}

// ---------------------------------------------------------------------------
// Id validation
// ---------------------------------------------------------------------------

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_re() -> &'static Regex {
    ID_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").expect("valid regex")
    })
}

/// Change ids and capability names share the kebab-case slug rules.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || id == ARCHIVE_DIR_NAME || !id_re().is_match(id) {
        return Err(SpecdError::InvalidId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        for id in ["add-auth", "a", "billing-v2", "x1"] {
            validate_id(id).unwrap_or_else(|_| panic!("expected valid: {id}"));
        }
    }

    #[test]
    fn invalid_ids() {
        for id in [
            "",
            "-starts-with-dash",
            "ends-with-dash-",
            "has spaces",
            "UPPER",
            "a_b",
            "archive",
            "../escape",
        ] {
            assert!(validate_id(id).is_err(), "expected invalid: {id}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/specd/config.yaml")
        );
        assert_eq!(
            spec_path(root, "auth"),
            PathBuf::from("/tmp/proj/specd/specs/auth/spec.md")
        );
        assert_eq!(
            delta_spec_path(root, "add-2fa", "auth"),
            PathBuf::from("/tmp/proj/specd/changes/add-2fa/specs/auth/spec.md")
        );
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(
            archived_change_dir(root, date, "add-2fa"),
            PathBuf::from("/tmp/proj/specd/changes/archive/2025-03-07-add-2fa")
        );
    }
}
