//! On-disk layout of a specd project.
//!
//! `Workspace` is the only reader of change and spec files. It hands
//! document text to the pure merge/validate layers and never writes spec
//! documents itself; that happens in [`crate::archive::CommitPlan::commit`].

use crate::archive::ArchiveTarget;
use crate::config::Config;
use crate::error::{Result, SpecdError};
use crate::{io, paths};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One delta document inside a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSpecFile {
    pub capability: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

// ---------------------------------------------------------------------------
// Directory scanning
// ---------------------------------------------------------------------------

/// Names of the immediate subdirectories of `dir`, sorted. Missing `dir`
/// yields an empty list.
fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

impl Workspace {
    /// Open an initialized workspace rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        if !paths::specd_dir(root).is_dir() {
            return Err(SpecdError::NotInitialized);
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Create the directory tree and a default config. Existing files are
    /// left alone. Returns `true` if the config was written.
    pub fn init(root: &Path, project_name: &str) -> Result<(Self, bool)> {
        io::ensure_dir(&paths::specs_dir(root))?;
        io::ensure_dir(&paths::changes_dir(root))?;
        io::ensure_dir(&paths::archive_dir(root))?;
        let created = if paths::config_path(root).exists() {
            false
        } else {
            Config::new(project_name).save(root)?;
            true
        };
        Ok((
            Self {
                root: root.to_path_buf(),
            },
            created,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // -----------------------------------------------------------------------
    // Changes
    // -----------------------------------------------------------------------

    /// Active (not archived) change ids.
    pub fn list_changes(&self) -> Result<Vec<String>> {
        Ok(subdirectories(&paths::changes_dir(&self.root))?
            .into_iter()
            .filter(|name| name != paths::ARCHIVE_DIR_NAME)
            .collect())
    }

    pub fn change_exists(&self, change_id: &str) -> bool {
        change_id != paths::ARCHIVE_DIR_NAME && paths::change_dir(&self.root, change_id).is_dir()
    }

    /// Delta documents of a change, sorted by capability.
    pub fn change_delta_specs(&self, change_id: &str) -> Result<Vec<DeltaSpecFile>> {
        paths::validate_id(change_id)?;
        if !self.change_exists(change_id) {
            return Err(SpecdError::ChangeNotFound(change_id.to_string()));
        }
        let specs_dir = paths::change_specs_dir(&self.root, change_id);
        Ok(subdirectories(&specs_dir)?
            .into_iter()
            .map(|capability| DeltaSpecFile {
                path: paths::delta_spec_path(&self.root, change_id, &capability),
                capability,
            })
            .filter(|f| f.path.is_file())
            .collect())
    }

    // -----------------------------------------------------------------------
    // Specs
    // -----------------------------------------------------------------------

    /// Capabilities that have a `spec.md`.
    pub fn list_specs(&self) -> Result<Vec<String>> {
        Ok(subdirectories(&paths::specs_dir(&self.root))?
            .into_iter()
            .filter(|cap| paths::spec_path(&self.root, cap).is_file())
            .collect())
    }

    /// Current text of a capability's spec, or `None` if it has none yet.
    pub fn read_spec(&self, capability: &str) -> Result<Option<String>> {
        io::read_optional(&paths::spec_path(&self.root, capability))
    }

    // -----------------------------------------------------------------------
    // Archive
    // -----------------------------------------------------------------------

    /// Read every delta of `change_id` together with the current base spec
    /// it targets.
    pub fn archive_targets(&self, change_id: &str) -> Result<Vec<ArchiveTarget>> {
        let mut targets = Vec::new();
        for delta in self.change_delta_specs(change_id)? {
            let text = std::fs::read_to_string(&delta.path)?;
            let base = self.read_spec(&delta.capability)?;
            targets.push(ArchiveTarget {
                path: paths::spec_path(&self.root, &delta.capability),
                capability: delta.capability,
                delta: text,
                base,
            });
        }
        Ok(targets)
    }

    /// Move a change under `changes/archive/<date>-<id>`. Refuses to
    /// overwrite an existing archive entry.
    pub fn archive_change(&self, change_id: &str, date: NaiveDate) -> Result<PathBuf> {
        paths::validate_id(change_id)?;
        if !self.change_exists(change_id) {
            return Err(SpecdError::ChangeNotFound(change_id.to_string()));
        }
        let dest = paths::archived_change_dir(&self.root, date, change_id);
        if dest.exists() {
            return Err(SpecdError::ArchiveExists(dest.display().to_string()));
        }
        io::ensure_dir(&paths::archive_dir(&self.root))?;
        std::fs::rename(paths::change_dir(&self.root, change_id), &dest)?;
        tracing::info!(change = change_id, dest = %dest.display(), "archived change");
        Ok(dest)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
