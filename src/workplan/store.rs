//! Workplan Store
//!
//! Load/save interface for workplan graphs. The durable format is owned by
//! whoever operates the store; the engine only consumes [`Workplans`]. A
//! simple YAML file-backed implementation is provided for tooling and the
//! CLI: one `{name}.workplan` document per workplan under a root directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use super::model::Workplan;

/// Errors from loading or saving workplans.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workplan '{0}' not found")]
    NotFound(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Persistence interface for workplan graphs.
pub trait Workplans {
    /// Loads the workplan with the given name.
    fn load(&self, name: &str) -> Result<Workplan, StoreError>;

    /// Saves a workplan under its own name, replacing any previous revision.
    fn save(&self, plan: &Workplan) -> Result<(), StoreError>;
}

/// File-backed store keeping one YAML document per workplan.
pub struct FileWorkplans {
    root: PathBuf,
}

impl FileWorkplans {
    /// Creates a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the file path for a workplan name.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.workplan", name))
    }

    /// Derives the store root and workplan name from a `.workplan` file path.
    pub fn split_path(path: &Path) -> Option<(PathBuf, String)> {
        let name = path.file_stem()?.to_str()?.to_string();
        let root = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        Some((root, name))
    }
}

impl Workplans for FileWorkplans {
    fn load(&self, name: &str) -> Result<Workplan, StoreError> {
        let path = self.file_path(name);

        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StoreError::NotFound(name.to_string())
            } else {
                StoreError::Io(e)
            }
        })?;

        let plan: Workplan = serde_yaml::from_str(&content)?;
        info!("Loaded workplan '{}' from {}", plan.name, path.display());
        Ok(plan)
    }

    fn save(&self, plan: &Workplan) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;

        let path = self.file_path(&plan.name);
        let yaml = serde_yaml::to_string(plan)?;
        fs::write(&path, yaml)?;

        info!("Saved workplan '{}' to {}", plan.name, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workplan::model::{Connector, NodeClassification, Step};
    use tempfile::tempdir;

    fn sample_plan() -> Workplan {
        let mut plan = Workplan::new("sample");
        let start = plan.add_connector(Connector::new("start", NodeClassification::START));
        let end = plan.add_connector(Connector::new("end", NodeClassification::END));
        plan.add_step(Step::new("work").with_input(start).with_output(end));
        plan
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileWorkplans::new(dir.path());

        let plan = sample_plan();
        store.save(&plan).unwrap();

        let loaded = store.load("sample").unwrap();
        assert_eq!(loaded, plan);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileWorkplans::new(dir.path());

        match store.load("missing") {
            Err(StoreError::NotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("Expected NotFound, got {:?}", other.map(|p| p.name)),
        }
    }

    #[test]
    fn test_save_creates_root_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("plans").join("released");
        let store = FileWorkplans::new(&nested);

        store.save(&sample_plan()).unwrap();
        assert!(nested.join("sample.workplan").exists());
    }

    #[test]
    fn test_save_replaces_previous_revision() {
        let dir = tempdir().unwrap();
        let store = FileWorkplans::new(dir.path());

        let mut plan = sample_plan();
        store.save(&plan).unwrap();

        plan.version = 2;
        store.save(&plan).unwrap();

        assert_eq!(store.load("sample").unwrap().version, 2);
    }

    #[test]
    fn test_split_path() {
        let (root, name) =
            FileWorkplans::split_path(Path::new("/plans/released/mill.workplan")).unwrap();
        assert_eq!(root, Path::new("/plans/released"));
        assert_eq!(name, "mill");
    }

    #[test]
    fn test_load_malformed_yaml() {
        let dir = tempdir().unwrap();
        let store = FileWorkplans::new(dir.path());

        fs::write(store.file_path("bad"), ":: not yaml ::").unwrap();
        assert!(matches!(store.load("bad"), Err(StoreError::Yaml(_))));
    }
}
