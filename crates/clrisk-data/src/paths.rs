//! Project directory conventions.
//!
//! Snapshots live under `<root>/data/processed`, exported reports under
//! `<root>/reports`. The root comes from `CLRISK_ROOT` or the working directory.

use eyre::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the project root.
pub const ROOT_ENV: &str = "CLRISK_ROOT";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `CLRISK_ROOT`, falling back to the current directory.
    ///
    /// # Errors
    /// Returns error if the current directory cannot be determined.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(ROOT_ENV) {
            Some(root) if !root.is_empty() => Ok(Self::new(root)),
            _ => {
                let cwd = std::env::current_dir().wrap_err("failed to read current directory")?;
                Ok(Self::new(cwd))
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir().join("processed")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    /// Resolve a snapshot base path given on the command line.
    ///
    /// The argument is used as-is when its meta file exists; otherwise it is
    /// looked up under [`Self::processed_dir`].
    pub fn resolve_snapshot(&self, arg: &Path) -> PathBuf {
        if crate::snapshot::meta_path(arg).exists() || arg.is_absolute() {
            return arg.to_path_buf();
        }
        let candidate = self.processed_dir().join(arg);
        if crate::snapshot::meta_path(&candidate).exists() {
            candidate
        } else {
            arg.to_path_buf()
        }
    }
}

/// Create `path` and its parents if missing, returning it.
///
/// # Errors
/// Returns error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(path)
        .wrap_err_with(|| format!("failed to create directory {}", path.display()))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_relative_to_root() {
        let paths = ProjectPaths::new("/work/risk");
        assert_eq!(paths.processed_dir(), PathBuf::from("/work/risk/data/processed"));
        assert_eq!(paths.reports_dir(), PathBuf::from("/work/risk/reports"));
    }

    #[test]
    fn resolve_prefers_processed_dir() {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let paths = ProjectPaths::new(temp_dir.path());
        let processed = ensure_dir(&paths.processed_dir()).expect("create processed dir");
        std::fs::write(processed.join("POOL.meta.json"), "{}").expect("write meta");

        let resolved = paths.resolve_snapshot(Path::new("POOL"));
        assert_eq!(resolved, processed.join("POOL"));

        let missing = paths.resolve_snapshot(Path::new("OTHER"));
        assert_eq!(missing, PathBuf::from("OTHER"));
    }
}
