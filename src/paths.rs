use std::path::{Path, PathBuf};

use crate::error::{LauncherError, LauncherResult};

const APP_DIR_NAME: &str = "NexusLauncher";

/// On-disk layout of the launcher's own data directory.
///
/// ```text
/// <data_local_dir>/NexusLauncher/
///   settings.json
///   logs/
///   Games/<item>/...      default install roots
///   <item>.zip            in-flight download archives
/// ```
#[derive(Debug, Clone)]
pub struct LauncherPaths {
    root: PathBuf,
}

impl LauncherPaths {
    /// Resolve the per-user data root (`%LOCALAPPDATA%` on Windows).
    pub fn from_env() -> LauncherResult<Self> {
        let base = dirs::data_local_dir().ok_or_else(|| {
            LauncherError::io(
                Path::new(APP_DIR_NAME),
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "failed to resolve local data dir",
                ),
            )
        })?;
        Ok(Self::with_root(base.join(APP_DIR_NAME)))
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn default_games_dir(&self) -> PathBuf {
        self.root.join("Games")
    }

    /// Download location for an item's archive.
    ///
    /// Kept outside the install root so a wipe-and-replace never deletes the
    /// archive it is about to extract.
    pub fn archive_path(&self, item_name: &str) -> PathBuf {
        self.root.join(format!("{item_name}.zip"))
    }
}
