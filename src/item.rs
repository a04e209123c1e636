use std::path::{Path, PathBuf};

use crate::version_store::MARKER_FILE_NAME;

/// Everything the orchestrator needs to know about one installable item.
///
/// Only `install_root` changes after construction (relocate / uninstall).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedItem {
    pub name: String,
    /// Executable path relative to the install root, e.g. `Builds/Windows/x32/Test Game.exe`.
    pub exe_relative_path: PathBuf,
    pub version_url: String,
    pub archive_url: String,
    pub install_root: PathBuf,
    pub archive_path: PathBuf,
}

impl ManagedItem {
    pub fn exe_path(&self) -> PathBuf {
        self.install_root.join(&self.exe_relative_path)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.install_root.join(MARKER_FILE_NAME)
    }

    /// File name component of the executable (`Test Game.exe`).
    pub fn exe_file_name(&self) -> String {
        self.exe_relative_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Name the OS reports for a running instance (file stem, no `.exe`).
    pub fn process_name(&self) -> String {
        self.exe_relative_path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn is_present(&self) -> bool {
        self.exe_path().is_file()
    }

    /// Install root implied by an absolute executable path, i.e. the path with
    /// `exe_relative_path` stripped off the end.
    pub fn root_for_exe(&self, exe: &Path) -> Option<PathBuf> {
        let depth = self.exe_relative_path.components().count();
        exe.ancestors().nth(depth).map(Path::to_path_buf)
    }
}
