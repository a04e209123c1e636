use std::path::Path;

use crate::error::{LauncherError, LauncherResult};
use crate::version::Version;

/// File name of the marker kept at the root of every install.
pub const MARKER_FILE_NAME: &str = "Version.txt";

/// Read the marker. `Ok(None)` when there is no marker file.
pub fn read(marker: &Path) -> LauncherResult<Option<Version>> {
    if !marker.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(marker).map_err(|e| LauncherError::io(marker, e))?;
    Version::parse(&text).map(Some)
}

/// Local version, falling back to the baseline when the marker is missing or unreadable.
pub fn read_or_baseline(marker: &Path) -> Version {
    match read(marker) {
        Ok(Some(v)) => v,
        Ok(None) => Version::BASELINE,
        Err(e) => {
            log::warn!(
                "ignoring unreadable version marker {}: {e}",
                marker.to_string_lossy()
            );
            Version::BASELINE
        }
    }
}

/// Write the marker through a temp file + rename so readers never see a torn value.
pub fn write(marker: &Path, version: Version) -> LauncherResult<()> {
    if let Some(parent) = marker.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let tmp = marker.with_extension("txt.tmp");
    std::fs::write(&tmp, version.to_string()).map_err(|e| LauncherError::io(&tmp, e))?;
    std::fs::rename(&tmp, marker).map_err(|e| LauncherError::io(marker, e))
}

/// Create a baseline marker unless one already exists. Returns whether a file was written.
pub fn ensure_baseline(marker: &Path) -> LauncherResult<bool> {
    if marker.exists() {
        return Ok(false);
    }
    write(marker, Version::BASELINE)?;
    Ok(true)
}
