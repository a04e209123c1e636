use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use zip::ZipArchive;

use crate::error::{LauncherError, LauncherResult};

/// How archive entry paths map onto the target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractLayout {
    /// Strip a single top-level directory shared by every entry, if there is one.
    Flatten,
    /// Extract every entry at its recorded path.
    Verbatim,
}

/// Cheap sanity check before anything on disk is touched.
///
/// ZIP files start with "PK"; anything else is most likely an HTML error page
/// served with a 200. Also opens the central directory so truncated downloads
/// fail here. Returns the entry count.
pub fn check_zip(zip_path: &Path) -> LauncherResult<usize> {
    let mut f = File::open(zip_path).map_err(|e| LauncherError::io(zip_path, e))?;
    let mut header = [0u8; 4];
    let n = f.read(&mut header).map_err(|e| LauncherError::io(zip_path, e))?;
    if n < 2 || header[0] != b'P' || header[1] != b'K' {
        return Err(LauncherError::Archive(format!(
            "{} is not a zip archive",
            zip_path.to_string_lossy()
        )));
    }
    f.rewind().map_err(|e| LauncherError::io(zip_path, e))?;
    let archive = ZipArchive::new(f)?;
    Ok(archive.len())
}

/// The top-level directory every entry lives under, if there is exactly one.
///
/// A file sitting directly at the archive root disqualifies flattening, a bare
/// directory entry for the shared root itself does not.
pub fn common_root<R: Read + Seek>(archive: &mut ZipArchive<R>) -> LauncherResult<Option<PathBuf>> {
    let mut root: Option<PathBuf> = None;
    let mut any = false;

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let Some(safe_rel) = entry.enclosed_name().map(|p| p.to_owned()) else {
            continue;
        };
        let comps: Vec<_> = safe_rel.components().collect();
        let Some(Component::Normal(first)) = comps.first() else {
            continue;
        };
        if comps.len() == 1 && !entry.is_dir() {
            return Ok(None);
        }
        match &root {
            None => root = Some(PathBuf::from(first)),
            Some(r) if r.as_os_str() == *first => {}
            Some(_) => return Ok(None),
        }
        any = true;
    }

    Ok(if any { root } else { None })
}

/// Extracts a zip to `dest_dir`, emitting progress as `(done_entries, total_entries, detail)`.
///
/// - `layout` decides whether a shared top-level folder is stripped
/// - existing files are overwritten, unrelated files are left alone
/// - `cancel` is checked between entries
/// - prevents Zip Slip via `enclosed_name()`
pub fn extract_zip_with_progress<F>(
    zip_path: &Path,
    dest_dir: &Path,
    layout: ExtractLayout,
    cancel: &AtomicBool,
    mut on_progress: F,
) -> LauncherResult<u64>
where
    F: FnMut(u64, u64, Option<String>),
{
    let file = File::open(zip_path).map_err(|e| LauncherError::io(zip_path, e))?;
    let mut archive = ZipArchive::new(file)?;

    let strip = match layout {
        ExtractLayout::Flatten => common_root(&mut archive)?,
        ExtractLayout::Verbatim => None,
    };
    if let Some(root) = &strip {
        log::info!("Flattening archive root folder `{}`", root.to_string_lossy());
    }

    std::fs::create_dir_all(dest_dir).map_err(|e| LauncherError::io(dest_dir, e))?;

    let total_files = archive.len() as u64;
    let mut extracted: u64 = 0;
    on_progress(0, total_files, Some("Starting...".to_string()));

    for i in 0..archive.len() {
        if cancel.load(Ordering::Relaxed) {
            return Err(LauncherError::Cancelled);
        }

        let mut entry = archive.by_index(i)?;
        let entry_name = Some(entry.name().to_string());

        // Prevent Zip Slip (path traversal). Skip unsafe paths.
        let Some(safe_rel) = entry.enclosed_name().map(|p| p.to_owned()) else {
            log::warn!("Skipped unsafe path: {}", entry.name());
            extracted = extracted.saturating_add(1);
            on_progress(extracted, total_files, Some("Skipped unsafe path".to_string()));
            continue;
        };

        let rel_path: PathBuf = match &strip {
            Some(root) => safe_rel
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or(safe_rel),
            None => safe_rel,
        };
        if rel_path.as_os_str().is_empty() {
            extracted = extracted.saturating_add(1);
            on_progress(extracted, total_files, entry_name);
            continue;
        }

        let out_path = dest_dir.join(rel_path);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
            extracted = extracted.saturating_add(1);
            on_progress(extracted, total_files, entry_name);
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }

        let mut out_file = File::create(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out_file).map_err(|e| match e.kind() {
            // Read-side failures come from a damaged entry, not from the disk.
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
                LauncherError::Archive(format!("{}: {e}", entry.name()))
            }
            _ => LauncherError::io(&out_path, e),
        })?;

        extracted = extracted.saturating_add(1);
        on_progress(extracted, total_files, entry_name);
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::zip_bytes;

    fn write_zip(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("archive.zip");
        std::fs::write(&path, zip_bytes(entries)).unwrap();
        path
    }

    fn extract(zip: &Path, dest: &Path, layout: ExtractLayout) -> LauncherResult<u64> {
        extract_zip_with_progress(zip, dest, layout, &AtomicBool::new(false), |_, _, _| {})
    }

    #[test]
    fn strips_single_shared_root() {
        let dir = tempfile::tempdir().unwrap();
        let zip = write_zip(
            dir.path(),
            &[
                ("GameRoot/", ""),
                ("GameRoot/Game.exe", "exe"),
                ("GameRoot/Data/level.bin", "lvl"),
            ],
        );
        let dest = dir.path().join("out");
        extract(&zip, &dest, ExtractLayout::Flatten).unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("Game.exe")).unwrap(), "exe");
        assert_eq!(std::fs::read_to_string(dest.join("Data/level.bin")).unwrap(), "lvl");
        assert!(!dest.join("GameRoot").exists());
    }

    #[test]
    fn mixed_top_level_extracts_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let zip = write_zip(
            dir.path(),
            &[("Game.exe", "exe"), ("Data/level.bin", "lvl"), ("Other/readme.txt", "hi")],
        );
        let dest = dir.path().join("out");
        extract(&zip, &dest, ExtractLayout::Flatten).unwrap();

        assert!(dest.join("Game.exe").is_file());
        assert!(dest.join("Data/level.bin").is_file());
        assert!(dest.join("Other/readme.txt").is_file());
    }

    #[test]
    fn verbatim_keeps_shared_root() {
        let dir = tempfile::tempdir().unwrap();
        let zip = write_zip(dir.path(), &[("GameRoot/Game.exe", "exe")]);
        let dest = dir.path().join("out");
        extract(&zip, &dest, ExtractLayout::Verbatim).unwrap();
        assert!(dest.join("GameRoot/Game.exe").is_file());
    }

    #[test]
    fn overwrites_existing_and_keeps_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("Game.exe"), "old").unwrap();
        std::fs::write(dest.join("user.cfg"), "mine").unwrap();

        let zip = write_zip(dir.path(), &[("Root/Game.exe", "new")]);
        extract(&zip, &dest, ExtractLayout::Flatten).unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("Game.exe")).unwrap(), "new");
        assert_eq!(std::fs::read_to_string(dest.join("user.cfg")).unwrap(), "mine");
    }

    #[test]
    fn reports_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let zip = write_zip(dir.path(), &[("a.txt", "1"), ("b/", ""), ("b/c.txt", "2")]);
        let mut calls = vec![];
        extract_zip_with_progress(
            &zip,
            &dir.path().join("out"),
            ExtractLayout::Flatten,
            &AtomicBool::new(false),
            |done, total, _| calls.push((done, total)),
        )
        .unwrap();
        assert_eq!(calls, vec![(0, 3), (1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn cancelled_extraction_stops() {
        let dir = tempfile::tempdir().unwrap();
        let zip = write_zip(dir.path(), &[("a.txt", "1")]);
        let err = extract_zip_with_progress(
            &zip,
            &dir.path().join("out"),
            ExtractLayout::Flatten,
            &AtomicBool::new(true),
            |_, _, _| {},
        )
        .unwrap_err();
        assert!(matches!(err, LauncherError::Cancelled));
    }

    #[test]
    fn check_zip_rejects_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.zip");
        std::fs::write(&path, "<html>quota exceeded</html>").unwrap();
        assert!(matches!(check_zip(&path).unwrap_err(), LauncherError::Archive(_)));

        let zip = write_zip(dir.path(), &[("a.txt", "1")]);
        assert_eq!(check_zip(&zip).unwrap(), 1);
    }

    #[test]
    fn check_zip_rejects_truncated_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = zip_bytes(&[("a.txt", "some content here")]);
        bytes.truncate(bytes.len() / 2);
        let path = dir.path().join("archive.zip");
        std::fs::write(&path, bytes).unwrap();
        assert_eq!(
            check_zip(&path).unwrap_err().kind(),
            crate::error::ErrorKind::Archive
        );
    }
}
