use std::path::Path;

use sysinfo::Disks;

/// Free space on the volume holding `path`, if it can be determined.
///
/// Picks the disk with the longest mount point that prefixes the path.
pub fn free_bytes(path: &Path) -> Option<u64> {
    let target = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();

    let mut best: Option<(usize, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if !target.starts_with(mount) {
            continue;
        }
        let score = mount.as_os_str().len();
        match best {
            Some((best_score, _)) if best_score >= score => {}
            _ => best = Some((score, disk.available_space())),
        }
    }
    best.map(|(_, free)| free)
}

/// `1536` -> `1.5 KB`. Base 1024, at most two decimals.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let text = format!("{size:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", UNITS[unit])
}
