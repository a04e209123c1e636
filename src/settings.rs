use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LauncherError, LauncherResult};
use crate::lockfile::LockFile;
use crate::paths::LauncherPaths;

const FILE_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Persisted launcher preferences (`settings.json`).
///
/// Field names stay PascalCase so files written by earlier launcher builds keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LauncherSettings {
    #[serde(default)]
    pub games_install_path: PathBuf,

    /// Item name -> absolute executable path picked by the user.
    #[serde(default)]
    pub located_games: BTreeMap<String, PathBuf>,
}

impl LauncherSettings {
    fn defaults(paths: &LauncherPaths) -> Self {
        Self {
            games_install_path: paths.default_games_dir(),
            located_games: BTreeMap::new(),
        }
    }
}

/// Shared settings table.
///
/// Every change is a read-modify-write of the whole record under one lock,
/// followed by a full rewrite of the file.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: Mutex<LauncherSettings>,
}

impl SettingsStore {
    /// Load `settings.json`, writing defaults when the file does not exist yet.
    pub fn load(paths: &LauncherPaths) -> LauncherResult<Self> {
        let path = paths.settings_file();
        let defaults = LauncherSettings::defaults(paths);

        let (mut settings, needs_write) = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| LauncherError::io(&path, e))?;
            match serde_json::from_str::<LauncherSettings>(&text) {
                Ok(s) => (s, false),
                Err(e) => {
                    log::warn!(
                        "settings file {} is unreadable, using defaults: {e}",
                        path.to_string_lossy()
                    );
                    (defaults.clone(), false)
                }
            }
        } else {
            (defaults.clone(), true)
        };

        if settings.games_install_path.as_os_str().is_empty() {
            settings.games_install_path = defaults.games_install_path;
        }

        let store = Self {
            path,
            current: Mutex::new(settings),
        };
        if needs_write {
            store.update(|_| {})?;
        }

        let games_dir = store.snapshot().games_install_path;
        std::fs::create_dir_all(&games_dir).map_err(|e| LauncherError::io(&games_dir, e))?;
        Ok(store)
    }

    pub fn snapshot(&self) -> LauncherSettings {
        self.lock().clone()
    }

    /// Apply `change` to the table on disk and persist the result.
    ///
    /// Other launcher processes share `settings.json`, so the change is
    /// applied to a fresh read taken under the file lock rather than to the
    /// copy held here. The in-memory copy is only replaced once the write
    /// succeeded.
    pub fn update<F>(&self, change: F) -> LauncherResult<LauncherSettings>
    where
        F: FnOnce(&mut LauncherSettings),
    {
        let mut guard = self.lock();
        let _file_lock = LockFile::acquire(&self.lock_path(), FILE_LOCK_TIMEOUT)?;

        let mut next = match self.read_disk() {
            Some(mut on_disk) => {
                if on_disk.games_install_path.as_os_str().is_empty() {
                    on_disk.games_install_path = guard.games_install_path.clone();
                }
                on_disk
            }
            None => guard.clone(),
        };
        change(&mut next);
        self.write(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    pub fn games_install_path(&self) -> PathBuf {
        self.lock().games_install_path.clone()
    }

    pub fn set_games_install_path(&self, dir: &Path) -> LauncherResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| LauncherError::io(dir, e))?;
        self.update(|s| s.games_install_path = dir.to_path_buf())?;
        log::info!("games install path set to {}", dir.to_string_lossy());
        Ok(())
    }

    pub fn located_exe(&self, item_name: &str) -> Option<PathBuf> {
        self.lock().located_games.get(item_name).cloned()
    }

    pub fn record_relocation(&self, item_name: &str, exe: &Path) -> LauncherResult<()> {
        self.update(|s| {
            s.located_games
                .insert(item_name.to_string(), exe.to_path_buf());
        })
        .map(|_| ())
    }

    pub fn clear_relocation(&self, item_name: &str) -> LauncherResult<()> {
        self.update(|s| {
            s.located_games.remove(item_name);
        })
        .map(|_| ())
    }

    fn lock(&self) -> MutexGuard<'_, LauncherSettings> {
        // The table is replaced wholesale, a poisoned guard still holds a consistent value.
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    /// Current table on disk, `None` when missing or unreadable.
    fn read_disk(&self) -> Option<LauncherSettings> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&text) {
            Ok(s) => Some(s),
            Err(e) => {
                log::warn!("ignoring unreadable {}: {e}", self.path.to_string_lossy());
                None
            }
        }
    }

    /// Whole-file rewrite through a temp file, so readers never see half a table.
    fn write(&self, settings: &LauncherSettings) -> LauncherResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| LauncherError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| LauncherError::io(&self.path, e))
    }
}
