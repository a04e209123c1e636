use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::LAUNCHER_VERSION_URL;
use crate::error::{LauncherError, LauncherResult};
use crate::process;
use crate::remote::RemoteSource;
use crate::resolver::VersionResolver;
use crate::version::Version;

/// Process name the updater waits on.
pub const LAUNCHER_PROCESS_NAME: &str = "nexus-launcher";
/// Companion binary, expected next to the launcher executable.
pub const UPDATER_BIN_NAME: &str = "launcher-updater";

/// Result of the startup check, for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelfUpdateStatus {
    pub checked: bool,
    pub update_available: bool,
    pub remote_version: Option<Version>,
}

/// Checks the launcher's own version and hands off to the updater process.
pub struct SelfUpdateCoordinator {
    resolver: VersionResolver,
    version_url: String,
    current: Version,
    status: SelfUpdateStatus,
}

impl SelfUpdateCoordinator {
    /// Coordinator for this build, checking against the launcher endpoint.
    pub fn new(source: Arc<dyn RemoteSource>) -> LauncherResult<Self> {
        let current = Version::parse(env!("CARGO_PKG_VERSION"))?;
        Ok(Self::with_current(source, current, LAUNCHER_VERSION_URL))
    }

    pub fn with_current(source: Arc<dyn RemoteSource>, current: Version, version_url: &str) -> Self {
        Self {
            resolver: VersionResolver::new(source),
            version_url: version_url.to_string(),
            current,
            status: SelfUpdateStatus::default(),
        }
    }

    pub fn current_version(&self) -> Version {
        self.current
    }

    pub fn status(&self) -> &SelfUpdateStatus {
        &self.status
    }

    /// One version check. Any failure means "no update"; it never blocks the launcher.
    pub async fn check(&mut self) -> &SelfUpdateStatus {
        match self.resolver.fetch_remote(&self.version_url).await {
            Ok(remote) => {
                self.status.update_available = remote > self.current;
                self.status.remote_version = Some(remote);
                log::info!(
                    "launcher {} (remote {remote}), update available: {}",
                    self.current,
                    self.status.update_available
                );
            }
            Err(e) => {
                log::warn!("launcher version check failed: {e}");
                self.status.update_available = false;
            }
        }
        self.status.checked = true;
        &self.status
    }

    /// Path of the companion updater next to the running launcher.
    pub fn updater_path() -> LauncherResult<PathBuf> {
        let exe = std::env::current_exe().map_err(|e| LauncherError::io(Path::new("<current exe>"), e))?;
        let dir = exe.parent().ok_or_else(|| {
            LauncherError::io(
                &exe,
                std::io::Error::new(std::io::ErrorKind::NotFound, "launcher has no parent directory"),
            )
        })?;
        Ok(dir.join(format!("{UPDATER_BIN_NAME}{}", std::env::consts::EXE_SUFFIX)))
    }

    /// Start the updater. The caller is expected to exit right after so the
    /// updater's wait on the launcher process can finish.
    pub fn start_update(&self) -> LauncherResult<u32> {
        let updater = Self::updater_path()?;
        let dir = updater.parent().map(PathBuf::from).unwrap_or_default();
        log::info!("starting updater {}", updater.to_string_lossy());
        process::spawn_detached(&updater, &dir)
    }
}
