use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;

use crate::catalog::GameDescriptor;
use crate::error::{LauncherError, LauncherResult};
use crate::item::ManagedItem;
use crate::paths::LauncherPaths;
use crate::process;
use crate::progress::{TransferEvent, TransferProgress};
use crate::remote::RemoteSource;
use crate::resolver::VersionResolver;
use crate::settings::SettingsStore;
use crate::transfer::{ReplacePolicy, TransferExecutor, TransferHandle, TransferRequest};
use crate::version::Version;
use crate::version_store;
use crate::zip_utils::ExtractLayout;

/// Install state of one managed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    NotInstalled,
    Ready,
    UpdateAvailable,
    Installing,
    Updating,
    Failed,
}

impl InstallState {
    /// A transfer is in flight.
    pub fn is_transient(self) -> bool {
        matches!(self, InstallState::Installing | InstallState::Updating)
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallState::NotInstalled => "not installed",
            InstallState::Ready => "ready",
            InstallState::UpdateAvailable => "update available",
            InstallState::Installing => "installing",
            InstallState::Updating => "updating",
            InstallState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Lifecycle manager for one item: resolve, install, update, launch,
/// relocate, uninstall.
///
/// All state writes go through `&mut self`, so the owner decides which
/// thread they happen on. Transfers run as tokio tasks and report back
/// through a channel that the owner drains with [`next_event`] or
/// [`poll_events`].
///
/// [`next_event`]: InstallOrchestrator::next_event
/// [`poll_events`]: InstallOrchestrator::poll_events
pub struct InstallOrchestrator {
    item: ManagedItem,
    default_root: PathBuf,
    policy: ReplacePolicy,
    state: InstallState,
    remote_version: Option<Version>,
    remote_trusted: bool,
    progress: Option<TransferProgress>,
    last_error: Option<String>,
    resolver: VersionResolver,
    executor: TransferExecutor,
    settings: Arc<SettingsStore>,
    transfer: Option<TransferHandle>,
}

impl InstallOrchestrator {
    /// Build the orchestrator for `game`. Starts out `NotInstalled` until
    /// [`resolve`](Self::resolve) runs.
    ///
    /// A relocation recorded in the settings wins over the default
    /// `<games dir>/<name>` root, as long as the recorded executable still exists.
    pub fn new(
        game: &GameDescriptor,
        paths: &LauncherPaths,
        settings: Arc<SettingsStore>,
        source: Arc<dyn RemoteSource>,
    ) -> Self {
        let default_root = settings.games_install_path().join(&game.name);
        let mut item = ManagedItem {
            name: game.name.clone(),
            exe_relative_path: game.exe_relative_path.clone(),
            version_url: game.version_url.clone(),
            archive_url: game.archive_url.clone(),
            install_root: default_root.clone(),
            archive_path: paths.archive_path(&game.name),
        };

        if let Some(located) = settings.located_exe(&game.name) {
            match item.root_for_exe(&located) {
                Some(root) if located.is_file() => {
                    log::info!("{} relocated to {}", game.name, root.to_string_lossy());
                    item.install_root = root;
                }
                _ => log::warn!(
                    "{}: relocated executable {} is gone, using default root",
                    game.name,
                    located.to_string_lossy()
                ),
            }
        }

        Self {
            item,
            default_root,
            policy: game.policy,
            state: InstallState::NotInstalled,
            remote_version: None,
            remote_trusted: false,
            progress: None,
            last_error: None,
            resolver: VersionResolver::new(source.clone()),
            executor: TransferExecutor::new(source),
            settings,
            transfer: None,
        }
    }

    pub fn item(&self) -> &ManagedItem {
        &self.item
    }

    pub fn policy(&self) -> ReplacePolicy {
        self.policy
    }

    /// Current state. `Ready`/`UpdateAvailable` degrade to `NotInstalled`
    /// when the executable has disappeared from disk.
    pub fn state(&self) -> InstallState {
        match self.state {
            InstallState::Ready | InstallState::UpdateAvailable if !self.item.is_present() => {
                InstallState::NotInstalled
            }
            s => s,
        }
    }

    /// Last remote version seen. May be stale; check [`remote_version_trusted`](Self::remote_version_trusted).
    pub fn remote_version(&self) -> Option<Version> {
        self.remote_version
    }

    /// Whether `remote_version` came from the latest resolve.
    pub fn remote_version_trusted(&self) -> bool {
        self.remote_trusted
    }

    pub fn local_version(&self) -> Option<Version> {
        version_store::read(&self.item.marker_path()).ok().flatten()
    }

    pub fn progress(&self) -> Option<&TransferProgress> {
        self.progress.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_transfer_active(&self) -> bool {
        self.transfer.is_some()
    }

    /// Display only; a running copy does not block `launch`.
    pub fn is_running(&self) -> bool {
        process::is_running(&self.item.process_name())
    }

    /// Whether the executable is where it should be.
    pub fn verify(&self) -> bool {
        let ok = self.item.is_present();
        if !ok {
            log::warn!(
                "{}: {} is missing",
                self.item.name,
                self.item.exe_path().to_string_lossy()
            );
        }
        ok
    }

    /// Re-run version resolution. Ignored while a transfer is in flight.
    pub async fn resolve(&mut self) -> InstallState {
        if self.transfer.is_some() {
            return self.state;
        }
        let res = self.resolver.resolve(&self.item).await;
        match res.remote {
            Some(v) => {
                self.remote_version = Some(v);
                self.remote_trusted = true;
            }
            // Keep the cached value for display, but stop trusting it.
            None => self.remote_trusted = false,
        }
        self.last_error = res.error.map(|e| e.to_string());
        self.state = res.state;
        self.state
    }

    /// Manual retry after `Failed`.
    pub async fn retry(&mut self) -> LauncherResult<InstallState> {
        self.require(&[InstallState::Failed], "retry")?;
        Ok(self.resolve().await)
    }

    /// `NotInstalled -> Installing`.
    pub async fn install(&mut self) -> LauncherResult<()> {
        self.begin_transfer(false).await
    }

    /// `UpdateAvailable -> Updating`.
    pub async fn update(&mut self) -> LauncherResult<()> {
        self.begin_transfer(true).await
    }

    async fn begin_transfer(&mut self, is_update: bool) -> LauncherResult<()> {
        let operation = if is_update { "update" } else { "install" };
        if self.transfer.is_some() {
            return Err(LauncherError::Busy(self.item.name.clone()));
        }
        if is_update {
            self.require(&[InstallState::UpdateAvailable], operation)?;
        } else {
            self.require(&[InstallState::NotInstalled], operation)?;
        }

        let version = match self.remote_version.filter(|_| is_update && self.remote_trusted) {
            Some(v) => v,
            None => match self.resolver.fetch_remote(&self.item.version_url).await {
                Ok(v) => {
                    self.remote_version = Some(v);
                    self.remote_trusted = true;
                    v
                }
                Err(e) => {
                    log::error!("{}: failed to fetch version information: {e}", self.item.name);
                    self.state = InstallState::Failed;
                    self.remote_trusted = false;
                    self.last_error = Some(e.to_string());
                    return Err(e);
                }
            },
        };

        log::info!(
            "{}: {operation} {version} into {}",
            self.item.name,
            self.item.install_root.to_string_lossy()
        );
        let request = TransferRequest {
            item: self.item.name.clone(),
            archive_url: self.item.archive_url.clone(),
            archive_path: self.item.archive_path.clone(),
            target_root: self.item.install_root.clone(),
            layout: ExtractLayout::Flatten,
            policy: self.policy,
            marker: Some((self.item.marker_path(), version)),
        };
        self.transfer = Some(self.executor.spawn(request)?);
        self.progress = None;
        self.last_error = None;
        self.state = if is_update {
            InstallState::Updating
        } else {
            InstallState::Installing
        };
        Ok(())
    }

    /// Wait for the next event of the active transfer and apply it.
    /// `None` when no transfer is running.
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        let handle = self.transfer.as_mut()?;
        let event = handle.events.recv().await;
        Some(self.apply(event))
    }

    /// Apply whatever the active transfer has reported so far without waiting.
    pub fn poll_events(&mut self) -> Vec<TransferEvent> {
        let mut out = vec![];
        while let Some(handle) = self.transfer.as_mut() {
            match handle.events.try_recv() {
                Ok(event) => out.push(self.apply(Some(event))),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => out.push(self.apply(None)),
            }
        }
        out
    }

    /// Drive the active transfer to its end and return the resulting state.
    pub async fn wait(&mut self) -> InstallState {
        while self.next_event().await.is_some() {}
        self.state()
    }

    fn apply(&mut self, event: Option<TransferEvent>) -> TransferEvent {
        match event {
            Some(TransferEvent::Progress(p)) => {
                self.progress = Some(p.clone());
                TransferEvent::Progress(p)
            }
            Some(TransferEvent::Completed { version }) => {
                self.transfer = None;
                if let Some(v) = version {
                    self.remote_version = Some(v);
                    self.remote_trusted = true;
                }
                self.state = InstallState::Ready;
                self.last_error = None;
                log::info!("{} is ready", self.item.name);
                TransferEvent::Completed { version }
            }
            Some(TransferEvent::Failed(e)) => {
                self.transfer = None;
                self.state = InstallState::Failed;
                self.last_error = Some(e.to_string());
                TransferEvent::Failed(e)
            }
            None => {
                self.transfer = None;
                self.state = InstallState::Failed;
                let e = LauncherError::Archive("transfer stopped without reporting a result".into());
                self.last_error = Some(e.to_string());
                TransferEvent::Failed(e)
            }
        }
    }

    /// Start the executable as an independent process. Returns its pid.
    pub fn launch(&self) -> LauncherResult<u32> {
        if self.transfer.is_some() {
            return Err(self.invalid("launch"));
        }
        self.require(
            &[
                InstallState::Ready,
                InstallState::UpdateAvailable,
                InstallState::Failed,
            ],
            "launch",
        )?;

        let exe = self.item.exe_path();
        if !exe.is_file() {
            return Err(LauncherError::io(
                &exe,
                std::io::Error::new(std::io::ErrorKind::NotFound, "executable not found"),
            ));
        }
        if self.is_running() {
            log::info!("{} is already running, starting another instance", self.item.name);
        }
        let working_dir = exe.parent().unwrap_or(self.item.install_root.as_path());
        process::spawn_detached(&exe, working_dir)
    }

    /// Point the item at a copy the user installed elsewhere.
    ///
    /// `selected_exe` must carry the expected executable file name (case
    /// insensitive) and the expected relative path must exist under its
    /// folder. On success the folder becomes the install root, a baseline
    /// marker is created if none exists and the choice is persisted.
    pub fn relocate(&mut self, selected_exe: &Path) -> LauncherResult<()> {
        if self.transfer.is_some() || self.state.is_transient() {
            return Err(self.invalid("relocate"));
        }

        let expected_name = self.item.exe_file_name();
        let selected_name = selected_exe
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if selected_name != expected_name.to_lowercase() {
            return Err(LauncherError::Validation(format!(
                "Please select {expected_name}"
            )));
        }

        let folder = selected_exe.parent().ok_or_else(|| {
            LauncherError::Validation(format!(
                "{} has no parent folder",
                selected_exe.to_string_lossy()
            ))
        })?;
        let expected_exe = folder.join(&self.item.exe_relative_path);
        if !expected_exe.is_file() {
            return Err(LauncherError::Validation(format!(
                "Invalid game folder structure: {} not found",
                expected_exe.to_string_lossy()
            )));
        }

        let marker = folder.join(version_store::MARKER_FILE_NAME);
        if version_store::ensure_baseline(&marker)? {
            log::info!("{}: created baseline marker at {}", self.item.name, marker.to_string_lossy());
        }
        self.settings.record_relocation(&self.item.name, &expected_exe)?;

        self.item.install_root = folder.to_path_buf();
        self.remote_trusted = false;
        self.last_error = None;
        self.state = InstallState::Ready;
        log::info!("{} relocated to {}", self.item.name, folder.to_string_lossy());
        Ok(())
    }

    /// Remove the install folder and any leftover archive.
    ///
    /// A running transfer is cancelled and awaited first. On a filesystem
    /// error the displayed state is left alone (or `Failed`, if a transfer
    /// had to be cancelled).
    pub async fn uninstall(&mut self) -> LauncherResult<()> {
        if let Some(handle) = self.transfer.take() {
            log::info!("{}: cancelling transfer before uninstall", self.item.name);
            handle.cancel_and_wait().await;
            self.progress = None;
            self.state = InstallState::Failed;
        }

        let root = self.item.install_root.clone();
        if root.exists() {
            std::fs::remove_dir_all(&root).map_err(|e| {
                log::error!("{}: failed to uninstall: {e}", self.item.name);
                LauncherError::io(&root, e)
            })?;
        }
        let archive = &self.item.archive_path;
        if archive.exists() {
            std::fs::remove_file(archive).map_err(|e| LauncherError::io(archive, e))?;
        }

        self.settings.clear_relocation(&self.item.name)?;
        self.item.install_root = self.default_root.clone();
        self.state = InstallState::NotInstalled;
        self.last_error = None;
        log::info!("{} uninstalled from {}", self.item.name, root.to_string_lossy());
        Ok(())
    }

    fn require(&self, allowed: &[InstallState], operation: &'static str) -> LauncherResult<()> {
        if allowed.contains(&self.state()) {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> LauncherError {
        LauncherError::InvalidState {
            item: self.item.name.clone(),
            operation,
            state: self.state().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::progress::TransferPhase;
    use crate::remote::testing::{zip_bytes, MemorySource, Reply};

    const VERSION_URL: &str = "mem://game/version";
    const ZIP_URL: &str = "mem://game/zip";

    struct Env {
        dir: tempfile::TempDir,
        paths: LauncherPaths,
        settings: Arc<SettingsStore>,
        source: Arc<MemorySource>,
    }

    fn env() -> Env {
        let dir = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::with_root(dir.path().join("data"));
        let settings = Arc::new(SettingsStore::load(&paths).unwrap());
        Env {
            dir,
            paths,
            settings,
            source: Arc::new(MemorySource::new()),
        }
    }

    fn game(policy: ReplacePolicy) -> GameDescriptor {
        GameDescriptor {
            name: "Game".into(),
            exe_relative_path: PathBuf::from("Game.exe"),
            version_url: VERSION_URL.into(),
            archive_url: ZIP_URL.into(),
            policy,
        }
    }

    fn orchestrator(env: &Env) -> InstallOrchestrator {
        InstallOrchestrator::new(
            &game(ReplacePolicy::Incremental),
            &env.paths,
            env.settings.clone(),
            env.source.clone(),
        )
    }

    fn build_zip() -> Vec<u8> {
        zip_bytes(&[("GameRoot/", ""), ("GameRoot/Game.exe", "exe"), ("GameRoot/Data/a.bin", "a")])
    }

    fn seed_install(orch: &InstallOrchestrator, marker: &str) {
        let item = orch.item();
        std::fs::create_dir_all(&item.install_root).unwrap();
        std::fs::write(item.exe_path(), "exe").unwrap();
        std::fs::write(item.marker_path(), marker).unwrap();
    }

    #[tokio::test]
    async fn install_from_scratch() {
        let env = env();
        env.source.text(VERSION_URL, "1.0.0");
        env.source.archive(ZIP_URL, build_zip());
        let mut orch = orchestrator(&env);

        assert_eq!(orch.resolve().await, InstallState::NotInstalled);
        orch.install().await.unwrap();
        assert_eq!(orch.state(), InstallState::Installing);

        let mut percents = vec![];
        let mut terminal = None;
        while let Some(ev) = orch.next_event().await {
            match ev {
                TransferEvent::Progress(p) if p.phase == TransferPhase::Downloading => {
                    percents.push(p.percent)
                }
                TransferEvent::Progress(_) => {}
                other => terminal = Some(other),
            }
        }

        assert!(matches!(terminal, Some(TransferEvent::Completed { .. })));
        assert_eq!(percents.first(), Some(&0));
        assert_eq!(percents.last(), Some(&100));
        assert_eq!(orch.state(), InstallState::Ready);
        assert_eq!(orch.local_version(), Some(Version::new(1, 0, 0)));
        assert!(orch.item().install_root.join("Data/a.bin").is_file());
        assert!(!orch.item().archive_path.exists());
        assert!(!orch.is_transfer_active());
    }

    #[tokio::test]
    async fn failed_update_keeps_previous_marker() {
        let env = env();
        let mut orch = orchestrator(&env);
        seed_install(&orch, "1.0.0");
        env.source.text(VERSION_URL, "1.1.0");
        env.source.archive(ZIP_URL, b"PK\x03\x04 broken".to_vec());

        assert_eq!(orch.resolve().await, InstallState::UpdateAvailable);
        orch.update().await.unwrap();
        assert_eq!(orch.state(), InstallState::Updating);
        assert_eq!(orch.wait().await, InstallState::Failed);

        assert_eq!(orch.local_version(), Some(Version::new(1, 0, 0)));
        assert!(orch.last_error().unwrap().contains("zip"));

        // Recoverable by retry once the archive is fixed.
        env.source.archive(ZIP_URL, build_zip());
        assert_eq!(orch.retry().await.unwrap(), InstallState::UpdateAvailable);
        orch.update().await.unwrap();
        assert_eq!(orch.wait().await, InstallState::Ready);
        assert_eq!(orch.local_version(), Some(Version::new(1, 1, 0)));
    }

    #[tokio::test]
    async fn second_transfer_is_rejected() {
        let env = env();
        env.source.text(VERSION_URL, "1.0.0");
        env.source.archive(ZIP_URL, build_zip());
        let mut orch = orchestrator(&env);
        orch.resolve().await;

        orch.install().await.unwrap();
        let err = orch.install().await.unwrap_err();
        assert!(matches!(err, LauncherError::Busy(_)));
        let err = orch.update().await.unwrap_err();
        assert!(matches!(err, LauncherError::Busy(_)));
        assert_eq!(orch.wait().await, InstallState::Ready);
    }

    #[tokio::test]
    async fn operations_outside_their_states_are_rejected() {
        let env = env();
        let mut orch = orchestrator(&env);
        assert_eq!(orch.update().await.unwrap_err().kind(), ErrorKind::State);
        assert_eq!(orch.retry().await.unwrap_err().kind(), ErrorKind::State);
        assert_eq!(orch.launch().unwrap_err().kind(), ErrorKind::State);

        seed_install(&orch, "1.0.0");
        env.source.text(VERSION_URL, "1.0.0");
        assert_eq!(orch.resolve().await, InstallState::Ready);
        assert_eq!(orch.install().await.unwrap_err().kind(), ErrorKind::State);
    }

    #[tokio::test]
    async fn install_fails_when_version_is_unreachable() {
        let env = env();
        env.source.set(VERSION_URL, Reply::Unreachable);
        let mut orch = orchestrator(&env);

        let err = orch.install().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(orch.state(), InstallState::Failed);
        assert!(!orch.is_transfer_active());
    }

    #[tokio::test]
    async fn failed_resolve_keeps_cached_remote_untrusted() {
        let env = env();
        let mut orch = orchestrator(&env);
        seed_install(&orch, "1.0.0");

        env.source.text(VERSION_URL, "1.2.0");
        orch.resolve().await;
        assert!(orch.remote_version_trusted());

        env.source.set(VERSION_URL, Reply::Status(500));
        assert_eq!(orch.resolve().await, InstallState::Failed);
        assert_eq!(orch.remote_version(), Some(Version::new(1, 2, 0)));
        assert!(!orch.remote_version_trusted());
    }

    #[tokio::test]
    async fn missing_exe_degrades_ready_to_not_installed() {
        let env = env();
        let mut orch = orchestrator(&env);
        seed_install(&orch, "1.0.0");
        env.source.text(VERSION_URL, "1.0.0");
        assert_eq!(orch.resolve().await, InstallState::Ready);
        assert!(orch.verify());

        std::fs::remove_file(orch.item().exe_path()).unwrap();
        assert_eq!(orch.state(), InstallState::NotInstalled);
        assert!(!orch.verify());
    }

    #[tokio::test]
    async fn relocate_rejects_wrong_name() {
        let env = env();
        let mut orch = orchestrator(&env);
        let folder = env.dir.path().join("elsewhere");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("other.exe"), "x").unwrap();

        let err = orch.relocate(&folder.join("other.exe")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(orch.state(), InstallState::NotInstalled);
        assert!(env.settings.located_exe("Game").is_none());
    }

    #[tokio::test]
    async fn relocate_rejects_missing_relative_path() {
        let env = env();
        let nested = GameDescriptor {
            exe_relative_path: ["Bin", "Game.exe"].iter().collect(),
            ..game(ReplacePolicy::Incremental)
        };
        let mut orch =
            InstallOrchestrator::new(&nested, &env.paths, env.settings.clone(), env.source.clone());

        // Right file name, but `<folder>/Bin/Game.exe` does not exist.
        let folder = env.dir.path().join("elsewhere");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Game.exe"), "x").unwrap();

        let err = orch.relocate(&folder.join("Game.exe")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!folder.join("Version.txt").exists());
    }

    #[tokio::test]
    async fn relocate_accepts_matching_copy_case_insensitively() {
        let env = env();
        let mut orch = orchestrator(&env);
        let folder = env.dir.path().join("elsewhere");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Game.exe"), "x").unwrap();

        let selected = folder.join("GAME.EXE");
        // Case-insensitive file systems resolve GAME.EXE to Game.exe; on the
        // others only the name check is case-insensitive, so pick the real file.
        let selected = if selected.is_file() { selected } else { folder.join("Game.exe") };
        orch.relocate(&selected).unwrap();

        assert_eq!(orch.state(), InstallState::Ready);
        assert_eq!(orch.item().install_root, folder);
        assert_eq!(std::fs::read_to_string(folder.join("Version.txt")).unwrap(), "0.0.0");
        assert_eq!(env.settings.located_exe("Game").unwrap(), folder.join("Game.exe"));

        // Baseline marker makes the next resolve offer an update.
        env.source.text(VERSION_URL, "1.0.0");
        assert_eq!(orch.resolve().await, InstallState::UpdateAvailable);

        // A fresh orchestrator picks the relocation back up.
        let again = orchestrator(&env);
        assert_eq!(again.item().install_root, folder);
    }

    #[tokio::test]
    async fn relocate_keeps_existing_marker() {
        let env = env();
        let mut orch = orchestrator(&env);
        let folder = env.dir.path().join("elsewhere");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Game.exe"), "x").unwrap();
        std::fs::write(folder.join("Version.txt"), "2.0.0").unwrap();

        orch.relocate(&folder.join("Game.exe")).unwrap();
        assert_eq!(orch.local_version(), Some(Version::new(2, 0, 0)));
    }

    #[tokio::test]
    async fn uninstall_removes_everything() {
        let env = env();
        let mut orch = orchestrator(&env);
        seed_install(&orch, "1.0.0");
        std::fs::write(&orch.item().archive_path, "leftover").unwrap();
        env.source.text(VERSION_URL, "1.0.0");
        orch.resolve().await;

        orch.uninstall().await.unwrap();
        assert_eq!(orch.state(), InstallState::NotInstalled);
        assert!(!orch.item().install_root.exists());
        assert!(!orch.item().archive_path.exists());
    }

    #[tokio::test]
    async fn uninstall_of_relocated_copy_restores_default_root() {
        let env = env();
        let mut orch = orchestrator(&env);
        let default_root = orch.item().install_root.clone();
        let folder = env.dir.path().join("elsewhere");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Game.exe"), "x").unwrap();
        orch.relocate(&folder.join("Game.exe")).unwrap();

        orch.uninstall().await.unwrap();
        assert!(!folder.exists());
        assert_eq!(orch.item().install_root, default_root);
        assert!(env.settings.located_exe("Game").is_none());
    }

    #[tokio::test]
    async fn uninstall_cancels_running_transfer() {
        let env = env();
        env.source.text(VERSION_URL, "1.0.0");
        env.source.archive(ZIP_URL, build_zip());
        let mut orch = orchestrator(&env);

        orch.install().await.unwrap();
        assert!(orch.is_transfer_active());
        orch.uninstall().await.unwrap();

        assert!(!orch.is_transfer_active());
        assert_eq!(orch.state(), InstallState::NotInstalled);
        assert!(!orch.item().marker_path().exists());
        assert!(orch.next_event().await.is_none());
    }

    #[tokio::test]
    async fn relocate_and_launch_are_blocked_during_transfer() {
        let env = env();
        env.source.text(VERSION_URL, "1.0.0");
        env.source.archive(ZIP_URL, build_zip());
        let mut orch = orchestrator(&env);
        orch.install().await.unwrap();

        assert_eq!(orch.launch().unwrap_err().kind(), ErrorKind::State);
        let err = orch.relocate(Path::new("/somewhere/Game.exe")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        orch.wait().await;
    }

    #[tokio::test]
    async fn poll_events_applies_terminal_event() {
        let env = env();
        env.source.text(VERSION_URL, "1.0.0");
        env.source.archive(ZIP_URL, build_zip());
        let mut orch = orchestrator(&env);
        orch.install().await.unwrap();

        let mut saw_terminal = false;
        for _ in 0..200 {
            saw_terminal |= orch.poll_events().iter().any(TransferEvent::is_terminal);
            if !orch.is_transfer_active() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(saw_terminal);
        assert_eq!(orch.state(), InstallState::Ready);
    }

    #[tokio::test]
    async fn wipe_policy_item_installs() {
        let env = env();
        env.source.text(VERSION_URL, "3.0.0");
        env.source.archive(ZIP_URL, build_zip());
        let mut orch = InstallOrchestrator::new(
            &game(ReplacePolicy::WipeAndReplace),
            &env.paths,
            env.settings.clone(),
            env.source.clone(),
        );
        assert_eq!(orch.policy(), ReplacePolicy::WipeAndReplace);
        orch.install().await.unwrap();
        assert_eq!(orch.wait().await, InstallState::Ready);
        assert_eq!(orch.local_version(), Some(Version::new(3, 0, 0)));
    }

    #[tokio::test]
    async fn update_failing_mid_extraction_keeps_previous_marker() {
        let env = env();
        let mut orch = orchestrator(&env);
        seed_install(&orch, "1.0.0");
        env.source.text(VERSION_URL, "1.1.0");
        env.source.archive(ZIP_URL, zip_bytes(&[("a.txt", "x"), ("a.txt/b.txt", "y")]));

        assert_eq!(orch.resolve().await, InstallState::UpdateAvailable);
        orch.update().await.unwrap();
        assert_eq!(orch.wait().await, InstallState::Failed);
        assert_eq!(orch.local_version(), Some(Version::new(1, 0, 0)));
        assert!(orch.item().exe_path().is_file());
    }

    #[tokio::test]
    async fn separate_orchestrators_cannot_transfer_the_same_item() {
        let env = env();
        env.source.text(VERSION_URL, "1.0.0");
        env.source.archive(ZIP_URL, build_zip());
        let mut first = orchestrator(&env);
        let mut second = orchestrator(&env);

        first.install().await.unwrap();
        let err = second.install().await.unwrap_err();
        assert!(matches!(err, LauncherError::Busy(_)));
        assert_eq!(second.state(), InstallState::NotInstalled);

        assert_eq!(first.wait().await, InstallState::Ready);
    }
}
