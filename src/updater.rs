use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::LAUNCHER_ARCHIVE_URL;
use crate::error::{LauncherError, LauncherResult};
use crate::process;
use crate::progress::{TransferEvent, TransferProgress};
use crate::remote::RemoteSource;
use crate::self_update::LAUNCHER_PROCESS_NAME;
use crate::transfer::{ReplacePolicy, TransferExecutor, TransferRequest};
use crate::zip_utils::ExtractLayout;

const UPDATE_ARCHIVE_NAME: &str = "LauncherUpdate.zip";

/// Where the companion updater reads from and writes to.
#[derive(Debug, Clone)]
pub struct UpdaterPlan {
    pub install_dir: PathBuf,
    pub archive_url: String,
    pub archive_path: PathBuf,
    pub launcher_exe: PathBuf,
    pub launcher_process: String,
    pub poll: Duration,
}

impl UpdaterPlan {
    /// Plan for a launcher installed in `install_dir`.
    pub fn for_install_dir(install_dir: &Path) -> Self {
        Self {
            install_dir: install_dir.to_path_buf(),
            archive_url: LAUNCHER_ARCHIVE_URL.to_string(),
            archive_path: install_dir.join(UPDATE_ARCHIVE_NAME),
            launcher_exe: install_dir.join(format!(
                "{LAUNCHER_PROCESS_NAME}{}",
                std::env::consts::EXE_SUFFIX
            )),
            launcher_process: LAUNCHER_PROCESS_NAME.to_string(),
            poll: Duration::from_millis(500),
        }
    }

    /// The updater lives in the launcher's own directory.
    pub fn from_current_exe() -> LauncherResult<Self> {
        let exe = std::env::current_exe().map_err(|e| LauncherError::io(Path::new("<current exe>"), e))?;
        let dir = exe.parent().ok_or_else(|| {
            LauncherError::io(
                &exe,
                std::io::Error::new(std::io::ErrorKind::NotFound, "updater has no parent directory"),
            )
        })?;
        Ok(Self::for_install_dir(dir))
    }
}

/// Wait for the launcher to exit, then download and unpack the new build
/// over its directory. The archive is removed afterwards.
pub async fn apply_update<F>(
    plan: &UpdaterPlan,
    source: Arc<dyn RemoteSource>,
    mut on_progress: F,
) -> LauncherResult<()>
where
    F: FnMut(&TransferProgress),
{
    process::wait_for_exit(&plan.launcher_process, plan.poll).await;
    log::info!("updating launcher in {}", plan.install_dir.to_string_lossy());

    let request = TransferRequest {
        item: plan.launcher_process.clone(),
        archive_url: plan.archive_url.clone(),
        archive_path: plan.archive_path.clone(),
        target_root: plan.install_dir.clone(),
        layout: ExtractLayout::Verbatim,
        policy: ReplacePolicy::Incremental,
        marker: None,
    };
    let mut handle = TransferExecutor::new(source).spawn(request)?;

    while let Some(event) = handle.events.recv().await {
        match event {
            TransferEvent::Progress(p) => on_progress(&p),
            TransferEvent::Completed { .. } => return Ok(()),
            TransferEvent::Failed(e) => return Err(e),
        }
    }
    Err(LauncherError::Archive(
        "update stopped without reporting a result".into(),
    ))
}

/// Start the freshly updated launcher.
pub fn restart_launcher(plan: &UpdaterPlan) -> LauncherResult<u32> {
    process::spawn_detached(&plan.launcher_exe, &plan.install_dir)
}

/// Full companion workflow. On error nothing is restarted.
pub async fn run<F>(plan: &UpdaterPlan, source: Arc<dyn RemoteSource>, on_progress: F) -> LauncherResult<u32>
where
    F: FnMut(&TransferProgress),
{
    apply_update(plan, source, on_progress).await?;
    let pid = restart_launcher(plan)?;
    log::info!("launcher restarted (pid {pid})");
    Ok(pid)
}
