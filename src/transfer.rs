use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::disk;
use crate::error::{LauncherError, LauncherResult};
use crate::lockfile::LockFile;
use crate::progress::{self, ProgressSender, TransferEvent};
use crate::remote::RemoteSource;
use crate::version::Version;
use crate::version_store;
use crate::zip_utils::{self, ExtractLayout};

/// What happens to an existing install folder before new content lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// Extract on top of the folder. Files the archive doesn't mention survive.
    Incremental,
    /// Delete the folder, then extract. Runs only after the archive is fully
    /// downloaded and has opened cleanly; a failing extraction after the wipe
    /// still leaves an empty (not installed) folder behind.
    WipeAndReplace,
}

/// One download-and-extract job.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub item: String,
    pub archive_url: String,
    pub archive_path: PathBuf,
    pub target_root: PathBuf,
    pub layout: ExtractLayout,
    pub policy: ReplacePolicy,
    /// Marker to write once extraction succeeded, with the version it should record.
    pub marker: Option<(PathBuf, Version)>,
}

/// Handle on a transfer running in the background.
#[derive(Debug)]
pub struct TransferHandle {
    pub events: mpsc::UnboundedReceiver<TransferEvent>,
    pub cancel: Arc<AtomicBool>,
    pub task: JoinHandle<()>,
}

impl TransferHandle {
    /// Ask the transfer to stop and wait until it has.
    pub async fn cancel_and_wait(self) {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.task.await;
    }
}

/// Downloads an archive and unpacks it into an install root.
#[derive(Clone)]
pub struct TransferExecutor {
    source: Arc<dyn RemoteSource>,
}

impl TransferExecutor {
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self { source }
    }

    /// Run `request` on the runtime. Progress and exactly one terminal event
    /// arrive on the returned handle's receiver.
    ///
    /// Fails with `Busy` when another transfer, in this or another launcher
    /// process, already owns the item's archive.
    pub fn spawn(&self, request: TransferRequest) -> LauncherResult<TransferHandle> {
        let lock = LockFile::try_acquire(&lock_path(&request.archive_path))?
            .ok_or_else(|| LauncherError::Busy(request.item.clone()))?;

        let (mut tx, rx) = progress::channel(&request.item);
        let cancel = Arc::new(AtomicBool::new(false));
        let executor = self.clone();
        let flag = cancel.clone();

        let task = tokio::spawn(async move {
            let result = executor.run(&request, &mut tx, flag).await;
            // Released before the terminal event so observers can start the next transfer.
            drop(lock);
            match result {
                Ok(()) => tx.emit_completed(request.marker.as_ref().map(|(_, v)| *v)),
                Err(e) => {
                    log::error!("transfer for {} failed ({:?}): {e}", request.item, e.kind());
                    tx.emit_failed(e);
                }
            }
        });

        Ok(TransferHandle {
            events: rx,
            cancel,
            task,
        })
    }

    /// Download, validate, (optionally wipe,) extract, then clean up and write the marker.
    ///
    /// Any error before the final step leaves the marker untouched. The
    /// archive is only removed on success.
    pub async fn run(
        &self,
        request: &TransferRequest,
        tx: &mut ProgressSender,
        cancel: Arc<AtomicBool>,
    ) -> LauncherResult<()> {
        let archive = &request.archive_path;
        self.preflight(request).await?;

        // Download
        let flag = cancel.clone();
        let mut on_chunk = |downloaded: u64, total: Option<u64>| -> LauncherResult<()> {
            if flag.load(Ordering::Relaxed) {
                return Err(LauncherError::Cancelled);
            }
            tx.emit_download(downloaded, total);
            Ok(())
        };
        let downloaded = self
            .source
            .download(&request.archive_url, archive, &mut on_chunk)
            .await?;
        tx.finish_download(downloaded);
        log::info!(
            "Downloaded {} ({}) for {}",
            archive.to_string_lossy(),
            disk::format_bytes(downloaded),
            request.item
        );

        // Validate before the target folder is touched.
        let entries = zip_utils::check_zip(archive)?;
        if cancel.load(Ordering::Relaxed) {
            return Err(LauncherError::Cancelled);
        }

        if request.policy == ReplacePolicy::WipeAndReplace && request.target_root.exists() {
            log::info!("Wiping {} before extraction", request.target_root.to_string_lossy());
            std::fs::remove_dir_all(&request.target_root)
                .map_err(|e| LauncherError::io(&request.target_root, e))?;
        }

        // Extract off the async runtime.
        let zip_path = archive.clone();
        let dest = request.target_root.clone();
        let layout = request.layout;
        let flag = cancel.clone();
        let mut extract_tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            zip_utils::extract_zip_with_progress(&zip_path, &dest, layout, &flag, |done, total, detail| {
                extract_tx.emit_extract(done, total, detail)
            })
        })
        .await
        .map_err(|e| LauncherError::Archive(format!("extraction task failed: {e}")))??;
        log::info!(
            "Extracted {entries} entries into {}",
            request.target_root.to_string_lossy()
        );

        remove_archive(archive);

        if let Some((marker, version)) = &request.marker {
            version_store::write(marker, *version)?;
            log::info!("{} marker set to {version}", request.item);
        }
        Ok(())
    }

    /// Refuse to start when the archive clearly won't fit, either where it is
    /// downloaded or where it is extracted.
    async fn preflight(&self, request: &TransferRequest) -> LauncherResult<()> {
        let archive_dir = request
            .archive_path
            .parent()
            .unwrap_or(request.target_root.as_path());
        std::fs::create_dir_all(archive_dir).map_err(|e| LauncherError::io(archive_dir, e))?;

        let needed = match self.source.content_length(&request.archive_url).await {
            Ok(size) => size,
            Err(e) => {
                log::warn!("size lookup for {} failed: {e}", request.archive_url);
                None
            }
        };
        let Some(needed) = needed else {
            return Ok(());
        };
        let target = existing_ancestor(&request.target_root);
        ensure_space(
            needed,
            &[
                (archive_dir, disk::free_bytes(archive_dir)),
                (target, disk::free_bytes(target)),
            ],
        )
    }
}

/// Lock file guarding one item's archive.
fn lock_path(archive: &Path) -> PathBuf {
    let mut name = archive.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    archive.with_file_name(name)
}

/// Closest ancestor of `path` that exists; the install root may not yet.
fn existing_ancestor(path: &Path) -> &Path {
    path.ancestors().find(|p| p.exists()).unwrap_or(path)
}

/// Every volume with a known free size must hold `needed` bytes.
fn ensure_space(needed: u64, volumes: &[(&Path, Option<u64>)]) -> LauncherResult<()> {
    for (path, available) in volumes {
        if let Some(available) = *available {
            if available < needed {
                return Err(LauncherError::InsufficientSpace {
                    path: path.to_path_buf(),
                    needed,
                    available,
                });
            }
        }
    }
    Ok(())
}

fn remove_archive(archive: &Path) {
    if let Err(e) = std::fs::remove_file(archive) {
        log::warn!("failed to delete archive {}: {e}", archive.to_string_lossy());
    }
}
