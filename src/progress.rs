use tokio::sync::mpsc;

use crate::error::LauncherError;
use crate::version::Version;

/// Bytes after which the synthetic projection (unknown content length) reaches ~63%.
const PROJECTION_SCALE_BYTES: f64 = 16.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Downloading,
    Extracting,
}

/// Observer-facing progress update for one transfer.
///
/// `percent` tracks the download and never goes down; while extracting it
/// stays at 100 and the file counters move instead.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    pub item: String,
    pub phase: TransferPhase,
    pub percent: u8, // 0..=100

    // Optional details
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub extracted_files: Option<u64>,
    pub total_files: Option<u64>,
    pub detail: Option<String>,
}

/// Everything a transfer reports. `Completed` and `Failed` are terminal.
#[derive(Debug)]
pub enum TransferEvent {
    Progress(TransferProgress),
    Completed { version: Option<Version> },
    Failed(LauncherError),
}

impl TransferEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferEvent::Progress(_))
    }
}

/// Percentage for `downloaded` bytes.
///
/// With a known total this is the plain ratio; otherwise an asymptotic
/// projection that approaches but never reaches 100.
pub fn download_percent(downloaded: u64, total: Option<u64>) -> u8 {
    match total {
        Some(t) if t > 0 => ((downloaded as f64 / t as f64).clamp(0.0, 1.0) * 100.0).floor() as u8,
        _ => {
            let projected = 1.0 - (-(downloaded as f64) / PROJECTION_SCALE_BYTES).exp();
            (projected * 99.0).floor().clamp(0.0, 99.0) as u8
        }
    }
}

/// Producer half of the progress channel.
///
/// Drops duplicate and backwards percentages so observers only ever see a
/// non-decreasing sequence.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    item: String,
    tx: mpsc::UnboundedSender<TransferEvent>,
    last_percent: Option<u8>,
    last_extracted: Option<u64>,
}

pub fn channel(item: &str) -> (ProgressSender, mpsc::UnboundedReceiver<TransferEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressSender {
            item: item.to_string(),
            tx,
            last_percent: None,
            last_extracted: None,
        },
        rx,
    )
}

impl ProgressSender {
    pub fn emit_download(&mut self, downloaded: u64, total: Option<u64>) {
        let percent = download_percent(downloaded, total);
        if self.last_percent.is_some_and(|last| percent <= last) {
            return;
        }
        self.last_percent = Some(percent);
        self.send(TransferEvent::Progress(TransferProgress {
            item: self.item.clone(),
            phase: TransferPhase::Downloading,
            percent,
            downloaded_bytes: Some(downloaded),
            total_bytes: total,
            extracted_files: None,
            total_files: None,
            detail: Some(format!("Downloading... {} MB", downloaded / 1024 / 1024)),
        }));
    }

    /// Close the download phase at 100%, also for projected progress.
    pub fn finish_download(&mut self, downloaded: u64) {
        if self.last_percent == Some(100) {
            return;
        }
        self.last_percent = Some(100);
        self.send(TransferEvent::Progress(TransferProgress {
            item: self.item.clone(),
            phase: TransferPhase::Downloading,
            percent: 100,
            downloaded_bytes: Some(downloaded),
            total_bytes: Some(downloaded),
            extracted_files: None,
            total_files: None,
            detail: Some("Download complete".to_string()),
        }));
    }

    pub fn emit_extract(&mut self, extracted: u64, total: u64, detail: Option<String>) {
        if self.last_extracted.is_some_and(|last| extracted < last) {
            return;
        }
        self.last_extracted = Some(extracted);
        self.send(TransferEvent::Progress(TransferProgress {
            item: self.item.clone(),
            phase: TransferPhase::Extracting,
            percent: self.last_percent.unwrap_or(100),
            downloaded_bytes: None,
            total_bytes: None,
            extracted_files: Some(extracted),
            total_files: Some(total),
            detail,
        }));
    }

    pub fn emit_completed(&self, version: Option<Version>) {
        self.send(TransferEvent::Completed { version });
    }

    pub fn emit_failed(&self, err: LauncherError) {
        self.send(TransferEvent::Failed(err));
    }

    fn send(&self, event: TransferEvent) {
        // Receiver gone means nobody is watching anymore; the transfer still finishes.
        let _ = self.tx.send(event);
    }
}
