use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error type shared by every launcher module.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── Network ─────────────────────────────────────────
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("request to {url} failed: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    // ── Version tokens ──────────────────────────────────
    #[error("invalid version `{0}` (expected major.minor.patch)")]
    Parse(String),

    // ── Archive ─────────────────────────────────────────
    #[error("archive error: {0}")]
    Archive(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Filesystem ──────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("not enough disk space at {path:?}: need {needed} bytes, {available} available")]
    InsufficientSpace {
        path: PathBuf,
        needed: u64,
        available: u64,
    },

    #[error("settings error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Relocation ──────────────────────────────────────
    #[error("{0}")]
    Validation(String),

    // ── Orchestration ───────────────────────────────────
    #[error("a transfer is already running for {0}")]
    Busy(String),

    #[error("{operation} is not allowed while {item} is {state}")]
    InvalidState {
        item: String,
        operation: &'static str,
        state: String,
    },

    #[error("transfer cancelled")]
    Cancelled,

    #[error("failed to start {path:?}: {source}")]
    Process {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Coarse classification used by diagnostics.
///
/// The install state machine only distinguishes success from failure;
/// this is what the log and the user message use to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Parse,
    Archive,
    Filesystem,
    Validation,
    State,
    Cancelled,
    Process,
}

impl LauncherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LauncherError::Network { .. } | LauncherError::HttpStatus { .. } => ErrorKind::Network,
            LauncherError::Parse(_) => ErrorKind::Parse,
            LauncherError::Archive(_) | LauncherError::Zip(_) => ErrorKind::Archive,
            LauncherError::Io { .. }
            | LauncherError::InsufficientSpace { .. }
            | LauncherError::Json(_) => ErrorKind::Filesystem,
            LauncherError::Validation(_) => ErrorKind::Validation,
            LauncherError::Busy(_) | LauncherError::InvalidState { .. } => ErrorKind::State,
            LauncherError::Cancelled => ErrorKind::Cancelled,
            LauncherError::Process { .. } => ErrorKind::Process,
        }
    }

    pub fn network(url: &str, err: impl std::fmt::Display) -> Self {
        LauncherError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;
