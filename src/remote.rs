use std::fs::File;
use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_LENGTH;

use crate::error::{LauncherError, LauncherResult};

const APP_USER_AGENT: &str = concat!("nexus-launcher/", env!("CARGO_PKG_VERSION"));

/// Chunk callback: `(downloaded_bytes, total_bytes)`. Returning an error aborts the download.
pub type ChunkObserver<'a> = dyn FnMut(u64, Option<u64>) -> LauncherResult<()> + Send + 'a;

/// The remote side of an install: version tokens and archives reachable by URL.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// GET a small plain-text document (version endpoints).
    async fn fetch_text(&self, url: &str) -> LauncherResult<String>;

    /// Size of the document at `url`, when the server reports one.
    async fn content_length(&self, url: &str) -> LauncherResult<Option<u64>>;

    /// Stream `url` into `dest`, reporting every chunk. Returns the byte count.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_chunk: &mut ChunkObserver<'_>,
    ) -> LauncherResult<u64>;
}

/// `RemoteSource` backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> LauncherResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .map_err(|e| LauncherError::network("<client>", e))?;
        Ok(Self { client })
    }

    async fn get_ok(&self, url: &str) -> LauncherResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LauncherError::network(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch_text(&self, url: &str) -> LauncherResult<String> {
        log::info!("GET {url}");
        self.get_ok(url)
            .await?
            .text()
            .await
            .map_err(|e| LauncherError::network(url, e))
    }

    async fn content_length(&self, url: &str) -> LauncherResult<Option<u64>> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| LauncherError::network(url, e))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok()))
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_chunk: &mut ChunkObserver<'_>,
    ) -> LauncherResult<u64> {
        log::info!("Downloading {url} to {}", dest.to_string_lossy());

        let response = self.get_ok(url).await?;
        let total = response.content_length().filter(|t| *t > 0);

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut file = File::create(dest).map_err(|e| LauncherError::io(dest, e))?;

        let mut downloaded: u64 = 0;
        on_chunk(0, total)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LauncherError::network(url, e))?;
            file.write_all(&chunk).map_err(|e| LauncherError::io(dest, e))?;
            downloaded = downloaded.saturating_add(chunk.len() as u64);
            on_chunk(downloaded, total)?;
        }
        file.flush().map_err(|e| LauncherError::io(dest, e))?;
        // Handle must be closed before the archive is reopened for extraction (Windows).
        drop(file);

        Ok(downloaded)
    }
}
