use std::sync::Arc;

use crate::error::{LauncherError, LauncherResult};
use crate::item::ManagedItem;
use crate::orchestrator::InstallState;
use crate::remote::RemoteSource;
use crate::version::Version;
use crate::version_store;

/// Outcome of one resolve pass.
#[derive(Debug)]
pub struct Resolution {
    pub state: InstallState,
    /// Remote version, only set when this pass fetched it successfully.
    pub remote: Option<Version>,
    /// Why the pass ended in `Failed` (network vs. parse), for diagnostics.
    pub error: Option<LauncherError>,
}

/// `UpdateAvailable` iff the remote is strictly newer.
pub fn classify(local: Version, remote: Version) -> InstallState {
    if remote > local {
        InstallState::UpdateAvailable
    } else {
        InstallState::Ready
    }
}

/// Compares the local marker against the version endpoint.
#[derive(Clone)]
pub struct VersionResolver {
    source: Arc<dyn RemoteSource>,
}

impl VersionResolver {
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self { source }
    }

    /// Fetch and parse a remote version token.
    pub async fn fetch_remote(&self, url: &str) -> LauncherResult<Version> {
        let text = self.source.fetch_text(url).await?;
        Version::parse(&text)
    }

    /// Classify `item`. Safe to call any number of times.
    ///
    /// A missing executable short-circuits to `NotInstalled` without reading
    /// the marker or touching the network.
    pub async fn resolve(&self, item: &ManagedItem) -> Resolution {
        if !item.is_present() {
            return Resolution {
                state: InstallState::NotInstalled,
                remote: None,
                error: None,
            };
        }

        let local = version_store::read_or_baseline(&item.marker_path());
        match self.fetch_remote(&item.version_url).await {
            Ok(remote) => {
                let state = classify(local, remote);
                log::info!("{}: local {local}, remote {remote} -> {state}", item.name);
                Resolution {
                    state,
                    remote: Some(remote),
                    error: None,
                }
            }
            Err(e) => {
                log::warn!("{}: version check failed ({:?}): {e}", item.name, e.kind());
                Resolution {
                    state: InstallState::Failed,
                    remote: None,
                    error: Some(e),
                }
            }
        }
    }
}
