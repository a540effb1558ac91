//! Download Manager for GitDesk.
//!
//! Streams files (release assets, log archives, raw URLs) to disk through the
//! HTTP transport, tracking progress per download. A download can be
//! cancelled while running; failed or cancelled downloads leave no partial
//! file behind. There is no resume.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::github_api::GitHubClient;
use crate::services::http_transport::{HttpRequest, HttpTransport, Method, ProgressFn};
use crate::types::download::{DownloadItem, DownloadStatus};
use crate::types::errors::{ApiError, DownloadError};
use crate::types::release::ReleaseAsset;

/// Where the bytes of a download come from.
pub enum DownloadSource<'a> {
    Url(HttpRequest),
    Asset {
        client: &'a GitHubClient,
        owner: &'a str,
        repo: &'a str,
        asset_id: u64,
    },
}

pub struct DownloadManager {
    transport: Arc<dyn HttpTransport>,
    downloads: Mutex<Vec<DownloadItem>>,
    cancel_tokens: Mutex<HashMap<String, CancellationToken>>,
}

fn no_progress(_: u64, _: Option<u64>) {}

impl DownloadManager {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            downloads: Mutex::new(Vec::new()),
            cancel_tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Progress callback that ignores updates.
    pub fn silent() -> ProgressFn<'static> {
        &no_progress
    }

    fn now_ts() -> i64 {
        Utc::now().timestamp()
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut DownloadItem)) -> Option<DownloadItem> {
        let mut downloads = self.downloads.lock();
        let item = downloads.iter_mut().find(|d| d.id == id)?;
        f(item);
        Some(item.clone())
    }

    /// Registers a pending download of `url` into `dest_dir/filename`,
    /// creating the directory. Only the final path component of `filename`
    /// is used.
    pub fn start_download(&self, url: &str, dest_dir: &Path, filename: &str) -> Result<String, DownloadError> {
        let filename = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DownloadError::FileSystemError(format!("invalid file name: {:?}", filename)))?
            .to_string();

        std::fs::create_dir_all(dest_dir)
            .map_err(|e| DownloadError::FileSystemError(format!("{}: {}", dest_dir.display(), e)))?;

        let id = Uuid::new_v4().to_string();
        let item = DownloadItem {
            id: id.clone(),
            url: url.to_string(),
            filepath: dest_dir.join(&filename).to_string_lossy().into_owned(),
            filename,
            size: None,
            downloaded: 0,
            status: DownloadStatus::Pending,
            started_at: Self::now_ts(),
            completed_at: None,
        };

        self.cancel_tokens.lock().insert(id.clone(), CancellationToken::new());
        self.downloads.lock().insert(0, item);
        Ok(id)
    }

    /// Streams `source` into the file registered for `id`.
    ///
    /// Returns the final item; a cancelled download comes back with status
    /// `Cancelled`, not as an error.
    pub async fn run_download(
        &self,
        id: &str,
        source: DownloadSource<'_>,
        progress: ProgressFn<'_>,
    ) -> Result<DownloadItem, DownloadError> {
        let token = self
            .cancel_tokens
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| DownloadError::NotFound(id.to_string()))?;
        let item = self
            .update(id, |item| item.status = DownloadStatus::InProgress)
            .ok_or_else(|| DownloadError::NotFound(id.to_string()))?;
        let path = PathBuf::from(&item.filepath);

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| DownloadError::FileSystemError(format!("{}: {}", path.display(), e)))?;

        let tracker = |done: u64, total: Option<u64>| {
            self.update(id, |item| {
                item.downloaded = done;
                if total.is_some() {
                    item.size = total;
                }
            });
            progress(done, total);
        };

        let transfer = async {
            match source {
                DownloadSource::Url(request) => self.transport.download(request, &mut file, &tracker).await,
                DownloadSource::Asset {
                    client,
                    owner,
                    repo,
                    asset_id,
                } => {
                    client
                        .download_asset(owner, repo, asset_id, &mut file, &tracker)
                        .await
                }
            }
        };

        let result = tokio::select! {
            result = transfer => Some(result),
            _ = token.cancelled() => None,
        };
        drop(file);
        self.cancel_tokens.lock().remove(id);

        match result {
            Some(Ok(bytes)) => {
                info!(id, bytes, path = %path.display(), "download complete");
                self.update(id, |item| {
                    item.downloaded = bytes;
                    item.status = DownloadStatus::Completed;
                    item.completed_at = Some(Self::now_ts());
                })
                .ok_or_else(|| DownloadError::NotFound(id.to_string()))
            }
            Some(Err(e)) => {
                warn!(id, error = %e, "download failed");
                Self::remove_partial(&path);
                self.update(id, |item| item.status = DownloadStatus::Failed(e.to_string()));
                Err(match e {
                    ApiError::Io(msg) => DownloadError::FileSystemError(msg),
                    other => DownloadError::NetworkError(other.to_string()),
                })
            }
            None => {
                debug!(id, "download cancelled");
                Self::remove_partial(&path);
                self.update(id, |item| item.status = DownloadStatus::Cancelled)
                    .ok_or_else(|| DownloadError::NotFound(id.to_string()))
            }
        }
    }

    fn remove_partial(path: &Path) {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "could not remove partial download");
            }
        }
    }

    /// Downloads a plain URL (no GitHub credentials are sent).
    pub async fn download_url(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: &str,
        progress: ProgressFn<'_>,
    ) -> Result<DownloadItem, DownloadError> {
        let id = self.start_download(url, dest_dir, filename)?;
        self.run_download(&id, DownloadSource::Url(HttpRequest::new(Method::Get, url)), progress)
            .await
    }

    /// Downloads a release asset through the authenticated API.
    pub async fn download_asset(
        &self,
        client: &GitHubClient,
        owner: &str,
        repo: &str,
        asset: &ReleaseAsset,
        dest_dir: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<DownloadItem, DownloadError> {
        let id = self.start_download(&asset.browser_download_url, dest_dir, &asset.name)?;
        let source = DownloadSource::Asset {
            client,
            owner,
            repo,
            asset_id: asset.id,
        };
        self.run_download(&id, source, progress).await
    }

    pub fn cancel_download(&self, id: &str) -> Result<(), DownloadError> {
        let status = self
            .get_download(id)
            .map(|d| d.status)
            .ok_or_else(|| DownloadError::NotFound(id.to_string()))?;
        if status == DownloadStatus::Completed {
            return Err(DownloadError::AlreadyCompleted(id.to_string()));
        }
        if let Some(token) = self.cancel_tokens.lock().get(id) {
            token.cancel();
        }
        Ok(())
    }

    pub fn list_downloads(&self) -> Vec<DownloadItem> {
        self.downloads.lock().clone()
    }

    pub fn get_download(&self, id: &str) -> Option<DownloadItem> {
        self.downloads.lock().iter().find(|d| d.id == id).cloned()
    }

    /// Forgets every download that is no longer running.
    pub fn clear_finished(&self) {
        self.downloads.lock().retain(|d| !d.status.is_finished());
    }
}
