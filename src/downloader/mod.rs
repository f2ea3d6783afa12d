//! Page-driven archive acquisition.
//!
//! ```text
//! page url → classify → extract links → resolve → download → unpack
//! ```
//!
//! Invoked on demand rather than by the poller. A failure anywhere aborts the
//! page being processed; pages handled by [`Downloader::acquire_all`] are
//! independent of each other.

pub mod classify;
pub mod links;
pub mod resolve;
pub mod unpack;

pub use classify::{classify, SourceKind};
pub use links::LinkExtractor;
pub use resolve::{parse_archive_host_id, resolve, DownloadTarget};
pub use unpack::{unpack, ArchiveFormat, Unpacker};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::app::{Result, SubfeedError};
use crate::config::DownloaderConfig;
use crate::fetcher::Fetcher;

pub const DEFAULT_CONCURRENCY: usize = 2;

/// One downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredFile {
    pub link: String,
    pub canonical_url: String,
    /// Where the download was written. Removed after unpacking unless
    /// archives are kept.
    pub path: PathBuf,
    pub unpacked_to: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AcquireReport {
    pub page_url: String,
    pub kind: SourceKind,
    pub files: Vec<AcquiredFile>,
}

#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    extractor: LinkExtractor,
    download_dir: PathBuf,
    keep_archives: bool,
    semaphore: Arc<Semaphore>,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>, download_dir: PathBuf) -> Self {
        Self {
            extractor: LinkExtractor::new(fetcher.clone()),
            fetcher,
            download_dir,
            keep_archives: false,
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
        }
    }

    pub fn from_config(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        config: &DownloaderConfig,
        download_dir: PathBuf,
    ) -> Self {
        Self::new(fetcher, download_dir)
            .with_concurrency(config.concurrency)
            .keep_archives(config.keep_archives)
    }

    pub fn with_concurrency(mut self, pages: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(pages.max(1)));
        self
    }

    pub fn keep_archives(mut self, keep: bool) -> Self {
        self.keep_archives = keep;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Download and unpack every archive referenced by `page_url`.
    pub async fn acquire(&self, page_url: &str) -> Result<AcquireReport> {
        let kind = classify(page_url);
        let links = self.extractor.extract_links(page_url, kind).await?;
        info!(page_url, %kind, links = links.len(), "extracted archive links");

        let mut files = Vec::with_capacity(links.len());
        for link in links {
            files.push(self.acquire_link(link).await?);
        }

        Ok(AcquireReport {
            page_url: page_url.to_string(),
            kind,
            files,
        })
    }

    /// Acquire several pages concurrently. Results keep input order.
    pub async fn acquire_all(&self, pages: Vec<String>) -> Vec<(String, Result<AcquireReport>)> {
        let mut handles = Vec::new();

        for page in pages {
            let downloader = self.clone();
            let semaphore = self.semaphore.clone();
            let task_page = page.clone();

            let handle = tokio::spawn(async move {
                match semaphore.acquire().await {
                    Ok(_permit) => downloader.acquire(&task_page).await,
                    Err(e) => Err(SubfeedError::Other(format!("download pool closed: {}", e))),
                }
            });

            handles.push((page, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (page, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(page = %page, "Task join error: {}", e);
                    Err(SubfeedError::Other(format!("download task failed: {}", e)))
                }
            };
            results.push((page, result));
        }

        results
    }

    async fn acquire_link(&self, link: String) -> Result<AcquiredFile> {
        let target = resolve(&link)?;
        let path = self
            .fetcher
            .download(&target.canonical_url, &self.download_dir, &target.suggested_file_name)
            .await?;
        debug!(link = %link, path = %path.display(), "downloaded");
        let path = self.name_by_contents(path).await?;

        let unpacked_to = match ArchiveFormat::unpack_dir_name(&path) {
            Some(dir_name) => {
                let dest = self.download_dir.join(dir_name);
                self.unpack_blocking(path.clone(), dest.clone()).await?;
                if !self.keep_archives {
                    tokio::fs::remove_file(&path).await?;
                }
                info!(archive = %path.display(), dest = %dest.display(), "unpacked");
                Some(dest)
            }
            None => None,
        };

        Ok(AcquiredFile {
            link,
            canonical_url: target.canonical_url,
            path,
            unpacked_to,
        })
    }

    /// Give an extensionless download the extension its leading bytes
    /// identify, so it is unpacked like any named archive.
    async fn name_by_contents(&self, path: PathBuf) -> Result<PathBuf> {
        if ArchiveFormat::from_path(&path).is_some() {
            return Ok(path);
        }

        let mut head = [0u8; 8];
        let read = {
            let mut file = tokio::fs::File::open(&path).await?;
            file.read(&mut head).await?
        };
        let Some(format) = ArchiveFormat::sniff(&head[..read]) else {
            return Ok(path);
        };

        let mut renamed = path.clone().into_os_string();
        renamed.push(".");
        renamed.push(format.as_str());
        let renamed = PathBuf::from(renamed);
        tokio::fs::rename(&path, &renamed).await?;
        debug!(from = %path.display(), to = %renamed.display(), "named download by contents");
        Ok(renamed)
    }

    async fn unpack_blocking(&self, archive: PathBuf, dest: PathBuf) -> Result<()> {
        tokio::task::spawn_blocking(move || unpack(&archive, &dest))
            .await
            .map_err(|e| SubfeedError::Other(format!("unpack task failed: {}", e)))?
    }
}
