//! Canned-response `Fetcher` used by unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::app::{Result, SubfeedError};
use crate::fetcher::{safe_file_name, FetchedPage, Fetcher};

enum Route {
    Page { final_url: String, body: Vec<u8> },
    Status(u16),
    Panic,
}

/// Serves registered URLs and records every request in order.
/// Unregistered URLs answer 404.
pub struct FakeFetcher {
    routes: HashMap<String, Route>,
    download_names: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            download_names: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.with_redirected_page(url, url, body)
    }

    pub fn with_redirected_page(
        mut self,
        url: &str,
        final_url: &str,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        self.routes.insert(
            url.to_string(),
            Route::Page {
                final_url: final_url.to_string(),
                body: body.into(),
            },
        );
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(url.to_string(), Route::Status(status));
        self
    }

    /// Name a download the way a `Content-Disposition` header would.
    pub fn with_download_name(mut self, url: &str, name: &str) -> Self {
        self.download_names.insert(url.to_string(), name.to_string());
        self
    }

    /// Requests for `url` panic, taking the calling task down with them.
    pub fn with_panic(mut self, url: &str) -> Self {
        self.routes.insert(url.to_string(), Route::Panic);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn was_requested(&self, url: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|r| r == url)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.requests.lock().unwrap().push(url.to_string());

        match self.routes.get(url) {
            Some(Route::Page { final_url, body }) => Ok(FetchedPage {
                url: final_url.clone(),
                body: body.clone(),
            }),
            Some(Route::Status(status)) => Err(SubfeedError::BadResponse {
                url: url.to_string(),
                status: *status,
            }),
            Some(Route::Panic) => panic!("fake fetcher asked to fail hard for {url}"),
            None => Err(SubfeedError::BadResponse {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn download(&self, url: &str, dest_dir: &Path, fallback_name: &str) -> Result<PathBuf> {
        let page = self.fetch(url).await?;
        let name = self
            .download_names
            .get(url)
            .map(String::as_str)
            .unwrap_or(fallback_name);
        let path = dest_dir.join(safe_file_name(name)?);
        tokio::fs::create_dir_all(dest_dir).await?;
        tokio::fs::write(&path, &page.body).await?;
        Ok(path)
    }
}
