pub mod http_fetcher;

#[cfg(test)]
pub mod fake;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::app::{Result, SubfeedError};

pub use http_fetcher::HttpFetcher;

/// A successfully fetched (HTTP 200) resource.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; relative links resolve against it.
    pub url: String,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Fetcher {
    /// GET `url`. Any status other than 200 is a `BadResponse`.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;

    /// GET `url` and store the body in `dest_dir`, returning the written path.
    ///
    /// Implementations may derive the file name from the response; otherwise
    /// `fallback_name` is used.
    async fn download(&self, url: &str, dest_dir: &Path, fallback_name: &str) -> Result<PathBuf> {
        let page = self.fetch(url).await?;
        let path = dest_dir.join(safe_file_name(fallback_name)?);
        tokio::fs::create_dir_all(dest_dir).await?;
        tokio::fs::write(&path, &page.body).await?;
        Ok(path)
    }
}

/// Reduce a server- or URL-supplied name to a single path component.
pub fn safe_file_name(name: &str) -> Result<String> {
    let name = name.trim().replace('\\', "/");
    Path::new(&name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(String::from)
        .ok_or_else(|| SubfeedError::InvalidFormat(format!("unusable file name: {:?}", name)))
}
