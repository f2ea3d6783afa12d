use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::app::{Result, SubfeedError};
use crate::config::HttpConfig;
use crate::fetcher::{safe_file_name, FetchedPage, Fetcher};

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }

    async fn get_ok(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;

        if response.status() != StatusCode::OK {
            return Err(SubfeedError::BadResponse {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self.get_ok(url).await?;
        let final_url = response.url().to_string();
        let body = response.bytes().await?.to_vec();

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }

    async fn download(&self, url: &str, dest_dir: &Path, fallback_name: &str) -> Result<PathBuf> {
        let mut response = self.get_ok(url).await?;

        let name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .and_then(|v| filename_from_content_disposition(&v))
            .unwrap_or_else(|| fallback_name.to_string());

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(safe_file_name(&name)?);

        let mut file = tokio::fs::File::create(&path).await?;
        let written = match write_body(&mut response, &mut file).await {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                if let Err(remove) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %remove, "could not remove partial download");
                }
                return Err(e);
            }
        };

        debug!(url, path = %path.display(), bytes = written, "download complete");
        Ok(path)
    }
}

async fn write_body(response: &mut Response, file: &mut tokio::fs::File) -> Result<usize> {
    let mut written = 0usize;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    Ok(written)
}

/// Pick the file name out of a `Content-Disposition` header value.
///
/// The RFC 5987 `filename*` form wins over the plain `filename` form.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;

    for part in value.split(';') {
        let part = part.trim();
        if let Some(extended) = part.strip_prefix("filename*=") {
            let extended = extended.trim_matches('"');
            // charset'language'percent-encoded-name
            let encoded = extended.splitn(3, '\'').nth(2).unwrap_or(extended);
            if let Ok(decoded) = urlencoding::decode(encoded) {
                if !decoded.is_empty() {
                    return Some(decoded.into_owned());
                }
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            plain = Some(name.trim_matches('"').to_string());
        }
    }

    plain.filter(|n| !n.is_empty())
}
