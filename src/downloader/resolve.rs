use url::Url;

use crate::app::{Result, SubfeedError};
use crate::downloader::classify::{classify, SourceKind};
use crate::fetcher::safe_file_name;

/// Direct-download form of an archive host file id.
pub const CANONICAL_DOWNLOAD_URL: &str = "https://drive.google.com/uc?export=download&id=";

/// A link normalized into something that streams the file directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub canonical_url: String,
    /// Used when the response does not name the file itself.
    pub suggested_file_name: String,
}

/// File id from either archive host link shape:
/// `/file/d/{ID}/...` or `/uc?...&id={ID}...`.
pub fn parse_archive_host_id(url: &str) -> Result<String> {
    let invalid = || SubfeedError::InvalidFormat(format!("unrecognized archive host link: {}", url));
    let parsed = Url::parse(url).map_err(|_| invalid())?;
    let path = parsed.path();

    let id = if path.starts_with("/file/d/") {
        path.split('/').nth(3).map(String::from)
    } else if path.starts_with("/uc") {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned())
    } else {
        None
    };

    id.filter(|id| !id.is_empty()).ok_or_else(invalid)
}

/// Percent-decoded last path segment of a CDN download link.
fn blog_download_file_name(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    safe_file_name(&decoded)
}

/// Normalize an archive link into its [`DownloadTarget`].
///
/// Archive host links become the canonical download URL for their id. CDN
/// download links are already direct and pass through unchanged. Anything
/// else is `InvalidFormat`.
pub fn resolve(url: &str) -> Result<DownloadTarget> {
    match classify(url) {
        SourceKind::ArchiveHostDirect => {
            let id = parse_archive_host_id(url)?;
            Ok(DownloadTarget {
                canonical_url: format!("{}{}", CANONICAL_DOWNLOAD_URL, id),
                suggested_file_name: id,
            })
        }
        SourceKind::BlogDownload => Ok(DownloadTarget {
            canonical_url: url.to_string(),
            suggested_file_name: blog_download_file_name(url)?,
        }),
        kind => Err(SubfeedError::InvalidFormat(format!(
            "{} is a {} link, not a downloadable file",
            url, kind
        ))),
    }
}
