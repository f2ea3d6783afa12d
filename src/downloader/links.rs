use std::sync::Arc;

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::app::{Result, SubfeedError};
use crate::downloader::classify::{SourceKind, ARCHIVE_HOST_PREFIX, BLOG_DOWNLOAD_PREFIX};
use crate::fetcher::Fetcher;

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SubfeedError::Other(format!("bad selector {}: {}", css, e)))
}

/// Every anchor `href` that starts with `prefix`, as written in the document.
pub fn anchors_with_prefix(html: &str, prefix: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    Ok(document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.starts_with(prefix))
        .map(String::from)
        .collect())
}

/// Every anchor whose `href`, resolved against `base`, starts with `prefix`.
pub fn resolved_anchors_with_prefix(html: &str, base: &Url, prefix: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    Ok(document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(String::from)
        .filter(|url| url.starts_with(prefix))
        .collect())
}

/// `src` of the first `iframe` in the document.
pub fn first_frame_source(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let frames = selector("iframe[src]")?;

    Ok(document
        .select(&frames)
        .filter_map(|f| f.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(String::from))
}

/// Turns a page into the archive links it references.
#[derive(Clone)]
pub struct LinkExtractor {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
}

impl LinkExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self { fetcher }
    }

    /// Candidate archive links for `page_url`, in document order and not
    /// de-duplicated.
    ///
    /// Archive links are their own single candidate. Platform blog posts are
    /// read through their first iframe (one level only); a post without one
    /// is scanned like a generic page.
    pub async fn extract_links(&self, page_url: &str, kind: SourceKind) -> Result<Vec<String>> {
        match kind {
            SourceKind::ArchiveHostDirect | SourceKind::BlogDownload => {
                Ok(vec![page_url.to_string()])
            }
            SourceKind::GenericPage => {
                let page = self.fetcher.fetch(page_url).await?;
                anchors_with_prefix(&page.text(), ARCHIVE_HOST_PREFIX)
            }
            SourceKind::PlatformBlog => self.extract_from_frame(page_url).await,
            SourceKind::Unsupported => Err(SubfeedError::InvalidFormat(format!(
                "unsupported page url: {}",
                page_url
            ))),
        }
    }

    async fn extract_from_frame(&self, page_url: &str) -> Result<Vec<String>> {
        let page = self.fetcher.fetch(page_url).await?;
        let html = page.text();

        let Some(src) = first_frame_source(&html)? else {
            debug!(page_url, "no iframe, scanning page directly");
            return anchors_with_prefix(&html, ARCHIVE_HOST_PREFIX);
        };

        let frame_url = Url::parse(&page.url)?.join(&src)?;
        debug!(page_url, frame = %frame_url, "following iframe");

        let frame = self.fetcher.fetch(frame_url.as_str()).await?;
        let frame_base = Url::parse(&frame.url)?;
        resolved_anchors_with_prefix(&frame.text(), &frame_base, BLOG_DOWNLOAD_PREFIX)
    }
}
