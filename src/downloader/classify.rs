use std::fmt;

/// File host serving caption archives directly.
pub const ARCHIVE_HOST_PREFIX: &str = "https://drive.google.com";
/// Attachment CDN of the blog platform.
pub const BLOG_DOWNLOAD_PREFIX: &str = "https://download.blog.naver.com/";
/// Blog platform whose posts wrap their content in an iframe.
pub const PLATFORM_BLOG_PREFIX: &str = "https://blog.naver.com/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Any other http(s) page; scanned for archive host anchors.
    GenericPage,
    /// Blog post whose attachments live in an embedded frame.
    PlatformBlog,
    ArchiveHostDirect,
    BlogDownload,
    Unsupported,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenericPage => "generic-page",
            Self::PlatformBlog => "platform-blog",
            Self::ArchiveHostDirect => "archive-host",
            Self::BlogDownload => "blog-download",
            Self::Unsupported => "unsupported",
        }
    }

    /// Links that point at a file rather than a page.
    pub fn is_archive_link(self) -> bool {
        matches!(self, Self::ArchiveHostDirect | Self::BlogDownload)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorize `url` by prefix. Case-sensitive and total.
pub fn classify(url: &str) -> SourceKind {
    // Most specific host first
    if url.starts_with(BLOG_DOWNLOAD_PREFIX) {
        SourceKind::BlogDownload
    } else if url.starts_with(ARCHIVE_HOST_PREFIX) {
        SourceKind::ArchiveHostDirect
    } else if url.starts_with(PLATFORM_BLOG_PREFIX) {
        SourceKind::PlatformBlog
    } else if url.starts_with("https://") || url.starts_with("http://") {
        SourceKind::GenericPage
    } else {
        SourceKind::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_hosts() {
        assert_eq!(
            classify("https://drive.google.com/file/d/ABC123/view?usp=sharing"),
            SourceKind::ArchiveHostDirect
        );
        assert_eq!(
            classify("https://drive.google.com/uc?authuser=0&id=ABC123&export=download"),
            SourceKind::ArchiveHostDirect
        );
        assert_eq!(
            classify("https://download.blog.naver.com/open/abc/%EC%9E%90%EB%A7%89.zip"),
            SourceKind::BlogDownload
        );
        assert_eq!(
            classify("https://blog.naver.com/someone/223268954039"),
            SourceKind::PlatformBlog
        );
    }

    #[test]
    fn test_classify_fallbacks() {
        assert_eq!(
            classify("https://subs.blogspot.com/2023/11/post.html"),
            SourceKind::GenericPage
        );
        assert_eq!(classify("http://example.com/"), SourceKind::GenericPage);
        assert_eq!(classify("ftp://example.com/subs.zip"), SourceKind::Unsupported);
        assert_eq!(classify(""), SourceKind::Unsupported);
        assert_eq!(classify("not a url"), SourceKind::Unsupported);
    }

    #[test]
    fn test_classify_is_case_sensitive() {
        assert_eq!(
            classify("https://DRIVE.google.com/file/d/ABC/view"),
            SourceKind::GenericPage
        );
        assert_eq!(classify("HTTPS://blog.naver.com/x"), SourceKind::Unsupported);
    }

    #[test]
    fn test_archive_link_kinds() {
        assert!(SourceKind::ArchiveHostDirect.is_archive_link());
        assert!(SourceKind::BlogDownload.is_archive_link());
        assert!(!SourceKind::PlatformBlog.is_archive_link());
        assert!(!SourceKind::GenericPage.is_archive_link());
    }
}
