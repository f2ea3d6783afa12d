use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubfeedError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Bad response from {url}: HTTP {status}")]
    BadResponse { url: String, status: u16 },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SubfeedError>;
