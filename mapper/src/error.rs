use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },
    #[error("invalid payload from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read or write GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("GPX document has no track points")]
    EmptyTrack,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}
