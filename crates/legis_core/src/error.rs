use thiserror::Error;

/// Transport-level failure talking to the remote source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("reading response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },
}

/// A location-based lookup in a source document came up empty.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid selector {css}: {message}")]
    Selector { css: String, message: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("anchor `{0}` not found")]
    MissingAnchor(String),

    #[error("no table follows anchor `{0}`")]
    MissingTable(String),

    #[error("label `{0}` not found")]
    MissingLabel(String),

    #[error("{table} row {row} has {found} cells, expected at least {expected}")]
    ShortRow {
        table: &'static str,
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("`{value}` is not a vote count")]
    BadCount { value: String },

    #[error("malformed vote document: {0}")]
    VoteDocument(String),

    #[error("reading PDF: {0}")]
    Pdf(#[from] lopdf::Error),
}
