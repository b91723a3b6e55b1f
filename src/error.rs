use thiserror::Error;

/// Why a feed produced no records. The public fetch functions flatten all of
/// these into an empty list; the variants exist for logs and tests.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("invalid feed url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(reqwest::StatusCode),

    #[error("no {feed} header found in the first {scanned} lines")]
    HeaderNotFound { feed: &'static str, scanned: usize },

    #[error("{feed} feed has no usable rows")]
    NoRows { feed: &'static str },
}

impl FeedError {
    /// Transport-level failures, as opposed to data that simply didn't parse.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FeedError::InvalidUrl { .. } | FeedError::Transport(_) | FeedError::Status(_)
        )
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
