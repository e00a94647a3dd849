use thiserror::Error;

/// Failure to obtain a page or image body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Statuses worth asking again for: rate limiting and server-side failures.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 408 | 429 | 500..=599)
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => Self::is_retryable_status(*status),
            FetchError::Transport { source, .. } => source.is_timeout() || source.is_connect(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { status: 404 | 410, .. })
    }
}

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Reasons a series cannot be turned into a chapter catalog. All of them end
/// the run.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("series '{series}' was not found{}", candidate_list(.candidates))]
    NotFound {
        series: String,
        candidates: Vec<String>,
    },
    #[error("series '{series}' is blocked: {warning}")]
    Blocked { series: String, warning: String },
    #[error("series '{series}' lists no chapters at {url}")]
    Empty { series: String, url: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
}

fn candidate_list(candidates: &[String]) -> String {
    if candidates.is_empty() {
        "; the site search returned no similar titles".to_string()
    } else {
        format!("; similar titles: {}", candidates.join(", "))
    }
}

/// Failures that abandon one chapter while the run moves on.
#[derive(Debug, Error)]
pub enum PagerError {
    #[error("no page selector on {url}")]
    MissingPageSelector { url: String },
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
}
