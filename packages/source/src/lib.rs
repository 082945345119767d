#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Crash feed retrieval and normalization.
//!
//! A [`feed::FeedDefinition`] describes one `ArcGIS` feature-service query.
//! [`fetcher::ArcGisPageFetcher`] turns a single `resultOffset` into a
//! [`Page`](crash_map_crash_models::Page), [`paginate::fetch_all_pages`]
//! walks the offsets until the feed is exhausted, and
//! [`normalize::normalize_all`] flattens the raw features into
//! [`NormalizedRecord`](crash_map_crash_models::NormalizedRecord)s.

pub mod feed;
pub mod fetcher;
pub mod normalize;
pub mod paginate;
pub mod progress;

use strum_macros::{AsRefStr, Display};

/// Errors that can occur while retrieving a feed.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A page request failed. Always fatal to the whole retrieval.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Building the HTTP client failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error (reading a feed definition).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The feed definition is unusable.
    #[error("Invalid feed definition: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// The service cut a page short of the page size but reported that more
    /// records match. The page size is larger than the service's own cap.
    #[error(
        "Page at offset {offset} returned {count} of {page_size} features but the service reported more records; lower page_size to the service's maxRecordCount"
    )]
    TransferLimitExceeded {
        /// The `resultOffset` of the short page.
        offset: u64,
        /// Features the page carried.
        count: u64,
        /// The requested page size.
        page_size: u64,
    },

    /// The configured page limit was hit before the feed ran out.
    #[error("Page limit of {max_pages} reached at offset {offset} before the feed was exhausted")]
    PageLimit {
        /// The configured maximum number of requests.
        max_pages: u64,
        /// The offset that would have been requested next.
        offset: u64,
    },
}

/// Why a single page request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FetchErrorKind {
    /// Network failure, timeout, or non-2xx status.
    Transport,
    /// The body could not be decoded into a page of features.
    Parse,
}

/// A failed page request, attributed to the offset that was requested.
#[derive(Debug, thiserror::Error)]
#[error("{kind} failure fetching page at offset {offset}: {source}")]
pub struct FetchError {
    /// The `resultOffset` of the failed request.
    pub offset: u64,
    /// Failure category.
    pub kind: FetchErrorKind,
    /// Underlying cause.
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl FetchError {
    /// Creates a [`FetchErrorKind::Transport`] failure.
    pub fn transport(
        offset: u64,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            offset,
            kind: FetchErrorKind::Transport,
            source: source.into(),
        }
    }

    /// Creates a [`FetchErrorKind::Parse`] failure.
    pub fn parse(offset: u64, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            offset,
            kind: FetchErrorKind::Parse,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_names_offset_and_kind() {
        let err = FetchError::transport(4000, "connection reset");
        assert_eq!(
            err.to_string(),
            "transport failure fetching page at offset 4000: connection reset"
        );
        assert_eq!(FetchError::parse(0, "bad json").kind.as_ref(), "parse");
    }
}
