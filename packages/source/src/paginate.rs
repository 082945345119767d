//! Offset-based pagination over a [`PageFetcher`].
//!
//! Requests go out strictly one at a time: offset `n * page_size` is only
//! requested once page `n - 1` came back full. A page with fewer features
//! than the page cap is the last one. A full page is always followed by one
//! more request, even if it happened to be the true end of the feed. A
//! short page that still carries `exceededTransferLimit` means the page size
//! is above the service's cap, and is an error rather than the end.
//!
//! Any failed page aborts the whole retrieval. Returning the pages fetched
//! so far would hand a silently truncated feed to the recency window.

use crash_map_crash_models::RawFeature;

use crate::SourceError;
use crate::fetcher::PageFetcher;
use crate::progress::ProgressCallback;

/// Limits applied to a single retrieval.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaginationOptions {
    /// Stop with [`SourceError::PageLimit`] after this many requests if the
    /// feed is still not exhausted.
    pub max_pages: Option<u64>,
}

/// Fetches every page of the feed and concatenates the features in request
/// order.
///
/// # Errors
///
/// Returns [`SourceError::Fetch`] with the first failed page's offset and
/// kind, [`SourceError::TransferLimitExceeded`] if the service cut a page
/// short while reporting more records, or [`SourceError::PageLimit`] if
/// `max_pages` was reached first.
pub async fn fetch_all_pages(
    fetcher: &dyn PageFetcher,
    options: PaginationOptions,
    progress: &dyn ProgressCallback,
) -> Result<Vec<RawFeature>, SourceError> {
    let page_size = fetcher.page_size();
    if page_size == 0 {
        return Err(SourceError::Config {
            message: "page size must be greater than zero".to_string(),
        });
    }

    let mut all_features: Vec<RawFeature> = Vec::new();
    let mut offset: u64 = 0;
    let mut requests: u64 = 0;

    loop {
        if let Some(max_pages) = options.max_pages
            && requests >= max_pages
        {
            log::error!("Stopping at offset={offset}: page limit of {max_pages} reached");
            return Err(SourceError::PageLimit { max_pages, offset });
        }

        progress.set_message(format!("Fetching offset {offset}"));
        let page = fetcher.fetch_page(offset).await.inspect_err(|e| {
            log::error!(
                "Aborting retrieval after {} features: {e}",
                all_features.len()
            );
        })?;
        requests += 1;

        let count = page.len() as u64;
        log::info!(
            "offset={offset}: {count} features ({} total)",
            all_features.len() as u64 + count
        );
        if count > page_size {
            log::warn!(
                "offset={offset}: server returned {count} features, more than the page size of {page_size}"
            );
        }

        if count < page_size && page.exceeded_transfer_limit {
            log::error!(
                "offset={offset}: {count} features but the service reports more records"
            );
            return Err(SourceError::TransferLimitExceeded {
                offset,
                count,
                page_size,
            });
        }
        if page.is_empty() {
            log::debug!("offset={offset}: empty page");
        }

        all_features.extend(page.features);
        progress.inc(count);

        if count < page_size {
            break;
        }
        offset += page_size;
    }

    log::info!(
        "Feed exhausted: {} features in {requests} requests",
        all_features.len()
    );
    progress.finish(format!("Fetched {} features", all_features.len()));

    Ok(all_features)
}
