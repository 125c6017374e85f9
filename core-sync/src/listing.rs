//! Pagination helpers
//!
//! Backends return listings one page at a time. [`collect_pages`] keeps
//! requesting pages until no continuation token comes back, each request
//! passing through the [`QuotaGuard`].

use crate::error::{Result, SyncError};
use crate::guard::QuotaGuard;
use bridge_traits::backend::Page;
use bridge_traits::error::Result as BridgeResult;
use std::collections::HashSet;
use std::future::Future;
use tracing::debug;

/// Collects every page of a listing.
///
/// `fetch` receives the continuation token of the previous page (`None` for
/// the first one). A backend that hands out the same token twice would loop
/// forever, so that is reported as a transport failure.
pub async fn collect_pages<T, F, Fut>(
    guard: &QuotaGuard,
    operation: &str,
    mut fetch: F,
) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = BridgeResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut seen_tokens = HashSet::new();
    let mut pages = 0usize;

    loop {
        let token = page_token.clone();
        let page = guard.run(operation, || fetch(token.clone())).await?;
        pages += 1;
        items.extend(page.items);

        match page.next_page_token {
            Some(next) => {
                if !seen_tokens.insert(next.clone()) {
                    return Err(SyncError::Transport(format!(
                        "{} returned a repeated page token",
                        operation
                    )));
                }
                page_token = Some(next);
            }
            None => break,
        }
    }

    debug!(operation, pages, items = items.len(), "Listing complete");
    Ok(items)
}
