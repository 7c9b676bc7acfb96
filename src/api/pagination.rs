// src/api/pagination.rs
//! Follow-the-`next`-pointer pagination.
//!
//! Paperless paginates collections with an absolute `next` URL in each
//! response. The whole collection is drained into memory before anything
//! operates on it; a failure on any page aborts the fetch.

use crate::api::client::PaperlessClient;
use crate::api::types::PaginatedResponse;
use crate::error::AppError;
use serde::de::DeserializeOwned;
use url::Url;

/// Fetches every page of a collection starting at `first_url`,
/// concatenating `results` in response order.
pub async fn fetch_all_pages<T: DeserializeOwned>(
    client: &PaperlessClient,
    first_url: Url,
) -> Result<Vec<T>, AppError> {
    let mut all_items = Vec::new();
    let mut next_url = Some(first_url);

    while let Some(url) = next_url {
        let page: PaginatedResponse<T> = client.get_json(url).await?;
        all_items.extend(page.results);
        next_url = match page.next {
            Some(next) => {
                Some(Url::parse(&next).map_err(|e| AppError::InvalidUrl(format!("{}: {}", next, e)))?)
            }
            None => None,
        };
    }

    log::debug!("Fetched {} items across pages", all_items.len());
    Ok(all_items)
}
