//! Cursor pagination over Graph API edges.
//!
//! Pages are followed through `paging.next` until it disappears. Any page
//! failure fails the whole fetch; no partial result is returned.

use insights_core::error::{InsightsError, InsightsResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::transport::GraphTransport;

#[derive(Debug, Deserialize)]
struct Page {
    data: Option<Vec<Value>>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}

pub async fn fetch_all<T: DeserializeOwned>(
    transport: &dyn GraphTransport,
    first: Url,
    token: &str,
    max_pages: usize,
) -> InsightsResult<Vec<T>> {
    let mut items = Vec::new();
    let mut next = Some(first);
    let mut pages = 0usize;

    while let Some(url) = next.take() {
        if pages >= max_pages {
            return Err(InsightsError::Pagination(format!(
                "{} still has more data after {max_pages} pages",
                url.path()
            )));
        }

        let body = transport.get(&url, token).await?;
        let page: Page = serde_json::from_value(body)?;
        let Some(data) = page.data else {
            return Err(InsightsError::Pagination(format!(
                "page {} of {} has no data array",
                pages + 1,
                url.path()
            )));
        };
        pages += 1;
        metrics::counter!("insights.fetch.pages").increment(1);

        for item in data {
            items.push(serde_json::from_value(item)?);
        }

        next = match page.paging.and_then(|p| p.next) {
            Some(link) => Some(Url::parse(&link).map_err(|e| {
                InsightsError::Pagination(format!("malformed next-page link: {e}"))
            })?),
            None => None,
        };
    }

    debug!(pages, items = items.len(), "Pagination complete");
    Ok(items)
}
