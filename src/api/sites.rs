//! Site-level endpoints: search, categories, trends and listing metadata

use std::collections::BTreeSet;
use std::future::Future;

use serde_json::{json, Value};

use super::client::{MarketClient, RequestOptions};
use super::error::ApiError;

/// Parameters for a site-wide search.
#[derive(Debug, Clone)]
pub struct SearchQuery<'a> {
    pub site_id: &'a str,
    pub query: Option<&'a str>,
    pub seller_id: Option<&'a str>,
    pub category: Option<&'a str>,
    pub limit: u32,
    pub offset: u32,
}

impl<'a> SearchQuery<'a> {
    pub fn new(site_id: &'a str) -> Self {
        Self {
            site_id,
            query: None,
            seller_id: None,
            category: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Run `call` and repeat it once if the first failure is transient.
async fn retry_transient<F, Fut>(what: &str, mut call: F) -> Result<Value, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, ApiError>>,
{
    match call().await {
        Err(e) if e.is_transient() => {
            tracing::warn!("{} failed ({}), retrying once", what, e);
            call().await
        }
        other => other,
    }
}

impl MarketClient {
    pub async fn get_listing_types(&self, token: &str, site_id: &str) -> Result<Value, ApiError> {
        let path = format!("/sites/{}/listing_types", site_id);
        self.get(&path, RequestOptions::bearer(token)).await
    }

    pub async fn get_listing_exposures(
        &self,
        token: &str,
        site_id: &str,
    ) -> Result<Value, ApiError> {
        let path = format!("/sites/{}/listing_exposures", site_id);
        self.get(&path, RequestOptions::bearer(token)).await
    }

    /// Site-wide search. When the marketplace refuses it (401/403) and no
    /// seller filter was given, fall back to listing the token owner's own
    /// items, shaped like a search response.
    pub async fn search(&self, token: &str, q: &SearchQuery<'_>) -> Result<Value, ApiError> {
        let path = format!("/sites/{}/search", q.site_id);
        let opts = RequestOptions::bearer(token)
            .query("limit", q.limit)
            .query("offset", q.offset)
            .query_opt("q", q.query)
            .query_opt("seller_id", q.seller_id)
            .query_opt("category", q.category);

        match self.get(&path, opts).await {
            Err(e) if e.is_authorization() && q.seller_id.is_none() => {
                tracing::info!("Search refused ({}), listing own items instead", e);
                let me = self.current_user_id(token).await?;
                let items = self.get_items(token, &me, q.limit, "active").await?;
                Ok(json!({
                    "results": items,
                    "paging": {"total": items.len(), "offset": 0, "limit": q.limit},
                }))
            }
            other => other,
        }
    }

    /// Distinct seller ids behind a category's search results, paging
    /// through until `max_sellers` are found or results run out.
    pub async fn category_sellers(
        &self,
        token: &str,
        site_id: &str,
        category: &str,
        max_sellers: usize,
    ) -> Result<Vec<String>, ApiError> {
        const PAGE: u32 = 50;
        let mut sellers = BTreeSet::new();
        let mut q = SearchQuery {
            category: Some(category),
            limit: PAGE,
            ..SearchQuery::new(site_id)
        };

        while sellers.len() < max_sellers {
            let page = self.search(token, &q).await?;
            let results = page
                .get("results")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let before = sellers.len();
            sellers.extend(
                results
                    .iter()
                    .filter_map(|item| item.pointer("/seller/id"))
                    .filter_map(super::users::id_string),
            );
            // An empty page, or the own-items fallback repeating itself
            if sellers.len() == before {
                break;
            }
            q.offset += PAGE;
        }

        Ok(sellers.into_iter().take(max_sellers).collect())
    }

    pub async fn get_categories(&self, token: &str, site_id: &str) -> Result<Value, ApiError> {
        let path = format!("/sites/{}/categories", site_id);
        let path = path.as_str();
        retry_transient("category list", move || {
            self.get(path, RequestOptions::bearer(token))
        })
        .await
    }

    pub async fn get_category(&self, token: &str, category_id: &str) -> Result<Value, ApiError> {
        let path = format!("/categories/{}", category_id);
        let path = path.as_str();
        retry_transient("category lookup", move || {
            self.get(path, RequestOptions::bearer(token))
        })
        .await
    }

    pub async fn get_category_attributes(
        &self,
        token: &str,
        category_id: &str,
    ) -> Result<Value, ApiError> {
        let path = format!("/categories/{}/attributes", category_id);
        let path = path.as_str();
        retry_transient("category attributes", move || {
            self.get(path, RequestOptions::bearer(token))
        })
        .await
    }

    pub async fn get_trends(
        &self,
        token: &str,
        site_id: &str,
        category_id: Option<&str>,
    ) -> Result<Value, ApiError> {
        let path = match category_id {
            Some(cat) => format!("/trends/{}/{}", site_id, cat),
            None => format!("/trends/{}", site_id),
        };
        self.get(&path, RequestOptions::bearer(token)).await
    }
}
