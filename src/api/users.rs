//! User, seller listing and order endpoints

use serde_json::Value;

use super::client::{MarketClient, RequestOptions};
use super::error::ApiError;

/// Render a JSON id (numeric or string) as a path segment.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl MarketClient {
    /// `user_id` of `"me"` resolves to the token owner.
    pub async fn get_user(
        &self,
        token: &str,
        user_id: &str,
        attributes: Option<&str>,
    ) -> Result<Value, ApiError> {
        let path = format!("/users/{}", user_id);
        self.get(
            &path,
            RequestOptions::bearer(token).query_opt("attributes", attributes),
        )
        .await
    }

    /// Id of the token owner.
    pub async fn current_user_id(&self, token: &str) -> Result<String, ApiError> {
        let user = self.get_user(token, "me", None).await?;
        user.get("id")
            .and_then(id_string)
            .ok_or_else(|| ApiError::Decode {
                message: "user response has no id".to_string(),
            })
    }

    /// Item ids a seller has listed with `status`.
    pub async fn search_seller_item_ids(
        &self,
        token: &str,
        seller_id: &str,
        limit: u32,
        status: &str,
    ) -> Result<Vec<String>, ApiError> {
        let path = format!("/users/{}/items/search", seller_id);
        let result = self
            .get(
                &path,
                RequestOptions::bearer(token)
                    .query("limit", limit)
                    .query("status", status),
            )
            .await?;

        Ok(result
            .get("results")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(id_string).collect())
            .unwrap_or_default())
    }

    /// Full item records for a seller's listings, one lookup per item.
    pub async fn get_items(
        &self,
        token: &str,
        seller_id: &str,
        limit: u32,
        status: &str,
    ) -> Result<Vec<Value>, ApiError> {
        let ids = self
            .search_seller_item_ids(token, seller_id, limit, status)
            .await?;
        tracing::debug!("Seller {} has {} {} items", seller_id, ids.len(), status);

        let mut items = Vec::with_capacity(ids.len());
        for id in &ids {
            items.push(self.get_item(token, id, None).await?);
        }
        Ok(items)
    }

    /// Most recent orders received by a seller.
    pub async fn get_orders(
        &self,
        token: &str,
        seller_id: &str,
        limit: u32,
    ) -> Result<Vec<Value>, ApiError> {
        let result = self
            .get(
                "/orders/search",
                RequestOptions::bearer(token)
                    .query("seller", seller_id)
                    .query("limit", limit),
            )
            .await?;

        match result.get("results") {
            Some(Value::Array(orders)) => Ok(orders.clone()),
            _ => Err(ApiError::Decode {
                message: "order search response has no results".to_string(),
            }),
        }
    }
}
