//! Item endpoints and their sub-resources
//!
//! Description, reviews and questions never fail: a lookup error is folded
//! into a placeholder payload so that enriching a batch is not aborted by a
//! single item.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::client::{MarketClient, RequestOptions};
use super::error::ApiError;
use crate::models::{ItemDescription, ItemQuestions, ItemReviews, ValidationResult};

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        message: e.to_string(),
    })
}

impl MarketClient {
    pub async fn get_item(
        &self,
        token: &str,
        item_id: &str,
        attributes: Option<&str>,
    ) -> Result<Value, ApiError> {
        let path = format!("/items/{}", item_id);
        self.get(
            &path,
            RequestOptions::bearer(token).query_opt("attributes", attributes),
        )
        .await
    }

    pub async fn get_description(&self, token: &str, item_id: &str) -> ItemDescription {
        let path = format!("/items/{}/description", item_id);
        let result = self.get(&path, RequestOptions::bearer(token)).await;
        match result.and_then(decode) {
            Ok(description) => description,
            Err(e) => {
                tracing::debug!("No description for {}: {}", item_id, e);
                ItemDescription::unavailable(e.to_string())
            }
        }
    }

    pub async fn get_reviews(&self, token: &str, item_id: &str) -> ItemReviews {
        let path = format!("/reviews/item/{}", item_id);
        let result = self.get(&path, RequestOptions::bearer(token)).await;
        match result.and_then(decode) {
            Ok(reviews) => reviews,
            Err(e) => {
                tracing::debug!("No reviews for {}: {}", item_id, e);
                ItemReviews::unavailable(e.to_string())
            }
        }
    }

    pub async fn get_questions(&self, token: &str, item_id: &str, limit: u32) -> ItemQuestions {
        let result = self
            .get(
                "/questions/search",
                RequestOptions::bearer(token)
                    .query("item_id", item_id)
                    .query("limit", limit),
            )
            .await;
        match result.and_then(decode) {
            Ok(questions) => questions,
            Err(e) => {
                tracing::debug!("No questions for {}: {}", item_id, e);
                ItemQuestions::unavailable(e.to_string())
            }
        }
    }

    /// Submit a draft for server-side validation. 204 means valid; any other
    /// status is a rejection whose body becomes `errors`. Only transport
    /// problems are returned as `Err`.
    pub async fn validate_item(
        &self,
        token: &str,
        draft: &Value,
    ) -> Result<ValidationResult, ApiError> {
        let raw = self
            .send(
                Method::POST,
                "/items/validate",
                RequestOptions::bearer(token).json(draft),
            )
            .await?;

        if raw.status == StatusCode::NO_CONTENT {
            return Ok(ValidationResult {
                valid: true,
                errors: None,
            });
        }
        Ok(ValidationResult {
            valid: false,
            errors: Some(raw.json_or_marker()),
        })
    }
}
