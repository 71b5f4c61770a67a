//! Item-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Item description sub-resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDescription {
    #[serde(default)]
    pub plain_text: String,
    /// Set when the lookup failed and this is a placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemDescription {
    pub fn unavailable(error: String) -> Self {
        Self {
            plain_text: "N/A".to_string(),
            error: Some(error),
            extra: Map::new(),
        }
    }
}

/// Item reviews sub-resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReviews {
    #[serde(default)]
    pub rating_average: f64,
    #[serde(default)]
    pub total_reviews: u64,
    #[serde(default)]
    pub reviews: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemReviews {
    pub fn unavailable(error: String) -> Self {
        Self {
            rating_average: 0.0,
            total_reviews: 0,
            reviews: Vec::new(),
            error: Some(error),
            extra: Map::new(),
        }
    }
}

/// Questions asked on an item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemQuestions {
    #[serde(default)]
    pub questions: Vec<Value>,
    #[serde(default)]
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemQuestions {
    pub fn unavailable(error: String) -> Self {
        Self {
            questions: Vec::new(),
            total: 0,
            error: Some(error),
            extra: Map::new(),
        }
    }
}

/// Outcome of a draft listing validation. Rejection is data, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Option<Value>,
}

impl ValidationResult {
    /// Structured causes of a rejection (`errors.cause[]`).
    pub fn causes(&self) -> Vec<Value> {
        self.errors
            .as_ref()
            .and_then(|e| e.get("cause"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

/// Flattened projection of a raw item with derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedItem {
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub category_id: Option<String>,
    pub current_price: f64,
    pub original_price: f64,
    pub available_quantity: Option<i64>,
    pub sold_quantity: i64,
    pub condition: Option<String>,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub gender: Option<String>,
    pub views: i64,
    pub conversion_rate: f64,
    pub seller_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub discount_percentage: f64,
}
