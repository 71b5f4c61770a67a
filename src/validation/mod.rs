//! Draft listing validation with automatic fixes
//!
//! The marketplace reports validation problems one cause at a time. This
//! loop submits a draft, patches whatever the causes name (size grid, grid
//! row, size, minimum price) and resubmits until the draft passes or the
//! attempt budget runs out.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::api::{ApiError, MarketClient};
use crate::models::{DraftListing, ValidationResult};

pub const GRID_ID_MISSING: &str = "missing.fashion_grid.grid_id.values";
pub const GRID_ROW_MISSING: &str = "missing.fashion_grid.grid_row_id.values";
pub const SIZE_MISSING: &str = "missing.fashion_grid.size.values";
pub const PRICE_INVALID: &str = "item.price.invalid";

const SIZE_GRID_ATTR: &str = "SIZE_GRID_ID";
const SIZE_GRID_ROW_ATTR: &str = "SIZE_GRID_ROW_ID";
const SIZE_ATTR: &str = "SIZE";

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// The calls the fixup loop needs, bound to one token.
#[async_trait]
pub trait ListingApi {
    async fn validate(&self, draft: &Value) -> Result<ValidationResult, ApiError>;
    async fn category_attributes(&self, category_id: &str) -> Result<Value, ApiError>;
    async fn size_grid_rows(&self, grid_id: &str) -> Result<Vec<Value>, ApiError>;
}

/// A client paired with the bearer token to use for every call.
pub struct Authed<'a> {
    pub client: &'a MarketClient,
    pub token: &'a str,
}

#[async_trait]
impl ListingApi for Authed<'_> {
    async fn validate(&self, draft: &Value) -> Result<ValidationResult, ApiError> {
        self.client.validate_item(self.token, draft).await
    }

    async fn category_attributes(&self, category_id: &str) -> Result<Value, ApiError> {
        self.client
            .get_category_attributes(self.token, category_id)
            .await
    }

    async fn size_grid_rows(&self, grid_id: &str) -> Result<Vec<Value>, ApiError> {
        self.client.get_size_grid_rows(self.token, grid_id).await
    }
}

/// How a fixup run ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Valid { attempts: usize, draft: DraftListing },
    /// The marketplace has no data to fix the draft with (e.g. a category
    /// whose size grid attribute lists no grids). Not a bug in the draft.
    Inapplicable { attempts: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum FixupError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("cause {code} needs {needs}, which is not known yet")]
    MissingPrerequisite { code: String, needs: &'static str },

    #[error("no fixable validation cause: {}", render(causes))]
    Unactionable { causes: Vec<Value> },

    #[error("draft still invalid after {attempts} attempts: {}", render(causes))]
    Exhausted { attempts: usize, causes: Vec<Value> },
}

fn render(causes: &[Value]) -> String {
    Value::Array(causes.to_vec()).to_string()
}

/// Result of handling one cause.
enum Step {
    Fixed,
    Skipped,
    Blocked(String),
}

pub struct Fixup {
    draft: DraftListing,
    max_attempts: usize,
    grid_id: Option<String>,
    row: Option<Value>,
    min_price: Option<i64>,
}

impl Fixup {
    pub fn new(draft: DraftListing) -> Self {
        Self {
            draft,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            grid_id: None,
            row: None,
            min_price: None,
        }
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub async fn run<A: ListingApi + ?Sized>(mut self, api: &A) -> Result<Outcome, FixupError> {
        let mut last_causes = Vec::new();

        for attempt in 1..=self.max_attempts {
            let result = api.validate(&self.draft.as_value()).await?;
            if result.valid {
                tracing::info!("Draft valid after {} attempt(s)", attempt);
                return Ok(Outcome::Valid {
                    attempts: attempt,
                    draft: self.draft,
                });
            }

            let mut causes = result.causes();
            if causes.is_empty() {
                causes.extend(result.errors);
            }

            let mut fixed = 0;
            for cause in &causes {
                match self.apply(api, cause).await? {
                    Step::Fixed => fixed += 1,
                    Step::Skipped => {}
                    Step::Blocked(reason) => {
                        tracing::warn!("Validation fixup not applicable: {}", reason);
                        return Ok(Outcome::Inapplicable {
                            attempts: attempt,
                            reason,
                        });
                    }
                }
            }
            if fixed == 0 {
                return Err(FixupError::Unactionable { causes });
            }

            tracing::info!("Attempt {}: fixed {} cause(s)", attempt, fixed);
            last_causes = causes;
        }

        Err(FixupError::Exhausted {
            attempts: self.max_attempts,
            causes: last_causes,
        })
    }

    async fn apply<A: ListingApi + ?Sized>(
        &mut self,
        api: &A,
        cause: &Value,
    ) -> Result<Step, FixupError> {
        let code = cause.get("code").and_then(Value::as_str).unwrap_or("");
        match code {
            GRID_ID_MISSING => self.choose_grid(api).await,
            GRID_ROW_MISSING => self.choose_row(api).await,
            SIZE_MISSING => self.choose_size(),
            PRICE_INVALID => Ok(self.raise_price(cause)),
            other => {
                tracing::debug!("No fix for validation cause {:?}", other);
                Ok(Step::Skipped)
            }
        }
    }

    async fn choose_grid<A: ListingApi + ?Sized>(&mut self, api: &A) -> Result<Step, FixupError> {
        let category = self
            .draft
            .category_id()
            .ok_or(FixupError::MissingPrerequisite {
                code: GRID_ID_MISSING.to_string(),
                needs: "a category_id on the draft",
            })?
            .to_string();

        let attributes = api.category_attributes(&category).await?;
        let first = attributes
            .as_array()
            .and_then(|attrs| {
                attrs
                    .iter()
                    .find(|a| a.get("id").and_then(Value::as_str) == Some(SIZE_GRID_ATTR))
            })
            .and_then(|attr| attr.get("values"))
            .and_then(Value::as_array)
            .and_then(|values| values.first())
            .and_then(|value| value.get("id").or_else(|| value.get("name")))
            .and_then(crate::api::id_string);

        let Some(grid_id) = first else {
            return Ok(Step::Blocked(format!(
                "category {} has no size grids available",
                category
            )));
        };

        tracing::debug!("Using size grid {}", grid_id);
        self.draft.set_attribute(SIZE_GRID_ATTR, &grid_id);
        self.grid_id = Some(grid_id);
        Ok(Step::Fixed)
    }

    async fn choose_row<A: ListingApi + ?Sized>(&mut self, api: &A) -> Result<Step, FixupError> {
        let grid_id = self
            .grid_id
            .clone()
            .ok_or(FixupError::MissingPrerequisite {
                code: GRID_ROW_MISSING.to_string(),
                needs: "a chosen size grid",
            })?;

        let rows = api.size_grid_rows(&grid_id).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(Step::Blocked(format!("size grid {} has no rows", grid_id)));
        };
        let Some(row_id) = row.get("id").and_then(crate::api::id_string) else {
            return Ok(Step::Blocked(format!("size grid {} row has no id", grid_id)));
        };

        tracing::debug!("Using size grid row {}", row_id);
        self.draft.set_attribute(SIZE_GRID_ROW_ATTR, &row_id);
        self.row = Some(row);
        Ok(Step::Fixed)
    }

    fn choose_size(&mut self) -> Result<Step, FixupError> {
        let row = self.row.as_ref().ok_or(FixupError::MissingPrerequisite {
            code: SIZE_MISSING.to_string(),
            needs: "a chosen size grid row",
        })?;

        match size_label(row) {
            Some(label) => {
                self.draft.set_attribute(SIZE_ATTR, &label);
                Ok(Step::Fixed)
            }
            None => Ok(Step::Skipped),
        }
    }

    fn raise_price(&mut self, cause: &Value) -> Step {
        let parsed = cause
            .get("message")
            .and_then(Value::as_str)
            .and_then(minimum_from_message);
        let Some(minimum) = parsed.or(self.min_price) else {
            return Step::Skipped;
        };
        if self.draft.price() == Some(minimum as f64) {
            tracing::debug!("Price already at minimum {}", minimum);
            return Step::Skipped;
        }

        tracing::debug!("Raising price to {}", minimum);
        self.min_price = Some(minimum);
        self.draft.set_price(minimum);
        Step::Fixed
    }
}

/// Size label for a grid row: its `SIZE` attribute value, else its name,
/// else its id.
fn size_label(row: &Value) -> Option<String> {
    let from_attr = row
        .get("attributes")
        .and_then(Value::as_array)
        .and_then(|attrs| {
            attrs
                .iter()
                .find(|a| a.get("id").and_then(Value::as_str) == Some(SIZE_ATTR))
        })
        .and_then(|attr| attr.get("values"))
        .and_then(Value::as_array)
        .and_then(|values| values.first())
        .and_then(|v| v.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    from_attr
        .or_else(|| row.get("name").and_then(Value::as_str).map(str::to_string))
        .or_else(|| row.get("id").and_then(crate::api::id_string))
}

/// The marketplace states the minimum price only in prose, as the last word
/// of the message. Trailing punctuation is tolerated.
fn minimum_from_message(message: &str) -> Option<i64> {
    message
        .split_whitespace()
        .last()?
        .trim_end_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .ok()
}
