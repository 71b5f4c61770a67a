//! Size-grid endpoints (fashion categories)

use serde_json::Value;

use super::client::{MarketClient, RequestOptions};
use super::error::ApiError;

impl MarketClient {
    pub async fn get_size_grid(&self, token: &str, grid_id: &str) -> Result<Value, ApiError> {
        let path = format!("/size_grids/{}", grid_id);
        self.get(&path, RequestOptions::bearer(token)).await
    }

    /// Rows of a size grid. Accepts either a bare array or `{"rows": [...]}`.
    pub async fn get_size_grid_rows(
        &self,
        token: &str,
        grid_id: &str,
    ) -> Result<Vec<Value>, ApiError> {
        let path = format!("/size_grids/{}/rows", grid_id);
        match self.get(&path, RequestOptions::bearer(token)).await? {
            Value::Array(rows) => Ok(rows),
            Value::Object(mut body) => match body.remove("rows") {
                Some(Value::Array(rows)) => Ok(rows),
                _ => Err(ApiError::Decode {
                    message: format!("size grid {} rows missing", grid_id),
                }),
            },
            _ => Err(ApiError::Decode {
                message: format!("size grid {} rows malformed", grid_id),
            }),
        }
    }
}
