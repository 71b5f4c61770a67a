//! Typed failures of the marketplace request pipeline

use serde_json::Value;
use thiserror::Error;

/// Failure of a single API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Rate limit exceeded ({limit} calls per minute)")]
    RateLimitExceeded { limit: u32 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("{}: {body}", status_label(*status))]
    Status { status: u16, body: Value },

    #[error("Request failed: {message}")]
    Transport { message: String },

    #[error("Unexpected response: {message}")]
    Decode { message: String },
}

fn status_label(status: u16) -> String {
    match status_category(status) {
        Some(category) => format!("{} (HTTP {})", category, status),
        None => format!("HTTP {}", status),
    }
}

/// Human-readable category for statuses callers commonly act on.
pub fn status_category(status: u16) -> Option<&'static str> {
    match status {
        401 => Some("Unauthorized"),
        403 => Some("Forbidden"),
        404 => Some("Not found"),
        429 => Some("Rate limited"),
        _ => None,
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 or 403 from the remote side.
    pub fn is_authorization(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Failures worth repeating the same call for: timeouts, connection
    /// problems and server-side errors. Client errors never are.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::RateLimitExceeded { .. } | Self::Decode { .. } => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Transport {
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_message_carries_category_and_body() {
        let err = ApiError::Status {
            status: 403,
            body: json!({"message": "forbidden"}),
        };
        assert_eq!(
            err.to_string(),
            r#"Forbidden (HTTP 403): {"message":"forbidden"}"#
        );

        let err = ApiError::Status {
            status: 500,
            body: json!({"error": "Invalid JSON"}),
        };
        assert_eq!(err.to_string(), r#"HTTP 500: {"error":"Invalid JSON"}"#);
    }

    #[test]
    fn classification() {
        let unauthorized = ApiError::Status {
            status: 401,
            body: Value::Null,
        };
        assert!(unauthorized.is_authorization());
        assert!(!unauthorized.is_transient());

        let not_found = ApiError::Status {
            status: 404,
            body: Value::Null,
        };
        assert!(!not_found.is_authorization());
        assert!(!not_found.is_transient());

        let bad_gateway = ApiError::Status {
            status: 502,
            body: Value::Null,
        };
        assert!(bad_gateway.is_transient());

        assert!(ApiError::Timeout { url: "u".into() }.is_transient());
        assert!(!ApiError::RateLimitExceeded { limit: 1 }.is_transient());
    }
}
