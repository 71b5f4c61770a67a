//! Authenticated HTTP client for the marketplace REST API
//!
//! Wraps reqwest::Client with rate gating, per-request correlation ids and
//! status-to-error mapping. Resource methods live in the sibling modules.

use std::sync::Mutex;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use super::error::ApiError;
use super::rate::RateGate;
use crate::config::Settings;

const USER_AGENT: &str = concat!("meli-etl/", env!("CARGO_PKG_VERSION"));

/// Per-call inputs beyond method and path.
#[derive(Debug, Default, Clone)]
pub struct RequestOptions<'a> {
    pub token: Option<&'a str>,
    pub query: Vec<(&'static str, String)>,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<&'a Value>,
}

impl<'a> RequestOptions<'a> {
    pub fn bearer(token: &'a str) -> Self {
        Self {
            token: Some(token),
            ..Self::default()
        }
    }

    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    /// Add a query pair only when a value is present.
    pub fn query_opt(self, key: &'static str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn json(mut self, body: &'a Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status and raw body of a completed call, before interpretation.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub text: String,
}

impl RawResponse {
    /// Body as JSON, or the `Invalid JSON` marker when it does not parse.
    pub fn json_or_marker(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or_else(|_| json!({"error": "Invalid JSON"}))
    }
}

/// Marketplace client. Owns its rate window; create one per logical caller.
pub struct MarketClient {
    http: reqwest::Client,
    base_url: String,
    rate: Mutex<RateGate>,
}

impl MarketClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(settings.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            rate: Mutex::new(RateGate::new(settings.rate_limit)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn admit(&self) -> Result<(), ApiError> {
        self.rate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .admit()
    }

    /// Issue one call and hand back the raw outcome. Only rate refusals and
    /// transport problems are errors here; any HTTP status is returned.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        opts: RequestOptions<'_>,
    ) -> Result<RawResponse, ApiError> {
        self.admit()?;

        let url = format!("{}{}", self.base_url, path);
        let request_id = uuid::Uuid::new_v4().simple().to_string();
        tracing::debug!("{} {} (request {})", method, url, request_id);

        let mut req = self.http.request(method, &url);
        for (name, value) in &opts.headers {
            req = req.header(*name, value.as_str());
        }
        req = req
            .header("X-Request-ID", request_id)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = opts.token {
            req = req.bearer_auth(token);
        }
        if !opts.query.is_empty() {
            req = req.query(&opts.query);
        }
        if let Some(body) = opts.body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, &url))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::from_reqwest(e, &url))?;

        Ok(RawResponse { status, text })
    }

    /// Issue one call and interpret it: non-2xx becomes `ApiError::Status`,
    /// 204 yields an empty object, anything else the parsed JSON body.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        opts: RequestOptions<'_>,
    ) -> Result<Value, ApiError> {
        let raw = self.send(method, path, opts).await?;

        if !raw.status.is_success() {
            let body = raw.json_or_marker();
            tracing::debug!("HTTP {} for {}: {}", raw.status.as_u16(), path, body);
            return Err(ApiError::Status {
                status: raw.status.as_u16(),
                body,
            });
        }
        if raw.status == StatusCode::NO_CONTENT {
            return Ok(json!({}));
        }

        serde_json::from_str(&raw.text).map_err(|e| ApiError::Decode {
            message: format!("{} returned non-JSON body: {}", path, e),
        })
    }

    pub async fn get(&self, path: &str, opts: RequestOptions<'_>) -> Result<Value, ApiError> {
        self.execute(Method::GET, path, opts).await
    }
}
