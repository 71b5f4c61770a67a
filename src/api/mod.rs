//! API client module for the marketplace REST API
//!
//! The command handlers at the bottom back the CLI: each opens a session
//! (client plus current token), makes its calls and prints JSON to stdout.

pub mod client;
mod error;
mod items;
mod rate;
mod sites;
mod size_grids;
mod users;

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

pub use client::{MarketClient, RawResponse, RequestOptions};
pub use error::{status_category, ApiError};
pub use rate::RateGate;
pub use sites::SearchQuery;
pub(crate) use users::id_string;

use crate::auth::{self, FileTokenStore};
use crate::config::Settings;
use crate::models::DraftListing;
use crate::pipeline::{self, EtlOptions, JsonLinesSink};
use crate::transform;
use crate::validation::{Authed, Fixup, Outcome};

/// A client paired with the token it should use.
struct Session {
    client: MarketClient,
    token: String,
}

impl Session {
    async fn open(settings: &Settings) -> Result<Self> {
        let store = FileTokenStore::new(settings);
        let current = auth::current_token(settings, &store).await?;
        if let auth::TokenSource::Stale { reason } = &current.source {
            tracing::warn!("Using an expired access token ({})", reason);
        }

        Ok(Self {
            client: MarketClient::new(settings)?,
            token: current.token.access_token,
        })
    }

    /// `seller` or, when absent, the token owner.
    async fn seller_or_me(&self, seller: Option<&str>) -> Result<String> {
        match seller {
            Some(id) => Ok(id.to_string()),
            None => Ok(self.client.current_user_id(&self.token).await?),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Accepts RFC 3339 or a bare date. A bare date means the start of that day
/// (UTC), or its last second when `end_of_day` is set.
pub fn parse_bound(text: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {}", text))?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .with_context(|| format!("Invalid date: {}", text))
}

/// Show the token owner
pub async fn whoami(settings: &Settings) -> Result<()> {
    let session = Session::open(settings).await?;
    let me = session.client.get_user(&session.token, "me", None).await?;
    let field = |key: &str| {
        me.get(key)
            .and_then(id_string)
            .unwrap_or_else(|| "(none)".to_string())
    };

    println!();
    println!("Nickname: {}", field("nickname"));
    println!("Email:    {}", field("email"));
    println!("Site:     {}", field("site_id"));
    println!("ID:       {}", field("id"));

    Ok(())
}

pub async fn user(settings: &Settings, user_id: &str, attributes: Option<&str>) -> Result<()> {
    let session = Session::open(settings).await?;
    let user = session
        .client
        .get_user(&session.token, user_id, attributes)
        .await?;
    print_json(&user)
}

pub async fn items(
    settings: &Settings,
    seller: Option<&str>,
    limit: u32,
    status: &str,
) -> Result<()> {
    let session = Session::open(settings).await?;
    let seller = session.seller_or_me(seller).await?;
    let items = session
        .client
        .get_items(&session.token, &seller, limit, status)
        .await?;
    tracing::info!("{} items", items.len());
    print_json(&items)
}

/// One item, optionally with description, reviews and questions.
pub async fn item(
    settings: &Settings,
    item_id: &str,
    with_description: bool,
    with_reviews: bool,
    questions: Option<u32>,
) -> Result<()> {
    let session = Session::open(settings).await?;
    let (client, token) = (&session.client, session.token.as_str());

    let mut item = client.get_item(token, item_id, None).await?;
    if let Some(record) = item.as_object_mut() {
        if with_description {
            let description = client.get_description(token, item_id).await;
            record.insert("description".to_string(), serde_json::to_value(description)?);
        }
        if with_reviews {
            let reviews = client.get_reviews(token, item_id).await;
            record.insert("reviews".to_string(), serde_json::to_value(reviews)?);
        }
        if let Some(limit) = questions {
            let questions = client.get_questions(token, item_id, limit).await;
            record.insert("questions".to_string(), serde_json::to_value(questions)?);
        }
    }
    print_json(&item)
}

pub async fn search(settings: &Settings, query: &SearchQuery<'_>) -> Result<()> {
    let session = Session::open(settings).await?;
    let result = session.client.search(&session.token, query).await?;
    print_json(&result)
}

/// Orders for a seller, normalized into rows. With `all`, pages are polled
/// until no new orders appear.
pub async fn orders(
    settings: &Settings,
    seller: Option<&str>,
    limit: u32,
    all: bool,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<()> {
    let session = Session::open(settings).await?;
    let seller = session.seller_or_me(seller).await?;

    let raw = if all {
        pipeline::collect_orders(&session.client, &session.token, &seller, limit, start, end)
            .await?
    } else {
        let page = session
            .client
            .get_orders(&session.token, &seller, limit)
            .await?;
        transform::filter_by_date(page, start, end)
    };

    let mut normalized = Vec::with_capacity(raw.len());
    for order in &raw {
        match transform::normalize_order(order) {
            Ok(n) => normalized.push(n),
            Err(e) => tracing::warn!("Skipping order: {}", e),
        }
    }
    tracing::info!("{} orders", normalized.len());
    print_json(&normalized)
}

pub async fn categories(settings: &Settings, site_id: &str) -> Result<()> {
    let session = Session::open(settings).await?;
    print_json(&session.client.get_categories(&session.token, site_id).await?)
}

pub async fn category(settings: &Settings, category_id: &str, attributes: bool) -> Result<()> {
    let session = Session::open(settings).await?;
    let result = if attributes {
        session
            .client
            .get_category_attributes(&session.token, category_id)
            .await?
    } else {
        session
            .client
            .get_category(&session.token, category_id)
            .await?
    };
    print_json(&result)
}

pub async fn trends(settings: &Settings, site_id: &str, category_id: Option<&str>) -> Result<()> {
    let session = Session::open(settings).await?;
    let result = session
        .client
        .get_trends(&session.token, site_id, category_id)
        .await?;
    print_json(&result)
}

pub async fn listing_types(settings: &Settings, site_id: &str) -> Result<()> {
    let session = Session::open(settings).await?;
    print_json(&session.client.get_listing_types(&session.token, site_id).await?)
}

pub async fn exposures(settings: &Settings, site_id: &str) -> Result<()> {
    let session = Session::open(settings).await?;
    print_json(
        &session
            .client
            .get_listing_exposures(&session.token, site_id)
            .await?,
    )
}

pub async fn size_grid(settings: &Settings, grid_id: &str, rows: bool) -> Result<()> {
    let session = Session::open(settings).await?;
    if rows {
        let rows = session
            .client
            .get_size_grid_rows(&session.token, grid_id)
            .await?;
        print_json(&rows)
    } else {
        print_json(&session.client.get_size_grid(&session.token, grid_id).await?)
    }
}

/// Validate a draft listing read from `path`. With `fix`, missing size-grid
/// data and too-low prices are patched and the draft resubmitted.
pub async fn validate(settings: &Settings, path: &Path, fix: bool, attempts: usize) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let Some(draft) = DraftListing::from_value(value) else {
        bail!("{} does not contain a JSON object", path.display());
    };

    let session = Session::open(settings).await?;

    if !fix {
        let result = session
            .client
            .validate_item(&session.token, &draft.as_value())
            .await?;
        return print_json(&result);
    }

    let api = Authed {
        client: &session.client,
        token: &session.token,
    };
    match Fixup::new(draft).max_attempts(attempts).run(&api).await? {
        Outcome::Valid { attempts, draft } => {
            tracing::info!("Valid after {} attempt(s)", attempts);
            print_json(&draft)
        }
        Outcome::Inapplicable { reason, .. } => {
            println!("Not fixable: {}", reason);
            Ok(())
        }
    }
}

/// Sellers with listings in a category, with their nicknames.
pub async fn sellers(settings: &Settings, site_id: &str, category: &str, max: usize) -> Result<()> {
    let session = Session::open(settings).await?;
    let ids = session
        .client
        .category_sellers(&session.token, site_id, category, max)
        .await?;

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let nickname = match session.client.get_user(&session.token, &id, None).await {
            Ok(user) => user
                .get("nickname")
                .and_then(id_string)
                .unwrap_or_else(|| "N/A".to_string()),
            Err(e) => {
                tracing::warn!("No profile for seller {}: {}", id, e);
                "N/A".to_string()
            }
        };
        rows.push(serde_json::json!({"id": id, "nickname": nickname}));
    }
    print_json(&rows)
}

/// Extract, enrich and write items as JSON lines for each seller (the token
/// owner when none is given). Fails if any seller did not load.
pub async fn etl(
    settings: &Settings,
    sellers: &[String],
    opts: &EtlOptions,
    output: Option<&Path>,
) -> Result<()> {
    let session = Session::open(settings).await?;
    let sellers = if sellers.is_empty() {
        vec![session.seller_or_me(None).await?]
    } else {
        sellers.to_vec()
    };

    let results = match output {
        Some(path) => {
            let mut sink = JsonLinesSink::append_to(path)?;
            pipeline::run_etl_many(&session.client, &session.token, &sellers, opts, &mut sink)
                .await
        }
        None => {
            let mut sink = JsonLinesSink::new(std::io::stdout().lock());
            pipeline::run_etl_many(&session.client, &session.token, &sellers, opts, &mut sink)
                .await
        }
    };

    let failed: Vec<&str> = results
        .iter()
        .filter(|(_, ok)| !**ok)
        .map(|(id, _)| id.as_str())
        .collect();
    if !failed.is_empty() {
        bail!(
            "{}/{} sellers failed: {}",
            failed.len(),
            results.len(),
            failed.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_bounds() {
        let start = parse_bound("2024-03-01", false).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        let end = parse_bound("2024-03-31", true).unwrap();
        assert_eq!(end.to_rfc3339(), "2024-03-31T23:59:59+00:00");

        let exact = parse_bound("2024-03-01T10:00:00-03:00", false).unwrap();
        assert_eq!(exact.to_rfc3339(), "2024-03-01T13:00:00+00:00");

        assert!(parse_bound("March", false).is_err());
    }
}
