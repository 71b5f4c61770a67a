//! Pull raw items and orders from the marketplace

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::api::{id_string, ApiError, MarketClient};
use crate::transform::filter_by_date;

/// Consecutive order pages without a new id before collection stops.
const MAX_STALE_PAGES: usize = 3;

/// Active items of a seller, optionally with their description and reviews
/// folded in under `description` / `reviews`. A failed listing is logged
/// and yields no items.
pub async fn extract_items(
    client: &MarketClient,
    token: &str,
    seller_id: &str,
    limit: u32,
    with_descriptions: bool,
    with_reviews: bool,
) -> Vec<Value> {
    let mut items = match client.get_items(token, seller_id, limit, "active").await {
        Ok(items) => items,
        Err(e) => {
            tracing::error!("Failed to extract items for seller {}: {}", seller_id, e);
            return Vec::new();
        }
    };

    if !with_descriptions && !with_reviews {
        return items;
    }

    for item in &mut items {
        let Some(id) = item.get("id").and_then(id_string) else {
            continue;
        };
        let Some(record) = item.as_object_mut() else {
            continue;
        };
        if with_descriptions {
            let description = client.get_description(token, &id).await;
            record.insert(
                "description".to_string(),
                serde_json::to_value(description).unwrap_or_default(),
            );
        }
        if with_reviews {
            let reviews = client.get_reviews(token, &id).await;
            record.insert(
                "reviews".to_string(),
                serde_json::to_value(reviews).unwrap_or_default(),
            );
        }
    }
    items
}

/// Poll a seller's order search until it stops producing unseen orders,
/// returning each order once, restricted to `[start, end]` when given.
pub async fn collect_orders(
    client: &MarketClient,
    token: &str,
    seller_id: &str,
    batch_size: u32,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<Value>, ApiError> {
    let mut seen = HashSet::new();
    let mut collected = Vec::new();
    let mut stale = 0;

    while stale < MAX_STALE_PAGES {
        let page = client.get_orders(token, seller_id, batch_size).await?;

        let fresh: Vec<Value> = page
            .into_iter()
            .filter(|order| match order.get("id").and_then(id_string) {
                Some(id) => seen.insert(id),
                None => false,
            })
            .collect();

        if fresh.is_empty() {
            stale += 1;
            tracing::info!("No new orders ({}/{})", stale, MAX_STALE_PAGES);
            continue;
        }
        stale = 0;

        let in_range = filter_by_date(fresh, start, end);
        tracing::info!("Fetched {} new orders in range", in_range.len());
        collected.extend(in_range);
    }

    tracing::info!("Collected {} orders for seller {}", collected.len(), seller_id);
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::client_for;
    use serde_json::json;
    use wiremock::matchers::{path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_listing(server: &MockServer) {
        Mock::given(path("/users/42/items/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": ["MLB1"]})))
            .mount(server)
            .await;
        Mock::given(path("/items/MLB1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "MLB1", "price": 10})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn folds_description_and_reviews() {
        let server = MockServer::start().await;
        mount_listing(&server).await;
        Mock::given(path("/items/MLB1/description"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"plain_text": "Renda"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/reviews/item/MLB1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let items = extract_items(&client_for(&server), "tok", "42", 10, true, true).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["description"]["plain_text"], "Renda");
        assert_eq!(items[0]["reviews"]["total_reviews"], 0);
        assert!(items[0]["reviews"]["error"].is_string());
    }

    #[tokio::test]
    async fn skips_sub_resources_unless_asked() {
        let server = MockServer::start().await;
        mount_listing(&server).await;
        Mock::given(path("/items/MLB1/description"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let items = extract_items(&client_for(&server), "tok", "42", 10, false, false).await;
        assert_eq!(items, vec![json!({"id": "MLB1", "price": 10})]);
    }

    #[tokio::test]
    async fn failed_listing_yields_nothing() {
        let server = MockServer::start().await;
        Mock::given(path("/users/42/items/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let items = extract_items(&client_for(&server), "tok", "42", 10, true, false).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn order_collection_dedupes_and_stops_on_stale_pages() {
        let server = MockServer::start().await;
        Mock::given(path("/orders/search"))
            .and(query_param("seller", "42"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [
                {"id": 1, "date_created": "2024-03-01T10:00:00.000-03:00"},
                {"id": 2, "date_created": "2024-05-01T10:00:00.000-03:00"}
            ]})))
            .expect(4)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let orders = collect_orders(&client, "tok", "42", 2, None, None)
            .await
            .unwrap();
        assert_eq!(orders.len(), 2);
    }

    #[tokio::test]
    async fn order_collection_applies_date_range() {
        let server = MockServer::start().await;
        Mock::given(path("/orders/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [
                {"id": 1, "date_created": "2024-03-01T10:00:00.000-03:00"},
                {"id": 2, "date_created": "2024-05-01T10:00:00.000-03:00"}
            ]})))
            .mount(&server)
            .await;

        let start = "2024-04-01T00:00:00Z".parse().unwrap();
        let orders = collect_orders(&client_for(&server), "tok", "42", 50, Some(start), None)
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0]["id"], 2);
    }

    #[tokio::test]
    async fn order_collection_propagates_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/orders/search"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = collect_orders(&client_for(&server), "tok", "42", 50, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
    }
}
