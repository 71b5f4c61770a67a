//! Extract, enrich and load

pub mod extract;
pub mod sink;

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::api::MarketClient;
use crate::transform::enrich_items;

pub use extract::{collect_orders, extract_items};
pub use sink::{ItemSink, JsonLinesSink};

#[derive(Debug, Clone)]
pub struct EtlOptions {
    pub limit: u32,
    pub with_descriptions: bool,
    pub with_reviews: bool,
}

impl Default for EtlOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            with_descriptions: true,
            with_reviews: false,
        }
    }
}

/// Run one seller through the pipeline. Returns `false` when there was
/// nothing to load.
pub async fn run_etl(
    client: &MarketClient,
    token: &str,
    seller_id: &str,
    opts: &EtlOptions,
    sink: &mut dyn ItemSink,
) -> Result<bool> {
    tracing::info!("Starting ETL for seller {}", seller_id);

    let raw = extract_items(
        client,
        token,
        seller_id,
        opts.limit,
        opts.with_descriptions,
        opts.with_reviews,
    )
    .await;
    if raw.is_empty() {
        tracing::warn!("No items extracted for seller {}", seller_id);
        return Ok(false);
    }
    tracing::info!("Extracted {} items", raw.len());

    let enriched = enrich_items(&raw);
    if enriched.is_empty() {
        tracing::error!("Enrichment produced no items");
        return Ok(false);
    }

    let written = sink
        .write_batch(&enriched)
        .with_context(|| format!("Failed to load items for seller {}", seller_id))?;
    tracing::info!("Loaded {} items for seller {}", written, seller_id);
    Ok(true)
}

/// Run each seller in turn. A seller whose run fails is logged and
/// reported as `false`; the others still run.
pub async fn run_etl_many(
    client: &MarketClient,
    token: &str,
    sellers: &[String],
    opts: &EtlOptions,
    sink: &mut dyn ItemSink,
) -> BTreeMap<String, bool> {
    let mut results = BTreeMap::new();
    for seller_id in sellers {
        let loaded = match run_etl(client, token, seller_id, opts, sink).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!("ETL failed for seller {}: {:#}", seller_id, e);
                false
            }
        };
        results.insert(seller_id.clone(), loaded);
    }

    let succeeded = results.values().filter(|ok| **ok).count();
    tracing::info!("{}/{} sellers processed", succeeded, results.len());
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::client_for;
    use crate::models::EnrichedItem;
    use serde_json::json;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct Collect(Vec<EnrichedItem>);

    impl ItemSink for Collect {
        fn write_batch(&mut self, items: &[EnrichedItem]) -> Result<usize> {
            self.0.extend_from_slice(items);
            Ok(items.len())
        }
    }

    #[tokio::test]
    async fn loads_enriched_items() {
        let server = MockServer::start().await;
        Mock::given(path("/users/42/items/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": ["ABC123"]})))
            .mount(&server)
            .await;
        Mock::given(path("/items/ABC123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "ABC123",
                "price": 50.0,
                "original_price": 100.0,
                "sold_quantity": 5,
                "views": 100,
                "attributes": [{"id": "BRAND", "value_name": "X"}]
            })))
            .mount(&server)
            .await;

        let opts = EtlOptions {
            with_descriptions: false,
            ..EtlOptions::default()
        };
        let mut sink = Collect::default();
        let loaded = run_etl(&client_for(&server), "tok", "42", &opts, &mut sink)
            .await
            .unwrap();

        assert!(loaded);
        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.0[0].discount_percentage, 50.0);
        assert_eq!(sink.0[0].conversion_rate, 0.05);
    }

    struct Broken;

    impl ItemSink for Broken {
        fn write_batch(&mut self, _items: &[EnrichedItem]) -> Result<usize> {
            anyhow::bail!("disk full")
        }
    }

    async fn mount_seller(server: &MockServer, seller: &str, item: &str) {
        Mock::given(path(format!("/users/{seller}/items/search")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [item]})))
            .mount(server)
            .await;
        Mock::given(path(format!("/items/{item}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": item, "price": 30})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn one_failing_seller_does_not_stop_the_others() {
        let server = MockServer::start().await;
        mount_seller(&server, "11", "MLB11").await;
        Mock::given(path("/users/22/items/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_seller(&server, "33", "MLB33").await;

        let opts = EtlOptions {
            with_descriptions: false,
            ..EtlOptions::default()
        };
        let sellers = ["11", "22", "33"].map(String::from);
        let mut sink = Collect::default();
        let results = run_etl_many(&client_for(&server), "tok", &sellers, &opts, &mut sink).await;

        assert_eq!(results.get("11"), Some(&true));
        assert_eq!(results.get("22"), Some(&false));
        assert_eq!(results.get("33"), Some(&true));
        let loaded: Vec<_> = sink.0.iter().filter_map(|i| i.item_id.as_deref()).collect();
        assert_eq!(loaded, vec!["MLB11", "MLB33"]);
    }

    #[tokio::test]
    async fn sink_failure_marks_seller_failed() {
        let server = MockServer::start().await;
        mount_seller(&server, "11", "MLB11").await;

        let opts = EtlOptions {
            with_descriptions: false,
            ..EtlOptions::default()
        };
        let results = run_etl_many(
            &client_for(&server),
            "tok",
            &["11".to_string()],
            &opts,
            &mut Broken,
        )
        .await;

        assert_eq!(results.get("11"), Some(&false));
    }

    #[tokio::test]
    async fn nothing_extracted_is_reported() {
        let server = MockServer::start().await;
        Mock::given(path("/users/42/items/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let mut sink = Collect::default();
        let loaded = run_etl(
            &client_for(&server),
            "tok",
            "42",
            &EtlOptions::default(),
            &mut sink,
        )
        .await
        .unwrap();

        assert!(!loaded);
        assert!(sink.0.is_empty());
    }
}
