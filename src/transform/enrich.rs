//! Flatten raw item records and derive sales metrics

use chrono::Utc;
use serde_json::Value;

use crate::api::id_string;
use crate::models::EnrichedItem;

/// Value of the first attribute with `id`: its `value_name`, else its
/// `value_id`. Empty strings count as absent.
pub fn attribute_value(attributes: Option<&Value>, id: &str) -> Option<String> {
    let attr = attributes?
        .as_array()?
        .iter()
        .find(|a| a.get("id").and_then(Value::as_str) == Some(id))?;

    ["value_name", "value_id"]
        .iter()
        .filter_map(|key| attr.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Round to `precision` places, halfway cases to the even digit.
fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round_ties_even() / factor
}

/// `numerator / denominator` rounded to `precision` places, 0.0 when the
/// denominator is zero.
pub fn safe_divide(numerator: f64, denominator: f64, precision: u32) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    round_to(numerator / denominator, precision)
}

/// Percentage below `original`, two decimals. Zero when there is no original
/// price or the current price is not lower.
pub fn discount_percentage(original: Option<f64>, current: f64) -> f64 {
    match original {
        Some(original) if original > 0.0 && original > current => {
            round_to((original - current) / original * 100.0, 2)
        }
        _ => 0.0,
    }
}

/// JSON number or numeric string.
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn count(value: Option<&Value>) -> i64 {
    number(value).map(|n| n as i64).unwrap_or(0)
}

fn text(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Project one raw item. `None` for null or empty records.
pub fn enrich_item(raw: &Value) -> Option<EnrichedItem> {
    let item = raw.as_object().filter(|map| !map.is_empty()).map(|_| raw)?;

    let attributes = item.get("attributes");
    let views = count(item.get("views"));
    let sold = count(item.get("sold_quantity"));

    let current_price = number(item.get("price")).unwrap_or(0.0);
    let original_price = number(item.get("original_price"))
        .filter(|p| *p != 0.0)
        .unwrap_or(current_price);

    let now = Utc::now();
    Some(EnrichedItem {
        item_id: item.get("id").and_then(id_string),
        title: text(item, "title"),
        category_id: text(item, "category_id"),
        current_price,
        original_price,
        available_quantity: number(item.get("available_quantity")).map(|n| n as i64),
        sold_quantity: sold,
        condition: text(item, "condition"),
        brand: attribute_value(attributes, "BRAND"),
        size: attribute_value(attributes, "SIZE"),
        color: attribute_value(attributes, "COLOR"),
        gender: attribute_value(attributes, "GENDER"),
        views,
        conversion_rate: safe_divide(sold as f64, views as f64, 4),
        seller_id: item.get("seller_id").and_then(id_string),
        created_at: now,
        updated_at: now,
        discount_percentage: discount_percentage(Some(original_price), current_price),
    })
}

pub fn enrich_items(raw: &[Value]) -> Vec<EnrichedItem> {
    let enriched: Vec<_> = raw.iter().filter_map(enrich_item).collect();
    if enriched.len() < raw.len() {
        tracing::debug!("Skipped {} empty item records", raw.len() - enriched.len());
    }
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attribute_lookup() {
        let attrs = json!([
            {"id": "BRAND", "value_name": "Nike", "value_id": "NIKE_ID"},
            {"id": "SIZE", "value_id": "M"},
            {"id": "COLOR", "value_name": null, "value_id": "RED_ID"},
            {"id": "GENDER", "value_name": null, "value_id": null},
        ]);
        assert_eq!(attribute_value(Some(&attrs), "BRAND").as_deref(), Some("Nike"));
        assert_eq!(attribute_value(Some(&attrs), "SIZE").as_deref(), Some("M"));
        assert_eq!(attribute_value(Some(&attrs), "COLOR").as_deref(), Some("RED_ID"));
        assert_eq!(attribute_value(Some(&attrs), "GENDER"), None);
        assert_eq!(attribute_value(Some(&attrs), "MODEL"), None);
        assert_eq!(attribute_value(Some(&json!([])), "BRAND"), None);
        assert_eq!(attribute_value(None, "BRAND"), None);
    }

    #[test]
    fn malformed_attributes() {
        let item = json!({
            "id": "MLA123456",
            "attributes": [
                {"id": "BRAND"},
                {"value_name": "Nike"},
                {"id": "SIZE", "value_name": "", "value_id": ""},
                {"id": "COLOR", "value_name": "Red", "value_id": "RED_ID"},
            ]
        });
        let enriched = enrich_item(&item).unwrap();
        assert_eq!(enriched.brand, None);
        assert_eq!(enriched.size, None);
        assert_eq!(enriched.color.as_deref(), Some("Red"));
    }

    #[test]
    fn division() {
        assert_eq!(safe_divide(10.0, 2.0, 4), 5.0);
        assert_eq!(safe_divide(7.0, 3.0, 2), 2.33);
        assert_eq!(safe_divide(10.0, 0.0, 4), 0.0);
        assert_eq!(safe_divide(0.0, 5.0, 4), 0.0);
        assert_eq!(safe_divide(-10.0, 2.0, 4), -5.0);
        assert_eq!(safe_divide(1.0, 3.0, 4), 0.3333);
    }

    #[test]
    fn discounts() {
        assert_eq!(discount_percentage(Some(100.0), 80.0), 20.0);
        assert_eq!(discount_percentage(Some(200.0), 150.0), 25.0);
        assert_eq!(discount_percentage(Some(100.0), 100.0), 0.0);
        assert_eq!(discount_percentage(Some(100.0), 120.0), 0.0);
        assert_eq!(discount_percentage(Some(0.0), 50.0), 0.0);
        assert_eq!(discount_percentage(None, 50.0), 0.0);
        assert_eq!(discount_percentage(Some(150.0), 100.0), 33.33);
    }

    #[test]
    fn halfway_values_round_to_even() {
        assert_eq!(safe_divide(1.0, 32.0, 4), 0.0312);
        assert_eq!(safe_divide(3.0, 32.0, 4), 0.0938);
        assert_eq!(discount_percentage(Some(800.0), 799.0), 0.12);

        let item = json!({"id": "MLA1", "views": 32, "sold_quantity": 1});
        assert_eq!(enrich_item(&item).unwrap().conversion_rate, 0.0312);
    }

    #[test]
    fn enriches_abc123() {
        let item = json!({
            "id": "ABC123",
            "price": 50.0,
            "original_price": 100.0,
            "sold_quantity": 5,
            "views": 100,
            "attributes": [{"id": "BRAND", "value_name": "X"}]
        });
        let enriched = enrich_item(&item).unwrap();
        assert_eq!(enriched.item_id.as_deref(), Some("ABC123"));
        assert_eq!(enriched.current_price, 50.0);
        assert_eq!(enriched.original_price, 100.0);
        assert_eq!(enriched.conversion_rate, 0.05);
        assert_eq!(enriched.discount_percentage, 50.0);
        assert_eq!(enriched.brand.as_deref(), Some("X"));
        assert_eq!(enriched.size, None);
        assert_eq!(enriched.color, None);
        assert_eq!(enriched.gender, None);
    }

    #[test]
    fn enriches_complete_item() {
        let item = json!({
            "id": "MLA123456",
            "title": "iPhone 13 Pro",
            "category_id": "MLA1055",
            "price": 1000,
            "original_price": 1200,
            "available_quantity": 5,
            "sold_quantity": 15,
            "condition": "new",
            "views": 500,
            "seller_id": 354140329,
            "attributes": [
                {"id": "BRAND", "value_name": "Apple"},
                {"id": "SIZE", "value_name": "128GB"},
                {"id": "COLOR", "value_name": "Blue"},
                {"id": "GENDER", "value_name": "Unisex"},
            ]
        });
        let enriched = enrich_item(&item).unwrap();
        assert_eq!(enriched.available_quantity, Some(5));
        assert_eq!(enriched.sold_quantity, 15);
        assert_eq!(enriched.seller_id.as_deref(), Some("354140329"));
        assert_eq!(enriched.conversion_rate, 0.03);
        assert_eq!(enriched.discount_percentage, 16.67);
        assert_eq!(enriched.gender.as_deref(), Some("Unisex"));
        assert_eq!(enriched.created_at, enriched.updated_at);
    }

    #[test]
    fn minimal_and_empty_items() {
        let enriched = enrich_item(&json!({"id": "MLA1", "title": "Test"})).unwrap();
        assert_eq!(enriched.current_price, 0.0);
        assert_eq!(enriched.original_price, 0.0);
        assert_eq!(enriched.conversion_rate, 0.0);
        assert_eq!(enriched.discount_percentage, 0.0);
        assert_eq!(enriched.views, 0);
        assert_eq!(enriched.available_quantity, None);

        assert!(enrich_item(&json!({})).is_none());
        assert!(enrich_item(&Value::Null).is_none());
    }

    #[test]
    fn prices_from_strings_and_defaults() {
        let enriched =
            enrich_item(&json!({"id": "MLA1", "price": "100.50", "original_price": "120.75"}))
                .unwrap();
        assert_eq!(enriched.current_price, 100.5);
        assert_eq!(enriched.original_price, 120.75);

        let enriched = enrich_item(&json!({"id": "MLA1", "price": 100})).unwrap();
        assert_eq!(enriched.original_price, 100.0);
        assert_eq!(enriched.discount_percentage, 0.0);

        let enriched =
            enrich_item(&json!({"id": "MLA1", "price": null, "original_price": null})).unwrap();
        assert_eq!(enriched.current_price, 0.0);
        assert_eq!(enriched.original_price, 0.0);
    }

    #[test]
    fn conversion_rates() {
        for (views, sold, expected) in [
            (100, 5, 0.05),
            (0, 10, 0.0),
            (50, 0, 0.0),
            (1000, 25, 0.025),
            (7, 3, 0.4286),
            (1_000_000_000, 500_000, 0.0005),
        ] {
            let item = json!({"id": "MLA1", "views": views, "sold_quantity": sold});
            assert_eq!(
                enrich_item(&item).unwrap().conversion_rate,
                expected,
                "{sold}/{views}"
            );
        }
    }

    #[test]
    fn batch_skips_empty_records() {
        let raw = vec![
            json!({
                "id": "MLA123456",
                "price": 1100,
                "original_price": 1299,
                "sold_quantity": 47,
                "views": 2350,
                "attributes": [{"id": "BRAND", "value_name": "Apple"}]
            }),
            Value::Null,
            json!({}),
            json!({
                "id": "MLA789012",
                "price": 950,
                "original_price": 1200,
                "sold_quantity": 23,
                "views": 890
            }),
        ];

        let enriched = enrich_items(&raw);
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].conversion_rate, 0.02);
        assert_eq!(enriched[0].discount_percentage, 15.32);
        assert_eq!(enriched[1].conversion_rate, 0.0258);
        assert_eq!(enriched[1].discount_percentage, 20.83);
        assert!(enrich_items(&[]).is_empty());
    }
}
