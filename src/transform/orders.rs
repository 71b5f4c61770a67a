//! Order normalization into header, line and payment rows

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::api::id_string;
use crate::models::{NormalizedOrder, OrderItemRow, OrderRow, PaymentRow};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {order}: field `{field}` is missing or malformed")]
    Field { order: String, field: &'static str },
}

/// Marketplace timestamps, e.g. `2024-03-01T10:15:00.000-03:00`.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value?.as_str()?).ok()
}

fn float(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

/// Split a raw order into its rows. Required header fields are `id`,
/// `seller.id`, `status`, `date_created`, `total_amount`, `paid_amount`
/// and `currency_id`.
pub fn normalize_order(raw: &Value) -> Result<NormalizedOrder, OrderError> {
    let id = raw.get("id").and_then(id_string).ok_or(OrderError::Field {
        order: "?".to_string(),
        field: "id",
    })?;
    let missing = |field| OrderError::Field {
        order: id.clone(),
        field,
    };

    let date_created =
        parse_timestamp(raw.get("date_created")).ok_or_else(|| missing("date_created"))?;
    let date_closed = parse_timestamp(raw.get("date_closed"));
    let processing_time_hours =
        date_closed.map(|closed| (closed - date_created).num_seconds() as f64 / 3600.0);
    let buyer = raw.get("buyer");

    let order = OrderRow {
        id: id.clone(),
        seller_id: raw
            .pointer("/seller/id")
            .and_then(Value::as_i64)
            .ok_or_else(|| missing("seller.id"))?,
        buyer_id: buyer.and_then(|b| b.get("id")).and_then(Value::as_i64),
        buyer_nickname: text(buyer.and_then(|b| b.get("nickname"))),
        status: text(raw.get("status")).ok_or_else(|| missing("status"))?,
        status_detail: text(raw.get("status_detail")),
        date_created,
        date_closed,
        date_last_updated: parse_timestamp(raw.get("date_last_updated")),
        expiration_date: parse_timestamp(raw.get("expiration_date")),
        total_amount: float(raw.get("total_amount")).ok_or_else(|| missing("total_amount"))?,
        paid_amount: float(raw.get("paid_amount")).ok_or_else(|| missing("paid_amount"))?,
        currency_id: text(raw.get("currency_id")).ok_or_else(|| missing("currency_id"))?,
        shipping_cost: float(raw.get("shipping_cost")),
        pack_id: raw.get("pack_id").and_then(id_string),
        fulfilled: raw.get("fulfilled").and_then(Value::as_bool),
        comment: text(raw.get("comment")),
        tags: present(raw.get("tags")),
        feedback_data: present(raw.get("feedback")),
        context_data: present(raw.get("context")),
        processing_time_hours,
    };

    let items = raw
        .get("order_items")
        .and_then(Value::as_array)
        .map(|lines| lines.iter().map(|line| item_row(&id, line)).collect())
        .unwrap_or_default();

    let payments = match raw.get("payments").and_then(Value::as_array) {
        Some(list) => list
            .iter()
            .map(|p| payment_row(&id, p).ok_or_else(|| missing("payments[].id")))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(NormalizedOrder {
        order,
        items,
        payments,
    })
}

fn item_row(order_id: &str, line: &Value) -> OrderItemRow {
    let item = line.get("item");
    let field = |key: &str| item.and_then(|i| i.get(key));

    OrderItemRow {
        order_id: order_id.to_string(),
        element_id: line.get("element_id").and_then(Value::as_i64),
        item_id: field("id").and_then(id_string),
        title: text(field("title")),
        category_id: text(field("category_id")),
        variation_id: field("variation_id").and_then(id_string),
        seller_sku: text(field("seller_sku")),
        quantity: line.get("quantity").and_then(Value::as_i64),
        unit_price: float(line.get("unit_price")),
        full_unit_price: float(line.get("full_unit_price")),
        sale_fee: float(line.get("sale_fee")),
        listing_type_id: text(line.get("listing_type_id")),
        condition: text(field("condition")),
        warranty: text(field("warranty")),
        variation_attributes: present(field("variation_attributes")),
    }
}

fn payment_row(order_id: &str, payment: &Value) -> Option<PaymentRow> {
    Some(PaymentRow {
        id: payment.get("id").and_then(id_string)?,
        order_id: order_id.to_string(),
        payer_id: payment.get("payer_id").and_then(Value::as_i64),
        collector_id: payment.pointer("/collector/id").and_then(Value::as_i64),
        status: text(payment.get("status")),
        status_detail: text(payment.get("status_detail")),
        payment_method_id: text(payment.get("payment_method_id")),
        payment_type: text(payment.get("payment_type")),
        operation_type: text(payment.get("operation_type")),
        transaction_amount: float(payment.get("transaction_amount")),
        total_paid_amount: float(payment.get("total_paid_amount")),
        transaction_amount_refunded: float(payment.get("transaction_amount_refunded")),
        date_created: parse_timestamp(payment.get("date_created")),
        date_approved: parse_timestamp(payment.get("date_approved")),
        date_last_modified: parse_timestamp(payment.get("date_last_modified")),
        installments: payment.get("installments").and_then(Value::as_i64),
        installment_amount: float(payment.get("installment_amount")),
        issuer_id: payment.get("issuer_id").and_then(id_string),
        reason: text(payment.get("reason")),
        shipping_cost: float(payment.get("shipping_cost")),
        taxes_amount: float(payment.get("taxes_amount")),
        coupon_amount: float(payment.get("coupon_amount")),
    })
}

/// Keep raw orders created within `[start, end]`. Without bounds every
/// order is kept; with bounds, orders without a readable `date_created`
/// are dropped.
pub fn filter_by_date(
    orders: Vec<Value>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Vec<Value> {
    if start.is_none() && end.is_none() {
        return orders;
    }

    orders
        .into_iter()
        .filter(|order| {
            let Some(created) = parse_timestamp(order.get("date_created")) else {
                return false;
            };
            let created = created.with_timezone(&Utc);
            start.map_or(true, |s| created >= s) && end.map_or(true, |e| created <= e)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw_order() -> Value {
        json!({
            "id": 2000008123456789u64,
            "status": "paid",
            "status_detail": null,
            "date_created": "2024-03-01T10:00:00.000-03:00",
            "date_closed": "2024-03-01T13:30:00.000-03:00",
            "total_amount": 89.9,
            "paid_amount": "104.8",
            "currency_id": "BRL",
            "pack_id": 2000005555,
            "fulfilled": true,
            "tags": ["paid", "not_delivered"],
            "seller": {"id": 354140329},
            "buyer": {"id": 1234, "nickname": "COMPRADOR"},
            "order_items": [{
                "item": {
                    "id": "MLB3456",
                    "title": "Sutia renda",
                    "category_id": "MLB4954",
                    "variation_id": 1777,
                    "seller_sku": "SUT-P",
                    "condition": "new",
                    "variation_attributes": [{"id": "SIZE", "value_name": "P"}]
                },
                "quantity": 1,
                "unit_price": 89.9,
                "full_unit_price": 99.9,
                "sale_fee": 12.5,
                "listing_type_id": "gold_special"
            }],
            "payments": [{
                "id": 7000111,
                "payer_id": 1234,
                "collector": {"id": 354140329},
                "status": "approved",
                "payment_method_id": "pix",
                "payment_type": "bank_transfer",
                "operation_type": "regular_payment",
                "transaction_amount": 89.9,
                "total_paid_amount": 104.8,
                "date_created": "2024-03-01T10:00:05.000-03:00",
                "installments": 1
            }]
        })
    }

    #[test]
    fn normalizes_header_lines_and_payments() {
        let normalized = normalize_order(&raw_order()).unwrap();
        let order = &normalized.order;
        assert_eq!(order.id, "2000008123456789");
        assert_eq!(order.seller_id, 354140329);
        assert_eq!(order.buyer_nickname.as_deref(), Some("COMPRADOR"));
        assert_eq!(order.paid_amount, 104.8);
        assert_eq!(order.pack_id.as_deref(), Some("2000005555"));
        assert_eq!(order.processing_time_hours, Some(3.5));
        assert_eq!(order.status_detail, None);
        assert_eq!(order.feedback_data, None);

        assert_eq!(normalized.items.len(), 1);
        let line = &normalized.items[0];
        assert_eq!(line.order_id, "2000008123456789");
        assert_eq!(line.variation_id.as_deref(), Some("1777"));
        assert_eq!(line.full_unit_price, Some(99.9));

        assert_eq!(normalized.payments.len(), 1);
        let payment = &normalized.payments[0];
        assert_eq!(payment.id, "7000111");
        assert_eq!(payment.collector_id, Some(354140329));
        assert!(payment.date_created.is_some());
        assert_eq!(payment.date_approved, None);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let mut raw = raw_order();
        raw.as_object_mut().unwrap().remove("currency_id");
        let err = normalize_order(&raw).unwrap_err();
        assert!(err.to_string().contains("currency_id"));

        let mut raw = raw_order();
        raw["seller"] = json!({});
        assert!(normalize_order(&raw).is_err());
    }

    #[test]
    fn date_filter_is_inclusive() {
        let orders = vec![
            json!({"id": 1, "date_created": "2024-03-01T00:00:00.000-03:00"}),
            json!({"id": 2, "date_created": "2024-03-15T12:00:00.000-03:00"}),
            json!({"id": 3, "date_created": "2024-04-01T00:00:00.000-03:00"}),
            json!({"id": 4, "date_created": "yesterday"}),
        ];
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap();

        let kept = filter_by_date(orders.clone(), Some(start), Some(end));
        let ids: Vec<_> = kept.iter().map(|o| o["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2]);

        assert_eq!(filter_by_date(orders, None, None).len(), 4);
    }
}
