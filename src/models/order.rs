//! Order-related models

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::Value;

/// Order header row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRow {
    pub id: String,
    pub seller_id: i64,
    pub buyer_id: Option<i64>,
    pub buyer_nickname: Option<String>,
    pub status: String,
    pub status_detail: Option<String>,
    pub date_created: DateTime<FixedOffset>,
    pub date_closed: Option<DateTime<FixedOffset>>,
    pub date_last_updated: Option<DateTime<FixedOffset>>,
    pub expiration_date: Option<DateTime<FixedOffset>>,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub currency_id: String,
    pub shipping_cost: Option<f64>,
    pub pack_id: Option<String>,
    pub fulfilled: Option<bool>,
    pub comment: Option<String>,
    pub tags: Option<Value>,
    pub feedback_data: Option<Value>,
    pub context_data: Option<Value>,
    pub processing_time_hours: Option<f64>,
}

/// One line of an order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemRow {
    pub order_id: String,
    pub element_id: Option<i64>,
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub category_id: Option<String>,
    pub variation_id: Option<String>,
    pub seller_sku: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<f64>,
    pub full_unit_price: Option<f64>,
    pub sale_fee: Option<f64>,
    pub listing_type_id: Option<String>,
    pub condition: Option<String>,
    pub warranty: Option<String>,
    pub variation_attributes: Option<Value>,
}

/// Payment attached to an order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRow {
    pub id: String,
    pub order_id: String,
    pub payer_id: Option<i64>,
    pub collector_id: Option<i64>,
    pub status: Option<String>,
    pub status_detail: Option<String>,
    pub payment_method_id: Option<String>,
    pub payment_type: Option<String>,
    pub operation_type: Option<String>,
    pub transaction_amount: Option<f64>,
    pub total_paid_amount: Option<f64>,
    pub transaction_amount_refunded: Option<f64>,
    pub date_created: Option<DateTime<FixedOffset>>,
    pub date_approved: Option<DateTime<FixedOffset>>,
    pub date_last_modified: Option<DateTime<FixedOffset>>,
    pub installments: Option<i64>,
    pub installment_amount: Option<f64>,
    pub issuer_id: Option<String>,
    pub reason: Option<String>,
    pub shipping_cost: Option<f64>,
    pub taxes_amount: Option<f64>,
    pub coupon_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedOrder {
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
    pub payments: Vec<PaymentRow>,
}
