//! Pure transformations of raw marketplace records

pub mod enrich;
pub mod orders;

pub use enrich::{attribute_value, discount_percentage, enrich_item, enrich_items, safe_divide};
pub use orders::{filter_by_date, normalize_order, parse_timestamp, OrderError};
