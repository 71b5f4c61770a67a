//! Data models for marketplace entities

mod item;
mod listing;
mod order;

pub use item::*;
pub use listing::*;
pub use order::*;
