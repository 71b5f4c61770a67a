//! Mercado Livre seller analytics
//!
//! Client for the marketplace REST API (OAuth2 tokens, rate gating, typed
//! errors), a validation loop that repairs draft listings, and a small ETL
//! pipeline that turns seller items and orders into flat records.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod transform;
pub mod validation;
