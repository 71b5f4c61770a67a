//! Authentication module for the marketplace API
//!
//! Tokens come from the OAuth2 authorization-code flow, are persisted as a
//! JSON record and refreshed with the stored refresh token once they are
//! within five minutes of expiry.

pub mod oauth;
pub mod tokens;

pub use oauth::{current_token, force_refresh, login, logout, status, CurrentToken, TokenSource};
pub use tokens::{is_fresh, FileTokenStore, Token, TokenStore};
