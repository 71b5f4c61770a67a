//! OAuth2 token exchange and the current-token policy

use anyhow::{Context, Result};
use chrono::Utc;
use oauth2::basic::{BasicClient, BasicTokenResponse, BasicTokenType};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    RefreshToken, TokenResponse, TokenUrl,
};

use super::tokens::{FileTokenStore, Token, TokenStore};
use crate::config::Settings;

/// Build the OAuth2 client from settings. Credentials travel in the form
/// body, which is what the marketplace token endpoint expects.
fn build_client(settings: &Settings) -> Result<BasicClient> {
    let auth_url = AuthUrl::new(settings.auth_url.clone()).context("Invalid auth_url")?;
    let token_url = TokenUrl::new(settings.token_url()).context("Invalid token url")?;
    let redirect_url =
        RedirectUrl::new(settings.redirect_uri.clone()).context("Invalid redirect_uri")?;

    Ok(BasicClient::new(
        ClientId::new(settings.client_id.clone()),
        Some(ClientSecret::new(settings.client_secret.clone())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::RequestBody)
    .set_redirect_uri(redirect_url))
}

/// Turn an endpoint response into a token record. The marketplace rotates
/// refresh tokens, but keep the old one if none came back.
fn token_from_response(resp: &BasicTokenResponse, previous_refresh: &str) -> Token {
    let token_type = match resp.token_type() {
        BasicTokenType::Extension(other) => other.clone(),
        BasicTokenType::Mac => "MAC".to_string(),
        _ => "Bearer".to_string(),
    };

    let mut token = Token {
        access_token: resp.access_token().secret().to_string(),
        token_type,
        expires_in: resp.expires_in().map(|d| d.as_secs()).unwrap_or(21600),
        refresh_token: resp
            .refresh_token()
            .map(|rt| rt.secret().to_string())
            .unwrap_or_else(|| previous_refresh.to_string()),
        expires_at: String::new(),
    };
    token.stamp_expiry(Utc::now());
    token
}

/// Exchange a refresh token for a new token. The result is not persisted.
pub async fn refresh(settings: &Settings, refresh_token: &str) -> Result<Token> {
    let client = build_client(settings)?;

    tracing::info!("Refreshing access token...");
    let resp = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request_async(oauth2::reqwest::async_http_client)
        .await
        .context("Failed to refresh access token")?;

    Ok(token_from_response(&resp, refresh_token))
}

/// Browser URL where the seller grants access. Returns the URL and the CSRF
/// state to compare against the callback.
pub fn authorize_url(settings: &Settings) -> Result<(url::Url, String)> {
    let client = build_client(settings)?;
    let (url, state) = client.authorize_url(CsrfToken::new_random).url();
    Ok((url, state.secret().to_string()))
}

/// Trade an authorization code from the redirect for a token.
pub async fn exchange_code(settings: &Settings, code: &str) -> Result<Token> {
    let client = build_client(settings)?;

    let resp = client
        .exchange_code(AuthorizationCode::new(code.to_string()))
        .request_async(oauth2::reqwest::async_http_client)
        .await
        .context("Failed to exchange authorization code")?;

    Ok(token_from_response(&resp, ""))
}

/// Where the token handed out by [`current_token`] came from.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenSource {
    /// Stored token, still fresh
    Cached,
    /// Stored token was stale and has just been refreshed and saved
    Refreshed,
    /// Stored token was stale and could not be refreshed; it is returned
    /// anyway and will likely be rejected by the API
    Stale { reason: String },
}

#[derive(Debug, Clone)]
pub struct CurrentToken {
    pub token: Token,
    pub source: TokenSource,
}

impl CurrentToken {
    pub fn access_token(&self) -> &str {
        &self.token.access_token
    }

    pub fn is_stale(&self) -> bool {
        matches!(self.source, TokenSource::Stale { .. })
    }
}

/// Load the stored token, refreshing it when stale. A failed refresh does
/// not fail the call: the stale token is returned, tagged as such.
pub async fn current_token<S: TokenStore>(settings: &Settings, store: &S) -> Result<CurrentToken> {
    let token = store.load()?;
    if token.is_fresh_at(Utc::now()) {
        return Ok(CurrentToken {
            token,
            source: TokenSource::Cached,
        });
    }

    if token.refresh_token.is_empty() {
        tracing::warn!("Access token is stale and there is no refresh token");
        return Ok(CurrentToken {
            token,
            source: TokenSource::Stale {
                reason: "no refresh token".to_string(),
            },
        });
    }

    match refresh(settings, &token.refresh_token).await {
        Ok(mut fresh) => {
            if let Err(e) = store.save(&mut fresh) {
                tracing::warn!("Refreshed token could not be saved: {:#}", e);
            }
            Ok(CurrentToken {
                token: fresh,
                source: TokenSource::Refreshed,
            })
        }
        Err(e) => {
            tracing::warn!("Token refresh failed, using stale token: {:#}", e);
            Ok(CurrentToken {
                token,
                source: TokenSource::Stale {
                    reason: format!("{:#}", e),
                },
            })
        }
    }
}

/// Print the authorization URL, or finish the login with a code.
pub async fn login(settings: &Settings, code: Option<&str>) -> Result<()> {
    let Some(code) = code else {
        let (url, state) = authorize_url(settings)?;
        println!();
        println!("To authorize, visit: {}", url);
        println!("State:               {}", state);
        println!();
        println!("Then run 'meli-etl login --code <CODE>' with the code from the redirect.");
        return Ok(());
    };

    let mut token = exchange_code(settings, code).await?;
    let store = FileTokenStore::new(settings);
    store.save(&mut token)?;
    println!("Login successful. Token saved to {}", store.path().display());
    Ok(())
}

/// Force a refresh and persist the result.
pub async fn force_refresh(settings: &Settings) -> Result<()> {
    let store = FileTokenStore::new(settings);
    let current = store.load()?;
    let mut token = refresh(settings, &current.refresh_token).await?;
    store.save(&mut token)?;
    println!("Token refreshed, expires at {}", token.expires_at);
    Ok(())
}

/// Clear stored credentials
pub async fn logout(settings: &Settings) -> Result<()> {
    FileTokenStore::new(settings).clear()?;
    println!("Logged out.");
    Ok(())
}

/// Display current auth status
pub async fn status(settings: &Settings) -> Result<()> {
    let store = FileTokenStore::new(settings);
    let token = store.load()?;

    if store.exists() {
        println!("Token file:  {}", store.path().display());
    } else {
        println!("Token file:  none (using configured fallback)");
    }

    if token.is_fresh_at(Utc::now()) {
        println!("Access tok:  valid");
    } else {
        println!("Access tok:  expired");
    }
    println!("  expires_at: {}", token.expires_at);

    if token.refresh_token.is_empty() {
        println!("Refresh tok: none");
        println!("\nRun 'meli-etl login' to authenticate.");
    } else {
        println!("Refresh tok: present");
    }

    Ok(())
}
