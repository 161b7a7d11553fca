//! Refresh-token exchange.

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::auth::TokenPair;
use crate::net::{ApiClient, ApiRequest};
use crate::store::TokenStore;

/// Backend endpoint exchanging a refresh token for a new pair.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Exchange the stored refresh token for a new token pair.
///
/// Returns `None` when no refresh token is stored or when the exchange fails
/// for any reason; failures are logged, never returned. On success the new
/// pair is persisted before it is returned.
#[instrument(skip_all)]
pub async fn refresh_tokens(api: &ApiClient, store: &TokenStore) -> Option<TokenPair> {
    let Some(refresh_token) = store.refresh_token().await else {
        debug!("No refresh token stored, refresh not possible");
        return None;
    };

    let pair = exchange_refresh_token(api, &refresh_token).await?;
    store.save(&pair).await;
    Some(pair)
}

/// Exchange `refresh_token` at the backend without persisting the result.
///
/// Callers that must decide whether the new pair is still wanted (the
/// session may have been signed out meanwhile) persist it themselves.
#[instrument(skip_all)]
pub async fn exchange_refresh_token(api: &ApiClient, refresh_token: &str) -> Option<TokenPair> {
    let request = ApiRequest::post(REFRESH_PATH)
        .json(&json!({ "refreshToken": refresh_token }))
        .ok()?;

    match api.send::<TokenPair>(&request).await {
        Ok(pair) => {
            info!("Token pair refreshed");
            Some(pair)
        }
        Err(e) => {
            warn!(error = %e, status = ?e.status(), "Token refresh failed");
            None
        }
    }
}
