//! Native-SDK sign-in: the platform Google SDK hands us an ID token which the
//! backend verifies and exchanges for its own token pair.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::auth::traits::{SignInOutcome, SignInStrategy};
use crate::auth::TokenPair;
use crate::error::{Error, Result};
use crate::net::{ApiClient, ApiRequest};

/// Backend endpoint verifying a Google ID token.
pub const ID_TOKEN_EXCHANGE_PATH: &str = "/auth/google-id-token";

/// Result of asking the platform SDK for an ID token.
#[derive(Clone, PartialEq, Eq)]
pub enum IdTokenOutcome {
    Token(String),
    Cancelled,
    /// The SDK is already running a sign-in.
    InProgress,
}

impl std::fmt::Debug for IdTokenOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token([REDACTED])"),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::InProgress => f.write_str("InProgress"),
        }
    }
}

/// The third-party sign-in SDK.
#[async_trait]
pub trait IdTokenProvider: Send + Sync {
    async fn sign_in(&self) -> Result<IdTokenOutcome>;

    async fn sign_out(&self) -> Result<()>;
}

/// Exchange a Google ID token at the backend.
#[instrument(skip_all)]
pub async fn exchange_id_token(api: &ApiClient, id_token: &str) -> Result<TokenPair> {
    debug!("Exchanging ID token for tokens");
    let request = ApiRequest::post(ID_TOKEN_EXCHANGE_PATH).json(&json!({ "idToken": id_token }))?;
    api.send(&request).await
}

/// Sign-in through a native SDK that yields an ID token directly.
pub struct IdTokenStrategy {
    api: ApiClient,
    provider: Arc<dyn IdTokenProvider>,
}

impl IdTokenStrategy {
    pub fn new(api: ApiClient, provider: Arc<dyn IdTokenProvider>) -> Self {
        Self { api, provider }
    }
}

#[async_trait]
impl SignInStrategy for IdTokenStrategy {
    async fn initiate(&self) -> Result<SignInOutcome> {
        let outcome = self
            .provider
            .sign_in()
            .await
            .map_err(Error::into_prompt_failure)?;
        let id_token = match outcome {
            IdTokenOutcome::Token(token) => token,
            IdTokenOutcome::Cancelled => {
                info!("User cancelled the SDK sign-in");
                return Ok(SignInOutcome::Cancelled);
            }
            IdTokenOutcome::InProgress => return Err(Error::SignInInProgress),
        };
        if id_token.is_empty() {
            return Err(Error::InvalidCallback("SDK returned an empty ID token".to_string()));
        }

        let pair = exchange_id_token(&self.api, &id_token).await?;
        info!("ID token exchanged");
        Ok(SignInOutcome::Completed(pair))
    }

    async fn sign_out(&self) -> Result<()> {
        self.provider.sign_out().await
    }

    fn name(&self) -> &str {
        "google-id-token"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeSdk {
        outcome: IdTokenOutcome,
        sign_outs: AtomicUsize,
    }

    #[async_trait]
    impl IdTokenProvider for FakeSdk {
        async fn sign_in(&self) -> Result<IdTokenOutcome> {
            Ok(self.outcome.clone())
        }
        async fn sign_out(&self) -> Result<()> {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sdk(outcome: IdTokenOutcome) -> Arc<FakeSdk> {
        Arc::new(FakeSdk {
            outcome,
            sign_outs: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_exchanges_id_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ID_TOKEN_EXCHANGE_PATH))
            .and(body_json(json!({"idToken": "eyJ.id.token"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"accessToken": "A1", "refreshToken": "R1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let strategy = IdTokenStrategy::new(
            ApiClient::new(&server.uri()).unwrap(),
            sdk(IdTokenOutcome::Token("eyJ.id.token".into())),
        );
        assert_eq!(
            strategy.initiate().await.unwrap(),
            SignInOutcome::Completed(TokenPair::new("A1", "R1"))
        );
    }

    #[tokio::test]
    async fn test_cancel_and_in_progress() {
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let cancelled = IdTokenStrategy::new(api.clone(), sdk(IdTokenOutcome::Cancelled));
        assert_eq!(cancelled.initiate().await.unwrap(), SignInOutcome::Cancelled);

        let busy = IdTokenStrategy::new(api, sdk(IdTokenOutcome::InProgress));
        assert!(matches!(busy.initiate().await, Err(Error::SignInInProgress)));
    }

    #[tokio::test]
    async fn test_sign_out_reaches_sdk() {
        let fake = sdk(IdTokenOutcome::Cancelled);
        let strategy = IdTokenStrategy::new(ApiClient::new("http://127.0.0.1:9").unwrap(), fake.clone());
        strategy.sign_out().await.unwrap();
        assert_eq!(fake.sign_outs.load(Ordering::SeqCst), 1);
    }
}
