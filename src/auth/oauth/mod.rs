//! Interactive Google sign-in with the authorization-code flow and PKCE.
//!
//! 1. Generate a [`PendingAuthExchange`] (verifier, challenge, state)
//! 2. Build the authorization URL and hand it to a [`ConsentPrompt`]
//! 3. Validate the redirect the prompt reports back
//! 4. Exchange `{code, codeVerifier}` with the backend for a token pair

pub mod callback;
pub mod pkce;

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::auth::traits::{SignInOutcome, SignInStrategy};
use crate::auth::TokenPair;
use crate::config::OAuthConfig;
use crate::error::{Error, Result};
use crate::net::{ApiClient, ApiRequest};

pub use callback::{CallbackParams, parse_redirect, validate_callback_params};
pub use pkce::{PKCE_METHOD, PendingAuthExchange, verify_challenge};

/// Backend endpoint exchanging an authorization code for a token pair.
pub const CODE_EXCHANGE_PATH: &str = "/auth/google/code";

/// What the provider consent UI reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentResult {
    /// The provider redirected back to the app with this full URI.
    Redirect(String),
    /// The user closed the consent UI.
    Dismissed,
    /// The platform refused to open another consent UI.
    Locked,
}

/// Presents the provider consent screen (browser tab, system auth session,
/// terminal) and waits for it to finish.
#[async_trait]
pub trait ConsentPrompt: Send + Sync {
    async fn authorize(&self, authorization_url: &str, redirect_uri: &str) -> Result<ConsentResult>;
}

/// Build the Google authorization URL for one attempt.
pub fn build_authorization_url(config: &OAuthConfig, pending: &PendingAuthExchange) -> String {
    let scopes = config.scopes.join(" ");
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&code_challenge={}&code_challenge_method={}&state={}",
        config.auth_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&scopes),
        urlencoding::encode(pending.challenge()),
        PKCE_METHOD,
        urlencoding::encode(pending.state()),
    )
}

/// Exchange an authorization code and its verifier at the backend.
#[instrument(skip_all)]
pub async fn exchange_code(api: &ApiClient, code: &str, code_verifier: &str) -> Result<TokenPair> {
    debug!("Exchanging authorization code for tokens");
    let request = ApiRequest::post(CODE_EXCHANGE_PATH)
        .json(&json!({ "code": code, "codeVerifier": code_verifier }))?;
    api.send(&request).await
}

/// Authorization-code + PKCE sign-in.
pub struct PkceCodeStrategy {
    api: ApiClient,
    config: OAuthConfig,
    prompt: Arc<dyn ConsentPrompt>,
}

impl PkceCodeStrategy {
    pub fn new(api: ApiClient, config: OAuthConfig, prompt: Arc<dyn ConsentPrompt>) -> Self {
        Self {
            api,
            config,
            prompt,
        }
    }
}

#[async_trait]
impl SignInStrategy for PkceCodeStrategy {
    async fn initiate(&self) -> Result<SignInOutcome> {
        let pending = PendingAuthExchange::generate();
        let url = build_authorization_url(&self.config, &pending);

        let consent = self
            .prompt
            .authorize(&url, &self.config.redirect_uri)
            .await
            .map_err(Error::into_prompt_failure)?;
        let redirect = match consent {
            ConsentResult::Redirect(redirect) => redirect,
            ConsentResult::Dismissed => {
                info!("User dismissed the consent screen");
                return Ok(SignInOutcome::Cancelled);
            }
            ConsentResult::Locked => return Err(Error::SignInInProgress),
        };

        let params = parse_redirect(&redirect, &self.config.redirect_uri)?;
        let (code, state) = validate_callback_params(&params)?;
        if !pending.matches_state(&state) {
            return Err(Error::InvalidCallback("state mismatch".to_string()));
        }

        let pair = exchange_code(&self.api, &code, &pending.into_verifier()).await?;
        info!("Authorization code exchanged");
        Ok(SignInOutcome::Completed(pair))
    }

    fn name(&self) -> &str {
        "google-pkce"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Prompt that answers with a canned result, optionally echoing the state.
    struct ScriptedPrompt {
        answer: Box<dyn Fn(&str) -> ConsentResult + Send + Sync>,
        seen_url: Mutex<Option<String>>,
    }

    impl ScriptedPrompt {
        fn new(answer: impl Fn(&str) -> ConsentResult + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                answer: Box::new(answer),
                seen_url: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ConsentPrompt for ScriptedPrompt {
        async fn authorize(&self, url: &str, _redirect_uri: &str) -> Result<ConsentResult> {
            *self.seen_url.lock().unwrap() = Some(url.to_string());
            Ok((self.answer)(url))
        }
    }

    fn state_of(url: &str) -> String {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn test_authorization_url() {
        let config = OAuthConfig::default();
        let pending = PendingAuthExchange::generate();
        let url = build_authorization_url(&config, &pending);

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.contains("redirect_uri=datingapp%3A%2F%2Foauth2redirect"));
        assert!(url.contains(&format!("code_challenge={}", pending.challenge())));
        assert_eq!(state_of(&url), pending.state());
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CODE_EXCHANGE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"accessToken": "A1", "refreshToken": "R1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let prompt = ScriptedPrompt::new(|url| {
            ConsentResult::Redirect(format!(
                "datingapp://oauth2redirect?code=auth-code&state={}",
                state_of(url)
            ))
        });
        let strategy = PkceCodeStrategy::new(
            ApiClient::new(&server.uri()).unwrap(),
            OAuthConfig::default(),
            prompt.clone(),
        );

        let outcome = strategy.initiate().await.unwrap();
        assert_eq!(outcome, SignInOutcome::Completed(TokenPair::new("A1", "R1")));

        // The verifier sent to the backend must match the challenge shown to the provider.
        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["code"], "auth-code");
        let seen = prompt.seen_url.lock().unwrap().clone().unwrap();
        let challenge = url::Url::parse(&seen)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "code_challenge")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(verify_challenge(body["codeVerifier"].as_str().unwrap(), &challenge));
    }

    #[tokio::test]
    async fn test_dismissed_is_cancelled() {
        let strategy = PkceCodeStrategy::new(
            ApiClient::new("http://127.0.0.1:9").unwrap(),
            OAuthConfig::default(),
            ScriptedPrompt::new(|_| ConsentResult::Dismissed),
        );
        assert_eq!(strategy.initiate().await.unwrap(), SignInOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_locked_is_in_progress() {
        let strategy = PkceCodeStrategy::new(
            ApiClient::new("http://127.0.0.1:9").unwrap(),
            OAuthConfig::default(),
            ScriptedPrompt::new(|_| ConsentResult::Locked),
        );
        assert!(matches!(strategy.initiate().await, Err(Error::SignInInProgress)));
    }

    /// Prompt whose UI could not be shown at all.
    struct BrokenPrompt;

    #[async_trait]
    impl ConsentPrompt for BrokenPrompt {
        async fn authorize(&self, _url: &str, _redirect_uri: &str) -> Result<ConsentResult> {
            Err(Error::Storage("no browser available".into()))
        }
    }

    #[tokio::test]
    async fn test_prompt_failure_is_reported_as_prompt_error() {
        let strategy = PkceCodeStrategy::new(
            ApiClient::new("http://127.0.0.1:9").unwrap(),
            OAuthConfig::default(),
            Arc::new(BrokenPrompt),
        );
        assert!(matches!(strategy.initiate().await, Err(Error::Prompt(_))));
    }

    #[tokio::test]
    async fn test_state_mismatch_rejected_before_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CODE_EXCHANGE_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let strategy = PkceCodeStrategy::new(
            ApiClient::new(&server.uri()).unwrap(),
            OAuthConfig::default(),
            ScriptedPrompt::new(|_| {
                ConsentResult::Redirect("datingapp://oauth2redirect?code=c&state=forged".into())
            }),
        );
        assert!(matches!(strategy.initiate().await, Err(Error::InvalidCallback(_))));
    }

    #[tokio::test]
    async fn test_backend_rejection_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CODE_EXCHANGE_PATH))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid code"})),
            )
            .mount(&server)
            .await;

        let strategy = PkceCodeStrategy::new(
            ApiClient::new(&server.uri()).unwrap(),
            OAuthConfig::default(),
            ScriptedPrompt::new(|url| {
                ConsentResult::Redirect(format!(
                    "datingapp://oauth2redirect?code=c&state={}",
                    state_of(url)
                ))
            }),
        );
        match strategy.initiate().await {
            Err(Error::Http { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid code");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
