//! OAuth redirect handling.
//!
//! The provider sends the user back to the app's redirect URI with
//! `?code=...&state=...` on success or `?error=...&error_description=...`
//! on failure. This module turns that URI into a validated code/state pair.

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};

/// Shown when the provider reports an error without a description.
pub const DEFAULT_PROVIDER_ERROR: &str = "An error occurred during sign in";

/// Query parameters carried by the redirect.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Parse the redirect URI the provider sent the user back to.
///
/// Rejects URIs that do not start with the configured `redirect_uri`.
pub fn parse_redirect(redirect: &str, redirect_uri: &str) -> Result<CallbackParams> {
    if !redirect.starts_with(redirect_uri) {
        return Err(Error::InvalidCallback(format!(
            "redirect does not target {redirect_uri}"
        )));
    }
    let url = url::Url::parse(redirect)
        .map_err(|e| Error::InvalidCallback(format!("unparsable redirect: {e}")))?;

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        let value = Some(value.into_owned());
        match key.as_ref() {
            "code" => params.code = value,
            "state" => params.state = value,
            "error" => params.error = value,
            "error_description" => params.error_description = value,
            _ => {}
        }
    }
    Ok(params)
}

/// Validate callback parameters and extract the code/state.
///
/// A provider error becomes [`Error::Provider`] carrying the description
/// meant for the user.
pub fn validate_callback_params(params: &CallbackParams) -> Result<(String, String)> {
    if let Some(ref error) = params.error {
        let desc = params
            .error_description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_PROVIDER_ERROR);
        warn!(error = %error, description = %desc, "OAuth error from provider");
        return Err(Error::Provider(desc.to_string()));
    }

    let code = params
        .code
        .clone()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::InvalidCallback("missing authorization code".to_string()))?;

    let state = params
        .state
        .clone()
        .ok_or_else(|| Error::InvalidCallback("missing state".to_string()))?;

    Ok((code, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REDIRECT: &str = "datingapp://oauth2redirect";

    #[test]
    fn test_parse_success_redirect() {
        let params = parse_redirect(
            "datingapp://oauth2redirect?code=4%2F0Ab&state=xyz&scope=email",
            REDIRECT,
        )
        .unwrap();
        assert_eq!(params.code.as_deref(), Some("4/0Ab"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert_eq!(validate_callback_params(&params).unwrap(), ("4/0Ab".into(), "xyz".into()));
    }

    #[test]
    fn test_parse_rejects_foreign_redirect() {
        let err = parse_redirect("https://evil.example/?code=abc", REDIRECT).unwrap_err();
        assert!(matches!(err, Error::InvalidCallback(_)));
    }

    #[test]
    fn test_provider_error_with_description() {
        let params = parse_redirect(
            "datingapp://oauth2redirect?error=access_denied&error_description=User+denied+access",
            REDIRECT,
        )
        .unwrap();
        match validate_callback_params(&params) {
            Err(Error::Provider(msg)) => assert_eq!(msg, "User denied access"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_provider_error_without_description() {
        let params = CallbackParams {
            error: Some("server_error".into()),
            ..Default::default()
        };
        match validate_callback_params(&params) {
            Err(Error::Provider(msg)) => assert_eq!(msg, DEFAULT_PROVIDER_ERROR),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_missing_code_or_state() {
        let no_code = CallbackParams {
            state: Some("s".into()),
            ..Default::default()
        };
        assert!(matches!(validate_callback_params(&no_code), Err(Error::InvalidCallback(_))));

        let no_state = CallbackParams {
            code: Some("c".into()),
            ..Default::default()
        };
        assert!(matches!(validate_callback_params(&no_state), Err(Error::InvalidCallback(_))));
    }
}
