//! PKCE (Proof Key for Code Exchange) and sign-in correlation state.
//!
//! - Code verifier generation (128-char random string from safe alphabet)
//! - S256 code challenge derivation using SHA-256
//! - Random CSRF `state` for matching the redirect to its request

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

/// PKCE challenge method constant.
pub const PKCE_METHOD: &str = "S256";

/// Characters allowed in the PKCE verifier (RFC 7636 unreserved chars).
const VERIFIER_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// PKCE verifier length in characters (the maximum per RFC 7636).
const PKCE_VERIFIER_LENGTH: usize = 128;

/// Random bytes behind the `state` parameter.
const STATE_BYTES: usize = 16;

/// Correlation state for one interactive sign-in attempt.
///
/// Lives only between building the authorization URL and exchanging the
/// returned code; it is consumed by the exchange and never persisted.
#[derive(Clone)]
pub struct PendingAuthExchange {
    verifier: String,
    challenge: String,
    state: String,
}

impl PendingAuthExchange {
    /// Generate a fresh verifier, its S256 challenge and a CSRF state.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let verifier: String = (0..PKCE_VERIFIER_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..VERIFIER_CHARS.len());
                VERIFIER_CHARS[idx] as char
            })
            .collect();

        let mut state = [0u8; STATE_BYTES];
        rng.fill(&mut state);

        Self {
            challenge: compute_challenge(&verifier),
            verifier,
            state: URL_SAFE_NO_PAD.encode(state),
        }
    }

    /// Code challenge sent in the authorization URL.
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// CSRF state sent in the authorization URL.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Whether `returned` matches the state this attempt was started with.
    pub fn matches_state(&self, returned: &str) -> bool {
        self.state == returned
    }

    /// Give up the verifier for the code exchange, discarding this attempt.
    pub fn into_verifier(self) -> String {
        self.verifier
    }
}

impl std::fmt::Debug for PendingAuthExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAuthExchange")
            .field("verifier", &"[REDACTED]")
            .field("challenge", &self.challenge)
            .field("state", &self.state)
            .finish()
    }
}

/// Verify that a challenge matches a verifier.
#[must_use]
pub fn verify_challenge(verifier: &str, challenge: &str) -> bool {
    compute_challenge(verifier) == challenge
}

fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_verifies() {
        let pending = PendingAuthExchange::generate();
        let challenge = pending.challenge().to_string();
        let verifier = pending.into_verifier();
        assert_eq!(verifier.len(), 128);
        assert!(verify_challenge(&verifier, &challenge));
        assert!(!verify_challenge("wrong_verifier", &challenge));
    }

    #[test]
    fn test_verifier_uses_safe_chars() {
        let verifier = PendingAuthExchange::generate().into_verifier();
        assert!(
            verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')),
            "Verifier contains invalid characters: {verifier}"
        );
    }

    #[test]
    fn test_challenge_and_state_url_safe() {
        let pending = PendingAuthExchange::generate();
        let url_safe = |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        assert!(url_safe(pending.challenge()));
        assert!(url_safe(pending.state()));
        assert_eq!(pending.state().len(), 22);
    }

    #[test]
    fn test_state_matching() {
        let pending = PendingAuthExchange::generate();
        let state = pending.state().to_string();
        assert!(pending.matches_state(&state));
        assert!(!pending.matches_state("forged"));
    }

    #[test]
    fn test_unique_generation() {
        let a = PendingAuthExchange::generate();
        let b = PendingAuthExchange::generate();
        assert_ne!(a.challenge(), b.challenge());
        assert_ne!(a.state(), b.state());
    }

    #[test]
    fn test_debug_hides_verifier() {
        let pending = PendingAuthExchange::generate();
        let verifier = pending.clone().into_verifier();
        assert!(!format!("{pending:?}").contains(&verifier));
    }
}
