//! Sign-in strategy abstraction.

use async_trait::async_trait;

use crate::auth::TokenPair;
use crate::error::Result;

/// How an interactive sign-in attempt ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The backend issued a token pair.
    Completed(TokenPair),
    /// The user backed out of the provider UI.
    Cancelled,
}

/// A way of turning a user's Google account into a backend token pair.
///
/// The session manager only depends on this trait; the PKCE code flow and the
/// native ID-token flow are interchangeable implementations.
///
/// Errors: [`Error::SignInInProgress`](crate::Error::SignInInProgress) when
/// the provider reports another attempt in flight, anything else for real
/// failures.
#[async_trait]
pub trait SignInStrategy: Send + Sync {
    /// Run the sign-in, however many round-trips it needs.
    async fn initiate(&self) -> Result<SignInOutcome>;

    /// Tell the provider the user signed out. Best-effort.
    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }

    /// Short identifier for logs.
    fn name(&self) -> &str;
}
