//! Credentials and the ways of obtaining them.

pub mod id_token;
pub mod oauth;
pub mod refresh;
pub mod tokens;
pub mod traits;

pub use id_token::{IdTokenOutcome, IdTokenProvider, IdTokenStrategy};
pub use oauth::{ConsentPrompt, ConsentResult, PendingAuthExchange, PkceCodeStrategy};
pub use refresh::{exchange_refresh_token, refresh_tokens};
pub use tokens::{TokenPair, UserProfile};
pub use traits::{SignInOutcome, SignInStrategy};
