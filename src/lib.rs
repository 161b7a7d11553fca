//! Heartline session client.
//!
//! Client-side Google sign-in, secure token storage and session management
//! for the Heartline dating app:
//!   - [`auth`]: sign-in strategies (PKCE code flow, native ID token) and token refresh
//!   - [`store`]: secure key-value storage and token-pair persistence
//!   - [`net`]: JSON HTTP executor for the backend
//!   - [`session`]: the session state machine and authenticated queries

pub mod auth;
pub mod config;
pub mod error;
pub mod net;
pub mod session;
pub mod store;

pub use auth::{
    IdTokenProvider, IdTokenStrategy, PkceCodeStrategy, SignInOutcome, SignInStrategy, TokenPair,
    UserProfile,
};
pub use config::Config;
pub use error::{Error, Result};
pub use net::{ApiClient, ApiRequest};
pub use session::{LifecyclePhase, QueryClient, Session, SessionManager, SignInStatus};
pub use store::{SecretStore, TokenStore};
