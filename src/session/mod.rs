//! The single client session and everything that reads or mutates it.

pub mod alert;
pub mod manager;
pub mod query;
pub mod state;

pub use alert::{AlertSink, TracingAlertSink};
pub use manager::{LOGOUT_PATH, ME_PATH, SessionManager, SignInStatus};
pub use query::{QueryCache, QueryClient};
pub use state::{LifecyclePhase, Session};
