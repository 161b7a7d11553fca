//! HTTP access to the Heartline backend.

pub mod client;
pub mod request;

pub use client::{ApiClient, ApiClientBuilder};
pub use request::{ApiRequest, Method};
