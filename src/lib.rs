//! Authenticated HTTP pipeline for the marketplace admin API.
//!
//! [`AuthenticatedClient`] attaches the stored access token to every request.
//! When the server answers 401 it rotates the session through a single-flight
//! [`RefreshCoordinator`] and replays the request once. [`UnauthenticatedClient`]
//! covers login, registration and public reads.

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod refresh;
pub mod request_context;
pub mod session;
pub mod store;
pub mod telemetry;

pub use api::{AuthApi, Credentials, Envelope, LoginResult};
pub use client::{AuthenticatedClient, UnauthenticatedClient};
pub use config::Config;
pub use errors::Error;
pub use refresh::{RefreshCoordinator, RefreshState};
pub use request_context::{ApiResponse, RequestContext};
pub use session::{ExpiryReason, SessionEvent, SessionEvents};
pub use store::{FileTokenStore, MemoryTokenStore, SessionStore, StoreKey, TokenStore};

#[cfg(test)]
mod tests;
