//! Endpoint mappings layered on the two clients.

mod auth;

use serde::Deserialize;

pub use auth::{AuthApi, Credentials, LOGIN_PATH, LoginResult, REGISTER_PATH};

/// The `{ "result": ... }` wrapper every marketplace endpoint answers with.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
    pub result: T,
}
