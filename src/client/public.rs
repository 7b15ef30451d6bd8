use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::errors::Error;
use crate::request_context::{ApiResponse, RequestContext};

use super::Transport;

/// Client for endpoints that need no token: login, registration, the refresh
/// exchange and public catalog reads.
#[derive(Clone, Debug)]
pub struct UnauthenticatedClient {
    transport: Transport,
}

impl UnauthenticatedClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Ok(Self::from_transport(Transport::new(config)?))
    }

    pub(crate) fn from_transport(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Sends the request as-is. Non-2xx statuses come back as [`Error::Status`].
    pub async fn execute(&self, request: RequestContext) -> Result<ApiResponse, Error> {
        self.transport.send(&request, None).await?.into_result()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.execute(RequestContext::get(path)).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(RequestContext::post(path).json(body)?)
            .await?
            .json()
    }
}
