mod authenticated;
mod public;

use std::sync::Arc;

use tracing::debug;

pub use authenticated::AuthenticatedClient;
pub use public::UnauthenticatedClient;

use crate::config::Config;
use crate::errors::Error;
use crate::request_context::{ApiResponse, RequestContext};

/// Connection pool and base address shared by the public and private clients.
#[derive(Clone, Debug)]
pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: Arc<str>,
}

impl Transport {
    pub(crate) fn new(config: &Config) -> Result<Self, Error> {
        let base_url = config.base_url()?;
        Ok(Self {
            http: config.http_client()?,
            base_url: Arc::from(base_url.as_str().trim_end_matches('/')),
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends once and reads the full response. Status codes are not interpreted here.
    pub(crate) async fn send(
        &self,
        request: &RequestContext,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, Error> {
        let builder = request.build(&self.http, &self.base_url, bearer)?;
        let response = builder.send().await?;
        let response = ApiResponse::read(response).await?;
        debug!(
            method = %request.method(),
            path = request.path(),
            status = response.status().as_u16(),
            authenticated = bearer.is_some(),
            "http.response"
        );
        Ok(response)
    }
}
