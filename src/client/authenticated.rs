use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::warn;

use crate::config::Config;
use crate::errors::Error;
use crate::refresh::RefreshCoordinator;
use crate::request_context::{ApiResponse, RequestContext};
use crate::session::{SessionEvent, SessionEvents};
use crate::store::{SessionStore, TokenStore};

use super::{Transport, UnauthenticatedClient};

/// Client for protected endpoints.
///
/// Every request carries the stored access token. A 401 hands off to the
/// [`RefreshCoordinator`] and the request is replayed at most once with the
/// refreshed token.
#[derive(Clone)]
pub struct AuthenticatedClient {
    transport: Transport,
    public: UnauthenticatedClient,
    session: SessionStore,
    events: SessionEvents,
    coordinator: Arc<RefreshCoordinator>,
}

impl AuthenticatedClient {
    pub fn new(config: &Config, store: Arc<dyn TokenStore>) -> Result<Self, Error> {
        let transport = Transport::new(config)?;
        let public = UnauthenticatedClient::from_transport(transport.clone());
        let session = SessionStore::new(store);
        let events = SessionEvents::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            public.clone(),
            session.clone(),
            events.clone(),
            config.refresh_timeout(),
        ));
        Ok(Self {
            transport,
            public,
            session,
            events,
            coordinator,
        })
    }

    /// Builds the client with the store named by the config.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::new(config, config.open_store()?)
    }

    /// The unauthenticated sibling, sharing this client's connection pool.
    pub fn public(&self) -> &UnauthenticatedClient {
        &self.public
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Session-expired notifications; the host should route the user to login.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn execute(&self, mut request: RequestContext) -> Result<ApiResponse, Error> {
        let sent_with = self.session.access_token()?;
        let response = self.transport.send(&request, sent_with.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return response.into_result();
        }
        warn!(
            method = %request.method(),
            path = request.path(),
            status = 401,
            retried = request.is_retried(),
            "request unauthorized (401)"
        );
        if request.is_retried() {
            return Err(retry_exhausted(response));
        }

        let Some(token) = self.coordinator.recover(sent_with.as_deref()).await? else {
            return Err(Error::AuthExpired {
                status: response.status(),
                body: response.text(),
            });
        };

        request.mark_retried();
        let retry = self.transport.send(&request, Some(&token)).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!(
                method = %request.method(),
                path = request.path(),
                status = 401,
                retried = true,
                "request unauthorized (401) after refresh"
            );
            return Err(retry_exhausted(retry));
        }
        retry.into_result()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.execute(RequestContext::get(path)).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PUT, path, body).await
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PATCH, path, body).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, Error> {
        self.execute(RequestContext::delete(path)).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = RequestContext::new(method, path).json(body)?;
        self.execute(request).await?.json()
    }
}

fn retry_exhausted(response: ApiResponse) -> Error {
    Error::RetryExhausted {
        status: response.status(),
        body: response.text(),
    }
}
