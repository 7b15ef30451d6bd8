use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::client::UnauthenticatedClient;
use crate::errors::Error;
use crate::request_context::RequestContext;
use crate::session::{ExpiryReason, SessionEvents};
use crate::store::SessionStore;
use crate::telemetry::refresh::{RefreshOutcome, RefreshTelemetry};

use super::payload::{RefreshGrant, RefreshRequest};
use super::queue::{RefreshResult, RequestQueue};

pub const REFRESH_PATH: &str = "/api/auth/refresh-token";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

struct Inner {
    state: RefreshState,
    queue: RequestQueue,
    /// Bumped by login and logout; a refresh started under an older epoch must not write.
    epoch: u64,
}

enum Trigger<'a> {
    Forced,
    /// A 401 came back for a request carrying this access token.
    Rejected(Option<&'a str>),
}

enum Admission {
    Expired,
    Rotated(String),
    Follow(oneshot::Receiver<RefreshResult>),
    Lead { refresh_token: String, epoch: u64 },
}

/// Owns the single-flight refresh protocol: the refresh state, the waiter
/// queue and every token write made on behalf of a refresh.
pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
    client: UnauthenticatedClient,
    session: SessionStore,
    events: SessionEvents,
    timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        client: UnauthenticatedClient,
        session: SessionStore,
        events: SessionEvents,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: RefreshState::Idle,
                queue: RequestQueue::new(),
                epoch: 0,
            }),
            client,
            session,
            events,
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> RefreshState {
        self.lock().state
    }

    /// Number of callers currently parked on the in-flight refresh.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Exchanges the stored refresh token for a new access token, joining the
    /// in-flight exchange when there is one.
    pub async fn refresh(self: &Arc<Self>) -> Result<String, Error> {
        match self.obtain(Trigger::Forced).await? {
            Some(token) => Ok(token),
            None => Err(Error::AuthExpired {
                status: StatusCode::UNAUTHORIZED,
                body: "no refresh token stored".to_string(),
            }),
        }
    }

    /// Recovers from a 401 on a request sent with `rejected_with`.
    ///
    /// Returns `Ok(None)` when no refresh token is stored; the session has
    /// then already been cleared and the expiry signalled.
    pub async fn recover(
        self: &Arc<Self>,
        rejected_with: Option<&str>,
    ) -> Result<Option<String>, Error> {
        self.obtain(Trigger::Rejected(rejected_with)).await
    }

    async fn obtain(self: &Arc<Self>, trigger: Trigger<'_>) -> Result<Option<String>, Error> {
        match self.admit(trigger)? {
            Admission::Expired => {
                self.events.expired(ExpiryReason::MissingRefreshToken);
                Ok(None)
            }
            Admission::Rotated(token) => {
                debug!("access token already rotated; skipping refresh");
                Ok(Some(token))
            }
            Admission::Follow(rx) => match rx.await {
                Ok(outcome) => outcome.map(Some).map_err(unshare),
                Err(_) => Err(Error::RefreshAbandoned),
            },
            Admission::Lead {
                refresh_token,
                epoch,
            } => {
                let this = Arc::clone(self);
                // Spawned so a cancelled leader cannot strand the queue.
                let task = tokio::spawn(async move { this.run(refresh_token, epoch).await });
                match task.await {
                    Ok(outcome) => outcome.map(Some).map_err(unshare),
                    Err(join_err) => {
                        error!(error = %join_err, "refresh task aborted");
                        self.abandon();
                        Err(Error::RefreshAbandoned)
                    }
                }
            }
        }
    }

    /// Decides, in one critical section, whether the caller waits, leads, or
    /// needs no refresh at all.
    fn admit(&self, trigger: Trigger<'_>) -> Result<Admission, Error> {
        let mut inner = self.lock();
        let Some(refresh_token) = self.session.refresh_token()? else {
            if let Err(err) = self.session.clear_session() {
                error!(error = %err, "failed to clear session without refresh token");
            }
            return Ok(Admission::Expired);
        };
        if inner.state == RefreshState::Refreshing {
            let rx = inner.queue.enqueue();
            debug!(pending = inner.queue.len(), "refresh in flight; request queued");
            return Ok(Admission::Follow(rx));
        }
        if let Trigger::Rejected(sent_with) = trigger
            && let Some(current) = self.session.access_token()?
            && sent_with != Some(current.as_str())
        {
            return Ok(Admission::Rotated(current));
        }
        inner.state = RefreshState::Refreshing;
        Ok(Admission::Lead {
            refresh_token,
            epoch: inner.epoch,
        })
    }

    async fn run(&self, refresh_token: String, epoch: u64) -> RefreshResult {
        let telemetry = RefreshTelemetry::new("auth.refresh_token");
        telemetry.emit_start();
        let exchanged = match tokio::time::timeout(self.timeout, self.exchange(&refresh_token)).await
        {
            Ok(result) => result,
            Err(_) => Err(Error::RefreshTimeout(self.timeout)),
        };

        let (outcome, drained) = {
            let mut inner = self.lock();
            let outcome = if inner.epoch != epoch {
                Err(Arc::new(Error::SessionCleared))
            } else {
                self.apply(exchanged).map_err(Arc::new)
            };
            inner.state = RefreshState::Idle;
            (outcome, inner.queue.drain())
        };

        let waiters = drained.len();
        match &outcome {
            Ok(_) => telemetry.emit_success(RefreshOutcome::Success, waiters),
            Err(err) if matches!(**err, Error::SessionCleared) => {
                telemetry.emit_superseded(waiters)
            }
            Err(err) => {
                telemetry.emit_failure(err, waiters);
                self.events
                    .expired(ExpiryReason::RefreshFailed(err.to_string()));
            }
        }
        drained.settle(&outcome);
        outcome
    }

    /// Persists a successful grant, or clears the session on failure.
    ///
    /// Runs under the state lock: writing outside it would let a refresh that
    /// lost the race with login overwrite the new session. With a
    /// `FileTokenStore` this is a small synchronous write on the runtime thread.
    fn apply(&self, exchanged: Result<RefreshGrant, Error>) -> Result<String, Error> {
        let written = exchanged.and_then(|grant| {
            self.session
                .save_tokens(&grant.access_token, grant.refresh_token.as_deref())?;
            Ok(grant.access_token)
        });
        if written.is_err()
            && let Err(err) = self.session.clear_session()
        {
            error!(error = %err, "failed to clear session after refresh failure");
        }
        written
    }

    async fn exchange(&self, refresh_token: &str) -> Result<RefreshGrant, Error> {
        let request = RequestContext::post(REFRESH_PATH).json(&RefreshRequest { refresh_token })?;
        let response = self.client.execute(request).await?;
        RefreshGrant::from_body(response.body())
    }

    fn abandon(&self) {
        let drained = {
            let mut inner = self.lock();
            inner.state = RefreshState::Idle;
            inner.queue.drain()
        };
        drained.settle(&Err(Arc::new(Error::RefreshAbandoned)));
    }

    /// Installs a fresh session. Any refresh still in flight will not overwrite it.
    pub fn begin_session(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        user_info: Option<&str>,
        roles: Option<&str>,
    ) -> Result<(), Error> {
        let mut inner = self.lock();
        inner.epoch += 1;
        self.session
            .replace_session(access_token, refresh_token, user_info, roles)?;
        info!(epoch = inner.epoch, "session started");
        Ok(())
    }

    /// Clears the session on explicit logout. An in-flight refresh becomes a no-op.
    pub fn end_session(&self) -> Result<(), Error> {
        let mut inner = self.lock();
        inner.epoch += 1;
        self.session.clear_session()?;
        info!(epoch = inner.epoch, "session ended");
        Ok(())
    }
}

fn unshare(err: Arc<Error>) -> Error {
    if matches!(*err, Error::SessionCleared) {
        return Error::SessionCleared;
    }
    if matches!(*err, Error::RefreshAbandoned) {
        return Error::RefreshAbandoned;
    }
    Error::RefreshFailed(err)
}
