//! Single-flight access-token refresh.
//!
//! Every outgoing call goes through [`SessionInterceptor::execute`], which
//! attaches the current access token. When a call comes back 401, the first
//! caller refreshes the token while any others that fail in the meantime
//! wait for that refresh and then retry with its result. Each call is retried
//! at most once.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::ApiError;

/// New access token, or the reason the refresh failed.
pub type RefreshOutcome = Result<String, String>;

/// Obtains a new access token. Implementations must not route their own call
/// through the interceptor.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh_access_token(&self) -> Result<String, ApiError>;
}

/// What a caller whose request was rejected with 401 should do next.
#[derive(Debug)]
pub enum UnauthorizedAction {
    /// Run the refresh, then report it with [`SessionState::finish_refresh`].
    Refresh,
    /// Another caller is refreshing; wait for its outcome.
    Wait(oneshot::Receiver<RefreshOutcome>),
    /// The token was already replaced since the request was sent.
    RetryWith(String),
}

#[derive(Default)]
struct Inner {
    token: Option<String>,
    refreshing: bool,
    queue: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Client session: the current access token plus the refresh coordination
/// state. Shared between the interceptor and whoever performs login/logout.
#[derive(Default)]
pub struct SessionState {
    inner: Mutex<Inner>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // No code path panics while holding the lock, so a poisoned guard still
    // holds consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.lock().token = Some(token.into());
    }

    pub fn clear(&self) {
        self.lock().token = None;
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Decide how a request that carried `failed_token` and got 401 recovers.
    pub fn on_unauthorized(&self, request_id: u64, failed_token: Option<&str>) -> UnauthorizedAction {
        let mut inner = self.lock();

        if inner.refreshing {
            let (tx, rx) = oneshot::channel();
            inner.queue.push(tx);
            debug!(request_id, queued = inner.queue.len(), "Waiting for in-flight token refresh");
            return UnauthorizedAction::Wait(rx);
        }

        if let Some(current) = inner.token.as_deref() {
            if failed_token != Some(current) {
                debug!(request_id, "Token changed since request was sent, retrying");
                return UnauthorizedAction::RetryWith(current.to_string());
            }
        }

        inner.refreshing = true;
        debug!(request_id, "Starting token refresh");
        UnauthorizedAction::Refresh
    }

    /// Record the refresh result and release every queued caller with it.
    /// A failure clears the stored token.
    pub fn finish_refresh(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut inner = self.lock();
            inner.refreshing = false;
            inner.token = outcome.as_ref().ok().cloned();
            std::mem::take(&mut inner.queue)
        };

        match &outcome {
            Ok(_) => info!(waiters = waiters.len(), "Access token refreshed"),
            Err(reason) => warn!(waiters = waiters.len(), reason = %reason, "Access token refresh failed"),
        }
        for waiter in waiters {
            // A dropped receiver means that caller went away.
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Releases waiters if the refreshing future is dropped before it finishes.
struct RefreshInFlight<'a> {
    state: &'a SessionState,
    finished: bool,
}

impl RefreshInFlight<'_> {
    fn finish(mut self, outcome: RefreshOutcome) {
        self.finished = true;
        self.state.finish_refresh(outcome);
    }
}

impl Drop for RefreshInFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.finish_refresh(Err("Refresh cancelled".to_string()));
        }
    }
}

pub struct SessionInterceptor<R> {
    state: Arc<SessionState>,
    refresher: R,
    next_request_id: AtomicU64,
}

impl<R: TokenRefresher> SessionInterceptor<R> {
    pub fn new(state: Arc<SessionState>, refresher: R) -> Self {
        Self {
            state,
            refresher,
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Run `send` with the current access token. On 401 the token is refreshed
    /// (or an in-flight refresh is awaited) and `send` runs once more.
    pub async fn execute<T, F, Fut>(&self, send: F) -> Result<T, ApiError>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let token = self.state.get_token();

        match send(token.clone()).await {
            Err(err) if err.is_unauthorized() => {
                let token = self.recover(request_id, token.as_deref()).await?;
                send(Some(token)).await
            }
            other => other,
        }
    }

    async fn recover(&self, request_id: u64, failed_token: Option<&str>) -> Result<String, ApiError> {
        match self.state.on_unauthorized(request_id, failed_token) {
            UnauthorizedAction::RetryWith(token) => Ok(token),
            UnauthorizedAction::Wait(rx) => match rx.await {
                Ok(outcome) => outcome.map_err(ApiError::RefreshFailed),
                Err(_) => Err(ApiError::RefreshFailed("Refresh abandoned".to_string())),
            },
            UnauthorizedAction::Refresh => {
                let guard = RefreshInFlight {
                    state: &self.state,
                    finished: false,
                };
                let outcome = self
                    .refresher
                    .refresh_access_token()
                    .await
                    .map_err(|err| err.to_string());
                guard.finish(outcome.clone());
                outcome.map_err(ApiError::RefreshFailed)
            }
        }
    }
}
