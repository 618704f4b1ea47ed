//! Session HTTP client.
//!
//! Every call to the admin API goes through [`SessionClient::send`], which:
//!
//! 1. attaches `Authorization: Bearer <token>` when the credential store
//!    holds a token;
//! 2. on a 401 for a non-auth endpoint, runs a single-flight refresh and
//!    replays the request once with the new token;
//! 3. returns 429 answers untouched.
//!
//! # Single-flight refresh
//!
//! ```text
//! request A ──401──▶ leader: POST /v1/auth/refresh ──token──▶ replay A
//! request B ──401──▶ waiter ─────────────(oneshot)────token──▶ replay B
//! request C ──401──▶ waiter ─────────────(oneshot)────token──▶ replay C
//! ```
//!
//! The first request to see a 401 becomes the leader. Requests failing while
//! the leader's refresh is in flight queue a `oneshot` receiver and are
//! settled with the leader's outcome. A failed refresh clears the stored
//! credential and every queued request fails with its own original 401.

use crate::auth::TokenResponse;
use crate::config::ClientConfig;
use crate::constants::auth_paths;
use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::environment::{Clock, SystemClock};
use crate::error::{ClientError, ErrorPayload, Result};
use crate::session::{ExpiresIn, SessionState};
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{RwLock, oneshot};

/// Target of the per-request analytics events.
pub const ANALYTICS_TARGET: &str = "admin_console::analytics";

// ═══════════════════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════════════════

/// Outbound API request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    headers: Vec<(String, String)>,
    retried: bool,
}

impl ApiRequest {
    /// Create a request for an API path such as `/v1/people`.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            retried: false,
        }
    }

    /// `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT` request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `DELETE` request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append several query parameters.
    #[must_use]
    pub fn with_query_pairs<I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.query.extend(pairs);
        self
    }

    /// Set a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Encode` if `body` cannot be serialized.
    pub fn with_json<T: Serialize>(self, body: &T) -> Result<Self> {
        let body = serde_json::to_value(body).map_err(|e| ClientError::Encode(e.to_string()))?;
        Ok(self.with_body(body))
    }

    /// Add a header. An `Authorization` header is replaced by the stored
    /// token when one exists.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// API path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters.
    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// JSON body.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Returns `true` once the request has been replayed after a refresh.
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        self.retried
    }

    /// Returns `true` for login, refresh and logout, which are never
    /// intercepted by refresh-and-retry.
    #[must_use]
    pub fn is_auth_endpoint(&self) -> bool {
        auth_paths::NON_INTERCEPTED
            .iter()
            .any(|auth_path| self.path.contains(auth_path))
    }

    fn into_retry(mut self) -> Self {
        self.retried = true;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Refresh coordination
// ═══════════════════════════════════════════════════════════════════════

/// Why a refresh did not produce a token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RefreshFailure {
    /// The refresh call answered 2xx without an access token.
    MissingToken,
    /// The refresh call (or persisting its token) failed.
    Request(ClientError),
    /// The leading task was dropped before the refresh settled.
    Abandoned,
}

impl RefreshFailure {
    pub(crate) fn into_error(self) -> ClientError {
        match self {
            Self::MissingToken => {
                ClientError::Decode("refresh response did not include an access token".to_string())
            }
            Self::Request(err) => err,
            Self::Abandoned => ClientError::Network("token refresh was abandoned".to_string()),
        }
    }
}

/// Outcome broadcast to queued requests.
#[derive(Debug, Clone)]
enum RefreshOutcome {
    Refreshed(String),
    Failed(RefreshFailure),
}

/// Result of joining the single-flight refresh.
pub(crate) enum Coordinated {
    /// This task performed the refresh call.
    Led(std::result::Result<String, RefreshFailure>),
    /// This task waited on another task's refresh.
    Waited(std::result::Result<String, RefreshFailure>),
}

#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Settles the refresh as abandoned if the leader is dropped mid-flight.
struct LeaderGuard<'a, S> {
    client: &'a SessionClient<S>,
    armed: bool,
}

impl<S> LeaderGuard<'_, S> {
    fn settle(mut self, outcome: RefreshOutcome) {
        self.armed = false;
        self.client.settle_refresh(outcome);
    }
}

impl<S> Drop for LeaderGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            self.client
                .settle_refresh(RefreshOutcome::Failed(RefreshFailure::Abandoned));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════════════════

struct Inner<S> {
    http: reqwest::Client,
    config: ClientConfig,
    store: S,
    session: RwLock<SessionState>,
    refresh: Mutex<RefreshState>,
    clock: Arc<dyn Clock>,
}

/// Authenticated client for the admin API.
///
/// Construct one per running application and clone it into every call
/// site; clones share the credential store, session state and refresh
/// coordination.
pub struct SessionClient<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for SessionClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for SessionClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl SessionClient<FileCredentialStore> {
    /// Create a client persisting its token in the file named by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let store = FileCredentialStore::new(&config.storage_path, &config.storage_key);
        Self::new(config, store)
    }
}

impl<S> SessionClient<S> {
    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Credential store in use.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Snapshot of the session state.
    pub async fn session(&self) -> SessionState {
        self.inner.session.read().await.clone()
    }

    /// Returns `true` while a token refresh is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock_refresh().in_flight
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub(crate) async fn update_session<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut session = self.inner.session.write().await;
        f(&mut session)
    }

    fn lock_refresh(&self) -> MutexGuard<'_, RefreshState> {
        self.inner
            .refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the in-flight flag and hand `outcome` to every queued request.
    fn settle_refresh(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.lock_refresh();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        tracing::debug!(waiters = waiters.len(), "Settling token refresh");

        for waiter in waiters {
            // A dropped receiver means the caller went away.
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl<S: CredentialStore> SessionClient<S> {
    /// Create a client using the system clock.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, store: S) -> Result<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Create a client with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn with_clock(config: ClientConfig, store: S, clock: Arc<dyn Clock>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                store,
                session: RwLock::new(SessionState::default()),
                refresh: Mutex::new(RefreshState::default()),
                clock,
            }),
        })
    }

    /// Send a request, returning the JSON body of a 2xx answer.
    ///
    /// An empty body yields `Value::Null` and a non-JSON body yields a
    /// `Value::String`.
    ///
    /// # Errors
    ///
    /// - `ClientError::Network` when no response arrives
    /// - `ClientError::RateLimited` on 429
    /// - `ClientError::Api` on any other non-2xx answer that survives the
    ///   refresh protocol
    pub async fn send(&self, request: ApiRequest) -> Result<Value> {
        let token = self.stored_token().await;

        match self.execute(&request, token.as_deref()).await {
            Err(err) if Self::should_intercept(&request, &err, token.is_some()) => {
                self.refresh_and_replay(request.into_retry(), err).await
            }
            other => other,
        }
    }

    /// Send a request and deserialize the 2xx body into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), plus `ClientError::Decode` when the
    /// body does not match `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let value = self.send(request).await?;
        serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Refresh the access token now.
    ///
    /// Joins a refresh that is already in flight instead of starting a
    /// second one.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure. The session is torn down when the
    /// refresh call itself fails.
    pub async fn refresh_session(&self) -> Result<()> {
        match self.coordinate_refresh().await {
            Coordinated::Led(Ok(_)) | Coordinated::Waited(Ok(_)) => Ok(()),
            Coordinated::Led(Err(failure)) | Coordinated::Waited(Err(failure)) => {
                Err(failure.into_error())
            }
        }
    }

    fn should_intercept(request: &ApiRequest, err: &ClientError, had_token: bool) -> bool {
        err.is_unauthorized() && had_token && !request.is_retry() && !request.is_auth_endpoint()
    }

    async fn refresh_and_replay(
        &self,
        request: ApiRequest,
        original: ClientError,
    ) -> Result<Value> {
        tracing::debug!(path = %request.path, "Access token rejected, refreshing");

        let token = match self.coordinate_refresh().await {
            Coordinated::Led(Ok(token)) | Coordinated::Waited(Ok(token)) => token,
            Coordinated::Led(Err(RefreshFailure::Request(err))) => return Err(err),
            Coordinated::Led(Err(_)) | Coordinated::Waited(Err(_)) => return Err(original),
        };

        self.execute(&request, Some(&token)).await
    }

    /// Join the single-flight refresh: lead it, or wait for the leader.
    pub(crate) async fn coordinate_refresh(&self) -> Coordinated {
        let waiter = {
            let mut state = self.lock_refresh();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            let outcome = match rx.await {
                Ok(RefreshOutcome::Refreshed(token)) => Ok(token),
                Ok(RefreshOutcome::Failed(failure)) => Err(failure),
                Err(_) => Err(RefreshFailure::Abandoned),
            };
            return Coordinated::Waited(outcome);
        }

        let guard = LeaderGuard {
            client: self,
            armed: true,
        };

        match self.perform_refresh().await {
            Ok(token) => {
                guard.settle(RefreshOutcome::Refreshed(token.clone()));
                Coordinated::Led(Ok(token))
            }
            Err(failure) => {
                if let Err(e) = self.teardown().await {
                    tracing::error!(
                        error = %e,
                        "Stale credential left in store after failed refresh"
                    );
                }
                guard.settle(RefreshOutcome::Failed(failure.clone()));
                Coordinated::Led(Err(failure))
            }
        }
    }

    async fn perform_refresh(&self) -> std::result::Result<String, RefreshFailure> {
        let token = self.stored_token().await;
        let request = ApiRequest::post(auth_paths::REFRESH);

        let body = self
            .execute(&request, token.as_deref())
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "Token refresh failed");
                RefreshFailure::Request(err)
            })?;

        let response: TokenResponse = match serde_json::from_value(body) {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!("Token refresh answered without an access token");
                return Err(RefreshFailure::MissingToken);
            }
        };
        if response.access_token.is_empty() {
            tracing::warn!("Token refresh answered with an empty access token");
            return Err(RefreshFailure::MissingToken);
        }

        self.persist_token(&response.access_token, response.expires_in.as_ref())
            .await
            .map_err(RefreshFailure::Request)?;

        tracing::info!("Access token refreshed");
        Ok(response.access_token)
    }

    /// Store `token` and record the matching session credentials.
    pub(crate) async fn persist_token(
        &self,
        token: &str,
        expires_in: Option<&ExpiresIn>,
    ) -> Result<()> {
        self.inner.store.save(token).await?;
        let now = self.now();
        self.update_session(|session| session.set_credentials(expires_in, now))
            .await;
        Ok(())
    }

    /// Remove the stored token and reset the session to anonymous.
    ///
    /// When the store cannot be cleared the session is left as is, so it
    /// keeps matching the token still on disk.
    pub(crate) async fn teardown(&self) -> Result<()> {
        if let Err(e) = self.inner.store.clear().await {
            tracing::warn!(error = %e, "Failed to clear stored credential");
            return Err(e);
        }
        self.update_session(SessionState::clear_credentials).await;
        tracing::info!("Session cleared");
        Ok(())
    }

    /// Token currently in the credential store. Unreadable storage counts as
    /// no token.
    pub(crate) async fn stored_token(&self) -> Option<String> {
        match self.inner.store.load().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored credential");
                None
            }
        }
    }

    /// One HTTP exchange, no interception.
    async fn execute(&self, request: &ApiRequest, token: Option<&str>) -> Result<Value> {
        let url = self.inner.config.url_for(&request.path);
        let mut builder = self.inner.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            if token.is_some() && name.eq_ignore_ascii_case("authorization") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            retry = request.retried,
            authenticated = token.is_some(),
            "Sending request"
        );

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                self.report(request, None, started);
                return Err(ClientError::Network(e.to_string()));
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        self.report(request, Some(status), started);

        if status.is_success() {
            return Ok(parse_success_body(&body));
        }

        let payload = ErrorPayload::from_body(&body);
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited { payload });
        }
        Err(ClientError::Api {
            status: status.as_u16(),
            payload,
        })
    }

    fn report(&self, request: &ApiRequest, status: Option<StatusCode>, started: Instant) {
        if !self.inner.config.analytics_enabled {
            return;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match status {
            Some(status) => tracing::info!(
                target: ANALYTICS_TARGET,
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                elapsed_ms,
                "api_request"
            ),
            None => tracing::info!(
                target: ANALYTICS_TARGET,
                method = %request.method,
                path = %request.path,
                elapsed_ms,
                "api_request_failed"
            ),
        }
    }
}

fn parse_success_body(body: &str) -> Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}
