use anyhow::Context;
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::auth::gate::{Entry, RefreshGate};
use crate::auth::refresh;
use crate::auth::{CredentialPolicy, CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::config::{AuthScheme, Config};
use crate::error::{extract_message, ClientError, RefreshError, Result};

/// Where the hosting application should send the user once the session ends
pub const LOGIN_PATH: &str = "/";

static GLOBAL_CLIENT: OnceCell<SecureClient> = OnceCell::new();

/// Session lifecycle notifications for the hosting application
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Credentials were stored by a login
    LoggedIn,
    /// A new access token was obtained and stored
    TokenRefreshed,
    /// The user logged out
    LoggedOut { redirect_to: String },
    /// Refresh failed; credentials were cleared
    Invalidated { redirect_to: String, reason: String },
}

/// Retry bookkeeping carried with a request
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetryMetadata {
    /// The request has already been replayed after a 401
    pub attempted: bool,
}

/// Fully-formed request descriptor, replayable after a token refresh
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
    pub retry: RetryMetadata,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            retry: RetryMetadata::default(),
        }
    }

    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::Validation(format!("Unserializable request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

struct Inner {
    client: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    gate: RefreshGate,
    scheme: AuthScheme,
    policy: CredentialPolicy,
    refresh_wait: Option<Duration>,
    events: broadcast::Sender<SessionEvent>,
}

/// HTTP client that attaches stored credentials to every request and
/// recovers from access-token expiry with a single shared refresh.
///
/// Clones share one gate and one credential store, so the single-flight
/// guarantee holds across every caller holding a clone.
#[derive(Clone)]
pub struct SecureClient {
    inner: Arc<Inner>,
}

impl SecureClient {
    /// Create a new client for the configured backend
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(default_headers)
            .pool_max_idle_per_host(config.http_max_connections)
            .connect_timeout(Duration::from_secs(config.http_connect_timeout))
            .timeout(Duration::from_secs(config.http_request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        let (events, _) = broadcast::channel(16);

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                store,
                gate: RefreshGate::new(),
                scheme: config.auth_scheme,
                policy: config.credential_policy(),
                refresh_wait: config.refresh_wait(),
                events,
            }),
        })
    }

    /// Make this client the process-wide instance.
    /// The first installed client wins; later calls get that one back.
    pub fn install_global(self) -> &'static SecureClient {
        GLOBAL_CLIENT.get_or_init(|| self)
    }

    /// The process-wide instance, if one was installed
    pub fn global() -> Option<&'static SecureClient> {
        GLOBAL_CLIENT.get()
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.inner.store.as_ref()
    }

    pub fn gate(&self) -> &RefreshGate {
        &self.inner.gate
    }

    pub fn policy(&self) -> CredentialPolicy {
        self.inner.policy
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Current access token from the credential store
    pub fn access_token(&self) -> Result<Option<String>> {
        self.inner.store.get(ACCESS_TOKEN_KEY)
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.request(ApiRequest::new(Method::GET, path)).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.request(ApiRequest::new(Method::POST, path).with_json(body)?)
            .await
    }

    pub async fn patch<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.request(ApiRequest::new(Method::PATCH, path).with_json(body)?)
            .await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.request(ApiRequest::new(Method::PUT, path).with_json(body)?)
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Response> {
        self.request(ApiRequest::new(Method::DELETE, path)).await
    }

    /// Send a request with stored credentials.
    ///
    /// Responses other than 401 are returned unchanged, whatever their status.
    /// A 401 triggers credential recovery and one replay of the request;
    /// a second 401 on the replay fails with [`ClientError::Unauthorized`].
    pub async fn request(&self, request: ApiRequest) -> Result<Response> {
        let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let span = tracing::debug_span!(
            "request",
            request_id = %request_id,
            method = %request.method,
            path = %request.path
        );

        self.execute(request).instrument(span).await
    }

    async fn execute(&self, mut request: ApiRequest) -> Result<Response> {
        let sent_token = self.access_token()?;
        let response = self.dispatch(&request, sent_token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if request.retry.attempted {
            return Err(unauthorized(response).await);
        }

        tracing::warn!("Received 401, recovering credentials");
        request.retry.attempted = true;

        let token = self.recover(sent_token.as_deref()).await?;
        let response = self.dispatch(&request, Some(&token)).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(unauthorized(response).await);
        }

        Ok(response)
    }

    /// Obtain a usable access token after a 401: lead a refresh, queue behind
    /// the one in flight, or pick up a token that already replaced the
    /// rejected one.
    async fn recover(&self, sent_token: Option<&str>) -> Result<String> {
        match self
            .inner
            .gate
            .enter_with_store(sent_token, self.inner.store.as_ref())?
        {
            Entry::Replay(token) => {
                tracing::debug!("Credentials already refreshed, replaying request");
                Ok(token)
            }
            Entry::Failed(err) => {
                tracing::debug!(error = %err, "Session already invalidated for this token");
                Err(err.into())
            }
            Entry::Wait(waiter) => {
                tracing::warn!(ticket = waiter.ticket(), "Refresh in flight, queueing request");
                let token = waiter.wait_timeout(self.inner.refresh_wait).await?;
                Ok(token)
            }
            Entry::Lead(lease) => {
                let outcome = self.refresh_credentials().await;
                // Dead credentials go before any queued request resumes
                if outcome.is_err() {
                    self.clear_credentials();
                }
                let released = lease.settle(outcome.clone());

                match outcome {
                    Ok(token) => {
                        tracing::info!(
                            released = released.len(),
                            "Token refreshed, releasing queued requests"
                        );
                        self.emit(SessionEvent::TokenRefreshed);
                        Ok(token)
                    }
                    Err(err) => {
                        tracing::error!(
                            error = %err,
                            released = released.len(),
                            "Token refresh failed, invalidating session"
                        );
                        self.emit(SessionEvent::Invalidated {
                            redirect_to: LOGIN_PATH.to_string(),
                            reason: err.to_string(),
                        });
                        Err(err.into())
                    }
                }
            }
        }
    }

    /// Exchange the stored refresh token and persist the new access token.
    /// The store is written before any queued request is released.
    async fn refresh_credentials(&self) -> std::result::Result<String, RefreshError> {
        let refresh_token = self
            .inner
            .store
            .get(REFRESH_TOKEN_KEY)
            .map_err(|e| RefreshError::Store(e.to_string()))?;

        let Some(refresh_token) = refresh_token else {
            tracing::warn!("No refresh token stored, cannot refresh");
            return Err(RefreshError::MissingRefreshToken);
        };

        let token =
            refresh::refresh_access_token(&self.inner.client, &self.inner.base_url, &refresh_token)
                .await?;

        self.inner
            .store
            .set(ACCESS_TOKEN_KEY, &token, self.inner.policy.refreshed_access())
            .map_err(|e| RefreshError::Store(e.to_string()))?;

        Ok(token)
    }

    fn clear_credentials(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.inner.store.remove(key) {
                tracing::error!(key = key, error = %e, "Failed to clear credential");
            }
        }
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response> {
        let url = self.url(&request.path);

        let mut builder = self
            .inner
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(token) = token {
            let value = HeaderValue::from_str(&self.inner.scheme.header_value(token))
                .map_err(|_| {
                    ClientError::Validation("Access token is not a valid header value".to_string())
                })?;
            builder = builder.header(AUTHORIZATION, value);
        }

        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        tracing::debug!(
            url = %url,
            authorized = token.is_some(),
            retry = request.retry.attempted,
            "Sending HTTP request"
        );

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(error = %e, url = %url, "HTTP request error");
            ClientError::Network(e)
        })?;

        tracing::debug!(status = %response.status(), "Received HTTP response");
        Ok(response)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.inner.base_url,
            path.trim_start_matches('/')
        )
    }
}

async fn unauthorized(response: Response) -> ClientError {
    let body = response.text().await.unwrap_or_default();
    tracing::error!(body = %body, "Request rejected after credential recovery");
    ClientError::Unauthorized {
        message: extract_message(&body),
    }
}
