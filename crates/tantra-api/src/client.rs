//! Authenticated HTTP client
//!
//! Every request carries the bearer credential when one is held. A 401 on a
//! non-auth endpoint triggers exactly one silent refresh; on success the
//! original request is replayed once, on failure the credential is dropped and
//! [`SessionEvent::Unauthenticated`] is broadcast.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tantra_config::{ApiConfig, AuthConfig};
use tantra_store::CredentialStore;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::types::AuthResponse;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_AUTH_REDIRECT: &str = "/auth";

/// Endpoints whose 401 is a real answer, not an expired session
const NO_REFRESH_PATHS: &[&str] = &["/auth/login", "/auth/register", "/auth/refresh", "/auth/logout"];

/// Session lifecycle changes observed by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    TokenRefreshed,
    Unauthenticated { redirect_to: String },
}

/// A request that can be sent more than once
#[derive(Debug, Clone)]
pub(crate) struct RequestSpec {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl RequestSpec {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub(crate) fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub(crate) fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub(crate) fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub(crate) fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub(crate) fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub(crate) fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub(crate) fn json<T: Serialize + ?Sized>(mut self, body: &T) -> ApiResult<Self> {
        self.body = Some(serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?);
        Ok(self)
    }

    fn refreshable(&self) -> bool {
        !NO_REFRESH_PATHS.contains(&self.path.as_str())
    }
}

struct Inner {
    http: Client,
    base_url: String,
    credentials: CredentialStore,
    auth_redirect: String,
    events: broadcast::Sender<SessionEvent>,
}

/// REST client for the backend
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

/// Builder for [`ApiClient`]
#[derive(Debug)]
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Duration,
    auth_redirect: String,
    credentials: Option<CredentialStore>,
}

impl ApiClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn auth_redirect(mut self, path: impl Into<String>) -> Self {
        self.auth_redirect = path.into();
        self
    }

    pub fn credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn build(self) -> ApiResult<ApiClient> {
        let base_url = self.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::Config(format!(
                "base url must start with http:// or https://, got {}",
                base_url
            )));
        }

        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        let (events, _) = broadcast::channel(16);

        Ok(ApiClient {
            inner: Arc::new(Inner {
                http,
                base_url,
                credentials: self.credentials.unwrap_or_else(CredentialStore::in_memory),
                auth_redirect: self.auth_redirect,
                events,
            }),
        })
    }
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            auth_redirect: DEFAULT_AUTH_REDIRECT.to_string(),
            credentials: None,
        }
    }

    pub fn from_config(
        api: &ApiConfig,
        auth: &AuthConfig,
        credentials: CredentialStore,
    ) -> ApiResult<Self> {
        Self::builder(&api.base_url)
            .timeout(Duration::from_secs(api.timeout_seconds))
            .auth_redirect(&auth.fallback_path)
            .credentials(credentials)
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    pub fn token(&self) -> Option<String> {
        self.inner.credentials.token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.credentials.is_present()
    }

    /// Subscribe to refresh / expiry notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) async fn store_token(&self, token: &str) {
        if let Err(e) = self.inner.credentials.set(token).await {
            warn!("Failed to persist credential: {}", e);
        }
    }

    pub(crate) async fn clear_token(&self) {
        if let Err(e) = self.inner.credentials.clear().await {
            warn!("Failed to remove persisted credential: {}", e);
        }
    }

    async fn expire_session(&self) {
        self.clear_token().await;
        let _ = self.inner.events.send(SessionEvent::Unauthenticated {
            redirect_to: self.inner.auth_redirect.clone(),
        });
    }

    async fn send_once(&self, spec: &RequestSpec) -> ApiResult<Response> {
        let url = format!("{}{}", self.inner.base_url, spec.path);
        debug!("→ {} {}", spec.method, spec.path);

        let mut request = self.inner.http.request(spec.method.clone(), &url);
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }
        if let Some(ref body) = spec.body {
            request = request.json(body);
        }

        request.send().await.map_err(ApiError::from_reqwest)
    }

    /// Send with the refresh-on-401 policy applied
    pub(crate) async fn execute(&self, spec: RequestSpec) -> ApiResult<Response> {
        let response = self.send_once(&spec).await?;
        if response.status() != StatusCode::UNAUTHORIZED || !spec.refreshable() {
            return check_status(response).await;
        }

        debug!("401 on {}, attempting token refresh", spec.path);
        if let Err(e) = self.refresh_token().await {
            warn!("Token refresh failed: {}", e);
            self.expire_session().await;
            return Err(ApiError::Unauthorized(e.message()));
        }

        let retried = self.send_once(&spec).await?;
        check_status(retried).await
    }

    pub(crate) async fn call<T: DeserializeOwned>(&self, spec: RequestSpec) -> ApiResult<T> {
        let response = self.execute(spec).await?;
        decode(response).await
    }

    /// `POST /auth/refresh`, replacing the held credential on success
    pub async fn refresh_token(&self) -> ApiResult<AuthResponse> {
        let spec = RequestSpec::post("/auth/refresh");
        let response = check_status(self.send_once(&spec).await?).await?;
        let auth: AuthResponse = decode(response).await?;

        self.store_token(&auth.access_token).await;
        let _ = self.inner.events.send(SessionEvent::TokenRefreshed);
        debug!("Token refreshed for {}", auth.user.username);
        Ok(auth)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    if status == StatusCode::UNAUTHORIZED {
        Err(ApiError::Unauthorized(message))
    } else {
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Error text from a failed response: the `detail` field when present
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        match value.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(detail) if !detail.is_null() => return detail.to_string(),
            _ => {}
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
