//! HTTP client for the CV builder API.
//!
//! `ApiClient` keeps the access token in a shared [`SessionState`] and lets the
//! cookie store carry the refresh token, so a browser-like session works the
//! same way from Rust.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cvbuilder_core::{LoginRequest, ProfileUpdate, RegisterRequest, User};
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::interceptor::{SessionInterceptor, SessionState, TokenRefresher};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    user: User,
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: User,
}

/// Raw request plumbing shared by the client and the refresher.
/// Clone is cheap; reqwest::Client is reference counted.
#[derive(Clone)]
struct Transport {
    client: Client,
    base_url: String,
}

impl Transport {
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send<T, B>(&self, method: Method, path: &str, token: Option<&str>, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = %method, url = %url, "Sending request");
        let response = Self::check_response(request.send().await?).await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e)))?;
        envelope
            .data
            .ok_or_else(|| ApiError::InvalidResponse(format!("Response from {} has no data", url)))
    }
}

#[async_trait]
impl TokenRefresher for Transport {
    async fn refresh_access_token(&self) -> Result<String, ApiError> {
        // The refresh token rides in the cookie store.
        let response: AccessTokenResponse = self
            .send(Method::POST, "/api/auth/refresh", None, None::<&()>)
            .await?;
        Ok(response.access_token)
    }
}

/// API client. Clone is cheap and clones share the session.
#[derive(Clone)]
pub struct ApiClient {
    transport: Transport,
    interceptor: Arc<SessionInterceptor<Transport>>,
}

impl ApiClient {
    /// Create a client for the API at `base_url` (e.g. `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_session(base_url, Arc::new(SessionState::new()))
    }

    /// Create a client that shares `session` with other holders, e.g. a UI
    /// that needs to observe logout.
    pub fn with_session(base_url: impl Into<String>, session: Arc<SessionState>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let transport = Transport {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        };
        let interceptor = SessionInterceptor::new(session, transport.clone());

        Ok(Self {
            transport,
            interceptor: Arc::new(interceptor),
        })
    }

    pub fn session(&self) -> &Arc<SessionState> {
        self.interceptor.state()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session().get_token().is_some()
    }

    async fn authorized<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.interceptor
            .execute(|token| {
                let method = method.clone();
                async move { self.transport.send(method, path, token.as_deref(), body).await }
            })
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let auth: AuthResponse = self
            .transport
            .send(Method::POST, "/api/auth/register", None, Some(request))
            .await?;
        self.session().set_token(auth.access_token);
        Ok(auth.user)
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<User, ApiError> {
        let request = LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self
            .transport
            .send(Method::POST, "/api/auth/login", None, Some(&request))
            .await?;
        self.session().set_token(auth.access_token);
        Ok(auth.user)
    }

    /// Rotate the refresh cookie and store the new access token. Bypasses the
    /// interceptor.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let token = self.transport.refresh_access_token().await?;
        self.session().set_token(token.clone());
        Ok(token)
    }

    /// Revoke the session server-side. The local token is dropped even if the
    /// call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let token = self.session().get_token();
        let result: Result<serde_json::Value, ApiError> = self
            .transport
            .send(Method::POST, "/api/auth/logout", token.as_deref(), None::<&()>)
            .await;
        self.session().clear();
        if let Err(err) = &result {
            warn!(error = %err, "Logout request failed");
        }
        result.map(|_| ())
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        let response: UserResponse = self.authorized(Method::GET, "/api/users/me", None::<&()>).await?;
        Ok(response.user)
    }

    pub async fn update_me(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let response: UserResponse = self.authorized(Method::PUT, "/api/users/me", Some(update)).await?;
        Ok(response.user)
    }
}
