//! Authenticated POS API client.
//!
//! Every page of the terminal talks to the API through this one client
//! instead of re-implementing token handling per call site. The client
//! owns the whole bearer-token lifecycle:
//!
//! 1. Attach the current access token to the outgoing request.
//! 2. Pass every non-401 response through unchanged.
//! 3. On 401, run the refresh protocol exactly once for the original call,
//!    then reissue the request once with the new access token.
//! 4. A second 401, or a failed refresh, ends the session: the token store
//!    is cleared and the caller gets a terminal auth error.
//!
//! # Single-flight refresh
//!
//! Several calls can be in flight when the access token goes stale, and
//! each of them will independently see a 401. Refreshing is serialized
//! through one async mutex: the first rejected call performs the exchange,
//! the rest block on the gate, then observe that the stored access token
//! already changed and retry without issuing a second refresh. If the
//! winning refresh failed, the store is empty by the time the others get
//! the gate and they fail together.

use std::sync::Arc;

use chrono::Utc;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::auth::store::TokenStore;
use crate::auth::{TokenPair, TokenResponse};
use crate::config::TerminalConfig;
use crate::error::ApiError;

/// A request to an authenticated API endpoint.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the configured base URL, starting with `/`.
    pub path: String,
    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// A GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    /// A POST request with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// A response from the API, body already read.
#[derive(Debug)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Raw response body.
    pub body: String,
}

impl ApiResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Parse` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Best-effort human-readable error from the body: the `message` field
    /// if the body is a JSON error object, otherwise a body snippet.
    #[must_use]
    pub fn error_message(&self) -> String {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: String,
        }

        serde_json::from_str::<ErrorBody>(&self.body).map_or_else(
            |_| self.body.chars().take(200).collect(),
            |e| e.message,
        )
    }
}

/// Client for the POS API.
///
/// Cheaply cloneable; all clones share the token store and the refresh
/// gate, which is what makes the single-flight guarantee hold across
/// concurrent call sites.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    /// Base URL without a trailing slash; request paths are appended.
    base: String,
    tokens: TokenStore,
    /// Serializes the refresh protocol across concurrent rejected calls.
    refresh_gate: Mutex<()>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never
    /// happen under normal circumstances as we use standard TLS
    /// configuration.
    #[must_use]
    pub fn new(config: &TerminalConfig, tokens: TokenStore) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(ApiClientInner {
                http,
                base: config.api_base_url.as_str().trim_end_matches('/').to_owned(),
                tokens,
                refresh_gate: Mutex::new(()),
            }),
        }
    }

    /// The token store this client authenticates from.
    #[must_use]
    pub fn token_store(&self) -> &TokenStore {
        &self.inner.tokens
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    /// Sign in with username and password, storing the returned token pair.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::LoginFailed` if the server rejects the
    /// credentials, or a transport/parse error.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), ApiError> {
        let obtained_at = Utc::now();
        let response = self
            .send_unauthenticated(
                Method::POST,
                "/auth/login",
                &LoginRequest {
                    username,
                    password: password.expose_secret(),
                },
            )
            .await?;

        if response.status == StatusCode::UNAUTHORIZED || response.status == StatusCode::FORBIDDEN {
            return Err(ApiError::LoginFailed(response.error_message()));
        }
        if !response.is_success() {
            return Err(ApiError::Api {
                status: response.status.as_u16(),
                message: response.error_message(),
            });
        }

        let token_response: TokenResponse = response.json()?;
        self.inner
            .tokens
            .replace(token_response.into_pair(obtained_at))
            .await;

        debug!("signed in");
        Ok(())
    }

    /// Sign out, dropping the token pair and its persisted copy.
    pub async fn logout(&self) {
        self.inner.tokens.clear().await;
    }

    // =========================================================================
    // Authenticated Calls
    // =========================================================================

    /// Issue an authenticated request.
    ///
    /// Non-401 responses come back unchanged, success or not; callers map
    /// statuses they care about (or use [`Self::get_json`] /
    /// [`Self::post_json`]). A 401 triggers the refresh-and-retry protocol
    /// described at the module level.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` when no session exists or the
    /// retried request is rejected again, `ApiError::SessionExpired` when
    /// refresh was attempted and failed, or a transport error.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn call(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let Some(mut pair) = self.inner.tokens.get().await else {
            return Err(ApiError::Unauthenticated);
        };

        // Refresh ahead of a known-expired token instead of burning a
        // round trip on a guaranteed 401. Counts as this call's one
        // refresh: a 401 afterwards is terminal.
        let mut refreshed_already = false;
        if pair.is_expired() && pair.can_refresh() {
            debug!("access token expired, refreshing before send");
            pair = self.refresh_session(&pair.access_token).await?;
            refreshed_already = true;
        }

        let response = self.send_with_token(&request, &pair.access_token).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        if refreshed_already {
            warn!("request rejected with a freshly refreshed token, forcing logout");
            self.inner.tokens.clear().await;
            return Err(ApiError::Unauthenticated);
        }

        debug!("access token rejected, entering refresh protocol");
        let refreshed = self.refresh_session(&pair.access_token).await?;

        let retried = self
            .send_with_token(&request, &refreshed.access_token)
            .await?;
        if retried.status == StatusCode::UNAUTHORIZED {
            // A fresh token was rejected too; the session is unusable.
            warn!("request rejected again after refresh, forcing logout");
            self.inner.tokens.clear().await;
            return Err(ApiError::Unauthenticated);
        }

        Ok(retried)
    }

    /// GET a JSON resource, mapping 404 to `NotFound` and other non-success
    /// statuses to `Api`.
    ///
    /// # Errors
    ///
    /// See [`Self::call`], plus `NotFound`/`Api` for non-success statuses
    /// and `Parse` for undecodable bodies.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.call(ApiRequest::get(path)).await?;
        Self::decode(path, &response)
    }

    /// POST a JSON body and decode the JSON response, with the same status
    /// mapping as [`Self::get_json`].
    ///
    /// # Errors
    ///
    /// See [`Self::get_json`].
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        let response = self
            .call(ApiRequest::post(path, serde_json::to_value(body)?))
            .await?;
        Self::decode(path, &response)
    }

    fn decode<T: DeserializeOwned>(path: &str, response: &ApiResponse) -> Result<T, ApiError> {
        if response.status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(path.to_owned()));
        }
        if !response.is_success() {
            return Err(ApiError::Api {
                status: response.status.as_u16(),
                message: response.error_message(),
            });
        }
        response.json()
    }

    // =========================================================================
    // Refresh Protocol
    // =========================================================================

    /// Run the single-flight refresh after `stale_access` was rejected or
    /// found expired.
    ///
    /// Returns the pair to retry with. Exactly one caller per stale token
    /// reaches the network; the rest reuse its result.
    async fn refresh_session(&self, stale_access: &SecretString) -> Result<TokenPair, ApiError> {
        let _gate = self.inner.refresh_gate.lock().await;

        let Some(current) = self.inner.tokens.get().await else {
            // A concurrent caller already tried to refresh and failed.
            return Err(ApiError::SessionExpired);
        };

        if current.access_token.expose_secret() != stale_access.expose_secret() {
            // A concurrent caller refreshed while we waited on the gate.
            debug!("reusing token refreshed by concurrent call");
            return Ok(current);
        }

        let Some(refresh_token) = current.refresh_token.clone() else {
            warn!("access token rejected and no refresh token available");
            self.inner.tokens.clear().await;
            return Err(ApiError::SessionExpired);
        };

        match self.request_refresh(&refresh_token).await? {
            Some(mut pair) => {
                // The endpoint may rotate the refresh token; keep ours if not.
                if pair.refresh_token.is_none() {
                    pair.refresh_token = Some(refresh_token);
                }
                self.inner.tokens.replace(pair.clone()).await;
                debug!("access token refreshed");
                Ok(pair)
            }
            None => {
                warn!("refresh token rejected, forcing logout");
                self.inner.tokens.clear().await;
                Err(ApiError::SessionExpired)
            }
        }
    }

    /// Exchange the refresh token. `Ok(None)` means the endpoint rejected
    /// it; transport errors propagate without ending the session, so a
    /// flaky network does not log the operator out.
    async fn request_refresh(
        &self,
        refresh_token: &SecretString,
    ) -> Result<Option<TokenPair>, ApiError> {
        let obtained_at = Utc::now();
        let response = self
            .send_unauthenticated(
                Method::POST,
                "/auth/refresh",
                &RefreshRequest {
                    refresh_token: refresh_token.expose_secret(),
                },
            )
            .await?;

        if !response.is_success() {
            return Ok(None);
        }

        let token_response: TokenResponse = response.json()?;
        Ok(Some(token_response.into_pair(obtained_at)))
    }

    // =========================================================================
    // Transport
    // =========================================================================

    async fn send_with_token(
        &self,
        request: &ApiRequest,
        access_token: &SecretString,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.inner.base, request.path);

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), &url)
            .header(
                "Authorization",
                format!("Bearer {}", access_token.expose_secret()),
            );
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(ApiResponse { status, body })
    }

    async fn send_unauthenticated(
        &self,
        method: Method,
        path: &str,
        body: &impl Serialize,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.inner.base, path);

        let response = self.inner.http.request(method, &url).json(body).send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(ApiResponse { status, body })
    }
}
