//! Integration test harness for Till.
//!
//! Provides [`FakePosApi`], an in-process axum server speaking the POS wire
//! contract: bearer-token auth with a refresh endpoint, product reads, and
//! sale creation. Tests drive the real reqwest-backed terminal client
//! against it and assert on the server-side counters (refresh count, sale
//! count) that the client's invariants are about.
//!
//! # Example
//!
//! ```rust,ignore
//! let api = FakePosApi::spawn().await;
//! api.seed_product("p-100", "Espresso Beans", "18.50", 12);
//!
//! let (client, tokens) = api.client_with_stale_session().await;
//! let catalog = CatalogGateway::new(client);
//! let product = catalog.fetch_product(&"p-100".into()).await?;
//! assert_eq!(api.refresh_count(), 1);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::json;
use till_terminal::{ApiClient, MemoryTokenPersistence, TerminalConfig, TokenPair, TokenStore};
use url::Url;

/// A seeded product record, also the wire shape of `GET /products/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub unit_price: String,
    pub available_stock: u32,
    pub category: Option<String>,
}

#[derive(Debug, Default)]
struct AuthState {
    valid_access: HashSet<String>,
    valid_refresh: HashSet<String>,
    serial: u64,
}

impl AuthState {
    fn mint(&mut self) -> (String, String) {
        self.serial += 1;
        let access = format!("access-{}", self.serial);
        let refresh = format!("refresh-{}", self.serial);
        self.valid_access.insert(access.clone());
        self.valid_refresh.insert(refresh.clone());
        (access, refresh)
    }
}

/// Shared state of the fake server, inspectable from tests.
#[derive(Default)]
pub struct FakeApiState {
    auth: Mutex<AuthState>,
    products: Mutex<HashMap<String, ProductRecord>>,
    refresh_count: AtomicUsize,
    sale_count: AtomicUsize,
    sale_serial: AtomicU64,
    /// When set, `POST /sales` answers with this status instead of committing.
    fail_sales_with: AtomicU64,
    /// When set, every bearer-authenticated endpoint answers 401 even for
    /// tokens the server itself issued (simulates server-side revocation).
    reject_all_bearer: AtomicBool,
    /// When set, `POST /auth/refresh` rejects every refresh token.
    reject_refresh: AtomicBool,
    /// Delay inside the refresh handler, to widen the single-flight race
    /// window in concurrency tests. Milliseconds; 0 means no delay.
    refresh_delay_ms: AtomicU64,
}

/// An in-process POS API server bound to an ephemeral port.
pub struct FakePosApi {
    state: Arc<FakeApiState>,
    addr: SocketAddr,
}

impl FakePosApi {
    /// Bind an ephemeral listener and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound (test environment failure).
    pub async fn spawn() -> Self {
        let state = Arc::new(FakeApiState::default());

        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/products/{id}", get(get_product))
            .route("/sales", post(create_sale))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve fake api");
        });

        Self { state, addr }
    }

    /// Base URL of the running server.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("valid base url")
    }

    /// A terminal config pointed at this server.
    #[must_use]
    pub fn terminal_config(&self) -> TerminalConfig {
        TerminalConfig {
            api_base_url: self.base_url(),
            http_timeout: Duration::from_secs(5),
            token_path: std::env::temp_dir().join("till-test-tokens.json"),
        }
    }

    /// A client with an empty in-memory token store.
    #[must_use]
    pub fn client(&self) -> ApiClient {
        let tokens = TokenStore::new(Arc::new(MemoryTokenPersistence::new()));
        ApiClient::new(&self.terminal_config(), tokens)
    }

    /// A client holding a valid, freshly minted session.
    pub async fn client_with_session(&self) -> ApiClient {
        let (access, refresh) = self.mint_tokens();
        let client = self.client();
        client
            .token_store()
            .replace(TokenPair {
                access_token: SecretString::from(access),
                refresh_token: Some(SecretString::from(refresh)),
                expires_at: None,
            })
            .await;
        client
    }

    /// A client whose access token the server will reject but whose
    /// refresh token is valid - the "access expired, refresh works" state.
    pub async fn client_with_stale_session(&self) -> ApiClient {
        let refresh = self.mint_refresh_only();
        let client = self.client();
        client
            .token_store()
            .replace(TokenPair {
                access_token: SecretString::from("stale-access"),
                refresh_token: Some(SecretString::from(refresh)),
                expires_at: None,
            })
            .await;
        client
    }

    /// A client whose access token is still accepted by the server but is
    /// past its advertised expiry, with a valid refresh token - exercises
    /// the proactive refresh before send.
    pub async fn client_with_expiring_session(&self) -> ApiClient {
        let (access, refresh) = self.mint_tokens();
        let client = self.client();
        client
            .token_store()
            .replace(TokenPair {
                access_token: SecretString::from(access),
                refresh_token: Some(SecretString::from(refresh)),
                expires_at: Some(chrono::Utc::now() - chrono::TimeDelta::minutes(5)),
            })
            .await;
        client
    }

    /// A client whose access and refresh tokens are both rejected.
    pub async fn client_with_dead_session(&self) -> ApiClient {
        let client = self.client();
        client
            .token_store()
            .replace(TokenPair {
                access_token: SecretString::from("stale-access"),
                refresh_token: Some(SecretString::from("stale-refresh")),
                expires_at: None,
            })
            .await;
        client
    }

    /// Seed a product.
    pub fn seed_product(&self, id: &str, name: &str, unit_price: &str, available_stock: u32) {
        let record = ProductRecord {
            id: id.to_owned(),
            name: name.to_owned(),
            unit_price: unit_price.to_owned(),
            available_stock,
            category: None,
        };
        if let Ok(mut products) = self.state.products.lock() {
            products.insert(id.to_owned(), record);
        }
    }

    /// Mint a valid access/refresh pair without going through login.
    #[must_use]
    pub fn mint_tokens(&self) -> (String, String) {
        self.state
            .auth
            .lock()
            .map(|mut auth| auth.mint())
            .expect("auth state lock")
    }

    fn mint_refresh_only(&self) -> String {
        self.state
            .auth
            .lock()
            .map(|mut auth| {
                auth.serial += 1;
                let refresh = format!("refresh-{}", auth.serial);
                auth.valid_refresh.insert(refresh.clone());
                refresh
            })
            .expect("auth state lock")
    }

    /// How many refresh requests the server has seen.
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.state.refresh_count.load(Ordering::SeqCst)
    }

    /// How many sales the server has committed.
    #[must_use]
    pub fn sale_count(&self) -> usize {
        self.state.sale_count.load(Ordering::SeqCst)
    }

    /// Make `POST /sales` fail with `status` (0 restores normal behavior).
    pub fn fail_sales_with(&self, status: u16) {
        self.state
            .fail_sales_with
            .store(u64::from(status), Ordering::SeqCst);
    }

    /// Reject every bearer token, even ones the server issued.
    pub fn reject_all_bearer(&self, reject: bool) {
        self.state.reject_all_bearer.store(reject, Ordering::SeqCst);
    }

    /// Reject every refresh token.
    pub fn reject_refresh(&self, reject: bool) {
        self.state.reject_refresh.store(reject, Ordering::SeqCst);
    }

    /// Delay refresh responses to widen the single-flight race window.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state
            .refresh_delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn authorize(state: &FakeApiState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(token) = bearer_token(headers) else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "missing bearer token"));
    };
    if state.reject_all_bearer.load(Ordering::SeqCst) {
        return Err(error_response(StatusCode::UNAUTHORIZED, "token revoked"));
    }
    let valid = state
        .auth
        .lock()
        .map(|auth| auth.valid_access.contains(&token))
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(error_response(StatusCode::UNAUTHORIZED, "invalid access token"))
    }
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(
    State(state): State<Arc<FakeApiState>>,
    Json(body): Json<LoginBody>,
) -> Response {
    if body.username.is_empty() || body.password != "secret" {
        return error_response(StatusCode::UNAUTHORIZED, "invalid credentials");
    }

    let Ok((access, refresh)) = state.auth.lock().map(|mut auth| auth.mint()) else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "auth state poisoned");
    };

    Json(json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 900,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh(
    State(state): State<Arc<FakeApiState>>,
    Json(body): Json<RefreshBody>,
) -> Response {
    state.refresh_count.fetch_add(1, Ordering::SeqCst);

    let delay_ms = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    if state.reject_refresh.load(Ordering::SeqCst) {
        return error_response(StatusCode::UNAUTHORIZED, "refresh rejected");
    }

    let minted = state.auth.lock().map(|mut auth| {
        if auth.valid_refresh.remove(&body.refresh_token) {
            Some(auth.mint())
        } else {
            None
        }
    });

    match minted {
        Ok(Some((access, refresh))) => Json(json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_in": 900,
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::UNAUTHORIZED, "invalid refresh token"),
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "auth state poisoned"),
    }
}

async fn get_product(
    State(state): State<Arc<FakeApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    let record = state
        .products
        .lock()
        .ok()
        .and_then(|products| products.get(&id).cloned());

    record.map_or_else(
        || error_response(StatusCode::NOT_FOUND, "product not found"),
        |record| Json(record).into_response(),
    )
}

async fn create_sale(
    State(state): State<Arc<FakeApiState>>,
    headers: HeaderMap,
    Json(_body): Json<serde_json::Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    let forced = state.fail_sales_with.load(Ordering::SeqCst);
    if forced != 0 {
        let status = u16::try_from(forced)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return error_response(status, "sale submission refused");
    }

    state.sale_count.fetch_add(1, Ordering::SeqCst);
    let serial = state.sale_serial.fetch_add(1, Ordering::SeqCst) + 1;

    Json(json!({
        "id": format!("sale-{serial}"),
        "created_at": chrono::Utc::now(),
    }))
    .into_response()
}
