//! REST API
//!
//! Two route groups under `/api`:
//!
//! - `spigot/*`: called by game-server plugins, authenticated by the
//!   per-server `X-Server-Key`
//! - `web/*`: called by the web front-end, authenticated by the
//!   `X-Session-ID` token obtained from `web/login`
//!
//! Handlers only translate between JSON and the ledger/authenticator calls.

use crate::error::ApiError;
use crate::plugin_auth::{ServerKeys, SERVER_KEY_HEADER};
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Query, State,
    },
    http::{request::Parts, HeaderMap, Method},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use globalbank_auth::Authenticator;
use globalbank_ledger::{Account, Ledger, LedgerEntry, PlayerId, ServerId, SupplySnapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Header carrying the web session token
pub const SESSION_HEADER: &str = "x-session-id";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Ledger service
    pub ledger: Ledger,

    /// Web session authenticator
    pub auth: Arc<dyn Authenticator>,

    /// Plugin keys
    pub server_keys: Arc<ServerKeys>,
}

/// Build the gateway router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let api = Router::new()
        .route("/spigot/currency/sync", post(sync_handler))
        .route("/spigot/currency/player", get(player_balance_handler))
        .route("/web/login", post(login_handler))
        .route("/web/logout", post(logout_handler))
        .route("/web/currency/query", get(query_handler))
        .route("/web/currency/issue", post(issue_handler))
        .route("/web/currency/supply", get(supply_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// Account resolved from the `X-Session-ID` header
pub struct SessionAccount(pub Account);

#[async_trait]
impl FromRequestParts<AppState> for SessionAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)?;
        let account = state.auth.resolve(token).await?;
        Ok(SessionAccount(account))
    }
}

fn session_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("missing X-Session-ID header".to_string()))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e.body_text())))
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(params)| params)
        .map_err(|e| ApiError::BadRequest(format!("invalid query: {}", e.body_text())))
}

/// Blank server filters mean "no filter"
fn optional_server(raw: Option<String>) -> Result<Option<ServerId>, ApiError> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => Ok(Some(ServerId::parse(raw)?)),
        _ => Ok(None),
    }
}

/// Accept amounts as JSON numbers or decimal strings
fn decimal_from_json<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(serde_json::Number),
        Text(String),
    }

    let text = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    };
    Decimal::from_str(text.trim())
        .or_else(|_| Decimal::from_scientific(text.trim()))
        .map_err(serde::de::Error::custom)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Plugin balance delta
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    /// Server reporting the change
    pub server_id: String,
    /// In-game player
    pub player_id: String,
    /// Signed delta, non-zero
    #[serde(deserialize_with = "decimal_from_json")]
    pub amount: Decimal,
}

/// Result of a committed sync
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    /// Always "success"
    pub status: &'static str,
    /// Server
    pub server_id: ServerId,
    /// Player
    pub player_id: PlayerId,
    /// Balance after the delta
    pub balance: Decimal,
}

/// Plugin balance lookup
#[derive(Debug, Deserialize)]
pub struct BalanceParams {
    /// Server
    pub server_id: String,
    /// Player
    pub player_id: String,
}

/// Current balance of one player on one server
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Server
    pub server_id: ServerId,
    /// Player
    pub player_id: PlayerId,
    /// Balance, zero when never transacted
    pub balance: Decimal,
}

/// Web credentials
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login name
    pub username: String,
    /// Plain password
    pub password: String,
}

/// Issued session
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Token for `X-Session-ID`
    pub session_id: String,
    /// Account role
    pub role: String,
    /// Bound server (owners)
    pub server_id: Option<ServerId>,
    /// Linked in-game player (players)
    pub player_id: Option<PlayerId>,
    /// Session expiry
    pub expires_at: DateTime<Utc>,
}

/// Optional server filter
#[derive(Debug, Default, Deserialize)]
pub struct ServerFilter {
    /// Server, blank for none
    pub server_id: Option<String>,
}

/// One balance row as shown on the web
#[derive(Debug, Serialize)]
pub struct EntryView {
    /// Server
    pub server_id: ServerId,
    /// Player
    pub player_id: PlayerId,
    /// Balance
    pub balance: Decimal,
    /// Server issuance
    pub total_issued: Decimal,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl From<LedgerEntry> for EntryView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            server_id: entry.server_id,
            player_id: entry.player_id,
            balance: entry.balance,
            total_issued: entry.total_issued,
            updated_at: entry.updated_at,
        }
    }
}

/// Balance rows
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// Rows within the caller's scope
    pub data: Vec<EntryView>,
}

/// Issuance change
#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    /// Target server; owners may omit it
    #[serde(default)]
    pub server_id: Option<String>,
    /// New total issuance
    #[serde(deserialize_with = "decimal_from_json")]
    pub new_total: Decimal,
}

/// Circulating supply versus issuance
#[derive(Debug, Serialize)]
pub struct SupplyResponse {
    /// Server
    pub server_id: ServerId,
    /// Sum of balances
    pub circulating: Decimal,
    /// Total issuance
    pub total_issued: Decimal,
    /// Issuance not held by players
    pub headroom: Decimal,
    /// Number of entries
    pub entry_count: usize,
    /// Circulating supply is within issuance
    pub consistent: bool,
}

impl From<SupplySnapshot> for SupplyResponse {
    fn from(snapshot: SupplySnapshot) -> Self {
        Self {
            headroom: snapshot.headroom(),
            consistent: snapshot.is_consistent(),
            server_id: snapshot.server_id,
            circulating: snapshot.circulating,
            total_issued: snapshot.total_issued,
            entry_count: snapshot.entry_count,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "globalbank-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .ledger
        .metrics()
        .export()
        .map_err(|e| ApiError::Internal(format!("Failed to export metrics: {}", e)))
}

async fn sync_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>, ApiError> {
    let req = json_body(payload)?;
    let server_id = ServerId::parse(req.server_id)?;
    let player_id = PlayerId::parse(req.player_id)?;

    state.server_keys.verify(
        &server_id,
        headers.get(SERVER_KEY_HEADER).and_then(|v| v.to_str().ok()),
    )?;

    if req.amount.is_zero() {
        return Err(ApiError::BadRequest("amount must be non-zero".to_string()));
    }

    let entry = state
        .ledger
        .sync_balance(&server_id, &player_id, req.amount)
        .await?;

    Ok(Json(SyncResponse {
        status: "success",
        server_id: entry.server_id,
        player_id: entry.player_id,
        balance: entry.balance,
    }))
}

async fn player_balance_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<BalanceParams>, QueryRejection>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let params = query_params(params)?;
    let server_id = ServerId::parse(params.server_id)?;
    let player_id = PlayerId::parse(params.player_id)?;

    state.server_keys.verify(
        &server_id,
        headers.get(SERVER_KEY_HEADER).and_then(|v| v.to_str().ok()),
    )?;

    let balance = state
        .ledger
        .get_player_balance(&server_id, &player_id)
        .await?;

    Ok(Json(BalanceResponse {
        server_id,
        player_id,
        balance,
    }))
}

async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let req = json_body(payload)?;
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    let session = state.auth.login(&req.username, &req.password).await?;

    Ok(Json(LoginResponse {
        session_id: session.token,
        role: session.account.role.to_string(),
        server_id: session.account.server_id,
        player_id: session.account.player_id,
        expires_at: session.expires_at,
    }))
}

async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = session_token(&headers)?;
    state.auth.logout(token).await?;
    Ok(Json(serde_json::json!({ "status": "success" })))
}

async fn query_handler(
    State(state): State<AppState>,
    SessionAccount(account): SessionAccount,
    params: Result<Query<ServerFilter>, QueryRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let server_id = optional_server(query_params(params)?.server_id)?;

    let entries = state
        .ledger
        .query_balances(server_id.as_ref(), &account)
        .await?;

    Ok(Json(QueryResponse {
        data: entries.into_iter().map(EntryView::from).collect(),
    }))
}

async fn issue_handler(
    State(state): State<AppState>,
    SessionAccount(account): SessionAccount,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Json<SupplyResponse>, ApiError> {
    let req = json_body(payload)?;
    let server_id = optional_server(req.server_id)?;

    let snapshot = state
        .ledger
        .issue_currency(server_id.as_ref(), req.new_total, &account)
        .await?;

    Ok(Json(snapshot.into()))
}

async fn supply_handler(
    State(state): State<AppState>,
    SessionAccount(account): SessionAccount,
    params: Result<Query<ServerFilter>, QueryRejection>,
) -> Result<Json<SupplyResponse>, ApiError> {
    let server_id = optional_server(query_params(params)?.server_id)?;

    let snapshot = state
        .ledger
        .supply_snapshot(server_id.as_ref(), &account)
        .await?;

    Ok(Json(snapshot.into()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use globalbank_auth::{provision_account, SessionAuthenticator};
    use globalbank_ledger::{Config, MemoryStore, Role};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    /// Router over an in-memory store with three accounts and two plugin keys
    async fn test_router() -> Router {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::open(store.clone(), &Config::default()).await.unwrap();

        provision_account(store.as_ref(), "admin", "admin-pw", Role::Admin, None, None).unwrap();
        provision_account(
            store.as_ref(),
            "owner1",
            "owner-pw",
            Role::Owner,
            Some(ServerId::parse("S1").unwrap()),
            None,
        )
        .unwrap();
        provision_account(
            store.as_ref(),
            "steve",
            "steve-pw",
            Role::Player,
            None,
            Some(PlayerId::parse("steve").unwrap()),
        )
        .unwrap();

        let mut keys = BTreeMap::new();
        keys.insert("S1".to_string(), "key-1".to_string());
        keys.insert("S2".to_string(), "key-2".to_string());

        create_router(AppState {
            ledger,
            auth: Arc::new(SessionAuthenticator::new(store, chrono::Duration::hours(2))),
            server_keys: Arc::new(ServerKeys::from_config(&keys)),
        })
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(router: &Router, path: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        send(router, builder.body(Body::empty()).unwrap()).await
    }

    async fn post_json(
        router: &Router,
        path: &str,
        headers: &[(&str, &str)],
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        send(router, builder.body(Body::from(body.to_string())).unwrap()).await
    }

    async fn sync(
        router: &Router,
        server: &str,
        key: &str,
        player: &str,
        amount: Value,
    ) -> (StatusCode, Value) {
        post_json(
            router,
            "/api/spigot/currency/sync",
            &[("x-server-key", key)],
            json!({ "server_id": server, "player_id": player, "amount": amount }),
        )
        .await
    }

    async fn login(router: &Router, username: &str, password: &str) -> String {
        let (status, body) = post_json(
            router,
            "/api/web/login",
            &[],
            json!({ "username": username, "password": password }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["session_id"].as_str().unwrap().to_string()
    }

    // -- health & metrics -----------------------------------------------------

    #[tokio::test]
    async fn test_health() {
        let router = test_router().await;
        let (status, body) = get(&router, "/health", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_metrics_exposed() {
        let router = test_router().await;
        sync(&router, "S1", "key-1", "steve", json!(10)).await;

        let resp = router
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let text = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(text.to_vec()).unwrap();
        assert!(text.contains("ledger_syncs_total 1"));
    }

    // -- plugin routes --------------------------------------------------------

    #[tokio::test]
    async fn test_sync_requires_server_key() {
        let router = test_router().await;

        let (status, body) = post_json(
            &router,
            "/api/spigot/currency/sync",
            &[],
            json!({ "server_id": "S1", "player_id": "steve", "amount": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthenticated");

        let (status, _) = sync(&router, "S1", "key-2", "steve", json!(5)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = sync(&router, "S9", "key-1", "steve", json!(5)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sync_and_read_balance() {
        let router = test_router().await;

        let (status, body) = sync(&router, "S1", "key-1", "steve", json!(100)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["balance"], "100");

        let (status, body) = sync(&router, "S1", "key-1", "steve", json!("-25.5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], "74.5");

        let (status, body) = get(
            &router,
            "/api/spigot/currency/player?server_id=S1&player_id=steve",
            &[("x-server-key", "key-1")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], "74.5");
    }

    #[tokio::test]
    async fn test_sync_overdraw_rejected() {
        let router = test_router().await;
        sync(&router, "S1", "key-1", "steve", json!(100)).await;

        let (status, body) = sync(&router, "S1", "key-1", "steve", json!(-150)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "insufficient_balance");
        assert!(body["err"].as_str().unwrap().contains("Insufficient balance"));
    }

    #[tokio::test]
    async fn test_sync_bad_input() {
        let router = test_router().await;

        let (status, body) = sync(&router, "S1", "key-1", "steve", json!(0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");

        let (status, _) = sync(&router, "S1", "key-1", "steve", json!("lots")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = sync(&router, "S1", "key-1", "", json!(5)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post_json(
            &router,
            "/api/spigot/currency/sync",
            &[("x-server-key", "key-1")],
            json!({ "server_id": "S1" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["err"].is_string());
    }

    #[tokio::test]
    async fn test_unseen_player_balance_is_zero() {
        let router = test_router().await;
        let (status, body) = get(
            &router,
            "/api/spigot/currency/player?server_id=S2&player_id=nobody",
            &[("x-server-key", "key-2")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], "0");
    }

    // -- web routes -----------------------------------------------------------

    #[tokio::test]
    async fn test_login() {
        let router = test_router().await;

        let (status, body) = post_json(
            &router,
            "/api/web/login",
            &[],
            json!({ "username": "owner1", "password": "owner-pw" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "owner");
        assert_eq!(body["server_id"], "S1");
        assert!(body["session_id"].is_string());

        let (status, body) = post_json(
            &router,
            "/api/web/login",
            &[],
            json!({ "username": "owner1", "password": "nope" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["err"].is_string());
    }

    #[tokio::test]
    async fn test_query_requires_session() {
        let router = test_router().await;

        let (status, _) = get(&router, "/api/web/currency/query", &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = get(
            &router,
            "/api/web/currency/query",
            &[("x-session-id", "forged")],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_query_scoped_by_role() {
        let router = test_router().await;
        sync(&router, "S1", "key-1", "steve", json!(10)).await;
        sync(&router, "S2", "key-2", "steve", json!(20)).await;
        sync(&router, "S1", "key-1", "alex", json!(30)).await;

        let admin = login(&router, "admin", "admin-pw").await;
        let (status, body) = get(
            &router,
            "/api/web/currency/query",
            &[("x-session-id", admin.as_str())],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let owner = login(&router, "owner1", "owner-pw").await;
        let (status, body) = get(
            &router,
            "/api/web/currency/query",
            &[("x-session-id", owner.as_str())],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["server_id"] == "S1"));

        let (status, body) = get(
            &router,
            "/api/web/currency/query?server_id=S2",
            &[("x-session-id", owner.as_str())],
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "forbidden");

        let player = login(&router, "steve", "steve-pw").await;
        let (status, body) = get(
            &router,
            "/api/web/currency/query",
            &[("x-session-id", player.as_str())],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["player_id"] == "steve"));
    }

    #[tokio::test]
    async fn test_issue_flow() {
        let router = test_router().await;
        sync(&router, "S1", "key-1", "steve", json!(100)).await;
        let admin = login(&router, "admin", "admin-pw").await;

        let (status, body) = post_json(
            &router,
            "/api/web/currency/issue",
            &[("x-session-id", admin.as_str())],
            json!({ "server_id": "S1", "new_total": 50 }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "conflict");

        let (status, body) = post_json(
            &router,
            "/api/web/currency/issue",
            &[("x-session-id", admin.as_str())],
            json!({ "server_id": "S1", "new_total": -1 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");

        let (status, body) = post_json(
            &router,
            "/api/web/currency/issue",
            &[("x-session-id", admin.as_str())],
            json!({ "server_id": "S1", "new_total": 200 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_issued"], "200");
        assert_eq!(body["circulating"], "100");
        assert_eq!(body["consistent"], true);

        let (_, body) = get(
            &router,
            "/api/web/currency/query?server_id=S1",
            &[("x-session-id", admin.as_str())],
        )
        .await;
        assert_eq!(body["data"][0]["total_issued"], "200");
    }

    #[tokio::test]
    async fn test_issue_denied_for_players_and_foreign_owners() {
        let router = test_router().await;

        let player = login(&router, "steve", "steve-pw").await;
        let (status, _) = post_json(
            &router,
            "/api/web/currency/issue",
            &[("x-session-id", player.as_str())],
            json!({ "server_id": "S1", "new_total": 10 }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let owner = login(&router, "owner1", "owner-pw").await;
        let (status, _) = post_json(
            &router,
            "/api/web/currency/issue",
            &[("x-session-id", owner.as_str())],
            json!({ "server_id": "S2", "new_total": 10 }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = post_json(
            &router,
            "/api/web/currency/issue",
            &[("x-session-id", owner.as_str())],
            json!({ "new_total": 10 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["server_id"], "S1");
    }

    #[tokio::test]
    async fn test_supply_endpoint() {
        let router = test_router().await;
        sync(&router, "S1", "key-1", "steve", json!(40)).await;
        let owner = login(&router, "owner1", "owner-pw").await;

        let (status, body) = get(
            &router,
            "/api/web/currency/supply",
            &[("x-session-id", owner.as_str())],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["circulating"], "40");
        assert_eq!(body["consistent"], false);
        assert_eq!(body["entry_count"], 1);
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let router = test_router().await;
        let token = login(&router, "admin", "admin-pw").await;

        let (status, _) = post_json(
            &router,
            "/api/web/logout",
            &[("x-session-id", token.as_str())],
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get(
            &router,
            "/api/web/currency/query",
            &[("x-session-id", token.as_str())],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
