//!
//! kupu HTTP server
//! ----------------
//! This module defines the Axum-based JSON API for the vocabulary dictionary.
//!
//! Responsibilities:
//! - Session management with a simple cookie + CSRF token model.
//! - Login/register/logout endpoints backed by the `identity` module.
//! - Public read endpoints for words and categories.
//! - Teacher-gated write endpoints for words and categories.
//! - First-run seeding of the default teacher account and category catalog.

use std::{net::SocketAddr, collections::HashMap};

use axum::{routing::{get, post}, Router, extract::{State, Path}, Json};
use axum::response::IntoResponse;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, error};
use tokio::sync::RwLock;
use getrandom::getrandom;
use anyhow::Context;

use crate::error::AppError;
use crate::identity::{self, LocalAuthProvider, LoginRequest, RegisterRequest, ResolvedUser, Role, SessionManager};
use crate::dictionary::{self, NewWord};

const SESSION_COOKIE: &str = "kupu_session";

/// Shared server state injected into all handlers.
///
/// Holds the db root, the session manager, and the per-session CSRF tokens.
/// Everything a handler needs arrives through this state; there is no
/// request-scoped global.
#[derive(Clone)]
pub struct AppState {
    pub db_root: String,
    pub sessions: SessionManager,
    /// Session token -> CSRF token mapping
    pub csrf_tokens: std::sync::Arc<RwLock<HashMap<String, String>>>,
}

impl AppState {
    fn provider(&self) -> LocalAuthProvider {
        LocalAuthProvider::new(self.db_root.clone(), self.sessions.clone())
    }
}

pub async fn run_with_ports(http_port: u16, db_root: &str) -> anyhow::Result<()> {
    // Ensure the database root exists
    std::fs::create_dir_all(db_root)
        .with_context(|| format!("Failed to create or access database root: {}", db_root))?;
    // Seed a usable fresh install: one teacher account and the category catalog
    crate::security::ensure_default_teacher(db_root)
        .with_context(|| format!("While ensuring default teacher under db_root: {}", db_root))?;
    dictionary::ensure_default_categories(db_root)
        .with_context(|| format!("While seeding categories under db_root: {}", db_root))?;

    let app_state = AppState {
        db_root: db_root.to_string(),
        sessions: SessionManager::default(),
        csrf_tokens: std::sync::Arc::new(RwLock::new(HashMap::new())),
    };

    let app = router(app_state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience entry point using the original app's port and default db root.
pub async fn run() -> anyhow::Result<()> {
    run_with_ports(6969, "data").await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "kupu ok" }))
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/csrf", get(get_csrf))
        .route("/me", get(me))
        .route("/words", get(list_words).post(create_word))
        .route("/words/{id}", get(get_word).delete(delete_word))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", get(get_category))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LoginPayload { username: String, password: String }

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    password: String,
    #[serde(default)]
    is_teacher: bool,
}

#[derive(Debug, Deserialize)]
struct CategoryPayload { english_name: String }

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

fn get_token_from_headers(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE)
}

/// Resolve the request's user once, reading username and role live from the
/// credential store. Only a store failure is an error; everything else is a
/// clean `Anonymous`.
fn current_user(state: &AppState, headers: &HeaderMap) -> Result<ResolvedUser, AppError> {
    let token = get_token_from_headers(headers);
    identity::resolve(&state.db_root, &state.sessions, token.as_deref()).map_err(AppError::from)
}

async fn validate_csrf(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(token) = get_token_from_headers(headers) else { return false; };
    let Some(provided) = headers.get("x-csrf-token").and_then(|v| v.to_str().ok()).map(|s| s.to_string()) else { return false; };
    let cmap = state.csrf_tokens.read().await;
    match cmap.get(&token) {
        Some(expected) => expected == &provided,
        None => false,
    }
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // Secure, HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, token)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE)).unwrap()
}

fn gen_csrf_token() -> String {
    let mut csrf_bytes = [0u8; 32];
    let _ = getrandom(&mut csrf_bytes);
    let mut csrf = String::with_capacity(64);
    use std::fmt::Write as _;
    for b in &csrf_bytes { let _ = write!(&mut csrf, "{:02x}", b); }
    csrf
}

fn err_json(e: &AppError) -> (StatusCode, Json<serde_json::Value>) {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"status":"error","code": e.code_str(), "message": e.message()})))
}

async fn establish_session(state: &AppState, resp: &identity::LoginResponse) -> HeaderMap {
    let csrf = gen_csrf_token();
    {
        let mut cmap = state.csrf_tokens.write().await;
        cmap.insert(resp.session.token.clone(), csrf);
    }
    let mut headers = HeaderMap::new();
    headers.insert("Set-Cookie", set_session_cookie(&resp.session.token));
    headers
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    match state.provider().login(&LoginRequest { username: payload.username.clone(), password: payload.password }) {
        Ok(resp) => {
            let headers = establish_session(&state, &resp).await;
            (StatusCode::OK, headers, Json(json!({"status":"ok","id": resp.account_id})))
        }
        Err(e) => {
            let app: AppError = e.into();
            if app.http_status() >= 500 { error!("login error: {app}"); }
            let (status, body) = err_json(&app);
            (status, HeaderMap::new(), body)
        }
    }
}

async fn register(State(state): State<AppState>, Json(payload): Json<RegisterPayload>) -> impl IntoResponse {
    let req = RegisterRequest {
        username: payload.username,
        password: payload.password,
        is_teacher: payload.is_teacher,
    };
    match state.provider().register(&req) {
        Ok(resp) => {
            let headers = establish_session(&state, &resp).await;
            (StatusCode::OK, headers, Json(json!({"status":"ok","id": resp.account_id})))
        }
        Err(e) => {
            let app: AppError = e.into();
            if app.http_status() >= 500 { error!("register error: {app}"); }
            let (status, body) = err_json(&app);
            (status, HeaderMap::new(), body)
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    // Require CSRF token
    if !validate_csrf(&state, &headers).await {
        let (status, body) = err_json(&AppError::csrf("csrf", "invalid csrf"));
        return (status, HeaderMap::new(), body);
    }
    if let Some(token) = get_token_from_headers(&headers) {
        state.sessions.logout(&token);
        let mut cmap = state.csrf_tokens.write().await;
        cmap.remove(&token);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"})))
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    // Must be logged in to fetch the CSRF token
    let user = match current_user(&state, &headers) {
        Ok(u) => u,
        Err(e) => return err_json(&e),
    };
    if user.principal().is_none() {
        return err_json(&AppError::auth("not_authenticated", "you are not logged in"));
    }
    let Some(token) = get_token_from_headers(&headers) else {
        return err_json(&AppError::auth("not_authenticated", "you are not logged in"));
    };
    let cmap = state.csrf_tokens.read().await;
    if let Some(csrf) = cmap.get(&token) {
        return (StatusCode::OK, Json(json!({"status":"ok","csrf": csrf})));
    }
    err_json(&AppError::internal("internal", "csrf not available"))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    match current_user(&state, &headers) {
        Ok(user) => (StatusCode::OK, Json(json!({"status":"ok","user": user}))),
        Err(e) => err_json(&e),
    }
}

async fn list_words(State(state): State<AppState>) -> impl IntoResponse {
    match dictionary::list_words(&state.db_root) {
        Ok(words) => (StatusCode::OK, Json(json!({"status":"ok","words": words}))),
        Err(e) => err_json(&AppError::from(e)),
    }
}

async fn get_word(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match dictionary::find_word(&state.db_root, id) {
        Ok(Some(word)) => {
            // include the word's category, as the original page did
            let category = dictionary::find_category(&state.db_root, word.category_id).ok().flatten();
            (StatusCode::OK, Json(json!({"status":"ok","word": word, "category": category})))
        }
        Ok(None) => err_json(&AppError::not_found("not_found", "no word with that id")),
        Err(e) => err_json(&AppError::from(e)),
    }
}

async fn list_categories(State(state): State<AppState>) -> impl IntoResponse {
    match dictionary::list_categories(&state.db_root) {
        Ok(categories) => (StatusCode::OK, Json(json!({"status":"ok","categories": categories}))),
        Err(e) => err_json(&AppError::from(e)),
    }
}

async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match dictionary::find_category(&state.db_root, id) {
        Ok(Some(category)) => {
            match dictionary::words_in_category(&state.db_root, id) {
                Ok(words) => (StatusCode::OK, Json(json!({"status":"ok","category": category, "words": words}))),
                Err(e) => err_json(&AppError::from(e)),
            }
        }
        Ok(None) => err_json(&AppError::not_found("not_found", "no category with that id")),
        Err(e) => err_json(&AppError::from(e)),
    }
}

/// Teacher-gated, CSRF-protected preamble shared by the write endpoints.
/// Returns the acting principal or the rejection to send back.
async fn require_teacher(state: &AppState, headers: &HeaderMap) -> Result<identity::Principal, AppError> {
    let user = current_user(state, headers)?;
    let principal = identity::require_role(&user, Role::Teacher)?.clone();
    if !validate_csrf(state, headers).await {
        return Err(AppError::csrf("csrf", "invalid csrf"));
    }
    Ok(principal)
}

async fn create_word(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<NewWord>) -> impl IntoResponse {
    let principal = match require_teacher(&state, &headers).await {
        Ok(p) => p,
        Err(e) => return err_json(&e),
    };
    let created_at = chrono::Utc::now().timestamp_millis();
    match dictionary::insert_word(&state.db_root, &payload, principal.user_id, created_at) {
        Ok(id) => (StatusCode::OK, Json(json!({"status":"ok","id": id}))),
        Err(e) => err_json(&AppError::user("bad_input".into(), e.to_string())),
    }
}

async fn delete_word(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<i64>) -> impl IntoResponse {
    if let Err(e) = require_teacher(&state, &headers).await {
        return err_json(&e);
    }
    match dictionary::delete_word(&state.db_root, id) {
        Ok(true) => (StatusCode::OK, Json(json!({"status":"ok"}))),
        Ok(false) => err_json(&AppError::not_found("not_found", "no word with that id")),
        Err(e) => err_json(&AppError::from(e)),
    }
}

async fn create_category(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<CategoryPayload>) -> impl IntoResponse {
    if let Err(e) = require_teacher(&state, &headers).await {
        return err_json(&e);
    }
    match dictionary::insert_category(&state.db_root, &payload.english_name) {
        Ok(id) => (StatusCode::OK, Json(json!({"status":"ok","id": id}))),
        Err(e) => err_json(&AppError::conflict("category_exists".into(), e.to_string())),
    }
}
