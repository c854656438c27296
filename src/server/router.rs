//! HTTP router for vicdan
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Administrator registration and login
//! - Profile management for signed-in administrators
//! - Public profile lookups and pages
//! - Stored assets (QR codes)

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, FromRef, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;

use super::middleware::{access_gate, logging_middleware, AuthenticatedAdmin, SESSION_COOKIE};
use super::pages;
use crate::auth::{token::TOKEN_LIFETIME_SECS, AuthManager, LoginContext, TokenService};
use crate::config::PublicConfig;
use crate::database::Database;
use crate::error::{ApiError, AuthError, ProfileError};
use crate::models::{
    AdminIdentity, CreateProfileRequest, LoginRequest, LoginResponse, Profile, PublicProfile,
    PublishResponse, RegisterRequest, UpdateProfileRequest,
};
use crate::otel::Metrics;
use crate::profiles::ProfileService;

/// Shared application state
pub struct AppState<D: Database> {
    /// Authentication manager
    pub auth_manager: Arc<AuthManager<D>>,

    /// Profile service
    pub profile_service: Arc<ProfileService<D>>,

    /// Token service shared with the access gate
    pub token_service: Arc<TokenService>,

    /// Public lookup settings
    pub public: Arc<PublicConfig>,

    /// Application metrics
    pub metrics: Arc<Metrics>,

    /// Directory served under `/assets`, if any
    pub assets_dir: Option<PathBuf>,
}

impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            auth_manager: Arc::clone(&self.auth_manager),
            profile_service: Arc::clone(&self.profile_service),
            token_service: Arc::clone(&self.token_service),
            public: Arc::clone(&self.public),
            metrics: Arc::clone(&self.metrics),
            assets_dir: self.assets_dir.clone(),
        }
    }
}

impl<D: Database> FromRef<AppState<D>> for Arc<TokenService> {
    fn from_ref(state: &AppState<D>) -> Self {
        Arc::clone(&state.token_service)
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the main application router
///
/// # Arguments
///
/// * `state` - Application state containing services and settings
///
/// # Returns
///
/// An axum Router configured with all endpoints
pub fn build_router<D: Database + 'static>(state: AppState<D>) -> Router {
    let api = Router::new()
        .route("/auth/register", post(register_handler::<D>))
        .route("/auth/login", post(login_handler::<D>))
        .route("/auth/me", get(me_handler))
        .route(
            "/profiles",
            get(list_profiles_handler::<D>).post(create_profile_handler::<D>),
        )
        .route(
            "/profiles/:id",
            get(get_profile_handler::<D>)
                .put(update_profile_handler::<D>)
                .delete(delete_profile_handler::<D>),
        )
        .route("/profiles/:id/publish", post(publish_profile_handler::<D>))
        .route("/public/:slug", get(public_profile_handler::<D>));

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/", get(home_page_handler))
        .route("/login", get(login_page_handler))
        .route("/register-admin", get(register_page_handler))
        .route("/dashboard", get(dashboard_page_handler))
        .route("/:slug", get(public_page_handler::<D>))
        .nest("/api", api);

    if let Some(dir) = &state.assets_dir {
        router = router.nest_service("/assets", ServeDir::new(dir));
    }

    router
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.token_service),
            access_gate,
        ))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.metrics),
            logging_middleware,
        ))
        .with_state(state)
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn register_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AdminIdentity>), ApiError> {
    let Json(request) = payload?;
    let admin = state.auth_manager.register(request).await?;
    Ok((StatusCode::CREATED, Json(admin)))
}

/// Login handler
///
/// Answers with the token in the body and sets it as the session cookie
/// used by the page routes.
async fn login_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    let context = LoginContext {
        ip_address: client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr)),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let result = state.auth_manager.login(request, context).await;

    state.metrics.record_login(match &result {
        Ok(_) => "success",
        Err(AuthError::RateLimited) => "rate_limited",
        Err(AuthError::InvalidCredentials) => "invalid_credentials",
        Err(AuthError::Validation(_)) => "invalid_request",
        Err(_) => "error",
    });

    let response: LoginResponse = result?;
    let cookie = session_cookie(&response.token)?;

    Ok(([(header::SET_COOKIE, cookie)], Json(response)).into_response())
}

async fn me_handler(AuthenticatedAdmin(identity): AuthenticatedAdmin) -> Json<AdminIdentity> {
    Json(identity)
}

async fn list_profiles_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
) -> Result<Json<Vec<Profile>>, ApiError> {
    Ok(Json(state.profile_service.list(admin.id).await?))
}

async fn create_profile_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    payload: Result<Json<CreateProfileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    let Json(request) = payload?;
    let profile = state.profile_service.create(admin.id, request).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn get_profile_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(id): Path<i64>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.profile_service.get(id, admin.id).await?))
}

async fn update_profile_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(
        state.profile_service.update(id, admin.id, request).await?,
    ))
}

async fn delete_profile_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.profile_service.delete(id, admin.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn publish_profile_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(id): Path<i64>,
) -> Result<Json<PublishResponse>, ApiError> {
    let published = state.profile_service.publish(id, admin.id).await?;
    state.metrics.record_published();
    Ok(Json(published))
}

/// Anonymous profile lookup by slug
async fn public_profile_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let profile = resolve_public(&state, &slug).await?;
    let cache_control = cache_control(&state.public)?;

    Ok(([(header::CACHE_CONTROL, cache_control)], Json(profile)).into_response())
}

async fn public_page_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path(slug): Path<String>,
) -> Response {
    match resolve_public(&state, &slug).await {
        Ok(profile) => match cache_control(&state.public) {
            Ok(cache_control) => (
                [(header::CACHE_CONTROL, cache_control)],
                Html(pages::profile_page(&profile)),
            )
                .into_response(),
            Err(e) => e.into_response(),
        },
        Err(ApiError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Html(pages::not_found_page())).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn home_page_handler() -> Html<String> {
    Html(pages::home_page())
}

async fn login_page_handler() -> Html<String> {
    Html(pages::shell("login", "VicDan - Sign in"))
}

async fn register_page_handler() -> Html<String> {
    Html(pages::shell("register-admin", "VicDan - Create account"))
}

async fn dashboard_page_handler(AuthenticatedAdmin(admin): AuthenticatedAdmin) -> Html<String> {
    Html(pages::dashboard_page(&admin))
}

async fn resolve_public<D: Database + 'static>(
    state: &AppState<D>,
    slug: &str,
) -> Result<PublicProfile, ApiError> {
    match state.profile_service.resolve_by_slug(slug).await {
        Ok(profile) => {
            state.metrics.record_public_lookup("found");
            Ok(profile.public_view())
        }
        Err(ProfileError::NotFound) => {
            state.metrics.record_public_lookup("not_found");
            Err(ProfileError::NotFound.into())
        }
        Err(e) => {
            state.metrics.record_public_lookup("error");
            Err(e.into())
        }
    }
}

fn cache_control(public: &PublicConfig) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&public.cache_control())
        .map_err(|e| ApiError::Internal(format!("invalid cache header: {}", e)))
}

fn session_cookie(token: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, TOKEN_LIFETIME_SECS
    ))
    .map_err(|e| ApiError::Internal(format!("invalid session cookie: {}", e)))
}

/// Client address, preferring the first `X-Forwarded-For` hop
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
