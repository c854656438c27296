//! HTTP middleware for vicdan
//!
//! This module provides:
//! - The access gate deciding which page routes need a signed-in administrator
//! - The `AuthenticatedAdmin` extractor used by API handlers
//! - Request/response logging

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{extract_bearer, TokenService, Verification};
use crate::error::{ApiError, AuthError};
use crate::models::AdminIdentity;
use crate::otel::Metrics;
use crate::profiles::SLUG_PREFIX;

/// Cookie carrying the identity token for page requests
pub const SESSION_COOKIE: &str = "vicdan_token";

/// Where anonymous visitors of protected pages are sent
pub const LOGIN_PATH: &str = "/login";

/// Page prefixes open to anonymous visitors
const PUBLIC_PAGE_PREFIXES: &[&str] = &["/login", "/register-admin"];

/// Infrastructure prefixes the gate never redirects
///
/// `/api` handlers answer 401 themselves instead of redirecting.
const UNGATED_PREFIXES: &[&str] = &["/health", "/assets", "/api"];

/// How the gate treats a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAccess {
    /// Reachable without a token
    Public,
    /// Requires a valid token, otherwise redirect to the login page
    Protected,
}

/// Classify a request path
///
/// Prefixes match whole path segments: `/login` and `/login/reset` are
/// public, `/loginx` is not. Paths starting with the slug marker are
/// public profile pages.
pub fn classify_path(path: &str) -> PathAccess {
    if path == "/" {
        return PathAccess::Public;
    }

    let matches_segment = |prefix: &&str| {
        path == *prefix
            || path
                .strip_prefix(*prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    };

    if PUBLIC_PAGE_PREFIXES.iter().any(matches_segment)
        || UNGATED_PREFIXES.iter().any(matches_segment)
    {
        return PathAccess::Public;
    }

    if path
        .strip_prefix('/')
        .is_some_and(|rest| rest.starts_with(SLUG_PREFIX))
    {
        return PathAccess::Public;
    }

    PathAccess::Protected
}

/// Identity of the administrator making the request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedAdmin(pub AdminIdentity);

/// Token from the Authorization header, else from the session cookie
pub fn request_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| cookie_value(headers, SESSION_COOKIE))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer)
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Access gate middleware
///
/// Public paths pass untouched. Protected paths need a valid token in the
/// Authorization header or the session cookie; the decoded identity is
/// added to the request extensions. Anything else is redirected to the
/// login page. The gate never touches the database.
pub async fn access_gate(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Response {
    if classify_path(request.uri().path()) == PathAccess::Public {
        return next.run(request).await;
    }

    let verification = request_token(request.headers())
        .map(|token| tokens.verify(token))
        .unwrap_or(Verification::Invalid);

    match verification {
        Verification::Valid(identity) => {
            request
                .extensions_mut()
                .insert(AuthenticatedAdmin(identity));
            next.run(request).await
        }
        Verification::Invalid => {
            tracing::debug!(path = %request.uri().path(), "Redirecting anonymous request to login");
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedAdmin
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(admin) = parts.extensions.get::<AuthenticatedAdmin>() {
            return Ok(admin.clone());
        }

        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingAuth)?;
        let tokens = Arc::<TokenService>::from_ref(state);

        match tokens.verify(token) {
            Verification::Valid(identity) => Ok(AuthenticatedAdmin(identity)),
            Verification::Invalid => Err(AuthError::InvalidToken.into()),
        }
    }
}

/// Logging middleware function
///
/// Logs method, path, status and response time, and records the request
/// duration metric.
pub async fn logging_middleware(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    metrics.record_request_duration(method.as_str(), status.as_u16(), elapsed.as_secs_f64());

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Extension, Router};
    use axum_test::TestServer;

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new("gate-secret").unwrap())
    }

    fn identity() -> AdminIdentity {
        AdminIdentity {
            id: 1,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    async fn whoami(Extension(AuthenticatedAdmin(identity)): Extension<AuthenticatedAdmin>) -> String {
        identity.email
    }

    async fn ok_handler() -> &'static str {
        "OK"
    }

    fn gated_app(tokens: Arc<TokenService>) -> Router {
        Router::new()
            .route("/", get(ok_handler))
            .route("/login", get(ok_handler))
            .route("/vdabcdefghij", get(ok_handler))
            .route("/dashboard", get(whoami))
            .route("/loginx", get(ok_handler))
            .layer(middleware::from_fn_with_state(tokens, access_gate))
    }

    // Test 1: path classification
    #[test]
    fn test_classify_path() {
        assert_eq!(classify_path("/"), PathAccess::Public);
        assert_eq!(classify_path("/login"), PathAccess::Public);
        assert_eq!(classify_path("/login/reset"), PathAccess::Public);
        assert_eq!(classify_path("/register-admin"), PathAccess::Public);
        assert_eq!(classify_path("/vdabcdefghij"), PathAccess::Public);
        assert_eq!(classify_path("/health"), PathAccess::Public);
        assert_eq!(classify_path("/assets/qr/1.svg"), PathAccess::Public);
        assert_eq!(classify_path("/api/profiles"), PathAccess::Public);

        assert_eq!(classify_path("/loginx"), PathAccess::Protected);
        assert_eq!(classify_path("/dashboard"), PathAccess::Protected);
        assert_eq!(classify_path("/dashboard/profiles/1"), PathAccess::Protected);
        assert_eq!(classify_path("/apix"), PathAccess::Protected);
        assert_eq!(classify_path("/healthz"), PathAccess::Protected);
    }

    // Test 2: bearer and cookie extraction
    #[test]
    fn test_request_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_token(&headers), None);

        headers.insert(header::COOKIE, "theme=dark; vicdan_token=abc.def".parse::<axum::http::HeaderValue>().unwrap());
        assert_eq!(request_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, "Bearer xyz".parse::<axum::http::HeaderValue>().unwrap());
        assert_eq!(request_token(&headers), Some("xyz"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "vicdan_token=".parse::<axum::http::HeaderValue>().unwrap());
        assert_eq!(request_token(&headers), None);
    }

    // Test 3: public pages pass without a token
    #[tokio::test]
    async fn test_gate_allows_public_paths() {
        let server = TestServer::new(gated_app(tokens())).unwrap();

        server.get("/").await.assert_status_ok();
        server.get("/login").await.assert_status_ok();
        server.get("/vdabcdefghij").await.assert_status_ok();
    }

    // Test 4: protected pages redirect anonymous visitors
    #[tokio::test]
    async fn test_gate_redirects_anonymous() {
        let server = TestServer::new(gated_app(tokens())).unwrap();

        for path in ["/dashboard", "/loginx"] {
            let response = server.get(path).await;
            response.assert_status(StatusCode::SEE_OTHER);
            assert_eq!(response.header("location"), "/login");
        }
    }

    // Test 5: invalid token redirects too
    #[tokio::test]
    async fn test_gate_redirects_invalid_token() {
        let server = TestServer::new(gated_app(tokens())).unwrap();

        let response = server
            .get("/dashboard")
            .add_header(
                header::AUTHORIZATION,
                "Bearer not.a.token".parse::<axum::http::HeaderValue>().unwrap(),
            )
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
    }

    // Test 6: valid bearer token passes with identity in extensions
    #[tokio::test]
    async fn test_gate_accepts_bearer() {
        let tokens = tokens();
        let token = tokens.issue(&identity()).unwrap();
        let server = TestServer::new(gated_app(tokens)).unwrap();

        let response = server
            .get("/dashboard")
            .add_header(
                header::AUTHORIZATION,
                format!("Bearer {}", token).parse::<axum::http::HeaderValue>().unwrap(),
            )
            .await;
        response.assert_status_ok();
        response.assert_text("alice@example.com");
    }

    // Test 7: valid session cookie passes
    #[tokio::test]
    async fn test_gate_accepts_cookie() {
        let tokens = tokens();
        let token = tokens.issue(&identity()).unwrap();
        let server = TestServer::new(gated_app(tokens)).unwrap();

        let response = server
            .get("/dashboard")
            .add_header(
                header::COOKIE,
                format!("{}={}", SESSION_COOKIE, token).parse::<axum::http::HeaderValue>().unwrap(),
            )
            .await;
        response.assert_status_ok();
    }

    // Test 8: extractor rejects missing and invalid bearer tokens with 401
    #[tokio::test]
    async fn test_authenticated_admin_extractor() {
        async fn me(AuthenticatedAdmin(identity): AuthenticatedAdmin) -> String {
            identity.name
        }

        let tokens = tokens();
        let token = tokens.issue(&identity()).unwrap();
        let app = Router::new().route("/api/me", get(me)).with_state(tokens);
        let server = TestServer::new(app).unwrap();

        server
            .get("/api/me")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .get("/api/me")
            .add_header(header::AUTHORIZATION, "Bearer garbage".parse::<axum::http::HeaderValue>().unwrap())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .get("/api/me")
            .add_header(
                header::AUTHORIZATION,
                format!("Bearer {}", token).parse::<axum::http::HeaderValue>().unwrap(),
            )
            .await;
        response.assert_status_ok();
        response.assert_text("Alice");
    }

    // Test 9: logging middleware passes responses through
    #[tokio::test]
    async fn test_logging_middleware() {
        let metrics = Arc::new(Metrics::noop());
        let app = Router::new()
            .route("/", get(ok_handler))
            .layer(middleware::from_fn_with_state(metrics, logging_middleware));
        let server = TestServer::new(app).unwrap();

        let response = server.get("/").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }
}
