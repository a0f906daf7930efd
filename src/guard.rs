//! Request-time guard for the `/admin` pages. Every decision is made fresh from the session
//! cookie; lookup failures deny.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info, warn};

use crate::auth::{clear_session_cookie, session_token};
use crate::backend::Backend;
use crate::error::AuthError;
use crate::model::Role;

pub const LOGIN_PATH: &str = "/admin/login";
pub const DASHBOARD_PATH: &str = "/admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
    /// Terminate the session, then redirect.
    SignOutAndRedirect(&'static str),
}

/// Whether the guard looks at this path at all.
pub fn is_guarded(path: &str) -> bool {
    path == DASHBOARD_PATH || path.starts_with("/admin/")
}

/// Decides what happens to a request for `path`, given the outcome of authorizing its session.
pub fn decide(path: &str, authorization: &Result<Role, AuthError>) -> GuardDecision {
    if !is_guarded(path) {
        return GuardDecision::Allow;
    }

    if path.trim_end_matches('/') == LOGIN_PATH {
        return match authorization {
            Ok(Role::Admin) => GuardDecision::Redirect(DASHBOARD_PATH),
            _ => GuardDecision::Allow,
        };
    }

    match authorization {
        Ok(Role::Admin) => GuardDecision::Allow,
        Err(AuthError::MissingSession) => GuardDecision::Redirect(LOGIN_PATH),
        Ok(Role::Other) | Err(_) => GuardDecision::SignOutAndRedirect(LOGIN_PATH),
    }
}

/// axum middleware applying `decide` to every request.
pub async fn admin_guard(
    State(backend): State<Backend>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !is_guarded(&path) {
        return next.run(request).await;
    }

    let token = session_token(request.headers());
    let authorization = backend.authorize(token.clone()).await;
    if let Err(AuthError::Backend(e)) = &authorization {
        warn!(%path, "Session lookup failed, denying: {e}");
    }

    match decide(&path, &authorization) {
        GuardDecision::Allow => {
            debug!(%path, "Guard allowed request");
            next.run(request).await
        }
        GuardDecision::Redirect(to) => {
            debug!(%path, to, "Guard redirected request");
            Redirect::to(to).into_response()
        }
        GuardDecision::SignOutAndRedirect(to) => {
            info!(%path, "Guard terminated an unauthorized session");
            if let Some(token) = token {
                if let Err(e) = backend.sign_out(token).await {
                    warn!("Error ending session: {e}");
                }
            }
            let mut response = Redirect::to(to).into_response();
            if let Ok(cookie) = HeaderValue::from_str(&clear_session_cookie()) {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            response
        }
    }
}

#[cfg(all(test, feature = "ssr"))]
mod tests {
    use super::*;
    use crate::error::BackendError;

    fn backend_failure() -> AuthError {
        AuthError::Backend(BackendError::Database(diesel::result::Error::NotFound))
    }

    #[test]
    fn test_unguarded_paths_pass_through() {
        for path in ["/", "/files/download", "/administrator", "/api/ListSubmissions"] {
            assert!(!is_guarded(path));
            assert_eq!(decide(path, &Err(AuthError::MissingSession)), GuardDecision::Allow);
        }
    }

    #[test]
    fn test_non_admin_is_sent_to_login() {
        let denied = [
            Err(AuthError::MissingSession),
            Err(AuthError::InvalidSession),
            Err(AuthError::NotAdmin),
            Ok(Role::Other),
            Err(backend_failure()),
        ];
        for path in ["/admin", "/admin/", "/admin/settings", "/admin/submissions/3"] {
            for authorization in &denied {
                let decision = decide(path, authorization);
                assert!(
                    matches!(
                        decision,
                        GuardDecision::Redirect(LOGIN_PATH)
                            | GuardDecision::SignOutAndRedirect(LOGIN_PATH)
                    ),
                    "{path} with {authorization:?} gave {decision:?}"
                );
            }
        }
    }

    #[test]
    fn test_missing_session_redirects_without_sign_out() {
        assert_eq!(
            decide("/admin", &Err(AuthError::MissingSession)),
            GuardDecision::Redirect(LOGIN_PATH)
        );
        assert_eq!(
            decide("/admin", &Err(AuthError::NotAdmin)),
            GuardDecision::SignOutAndRedirect(LOGIN_PATH)
        );
        assert_eq!(
            decide("/admin", &Err(backend_failure())),
            GuardDecision::SignOutAndRedirect(LOGIN_PATH)
        );
    }

    #[test]
    fn test_admin_on_login_goes_to_dashboard() {
        assert_eq!(
            decide(LOGIN_PATH, &Ok(Role::Admin)),
            GuardDecision::Redirect(DASHBOARD_PATH)
        );
        assert_eq!(
            decide("/admin/login/", &Ok(Role::Admin)),
            GuardDecision::Redirect(DASHBOARD_PATH)
        );
        assert_eq!(decide("/admin", &Ok(Role::Admin)), GuardDecision::Allow);
    }

    #[test]
    fn test_login_page_open_without_admin_session() {
        assert_eq!(
            decide(LOGIN_PATH, &Err(AuthError::MissingSession)),
            GuardDecision::Allow
        );
        assert_eq!(decide(LOGIN_PATH, &Ok(Role::Other)), GuardDecision::Allow);
        assert_eq!(
            decide(LOGIN_PATH, &Err(backend_failure())),
            GuardDecision::Allow
        );
    }
}

#[cfg(all(test, feature = "ssr"))]
mod middleware_tests {
    use super::*;
    use crate::auth;
    use crate::backend::testing::backend_in;
    use axum::{http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    fn router(backend: Backend) -> Router {
        Router::new()
            .route("/admin", get(|| async { "dashboard" }))
            .route("/admin/login", get(|| async { "login" }))
            .layer(from_fn_with_state(backend, admin_guard))
    }

    fn get_request(path: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = axum::http::Request::builder().uri(path);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("portal_session={token}"));
        }
        builder.body(Body::empty()).expect("request")
    }

    fn location(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    async fn admin_token(backend: &Backend) -> String {
        backend
            .run(|conn, _| {
                auth::provision_admin(conn, "admin@example.com", "secret")?;
                auth::sign_in(
                    conn,
                    "admin@example.com",
                    "secret",
                    Utc::now().naive_utc(),
                    Duration::hours(1),
                )
            })
            .await
            .expect("admin session")
    }

    #[tokio::test]
    async fn test_anonymous_dashboard_request_redirects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = router(backend_in(dir.path()));

        let response = app.oneshot(get_request("/admin", None)).await.expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some(LOGIN_PATH));
    }

    #[tokio::test]
    async fn test_unknown_session_is_cleared() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = router(backend_in(dir.path()));
        let stale = uuid::Uuid::new_v4().to_string();

        let response = app
            .oneshot(get_request("/admin", Some(&stale)))
            .await
            .expect("response");
        assert_eq!(location(&response), Some(LOGIN_PATH));
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("cookie cleared");
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_admin_session_passes_and_skips_login() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = backend_in(dir.path());
        let token = admin_token(&backend).await;
        let app = router(backend);

        let dashboard = app
            .clone()
            .oneshot(get_request("/admin", Some(&token)))
            .await
            .expect("response");
        assert_eq!(dashboard.status(), StatusCode::OK);

        let login = app
            .oneshot(get_request(LOGIN_PATH, Some(&token)))
            .await
            .expect("response");
        assert_eq!(location(&login), Some(DASHBOARD_PATH));
    }
}
