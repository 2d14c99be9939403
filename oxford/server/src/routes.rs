//! Which paths a visitor may reach, and where they are sent otherwise.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::auth::CurrentUser;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Reachable with or without a session.
    Public,
    /// Only for visitors without a session.
    GuestOnly,
    /// Only for signed-in visitors.
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect(&'static str),
}

pub fn access_for(path: &str) -> Access {
    match path {
        "/" | LOGIN_PATH => Access::GuestOnly,
        "/health" => Access::Public,
        _ => Access::Protected,
    }
}

pub fn guard(path: &str, authenticated: bool) -> Navigation {
    match (access_for(path), authenticated) {
        (Access::Protected, false) => Navigation::Redirect(LOGIN_PATH),
        (Access::GuestOnly, true) => Navigation::Redirect(DASHBOARD_PATH),
        _ => Navigation::Proceed,
    }
}

/// Redirects according to [`guard`].
///
/// Must run after `auth_user_middleware`, which resolves the session. htmx
/// requests get an `HX-Redirect` header so the whole page navigates instead
/// of the redirect target being swapped into a fragment.
pub async fn route_guard_middleware(request: Request, next: Next) -> Response {
    let authenticated = request.extensions().get::<CurrentUser>().is_some();
    let target = match guard(request.uri().path(), authenticated) {
        Navigation::Proceed => return next.run(request).await,
        Navigation::Redirect(target) => target,
    };

    tracing::debug!(path = %request.uri().path(), target, "Redirecting");
    if request.headers().contains_key("hx-request") {
        htmx_redirect(target)
    } else {
        Redirect::to(target).into_response()
    }
}

/// Tells htmx to navigate the whole page to `target`.
pub fn htmx_redirect(target: &'static str) -> Response {
    (
        StatusCode::OK,
        [(
            HeaderName::from_static("hx-redirect"),
            HeaderValue::from_static(target),
        )],
    )
        .into_response()
}
