use askama::Template;
use axum::Router;
use axum::extract::{Extension, Form, MatchedPath, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use jsonwebtoken::encode;
use std::sync::Arc;
use tower_http::trace::MakeSpan;
use tracing::Span;
use uuid::Uuid;

use crate::routes::{DASHBOARD_PATH, LOGIN_PATH, htmx_redirect};
use crate::session::{Session, SessionStore};
use crate::web::NoticeTemplate;

pub mod provider;

use provider::IdentityProvider;

/// Name of the cookie carrying the signed session token.
pub const AUTH_COOKIE: &str = "auth_token";

/// The signed-in visitor of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session: Session,
}

impl CurrentUser {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn email(&self) -> &str {
        &self.session.user.email
    }
}

/// Authentication state: the session registry, the identity provider and
/// the cookie signing secret.
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub jwt_secret: String,
}

impl AuthState {
    pub fn new(
        sessions: Arc<SessionStore>,
        identity: Arc<dyn IdentityProvider>,
        jwt_secret: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            identity,
            jwt_secret: jwt_secret.into(),
        }
    }
}

/// Creates the router for signing in and out.
pub fn create_login_router(state: Arc<AuthState>) -> Router<()> {
    Router::new()
        .route("/", axum::routing::get(login_page_handler))
        .route(
            LOGIN_PATH,
            axum::routing::get(login_page_handler).post(login_handler),
        )
        .route("/logout", axum::routing::post(logout_handler))
        .with_state(state)
}

/// Resolves the `auth_token` cookie to a live session and sets the
/// [`CurrentUser`] extension. Does not redirect.
///
/// A valid token whose session is no longer in the store counts as signed
/// out.
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token_cookie) = jar.get(AUTH_COOKIE) {
        if let Ok(claims) = decode_jwt(token_cookie.value(), &state.jwt_secret) {
            if let Ok(session_id) = Uuid::parse_str(&claims.sid) {
                if let Some(session) = state.sessions.get_session(&session_id).await {
                    request.extensions_mut().insert(CurrentUser::new(session));
                }
            }
        }
    }

    next.run(request).await
}

#[derive(serde::Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Claims {
    pub exp: usize,
    pub iat: usize,
    /// Session id in the store.
    pub sid: String,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    #[error("JWT operation failed")]
    JwtError,
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = %self, "Authentication request failed");
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "<h1>Internal Server Error</h1><p>{}</p>",
                user_facing_error_message
            )),
        )
            .into_response()
    }
}

/// Signs in with the identity provider.
///
/// On success the session cookie is set and htmx navigates to the
/// dashboard. On failure the provider's message replaces `#login-message`.
#[tracing::instrument(skip(state, jar, payload), fields(email = %payload.email))]
pub async fn login_handler(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    Form(payload): Form<LoginRequest>,
) -> Result<(CookieJar, Response), AuthError> {
    let signed_in = state
        .sessions
        .sign_in(state.identity.as_ref(), &payload.email, &payload.password)
        .await;

    match signed_in {
        Ok(session) => {
            let jwt_token =
                encode_jwt(&session, &state.jwt_secret).map_err(|_| AuthError::JwtError)?;
            let lifetime = (session.expires_at - Utc::now()).num_seconds().max(0);

            let cookie = Cookie::build((AUTH_COOKIE, jwt_token))
                .http_only(true)
                .secure(false) // Set to true in production with HTTPS
                .same_site(SameSite::Lax)
                .max_age(time::Duration::seconds(lifetime))
                .path("/")
                .build();

            Ok((jar.add(cookie), htmx_redirect(DASHBOARD_PATH)))
        }
        Err(error) => {
            tracing::info!(%error, "Sign-in rejected");
            let error_message = LoginErrorMessageTemplate {
                message: error.message,
            }
            .render()
            .map_err(AuthError::from)?;

            let mut headers = HeaderMap::new();
            headers.insert(
                HeaderName::from_static("hx-retarget"),
                HeaderValue::from_static("#login-message"),
            );
            headers.insert(
                HeaderName::from_static("hx-reswap"),
                HeaderValue::from_static("outerHTML"),
            );

            let mut response = Html(error_message).into_response();
            response.headers_mut().extend(headers);
            Ok((jar, response))
        }
    }
}

/// Signs out with the identity provider and clears the cookie.
///
/// When the provider refuses, the session is kept and the failure is shown
/// as a notice.
#[tracing::instrument(skip(state, jar, current_user))]
pub async fn logout_handler(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    current_user: Option<Extension<CurrentUser>>,
) -> Result<(CookieJar, Response), AuthError> {
    let Some(Extension(user)) = current_user else {
        return Ok((jar, htmx_redirect(LOGIN_PATH)));
    };

    match state
        .sessions
        .sign_out(state.identity.as_ref(), &user.session.id)
        .await
    {
        Ok(()) => {
            let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/"));
            Ok((jar, htmx_redirect(LOGIN_PATH)))
        }
        Err(error) => {
            let notice = NoticeTemplate::error(format!("Sign out failed: {}", error.message))
                .render()
                .map_err(AuthError::from)?;
            let mut response = Html(notice).into_response();
            response.headers_mut().insert(
                HeaderName::from_static("hx-retarget"),
                HeaderValue::from_static("#notice"),
            );
            response.headers_mut().insert(
                HeaderName::from_static("hx-reswap"),
                HeaderValue::from_static("innerHTML"),
            );
            Ok((jar, response))
        }
    }
}

pub fn encode_jwt(session: &Session, jwt_secret: &str) -> anyhow::Result<String> {
    let claims = Claims {
        exp: session.expires_at.timestamp().max(0) as usize,
        iat: Utc::now().timestamp().max(0) as usize,
        sid: session.id.to_string(),
        email: session.user.email.clone(),
    };
    let jwt = encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(jwt)
}

pub fn decode_jwt(token: &str, jwt_secret: &str) -> anyhow::Result<Claims> {
    let token_data = jsonwebtoken::decode(
        token,
        &jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[derive(Template)]
#[template(path = "login/login_error_message.html")]
pub struct LoginErrorMessageTemplate {
    pub message: String,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate;

/// Handles GET requests to display the login page.
#[tracing::instrument]
pub async fn login_page_handler() -> Result<Html<String>, AuthError> {
    LoginTemplate.render().map(Html).map_err(AuthError::from)
}

/// Request span that leaves out everything but the route for sign-in and
/// sign-out requests.
#[derive(Clone, Debug, Default)]
pub struct FilteredMakeSpan;

impl<B> MakeSpan<B> for FilteredMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let uri = request.uri();
        let method = request.method();
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        if uri.path() == LOGIN_PATH || uri.path() == "/logout" {
            tracing::info_span!(
                "request",
                method = %method,
                path = %uri.path(),
                matched_path,
                sensitive_route = true,
            )
        } else {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
                sensitive_route = false,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::{MockIdentityProvider, ProviderError, ProviderSession};
    use crate::routes::route_guard_middleware;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::{from_fn, from_fn_with_state};
    use tower::ServiceExt;

    fn provider_session() -> ProviderSession {
        ProviderSession {
            user_id: "u-1".to_string(),
            email: "president@oxfordhouse.org".to_string(),
            access_token: "token-1".to_string(),
            expires_in: 3600,
        }
    }

    fn app(state: Arc<AuthState>) -> Router {
        Router::new()
            .route(
                "/protected",
                axum::routing::get(|| async { "Protected content" }),
            )
            .merge(create_login_router(state.clone()))
            .layer(from_fn(route_guard_middleware))
            .layer(from_fn_with_state(state, auth_user_middleware))
    }

    #[tokio::test]
    async fn auth_middlewares_work_together() {
        let sessions = Arc::new(SessionStore::new());
        let mut identity = MockIdentityProvider::new();
        identity.expect_sign_out().times(1).returning(|_| Ok(()));
        let state = Arc::new(AuthState::new(sessions.clone(), Arc::new(identity), "test_secret"));
        let app = app(state.clone());

        // Unauthenticated request should redirect to login
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get("location").unwrap(), "/login");

        // A live session gets through
        let session = Session::from_provider(provider_session(), Utc::now());
        sessions.insert(session.clone()).await;
        let jwt_token = encode_jwt(&session, "test_secret").unwrap();
        let request = || {
            Request::builder()
                .uri("/protected")
                .header("cookie", format!("auth_token={}", jwt_token))
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, "Protected content");

        // The same cookie is worthless once the session is signed out
        sessions
            .sign_out(state.identity.as_ref(), &session.id)
            .await
            .unwrap();
        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn failed_login_shows_provider_message() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_sign_in_with_password()
            .times(1)
            .returning(|_, _| Err(ProviderError::new("Email not confirmed")));
        let state = Arc::new(AuthState::new(
            Arc::new(SessionStore::new()),
            Arc::new(identity),
            "test_secret",
        ));

        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("email=a%40b.org&password=pw"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("hx-retarget").unwrap(), "#login-message");
        assert!(response.headers().get("set-cookie").is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(std::str::from_utf8(&body).unwrap().contains("Email not confirmed"));
    }

    #[tokio::test]
    async fn successful_login_sets_cookie_and_goes_to_dashboard() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_sign_in_with_password()
            .times(1)
            .returning(|_, _| Ok(provider_session()));
        let sessions = Arc::new(SessionStore::new());
        let state = Arc::new(AuthState::new(sessions.clone(), Arc::new(identity), "test_secret"));

        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("email=president%40oxfordhouse.org&password=pw"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get("hx-redirect").unwrap(), "/dashboard");
        let cookie = response
            .headers()
            .get("set-cookie")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("auth_token="));
        assert!(cookie.contains("HttpOnly"));

        let token = cookie
            .trim_start_matches("auth_token=")
            .split(';')
            .next()
            .unwrap();
        let claims = decode_jwt(token, "test_secret").unwrap();
        let session_id = Uuid::parse_str(&claims.sid).unwrap();
        assert!(sessions.get_session(&session_id).await.is_some());
    }

    #[tokio::test]
    async fn refused_sign_out_keeps_the_session() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_sign_out()
            .times(1)
            .returning(|_| Err(ProviderError::new("network unreachable")));
        let sessions = Arc::new(SessionStore::new());
        let session = Session::from_provider(provider_session(), Utc::now());
        sessions.insert(session.clone()).await;
        let state = Arc::new(AuthState::new(sessions.clone(), Arc::new(identity), "test_secret"));
        let jwt_token = encode_jwt(&session, "test_secret").unwrap();

        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logout")
                    .header("cookie", format!("auth_token={}", jwt_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get("hx-retarget").unwrap(), "#notice");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(
            std::str::from_utf8(&body)
                .unwrap()
                .contains("Sign out failed: network unreachable")
        );
        assert!(sessions.get_session(&session.id).await.is_some());
    }
}
