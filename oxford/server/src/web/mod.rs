use askama::Template;
use axum::Router;
use axum::extract::Extension;
use axum::http::{HeaderName, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Html;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::auth::provider::{IdentityProvider, StaticIdentity, SupabaseAuth};
use crate::auth::{AuthState, CurrentUser, FilteredMakeSpan, auth_user_middleware, create_login_router};
use crate::config::{Backend, Config};
use crate::docs::DocumentLibrary;
use crate::docs::web::create_documentation_router;
use crate::page::Notice;
use crate::realtime::supabase::SupabaseRealtime;
use crate::realtime::{ChangeFeed, ChangeSource};
use crate::remote::{MemoryTables, PostgrestTables, TableSource};
use crate::resource::catalog;
use crate::resource::web::{ResourceState, create_resource_router};
use crate::routes::route_guard_middleware;
use crate::session::SessionStore;

pub mod middleware;

use middleware::NoStoreLayer;

/// Everything the portal shares between requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub tables: Arc<dyn TableSource>,
    pub changes: ChangeSource,
    pub documents: DocumentLibrary,
}

impl AppState {
    /// Wires up the configured storage backend.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let (identity, tables, changes): (Arc<dyn IdentityProvider>, Arc<dyn TableSource>, _) =
            match config.backend()? {
                Backend::Supabase { url, anon_key } => {
                    let client = reqwest::Client::new();
                    tracing::info!(%url, "Using Supabase storage");
                    (
                        Arc::new(SupabaseAuth::new(client.clone(), &url, &anon_key)),
                        Arc::new(PostgrestTables::new(client, &url, &anon_key)),
                        ChangeSource::Supabase(Arc::new(SupabaseRealtime::new(&url, &anon_key))),
                    )
                }
                Backend::Memory {
                    admin_email,
                    admin_password,
                } => {
                    tracing::warn!("Using in-memory storage; data is lost on restart");
                    (
                        Arc::new(StaticIdentity::new(admin_email, admin_password)),
                        Arc::new(MemoryTables::new()),
                        ChangeSource::Local(Arc::new(ChangeFeed::new())),
                    )
                }
            };

        Ok(Self {
            documents: DocumentLibrary::new(config.docs_dir.clone()),
            config: Arc::new(config),
            sessions: Arc::new(SessionStore::new()),
            identity,
            tables,
            changes,
        })
    }
}

/// Custom error type for web handler operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Represents an error during template rendering.
    /// The specific `askama::Error` is captured as the source of this error.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
}

impl axum::response::IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = %self, "Request failed");
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "<h1>Internal Server Error</h1><p>{}</p>",
                user_facing_error_message
            )),
        )
            .into_response()
    }
}

/// Builds the whole portal: sign-in, dashboard, officer pages and the
/// documentation library, behind the route guard.
pub fn build_router(state: AppState) -> Router {
    let auth_state = Arc::new(AuthState::new(
        state.sessions.clone(),
        state.identity.clone(),
        state.config.jwt_secret.clone(),
    ));

    let mut app = Router::new()
        .route("/health", axum::routing::get(health_check_handler))
        .route("/dashboard", axum::routing::get(dashboard_handler))
        .merge(create_login_router(auth_state.clone()))
        .merge(create_documentation_router(state.documents.clone()));

    for &resource in catalog::ALL {
        let resource_state = Arc::new(ResourceState {
            resource,
            tables: state.tables.clone(),
            changes: state.changes.clone(),
            sessions: state.sessions.clone(),
            house_id: state.config.house_id.clone(),
        });
        app = app.merge(create_resource_router(resource_state));
    }

    // Layers run bottom to top: resolve the session, then guard the route.
    app.layer(from_fn(route_guard_middleware))
        .layer(from_fn_with_state(auth_state, auth_user_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveRequestHeadersLayer::new([
                    axum::http::header::COOKIE,
                    axum::http::header::AUTHORIZATION,
                ]))
                .layer(TraceLayer::new_for_http().make_span_with(FilteredMakeSpan))
                .layer(CorsLayer::new().expose_headers([
                    HeaderName::from_static("hx-retarget"),
                    HeaderName::from_static("hx-reswap"),
                    HeaderName::from_static("hx-redirect"),
                ]))
                .layer(NoStoreLayer::new()),
        )
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

#[tracing::instrument(skip(current_user))]
pub async fn dashboard_handler(
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Html<String>, WebError> {
    let template = DashboardTemplate {
        email: current_user.email().to_string(),
    };
    template.render().map(Html).map_err(WebError::from)
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    email: String,
}

/// Toast fragment swapped into `#notice`.
#[derive(Template)]
#[template(path = "notice.html")]
pub struct NoticeTemplate {
    pub kind: &'static str,
    pub message: String,
}

impl NoticeTemplate {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: "success",
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: "error",
            message: message.into(),
        }
    }
}

impl From<&Notice> for NoticeTemplate {
    fn from(notice: &Notice) -> Self {
        match notice {
            Notice::Success(message) => Self::success(message.clone()),
            Notice::Error(message) => Self::error(message.clone()),
        }
    }
}
