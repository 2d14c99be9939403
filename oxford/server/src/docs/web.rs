use askama::Template;
use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::services::ServeDir;

use super::{Document, DocumentLibrary, group_by_role};
use crate::web::WebError;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Debug)]
struct RoleGroup {
    role: String,
    documents: Vec<Document>,
}

#[derive(Template)]
#[template(path = "documentation.html")]
struct DocumentationTemplate {
    query: String,
    groups: Vec<RoleGroup>,
}

#[derive(Template)]
#[template(path = "documentation/groups.html")]
struct DocumentGroupsTemplate {
    query: String,
    groups: Vec<RoleGroup>,
}

/// Creates the library page, its live search and the document files.
pub fn create_documentation_router(library: DocumentLibrary) -> Router<()> {
    let files = ServeDir::new(library.dir());
    Router::new()
        .route("/documentation", get(documentation_handler))
        .route("/documentation/search", get(search_handler))
        .nest_service("/docs", files)
        .with_state(Arc::new(library))
}

/// Groups matching `query`. A manifest that cannot be read shows as an
/// empty library.
async fn matching_groups(library: &DocumentLibrary, query: &str) -> Vec<RoleGroup> {
    let documents = library.load().await.unwrap_or_else(|error| {
        tracing::warn!(%error, "Showing an empty document library");
        Vec::new()
    });
    group_by_role(&documents, query.trim())
        .into_iter()
        .map(|(role, documents)| RoleGroup { role, documents })
        .collect()
}

#[tracing::instrument(skip(library))]
async fn documentation_handler(
    State(library): State<Arc<DocumentLibrary>>,
    Query(search): Query<SearchQuery>,
) -> Result<Html<String>, WebError> {
    let template = DocumentationTemplate {
        groups: matching_groups(&library, &search.q).await,
        query: search.q,
    };
    template.render().map(Html).map_err(WebError::from)
}

/// Handler for the search box, returning only the grouped list.
#[tracing::instrument(skip(library))]
async fn search_handler(
    State(library): State<Arc<DocumentLibrary>>,
    Query(search): Query<SearchQuery>,
) -> Result<Html<String>, WebError> {
    let template = DocumentGroupsTemplate {
        groups: matching_groups(&library, &search.q).await,
        query: search.q,
    };
    template.render().map(Html).map_err(WebError::from)
}
