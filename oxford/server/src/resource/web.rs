use askama::Template;
use axum::{
    Form, Router,
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post, put},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use super::ResourceConfig;
use super::events::page_events;
use crate::auth::CurrentUser;
use crate::form::{FieldKind, FormError, RecordForm};
use crate::page::{
    Confirmation, DeleteOutcome, ListPage, PageError, PageState, StatusView, SubmitOutcome,
    ToggleOutcome,
};
use crate::pdf::{minutes_filename, minutes_lines, render_text_pdf};
use crate::realtime::{ChangeSource, NotifyingTable};
use crate::remote::{RowId, TableSource, value_text};
use crate::session::SessionStore;
use crate::web::NoticeTemplate;

/// Submitted HTML form, field name to value.
type Submitted = HashMap<String, String>;

#[derive(Clone)]
pub struct ResourceState {
    pub resource: &'static ResourceConfig,
    pub tables: Arc<dyn TableSource>,
    pub changes: ChangeSource,
    pub sessions: Arc<SessionStore>,
    pub house_id: Option<String>,
}

impl ResourceState {
    /// A fresh page acting on behalf of the signed-in user. With a local
    /// change feed, writes are published on it.
    fn page(&self, user: &CurrentUser) -> ListPage {
        let mut table = self.tables.table(self.resource.table, &user.session);
        if let ChangeSource::Local(feed) = &self.changes {
            table = Arc::new(NotifyingTable::new(table, self.resource.table, feed.clone()));
        }
        ListPage::new(self.resource, table).for_house(self.house_id.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    show: StatusView,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    confirmed: bool,
    #[serde(default)]
    show: StatusView,
}

/// Creates the routes of one officer page under `/{slug}`.
pub fn create_resource_router(state: Arc<ResourceState>) -> Router<()> {
    let base = state.resource.path();
    let mut router = Router::new()
        .route(&base, get(page_handler).post(create_handler))
        .route(&format!("{base}/table"), get(table_handler))
        .route(&format!("{base}/new"), get(new_form_handler))
        .route(&format!("{base}/events"), get(events_handler))
        .route(
            &format!("{base}/{{id}}"),
            put(update_handler).delete(delete_handler),
        )
        .route(&format!("{base}/{{id}}/edit"), get(edit_form_handler));

    if state.resource.toggle.is_some() {
        router = router.route(&format!("{base}/{{id}}/toggle"), post(toggle_handler));
    }
    if state.resource.pdf_export {
        router = router
            .route(&format!("{base}/pdf"), post(draft_pdf_handler))
            .route(&format!("{base}/{{id}}/pdf"), get(saved_pdf_handler));
    }
    router.with_state(state)
}

/// Custom error type for officer page handlers.
#[derive(Debug, thiserror::Error)]
enum ResourceError {
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("{0}")]
    Remote(String),
}

impl axum::response::IntoResponse for ResourceError {
    fn into_response(self) -> axum::response::Response {
        let (status_code, user_facing_error_message) = match &self {
            // The store's own wording, as the list page shows it.
            ResourceError::Remote(message) => (StatusCode::BAD_GATEWAY, message.as_str()),
            ResourceError::Page(PageError::UnknownRow(_) | PageError::ToggleUnsupported) => (
                StatusCode::NOT_FOUND,
                "That record no longer exists. Reload the page and try again.",
            ),
            ResourceError::Page(PageError::ReadOnly) | ResourceError::Form(FormError::ReadOnly) => (
                StatusCode::CONFLICT,
                "These minutes are finalized and can no longer be changed.",
            ),
            ResourceError::Page(PageError::Busy) => (
                StatusCode::CONFLICT,
                "Another change is still in progress. Please try again.",
            ),
            _ => {
                tracing::error!(error = %self, "Officer page request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred while processing your request. Please try again later.",
                )
            }
        };

        let error_template = ErrorMessageTemplate::new(user_facing_error_message.to_string());
        let Ok(rendered) = error_template.render() else {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };

        let mut response = (status_code, Html(rendered)).into_response();
        response.headers_mut().extend(retarget("#notice"));
        response
    }
}

/// Fetches the rows a row action works on. A failed read is reported as
/// such instead of surfacing later as a missing row.
async fn load_rows(page: &mut ListPage) -> Result<(), ResourceError> {
    page.load().await;
    match page.state() {
        PageState::Error(message) => Err(ResourceError::Remote(message.clone())),
        _ => Ok(()),
    }
}

/// Headers that make htmx swap the response into `target` instead.
fn retarget(target: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("hx-retarget"),
        HeaderValue::from_static(target),
    );
    headers.insert(
        HeaderName::from_static("hx-reswap"),
        HeaderValue::from_static("innerHTML"),
    );
    headers
}

#[derive(Debug)]
struct HeaderLink {
    label: &'static str,
    href: &'static str,
}

#[derive(Debug)]
struct PageView {
    title: &'static str,
    subtitle: &'static str,
    noun: &'static str,
    slug: &'static str,
    header_link: Option<HeaderLink>,
}

#[derive(Debug)]
struct RowView {
    id: String,
    cells: Vec<String>,
    done: bool,
    locked: bool,
}

#[derive(Debug)]
struct TableView {
    slug: &'static str,
    columns: Vec<&'static str>,
    rows: Vec<RowView>,
    toggle: bool,
    show: &'static str,
    next_show: &'static str,
    delete_prompt: &'static str,
    pdf_export: bool,
}

#[derive(Debug)]
struct FieldView {
    name: &'static str,
    label: &'static str,
    input_type: &'static str,
    value: String,
    checked: bool,
    options: Vec<ChoiceView>,
    required: bool,
    error: Option<String>,
}

#[derive(Debug)]
struct ChoiceView {
    value: &'static str,
    selected: bool,
}

#[derive(Debug)]
struct FormView {
    slug: &'static str,
    heading: String,
    action: String,
    editing: bool,
    read_only: bool,
    pdf_export: bool,
    saved_pdf: Option<String>,
    fields: Vec<FieldView>,
}

#[derive(Template)]
#[template(path = "resource/page.html")]
struct ResourcePageTemplate {
    page: PageView,
    table: TableView,
    notice: Option<NoticeTemplate>,
}

#[derive(Template)]
#[template(path = "resource/table_fragment.html")]
struct ResourceTableTemplate {
    table: TableView,
    notice: Option<NoticeTemplate>,
    close_modal: bool,
}

#[derive(Template)]
#[template(path = "resource/form.html")]
struct ResourceFormTemplate {
    form: FormView,
    notice: Option<NoticeTemplate>,
}

#[derive(Template)]
#[template(path = "resource/error_message.html")]
struct ErrorMessageTemplate {
    message: String,
}

impl ErrorMessageTemplate {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

fn page_view(resource: &'static ResourceConfig) -> PageView {
    PageView {
        title: resource.title,
        subtitle: resource.subtitle,
        noun: resource.noun,
        slug: resource.slug,
        header_link: resource
            .header_link
            .map(|(label, href)| HeaderLink { label, href }),
    }
}

fn table_view(page: &ListPage, show: StatusView) -> TableView {
    let resource = page.resource();
    let toggle = resource.toggle;
    let columns = resource
        .summary
        .iter()
        .map(|column| resource.field(column).map_or("Status", |field| field.label))
        .collect();

    let rows = page
        .visible_rows(show)
        .into_iter()
        .filter_map(|row| {
            let id = RowId::of(row)?;
            let cells = resource
                .summary
                .iter()
                .map(|column| {
                    let value = row.get(*column);
                    match resource.field(column).map(|field| field.kind) {
                        Some(FieldKind::Checkbox) => {
                            let ticked = value.is_some_and(|v| v.as_bool() == Some(true));
                            if ticked { "Yes" } else { "No" }.to_string()
                        }
                        _ => {
                            let text = value.map(value_text).unwrap_or_default();
                            match (text.is_empty(), toggle) {
                                (true, Some(toggle)) if toggle.column == *column => {
                                    toggle.off.to_string()
                                }
                                _ => text,
                            }
                        }
                    }
                })
                .collect();
            let done = toggle.is_some_and(|toggle| {
                row.get(toggle.column)
                    .is_some_and(|value| value_text(value) == toggle.on)
            });
            let locked = resource
                .read_only_flag
                .is_some_and(|flag| row.get(flag).and_then(|v| v.as_bool()) == Some(true));
            Some(RowView {
                id: id.to_string(),
                cells,
                done,
                locked,
            })
        })
        .collect();

    TableView {
        slug: resource.slug,
        columns,
        rows,
        toggle: toggle.is_some(),
        show: show.as_str(),
        next_show: show.next().as_str(),
        delete_prompt: resource.delete_prompt,
        pdf_export: resource.pdf_export,
    }
}

fn form_view(page: &ListPage, form: &RecordForm, editing: Option<&RowId>) -> FormView {
    let resource = page.resource();
    let errors = page.errors();
    let fields = form
        .fields()
        .iter()
        .map(|field| FieldView {
            name: field.name,
            label: field.label,
            input_type: field.kind.input_type(),
            value: form.text(field.name).to_string(),
            checked: form.flag(field.name),
            options: match field.kind {
                FieldKind::Choice(options) => options
                    .iter()
                    .map(|&value| ChoiceView {
                        value,
                        selected: form.text(field.name) == value,
                    })
                    .collect(),
                _ => Vec::new(),
            },
            required: field.required,
            error: errors.get(field.name).map(str::to_string),
        })
        .collect();

    let (heading, action) = match editing {
        Some(id) => (
            format!("Edit {}", resource.noun),
            format!("{}/{}", resource.path(), id),
        ),
        None => (format!("Add {}", resource.noun), resource.path()),
    };

    FormView {
        slug: resource.slug,
        heading,
        action,
        editing: editing.is_some(),
        read_only: form.is_read_only(),
        pdf_export: resource.pdf_export,
        saved_pdf: editing
            .filter(|_| resource.pdf_export)
            .map(|id| format!("{}/{}/pdf", resource.path(), id)),
        fields,
    }
}

/// Renders the list fragment, with the page's notice swapped in out of band.
fn render_table(page: &ListPage, show: StatusView, close_modal: bool) -> Result<Response, ResourceError> {
    let template = ResourceTableTemplate {
        table: table_view(page, show),
        notice: page.notice().map(NoticeTemplate::from),
        close_modal,
    };
    Ok(Html(template.render()?).into_response())
}

/// Renders the open form into the modal.
fn render_form(page: &ListPage, editing: Option<&RowId>) -> Result<Response, ResourceError> {
    let form = page.form().ok_or(PageError::NoOpenForm)?;
    let template = ResourceFormTemplate {
        form: form_view(page, form, editing),
        notice: page.notice().map(NoticeTemplate::from),
    };
    let mut response = Html(template.render()?).into_response();
    response.headers_mut().extend(retarget("#modal"));
    Ok(response)
}

/// Applies the submitted draft and writes it. A rejected or failed draft
/// goes back to the modal; a saved one closes it and redraws the list.
async fn save(
    mut page: ListPage,
    submitted: &Submitted,
    editing: Option<&RowId>,
) -> Result<Response, ResourceError> {
    if let Some(form) = page.form_mut() {
        form.apply(submitted)?;
    }
    match page.submit().await? {
        SubmitOutcome::Saved => render_table(&page, StatusView::default(), true),
        SubmitOutcome::Rejected(_) | SubmitOutcome::Failed(_) => render_form(&page, editing),
    }
}

/// Handler for GET /{slug}, the full officer page.
#[tracing::instrument(skip(state, user), fields(resource = state.resource.slug))]
async fn page_handler(
    State(state): State<Arc<ResourceState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>, ResourceError> {
    let mut page = state.page(&user);
    page.load().await;

    let template = ResourcePageTemplate {
        page: page_view(state.resource),
        table: table_view(&page, query.show),
        notice: page.notice().map(NoticeTemplate::from),
    };
    template.render().map(Html).map_err(ResourceError::from)
}

/// Handler for GET /{slug}/table that refetches and returns the list fragment.
#[tracing::instrument(skip(state, user), fields(resource = state.resource.slug))]
async fn table_handler(
    State(state): State<Arc<ResourceState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ResourceError> {
    let mut page = state.page(&user);
    page.load().await;
    render_table(&page, query.show, false)
}

/// Handler for GET /{slug}/new that serves a blank form.
#[tracing::instrument(skip(state, user), fields(resource = state.resource.slug))]
async fn new_form_handler(
    State(state): State<Arc<ResourceState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, ResourceError> {
    let mut page = state.page(&user).without_initial_load();
    page.open_new()?;
    render_form(&page, None)
}

/// Handler for POST /{slug} that inserts a new record.
#[tracing::instrument(skip(state, user, submitted), fields(resource = state.resource.slug))]
async fn create_handler(
    State(state): State<Arc<ResourceState>>,
    Extension(user): Extension<CurrentUser>,
    Form(submitted): Form<Submitted>,
) -> Result<Response, ResourceError> {
    let mut page = state.page(&user).without_initial_load();
    page.open_new()?;
    save(page, &submitted, None).await
}

/// Handler for GET /{slug}/{id}/edit that serves the form prefilled from the row.
#[tracing::instrument(skip(state, user), fields(resource = state.resource.slug))]
async fn edit_form_handler(
    State(state): State<Arc<ResourceState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, ResourceError> {
    let id = RowId::new(id);
    let mut page = state.page(&user);
    load_rows(&mut page).await?;
    page.open_edit(&id)?;
    render_form(&page, Some(&id))
}

/// Handler for PUT /{slug}/{id} that updates an existing record.
#[tracing::instrument(skip(state, user, submitted), fields(resource = state.resource.slug))]
async fn update_handler(
    State(state): State<Arc<ResourceState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Form(submitted): Form<Submitted>,
) -> Result<Response, ResourceError> {
    let id = RowId::new(id);
    let mut page = state.page(&user);
    load_rows(&mut page).await?;
    page.open_edit(&id)?;
    save(page, &submitted, Some(&id)).await
}

/// Handler for DELETE /{slug}/{id}. Nothing is deleted unless the prompt
/// was confirmed.
#[tracing::instrument(skip(state, user), fields(resource = state.resource.slug))]
async fn delete_handler(
    State(state): State<Arc<ResourceState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Response, ResourceError> {
    let confirmation = if query.confirmed {
        Confirmation::Confirmed
    } else {
        Confirmation::Declined
    };
    let mut page = state.page(&user).without_initial_load();

    match page.delete(&RowId::new(id), confirmation).await? {
        DeleteOutcome::Cancelled => Ok((
            StatusCode::NO_CONTENT,
            [(HeaderName::from_static("hx-reswap"), HeaderValue::from_static("none"))],
        )
            .into_response()),
        DeleteOutcome::Deleted => render_table(&page, query.show, false),
        DeleteOutcome::Failed(error) => {
            let notice = NoticeTemplate::error(error.message).render()?;
            let mut response = Html(notice).into_response();
            response.headers_mut().extend(retarget("#notice"));
            Ok(response)
        }
    }
}

/// Handler for POST /{slug}/{id}/toggle that flips a task between open and
/// done. The browser flips the row before sending; the list is redrawn from
/// the patched rows without a refetch. A rejected write answers with the
/// row restored and the store's message, so the early flip is undone.
#[tracing::instrument(skip(state, user), fields(resource = state.resource.slug))]
async fn toggle_handler(
    State(state): State<Arc<ResourceState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ResourceError> {
    let mut page = state.page(&user);
    load_rows(&mut page).await?;
    let outcome = page.toggle_status(&RowId::new(id)).await?;
    let mut response = render_table(&page, query.show, false)?;
    if let ToggleOutcome::Reverted(_) = outcome {
        *response.status_mut() = StatusCode::BAD_GATEWAY;
    }
    Ok(response)
}

/// Handler for GET /{slug}/events, the page's event stream.
#[tracing::instrument(skip(state, user), fields(resource = state.resource.slug))]
async fn events_handler(
    State(state): State<Arc<ResourceState>>,
    Extension(user): Extension<CurrentUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let bridge = state.resource.realtime.then(|| {
        let house_id = state
            .house_id
            .as_deref()
            .filter(|_| state.resource.house_scoped);
        state.changes.attach(state.resource.table, house_id, &user.session)
    });
    let events = page_events(&state.sessions, &user.session, bridge)
        .map(|event| Ok(Event::default().event(event.name()).data("")));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handler for GET /{slug}/{id}/pdf that exports a saved record.
#[tracing::instrument(skip(state, user), fields(resource = state.resource.slug))]
async fn saved_pdf_handler(
    State(state): State<Arc<ResourceState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, ResourceError> {
    let id = RowId::new(id);
    let mut page = state.page(&user);
    load_rows(&mut page).await?;
    page.open_edit(&id)?;
    let form = page.form().ok_or(PageError::NoOpenForm)?;
    Ok(pdf_response(state.resource, form))
}

/// Handler for POST /{slug}/pdf that exports the unsaved draft.
#[tracing::instrument(skip(state, submitted), fields(resource = state.resource.slug))]
async fn draft_pdf_handler(
    State(state): State<Arc<ResourceState>>,
    Form(submitted): Form<Submitted>,
) -> Result<Response, ResourceError> {
    let mut form = RecordForm::blank(state.resource.fields);
    form.apply(&submitted)?;
    Ok(pdf_response(state.resource, &form))
}

fn pdf_response(resource: &ResourceConfig, form: &RecordForm) -> Response {
    let filename = minutes_filename(form.text("meeting_date"));
    let bytes = render_text_pdf(resource.title, &minutes_lines(form));
    tracing::info!(%filename, bytes = bytes.len(), "Exported PDF");

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ChangeFeed;
    use crate::remote::{MemoryTables, MockRemoteTable, RemoteError, RemoteTable};
    use crate::resource::catalog::{MEMBERS, PRESIDENT_TASKS, SECRETARY_MINUTES};
    use crate::session::Session;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    /// Hands every session the same table.
    struct SharedTable(Arc<dyn RemoteTable>);

    impl TableSource for SharedTable {
        fn table(&self, _name: &str, _session: &Session) -> Arc<dyn RemoteTable> {
            self.0.clone()
        }
    }

    fn router_over(resource: &'static ResourceConfig, table: MockRemoteTable) -> Router {
        let state = ResourceState {
            resource,
            tables: Arc::new(SharedTable(Arc::new(table))),
            changes: ChangeSource::Local(Arc::new(ChangeFeed::new())),
            sessions: Arc::new(SessionStore::new()),
            house_id: None,
        };
        create_resource_router(Arc::new(state)).layer(Extension(user()))
    }

    async fn call(router: Router, method: &str, uri: &str, body: &str) -> (StatusCode, HeaderMap, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8_lossy(&body).into_owned())
    }

    fn user() -> CurrentUser {
        CurrentUser::new(Session::from_provider(
            crate::auth::provider::ProviderSession {
                user_id: "u".to_string(),
                email: "president@oxfordhouse.org".to_string(),
                access_token: "t".to_string(),
                expires_in: 3600,
            },
            chrono::Utc::now(),
        ))
    }

    #[tokio::test]
    async fn table_view_renders_summary_cells() {
        let tables = MemoryTables::new();
        let table = tables.get("PresidentTasks");
        table
            .insert(json!({"title": "Order supplies", "due_date": "2025-01-05"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        table
            .insert(json!({"title": "Pay water bill", "due_date": "2025-01-02", "status": "done"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        let state = ResourceState {
            resource: &PRESIDENT_TASKS,
            tables: Arc::new(tables),
            changes: ChangeSource::Local(Arc::new(ChangeFeed::new())),
            sessions: Arc::new(SessionStore::new()),
            house_id: None,
        };
        let mut page = state.page(&user());
        page.load().await;

        let open = table_view(&page, StatusView::Open);
        assert_eq!(open.columns, vec!["Title", "Description", "Due date", "Status"]);
        assert_eq!(open.rows.len(), 1);
        assert_eq!(open.rows[0].cells, vec!["Order supplies", "", "2025-01-05", "open"]);
        assert!(!open.rows[0].done);
        assert_eq!(open.next_show, "all");

        let all = table_view(&page, StatusView::All);
        assert_eq!(all.rows[0].cells[0], "Pay water bill");
        assert!(all.rows[0].done);
    }

    #[tokio::test]
    async fn form_view_carries_errors_and_options() {
        let state = ResourceState {
            resource: &MEMBERS,
            tables: Arc::new(MemoryTables::new()),
            changes: ChangeSource::Local(Arc::new(ChangeFeed::new())),
            sessions: Arc::new(SessionStore::new()),
            house_id: None,
        };
        let mut page = state.page(&user()).without_initial_load();
        page.open_new().unwrap();
        page.submit().await.unwrap();

        let view = form_view(&page, page.form().unwrap(), None);
        assert_eq!(view.heading, "Add Member");
        assert_eq!(view.action, "/members");
        let role = view.fields.iter().find(|f| f.name == "role").unwrap();
        assert_eq!(role.input_type, "select");
        assert_eq!(role.options.len(), 7);
        assert_eq!(role.error.as_deref(), Some("House Position is required"));
        let email = view.fields.iter().find(|f| f.name == "email").unwrap();
        assert_eq!(email.error, None);
    }

    #[tokio::test]
    async fn resource_errors_map_to_statuses() {
        let response = ResourceError::Page(PageError::UnknownRow(RowId::new("9"))).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("hx-retarget").unwrap(), "#notice");

        let response = ResourceError::Form(FormError::ReadOnly).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn failed_reads_are_reported_instead_of_missing_rows() {
        let mut table = MockRemoteTable::new();
        table
            .expect_list()
            .returning(|_, _| Err(RemoteError::new("JWT expired")));
        table.expect_update().never();
        let router = router_over(&PRESIDENT_TASKS, table);

        for (method, uri) in [
            ("GET", "/president/1/edit"),
            ("POST", "/president/1/toggle"),
            ("PUT", "/president/1"),
        ] {
            let (status, headers, body) =
                call(router.clone(), method, uri, "title=Agenda&due_date=2025-01-01").await;
            assert_eq!(status, StatusCode::BAD_GATEWAY, "{method} {uri}");
            assert_eq!(headers["hx-retarget"], "#notice");
            assert!(body.contains("JWT expired"), "{method} {uri}");
            assert!(!body.contains("no longer exists"));
        }
    }

    #[tokio::test]
    async fn rejected_toggle_restores_the_row() {
        let mut table = MockRemoteTable::new();
        table.expect_list().times(1).returning(|_, _| {
            Ok(vec![
                json!({"id": 1, "title": "Call the landlord", "due_date": "2025-02-01", "status": "open"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ])
        });
        table
            .expect_update()
            .times(1)
            .returning(|_, _| Err(RemoteError::new("permission denied for table PresidentTasks")));
        let router = router_over(&PRESIDENT_TASKS, table);

        let (status, _, body) = call(router, "POST", "/president/1/toggle?show=all", "").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("permission denied for table PresidentTasks"));
        assert!(body.contains("Call the landlord"));
        assert!(!body.contains("class=\"done\""));
        assert!(body.contains(">Complete</button>"));
    }

    #[tokio::test]
    async fn exported_filename_keeps_only_safe_characters() {
        let router = router_over(&SECRETARY_MINUTES, MockRemoteTable::new());

        let (status, headers, _) = call(
            router,
            "POST",
            "/secretary/pdf",
            "meeting_date=2025-01-12%22%3B%20filename%3Devil.exe",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers["content-disposition"],
            "attachment; filename=\"Meeting_Minutes_2025-01-12filenameevilexe.pdf\""
        );
    }
}
