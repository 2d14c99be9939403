//! The list/detail page behind every officer dashboard.
//!
//! A [`ListPage`] caches the rows of one table, owns the open [`RecordForm`]
//! and runs the page's transitions:
//!
//! ```text
//! Loading --load--> Listing --open_new/open_edit--> FormOpen
//! FormOpen --submit (valid)--> Submitting --ok--> Listing (refetch)
//!                                          --err--> FormOpen (draft kept)
//! Listing --delete (confirmed)--> Listing (refetch)
//! ```
//!
//! Every write is a single remote call and every successful write is
//! followed by exactly one list fetch. The status toggle is the exception:
//! it patches the cached row first and restores it if the write fails.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::form::{RecordForm, ValidationErrors};
use crate::remote::{Filter, RemoteError, RemoteTable, Row, RowId, value_text};
use crate::resource::ResourceConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    New,
    Edit(RowId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    Loading,
    Listing,
    FormOpen(FormMode),
    Submitting(FormMode),
    /// The last list fetch failed; the cached rows are stale or empty.
    Error(String),
}

/// Toast shown after an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

/// Answer to a destructive action's prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved,
    Rejected(ValidationErrors),
    Failed(RemoteError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Cancelled,
    Deleted,
    Failed(RemoteError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Confirmed,
    Reverted(RemoteError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("No form is open")]
    NoOpenForm,
    #[error("This record is read-only")]
    ReadOnly,
    #[error("No row with id {0}")]
    UnknownRow(RowId),
    #[error("The page is busy")]
    Busy,
    #[error("This page has no status to toggle")]
    ToggleUnsupported,
}

/// Which tasks a task board shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusView {
    #[default]
    Open,
    Done,
    All,
}

impl StatusView {
    /// The filter button cycles open, all, done.
    pub fn next(self) -> Self {
        match self {
            StatusView::Open => StatusView::All,
            StatusView::All => StatusView::Done,
            StatusView::Done => StatusView::Open,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusView::Open => "open",
            StatusView::Done => "done",
            StatusView::All => "all",
        }
    }
}

/// Speculative status change applied to the cached rows.
#[derive(Debug)]
#[must_use]
pub struct PendingToggle {
    id: RowId,
    column: &'static str,
    previous: Option<Value>,
    next: &'static str,
}

impl PendingToggle {
    pub fn id(&self) -> &RowId {
        &self.id
    }

    /// The patch to send to storage.
    pub fn patch(&self) -> Row {
        let mut patch = Row::new();
        patch.insert(self.column.to_string(), Value::String(self.next.to_string()));
        patch
    }
}

pub struct ListPage {
    resource: &'static ResourceConfig,
    table: Arc<dyn RemoteTable>,
    filter: Filter,
    house_id: Option<String>,
    state: PageState,
    rows: Vec<Row>,
    form: Option<RecordForm>,
    errors: ValidationErrors,
    notice: Option<Notice>,
}

impl ListPage {
    pub fn new(resource: &'static ResourceConfig, table: Arc<dyn RemoteTable>) -> Self {
        Self {
            resource,
            table,
            filter: Filter::new(),
            house_id: None,
            state: PageState::Loading,
            rows: Vec::new(),
            form: None,
            errors: ValidationErrors::default(),
            notice: None,
        }
    }

    /// Limits the page to one house when the resource is house scoped.
    pub fn for_house(mut self, house_id: Option<&str>) -> Self {
        if let (true, Some(house_id)) = (self.resource.house_scoped, house_id) {
            self.filter = Filter::new().eq("house_id", house_id);
            self.house_id = Some(house_id.to_string());
        }
        self
    }

    /// Skips the initial fetch, for interactions that start with a write.
    pub fn without_initial_load(mut self) -> Self {
        self.state = PageState::Listing;
        self
    }

    pub fn resource(&self) -> &'static ResourceConfig {
        self.resource
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, id: &RowId) -> Option<&Row> {
        self.rows.iter().find(|row| id.matches(row))
    }

    pub fn form(&self) -> Option<&RecordForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut RecordForm> {
        self.form.as_mut()
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Fetches the whole list once.
    ///
    /// On failure the cached rows are kept and the error becomes the notice.
    /// An open form stays open either way.
    #[tracing::instrument(skip(self), fields(table = self.resource.table))]
    pub async fn load(&mut self) {
        let form_open = matches!(self.state, PageState::FormOpen(_));
        if !form_open {
            self.state = PageState::Loading;
        }
        match self.table.list(&self.filter, self.resource.order).await {
            Ok(rows) => {
                tracing::debug!(rows = rows.len(), "Loaded rows");
                self.rows = rows;
                if !form_open {
                    self.state = PageState::Listing;
                }
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to load rows");
                self.notice = Some(Notice::Error(error.message.clone()));
                if !form_open {
                    self.state = PageState::Error(error.message);
                }
            }
        }
    }

    pub fn open_new(&mut self) -> Result<(), PageError> {
        self.ensure_idle()?;
        self.form = Some(RecordForm::blank(self.resource.fields));
        self.errors = ValidationErrors::default();
        self.state = PageState::FormOpen(FormMode::New);
        Ok(())
    }

    /// Opens the form prefilled from a cached row.
    pub fn open_edit(&mut self, id: &RowId) -> Result<(), PageError> {
        self.ensure_idle()?;
        let row = self
            .row(id)
            .ok_or_else(|| PageError::UnknownRow(id.clone()))?;
        let mut form = RecordForm::from_row(self.resource.fields, row);
        if let Some(flag) = self.resource.read_only_flag {
            if row.get(flag).is_some_and(|value| value == &Value::Bool(true)) {
                form = form.read_only();
            }
        }
        self.form = Some(form);
        self.errors = ValidationErrors::default();
        self.state = PageState::FormOpen(FormMode::Edit(id.clone()));
        Ok(())
    }

    pub fn cancel(&mut self) {
        if matches!(self.state, PageState::FormOpen(_)) {
            self.state = PageState::Listing;
        }
        self.form = None;
        self.errors = ValidationErrors::default();
    }

    /// Validates the open form and writes it.
    ///
    /// An invalid draft issues no remote call. A valid one issues exactly one
    /// insert or update; a failed write leaves the form open with its draft.
    #[tracing::instrument(skip(self), fields(table = self.resource.table))]
    pub async fn submit(&mut self) -> Result<SubmitOutcome, PageError> {
        let PageState::FormOpen(mode) = self.state.clone() else {
            return Err(PageError::NoOpenForm);
        };
        let form = self.form.as_ref().ok_or(PageError::NoOpenForm)?;
        if form.is_read_only() {
            return Err(PageError::ReadOnly);
        }

        let errors = form.validate();
        if !errors.is_empty() {
            tracing::debug!(fields = errors.len(), "Draft rejected");
            self.errors = errors.clone();
            return Ok(SubmitOutcome::Rejected(errors));
        }
        self.errors = ValidationErrors::default();

        let mut payload = form.payload();
        self.state = PageState::Submitting(mode.clone());
        let written = match &mode {
            FormMode::New => {
                for (column, value) in self.resource.insert_defaults {
                    payload
                        .entry(column.to_string())
                        .or_insert_with(|| Value::String(value.to_string()));
                }
                if let Some(house_id) = &self.house_id {
                    payload.insert("house_id".to_string(), Value::String(house_id.clone()));
                }
                self.table.insert(payload).await.map(|_| ())
            }
            FormMode::Edit(id) => self.table.update(id, payload).await,
        };

        match written {
            Ok(()) => {
                let notice = match mode {
                    FormMode::New => self.resource.created_notice(),
                    FormMode::Edit(_) => self.resource.updated_notice(),
                };
                tracing::info!(%notice, "Record saved");
                self.form = None;
                self.state = PageState::Listing;
                self.notice = Some(Notice::Success(notice));
                self.load().await;
                Ok(SubmitOutcome::Saved)
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to save record");
                self.state = PageState::FormOpen(mode);
                self.notice = Some(Notice::Error(error.message.clone()));
                Ok(SubmitOutcome::Failed(error))
            }
        }
    }

    /// Deletes one row once the prompt has been confirmed.
    #[tracing::instrument(skip(self), fields(table = self.resource.table))]
    pub async fn delete(
        &mut self,
        id: &RowId,
        confirmation: Confirmation,
    ) -> Result<DeleteOutcome, PageError> {
        if matches!(self.state, PageState::Submitting(_)) {
            return Err(PageError::Busy);
        }
        if confirmation == Confirmation::Declined {
            return Ok(DeleteOutcome::Cancelled);
        }
        match self.table.delete(id).await {
            Ok(()) => {
                self.notice = Some(Notice::Success(self.resource.deleted_notice()));
                self.load().await;
                Ok(DeleteOutcome::Deleted)
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to delete record");
                self.notice = Some(Notice::Error(error.message.clone()));
                Ok(DeleteOutcome::Failed(error))
            }
        }
    }

    /// Flips the status of a cached row without waiting for storage.
    pub fn begin_toggle(&mut self, id: &RowId) -> Result<PendingToggle, PageError> {
        let toggle = self.resource.toggle.ok_or(PageError::ToggleUnsupported)?;
        if matches!(self.state, PageState::Submitting(_) | PageState::Loading) {
            return Err(PageError::Busy);
        }
        let row = self
            .rows
            .iter_mut()
            .find(|row| id.matches(row))
            .ok_or_else(|| PageError::UnknownRow(id.clone()))?;
        let previous = row.get(toggle.column).cloned();
        let current = previous.as_ref().map(value_text).unwrap_or_default();
        let next = toggle.flipped(&current);
        row.insert(toggle.column.to_string(), Value::String(next.to_string()));
        Ok(PendingToggle {
            id: id.clone(),
            column: toggle.column,
            previous,
            next,
        })
    }

    /// Keeps a speculative toggle, or puts back exactly what was there.
    pub fn finish_toggle(
        &mut self,
        pending: PendingToggle,
        written: Result<(), RemoteError>,
    ) -> ToggleOutcome {
        match written {
            Ok(()) => {
                let done = self.resource.toggle.is_some_and(|toggle| pending.next == toggle.on);
                let message = if done { "Marked complete" } else { "Marked open" };
                self.notice = Some(Notice::Success(message.to_string()));
                ToggleOutcome::Confirmed
            }
            Err(error) => {
                tracing::warn!(%error, id = %pending.id, "Reverting status toggle");
                if let Some(row) = self.rows.iter_mut().find(|row| pending.id.matches(row)) {
                    match pending.previous {
                        Some(previous) => {
                            row.insert(pending.column.to_string(), previous);
                        }
                        None => {
                            row.remove(pending.column);
                        }
                    }
                }
                self.notice = Some(Notice::Error(error.message.clone()));
                ToggleOutcome::Reverted(error)
            }
        }
    }

    /// Toggles a row's status with one update and no refetch.
    #[tracing::instrument(skip(self), fields(table = self.resource.table))]
    pub async fn toggle_status(&mut self, id: &RowId) -> Result<ToggleOutcome, PageError> {
        let pending = self.begin_toggle(id)?;
        let written = self.table.update(pending.id(), pending.patch()).await;
        Ok(self.finish_toggle(pending, written))
    }

    /// Rows shown under a task board filter. Pages without a status show
    /// everything.
    pub fn visible_rows(&self, view: StatusView) -> Vec<&Row> {
        let Some(toggle) = self.resource.toggle else {
            return self.rows.iter().collect();
        };
        self.rows
            .iter()
            .filter(|row| {
                let done = row
                    .get(toggle.column)
                    .is_some_and(|value| value_text(value) == toggle.on);
                match view {
                    StatusView::All => true,
                    StatusView::Done => done,
                    StatusView::Open => !done,
                }
            })
            .collect()
    }

    fn ensure_idle(&self) -> Result<(), PageError> {
        match self.state {
            PageState::Loading | PageState::Submitting(_) => Err(PageError::Busy),
            _ => Ok(()),
        }
    }
}
