//! Remote table access.
//!
//! Every officer page talks to one collection of the hosted relational store
//! through the [`RemoteTable`] trait. Calls are single-shot: nothing here
//! retries, backs off or classifies failures. A failure carries the
//! provider's own message so the page can show it verbatim.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::session::Session;

pub mod memory;
pub mod postgrest;

pub use memory::{MemoryTable, MemoryTables};
pub use postgrest::{PostgrestTable, PostgrestTables};

/// One remote row, as the storage provider returns it.
pub type Row = Map<String, Value>;

/// Identifier of a remote row.
///
/// Rows may be keyed by integers or by uuids; both are carried as text and
/// compared against the textual form of the row's `id` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Extracts the `id` column of a row, if it has one.
    pub fn of(row: &Row) -> Option<Self> {
        match row.get("id")? {
            Value::Null => None,
            value => Some(Self(value_text(value))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `row` carries this identifier.
    pub fn matches(&self, row: &Row) -> bool {
        RowId::of(row).is_some_and(|id| id == *self)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column ordering for a list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub column: &'static str,
    pub ascending: bool,
}

impl SortOrder {
    pub const fn ascending(column: &'static str) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub const fn descending(column: &'static str) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

/// Equality filter applied to a list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `column = value` condition.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether a row satisfies every condition.
    pub fn accepts(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, expected)| {
            row.get(column)
                .is_some_and(|value| !value.is_null() && value_text(value) == *expected)
        })
    }
}

/// Failure reported by the storage provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Accessor for one remote collection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// Fetches every row accepted by `filter`, ordered by `order` when given.
    async fn list(&self, filter: &Filter, order: Option<SortOrder>) -> Result<Vec<Row>, RemoteError>;

    /// Inserts one row and returns it as stored.
    async fn insert(&self, row: Row) -> Result<Row, RemoteError>;

    /// Overwrites the given columns of one row.
    async fn update(&self, id: &RowId, patch: Row) -> Result<(), RemoteError>;

    /// Removes one row.
    async fn delete(&self, id: &RowId) -> Result<(), RemoteError>;
}

/// Hands out table handles acting on behalf of a signed-in session.
pub trait TableSource: Send + Sync {
    fn table(&self, name: &str, session: &Session) -> Arc<dyn RemoteTable>;
}

/// Textual form of a JSON scalar, as used by filters and identifiers.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
