use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Filter, RemoteError, RemoteTable, Row, RowId, SortOrder, TableSource};
use crate::session::Session;

/// In-process table used for local development and tests.
///
/// Rows get incrementing integer ids on insert. Like the hosted store, the
/// table keeps no history and enforces no schema.
#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: Vec<Row>,
    next_id: u64,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState {
                rows: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of every stored row in insertion order.
    pub fn rows(&self) -> Vec<Row> {
        self.lock().rows.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn not_found(&self, id: &RowId) -> RemoteError {
        RemoteError::new(format!("No row with id {} in {}", id, self.name))
    }
}

#[async_trait]
impl RemoteTable for MemoryTable {
    #[tracing::instrument(skip(self), fields(table = %self.name))]
    async fn list(&self, filter: &Filter, order: Option<SortOrder>) -> Result<Vec<Row>, RemoteError> {
        let mut rows: Vec<Row> = self
            .lock()
            .rows
            .iter()
            .filter(|row| filter.accepts(row))
            .cloned()
            .collect();
        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(order.column), b.get(order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        Ok(rows)
    }

    #[tracing::instrument(skip(self, row), fields(table = %self.name))]
    async fn insert(&self, mut row: Row) -> Result<Row, RemoteError> {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        row.insert("id".to_string(), Value::from(id));
        state.rows.push(row.clone());
        Ok(row)
    }

    #[tracing::instrument(skip(self, patch), fields(table = %self.name))]
    async fn update(&self, id: &RowId, patch: Row) -> Result<(), RemoteError> {
        let mut state = self.lock();
        let Some(row) = state.rows.iter_mut().find(|row| id.matches(row)) else {
            return Err(self.not_found(id));
        };
        for (column, value) in patch {
            if column != "id" {
                row.insert(column, value);
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(table = %self.name))]
    async fn delete(&self, id: &RowId) -> Result<(), RemoteError> {
        let mut state = self.lock();
        let before = state.rows.len();
        state.rows.retain(|row| !id.matches(row));
        if state.rows.len() == before {
            return Err(self.not_found(id));
        }
        Ok(())
    }
}

/// Nulls and missing values sort last; mixed types compare by text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|value| !value.is_null());
    let b = b.filter(|value| !value.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or_default();
            let b = b.as_f64().unwrap_or_default();
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(a), Some(b)) => super::value_text(a).cmp(&super::value_text(b)),
    }
}

/// Named memory tables shared by every session.
#[derive(Debug, Default)]
pub struct MemoryTables {
    tables: Mutex<HashMap<String, Arc<MemoryTable>>>,
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table called `name`, creating it empty on first use.
    pub fn get(&self, name: &str) -> Arc<MemoryTable> {
        let mut tables = self
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tables
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryTable::new(name)))
            .clone()
    }
}

impl TableSource for MemoryTables {
    fn table(&self, name: &str, _session: &Session) -> Arc<dyn RemoteTable> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_incrementing_ids() {
        let table = MemoryTable::new("Members");
        let first = table.insert(row(json!({"name": "Ann"}))).await.unwrap();
        let second = table.insert(row(json!({"name": "Bo"}))).await.unwrap();
        assert_eq!(first["id"], json!(1));
        assert_eq!(second["id"], json!(2));
    }

    #[tokio::test]
    async fn list_orders_and_filters() {
        let table = MemoryTable::new("PresidentTasks");
        for (title, due, house) in [("b", "2025-03-02", 1), ("a", "2025-01-09", 1), ("c", "2025-02-01", 2)] {
            table
                .insert(row(json!({"title": title, "due_date": due, "house_id": house})))
                .await
                .unwrap();
        }

        let rows = table
            .list(&Filter::new().eq("house_id", "1"), Some(SortOrder::ascending("due_date")))
            .await
            .unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r["title"].clone()).collect();
        assert_eq!(titles, vec![json!("a"), json!("b")]);

        let rows = table
            .list(&Filter::new(), Some(SortOrder::descending("due_date")))
            .await
            .unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r["title"].clone()).collect();
        assert_eq!(titles, vec![json!("b"), json!("c"), json!("a")]);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let table = MemoryTable::new("Members");
        let stored = table.insert(row(json!({"name": "Ann"}))).await.unwrap();
        let id = RowId::of(&stored).unwrap();

        table.update(&id, row(json!({"name": "Annie", "id": 99}))).await.unwrap();
        assert_eq!(table.rows()[0]["name"], json!("Annie"));
        assert_eq!(table.rows()[0]["id"], json!(1));

        table.delete(&id).await.unwrap();
        assert!(table.rows().is_empty());

        let error = table.delete(&id).await.unwrap_err();
        assert_eq!(error.message, "No row with id 1 in Members");
        assert!(table.update(&id, Row::new()).await.is_err());
    }

    #[test]
    fn tables_are_shared_by_name() {
        let tables = MemoryTables::new();
        assert!(Arc::ptr_eq(&tables.get("Members"), &tables.get("Members")));
        assert!(!Arc::ptr_eq(&tables.get("Members"), &tables.get("treasurer_reports")));
    }
}
