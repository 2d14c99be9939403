use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::sync::Arc;

use super::{Filter, RemoteError, RemoteTable, Row, RowId, SortOrder, TableSource};
use crate::session::Session;

/// Table handle backed by the Supabase REST endpoint (`/rest/v1`).
///
/// Requests carry the project's anon key and, when present, the signed-in
/// user's access token so row-level security is evaluated for that user.
#[derive(Debug, Clone)]
pub struct PostgrestTable {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    table: String,
}

impl PostgrestTable {
    pub fn new(
        client: Client,
        base_url: &str,
        anon_key: &str,
        access_token: Option<String>,
        table: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token,
            table: table.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }
}

/// Query parameters for a list request in PostgREST syntax.
pub fn list_query(filter: &Filter, order: Option<SortOrder>) -> Vec<(String, String)> {
    let mut query = vec![("select".to_string(), "*".to_string())];
    for (column, value) in filter.conditions() {
        query.push((column.clone(), format!("eq.{value}")));
    }
    if let Some(order) = order {
        let direction = if order.ascending { "asc" } else { "desc" };
        query.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    query
}

fn id_query(id: &RowId) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

/// Extracts the provider's message from an error body.
///
/// PostgREST reports `message`; the auth service uses `error_description`
/// or `msg`. Anything else is passed through as the raw body.
pub fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error_description", "msg", "error"] {
            if let Some(Value::String(message)) = fields.get(key) {
                return message.clone();
            }
        }
    }
    if body.trim().is_empty() {
        status.to_string()
    } else {
        body.to_string()
    }
}

async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::new(error_message(&body, status)))
}

fn transport(error: reqwest::Error) -> RemoteError {
    RemoteError::new(error.to_string())
}

#[async_trait]
impl RemoteTable for PostgrestTable {
    #[tracing::instrument(skip(self), fields(table = %self.table))]
    async fn list(&self, filter: &Filter, order: Option<SortOrder>) -> Result<Vec<Row>, RemoteError> {
        let request = self
            .client
            .get(self.endpoint())
            .query(&list_query(filter, order));
        let response = self.authorized(request).send().await.map_err(transport)?;
        check(response).await?.json().await.map_err(transport)
    }

    #[tracing::instrument(skip(self, row), fields(table = %self.table))]
    async fn insert(&self, row: Row) -> Result<Row, RemoteError> {
        let request = self
            .client
            .post(self.endpoint())
            .header("Prefer", "return=representation")
            .json(&[row]);
        let response = self.authorized(request).send().await.map_err(transport)?;
        let mut stored: Vec<Row> = check(response).await?.json().await.map_err(transport)?;
        if stored.is_empty() {
            return Err(RemoteError::new("Insert returned no row"));
        }
        Ok(stored.swap_remove(0))
    }

    #[tracing::instrument(skip(self, patch), fields(table = %self.table))]
    async fn update(&self, id: &RowId, patch: Row) -> Result<(), RemoteError> {
        let request = self
            .client
            .patch(self.endpoint())
            .query(&id_query(id))
            .json(&patch);
        let response = self.authorized(request).send().await.map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(table = %self.table))]
    async fn delete(&self, id: &RowId) -> Result<(), RemoteError> {
        let request = self.client.delete(self.endpoint()).query(&id_query(id));
        let response = self.authorized(request).send().await.map_err(transport)?;
        check(response).await?;
        Ok(())
    }
}

/// Source of PostgREST table handles for one Supabase project.
#[derive(Debug, Clone)]
pub struct PostgrestTables {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl PostgrestTables {
    pub fn new(client: Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            anon_key: anon_key.to_string(),
        }
    }
}

impl TableSource for PostgrestTables {
    fn table(&self, name: &str, session: &Session) -> Arc<dyn RemoteTable> {
        Arc::new(PostgrestTable::new(
            self.client.clone(),
            &self.base_url,
            &self.anon_key,
            Some(session.access_token.clone()),
            name,
        ))
    }
}
