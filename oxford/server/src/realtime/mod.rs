//! Change notifications and the invalidate-and-refetch bridge.
//!
//! Writes made through a [`NotifyingTable`] are published on the
//! [`ChangeFeed`]. With the Supabase backend, changes instead arrive over the
//! project's realtime channel (see [`supabase`]). A [`RealtimeBridge`]
//! listens for changes on one table and answers each of them with a full
//! list refetch. There is no diffing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

use crate::page::ListPage;
use crate::remote::{Filter, RemoteError, RemoteTable, Row, RowId, SortOrder};
use crate::session::Session;

pub mod supabase;

use supabase::SupabaseRealtime;

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
}

/// Broadcast of every successful write, for all tables.
#[derive(Debug)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, table: &str, kind: ChangeKind) {
        tracing::debug!(table, ?kind, "Publishing change");
        // Nobody listening is fine.
        let _ = self.sender.send(ChangeEvent {
            table: table.to_string(),
            kind,
        });
    }

    /// Number of open subscriptions across all tables.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

/// Table decorator that publishes each successful write.
pub struct NotifyingTable {
    inner: Arc<dyn RemoteTable>,
    table: String,
    feed: Arc<ChangeFeed>,
}

impl NotifyingTable {
    pub fn new(inner: Arc<dyn RemoteTable>, table: &str, feed: Arc<ChangeFeed>) -> Self {
        Self {
            inner,
            table: table.to_string(),
            feed,
        }
    }
}

#[async_trait]
impl RemoteTable for NotifyingTable {
    async fn list(&self, filter: &Filter, order: Option<SortOrder>) -> Result<Vec<Row>, RemoteError> {
        self.inner.list(filter, order).await
    }

    async fn insert(&self, row: Row) -> Result<Row, RemoteError> {
        let stored = self.inner.insert(row).await?;
        self.feed.publish(&self.table, ChangeKind::Insert);
        Ok(stored)
    }

    async fn update(&self, id: &RowId, patch: Row) -> Result<(), RemoteError> {
        self.inner.update(id, patch).await?;
        self.feed.publish(&self.table, ChangeKind::Update);
        Ok(())
    }

    async fn delete(&self, id: &RowId) -> Result<(), RemoteError> {
        self.inner.delete(id).await?;
        self.feed.publish(&self.table, ChangeKind::Delete);
        Ok(())
    }
}

/// Where a page's change notifications come from.
#[derive(Debug, Clone)]
pub enum ChangeSource {
    /// Writes made through this portal.
    Local(Arc<ChangeFeed>),
    /// The Supabase realtime channel, which also sees writes made elsewhere.
    Supabase(Arc<SupabaseRealtime>),
}

impl ChangeSource {
    /// Subscribes to one table on behalf of `session`. `house_id` narrows a
    /// remote subscription to one house.
    pub fn attach(&self, table: &str, house_id: Option<&str>, session: &Session) -> RealtimeBridge {
        match self {
            ChangeSource::Local(feed) => RealtimeBridge::attach(feed, table),
            ChangeSource::Supabase(realtime) => {
                realtime.attach(table, house_id, &session.access_token)
            }
        }
    }
}

/// Subscription to the changes of one table.
///
/// The subscription is released when the bridge is dropped, together with
/// the upstream connection feeding it, if any.
#[derive(Debug)]
pub struct RealtimeBridge {
    table: String,
    receiver: broadcast::Receiver<ChangeEvent>,
    upstream: Option<AbortHandle>,
}

impl RealtimeBridge {
    pub fn attach(feed: &ChangeFeed, table: &str) -> Self {
        tracing::debug!(table, "Realtime bridge attached");
        Self {
            table: table.to_string(),
            receiver: feed.subscribe(),
            upstream: None,
        }
    }

    /// Ties the lifetime of the task that feeds this bridge to the bridge.
    pub fn with_upstream(mut self, upstream: AbortHandle) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Waits for the next change on this table; `None` once the feed is gone.
    ///
    /// Missed notifications collapse into one, since any change means refetch.
    pub async fn changed(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.table == self.table => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(table = %self.table, skipped, "Realtime bridge lagged");
                    return Some(ChangeEvent {
                        table: self.table.clone(),
                        kind: ChangeKind::Update,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Waits for a change, then refetches the whole list of `page`.
    ///
    /// Returns `false` when the feed has closed and nothing was refetched.
    pub async fn refresh(&mut self, page: &mut ListPage) -> bool {
        if self.changed().await.is_none() {
            return false;
        }
        page.load().await;
        true
    }
}

impl Drop for RealtimeBridge {
    fn drop(&mut self) {
        if let Some(upstream) = self.upstream.take() {
            upstream.abort();
        }
        tracing::debug!(table = %self.table, "Realtime bridge detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageState;
    use crate::remote::MockRemoteTable;
    use crate::remote::MemoryTable;
    use crate::resource::catalog::PRESIDENT_TASKS;
    use serde_json::json;

    #[tokio::test]
    async fn notifying_table_publishes_successful_writes_only() {
        let feed = Arc::new(ChangeFeed::new());
        let mut bridge = RealtimeBridge::attach(&feed, "PresidentTasks");
        let memory = Arc::new(MemoryTable::new("PresidentTasks"));
        let table = NotifyingTable::new(memory, "PresidentTasks", feed.clone());

        let stored = table
            .insert(json!({"title": "Call HSR"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(bridge.changed().await.map(|e| e.kind), Some(ChangeKind::Insert));

        assert!(table.delete(&RowId::new("404")).await.is_err());
        table.delete(&RowId::of(&stored).unwrap()).await.unwrap();
        assert_eq!(bridge.changed().await.map(|e| e.kind), Some(ChangeKind::Delete));
    }

    #[tokio::test]
    async fn bridge_ignores_other_tables() {
        let feed = ChangeFeed::new();
        let mut bridge = RealtimeBridge::attach(&feed, "PresidentTasks");
        feed.publish("Members", ChangeKind::Insert);
        feed.publish("PresidentTasks", ChangeKind::Update);
        assert_eq!(
            bridge.changed().await,
            Some(ChangeEvent {
                table: "PresidentTasks".to_string(),
                kind: ChangeKind::Update
            })
        );
    }

    #[tokio::test]
    async fn change_triggers_exactly_one_refetch() {
        let feed = ChangeFeed::new();
        let mut bridge = RealtimeBridge::attach(&feed, "PresidentTasks");
        let mut table = MockRemoteTable::new();
        table
            .expect_list()
            .times(1)
            .returning(|_, _| Ok(vec![json!({"id": 1, "title": "Agenda"}).as_object().cloned().unwrap()]));
        let mut page = ListPage::new(&PRESIDENT_TASKS, Arc::new(table));

        feed.publish("PresidentTasks", ChangeKind::Insert);
        assert!(bridge.refresh(&mut page).await);
        assert_eq!(page.state(), &PageState::Listing);
        assert_eq!(page.rows().len(), 1);
    }

    #[tokio::test]
    async fn dropping_bridge_releases_subscription() {
        let feed = ChangeFeed::new();
        let bridge = RealtimeBridge::attach(&feed, "PresidentTasks");
        assert_eq!(feed.subscriber_count(), 1);
        drop(bridge);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
