//! Change notifications from the Supabase realtime service.
//!
//! Each subscribed page holds one websocket to `/realtime/v1/websocket`,
//! joined to a single table's `postgres_changes` with the signed-in user's
//! access token, so row-level security decides which changes it sees. The
//! socket feeds a private [`ChangeFeed`]; dropping the page's bridge aborts
//! the socket task.

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::{self, Message};

use super::{ChangeFeed, ChangeKind, RealtimeBridge};

const HEARTBEAT: Duration = Duration::from_secs(25);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("realtime socket failed: {0}")]
    Socket(Box<tungstenite::Error>),
    #[error("realtime join rejected: {0}")]
    Rejected(String),
}

impl From<tungstenite::Error> for RealtimeError {
    fn from(error: tungstenite::Error) -> Self {
        RealtimeError::Socket(Box::new(error))
    }
}

/// Connection settings for the project's realtime endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseRealtime {
    endpoint: String,
    anon_key: String,
}

impl SupabaseRealtime {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            endpoint: format!("{}/realtime/v1/websocket", socket_base(base_url)),
            anon_key: anon_key.to_string(),
        }
    }

    fn url(&self) -> String {
        format!("{}?apikey={}&vsn=1.0.0", self.endpoint, self.anon_key)
    }

    /// Opens a channel for `table` and returns the bridge it feeds. The
    /// socket is reopened after a failure until the bridge is dropped.
    pub fn attach(&self, table: &str, house_id: Option<&str>, access_token: &str) -> RealtimeBridge {
        let feed = Arc::new(ChangeFeed::new());
        let bridge = RealtimeBridge::attach(&feed, table);
        let filter = house_id.map(|house_id| format!("house_id=eq.{house_id}"));
        let channel = Channel {
            url: self.url(),
            table: table.to_string(),
            join: join_message(table, filter.as_deref(), access_token),
        };
        let task = tokio::spawn(async move {
            let mut resumed = false;
            loop {
                match channel.listen(&feed, resumed).await {
                    Ok(()) => tracing::info!(table = %channel.table, "Realtime channel closed"),
                    Err(error) => {
                        tracing::warn!(%error, table = %channel.table, "Realtime channel failed")
                    }
                }
                resumed = true;
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        });
        bridge.with_upstream(task.abort_handle())
    }
}

struct Channel {
    url: String,
    table: String,
    join: String,
}

impl Channel {
    /// Runs one connection until the server closes it.
    async fn listen(&self, feed: &ChangeFeed, resumed: bool) -> Result<(), RealtimeError> {
        let (socket, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();
        sink.send(Message::text(self.join.clone())).await?;
        tracing::debug!(table = %self.table, "Joined realtime channel");
        // Changes made while disconnected were not seen.
        if resumed {
            feed.publish(&self.table, ChangeKind::Update);
        }

        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + HEARTBEAT, HEARTBEAT);
        let mut next_ref: u64 = 2;
        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    sink.send(Message::text(heartbeat_message(next_ref))).await?;
                    next_ref += 1;
                }
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(kind) = incoming(text.as_str(), &self.table)? {
                            feed.publish(&self.table, kind);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(error)) => return Err(error.into()),
                },
            }
        }
    }
}

/// `wss://` for an `https://` project URL, `ws://` for plain `http://`.
pub fn socket_base(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    }
}

/// Phoenix `phx_join` for one table's row changes.
pub fn join_message(table: &str, filter: Option<&str>, access_token: &str) -> String {
    let mut changes = json!({"event": "*", "schema": "public", "table": table});
    if let Some(filter) = filter {
        changes["filter"] = json!(filter);
    }
    json!({
        "topic": topic(table),
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": {"self": false},
                "presence": {"key": ""},
                "postgres_changes": [changes],
            },
            "access_token": access_token,
        },
        "ref": "1",
        "join_ref": "1",
    })
    .to_string()
}

fn heartbeat_message(reference: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
    .to_string()
}

fn topic(table: &str) -> String {
    format!("realtime:{table}")
}

/// Reads one server message. Row changes on `table` yield their kind; a
/// refused join is an error; everything else is ignored.
pub fn incoming(message: &str, table: &str) -> Result<Option<ChangeKind>, RealtimeError> {
    let Ok(message) = serde_json::from_str::<Value>(message) else {
        return Ok(None);
    };
    if message["topic"].as_str() != Some(topic(table).as_str()) {
        return Ok(None);
    }
    match message["event"].as_str() {
        Some("phx_reply") if message["payload"]["status"] == "error" => Err(
            RealtimeError::Rejected(message["payload"]["response"].to_string()),
        ),
        Some("postgres_changes") => {
            let data = &message["payload"]["data"];
            if data["table"].as_str().is_some_and(|changed| changed != table) {
                return Ok(None);
            }
            Ok(match data["type"].as_str() {
                Some("INSERT") => Some(ChangeKind::Insert),
                Some("UPDATE") => Some(ChangeKind::Update),
                Some("DELETE") => Some(ChangeKind::Delete),
                _ => None,
            })
        }
        _ => Ok(None),
    }
}
