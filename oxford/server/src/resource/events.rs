//! Server-sent events for an open officer page.
//!
//! Each page keeps one stream open. It says `refresh` when the page's table
//! changed (realtime pages only) and ends with `signed-out` once the page's
//! session is signed out or expires.

use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::realtime::{ChangeEvent, RealtimeBridge};
use crate::session::{Session, SessionStore, SessionSubscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    Refresh,
    SignedOut,
}

impl PageEvent {
    /// Event name as seen by the browser.
    pub fn name(self) -> &'static str {
        match self {
            PageEvent::Refresh => "refresh",
            PageEvent::SignedOut => "signed-out",
        }
    }
}

struct Watch {
    subscription: SessionSubscription,
    bridge: Option<RealtimeBridge>,
    session_id: Uuid,
    expires_at: DateTime<Utc>,
    finished: bool,
}

enum Wake {
    SignedOut,
    Changed(bool),
}

/// Events for one page of one session. The bridge, if any, is dropped
/// together with the stream.
pub fn page_events(
    sessions: &SessionStore,
    session: &Session,
    bridge: Option<RealtimeBridge>,
) -> impl Stream<Item = PageEvent> + Send + use<> {
    let watch = Watch {
        subscription: sessions.subscribe(),
        bridge,
        session_id: session.id,
        expires_at: session.expires_at,
        finished: false,
    };

    futures::stream::unfold(watch, |mut watch| async move {
        if watch.finished {
            return None;
        }
        loop {
            let until_expiry = (watch.expires_at - Utc::now()).to_std().unwrap_or_default();
            // Changes published before the sign-out are still delivered.
            let wake = tokio::select! {
                biased;
                changed = next_change(&mut watch.bridge) => Wake::Changed(changed.is_some()),
                _ = watch.subscription.signed_out(watch.session_id) => Wake::SignedOut,
                _ = tokio::time::sleep(until_expiry) => Wake::SignedOut,
            };
            match wake {
                Wake::SignedOut => {
                    tracing::debug!(session_id = %watch.session_id, "Closing page stream");
                    watch.finished = true;
                    return Some((PageEvent::SignedOut, watch));
                }
                Wake::Changed(true) => return Some((PageEvent::Refresh, watch)),
                // Feed closed; keep watching the session.
                Wake::Changed(false) => watch.bridge = None,
            }
        }
    })
}

async fn next_change(bridge: &mut Option<RealtimeBridge>) -> Option<ChangeEvent> {
    match bridge {
        Some(bridge) => bridge.changed().await,
        None => std::future::pending().await,
    }
}
