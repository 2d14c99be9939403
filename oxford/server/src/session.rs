//! Process-wide session registry.
//!
//! The store is the single source of truth for "is this visitor signed in".
//! The browser only holds an opaque session id (inside the `auth_token`
//! cookie); a session that is not in the store is treated as absent even if
//! the cookie is still valid.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::auth::provider::{IdentityProvider, ProviderError, ProviderSession};

const EVENT_CAPACITY: usize = 64;

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// An authenticated browser visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub user: User,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Builds a session from a successful provider sign-in.
    pub fn from_provider(signed_in: ProviderSession, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: User {
                id: signed_in.user_id,
                email: signed_in.email,
            },
            access_token: signed_in.access_token,
            expires_at: now + Duration::seconds(signed_in.expires_in),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Change notification published by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Uuid),
    SignedOut(Uuid),
}

/// Registry of live sessions.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sessions: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Returns the live session with this id.
    ///
    /// An expired session is dropped from the store and reported to
    /// subscribers as signed out.
    pub async fn get_session(&self, id: &Uuid) -> Option<Session> {
        let session = self.sessions.read().await.get(id).cloned()?;
        if !session.is_expired(Utc::now()) {
            return Some(session);
        }
        if self.sessions.write().await.remove(id).is_some() {
            tracing::info!(session_id = %id, "Session expired");
            self.notify(SessionEvent::SignedOut(*id));
        }
        None
    }

    /// Subscribes to sign-in and sign-out notifications.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.events.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Number of sessions held, expired ones included until pruned.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Registers an already authenticated session. Sessions that expired
    /// without being looked up again are dropped first.
    pub async fn insert(&self, session: Session) {
        let id = session.id;
        let expired = {
            let mut sessions = self.sessions.write().await;
            let expired = prune_expired(&mut sessions, Utc::now());
            sessions.insert(id, session);
            expired
        };
        for old in expired {
            tracing::info!(session_id = %old, "Session expired");
            self.notify(SessionEvent::SignedOut(old));
        }
        self.notify(SessionEvent::SignedIn(id));
    }

    /// Authenticates with the identity provider and registers the session.
    ///
    /// A provider failure is returned as-is and nothing is registered.
    #[tracing::instrument(skip(self, provider, password))]
    pub async fn sign_in(
        &self,
        provider: &dyn IdentityProvider,
        email: &str,
        password: &str,
    ) -> Result<Session, ProviderError> {
        let signed_in = provider.sign_in_with_password(email, password).await?;
        let session = Session::from_provider(signed_in, Utc::now());
        self.insert(session.clone()).await;
        tracing::info!(session_id = %session.id, "Signed in");
        Ok(session)
    }

    /// Signs out with the identity provider, then forgets the session.
    ///
    /// On provider failure the session stays registered so the user can
    /// retry.
    #[tracing::instrument(skip(self, provider))]
    pub async fn sign_out(
        &self,
        provider: &dyn IdentityProvider,
        id: &Uuid,
    ) -> Result<(), ProviderError> {
        let Some(session) = self.sessions.read().await.get(id).cloned() else {
            return Ok(());
        };
        provider.sign_out(&session.access_token).await?;
        if self.sessions.write().await.remove(id).is_some() {
            self.notify(SessionEvent::SignedOut(*id));
        }
        tracing::info!(session_id = %id, "Signed out");
        Ok(())
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

fn prune_expired(sessions: &mut HashMap<Uuid, Session>, now: DateTime<Utc>) -> Vec<Uuid> {
    let expired: Vec<Uuid> = sessions
        .values()
        .filter(|session| session.is_expired(now))
        .map(|session| session.id)
        .collect();
    for id in &expired {
        sessions.remove(id);
    }
    expired
}

/// Live subscription to session changes. Dropping it unsubscribes.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// Waits for the next event; `None` once the store is gone.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Session subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Waits until the given session is signed out.
    pub async fn signed_out(&mut self, id: Uuid) {
        while let Some(event) = self.next().await {
            if event == SessionEvent::SignedOut(id) {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}
