//! Cookie-identified server-side sessions.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;
use uuid::Uuid;

use crate::storage::SessionStore;

pub const SESSION_COOKIE: &str = "todos_session";

/// State private to one browser session.
#[derive(Clone, Debug)]
pub struct Session {
    id: Uuid,
    store: Arc<Mutex<SessionStore>>,
}

impl Session {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            store: Arc::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The session's own list collection.
    pub fn store(&self) -> Arc<Mutex<SessionStore>> {
        self.store.clone()
    }
}

/// Sessions idle for longer than this are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug)]
struct Entry {
    session: Session,
    last_seen: Instant,
}

#[derive(Clone, Debug)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, Entry>>>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            idle_timeout,
        }
    }

    /// Looks up the session for `id`, starting a new one when there is none
    /// or when it has been idle too long. The flag is true for new sessions.
    pub async fn resolve(&self, id: Option<Uuid>) -> (Session, bool) {
        self.resolve_at(id, Instant::now()).await
    }

    async fn resolve_at(&self, id: Option<Uuid>, now: Instant) -> (Session, bool) {
        let mut sessions = self.sessions.lock().await;

        if let Some(entry) = id.and_then(|id| sessions.get_mut(&id)) {
            if !self.is_idle(entry, now) {
                entry.last_seen = now;
                return (entry.session.clone(), false);
            }
        }

        // Whatever is left under `id` has gone idle.
        if let Some(id) = id.filter(|id| sessions.remove(id).is_some()) {
            debug!(session = %id, "expired idle session");
        }

        let session = Session::new();
        sessions.insert(
            session.id,
            Entry {
                session: session.clone(),
                last_seen: now,
            },
        );

        debug!(session = %session.id, "started session");

        (session, true)
    }

    /// Drops every session idle at `now`, returning how many went.
    pub async fn expire(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_idle(entry, now));
        before - sessions.len()
    }

    fn is_idle(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_seen) >= self.idle_timeout
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

fn session_cookie(id: Uuid) -> Option<HeaderValue> {
    let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    HeaderValue::from_str(&cookie).ok()
}

/// Attaches a [`Session`] to every request and hands out the cookie for new ones.
pub async fn attach(
    State(registry): State<SessionRegistry>,
    mut request: Request,
    next: Next,
) -> Response {
    let (session, created) = registry.resolve(session_id(request.headers())).await;
    let id = session.id;
    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;

    if let Some(cookie) = created.then(|| session_cookie(id)).flatten() {
        response.headers_mut().append(SET_COOKIE, cookie);
    }

    response
}
