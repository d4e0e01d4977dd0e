//! Durable chat sessions with ordering and change notification.
//!
//! Sessions are loaded eagerly when the store is opened and the whole map
//! is written back under [`SESSIONS_KEY`] after every mutation. Writes are
//! applied to a working copy first, so a failed write leaves both memory
//! and storage untouched.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::ChatMessage;
use crate::core::storage::{KeyValueStore, StorageError};

pub const SESSIONS_KEY: &str = "chat_sessions";
/// Where an unreadable [`SESSIONS_KEY`] value is kept before it is replaced.
pub const CORRUPT_SESSIONS_KEY: &str = "chat_sessions.corrupt";
pub const DEFAULT_SESSION_NAME: &str = "New chat";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Milliseconds since the Unix epoch.
    pub created: i64,
    pub last_updated: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ChatSession {
    pub fn is_pinned(&self) -> bool {
        self.pinned.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Created(String),
    Saved(String),
    Deleted(String),
    Renamed(String),
    PinToggled(String),
    MessageAppended(String),
    Cleared,
}

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl ListenerRegistry {
    fn add(&self, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn notify(&self, event: &SessionEvent) {
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(?event, "Session listener panicked; continuing");
            }
        }
    }
}

/// Returned by [`SessionStore::subscribe`]. Dropping the handle keeps the
/// listener registered; call [`ListenerHandle::unsubscribe`] to remove it.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct ListenerHandle {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl ListenerHandle {
    /// Returns false if the listener was already gone.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.remove(self.id))
            .unwrap_or(false)
    }
}

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    sessions: Mutex<HashMap<String, ChatSession>>,
    listeners: Arc<ListenerRegistry>,
    clock: Clock,
}

impl SessionStore {
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        Self::with_clock(storage, || chrono::Utc::now().timestamp_millis())
    }

    /// Open with a custom millisecond clock.
    pub fn with_clock<C>(storage: Arc<dyn KeyValueStore>, clock: C) -> Result<Self, StorageError>
    where
        C: Fn() -> i64 + Send + Sync + 'static,
    {
        let sessions = Self::load(storage.as_ref())?;
        debug!(count = sessions.len(), "Loaded chat sessions");
        Ok(Self {
            storage,
            sessions: Mutex::new(sessions),
            listeners: Arc::new(ListenerRegistry::default()),
            clock: Box::new(clock),
        })
    }

    fn load(storage: &dyn KeyValueStore) -> Result<HashMap<String, ChatSession>, StorageError> {
        let Some(raw) = storage.get(SESSIONS_KEY)? else {
            return Ok(HashMap::new());
        };
        match serde_json::from_str::<HashMap<String, ChatSession>>(&raw) {
            Ok(sessions) => Ok(sessions),
            Err(err) => {
                storage.set(CORRUPT_SESSIONS_KEY, &raw)?;
                warn!(
                    backup = CORRUPT_SESSIONS_KEY,
                    "Ignoring unreadable saved sessions: {err}"
                );
                Ok(HashMap::new())
            }
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = self.listeners.add(Arc::new(listener));
        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.listeners),
        }
    }

    pub fn sessions(&self) -> Vec<ChatSession> {
        self.lock().values().cloned().collect()
    }

    pub fn session(&self, id: &str) -> Option<ChatSession> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Pinned sessions first, then most recently updated first.
    pub fn sorted_sessions(&self) -> Vec<ChatSession> {
        let mut sessions = self.sessions();
        sessions.sort_by(|a, b| {
            b.is_pinned()
                .cmp(&a.is_pinned())
                .then_with(|| b.last_updated.cmp(&a.last_updated))
                .then_with(|| b.created.cmp(&a.created))
                .then_with(|| a.id.cmp(&b.id))
        });
        sessions
    }

    pub fn create_session(&self, model: &str) -> Result<ChatSession, StorageError> {
        let now = (self.clock)();
        self.commit(|sessions| {
            let mut stamp = now;
            while sessions.contains_key(&stamp.to_string()) {
                stamp += 1;
            }
            let session = ChatSession {
                id: stamp.to_string(),
                name: DEFAULT_SESSION_NAME.to_string(),
                model: model.to_string(),
                messages: Vec::new(),
                created: now,
                last_updated: now,
                pinned: None,
                icon: None,
            };
            sessions.insert(session.id.clone(), session.clone());
            let event = SessionEvent::Created(session.id.clone());
            (session, Some(event))
        })
    }

    /// Insert or replace by id. Replacing an existing session never moves
    /// its `last_updated` backwards.
    pub fn save_session(&self, mut session: ChatSession) -> Result<ChatSession, StorageError> {
        self.commit(|sessions| {
            if let Some(previous) = sessions.get(&session.id) {
                session.last_updated = session.last_updated.max(previous.last_updated + 1);
            }
            sessions.insert(session.id.clone(), session.clone());
            let event = SessionEvent::Saved(session.id.clone());
            (session, Some(event))
        })
    }

    /// Returns false (and notifies nobody) when `id` does not exist.
    pub fn delete_session(&self, id: &str) -> Result<bool, StorageError> {
        self.commit(|sessions| match sessions.remove(id) {
            Some(_) => (true, Some(SessionEvent::Deleted(id.to_string()))),
            None => (false, None),
        })
    }

    pub fn rename_session(&self, id: &str, name: &str) -> Result<bool, StorageError> {
        let now = (self.clock)();
        self.commit(|sessions| match sessions.get_mut(id) {
            Some(session) => {
                session.name = name.to_string();
                touch(session, now);
                (true, Some(SessionEvent::Renamed(id.to_string())))
            }
            None => (false, None),
        })
    }

    /// Flip the pinned flag; returns the new state, or `None` for an
    /// unknown id.
    pub fn toggle_pin_session(&self, id: &str) -> Result<Option<bool>, StorageError> {
        let now = (self.clock)();
        self.commit(|sessions| match sessions.get_mut(id) {
            Some(session) => {
                let pinned = !session.is_pinned();
                session.pinned = Some(pinned);
                touch(session, now);
                (Some(pinned), Some(SessionEvent::PinToggled(id.to_string())))
            }
            None => (None, None),
        })
    }

    pub fn append_message(&self, id: &str, message: ChatMessage) -> Result<bool, StorageError> {
        let now = (self.clock)();
        self.commit(|sessions| match sessions.get_mut(id) {
            Some(session) => {
                session.messages.push(message);
                touch(session, now);
                (true, Some(SessionEvent::MessageAppended(id.to_string())))
            }
            None => (false, None),
        })
    }

    pub fn clear_all_sessions(&self) -> Result<(), StorageError> {
        self.commit(|sessions| {
            sessions.clear();
            ((), Some(SessionEvent::Cleared))
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ChatSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `mutation` to a working copy, persist it, swap it in and then
    /// notify listeners with the lock released. A mutation that reports no
    /// event changed nothing: no write and no notification.
    fn commit<R>(
        &self,
        mutation: impl FnOnce(&mut HashMap<String, ChatSession>) -> (R, Option<SessionEvent>),
    ) -> Result<R, StorageError> {
        let (result, event) = {
            let mut sessions = self.lock();
            let mut working = sessions.clone();
            let (result, event) = mutation(&mut working);
            let Some(event) = event else {
                return Ok(result);
            };
            let serialized = serde_json::to_string(&working)
                .map_err(|err| StorageError::Serialize(err.to_string()))?;
            self.storage.set(SESSIONS_KEY, &serialized)?;
            *sessions = working;
            (result, event)
        };

        debug!(?event, "Session store changed");
        self.listeners.notify(&event);
        Ok(result)
    }
}

fn touch(session: &mut ChatSession, now: i64) {
    session.last_updated = now.max(session.last_updated + 1);
}
