use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::upload_slot::UploadSlot;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("session limit of {limit} reached")]
    LimitReached { limit: usize },
}

#[derive(Debug)]
struct SessionEntry {
    slot: Arc<Mutex<UploadSlot>>,
    last_seen: Instant,
}

/// Upload slots keyed by session id.
///
/// Bounded two ways: at most `max_sessions` live at once, and a session
/// untouched for `idle_timeout` is dropped together with its document.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            idle_timeout,
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub async fn create(&self) -> Result<Uuid, SessionError> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        Self::evict_expired(&mut sessions, now, self.idle_timeout);

        if sessions.len() >= self.max_sessions {
            warn!(limit = self.max_sessions, "Session limit reached");
            return Err(SessionError::LimitReached {
                limit: self.max_sessions,
            });
        }

        let id = Uuid::new_v4();
        sessions.insert(
            id,
            SessionEntry {
                slot: Arc::new(Mutex::new(UploadSlot::new())),
                last_seen: now,
            },
        );
        info!(session_id = %id, active_sessions = sessions.len(), "Session created");
        Ok(id)
    }

    /// Look up a session and mark it as used. An idle session is treated
    /// as already gone.
    pub async fn get(&self, id: &Uuid) -> Option<Arc<Mutex<UploadSlot>>> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        match sessions.get_mut(id) {
            None => return None,
            Some(entry) if now.duration_since(entry.last_seen) < self.idle_timeout => {
                entry.last_seen = now;
                return Some(Arc::clone(&entry.slot));
            }
            Some(_) => {}
        }

        sessions.remove(id);
        debug!(session_id = %id, "Session expired on access");
        None
    }

    /// End a session. Its document is dropped once no request holds the slot.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id);
        if let Some(entry) = &removed {
            entry.slot.lock().await.clear();
            info!(session_id = %id, "Session ended");
        }
        removed.is_some()
    }

    /// Drop every session idle for longer than the timeout. Returns how many
    /// were dropped.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        Self::evict_expired(&mut sessions, Instant::now(), self.idle_timeout)
    }

    /// Run [`Self::evict_idle`] on a fixed period until the store is dropped
    /// by every other owner.
    pub async fn sweep_every(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if Arc::strong_count(&self) == 1 {
                break;
            }
            self.evict_idle().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn evict_expired(sessions: &mut HashMap<Uuid, SessionEntry>, now: Instant, idle_timeout: Duration) -> usize {
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < idle_timeout);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, active_sessions = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }
}
