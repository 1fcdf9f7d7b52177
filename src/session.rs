//! Session registry.
//!
//! Maps opaque session ids to their [`ConversationMemory`]. Each entry's
//! memory sits behind its own async mutex so a caller can hold it across
//! a whole pipeline run: runs on one session serialize, runs on different
//! sessions proceed concurrently. The id map itself is guarded by one
//! synchronous mutex that is never held across an `.await`.
//!
//! Retention is opt-in. With neither `ttl` nor `max_sessions` set, the
//! registry grows without bound for the process lifetime. An expired or
//! evicted id is indistinguishable from one that was never issued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use scheme_nav_core::{ConversationMemory, PipelineError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::config::SessionsConfig;

/// One live session.
pub struct SessionEntry {
    id: String,
    memory: AsyncMutex<ConversationMemory>,
}

impl SessionEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Exclusive access to the session's memory.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, ConversationMemory> {
        self.memory.lock().await
    }
}

struct Slot {
    entry: Arc<SessionEntry>,
    last_used: Instant,
}

pub struct SessionRegistry {
    slots: Mutex<HashMap<String, Slot>>,
    ttl: Option<Duration>,
    max_sessions: Option<usize>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// An unbounded registry.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl: None,
            max_sessions: None,
        }
    }

    pub fn from_config(config: &SessionsConfig) -> Self {
        let mut registry = Self::new();
        registry.ttl = config.ttl_secs.map(Duration::from_secs);
        registry.max_sessions = config.max_sessions;
        registry
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issue a fresh session with empty memory.
    pub fn create(&self) -> Arc<SessionEntry> {
        let id = uuid::Uuid::new_v4().to_string();
        let entry = Arc::new(SessionEntry {
            id: id.clone(),
            memory: AsyncMutex::new(ConversationMemory::new()),
        });

        let now = Instant::now();
        let mut slots = self.slots();
        self.sweep(&mut slots, now);
        if let Some(max) = self.max_sessions {
            while slots.len() >= max {
                let Some(oldest) = slots
                    .iter()
                    .min_by_key(|(_, slot)| slot.last_used)
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                slots.remove(&oldest);
                debug!(session_id = %oldest, "evicted least recently used session");
            }
        }
        slots.insert(
            id,
            Slot {
                entry: entry.clone(),
                last_used: now,
            },
        );
        entry
    }

    /// Look up a live session and mark it used.
    pub fn get(&self, id: &str) -> Result<Arc<SessionEntry>, PipelineError> {
        let now = Instant::now();
        let mut slots = self.slots();

        let expired = match slots.get(id) {
            Some(slot) => self.is_expired(slot, now),
            None => return Err(PipelineError::SessionNotFound(id.to_string())),
        };
        if expired {
            slots.remove(id);
            debug!(session_id = %id, "session expired");
            return Err(PipelineError::SessionNotFound(id.to_string()));
        }

        match slots.get_mut(id) {
            Some(slot) => {
                slot.last_used = now;
                Ok(slot.entry.clone())
            }
            None => Err(PipelineError::SessionNotFound(id.to_string())),
        }
    }

    /// Resolve `id` if given, otherwise issue a new session.
    ///
    /// An unknown id is [`PipelineError::SessionNotFound`]; it never
    /// creates a session under a caller-chosen id.
    pub fn get_or_create(&self, id: Option<&str>) -> Result<Arc<SessionEntry>, PipelineError> {
        match id {
            Some(id) => self.get(id),
            None => Ok(self.create()),
        }
    }

    /// Forget a session. Returns whether it was present.
    pub fn remove(&self, id: &str) -> bool {
        self.slots().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        let now = Instant::now();
        self.slots()
            .get(id)
            .is_some_and(|slot| !self.is_expired(slot, now))
    }

    /// Number of entries held, including any not yet swept.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session idle longer than the TTL. Returns how many.
    pub fn purge_expired(&self) -> usize {
        let mut slots = self.slots();
        self.sweep(&mut slots, Instant::now())
    }

    fn is_expired(&self, slot: &Slot, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(slot.last_used) > ttl)
    }

    fn sweep(&self, slots: &mut HashMap<String, Slot>, now: Instant) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let before = slots.len();
        slots.retain(|_, slot| !self.is_expired(slot, now));
        before - slots.len()
    }
}
