//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the registry of signed-in sessions.

use crate::config::Config;
use chrono::{DateTime, Duration, Utc};
use festival_stories_core::ports::{ImageNormalizer, RecordStore, SpeechToTextService};
use festival_stories_core::{EnhancementGateway, IdentityService, SessionContext};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// How long a login stays valid.
pub const SESSION_TTL_DAYS: i64 = 30;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RecordStore>,
    pub identity: IdentityService,
    pub enhancement: Arc<EnhancementGateway>,
    pub images: Arc<dyn ImageNormalizer>,
    /// `None` when no API key is configured.
    pub sst: Option<Arc<dyn SpeechToTextService>>,
    pub sessions: SessionRegistry,
}

//=========================================================================================
// Session Registry
//=========================================================================================

/// One visitor's context. Locked for the duration of a request.
pub type SessionHandle = Arc<tokio::sync::Mutex<SessionContext>>;

/// The session resolved by the auth middleware, available to protected handlers.
#[derive(Clone)]
pub struct CurrentSession {
    pub id: String,
    pub context: SessionHandle,
}

struct SessionEntry {
    context: SessionHandle,
    expires_at: DateTime<Utc>,
}

/// In-memory map from session id to context. Contexts are dropped at
/// logout, on access after they expire, or by the sweep every login runs.
pub struct SessionRegistry {
    entries: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Duration::days(SESSION_TTL_DAYS))
    }
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A fresh, unauthenticated context with a random id.
    pub fn new_context() -> SessionContext {
        SessionContext::new(Uuid::new_v4().to_string())
    }

    /// Registers a signed-in context and returns its id. Expired contexts
    /// are swept first, along with their drafts.
    pub fn insert(&self, context: SessionContext) -> String {
        let now = Utc::now();
        let id = context.id().to_string();
        let entry = SessionEntry {
            context: Arc::new(tokio::sync::Mutex::new(context)),
            expires_at: now + self.ttl,
        };

        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let swept = before - entries.len();
        if swept > 0 {
            debug!(swept, "Dropped expired sessions");
        }
        entries.insert(id.clone(), entry);
        id
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        let mut entries = self.entries();
        let expired = entries.get(id)?.expires_at <= Utc::now();
        if expired {
            debug!(session = %id, "Session expired");
            entries.remove(id);
            return None;
        }
        entries.get(id).map(|entry| entry.context.clone())
    }

    pub fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.entries().remove(id).map(|entry| entry.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_resolve_until_removed() {
        let registry = SessionRegistry::default();
        let id = registry.insert(SessionRegistry::new_context());

        assert!(registry.get(&id).is_some());
        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn logins_sweep_sessions_that_were_never_revisited() {
        let registry = SessionRegistry::new(Duration::seconds(-1));
        for _ in 0..1000 {
            registry.insert(SessionRegistry::new_context());
        }

        // Only the newest entry remains; it is already past its expiry too.
        assert_eq!(registry.entries().len(), 1);
    }

    #[test]
    fn live_sessions_survive_the_sweep() {
        let registry = SessionRegistry::default();
        let first = registry.insert(SessionRegistry::new_context());
        let second = registry.insert(SessionRegistry::new_context());

        assert_eq!(registry.entries().len(), 2);
        assert!(registry.get(&first).is_some());
        assert!(registry.get(&second).is_some());
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let registry = SessionRegistry::new(Duration::seconds(-1));
        let id = registry.insert(SessionRegistry::new_context());

        assert!(registry.get(&id).is_none());
        assert!(registry.remove(&id).is_none());
    }
}
