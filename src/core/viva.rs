//! Viva engine
//!
//! Owns the completion provider, the history store and every live session.
//! Routes talk to sessions only through this type.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::conversation::{Difficulty, Topic};
use crate::providers::CompletionProvider;

use super::memory::{HistoryStore, InterviewSession};
use super::runner::{SessionHandle, SessionRunner};
use super::session::{Outcome, SessionSnapshot, VivaError, VivaSession};

/// An outcome together with the session state right after it
#[derive(Debug)]
pub struct Turn {
    pub outcome: Outcome,
    pub session: SessionSnapshot,
}

/// Static catalogue shown before a viva starts
#[derive(Debug, Clone, Serialize)]
pub struct Catalogue {
    pub topics: Vec<Topic>,
    pub difficulties: Vec<Difficulty>,
}

/// Sessions untouched for this long are dropped on the next `start`
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct LiveSession {
    handle: SessionHandle,
    last_used: Instant,
}

pub struct VivaEngine {
    provider: Arc<dyn CompletionProvider>,
    history: Arc<dyn HistoryStore>,
    tick_period: Duration,
    idle_timeout: Duration,
    sessions: RwLock<HashMap<Uuid, LiveSession>>,
}

impl VivaEngine {
    pub fn new(provider: Arc<dyn CompletionProvider>, history: Arc<dyn HistoryStore>, tick_period: Duration) -> Self {
        Self {
            provider,
            history,
            tick_period,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn catalogue(&self) -> Catalogue {
        Catalogue {
            topics: Topic::ALL.to_vec(),
            difficulties: Difficulty::ALL.to_vec(),
        }
    }

    /// Creates a session and asks for the opening question.
    ///
    /// The session is registered even when the opening request fails, so
    /// the caller can retry `start` on it.
    pub async fn start(&self, topic: Topic, difficulty: Difficulty) -> Result<Turn, VivaError> {
        self.evict_idle().await;

        let mut session = VivaSession::new(Arc::clone(&self.history));
        session.select_topic(topic)?;
        session.set_difficulty(difficulty)?;

        let handle = SessionRunner::spawn(session, Arc::clone(&self.provider), self.tick_period);
        self.sessions.write().await.insert(
            handle.id(),
            LiveSession {
                handle: handle.clone(),
                last_used: Instant::now(),
            },
        );

        let outcome = handle.start().await?;
        Self::turn(&handle, outcome).await
    }

    /// Retries `start` on a session whose opening request failed
    pub async fn restart(&self, id: Uuid) -> Result<Turn, VivaError> {
        let handle = self.handle(id).await?;
        let outcome = handle.start().await?;
        Self::turn(&handle, outcome).await
    }

    pub async fn answer(&self, id: Uuid, message: &str) -> Result<Turn, VivaError> {
        let handle = self.handle(id).await?;
        let outcome = handle.answer(message).await?;
        Self::turn(&handle, outcome).await
    }

    /// Requests the report. A session that ended is removed from the
    /// registry; the returned turn is its last snapshot.
    pub async fn end(&self, id: Uuid) -> Result<Turn, VivaError> {
        let handle = self.handle(id).await?;
        let outcome = handle.end().await?;
        let turn = Self::turn(&handle, outcome).await?;

        if matches!(turn.outcome, Outcome::Reported(_)) {
            self.remove(id).await;
            tracing::info!(session = %id, "viva session finished and released");
        }
        Ok(turn)
    }

    pub async fn transcribe(&self, id: Uuid, text: &str, is_final: bool) -> Result<SessionSnapshot, VivaError> {
        let handle = self.handle(id).await?;
        handle.transcribe(text, is_final)?;
        handle.snapshot().await
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<SessionSnapshot, VivaError> {
        self.handle(id).await?.snapshot().await
    }

    /// Drops a session. Any in-flight result for it is discarded.
    pub async fn close(&self, id: Uuid) -> Result<(), VivaError> {
        if !self.remove(id).await {
            return Err(VivaError::SessionNotFound(id));
        }
        tracing::info!(session = %id, "viva session closed");
        Ok(())
    }

    pub async fn history(&self) -> Vec<InterviewSession> {
        self.history.load().await
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn handle(&self, id: Uuid) -> Result<SessionHandle, VivaError> {
        let mut sessions = self.sessions.write().await;
        let live = sessions.get_mut(&id).ok_or(VivaError::SessionNotFound(id))?;
        live.last_used = Instant::now();
        Ok(live.handle.clone())
    }

    async fn remove(&self, id: Uuid) -> bool {
        match self.sessions.write().await.remove(&id) {
            Some(live) => {
                live.handle.shutdown();
                true
            }
            None => false,
        }
    }

    async fn evict_idle(&self) {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, live| {
            let keep = live.last_used.elapsed() < self.idle_timeout;
            if !keep {
                tracing::info!(session = %id, "evicting idle viva session");
                live.handle.shutdown();
            }
            keep
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!("{} idle session(s) evicted", evicted);
        }
    }

    async fn turn(handle: &SessionHandle, outcome: Outcome) -> Result<Turn, VivaError> {
        Ok(Turn {
            outcome,
            session: handle.snapshot().await?,
        })
    }
}
