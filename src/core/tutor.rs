//! Personalised C++ tutor chat
//!
//! A chat opens with a learning roadmap generated from the student's course
//! preferences; every later message is answered with the whole chat
//! replayed. Completion failures never surface as errors: the tutor replies
//! with an apology and the chat stays usable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::GenerationSettings;
use crate::conversation::Message;
use crate::providers::CompletionProvider;

use super::prompts;
use super::viva::DEFAULT_IDLE_TIMEOUT;

const ROADMAP_APOLOGY: &str = "I apologize, but I encountered an error while generating your personalized roadmap. Please try again or contact support.";
const TUTOR_APOLOGY: &str = "I apologize, but I encountered an error. Please try again or contact support.";

/// Answers from the course questionnaire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoursePreferences {
    pub programming_experience: String,
    pub cpp_level: String,
    pub study_time: String,
    pub learning_goal: String,
    pub preferred_learning: String,
}

/// Sampling used for tutor replies: creative and long-form
pub fn tutor_generation() -> GenerationSettings {
    GenerationSettings::new(1.0, 40, 0.95, 8192)
}

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Tutor chat not found: {0}")]
    ChatNotFound(Uuid),
}

/// The tutor's latest message and the chat so far
#[derive(Debug, Clone, Serialize)]
pub struct TutorReply {
    pub chat_id: Uuid,
    pub message: Message,
    /// Why the tutor apologised instead of answering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub transcript: Vec<Message>,
}

struct TutorChat {
    preferences: CoursePreferences,
    transcript: Vec<Message>,
}

struct LiveChat {
    chat: Arc<Mutex<TutorChat>>,
    last_used: Instant,
}

pub struct TutorEngine {
    provider: Arc<dyn CompletionProvider>,
    idle_timeout: Duration,
    chats: RwLock<HashMap<Uuid, LiveChat>>,
}

impl TutorEngine {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            chats: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Opens a chat and asks for the personalised roadmap
    pub async fn open(&self, preferences: CoursePreferences) -> TutorReply {
        self.evict_idle().await;

        let chat_id = Uuid::new_v4();
        let prompt = prompts::roadmap_prompt(&preferences);
        let (message, error) = self.reply(chat_id, &prompt, ROADMAP_APOLOGY).await;

        let transcript = vec![message.clone()];
        let chat = TutorChat {
            preferences,
            transcript: transcript.clone(),
        };
        self.chats.write().await.insert(
            chat_id,
            LiveChat {
                chat: Arc::new(Mutex::new(chat)),
                last_used: Instant::now(),
            },
        );

        tracing::info!(chat = %chat_id, "tutor chat opened");
        TutorReply {
            chat_id,
            message,
            error,
            transcript,
        }
    }

    /// Sends a student message. Messages to one chat are answered in order.
    pub async fn send(&self, chat_id: Uuid, text: &str) -> Result<TutorReply, TutorError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TutorError::EmptyMessage);
        }

        let chat = self.chat(chat_id).await?;
        let mut chat = chat.lock().await;

        let prompt = prompts::tutor_prompt(&chat.preferences, &chat.transcript, text);
        chat.transcript.push(Message::user(text));

        let (message, error) = self.reply(chat_id, &prompt, TUTOR_APOLOGY).await;
        chat.transcript.push(message.clone());

        Ok(TutorReply {
            chat_id,
            message,
            error,
            transcript: chat.transcript.clone(),
        })
    }

    pub async fn transcript(&self, chat_id: Uuid) -> Result<Vec<Message>, TutorError> {
        let chat = self.chat(chat_id).await?;
        let chat = chat.lock().await;
        Ok(chat.transcript.clone())
    }

    pub async fn close(&self, chat_id: Uuid) -> Result<(), TutorError> {
        if self.chats.write().await.remove(&chat_id).is_none() {
            return Err(TutorError::ChatNotFound(chat_id));
        }
        tracing::info!(chat = %chat_id, "tutor chat closed");
        Ok(())
    }

    pub async fn chat_count(&self) -> usize {
        self.chats.read().await.len()
    }

    async fn reply(&self, chat_id: Uuid, prompt: &str, apology: &str) -> (Message, Option<String>) {
        match self.provider.complete_with(prompt, &tutor_generation()).await {
            Ok(text) => (Message::assistant(text), None),
            Err(e) => {
                tracing::warn!(chat = %chat_id, "tutor request failed: {}", e);
                (Message::assistant(apology), Some(e.to_string()))
            }
        }
    }

    async fn chat(&self, chat_id: Uuid) -> Result<Arc<Mutex<TutorChat>>, TutorError> {
        let mut chats = self.chats.write().await;
        let live = chats.get_mut(&chat_id).ok_or(TutorError::ChatNotFound(chat_id))?;
        live.last_used = Instant::now();
        Ok(Arc::clone(&live.chat))
    }

    async fn evict_idle(&self) {
        let idle_timeout = self.idle_timeout;
        self.chats.write().await.retain(|id, live| {
            let keep = live.last_used.elapsed() < idle_timeout;
            if !keep {
                tracing::info!(chat = %id, "evicting idle tutor chat");
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::providers::scripted::ScriptedProvider;
    use crate::providers::CompletionError;

    fn preferences() -> CoursePreferences {
        CoursePreferences {
            programming_experience: "None".into(),
            cpp_level: "Beginner".into(),
            study_time: "1 hour a day".into(),
            learning_goal: "Competitive programming".into(),
            preferred_learning: "Examples".into(),
        }
    }

    fn engine(provider: &Arc<ScriptedProvider>) -> TutorEngine {
        TutorEngine::new(provider.clone())
    }

    #[tokio::test]
    async fn test_open_and_chat() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .reply("Week 1: variables and loops")
                .reply("A pointer holds an address."),
        );
        let tutor = engine(&provider);

        let opened = tutor.open(preferences()).await;
        assert!(opened.error.is_none());
        assert_eq!(opened.transcript, vec![Message::assistant("Week 1: variables and loops")]);

        let reply = tutor.send(opened.chat_id, "  What is a pointer?  ").await.unwrap();
        assert_eq!(reply.message.content, "A pointer holds an address.");
        assert_eq!(reply.transcript.len(), 3);
        assert_eq!(reply.transcript[1], Message::user("What is a pointer?"));

        let prompts = provider.prompts();
        assert!(prompts[0].contains("Learning Goal: Competitive programming"));
        assert!(prompts[1].contains("Tutor: Week 1: variables and loops"));
        assert!(prompts[1].contains("Student: What is a pointer?"));

        assert_eq!(provider.generations(), vec![tutor_generation(), tutor_generation()]);
        assert_eq!(tutor.transcript(opened.chat_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failures_become_apologies() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .fail(CompletionError::MissingApiKey)
                .fail(CompletionError::Http {
                    status: 500,
                    message: "boom".into(),
                }),
        );
        let tutor = engine(&provider);

        let opened = tutor.open(preferences()).await;
        assert_eq!(opened.message.content, ROADMAP_APOLOGY);
        assert!(opened.error.is_some());

        let reply = tutor.send(opened.chat_id, "Hello?").await.unwrap();
        assert_eq!(reply.message.content, TUTOR_APOLOGY);
        assert_eq!(reply.message.role, Role::Assistant);
        assert_eq!(reply.transcript.len(), 3);
    }

    #[tokio::test]
    async fn test_blank_and_unknown() {
        let provider = Arc::new(ScriptedProvider::new().reply("Roadmap"));
        let tutor = engine(&provider);
        let opened = tutor.open(CoursePreferences::default()).await;

        assert!(matches!(tutor.send(opened.chat_id, " \n").await, Err(TutorError::EmptyMessage)));
        assert_eq!(provider.prompts().len(), 1);

        let missing = Uuid::new_v4();
        assert!(matches!(tutor.send(missing, "Hi").await, Err(TutorError::ChatNotFound(id)) if id == missing));

        tutor.close(opened.chat_id).await.unwrap();
        assert_eq!(tutor.chat_count().await, 0);
        assert!(tutor.close(opened.chat_id).await.is_err());
    }

    #[tokio::test]
    async fn test_idle_chats_are_evicted_on_open() {
        let provider = Arc::new(ScriptedProvider::new().reply("One").reply("Two"));
        let tutor = engine(&provider).with_idle_timeout(Duration::ZERO);

        let first = tutor.open(preferences()).await;
        let second = tutor.open(preferences()).await;

        assert_eq!(tutor.chat_count().await, 1);
        assert!(tutor.transcript(first.chat_id).await.is_err());
        assert!(tutor.transcript(second.chat_id).await.is_ok());
    }
}
