//! Scripted completion provider for tests
//!
//! Replays queued results in order and records every prompt it receives.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CompletionError, CompletionProvider};
use crate::config::GenerationSettings;

#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    prompts: Mutex<Vec<String>>,
    /// Explicit generation parameters, one entry per `complete_with` call
    generations: Mutex<Vec<GenerationSettings>>,
    latency: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every reply, to keep a request outstanding for a while
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, error: CompletionError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn generations(&self) -> Vec<GenerationSettings> {
        self.generations.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::MalformedResponse("script exhausted".into())))
    }

    async fn complete_with(&self, prompt: &str, generation: &GenerationSettings) -> Result<String, CompletionError> {
        self.generations.lock().unwrap().push(generation.clone());
        self.complete(prompt).await
    }
}
