//! Mock viva session state machine
//!
//! A session moves `NotStarted -> InProgress -> Ended`. Each action that
//! talks to the completion service is split in two halves:
//!
//! * `begin_*` runs the guards, mutates what must change before the request
//!   (phase, transcript, busy flag) and returns the prompt to send;
//! * [`VivaSession::resolve`] applies the completion result.
//!
//! The split lets the session runner keep ticking the timer while a request
//! is outstanding. [`VivaSession::start`], [`VivaSession::answer`] and
//! [`VivaSession::end`] run both halves back to back for callers that just
//! want to await the outcome.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::conversation::{format_elapsed, Difficulty, Message, Topic, UnknownTopic};
use crate::providers::{CompletionError, CompletionProvider};

use super::memory::{HistoryStore, InterviewSession};
use super::prompts;
use super::report::{parse_report, Report, ReportFormatError};

/// Minimum transcript length before a report can be requested
pub const MIN_MESSAGES_FOR_REPORT: usize = 2;

const START_APOLOGY: &str =
    "I apologize, but I encountered an error while starting the viva. Please try again.";
const ANSWER_APOLOGY: &str = "I apologize, but I encountered an error. Please try again.";
const REPORT_APOLOGY: &str =
    "I apologize, but there was an error generating your performance report. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    InProgress,
    Ended,
}

/// Which action a completion request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Opening,
    FollowUp,
    Report,
}

/// A prompt waiting to be sent for the given action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub kind: RequestKind,
    pub prompt: String,
}

/// Guard violations; the triggering action is a no-op
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("A topic must be selected before starting")]
    TopicNotSelected,

    #[error("Answer is empty")]
    EmptyAnswer,

    #[error("A request is already in flight")]
    RequestInFlight,

    #[error("At least 2 messages are needed to end the viva, have {count}")]
    NotEnoughMessages { count: usize },

    #[error("Cannot {action} while the session is {phase:?}")]
    InvalidPhase { action: &'static str, phase: Phase },

    #[error("No request is outstanding")]
    NoRequestOutstanding,
}

/// Errors from viva operations
#[derive(Debug, thiserror::Error)]
pub enum VivaError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Report format error: {0}")]
    ReportFormat(#[from] ReportFormatError),

    #[error(transparent)]
    UnknownTopic(#[from] UnknownTopic),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Session {0} is no longer running")]
    SessionClosed(Uuid),
}

impl VivaError {
    /// Short machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            VivaError::Validation(_) => "validation",
            VivaError::Completion(CompletionError::MissingApiKey) => "missing_api_key",
            VivaError::Completion(e) if e.is_network() => "network",
            VivaError::Completion(_) => "malformed_response",
            VivaError::ReportFormat(_) => "report_format",
            VivaError::UnknownTopic(_) => "unknown_topic",
            VivaError::SessionNotFound(_) => "session_not_found",
            VivaError::SessionClosed(_) => "session_closed",
        }
    }
}

/// Result of resolving a completion request
#[derive(Debug)]
pub enum Outcome {
    /// The interviewer's reply was appended to the transcript
    Replied(Message),

    /// The viva ended with a report
    Reported(Report),

    /// The request failed; an apology was appended and the phase is unchanged
    Failed { notice: Message, error: VivaError },
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub topic: Option<Topic>,
    pub difficulty: Difficulty,
    pub phase: Phase,
    pub elapsed_seconds: u64,
    pub elapsed_display: String,
    pub busy: bool,
    pub transcript: Vec<Message>,
    pub draft: String,
    pub report: Option<Report>,
}

pub struct VivaSession {
    id: Uuid,
    topic: Option<Topic>,
    difficulty: Difficulty,
    phase: Phase,
    elapsed: u64,
    transcript: Vec<Message>,
    in_flight: Option<RequestKind>,
    report: Option<Report>,
    /// Live transcription of an answer that has not been submitted yet
    draft: String,
    history: Arc<dyn HistoryStore>,
}

impl VivaSession {
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: None,
            difficulty: Difficulty::default(),
            phase: Phase::NotStarted,
            elapsed: 0,
            transcript: Vec::new(),
            in_flight: None,
            report: None,
            draft: String::new(),
            history,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn select_topic(&mut self, topic: Topic) -> Result<(), ValidationError> {
        self.expect_phase(Phase::NotStarted, "change the topic")?;
        self.topic = Some(topic);
        Ok(())
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> Result<(), ValidationError> {
        self.expect_phase(Phase::NotStarted, "change the difficulty")?;
        self.difficulty = difficulty;
        Ok(())
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn take_draft(&mut self) -> String {
        std::mem::take(&mut self.draft)
    }

    /// Advances the timer by one second while the viva is in progress.
    /// Returns whether the timer moved.
    pub fn tick(&mut self) -> bool {
        if self.phase == Phase::InProgress {
            self.elapsed += 1;
            true
        } else {
            false
        }
    }

    pub fn begin_start(&mut self) -> Result<PendingRequest, ValidationError> {
        self.ensure_idle()?;
        self.expect_phase(Phase::NotStarted, "start")?;
        let topic = self.topic.ok_or(ValidationError::TopicNotSelected)?;

        self.phase = Phase::InProgress;
        self.elapsed = 0;
        self.transcript.clear();

        tracing::info!(session = %self.id, %topic, difficulty = %self.difficulty, "viva started");
        Ok(self.issue(RequestKind::Opening, prompts::opening_prompt(topic, self.difficulty)))
    }

    pub fn begin_answer(&mut self, input: &str) -> Result<PendingRequest, ValidationError> {
        self.ensure_idle()?;
        self.expect_phase(Phase::InProgress, "answer")?;
        let answer = input.trim();
        if answer.is_empty() {
            return Err(ValidationError::EmptyAnswer);
        }
        let topic = self.current_topic()?;

        let prompt = prompts::follow_up_prompt(topic, self.difficulty, &self.transcript, answer);
        self.transcript.push(Message::user(answer));
        Ok(self.issue(RequestKind::FollowUp, prompt))
    }

    pub fn begin_end(&mut self) -> Result<PendingRequest, ValidationError> {
        self.ensure_idle()?;
        self.expect_phase(Phase::InProgress, "end")?;
        if self.transcript.len() < MIN_MESSAGES_FOR_REPORT {
            return Err(ValidationError::NotEnoughMessages {
                count: self.transcript.len(),
            });
        }
        let topic = self.current_topic()?;

        Ok(self.issue(
            RequestKind::Report,
            prompts::report_prompt(topic, self.difficulty, &self.transcript),
        ))
    }

    /// Applies the result of the outstanding request
    pub async fn resolve(
        &mut self,
        kind: RequestKind,
        result: Result<String, CompletionError>,
    ) -> Result<Outcome, ValidationError> {
        if self.in_flight != Some(kind) {
            return Err(ValidationError::NoRequestOutstanding);
        }
        self.in_flight = None;

        let outcome = match kind {
            RequestKind::Opening | RequestKind::FollowUp => match result {
                Ok(text) => {
                    let reply = Message::assistant(text);
                    self.transcript.push(reply.clone());
                    Outcome::Replied(reply)
                }
                Err(e) => {
                    if kind == RequestKind::Opening {
                        self.phase = Phase::NotStarted;
                        self.elapsed = 0;
                        self.fail(START_APOLOGY, e.into())
                    } else {
                        self.fail(ANSWER_APOLOGY, e.into())
                    }
                }
            },
            RequestKind::Report => match result.map_err(VivaError::from).and_then(|text| {
                parse_report(&text).map_err(VivaError::from)
            }) {
                Ok(report) => self.finish(report).await,
                Err(e) => self.fail(REPORT_APOLOGY, e),
            },
        };

        Ok(outcome)
    }

    /// Starts the viva and waits for the opening question
    pub async fn start(&mut self, provider: &dyn CompletionProvider) -> Result<Outcome, VivaError> {
        let request = self.begin_start()?;
        self.run(provider, request).await
    }

    /// Submits an answer and waits for feedback plus the next question
    pub async fn answer(&mut self, provider: &dyn CompletionProvider, input: &str) -> Result<Outcome, VivaError> {
        let request = self.begin_answer(input)?;
        self.run(provider, request).await
    }

    /// Requests the report and ends the viva if it is valid
    pub async fn end(&mut self, provider: &dyn CompletionProvider) -> Result<Outcome, VivaError> {
        let request = self.begin_end()?;
        self.run(provider, request).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            topic: self.topic,
            difficulty: self.difficulty,
            phase: self.phase,
            elapsed_seconds: self.elapsed,
            elapsed_display: format_elapsed(self.elapsed),
            busy: self.is_busy(),
            transcript: self.transcript.clone(),
            draft: self.draft.clone(),
            report: self.report.clone(),
        }
    }

    async fn run(&mut self, provider: &dyn CompletionProvider, request: PendingRequest) -> Result<Outcome, VivaError> {
        let result = provider.complete(&request.prompt).await;
        Ok(self.resolve(request.kind, result).await?)
    }

    async fn finish(&mut self, report: Report) -> Outcome {
        self.phase = Phase::Ended;
        self.report = Some(report.clone());

        tracing::info!(
            session = %self.id,
            score = report.score,
            duration = self.elapsed,
            "viva ended"
        );

        if let Some(topic) = self.topic {
            let record = InterviewSession::finished(topic, self.difficulty, self.elapsed, report.score);
            if let Err(e) = self.history.append(record).await {
                tracing::error!(session = %self.id, "Failed to save viva history: {}", e);
            }
        }

        Outcome::Reported(report)
    }

    fn fail(&mut self, apology: &str, error: VivaError) -> Outcome {
        tracing::warn!(session = %self.id, "viva request failed: {}", error);
        let notice = Message::assistant(apology);
        self.transcript.push(notice.clone());
        Outcome::Failed { notice, error }
    }

    fn issue(&mut self, kind: RequestKind, prompt: String) -> PendingRequest {
        self.in_flight = Some(kind);
        PendingRequest { kind, prompt }
    }

    fn ensure_idle(&self) -> Result<(), ValidationError> {
        if self.is_busy() {
            return Err(ValidationError::RequestInFlight);
        }
        Ok(())
    }

    fn expect_phase(&self, expected: Phase, action: &'static str) -> Result<(), ValidationError> {
        if self.phase != expected {
            return Err(ValidationError::InvalidPhase {
                action,
                phase: self.phase,
            });
        }
        Ok(())
    }

    fn current_topic(&self) -> Result<Topic, ValidationError> {
        self.topic.ok_or(ValidationError::TopicNotSelected)
    }
}
