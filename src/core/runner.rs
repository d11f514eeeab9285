//! Per-session event loop
//!
//! Each live viva is owned by one runner task. Everything that can change the
//! session arrives through a single inbound queue:
//!
//! * `Tick` from the timer task, started with the viva and aborted when it ends;
//! * `Transcribed` from a speech-to-text source;
//! * commands from the API, answered through a oneshot;
//! * `Completed` from the task that awaited the completion service.
//!
//! Completion calls run in their own task so ticks keep flowing while a
//! request is outstanding. The runner exits once every [`SessionHandle`] is
//! gone, or on [`SessionHandle::shutdown`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::providers::{CompletionError, CompletionProvider};

use super::session::{
    Outcome, Phase, PendingRequest, RequestKind, SessionSnapshot, ValidationError, VivaError, VivaSession,
};

type Reply = oneshot::Sender<Result<Outcome, VivaError>>;

#[derive(Debug)]
pub enum Command {
    Start,
    Answer(String),
    End,
}

#[derive(Debug)]
pub enum SessionEvent {
    Tick,
    Transcribed { text: String, is_final: bool },
    Command { command: Command, reply: Reply },
    Completed { kind: RequestKind, result: Result<String, CompletionError> },
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Cloneable handle to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn start(&self) -> Result<Outcome, VivaError> {
        self.command(Command::Start).await
    }

    pub async fn answer(&self, text: impl Into<String>) -> Result<Outcome, VivaError> {
        self.command(Command::Answer(text.into())).await
    }

    pub async fn end(&self) -> Result<Outcome, VivaError> {
        self.command(Command::End).await
    }

    /// Feeds recognised speech into the session. A final transcription is
    /// submitted as the candidate's answer.
    pub fn transcribe(&self, text: impl Into<String>, is_final: bool) -> Result<(), VivaError> {
        self.send(SessionEvent::Transcribed {
            text: text.into(),
            is_final,
        })
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, VivaError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionEvent::Snapshot(tx))?;
        rx.await.map_err(|_| VivaError::SessionClosed(self.id))
    }

    pub fn shutdown(&self) {
        self.tx.send(SessionEvent::Shutdown).ok();
    }

    async fn command(&self, command: Command) -> Result<Outcome, VivaError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Command { command, reply })?;
        rx.await.map_err(|_| VivaError::SessionClosed(self.id))?
    }

    fn send(&self, event: SessionEvent) -> Result<(), VivaError> {
        self.tx.send(event).map_err(|_| VivaError::SessionClosed(self.id))
    }
}

pub struct SessionRunner {
    session: VivaSession,
    provider: Arc<dyn CompletionProvider>,
    events: mpsc::WeakUnboundedSender<SessionEvent>,
    inbox: mpsc::UnboundedReceiver<SessionEvent>,
    tick_period: Duration,
    ticker: Option<JoinHandle<()>>,
    waiting: Option<Reply>,
    /// A final transcription arrived while busy
    draft_queued: bool,
}

impl SessionRunner {
    /// Spawns a runner owning `session` and returns a handle to it
    pub fn spawn(session: VivaSession, provider: Arc<dyn CompletionProvider>, tick_period: Duration) -> SessionHandle {
        let (tx, inbox) = mpsc::unbounded_channel();
        let id = session.id();

        let runner = Self {
            session,
            provider,
            events: tx.downgrade(),
            inbox,
            tick_period,
            ticker: None,
            waiting: None,
            draft_queued: false,
        };
        tokio::spawn(runner.run().instrument(tracing::info_span!("viva", session = %id)));

        SessionHandle { id, tx }
    }

    async fn run(mut self) {
        tracing::debug!("runner started");

        while let Some(event) = self.inbox.recv().await {
            match event {
                SessionEvent::Tick => {
                    self.session.tick();
                }
                SessionEvent::Transcribed { text, is_final } => {
                    self.session.set_draft(text);
                    if is_final {
                        self.submit_draft();
                    }
                }
                SessionEvent::Command { command, reply } => {
                    self.handle_command(command, Some(reply));
                }
                SessionEvent::Completed { kind, result } => {
                    self.handle_completed(kind, result).await;
                }
                SessionEvent::Snapshot(reply) => {
                    reply.send(self.session.snapshot()).ok();
                }
                SessionEvent::Shutdown => break,
            }
        }

        self.stop_ticker();
        tracing::debug!("runner stopped");
    }

    fn handle_command(&mut self, command: Command, reply: Option<Reply>) {
        let begun = match command {
            Command::Start => self.session.begin_start(),
            Command::Answer(text) => self.session.begin_answer(&text),
            Command::End => self.session.begin_end(),
        };

        match begun {
            Ok(request) => {
                if request.kind == RequestKind::Opening {
                    self.start_ticker();
                }
                self.waiting = reply;
                self.dispatch(request);
            }
            Err(e) => {
                tracing::debug!("command rejected: {}", e);
                if let Some(reply) = reply {
                    reply.send(Err(e.into())).ok();
                }
            }
        }
    }

    /// Submits the transcribed draft as an answer. While a request is
    /// outstanding the draft is kept and submitted once the session is idle.
    fn submit_draft(&mut self) {
        if self.session.draft().trim().is_empty() {
            self.session.take_draft();
            self.draft_queued = false;
            return;
        }

        let draft = self.session.draft().to_string();
        match self.session.begin_answer(&draft) {
            Ok(request) => {
                self.session.take_draft();
                self.draft_queued = false;
                self.dispatch(request);
            }
            Err(ValidationError::RequestInFlight) => {
                tracing::info!("request outstanding, transcribed answer queued");
                self.draft_queued = true;
            }
            Err(e) => {
                tracing::warn!("transcribed answer kept as draft: {}", e);
                self.draft_queued = false;
            }
        }
    }

    fn dispatch(&self, request: PendingRequest) {
        let Some(events) = self.events.upgrade() else {
            tracing::debug!("all handles dropped, not sending {:?} request", request.kind);
            return;
        };
        let provider = Arc::clone(&self.provider);

        tokio::spawn(
            async move {
                let result = provider.complete(&request.prompt).await;
                if events
                    .send(SessionEvent::Completed {
                        kind: request.kind,
                        result,
                    })
                    .is_err()
                {
                    tracing::debug!("runner gone, discarding completion result");
                }
            }
            .in_current_span(),
        );
    }

    async fn handle_completed(&mut self, kind: RequestKind, result: Result<String, CompletionError>) {
        let outcome = self.session.resolve(kind, result).await.map_err(VivaError::from);

        if self.session.phase() != Phase::InProgress {
            self.stop_ticker();
        }

        match self.waiting.take() {
            Some(reply) => {
                reply.send(outcome).ok();
            }
            None => {
                if let Err(e) = outcome {
                    tracing::warn!("unsolicited completion: {}", e);
                }
            }
        }

        if self.draft_queued {
            self.submit_draft();
        }
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();

        let events = self.events.clone();
        let period = self.tick_period;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(events) = events.upgrade() else {
                    break;
                };
                if events.send(SessionEvent::Tick).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}
