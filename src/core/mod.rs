//! Core components
//!
//! This module contains the interview state machine and everything it
//! orchestrates: prompts, report parsing, history and the session runner.
//! The tutor chat and the coding lab share the same completion provider.

mod coding;
mod memory;
mod prompts;
mod report;
mod runner;
mod session;
mod tutor;
mod viva;

pub use coding::{CheckReport, CodingError, CodingLab, CodingQuestion, GeneratedQuestion};
pub use memory::{InterviewSession, SqliteHistoryStore};
pub use prompts::STARTER_CODE;
pub use report::Report;
pub use session::{Outcome, SessionSnapshot, VivaError};
pub use tutor::{CoursePreferences, TutorEngine, TutorError, TutorReply};
pub use viva::{Catalogue, Turn, VivaEngine};
