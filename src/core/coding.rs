//! Coding practice lab
//!
//! Nothing is compiled here. The completion service plays the compiler for
//! `run`, judges each test case for `check`, and writes new practice
//! questions. A question that comes back unusable is replaced by one of the
//! built-in samples.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::GenerationSettings;
use crate::conversation::Difficulty;
use crate::providers::{CompletionError, CompletionProvider};

use super::prompts;
use super::report::clean_json_text;

/// Verdict the judge must answer with for a passing case
const PASS_VERDICT: &str = "PASS";

/// Ids below this are reserved for the built-in samples
const FIRST_GENERATED_ID: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodingQuestion {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub sample_input: String,
    pub sample_output: String,
    pub test_cases: Vec<TestCase>,
    pub solution: String,
}

/// Question fields as the completion service writes them
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionBody {
    title: String,
    description: String,
    #[serde(default)]
    sample_input: String,
    #[serde(default)]
    sample_output: String,
    test_cases: Vec<TestCase>,
    solution: String,
}

#[derive(Debug, thiserror::Error)]
pub enum QuestionFormatError {
    #[error("Question is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Question has an empty title")]
    EmptyTitle,

    #[error("Question has no test cases")]
    NoTestCases,
}

#[derive(Debug, thiserror::Error)]
pub enum CodingError {
    #[error("Code is empty")]
    EmptyCode,

    #[error("Question has no test cases")]
    NoTestCases,

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseResult {
    /// 1-based test case number
    pub case: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub results: Vec<CaseResult>,
    pub all_passed: bool,
    /// One `Test Case N: PASSED ✓` line per case
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedQuestion {
    pub question: CodingQuestion,
    /// False when a built-in sample was served instead
    pub generated: bool,
}

/// Built-in questions, also the fallback when generation fails
pub fn sample_questions() -> Vec<CodingQuestion> {
    vec![CodingQuestion {
        id: 1,
        title: "Sum of Two Numbers".into(),
        description: "Write a program to add two integers provided as input.\n\nInput Format:\nTwo space-separated integers a and b\n\nOutput Format:\nA single integer representing the sum of a and b".into(),
        difficulty: Difficulty::Easy,
        sample_input: "5 3".into(),
        sample_output: "8".into(),
        test_cases: vec![
            TestCase {
                input: "5 3".into(),
                output: "8".into(),
            },
            TestCase {
                input: "-1 7".into(),
                output: "6".into(),
            },
            TestCase {
                input: "0 0".into(),
                output: "0".into(),
            },
        ],
        solution: "#include <iostream>\nusing namespace std;\n\nint main() {\n    int a, b;\n    cin >> a >> b;\n    cout << a + b;\n    return 0;\n}".into(),
    }]
}

/// Parses a generated question, assigning it `id` and `difficulty`
pub fn parse_question(raw: &str, id: u32, difficulty: Difficulty) -> Result<CodingQuestion, QuestionFormatError> {
    let body: QuestionBody = serde_json::from_str(&clean_json_text(raw))?;

    if body.title.trim().is_empty() {
        return Err(QuestionFormatError::EmptyTitle);
    }
    if body.test_cases.is_empty() {
        return Err(QuestionFormatError::NoTestCases);
    }

    Ok(CodingQuestion {
        id,
        title: body.title,
        description: body.description,
        difficulty,
        sample_input: body.sample_input,
        sample_output: body.sample_output,
        test_cases: body.test_cases,
        solution: body.solution,
    })
}

/// Deterministic sampling for simulated execution and judging
fn execution_generation(max_output_tokens: u32) -> GenerationSettings {
    GenerationSettings::new(0.0, 1, 1.0, max_output_tokens)
}

fn question_generation() -> GenerationSettings {
    GenerationSettings::new(0.8, 40, 0.95, 1024)
}

pub struct CodingLab {
    provider: Arc<dyn CompletionProvider>,
    next_id: AtomicU32,
    next_sample: AtomicUsize,
}

impl CodingLab {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            next_id: AtomicU32::new(FIRST_GENERATED_ID),
            next_sample: AtomicUsize::new(0),
        }
    }

    /// "Runs" `code` against `input` and returns the program output
    pub async fn run(&self, code: &str, input: &str) -> Result<String, CodingError> {
        ensure_code(code)?;

        let output = self
            .provider
            .complete_with(&prompts::run_code_prompt(code, input), &execution_generation(1024))
            .await?;

        Ok(output.trim().to_string())
    }

    /// Judges `code` against every test case of `question`, in order
    pub async fn check(&self, code: &str, question: &CodingQuestion) -> Result<CheckReport, CodingError> {
        ensure_code(code)?;
        if question.test_cases.is_empty() {
            return Err(CodingError::NoTestCases);
        }

        let mut results = Vec::with_capacity(question.test_cases.len());
        for (index, case) in question.test_cases.iter().enumerate() {
            let verdict = self
                .provider
                .complete_with(&prompts::check_case_prompt(code, case), &execution_generation(128))
                .await?;

            results.push(CaseResult {
                case: index + 1,
                passed: verdict.trim() == PASS_VERDICT,
            });
        }

        let all_passed = results.iter().all(|r| r.passed);
        let mut summary = results
            .iter()
            .map(|r| {
                let verdict = if r.passed { "PASSED ✓" } else { "FAILED ✗" };
                format!("Test Case {}: {verdict}", r.case)
            })
            .collect::<Vec<_>>()
            .join("\n");
        if all_passed {
            summary.push_str("\n\nCongratulations! All tests passed.");
        }

        tracing::debug!(question = question.id, all_passed, "solution checked");
        Ok(CheckReport {
            results,
            all_passed,
            summary,
        })
    }

    /// Asks for a new question, falling back to a built-in sample
    pub async fn generate(&self, difficulty: Difficulty) -> GeneratedQuestion {
        let generated = match self
            .provider
            .complete_with(&prompts::question_prompt(difficulty), &question_generation())
            .await
        {
            Ok(raw) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                parse_question(&raw, id, difficulty).map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        match generated {
            Ok(question) => GeneratedQuestion {
                question,
                generated: true,
            },
            Err(reason) => {
                tracing::warn!("question generation failed, serving a sample: {}", reason);
                GeneratedQuestion {
                    question: self.next_sample(),
                    generated: false,
                }
            }
        }
    }

    pub fn samples(&self) -> Vec<CodingQuestion> {
        sample_questions()
    }

    fn next_sample(&self) -> CodingQuestion {
        let mut samples = sample_questions();
        let index = self.next_sample.fetch_add(1, Ordering::Relaxed) % samples.len();
        samples.swap_remove(index)
    }
}

fn ensure_code(code: &str) -> Result<(), CodingError> {
    if code.trim().is_empty() {
        return Err(CodingError::EmptyCode);
    }
    Ok(())
}
