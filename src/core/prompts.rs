//! Prompt templates for the viva, the tutor chat and the coding lab
//!
//! All builders are pure: the same inputs always produce the same prompt
//! text.

use crate::conversation::{Difficulty, Message, Role, Topic};

use super::coding::TestCase;
use super::tutor::CoursePreferences;

/// Renders a transcript as `Interviewer: ...` / `Candidate: ...` lines
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.speaker(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt that opens the viva: interviewer introduction plus the first question
pub fn opening_prompt(topic: Topic, difficulty: Difficulty) -> String {
    format!(
        r#"You are an experienced C++ technical interviewer conducting a {difficulty} level interview. Follow these rules:
1. Start with a brief introduction of yourself
2. Ask your first question about {topic}
3. The question should be appropriate for {difficulty} level
4. Focus on conceptual understanding and practical applications
5. Keep your response concise and clear

Format your response as:
[Introduction]: (your brief introduction)
[First Question]: (your question)"#
    )
}

/// Prompt for the next turn. `prior` is the transcript before the latest answer.
pub fn follow_up_prompt(topic: Topic, difficulty: Difficulty, prior: &[Message], latest_answer: &str) -> String {
    format!(
        r#"Context: You are a C++ technical interviewer conducting a {difficulty} level interview about {topic}.
Previous conversation:
{transcript}

Candidate's latest response: {latest_answer}

Rules:
1. Maintain context of the entire conversation
2. Evaluate the candidate's last response
3. Provide brief, constructive feedback
4. Ask the next question at {difficulty} level
5. Keep responses focused and clear

Format your response as:
[Feedback]: (brief feedback on the last answer)
[Next Question]: (your next question)"#,
        transcript = render_transcript(prior),
    )
}

/// Prompt asking for the scored JSON report over the whole interview
pub fn report_prompt(topic: Topic, difficulty: Difficulty, transcript: &[Message]) -> String {
    format!(
        r#"You are a C++ technical interviewer. Analyze this {difficulty} level interview about {topic}.

Interview conversation:
{transcript}

Generate a performance report in valid JSON format with this exact structure:
{{
  "strengths": ["strength1", "strength2"],
  "improvements": ["area1", "area2"],
  "overallPerformance": "detailed feedback",
  "score": 75
}}

Rules:
1. Response must be valid JSON
2. Score should be an integer between 0-100
3. Consider the difficulty level ({difficulty}) when scoring
4. Include at least 2 strengths and 2 improvements
5. Provide detailed overall performance feedback"#,
        transcript = render_transcript(transcript),
    )
}

/// Opening request of a tutor chat
pub const ROADMAP_REQUEST: &str =
    "Please create a personalized C++ learning roadmap and initial guidance based on my background";

/// Code every coding exercise starts from
pub const STARTER_CODE: &str = r#"#include <iostream>
using namespace std;

int main() {
    // Your code here
    
    return 0;
}"#;

fn student_background(preferences: &CoursePreferences) -> String {
    format!(
        r#"Student Background:
- Programming Experience: {}
- C++ Knowledge Level: {}
- Available Study Time: {}
- Learning Goal: {}
- Preferred Learning Style: {}"#,
        preferences.programming_experience,
        preferences.cpp_level,
        preferences.study_time,
        preferences.learning_goal,
        preferences.preferred_learning,
    )
}

/// First tutor turn: a personalised roadmap for the student's background
pub fn roadmap_prompt(preferences: &CoursePreferences) -> String {
    format!("{}

{ROADMAP_REQUEST}", student_background(preferences))
}

/// Tutor reply to `latest`, with the earlier chat replayed
pub fn tutor_prompt(preferences: &CoursePreferences, prior: &[Message], latest: &str) -> String {
    let transcript = prior
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "Student",
                Role::Assistant => "Tutor",
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You're a C++ tutor. {background}

Conversation so far:
{transcript}

Student: {latest}
Tutor:"#,
        background = student_background(preferences),
    )
}

/// Asks the completion service to act as a compiler and print program output
pub fn run_code_prompt(code: &str, input: &str) -> String {
    format!(
        r#"You are a C++ compiler. Execute this code and return ONLY the output:

{code}

Input:
{input}

Return ONLY the program output, nothing else."#
    )
}

/// Asks whether `code` produces the expected output for one test case
pub fn check_case_prompt(code: &str, case: &TestCase) -> String {
    format!(
        r#"You are a C++ code tester. Compare the output of this code with the expected output.

Code:
{code}

Input:
{input}

Expected Output:
{output}

Reply with EXACTLY "PASS" if the code produces the expected output, or "FAIL" if it doesn't. No other text."#,
        input = case.input,
        output = case.output,
    )
}

/// Asks for a new practice question as JSON
pub fn question_prompt(difficulty: Difficulty) -> String {
    let audience = match difficulty {
        Difficulty::Easy => "easy and suitable for beginners learning C++",
        Difficulty::Medium => "of medium difficulty for students comfortable with C++ basics",
        Difficulty::Hard => "challenging for students with solid C++ experience",
    };

    format!(
        r#"Create a C++ programming question at {difficulty} level with the following format:
{{
  "title": "A clear, concise title",
  "description": "Detailed problem description with clear input/output specifications",
  "sampleInput": "Example input",
  "sampleOutput": "Example output",
  "testCases": [
    {{"input": "test input 1", "output": "expected output 1"}},
    {{"input": "test input 2", "output": "expected output 2"}}
  ],
  "solution": "Complete C++ solution code"
}}
Make sure the question is {audience}."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transcript() -> Vec<Message> {
        vec![
            Message::assistant("What is a stack?"),
            Message::user("A stack is LIFO"),
        ]
    }

    #[test]
    fn test_render_transcript() {
        let rendered = render_transcript(&sample_transcript());
        assert_eq!(rendered, "Interviewer: What is a stack?\nCandidate: A stack is LIFO");
        assert_eq!(render_transcript(&[]), "");
    }

    #[test]
    fn test_opening_prompt() {
        let prompt = opening_prompt(Topic::DataStructures, Difficulty::Easy);
        assert!(prompt.contains("Easy level interview"));
        assert!(prompt.contains("first question about Data Structures"));
        assert!(prompt.contains("[First Question]"));
    }

    #[test]
    fn test_follow_up_includes_history_and_latest() {
        let prior = vec![Message::assistant("What is a stack?")];
        let prompt = follow_up_prompt(Topic::DataStructures, Difficulty::Hard, &prior, "A stack is LIFO");

        assert!(prompt.contains("Interviewer: What is a stack?"));
        assert!(prompt.contains("Candidate's latest response: A stack is LIFO"));
        assert!(prompt.contains("next question at Hard level"));
    }

    #[test]
    fn test_report_prompt_requests_schema() {
        let prompt = report_prompt(Topic::Templates, Difficulty::Medium, &sample_transcript());

        assert!(prompt.contains("Candidate: A stack is LIFO"));
        assert!(prompt.contains("\"overallPerformance\""));
        assert!(prompt.contains("about Templates"));
    }

    fn preferences() -> CoursePreferences {
        CoursePreferences {
            programming_experience: "Some Python".into(),
            cpp_level: "Beginner".into(),
            study_time: "5 hours a week".into(),
            learning_goal: "Placements".into(),
            preferred_learning: "Hands-on".into(),
        }
    }

    #[test]
    fn test_roadmap_prompt_carries_background() {
        let prompt = roadmap_prompt(&preferences());
        assert!(prompt.contains("- C++ Knowledge Level: Beginner"));
        assert!(prompt.contains("- Preferred Learning Style: Hands-on"));
        assert!(prompt.ends_with(ROADMAP_REQUEST));
    }

    #[test]
    fn test_tutor_prompt_replays_chat() {
        let prior = vec![Message::assistant("Week 1: basics"), Message::user("What is a pointer?")];
        let prompt = tutor_prompt(&preferences(), &prior, "And a reference?");

        assert!(prompt.starts_with("You're a C++ tutor."));
        assert!(prompt.contains("Tutor: Week 1: basics\nStudent: What is a pointer?"));
        assert!(prompt.contains("Student: And a reference?\nTutor:"));
    }

    #[test]
    fn test_coding_prompts() {
        let run = run_code_prompt("int main() {}", "5 3");
        assert!(run.starts_with("You are a C++ compiler."));
        assert!(run.contains("Input:\n5 3"));

        let case = TestCase {
            input: "-1 7".into(),
            output: "6".into(),
        };
        let check = check_case_prompt("int main() {}", &case);
        assert!(check.contains("Expected Output:\n6"));
        assert!(check.contains("EXACTLY \"PASS\""));

        let question = question_prompt(Difficulty::Easy);
        assert!(question.contains("\"testCases\""));
        assert!(question.contains("suitable for beginners"));
    }

    #[test]
    fn test_prompts_are_deterministic() {
        let a = report_prompt(Topic::Algorithms, Difficulty::Easy, &sample_transcript());
        let b = report_prompt(Topic::Algorithms, Difficulty::Easy, &sample_transcript());
        assert_eq!(a, b);
    }
}
