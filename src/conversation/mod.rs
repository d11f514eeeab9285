//! Conversation types and interview vocabulary

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used when a transcript is replayed into a prompt
    pub fn speaker(&self) -> &'static str {
        match self {
            Role::User => "Candidate",
            Role::Assistant => "Interviewer",
        }
    }
}

/// Interview difficulty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Viva topics offered to the candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Topic {
    CppBasics,
    ObjectOrientedProgramming,
    DataStructures,
    Algorithms,
    MemoryManagement,
    StlLibrary,
    ExceptionHandling,
    FileHandling,
    Templates,
    Multithreading,
}

impl Topic {
    pub const ALL: [Topic; 10] = [
        Topic::CppBasics,
        Topic::ObjectOrientedProgramming,
        Topic::DataStructures,
        Topic::Algorithms,
        Topic::MemoryManagement,
        Topic::StlLibrary,
        Topic::ExceptionHandling,
        Topic::FileHandling,
        Topic::Templates,
        Topic::Multithreading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::CppBasics => "C++ Basics",
            Topic::ObjectOrientedProgramming => "Object-Oriented Programming",
            Topic::DataStructures => "Data Structures",
            Topic::Algorithms => "Algorithms",
            Topic::MemoryManagement => "Memory Management",
            Topic::StlLibrary => "STL Library",
            Topic::ExceptionHandling => "Exception Handling",
            Topic::FileHandling => "File Handling",
            Topic::Templates => "Templates",
            Topic::Multithreading => "Multithreading",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}

impl TryFrom<String> for Topic {
    type Error = UnknownTopic;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.as_str().to_string()
    }
}

/// Formats elapsed seconds as `m:ss`
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
