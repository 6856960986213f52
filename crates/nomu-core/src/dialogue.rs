//! Checklist questions and the answers folded back into a consultation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One fact-finding question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub short_label: String,
    pub question_text: String,
}

/// A user's answer to a checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Yes,
    No,
    Unsure,
    Free(String),
}

impl Answer {
    /// Read a typed answer. Recognized yes / no / unsure forms map to the
    /// ternary; anything else is kept as free text.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.to_lowercase().as_str() {
            "네" | "예" | "응" | "y" | "yes" => Self::Yes,
            "아니요" | "아니오" | "아니" | "n" | "no" => Self::No,
            "모르겠음" | "모름" | "모르겠어요" | "u" | "unsure" | "?" => Self::Unsure,
            _ => Self::Free(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Yes => "네",
            Self::No => "아니요",
            Self::Unsure => "모르겠음",
            Self::Free(text) => text,
        }
    }

    pub fn is_affirmative(&self) -> bool {
        matches!(self, Self::Yes)
    }

    /// Free-text answers carry facts worth searching for; ternary ones do not.
    pub fn narrow_text(&self) -> Option<&str> {
        match self {
            Self::Free(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question and the answer it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: Answer,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: Answer) -> Self {
        Self {
            question: question.into(),
            answer,
        }
    }
}

/// "Q: …\nA: …" blocks separated by blank lines.
pub fn render_qa(qa: &[QaPair]) -> String {
    qa.iter()
        .map(|p| format!("Q: {}\nA: {}", p.question, p.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}
