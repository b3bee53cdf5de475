use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::RoiFractions;
use crate::error::OmrError;
use crate::grid::QuestionResult;

/// Option letters in column order
pub const OPTION_LABELS: [&str; 5] = ["A", "B", "C", "D", "E"];

/// One row's outcome: a marked option or the `?` sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Answer {
    A,
    B,
    C,
    D,
    E,
    #[serde(rename = "?")]
    Unmarked,
}

impl Answer {
    pub fn from_option_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Answer::A),
            1 => Some(Answer::B),
            2 => Some(Answer::C),
            3 => Some(Answer::D),
            4 => Some(Answer::E),
            _ => None,
        }
    }

    pub fn option_index(&self) -> Option<usize> {
        match self {
            Answer::A => Some(0),
            Answer::B => Some(1),
            Answer::C => Some(2),
            Answer::D => Some(3),
            Answer::E => Some(4),
            Answer::Unmarked => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self.option_index() {
            Some(i) => OPTION_LABELS[i],
            None => "?",
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields present only on a successful read
#[derive(Debug, Clone, Serialize)]
pub struct SheetDetails {
    pub debug_image: Option<PathBuf>,
    #[serde(rename = "usedFallback")]
    pub used_fallback: bool,
    pub note: String,
    pub roi: RoiFractions,
    /// Per-row cell scores, for library callers
    #[serde(skip)]
    pub questions: Vec<QuestionResult>,
}

/// The record printed for one invocation.
///
/// Failure records serialize as `{"success":false,"answers":null,"error":...}`;
/// success records add `debug_image`, `usedFallback`, `note` and `roi`.
#[derive(Debug, Clone, Serialize)]
pub struct OmrResult {
    pub success: bool,
    pub answers: Option<Vec<Answer>>,
    #[serde(flatten)]
    pub details: Option<SheetDetails>,
    pub error: Option<String>,
}

impl OmrResult {
    pub fn success(answers: Vec<Answer>, details: SheetDetails) -> Self {
        Self {
            success: true,
            answers: Some(answers),
            details: Some(details),
            error: None,
        }
    }

    pub fn failure(error: &OmrError) -> Self {
        Self {
            success: false,
            answers: None,
            details: None,
            error: Some(error.to_string()),
        }
    }

    pub fn used_fallback(&self) -> bool {
        self.details.as_ref().is_some_and(|d| d.used_fallback)
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

pub fn fallback_note(used_fallback: bool) -> &'static str {
    if used_fallback {
        "Used full image (no border detected)"
    } else {
        "Border detected successfully"
    }
}
