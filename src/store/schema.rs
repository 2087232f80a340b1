use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::result::AnswerRecord;

pub const MIND_VAULT_KEY: &str = "MindVault";
pub const MIND_VAULT_MIGRATED_KEY: &str = "MindVaultMigrated";

pub fn current_question_index_key(chapter_id: &str) -> String {
    format!("currentQuestionIndex-{chapter_id}")
}

pub fn selected_answer_key(chapter_id: &str) -> String {
    format!("selectedAnswer-{chapter_id}")
}

pub fn quiz_results_key(chapter_id: &str) -> String {
    format!("quizResults-{chapter_id}")
}

pub fn answered_questions_key(chapter_id: &str) -> String {
    format!("answeredQuestions-{chapter_id}")
}

/// Content domain a bookmark was made from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Chapter,
    Exam,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Chapter => "chapter",
            Source::Exam => "exam",
        })
    }
}

/// Current MindVault entry, discriminated by `source`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum BookmarkRecord {
    Chapter {
        #[serde(rename = "questionId")]
        question_id: String,
        #[serde(rename = "chapterId")]
        chapter_id: String,
    },
    Exam {
        #[serde(rename = "questionId")]
        question_id: String,
        #[serde(rename = "examId")]
        exam_id: String,
    },
}

impl BookmarkRecord {
    pub fn question_id(&self) -> &str {
        match self {
            BookmarkRecord::Chapter { question_id, .. } | BookmarkRecord::Exam { question_id, .. } => {
                question_id
            }
        }
    }

    pub fn source(&self) -> Source {
        match self {
            BookmarkRecord::Chapter { .. } => Source::Chapter,
            BookmarkRecord::Exam { .. } => Source::Exam,
        }
    }

    /// The chapter or exam id the record is filed under.
    pub fn context_id(&self) -> &str {
        match self {
            BookmarkRecord::Chapter { chapter_id, .. } => chapter_id,
            BookmarkRecord::Exam { exam_id, .. } => exam_id,
        }
    }
}

/// Second-generation entry: chapter-scoped, no `source`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LegacyPair {
    pub chapter_id: String,
    pub question_id: String,
}

/// Anything that may be found in the `MindVault` array, oldest shapes last.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredEntry {
    Current(BookmarkRecord),
    Legacy(LegacyPair),
    Bare(String),
    Unrecognized(serde_json::Value),
}

/// Chapter checkpoint, mirrored across three scoped keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistedProgress {
    pub current_question_index: usize,
    pub selected_answer: Option<usize>,
    pub answer_log: Vec<AnswerRecord>,
}
