pub mod ids;
pub mod loader;
pub mod provider;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ids::{ChapterId, ContentId, ExamId};

/// A single multiple-choice question. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub chapter_section: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_answer_index
    }

    /// Chapter this question belongs to, derived from its section label.
    pub fn chapter(&self) -> Option<ChapterId> {
        ChapterId::from_section(&self.chapter_section)
    }

    fn is_well_formed(&self) -> bool {
        self.options.len() >= 2 && self.correct_answer_index < self.options.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_coming_soon: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0} not found")]
    NotFound(ContentId),
    #[error("{0} is coming soon and not yet available")]
    ComingSoon(ContentId),
    #[error("no questions found for {0}")]
    Empty(ContentId),
    #[error("failed to parse questions for {id}: {source}")]
    Malformed {
        id: ContentId,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read questions for {id}: {source}")]
    Io {
        id: ContentId,
        #[source]
        source: std::io::Error,
    },
}

impl ContentError {
    /// Whether offering the learner a retry makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ContentError::Io { .. } | ContentError::ComingSoon(_))
    }
}

/// Source of question pools and their metadata.
pub trait ContentProvider {
    fn chapters(&self) -> Vec<ChapterMeta>;
    fn exams(&self) -> Vec<ExamMeta>;
    fn load(&self, id: ContentId) -> Result<Vec<Question>, ContentError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionFile {
    Bare(Vec<Question>),
    Wrapped { questions: Vec<Question> },
    Exam { question: Vec<Question> },
}

/// Parse a question file in any of the accepted layouts, dropping questions
/// that cannot be answered (fewer than two options or a bad answer index).
pub fn parse_questions(id: ContentId, raw: &str) -> Result<Vec<Question>, ContentError> {
    let file: QuestionFile =
        serde_json::from_str(raw).map_err(|source| ContentError::Malformed { id, source })?;
    let questions = match file {
        QuestionFile::Bare(q) => q,
        QuestionFile::Wrapped { questions } => questions,
        QuestionFile::Exam { question } => question,
    };
    let total = questions.len();
    let questions: Vec<Question> = questions
        .into_iter()
        .filter(|q| {
            let ok = q.is_well_formed();
            if !ok {
                log::warn!("{id}: skipping malformed question {}", q.id);
            }
            ok
        })
        .collect();
    if questions.is_empty() {
        return Err(ContentError::Empty(id));
    }
    log::debug!("loaded {} of {total} questions for {id}", questions.len());
    Ok(questions)
}

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.:])\s+").expect("sentence break pattern"));

/// Split prompt text into display lines after each `.` or `:` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    for caps in SENTENCE_BREAK.captures_iter(text) {
        let (Some(whole), Some(mark)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        lines.push(&text[start..mark.end()]);
        start = whole.end();
    }
    lines.push(&text[start..]);
    lines
        .into_iter()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(n: u32) -> ContentId {
        ContentId::Chapter(ChapterId(n))
    }

    #[test]
    fn parses_bare_wrapped_and_exam_layouts() {
        let q = r#"{"id":"q001","chapterSection":"1.1","questionText":"?","options":["a","b"],"correctAnswerIndex":1,"explanation":""}"#;
        let bare = format!("[{q}]");
        let wrapped = format!(r#"{{"questions":[{q}]}}"#);
        let exam = format!(r#"{{"question":[{q}]}}"#);
        for raw in [bare, wrapped, exam] {
            let questions = parse_questions(chapter(1), &raw).unwrap();
            assert_eq!(questions.len(), 1);
            assert_eq!(questions[0].id, "q001");
            assert!(questions[0].is_correct(1));
        }
    }

    #[test]
    fn drops_unanswerable_questions() {
        let raw = r#"[
            {"id":"q001","questionText":"?","options":["only"],"correctAnswerIndex":0},
            {"id":"q002","questionText":"?","options":["a","b"],"correctAnswerIndex":5},
            {"id":"q003","questionText":"?","options":["a","b"],"correctAnswerIndex":0}
        ]"#;
        let questions = parse_questions(chapter(1), raw).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "q003");
        assert_eq!(questions[0].chapter_section, "");
    }

    #[test]
    fn empty_and_garbage_files_are_errors() {
        assert!(matches!(
            parse_questions(chapter(2), "[]"),
            Err(ContentError::Empty(_))
        ));
        let err = parse_questions(chapter(2), "{not json").unwrap_err();
        assert!(matches!(err, ContentError::Malformed { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn question_chapter_comes_from_section() {
        let q = Question {
            id: "q010".into(),
            chapter_section: "4.2".into(),
            question_text: String::new(),
            options: vec!["a".into(), "b".into()],
            correct_answer_index: 0,
            explanation: String::new(),
        };
        assert_eq!(q.chapter(), Some(ChapterId(4)));
    }

    #[test]
    fn split_sentences_breaks_after_period_and_colon() {
        let lines = split_sentences("A host sends a frame. Consider this:   which layer?");
        assert_eq!(lines, vec!["A host sends a frame.", "Consider this:", "which layer?"]);
        assert_eq!(split_sentences("version 1.2 only"), vec!["version 1.2 only"]);
        assert!(split_sentences("   ").is_empty());
    }
}
