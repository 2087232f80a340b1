use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static QUESTION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^q[0-9]{3}$").expect("question id pattern"));
static CHAPTER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^chapter-[0-9]+$").expect("chapter id pattern"));
static EXAM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^exam-[0-9]+$").expect("exam id pattern"));

pub fn is_valid_question_id(id: &str) -> bool {
    QUESTION_ID.is_match(id)
}

pub fn is_valid_chapter_id(id: &str) -> bool {
    CHAPTER_ID.is_match(id)
}

pub fn is_valid_exam_id(id: &str) -> bool {
    EXAM_ID.is_match(id)
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid content id: {0:?} (expected chapter-<n> or exam-<n>)")]
pub struct InvalidId(pub String);

/// Numbered chapter, rendered as `chapter-<n>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChapterId(pub u32);

impl ChapterId {
    /// Derive the owning chapter from a section label such as `"1.3"`.
    pub fn from_section(section: &str) -> Option<Self> {
        let lead = section.trim().split('.').next()?;
        lead.parse().ok().map(ChapterId)
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chapter-{}", self.0)
    }
}

impl FromStr for ChapterId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_valid_chapter_id(s) {
            return Err(InvalidId(s.to_string()));
        }
        s["chapter-".len()..]
            .parse()
            .map(ChapterId)
            .map_err(|_| InvalidId(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExamId(pub u32);

impl fmt::Display for ExamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exam-{}", self.0)
    }
}

impl FromStr for ExamId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_valid_exam_id(s) {
            return Err(InvalidId(s.to_string()));
        }
        s["exam-".len()..]
            .parse()
            .map(ExamId)
            .map_err(|_| InvalidId(s.to_string()))
    }
}

/// Identifier of a loadable question pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentId {
    Chapter(ChapterId),
    Exam(ExamId),
}

impl ContentId {
    pub fn is_exam(self) -> bool {
        matches!(self, ContentId::Exam(_))
    }

    /// File holding this pool inside a content directory.
    pub fn file_name(self) -> String {
        match self {
            ContentId::Chapter(id) => format!("questions-{id}.json"),
            ContentId::Exam(id) => format!("{id}.json"),
        }
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentId::Chapter(id) => id.fmt(f),
            ContentId::Exam(id) => id.fmt(f),
        }
    }
}

impl FromStr for ContentId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<ChapterId>() {
            return Ok(ContentId::Chapter(id));
        }
        s.parse::<ExamId>().map(ContentId::Exam)
    }
}

impl From<ChapterId> for ContentId {
    fn from(id: ChapterId) -> Self {
        ContentId::Chapter(id)
    }
}

impl From<ExamId> for ContentId {
    fn from(id: ExamId) -> Self {
        ContentId::Exam(id)
    }
}
