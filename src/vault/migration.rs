use std::collections::{HashMap, HashSet};

use crate::content::ids::{is_valid_chapter_id, is_valid_exam_id, is_valid_question_id};
use crate::content::{ChapterId, Question};
use crate::store::schema::{BookmarkRecord, Source, StoredEntry};

/// Section labels of every chapter question loaded so far, keyed by question id.
///
/// Ids repeat across chapters; the first pool registered wins.
#[derive(Debug, Default)]
pub struct QuestionIndex {
    sections: HashMap<String, String>,
}

impl QuestionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pools<'a>(pools: impl IntoIterator<Item = &'a [Question]>) -> Self {
        let mut index = Self::new();
        for pool in pools {
            index.add_chapter_pool(pool);
        }
        index
    }

    pub fn add_chapter_pool(&mut self, questions: &[Question]) {
        for q in questions {
            self.sections
                .entry(q.id.clone())
                .or_insert_with(|| q.chapter_section.clone());
        }
    }

    pub fn chapter_of(&self, question_id: &str) -> Option<ChapterId> {
        self.sections
            .get(question_id)
            .and_then(|section| ChapterId::from_section(section))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Current-shape entries that passed validation.
    pub kept: usize,
    /// Legacy entries upgraded to current records.
    pub migrated: usize,
    /// Entries that could not be turned into a valid current record.
    pub skipped: usize,
    /// Skipped bare ids retained until their content is available.
    pub pending: usize,
    pub duplicates: usize,
    pub changed: bool,
}

fn is_valid(record: &BookmarkRecord) -> bool {
    is_valid_question_id(record.question_id())
        && match record {
            BookmarkRecord::Chapter { chapter_id, .. } => is_valid_chapter_id(chapter_id),
            BookmarkRecord::Exam { exam_id, .. } => is_valid_exam_id(exam_id),
        }
}

type DedupKey = (String, Source, Option<String>);

fn dedup_key(entry: &StoredEntry) -> Option<DedupKey> {
    match entry {
        StoredEntry::Current(BookmarkRecord::Chapter {
            question_id,
            chapter_id,
        }) => Some((question_id.clone(), Source::Chapter, Some(chapter_id.clone()))),
        StoredEntry::Current(BookmarkRecord::Exam { question_id, .. }) => {
            Some((question_id.clone(), Source::Exam, None))
        }
        StoredEntry::Bare(id) => Some((id.clone(), Source::Chapter, None)),
        _ => None,
    }
}

/// Normalize a stored MindVault array.
///
/// Current records are validated, `{chapterId, questionId}` pairs become
/// chapter records, and bare ids are placed in the chapter named by the
/// leading number of their section label. Bare ids with no loaded question
/// are kept as-is for a later pass. Invalid entries are dropped. The result
/// is deduplicated on question id, source and chapter, keeping first occurrences.
pub fn run_migration(
    entries: &[StoredEntry],
    index: &QuestionIndex,
) -> (Vec<StoredEntry>, MigrationReport) {
    let mut report = MigrationReport::default();
    let mut cleaned = Vec::with_capacity(entries.len());

    for entry in entries {
        match entry {
            StoredEntry::Current(record) if is_valid(record) => {
                report.kept += 1;
                cleaned.push(entry.clone());
            }
            StoredEntry::Legacy(pair)
                if is_valid_question_id(&pair.question_id)
                    && is_valid_chapter_id(&pair.chapter_id) =>
            {
                report.migrated += 1;
                cleaned.push(StoredEntry::Current(BookmarkRecord::Chapter {
                    question_id: pair.question_id.clone(),
                    chapter_id: pair.chapter_id.clone(),
                }));
            }
            StoredEntry::Bare(id) if is_valid_question_id(id) => match index.chapter_of(id) {
                Some(chapter) => {
                    report.migrated += 1;
                    cleaned.push(StoredEntry::Current(BookmarkRecord::Chapter {
                        question_id: id.clone(),
                        chapter_id: chapter.to_string(),
                    }));
                }
                None => {
                    log::debug!("no loaded question for legacy bookmark {id}; retrying later");
                    report.skipped += 1;
                    report.pending += 1;
                    cleaned.push(entry.clone());
                }
            },
            other => {
                log::warn!("dropping invalid MindVault entry: {other:?}");
                report.skipped += 1;
            }
        }
    }

    let mut seen: HashSet<DedupKey> = HashSet::new();
    let before = cleaned.len();
    cleaned.retain(|entry| match dedup_key(entry) {
        Some(key) => seen.insert(key),
        None => true,
    });
    report.duplicates = before - cleaned.len();
    report.changed = cleaned.as_slice() != entries;

    (cleaned, report)
}
