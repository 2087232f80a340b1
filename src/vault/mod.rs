pub mod migration;
pub mod view;

use std::collections::HashSet;

use thiserror::Error;

use crate::content::Question;
use crate::content::ids::{is_valid_chapter_id, is_valid_exam_id, is_valid_question_id};
use crate::store::KvStore;
use crate::store::schema::{
    BookmarkRecord, MIND_VAULT_KEY, MIND_VAULT_MIGRATED_KEY, Source, StoredEntry,
};

pub use migration::{MigrationReport, QuestionIndex, run_migration};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("invalid {field} format: {value:?}")]
    InvalidFormat { field: &'static str, value: String },
}

/// Where a bookmark made during a session gets filed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BookmarkContext {
    pub source: Source,
    pub context_id: String,
}

impl BookmarkContext {
    pub fn chapter(chapter_id: impl Into<String>) -> Self {
        Self {
            source: Source::Chapter,
            context_id: chapter_id.into(),
        }
    }

    pub fn exam(exam_id: impl Into<String>) -> Self {
        Self {
            source: Source::Exam,
            context_id: exam_id.into(),
        }
    }

    pub fn of(record: &BookmarkRecord) -> Self {
        Self {
            source: record.source(),
            context_id: record.context_id().to_string(),
        }
    }
}

/// The learner's review list, persisted as one JSON array under `MindVault`.
///
/// Entries are parsed into [`StoredEntry`] at load. Legacy shapes stay
/// visible to [`is_bookmarked`](Self::is_bookmarked) as chapter bookmarks
/// until [`on_collection_load`](Self::on_collection_load) upgrades them.
pub struct MindVault {
    store: KvStore,
    entries: Vec<StoredEntry>,
}

impl MindVault {
    pub fn load(store: KvStore) -> Self {
        let entries = store.get(MIND_VAULT_KEY, Vec::new());
        Self { store, entries }
    }

    /// Re-read the collection, picking up writes made through another handle.
    pub fn reload(&mut self) {
        self.entries = self.store.get(MIND_VAULT_KEY, Vec::new());
    }

    /// Upgrade, validate and deduplicate stored entries against the chapter
    /// content loaded so far. Safe to call on every load.
    pub fn on_collection_load(&mut self, index: &QuestionIndex) -> MigrationReport {
        let (entries, report) = run_migration(&self.entries, index);
        if report.changed {
            self.entries = entries;
            self.persist();
            if report.skipped == 0 {
                self.store.set(MIND_VAULT_MIGRATED_KEY, &true);
            }
        }
        if report.skipped > 0 {
            log::warn!(
                "MindVault migration incomplete: {} entries skipped ({} pending content)",
                report.skipped,
                report.pending
            );
        } else if report.changed {
            log::info!(
                "MindVault migrated: {} upgraded, {} duplicates removed",
                report.migrated,
                report.duplicates
            );
        }
        report
    }

    pub fn is_migrated(&self) -> bool {
        self.store.get(MIND_VAULT_MIGRATED_KEY, false)
    }

    pub fn is_bookmarked(&self, question_id: &str, source: Source) -> bool {
        self.entries
            .iter()
            .any(|entry| entry_matches(entry, question_id, source))
    }

    /// Bookmark a question, replacing any entry with the same question id and source.
    pub fn add(
        &mut self,
        question_id: &str,
        source: Source,
        context_id: &str,
    ) -> Result<(), VaultError> {
        let record = build_record(question_id, source, context_id)?;
        let entry = StoredEntry::Current(record);
        match self
            .entries
            .iter()
            .position(|e| entry_matches(e, question_id, source))
        {
            Some(pos) => {
                if self.entries[pos] == entry
                    && self.count_matches(question_id, source) == 1
                {
                    return Ok(());
                }
                self.entries[pos] = entry;
                let mut seen_first = false;
                self.entries.retain(|e| {
                    if !entry_matches(e, question_id, source) {
                        return true;
                    }
                    let keep = !seen_first;
                    seen_first = true;
                    keep
                });
            }
            None => self.entries.push(entry),
        }
        self.persist();
        Ok(())
    }

    /// Returns whether anything was removed.
    pub fn remove(&mut self, question_id: &str, source: Source) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !entry_matches(e, question_id, source));
        let removed = self.entries.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Flip the bookmark and return the new state.
    pub fn toggle(
        &mut self,
        question_id: &str,
        source: Source,
        context_id: &str,
    ) -> Result<bool, VaultError> {
        if self.is_bookmarked(question_id, source) {
            self.remove(question_id, source);
            Ok(false)
        } else {
            self.add(question_id, source, context_id)?;
            Ok(true)
        }
    }

    pub fn clear(&mut self) {
        log::info!("clearing MindVault ({} entries)", self.entries.len());
        self.entries.clear();
        self.persist();
    }

    /// Bookmark every question missed in an exam, leaving existing
    /// bookmarks for the same exam untouched. Returns how many were added.
    pub fn record_exam_failures(&mut self, exam_id: &str, failed: &[&Question]) -> usize {
        let existing: HashSet<&str> = self
            .records()
            .filter_map(|r| match r {
                BookmarkRecord::Exam {
                    question_id,
                    exam_id: id,
                } if id == exam_id => Some(question_id.as_str()),
                _ => None,
            })
            .collect();
        let fresh: Vec<String> = failed
            .iter()
            .filter(|q| !existing.contains(q.id.as_str()))
            .map(|q| q.id.clone())
            .collect();

        let mut added = 0;
        for question_id in fresh {
            match self.add(&question_id, Source::Exam, exam_id) {
                Ok(()) => added += 1,
                Err(e) => log::warn!("not bookmarking exam question: {e}"),
            }
        }
        added
    }

    pub fn records(&self) -> impl Iterator<Item = &BookmarkRecord> {
        self.entries.iter().filter_map(|e| match e {
            StoredEntry::Current(r) => Some(r),
            _ => None,
        })
    }

    /// Entries still in a legacy shape.
    pub fn pending_legacy(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !matches!(e, StoredEntry::Current(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn count_matches(&self, question_id: &str, source: Source) -> usize {
        self.entries
            .iter()
            .filter(|e| entry_matches(e, question_id, source))
            .count()
    }

    fn persist(&self) {
        self.store.set(MIND_VAULT_KEY, &self.entries);
    }
}

fn entry_matches(entry: &StoredEntry, question_id: &str, source: Source) -> bool {
    match entry {
        StoredEntry::Current(r) => r.question_id() == question_id && r.source() == source,
        StoredEntry::Legacy(p) => source == Source::Chapter && p.question_id == question_id,
        StoredEntry::Bare(id) => source == Source::Chapter && id == question_id,
        StoredEntry::Unrecognized(_) => false,
    }
}

fn build_record(
    question_id: &str,
    source: Source,
    context_id: &str,
) -> Result<BookmarkRecord, VaultError> {
    if !is_valid_question_id(question_id) {
        return Err(VaultError::InvalidFormat {
            field: "question id",
            value: question_id.to_string(),
        });
    }
    match source {
        Source::Chapter if is_valid_chapter_id(context_id) => Ok(BookmarkRecord::Chapter {
            question_id: question_id.to_string(),
            chapter_id: context_id.to_string(),
        }),
        Source::Exam if is_valid_exam_id(context_id) => Ok(BookmarkRecord::Exam {
            question_id: question_id.to_string(),
            exam_id: context_id.to_string(),
        }),
        Source::Chapter => Err(VaultError::InvalidFormat {
            field: "chapter id",
            value: context_id.to_string(),
        }),
        Source::Exam => Err(VaultError::InvalidFormat {
            field: "exam id",
            value: context_id.to_string(),
        }),
    }
}
