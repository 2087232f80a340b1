use crate::content::{ChapterMeta, ExamMeta, Question};
use crate::store::schema::{BookmarkRecord, Source};
use crate::vault::{BookmarkContext, MindVault};

/// Bookmarked questions from one chapter or one exam.
#[derive(Clone, Debug)]
pub struct VaultGroup {
    pub context: BookmarkContext,
    pub title: String,
    pub questions: Vec<Question>,
}

impl VaultGroup {
    pub fn source(&self) -> Source {
        self.context.source
    }
}

/// The MindVault resolved against loaded content, grouped for browsing.
#[derive(Clone, Debug, Default)]
pub struct VaultView {
    pub chapters: Vec<VaultGroup>,
    pub exams: Vec<VaultGroup>,
}

impl VaultView {
    /// Chapter groups follow `chapters` order; exam groups follow first
    /// appearance in the vault. Bookmarks whose question is not in any
    /// loaded pool are left out, as are empty groups.
    pub fn build(
        vault: &MindVault,
        chapters: &[(ChapterMeta, Vec<Question>)],
        exams: &[(ExamMeta, Vec<Question>)],
    ) -> Self {
        let records: Vec<&BookmarkRecord> = vault.records().collect();

        let chapter_groups = chapters
            .iter()
            .map(|(meta, pool)| {
                let questions = pool
                    .iter()
                    .filter(|q| {
                        let derived = q.chapter().map(|c| c.to_string());
                        derived.as_deref() == Some(meta.id.as_str())
                            && records.iter().any(|r| {
                                matches!(r, BookmarkRecord::Chapter { question_id, chapter_id }
                                    if *question_id == q.id && *chapter_id == meta.id)
                            })
                    })
                    .cloned()
                    .collect();
                VaultGroup {
                    context: BookmarkContext::chapter(meta.id.clone()),
                    title: meta.title.clone(),
                    questions,
                }
            })
            .filter(|g| !g.questions.is_empty())
            .collect();

        let mut exam_ids: Vec<&str> = Vec::new();
        for r in &records {
            if let BookmarkRecord::Exam { exam_id, .. } = r
                && !exam_ids.contains(&exam_id.as_str())
            {
                exam_ids.push(exam_id);
            }
        }
        let exam_groups = exam_ids
            .into_iter()
            .filter_map(|exam_id| {
                let (meta, pool) = exams.iter().find(|(m, _)| m.id == exam_id)?;
                let questions: Vec<Question> = pool
                    .iter()
                    .filter(|q| {
                        records.iter().any(|r| {
                            matches!(r, BookmarkRecord::Exam { question_id, exam_id: id }
                                if *question_id == q.id && id == exam_id)
                        })
                    })
                    .cloned()
                    .collect();
                (!questions.is_empty()).then(|| VaultGroup {
                    context: BookmarkContext::exam(exam_id),
                    title: meta.title.clone(),
                    questions,
                })
            })
            .collect();

        Self {
            chapters: chapter_groups,
            exams: exam_groups,
        }
    }

    pub fn total(&self) -> usize {
        self.chapters
            .iter()
            .chain(&self.exams)
            .map(|g| g.questions.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn groups(&self) -> impl Iterator<Item = &VaultGroup> {
        self.chapters.iter().chain(&self.exams)
    }

    pub fn find(&self, context_id: &str) -> Option<&VaultGroup> {
        self.groups().find(|g| g.context.context_id == context_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvStore;

    fn q(id: &str, section: &str) -> Question {
        Question {
            id: id.into(),
            chapter_section: section.into(),
            question_text: format!("question {id}"),
            options: vec!["a".into(), "b".into()],
            correct_answer_index: 0,
            explanation: String::new(),
        }
    }

    fn chapter_meta(id: &str, title: &str) -> ChapterMeta {
        ChapterMeta {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            is_coming_soon: false,
        }
    }

    fn exam_meta(id: &str) -> ExamMeta {
        ExamMeta {
            id: id.into(),
            title: format!("Practice {id}"),
            description: String::new(),
            duration_minutes: Some(60),
        }
    }

    #[test]
    fn groups_by_chapter_and_exam_without_cross_talk() {
        let mut vault = MindVault::load(KvStore::in_memory());
        vault.add("q001", Source::Chapter, "chapter-1").unwrap();
        vault.add("q002", Source::Chapter, "chapter-2").unwrap();
        vault.add("q001", Source::Exam, "exam-1").unwrap();

        let chapters = vec![
            (chapter_meta("chapter-1", "Basics"), vec![q("q001", "1.1"), q("q002", "1.2")]),
            (chapter_meta("chapter-2", "Routing"), vec![q("q001", "2.1"), q("q002", "2.2")]),
        ];
        let exams = vec![(exam_meta("exam-1"), vec![q("q001", "4.4"), q("q002", "1.1")])];

        let view = VaultView::build(&vault, &chapters, &exams);
        assert_eq!(view.chapters.len(), 2);
        assert_eq!(view.chapters[0].title, "Basics");
        assert_eq!(view.chapters[0].questions.len(), 1);
        assert_eq!(view.chapters[0].questions[0].chapter_section, "1.1");
        assert_eq!(view.chapters[1].questions[0].chapter_section, "2.2");

        assert_eq!(view.exams.len(), 1);
        assert_eq!(view.exams[0].questions.len(), 1);
        assert_eq!(view.exams[0].questions[0].chapter_section, "4.4");
        assert_eq!(view.exams[0].source(), Source::Exam);
        assert_eq!(view.total(), 3);
        assert!(view.find("exam-1").is_some());
    }

    #[test]
    fn unresolved_bookmarks_are_hidden() {
        let mut vault = MindVault::load(KvStore::in_memory());
        vault.add("q009", Source::Chapter, "chapter-1").unwrap();
        vault.add("q001", Source::Exam, "exam-7").unwrap();
        let chapters = vec![(chapter_meta("chapter-1", "Basics"), vec![q("q001", "1.1")])];
        let view = VaultView::build(&vault, &chapters, &[]);
        assert!(view.is_empty());
    }
}
