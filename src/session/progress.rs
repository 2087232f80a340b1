use std::collections::HashMap;

use crate::content::Question;
use crate::session::result::{AnswerRecord, SessionOutcome};
use crate::store::KvStore;
use crate::store::schema::{
    PersistedProgress, answered_questions_key, current_question_index_key, quiz_results_key,
    selected_answer_key,
};
use crate::vault::{BookmarkContext, MindVault};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerState {
    Active {
        index: usize,
        selection: Option<usize>,
    },
    Completed,
}

/// Whether progress survives a restart.
#[derive(Clone)]
pub enum TrackingMode {
    /// Chapter practice: mirrored into the store under chapter-scoped keys.
    Persistent { store: KvStore, chapter_id: String },
    Ephemeral,
}

/// Where answer-driven bookmarks are filed.
#[derive(Clone, Debug, Default)]
pub enum ContextPolicy {
    /// Ad-hoc sessions with no stable context. Answers leave the vault alone.
    #[default]
    None,
    Shared(BookmarkContext),
    /// One context per question position, for review quizzes mixing sources.
    PerQuestion(Vec<BookmarkContext>),
}

impl ContextPolicy {
    fn for_position(&self, index: usize) -> Option<&BookmarkContext> {
        match self {
            ContextPolicy::None => None,
            ContextPolicy::Shared(ctx) => Some(ctx),
            ContextPolicy::PerQuestion(ctxs) => ctxs.get(index),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    Recorded(AnswerRecord),
    /// The current question already has an answer.
    Locked,
    /// The option index is not one of the question's options.
    InvalidOption,
    NoCurrentQuestion,
    Finished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved(usize),
    Completed(Vec<AnswerRecord>),
    NotAnswered,
    Finished,
}

type CompletionHook = Box<dyn FnMut(&[AnswerRecord])>;

/// Walks a session one question at a time and keeps its answer log.
///
/// The log is in answer order while the session runs and in question order
/// once it completes.
pub struct ProgressTracker {
    questions: Vec<Question>,
    state: TrackerState,
    log: Vec<AnswerRecord>,
    mode: TrackingMode,
    contexts: ContextPolicy,
    free_navigation: bool,
    on_complete: Option<CompletionHook>,
}

impl ProgressTracker {
    pub fn ephemeral(questions: Vec<Question>) -> Self {
        Self {
            questions,
            state: TrackerState::Active {
                index: 0,
                selection: None,
            },
            log: Vec::new(),
            mode: TrackingMode::Ephemeral,
            contexts: ContextPolicy::None,
            free_navigation: false,
            on_complete: None,
        }
    }

    /// Chapter practice. Resumes from a stored checkpoint when it fits
    /// `questions`; otherwise starts over. Bookmarks go to the chapter.
    pub fn persistent(questions: Vec<Question>, store: KvStore, chapter_id: &str) -> Self {
        let mut tracker = Self::ephemeral(questions);
        tracker.contexts = ContextPolicy::Shared(BookmarkContext::chapter(chapter_id));
        tracker.mode = TrackingMode::Persistent {
            store: store.clone(),
            chapter_id: chapter_id.to_string(),
        };
        match load_checkpoint(&store, chapter_id) {
            Some(saved) if tracker.fits(&saved) => {
                log::info!(
                    "resuming {chapter_id} at question {} ({} answered)",
                    saved.current_question_index + 1,
                    saved.answer_log.len()
                );
                tracker.state = TrackerState::Active {
                    index: saved.current_question_index,
                    selection: saved.selected_answer,
                };
                tracker.log = saved.answer_log;
            }
            Some(_) => {
                log::debug!("discarding stale checkpoint for {chapter_id}");
                tracker.persist();
            }
            None => tracker.persist(),
        }
        tracker
    }

    pub fn with_contexts(mut self, contexts: ContextPolicy) -> Self {
        self.contexts = contexts;
        self
    }

    /// Allow [`goto`](Self::goto) so questions can be skipped and revisited.
    /// Ignored for persistent sessions, whose checkpoint is a log prefix.
    pub fn with_free_navigation(mut self) -> Self {
        self.free_navigation = matches!(self.mode, TrackingMode::Ephemeral);
        self
    }

    /// Called once, with the full log, when the session completes.
    pub fn on_complete(mut self, hook: impl FnMut(&[AnswerRecord]) + 'static) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    pub fn select_answer(&mut self, option: usize, vault: &mut MindVault) -> SelectOutcome {
        let TrackerState::Active { index, selection } = self.state else {
            return SelectOutcome::Finished;
        };
        let Some(question) = self.questions.get(index) else {
            return SelectOutcome::NoCurrentQuestion;
        };
        if selection.is_some() {
            return SelectOutcome::Locked;
        }
        if option >= question.options.len() {
            return SelectOutcome::InvalidOption;
        }

        let record = AnswerRecord::answered(question, option);
        self.state = TrackerState::Active {
            index,
            selection: Some(option),
        };
        self.log.push(record.clone());
        self.apply_bookmark(index, record.is_correct, vault);

        if let TrackingMode::Persistent { store, chapter_id } = &self.mode {
            let id = record.question_id.clone();
            store.update(
                &answered_questions_key(chapter_id),
                Vec::<String>::new(),
                |mut seen| {
                    if !seen.contains(&id) {
                        seen.push(id);
                    }
                    seen
                },
            );
        }
        self.persist();
        SelectOutcome::Recorded(record)
    }

    pub fn advance(&mut self) -> AdvanceOutcome {
        let TrackerState::Active { index, selection } = self.state else {
            return AdvanceOutcome::Finished;
        };
        if selection.is_none() {
            return AdvanceOutcome::NotAnswered;
        }
        let next = if self.free_navigation {
            self.next_unanswered(index + 1)
        } else {
            Some(index + 1).filter(|&next| next < self.questions.len())
        };
        match next {
            Some(next) => {
                self.move_to(next);
                AdvanceOutcome::Moved(next)
            }
            None => self.complete(),
        }
    }

    /// Jump to any question of a freely navigable session. Answered
    /// questions come back locked with their recorded selection.
    pub fn goto(&mut self, index: usize) -> bool {
        if !self.free_navigation || self.is_completed() || index >= self.questions.len() {
            return false;
        }
        self.move_to(index);
        true
    }

    /// Finish now. Every question without an answer is logged as incorrect
    /// with no selection and bookmarked like any other wrong answer.
    pub fn force_complete(&mut self, vault: &mut MindVault) -> AdvanceOutcome {
        if self.is_completed() {
            return AdvanceOutcome::Finished;
        }
        for index in 0..self.questions.len() {
            if self.is_answered(index) {
                continue;
            }
            self.log.push(AnswerRecord::unanswered(&self.questions[index]));
            self.apply_bookmark(index, false, vault);
        }
        self.complete()
    }

    /// Back to the first question with an empty log. Clears any checkpoint.
    pub fn reset(&mut self) {
        self.state = TrackerState::Active {
            index: 0,
            selection: None,
        };
        self.log.clear();
        self.persist();
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            TrackerState::Active { index, .. } => self.questions.get(index),
            TrackerState::Completed => None,
        }
    }

    /// Where the current question would be bookmarked, if anywhere.
    pub fn current_context(&self) -> Option<&BookmarkContext> {
        self.index().and_then(|i| self.contexts.for_position(i))
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn index(&self) -> Option<usize> {
        match self.state {
            TrackerState::Active { index, .. } => Some(index),
            TrackerState::Completed => None,
        }
    }

    pub fn selection(&self) -> Option<usize> {
        match self.state {
            TrackerState::Active { selection, .. } => selection,
            TrackerState::Completed => None,
        }
    }

    pub fn is_answered(&self, index: usize) -> bool {
        self.record_for(index).is_some()
    }

    pub fn log(&self) -> &[AnswerRecord] {
        &self.log
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn is_completed(&self) -> bool {
        self.state == TrackerState::Completed
    }

    /// Fraction of questions answered, 0.0 for an empty session.
    pub fn progress(&self) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        self.log.len() as f64 / self.questions.len() as f64
    }

    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome::practice(self.questions.clone(), self.log.clone())
    }

    fn complete(&mut self) -> AdvanceOutcome {
        self.state = TrackerState::Completed;
        let position: HashMap<&str, usize> = self
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| (q.id.as_str(), i))
            .collect();
        self.log
            .sort_by_key(|r| position.get(r.question_id.as_str()).copied().unwrap_or(usize::MAX));
        if let TrackingMode::Persistent { store, chapter_id } = &self.mode {
            clear_checkpoint(store, chapter_id);
        }
        if let Some(mut hook) = self.on_complete.take() {
            hook(&self.log);
        }
        AdvanceOutcome::Completed(self.log.clone())
    }

    fn record_for(&self, index: usize) -> Option<&AnswerRecord> {
        let id = &self.questions.get(index)?.id;
        self.log.iter().find(|r| &r.question_id == id)
    }

    // First question without an answer at or after `from`, wrapping around.
    fn next_unanswered(&self, from: usize) -> Option<usize> {
        let len = self.questions.len();
        (from..len).chain(0..from.min(len)).find(|&i| !self.is_answered(i))
    }

    fn move_to(&mut self, index: usize) {
        self.state = TrackerState::Active {
            index,
            selection: self.record_for(index).and_then(|r| r.selected_index),
        };
        self.persist();
    }

    fn apply_bookmark(&self, index: usize, correct: bool, vault: &mut MindVault) {
        let Some(ctx) = self.contexts.for_position(index) else {
            return;
        };
        let question_id = &self.questions[index].id;
        if correct {
            vault.remove(question_id, ctx.source);
        } else if let Err(e) = vault.add(question_id, ctx.source, &ctx.context_id) {
            log::warn!("could not bookmark {question_id}: {e}");
        }
    }

    fn fits(&self, saved: &PersistedProgress) -> bool {
        let index = saved.current_question_index;
        let expected_len = index + usize::from(saved.selected_answer.is_some());
        index < self.questions.len()
            && saved.answer_log.len() == expected_len
            && saved
                .answer_log
                .iter()
                .zip(&self.questions)
                .all(|(r, q)| r.question_id == q.id)
            && saved
                .selected_answer
                .is_none_or(|sel| saved.answer_log.last().is_some_and(|r| r.selected_index == Some(sel)))
    }

    fn persist(&self) {
        let TrackingMode::Persistent { store, chapter_id } = &self.mode else {
            return;
        };
        match self.state {
            TrackerState::Active { index, selection } => {
                store.set(&current_question_index_key(chapter_id), &index);
                store.set(&selected_answer_key(chapter_id), &selection);
                store.set(&quiz_results_key(chapter_id), &self.log);
            }
            TrackerState::Completed => clear_checkpoint(store, chapter_id),
        }
    }
}

/// The stored checkpoint for a chapter, if one was written.
pub fn load_checkpoint(store: &KvStore, chapter_id: &str) -> Option<PersistedProgress> {
    let index: Option<usize> = store.get(&current_question_index_key(chapter_id), None);
    Some(PersistedProgress {
        current_question_index: index?,
        selected_answer: store.get(&selected_answer_key(chapter_id), None),
        answer_log: store.get(&quiz_results_key(chapter_id), Vec::new()),
    })
}

pub fn clear_checkpoint(store: &KvStore, chapter_id: &str) {
    store.remove(&current_question_index_key(chapter_id));
    store.remove(&selected_answer_key(chapter_id));
    store.remove(&quiz_results_key(chapter_id));
}

/// Put the checkpoint's questions back in their logged order ahead of the
/// rest, so a rebuilt session lines up with the stored log.
pub fn restore_order(mut questions: Vec<Question>, saved: &PersistedProgress) -> Vec<Question> {
    let mut ordered = Vec::with_capacity(questions.len());
    for record in &saved.answer_log {
        if let Some(pos) = questions.iter().position(|q| q.id == record.question_id) {
            ordered.push(questions.remove(pos));
        }
    }
    ordered.extend(questions);
    ordered
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::store::schema::Source;

    fn q(id: &str, correct: usize) -> Question {
        Question {
            id: id.into(),
            chapter_section: "1.1".into(),
            question_text: format!("question {id}"),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer_index: correct,
            explanation: String::new(),
        }
    }

    fn three() -> Vec<Question> {
        vec![q("q001", 0), q("q002", 1), q("q003", 2)]
    }

    #[test]
    fn walks_to_completion_and_fires_once() {
        let fired = Rc::new(Cell::new(0));
        let seen = fired.clone();
        let mut vault = MindVault::load(KvStore::in_memory());
        let mut t = ProgressTracker::ephemeral(three()).on_complete(move |log| {
            assert_eq!(log.len(), 3);
            seen.set(seen.get() + 1);
        });

        for option in [0, 1, 0] {
            assert!(matches!(t.select_answer(option, &mut vault), SelectOutcome::Recorded(_)));
            t.advance();
        }
        assert!(t.is_completed());
        assert_eq!(fired.get(), 1);
        assert_eq!(t.advance(), AdvanceOutcome::Finished);
        assert_eq!(t.select_answer(0, &mut vault), SelectOutcome::Finished);
        assert_eq!(fired.get(), 1);
        assert_eq!(t.outcome().correct_count(), 2);
    }

    #[test]
    fn answer_is_locked_until_advance() {
        let mut vault = MindVault::load(KvStore::in_memory());
        let mut t = ProgressTracker::ephemeral(three());
        let SelectOutcome::Recorded(first) = t.select_answer(2, &mut vault) else {
            panic!("expected a recorded answer");
        };
        assert_eq!(t.select_answer(0, &mut vault), SelectOutcome::Locked);
        assert_eq!(t.log(), &[first]);
        assert_eq!(t.selection(), Some(2));
    }

    #[test]
    fn advance_requires_an_answer() {
        let mut vault = MindVault::load(KvStore::in_memory());
        let mut t = ProgressTracker::ephemeral(three());
        assert_eq!(t.advance(), AdvanceOutcome::NotAnswered);
        assert_eq!(t.select_answer(9, &mut vault), SelectOutcome::InvalidOption);
        t.select_answer(0, &mut vault);
        assert_eq!(t.advance(), AdvanceOutcome::Moved(1));
        assert_eq!(t.current_question().map(|q| q.id.as_str()), Some("q002"));
    }

    #[test]
    fn empty_session_has_no_current_question() {
        let mut vault = MindVault::load(KvStore::in_memory());
        let mut t = ProgressTracker::ephemeral(Vec::new());
        assert_eq!(t.select_answer(0, &mut vault), SelectOutcome::NoCurrentQuestion);
        assert!(t.current_question().is_none());
        assert_eq!(t.progress(), 0.0);
    }

    #[test]
    fn wrong_answers_bookmark_and_right_answers_unbookmark() {
        let store = KvStore::in_memory();
        let mut vault = MindVault::load(store.clone());

        let mut first = ProgressTracker::persistent(three(), store.clone(), "chapter-1");
        first.select_answer(1, &mut vault);
        assert!(vault.is_bookmarked("q001", Source::Chapter));
        assert!(vault.records().any(|r| r.context_id() == "chapter-1"));

        first.reset();
        first.select_answer(0, &mut vault);
        assert!(!vault.is_bookmarked("q001", Source::Chapter));
    }

    #[test]
    fn ad_hoc_sessions_leave_the_vault_alone() {
        let mut vault = MindVault::load(KvStore::in_memory());
        let mut t = ProgressTracker::ephemeral(three());
        t.select_answer(2, &mut vault);
        assert!(vault.is_empty());
    }

    #[test]
    fn per_question_contexts_follow_position() {
        let mut vault = MindVault::load(KvStore::in_memory());
        let contexts = vec![BookmarkContext::exam("exam-1"), BookmarkContext::chapter("chapter-3")];
        let mut t = ProgressTracker::ephemeral(vec![q("q001", 0), q("q002", 0)])
            .with_contexts(ContextPolicy::PerQuestion(contexts));
        t.select_answer(1, &mut vault);
        t.advance();
        t.select_answer(1, &mut vault);
        assert!(vault.is_bookmarked("q001", Source::Exam));
        assert!(vault.is_bookmarked("q002", Source::Chapter));
        assert!(!vault.is_bookmarked("q001", Source::Chapter));
    }

    #[test]
    fn persistent_mode_resumes_mid_session() {
        let store = KvStore::in_memory();
        let mut vault = MindVault::load(store.clone());
        {
            let mut t = ProgressTracker::persistent(three(), store.clone(), "chapter-1");
            t.select_answer(0, &mut vault);
            t.advance();
            t.select_answer(0, &mut vault);
        }
        assert_eq!(store.get(&current_question_index_key("chapter-1"), 0usize), 1);
        assert_eq!(store.get(&selected_answer_key("chapter-1"), None::<usize>), Some(0));

        let resumed = ProgressTracker::persistent(three(), store.clone(), "chapter-1");
        assert_eq!(resumed.index(), Some(1));
        assert_eq!(resumed.selection(), Some(0));
        assert_eq!(resumed.log().len(), 2);

        let history: Vec<String> = store.get(&answered_questions_key("chapter-1"), Vec::new());
        assert_eq!(history, vec!["q001", "q002"]);
    }

    #[test]
    fn mismatched_checkpoint_is_discarded() {
        let store = KvStore::in_memory();
        let mut vault = MindVault::load(store.clone());
        let mut t = ProgressTracker::persistent(three(), store.clone(), "chapter-1");
        t.select_answer(0, &mut vault);

        let other = vec![q("q009", 0), q("q001", 0)];
        let fresh = ProgressTracker::persistent(other, store.clone(), "chapter-1");
        assert_eq!(fresh.index(), Some(0));
        assert!(fresh.log().is_empty());
    }

    #[test]
    fn completion_clears_checkpoint() {
        let store = KvStore::in_memory();
        let mut vault = MindVault::load(store.clone());
        let mut t = ProgressTracker::persistent(vec![q("q001", 0)], store.clone(), "chapter-2");
        t.select_answer(0, &mut vault);
        assert!(matches!(t.advance(), AdvanceOutcome::Completed(_)));
        assert!(load_checkpoint(&store, "chapter-2").is_none());
        assert!(store.get_raw(&quiz_results_key("chapter-2")).is_none());
        assert!(store.get_raw(&answered_questions_key("chapter-2")).is_some());
    }

    #[test]
    fn force_complete_fills_unanswered() {
        let mut vault = MindVault::load(KvStore::in_memory());
        let mut t = ProgressTracker::ephemeral(three())
            .with_contexts(ContextPolicy::Shared(BookmarkContext::exam("exam-2")));
        t.select_answer(0, &mut vault);
        let AdvanceOutcome::Completed(log) = t.force_complete(&mut vault) else {
            panic!("expected completion");
        };
        assert_eq!(log.len(), 3);
        assert_eq!(log[1].selected_index, None);
        assert!(!log[2].is_correct);
        assert!(vault.is_bookmarked("q003", Source::Exam));
        assert_eq!(t.force_complete(&mut vault), AdvanceOutcome::Finished);
    }

    #[test]
    fn skipped_question_can_be_answered_later() {
        let mut vault = MindVault::load(KvStore::in_memory());
        let mut t = ProgressTracker::ephemeral(three()).with_free_navigation();
        assert!(t.goto(1));
        t.select_answer(1, &mut vault);
        assert_eq!(t.advance(), AdvanceOutcome::Moved(2));
        t.select_answer(0, &mut vault);
        assert_eq!(t.advance(), AdvanceOutcome::Moved(0));

        assert!(t.goto(1));
        assert_eq!(t.selection(), Some(1));
        assert_eq!(t.select_answer(0, &mut vault), SelectOutcome::Locked);

        assert!(t.goto(0));
        assert_eq!(t.selection(), None);
        t.select_answer(0, &mut vault);
        let AdvanceOutcome::Completed(log) = t.advance() else {
            panic!("expected completion");
        };
        let ids: Vec<&str> = log.iter().map(|r| r.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q001", "q002", "q003"]);
        assert_eq!(t.outcome().correct_count(), 2);
        assert!(!t.goto(0));
    }

    #[test]
    fn force_complete_fills_gaps_anywhere() {
        let mut vault = MindVault::load(KvStore::in_memory());
        let four = vec![q("q001", 0), q("q002", 0), q("q003", 0), q("q004", 0)];
        let mut t = ProgressTracker::ephemeral(four)
            .with_free_navigation()
            .with_contexts(ContextPolicy::Shared(BookmarkContext::exam("exam-1")));
        t.goto(3);
        t.select_answer(0, &mut vault);
        t.goto(1);
        t.select_answer(0, &mut vault);

        let AdvanceOutcome::Completed(log) = t.force_complete(&mut vault) else {
            panic!("expected completion");
        };
        let picks: Vec<(&str, Option<usize>)> = log
            .iter()
            .map(|r| (r.question_id.as_str(), r.selected_index))
            .collect();
        assert_eq!(
            picks,
            vec![("q001", None), ("q002", Some(0)), ("q003", None), ("q004", Some(0))]
        );
        assert!(!log[0].is_correct && !log[2].is_correct);
        assert!(vault.is_bookmarked("q001", Source::Exam));
        assert!(vault.is_bookmarked("q003", Source::Exam));
        assert!(!vault.is_bookmarked("q004", Source::Exam));
    }

    #[test]
    fn persistent_sessions_stay_linear() {
        let store = KvStore::in_memory();
        let mut t =
            ProgressTracker::persistent(three(), store.clone(), "chapter-1").with_free_navigation();
        assert!(!t.goto(2));
        assert_eq!(t.index(), Some(0));
    }

    #[test]
    fn restore_order_puts_logged_questions_first() {
        let saved = PersistedProgress {
            current_question_index: 1,
            selected_answer: None,
            answer_log: vec![AnswerRecord::answered(&q("q003", 2), 2)],
        };
        let ordered = restore_order(three(), &saved);
        let ids: Vec<&str> = ordered.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q003", "q001", "q002"]);
    }
}
