use std::time::Duration;

use crate::content::Question;
use crate::session::progress::{AdvanceOutcome, ContextPolicy, ProgressTracker, SelectOutcome};
use crate::session::result::SessionOutcome;
use crate::session::timer::{ExamTimer, TimerTick};
use crate::vault::{BookmarkContext, MindVault};

/// A timed exam: an in-memory tracker filing bookmarks under the exam,
/// driven alongside a countdown that forces submission at zero.
///
/// Questions may be skipped and revisited in any order. An answer, once
/// given, stays locked.
pub struct ExamSession {
    exam_id: String,
    tracker: ProgressTracker,
    timer: ExamTimer,
}

impl ExamSession {
    pub fn new(exam_id: &str, questions: Vec<Question>, duration: Duration) -> Self {
        let tracker = ProgressTracker::ephemeral(questions)
            .with_free_navigation()
            .with_contexts(ContextPolicy::Shared(BookmarkContext::exam(exam_id)));
        Self {
            exam_id: exam_id.to_string(),
            tracker,
            timer: ExamTimer::new(duration),
        }
    }

    pub fn on_session_start(&mut self) {
        log::info!(
            "{} started: {} questions, {}s",
            self.exam_id,
            self.tracker.questions().len(),
            self.timer.remaining()
        );
        self.timer.start();
    }

    pub fn select_answer(&mut self, option: usize, vault: &mut MindVault) -> SelectOutcome {
        self.tracker.select_answer(option, vault)
    }

    pub fn advance(&mut self, vault: &mut MindVault) -> AdvanceOutcome {
        let outcome = self.tracker.advance();
        if matches!(outcome, AdvanceOutcome::Completed(_)) {
            self.on_session_end(vault);
        }
        outcome
    }

    /// Skip ahead without answering. False on the last question.
    pub fn skip(&mut self) -> bool {
        self.tracker.index().is_some_and(|i| self.tracker.goto(i + 1))
    }

    pub fn previous(&mut self) -> bool {
        self.tracker
            .index()
            .and_then(|i| i.checked_sub(1))
            .is_some_and(|i| self.tracker.goto(i))
    }

    pub fn goto(&mut self, index: usize) -> bool {
        self.tracker.goto(index)
    }

    /// Answered flag per question, in session order.
    pub fn answered(&self) -> Vec<bool> {
        (0..self.tracker.questions().len())
            .map(|i| self.tracker.is_answered(i))
            .collect()
    }

    /// One second of wall time. Expiry submits whatever has been answered.
    pub fn tick(&mut self, vault: &mut MindVault) -> TimerTick {
        if self.tracker.is_completed() {
            self.timer.stop();
            return TimerTick::Idle;
        }
        let tick = self.timer.tick();
        if tick == TimerTick::Expired {
            log::info!(
                "{} timed out with {} of {} answered",
                self.exam_id,
                self.tracker.log().len(),
                self.tracker.questions().len()
            );
            self.tracker.force_complete(vault);
            self.on_session_end(vault);
        }
        tick
    }

    /// Learner-initiated early submission.
    pub fn submit(&mut self, vault: &mut MindVault) -> AdvanceOutcome {
        let outcome = self.tracker.force_complete(vault);
        if matches!(outcome, AdvanceOutcome::Completed(_)) {
            self.on_session_end(vault);
        }
        outcome
    }

    pub fn is_completed(&self) -> bool {
        self.tracker.is_completed()
    }

    pub fn timer_expired(&self) -> bool {
        self.timer.is_expired()
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn timer(&self) -> &ExamTimer {
        &self.timer
    }

    pub fn exam_id(&self) -> &str {
        &self.exam_id
    }

    /// Available once the exam has completed.
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.is_completed().then(|| {
            SessionOutcome::exam(
                self.tracker.questions().to_vec(),
                self.tracker.log().to_vec(),
                self.timer.is_expired(),
            )
        })
    }

    fn on_session_end(&mut self, vault: &mut MindVault) {
        self.timer.stop();
        if let Some(outcome) = self.outcome() {
            let added = vault.record_exam_failures(&self.exam_id, &outcome.failed_questions());
            if added > 0 {
                log::debug!("{}: {added} missed questions added to the MindVault", self.exam_id);
            }
        }
    }
}
