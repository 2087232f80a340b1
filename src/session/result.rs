use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::Question;

/// One answered question, in answer order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,
    /// `None` when the question was never answered before an exam ran out of time.
    #[serde(alias = "selectedAnswer")]
    pub selected_index: Option<usize>,
    pub is_correct: bool,
}

impl AnswerRecord {
    pub fn answered(question: &Question, option: usize) -> Self {
        Self {
            question_id: question.id.clone(),
            selected_index: Some(option),
            is_correct: question.is_correct(option),
        }
    }

    pub fn unanswered(question: &Question) -> Self {
        Self {
            question_id: question.id.clone(),
            selected_index: None,
            is_correct: false,
        }
    }
}

/// Everything the result screen needs once a session is over.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub questions: Vec<Question>,
    pub results: Vec<AnswerRecord>,
    #[serde(default)]
    pub is_exam: bool,
    #[serde(default)]
    pub timer_expired: bool,
    pub finished_at: DateTime<Utc>,
}

impl SessionOutcome {
    pub fn practice(questions: Vec<Question>, results: Vec<AnswerRecord>) -> Self {
        Self {
            questions,
            results,
            is_exam: false,
            timer_expired: false,
            finished_at: Utc::now(),
        }
    }

    pub fn exam(questions: Vec<Question>, results: Vec<AnswerRecord>, timer_expired: bool) -> Self {
        Self {
            questions,
            results,
            is_exam: true,
            timer_expired,
            finished_at: Utc::now(),
        }
    }

    pub fn correct_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_correct).count()
    }

    /// Questions not answered correctly, in session order.
    pub fn failed_questions(&self) -> Vec<&Question> {
        failed_questions(&self.questions, &self.results)
    }

    pub fn review(&self) -> Vec<ReviewItem<'_>> {
        ReviewItem::pair(&self.questions, &self.results)
    }
}

/// Positional pairing: the n-th record belongs to the n-th question.
/// Questions without a record count as failed.
pub fn failed_questions<'a>(questions: &'a [Question], log: &[AnswerRecord]) -> Vec<&'a Question> {
    questions
        .iter()
        .enumerate()
        .filter(|(i, q)| {
            !log.get(*i)
                .is_some_and(|r| r.question_id == q.id && r.is_correct)
        })
        .map(|(_, q)| q)
        .collect()
}

/// A question shown on the review screen next to what the learner picked.
#[derive(Clone, Debug)]
pub struct ReviewItem<'a> {
    pub question: &'a Question,
    pub result: Option<&'a AnswerRecord>,
}

impl<'a> ReviewItem<'a> {
    pub fn pair(questions: &'a [Question], log: &'a [AnswerRecord]) -> Vec<Self> {
        questions
            .iter()
            .enumerate()
            .map(|(i, question)| ReviewItem {
                question,
                result: log
                    .get(i)
                    .filter(|r| r.question_id == question.id)
                    .or_else(|| log.iter().find(|r| r.question_id == question.id)),
            })
            .collect()
    }

    pub fn is_correct(&self) -> bool {
        self.result.is_some_and(|r| r.is_correct)
    }
}
