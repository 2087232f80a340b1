use crate::session::result::SessionOutcome;

pub const DEFAULT_PASS_PERCENT: u32 = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeedbackTier {
    Fail,
    Forty,
    Fifty,
    Sixty,
    Seventy,
    Eighty,
    Ninety,
}

impl FeedbackTier {
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            90.. => FeedbackTier::Ninety,
            80..=89 => FeedbackTier::Eighty,
            70..=79 => FeedbackTier::Seventy,
            60..=69 => FeedbackTier::Sixty,
            50..=59 => FeedbackTier::Fifty,
            40..=49 => FeedbackTier::Forty,
            _ => FeedbackTier::Fail,
        }
    }

    pub fn lower_bound(self) -> u32 {
        match self {
            FeedbackTier::Ninety => 90,
            FeedbackTier::Eighty => 80,
            FeedbackTier::Seventy => 70,
            FeedbackTier::Sixty => 60,
            FeedbackTier::Fifty => 50,
            FeedbackTier::Forty => 40,
            FeedbackTier::Fail => 0,
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            FeedbackTier::Ninety => "Outstanding",
            FeedbackTier::Eighty => "Great work",
            FeedbackTier::Seventy => "Good job",
            FeedbackTier::Sixty => "Getting there",
            FeedbackTier::Fifty => "Halfway there",
            FeedbackTier::Forty => "Keep practicing",
            FeedbackTier::Fail => "Time to review",
        }
    }

    pub fn suggestion(self) -> &'static str {
        match self {
            FeedbackTier::Ninety => {
                "You have mastered this material. Try a timed exam to test yourself under pressure."
            }
            FeedbackTier::Eighty => {
                "Strong result. Review the few questions you missed and you will be exam ready."
            }
            FeedbackTier::Seventy => {
                "Solid understanding. Revisit the sections behind your wrong answers."
            }
            FeedbackTier::Sixty => {
                "You know the basics. Work through your MindVault before the next session."
            }
            FeedbackTier::Fifty => {
                "Half the answers were right. Reread the chapter and retry a short session."
            }
            FeedbackTier::Forty => {
                "Several gaps remain. Study the explanations of every missed question."
            }
            FeedbackTier::Fail => {
                "Start again from the chapter material, then practice with short sessions."
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExamVerdict {
    Passed,
    Failed,
    /// The clock ran out. Counts as a fail whatever the score.
    TimeExpired,
}

impl ExamVerdict {
    pub fn is_pass(self) -> bool {
        self == ExamVerdict::Passed
    }

    pub fn headline(self) -> &'static str {
        match self {
            ExamVerdict::Passed => "Exam passed",
            ExamVerdict::Failed => "Exam not passed",
            ExamVerdict::TimeExpired => "Time expired",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreReport {
    pub correct: usize,
    pub total: usize,
    pub percentage: u32,
    pub tier: FeedbackTier,
    /// Present for exam outcomes only.
    pub verdict: Option<ExamVerdict>,
}

pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}

impl ScoreReport {
    pub fn from_outcome(outcome: &SessionOutcome, pass_percent: u32) -> Self {
        let correct = outcome.correct_count();
        let total = outcome.questions.len();
        let percentage = percentage(correct, total);
        let verdict = outcome.is_exam.then(|| {
            if outcome.timer_expired {
                ExamVerdict::TimeExpired
            } else if percentage >= pass_percent {
                ExamVerdict::Passed
            } else {
                ExamVerdict::Failed
            }
        });
        Self {
            correct,
            total,
            percentage,
            tier: FeedbackTier::from_percentage(percentage),
            verdict,
        }
    }

    pub fn incorrect(&self) -> usize {
        self.total - self.correct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Question;
    use crate::session::result::AnswerRecord;

    fn questions(n: usize) -> Vec<Question> {
        (1..=n)
            .map(|i| Question {
                id: format!("q{i:03}"),
                chapter_section: "1.1".into(),
                question_text: String::new(),
                options: vec!["a".into(), "b".into()],
                correct_answer_index: 0,
                explanation: String::new(),
            })
            .collect()
    }

    fn log(questions: &[Question], correct: usize) -> Vec<AnswerRecord> {
        questions
            .iter()
            .enumerate()
            .map(|(i, q)| AnswerRecord::answered(q, if i < correct { 0 } else { 1 }))
            .collect()
    }

    #[test]
    fn seven_of_ten_is_seventy() {
        let qs = questions(10);
        let results = log(&qs, 7);
        let report = ScoreReport::from_outcome(&SessionOutcome::practice(qs, results), 80);
        assert_eq!(report.correct, 7);
        assert_eq!(report.percentage, 70);
        assert_eq!(report.tier, FeedbackTier::Seventy);
        assert_eq!(report.incorrect(), 3);
        assert_eq!(report.verdict, None);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(FeedbackTier::from_percentage(100), FeedbackTier::Ninety);
        assert_eq!(FeedbackTier::from_percentage(90), FeedbackTier::Ninety);
        assert_eq!(FeedbackTier::from_percentage(89), FeedbackTier::Eighty);
        assert_eq!(FeedbackTier::from_percentage(40), FeedbackTier::Forty);
        assert_eq!(FeedbackTier::from_percentage(39), FeedbackTier::Fail);
        for p in 0..=100 {
            assert!(FeedbackTier::from_percentage(p).lower_bound() <= p);
        }
    }

    #[test]
    fn zero_questions_scores_zero() {
        assert_eq!(percentage(0, 0), 0);
        let report = ScoreReport::from_outcome(&SessionOutcome::practice(vec![], vec![]), 80);
        assert_eq!(report.percentage, 0);
        assert_eq!(report.tier, FeedbackTier::Fail);
    }

    #[test]
    fn rounding() {
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(1, 8), 13);
    }

    #[test]
    fn exam_verdicts() {
        let qs = questions(5);
        let pass = ScoreReport::from_outcome(&SessionOutcome::exam(qs.clone(), log(&qs, 4), false), 80);
        assert_eq!(pass.verdict, Some(ExamVerdict::Passed));

        let fail = ScoreReport::from_outcome(&SessionOutcome::exam(qs.clone(), log(&qs, 3), false), 80);
        assert_eq!(fail.verdict, Some(ExamVerdict::Failed));

        let expired = ScoreReport::from_outcome(&SessionOutcome::exam(qs.clone(), log(&qs, 5), true), 80);
        assert_eq!(expired.verdict, Some(ExamVerdict::TimeExpired));
        assert!(!expired.verdict.is_some_and(ExamVerdict::is_pass));

        let lenient = ScoreReport::from_outcome(&SessionOutcome::exam(qs.clone(), log(&qs, 3), false), 60);
        assert_eq!(lenient.verdict, Some(ExamVerdict::Passed));
    }
}
