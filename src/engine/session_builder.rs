use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::Question;
use crate::store::KvStore;
use crate::store::schema::answered_questions_key;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no questions available")]
    NoQuestions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SessionSize {
    Short,
    Medium,
    Long,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeOption {
    pub size: SessionSize,
    pub label: &'static str,
    pub question_count: usize,
    pub description: &'static str,
    pub estimated_time: &'static str,
    pub difficulty: &'static str,
}

pub const SIZE_OPTIONS: [SizeOption; 3] = [
    SizeOption {
        size: SessionSize::Short,
        label: "Quick Practice",
        question_count: 10,
        description: "A short warm-up over a handful of questions",
        estimated_time: "10-15 min",
        difficulty: "beginner",
    },
    SizeOption {
        size: SessionSize::Medium,
        label: "Standard Practice",
        question_count: 20,
        description: "A balanced session covering most of the chapter",
        estimated_time: "20-30 min",
        difficulty: "intermediate",
    },
    SizeOption {
        size: SessionSize::Long,
        label: "Intensive Practice",
        question_count: 40,
        description: "A long run through the whole question pool",
        estimated_time: "40-60 min",
        difficulty: "advanced",
    },
];

/// How a size option plays out against a pool of a given length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Availability {
    pub count: usize,
    pub limited: bool,
}

impl SessionSize {
    pub fn option(self) -> &'static SizeOption {
        match self {
            SessionSize::Short => &SIZE_OPTIONS[0],
            SessionSize::Medium => &SIZE_OPTIONS[1],
            SessionSize::Long => &SIZE_OPTIONS[2],
        }
    }

    pub fn question_count(self) -> usize {
        self.option().question_count
    }
}

impl SizeOption {
    pub fn availability(&self, pool_len: usize) -> Availability {
        Availability {
            count: self.question_count.min(pool_len),
            limited: pool_len < self.question_count,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BuiltSession {
    pub questions: Vec<Question>,
    pub requested: usize,
    /// The pool held fewer questions than requested.
    pub capped: bool,
}

fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Draw `count` questions from `pool`.
///
/// With an answered set, questions not yet seen come first and previously
/// answered ones fill the remainder; each group is shuffled on its own.
/// Without one (exam pools), the whole pool is shuffled.
pub fn build<R: Rng + ?Sized>(
    pool: &[Question],
    answered: Option<&HashSet<String>>,
    count: usize,
    rng: &mut R,
) -> Result<BuiltSession, SessionError> {
    if pool.is_empty() {
        return Err(SessionError::NoQuestions);
    }

    let mut ordered: Vec<Question> = match answered {
        Some(seen) => {
            let (mut seen_part, mut unseen): (Vec<Question>, Vec<Question>) =
                pool.iter().cloned().partition(|q| seen.contains(&q.id));
            shuffle(&mut unseen, rng);
            shuffle(&mut seen_part, rng);
            unseen.extend(seen_part);
            unseen
        }
        None => {
            let mut all = pool.to_vec();
            shuffle(&mut all, rng);
            all
        }
    };

    let capped = pool.len() < count;
    ordered.truncate(count);
    log::debug!(
        "built session of {} questions (requested {count}, pool {})",
        ordered.len(),
        pool.len()
    );
    Ok(BuiltSession {
        questions: ordered,
        requested: count,
        capped,
    })
}

/// Question ids answered in earlier sessions of `chapter_id`.
pub fn answered_history(store: &KvStore, chapter_id: &str) -> HashSet<String> {
    store
        .get::<Vec<String>>(&answered_questions_key(chapter_id), Vec::new())
        .into_iter()
        .collect()
}
