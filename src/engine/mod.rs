pub mod scoring;
pub mod session_builder;

pub use scoring::{ExamVerdict, FeedbackTier, ScoreReport};
pub use session_builder::{BuiltSession, SessionError, SessionSize, SizeOption};
