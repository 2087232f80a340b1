pub mod exam;
pub mod progress;
pub mod result;
pub mod timer;

pub use exam::ExamSession;
pub use progress::{AdvanceOutcome, ContextPolicy, ProgressTracker, SelectOutcome, TrackerState};
pub use result::{AnswerRecord, SessionOutcome};
pub use timer::{ExamTimer, TimerTick, format_time};
