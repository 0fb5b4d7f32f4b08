//! Assessment: staged questionnaire, session persistence and the atomic
//! completion pipeline.

pub mod answers;
pub mod engine;
pub mod manager;
pub mod routes;
pub mod session;
pub mod stage;

pub use answers::Answers;
pub use engine::{CompletionOutcome, StageEngine};
pub use manager::{AssessmentManager, AssessmentStatus, ScheduleView};
pub use session::Session;
