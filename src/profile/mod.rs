//! Profile classification.
//!
//! A profile is derived once, at completion, from the finalized answers.
//! The classifier is a set of ordered rule tables so individual rules can
//! be tested and extended in isolation.

pub mod classifier;
pub mod model;

pub use classifier::classify;
pub use model::{
    ComplexityTolerance, DopamineSensitivity, MotivationSustainability, ProcrastinationLevel,
    Profile,
};
