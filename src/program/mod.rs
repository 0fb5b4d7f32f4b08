//! Program synthesis from a classified profile.

pub mod synthesizer;

pub use synthesizer::{Program, UserStats, starting_stats, synthesize};
