//! Behavioral profile derived from a completed assessment.

use serde::{Deserialize, Serialize};

/// How often the user procrastinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcrastinationLevel {
    Low,
    Medium,
    High,
}

/// How strongly task completion registers as a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DopamineSensitivity {
    Responsive,
    Moderate,
    Resistant,
}

/// Tolerance for complex, ambiguous work. Falls as baseline anxiety rises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplexityTolerance {
    Low,
    Medium,
    High,
}

/// Preferred shape of a work session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MotivationSustainability {
    Sprint,
    Steady,
    Marathon,
}

macro_rules! impl_upper_display {
    ($ty:ty { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $(Self::$variant => $s,)+
                };
                write!(f, "{s}")
            }
        }
    };
}

impl_upper_display!(ProcrastinationLevel { Low => "LOW", Medium => "MEDIUM", High => "HIGH" });
impl_upper_display!(DopamineSensitivity {
    Responsive => "RESPONSIVE",
    Moderate => "MODERATE",
    Resistant => "RESISTANT",
});
impl_upper_display!(ComplexityTolerance { Low => "LOW", Medium => "MEDIUM", High => "HIGH" });
impl_upper_display!(MotivationSustainability {
    Sprint => "SPRINT",
    Steady => "STEADY",
    Marathon => "MARATHON",
});

/// Lower bound of `success_probability`.
pub const SUCCESS_PROBABILITY_MIN: i32 = 10;
/// Upper bound of `success_probability`.
pub const SUCCESS_PROBABILITY_MAX: i32 = 95;

/// Classification of one user's procrastination pattern. Created once at
/// completion and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub primary_type: String,
    pub procrastination_level: ProcrastinationLevel,
    pub dopamine_sensitivity: DopamineSensitivity,
    pub complexity_tolerance: ComplexityTolerance,
    pub motivation_sustainability: MotivationSustainability,
    /// Applicable risk labels, in rule order, without duplicates.
    pub risk_factors: Vec<String>,
    /// Always within 10..=95.
    pub success_probability: u8,
    pub trigger_type: String,
    pub avoidance_pattern: String,
    pub motivation_style: String,
    /// Reward-preference labels rated 4 or higher, sorted.
    pub reward_preferences: Vec<String>,
    pub optimal_session_length: String,
}
