//! Rule-based profile classifier.
//!
//! Each profile field is decided by an ordered table of independent
//! predicate/value rules; the first matching rule wins and a fixed default
//! applies when none match. Risk factors and success-probability
//! adjustments evaluate every rule. `classify` has no I/O, no clock and no
//! randomness.

use super::model::{
    ComplexityTolerance, DopamineSensitivity, MotivationSustainability, ProcrastinationLevel,
    Profile, SUCCESS_PROBABILITY_MAX, SUCCESS_PROBABILITY_MIN,
};
use crate::assessment::Answers;

/// A single predicate/value rule.
#[derive(Debug, Clone, Copy)]
pub struct Rule<T: 'static> {
    pub name: &'static str,
    pub when: fn(&Answers) -> bool,
    pub value: T,
}

/// A signed adjustment to the success probability.
#[derive(Debug, Clone, Copy)]
pub struct Adjustment {
    pub name: &'static str,
    pub when: fn(&Answers) -> bool,
    pub delta: i32,
}

/// Starting point before adjustments.
pub const SUCCESS_PROBABILITY_BASE: i32 = 50;

/// Reward preferences at or above this rating land in the profile.
pub const PREFERRED_REWARD_RATING: u8 = 4;

const DEFAULT_SESSION_LENGTH: &str = "30-45 minutes";
const UNKNOWN: &str = "unknown";

fn contains(field: &Option<String>, needle: &str) -> bool {
    field.as_deref().is_some_and(|v| v.contains(needle))
}

fn at_least(field: Option<u8>, threshold: u8) -> bool {
    field.is_some_and(|v| v >= threshold)
}

fn at_most(field: Option<u8>, threshold: u8) -> bool {
    field.is_some_and(|v| v <= threshold)
}

pub static PRIMARY_TYPE_RULES: &[Rule<&str>] = &[
    Rule {
        name: "complex_trigger",
        when: |a| contains(&a.trigger_type, "complex"),
        value: "Complexity Overwhelm",
    },
    Rule {
        name: "perfection_trigger",
        when: |a| contains(&a.trigger_type, "perfect"),
        value: "Perfectionism Paralysis",
    },
    Rule {
        name: "unclear_trigger",
        when: |a| contains(&a.trigger_type, "unclear"),
        value: "Decision Fatigue",
    },
    Rule {
        name: "boring_trigger",
        when: |a| contains(&a.trigger_type, "boring"),
        value: "Motivation Deficit",
    },
];
const PRIMARY_TYPE_DEFAULT: &str = "General Procrastination";

pub static PROCRASTINATION_LEVEL_RULES: &[Rule<ProcrastinationLevel>] = &[
    Rule {
        name: "lost_count",
        when: |a| contains(&a.procrastination_frequency, "lost count"),
        value: ProcrastinationLevel::High,
    },
    Rule {
        name: "eleven_to_thirty",
        when: |a| contains(&a.procrastination_frequency, "11-30"),
        value: ProcrastinationLevel::High,
    },
    Rule {
        name: "four_to_ten",
        when: |a| contains(&a.procrastination_frequency, "4-10"),
        value: ProcrastinationLevel::Medium,
    },
    Rule {
        name: "one_to_three",
        when: |a| contains(&a.procrastination_frequency, "1-3"),
        value: ProcrastinationLevel::Low,
    },
];

pub static DOPAMINE_SENSITIVITY_RULES: &[Rule<DopamineSensitivity>] = &[
    Rule {
        name: "strong_response",
        when: |a| at_least(a.dopamine_response, 8),
        value: DopamineSensitivity::Responsive,
    },
    Rule {
        name: "some_response",
        when: |a| at_least(a.dopamine_response, 5),
        value: DopamineSensitivity::Moderate,
    },
];

pub static COMPLEXITY_TOLERANCE_RULES: &[Rule<ComplexityTolerance>] = &[
    Rule {
        name: "high_anxiety",
        when: |a| at_least(a.baseline_anxiety, 8),
        value: ComplexityTolerance::Low,
    },
    Rule {
        name: "moderate_anxiety",
        when: |a| at_least(a.baseline_anxiety, 5),
        value: ComplexityTolerance::Medium,
    },
];

pub static MOTIVATION_SUSTAINABILITY_RULES: &[Rule<MotivationSustainability>] = &[
    Rule {
        name: "short_sessions",
        when: |a| contains(&a.session_length, "15-25"),
        value: MotivationSustainability::Sprint,
    },
    Rule {
        name: "marathon_sessions",
        when: |a| contains(&a.session_length, "3+"),
        value: MotivationSustainability::Marathon,
    },
];

pub static SUCCESS_ADJUSTMENTS: &[Adjustment] = &[
    Adjustment {
        name: "completion_attempted",
        when: |a| a.completion_attempted == Some(true),
        delta: 20,
    },
    Adjustment {
        name: "dopamine_response",
        when: |a| at_least(a.dopamine_response, 7),
        delta: 15,
    },
    Adjustment {
        name: "manageable_anxiety",
        when: |a| at_most(a.baseline_anxiety, 5),
        delta: 10,
    },
    Adjustment {
        name: "recent_accomplishments",
        when: |a| a.accomplishment_count() >= 3,
        delta: 10,
    },
    Adjustment {
        name: "chronic_procrastination",
        when: |a| contains(&a.procrastination_frequency, "lost count"),
        delta: -20,
    },
    Adjustment {
        name: "high_anxiety",
        when: |a| at_least(a.baseline_anxiety, 8),
        delta: -15,
    },
    Adjustment {
        name: "high_resistance",
        when: |a| at_least(a.resistance_level, 8),
        delta: -10,
    },
];

pub static RISK_FACTOR_RULES: &[Rule<&str>] = &[
    Rule {
        name: "high_anxiety",
        when: |a| at_least(a.baseline_anxiety, 8),
        value: "High baseline anxiety",
    },
    Rule {
        name: "chronic_procrastination",
        when: |a| contains(&a.procrastination_frequency, "lost count"),
        value: "Chronic procrastination pattern",
    },
    Rule {
        name: "high_resistance",
        when: |a| at_least(a.resistance_level, 8),
        value: "High resistance to change",
    },
    Rule {
        name: "no_completion_attempt",
        when: |a| a.completion_attempted != Some(true),
        value: "Low task completion motivation",
    },
    Rule {
        name: "perfectionism",
        when: |a| contains(&a.trigger_type, "perfect"),
        value: "Perfectionism paralysis",
    },
];

/// Value of the first rule whose predicate holds, else `default`.
pub fn first_match<T: Copy>(rules: &[Rule<T>], answers: &Answers, default: T) -> T {
    rules
        .iter()
        .find(|rule| (rule.when)(answers))
        .map(|rule| rule.value)
        .unwrap_or(default)
}

/// Base probability plus every applicable adjustment, clamped to 10..=95.
pub fn success_probability(answers: &Answers) -> u8 {
    let raw = SUCCESS_ADJUSTMENTS
        .iter()
        .filter(|adj| (adj.when)(answers))
        .fold(SUCCESS_PROBABILITY_BASE, |acc, adj| acc + adj.delta);
    // Clamped into 10..=95, always fits in u8.
    raw.clamp(SUCCESS_PROBABILITY_MIN, SUCCESS_PROBABILITY_MAX) as u8
}

/// Every applicable risk label, in rule order.
pub fn risk_factors(answers: &Answers) -> Vec<String> {
    let mut risks: Vec<String> = Vec::new();
    for rule in RISK_FACTOR_RULES {
        if (rule.when)(answers) && !risks.iter().any(|r| r == rule.value) {
            risks.push(rule.value.to_string());
        }
    }
    risks
}

fn text_or(field: &Option<String>, default: &str) -> String {
    field
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Classify a finalized answer set. Deterministic: equal inputs always
/// produce equal profiles.
pub fn classify(answers: &Answers) -> Profile {
    Profile {
        primary_type: first_match(PRIMARY_TYPE_RULES, answers, PRIMARY_TYPE_DEFAULT).to_string(),
        procrastination_level: first_match(
            PROCRASTINATION_LEVEL_RULES,
            answers,
            ProcrastinationLevel::Medium,
        ),
        dopamine_sensitivity: first_match(
            DOPAMINE_SENSITIVITY_RULES,
            answers,
            DopamineSensitivity::Resistant,
        ),
        complexity_tolerance: first_match(
            COMPLEXITY_TOLERANCE_RULES,
            answers,
            ComplexityTolerance::High,
        ),
        motivation_sustainability: first_match(
            MOTIVATION_SUSTAINABILITY_RULES,
            answers,
            MotivationSustainability::Steady,
        ),
        risk_factors: risk_factors(answers),
        success_probability: success_probability(answers),
        trigger_type: text_or(&answers.trigger_type, UNKNOWN),
        avoidance_pattern: text_or(&answers.avoidance_pattern, UNKNOWN),
        motivation_style: text_or(&answers.motivation_style, UNKNOWN),
        reward_preferences: answers.preferred_rewards(PREFERRED_REWARD_RATING),
        optimal_session_length: text_or(&answers.session_length, DEFAULT_SESSION_LENGTH),
    }
}
