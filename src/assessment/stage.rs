//! Stage table: required fields per stage and the branch table that picks
//! the next stage.

use super::answers::{AnswerField, Answers, REWARD_PREFERENCE_LABELS};
use crate::error::ValidationError;

/// First stage of the wizard.
pub const FIRST_STAGE: u8 = 1;
/// Last stage; `complete()` is only callable here.
pub const TERMINAL_STAGE: u8 = 14;
/// Free-text stage whose fill time is measured.
pub const CAPTURE_STAGE: u8 = 3;
/// Stage on which reward preferences are rated.
pub const REWARD_MAPPING_STAGE: u8 = 9;

/// One wizard stage.
#[derive(Debug, Clone, Copy)]
pub struct StageDef {
    pub number: u8,
    pub name: &'static str,
    pub required: &'static [AnswerField],
}

/// All stages, ordered by number.
pub static STAGES: [StageDef; TERMINAL_STAGE as usize] = [
    StageDef {
        number: 1,
        name: "baseline_anxiety",
        required: &[AnswerField::BaselineAnxiety],
    },
    StageDef {
        number: 2,
        name: "procrastination_frequency",
        required: &[AnswerField::ProcrastinationFrequency],
    },
    StageDef {
        number: 3,
        name: "accomplishment_capture",
        required: &[AnswerField::Accomplishments],
    },
    StageDef {
        number: 4,
        name: "dopamine_check",
        required: &[AnswerField::DopamineResponse],
    },
    StageDef {
        number: 5,
        name: "trigger",
        required: &[AnswerField::TriggerType],
    },
    StageDef {
        number: 6,
        name: "avoidance_pattern",
        required: &[AnswerField::AvoidancePattern],
    },
    StageDef {
        number: 7,
        name: "work_environment",
        required: &[AnswerField::WorkEnvironment],
    },
    StageDef {
        number: 8,
        name: "motivation_style",
        required: &[AnswerField::MotivationStyle],
    },
    StageDef {
        number: 9,
        name: "reward_mapping",
        required: &[AnswerField::RewardPreferences],
    },
    StageDef {
        number: 10,
        name: "session_length",
        required: &[AnswerField::SessionLength],
    },
    StageDef {
        number: 11,
        name: "biggest_project",
        required: &[AnswerField::BiggestProject],
    },
    StageDef {
        number: 12,
        name: "current_frustration",
        required: &[AnswerField::CurrentFrustration],
    },
    StageDef {
        number: 13,
        name: "biggest_success",
        required: &[AnswerField::BiggestSuccess, AnswerField::SuccessFactors],
    },
    StageDef {
        number: 14,
        name: "first_actions",
        required: &[
            AnswerField::FirstAction,
            AnswerField::SecondAction,
            AnswerField::ThirdAction,
            AnswerField::CompletionAttempted,
            AnswerField::ResistanceLevel,
        ],
    },
];

/// Look up a stage by number.
pub fn stage(number: u8) -> Option<&'static StageDef> {
    STAGES.iter().find(|s| s.number == number)
}

/// Whether `number` is the terminal stage.
pub fn is_terminal(number: u8) -> bool {
    number == TERMINAL_STAGE
}

/// Check that every field `stage_number` requires is filled in `answers`.
pub fn validate_stage(stage_number: u8, answers: &Answers) -> Result<(), ValidationError> {
    let Some(def) = stage(stage_number) else {
        return Ok(());
    };
    for field in def.required {
        if !field.is_filled(answers) {
            return Err(ValidationError::MissingField {
                stage: stage_number,
                field: field.name(),
            });
        }
    }

    if stage_number == REWARD_MAPPING_STAGE {
        let prefs = answers.reward_preferences.as_ref();
        for label in REWARD_PREFERENCE_LABELS {
            if !prefs.is_some_and(|p| p.contains_key(label)) {
                return Err(ValidationError::UnratedPreference {
                    label: label.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// A static override in the branch table.
#[derive(Debug, Clone)]
pub struct BranchRule {
    /// Stage the rule applies to.
    pub from: u8,
    /// Predicate over the merged answers.
    pub when: fn(&Answers) -> bool,
    /// Stage to jump to when the predicate holds.
    pub to: u8,
}

/// Data-driven transition table: `current + 1` unless an override for the
/// current stage matches. First matching override wins.
#[derive(Debug, Clone)]
pub struct BranchTable {
    rules: Vec<BranchRule>,
}

fn trigger_is_boring(answers: &Answers) -> bool {
    answers
        .trigger_type
        .as_deref()
        .is_some_and(|t| t.to_lowercase().contains("boring"))
}

impl Default for BranchTable {
    fn default() -> Self {
        Self {
            // Boring-task triggers already name their avoidance pattern.
            rules: vec![BranchRule {
                from: 5,
                when: trigger_is_boring,
                to: 7,
            }],
        }
    }
}

impl BranchTable {
    /// A table with no overrides (strictly linear).
    pub fn linear() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add an override. Targets are clamped into the stage range.
    pub fn with_rule(mut self, rule: BranchRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Next stage after `current`. Never moves past the terminal stage.
    pub fn next_stage(&self, current: u8, answers: &Answers) -> u8 {
        let next = self
            .rules
            .iter()
            .find(|rule| rule.from == current && (rule.when)(answers))
            .map(|rule| rule.to)
            .unwrap_or_else(|| current.saturating_add(1));
        next.clamp(FIRST_STAGE, TERMINAL_STAGE)
    }
}
