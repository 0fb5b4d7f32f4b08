//! Assessment answer set: typed fields collected across stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Labels rated on the reward-mapping stage. Every label must be rated
/// before that stage can be left.
pub const REWARD_PREFERENCE_LABELS: [&str; 7] = [
    "Checking items off a list",
    "Beating a personal record",
    "External recognition/praise",
    "Learning something new",
    "Helping others",
    "Financial rewards",
    "Completing challenges",
];

/// Upper bound of the 0-10 self-rating scales.
pub const SCALE_MAX: u8 = 10;

/// Valid reward preference ratings.
pub const RATING_MIN: u8 = 1;
pub const RATING_MAX: u8 = 5;

/// All answers for one session. Every field is optional so the same type
/// carries both the accumulated set and a single stage's partial submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Answers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_anxiety: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procrastination_frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dopamine_response: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accomplishments: Option<Vec<String>>,
    /// Milliseconds between the first keystroke on the capture stage and
    /// leaving it. Recorded, never interpreted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accomplishment_capture_millis: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avoidance_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivation_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_preferences: Option<BTreeMap<String, u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biggest_project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_frustration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biggest_success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_factors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub third_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_attempted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resistance_level: Option<u8>,
}

fn overlay<T>(dst: &mut Option<T>, src: Option<T>) {
    if src.is_some() {
        *dst = src;
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl Answers {
    /// Overlay every field set in `partial` onto `self`. Fields absent from
    /// `partial` keep their previous value.
    pub fn merge(&mut self, partial: Answers) {
        overlay(&mut self.baseline_anxiety, partial.baseline_anxiety);
        overlay(
            &mut self.procrastination_frequency,
            partial.procrastination_frequency,
        );
        overlay(&mut self.dopamine_response, partial.dopamine_response);
        overlay(&mut self.accomplishments, partial.accomplishments);
        overlay(
            &mut self.accomplishment_capture_millis,
            partial.accomplishment_capture_millis,
        );
        overlay(&mut self.trigger_type, partial.trigger_type);
        overlay(&mut self.avoidance_pattern, partial.avoidance_pattern);
        overlay(&mut self.work_environment, partial.work_environment);
        overlay(&mut self.motivation_style, partial.motivation_style);
        overlay(&mut self.reward_preferences, partial.reward_preferences);
        overlay(&mut self.session_length, partial.session_length);
        overlay(&mut self.biggest_project, partial.biggest_project);
        overlay(&mut self.current_frustration, partial.current_frustration);
        overlay(&mut self.biggest_success, partial.biggest_success);
        overlay(&mut self.success_factors, partial.success_factors);
        overlay(&mut self.first_action, partial.first_action);
        overlay(&mut self.second_action, partial.second_action);
        overlay(&mut self.third_action, partial.third_action);
        overlay(&mut self.completion_attempted, partial.completion_attempted);
        overlay(&mut self.resistance_level, partial.resistance_level);
    }

    /// Check the numeric fields that are set against their allowed ranges.
    pub fn validate_ranges(&self) -> Result<(), ValidationError> {
        let scales = [
            ("baseline_anxiety", self.baseline_anxiety),
            ("dopamine_response", self.dopamine_response),
            ("resistance_level", self.resistance_level),
        ];
        for (field, value) in scales {
            if let Some(v) = value {
                if v > SCALE_MAX {
                    return Err(ValidationError::OutOfRange {
                        field,
                        value: i64::from(v),
                        min: 0,
                        max: i64::from(SCALE_MAX),
                    });
                }
            }
        }

        if let Some(prefs) = &self.reward_preferences {
            for &rating in prefs.values() {
                if !(RATING_MIN..=RATING_MAX).contains(&rating) {
                    return Err(ValidationError::OutOfRange {
                        field: "reward_preferences",
                        value: i64::from(rating),
                        min: i64::from(RATING_MIN),
                        max: i64::from(RATING_MAX),
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of accomplishments entered (0 when the field is unset).
    pub fn accomplishment_count(&self) -> usize {
        self.accomplishments.as_ref().map_or(0, Vec::len)
    }

    /// Labels whose rating is at least `min_rating`.
    pub fn preferred_rewards(&self, min_rating: u8) -> Vec<String> {
        self.reward_preferences
            .iter()
            .flatten()
            .filter(|(_, rating)| **rating >= min_rating)
            .map(|(label, _)| label.clone())
            .collect()
    }
}

/// A field a stage can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerField {
    BaselineAnxiety,
    ProcrastinationFrequency,
    DopamineResponse,
    Accomplishments,
    TriggerType,
    AvoidancePattern,
    WorkEnvironment,
    MotivationStyle,
    RewardPreferences,
    SessionLength,
    BiggestProject,
    CurrentFrustration,
    BiggestSuccess,
    SuccessFactors,
    FirstAction,
    SecondAction,
    ThirdAction,
    CompletionAttempted,
    ResistanceLevel,
}

impl AnswerField {
    /// Wire name of the field, matching its serde key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BaselineAnxiety => "baseline_anxiety",
            Self::ProcrastinationFrequency => "procrastination_frequency",
            Self::DopamineResponse => "dopamine_response",
            Self::Accomplishments => "accomplishments",
            Self::TriggerType => "trigger_type",
            Self::AvoidancePattern => "avoidance_pattern",
            Self::WorkEnvironment => "work_environment",
            Self::MotivationStyle => "motivation_style",
            Self::RewardPreferences => "reward_preferences",
            Self::SessionLength => "session_length",
            Self::BiggestProject => "biggest_project",
            Self::CurrentFrustration => "current_frustration",
            Self::BiggestSuccess => "biggest_success",
            Self::SuccessFactors => "success_factors",
            Self::FirstAction => "first_action",
            Self::SecondAction => "second_action",
            Self::ThirdAction => "third_action",
            Self::CompletionAttempted => "completion_attempted",
            Self::ResistanceLevel => "resistance_level",
        }
    }

    /// Whether `answers` holds a non-empty value for this field.
    pub fn is_filled(&self, answers: &Answers) -> bool {
        match self {
            Self::BaselineAnxiety => answers.baseline_anxiety.is_some(),
            Self::ProcrastinationFrequency => has_text(&answers.procrastination_frequency),
            Self::DopamineResponse => answers.dopamine_response.is_some(),
            Self::Accomplishments => answers
                .accomplishments
                .as_ref()
                .is_some_and(|list| !list.is_empty() && list.iter().all(|a| !a.trim().is_empty())),
            Self::TriggerType => has_text(&answers.trigger_type),
            Self::AvoidancePattern => has_text(&answers.avoidance_pattern),
            Self::WorkEnvironment => has_text(&answers.work_environment),
            Self::MotivationStyle => has_text(&answers.motivation_style),
            Self::RewardPreferences => answers
                .reward_preferences
                .as_ref()
                .is_some_and(|prefs| !prefs.is_empty()),
            Self::SessionLength => has_text(&answers.session_length),
            Self::BiggestProject => has_text(&answers.biggest_project),
            Self::CurrentFrustration => has_text(&answers.current_frustration),
            Self::BiggestSuccess => has_text(&answers.biggest_success),
            Self::SuccessFactors => has_text(&answers.success_factors),
            Self::FirstAction => has_text(&answers.first_action),
            Self::SecondAction => has_text(&answers.second_action),
            Self::ThirdAction => has_text(&answers.third_action),
            Self::CompletionAttempted => answers.completion_attempted.is_some(),
            Self::ResistanceLevel => answers.resistance_level.is_some(),
        }
    }
}
