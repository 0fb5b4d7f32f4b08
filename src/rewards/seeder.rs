//! Starter point-threshold rewards granted at completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rewards::catalog::RewardTier;

/// A reward unlocked by spending accumulated points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointReward {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub points_required: u32,
    pub category: RewardTier,
    pub reward_type: String,
    pub is_claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
}

const STARTER_REWARDS: [(&str, &str, u32, RewardTier, &str); 5] = [
    (
        "15-Minute Break",
        "Guilt-free break time with your favorite activity",
        100,
        RewardTier::Micro,
        "time_based",
    ),
    (
        "Favorite Snack",
        "Treat yourself to that special snack you love",
        250,
        RewardTier::Micro,
        "consumable",
    ),
    (
        "Coffee Shop Session",
        "Work from your favorite coffee shop for a session",
        500,
        RewardTier::Mini,
        "experience",
    ),
    (
        "Movie Night",
        "Watch that movie you've been wanting to see",
        750,
        RewardTier::Mini,
        "entertainment",
    ),
    (
        "Weekend Adventure",
        "Plan a special weekend activity or trip",
        2000,
        RewardTier::Major,
        "experience",
    ),
];

/// The five starter rewards for `user_id`, ascending by points.
///
/// Fresh ids are generated on every call; stores deduplicate on
/// `(user_id, title)` so repeated seeding is a no-op.
pub fn initial_point_rewards(user_id: &str) -> Vec<PointReward> {
    STARTER_REWARDS
        .iter()
        .map(
            |(title, description, points, category, reward_type)| PointReward {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                points_required: *points,
                category: *category,
                reward_type: reward_type.to_string(),
                is_claimed: false,
                claimed_at: None,
            },
        )
        .collect()
}
