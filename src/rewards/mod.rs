//! Rewards: the tiered catalog, the variable-ratio scheduler and the starter
//! point-threshold rewards.

pub mod catalog;
pub mod scheduler;
pub mod seeder;

pub use catalog::{PersonalizationInput, RewardCatalog, RewardItem, RewardTier};
pub use scheduler::{
    RandomSource, RewardSchedule, RewardScheduler, RngSource, ScheduledReward, TriggerType,
};
pub use seeder::{PointReward, initial_point_rewards};
