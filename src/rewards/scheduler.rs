//! Variable-ratio reward scheduling.
//!
//! Each tier has a fixed, deliberately uneven trigger progression. Only the
//! reward drawn into each slot is random, and the draw goes through a
//! [`RandomSource`] so tests can script or seed it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScheduleError;
use crate::rewards::catalog::{RewardCatalog, RewardTier};

/// Completed-task counts at which micro rewards unlock.
pub const MICRO_TRIGGERS: [u32; 8] = [1, 2, 3, 4, 6, 7, 9, 11];
/// Completed-task counts at which mini rewards unlock.
pub const MINI_TRIGGERS: [u32; 4] = [5, 8, 10, 12];
/// Completed-task counts at which major rewards unlock.
pub const MAJOR_TRIGGERS: [u32; 2] = [6, 12];

/// Trigger progression for a tier.
pub fn tier_triggers(tier: RewardTier) -> &'static [u32] {
    match tier {
        RewardTier::Micro => &MICRO_TRIGGERS,
        RewardTier::Mini => &MINI_TRIGGERS,
        RewardTier::Major => &MAJOR_TRIGGERS,
    }
}

/// Source of uniform indices for reward draws.
pub trait RandomSource: Send {
    /// Uniform index in `0..upper`. Callers never pass zero.
    fn index(&mut self, upper: usize) -> usize;
}

impl<S: RandomSource + ?Sized> RandomSource for Box<S> {
    fn index(&mut self, upper: usize) -> usize {
        (**self).index(upper)
    }
}

impl<S: RandomSource + ?Sized> RandomSource for &mut S {
    fn index(&mut self, upper: usize) -> usize {
        (**self).index(upper)
    }
}

/// [`RandomSource`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R>(R);

impl<R: Rng + Send> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self(rng)
    }
}

impl RngSource<StdRng> {
    /// Reproducible draws.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// OS-seeded draws.
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl<R: Rng + Send> RandomSource for RngSource<R> {
    fn index(&mut self, upper: usize) -> usize {
        self.0.gen_range(0..upper)
    }
}

/// What unlocks a scheduled reward. Every generated slot currently uses
/// `TaskCompletion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    TaskCompletion,
    TimeBased,
    Milestone,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskCompletion => write!(f, "task_completion"),
            Self::TimeBased => write!(f, "time_based"),
            Self::Milestone => write!(f, "milestone"),
        }
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_completion" => Ok(Self::TaskCompletion),
            "time_based" => Ok(Self::TimeBased),
            "milestone" => Ok(Self::Milestone),
            _ => Err(format!("Unknown trigger type: {}", s)),
        }
    }
}

/// One slot in a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReward {
    /// Stable slot id, e.g. `mini-schedule-2`.
    pub id: String,
    pub reward_id: String,
    pub tier: RewardTier,
    pub trigger_type: TriggerType,
    pub trigger_value: u32,
    pub is_active: bool,
    pub claimed: bool,
}

impl ScheduledReward {
    /// Whether `completed_tasks` unlocks this slot. Claimed slots never do.
    pub fn satisfied(&self, completed_tasks: u32) -> bool {
        completed_tasks >= self.trigger_value && !self.claimed
    }
}

/// An ordered schedule: micro slots, then mini, then major.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSchedule {
    pub rewards: Vec<ScheduledReward>,
}

impl RewardSchedule {
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn tier(&self, tier: RewardTier) -> impl Iterator<Item = &ScheduledReward> {
        self.rewards.iter().filter(move |r| r.tier == tier)
    }

    /// Trigger values for one tier, in slot order.
    pub fn triggers(&self, tier: RewardTier) -> Vec<u32> {
        self.tier(tier).map(|r| r.trigger_value).collect()
    }

    /// Active slots unlocked at `completed_tasks`.
    pub fn eligible(&self, completed_tasks: u32) -> Vec<&ScheduledReward> {
        self.rewards
            .iter()
            .filter(|r| r.is_active && r.satisfied(completed_tasks))
            .collect()
    }

    /// Check every slot references an item in `catalog`.
    pub fn verify(&self, catalog: &RewardCatalog) -> Result<(), ScheduleError> {
        match self
            .rewards
            .iter()
            .find(|r| catalog.get(&r.reward_id).is_none())
        {
            Some(missing) => Err(ScheduleError::UnknownReward {
                reward_id: missing.reward_id.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Draws rewards from a catalog into the fixed trigger progressions.
pub struct RewardScheduler<'a, R: RandomSource> {
    catalog: &'a RewardCatalog,
    rng: R,
}

impl<'a, R: RandomSource> RewardScheduler<'a, R> {
    pub fn new(catalog: &'a RewardCatalog, rng: R) -> Self {
        Self { catalog, rng }
    }

    /// Candidate ids for a tier, taken only from this catalog. Personalized
    /// catalogs always carry the templates, so a tier without personalized
    /// items draws from those.
    fn pool(&self, tier: RewardTier) -> Result<Vec<String>, ScheduleError> {
        let ids: Vec<String> = self
            .catalog
            .candidates(tier)
            .into_iter()
            .map(|item| item.id.clone())
            .collect();
        if ids.is_empty() {
            debug!(tier = %tier, "No reward candidates in catalog tier");
            return Err(ScheduleError::EmptyTier {
                tier: tier.to_string(),
            });
        }
        Ok(ids)
    }

    fn draw(&mut self, pool: &[String]) -> String {
        pool[self.rng.index(pool.len())].clone()
    }

    /// Build a fresh 14-slot schedule.
    pub fn generate(&mut self) -> Result<RewardSchedule, ScheduleError> {
        let mut rewards = Vec::new();
        for tier in RewardTier::ALL {
            let pool = self.pool(tier)?;
            for (index, trigger) in tier_triggers(tier).iter().enumerate() {
                rewards.push(ScheduledReward {
                    id: format!("{tier}-schedule-{index}"),
                    reward_id: self.draw(&pool),
                    tier,
                    trigger_type: TriggerType::TaskCompletion,
                    trigger_value: *trigger,
                    is_active: true,
                    claimed: false,
                });
            }
        }
        debug!(slots = rewards.len(), "Generated reward schedule");
        Ok(RewardSchedule { rewards })
    }

    /// Redraw every slot's reward. Slot ids, triggers and claimed flags are
    /// kept, and the schedule is untouched on error.
    pub fn regenerate(&mut self, schedule: &mut RewardSchedule) -> Result<(), ScheduleError> {
        let pools = RewardTier::ALL
            .iter()
            .map(|&tier| Ok((tier, self.pool(tier)?)))
            .collect::<Result<Vec<_>, ScheduleError>>()?;
        for (tier, pool) in &pools {
            for slot in schedule.rewards.iter_mut().filter(|r| r.tier == *tier) {
                slot.reward_id = self.draw(pool);
            }
        }
        Ok(())
    }
}
