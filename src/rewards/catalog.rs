//! Tiered reward catalog: fixed templates plus items personalized from the
//! user's own activities.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// Maximum personalized items drawn from each input list.
pub const MAX_PERSONALIZED_PER_TIER: usize = 4;

/// Reward size. Each tier has a fixed activity length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTier {
    Micro,
    Mini,
    Major,
}

impl RewardTier {
    pub const ALL: [RewardTier; 3] = [Self::Micro, Self::Mini, Self::Major];

    /// Activity length in minutes.
    pub fn duration_minutes(&self) -> u32 {
        match self {
            Self::Micro => 10,
            Self::Mini => 30,
            Self::Major => 120,
        }
    }
}

impl std::fmt::Display for RewardTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Micro => write!(f, "micro"),
            Self::Mini => write!(f, "mini"),
            Self::Major => write!(f, "major"),
        }
    }
}

impl std::str::FromStr for RewardTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "micro" => Ok(Self::Micro),
            "mini" => Ok(Self::Mini),
            "major" => Ok(Self::Major),
            _ => Err(format!("Unknown reward tier: {}", s)),
        }
    }
}

/// A reward activity available for scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: RewardTier,
    pub duration_minutes: u32,
    /// Interest area the template targets, or "custom".
    pub personalized_for: String,
    pub is_custom: bool,
}

impl RewardItem {
    fn template(id: &str, title: &str, description: &str, tier: RewardTier, area: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: tier,
            duration_minutes: tier.duration_minutes(),
            personalized_for: area.to_string(),
            is_custom: false,
        }
    }

    fn custom(id: String, title: String, description: String, tier: RewardTier) -> Self {
        Self {
            id,
            title,
            description,
            category: tier,
            duration_minutes: tier.duration_minutes(),
            personalized_for: "custom".to_string(),
            is_custom: true,
        }
    }
}

/// What the user enjoys, used to personalize the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalizationInput {
    pub enjoyable_activities: Vec<String>,
    pub mood_boosters: Vec<String>,
    pub daily_schedule: String,
    pub stress_level: u8,
    pub available_time_blocks: Vec<String>,
}

fn non_blank(items: &[String]) -> impl Iterator<Item = &str> {
    items.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Built-in rewards available to every user.
pub fn template_items() -> Vec<RewardItem> {
    use RewardTier::*;
    vec![
        RewardItem::template("micro-1", "Favorite Song", "Listen to your favorite energizing song", Micro, "music"),
        RewardItem::template("micro-2", "Quick Walk", "5-minute walk outside for fresh air", Micro, "movement"),
        RewardItem::template("micro-3", "Premium Coffee", "Make or buy your favorite premium coffee", Micro, "treats"),
        RewardItem::template("micro-4", "Funny Video", "Watch a specific funny YouTube video", Micro, "entertainment"),
        RewardItem::template("micro-5", "Stretch Break", "Quick stretching or yoga routine", Micro, "wellness"),
        RewardItem::template("micro-6", "Social Check-in", "Quick text or call to a friend", Micro, "social"),
        RewardItem::template("micro-7", "Mindful Breathing", "5-minute meditation or breathing exercise", Micro, "mindfulness"),
        RewardItem::template("micro-8", "Healthy Snack", "Enjoy a specific healthy snack you love", Micro, "nutrition"),
        RewardItem::template("mini-1", "TV Episode", "Watch one episode of your favorite show", Mini, "entertainment"),
        RewardItem::template("mini-2", "Video Game Session", "Play your favorite game for 30 minutes", Mini, "gaming"),
        RewardItem::template("mini-3", "Friend Call", "Have a proper catch-up call with a friend", Mini, "social"),
        RewardItem::template("mini-4", "Favorite Meal", "Order or cook your favorite meal", Mini, "food"),
        RewardItem::template("mini-5", "Creative Time", "Work on a personal creative project", Mini, "creativity"),
        RewardItem::template("mini-6", "Nature Walk", "Take a longer walk in nature or park", Mini, "nature"),
        RewardItem::template("mini-7", "Reading Time", "Read a book or articles you enjoy", Mini, "learning"),
        RewardItem::template("mini-8", "Online Shopping", "Browse and maybe buy something small", Mini, "shopping"),
        RewardItem::template("major-1", "Movie Night", "Watch a full movie you've been wanting to see", Major, "entertainment"),
        RewardItem::template("major-2", "Dinner Out", "Go to your favorite restaurant", Major, "dining"),
        RewardItem::template("major-3", "Hobby Session", "Dedicated time for your favorite hobby", Major, "hobbies"),
        RewardItem::template("major-4", "Social Activity", "Meet friends for an activity or hangout", Major, "social"),
        RewardItem::template("major-5", "Spa Time", "Self-care session: bath, skincare, relaxation", Major, "wellness"),
        RewardItem::template("major-6", "Adventure Time", "Explore a new place or try new activity", Major, "adventure"),
    ]
}

/// Items derived from the user's own input.
///
/// Activities become micro rewards, mood boosters become mini rewards, and
/// the first activity gets an extended major version. A generic
/// personal-choice major reward is always added.
pub fn personalized_items(input: &PersonalizationInput) -> Vec<RewardItem> {
    let mut items = Vec::new();

    for (i, activity) in non_blank(&input.enjoyable_activities)
        .take(MAX_PERSONALIZED_PER_TIER)
        .enumerate()
    {
        items.push(RewardItem::custom(
            format!("custom-micro-{i}"),
            activity.to_string(),
            format!("Enjoy {} for 10 minutes", activity.to_lowercase()),
            RewardTier::Micro,
        ));
    }

    for (i, booster) in non_blank(&input.mood_boosters)
        .take(MAX_PERSONALIZED_PER_TIER)
        .enumerate()
    {
        items.push(RewardItem::custom(
            format!("custom-mini-{i}"),
            booster.to_string(),
            format!("Dedicated time for {}", booster.to_lowercase()),
            RewardTier::Mini,
        ));
    }

    if let Some(first) = non_blank(&input.enjoyable_activities).next() {
        items.push(RewardItem::custom(
            "custom-major-1".to_string(),
            format!("Extended {first}"),
            format!("2-hour dedicated session for {}", first.to_lowercase()),
            RewardTier::Major,
        ));
    }

    items.push(RewardItem::custom(
        "custom-major-2".to_string(),
        "Personal Choice Reward".to_string(),
        "Choose any 2-hour activity that brings you joy".to_string(),
        RewardTier::Major,
    ));

    items
}

/// The full set of rewards a scheduler may draw from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCatalog {
    items: Vec<RewardItem>,
}

impl RewardCatalog {
    /// Build a catalog from arbitrary items, rejecting duplicate ids.
    pub fn new(items: Vec<RewardItem>) -> Result<Self, ScheduleError> {
        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(item.id.as_str()) {
                return Err(ScheduleError::DuplicateRewardId {
                    id: item.id.clone(),
                });
            }
        }
        Ok(Self { items })
    }

    /// Template-only catalog.
    pub fn templates() -> Self {
        Self {
            items: template_items(),
        }
    }

    /// Templates plus the user's personalized items.
    pub fn personalized(input: &PersonalizationInput) -> Self {
        let mut items = template_items();
        items.extend(personalized_items(input));
        Self { items }
    }

    pub fn items(&self) -> &[RewardItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&RewardItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Every item in `tier`, templates first.
    pub fn candidates(&self, tier: RewardTier) -> Vec<&RewardItem> {
        self.items.iter().filter(|item| item.category == tier).collect()
    }
}
