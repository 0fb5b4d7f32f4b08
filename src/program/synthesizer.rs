//! Program synthesis: week-by-week task lists, expected outcomes and the
//! starting progress stats derived at completion.
//!
//! Task content is a fixed curated template. Only the session-length text
//! and the derived durations flow into the output; the categorical profile
//! fields do not change the task lists.

use serde::{Deserialize, Serialize};

use crate::assessment::Answers;
use crate::profile::Profile;

/// Points every user starts with.
pub const STARTING_POINTS: u32 = 100;

/// Default peak hours. Not derived from the profile.
pub const DEFAULT_PEAK_HOURS: [&str; 5] = ["09:00", "10:00", "11:00", "14:00", "15:00"];

const WEEK1_TASKS: [&str; 7] = [
    "Complete 3-minute micro-task to build momentum",
    "Break down your main project into 5 micro-actions",
    "Practice the 2-minute rule with daily tasks",
    "Set up your optimal work environment",
    "Complete first micro-action from your project breakdown",
    "Track your dopamine response to task completion",
    "Establish your daily productivity ritual",
];

const WEEK2_TASKS: [&str; 7] = [
    "Implement your personalized focus protocol",
    "Complete 3 micro-actions from your main project",
    "Practice procrastination interruption techniques",
    "Optimize your reward timing for maximum dopamine",
    "Handle your first resistance moment using AI coaching",
    "Build your task completion celebration ritual",
    "Establish sustainable momentum patterns",
];

const WEEK3_TASKS: [&str; 7] = [
    "Complete major milestone in your main project",
    "Master complex task breakdown independently",
    "Implement advanced focus and flow techniques",
    "Create your long-term productivity system",
    "Handle multiple projects using neural switching",
    "Establish relapse prevention protocols",
    "Graduate to self-directed neural management",
];

/// A personalized three-week program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub week1_tasks: Vec<String>,
    pub week2_tasks: Vec<String>,
    pub week3_tasks: Vec<String>,
    pub expected_outcomes: Vec<String>,
    /// Focus session length in minutes.
    pub work_duration: u32,
    /// Break length in minutes.
    pub break_duration: u32,
    pub risk_factors: Vec<String>,
    pub success_probability: u8,
}

/// Progress counters seeded at completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_points: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub tasks_completed: u32,
    pub protocols_completed: u32,
    pub preferred_work_duration: u32,
    pub preferred_break_duration: u32,
    pub peak_productivity_hours: Vec<String>,
}

/// Work-session minutes for a session-length answer.
pub fn work_duration(session_length: Option<&str>) -> u32 {
    const TABLE: [(&str, u32); 4] = [("15-25", 25), ("30-45", 45), ("1-2", 90), ("3+", 180)];
    let Some(length) = session_length else {
        return 45;
    };
    TABLE
        .iter()
        .find(|(needle, _)| length.contains(needle))
        .map_or(45, |(_, minutes)| *minutes)
}

/// Break minutes for a work duration.
pub fn break_duration(work_minutes: u32) -> u32 {
    match work_minutes {
        0..=25 => 5,
        26..=45 => 15,
        46..=90 => 20,
        _ => 30,
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn expected_outcomes(optimal_session_length: &str) -> Vec<String> {
    vec![
        "70-85% reduction in project initiation delay".to_string(),
        format!("Sustained focus sessions of {optimal_session_length}+"),
        "Completion of primary project within 21 days".to_string(),
        "Transferable system for future projects".to_string(),
        "Measurable dopamine response optimization".to_string(),
        "Reduced procrastination anxiety by 60%+".to_string(),
        "Established neural pathway automation".to_string(),
    ]
}

/// Build the program for a classified profile. Total: never fails.
pub fn synthesize(answers: &Answers, profile: &Profile) -> Program {
    let work = work_duration(answers.session_length.as_deref());
    Program {
        week1_tasks: owned(&WEEK1_TASKS),
        week2_tasks: owned(&WEEK2_TASKS),
        week3_tasks: owned(&WEEK3_TASKS),
        expected_outcomes: expected_outcomes(&profile.optimal_session_length),
        work_duration: work,
        break_duration: break_duration(work),
        risk_factors: profile.risk_factors.clone(),
        success_probability: profile.success_probability,
    }
}

/// Starting stats for a freshly completed user.
pub fn starting_stats(program: &Program) -> UserStats {
    UserStats {
        total_points: STARTING_POINTS,
        current_streak: 0,
        longest_streak: 0,
        tasks_completed: 0,
        protocols_completed: 0,
        preferred_work_duration: program.work_duration,
        preferred_break_duration: program.break_duration,
        peak_productivity_hours: owned(&DEFAULT_PEAK_HOURS),
    }
}
