use crate::models::Progress;

/// Applies `delta` to `count`, never going below zero.
pub fn apply_delta(count: u32, delta: i64) -> u32 {
    let next = i64::from(count).saturating_add(delta).max(0);
    u32::try_from(next).unwrap_or(u32::MAX)
}

pub fn progress(count: u32, goal: u32) -> Progress {
    let goal = goal.max(1);
    let percent = (f64::from(count) / f64::from(goal) * 100.0).min(100.0);
    Progress {
        percent,
        remaining: goal.saturating_sub(count),
        goal_met: count >= goal,
    }
}
