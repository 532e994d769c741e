// SPDX-License-Identifier: MPL-2.0

//! Pluggable level and streak rules.
//!
//! The stored `level` and `currentStreak` are owned by whatever rule the app
//! is configured with. With nothing configured both pass through unchanged.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub trait LevelRule: Send + Sync {
    /// `None` keeps the stored level.
    fn level_for(&self, total_points: u64) -> Option<u32>;
}

pub trait StreakRule: Send + Sync {
    fn advance(&self, current: u32, last_active: Option<NaiveDate>, today: NaiveDate) -> u32;
}

/// Leaves the stored level alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughLevel;

impl LevelRule for PassthroughLevel {
    fn level_for(&self, _total_points: u64) -> Option<u32> {
        None
    }
}

/// Level is one plus the number of thresholds reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdLevels {
    thresholds: Vec<u64>,
}

impl ThresholdLevels {
    pub fn new(mut thresholds: Vec<u64>) -> Self {
        thresholds.sort_unstable();
        thresholds.dedup();
        Self { thresholds }
    }
}

impl LevelRule for ThresholdLevels {
    fn level_for(&self, total_points: u64) -> Option<u32> {
        let reached = self.thresholds.partition_point(|&t| t <= total_points);
        Some(1 + reached as u32)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughStreak;

impl StreakRule for PassthroughStreak {
    fn advance(&self, current: u32, _last_active: Option<NaiveDate>, _today: NaiveDate) -> u32 {
        current
    }
}

/// Counts consecutive calendar days with activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsecutiveDays;

impl StreakRule for ConsecutiveDays {
    fn advance(&self, current: u32, last_active: Option<NaiveDate>, today: NaiveDate) -> u32 {
        match last_active {
            Some(last) if last == today => current.max(1),
            Some(last) if last.succ_opt() == Some(today) => current.saturating_add(1),
            _ => 1,
        }
    }
}

/// Which streak rule to run, as named in settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakMode {
    #[default]
    Passthrough,
    ConsecutiveDays,
}

impl StreakMode {
    pub fn rule(self) -> Box<dyn StreakRule> {
        match self {
            StreakMode::Passthrough => Box::new(PassthroughStreak),
            StreakMode::ConsecutiveDays => Box::new(ConsecutiveDays),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_threshold_levels() {
        let rule = ThresholdLevels::new(vec![500, 100, 250, 100]);
        assert_eq!(rule.level_for(0), Some(1));
        assert_eq!(rule.level_for(99), Some(1));
        assert_eq!(rule.level_for(100), Some(2));
        assert_eq!(rule.level_for(260), Some(3));
        assert_eq!(rule.level_for(10_000), Some(4));
    }

    #[test]
    fn test_passthrough_rules() {
        assert_eq!(PassthroughLevel.level_for(1_000), None);
        assert_eq!(PassthroughStreak.advance(7, None, day(1)), 7);
    }

    #[test]
    fn test_consecutive_days() {
        let rule = ConsecutiveDays;
        assert_eq!(rule.advance(0, None, day(1)), 1);
        assert_eq!(rule.advance(1, Some(day(1)), day(1)), 1);
        assert_eq!(rule.advance(1, Some(day(1)), day(2)), 2);
        assert_eq!(rule.advance(5, Some(day(1)), day(4)), 1);
    }
}
