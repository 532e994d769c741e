// SPDX-License-Identifier: MPL-2.0

//! Quiz scoring. Pure functions of the answer counts.

use crate::config::{
    PERFECT_QUIZ_BONUS_COINS, PERFECT_QUIZ_BONUS_POINTS, QUIZ_MAX_COINS, QUIZ_MAX_POINTS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizReward {
    pub percentage: u32,
    pub points: u64,
    pub coins: u64,
    pub perfect: bool,
}

/// `round(scale * correct / total)` with halves rounded up, in integers.
fn scaled_round(scale: u64, correct: u32, total: u32) -> u64 {
    let numerator = 2 * scale * u64::from(correct) + u64::from(total);
    numerator / (2 * u64::from(total))
}

/// Score a quiz attempt. `None` if `total` is zero or `correct > total`.
pub fn quiz_reward(correct: u32, total: u32) -> Option<QuizReward> {
    if total == 0 || correct > total {
        return None;
    }

    let perfect = correct == total;
    let mut points = scaled_round(QUIZ_MAX_POINTS, correct, total);
    let mut coins = scaled_round(QUIZ_MAX_COINS, correct, total);
    if perfect {
        points += PERFECT_QUIZ_BONUS_POINTS;
        coins += PERFECT_QUIZ_BONUS_COINS;
    }

    Some(QuizReward {
        percentage: scaled_round(100, correct, total) as u32,
        points,
        coins,
        perfect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_score_gets_bonus_once() {
        let reward = quiz_reward(5, 5).unwrap();
        assert_eq!(
            reward,
            QuizReward {
                percentage: 100,
                points: 30,
                coins: 15,
                perfect: true,
            }
        );
    }

    #[test]
    fn test_partial_score_no_bonus() {
        let reward = quiz_reward(3, 5).unwrap();
        assert_eq!(reward.percentage, 60);
        assert_eq!(reward.points, 12);
        assert_eq!(reward.coins, 6);
        assert!(!reward.perfect);
    }

    #[test]
    fn test_halves_round_up() {
        // 10 * 1/4 = 2.5 -> 3, 100 * 1/8 = 12.5 -> 13
        assert_eq!(quiz_reward(1, 4).unwrap().coins, 3);
        assert_eq!(quiz_reward(1, 8).unwrap().percentage, 13);
        // 100 * 2/3 = 66.67 -> 67
        assert_eq!(quiz_reward(2, 3).unwrap().percentage, 67);
    }

    #[test]
    fn test_zero_correct() {
        let reward = quiz_reward(0, 7).unwrap();
        assert_eq!((reward.percentage, reward.points, reward.coins), (0, 0, 0));
    }

    #[test]
    fn test_invalid_counts() {
        assert!(quiz_reward(0, 0).is_none());
        assert!(quiz_reward(6, 5).is_none());
    }

    #[test]
    fn test_percentage_matches_rounded_ratio_for_all_small_quizzes() {
        for total in 1..=20u32 {
            for correct in 0..=total {
                let reward = quiz_reward(correct, total).unwrap();
                let expected = (100.0 * correct as f64 / total as f64).round() as u32;
                assert!(reward.percentage <= 100);
                assert_eq!(reward.percentage, expected, "{correct}/{total}");
            }
        }
    }
}
