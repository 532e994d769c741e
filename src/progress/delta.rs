// SPDX-License-Identifier: MPL-2.0

//! One optimistic change to a progress record.
//!
//! A delta is applied locally before the write and converted into atomic
//! field updates for the store. Until the write is confirmed it stays
//! pending, so it can be replayed over newer stored state or dropped.

use crate::progress::record::{AwardRecord, ProgressRecord, QuizResult};
use crate::progress::subject::Subject;
use crate::progress::{ProgressError, ValidationError};
use crate::remote::FieldUpdates;
use chrono::NaiveDate;
use serde_json::Value;

/// Store increments are signed.
pub fn amount(value: u64) -> Result<i64, ValidationError> {
    i64::try_from(value).map_err(|_| ValidationError::AmountOutOfRange(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardKind {
    Badge,
    Sticker,
    Achievement,
}

impl AwardKind {
    pub fn field(self) -> &'static str {
        match self {
            AwardKind::Badge => "badges",
            AwardKind::Sticker => "stickers",
            AwardKind::Achievement => "achievements",
        }
    }

    fn list(self, record: &mut ProgressRecord) -> &mut Vec<AwardRecord> {
        match self {
            AwardKind::Badge => &mut record.badges,
            AwardKind::Sticker => &mut record.stickers,
            AwardKind::Achievement => &mut record.achievements,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubjectDelta {
    pub lessons: u64,
    pub quizzes: u64,
    pub points: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizChange {
    pub quiz_id: String,
    pub result: QuizResult,
    pub previous: Option<QuizResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreakChange {
    pub previous: u32,
    pub previous_date: Option<NaiveDate>,
    pub current: u32,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub points: u64,
    pub coins: u64,
    pub subject: Option<(Subject, SubjectDelta)>,
    pub lesson: Option<String>,
    pub quiz: Option<QuizChange>,
    pub award: Option<(AwardKind, AwardRecord)>,
    /// (previous, new)
    pub level: Option<(u32, u32)>,
    pub streak: Option<StreakChange>,
}

impl Delta {
    /// Whether the leaderboard entry needs rewriting after this change.
    pub fn changes_standing(&self) -> bool {
        self.points > 0
            || self.coins > 0
            || matches!(self.award, Some((AwardKind::Badge, _)))
    }

    pub fn apply(&self, record: &mut ProgressRecord) {
        record.total_points = record.total_points.saturating_add(self.points);
        record.total_coins = record.total_coins.saturating_add(self.coins);

        if let Some((subject, d)) = self.subject {
            let progress = record.subject_mut(subject);
            progress.lessons_completed += d.lessons;
            progress.quizzes_completed += d.quizzes;
            progress.points += d.points;
        }
        if let Some(lesson) = &self.lesson {
            record.completed_lessons.insert(lesson.clone());
        }
        if let Some(quiz) = &self.quiz {
            record
                .completed_quizzes
                .insert(quiz.quiz_id.clone(), quiz.result.clone());
        }
        if let Some((kind, award)) = &self.award {
            let list = kind.list(record);
            if !list.iter().any(|a| a.id == award.id) {
                list.push(award.clone());
            }
        }
        if let Some((_, level)) = self.level {
            record.level = level;
        }
        if let Some(streak) = &self.streak {
            record.current_streak = streak.current;
            record.last_active_date = Some(streak.date);
        }
    }

    /// Atomic field updates equivalent to [`Delta::apply`].
    pub fn to_updates(&self) -> Result<FieldUpdates, ProgressError> {
        let mut updates = FieldUpdates::new();

        if self.points > 0 {
            updates = updates.increment("totalPoints", amount(self.points)?);
        }
        if self.coins > 0 {
            // Legacy readers still look at `coins`
            updates = updates
                .increment("totalCoins", amount(self.coins)?)
                .increment("coins", amount(self.coins)?);
        }
        if let Some((subject, d)) = self.subject {
            let base = format!("subjectProgress.{}", subject.as_str());
            if d.lessons > 0 {
                updates = updates.increment(format!("{base}.lessonsCompleted"), amount(d.lessons)?);
            }
            if d.quizzes > 0 {
                updates = updates.increment(format!("{base}.quizzesCompleted"), amount(d.quizzes)?);
            }
            if d.points > 0 {
                updates = updates.increment(format!("{base}.points"), amount(d.points)?);
            }
        }
        if let Some(lesson) = &self.lesson {
            updates = updates.array_union("completedLessons", vec![Value::from(lesson.as_str())]);
        }
        if let Some(quiz) = &self.quiz {
            updates = updates.set(
                format!("completedQuizzes.{}", quiz.quiz_id),
                serde_json::to_value(&quiz.result)?,
            );
        }
        if let Some((kind, award)) = &self.award {
            updates = updates.array_union(kind.field(), vec![serde_json::to_value(award)?]);
        }
        if let Some((_, level)) = self.level {
            updates = updates.set("level", level);
        }
        if let Some(streak) = &self.streak {
            updates = updates
                .set("currentStreak", streak.current)
                .set("lastActiveDate", serde_json::to_value(streak.date)?);
        }

        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::apply_updates;

    fn lesson_delta() -> Delta {
        Delta {
            points: 10,
            subject: Some((
                Subject::Maths,
                SubjectDelta {
                    lessons: 1,
                    quizzes: 0,
                    points: 10,
                },
            )),
            lesson: Some("maths_grade1_lesson_1".to_string()),
            level: Some((1, 2)),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_is_replayable_over_newer_base() {
        let delta = lesson_delta();
        let base = ProgressRecord {
            total_points: 95,
            ..Default::default()
        };

        let mut record = base.clone();
        delta.apply(&mut record);
        assert_eq!(record.total_points, 105);
        assert_eq!(record.subject(Subject::Maths).lessons_completed, 1);
        assert_eq!(record.level, 2);

        // Same change over a record that moved on in the meantime
        let mut newer = ProgressRecord {
            total_points: 200,
            ..base
        };
        delta.apply(&mut newer);
        assert_eq!(newer.total_points, 210);
        assert!(newer.completed_lessons.contains("maths_grade1_lesson_1"));
    }

    #[test]
    fn test_oversized_amount_rejected() {
        let delta = Delta {
            points: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(
            delta.to_updates(),
            Err(ProgressError::Validation(ValidationError::AmountOutOfRange(u64::MAX)))
        ));
        assert_eq!(amount(i64::MAX as u64), Ok(i64::MAX));
    }

    #[test]
    fn test_updates_match_local_apply() {
        let delta = Delta {
            coins: 6,
            quiz: Some(QuizChange {
                quiz_id: "science_quiz_2".to_string(),
                result: QuizResult {
                    score: 60,
                    correct: 3,
                    total: 5,
                    completed_at: None,
                },
                previous: None,
            }),
            award: Some((AwardKind::Sticker, AwardRecord::new("star", "Star", "*"))),
            ..lesson_delta()
        };

        let mut local = ProgressRecord::default();
        delta.apply(&mut local);

        let mut stored = ProgressRecord::default().to_document().unwrap();
        apply_updates(&mut stored, &delta.to_updates().unwrap()).unwrap();
        let remote = ProgressRecord::from_document(&stored).unwrap();

        assert_eq!(local, remote);
        assert_eq!(stored["coins"], stored["totalCoins"]);
    }

    #[test]
    fn test_badge_award_changes_standing() {
        let sticker = Delta {
            award: Some((AwardKind::Sticker, AwardRecord::new("s", "", ""))),
            ..Default::default()
        };
        let badge = Delta {
            award: Some((AwardKind::Badge, AwardRecord::new("b", "", ""))),
            ..Default::default()
        };
        assert!(!sticker.changes_standing());
        assert!(badge.changes_standing());
    }
}
