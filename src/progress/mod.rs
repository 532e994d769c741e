// SPDX-License-Identifier: MPL-2.0

//! Progress aggregation, rewards, badges and the leaderboard projection.

pub mod badges;
mod curriculum;
mod delta;
pub mod leaderboard;
mod record;
mod rewards;
pub mod rules;
mod service;
mod state;
mod subject;

pub use badges::{Badge, BadgeCatalog, BadgeRequirement};
pub use curriculum::Curriculum;
pub use leaderboard::{LeaderboardEntry, LeaderboardProjection, RankedEntry};
pub use record::{AwardRecord, ProgressRecord, QuizResult, StudentProfile, SubjectProgress};
pub use rewards::{QuizReward, quiz_reward};
pub use rules::{LevelRule, StreakRule};
pub use service::ProgressService;
pub use state::{LessonOutcome, ProgressState, QuizOutcome, Rules, Snapshot};
pub use subject::{LessonKey, Subject};

use crate::remote::{AuthError, StoreError};
use thiserror::Error;

/// Input rejected locally; never sent to the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid lesson id: {0}")]
    InvalidLessonId(String),
    #[error("lesson {lesson_id} does not belong to {subject}")]
    SubjectMismatch { lesson_id: String, subject: Subject },
    #[error("lesson {lesson_id} does not belong to grade {grade}")]
    GradeMismatch { lesson_id: String, grade: u8 },
    #[error("grade must be 1-5, got {0}")]
    InvalidGrade(u8),
    #[error("invalid id: {0:?}")]
    InvalidItemId(String),
    #[error("invalid quiz counts: {correct} of {total}")]
    InvalidQuizCounts { correct: u32, total: u32 },
    #[error("coin amount must be positive, got {0}")]
    NonPositiveCoins(i64),
    #[error("amount {0} is too large to store")]
    AmountOutOfRange(u64),
}

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),
    #[error("not signed in")]
    NotSignedIn,
    #[error("account has no student progress")]
    NotAStudent,
}

impl ProgressError {
    /// Transient backend failure; the UI may offer a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProgressError::Store(e) if e.is_transient())
    }
}
