// SPDX-License-Identifier: MPL-2.0

pub const APP_ID: &str = "app.kidquest.KidQuest";

/// Directory name under the XDG data dir for local stores
pub const DATA_DIR_NAME: &str = "kidquest";

pub const STUDENTS_COLLECTION: &str = "students";
pub const PROGRESS_COLLECTION: &str = "progress";
pub const LEADERBOARD_COLLECTION: &str = "leaderboard";

pub const DEFAULT_STUDENT_NAME: &str = "Student";
pub const DEFAULT_AVATAR: &str = "\u{1F98A}";
pub const DEFAULT_GRADE: u8 = 1;

pub const MIN_GRADE: u8 = 1;
pub const MAX_GRADE: u8 = 5;

/// Quiz rewards scale with the fraction answered correctly
pub const QUIZ_MAX_POINTS: u64 = 20;
pub const QUIZ_MAX_COINS: u64 = 10;
pub const PERFECT_QUIZ_BONUS_POINTS: u64 = 10;
pub const PERFECT_QUIZ_BONUS_COINS: u64 = 5;
