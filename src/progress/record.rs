// SPDX-License-Identifier: MPL-2.0

//! Stored shapes of the student profile and progress documents.
//!
//! Reads are lenient: unknown subject keys are dropped, awards stored as bare
//! id strings are accepted, duplicate award ids collapse to the first, and a
//! document carrying only the legacy `coins` field is read as `totalCoins`.

use crate::config::{DEFAULT_AVATAR, DEFAULT_GRADE, DEFAULT_STUDENT_NAME, MAX_GRADE, MIN_GRADE};
use crate::progress::subject::Subject;
use crate::remote::{Document, Identity, Role};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

const COINS_ALIAS: &str = "coins";
const TOTAL_COINS: &str = "totalCoins";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_avatar")]
    pub avatar: String,
    #[serde(default = "default_grade")]
    pub grade: u8,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_name() -> String {
    DEFAULT_STUDENT_NAME.to_string()
}

fn default_avatar() -> String {
    DEFAULT_AVATAR.to_string()
}

fn default_grade() -> u8 {
    DEFAULT_GRADE
}

impl StudentProfile {
    /// Best-effort profile for an account that has none yet
    pub fn from_identity(identity: &Identity) -> Self {
        let name = identity
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_STUDENT_NAME);

        Self {
            id: identity.uid.clone(),
            name: name.to_string(),
            avatar: DEFAULT_AVATAR.to_string(),
            grade: DEFAULT_GRADE,
            role: identity.role,
            email: Some(identity.email.clone()),
            created_at: Some(Utc::now()),
        }
    }

    pub fn from_document(id: &str, doc: &Document) -> Result<Self, serde_json::Error> {
        let mut profile: Self = serde_json::from_value(Value::Object(doc.clone()))?;
        if profile.id.is_empty() {
            profile.id = id.to_string();
        }
        if profile.name.trim().is_empty() {
            profile.name = default_name();
        }
        if profile.avatar.is_empty() {
            profile.avatar = default_avatar();
        }
        profile.grade = profile.grade.clamp(MIN_GRADE, MAX_GRADE);
        Ok(profile)
    }

    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        to_document(self)
    }

    /// Last-write-wins merge of a partial profile document.
    pub fn merged(&self, partial: &Document) -> Result<Self, serde_json::Error> {
        let mut doc = self.to_document()?;
        doc.extend(partial.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::from_document(&self.id, &doc)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectProgress {
    pub lessons_completed: u64,
    pub quizzes_completed: u64,
    pub points: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    /// Percentage of the last attempt
    pub score: u32,
    #[serde(default)]
    pub correct: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuizResult {
    pub fn is_perfect(&self) -> bool {
        self.score == 100
    }
}

/// A badge, sticker or achievement held by a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub earned_at: Option<DateTime<Utc>>,
}

impl AwardRecord {
    pub fn new(id: &str, name: &str, icon: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            earned_at: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredAward {
    Full(AwardRecord),
    Bare(String),
}

fn lenient_awards<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<AwardRecord>, D::Error> {
    let stored = Option::<Vec<StoredAward>>::deserialize(d)?.unwrap_or_default();
    let mut seen = HashSet::new();

    Ok(stored
        .into_iter()
        .map(|award| match award {
            StoredAward::Full(record) => record,
            StoredAward::Bare(id) => AwardRecord::new(&id, &id, ""),
        })
        .filter(|record| seen.insert(record.id.clone()))
        .collect())
}

fn lenient_subjects<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<BTreeMap<Subject, SubjectProgress>, D::Error> {
    let stored = Option::<BTreeMap<String, SubjectProgress>>::deserialize(d)?.unwrap_or_default();
    let mut subjects = empty_subjects();

    for (key, progress) in stored {
        match key.parse::<Subject>() {
            Ok(subject) => {
                subjects.insert(subject, progress);
            }
            Err(_) => log::debug!("[PROGRESS] ignoring unknown subject key {key}"),
        }
    }

    Ok(subjects)
}

fn empty_subjects() -> BTreeMap<Subject, SubjectProgress> {
    Subject::ALL
        .into_iter()
        .map(|subject| (subject, SubjectProgress::default()))
        .collect()
}

/// A student's progress document.
///
/// `coins` is not stored separately: [`ProgressRecord::coins`] and the
/// `coins` field written by [`ProgressRecord::to_document`] both mirror
/// `total_coins`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressRecord {
    pub total_points: u64,
    pub total_coins: u64,
    pub level: u32,
    pub completed_lessons: BTreeSet<String>,
    pub completed_quizzes: BTreeMap<String, QuizResult>,
    #[serde(deserialize_with = "lenient_subjects")]
    pub subject_progress: BTreeMap<Subject, SubjectProgress>,
    #[serde(deserialize_with = "lenient_awards")]
    pub achievements: Vec<AwardRecord>,
    #[serde(deserialize_with = "lenient_awards")]
    pub badges: Vec<AwardRecord>,
    #[serde(deserialize_with = "lenient_awards")]
    pub stickers: Vec<AwardRecord>,
    pub current_streak: u32,
    pub last_active_date: Option<NaiveDate>,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            total_points: 0,
            total_coins: 0,
            level: 1,
            completed_lessons: BTreeSet::new(),
            completed_quizzes: BTreeMap::new(),
            subject_progress: empty_subjects(),
            achievements: Vec::new(),
            badges: Vec::new(),
            stickers: Vec::new(),
            current_streak: 0,
            last_active_date: None,
        }
    }
}

impl ProgressRecord {
    /// Display alias of `total_coins`.
    pub fn coins(&self) -> u64 {
        self.total_coins
    }

    pub fn subject(&self, subject: Subject) -> SubjectProgress {
        self.subject_progress
            .get(&subject)
            .copied()
            .unwrap_or_default()
    }

    pub fn subject_mut(&mut self, subject: Subject) -> &mut SubjectProgress {
        self.subject_progress.entry(subject).or_default()
    }

    pub fn has_badge(&self, id: &str) -> bool {
        self.badges.iter().any(|b| b.id == id)
    }

    pub fn has_sticker(&self, id: &str) -> bool {
        self.stickers.iter().any(|s| s.id == id)
    }

    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.iter().any(|a| a.id == id)
    }

    pub fn perfect_quiz_count(&self) -> usize {
        self.completed_quizzes
            .values()
            .filter(|q| q.is_perfect())
            .count()
    }

    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        let doc = fold_legacy_coins(doc);
        serde_json::from_value(Value::Object(doc))
    }

    /// Stored shape, including the legacy `coins` mirror.
    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        let mut doc = to_document(self)?;
        doc.insert(COINS_ALIAS.to_string(), Value::from(self.total_coins));
        Ok(doc)
    }

    /// Last-write-wins merge of a partial progress document over this one.
    pub fn merged(&self, partial: &Document) -> Result<Self, serde_json::Error> {
        let mut doc = self.to_document()?;
        doc.extend(fold_legacy_coins(partial));
        Self::from_document(&doc)
    }
}

/// A document with `coins` but no `totalCoins` predates the rename.
fn fold_legacy_coins(doc: &Document) -> Document {
    let mut doc = doc.clone();
    if !doc.contains_key(TOTAL_COINS) {
        if let Some(coins) = doc.get(COINS_ALIAS).cloned() {
            doc.insert(TOTAL_COINS.to_string(), coins);
        }
    }
    doc
}

fn to_document<T: Serialize>(value: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(serde::ser::Error::custom("document must serialize to an object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_default_record_covers_all_subjects() {
        let record = ProgressRecord::default();
        assert_eq!(record.subject_progress.len(), 5);
        assert_eq!(record.level, 1);
        assert_eq!(record.coins(), 0);
    }

    #[test]
    fn test_legacy_coins_only_document() {
        let record = ProgressRecord::from_document(&doc(json!({
            "totalPoints": 40,
            "coins": 12
        })))
        .unwrap();

        assert_eq!(record.total_coins, 12);
        assert_eq!(record.coins(), 12);
    }

    #[test]
    fn test_total_coins_wins_over_drifted_alias() {
        let record = ProgressRecord::from_document(&doc(json!({
            "totalCoins": 30,
            "coins": 3
        })))
        .unwrap();
        assert_eq!(record.coins(), 30);
    }

    #[test]
    fn test_to_document_writes_alias() {
        let record = ProgressRecord {
            total_coins: 9,
            ..Default::default()
        };
        let stored = record.to_document().unwrap();
        assert_eq!(stored["coins"], json!(9));
        assert_eq!(stored["totalCoins"], json!(9));
    }

    #[test]
    fn test_merge_is_last_write_wins_and_idempotent() {
        let base = ProgressRecord {
            total_points: 10,
            total_coins: 5,
            ..Default::default()
        };
        let partial = doc(json!({ "totalPoints": 50, "currentStreak": 3 }));

        let once = base.merged(&partial).unwrap();
        let twice = once.merged(&partial).unwrap();

        assert_eq!(once.total_points, 50);
        assert_eq!(once.total_coins, 5);
        assert_eq!(once.current_streak, 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_folds_legacy_coins_in_partial() {
        let base = ProgressRecord::default();
        let merged = base.merged(&doc(json!({ "coins": 7 }))).unwrap();
        assert_eq!(merged.total_coins, 7);
    }

    #[test]
    fn test_merge_rejects_malformed() {
        let base = ProgressRecord::default();
        assert!(base.merged(&doc(json!({ "totalPoints": "lots" }))).is_err());
        assert!(base.merged(&doc(json!({ "totalPoints": -4 }))).is_err());
    }

    #[test]
    fn test_lenient_awards_and_subjects() {
        let record = ProgressRecord::from_document(&doc(json!({
            "badges": ["first_steps", { "id": "first_steps", "name": "dup" }, { "id": "quiz_whiz" }],
            "subjectProgress": {
                "maths": { "lessonsCompleted": 2, "points": 20 },
                "music": { "lessonsCompleted": 1 }
            }
        })))
        .unwrap();

        let ids: Vec<&str> = record.badges.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["first_steps", "quiz_whiz"]);
        assert_eq!(record.subject(Subject::Maths).lessons_completed, 2);
        assert_eq!(record.subject_progress.len(), 5);
    }

    #[test]
    fn test_profile_defaults_from_identity() {
        let identity = Identity {
            uid: "u1".to_string(),
            email: "kid@school.org".to_string(),
            display_name: Some("   ".to_string()),
            role: Role::Student,
        };
        let profile = StudentProfile::from_identity(&identity);
        assert_eq!(profile.name, DEFAULT_STUDENT_NAME);
        assert_eq!(profile.avatar, DEFAULT_AVATAR);
        assert_eq!(profile.grade, DEFAULT_GRADE);
    }

    #[test]
    fn test_profile_merge_and_grade_clamp() {
        let profile = StudentProfile::from_document("u1", &doc(json!({ "name": "Ada" }))).unwrap();
        assert_eq!(profile.id, "u1");
        assert_eq!(profile.grade, DEFAULT_GRADE);

        let merged = profile.merged(&doc(json!({ "grade": 9, "avatar": "" }))).unwrap();
        assert_eq!(merged.grade, MAX_GRADE);
        assert_eq!(merged.avatar, DEFAULT_AVATAR);
        assert_eq!(merged.name, "Ada");
    }
}
