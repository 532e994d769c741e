// SPDX-License-Identifier: MPL-2.0

//! Per-grade leaderboard: the write-side projection and the read-side ranking.

use crate::config::LEADERBOARD_COLLECTION;
use crate::progress::record::{ProgressRecord, StudentProfile};
use crate::remote::{DocPath, DocumentStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Denormalized copy of a student's standing. Never a source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    #[serde(default)]
    pub student_id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    pub grade: u8,
    #[serde(default)]
    pub total_points: u64,
    #[serde(default)]
    pub total_coins: u64,
    #[serde(default)]
    pub badge_count: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LeaderboardEntry {
    pub fn project(profile: &StudentProfile, record: &ProgressRecord) -> Self {
        Self {
            student_id: profile.id.clone(),
            name: profile.name.clone(),
            avatar: profile.avatar.clone(),
            grade: profile.grade,
            total_points: record.total_points,
            total_coins: record.total_coins,
            badge_count: record.badges.len() as u64,
            updated_at: Some(Utc::now()),
        }
    }
}

/// Points desc, coins desc, name asc; student id keeps the order total.
pub fn compare(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then(b.total_coins.cmp(&a.total_coins))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.student_id.cmp(&b.student_id))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    /// 1-based position in the full ordering
    pub rank: usize,
    pub entry: LeaderboardEntry,
    pub is_self: bool,
}

/// Sort, keep the top `top_n`, and append the viewer's own entry with its
/// true rank if it fell outside.
pub fn rank_entries(
    mut entries: Vec<LeaderboardEntry>,
    own_id: Option<&str>,
    top_n: usize,
) -> Vec<RankedEntry> {
    entries.sort_by(compare);

    let ranked = entries.into_iter().enumerate().map(|(i, entry)| RankedEntry {
        rank: i + 1,
        is_self: own_id == Some(entry.student_id.as_str()),
        entry,
    });

    let mut top = Vec::with_capacity(top_n + 1);
    let mut own_outside = None;
    for row in ranked {
        if row.rank <= top_n {
            top.push(row);
        } else if row.is_self {
            own_outside = Some(row);
            break;
        }
    }

    top.extend(own_outside);
    top
}

/// Leaderboard operations against the document store
pub struct LeaderboardProjection<'a, S> {
    store: &'a S,
}

impl<'a, S: DocumentStore> LeaderboardProjection<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Overwrite the student's entry with the current values.
    pub async fn write(
        &self,
        profile: &StudentProfile,
        record: &ProgressRecord,
    ) -> Result<(), StoreError> {
        let path = DocPath::leaderboard(&profile.id)
            .ok_or_else(|| StoreError::InvalidPath(profile.id.clone()))?;

        let entry = LeaderboardEntry::project(profile, record);
        let Value::Object(doc) = serde_json::to_value(&entry)? else {
            return Err(StoreError::InvalidPath(path.to_string()));
        };

        self.store.set_document(&path, doc).await
    }

    /// Best-effort write. Failures are logged and swallowed.
    pub async fn publish(&self, profile: &StudentProfile, record: &ProgressRecord) -> bool {
        match self.write(profile, record).await {
            Ok(()) => {
                log::debug!(
                    "[LEADERBOARD] updated student:{} points:{} coins:{}",
                    profile.id,
                    record.total_points,
                    record.total_coins
                );
                true
            }
            Err(e) => {
                log::warn!("[LEADERBOARD] update failed student:{}: {}", profile.id, e);
                false
            }
        }
    }

    /// Ranked entries for one grade.
    pub async fn fetch(
        &self,
        grade: u8,
        own_id: Option<&str>,
        top_n: usize,
    ) -> Result<Vec<RankedEntry>, StoreError> {
        let docs = self.store.list_collection(LEADERBOARD_COLLECTION).await?;

        let entries = docs
            .into_iter()
            .filter_map(|(id, doc)| {
                match serde_json::from_value::<LeaderboardEntry>(Value::Object(doc)) {
                    Ok(mut entry) => {
                        if entry.student_id.is_empty() {
                            entry.student_id = id;
                        }
                        Some(entry)
                    }
                    Err(e) => {
                        log::debug!("[LEADERBOARD] skipping malformed entry {id}: {e}");
                        None
                    }
                }
            })
            .filter(|entry| entry.grade == grade)
            .collect();

        Ok(rank_entries(entries, own_id, top_n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn entry(id: &str, name: &str, points: u64, coins: u64) -> LeaderboardEntry {
        LeaderboardEntry {
            student_id: id.to_string(),
            name: name.to_string(),
            avatar: String::new(),
            grade: 1,
            total_points: points,
            total_coins: coins,
            badge_count: 0,
            updated_at: None,
        }
    }

    fn ids(rows: &[RankedEntry]) -> Vec<&str> {
        rows.iter().map(|r| r.entry.student_id.as_str()).collect()
    }

    #[test]
    fn test_ordering_points_then_coins_then_name() {
        let rows = rank_entries(
            vec![
                entry("a", "Zed", 10, 5),
                entry("b", "Amy", 10, 5),
                entry("c", "Bob", 10, 9),
                entry("d", "Cat", 30, 0),
            ],
            None,
            10,
        );

        assert_eq!(ids(&rows), vec!["d", "c", "b", "a"]);
        let ranks: Vec<usize> = rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_own_entry_appended_with_true_rank() {
        let entries = (0..20)
            .map(|i| entry(&format!("s{i:02}"), "Kid", 100 - i, 0))
            .collect();

        let rows = rank_entries(entries, Some("s15"), 5);
        assert_eq!(rows.len(), 6);
        let own = rows.last().unwrap();
        assert!(own.is_self);
        assert_eq!(own.rank, 16);
    }

    #[test]
    fn test_own_entry_inside_top_not_duplicated() {
        let entries = vec![entry("a", "A", 3, 0), entry("b", "B", 2, 0), entry("c", "C", 1, 0)];
        let rows = rank_entries(entries, Some("b"), 2);
        assert_eq!(ids(&rows), vec!["a", "b"]);
        assert!(rows[1].is_self);
    }

    #[tokio::test]
    async fn test_write_overwrites_and_fetch_filters_grade() {
        let store = MemoryStore::new();
        let projection = LeaderboardProjection::new(&store);

        let mut profile = StudentProfile::from_document("kid-1", &Default::default()).unwrap();
        profile.name = "Ada".to_string();
        let mut record = ProgressRecord {
            total_points: 10,
            ..Default::default()
        };
        projection.write(&profile, &record).await.unwrap();

        record.total_points = 25;
        projection.write(&profile, &record).await.unwrap();

        let mut other = profile.clone();
        other.id = "kid-2".to_string();
        other.grade = 2;
        projection.write(&other, &record).await.unwrap();

        let rows = projection.fetch(1, Some("kid-1"), 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entry.total_points, 25);
        assert!(rows[0].is_self);
    }

    #[tokio::test]
    async fn test_publish_swallows_failure() {
        let store = MemoryStore::new();
        store.fail_writes_to(LEADERBOARD_COLLECTION);
        let projection = LeaderboardProjection::new(&store);
        let profile = StudentProfile::from_document("kid-1", &Default::default()).unwrap();

        assert!(!projection.publish(&profile, &ProgressRecord::default()).await);
    }
}
