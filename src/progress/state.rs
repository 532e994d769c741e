// SPDX-License-Identifier: MPL-2.0

//! In-memory aggregation of one student's profile and progress.
//!
//! Three records are kept: the last state known to be stored (`confirmed`),
//! the local changes whose writes are still in flight (`pending`, in call
//! order), and what callers see, which is `confirmed` with `pending`
//! replayed over it. A write is confirmed either by its own change
//! notification (matched by write id) or by returning successfully. A
//! failed write is dropped from `pending` and the view rebuilt, so a remote
//! push that landed meanwhile is never undone. The lock is never held
//! across an await, so overlapping calls compute their deltas in call order.

use crate::config::{MAX_GRADE, MIN_GRADE};
use crate::progress::delta::{AwardKind, Delta, QuizChange, StreakChange, SubjectDelta, amount};
use crate::progress::leaderboard::LeaderboardProjection;
use crate::progress::record::{AwardRecord, ProgressRecord, QuizResult, StudentProfile};
use crate::progress::rewards::{QuizReward, quiz_reward};
use crate::progress::rules::{LevelRule, PassthroughLevel, PassthroughStreak, StreakRule};
use crate::progress::service::{ProgressService, WRITE_ID_FIELD};
use crate::progress::subject::{LessonKey, Subject};
use crate::progress::{ProgressError, ValidationError};
use crate::remote::{Document, DocumentStore, Identity};
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Level and streak rules in force for a session
pub struct Rules {
    pub level: Box<dyn LevelRule>,
    pub streak: Box<dyn StreakRule>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            level: Box::new(PassthroughLevel),
            streak: Box::new(PassthroughStreak),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub profile: StudentProfile,
    pub record: ProgressRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonOutcome {
    Completed { points: u64 },
    /// Duplicate submission; nothing changed
    AlreadyCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOutcome {
    pub reward: QuizReward,
    pub retake: bool,
}

struct PendingWrite {
    write_id: String,
    delta: Delta,
}

struct Aggregate {
    profile: StudentProfile,
    confirmed: ProgressRecord,
    pending: Vec<PendingWrite>,
    visible: ProgressRecord,
    next_write: u64,
}

impl Aggregate {
    fn new(profile: StudentProfile, record: ProgressRecord) -> Self {
        Self {
            profile,
            confirmed: record.clone(),
            pending: Vec::new(),
            visible: record,
            next_write: 0,
        }
    }

    fn rebuild(&mut self) {
        let mut record = self.confirmed.clone();
        for write in &self.pending {
            write.delta.apply(&mut record);
        }
        self.visible = record;
    }

    /// Show `delta` locally and queue it; returns its write id.
    fn stage(&mut self, session_key: &str, delta: Delta) -> String {
        self.next_write += 1;
        let write_id = format!("{}-{}", session_key, self.next_write);
        delta.apply(&mut self.visible);
        self.pending.push(PendingWrite {
            write_id: write_id.clone(),
            delta,
        });
        write_id
    }

    fn take_pending(&mut self, write_id: &str) -> Option<Delta> {
        let pos = self.pending.iter().position(|w| w.write_id == write_id)?;
        Some(self.pending.remove(pos).delta)
    }

    /// The write landed. A no-op if its notification already confirmed it.
    fn confirm(&mut self, write_id: &str) {
        if let Some(delta) = self.take_pending(write_id) {
            delta.apply(&mut self.confirmed);
            self.rebuild();
        }
    }

    fn discard(&mut self, write_id: &str) {
        if self.take_pending(write_id).is_some() {
            self.rebuild();
        }
    }
}

/// Shared handle to a loaded student's state. Clones share the same state.
pub struct ProgressState<S> {
    store: Arc<S>,
    student_id: String,
    session_key: Arc<str>,
    inner: Arc<Mutex<Aggregate>>,
    rules: Arc<Rules>,
    /// One leaderboard write at a time, each from the newest confirmed state
    publishing: Arc<tokio::sync::Mutex<()>>,
}

impl<S> Clone for ProgressState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            student_id: self.student_id.clone(),
            session_key: Arc::clone(&self.session_key),
            inner: Arc::clone(&self.inner),
            rules: Arc::clone(&self.rules),
            publishing: Arc::clone(&self.publishing),
        }
    }
}

fn check_grade(grade: u8) -> Result<(), ValidationError> {
    if (MIN_GRADE..=MAX_GRADE).contains(&grade) {
        Ok(())
    } else {
        Err(ValidationError::InvalidGrade(grade))
    }
}

/// Ids end up in dotted field paths and document paths.
fn check_item_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['.', '/'])
}

impl<S: DocumentStore> ProgressState<S> {
    /// Fetch (or create) the profile and progress documents for `identity`.
    pub async fn load(store: Arc<S>, identity: &Identity, rules: Arc<Rules>) -> Result<Self, ProgressError> {
        let service = ProgressService::new(store.as_ref());
        let student_id = identity.uid.clone();

        let profile = match service.fetch_profile(&student_id).await? {
            Some(profile) => profile,
            None => {
                let profile = StudentProfile::from_identity(identity);
                service.save_profile(&profile).await?;
                log::info!("[PROGRESS] created profile student:{}", student_id);
                profile
            }
        };

        let record = match service.fetch_progress(&student_id).await? {
            Some(record) => record,
            None => {
                let record = ProgressRecord::default();
                service.save_progress(&student_id, &record).await?;
                log::info!("[PROGRESS] initialized progress student:{}", student_id);
                record
            }
        };

        log::info!(
            "[PROGRESS] loaded student:{} points:{} coins:{} lessons:{}",
            student_id,
            record.total_points,
            record.total_coins,
            record.completed_lessons.len()
        );

        let session_key = format!(
            "{:x}-{}",
            Utc::now().timestamp_micros(),
            NEXT_SESSION.fetch_add(1, Ordering::Relaxed)
        );

        Ok(Self {
            store,
            student_id,
            session_key: session_key.into(),
            inner: Arc::new(Mutex::new(Aggregate::new(profile, record))),
            rules,
            publishing: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    fn lock(&self) -> MutexGuard<'_, Aggregate> {
        self.inner.lock().expect("progress lock poisoned")
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Snapshot {
            profile: inner.profile.clone(),
            record: inner.visible.clone(),
        }
    }

    /// Number of local changes whose writes are still in flight.
    pub fn pending_writes(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn grade(&self) -> u8 {
        self.lock().profile.grade
    }

    /// Merge a pushed progress document under the pending local changes.
    /// Malformed input leaves state as is.
    pub fn apply_remote_update(&self, partial: &Document) -> Result<(), ProgressError> {
        let mut inner = self.lock();
        inner.confirmed = inner.confirmed.merged(partial)?;
        if let Some(write_id) = partial.get(WRITE_ID_FIELD).and_then(Value::as_str) {
            inner.take_pending(write_id);
        }
        inner.rebuild();
        Ok(())
    }

    pub fn apply_remote_profile_update(&self, partial: &Document) -> Result<(), ProgressError> {
        let mut inner = self.lock();
        inner.profile = inner.profile.merged(partial)?;
        Ok(())
    }

    /// Level and streak side effects of a completed activity.
    fn activity_effects(&self, record: &ProgressRecord, added_points: u64, delta: &mut Delta) {
        let new_points = record.total_points.saturating_add(added_points);
        if let Some(level) = self.rules.level.level_for(new_points) {
            if level != record.level {
                delta.level = Some((record.level, level));
            }
        }

        let today: NaiveDate = Utc::now().date_naive();
        let current = self
            .rules
            .streak
            .advance(record.current_streak, record.last_active_date, today);
        delta.streak = Some(StreakChange {
            previous: record.current_streak,
            previous_date: record.last_active_date,
            current,
            date: today,
        });
    }

    /// Write a staged delta, then settle it as confirmed or dropped.
    async fn commit(&self, write_id: String, delta: Delta) -> Result<(), ProgressError> {
        let result = ProgressService::new(self.store.as_ref())
            .submit(&self.student_id, &write_id, &delta)
            .await;

        match &result {
            Ok(()) => self.lock().confirm(&write_id),
            Err(e) => {
                self.lock().discard(&write_id);
                log::warn!(
                    "[PROGRESS] write failed, rolled back student:{}: {}",
                    self.student_id,
                    e
                );
            }
        }

        if delta.changes_standing() {
            self.publish_standing().await;
        }
        result
    }

    /// Rewrite the leaderboard entry from confirmed state only.
    async fn publish_standing(&self) {
        let _turn = self.publishing.lock().await;
        let (profile, record) = {
            let inner = self.lock();
            (inner.profile.clone(), inner.confirmed.clone())
        };
        LeaderboardProjection::new(self.store.as_ref())
            .publish(&profile, &record)
            .await;
    }

    pub async fn record_lesson_completion(
        &self,
        subject: Subject,
        lesson_id: &str,
        points: u64,
        grade: u8,
    ) -> Result<LessonOutcome, ProgressError> {
        check_grade(grade)?;
        amount(points)?;
        let key = LessonKey::parse(lesson_id)
            .ok_or_else(|| ValidationError::InvalidLessonId(lesson_id.to_string()))?;
        if key.subject != subject {
            return Err(ValidationError::SubjectMismatch {
                lesson_id: lesson_id.to_string(),
                subject,
            }
            .into());
        }
        if key.grade != grade {
            return Err(ValidationError::GradeMismatch {
                lesson_id: lesson_id.to_string(),
                grade,
            }
            .into());
        }

        let (write_id, delta) = {
            let mut inner = self.lock();
            if inner.visible.completed_lessons.contains(lesson_id) {
                log::debug!(
                    "[PROGRESS] duplicate lesson ignored student:{} lesson:{}",
                    self.student_id,
                    lesson_id
                );
                return Ok(LessonOutcome::AlreadyCompleted);
            }

            let mut delta = Delta {
                points,
                subject: Some((
                    subject,
                    SubjectDelta {
                        lessons: 1,
                        quizzes: 0,
                        points,
                    },
                )),
                lesson: Some(lesson_id.to_string()),
                ..Default::default()
            };
            self.activity_effects(&inner.visible, points, &mut delta);
            (inner.stage(&self.session_key, delta.clone()), delta)
        };

        self.commit(write_id, delta).await?;
        log::info!(
            "[PROGRESS] lesson complete student:{} lesson:{} points:{}",
            self.student_id,
            lesson_id,
            points
        );
        Ok(LessonOutcome::Completed { points })
    }

    /// Score a quiz attempt and bank its rewards. Every attempt is rewarded
    /// and the stored score is that of the latest attempt.
    pub async fn record_quiz_completion(
        &self,
        subject: Subject,
        quiz_id: &str,
        correct: u32,
        total: u32,
        grade: u8,
    ) -> Result<QuizOutcome, ProgressError> {
        check_grade(grade)?;
        if !check_item_id(quiz_id) {
            return Err(ValidationError::InvalidItemId(quiz_id.to_string()).into());
        }
        let reward =
            quiz_reward(correct, total).ok_or(ValidationError::InvalidQuizCounts { correct, total })?;

        let (write_id, delta, retake) = {
            let mut inner = self.lock();
            let previous = inner.visible.completed_quizzes.get(quiz_id).cloned();
            let retake = previous.is_some();

            let mut delta = Delta {
                points: reward.points,
                coins: reward.coins,
                subject: Some((
                    subject,
                    SubjectDelta {
                        lessons: 0,
                        quizzes: if retake { 0 } else { 1 },
                        points: reward.points,
                    },
                )),
                quiz: Some(QuizChange {
                    quiz_id: quiz_id.to_string(),
                    result: QuizResult {
                        score: reward.percentage,
                        correct,
                        total,
                        completed_at: Some(Utc::now()),
                    },
                    previous,
                }),
                ..Default::default()
            };
            self.activity_effects(&inner.visible, reward.points, &mut delta);
            (inner.stage(&self.session_key, delta.clone()), delta, retake)
        };

        self.commit(write_id, delta).await?;
        log::info!(
            "[PROGRESS] quiz complete student:{} quiz:{} score:{}% points:{} coins:{}",
            self.student_id,
            quiz_id,
            reward.percentage,
            reward.points,
            reward.coins
        );
        Ok(QuizOutcome { reward, retake })
    }

    pub async fn grant_coins(&self, amount: i64, reason: &str) -> Result<(), ProgressError> {
        if amount <= 0 {
            return Err(ValidationError::NonPositiveCoins(amount).into());
        }

        let delta = Delta {
            coins: amount as u64,
            ..Default::default()
        };
        let write_id = self.lock().stage(&self.session_key, delta.clone());

        self.commit(write_id, delta).await?;
        log::info!(
            "[PROGRESS] coins granted student:{} amount:{} reason:{}",
            self.student_id,
            amount,
            reason
        );
        Ok(())
    }

    /// Returns `false` if the badge was already held.
    pub async fn grant_badge(&self, badge: AwardRecord) -> Result<bool, ProgressError> {
        self.grant_award(AwardKind::Badge, badge).await
    }

    pub async fn grant_sticker(&self, sticker: AwardRecord) -> Result<bool, ProgressError> {
        self.grant_award(AwardKind::Sticker, sticker).await
    }

    pub async fn grant_achievement(&self, achievement: AwardRecord) -> Result<bool, ProgressError> {
        self.grant_award(AwardKind::Achievement, achievement).await
    }

    async fn grant_award(&self, kind: AwardKind, mut award: AwardRecord) -> Result<bool, ProgressError> {
        if !check_item_id(&award.id) {
            return Err(ValidationError::InvalidItemId(award.id).into());
        }
        award.earned_at.get_or_insert_with(Utc::now);
        let award_id = award.id.clone();

        let (write_id, delta) = {
            let mut inner = self.lock();
            let held = match kind {
                AwardKind::Badge => inner.visible.has_badge(&award.id),
                AwardKind::Sticker => inner.visible.has_sticker(&award.id),
                AwardKind::Achievement => inner.visible.has_achievement(&award.id),
            };
            if held {
                return Ok(false);
            }

            let delta = Delta {
                award: Some((kind, award)),
                ..Default::default()
            };
            (inner.stage(&self.session_key, delta.clone()), delta)
        };

        self.commit(write_id, delta).await?;
        log::info!(
            "[PROGRESS] {} granted student:{} id:{}",
            kind.field(),
            self.student_id,
            award_id
        );
        Ok(true)
    }
}
