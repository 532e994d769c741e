// SPDX-License-Identifier: MPL-2.0

//! Session-level entry point used by the UI.
//!
//! Owns the signed-in account, its [`ProgressState`] and the document
//! subscriptions that keep that state in sync with other devices.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{DEFAULT_STUDENT_NAME, MAX_GRADE, MIN_GRADE};
use crate::progress::badges::evaluate;
use crate::progress::{
    AwardRecord, BadgeCatalog, Curriculum, LeaderboardProjection, LessonOutcome, ProgressError,
    ProgressService, ProgressState, QuizOutcome, RankedEntry, Rules, Snapshot, StudentProfile,
    Subject, ValidationError,
};
use crate::remote::{AuthProvider, DocPath, DocumentStore, Identity, Role, StoreError, Subscription};
use crate::state::{AppSettings, SessionGuard, SessionTicket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No student progress is bound to the session
    Uninitialized,
    Loaded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LessonCompletion {
    pub outcome: LessonOutcome,
    pub new_badges: Vec<AwardRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizCompletion {
    pub outcome: QuizOutcome,
    pub new_badges: Vec<AwardRecord>,
}

struct BoundSession<S> {
    identity: Identity,
    progress: Option<ProgressState<S>>,
    subscriptions: Vec<Subscription>,
}

pub struct AppContext<S, A> {
    store: Arc<S>,
    auth: Arc<A>,
    settings: AppSettings,
    catalog: BadgeCatalog,
    curriculum: Curriculum,
    rules: Arc<Rules>,
    guard: SessionGuard,
    session: Mutex<Option<BoundSession<S>>>,
}

impl<S: DocumentStore, A: AuthProvider> AppContext<S, A> {
    pub fn new(store: Arc<S>, auth: Arc<A>, settings: AppSettings) -> Self {
        let rules = Arc::new(settings.rules());
        let curriculum = settings.curriculum();
        Self {
            store,
            auth,
            settings,
            catalog: BadgeCatalog::standard(),
            curriculum,
            rules,
            guard: SessionGuard::new(),
            session: Mutex::new(None),
        }
    }

    pub fn with_catalog(mut self, catalog: BadgeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_curriculum(mut self, curriculum: Curriculum) -> Self {
        self.curriculum = curriculum;
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &BadgeCatalog {
        &self.catalog
    }

    fn lock(&self) -> MutexGuard<'_, Option<BoundSession<S>>> {
        self.session.lock().expect("session lock poisoned")
    }

    pub fn phase(&self) -> Phase {
        match self.lock().as_ref() {
            Some(BoundSession {
                progress: Some(_), ..
            }) => Phase::Loaded,
            _ => Phase::Uninitialized,
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        self.lock().as_ref().map(|s| s.identity.clone())
    }

    fn progress(&self) -> Result<ProgressState<S>, ProgressError> {
        match self.lock().as_ref() {
            Some(session) => session.progress.clone().ok_or(ProgressError::NotAStudent),
            None => Err(ProgressError::NotSignedIn),
        }
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.progress().ok().map(|p| p.snapshot())
    }

    /// Create an account and its profile, then bind the new session.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        grade: u8,
        role: Role,
    ) -> Result<Phase, ProgressError> {
        if !(MIN_GRADE..=MAX_GRADE).contains(&grade) {
            return Err(ValidationError::InvalidGrade(grade).into());
        }
        self.end_session();

        let name = name.trim();
        let display_name = (!name.is_empty()).then_some(name);
        let identity = self.auth.sign_up(email, password, display_name, role).await?;
        log::info!("[SESSION] account created uid:{} role:{:?}", identity.uid, role);

        let profile = StudentProfile {
            name: display_name.unwrap_or(DEFAULT_STUDENT_NAME).to_string(),
            grade,
            ..StudentProfile::from_identity(&identity)
        };
        ProgressService::new(self.store.as_ref())
            .save_profile(&profile)
            .await?;

        self.bind(identity).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Phase, ProgressError> {
        self.end_session();
        let identity = self.auth.sign_in(email, password).await?;
        log::info!("[SESSION] signed in uid:{}", identity.uid);
        self.bind(identity).await
    }

    /// Bind whatever account the auth provider already reports, e.g. at
    /// startup or after a failed load.
    pub async fn resume(&self) -> Result<Phase, ProgressError> {
        let identity = self.auth.current().ok_or(ProgressError::NotSignedIn)?;
        if self.phase() == Phase::Loaded {
            return Ok(Phase::Loaded);
        }
        self.end_session();
        self.bind(identity).await
    }

    pub async fn sign_out(&self) -> Result<(), ProgressError> {
        self.end_session();
        self.auth.sign_out().await?;
        log::info!("[SESSION] signed out");
        Ok(())
    }

    /// Cancel listeners and forget the current session. Callbacks from it
    /// are inert once this returns.
    fn end_session(&self) {
        let ended = self.lock().take();
        self.guard.invalidate();

        if let Some(mut session) = ended {
            for subscription in &mut session.subscriptions {
                subscription.cancel();
            }
            log::debug!("[SESSION] ended uid:{}", session.identity.uid);
        }
    }

    async fn bind(&self, identity: Identity) -> Result<Phase, ProgressError> {
        let ticket = self.guard.ticket();

        let progress = match identity.role {
            Role::Teacher => None,
            Role::Student => {
                match ProgressState::load(Arc::clone(&self.store), &identity, Arc::clone(&self.rules)).await {
                    Ok(state) => Some(state),
                    Err(e) => {
                        log::warn!("[SESSION] progress load failed uid:{}: {}", identity.uid, e);
                        return Err(e);
                    }
                }
            }
        };

        // Signed out (or in as someone else) while loading
        if !ticket.is_current() {
            return Err(ProgressError::NotSignedIn);
        }

        let subscriptions = match &progress {
            Some(state) => self.subscribe(state, &ticket)?,
            None => Vec::new(),
        };
        let phase = if progress.is_some() {
            Phase::Loaded
        } else {
            Phase::Uninitialized
        };

        let mut session = self.lock();
        if !ticket.is_current() {
            return Err(ProgressError::NotSignedIn);
        }
        *session = Some(BoundSession {
            identity,
            progress,
            subscriptions,
        });
        Ok(phase)
    }

    fn subscribe(
        &self,
        state: &ProgressState<S>,
        ticket: &SessionTicket,
    ) -> Result<Vec<Subscription>, ProgressError> {
        let id = state.student_id();
        let progress_path = DocPath::progress(id).ok_or_else(|| StoreError::InvalidPath(id.to_string()))?;
        let profile_path = DocPath::student(id).ok_or_else(|| StoreError::InvalidPath(id.to_string()))?;

        let (target, current) = (state.clone(), ticket.clone());
        let progress_sub = self.store.subscribe(&progress_path, move |doc| {
            if !current.is_current() {
                return;
            }
            if let Err(e) = target.apply_remote_update(doc) {
                log::warn!("[SESSION] ignored remote progress student:{}: {}", target.student_id(), e);
            }
        });

        let (target, current) = (state.clone(), ticket.clone());
        let profile_sub = self.store.subscribe(&profile_path, move |doc| {
            if !current.is_current() {
                return;
            }
            if let Err(e) = target.apply_remote_profile_update(doc) {
                log::warn!("[SESSION] ignored remote profile student:{}: {}", target.student_id(), e);
            }
        });

        Ok(vec![progress_sub, profile_sub])
    }

    /// Grant every badge the student now qualifies for. A failed grant is
    /// logged; the badge is picked up again on the next activity.
    async fn award_badges(&self, state: &ProgressState<S>) -> Vec<AwardRecord> {
        let snapshot = state.snapshot();
        let earned = evaluate(&snapshot.record, snapshot.profile.grade, &self.catalog, &self.curriculum);

        let mut granted = Vec::new();
        for id in earned {
            let Some(badge) = self.catalog.get(&id) else {
                continue;
            };
            let award = badge.to_award();
            match state.grant_badge(award.clone()).await {
                Ok(true) => granted.push(award),
                Ok(false) => {}
                Err(e) => log::warn!("[SESSION] badge {} not granted: {}", id, e),
            }
        }
        granted
    }

    pub async fn complete_lesson(
        &self,
        subject: Subject,
        lesson_id: &str,
        points: u64,
    ) -> Result<LessonCompletion, ProgressError> {
        let state = self.progress()?;
        let outcome = state
            .record_lesson_completion(subject, lesson_id, points, state.grade())
            .await?;

        let new_badges = match outcome {
            LessonOutcome::Completed { .. } => self.award_badges(&state).await,
            LessonOutcome::AlreadyCompleted => Vec::new(),
        };
        Ok(LessonCompletion { outcome, new_badges })
    }

    pub async fn complete_quiz(
        &self,
        subject: Subject,
        quiz_id: &str,
        correct: u32,
        total: u32,
    ) -> Result<QuizCompletion, ProgressError> {
        let state = self.progress()?;
        let outcome = state
            .record_quiz_completion(subject, quiz_id, correct, total, state.grade())
            .await?;
        let new_badges = self.award_badges(&state).await;
        Ok(QuizCompletion { outcome, new_badges })
    }

    pub async fn grant_coins(&self, amount: i64, reason: &str) -> Result<(), ProgressError> {
        self.progress()?.grant_coins(amount, reason).await
    }

    pub async fn grant_sticker(&self, sticker: AwardRecord) -> Result<bool, ProgressError> {
        self.progress()?.grant_sticker(sticker).await
    }

    pub async fn grant_achievement(&self, achievement: AwardRecord) -> Result<bool, ProgressError> {
        self.progress()?.grant_achievement(achievement).await
    }

    /// The signed-in student's grade leaderboard. `None` uses the configured size.
    pub async fn leaderboard(&self, top_n: Option<usize>) -> Result<Vec<RankedEntry>, ProgressError> {
        let state = self.progress()?;
        let top_n = top_n.unwrap_or(self.settings.leaderboard_size);
        let ranked = LeaderboardProjection::new(self.store.as_ref())
            .fetch(state.grade(), Some(state.student_id()), top_n)
            .await?;
        Ok(ranked)
    }

    /// Any grade's leaderboard, for teachers browsing their classes.
    pub async fn leaderboard_for_grade(
        &self,
        grade: u8,
        top_n: Option<usize>,
    ) -> Result<Vec<RankedEntry>, ProgressError> {
        if !(MIN_GRADE..=MAX_GRADE).contains(&grade) {
            return Err(ValidationError::InvalidGrade(grade).into());
        }
        let viewer = self.identity().ok_or(ProgressError::NotSignedIn)?;
        let top_n = top_n.unwrap_or(self.settings.leaderboard_size);
        let ranked = LeaderboardProjection::new(self.store.as_ref())
            .fetch(grade, Some(viewer.uid.as_str()), top_n)
            .await?;
        Ok(ranked)
    }
}
