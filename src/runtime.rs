// SPDX-License-Identifier: MPL-2.0

//! Synchronous front end for [`AppContext`].
//!
//! UI event handlers are not async. Short session calls block on a shared
//! runtime; lesson and quiz completions run in the background and report
//! through a callback so the handler can return immediately.

use crate::app::{AppContext, LessonCompletion, Phase, QuizCompletion};
use crate::progress::{ProgressError, RankedEntry, Snapshot, Subject};
use crate::remote::{AuthProvider, DocumentStore, Role};
use once_cell::sync::Lazy;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

/// Two workers cover the I/O-bound store and auth traffic.
static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("kidquest-async")
        .build()
        .expect("failed to create async runtime")
});

/// Must not be called from inside the runtime itself.
fn block_on<F: Future>(future: F) -> F::Output {
    RUNTIME.block_on(future)
}

fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    RUNTIME.spawn(future)
}

/// Blocking handle to a shared [`AppContext`]. Clones share the session.
pub struct BlockingContext<S, A> {
    inner: Arc<AppContext<S, A>>,
}

impl<S, A> Clone for BlockingContext<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DocumentStore, A: AuthProvider> BlockingContext<S, A> {
    pub fn new(context: AppContext<S, A>) -> Self {
        Self {
            inner: Arc::new(context),
        }
    }

    /// The wrapped context, for callers that are already async.
    pub fn context(&self) -> &Arc<AppContext<S, A>> {
        &self.inner
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase()
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.inner.snapshot()
    }

    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        grade: u8,
        role: Role,
    ) -> Result<Phase, ProgressError> {
        block_on(self.inner.sign_up(email, password, name, grade, role))
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Phase, ProgressError> {
        block_on(self.inner.sign_in(email, password))
    }

    pub fn resume(&self) -> Result<Phase, ProgressError> {
        block_on(self.inner.resume())
    }

    pub fn sign_out(&self) -> Result<(), ProgressError> {
        block_on(self.inner.sign_out())
    }

    pub fn leaderboard(&self, top_n: Option<usize>) -> Result<Vec<RankedEntry>, ProgressError> {
        block_on(self.inner.leaderboard(top_n))
    }

    /// Record a lesson in the background; `on_done` runs on a runtime worker.
    pub fn complete_lesson<F>(&self, subject: Subject, lesson_id: &str, points: u64, on_done: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<LessonCompletion, ProgressError>) + Send + 'static,
    {
        let context = Arc::clone(&self.inner);
        let lesson_id = lesson_id.to_string();
        spawn(async move {
            let result = context.complete_lesson(subject, &lesson_id, points).await;
            if let Err(e) = &result {
                log::warn!("[PROGRESS] background lesson {} failed: {}", lesson_id, e);
            }
            on_done(result);
        })
    }

    pub fn complete_quiz<F>(
        &self,
        subject: Subject,
        quiz_id: &str,
        correct: u32,
        total: u32,
        on_done: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<QuizCompletion, ProgressError>) + Send + 'static,
    {
        let context = Arc::clone(&self.inner);
        let quiz_id = quiz_id.to_string();
        spawn(async move {
            let result = context.complete_quiz(subject, &quiz_id, correct, total).await;
            if let Err(e) = &result {
                log::warn!("[PROGRESS] background quiz {} failed: {}", quiz_id, e);
            }
            on_done(result);
        })
    }

    /// Block until a background completion has reported.
    pub fn wait(&self, handle: JoinHandle<()>) {
        if let Err(e) = block_on(handle) {
            log::error!("[PROGRESS] background task panicked: {}", e);
        }
    }
}
