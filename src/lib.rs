// SPDX-License-Identifier: MPL-2.0

//! Client core for the KidQuest learning app: student progress, rewards,
//! badges and the per-grade leaderboard.

pub mod app;
pub mod config;
pub mod progress;
pub mod remote;
pub mod runtime;
pub mod state;
pub mod store;

pub use app::{AppContext, LessonCompletion, Phase, QuizCompletion};
pub use progress::{ProgressError, ProgressState, Subject, ValidationError};
pub use remote::{AuthProvider, DocumentStore};
pub use runtime::BlockingContext;
pub use state::AppSettings;
