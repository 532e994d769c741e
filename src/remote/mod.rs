// SPDX-License-Identifier: MPL-2.0

//! Contracts for the hosted backends: document store and identity provider.

mod auth;
mod listeners;
mod store;
mod types;

pub use auth::{AuthError, AuthProvider, Identity, Role};
pub use listeners::{ListenerRegistry, Subscription};
pub use store::{DocumentStore, StoreError};
pub use types::{DocPath, Document, FieldOp, FieldUpdates};
