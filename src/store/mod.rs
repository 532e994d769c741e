// SPDX-License-Identifier: MPL-2.0

//! Local implementations of the backend contracts.

mod auth;
mod db;
mod documents;
mod fields;
mod memory;
mod schema;

pub use auth::MemoryAuth;
pub use db::SqliteStore;
pub use fields::apply_updates;
pub use memory::MemoryStore;
