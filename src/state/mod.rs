// SPDX-License-Identifier: MPL-2.0

mod session;
pub mod settings;

pub use session::{SessionGuard, SessionTicket};
pub use settings::{AppSettings, Theme};
