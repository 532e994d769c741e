// SPDX-License-Identifier: MPL-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generation counter that invalidates callbacks from ended sessions.
///
/// Each bound session takes a [`SessionTicket`]. Ending the session bumps
/// the generation, after which every ticket issued before reports stale.
#[derive(Debug, Clone, Default)]
pub struct SessionGuard {
    generation: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct SessionTicket {
    generation: Arc<AtomicU64>,
    issued: u64,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> SessionTicket {
        SessionTicket {
            generation: Arc::clone(&self.generation),
            issued: self.generation.load(Ordering::SeqCst),
        }
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl SessionTicket {
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.issued
    }
}
