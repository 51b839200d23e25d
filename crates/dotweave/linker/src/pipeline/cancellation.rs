// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Cooperative cancellation of a linking pass

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Atomic cancellation signal, checked by the pipeline between stages
///
/// Clones share the same signal, so a token handed to [`AspectLinker::link`](crate::AspectLinker::link)
/// can be cancelled from another thread.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    created_at: Instant,
    timeout: Option<Duration>,
    reason: Arc<Mutex<Option<String>>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Token that is only cancelled explicitly
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            created_at: Instant::now(),
            timeout: None,
            reason: Arc::new(Mutex::new(None)),
        }
    }

    /// Token that cancels itself once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.check_timeout();
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel(&self, reason: Option<&str>) {
        if let Some(reason) = reason {
            *self.reason.lock() = Some(reason.to_string());
        }
        self.cancelled.store(true, Ordering::Release);
    }

    fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    fn check_timeout(&self) {
        if let Some(timeout) = self.timeout
            && self.age() > timeout
            && !self.cancelled.load(Ordering::Acquire)
        {
            self.cancel(Some("Timeout"));
        }
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_signal() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel(Some("user request"));
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("user request"));
    }

    #[test]
    fn test_timeout_cancels() {
        let token = CancellationToken::with_timeout(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("Timeout"));
    }
}
