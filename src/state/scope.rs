// Copyright (c) 2025 Deephaven Client Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::state::{TableState, TableTracker};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, trace};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

struct ScopeInner {
    disposed: bool,
    trackers: HashMap<u64, Weak<TableTracker>>,
}

/// A disposal domain for tracker claims.
///
/// A scope holds its trackers weakly; the strong references live with
/// whoever created the claim. Disposing the scope disposes every still-alive
/// tracker, which detaches their claims from the underlying states.
pub struct TableScope {
    id: u64,
    inner: Mutex<ScopeInner>,
}

impl TableScope {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(ScopeInner {
                disposed: false,
                trackers: HashMap::new(),
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().unwrap().disposed
    }

    /// Returns false when the scope is already disposed; the tracker is then
    /// not managed by this scope.
    pub(crate) fn register(&self, tracker: &Arc<TableTracker>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.disposed {
            trace!(
                scope_id = self.id,
                tracker_id = tracker.id(),
                "register on disposed scope ignored"
            );
            return false;
        }
        inner.trackers.insert(tracker.id(), Arc::downgrade(tracker));
        true
    }

    pub(crate) fn unregister(&self, tracker_id: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.trackers.remove(&tracker_id);
    }

    /// Dispose every tracker registered with this scope. Idempotent.
    pub fn dispose(&self) {
        let trackers = {
            let mut inner = self.inner.lock().unwrap();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            std::mem::take(&mut inner.trackers)
        };
        debug!(scope_id = self.id, count = trackers.len(), "disposing scope");
        for weak in trackers.into_values() {
            if let Some(tracker) = weak.upgrade() {
                tracker.dispose();
            }
        }
    }
}

impl std::fmt::Debug for TableScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("TableScope")
            .field("id", &self.id)
            .field("disposed", &inner.disposed)
            .field("trackers", &inner.trackers.len())
            .finish()
    }
}

/// A throwaway scope that pins a set of states for the duration of one
/// in-flight request.
///
/// Unlike user-facing scopes, the keep-alive owns its trackers strongly so
/// the claims survive until the request completes. `dispose` runs exactly
/// once; dropping an undisposed keep-alive disposes it as a backstop.
#[derive(Debug)]
pub(crate) struct KeepAlive {
    scope: Arc<TableScope>,
    trackers: Vec<Arc<TableTracker>>,
    disposed: AtomicBool,
}

impl KeepAlive {
    /// Claim every state in `states` under a fresh scope.
    pub(crate) fn claim(states: &[Arc<TableState>]) -> Self {
        let scope = TableScope::new();
        let trackers = states
            .iter()
            .map(|state| TableTracker::create(&scope, Arc::clone(state)))
            .collect();
        Self {
            scope,
            trackers,
            disposed: AtomicBool::new(false),
        }
    }

    /// Release every claim. Idempotent.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.scope.dispose();
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_after_dispose_ignored() {
        let scope = TableScope::new();
        scope.dispose();
        assert!(scope.is_disposed());
        // Double dispose is a no-op.
        scope.dispose();
    }
}
