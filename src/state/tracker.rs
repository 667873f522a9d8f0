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

use crate::state::{TableScope, TableState};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

static NEXT_TRACKER_ID: AtomicU64 = AtomicU64::new(1);

/// One claim on a [`TableState`], owned by a [`TableScope`].
///
/// Disposal is idempotent; `Drop` is the deterministic backstop for claims
/// that were never explicitly disposed.
pub struct TableTracker {
    id: u64,
    state: Arc<TableState>,
    scope: Weak<TableScope>,
    disposed: AtomicBool,
}

impl TableTracker {
    /// Register with the scope first, then attach to the state, so the scope
    /// can always reach a tracker whose claim is counted.
    pub(crate) fn create(scope: &Arc<TableScope>, state: Arc<TableState>) -> Arc<Self> {
        let tracker = Arc::new(Self {
            id: NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed),
            state,
            scope: Arc::downgrade(scope),
            disposed: AtomicBool::new(false),
        });
        let registered = scope.register(&tracker);
        let attached = registered && tracker.state.add_tracker(tracker.id);
        if !attached {
            // Scope already disposed or state already released; the claim
            // never took effect.
            tracker.disposed.store(true, Ordering::Release);
            if registered {
                scope.unregister(tracker.id);
            }
        }
        tracker
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> &Arc<TableState> {
        &self.state
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Detach the claim. Idempotent across explicit calls and Drop.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        trace!(
            tracker_id = self.id,
            client_id = self.state.client_id(),
            "disposing tracker"
        );
        if let Some(scope) = self.scope.upgrade() {
            scope.unregister(self.id);
        }
        self.state.remove_tracker(self.id);
    }
}

impl Drop for TableTracker {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for TableTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableTracker")
            .field("id", &self.id)
            .field("client_id", &self.state.client_id())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
