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

use crate::error::Result;
use crate::state::{KeepAlive, TableState};
use crate::transport::DefinitionReply;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Progress of one batch-created table between send and resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BatchPhase {
    /// Request handed to the transport; acknowledgment not yet seen.
    Sent,
    /// Acknowledged clean; definition must arrive out-of-band.
    AwaitingDefinition,
    Done,
}

/// Watcher for one batch result handle.
///
/// `complete` is single-fire: under a race between the out-of-band
/// definition event and a connection close, exactly one caller fulfills the
/// resolution and disposes the keep-alive claims.
#[derive(Debug)]
pub(crate) struct PendingBatch {
    state: Arc<TableState>,
    keep_alive: KeepAlive,
    phase: Mutex<BatchPhase>,
    completed: AtomicBool,
}

impl PendingBatch {
    pub(crate) fn new(state: Arc<TableState>, keep_alive: KeepAlive) -> Self {
        Self {
            state,
            keep_alive,
            phase: Mutex::new(BatchPhase::Sent),
            completed: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> &Arc<TableState> {
        &self.state
    }

    pub(crate) fn phase(&self) -> BatchPhase {
        *self.phase.lock().unwrap()
    }

    /// Record the clean acknowledgment. A watcher already completed (for
    /// example by a close racing the ack) stays Done.
    pub(crate) fn mark_awaiting(&self) {
        let mut phase = self.phase.lock().unwrap();
        if *phase == BatchPhase::Sent {
            *phase = BatchPhase::AwaitingDefinition;
        }
    }

    /// Fulfill the result state and release the keep-alive claims. Only the
    /// first call takes effect.
    pub(crate) fn complete(&self, result: Result<DefinitionReply>) -> bool {
        if self.completed.swap(true, Ordering::AcqRel) {
            trace!(
                client_id = self.state.client_id(),
                "duplicate batch completion dropped"
            );
            return false;
        }
        *self.phase.lock().unwrap() = BatchPhase::Done;
        self.state.fulfill(result);
        self.keep_alive.dispose();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeephavenErrorHelper, Status};
    use crate::state::RemoteHandle;
    use crate::types::TableDefinition;
    use std::sync::Weak;

    fn pending() -> PendingBatch {
        let state = TableState::new(RemoteHandle::new(1), Weak::new());
        let keep_alive = KeepAlive::claim(&[Arc::clone(&state)]);
        PendingBatch::new(state, keep_alive)
    }

    #[test]
    fn test_phase_progression() {
        let batch = pending();
        assert_eq!(batch.phase(), BatchPhase::Sent);
        batch.mark_awaiting();
        assert_eq!(batch.phase(), BatchPhase::AwaitingDefinition);

        assert!(batch.complete(Ok(DefinitionReply {
            server_id: 5,
            definition: TableDefinition::new(vec![], 0),
        })));
        assert_eq!(batch.phase(), BatchPhase::Done);
        assert_eq!(batch.state().server_id(), Some(5));
    }

    #[test]
    fn test_complete_fires_once() {
        let batch = pending();
        assert!(batch.complete(Err(
            DeephavenErrorHelper::transport().message("connection closed")
        )));
        assert!(!batch.complete(Ok(DefinitionReply {
            server_id: 6,
            definition: TableDefinition::new(vec![], 0),
        })));

        // The first completion won; the late definition changed nothing.
        assert_eq!(batch.state().server_id(), None);
        match batch.state().resolution() {
            crate::state::Resolution::Failed(err) => assert_eq!(err.status, Status::Transport),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_mark_awaiting_after_done_is_noop() {
        let batch = pending();
        batch.complete(Err(DeephavenErrorHelper::disposed().message("context disposed")));
        batch.mark_awaiting();
        assert_eq!(batch.phase(), BatchPhase::Done);
    }
}
