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

use crate::error::{DeephavenErrorHelper, Error, Result};
use crate::session::SessionContext;
use crate::state::RemoteHandle;
use crate::transport::DefinitionReply;
use crate::types::{TableDefinition, TableSnapshot, TableUpdate};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

/// Where a remote table stands between request issuance and its reply.
#[derive(Debug, Clone)]
pub enum Resolution {
    Pending,
    Ready(Arc<TableDefinition>),
    Failed(Error),
}

/// An incremental delta decorated with the resolved definition.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    pub definition: Arc<TableDefinition>,
    pub update: TableUpdate,
}

/// A full snapshot decorated with the resolved definition.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub definition: Arc<TableDefinition>,
    pub snapshot: TableSnapshot,
}

/// Tracker ids and the released flag live under one mutex so that the
/// last-detach transition, the release decision, and late attach attempts
/// are mutually atomic.
struct TrackerSet {
    ids: HashSet<u64>,
    released: bool,
}

/// Client-side identity of one remote table.
///
/// Created unresolved, before the request that produces the table goes out.
/// The resolution arrives later through [`fulfill`](Self::fulfill) and fires
/// exactly once. Lifetime is counted in tracker claims; when the set empties
/// the server-side handle release is queued exactly once.
pub struct TableState {
    handle: RemoteHandle,
    context: Weak<SessionContext>,
    resolution: watch::Sender<Resolution>,
    fulfilled: AtomicBool,
    trackers: Mutex<TrackerSet>,
    update_listeners: Mutex<Vec<mpsc::UnboundedSender<StateUpdate>>>,
    snapshot_listeners: Mutex<Vec<mpsc::UnboundedSender<StateSnapshot>>>,
}

impl TableState {
    pub(crate) fn new(handle: RemoteHandle, context: Weak<SessionContext>) -> Arc<Self> {
        let (resolution, _) = watch::channel(Resolution::Pending);
        Arc::new(Self {
            handle,
            context,
            resolution,
            fulfilled: AtomicBool::new(false),
            trackers: Mutex::new(TrackerSet {
                ids: HashSet::new(),
                released: false,
            }),
            update_listeners: Mutex::new(Vec::new()),
            snapshot_listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn client_id(&self) -> i64 {
        self.handle.client_id()
    }

    pub fn server_id(&self) -> Option<i64> {
        self.handle.server_id()
    }

    pub fn handle(&self) -> &RemoteHandle {
        &self.handle
    }

    /// Current resolution without waiting.
    pub fn resolution(&self) -> Resolution {
        self.resolution.borrow().clone()
    }

    /// Attach a tracker claim. Returns false if the state was already
    /// released; a release is never un-done.
    pub(crate) fn add_tracker(&self, tracker_id: u64) -> bool {
        let mut set = self.trackers.lock().unwrap();
        if set.released {
            warn!(
                client_id = self.handle.client_id(),
                tracker_id, "tracker attach after release ignored"
            );
            return false;
        }
        set.ids.insert(tracker_id);
        true
    }

    /// Detach a tracker claim. The transition to an empty set queues the
    /// server-side release onto the owning context's serialized stream.
    pub(crate) fn remove_tracker(&self, tracker_id: u64) {
        let release = {
            let mut set = self.trackers.lock().unwrap();
            set.ids.remove(&tracker_id);
            if set.ids.is_empty() && !set.released {
                set.released = true;
                true
            } else {
                false
            }
        };
        if release {
            debug!(
                client_id = self.handle.client_id(),
                "last tracker detached, queueing release"
            );
            if let Some(context) = self.context.upgrade() {
                context.queue_release(self.handle.client_id(), self.handle.server_id());
            }
        }
    }

    /// Claim the release during context disposal. Returns true at most once
    /// across all release paths.
    pub(crate) fn mark_released(&self) -> bool {
        let mut set = self.trackers.lock().unwrap();
        if set.released {
            false
        } else {
            set.released = true;
            true
        }
    }

    pub fn is_released(&self) -> bool {
        self.trackers.lock().unwrap().released
    }

    /// Resolve the state. Only the first call takes effect; later calls
    /// return false and change nothing.
    pub(crate) fn fulfill(&self, result: Result<DefinitionReply>) -> bool {
        if self.fulfilled.swap(true, Ordering::AcqRel) {
            trace!(
                client_id = self.handle.client_id(),
                "duplicate fulfillment dropped"
            );
            return false;
        }
        match result {
            Ok(reply) => {
                self.handle.assign_server_id(reply.server_id);
                debug!(
                    client_id = self.handle.client_id(),
                    server_id = reply.server_id,
                    "table state resolved"
                );
                self.resolution
                    .send_replace(Resolution::Ready(Arc::new(reply.definition)));
            }
            Err(err) => {
                debug!(
                    client_id = self.handle.client_id(),
                    error = %err,
                    "table state failed"
                );
                self.resolution.send_replace(Resolution::Failed(err));
            }
        }
        true
    }

    pub(crate) fn fail(&self, err: Error) -> bool {
        self.fulfill(Err(err))
    }

    /// Wait for the resolution. Expiry of `timeout` yields a Timeout error
    /// but does not cancel the in-flight request; a later call can still
    /// observe the resolution.
    pub async fn await_definition(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Arc<TableDefinition>> {
        let mut rx = self.resolution.subscribe();
        let wait = rx.wait_for(|r| !matches!(r, Resolution::Pending));
        let resolved = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                DeephavenErrorHelper::timeout().message(format!(
                    "table {} not resolved within {limit:?}",
                    self.handle.client_id()
                ))
            })?,
            None => wait.await,
        };
        let resolved = resolved.map_err(|_| {
            DeephavenErrorHelper::invalid_state().message("table state dropped while waiting")
        })?;
        match &*resolved {
            Resolution::Ready(definition) => Ok(Arc::clone(definition)),
            Resolution::Failed(err) => Err(err.clone()),
            Resolution::Pending => {
                Err(DeephavenErrorHelper::invalid_state().message("resolution wait ended pending"))
            }
        }
    }

    pub fn subscribe_updates(&self) -> mpsc::UnboundedReceiver<StateUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.update_listeners.lock().unwrap().push(tx);
        rx
    }

    pub fn subscribe_snapshots(&self) -> mpsc::UnboundedReceiver<StateSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.snapshot_listeners.lock().unwrap().push(tx);
        rx
    }

    /// Fan an incremental delta out to listeners. Dropped while unresolved.
    pub(crate) fn dispatch_update(&self, update: TableUpdate) {
        let definition = match &*self.resolution.borrow() {
            Resolution::Ready(definition) => Arc::clone(definition),
            _ => {
                trace!(
                    client_id = self.handle.client_id(),
                    "update for unresolved table dropped"
                );
                return;
            }
        };
        let item = StateUpdate { definition, update };
        self.update_listeners
            .lock()
            .unwrap()
            .retain(|tx| tx.send(item.clone()).is_ok());
    }

    /// Fan a full snapshot out to listeners. Dropped while unresolved.
    pub(crate) fn dispatch_snapshot(&self, snapshot: TableSnapshot) {
        let definition = match &*self.resolution.borrow() {
            Resolution::Ready(definition) => Arc::clone(definition),
            _ => {
                trace!(
                    client_id = self.handle.client_id(),
                    "snapshot for unresolved table dropped"
                );
                return;
            }
        };
        let item = StateSnapshot {
            definition,
            snapshot,
        };
        self.snapshot_listeners
            .lock()
            .unwrap()
            .retain(|tx| tx.send(item.clone()).is_ok());
    }
}

impl std::fmt::Debug for TableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableState")
            .field("client_id", &self.handle.client_id())
            .field("server_id", &self.handle.server_id())
            .field("released", &self.is_released())
            .finish()
    }
}
