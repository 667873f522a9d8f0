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

use crate::config::ClientConfig;
use crate::error::{DeephavenErrorHelper, Error, Result};
use crate::session::PendingBatch;
use crate::state::{KeepAlive, TableState};
use crate::transport::{
    BatchRequest, DefinitionReply, ServerEvent, ServerReply, ServerRequest, ServerTransport,
};
use crate::types::{TableOperation, TableSnapshot};
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// One unit of serialized outgoing work.
type WorkItem = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Execution engine for one server connection.
///
/// All state-mutating requests are posted as work items onto a
/// single-consumer loop, so the order callers issue them is the order they
/// hit the wire. Incoming push events are consumed by a second sequential
/// loop and routed to pending batch watchers and table states.
pub struct SessionContext {
    name: String,
    transport: Arc<dyn ServerTransport>,
    work_tx: mpsc::UnboundedSender<WorkItem>,
    disposed: AtomicBool,
    next_handle_id: AtomicI64,
    /// Routing map: client id to live state.
    states: DashMap<i64, Weak<TableState>>,
    /// Batch watchers keyed by result client id, registered before the send.
    pending: DashMap<i64, Arc<PendingBatch>>,
    cancel: CancellationToken,
    closed_tx: watch::Sender<bool>,
    last_ping: Mutex<Instant>,
    /// Wait budget applied when a caller passes no explicit timeout.
    default_timeout: Duration,
}

impl SessionContext {
    /// Bind a context to a connection and start its two loops.
    pub fn attach(
        name: impl Into<String>,
        transport: Arc<dyn ServerTransport>,
        events: mpsc::UnboundedReceiver<ServerEvent>,
        config: &ClientConfig,
    ) -> Arc<Self> {
        let name = name.into();
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let (closed_tx, _) = watch::channel(false);
        let cancel = CancellationToken::new();
        let context = Arc::new(Self {
            name,
            transport,
            work_tx,
            disposed: AtomicBool::new(false),
            next_handle_id: AtomicI64::new(1),
            states: DashMap::new(),
            pending: DashMap::new(),
            cancel: cancel.clone(),
            closed_tx,
            last_ping: Mutex::new(Instant::now()),
            default_timeout: config.default_timeout,
        });
        tokio::spawn(run_work_loop(work_rx, cancel.clone()));
        tokio::spawn(run_event_loop(Arc::downgrade(&context), events, cancel));
        debug!(context = %context.name, "session context attached");
        context
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Observers see true once the connection closed or the context was
    /// disposed.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    pub(crate) fn last_ping_elapsed(&self) -> Duration {
        self.last_ping.lock().unwrap().elapsed()
    }

    /// Budget applied to blocking waits given no explicit timeout.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Allocate an unresolved state bound to this context. Fails fast once
    /// the context is disposed.
    pub fn new_state(self: &Arc<Self>) -> Result<Arc<TableState>> {
        if self.is_disposed() {
            return Err(DeephavenErrorHelper::disposed()
                .message(format!("context '{}' is disposed", self.name)));
        }
        let client_id = self.next_handle_id.fetch_add(1, Ordering::Relaxed);
        let state = TableState::new(
            crate::state::RemoteHandle::new(client_id),
            Arc::downgrade(self),
        );
        self.states.insert(client_id, Arc::downgrade(&state));
        Ok(state)
    }

    fn post(&self, fut: impl Future<Output = ()> + Send + 'static) -> bool {
        self.work_tx.send(Box::pin(fut)).is_ok()
    }

    fn disposed_error(&self) -> Error {
        DeephavenErrorHelper::disposed().message(format!("context '{}' is disposed", self.name))
    }

    /// Queue the server-side release of one handle onto the serialized
    /// stream. Callable from Drop; best effort once the loop has stopped.
    pub(crate) fn queue_release(&self, client_id: i64, server_id: Option<i64>) {
        self.states.remove(&client_id);
        let Some(server_id) = server_id else {
            // Never resolved on the server; nothing to release remotely.
            trace!(client_id, "released unassigned handle locally");
            return;
        };
        let transport = Arc::clone(&self.transport);
        let posted = self.post(async move {
            if let Err(err) = transport.release(server_id).await {
                warn!(server_id, error = %err, "handle release failed");
            }
        });
        if !posted {
            trace!(server_id, "release after shutdown dropped");
        }
    }

    /// Direct-callback protocol: issue a request whose dedicated reply
    /// carries the result table's definition.
    ///
    /// The returned state is unresolved; the request is issued in order on
    /// the work loop, and a completion task fulfills the state and releases
    /// the keep-alive claims on `dependents` when the reply lands.
    pub(crate) fn invoke_for_definition(
        self: &Arc<Self>,
        dependents: &[Arc<TableState>],
        build: impl FnOnce(i64) -> ServerRequest,
    ) -> Result<Arc<TableState>> {
        let state = self.new_state()?;
        let mut pinned: Vec<Arc<TableState>> = dependents.to_vec();
        pinned.push(Arc::clone(&state));
        let keep_alive = KeepAlive::claim(&pinned);

        let request = build(state.client_id());
        let transport = Arc::clone(&self.transport);
        let task_state = Arc::clone(&state);
        let posted = self.post(async move {
            match transport.invoke(request).await {
                Ok(reply_rx) => {
                    // Await the reply off the work loop so later requests
                    // are not held behind this one.
                    tokio::spawn(async move {
                        let result = decode_definition(reply_rx.await);
                        task_state.fulfill(result);
                        keep_alive.dispose();
                    });
                }
                Err(err) => {
                    task_state.fulfill(Err(err));
                    keep_alive.dispose();
                }
            }
        });
        if !posted {
            state.fail(self.disposed_error());
        }
        Ok(state)
    }

    /// Batch protocol: issue one table-producing operation whose result
    /// arrives out-of-band as an ExportCreated/ExportFailed event.
    ///
    /// The watcher is registered before the send so the event dispatcher can
    /// never observe a definition for an unknown handle. An inline failure
    /// in the acknowledgment completes the watcher immediately.
    pub(crate) fn invoke_for_batch(
        self: &Arc<Self>,
        dependents: &[Arc<TableState>],
        operation: TableOperation,
    ) -> Result<Arc<TableState>> {
        let state = self.new_state()?;
        let client_id = state.client_id();
        let source_ids: Vec<i64> = dependents.iter().map(|s| s.client_id()).collect();

        let mut pinned: Vec<Arc<TableState>> = dependents.to_vec();
        pinned.push(Arc::clone(&state));
        let keep_alive = KeepAlive::claim(&pinned);
        let batch = Arc::new(PendingBatch::new(Arc::clone(&state), keep_alive));
        self.pending.insert(client_id, Arc::clone(&batch));

        let request = BatchRequest {
            result_id: client_id,
            source_ids,
            operation,
        };
        let transport = Arc::clone(&self.transport);
        let weak = Arc::downgrade(self);
        let batch_for_task = Arc::clone(&batch);
        let posted = self.post(async move {
            match transport.send_batch(request).await {
                Ok(ack) => {
                    if let Some(failure) = ack.failure_for(client_id) {
                        let err =
                            DeephavenErrorHelper::server().message(failure.message.clone());
                        deregister_pending(&weak, client_id);
                        batch_for_task.complete(Err(err));
                    } else {
                        batch_for_task.mark_awaiting();
                    }
                }
                Err(err) => {
                    deregister_pending(&weak, client_id);
                    batch_for_task.complete(Err(err));
                }
            }
        });
        if !posted {
            self.pending.remove(&client_id);
            batch.complete(Err(self.disposed_error()));
        }
        Ok(state)
    }

    /// Issue a request on the work loop and await its dedicated reply.
    ///
    /// The reply wait is bounded by the default timeout so a silent server
    /// cannot wedge callers that loop on this, such as the auth refresher.
    pub(crate) async fn invoke_request(&self, request: ServerRequest) -> Result<ServerReply> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let transport = Arc::clone(&self.transport);
        let (tx, rx) = oneshot::channel();
        let posted = self.post(async move {
            let _ = tx.send(transport.invoke(request).await);
        });
        if !posted {
            return Err(self.disposed_error());
        }
        let reply_rx = rx
            .await
            .map_err(|_| DeephavenErrorHelper::disposed().message("work loop stopped"))??;
        match tokio::time::timeout(self.default_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DeephavenErrorHelper::transport().message("reply channel dropped")),
            Err(_) => Err(DeephavenErrorHelper::timeout().message(format!(
                "no reply within {:?}",
                self.default_timeout
            ))),
        }
    }

    /// Direct-callback data retrieval with keep-alive over `dependents`.
    ///
    /// `timeout` falls back to the default budget when absent. A timeout
    /// abandons only the caller's wait; the completion task still runs when
    /// the reply eventually lands, so the claims are always released.
    pub(crate) async fn invoke_for_data(
        &self,
        dependents: &[Arc<TableState>],
        request: ServerRequest,
        timeout: Option<Duration>,
    ) -> Result<TableSnapshot> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let keep_alive = KeepAlive::claim(dependents);
        let transport = Arc::clone(&self.transport);
        let (out_tx, out_rx) = oneshot::channel();
        let posted = self.post(async move {
            match transport.invoke(request).await {
                Ok(reply_rx) => {
                    tokio::spawn(async move {
                        let result = decode_snapshot(reply_rx.await);
                        keep_alive.dispose();
                        let _ = out_tx.send(result);
                    });
                }
                Err(err) => {
                    keep_alive.dispose();
                    let _ = out_tx.send(Err(err));
                }
            }
        });
        if !posted {
            return Err(self.disposed_error());
        }
        let wait = async {
            out_rx
                .await
                .map_err(|_| DeephavenErrorHelper::transport().message("reply channel dropped"))?
        };
        let limit = timeout.unwrap_or(self.default_timeout);
        tokio::time::timeout(limit, wait).await.map_err(|_| {
            DeephavenErrorHelper::timeout().message(format!("no table data within {limit:?}"))
        })?
    }

    /// Fire-and-forget request on the serialized stream.
    pub(crate) fn post_send(&self, request: ServerRequest) -> Result<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let transport = Arc::clone(&self.transport);
        let posted = self.post(async move {
            if let Err(err) = transport.send(request).await {
                warn!(error = %err, "send failed");
            }
        });
        if posted {
            Ok(())
        } else {
            Err(self.disposed_error())
        }
    }

    fn lookup_state(&self, client_id: i64) -> Option<Arc<TableState>> {
        self.states.get(&client_id).and_then(|entry| entry.upgrade())
    }

    pub(crate) fn handle_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::ExportCreated {
                client_id,
                server_id,
                definition,
            } => {
                let reply = DefinitionReply {
                    server_id,
                    definition,
                };
                if let Some((_, batch)) = self.pending.remove(&client_id) {
                    batch.complete(Ok(reply));
                } else if let Some(state) = self.lookup_state(client_id) {
                    state.fulfill(Ok(reply));
                } else {
                    trace!(client_id, "export for unknown handle dropped");
                }
            }
            ServerEvent::ExportFailed { client_id, message } => {
                let err = DeephavenErrorHelper::server().message(message);
                if let Some((_, batch)) = self.pending.remove(&client_id) {
                    batch.complete(Err(err));
                } else if let Some(state) = self.lookup_state(client_id) {
                    state.fail(err);
                } else {
                    trace!(client_id, "failure for unknown handle dropped");
                }
            }
            ServerEvent::Update { client_id, update } => {
                if let Some(state) = self.lookup_state(client_id) {
                    state.dispatch_update(update);
                } else {
                    trace!(client_id, "update for unknown handle dropped");
                }
            }
            ServerEvent::Snapshot {
                client_id,
                snapshot,
            } => {
                if let Some(state) = self.lookup_state(client_id) {
                    state.dispatch_snapshot(snapshot);
                } else {
                    trace!(client_id, "snapshot for unknown handle dropped");
                }
            }
            ServerEvent::Closed { code, reason } => {
                error!(context = %self.name, code, reason = %reason, "connection closed");
                self.fail_all(
                    DeephavenErrorHelper::transport()
                        .message(format!("connection closed ({code}): {reason}")),
                );
                let _ = self.closed_tx.send(true);
            }
            ServerEvent::Ping => {
                *self.last_ping.lock().unwrap() = Instant::now();
            }
        }
    }

    /// Fail every pending batch watcher and every live state with `err`.
    fn fail_all(&self, err: Error) {
        let keys: Vec<i64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            if let Some((_, batch)) = self.pending.remove(&key) {
                batch.complete(Err(err.clone()));
            }
        }
        let states: Vec<Arc<TableState>> = self
            .states
            .iter()
            .filter_map(|entry| entry.upgrade())
            .collect();
        for state in states {
            state.fail(err.clone());
        }
    }

    /// Dispose the context. New allocations fail immediately; a final work
    /// item releases every still-assigned handle through the same serialized
    /// stream, then stops both loops. Idempotent.
    pub fn dispose(self: &Arc<Self>) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(context = %self.name, "disposing session context");
        let weak = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let posted = self.post(async move {
            if let Some(context) = weak.upgrade() {
                context.dispose_sweep().await;
            }
            cancel.cancel();
        });
        if !posted {
            self.cancel.cancel();
        }
        let _ = self.closed_tx.send(true);
    }

    async fn dispose_sweep(&self) {
        let err = self.disposed_error();
        self.fail_all(err.clone());

        let states: Vec<Arc<TableState>> = self
            .states
            .iter()
            .filter_map(|entry| entry.upgrade())
            .collect();
        self.states.clear();
        for state in states {
            state.fail(err.clone());
            if state.mark_released() {
                if let Some(server_id) = state.server_id() {
                    if let Err(release_err) = self.transport.release(server_id).await {
                        warn!(server_id, error = %release_err, "release during dispose failed");
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("name", &self.name)
            .field("disposed", &self.is_disposed())
            .field("states", &self.states.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

fn deregister_pending(weak: &Weak<SessionContext>, client_id: i64) {
    if let Some(context) = weak.upgrade() {
        context.pending.remove(&client_id);
    }
}

fn decode_definition(
    reply: std::result::Result<Result<ServerReply>, oneshot::error::RecvError>,
) -> Result<DefinitionReply> {
    match reply {
        Ok(Ok(ServerReply::Definition(reply))) => Ok(reply),
        Ok(Ok(other)) => Err(DeephavenErrorHelper::invalid_state()
            .message(format!("expected definition reply, got {other:?}"))),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(DeephavenErrorHelper::transport().message("reply channel dropped")),
    }
}

fn decode_snapshot(
    reply: std::result::Result<Result<ServerReply>, oneshot::error::RecvError>,
) -> Result<TableSnapshot> {
    match reply {
        Ok(Ok(ServerReply::TableData(snapshot))) => Ok(snapshot),
        Ok(Ok(other)) => Err(DeephavenErrorHelper::invalid_state()
            .message(format!("expected table data reply, got {other:?}"))),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(DeephavenErrorHelper::transport().message("reply channel dropped")),
    }
}

async fn run_work_loop(mut work_rx: mpsc::UnboundedReceiver<WorkItem>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            item = work_rx.recv() => match item {
                Some(work) => work.await,
                None => break,
            },
        }
    }
    trace!("work loop stopped");
}

async fn run_event_loop(
    context: Weak<SessionContext>,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => {
                    let Some(context) = context.upgrade() else { break };
                    context.handle_event(event);
                }
                None => {
                    if let Some(context) = context.upgrade() {
                        if !context.is_disposed() {
                            context.handle_event(ServerEvent::Closed {
                                code: 0,
                                reason: "event stream ended".into(),
                            });
                        }
                    }
                    break;
                }
            },
        }
    }
    trace!("event loop stopped");
}
