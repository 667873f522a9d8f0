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

//! Session and worker orchestration.
//!
//! A [`Client`] owns the primary connection plus its auth-refresh loop.
//! Each attached worker gets an independent [`SessionContext`] with a
//! heartbeat/watchdog task; worker failures are isolated from the primary
//! session and from other workers.

use crate::config::ClientConfig;
use crate::error::{DeephavenErrorHelper, Error, Result};
use crate::logging::init_logging;
use crate::query::{QueryScope, QueryTable};
use crate::session::SessionContext;
use crate::transport::{ServerEvent, ServerReply, ServerRequest, ServerTransport};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Observer for primary-session events.
pub trait ClientListener: Send + Sync {
    fn on_token_refreshed(&self) {}

    fn on_error(&self, error: &Error) {
        let _ = error;
    }
}

/// Observer for worker-session failures.
pub trait WorkerListener: Send + Sync {
    fn on_error(&self, worker: &str, error: &Error) {
        let _ = (worker, error);
    }

    fn on_closed(&self, worker: &str) {
        let _ = worker;
    }
}

/// Top-level entry point: one primary session and any number of workers.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    primary: Arc<SessionContext>,
    refresh_cancel: CancellationToken,
}

impl Client {
    /// Open the primary session over an established connection and start
    /// the background auth-refresh loop.
    pub fn login(
        transport: Arc<dyn ServerTransport>,
        events: mpsc::UnboundedReceiver<ServerEvent>,
        config: ClientConfig,
        listener: Arc<dyn ClientListener>,
    ) -> Client {
        init_logging(&config.log);
        let primary = SessionContext::attach("primary", transport, events, &config);
        let refresh_cancel = CancellationToken::new();
        tokio::spawn(auth_refresh_loop(
            Arc::downgrade(&primary),
            config.auth_refresh_interval,
            listener,
            refresh_cancel.clone(),
        ));
        debug!("client logged in");
        Client {
            config,
            primary,
            refresh_cancel,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn primary(&self) -> &Arc<SessionContext> {
        &self.primary
    }

    /// Open a scope on the primary session.
    pub fn new_scope(&self) -> QueryScope {
        QueryScope::new(Arc::clone(&self.primary))
    }

    /// Bind an independent session to an already-connected worker and start
    /// its heartbeat/watchdog.
    pub fn attach_worker(
        &self,
        name: impl Into<String>,
        transport: Arc<dyn ServerTransport>,
        events: mpsc::UnboundedReceiver<ServerEvent>,
        listener: Arc<dyn WorkerListener>,
    ) -> WorkerSession {
        let name = name.into();
        let context = SessionContext::attach(name.clone(), transport, events, &self.config);
        let heartbeat_cancel = CancellationToken::new();
        tokio::spawn(heartbeat_loop(
            Arc::downgrade(&context),
            name.clone(),
            self.config.heartbeat_interval,
            listener,
            heartbeat_cancel.clone(),
        ));
        WorkerSession {
            name,
            context,
            primary: Arc::clone(&self.primary),
            heartbeat_cancel,
        }
    }

    /// Stop the refresh loop and dispose the primary session. Idempotent.
    pub fn shutdown(&self) {
        debug!("client shutting down");
        self.refresh_cancel.cancel();
        self.primary.dispose();
    }
}

/// One worker-scoped session. Dropping the session does not release the
/// worker; call [`release`](Self::release).
#[derive(Debug)]
pub struct WorkerSession {
    name: String,
    context: Arc<SessionContext>,
    primary: Arc<SessionContext>,
    heartbeat_cancel: CancellationToken,
}

impl WorkerSession {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn new_scope(&self) -> QueryScope {
        QueryScope::new(Arc::clone(&self.context))
    }

    /// Bind a named table on this worker under a fresh scope.
    pub fn fetch_table(&self, name: impl Into<String>) -> Result<(QueryScope, QueryTable)> {
        let scope = self.new_scope();
        let table = scope.fetch_table(name)?;
        Ok((scope, table))
    }

    /// Dispose this session and ask the primary server to stop the backing
    /// worker process.
    pub fn release(&self) -> Result<()> {
        debug!(worker = %self.name, "releasing worker session");
        self.heartbeat_cancel.cancel();
        self.context.dispose();
        self.primary.post_send(ServerRequest::StopWorker {
            worker_id: self.name.clone(),
        })
    }
}

async fn auth_refresh_loop(
    context: Weak<SessionContext>,
    interval: Duration,
    listener: Arc<dyn ClientListener>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the token is fresh at login.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(context) = context.upgrade() else { break };
                if context.is_disposed() {
                    break;
                }
                match context.invoke_request(ServerRequest::RefreshAuthToken).await {
                    Ok(ServerReply::Ack) => {
                        debug!("auth token refreshed");
                        listener.on_token_refreshed();
                    }
                    Ok(other) => {
                        let err = DeephavenErrorHelper::invalid_state()
                            .message(format!("unexpected refresh reply {other:?}"));
                        warn!(error = %err, "auth refresh failed");
                        listener.on_error(&err);
                    }
                    Err(err) => {
                        warn!(error = %err, "auth refresh failed");
                        listener.on_error(&err);
                    }
                }
            }
        }
    }
}

async fn heartbeat_loop(
    context: Weak<SessionContext>,
    worker: String,
    interval: Duration,
    listener: Arc<dyn WorkerListener>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(context) = context.upgrade() else { break };
                if context.is_disposed() {
                    break;
                }
                if *context.closed().borrow() {
                    listener.on_closed(&worker);
                    break;
                }
                if context.last_ping_elapsed() > interval * 3 {
                    let err = DeephavenErrorHelper::timeout()
                        .message(format!("worker '{worker}' missed 3 heartbeat intervals"));
                    error!(worker = %worker, "watchdog expired, disposing session");
                    listener.on_error(&worker, &err);
                    listener.on_closed(&worker);
                    context.dispose();
                    break;
                }
                if let Err(err) = context.post_send(ServerRequest::Ping) {
                    error!(worker = %worker, error = %err, "heartbeat send failed");
                    listener.on_error(&worker, &err);
                    listener.on_closed(&worker);
                    context.dispose();
                    break;
                }
            }
        }
    }
}
