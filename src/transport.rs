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

//! The black-box server transport.
//!
//! The wire protocol, message encoding, and websocket plumbing live behind
//! [`ServerTransport`]. The client only relies on the request shapes below:
//!
//! - `send`: ordered fire-and-forget write.
//! - `invoke`: direct-callback shape. Awaiting `invoke` means the request is
//!   on the wire; the returned oneshot receiver resolves with the dedicated
//!   success/failure reply for that request. A dropped sender is a transport
//!   error.
//! - `send_batch`: batch shape. The synchronous acknowledgment may carry
//!   inline failures; otherwise the real result arrives later as an
//!   out-of-band [`ServerEvent::ExportCreated`] keyed by handle id.
//! - `release`: fire-and-forget server-side disposal of one handle.
//!
//! Push notifications reach the client as a plain
//! `mpsc::UnboundedReceiver<ServerEvent>` handed to
//! [`SessionContext::attach`](crate::session::SessionContext::attach) — one
//! sequential event queue per connection, consumed in receipt order.

use crate::error::Result;
use crate::types::{RowRange, TableDefinition, TableOperation, TableSnapshot, TableUpdate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

/// Receiver half of a direct-callback reply channel.
pub type ReplyReceiver = oneshot::Receiver<Result<ServerReply>>;

/// Requests with the `send`/`invoke` shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerRequest {
    /// Bind a named server table to a fresh client handle.
    FetchTable { name: String, result_id: i64 },
    /// Retrieve a snapshot of a row range over a column subset.
    GetTableData {
        table_id: i64,
        rows: RowRange,
        columns: Vec<String>,
    },
    /// Start pushing incremental updates for a viewport.
    Subscribe {
        table_id: i64,
        rows: RowRange,
        columns: Vec<String>,
    },
    /// Change the viewport of an existing subscription.
    UpdateSubscription {
        table_id: i64,
        rows: RowRange,
        columns: Vec<String>,
    },
    /// Stop pushing updates for a table.
    Unsubscribe { table_id: i64 },
    /// Renew the session auth token.
    RefreshAuthToken,
    /// Keepalive for the worker watchdog.
    Ping,
    /// Ask the primary server to stop a worker process.
    StopWorker { worker_id: String },
}

/// Successful resolution of a table-producing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionReply {
    /// Server-assigned id for the handle named in the request.
    pub server_id: i64,
    pub definition: TableDefinition,
}

/// Reply delivered on a direct-callback channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerReply {
    Definition(DefinitionReply),
    TableData(TableSnapshot),
    Ack,
}

/// A batch request: one table-producing operation applied to source handles,
/// producing the table bound to `result_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub result_id: i64,
    pub source_ids: Vec<i64>,
    pub operation: TableOperation,
}

/// One inline failure in a batch acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub result_id: i64,
    pub message: String,
}

/// Synchronous acknowledgment of a batch request. Empty `failures` means
/// success is implied and the definition follows out-of-band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAck {
    pub failures: Vec<BatchFailure>,
}

impl BatchAck {
    /// An acknowledgment with no inline failures.
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(result_id: i64, message: impl Into<String>) -> Self {
        Self {
            failures: vec![BatchFailure {
                result_id,
                message: message.into(),
            }],
        }
    }

    pub fn failure_for(&self, result_id: i64) -> Option<&BatchFailure> {
        self.failures.iter().find(|f| f.result_id == result_id)
    }
}

/// Push notifications from the server, delivered in receipt order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// Out-of-band resolution of a batch-created table.
    ExportCreated {
        client_id: i64,
        server_id: i64,
        definition: TableDefinition,
    },
    /// Out-of-band failure of a batch-created table.
    ExportFailed { client_id: i64, message: String },
    /// Incremental delta for a subscribed table.
    Update { client_id: i64, update: TableUpdate },
    /// Full snapshot for a subscribed table.
    Snapshot {
        client_id: i64,
        snapshot: TableSnapshot,
    },
    /// The connection closed.
    Closed { code: u16, reason: String },
    /// Server keepalive.
    Ping,
}

/// Abstract interface to one remote server connection.
///
/// Implementations own the websocket, the message encoding, and the reply
/// correlation; the session layer guarantees that all calls for one
/// connection are issued from a single task, in order.
#[async_trait]
pub trait ServerTransport: Send + Sync + fmt::Debug {
    /// Write a fire-and-forget request. Delivery is ordered with respect to
    /// other calls on this transport.
    async fn send(&self, request: ServerRequest) -> Result<()>;

    /// Write a request that has a dedicated reply channel. Returns once the
    /// request is on the wire; the receiver resolves with the reply.
    async fn invoke(&self, request: ServerRequest) -> Result<ReplyReceiver>;

    /// Write a batch request and wait for its synchronous acknowledgment.
    async fn send_batch(&self, request: BatchRequest) -> Result<BatchAck>;

    /// Queue server-side disposal of one handle.
    async fn release(&self, handle_id: i64) -> Result<()>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_ack_failure_lookup() {
        let ack = BatchAck::failed(3, "bad filter");
        assert!(ack.failure_for(3).is_some());
        assert!(ack.failure_for(4).is_none());
        assert_eq!(ack.failure_for(3).unwrap().message, "bad filter");

        assert!(BatchAck::ok().failure_for(3).is_none());
    }

    #[test]
    fn test_request_serializes() {
        let request = ServerRequest::GetTableData {
            table_id: 5,
            rows: RowRange::new(0, 99),
            columns: vec!["sym".into()],
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: ServerRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
