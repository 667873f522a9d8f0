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

//! Client library for a remote Deephaven-style tabular query server.
//!
//! The crate opens sessions over an established connection (supplied as a
//! [`ServerTransport`](transport::ServerTransport) plus an event stream),
//! issues table-producing operations against remote tables, and streams
//! snapshots and incremental updates back.
//!
//! Remote tables are reference counted on the client: every
//! [`QueryTable`](query::QueryTable) holds a claim in a scope, and when the
//! last claim on a table's state detaches, the server-side handle is
//! released exactly once. All outgoing requests for one session travel a
//! single serialized stream, so issuance order equals wire order.
//!
//! ```ignore
//! let client = Client::login(transport, events, ClientConfig::default(), listener);
//! let scope = client.new_scope();
//! let trades = scope.fetch_table("trades")?;
//! let top = trades.where_(&["price > 10"])?.sort_descending(&["size"])?.head(100)?;
//! let definition = top.await_definition(Some(Duration::from_secs(30))).await?;
//! let data = top.get_table_data(RowRange::new(0, 99), &["sym", "price"], None).await?;
//! scope.dispose();
//! ```
//!
//! Configuration keys accepted by [`ClientConfig::set_option`](config::ClientConfig::set_option):
//!
//! | Key | Meaning | Default |
//! |-----|---------|---------|
//! | `deephaven.auth_refresh_secs` | Auth token refresh interval | 300 |
//! | `deephaven.heartbeat_secs` | Worker heartbeat interval | 10 |
//! | `deephaven.timeout_ms` | Wait budget for calls with no explicit timeout | 60000 |
//! | `deephaven.log_level` | Log filter (`RUST_LOG` syntax, `off` disables) | `warn` |
//! | `deephaven.log_file` | Log destination file (stderr when unset) | unset |

pub mod client;
pub mod config;
pub mod error;
mod logging;
pub mod query;
pub mod session;
pub mod state;
pub mod transport;
pub mod types;

pub use client::{Client, ClientListener, WorkerListener, WorkerSession};
pub use config::ClientConfig;
pub use error::{DeephavenErrorHelper, Error, Result, Status};
pub use logging::LogConfig;
pub use query::{QueryScope, QueryTable};
pub use session::SessionContext;
pub use state::{Resolution, StateSnapshot, StateUpdate, TableScope, TableState, TableTracker};
pub use transport::{
    BatchAck, BatchFailure, BatchRequest, DefinitionReply, ReplyReceiver, ServerEvent,
    ServerReply, ServerRequest, ServerTransport,
};
pub use types::{
    AggregateDescriptor, AggregateOp, CellValue, ColumnData, ColumnDefinition, ColumnType,
    JoinKind, RowRange, SortDescriptor, SortDirection, TableDefinition, TableOperation,
    TableSnapshot, TableUpdate,
};
