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
use crate::query::QueryScope;
use crate::session::SessionContext;
use crate::state::{
    Resolution, StateSnapshot, StateUpdate, TableScope, TableState, TableTracker,
};
use crate::transport::ServerRequest;
use crate::types::{
    AggregateDescriptor, JoinKind, RowRange, SortDescriptor, TableDefinition, TableOperation,
    TableSnapshot,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A handle on one remote table, claimed in a scope.
///
/// Table-producing methods return immediately with a new unresolved table;
/// the request travels on the owning context's serialized stream and the
/// resolution arrives later. Derived tables live in the same scope as their
/// parent.
#[derive(Debug)]
pub struct QueryTable {
    context: Arc<SessionContext>,
    scope: Arc<TableScope>,
    state: Arc<TableState>,
    tracker: Arc<TableTracker>,
}

impl QueryTable {
    pub(crate) fn wrap(
        context: Arc<SessionContext>,
        scope: Arc<TableScope>,
        state: Arc<TableState>,
    ) -> Self {
        let tracker = TableTracker::create(&scope, Arc::clone(&state));
        Self {
            context,
            scope,
            state,
            tracker,
        }
    }

    pub fn client_id(&self) -> i64 {
        self.state.client_id()
    }

    pub fn server_id(&self) -> Option<i64> {
        self.state.server_id()
    }

    pub fn resolution(&self) -> Resolution {
        self.state.resolution()
    }

    pub(crate) fn state(&self) -> &Arc<TableState> {
        &self.state
    }

    /// Wait until the server has resolved this table's definition. `None`
    /// falls back to the configured default timeout.
    pub async fn await_definition(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Arc<TableDefinition>> {
        let limit = timeout.unwrap_or(self.context.default_timeout());
        self.state.await_definition(Some(limit)).await
    }

    fn derive(&self, extras: &[&QueryTable], operation: TableOperation) -> Result<QueryTable> {
        let mut dependents: Vec<Arc<TableState>> = Vec::with_capacity(extras.len() + 1);
        dependents.push(Arc::clone(&self.state));
        dependents.extend(extras.iter().map(|t| Arc::clone(&t.state)));
        let state = self.context.invoke_for_batch(&dependents, operation)?;
        Ok(Self::wrap(
            Arc::clone(&self.context),
            Arc::clone(&self.scope),
            state,
        ))
    }

    pub fn where_(&self, filters: &[&str]) -> Result<QueryTable> {
        self.derive(
            &[],
            TableOperation::Where {
                filters: strings(filters),
            },
        )
    }

    pub fn select(&self, columns: &[&str]) -> Result<QueryTable> {
        self.derive(
            &[],
            TableOperation::Select {
                columns: strings(columns),
            },
        )
    }

    pub fn update(&self, columns: &[&str]) -> Result<QueryTable> {
        self.derive(
            &[],
            TableOperation::Update {
                columns: strings(columns),
            },
        )
    }

    pub fn view(&self, columns: &[&str]) -> Result<QueryTable> {
        self.derive(
            &[],
            TableOperation::View {
                columns: strings(columns),
            },
        )
    }

    pub fn drop_columns(&self, columns: &[&str]) -> Result<QueryTable> {
        self.derive(
            &[],
            TableOperation::DropColumns {
                columns: strings(columns),
            },
        )
    }

    pub fn sort(&self, columns: &[&str]) -> Result<QueryTable> {
        self.derive(
            &[],
            TableOperation::Sort {
                sorts: columns.iter().map(|c| SortDescriptor::ascending(*c)).collect(),
            },
        )
    }

    pub fn sort_descending(&self, columns: &[&str]) -> Result<QueryTable> {
        self.derive(
            &[],
            TableOperation::Sort {
                sorts: columns
                    .iter()
                    .map(|c| SortDescriptor::descending(*c))
                    .collect(),
            },
        )
    }

    pub fn head(&self, rows: i64) -> Result<QueryTable> {
        self.derive(&[], TableOperation::Head { rows })
    }

    pub fn tail(&self, rows: i64) -> Result<QueryTable> {
        self.derive(&[], TableOperation::Tail { rows })
    }

    fn join(
        &self,
        kind: JoinKind,
        right: &QueryTable,
        on: &[&str],
        joins: &[&str],
    ) -> Result<QueryTable> {
        self.derive(
            &[right],
            TableOperation::Join {
                kind,
                right_id: right.client_id(),
                on: strings(on),
                joins: strings(joins),
            },
        )
    }

    pub fn natural_join(
        &self,
        right: &QueryTable,
        on: &[&str],
        joins: &[&str],
    ) -> Result<QueryTable> {
        self.join(JoinKind::Natural, right, on, joins)
    }

    pub fn exact_join(
        &self,
        right: &QueryTable,
        on: &[&str],
        joins: &[&str],
    ) -> Result<QueryTable> {
        self.join(JoinKind::Exact, right, on, joins)
    }

    pub fn left_join(&self, right: &QueryTable, on: &[&str], joins: &[&str]) -> Result<QueryTable> {
        self.join(JoinKind::Left, right, on, joins)
    }

    pub fn as_of_join(
        &self,
        right: &QueryTable,
        on: &[&str],
        joins: &[&str],
    ) -> Result<QueryTable> {
        self.join(JoinKind::AsOf, right, on, joins)
    }

    pub fn aggregate(
        &self,
        aggregates: &[AggregateDescriptor],
        group_by: &[&str],
    ) -> Result<QueryTable> {
        self.derive(
            &[],
            TableOperation::Aggregate {
                aggregates: aggregates.to_vec(),
                group_by: strings(group_by),
            },
        )
    }

    /// Merge this table with `others` into one table. All inputs are kept
    /// alive until the merge resolves.
    pub fn merge(&self, others: &[&QueryTable]) -> Result<QueryTable> {
        let mut source_ids = vec![self.client_id()];
        source_ids.extend(others.iter().map(|t| t.client_id()));
        self.derive(others, TableOperation::Merge { source_ids })
    }

    pub fn snapshot_when(
        &self,
        trigger: &QueryTable,
        stamp_columns: &[&str],
        do_initial: bool,
    ) -> Result<QueryTable> {
        self.derive(
            &[trigger],
            TableOperation::Snapshot {
                trigger_id: trigger.client_id(),
                stamp_columns: strings(stamp_columns),
                do_initial,
            },
        )
    }

    pub fn freeze(&self) -> Result<QueryTable> {
        self.derive(&[], TableOperation::Freeze)
    }

    pub fn ungroup(&self, columns: &[&str]) -> Result<QueryTable> {
        self.derive(
            &[],
            TableOperation::Ungroup {
                columns: strings(columns),
            },
        )
    }

    /// Fetch a snapshot of `rows` over `columns`. `None` falls back to the
    /// configured default timeout; a timeout abandons the wait but never
    /// cancels the request on the server.
    pub async fn get_table_data(
        &self,
        rows: RowRange,
        columns: &[&str],
        timeout: Option<Duration>,
    ) -> Result<TableSnapshot> {
        self.context
            .invoke_for_data(
                &[Arc::clone(&self.state)],
                ServerRequest::GetTableData {
                    table_id: self.client_id(),
                    rows,
                    columns: strings(columns),
                },
                timeout,
            )
            .await
    }

    /// Ask the server to push incremental updates for a viewport. Updates
    /// arriving before the table resolves are dropped.
    pub fn subscribe(
        &self,
        rows: RowRange,
        columns: &[&str],
    ) -> Result<mpsc::UnboundedReceiver<StateUpdate>> {
        let receiver = self.state.subscribe_updates();
        self.context.post_send(ServerRequest::Subscribe {
            table_id: self.client_id(),
            rows,
            columns: strings(columns),
        })?;
        Ok(receiver)
    }

    pub fn update_subscription(&self, rows: RowRange, columns: &[&str]) -> Result<()> {
        self.context.post_send(ServerRequest::UpdateSubscription {
            table_id: self.client_id(),
            rows,
            columns: strings(columns),
        })
    }

    pub fn unsubscribe(&self) -> Result<()> {
        self.context.post_send(ServerRequest::Unsubscribe {
            table_id: self.client_id(),
        })
    }

    /// Listen for full snapshots pushed for this table.
    pub fn snapshots(&self) -> mpsc::UnboundedReceiver<StateSnapshot> {
        self.state.subscribe_snapshots()
    }

    /// Claim this table under a fresh scope, independent of the current one.
    pub fn new_scope(&self) -> (QueryScope, QueryTable) {
        let scope = QueryScope::new(Arc::clone(&self.context));
        let table = scope.manage(self);
        (scope, table)
    }

    /// Detach this table's claim. Idempotent; dropping the table has the
    /// same effect.
    pub fn dispose(&self) {
        self.tracker.dispose();
    }
}
