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
use crate::query::QueryTable;
use crate::session::SessionContext;
use crate::state::TableScope;
use crate::transport::ServerRequest;
use std::sync::Arc;

/// A user-facing disposal domain for query tables.
///
/// Every table obtained through this scope carries a claim registered here;
/// `dispose` detaches them all in one sweep.
#[derive(Debug)]
pub struct QueryScope {
    context: Arc<SessionContext>,
    scope: Arc<TableScope>,
}

impl QueryScope {
    pub fn new(context: Arc<SessionContext>) -> Self {
        Self {
            context,
            scope: TableScope::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.scope.id()
    }

    pub fn is_disposed(&self) -> bool {
        self.scope.is_disposed()
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    /// Bind a named server table into this scope. The returned table is
    /// unresolved until the server replies.
    pub fn fetch_table(&self, name: impl Into<String>) -> Result<QueryTable> {
        let name = name.into();
        let state = self
            .context
            .invoke_for_definition(&[], |result_id| ServerRequest::FetchTable {
                name,
                result_id,
            })?;
        Ok(QueryTable::wrap(
            Arc::clone(&self.context),
            Arc::clone(&self.scope),
            state,
        ))
    }

    /// Take an additional claim on `table`'s state, owned by this scope.
    pub fn manage(&self, table: &QueryTable) -> QueryTable {
        QueryTable::wrap(
            Arc::clone(&self.context),
            Arc::clone(&self.scope),
            Arc::clone(table.state()),
        )
    }

    /// Detach every claim owned by this scope. Idempotent.
    pub fn dispose(&self) {
        self.scope.dispose();
    }
}
