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

//! Operation descriptors for table-producing transforms.
//!
//! These describe WHAT the server should compute; the semantics of the
//! computation belong to the server. Source tables are referenced by their
//! client-assigned handle ids.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub column: String,
    pub direction: SortDirection,
}

impl SortDescriptor {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Natural,
    Exact,
    Left,
    AsOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateOp {
    Sum,
    Min,
    Max,
    Avg,
    Count,
    First,
    Last,
    Std,
    Var,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateDescriptor {
    pub op: AggregateOp,
    pub column: String,
}

impl AggregateDescriptor {
    pub fn new(op: AggregateOp, column: impl Into<String>) -> Self {
        Self {
            op,
            column: column.into(),
        }
    }
}

/// A table-producing transform, shipped to the server in a batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableOperation {
    Where {
        filters: Vec<String>,
    },
    Select {
        columns: Vec<String>,
    },
    Update {
        columns: Vec<String>,
    },
    View {
        columns: Vec<String>,
    },
    DropColumns {
        columns: Vec<String>,
    },
    Sort {
        sorts: Vec<SortDescriptor>,
    },
    Head {
        rows: i64,
    },
    Tail {
        rows: i64,
    },
    Join {
        kind: JoinKind,
        right_id: i64,
        on: Vec<String>,
        joins: Vec<String>,
    },
    Aggregate {
        aggregates: Vec<AggregateDescriptor>,
        group_by: Vec<String>,
    },
    Merge {
        source_ids: Vec<i64>,
    },
    Snapshot {
        trigger_id: i64,
        stamp_columns: Vec<String>,
        do_initial: bool,
    },
    Freeze,
    Ungroup {
        columns: Vec<String>,
    },
}

impl TableOperation {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            TableOperation::Where { .. } => "where",
            TableOperation::Select { .. } => "select",
            TableOperation::Update { .. } => "update",
            TableOperation::View { .. } => "view",
            TableOperation::DropColumns { .. } => "drop_columns",
            TableOperation::Sort { .. } => "sort",
            TableOperation::Head { .. } => "head",
            TableOperation::Tail { .. } => "tail",
            TableOperation::Join { .. } => "join",
            TableOperation::Aggregate { .. } => "aggregate",
            TableOperation::Merge { .. } => "merge",
            TableOperation::Snapshot { .. } => "snapshot",
            TableOperation::Freeze => "freeze",
            TableOperation::Ungroup { .. } => "ungroup",
        }
    }
}
