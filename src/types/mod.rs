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

//! Wire-facing data model: table shapes, row data, and operation
//! descriptors. All types are serde-derived so a transport implementation
//! can put them on the wire; the encoding itself is the transport's concern.

pub mod ops;
pub mod table;

pub use ops::{
    AggregateDescriptor, AggregateOp, JoinKind, SortDescriptor, SortDirection, TableOperation,
};
pub use table::{
    CellValue, ColumnData, ColumnDefinition, ColumnType, RowRange, TableDefinition, TableSnapshot,
    TableUpdate,
};
