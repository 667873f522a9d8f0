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

//! Table shapes and row data as delivered by the server.

use serde::{Deserialize, Serialize};

/// Column data types supported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    Int32,
    Int64,
    Double,
    String,
    Timestamp,
}

/// One column of a resolved table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: ColumnType,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// The resolved shape of a remote table: its columns and current size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub columns: Vec<ColumnDefinition>,
    pub size: i64,
}

impl TableDefinition {
    pub fn new(columns: Vec<ColumnDefinition>, size: i64) -> Self {
        Self { columns, size }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// An inclusive range of row positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub first: i64,
    pub last: i64,
}

impl RowRange {
    pub fn new(first: i64, last: i64) -> Self {
        Self { first, last }
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    pub fn len(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.last - self.first + 1
        }
    }

    pub fn contains(&self, row: i64) -> bool {
        row >= self.first && row <= self.last
    }
}

/// One cell value in a snapshot or delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
}

/// One column's worth of values for a row range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnData {
    pub name: String,
    pub values: Vec<CellValue>,
}

/// A consistent snapshot of a row range across a column subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub rows: RowRange,
    pub columns: Vec<ColumnData>,
}

/// An incremental delta pushed by the server for a subscribed table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableUpdate {
    /// Rows added by this delta, if any.
    pub added: Option<RowRange>,
    /// Rows removed by this delta, if any.
    pub removed: Option<RowRange>,
    /// Column data for the added/modified rows.
    pub columns: Vec<ColumnData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_range() {
        let range = RowRange::new(0, 9);
        assert_eq!(range.len(), 10);
        assert!(range.contains(0));
        assert!(range.contains(9));
        assert!(!range.contains(10));
        assert!(!range.is_empty());

        let empty = RowRange::new(5, 4);
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
    }

    #[test]
    fn test_definition_lookup() {
        let def = TableDefinition::new(
            vec![
                ColumnDefinition::new("sym", ColumnType::String),
                ColumnDefinition::new("price", ColumnType::Double),
            ],
            100,
        );
        assert_eq!(def.column("price").unwrap().data_type, ColumnType::Double);
        assert!(def.column("missing").is_none());
        assert_eq!(def.column_names(), vec!["sym", "price"]);
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let snapshot = TableSnapshot {
            rows: RowRange::new(0, 1),
            columns: vec![ColumnData {
                name: "sym".to_string(),
                values: vec![CellValue::Str("AAPL".into()), CellValue::Null],
            }],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: TableSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
