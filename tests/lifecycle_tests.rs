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

//! End-to-end lifetime scenarios: claims, scopes, and handle release.

mod common;

use common::{session, settle, trades_definition};
use deephaven_client::{QueryScope, ServerEvent};
use std::sync::Arc;

#[tokio::test]
async fn test_release_fires_once_after_last_claim() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    settle().await;
    s.transport.answer_definition(100, trades_definition());
    settle().await;
    assert!(s.transport.released().is_empty());

    table.dispose();
    table.dispose();
    settle().await;
    assert_eq!(s.transport.released(), vec![100]);

    // The scope's claim was already detached; nothing fires twice.
    scope.dispose();
    settle().await;
    assert_eq!(s.transport.released(), vec![100]);
}

#[tokio::test]
async fn test_dependents_pinned_while_batch_in_flight() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    settle().await;
    s.transport.answer_definition(100, trades_definition());
    settle().await;

    let derived = table.head(5).unwrap();
    table.dispose();
    settle().await;
    // The in-flight batch still claims the parent.
    assert!(s.transport.released().is_empty());

    s.events
        .send(ServerEvent::ExportCreated {
            client_id: derived.client_id(),
            server_id: 101,
            definition: trades_definition(),
        })
        .unwrap();
    settle().await;
    // Batch completion dropped the last claim on the parent.
    assert_eq!(s.transport.released(), vec![100]);

    scope.dispose();
    settle().await;
    let mut released = s.transport.released();
    released.sort_unstable();
    assert_eq!(released, vec![100, 101]);
}

#[tokio::test]
async fn test_scope_dispose_cascades_without_double_release() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    settle().await;
    s.transport.answer_definition(100, trades_definition());
    settle().await;

    let managed = scope.manage(&table);
    scope.dispose();
    settle().await;
    assert_eq!(s.transport.released(), vec![100]);

    // Re-disposing the scope or the individual claims changes nothing.
    scope.dispose();
    table.dispose();
    managed.dispose();
    settle().await;
    assert_eq!(s.transport.released(), vec![100]);
}

#[tokio::test]
async fn test_dropping_table_detaches_claim() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    {
        let _table = scope.fetch_table("trades").unwrap();
        settle().await;
        s.transport.answer_definition(100, trades_definition());
        settle().await;
        assert!(s.transport.released().is_empty());
    }
    settle().await;
    assert_eq!(s.transport.released(), vec![100]);
}

#[tokio::test]
async fn test_chain_releases_each_handle_once() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    settle().await;
    s.transport.answer_definition(100, trades_definition());

    let filtered = table.where_(&["price > 10"]).unwrap();
    let top = filtered.head(10).unwrap();
    settle().await;

    for (derived, server_id) in [(&filtered, 101), (&top, 102)] {
        s.events
            .send(ServerEvent::ExportCreated {
                client_id: derived.client_id(),
                server_id,
                definition: trades_definition(),
            })
            .unwrap();
    }
    settle().await;
    assert!(s.transport.released().is_empty());

    scope.dispose();
    settle().await;
    let mut released = s.transport.released();
    released.sort_unstable();
    assert_eq!(released, vec![100, 101, 102]);
}

#[tokio::test]
async fn test_state_survives_intermediate_scope_disposal() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    settle().await;
    s.transport.answer_definition(100, trades_definition());
    settle().await;

    let (scope1, table1) = table.new_scope();
    let (scope2, table2) = table1.new_scope();
    scope.dispose();
    scope1.dispose();
    settle().await;
    // The innermost scope still claims the shared state.
    assert!(s.transport.released().is_empty());
    assert_eq!(table2.server_id(), Some(100));

    // Data access through the surviving claim still works.
    let transport = Arc::clone(&s.transport);
    tokio::spawn(async move {
        settle().await;
        transport.answer(Ok(deephaven_client::ServerReply::TableData(
            deephaven_client::TableSnapshot {
                rows: deephaven_client::RowRange::new(0, 0),
                columns: vec![],
            },
        )));
    });
    let snapshot = table2
        .get_table_data(deephaven_client::RowRange::new(0, 0), &["sym"], None)
        .await
        .unwrap();
    assert_eq!(snapshot.rows.len(), 1);

    scope2.dispose();
    settle().await;
    assert_eq!(s.transport.released(), vec![100]);
}
