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

//! Completion-protocol scenarios: ordering, batch acks, races, timeouts.

mod common;

use common::{session, session_with, settle, trades_definition};
use deephaven_client::{
    CellValue, ClientConfig, ColumnData, QueryScope, Resolution, RowRange, ServerEvent,
    ServerReply, Status, TableSnapshot,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_issuance_order_is_wire_order() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    let _derived = table.head(5).unwrap();
    table
        .subscribe(RowRange::new(0, 9), &["sym"])
        .unwrap();
    table.unsubscribe().unwrap();
    settle().await;

    assert_eq!(
        s.transport.order(),
        vec![
            "invoke:fetch_table",
            "batch:head",
            "send:subscribe",
            "send:unsubscribe",
        ]
    );
}

#[tokio::test]
async fn test_definition_close_race_completes_once() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    settle().await;
    s.transport.answer_definition(100, trades_definition());

    let derived = table.head(5).unwrap();
    settle().await;
    // The definition and the close land back to back; only the first
    // completion of the watcher takes effect.
    s.events
        .send(ServerEvent::ExportCreated {
            client_id: derived.client_id(),
            server_id: 101,
            definition: trades_definition(),
        })
        .unwrap();
    s.events
        .send(ServerEvent::Closed {
            code: 1006,
            reason: "gone".into(),
        })
        .unwrap();
    settle().await;

    let definition = derived.await_definition(None).await.unwrap();
    assert_eq!(definition.size, 1_000);
    assert_eq!(derived.server_id(), Some(101));
}

#[tokio::test]
async fn test_close_fails_unresolved_tables() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    let derived = table.head(5).unwrap();
    settle().await;

    s.events
        .send(ServerEvent::Closed {
            code: 1001,
            reason: "server going away".into(),
        })
        .unwrap();
    settle().await;

    for t in [&table, &derived] {
        let err = t.await_definition(None).await.unwrap_err();
        assert_eq!(err.status, Status::Transport);
        assert!(err.message.contains("server going away"));
    }
    let mut closed = s.context.closed();
    closed.wait_for(|c| *c).await.unwrap();
}

#[tokio::test]
async fn test_inline_batch_failure_short_circuits() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    settle().await;
    s.transport.answer_definition(100, trades_definition());

    s.transport.fail_next_batch("unknown column 'prce'");
    let derived = table.where_(&["prce > 10"]).unwrap();
    let err = derived.await_definition(None).await.unwrap_err();
    assert_eq!(err.status, Status::Server);
    assert!(err.message.contains("unknown column"));

    // The watcher was deregistered; a stray definition changes nothing.
    s.events
        .send(ServerEvent::ExportCreated {
            client_id: derived.client_id(),
            server_id: 999,
            definition: trades_definition(),
        })
        .unwrap();
    settle().await;
    assert_eq!(derived.server_id(), None);
    assert!(matches!(derived.resolution(), Resolution::Failed(_)));
}

#[tokio::test]
async fn test_timeout_does_not_cancel_request() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();

    let err = table
        .await_definition(Some(Duration::from_millis(30)))
        .await
        .unwrap_err();
    assert_eq!(err.status, Status::Timeout);

    // The reply lands after the local timeout and still resolves the state.
    s.transport.answer_definition(100, trades_definition());
    let definition = table.await_definition(None).await.unwrap();
    assert_eq!(definition.size, 1_000);
    assert_eq!(table.server_id(), Some(100));
}

#[tokio::test]
async fn test_configured_default_bounds_unqualified_wait() {
    let mut config = ClientConfig::default();
    config.default_timeout = Duration::from_millis(40);
    let s = session_with(config);
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();

    // No reply is ever answered; the configured default must bound the wait.
    let err = table.await_definition(None).await.unwrap_err();
    assert_eq!(err.status, Status::Timeout);

    // An explicit budget still takes precedence over the default.
    s.transport.answer_definition(100, trades_definition());
    let definition = table
        .await_definition(Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(definition.size, 1_000);
}

#[tokio::test]
async fn test_get_table_data_round_trip() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    settle().await;
    s.transport.answer_definition(100, trades_definition());

    let transport = Arc::clone(&s.transport);
    tokio::spawn(async move {
        // Answer the data request once it reaches the transport.
        tokio::time::sleep(Duration::from_millis(30)).await;
        transport.answer(Ok(ServerReply::TableData(TableSnapshot {
            rows: RowRange::new(0, 1),
            columns: vec![ColumnData {
                name: "sym".into(),
                values: vec![CellValue::Str("AAPL".into()), CellValue::Str("MSFT".into())],
            }],
        })));
    });

    let snapshot = table
        .get_table_data(RowRange::new(0, 1), &["sym"], None)
        .await
        .unwrap();
    assert_eq!(snapshot.rows.len(), 2);
    assert_eq!(snapshot.columns[0].name, "sym");
}

#[tokio::test]
async fn test_updates_routed_after_resolution() {
    let s = session();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let table = scope.fetch_table("trades").unwrap();
    settle().await;

    let mut updates = table.subscribe(RowRange::new(0, 9), &["sym"]).unwrap();
    // Unresolved table: the pushed update is dropped.
    s.events
        .send(ServerEvent::Update {
            client_id: table.client_id(),
            update: deephaven_client::TableUpdate {
                added: Some(RowRange::new(0, 0)),
                removed: None,
                columns: vec![],
            },
        })
        .unwrap();
    settle().await;
    assert!(updates.try_recv().is_err());

    s.transport.answer_definition(100, trades_definition());
    settle().await;
    s.events
        .send(ServerEvent::Update {
            client_id: table.client_id(),
            update: deephaven_client::TableUpdate {
                added: Some(RowRange::new(0, 0)),
                removed: None,
                columns: vec![],
            },
        })
        .unwrap();
    settle().await;
    let update = updates.try_recv().unwrap();
    assert_eq!(update.definition.size, 1_000);
    assert_eq!(update.update.added, Some(RowRange::new(0, 0)));
}

#[tokio::test]
async fn test_allocation_fails_after_dispose() {
    let s = session();
    s.context.dispose();
    let scope = QueryScope::new(Arc::clone(&s.context));
    let err = scope.fetch_table("trades").unwrap_err();
    assert_eq!(err.status, Status::Disposed);
}
