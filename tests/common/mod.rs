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

#![allow(dead_code)]

use async_trait::async_trait;
use deephaven_client::{
    BatchAck, BatchRequest, ClientConfig, ColumnDefinition, ColumnType, DefinitionReply,
    ReplyReceiver, Result, ServerEvent, ServerReply, ServerRequest, ServerTransport,
    SessionContext, TableDefinition,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Transport double that records every call in wire order and parks invoke
/// replies until the test answers them.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    /// Wire-order log, one entry per call.
    pub order: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<ServerRequest>>,
    pub batches: Mutex<Vec<BatchRequest>>,
    pub released: Mutex<Vec<i64>>,
    /// Scripted acknowledgments for upcoming batches; `Some(message)` makes
    /// the next batch fail inline for its own result id.
    pub batch_failures: Mutex<VecDeque<Option<String>>>,
    pub reply_senders: Mutex<Vec<oneshot::Sender<Result<ServerReply>>>>,
}

fn request_kind(request: &ServerRequest) -> &'static str {
    match request {
        ServerRequest::FetchTable { .. } => "fetch_table",
        ServerRequest::GetTableData { .. } => "get_table_data",
        ServerRequest::Subscribe { .. } => "subscribe",
        ServerRequest::UpdateSubscription { .. } => "update_subscription",
        ServerRequest::Unsubscribe { .. } => "unsubscribe",
        ServerRequest::RefreshAuthToken => "refresh_auth_token",
        ServerRequest::Ping => "ping",
        ServerRequest::StopWorker { .. } => "stop_worker",
    }
}

impl RecordingTransport {
    pub fn order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }

    pub fn released(&self) -> Vec<i64> {
        self.released.lock().unwrap().clone()
    }

    /// Answer the oldest unanswered invoke with a resolved definition.
    pub fn answer_definition(&self, server_id: i64, definition: TableDefinition) {
        let sender = self.reply_senders.lock().unwrap().remove(0);
        sender
            .send(Ok(ServerReply::Definition(DefinitionReply {
                server_id,
                definition,
            })))
            .unwrap();
    }

    /// Answer the oldest unanswered invoke with an arbitrary reply.
    pub fn answer(&self, reply: Result<ServerReply>) {
        let sender = self.reply_senders.lock().unwrap().remove(0);
        sender.send(reply).unwrap();
    }

    pub fn fail_next_batch(&self, message: impl Into<String>) {
        self.batch_failures
            .lock()
            .unwrap()
            .push_back(Some(message.into()));
    }
}

#[async_trait]
impl ServerTransport for RecordingTransport {
    async fn send(&self, request: ServerRequest) -> Result<()> {
        self.order
            .lock()
            .unwrap()
            .push(format!("send:{}", request_kind(&request)));
        self.sent.lock().unwrap().push(request);
        Ok(())
    }

    async fn invoke(&self, request: ServerRequest) -> Result<ReplyReceiver> {
        self.order
            .lock()
            .unwrap()
            .push(format!("invoke:{}", request_kind(&request)));
        self.sent.lock().unwrap().push(request);
        let (tx, rx) = oneshot::channel();
        self.reply_senders.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn send_batch(&self, request: BatchRequest) -> Result<BatchAck> {
        self.order
            .lock()
            .unwrap()
            .push(format!("batch:{}", request.operation.kind()));
        let result_id = request.result_id;
        self.batches.lock().unwrap().push(request);
        let scripted = self.batch_failures.lock().unwrap().pop_front().flatten();
        Ok(match scripted {
            Some(message) => BatchAck::failed(result_id, message),
            None => BatchAck::ok(),
        })
    }

    async fn release(&self, handle_id: i64) -> Result<()> {
        self.order
            .lock()
            .unwrap()
            .push(format!("release:{handle_id}"));
        self.released.lock().unwrap().push(handle_id);
        Ok(())
    }
}

pub struct Session {
    pub transport: Arc<RecordingTransport>,
    pub context: Arc<SessionContext>,
    pub events: mpsc::UnboundedSender<ServerEvent>,
}

pub fn session() -> Session {
    session_with(ClientConfig::default())
}

pub fn session_with(config: ClientConfig) -> Session {
    let transport = Arc::new(RecordingTransport::default());
    let (events, events_rx) = mpsc::unbounded_channel();
    let context = SessionContext::attach(
        "test",
        Arc::clone(&transport) as Arc<dyn ServerTransport>,
        events_rx,
        &config,
    );
    Session {
        transport,
        context,
        events,
    }
}

pub fn trades_definition() -> TableDefinition {
    TableDefinition::new(
        vec![
            ColumnDefinition::new("sym", ColumnType::String),
            ColumnDefinition::new("price", ColumnType::Double),
            ColumnDefinition::new("size", ColumnType::Int64),
        ],
        1_000,
    )
}

/// Let the work and event loops drain.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
