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

//! Per-connection execution engine.
//!
//! A [`SessionContext`] serializes every outgoing state-mutating request
//! through one work loop per connection and dispatches incoming push events
//! on one sequential loop, so issuance order equals wire order and receipt
//! order equals observation order.

mod context;
mod pending;

pub use context::SessionContext;

pub(crate) use pending::PendingBatch;
