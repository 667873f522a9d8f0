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

//! Remote-handle lifetime management.
//!
//! A [`TableState`] is the client-side identity of one remote table. Its
//! lifetime is reference-counted through [`TableTracker`] claims, each owned
//! by a [`TableScope`]; when the last claim detaches, the server-side handle
//! is released exactly once.

mod handle;
mod scope;
mod table_state;
mod tracker;

pub use handle::RemoteHandle;
pub use scope::TableScope;
pub use table_state::{Resolution, StateSnapshot, StateUpdate, TableState};
pub use tracker::TableTracker;

pub(crate) use scope::KeepAlive;
