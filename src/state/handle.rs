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

use std::sync::OnceLock;

/// A client/server handle pair for one remote table.
///
/// The client id is allocated locally before any request goes out and is
/// never reused within a session. The server id arrives with the resolved
/// definition and is assigned at most once.
#[derive(Debug)]
pub struct RemoteHandle {
    client_id: i64,
    server_id: OnceLock<i64>,
}

impl RemoteHandle {
    pub(crate) fn new(client_id: i64) -> Self {
        Self {
            client_id,
            server_id: OnceLock::new(),
        }
    }

    pub fn client_id(&self) -> i64 {
        self.client_id
    }

    pub fn server_id(&self) -> Option<i64> {
        self.server_id.get().copied()
    }

    pub fn is_assigned(&self) -> bool {
        self.server_id.get().is_some()
    }

    /// Returns false if a server id was already assigned.
    pub(crate) fn assign_server_id(&self, server_id: i64) -> bool {
        self.server_id.set(server_id).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_id_assigned_once() {
        let handle = RemoteHandle::new(7);
        assert_eq!(handle.client_id(), 7);
        assert!(!handle.is_assigned());
        assert_eq!(handle.server_id(), None);

        assert!(handle.assign_server_id(42));
        assert!(!handle.assign_server_id(43));
        assert_eq!(handle.server_id(), Some(42));
    }
}
