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

//! Error types for the Deephaven client.
//!
//! Errors carry a [`Status`] classifying the failure plus a human-readable
//! message. Construction goes through [`DeephavenErrorHelper`], one
//! constructor per status:
//!
//! ```ignore
//! return Err(DeephavenErrorHelper::transport().message("connection closed"));
//! ```
//!
//! `Error` is `Clone` so a single transport failure can be fanned out to
//! every outstanding waiter on a connection.

use std::fmt;

/// Classification of a client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Operation attempted on a disposed session context. Fails before any
    /// network call.
    Disposed,
    /// Connection lost or a send failed.
    Transport,
    /// The server reported a failure for one specific operation.
    Server,
    /// A local wait exceeded its budget. The in-flight request is not
    /// cancelled.
    Timeout,
    InvalidState,
    InvalidArgument,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Disposed => "disposed",
            Status::Transport => "transport",
            Status::Server => "server",
            Status::Timeout => "timeout",
            Status::InvalidState => "invalid state",
            Status::InvalidArgument => "invalid argument",
        };
        f.write_str(text)
    }
}

/// An error returned by any client operation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{status} error: {message}")]
pub struct Error {
    pub status: Status,
    pub message: String,
}

impl Error {
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_timeout(&self) -> bool {
        self.status == Status::Timeout
    }

    pub fn is_transport(&self) -> bool {
        self.status == Status::Transport
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Builder-style error constructors.
///
/// Each method picks a [`Status`]; [`message`](DeephavenErrorHelper::message)
/// finishes the error.
#[derive(Debug, Clone, Copy)]
pub struct DeephavenErrorHelper {
    status: Status,
}

impl DeephavenErrorHelper {
    /// Allocation or use after `SessionContext` disposal.
    pub fn disposed() -> Self {
        Self {
            status: Status::Disposed,
        }
    }

    /// Connection lost, send failed, or the reply channel went away.
    pub fn transport() -> Self {
        Self {
            status: Status::Transport,
        }
    }

    /// Inline batch failure or async failure callback from the server.
    pub fn server() -> Self {
        Self {
            status: Status::Server,
        }
    }

    /// A local wait exceeded its budget.
    pub fn timeout() -> Self {
        Self {
            status: Status::Timeout,
        }
    }

    pub fn invalid_state() -> Self {
        Self {
            status: Status::InvalidState,
        }
    }

    pub fn invalid_argument() -> Self {
        Self {
            status: Status::InvalidArgument,
        }
    }

    /// Finish the error with a message.
    pub fn message(self, message: impl Into<String>) -> Error {
        Error {
            status: self.status,
            message: message.into(),
        }
    }
}
