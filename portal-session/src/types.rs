//
// Copyright 2026 The Portal Project Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Core types shared across the session crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a session (monotonically increasing, never reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The underlying integer.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Monotonic counter handing out fresh `SessionId`s.
#[derive(Debug, Default)]
pub struct SessionIdAllocator(AtomicU64);

impl SessionIdAllocator {
    /// Create a fresh allocator starting at 1.
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Allocate the next id.
    pub fn next(&self) -> SessionId {
        SessionId::new(self.0.fetch_add(1, Ordering::SeqCst))
    }
}

/// Lifecycle state of a session.
///
/// There is no "Idle" state distinct from the upstream read timeout — this
/// proxy's only idle handling is the upstream socket's own read deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Accepted, waiting for the client's `connect` control frame.
    Configuring = 0,
    /// Upstream dial succeeded; bytes are flowing both ways.
    Open = 1,
    /// Teardown has been scheduled or started.
    Closing = 2,
    /// Fully torn down; removed from the live set.
    Closed = 3,
}

impl SessionState {
    /// Convert from the raw tag (out-of-range values map to `Closed`).
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Configuring,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// The raw tag.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// True once the session is tearing down or torn down.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuring => write!(f, "configuring"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// One entry in the chat history: a timestamp plus an opaque JSON payload
/// (channel, sender, message, and anything else the caller put there).
///
/// `payload` is always a flat, owned `serde_json::Value` built fresh for
/// this entry — there is no way to construct a cyclic value this way, which
/// is what makes the log's JSON encoding cycle-tolerant by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    /// ISO-8601 timestamp of the post.
    pub date: DateTime<Utc>,
    /// The sanitized chat payload.
    pub data: serde_json::Value,
}

impl ChatEntry {
    /// Build an entry stamped with the current time.
    pub fn new(data: serde_json::Value) -> Self {
        Self { date: Utc::now(), data }
    }
}
