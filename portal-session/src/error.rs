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

//! Error types for session lifecycle and supporting components.

use crate::types::SessionId;
use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised while driving a session or the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// I/O error on the upstream or client socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Telnet option negotiation error.
    #[error("protocol error: {0}")]
    Protocol(#[from] portal_telnetcodec::CodecError),

    /// MCCP2 inflater/deflator error.
    #[error("compression error: {0}")]
    Compress(#[from] portal_compress::CompressError),

    /// The upstream stream ended or errored in a way the session cannot
    /// recover from; a diagnostic has already been queued for the client.
    #[error("upstream connection lost")]
    UpstreamLost,

    /// Session was asked to act before `connect` without an upstream.
    #[error("no upstream connection for session {0}")]
    NoUpstream(SessionId),

    /// `connect` named a host outside the configured allowlist.
    #[error("host not allowed: {0}")]
    HostNotAllowed(String),

    /// Session lookup by id failed.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// Manager is no longer accepting new sessions (shutting down).
    #[error("session manager is shutting down")]
    NotAccepting,
}

impl SessionError {
    /// True for errors that should produce a client diagnostic and a
    /// scheduled teardown rather than an immediate hard failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::Io(_) | SessionError::UpstreamLost | SessionError::HostNotAllowed(_)
        )
    }

    /// True for errors that originate in the telnet/compression layers
    /// rather than session bookkeeping.
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, SessionError::Protocol(_) | SessionError::Compress(_))
    }
}
