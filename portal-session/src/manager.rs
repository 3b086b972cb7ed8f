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

//! Session Manager (§4.9): the live session set, the `accepting` flag, and
//! graceful shutdown — generalized from the teacher's `ConnectionManager`
//! (`DashMap`-keyed, spawn-a-worker-per-connection, remove-on-completion).

use crate::chatbus::ChatBus;
use crate::config::ProxyConfig;
use crate::session::Session;
use crate::types::{SessionId, SessionIdAllocator};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

struct SessionHandle {
    client_tx: mpsc::UnboundedSender<String>,
}

/// The channels a gateway needs to bridge a transport connection to a
/// freshly accepted session.
pub struct Accepted {
    /// The session's id, for logging.
    pub id: SessionId,
    /// Feed text frames received from the browser into this.
    pub inbound_tx: mpsc::UnboundedSender<String>,
    /// Drain text frames destined for the browser from this.
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
}

/// Owns the live session set and the `accepting` flag shared across
/// accepted connections.
pub struct SessionManager {
    sessions: DashMap<SessionId, SessionHandle>,
    accepting: AtomicBool,
    allocator: SessionIdAllocator,
    chat_bus: Arc<ChatBus>,
    config: Arc<ProxyConfig>,
}

impl SessionManager {
    /// Build a manager, loading the persisted chat log named in `config`.
    pub fn new(config: ProxyConfig) -> Arc<Self> {
        let chat_bus = Arc::new(ChatBus::load(config.chat_log_path.clone()));
        Arc::new(Self {
            sessions: DashMap::new(),
            accepting: AtomicBool::new(true),
            allocator: SessionIdAllocator::new(),
            chat_bus,
            config: Arc::new(config),
        })
    }

    /// Whether new connections are currently accepted.
    pub fn accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Accept a new connection from `remote_addr`. Returns `None` if the
    /// manager is shutting down — the caller should close the connection
    /// immediately without installing any handlers.
    pub fn accept(self: &Arc<Self>, remote_addr: impl Into<String>) -> Option<Accepted> {
        if !self.accepting() {
            return None;
        }

        let id = self.allocator.next();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let session = Session::new(id, remote_addr.into(), self.config.clone(), self.chat_bus.clone(), outbound_tx.clone());
        self.sessions.insert(id, SessionHandle { client_tx: outbound_tx });

        let manager = self.clone();
        tokio::spawn(async move {
            session.run(inbound_rx).await;
            manager.sessions.remove(&id);
        });

        Some(Accepted { id, inbound_tx, outbound_rx })
    }

    /// Shut down gracefully: stop accepting, broadcast a "going down"
    /// message to every live session, and return the exit code (§4.9).
    pub fn shutdown(&self, core_dump_requested: bool) -> i32 {
        self.accepting.store(false, Ordering::SeqCst);
        for entry in self.sessions.iter() {
            let _ = entry.value().client_tx.send("server is going down".to_string());
        }
        if core_dump_requested { 3 } else { 0 }
    }
}
