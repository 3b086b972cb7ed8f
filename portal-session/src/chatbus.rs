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

//! Chat Bus (§4.8): a shared, disk-persisted chat log broadcast to every
//! session that has joined it.
//!
//! Membership and broadcast reuse the teacher's `DashMap`-keyed fan-out
//! shape (see `ConnectionManager` in the termionix service crate), swapping
//! its TCP write fan-out for per-session `mpsc` channels.

use crate::control::ChatRequest;
use crate::types::{ChatEntry, SessionId};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

/// Displayed history is capped to the most recent 300 entries.
const MAX_HISTORY: usize = 300;

struct ChatMember {
    sender: UnboundedSender<String>,
    name: Option<String>,
    /// The session's upstream host, if connected; `None` for a chat-only
    /// (not yet connected, or never connecting) session.
    host: Option<String>,
}

/// The shared chat bus.
pub struct ChatBus {
    log_path: PathBuf,
    history: RwLock<VecDeque<ChatEntry>>,
    members: DashMap<SessionId, ChatMember>,
}

impl ChatBus {
    /// Load the persisted log (tolerant of a missing file, malformed JSON,
    /// or non-array content — all yield an empty log) and start fresh.
    pub fn load(log_path: impl Into<PathBuf>) -> Self {
        let log_path = log_path.into();
        let history = load_history(&log_path);
        Self { log_path, history: RwLock::new(history), members: DashMap::new() }
    }

    /// `join(session)`: register a session's outbound channel and display
    /// identity on the bus.
    pub fn join(
        &self,
        id: SessionId,
        sender: UnboundedSender<String>,
        name: Option<String>,
        host: Option<String>,
    ) {
        self.members.insert(id, ChatMember { sender, name, host });
    }

    /// Remove a session from the bus (on teardown, or on explicit part).
    pub fn leave(&self, id: SessionId) {
        self.members.remove(&id);
    }

    /// Update a member's displayed identity, e.g. after a `name`/`connect`
    /// control frame.
    pub fn set_identity(&self, id: SessionId, name: Option<String>, host: Option<String>) {
        if let Some(mut member) = self.members.get_mut(&id) {
            if name.is_some() {
                member.name = name;
            }
            if host.is_some() {
                member.host = host;
            }
        }
    }

    /// `post(session, {channel, name, msg})`: clean, append, broadcast,
    /// persist.
    pub fn post(&self, req: &ChatRequest) {
        let mut payload = serde_json::Map::new();
        if let Some(channel) = &req.channel {
            payload.insert("channel".to_string(), serde_json::Value::String(channel.clone()));
        }
        if let Some(name) = &req.name {
            payload.insert("name".to_string(), serde_json::Value::String(name.clone()));
        }
        let cleaned = req.msg.as_deref().map(chat_cleanup).unwrap_or_default();
        payload.insert("msg".to_string(), serde_json::Value::String(cleaned));

        let entry = ChatEntry::new(serde_json::Value::Object(payload));
        let frame = format!(
            "portal.chat {}",
            serde_json::to_string(&entry).unwrap_or_default()
        );

        {
            let mut history = self.history.write().expect("chat history lock poisoned");
            history.push_back(entry);
            while history.len() > MAX_HISTORY {
                history.pop_front();
            }
            persist(&self.log_path, &history);
        }

        self.broadcast(&frame);
    }

    /// `op(session)`: send the sender the last 300 entries plus a synthetic
    /// user-listing entry. Never touches disk.
    pub fn op(&self, id: SessionId) {
        let mut entries: Vec<ChatEntry> = {
            let history = self.history.read().expect("chat history lock poisoned");
            history.iter().cloned().collect()
        };
        entries.push(ChatEntry::new(serde_json::json!({
            "channel": "status",
            "name": "online:",
            "msg": self.user_listing().join(", "),
        })));

        let frame = format!(
            "portal.chatlog {}",
            serde_json::to_string(&entries).unwrap_or_default()
        );
        if let Some(member) = self.members.get(&id) {
            let _ = member.sender.send(frame);
        }
    }

    /// `update()`: refresh every member's view of the bus, e.g. after
    /// membership changes.
    pub fn update(&self) {
        let ids: Vec<SessionId> = self.members.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.op(id);
        }
    }

    fn broadcast(&self, frame: &str) {
        for entry in self.members.iter() {
            let _ = entry.value().sender.send(frame.to_string());
        }
    }

    fn user_listing(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for entry in self.members.iter() {
            let member = entry.value();
            if member.name.is_none() && member.host.is_none() {
                continue;
            }
            let label = match &member.host {
                Some(host) => format!("{}@{}", member.name.as_deref().unwrap_or("Guest"), host),
                None => format!("{}@chat", member.name.as_deref().unwrap_or("Guest")),
            };
            if seen.insert(label.clone()) {
                out.push(label);
            }
        }
        out
    }
}

fn load_history(path: &Path) -> VecDeque<ChatEntry> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return VecDeque::new(),
    };
    serde_json::from_str::<Vec<ChatEntry>>(&contents)
        .map(VecDeque::from)
        .unwrap_or_default()
}

fn persist(path: &Path, history: &VecDeque<ChatEntry>) {
    let entries: Vec<&ChatEntry> = history.iter().collect();
    match serde_json::to_vec(&entries) {
        Ok(bytes) => {
            if let Err(err) = std::fs::write(path, bytes) {
                tracing::warn!(error = %err, path = %path.display(), "failed to persist chat log");
            }
        }
        Err(err) => tracing::warn!(error = %err, "failed to serialize chat log"),
    }
}

/// `chatCleanup`: escape `<`/`>` to `&lt;`/`&gt;`, except when the character
/// is preceded by ESC (0x1B), in which case the ESC is dropped and the raw
/// bracket is kept.
pub fn chat_cleanup(msg: &str) -> String {
    const ESC: char = '\u{1B}';
    let chars: Vec<char> = msg.chars().collect();
    let mut out = String::with_capacity(msg.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == ESC && i + 1 < chars.len() && (chars[i + 1] == '<' || chars[i + 1] == '>') {
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn cleanup_escapes_bare_brackets() {
        assert_eq!(chat_cleanup("a < b > c"), "a &lt; b &gt; c");
    }

    #[test]
    fn cleanup_unescapes_esc_prefixed_brackets() {
        assert_eq!(chat_cleanup("\u{1B}<b\u{1B}>"), "<b>");
    }

    #[test]
    fn cleanup_mixes_escaped_and_raw_brackets() {
        assert_eq!(chat_cleanup("<\u{1B}<>\u{1B}>"), "&lt;<&gt;>");
    }

    #[test]
    fn missing_log_file_yields_empty_history() {
        let bus = ChatBus::load("/nonexistent/path/chatlog.json");
        assert!(bus.history.read().unwrap().is_empty());
    }

    #[test]
    fn corrupt_log_file_yields_empty_history() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "not json").unwrap();
        let bus = ChatBus::load(file.path());
        assert!(bus.history.read().unwrap().is_empty());
    }

    #[test]
    fn non_array_log_file_yields_empty_history() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{}").unwrap();
        let bus = ChatBus::load(file.path());
        assert!(bus.history.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_broadcasts_to_every_member_including_sender() {
        let file = NamedTempFile::new().unwrap();
        let bus = ChatBus::load(file.path());
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        bus.join(SessionId::new(1), tx_a, Some("Alice".into()), Some("mud.example".into()));
        bus.join(SessionId::new(2), tx_b, None, None);

        bus.post(&ChatRequest { channel: Some("ooc".into()), msg: Some("hi".into()), name: Some("Alice".into()) });

        let frame_a = rx_a.recv().await.unwrap();
        let frame_b = rx_b.recv().await.unwrap();
        assert!(frame_a.starts_with("portal.chat "));
        assert_eq!(frame_a, frame_b);
    }

    #[tokio::test]
    async fn op_lists_unique_users_and_skips_anonymous_chat_only_sessions() {
        let file = NamedTempFile::new().unwrap();
        let bus = ChatBus::load(file.path());
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, _rx_b) = unbounded_channel();
        let (tx_c, _rx_c) = unbounded_channel();
        bus.join(SessionId::new(1), tx_a, Some("Alice".into()), Some("mud.example".into()));
        bus.join(SessionId::new(2), tx_b, None, Some("mud.example".into()));
        bus.join(SessionId::new(3), tx_c, None, None);

        bus.op(SessionId::new(1));
        let frame = rx_a.recv().await.unwrap();
        assert!(frame.contains("Alice@mud.example"));
        assert!(frame.contains("Guest@mud.example"));
        assert!(frame.starts_with("portal.chatlog "));
    }

    #[test]
    fn post_persists_the_log_to_disk() {
        let file = NamedTempFile::new().unwrap();
        let bus = ChatBus::load(file.path());
        bus.post(&ChatRequest { channel: None, msg: Some("hi".into()), name: None });
        let contents = std::fs::read_to_string(file.path()).unwrap();
        let parsed: Vec<ChatEntry> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
