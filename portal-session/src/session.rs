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

//! The per-connection pipeline (§4.6): wires the scanner, option engine,
//! inflater, control-frame parser and framer into one browser↔upstream
//! session, driven by a `tokio::select!` event loop the way the teacher's
//! `ConnectionWorker::event_loop` drives one TCP connection.

use crate::chatbus::ChatBus;
use crate::config::ProxyConfig;
use crate::control::{ControlFrame, MsdpRequest, MsdpValue};
use crate::error::{Result, SessionError};
use crate::framer::Framer;
use crate::types::{SessionId, SessionState};
use portal_compress::Inflater;
use portal_telnetcodec::{consts, frame, OptionEngine, OptionSignal, TelnetEvent, TelnetScanner};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;

const READ_BUF_SIZE: usize = 8192;
const TEARDOWN_DELAY: Duration = Duration::from_millis(500);

/// The live upstream connection plus the option engine bound to it. Kept
/// as one unit so a session can never have one without the other.
struct Upstream {
    read: OwnedReadHalf,
    write: OwnedWriteHalf,
    options: OptionEngine,
}

/// One browser↔upstream pipeline.
pub struct Session {
    id: SessionId,
    remote_addr: String,
    config: Arc<ProxyConfig>,
    chat_bus: Arc<ChatBus>,
    client_tx: mpsc::UnboundedSender<String>,
    chat_tx: mpsc::UnboundedSender<String>,
    chat_rx: mpsc::UnboundedReceiver<String>,
    state: SessionState,
    scanner: TelnetScanner,
    inflater: Option<Inflater>,
    framer: Framer,
    password_mode: bool,
    joined_chat_bus: bool,
    client_id: String,
    display_name: Option<String>,
    ttype_override: Option<String>,
    mccp_wanted: bool,
    utf8_requested: bool,
    pending_host: Option<String>,
    pending_port: Option<u16>,
    mccp2_ack_due: Option<Instant>,
    upstream: Option<Upstream>,
}

impl Session {
    /// Build a freshly accepted, not-yet-connected session.
    pub fn new(
        id: SessionId,
        remote_addr: impl Into<String>,
        config: Arc<ProxyConfig>,
        chat_bus: Arc<ChatBus>,
        client_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        let (chat_tx, chat_rx) = mpsc::unbounded_channel();
        let client_id = config.client_id.clone();
        Self {
            id,
            remote_addr: remote_addr.into(),
            config,
            chat_bus,
            client_tx,
            chat_tx,
            chat_rx,
            state: SessionState::Configuring,
            scanner: TelnetScanner::new(),
            inflater: None,
            framer: Framer::new(),
            password_mode: false,
            joined_chat_bus: false,
            client_id,
            display_name: None,
            ttype_override: None,
            mccp_wanted: false,
            utf8_requested: false,
            pending_host: None,
            pending_port: None,
            mccp2_ack_due: None,
            upstream: None,
        }
    }

    /// This session's id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session until the browser disconnects, the upstream is
    /// lost, or the process shuts the session down. `client_rx` carries
    /// text frames already extracted from the browser's WebSocket by the
    /// caller; `client_tx` (held since construction) carries frames back.
    pub async fn run(mut self, mut client_rx: mpsc::UnboundedReceiver<String>) {
        let mut read_buf = vec![0u8; READ_BUF_SIZE];

        loop {
            let mccp2_ack_due = self.mccp2_ack_due;
            let mccp2_wait = async move {
                match mccp2_ack_due {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                frame = client_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if let Err(err) = self.handle_client_frame(&text).await {
                                self.fail(&err).await;
                                break;
                            }
                        }
                        None => break,
                    }
                }
                chat_frame = self.chat_rx.recv() => {
                    if let Some(text) = chat_frame {
                        let _ = self.client_tx.send(text);
                    }
                }
                result = read_upstream(self.upstream.as_mut(), &mut read_buf) => {
                    match result {
                        Ok(0) => {
                            self.send_diagnostic("connection to server closed").await;
                            self.teardown_after_delay().await;
                            break;
                        }
                        Ok(n) => {
                            let chunk = read_buf[..n].to_vec();
                            if let Err(err) = self.handle_upstream_bytes(&chunk).await {
                                self.fail(&err).await;
                                break;
                            }
                        }
                        Err(io_err) => {
                            self.fail(&SessionError::Io(io_err)).await;
                            break;
                        }
                    }
                }
                _ = mccp2_wait => {
                    self.mccp2_ack_due = None;
                    let ack = frame::negotiation(consts::DO, consts::option::MCCP2).to_vec();
                    let _ = self.write_upstream(&ack).await;
                }
            }
        }

        self.state = SessionState::Closed;
        if self.joined_chat_bus {
            self.chat_bus.leave(self.id);
            self.chat_bus.update();
        }
    }

    async fn fail(&mut self, err: &SessionError) {
        tracing::warn!(session = %self.id, error = %err, "session failing");
        self.send_diagnostic(&err.to_string()).await;
        self.teardown_after_delay().await;
    }

    async fn send_diagnostic(&self, message: &str) {
        let _ = self.client_tx.send(message.to_string());
    }

    async fn teardown_after_delay(&mut self) {
        self.state = SessionState::Closing;
        tokio::time::sleep(TEARDOWN_DELAY).await;
    }

    async fn handle_client_frame(&mut self, text: &str) -> Result<()> {
        if ControlFrame::looks_like_control_frame(text) {
            match ControlFrame::parse(text) {
                Ok(control) => self.apply_control(control).await,
                Err(err) => {
                    tracing::warn!(session = %self.id, error = %err, "discarding malformed control frame");
                    Ok(())
                }
            }
        } else {
            let bytes = Framer::encode_inbound(text);
            self.write_upstream(&bytes).await?;
            self.password_mode = false;
            Ok(())
        }
    }

    async fn apply_control(&mut self, control: ControlFrame) -> Result<()> {
        if control.host.is_some() {
            self.pending_host = control.host;
        }
        if control.port.is_some() {
            self.pending_port = control.port;
        }
        if control.ttype.is_some() {
            self.ttype_override = control.ttype;
        }
        if control.name.is_some() || control.client.is_some() {
            if control.name.is_some() {
                self.display_name = control.name;
            }
            if let Some(client) = control.client {
                self.client_id = client;
            }
            self.chat_bus.set_identity(self.id, self.display_name.clone(), self.upstream_host());
        }
        if control.mccp {
            self.mccp_wanted = true;
        }
        if control.utf8 {
            self.utf8_requested = true;
        }
        if control.debug {
            self.config_debug_note();
        }
        if let Some(chat) = &control.chat {
            self.ensure_joined_chat_bus();
            self.chat_bus.post(chat);
            self.chat_bus.update();
        }
        if let Some(bin) = &control.bin {
            self.write_upstream(bin).await?;
        }
        if let Some(msdp) = &control.msdp {
            self.send_msdp(msdp).await;
        }
        if control.connect {
            self.dial().await?;
        }
        Ok(())
    }

    fn config_debug_note(&self) {
        tracing::debug!(session = %self.id, "debug logging requested by client");
    }

    fn upstream_host(&self) -> Option<String> {
        if self.upstream.is_none() {
            return None;
        }
        Some(self.pending_host.clone().unwrap_or_else(|| self.config.default_host.clone()))
    }

    fn ensure_joined_chat_bus(&mut self) {
        if !self.joined_chat_bus {
            self.chat_bus.join(
                self.id,
                self.chat_tx.clone(),
                self.display_name.clone(),
                self.upstream_host(),
            );
            self.joined_chat_bus = true;
        }
    }

    async fn send_msdp(&mut self, msdp: &MsdpRequest) {
        if self.upstream.is_none() {
            return;
        }
        let mut out = Vec::new();
        match &msdp.val {
            MsdpValue::Scalar(value) => out.extend(frame::msdp_pair(&msdp.key, value)),
            MsdpValue::List(values) => {
                for value in values {
                    out.extend(frame::msdp_pair(&msdp.key, value));
                }
            }
        }
        let _ = self.write_upstream(&out).await;
    }

    async fn dial(&mut self) -> Result<()> {
        if self.upstream.is_some() {
            return Ok(());
        }

        let host = self.pending_host.clone().unwrap_or_else(|| self.config.default_host.clone());
        let port = self.pending_port.unwrap_or(self.config.default_port);

        if self.config.only_default_host && host != self.config.default_host {
            self.send_diagnostic(&format!(
                "this proxy does not allow connections to hosts other than {}",
                self.config.default_host
            ))
            .await;
            self.teardown_after_delay().await;
            return Ok(());
        }

        let stream = TcpStream::connect((host.as_str(), port)).await?;
        let (read, write) = stream.into_split();

        let ttype_queue: VecDeque<String> = match &self.ttype_override {
            Some(name) => VecDeque::from(vec![name.clone()]),
            None => self.config.ttype_queue.clone().into(),
        };
        let gmcp_messages = build_gmcp_messages(&self.config, &self.client_id, &self.remote_addr);
        let msdp_pairs = build_msdp_pairs(&self.config, &self.client_id, &self.remote_addr);

        let options = OptionEngine::new(
            self.remote_addr.clone(),
            ttype_queue,
            gmcp_messages,
            msdp_pairs,
            self.mccp_wanted,
            self.config.mccp2_delay,
        );

        self.upstream = Some(Upstream { read, write, options });
        self.pending_host = Some(host.clone());
        self.state = SessionState::Open;
        self.chat_bus.set_identity(self.id, self.display_name.clone(), Some(host));
        if self.joined_chat_bus {
            self.chat_bus.update();
        }
        Ok(())
    }

    async fn write_upstream(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        match &mut self.upstream {
            Some(upstream) => {
                upstream.write.write_all(bytes).await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn send_to_client(&self, data: &[u8]) {
        let mccp_active = self.upstream.as_ref().map(|u| u.options.flags().compressed).unwrap_or(false);
        let encoded = self.framer.encode_outbound(data, mccp_active, self.config.global_compress);
        let _ = self.client_tx.send(encoded);
    }

    /// Upstream→client path (§4.6): inflate if MCCP2 is already active,
    /// scan, dispatch each event to the option engine, and forward data
    /// runs to the browser. If activation happens mid-scan, the remainder
    /// of this arrival (located by the scanner's returned offset) is
    /// diverted through the freshly created inflater and re-scanned.
    async fn handle_upstream_bytes(&mut self, raw: &[u8]) -> Result<()> {
        let mut pending = match &mut self.inflater {
            Some(inflater) => inflater.inflate(raw)?,
            None => raw.to_vec(),
        };

        loop {
            let events = self.scanner.feed(&pending);
            let mut data_buf = Vec::new();
            let mut writes = Vec::new();
            let mut activation_offset = None;

            for (event, offset) in &events {
                let upstream = self
                    .upstream
                    .as_mut()
                    .expect("upstream bytes only arrive once a session is connected");
                let mut out = Vec::new();
                let signal = upstream.options.handle(event, &mut out);
                writes.extend_from_slice(&out);

                if let TelnetEvent::Data(bytes) = event {
                    data_buf.extend_from_slice(bytes);
                }

                match signal {
                    OptionSignal::ScheduleMccp2Ack(delay) => {
                        self.mccp2_ack_due = Some(Instant::now() + delay);
                    }
                    OptionSignal::Mccp2Activated => {
                        self.inflater = Some(Inflater::new());
                        self.scanner.reset();
                        activation_offset = Some(*offset);
                    }
                    OptionSignal::EnteredPasswordMode => {
                        self.password_mode = true;
                    }
                    OptionSignal::None => {}
                }

                if activation_offset.is_some() {
                    break;
                }
            }

            if !writes.is_empty() {
                self.write_upstream(&writes).await?;
            }
            if !data_buf.is_empty() {
                self.send_to_client(&data_buf).await;
            }

            match activation_offset {
                Some(offset) if offset < pending.len() => {
                    let remainder = pending[offset..].to_vec();
                    let inflated = self
                        .inflater
                        .as_mut()
                        .expect("inflater was just created on activation")
                        .inflate(&remainder)?;
                    if inflated.is_empty() {
                        break;
                    }
                    pending = inflated;
                    continue;
                }
                _ => break,
            }
        }

        Ok(())
    }
}

async fn read_upstream(upstream: Option<&mut Upstream>, buf: &mut [u8]) -> std::io::Result<usize> {
    match upstream {
        Some(upstream) => upstream.read.read(buf).await,
        None => std::future::pending().await,
    }
}

/// `["client <id>", <extra[1..]>, "client_ip <addr>"]` — element 0 of the
/// configured extra list is a reserved placeholder superseded by the
/// synthesized `client` line; see DESIGN.md.
fn build_gmcp_messages(config: &ProxyConfig, client_id: &str, remote_addr: &str) -> Vec<String> {
    let mut messages = vec![format!("client {client_id}")];
    if config.gmcp_portal_extra.len() > 1 {
        messages.extend(config.gmcp_portal_extra[1..].iter().cloned());
    }
    messages.push(format!("client_ip {remote_addr}"));
    messages
}

fn build_msdp_pairs(config: &ProxyConfig, client_id: &str, remote_addr: &str) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("CLIENT_ID".to_string(), client_id.to_string()),
        ("CLIENT_VERSION".to_string(), config.client_version.clone()),
        ("CLIENT_IP".to_string(), remote_addr.to_string()),
    ];
    pairs.extend(config.msdp_static.clone());
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use tokio::net::TcpListener;

    fn test_session(config: ProxyConfig, client_tx: mpsc::UnboundedSender<String>) -> Session {
        let chat_bus = Arc::new(ChatBus::load(tempfile::NamedTempFile::new().unwrap().path()));
        Session::new(SessionId::new(1), "203.0.113.9", Arc::new(config), chat_bus, client_tx)
    }

    #[tokio::test]
    async fn dial_rejects_disallowed_host_with_a_single_diagnostic() {
        let config = ProxyConfig::new().with_default_target("mud.example", 4000).with_only_default_host(true);
        let (client_tx, mut client_rx) = mpsc::unbounded_channel();
        let mut session = test_session(config, client_tx);
        session.pending_host = Some("evil.example".to_string());

        session.dial().await.expect("rejection must not propagate as an error");

        assert!(session.upstream.is_none());
        let message = client_rx.recv().await.expect("one diagnostic frame");
        assert!(message.contains("does not allow connections"));
        assert!(message.contains("mud.example"));
        assert!(!message.contains("evil.example"));
        assert!(client_rx.try_recv().is_err(), "exactly one diagnostic frame must be sent");
    }

    #[tokio::test]
    async fn handle_upstream_bytes_reassembles_mccp2_activation_split_across_arrivals() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let config = ProxyConfig::new().with_default_target(addr.ip().to_string(), addr.port());
        let (client_tx, mut client_rx) = mpsc::unbounded_channel();
        let mut session = test_session(config, client_tx);
        session.mccp_wanted = true;
        session.dial().await.expect("loopback dial must succeed");

        let plain = b"A distant howl echoes through the trees.".repeat(6);
        let compressed = portal_compress::Deflator::new().compress(&plain).expect("compress");
        let mid = compressed.len() / 2;

        let mut first_arrival = frame::subnegotiation(consts::option::MCCP2, &[]);
        first_arrival.extend_from_slice(&compressed[..mid]);

        session.handle_upstream_bytes(&first_arrival).await.expect("first arrival");
        assert!(session.upstream.as_ref().unwrap().options.flags().compressed);
        assert!(session.inflater.is_some());

        session.handle_upstream_bytes(&compressed[mid..]).await.expect("second arrival");

        let mut received = Vec::new();
        while let Ok(text) = client_rx.try_recv() {
            received.extend_from_slice(&BASE64.decode(text).expect("valid base64"));
        }
        assert_eq!(received, plain);
    }

    #[test]
    fn gmcp_messages_drop_the_reserved_placeholder() {
        let mut config = ProxyConfig::new();
        config.gmcp_portal_extra = vec!["placeholder".into(), "portalB".into()];
        let messages = build_gmcp_messages(&config, "myclient", "1.2.3.4");
        assert_eq!(
            messages,
            vec!["client myclient".to_string(), "portalB".to_string(), "client_ip 1.2.3.4".to_string()]
        );
    }

    #[test]
    fn msdp_pairs_put_dynamic_fields_first() {
        let config = ProxyConfig::new();
        let pairs = build_msdp_pairs(&config, "myclient", "1.2.3.4");
        assert_eq!(pairs[0], ("CLIENT_ID".to_string(), "myclient".to_string()));
        assert_eq!(pairs[2], ("CLIENT_IP".to_string(), "1.2.3.4".to_string()));
        assert!(pairs.iter().any(|(k, _)| k == "XTERM_256_COLORS"));
    }
}
