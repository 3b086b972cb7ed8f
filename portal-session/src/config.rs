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

//! Listener-wide proxy configuration.
//!
//! Builder-styled the way the teacher's `ServerConnectionConfig` is: a
//! `Default` baseline plus chained `with_*` setters.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration shared by every session a listener accepts.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address the WebSocket listener binds to.
    pub listen_addr: String,
    /// Upstream host used when a `connect` frame omits one.
    pub default_host: String,
    /// Upstream port used when a `connect` frame omits one.
    pub default_port: u16,
    /// When true, `connect` targets other than `default_host` are refused.
    pub only_default_host: bool,
    /// Default terminal-type queue for a freshly accepted session, before
    /// any client `ttype` control frame replaces it.
    pub ttype_queue: Vec<String>,
    /// GMCP portal messages beyond the synthesized `client <id>` head and
    /// `client_ip <addr>` tail Session always adds. Element 0 is reserved
    /// (superseded by the synthesized `client` line; see DESIGN.md) and is
    /// otherwise passed through verbatim in order.
    pub gmcp_portal_extra: Vec<String>,
    /// Static MSDP introduction pairs beyond `CLIENT_ID`/`CLIENT_VERSION`/
    /// `CLIENT_IP`, which Session fills in from session identity.
    pub msdp_static: Vec<(String, String)>,
    /// This proxy's own client identifier, advertised when the browser
    /// hasn't set one via the `client` control key.
    pub client_id: String,
    /// This proxy's own client version string.
    pub client_version: String,
    /// Global compression switch for the non-MCCP outbound path (§4.7).
    pub global_compress: bool,
    /// Verbose per-session debug logging.
    pub debug: bool,
    /// Delay before acknowledging a server's `WILL MCCP2` with `DO MCCP2`.
    pub mccp2_delay: Duration,
    /// Path to the persisted chat log JSON file.
    pub chat_log_path: PathBuf,
    /// TLS certificate path; `None` serves plain WebSocket.
    pub cert_path: Option<PathBuf>,
    /// TLS private key path; required if `cert_path` is set.
    pub key_path: Option<PathBuf>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            default_host: "localhost".to_string(),
            default_port: 23,
            only_default_host: false,
            ttype_queue: Vec::new(),
            gmcp_portal_extra: Vec::new(),
            msdp_static: vec![
                ("XTERM_256_COLORS".to_string(), "1".to_string()),
                ("MXP".to_string(), "1".to_string()),
                ("UTF_8".to_string(), "1".to_string()),
            ],
            client_id: "portal".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            global_compress: false,
            debug: false,
            mccp2_delay: Duration::from_secs(6),
            chat_log_path: PathBuf::from("chatlog.json"),
            cert_path: None,
            key_path: None,
        }
    }
}

impl ProxyConfig {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the WebSocket listener address.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Set the default upstream host and port.
    pub fn with_default_target(mut self, host: impl Into<String>, port: u16) -> Self {
        self.default_host = host.into();
        self.default_port = port;
        self
    }

    /// Enable or disable the same-host allowlist.
    pub fn with_only_default_host(mut self, enabled: bool) -> Self {
        self.only_default_host = enabled;
        self
    }

    /// Set the default terminal-type queue.
    pub fn with_ttype_queue(mut self, queue: Vec<String>) -> Self {
        self.ttype_queue = queue;
        self
    }

    /// Set the extra GMCP portal messages.
    pub fn with_gmcp_portal_extra(mut self, messages: Vec<String>) -> Self {
        self.gmcp_portal_extra = messages;
        self
    }

    /// Set the static MSDP introduction pairs.
    pub fn with_msdp_static(mut self, pairs: Vec<(String, String)>) -> Self {
        self.msdp_static = pairs;
        self
    }

    /// Set the proxy's own client identity.
    pub fn with_client_identity(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_id = id.into();
        self.client_version = version.into();
        self
    }

    /// Enable or disable the global compression switch.
    pub fn with_global_compress(mut self, enabled: bool) -> Self {
        self.global_compress = enabled;
        self
    }

    /// Enable or disable debug logging.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Set the MCCP2 acknowledgement delay.
    pub fn with_mccp2_delay(mut self, delay: Duration) -> Self {
        self.mccp2_delay = delay;
        self
    }

    /// Set the chat log file path.
    pub fn with_chat_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chat_log_path = path.into();
        self
    }

    /// Set the TLS certificate and key paths.
    pub fn with_tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(cert.into());
        self.key_path = Some(key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serves_plain_websocket() {
        let config = ProxyConfig::default();
        assert!(config.cert_path.is_none());
        assert!(config.key_path.is_none());
    }

    #[test]
    fn builder_chains_apply_in_order() {
        let config = ProxyConfig::new()
            .with_default_target("mud.example", 4000)
            .with_only_default_host(true)
            .with_mccp2_delay(Duration::from_secs(2));
        assert_eq!(config.default_host, "mud.example");
        assert_eq!(config.default_port, 4000);
        assert!(config.only_default_host);
        assert_eq!(config.mccp2_delay, Duration::from_secs(2));
    }
}
