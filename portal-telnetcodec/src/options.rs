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
//! The per-session option negotiation policy.
//!
//! Unlike the RFC 1143 Q-method (WANTNO/WANTYES collision resolution), this
//! policy never needs to resolve a negotiation race: on first detection of
//! an offer from the server it emits the canonical response once and
//! remembers having done so. Grounded on the one-shot negotiation style of
//! `huhlig-wyldlands`'s `telnet/protocol.rs`, not on this workspace's own
//! (far more elaborate) predecessor.

use crate::consts::{DO, DONT, WILL, WONT, option, qualifier};
use crate::frame;
use crate::scanner::TelnetEvent;
use std::collections::VecDeque;
use std::time::Duration;

/// One bit per negotiated option, plus the MCCP2 "compressed" bit and the
/// NEW-ENV handshake bit. Each transitions `false -> true` at most once
/// during a session and never back.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OptionFlags {
    /// GMCP negotiated (either direction).
    pub gmcp: bool,
    /// MSDP negotiated.
    pub msdp: bool,
    /// `DO MCCP2` has been sent (or scheduled).
    pub mccp2: bool,
    /// MCCP2 compression is active on the upstream read path.
    pub compressed: bool,
    /// MXP negotiated (either direction).
    pub mxp: bool,
    /// NEW-ENV negotiated.
    pub newenv: bool,
    /// NEW-ENV IPADDRESS handshake completed.
    pub newenv_handshake: bool,
    /// CHARSET UTF-8 accepted.
    pub utf8: bool,
    /// Suppress-Go-Ahead negotiated.
    pub sga: bool,
    /// Server announced ECHO (password mode entered).
    pub echo: bool,
    /// NAWS refused (client owns window size instead).
    pub naws: bool,
}

/// Notable outcomes of processing one event that the owning `Session`
/// cannot infer from `out` alone, because they require scheduling
/// (MCCP2's deliberate delay) or cross-component effects (entering
/// password mode, flipping to inflated reads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionSignal {
    /// Nothing beyond whatever bytes were appended to `out`.
    None,
    /// The server offered MCCP2; send `DO MCCP2` after this delay (to let
    /// the server finish announcing other options first).
    ScheduleMccp2Ack(Duration),
    /// The MCCP2 activation sentinel was observed. `compressed` is already
    /// set; the caller must route the remainder of the current arrival
    /// through the inflater before continuing to scan it.
    Mccp2Activated,
    /// Server announced `WILL ECHO`; the session should suppress local
    /// echo until the next forwarded client byte.
    EnteredPasswordMode,
}

/// Per-session option negotiation engine.
pub struct OptionEngine {
    flags: OptionFlags,
    ttype_queue: VecDeque<String>,
    remote_addr: String,
    gmcp_portal_messages: Vec<String>,
    msdp_intro_pairs: Vec<(String, String)>,
    client_wants_mccp: bool,
    mccp2_delay: Duration,
}

impl OptionEngine {
    /// Build a new engine for one session.
    pub fn new(
        remote_addr: impl Into<String>,
        ttype_queue: impl Into<VecDeque<String>>,
        gmcp_portal_messages: Vec<String>,
        msdp_intro_pairs: Vec<(String, String)>,
        client_wants_mccp: bool,
        mccp2_delay: Duration,
    ) -> Self {
        Self {
            flags: OptionFlags::default(),
            ttype_queue: ttype_queue.into(),
            remote_addr: remote_addr.into(),
            gmcp_portal_messages,
            msdp_intro_pairs,
            client_wants_mccp,
            mccp2_delay,
        }
    }

    /// Current flag snapshot.
    pub fn flags(&self) -> OptionFlags {
        self.flags
    }

    /// Remaining terminal-type queue (for inspection/tests).
    pub fn ttype_queue(&self) -> &VecDeque<String> {
        &self.ttype_queue
    }

    fn pop_ttype_with_fallback(&mut self) -> String {
        self.ttype_queue
            .pop_front()
            .unwrap_or_else(|| self.remote_addr.clone())
    }

    /// Process one scanner event, appending any immediate upstream response
    /// bytes to `out` and returning a signal for anything the session must
    /// act on beyond writing bytes.
    pub fn handle(&mut self, event: &TelnetEvent, out: &mut Vec<u8>) -> OptionSignal {
        match event {
            TelnetEvent::Data(_) => OptionSignal::None,
            TelnetEvent::Command(cmd, opt) => self.handle_command(*cmd, *opt, out),
            TelnetEvent::Subneg(opt, payload) => self.handle_subneg(*opt, payload, out),
        }
    }

    fn handle_command(&mut self, cmd: u8, opt: u8, out: &mut Vec<u8>) -> OptionSignal {
        match (cmd, opt) {
            (DO, o) if o == option::TTYPE => {
                out.extend(frame::negotiation(WILL, option::TTYPE));
                let name = self.pop_ttype_with_fallback();
                out.extend(frame::ttype_is(&name));
                OptionSignal::None
            }
            (DO, o) if o == option::GMCP && !self.flags.gmcp => {
                out.extend(frame::negotiation(WILL, option::GMCP));
                self.emit_gmcp_portal_messages(out);
                self.flags.gmcp = true;
                OptionSignal::None
            }
            (WILL, o) if o == option::GMCP && !self.flags.gmcp => {
                out.extend(frame::negotiation(DO, option::GMCP));
                self.emit_gmcp_portal_messages(out);
                self.flags.gmcp = true;
                OptionSignal::None
            }
            (WILL, o) if o == option::MSDP && !self.flags.msdp => {
                out.extend(frame::negotiation(DO, option::MSDP));
                for (key, val) in self.msdp_intro_pairs.clone() {
                    out.extend(frame::msdp_pair(&key, &val));
                }
                self.flags.msdp = true;
                OptionSignal::None
            }
            (WILL, o)
                if o == option::MCCP2
                    && self.client_wants_mccp
                    && !self.flags.mccp2
                    && !self.flags.compressed =>
            {
                self.flags.mccp2 = true;
                OptionSignal::ScheduleMccp2Ack(self.mccp2_delay)
            }
            (DO, o) if o == option::MXP && !self.flags.mxp => {
                out.extend(frame::negotiation(WILL, option::MXP));
                self.flags.mxp = true;
                OptionSignal::None
            }
            (WILL, o) if o == option::MXP && !self.flags.mxp => {
                out.extend(frame::negotiation(DO, option::MXP));
                self.flags.mxp = true;
                OptionSignal::None
            }
            (DO, o) if o == option::NEW_ENV && !self.flags.newenv => {
                out.extend(frame::negotiation(WILL, option::NEW_ENV));
                self.flags.newenv = true;
                OptionSignal::None
            }
            (DO, o) if o == option::CHARSET && !self.flags.charset_negotiated() => {
                out.extend(frame::negotiation(WILL, option::CHARSET));
                OptionSignal::None
            }
            (WILL, o) if o == option::SGA && !self.flags.sga => {
                out.extend(frame::negotiation(WONT, option::SGA));
                self.flags.sga = true;
                OptionSignal::None
            }
            (WILL, o) if o == option::ECHO && !self.flags.echo => {
                self.flags.echo = true;
                OptionSignal::EnteredPasswordMode
            }
            (WILL, o) if o == option::NAWS && !self.flags.naws => {
                out.extend(frame::negotiation(WONT, option::NAWS));
                self.flags.naws = true;
                OptionSignal::None
            }
            // Unhandled (cmd, opt) pairs and repeats of already-negotiated
            // options: idempotent no-op, per the policy's ordering rule.
            _ if cmd == DONT || cmd == WONT => OptionSignal::None,
            _ => OptionSignal::None,
        }
    }

    fn handle_subneg(&mut self, opt: u8, payload: &[u8], out: &mut Vec<u8>) -> OptionSignal {
        match opt {
            o if o == option::TTYPE && payload.first() == Some(&qualifier::REQUEST) => {
                if let Some(name) = self.ttype_queue.pop_front() {
                    out.extend(frame::ttype_is(&name));
                }
                OptionSignal::None
            }
            o if o == option::NEW_ENV
                && payload.first() == Some(&qualifier::REQUEST)
                && self.flags.newenv
                && !self.flags.newenv_handshake =>
            {
                out.extend(frame::new_env_ipaddress(&self.remote_addr));
                self.flags.newenv_handshake = true;
                OptionSignal::None
            }
            o if o == option::CHARSET && !self.flags.utf8 => {
                out.extend(frame::charset_accept_utf8());
                self.flags.utf8 = true;
                OptionSignal::None
            }
            o if o == option::MCCP2 && self.client_wants_mccp && !self.flags.compressed => {
                self.flags.compressed = true;
                OptionSignal::Mccp2Activated
            }
            _ => OptionSignal::None,
        }
    }

    fn emit_gmcp_portal_messages(&self, out: &mut Vec<u8>) {
        for message in &self.gmcp_portal_messages {
            out.extend(frame::gmcp_message(message));
        }
    }
}

impl OptionFlags {
    /// There is no standalone "charset negotiated" bit in the data model
    /// (spec.md §4.3 leaves the flag-transition column blank for `DO
    /// CHARSET`); `WILL CHARSET` only needs to fire once, so the `utf8`
    /// flag's unset state is used as that one-shot gate until the
    /// subnegotiation itself sets it.
    fn charset_negotiated(&self) -> bool {
        self.utf8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{IAC, SE};
    use crate::scanner::TelnetScanner;

    fn engine(remote: &str, ttypes: &[&str], client_wants_mccp: bool) -> OptionEngine {
        OptionEngine::new(
            remote,
            ttypes.iter().map(|s| s.to_string()).collect::<VecDeque<_>>(),
            vec![],
            vec![],
            client_wants_mccp,
            Duration::from_secs(6),
        )
    }

    #[test]
    fn scenario_1_ttype_handshake() {
        let mut scanner = TelnetScanner::new();
        let mut eng = engine("203.0.113.9", &["xterm-256color", "screen-256color", "linux"], false);
        let mut out = Vec::new();

        for (ev, _) in scanner.feed(&[IAC, DO, option::TTYPE]) {
            eng.handle(&ev, &mut out);
        }
        for (ev, _) in scanner.feed(&[IAC, 250, option::TTYPE, qualifier::REQUEST, IAC, SE]) {
            eng.handle(&ev, &mut out);
        }

        let mut expected = Vec::new();
        expected.extend(frame::negotiation(WILL, option::TTYPE));
        expected.extend(frame::ttype_is("xterm-256color"));
        expected.extend(frame::ttype_is("screen-256color"));
        assert_eq!(out, expected);
        assert_eq!(eng.ttype_queue().iter().cloned().collect::<Vec<_>>(), vec!["linux".to_string()]);
    }

    #[test]
    fn scenario_2_gmcp_single_buffer_then_idempotent() {
        let mut scanner = TelnetScanner::new();
        let mut eng = OptionEngine::new(
            "1.2.3.4",
            VecDeque::new(),
            vec!["client myclient".into(), "portalB".into(), "client_ip 1.2.3.4".into()],
            vec![],
            false,
            Duration::from_secs(6),
        );
        let mut out = Vec::new();
        for (ev, _) in scanner.feed(&[IAC, DO, option::GMCP]) {
            eng.handle(&ev, &mut out);
        }
        let mut expected = Vec::new();
        expected.extend(frame::negotiation(WILL, option::GMCP));
        expected.extend(frame::gmcp_message("client myclient"));
        expected.extend(frame::gmcp_message("portalB"));
        expected.extend(frame::gmcp_message("client_ip 1.2.3.4"));
        assert_eq!(out, expected);
        assert!(eng.flags().gmcp);

        let mut out2 = Vec::new();
        for (ev, _) in scanner.feed(&[IAC, DO, option::GMCP]) {
            eng.handle(&ev, &mut out2);
        }
        assert!(out2.is_empty(), "second DO GMCP must be a no-op");
    }

    #[test]
    fn scenario_4_charset_accept() {
        let mut scanner = TelnetScanner::new();
        let mut eng = engine("1.2.3.4", &[], false);
        let mut out = Vec::new();
        for (ev, _) in scanner.feed(&[IAC, DO, option::CHARSET]) {
            eng.handle(&ev, &mut out);
        }
        let mut input = vec![IAC, 250, option::CHARSET, qualifier::REQUEST];
        input.extend_from_slice(b"UTF-8");
        input.extend_from_slice(&[IAC, SE]);
        for (ev, _) in scanner.feed(&input) {
            eng.handle(&ev, &mut out);
        }
        let mut expected = Vec::new();
        expected.extend(frame::negotiation(WILL, option::CHARSET));
        expected.extend(frame::charset_accept_utf8());
        assert_eq!(out, expected);
        assert!(eng.flags().utf8);
    }

    #[test]
    fn mccp2_will_schedules_delayed_ack_and_flips_flag_once() {
        let mut scanner = TelnetScanner::new();
        let mut eng = engine("1.2.3.4", &[], true);
        let mut out = Vec::new();
        let mut signal = OptionSignal::None;
        for (ev, _) in scanner.feed(&[IAC, WILL, option::MCCP2]) {
            signal = eng.handle(&ev, &mut out);
        }
        assert!(out.is_empty());
        assert_eq!(signal, OptionSignal::ScheduleMccp2Ack(Duration::from_secs(6)));
        assert!(eng.flags().mccp2);

        // Offering it again is a no-op.
        let mut signal2 = OptionSignal::None;
        for (ev, _) in scanner.feed(&[IAC, WILL, option::MCCP2]) {
            signal2 = eng.handle(&ev, &mut out);
        }
        assert_eq!(signal2, OptionSignal::None);
    }

    #[test]
    fn mccp2_activation_sets_compressed_and_is_silent() {
        let mut scanner = TelnetScanner::new();
        let mut eng = engine("1.2.3.4", &[], true);
        let mut out = Vec::new();
        let mut signal = OptionSignal::None;
        for (ev, _) in scanner.feed(&[IAC, 250, option::MCCP2, IAC, SE]) {
            signal = eng.handle(&ev, &mut out);
        }
        assert!(out.is_empty());
        assert_eq!(signal, OptionSignal::Mccp2Activated);
        assert!(eng.flags().compressed);
    }

    #[test]
    fn will_echo_enters_password_mode_once() {
        let mut scanner = TelnetScanner::new();
        let mut eng = engine("1.2.3.4", &[], false);
        let mut out = Vec::new();
        let mut signal = OptionSignal::None;
        for (ev, _) in scanner.feed(&[IAC, WILL, option::ECHO]) {
            signal = eng.handle(&ev, &mut out);
        }
        assert_eq!(signal, OptionSignal::EnteredPasswordMode);
        assert!(out.is_empty());

        let mut signal2 = OptionSignal::None;
        for (ev, _) in scanner.feed(&[IAC, WILL, option::ECHO]) {
            signal2 = eng.handle(&ev, &mut out);
        }
        assert_eq!(signal2, OptionSignal::None);
    }
}
