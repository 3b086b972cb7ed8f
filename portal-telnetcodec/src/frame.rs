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

//! Pure builders for outbound Telnet byte sequences.
//!
//! Every function here returns bytes to append to an upstream write buffer;
//! none of them touch a socket. Grounded on the builder shape of
//! `huhlig-wyldlands`'s `gateway/src/telnet/protocol.rs` (`build_negotiation`
//! / `build_subnegotiation`), which negotiates options the same one-shot way
//! this proxy does.

use crate::consts::{IAC, SB, SE, option, qualifier};

/// Build a three-byte `IAC <cmd> <opt>` negotiation sequence.
pub fn negotiation(cmd: u8, opt: u8) -> [u8; 3] {
    [IAC, cmd, opt]
}

/// Build `IAC SB <opt> <payload, with IAC doubled> IAC SE`.
pub fn subnegotiation(opt: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 6);
    out.push(IAC);
    out.push(SB);
    out.push(opt);
    for &b in payload {
        if b == IAC {
            out.push(IAC);
        }
        out.push(b);
    }
    out.push(IAC);
    out.push(SE);
    out
}

/// `SB TTYPE IS <name> SE` — response to `DO TTYPE` / `SB TTYPE REQUEST`.
pub fn ttype_is(name: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(name.len() + 1);
    payload.push(qualifier::IS);
    payload.extend_from_slice(name.as_bytes());
    subnegotiation(option::TTYPE, &payload)
}

/// `SB GMCP <message>` — one GMCP portal/application message.
pub fn gmcp_message(message: &str) -> Vec<u8> {
    subnegotiation(option::GMCP, message.as_bytes())
}

/// `SB MSDP MSDP_VAR <key> MSDP_VAL <val>` — one MSDP key/value pair.
pub fn msdp_pair(key: &str, val: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(key.len() + val.len() + 2);
    payload.push(qualifier::MSDP_VAR);
    payload.extend_from_slice(key.as_bytes());
    payload.push(qualifier::MSDP_VAL);
    payload.extend_from_slice(val.as_bytes());
    subnegotiation(option::MSDP, &payload)
}

/// Canonical "accept UTF-8" CHARSET response: `SB CHARSET ACCEPTED "UTF-8" SE`.
pub fn charset_accept_utf8() -> Vec<u8> {
    let mut payload = vec![qualifier::ACCEPTED];
    payload.extend_from_slice(b"UTF-8");
    subnegotiation(option::CHARSET, &payload)
}

/// `SB NEW-ENV IS IS "IPADDRESS" REQUEST <remote addr> SE` — reply to a
/// NEW-ENV `REQUEST` naming the session's remote address.
pub fn new_env_ipaddress(remote_addr: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(remote_addr.len() + 14);
    payload.push(qualifier::IS);
    payload.push(qualifier::IS);
    payload.extend_from_slice(b"IPADDRESS");
    payload.push(qualifier::REQUEST);
    payload.extend_from_slice(remote_addr.as_bytes());
    subnegotiation(option::NEW_ENV, &payload)
}
