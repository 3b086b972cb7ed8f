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

//! Canonical Telnet byte values (RFC 854) and the MUD option codes this
//! proxy negotiates.

/// Interpret-As-Command.
pub const IAC: u8 = 255;
/// Subnegotiation end.
pub const SE: u8 = 240;
/// Subnegotiation begin.
pub const SB: u8 = 250;
/// Offer to enable an option locally.
pub const WILL: u8 = 251;
/// Refuse/disable an option locally.
pub const WONT: u8 = 252;
/// Request the peer enable an option.
pub const DO: u8 = 253;
/// Request the peer disable an option.
pub const DONT: u8 = 254;

/// Option and subnegotiation-qualifier codes used by this proxy.
pub mod option {
    /// Echo.
    pub const ECHO: u8 = 1;
    /// Suppress Go Ahead.
    pub const SGA: u8 = 3;
    /// Terminal Type.
    pub const TTYPE: u8 = 24;
    /// Negotiate About Window Size.
    pub const NAWS: u8 = 31;
    /// New Environment.
    pub const NEW_ENV: u8 = 39;
    /// Charset.
    pub const CHARSET: u8 = 42;
    /// MUD Server Data Protocol.
    pub const MSDP: u8 = 69;
    /// MUD Client Compression Protocol v2.
    pub const MCCP2: u8 = 86;
    /// MUD eXtension Protocol.
    pub const MXP: u8 = 91;
    /// Achaea Telnet Client Protocol (GMCP's predecessor, kept for completeness).
    pub const ATCP: u8 = 200;
    /// Generic MUD Communication Protocol.
    pub const GMCP: u8 = 201;
}

/// Subnegotiation qualifier bytes.
pub mod qualifier {
    /// TTYPE/NEW-ENV "here is the value" qualifier.
    pub const IS: u8 = 0;
    /// TTYPE "send me the value" / CHARSET request qualifier.
    pub const REQUEST: u8 = 1;
    /// MSDP variable-name marker.
    pub const MSDP_VAR: u8 = 1;
    /// MSDP value marker.
    pub const MSDP_VAL: u8 = 2;
    /// CHARSET accepted-charset qualifier.
    pub const ACCEPTED: u8 = 2;
    /// CHARSET rejected qualifier.
    pub const REJECTED: u8 = 3;
}
