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

//! # Portal Telnet Codec
//!
//! Streaming Telnet (RFC 854) scanning and option negotiation for the
//! portal proxy.
//!
//! ## Overview
//!
//! This crate handles the Telnet side of the proxy, split into two
//! independent layers:
//!
//! - [`scanner::TelnetScanner`] walks a byte slice and reports application
//!   data runs, `WILL`/`WONT`/`DO`/`DONT` commands, and complete
//!   subnegotiations, restartably across chunk boundaries. It knows nothing
//!   about what any option means.
//! - [`options::OptionEngine`] consumes the scanner's events and applies a
//!   one-shot negotiation policy: the first time the server offers or
//!   requests an option this proxy cares about, it responds once and
//!   remembers having done so. There is no RFC 1143 Q-method collision
//!   resolution here — negotiation races are not something this proxy needs
//!   to referee.
//!
//! [`frame`] holds the pure byte-sequence builders both layers share.
//!
//! ## IAC escaping
//!
//! `0xFF` (IAC) is escaped as `IAC IAC` inside subnegotiation payloads only,
//! on both the decode and encode paths. Top-level data runs are passed
//! through uninterpreted.
#![warn(missing_docs, future_incompatible, rust_2018_idioms)]

pub mod consts;
mod error;
pub mod frame;
mod options;
pub mod scanner;

pub use error::{CodecError, CodecResult};
pub use options::{OptionEngine, OptionFlags, OptionSignal};
pub use scanner::{TelnetEvent, TelnetScanner};
