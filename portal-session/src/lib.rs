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

//! Session lifecycle, control-frame parsing, transcoding and chat bus for
//! the portal proxy.

mod chatbus;
mod config;
mod control;
mod error;
mod framer;
mod manager;
mod session;
mod types;

pub use chatbus::{chat_cleanup, ChatBus};
pub use config::ProxyConfig;
pub use control::{ChatRequest, ControlFrame, MsdpRequest, MsdpValue};
pub use error::{Result, SessionError};
pub use framer::Framer;
pub use manager::{Accepted, SessionManager};
pub use session::Session;
pub use types::{ChatEntry, SessionId, SessionIdAllocator, SessionState};
