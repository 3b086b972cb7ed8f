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

//! Error type for the Telnet codec crate.

use thiserror::Error;

/// Result alias for this crate.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Errors raised while negotiating Telnet options.
///
/// The scanner itself never errors — malformed byte sequences are passed
/// through as data per the protocol's error-handling policy. This type
/// exists for the option-negotiation operations layered on top of it.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A subnegotiation carried a payload this proxy could not interpret.
    #[error("malformed subnegotiation for option {option}: {reason}")]
    MalformedSubnegotiation {
        /// The option code the subnegotiation was for.
        option: u8,
        /// Human-readable reason.
        reason: &'static str,
    },
}
