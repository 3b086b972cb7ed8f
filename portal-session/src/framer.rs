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

//! Transcoder / Framer (§4.7): wire encoding between browser text frames
//! and the raw telnet byte stream.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use portal_compress::Deflator;

/// Encodes outbound bytes (server→client) and inbound text (client→upstream).
#[derive(Debug, Default)]
pub struct Framer {
    deflator: Deflator,
}

impl Framer {
    /// Build a fresh framer.
    pub fn new() -> Self {
        Self { deflator: Deflator::new() }
    }

    /// Frame a server→client arrival as base64 text, per §4.7.
    ///
    /// When MCCP2 is not active and compression is globally enabled, `buf`
    /// is first passed through a one-shot raw-deflate block so the browser
    /// can inflate each frame independently; on compressor failure the raw
    /// bytes are sent instead.
    pub fn encode_outbound(&self, buf: &[u8], mccp_active: bool, global_compress: bool) -> String {
        if !mccp_active && global_compress {
            match self.deflator.compress(buf) {
                Ok(compressed) => return BASE64.encode(compressed),
                Err(err) => {
                    tracing::warn!(error = %err, "outbound compression failed, sending raw bytes");
                }
            }
        }
        BASE64.encode(buf)
    }

    /// Encode client→upstream text as Latin-1: byte i := codepoint & 0xFF.
    pub fn encode_inbound(text: &str) -> Vec<u8> {
        text.chars().map(|c| (c as u32 & 0xFF) as u8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_without_compression_is_plain_base64() {
        let framer = Framer::new();
        let encoded = framer.encode_outbound(b"hello", false, false);
        assert_eq!(encoded, BASE64.encode(b"hello"));
    }

    #[test]
    fn outbound_while_mccp_active_skips_deflate_even_if_enabled() {
        let framer = Framer::new();
        let encoded = framer.encode_outbound(b"hello", true, true);
        assert_eq!(encoded, BASE64.encode(b"hello"));
    }

    #[test]
    fn outbound_with_global_compress_deflates_first() {
        let framer = Framer::new();
        let encoded = framer.encode_outbound(b"hello hello hello", false, true);
        assert_ne!(encoded, BASE64.encode(b"hello hello hello"));
    }

    #[test]
    fn inbound_encodes_to_single_byte_per_codepoint() {
        let bytes = Framer::encode_inbound("Ab1");
        assert_eq!(bytes, vec![b'A', b'b', b'1']);
    }

    #[test]
    fn inbound_truncates_codepoints_above_0xff() {
        let bytes = Framer::encode_inbound("\u{1234}");
        assert_eq!(bytes, vec![0x34]);
    }
}
