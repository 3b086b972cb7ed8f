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

//! # Portal Compress
//!
//! Raw DEFLATE (RFC 1951) compression for the two directions the proxy
//! needs it: MCCP2's continuous, server-driven stream, and the proxy's own
//! optional per-frame compression of outbound traffic to the browser.
//!
//! MCCP2 gives no per-chunk framing: once activated, every byte the
//! upstream server sends is part of one continuous DEFLATE stream for the
//! rest of the connection, and a single arrival from the socket can end
//! mid-block. [`Inflater`] wraps `flate2`'s low-level [`flate2::Decompress`]
//! directly (not the `Read`/`Write` adapters) so that its internal window
//! and bit buffer persist across calls exactly the way the upstream byte
//! stream itself does, rather than being reset on every `inflate()` call.
//! Grounded on the MCCP handling in `selberhad-okros`, which reaches for
//! `flate2` for the same reason.
//!
//! [`Deflator`] is unrelated to MCCP2: it is the proxy's own optional
//! compression of server→client frames, finishing a fresh DEFLATE stream
//! per call so each outbound frame decodes independently in the browser.
#![warn(missing_docs, future_incompatible, rust_2018_idioms)]

mod error;

pub use error::{CompressError, CompressResult};

use flate2::{Decompress, Status};

const OUTPUT_CHUNK: usize = 8192;

/// Stateful raw-DEFLATE inflater for one MCCP2 stream.
///
/// One `Inflater` is created per session at the moment its MCCP2 scan
/// buffer activates (see `portal_telnetcodec::OptionSignal::Mccp2Activated`)
/// and lives for the rest of that session.
pub struct Inflater {
    inner: Decompress,
}

impl Inflater {
    /// Create an inflater for a raw DEFLATE stream (no zlib header, per
    /// MCCP2).
    pub fn new() -> Self {
        Self { inner: Decompress::new(false) }
    }

    /// Inflate as much of `input` as the current stream state allows,
    /// returning the decompressed bytes produced. Any partial state needed
    /// to continue across a future call is kept in `self`.
    pub fn inflate(&mut self, input: &[u8]) -> CompressResult<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len().max(64) * 2);
        let mut chunk = [0u8; OUTPUT_CHUNK];
        let mut consumed_total = 0usize;

        loop {
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();
            let status = self.inner.decompress(
                &input[consumed_total..],
                &mut chunk,
                flate2::FlushDecompress::None,
            )?;
            let consumed = (self.inner.total_in() - before_in) as usize;
            let produced = (self.inner.total_out() - before_out) as usize;
            output.extend_from_slice(&chunk[..produced]);
            consumed_total += consumed;

            if status == Status::StreamEnd {
                break;
            }
            if consumed == 0 && produced == 0 {
                break;
            }
            if consumed_total >= input.len() {
                break;
            }
        }

        Ok(output)
    }

    /// Total bytes of compressed input consumed across this stream's
    /// lifetime.
    pub fn total_in(&self) -> u64 {
        self.inner.total_in()
    }

    /// Total bytes of decompressed output produced across this stream's
    /// lifetime.
    pub fn total_out(&self) -> u64 {
        self.inner.total_out()
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot raw-DEFLATE compressor for the non-MCCP outbound path.
///
/// Each call to [`Deflator::compress`] finishes its own DEFLATE stream, so
/// the block it produces is independently inflatable by the browser client
/// without carrying state from one outbound frame to the next — unlike
/// [`Inflater`], which exists specifically because MCCP2's stream is
/// continuous.
pub struct Deflator;

impl Deflator {
    /// Create a deflator.
    pub fn new() -> Self {
        Self
    }

    /// Compress `input` into a single, self-contained raw DEFLATE block.
    pub fn compress(&self, input: &[u8]) -> CompressResult<Vec<u8>> {
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = DeflateEncoder::new(Vec::with_capacity(input.len()), Compression::default());
        encoder.write_all(input)?;
        Ok(encoder.finish()?)
    }
}

impl Default for Deflator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn raw_deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn inflates_a_single_arrival() {
        let plain = b"You see a rusty sword lying on the ground.".repeat(4);
        let compressed = raw_deflate(&plain);
        let mut inflater = Inflater::new();
        let out = inflater.inflate(&compressed).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn preserves_state_across_split_arrivals() {
        let plain = b"The orc swings its axe and misses.".repeat(8);
        let compressed = raw_deflate(&plain);
        let mid = compressed.len() / 2;

        let mut inflater = Inflater::new();
        let mut out = inflater.inflate(&compressed[..mid]).unwrap();
        out.extend(inflater.inflate(&compressed[mid..]).unwrap());
        assert_eq!(out, plain);
    }

    #[test]
    fn byte_at_a_time_arrivals_still_reassemble() {
        let plain = b"A small bird flutters overhead.";
        let compressed = raw_deflate(plain);
        let mut inflater = Inflater::new();
        let mut out = Vec::new();
        for byte in &compressed {
            out.extend(inflater.inflate(std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(out, plain);
    }

    #[test]
    fn corrupt_stream_surfaces_as_compress_error() {
        let mut inflater = Inflater::new();
        let garbage = [0xFFu8; 16];
        assert!(inflater.inflate(&garbage).is_err());
    }

    #[test]
    fn deflate_then_inflate_round_trips() {
        let plain = b"The door creaks open slowly.".repeat(3);
        let deflator = Deflator::new();
        let compressed = deflator.compress(&plain).unwrap();
        let mut inflater = Inflater::new();
        assert_eq!(inflater.inflate(&compressed).unwrap(), plain);
    }

    #[test]
    fn each_deflator_block_is_independently_inflatable() {
        let deflator = Deflator::new();
        let a = deflator.compress(b"first message").unwrap();
        let b = deflator.compress(b"second message").unwrap();

        let mut fresh_inflater_a = Inflater::new();
        let mut fresh_inflater_b = Inflater::new();
        assert_eq!(fresh_inflater_a.inflate(&a).unwrap(), b"first message");
        assert_eq!(fresh_inflater_b.inflate(&b).unwrap(), b"second message");
    }
}
