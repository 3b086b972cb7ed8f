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

//! The streaming Telnet scanner: walks a byte slice and reports IAC
//! sequences plus the application-byte runs between them, restartably
//! across chunk boundaries.

use crate::consts::{DO, DONT, IAC, SB, SE, WILL, WONT};
use bytes::Bytes;

/// One event located by the scanner, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    /// A run of application bytes to forward to the client unchanged.
    Data(Bytes),
    /// `WILL`/`WONT`/`DO`/`DONT` with its option byte.
    Command(u8, u8),
    /// A complete `SB <opt> ... SE` body, with `IAC IAC` escapes inside the
    /// payload collapsed to a single `0xFF`.
    Subneg(u8, Bytes),
}

/// Streaming, restartable Telnet scanner.
///
/// Bytes left over at the end of a `feed()` call because they form an
/// incomplete command or subnegotiation are buffered and consumed by the
/// next call — this buffer is the "resumable...scan buffer" the pipeline
/// is built around.
#[derive(Debug, Default)]
pub struct TelnetScanner {
    pending: Vec<u8>,
}

impl TelnetScanner {
    /// Create an empty scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a partial sequence is buffered awaiting more bytes.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Discard any buffered partial sequence.
    ///
    /// A caller that stops trusting a `feed()` call partway through its
    /// returned events (MCCP2 activation mid-buffer: everything scanned
    /// after the activating subnegotiation is raw deflate data the scanner
    /// mistook for telnet syntax) must reset here before resuming with the
    /// inflater's output, so no leftover bytes from the misread tail carry
    /// into the next call.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Feed a new slice of bytes (a single arrival, or a fragment of one).
    ///
    /// Returns events paired with the offset into `input` (end-exclusive,
    /// saturating at 0) at which the event's bytes are fully consumed. This
    /// lets a caller that splits the stream mid-arrival (MCCP2 activation)
    /// locate the split point without the scanner knowing about compression.
    pub fn feed(&mut self, input: &[u8]) -> Vec<(TelnetEvent, usize)> {
        let carry = self.pending.len();
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(input);
        let n = buf.len();

        let mut events = Vec::new();
        let mut i = 0usize;
        let mut data_start = 0usize;

        let input_offset = |end: usize| end.saturating_sub(carry);

        while i < n {
            if buf[i] != IAC {
                i += 1;
                continue;
            }

            // buf[i] is IAC; need at least one more byte to know what it is.
            if i + 1 >= n {
                Self::flush_data(&buf, data_start, i, &mut events, input_offset);
                self.pending = buf[i..n].to_vec();
                return events;
            }

            match buf[i + 1] {
                SB => {
                    if i + 2 >= n {
                        Self::flush_data(&buf, data_start, i, &mut events, input_offset);
                        self.pending = buf[i..n].to_vec();
                        return events;
                    }
                    let opt = buf[i + 2];
                    let mut j = i + 3;
                    let mut payload = Vec::new();
                    let mut closed = false;
                    while j < n {
                        if buf[j] == IAC {
                            if j + 1 >= n {
                                break; // incomplete, need more bytes
                            }
                            match buf[j + 1] {
                                SE => {
                                    j += 2;
                                    closed = true;
                                    break;
                                }
                                IAC => {
                                    payload.push(0xFF);
                                    j += 2;
                                }
                                other => {
                                    // Not a valid in-payload escape; keep both
                                    // bytes literally rather than dropping
                                    // them (malformed sequences are never
                                    // silently discarded).
                                    payload.push(IAC);
                                    payload.push(other);
                                    j += 2;
                                }
                            }
                        } else {
                            payload.push(buf[j]);
                            j += 1;
                        }
                    }
                    if closed {
                        Self::flush_data(&buf, data_start, i, &mut events, input_offset);
                        events.push((TelnetEvent::Subneg(opt, Bytes::from(payload)), input_offset(j)));
                        i = j;
                        data_start = j;
                    } else {
                        Self::flush_data(&buf, data_start, i, &mut events, input_offset);
                        self.pending = buf[i..n].to_vec();
                        return events;
                    }
                }
                WILL | WONT | DO | DONT => {
                    let cmd = buf[i + 1];
                    if i + 2 >= n {
                        Self::flush_data(&buf, data_start, i, &mut events, input_offset);
                        self.pending = buf[i..n].to_vec();
                        return events;
                    }
                    let opt = buf[i + 2];
                    Self::flush_data(&buf, data_start, i, &mut events, input_offset);
                    events.push((TelnetEvent::Command(cmd, opt), input_offset(i + 3)));
                    i += 3;
                    data_start = i;
                }
                _ => {
                    // IAC followed by an unknown/unhandled command byte:
                    // malformed, surfaced as data, never dropped. Just keep
                    // scanning; these bytes stay part of the current data
                    // run and are flushed with it.
                    i += 2;
                }
            }
        }

        Self::flush_data(&buf, data_start, n, &mut events, input_offset);
        self.pending.clear();
        events
    }

    fn flush_data(
        buf: &[u8],
        start: usize,
        end: usize,
        events: &mut Vec<(TelnetEvent, usize)>,
        input_offset: impl Fn(usize) -> usize,
    ) {
        if end > start {
            events.push((
                TelnetEvent::Data(Bytes::copy_from_slice(&buf[start..end])),
                input_offset(end),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::option;

    fn events_only(scanner: &mut TelnetScanner, input: &[u8]) -> Vec<TelnetEvent> {
        scanner.feed(input).into_iter().map(|(e, _)| e).collect()
    }

    #[test]
    fn plain_data_passes_through() {
        let mut s = TelnetScanner::new();
        let events = events_only(&mut s, b"hello");
        assert_eq!(events, vec![TelnetEvent::Data(Bytes::from_static(b"hello"))]);
    }

    #[test]
    fn command_is_reported_and_data_is_split_around_it() {
        let mut s = TelnetScanner::new();
        let mut input = b"ab".to_vec();
        input.extend_from_slice(&[IAC, DO, option::TTYPE]);
        input.extend_from_slice(b"cd");
        let events = events_only(&mut s, &input);
        assert_eq!(
            events,
            vec![
                TelnetEvent::Data(Bytes::from_static(b"ab")),
                TelnetEvent::Command(DO, option::TTYPE),
                TelnetEvent::Data(Bytes::from_static(b"cd")),
            ]
        );
    }

    #[test]
    fn subneg_collapses_doubled_iac_in_payload() {
        let mut s = TelnetScanner::new();
        let input = [IAC, SB, option::GMCP, 0x01, IAC, IAC, 0x02, IAC, SE];
        let events = events_only(&mut s, &input);
        assert_eq!(
            events,
            vec![TelnetEvent::Subneg(option::GMCP, Bytes::from_static(&[0x01, 0xFF, 0x02]))]
        );
    }

    #[test]
    fn incomplete_command_is_buffered_and_resumed() {
        let mut s = TelnetScanner::new();
        let first = events_only(&mut s, &[b'x', IAC, DO]);
        assert_eq!(first, vec![TelnetEvent::Data(Bytes::from_static(b"x"))]);
        assert!(s.has_pending());
        let second = events_only(&mut s, &[option::TTYPE, b'y']);
        assert_eq!(
            second,
            vec![
                TelnetEvent::Command(DO, option::TTYPE),
                TelnetEvent::Data(Bytes::from_static(b"y")),
            ]
        );
        assert!(!s.has_pending());
    }

    #[test]
    fn incomplete_subneg_is_buffered_and_resumed() {
        let mut s = TelnetScanner::new();
        let first = events_only(&mut s, &[IAC, SB, option::MCCP2, IAC]);
        assert!(first.is_empty());
        let second = events_only(&mut s, &[SE]);
        assert_eq!(second, vec![TelnetEvent::Subneg(option::MCCP2, Bytes::new())]);
    }

    #[test]
    fn reset_discards_a_buffered_partial_sequence() {
        let mut s = TelnetScanner::new();
        events_only(&mut s, &[b'x', IAC, DO]);
        assert!(s.has_pending());
        s.reset();
        assert!(!s.has_pending());
    }

    #[test]
    fn malformed_iac_command_is_surfaced_as_data_not_dropped() {
        let mut s = TelnetScanner::new();
        // IAC followed by an unassigned/unknown command byte (0x01).
        let events = events_only(&mut s, &[b'a', IAC, 0x01, b'b']);
        assert_eq!(events, vec![TelnetEvent::Data(Bytes::from_static(&[b'a', IAC, 0x01, b'b']))]);
    }

    #[test]
    fn splitting_input_arbitrarily_yields_the_same_event_stream() {
        let whole = {
            let mut v = b"Hi".to_vec();
            v.extend_from_slice(&[IAC, WILL, option::SGA]);
            v.extend_from_slice(&[IAC, SB, option::GMCP, b'x', IAC, SE]);
            v.extend_from_slice(b"bye");
            v
        };

        let mut baseline = TelnetScanner::new();
        let expected = events_only(&mut baseline, &whole);

        for split in 0..=whole.len() {
            let mut s = TelnetScanner::new();
            let mut got = events_only(&mut s, &whole[..split]);
            got.extend(events_only(&mut s, &whole[split..]));
            assert_eq!(got, expected, "mismatch splitting at {split}");
        }
    }

    #[test]
    fn offsets_point_into_the_fed_slice() {
        let mut s = TelnetScanner::new();
        let input = [b'a', b'b', IAC, WILL, option::ECHO, b'c'];
        let events = s.feed(&input);
        assert_eq!(events[0], (TelnetEvent::Data(Bytes::from_static(b"ab")), 2));
        assert_eq!(events[1], (TelnetEvent::Command(WILL, option::ECHO), 5));
        assert_eq!(events[2], (TelnetEvent::Data(Bytes::from_static(b"c")), 6));
    }
}
