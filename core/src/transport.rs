// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Segment transport: frame reassembly, outbound segmentation, link
//! statistics.
//!
//! [`Transport`] sits between the physical 64-byte segment pipe and the
//! engine. Inbound segments are accumulated until the declared payload
//! length is reached, at which point [`Transport::push_segment`] reports
//! the completed frame exactly once and [`Transport::payload`] exposes
//! the reassembled bytes. Malformed traffic (runts, bad headers, stray
//! continuations, oversize declarations) is counted and dropped without
//! disturbing engine state, a preamble segment always wins over any
//! partial frame in progress.

use heapless::Vec;
use zeroize::Zeroize;

use keywarden_wire::{
    frame::{self, FrameHeader, Segmenter, FIRST_SEGMENT_BODY, FRAME_HDR_LEN, SEGMENT_LEN},
    MSG_MAX_LEN,
};

/// Transport errors
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[repr(u8)]
pub enum TransportError {
    /// Outbound message exceeds frame capacity
    #[cfg_attr(feature = "thiserror", error("message exceeds frame capacity"))]
    Overflow = 0x01,

    /// Segment transmit rejected by the link
    #[cfg_attr(feature = "thiserror", error("segment transmit failed"))]
    TxFailed = 0x02,
}

/// Link statistics, monotonic over the life of the transport
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct TransportStats {
    /// Frames fully reassembled
    pub rx_frames: u32,
    /// Frames segmented and sent
    pub tx_frames: u32,
    /// Segments shorter than [`SEGMENT_LEN`]
    pub runts: u32,
    /// Segments with no preamble and no frame in progress
    pub bad_preamble: u32,
    /// Preamble segments whose header failed to parse
    pub bad_headers: u32,
    /// Partial frames dropped by a new preamble
    pub discarded: u32,
    /// Frames declaring more than [`MSG_MAX_LEN`] payload bytes
    pub oversize: u32,
    /// Completed frames with an unrecognised message id
    pub unknown_msgs: u32,
    /// Completed frames whose payload failed to decode
    pub decode_failures: u32,
    /// Segment transmit failures
    pub tx_failures: u32,
}

enum RxState {
    /// No frame in progress
    Idle,
    /// Accumulating payload for a frame
    Rx { msg_id: u16, expected: usize },
    /// Swallowing continuations of an oversize frame
    Drain { remaining: usize },
}

/// Frame transport over a fixed-size segment pipe
pub struct Transport {
    rx: Vec<u8, MSG_MAX_LEN>,
    state: RxState,
    stats: TransportStats,
}

impl Transport {
    /// Create a new transport in the idle state
    pub const fn new() -> Self {
        Self {
            rx: Vec::new(),
            state: RxState::Idle,
            stats: TransportStats {
                rx_frames: 0,
                tx_frames: 0,
                runts: 0,
                bad_preamble: 0,
                bad_headers: 0,
                discarded: 0,
                oversize: 0,
                unknown_msgs: 0,
                decode_failures: 0,
                tx_failures: 0,
            },
        }
    }

    /// Feed one inbound segment.
    ///
    /// Returns `Some((msg_id, payload_len))` exactly once per completed
    /// frame, with the payload available via [`Transport::payload`]
    /// until the next frame starts. All malformed input is absorbed
    /// here, the caller only ever sees whole frames.
    pub fn push_segment(&mut self, seg: &[u8]) -> Option<(u16, usize)> {
        if seg.len() != SEGMENT_LEN {
            #[cfg(feature = "log")]
            log::debug!("runt segment: {} bytes", seg.len());
            self.stats.runts += 1;
            return None;
        }

        // A preamble always opens a new frame
        if frame::is_frame_start(seg) {
            if matches!(self.state, RxState::Rx { .. }) {
                #[cfg(feature = "log")]
                log::debug!("partial frame discarded by new preamble");
                self.stats.discarded += 1;
            }
            self.reset_rx();

            let hdr = match FrameHeader::parse(seg) {
                Ok(h) => h,
                Err(_) => {
                    self.stats.bad_headers += 1;
                    return None;
                }
            };

            let expected = hdr.len as usize;
            if expected > MSG_MAX_LEN {
                #[cfg(feature = "log")]
                log::warn!("oversize frame: {} bytes (max {})", expected, MSG_MAX_LEN);
                self.stats.oversize += 1;

                // Swallow the continuations so they are not misread
                // as preamble noise, oversize always spills past the
                // first segment
                self.state = RxState::Drain {
                    remaining: expected - FIRST_SEGMENT_BODY,
                };
                return None;
            }

            let n = expected.min(FIRST_SEGMENT_BODY);
            // rx was just reset, capacity covers the full declared length
            let _ = self.rx.extend_from_slice(&seg[FRAME_HDR_LEN..FRAME_HDR_LEN + n]);

            return self.try_complete(hdr.msg_id, expected);
        }

        match self.state {
            RxState::Idle => {
                self.stats.bad_preamble += 1;
                None
            }
            RxState::Drain { remaining } => {
                let remaining = remaining.saturating_sub(SEGMENT_LEN);
                self.state = match remaining {
                    0 => RxState::Idle,
                    r => RxState::Drain { remaining: r },
                };
                None
            }
            RxState::Rx { msg_id, expected } => {
                let n = (expected - self.rx.len()).min(SEGMENT_LEN);
                let _ = self.rx.extend_from_slice(&seg[..n]);

                self.try_complete(msg_id, expected)
            }
        }
    }

    fn try_complete(&mut self, msg_id: u16, expected: usize) -> Option<(u16, usize)> {
        if self.rx.len() < expected {
            self.state = RxState::Rx { msg_id, expected };
            return None;
        }

        self.state = RxState::Idle;
        self.stats.rx_frames += 1;

        #[cfg(feature = "log")]
        log::trace!("frame complete: id {} len {}", msg_id, expected);

        Some((msg_id, expected))
    }

    /// Payload of the most recently completed frame
    pub fn payload(&self) -> &[u8] {
        &self.rx
    }

    /// Segment and transmit an outbound message.
    ///
    /// `tx` is called once per segment and reports link acceptance, a
    /// rejected segment abandons the remainder of the frame.
    pub fn send(
        &mut self,
        msg_id: u16,
        payload: &[u8],
        mut tx: impl FnMut(&[u8; SEGMENT_LEN]) -> bool,
    ) -> Result<(), TransportError> {
        if payload.len() > MSG_MAX_LEN {
            return Err(TransportError::Overflow);
        }

        for seg in Segmenter::new(msg_id, payload) {
            if !tx(&seg) {
                self.stats.tx_failures += 1;
                return Err(TransportError::TxFailed);
            }
        }

        self.stats.tx_frames += 1;
        Ok(())
    }

    /// Record a completed frame whose message id is not recognised
    pub fn note_unknown(&mut self, _msg_id: u16) {
        #[cfg(feature = "log")]
        log::debug!("unknown message id: {}", _msg_id);
        self.stats.unknown_msgs += 1;
    }

    /// Record a completed frame whose payload failed to decode
    pub fn note_decode_failure(&mut self, _msg_id: u16) {
        #[cfg(feature = "log")]
        log::debug!("undecodable payload for message id: {}", _msg_id);
        self.stats.decode_failures += 1;
    }

    /// Link statistics
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Zeroize and drop any buffered receive state
    pub fn reset_rx(&mut self) {
        let buff: &mut [u8] = &mut self.rx;
        buff.zeroize();

        self.rx.clear();
        self.state = RxState::Idle;
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(msg_id: u16, payload: &[u8]) -> std::vec::Vec<[u8; SEGMENT_LEN]> {
        Segmenter::new(msg_id, payload).collect()
    }

    #[test]
    fn single_segment_frame() {
        let mut t = Transport::new();

        let segs = segments(1, b"hello");
        assert_eq!(segs.len(), 1);

        assert_eq!(t.push_segment(&segs[0]), Some((1, 5)));
        assert_eq!(t.payload(), b"hello");
        assert_eq!(t.stats().rx_frames, 1);
    }

    #[test]
    fn zero_length_frame() {
        let mut t = Transport::new();

        let segs = segments(0, &[]);
        assert_eq!(t.push_segment(&segs[0]), Some((0, 0)));
        assert!(t.payload().is_empty());
    }

    #[test]
    fn reassembles_and_reports_once() {
        let mut t = Transport::new();

        // 140 bytes spans a header segment and two continuations
        let payload: std::vec::Vec<u8> = (0..140u8).collect();
        let segs = segments(55, &payload);
        assert_eq!(segs.len(), 3);

        assert_eq!(t.push_segment(&segs[0]), None);
        assert_eq!(t.push_segment(&segs[1]), None);
        assert_eq!(t.push_segment(&segs[2]), Some((55, 140)));

        assert_eq!(t.payload(), &payload[..]);
        assert_eq!(t.stats().rx_frames, 1);

        // A stray continuation after completion is preamble noise
        assert_eq!(t.push_segment(&segs[1]), None);
        assert_eq!(t.stats().rx_frames, 1);
        assert_eq!(t.stats().bad_preamble, 1);
    }

    #[test]
    fn runt_counted_and_ignored() {
        let mut t = Transport::new();

        assert_eq!(t.push_segment(&[0u8; 10]), None);
        assert_eq!(t.stats().runts, 1);

        // Link recovers for a well formed frame
        let segs = segments(2, b"ok");
        assert_eq!(t.push_segment(&segs[0]), Some((2, 2)));
    }

    #[test]
    fn bad_marker_counted() {
        let mut t = Transport::new();

        let mut seg = segments(3, b"x")[0];
        seg[2] = b'!';

        assert_eq!(t.push_segment(&seg), None);
        assert_eq!(t.stats().bad_headers, 1);
        assert_eq!(t.stats().rx_frames, 0);
    }

    #[test]
    fn preamble_discards_partial_frame() {
        let mut t = Transport::new();

        let long: std::vec::Vec<u8> = (0..100u8).collect();
        let partial = segments(7, &long);
        assert_eq!(t.push_segment(&partial[0]), None);

        // A fresh frame arrives before the continuation
        let fresh = segments(8, b"fresh");
        assert_eq!(t.push_segment(&fresh[0]), Some((8, 5)));
        assert_eq!(t.payload(), b"fresh");
        assert_eq!(t.stats().discarded, 1);
        assert_eq!(t.stats().rx_frames, 1);
    }

    #[test]
    fn oversize_frame_drained() {
        let mut t = Transport::new();

        // Declares one byte more than the transport will buffer
        let mut seg = [0u8; SEGMENT_LEN];
        FrameHeader::new(9, (MSG_MAX_LEN + 1) as u32)
            .write(&mut seg)
            .unwrap();

        assert_eq!(t.push_segment(&seg), None);
        assert_eq!(t.stats().oversize, 1);

        // Continuations are swallowed, not misread as noise
        let body = MSG_MAX_LEN + 1 - FIRST_SEGMENT_BODY;
        let conts = (body + SEGMENT_LEN - 1) / SEGMENT_LEN;
        for _ in 0..conts {
            assert_eq!(t.push_segment(&[0xaau8; SEGMENT_LEN]), None);
        }
        assert_eq!(t.stats().bad_preamble, 0);

        // And the link recovers
        let segs = segments(10, b"after");
        assert_eq!(t.push_segment(&segs[0]), Some((10, 5)));
    }

    #[test]
    fn send_segments_round_trip() {
        let mut t = Transport::new();

        let payload: std::vec::Vec<u8> = (0..140u8).collect();
        let mut sent = std::vec::Vec::new();

        t.send(12, &payload, |seg| {
            sent.push(*seg);
            true
        })
        .unwrap();

        assert_eq!(sent.len(), 3);
        assert_eq!(t.stats().tx_frames, 1);

        // Remote side reassembles the same bytes
        let mut rx = Transport::new();
        let mut done = None;
        for seg in &sent {
            done = rx.push_segment(seg);
        }
        assert_eq!(done, Some((12, 140)));
        assert_eq!(rx.payload(), &payload[..]);
    }

    #[test]
    fn send_aborts_on_rejected_segment() {
        let mut t = Transport::new();

        let payload = [0u8; 200];
        let mut calls = 0;

        let r = t.send(13, &payload, |_| {
            calls += 1;
            calls < 2
        });

        assert_eq!(r, Err(TransportError::TxFailed));
        assert_eq!(calls, 2);
        assert_eq!(t.stats().tx_frames, 0);
        assert_eq!(t.stats().tx_failures, 1);
    }

    #[test]
    fn send_rejects_oversize_payload() {
        let mut t = Transport::new();

        let payload = [0u8; MSG_MAX_LEN + 1];
        let r = t.send(14, &payload, |_| true);

        assert_eq!(r, Err(TransportError::Overflow));
    }
}
