// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Transport framing: fixed-size segments, big-endian frame header,
//! outbound segmentation.
//!
//! A logical message travels as one _frame_, split across fixed 64-byte
//! transport segments. Only the first segment of a frame carries the header;
//! continuation segments are raw payload bytes. Unlike payload fields the
//! header multi-byte fields are big-endian on the wire, preserved from the
//! established transport contract, and are swapped exactly once at the
//! framing boundary.
//!
//! ## First segment encoding:
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     '#'       |      '#'      |      '?'      | MSG_TYPE (BE) :
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! :               |                PAYLOAD_LEN (BE)               :
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! :               |                                               |
//! +-+-+-+-+-+-+-+-+                                               /
//! /                       PAYLOAD (55 bytes)                      /
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Continuation segments carry 64 payload bytes with no marker; a segment
//! opening with the two-byte preamble always begins a new frame.

use byteorder::{BigEndian, ByteOrder};

use crate::WireError;

/// Fixed transport segment length in bytes (HID report sized)
pub const SEGMENT_LEN: usize = 64;

/// Frame preamble, first two bytes of a header segment
pub const FRAME_PREAMBLE: [u8; 2] = *b"##";

/// Frame marker byte, third byte of a header segment
pub const FRAME_MARKER: u8 = b'?';

/// Total header length in the first segment
pub const FRAME_HDR_LEN: usize = 9;

/// Payload bytes carried by the first segment of a frame
pub const FIRST_SEGMENT_BODY: usize = SEGMENT_LEN - FRAME_HDR_LEN;

/// Parsed frame header
///
/// `msg_id` is kept raw here (not [MsgType][crate::MsgType]) so the
/// transport can count unknown identifiers before dropping them.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct FrameHeader {
    /// Message type identifier
    pub msg_id: u16,
    /// Declared payload length in bytes
    pub len: u32,
}

impl FrameHeader {
    /// Create a new frame header
    pub fn new(msg_id: u16, len: u32) -> Self {
        Self { msg_id, len }
    }

    /// Write the 9-byte header to the front of a segment buffer
    pub fn write(&self, seg: &mut [u8]) -> Result<usize, WireError> {
        if seg.len() < FRAME_HDR_LEN {
            return Err(WireError::InvalidLength);
        }

        seg[..2].copy_from_slice(&FRAME_PREAMBLE);
        seg[2] = FRAME_MARKER;
        BigEndian::write_u16(&mut seg[3..5], self.msg_id);
        BigEndian::write_u32(&mut seg[5..9], self.len);

        Ok(FRAME_HDR_LEN)
    }

    /// Parse a header from the front of a segment buffer
    ///
    /// Returns [WireError::InvalidLength] for runt segments and
    /// [WireError::InvalidHeader] when the preamble or marker is wrong.
    pub fn parse(seg: &[u8]) -> Result<Self, WireError> {
        if seg.len() < FRAME_HDR_LEN {
            return Err(WireError::InvalidLength);
        }
        if seg[..2] != FRAME_PREAMBLE || seg[2] != FRAME_MARKER {
            return Err(WireError::InvalidHeader);
        }

        Ok(Self {
            msg_id: BigEndian::read_u16(&seg[3..5]),
            len: BigEndian::read_u32(&seg[5..9]),
        })
    }
}

/// Check whether a segment opens with the frame preamble
///
/// Preamble-bearing segments always start a new frame, overriding any
/// in-progress accumulation on the receive side.
pub fn is_frame_start(seg: &[u8]) -> bool {
    seg.len() >= 2 && seg[..2] == FRAME_PREAMBLE
}

/// Outbound segmenter, yields fixed 64-byte segments for a framed message
///
/// The first yielded segment carries the header, the remainder raw payload.
/// Short tails are zero padded to the full segment length.
pub struct Segmenter<'a> {
    header: FrameHeader,
    payload: &'a [u8],
    offset: usize,
    started: bool,
}

impl<'a> Segmenter<'a> {
    /// Create a segmenter for a message id and encoded payload
    pub fn new(msg_id: u16, payload: &'a [u8]) -> Self {
        Self {
            header: FrameHeader::new(msg_id, payload.len() as u32),
            payload,
            offset: 0,
            started: false,
        }
    }

    /// Total number of segments this message occupies
    pub fn segment_count(&self) -> usize {
        if self.payload.len() <= FIRST_SEGMENT_BODY {
            1
        } else {
            1 + (self.payload.len() - FIRST_SEGMENT_BODY + SEGMENT_LEN - 1) / SEGMENT_LEN
        }
    }
}

impl<'a> Iterator for Segmenter<'a> {
    type Item = [u8; SEGMENT_LEN];

    fn next(&mut self) -> Option<Self::Item> {
        let mut seg = [0u8; SEGMENT_LEN];

        if !self.started {
            self.started = true;

            // Header write to a SEGMENT_LEN buffer cannot fail
            let _ = self.header.write(&mut seg);

            let n = core::cmp::min(self.payload.len(), FIRST_SEGMENT_BODY);
            seg[FRAME_HDR_LEN..FRAME_HDR_LEN + n].copy_from_slice(&self.payload[..n]);
            self.offset = n;

            return Some(seg);
        }

        if self.offset >= self.payload.len() {
            return None;
        }

        let n = core::cmp::min(self.payload.len() - self.offset, SEGMENT_LEN);
        seg[..n].copy_from_slice(&self.payload[self.offset..self.offset + n]);
        self.offset += n;

        Some(seg)
    }
}
