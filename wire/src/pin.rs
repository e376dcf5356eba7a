// Copyright (c) 2022-2023 The MobileCoin Foundation

//! PIN matrix round-trip messages.
//!
//! The device never receives PIN digits directly. It displays a scrambled
//! 3x3 matrix and the host sends the _positions_ the user selected, so a
//! compromised host learns nothing about the digit values. Position
//! strings are digits `1..=9`, up to [PIN_MAX_LEN][crate::PIN_MAX_LEN]
//! characters.

use encdec::{Decode, DecodeOwned, Encode};
use num_enum::TryFromPrimitive;

use crate::{
    helpers::{arr, take_str},
    MsgStatic, MsgType, WireError, PIN_MAX_LEN,
};

/// Which PIN the device is asking for
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive, strum::Display)]
#[repr(u8)]
pub enum PinMatrixKind {
    /// The currently configured PIN
    Current = 1,
    /// First entry of a new PIN
    NewFirst = 2,
    /// Confirmation entry of a new PIN
    NewSecond = 3,
}

impl Encode for PinMatrixKind {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(1)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        if buff.is_empty() {
            return Err(WireError::InvalidLength);
        }
        buff[0] = *self as u8;
        Ok(1)
    }
}

impl DecodeOwned for PinMatrixKind {
    type Output = Self;
    type Error = WireError;

    fn decode_owned(buff: &[u8]) -> Result<(Self, usize), WireError> {
        if buff.is_empty() {
            return Err(WireError::InvalidLength);
        }
        let v = PinMatrixKind::try_from(buff[0]).map_err(|_| WireError::InvalidEncoding)?;
        Ok((v, 1))
    }
}

/// Device request for a PIN matrix entry, answered by [PinMatrixAck]
/// (or [Cancel][crate::device::Cancel])
#[derive(Copy, Clone, Debug, PartialEq, Encode, Decode)]
#[encdec(error = "WireError")]
pub struct PinMatrixRequest {
    /// Which PIN is being requested
    pub kind: PinMatrixKind,

    #[encdec(with = "arr")]
    pub reserved: [u8; 3],
}

impl PinMatrixRequest {
    /// Create a new PIN matrix request
    pub fn new(kind: PinMatrixKind) -> Self {
        Self {
            kind,
            reserved: [0u8; 3],
        }
    }
}

impl MsgStatic for PinMatrixRequest {
    const MSG_TYPE: MsgType = MsgType::PinMatrixRequest;
}

/// Host response to a [PinMatrixRequest], carrying matrix positions
///
/// Callers should zero the backing buffer once the engine has consumed
/// the response.
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    PIN_LEN    |                    RESERVED                   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                   PIN POSITIONS (variable)                    /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PinMatrixAck<'a> {
    /// Selected matrix positions
    pub pin: &'a str,
}

impl<'a> PinMatrixAck<'a> {
    /// Create a new PIN matrix response
    pub fn new(pin: &'a str) -> Self {
        Self { pin }
    }
}

impl<'a> MsgStatic for PinMatrixAck<'a> {
    const MSG_TYPE: MsgType = MsgType::PinMatrixAck;
}

impl<'a> Encode for PinMatrixAck<'a> {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(4 + self.pin.as_bytes().len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        let d = self.pin.as_bytes();

        if d.len() > PIN_MAX_LEN {
            return Err(WireError::InvalidLength);
        }
        if buff.len() < 4 + d.len() {
            return Err(WireError::InvalidLength);
        }

        buff[0] = d.len() as u8;
        buff[1..4].fill(0);
        buff[4..][..d.len()].copy_from_slice(d);

        Ok(4 + d.len())
    }
}

impl<'a> Decode<'a> for PinMatrixAck<'a> {
    type Output = Self;
    type Error = WireError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 4 {
            return Err(WireError::InvalidLength);
        }

        let len = buff[0] as usize;
        let pin = take_str(buff, 4, len, PIN_MAX_LEN)?;

        Ok((Self { pin }, 4 + len))
    }
}
