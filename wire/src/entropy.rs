// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Entropy request / response messages.

use byteorder::{ByteOrder, LittleEndian};
use encdec::{Decode, Encode};

use crate::{MsgStatic, MsgType, WireError, ENTROPY_MAX_LEN};

/// Request random bytes from the device RNG
///
/// Requires physical confirmation. Responses are capped at
/// [ENTROPY_MAX_LEN] bytes, larger requests are clamped.
#[derive(Copy, Clone, Debug, PartialEq, Encode, Decode)]
#[encdec(error = "WireError")]
pub struct GetEntropy {
    /// Requested byte count
    pub size: u32,
}

impl GetEntropy {
    /// Create a new entropy request
    pub fn new(size: u32) -> Self {
        Self { size }
    }
}

impl MsgStatic for GetEntropy {
    const MSG_TYPE: MsgType = MsgType::GetEntropy;
}

/// Device response to [GetEntropy]
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |              LEN              |            RESERVED           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                        DATA (variable)                        /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Entropy<'a> {
    /// Random bytes
    pub bytes: &'a [u8],
}

impl<'a> Entropy<'a> {
    /// Create a new entropy response
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl<'a> MsgStatic for Entropy<'a> {
    const MSG_TYPE: MsgType = MsgType::Entropy;
}

impl<'a> Encode for Entropy<'a> {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(4 + self.bytes.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        if self.bytes.len() > ENTROPY_MAX_LEN {
            return Err(WireError::InvalidLength);
        }
        if buff.len() < 4 + self.bytes.len() {
            return Err(WireError::InvalidLength);
        }

        LittleEndian::write_u16(&mut buff[0..2], self.bytes.len() as u16);
        buff[2] = 0;
        buff[3] = 0;
        buff[4..][..self.bytes.len()].copy_from_slice(self.bytes);

        Ok(4 + self.bytes.len())
    }
}

impl<'a> Decode<'a> for Entropy<'a> {
    type Output = Self;
    type Error = WireError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 4 {
            return Err(WireError::InvalidLength);
        }

        let len = LittleEndian::read_u16(&buff[0..2]) as usize;
        if len > ENTROPY_MAX_LEN {
            return Err(WireError::InvalidLength);
        }
        if buff.len() < 4 + len {
            return Err(WireError::InvalidLength);
        }

        Ok((Self { bytes: &buff[4..4 + len] }, 4 + len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::encode_decode_msg;

    #[test]
    fn encode_decode_get_entropy() {
        let mut buff = [0u8; 8];

        let n = encode_decode_msg(&mut buff, &GetEntropy::new(64));
        assert_eq!(n, 4);
    }

    #[test]
    fn encode_decode_entropy() {
        let mut buff = [0u8; 512];
        let data: [u8; 96] = rand::random();

        let e = Entropy::new(&data);
        let n = encode_decode_msg(&mut buff, &e);
        assert_eq!(n, 100);
    }

    #[test]
    fn entropy_rejects_oversize() {
        let mut buff = [0u8; 512];
        let data = [0u8; ENTROPY_MAX_LEN + 1];

        assert_eq!(
            Entropy::new(&data).encode(&mut buff),
            Err(WireError::InvalidLength)
        );
    }
}
