// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Protocol / message definitions for KeyWarden device communication
//!
//! This crate provides the wire-level contract shared between the device
//! engine and host tooling: message type identifiers, frame header layout,
//! and payload encodings for every supported message.
//!
//! Messages use a primitive binary encoding to simplify implementation with
//! other languages and platforms (and to avoid the protobuf/heapless/no_std
//! incompatibilities that preclude reusing existing schema toolchains on
//! constrained targets).
//!
//! Payload encodings are _roughly_ equivalent to packed c structures while
//! maintaining 32-bit field alignment to reduce the need for unaligned access
//! on constrained platforms. All payload fields are little-endian.
//!
//! The frame header is the one deliberate exception: its message-type and
//! payload-length fields travel big-endian (see [frame]), matching the
//! established transport contract so existing hosts interoperate unchanged.

#![cfg_attr(not(feature = "std"), no_std)]

use core::fmt::Debug;

use num_enum::TryFromPrimitive;

pub mod device;
pub mod entropy;
pub mod frame;
pub mod pin;
pub mod prelude;
pub mod secrets;

mod helpers;

/// Protocol version reported via [device::Features]
pub const PROTO_VERSION: u8 = 0x01;

/// Maximum reassembled message payload length, inbound or outbound
pub const MSG_MAX_LEN: usize = 1024;

/// Maximum mnemonic length in bytes
pub const MNEMONIC_MAX_LEN: usize = 240;

/// Maximum PIN length in digits
pub const PIN_MAX_LEN: usize = 9;

/// Maximum device label length in bytes
pub const LABEL_MAX_LEN: usize = 32;

/// Maximum language name length in bytes
pub const LANGUAGE_MAX_LEN: usize = 16;

/// Maximum policy name length in bytes
pub const POLICY_NAME_MAX_LEN: usize = 15;

/// Maximum number of policy entries
pub const POLICY_MAX_COUNT: usize = 4;

/// Maximum ping / status message length in bytes
pub const STATUS_MSG_MAX_LEN: usize = 128;

/// Maximum entropy length returned by [entropy::Entropy]
pub const ENTROPY_MAX_LEN: usize = 256;

/// Message type identifiers
///
/// Identifier values follow the established numbering so existing host
/// software can talk to the device without a translation table. Gaps are
/// identifiers assigned to messages this device does not implement.
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive, strum::Display)]
#[repr(u16)]
pub enum MsgType {
    /// Reset flows / session, fetch [device::Features]
    Initialize = 0,

    /// Liveness check, echoed via [device::Success]
    Ping = 1,

    /// Success report, closes a request
    Success = 2,

    /// Typed failure report, closes a request
    Failure = 3,

    /// Change, set or remove the device PIN
    ChangePin = 4,

    /// Erase all persistent state
    WipeDevice = 5,

    /// Fetch entropy from the device RNG
    GetEntropy = 9,

    /// Entropy response
    Entropy = 10,

    /// Import a wallet (mnemonic or node) onto a wiped device
    LoadDevice = 13,

    /// Device feature / state report
    Features = 17,

    /// Device requests a PIN matrix entry from the host
    PinMatrixRequest = 18,

    /// Host responds with scrambled PIN digits
    PinMatrixAck = 19,

    /// Abort the pending flow
    Cancel = 20,

    /// Clear volatile session secrets
    ClearSession = 24,

    /// Update label / language / passphrase settings
    ApplySettings = 25,

    /// Device requests physical confirmation
    ButtonRequest = 26,

    /// Host acknowledges a button request
    ButtonAck = 27,

    /// Fetch [device::Features] without resetting state
    GetFeatures = 55,

    /// Enable or disable a named policy
    ApplyPolicy = 63,
}

/// Wire encode / decode errors
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[repr(u8)]
pub enum WireError {
    /// Buffer or field length invalid
    #[cfg_attr(feature = "thiserror", error("invalid length"))]
    InvalidLength = 0x01,

    /// String field is not valid UTF-8
    #[cfg_attr(feature = "thiserror", error("invalid utf-8"))]
    InvalidUtf8 = 0x02,

    /// Field value outside the encodable range
    #[cfg_attr(feature = "thiserror", error("invalid encoding"))]
    InvalidEncoding = 0x03,

    /// Frame header malformed (preamble / marker mismatch)
    #[cfg_attr(feature = "thiserror", error("invalid frame header"))]
    InvalidHeader = 0x04,

    /// Message type carries no inbound payload decoding
    #[cfg_attr(feature = "thiserror", error("unhandled message type"))]
    Unhandled = 0x05,
}

impl From<encdec::Error> for WireError {
    fn from(_: encdec::Error) -> Self {
        WireError::InvalidEncoding
    }
}

/// Static message type information, attached to payload objects so
/// framing helpers and dispatch can recover the [MsgType] for a payload
pub trait MsgStatic {
    /// Message type identifier for this payload
    const MSG_TYPE: MsgType;

    /// Fetch the message type for a payload instance
    fn msg_type(&self) -> MsgType {
        Self::MSG_TYPE
    }
}

/// Helper macro for encoding `bitflags` types
#[macro_export]
macro_rules! encdec_bitflags {
    ($b:ty) => {
        impl encdec::Encode for $b {
            type Error = $crate::WireError;

            fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
                if buff.is_empty() {
                    return Err($crate::WireError::InvalidLength);
                }
                buff[0] = self.bits();
                Ok(1)
            }

            fn encode_len(&self) -> Result<usize, Self::Error> {
                Ok(1)
            }
        }

        impl encdec::DecodeOwned for $b {
            type Output = $b;
            type Error = $crate::WireError;

            fn decode_owned(buff: &[u8]) -> Result<(Self, usize), Self::Error> {
                if buff.is_empty() {
                    return Err($crate::WireError::InvalidLength);
                }
                let v = <$b>::from_bits_truncate(buff[0]);
                Ok((v, 1))
            }
        }
    };
}

#[cfg(test)]
pub(crate) mod test {
    use encdec::{DecodeOwned, EncDec, Encode};

    use super::*;

    /// Helper for message encode / decode tests over borrowed payloads
    pub fn encode_decode_msg<'a, M: EncDec<'a, WireError> + PartialEq + Debug>(
        buff: &'a mut [u8],
        msg: &M,
    ) -> usize {
        // Encode message
        let n = msg.encode(buff).expect("encode failed");

        // Ensure encoded data fits maximum payload
        assert!(
            n <= MSG_MAX_LEN,
            "encoded length {n} exceeds maximum payload {MSG_MAX_LEN}"
        );

        // Check encoded length matches expected length
        let expected_n = msg.encode_len().expect("get length failed");
        assert_eq!(n, expected_n, "encode length mismatch");

        // Decode message
        let (decoded, decoded_n) = M::decode(&buff[..n]).expect("decode failed");

        // Check decoded object and length match
        assert_eq!(msg, &decoded);
        assert_eq!(expected_n, decoded_n);

        n
    }

    /// Helper for message encode / decode tests over owned payloads
    pub fn encode_decode_owned<M>(buff: &mut [u8], msg: &M) -> usize
    where
        M: Encode<Error = WireError> + DecodeOwned<Output = M, Error = WireError> + PartialEq + Debug,
    {
        let n = msg.encode(buff).expect("encode failed");

        assert!(
            n <= MSG_MAX_LEN,
            "encoded length {n} exceeds maximum payload {MSG_MAX_LEN}"
        );

        let expected_n = msg.encode_len().expect("get length failed");
        assert_eq!(n, expected_n, "encode length mismatch");

        let (decoded, decoded_n) = M::decode_owned(&buff[..n]).expect("decode failed");

        assert_eq!(msg, &decoded);
        assert_eq!(expected_n, decoded_n);

        n
    }

    #[test]
    fn msg_type_ids() {
        // Identifier values are part of the external contract
        assert_eq!(MsgType::Initialize as u16, 0);
        assert_eq!(MsgType::Failure as u16, 3);
        assert_eq!(MsgType::LoadDevice as u16, 13);
        assert_eq!(MsgType::Features as u16, 17);
        assert_eq!(MsgType::GetFeatures as u16, 55);
        assert_eq!(MsgType::ApplyPolicy as u16, 63);

        assert_eq!(MsgType::try_from(20u16).unwrap(), MsgType::Cancel);
        assert!(MsgType::try_from(21u16).is_err());
    }
}
