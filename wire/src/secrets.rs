// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Provisioning and settings messages. [LoadDevice] carries key material
//! and is only honoured on a wiped device.

use encdec::{Decode, DecodeOwned, Encode};
use zeroize::Zeroize;

use crate::{
    helpers::{str_len, take_str},
    MsgStatic, MsgType, WireError, LABEL_MAX_LEN, LANGUAGE_MAX_LEN, MNEMONIC_MAX_LEN,
    PIN_MAX_LEN, POLICY_NAME_MAX_LEN,
};

/// Encoded HD node block length
pub const NODE_WIRE_LEN: usize = 112;

/// BIP-32 style extended key node
///
/// Carried by [LoadDevice] when importing a raw node instead of a
/// mnemonic, and persisted by the storage layer in the same layout.
///
/// ## Encoding (112 bytes):
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     DEPTH     |                   RESERVED                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                          FINGERPRINT                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           CHILD_NUM                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                      CHAIN_CODE (32 bytes)                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                     PRIVATE_KEY (32 bytes)                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |              PUBLIC_KEY (33 bytes) + RESERVED (3)             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug, Zeroize)]
pub struct HdNode {
    /// Derivation depth
    pub depth: u8,
    /// Parent key fingerprint
    pub fingerprint: u32,
    /// Child index
    pub child_num: u32,
    /// Chain code
    pub chain_code: [u8; 32],
    /// Private key
    pub private_key: [u8; 32],
    /// Compressed public key
    pub public_key: [u8; 33],
}

impl Default for HdNode {
    fn default() -> Self {
        Self {
            depth: 0,
            fingerprint: 0,
            child_num: 0,
            chain_code: [0u8; 32],
            private_key: [0u8; 32],
            public_key: [0u8; 33],
        }
    }
}

impl Encode for HdNode {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(NODE_WIRE_LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        if buff.len() < NODE_WIRE_LEN {
            return Err(WireError::InvalidLength);
        }

        buff[0] = self.depth;
        buff[1..4].fill(0);
        buff[4..8].copy_from_slice(&self.fingerprint.to_le_bytes());
        buff[8..12].copy_from_slice(&self.child_num.to_le_bytes());
        buff[12..44].copy_from_slice(&self.chain_code);
        buff[44..76].copy_from_slice(&self.private_key);
        buff[76..109].copy_from_slice(&self.public_key);
        buff[109..112].fill(0);

        Ok(NODE_WIRE_LEN)
    }
}

impl DecodeOwned for HdNode {
    type Output = Self;
    type Error = WireError;

    fn decode_owned(buff: &[u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < NODE_WIRE_LEN {
            return Err(WireError::InvalidLength);
        }

        let mut node = HdNode {
            depth: buff[0],
            fingerprint: u32::from_le_bytes([buff[4], buff[5], buff[6], buff[7]]),
            child_num: u32::from_le_bytes([buff[8], buff[9], buff[10], buff[11]]),
            ..Default::default()
        };
        node.chain_code.copy_from_slice(&buff[12..44]);
        node.private_key.copy_from_slice(&buff[44..76]);
        node.public_key.copy_from_slice(&buff[76..109]);

        Ok((node, NODE_WIRE_LEN))
    }
}

bitflags::bitflags! {
    /// [LoadDevice] option flags
    pub struct LoadDeviceFlags: u8 {
        /// Enable passphrase protection on the imported wallet
        const PASSPHRASE_PROTECTION = 1 << 0;
        /// Skip mnemonic checksum validation on import
        const SKIP_CHECKSUM = 1 << 1;
    }
}

crate::encdec_bitflags!(LoadDeviceFlags);

impl Default for LoadDeviceFlags {
    fn default() -> Self {
        LoadDeviceFlags::empty()
    }
}

// Field presence bits, first byte of the [LoadDevice] encoding
const HAS_MNEMONIC: u8 = 1 << 0;
const HAS_NODE: u8 = 1 << 1;
const HAS_PIN: u8 = 1 << 2;
const HAS_LANGUAGE: u8 = 1 << 3;
const HAS_LABEL: u8 = 1 << 4;

/// Import a wallet onto a wiped device
///
/// Carries the secret as either a mnemonic or a raw [HdNode] (the storage
/// layer enforces that only one form is persisted), plus optional initial
/// settings.
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     FIELDS    |     FLAGS     |  MNEMONIC_LEN |    PIN_LEN    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  LANGUAGE_LEN |   LABEL_LEN   |            RESERVED           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /               NODE (112 bytes, when FIELDS.NODE)              /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /        MNEMONIC + PIN + LANGUAGE + LABEL (variable)           /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LoadDevice<'a> {
    /// Mnemonic phrase form of the secret
    pub mnemonic: Option<&'a str>,
    /// Raw node form of the secret
    pub node: Option<HdNode>,
    /// Initial PIN
    pub pin: Option<&'a str>,
    /// Initial display language
    pub language: Option<&'a str>,
    /// Initial label
    pub label: Option<&'a str>,
    /// Option flags
    pub flags: LoadDeviceFlags,
}

impl<'a> MsgStatic for LoadDevice<'a> {
    const MSG_TYPE: MsgType = MsgType::LoadDevice;
}

impl<'a> Encode for LoadDevice<'a> {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        let mut n = 8;

        if self.node.is_some() {
            n += NODE_WIRE_LEN;
        }
        n += self.mnemonic.map(|s| s.len()).unwrap_or(0);
        n += self.pin.map(|s| s.len()).unwrap_or(0);
        n += self.language.map(|s| s.len()).unwrap_or(0);
        n += self.label.map(|s| s.len()).unwrap_or(0);

        Ok(n)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        if buff.len() < self.encode_len()? {
            return Err(WireError::InvalidLength);
        }

        let mut fields = 0u8;
        if self.mnemonic.is_some() {
            fields |= HAS_MNEMONIC;
        }
        if self.node.is_some() {
            fields |= HAS_NODE;
        }
        if self.pin.is_some() {
            fields |= HAS_PIN;
        }
        if self.language.is_some() {
            fields |= HAS_LANGUAGE;
        }
        if self.label.is_some() {
            fields |= HAS_LABEL;
        }

        buff[0] = fields;
        buff[1] = self.flags.bits();
        buff[2] = str_len(self.mnemonic.unwrap_or(""), MNEMONIC_MAX_LEN)?;
        buff[3] = str_len(self.pin.unwrap_or(""), PIN_MAX_LEN)?;
        buff[4] = str_len(self.language.unwrap_or(""), LANGUAGE_MAX_LEN)?;
        buff[5] = str_len(self.label.unwrap_or(""), LABEL_MAX_LEN)?;
        buff[6] = 0;
        buff[7] = 0;

        let mut index = 8;

        if let Some(node) = &self.node {
            index += node.encode(&mut buff[index..])?;
        }

        for d in [
            self.mnemonic.unwrap_or("").as_bytes(),
            self.pin.unwrap_or("").as_bytes(),
            self.language.unwrap_or("").as_bytes(),
            self.label.unwrap_or("").as_bytes(),
        ] {
            buff[index..][..d.len()].copy_from_slice(d);
            index += d.len();
        }

        Ok(index)
    }
}

impl<'a> Decode<'a> for LoadDevice<'a> {
    type Output = Self;
    type Error = WireError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 8 {
            return Err(WireError::InvalidLength);
        }

        let fields = buff[0];
        let flags = LoadDeviceFlags::from_bits_truncate(buff[1]);
        let mnemonic_len = buff[2] as usize;
        let pin_len = buff[3] as usize;
        let language_len = buff[4] as usize;
        let label_len = buff[5] as usize;

        let mut index = 8;

        let node = match fields & HAS_NODE != 0 {
            true => {
                let (n, m) = HdNode::decode_owned(&buff[index..])?;
                index += m;
                Some(n)
            }
            false => None,
        };

        let mnemonic = match fields & HAS_MNEMONIC != 0 {
            true => {
                let s = take_str(buff, index, mnemonic_len, MNEMONIC_MAX_LEN)?;
                index += mnemonic_len;
                Some(s)
            }
            false => None,
        };

        let pin = match fields & HAS_PIN != 0 {
            true => {
                let s = take_str(buff, index, pin_len, PIN_MAX_LEN)?;
                index += pin_len;
                Some(s)
            }
            false => None,
        };

        let language = match fields & HAS_LANGUAGE != 0 {
            true => {
                let s = take_str(buff, index, language_len, LANGUAGE_MAX_LEN)?;
                index += language_len;
                Some(s)
            }
            false => None,
        };

        let label = match fields & HAS_LABEL != 0 {
            true => {
                let s = take_str(buff, index, label_len, LABEL_MAX_LEN)?;
                index += label_len;
                Some(s)
            }
            false => None,
        };

        Ok((
            Self {
                mnemonic,
                node,
                pin,
                language,
                label,
                flags,
            },
            index,
        ))
    }
}

// Field presence bits, first byte of the [ApplySettings] encoding
const SET_LABEL: u8 = 1 << 0;
const SET_LANGUAGE: u8 = 1 << 1;
const SET_PASSPHRASE: u8 = 1 << 2;

/// Update label, language and / or passphrase protection
///
/// At least one field must be present; the device rejects empty updates.
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     FIELDS    |  PASSPHRASE   |   LABEL_LEN   |  LANGUAGE_LEN |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                  LABEL + LANGUAGE (variable)                  /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct ApplySettings<'a> {
    /// New label
    pub label: Option<&'a str>,
    /// New display language
    pub language: Option<&'a str>,
    /// New passphrase protection setting
    pub use_passphrase: Option<bool>,
}

impl<'a> ApplySettings<'a> {
    /// Whether the request updates anything at all
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.language.is_none() && self.use_passphrase.is_none()
    }
}

impl<'a> MsgStatic for ApplySettings<'a> {
    const MSG_TYPE: MsgType = MsgType::ApplySettings;
}

impl<'a> Encode for ApplySettings<'a> {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(4
            + self.label.map(|s| s.len()).unwrap_or(0)
            + self.language.map(|s| s.len()).unwrap_or(0))
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        if buff.len() < self.encode_len()? {
            return Err(WireError::InvalidLength);
        }

        let mut fields = 0u8;
        if self.label.is_some() {
            fields |= SET_LABEL;
        }
        if self.language.is_some() {
            fields |= SET_LANGUAGE;
        }
        if self.use_passphrase.is_some() {
            fields |= SET_PASSPHRASE;
        }

        buff[0] = fields;
        buff[1] = self.use_passphrase.unwrap_or(false) as u8;
        buff[2] = str_len(self.label.unwrap_or(""), LABEL_MAX_LEN)?;
        buff[3] = str_len(self.language.unwrap_or(""), LANGUAGE_MAX_LEN)?;

        let mut index = 4;
        for d in [
            self.label.unwrap_or("").as_bytes(),
            self.language.unwrap_or("").as_bytes(),
        ] {
            buff[index..][..d.len()].copy_from_slice(d);
            index += d.len();
        }

        Ok(index)
    }
}

impl<'a> Decode<'a> for ApplySettings<'a> {
    type Output = Self;
    type Error = WireError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 4 {
            return Err(WireError::InvalidLength);
        }

        let fields = buff[0];
        let passphrase = buff[1] != 0;
        let label_len = buff[2] as usize;
        let language_len = buff[3] as usize;

        let mut index = 4;

        let label = match fields & SET_LABEL != 0 {
            true => {
                let s = take_str(buff, index, label_len, LABEL_MAX_LEN)?;
                index += label_len;
                Some(s)
            }
            false => None,
        };

        let language = match fields & SET_LANGUAGE != 0 {
            true => {
                let s = take_str(buff, index, language_len, LANGUAGE_MAX_LEN)?;
                index += language_len;
                Some(s)
            }
            false => None,
        };

        let use_passphrase = match fields & SET_PASSPHRASE != 0 {
            true => Some(passphrase),
            false => None,
        };

        Ok((
            Self {
                label,
                language,
                use_passphrase,
            },
            index,
        ))
    }
}

/// Change, set or remove the device PIN
///
/// Runs the full matrix round-trip: current PIN verification when one is
/// set, then double entry of the new PIN (unless removing).
///
/// ## Encoding: single flag byte plus reserved padding.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct ChangePin {
    /// Remove the PIN instead of setting a new one
    pub remove: bool,
}

impl MsgStatic for ChangePin {
    const MSG_TYPE: MsgType = MsgType::ChangePin;
}

impl Encode for ChangePin {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(4)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        if buff.len() < 4 {
            return Err(WireError::InvalidLength);
        }

        buff[0] = self.remove as u8;
        buff[1..4].fill(0);

        Ok(4)
    }
}

impl DecodeOwned for ChangePin {
    type Output = Self;
    type Error = WireError;

    fn decode_owned(buff: &[u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 4 {
            return Err(WireError::InvalidLength);
        }

        Ok((
            Self {
                remove: buff[0] != 0,
            },
            4,
        ))
    }
}

/// Enable or disable a named policy
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    NAME_LEN   |    ENABLED    |            RESERVED           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                        NAME (variable)                        /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ApplyPolicy<'a> {
    /// Name of the policy to update
    pub name: &'a str,
    /// New enablement state
    pub enabled: bool,
}

impl<'a> ApplyPolicy<'a> {
    /// Create a new policy update request
    pub fn new(name: &'a str, enabled: bool) -> Self {
        Self { name, enabled }
    }
}

impl<'a> MsgStatic for ApplyPolicy<'a> {
    const MSG_TYPE: MsgType = MsgType::ApplyPolicy;
}

impl<'a> Encode for ApplyPolicy<'a> {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(4 + self.name.as_bytes().len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        let d = self.name.as_bytes();
        let len = str_len(self.name, POLICY_NAME_MAX_LEN)?;

        if buff.len() < 4 + d.len() {
            return Err(WireError::InvalidLength);
        }

        buff[0] = len;
        buff[1] = self.enabled as u8;
        buff[2] = 0;
        buff[3] = 0;
        buff[4..][..d.len()].copy_from_slice(d);

        Ok(4 + d.len())
    }
}

impl<'a> Decode<'a> for ApplyPolicy<'a> {
    type Output = Self;
    type Error = WireError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 4 {
            return Err(WireError::InvalidLength);
        }

        let len = buff[0] as usize;
        let enabled = buff[1] != 0;
        let name = take_str(buff, 4, len, POLICY_NAME_MAX_LEN)?;

        Ok((Self { name, enabled }, 4 + len))
    }
}
