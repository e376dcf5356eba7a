// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device management messages: state reporting, liveness, confirmation
//! round-trips and typed request closure (Success / Failure).

use encdec::{Decode, DecodeOwned, Encode};
use heapless::{String, Vec};
use num_enum::TryFromPrimitive;

use crate::{
    helpers::{arr, str_len, take_str},
    MsgStatic, MsgType, WireError, LABEL_MAX_LEN, LANGUAGE_MAX_LEN, POLICY_MAX_COUNT,
    POLICY_NAME_MAX_LEN, STATUS_MSG_MAX_LEN,
};

/// Maximum vendor string length in [Features]
pub const VENDOR_MAX_LEN: usize = 16;

/// Maximum device id string length in [Features] (UUID rendered as hex)
pub const DEVICE_ID_MAX_LEN: usize = 24;

/// Reset any in-progress flow and the volatile session, fetch [Features].
///
/// Always answered, regardless of engine state.
#[derive(Copy, Clone, Debug, PartialEq, Encode, Decode)]
#[encdec(error = "WireError")]
pub struct Initialize;

impl MsgStatic for Initialize {
    const MSG_TYPE: MsgType = MsgType::Initialize;
}

/// Fetch [Features] without disturbing engine state
#[derive(Copy, Clone, Debug, PartialEq, Encode, Decode)]
#[encdec(error = "WireError")]
pub struct GetFeatures;

impl MsgStatic for GetFeatures {
    const MSG_TYPE: MsgType = MsgType::GetFeatures;
}

/// Host acknowledgement of a [ButtonRequest]
#[derive(Copy, Clone, Debug, PartialEq, Encode, Decode)]
#[encdec(error = "WireError")]
pub struct ButtonAck;

impl MsgStatic for ButtonAck {
    const MSG_TYPE: MsgType = MsgType::ButtonAck;
}

/// Abort the pending flow
#[derive(Copy, Clone, Debug, PartialEq, Encode, Decode)]
#[encdec(error = "WireError")]
pub struct Cancel;

impl MsgStatic for Cancel {
    const MSG_TYPE: MsgType = MsgType::Cancel;
}

/// Drop volatile session secrets (cached PIN / passphrase)
#[derive(Copy, Clone, Debug, PartialEq, Encode, Decode)]
#[encdec(error = "WireError")]
pub struct ClearSession;

impl MsgStatic for ClearSession {
    const MSG_TYPE: MsgType = MsgType::ClearSession;
}

/// Erase all persistent state and return the device to factory condition
///
/// Requires physical confirmation.
#[derive(Copy, Clone, Debug, PartialEq, Encode, Decode)]
#[encdec(error = "WireError")]
pub struct WipeDevice;

impl MsgStatic for WipeDevice {
    const MSG_TYPE: MsgType = MsgType::WipeDevice;
}

bitflags::bitflags! {
    /// [Ping] protection flags
    pub struct PingFlags: u8 {
        /// Require physical confirmation before echoing
        const BUTTON_PROTECTION = 1 << 0;
        /// Require PIN entry before echoing
        const PIN_PROTECTION = 1 << 1;
    }
}

crate::encdec_bitflags!(PingFlags);

/// Liveness check, echoed back via [Success] once the requested
/// protections have passed.
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     FLAGS     |    MSG_LEN    |            RESERVED           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                            MESSAGE                            /
/// /                       (variable length)                       /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ping<'a> {
    /// Message to echo
    pub message: &'a str,
    /// Protection flags
    pub flags: PingFlags,
}

impl<'a> Ping<'a> {
    /// Create a new ping request
    pub fn new(message: &'a str, flags: PingFlags) -> Self {
        Self { message, flags }
    }
}

impl<'a> MsgStatic for Ping<'a> {
    const MSG_TYPE: MsgType = MsgType::Ping;
}

impl<'a> Encode for Ping<'a> {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(4 + self.message.as_bytes().len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        let d = self.message.as_bytes();
        let len = str_len(self.message, STATUS_MSG_MAX_LEN)?;

        if buff.len() < 4 + d.len() {
            return Err(WireError::InvalidLength);
        }

        buff[0] = self.flags.bits();
        buff[1] = len;
        buff[2] = 0;
        buff[3] = 0;
        buff[4..][..d.len()].copy_from_slice(d);

        Ok(4 + d.len())
    }
}

impl<'a> Decode<'a> for Ping<'a> {
    type Output = Self;
    type Error = WireError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 4 {
            return Err(WireError::InvalidLength);
        }

        let flags = PingFlags::from_bits_truncate(buff[0]);
        let len = buff[1] as usize;
        let message = take_str(buff, 4, len, STATUS_MSG_MAX_LEN)?;

        Ok((Self { message, flags }, 4 + len))
    }
}

/// Success report closing a request
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    MSG_LEN    |                   RESERVED                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                       MESSAGE (variable)                      /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Success<'a> {
    /// Human-readable completion note
    pub message: &'a str,
}

impl<'a> Success<'a> {
    /// Create a new success report
    pub fn new(message: &'a str) -> Self {
        Self { message }
    }
}

impl<'a> MsgStatic for Success<'a> {
    const MSG_TYPE: MsgType = MsgType::Success;
}

impl<'a> Encode for Success<'a> {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(4 + self.message.as_bytes().len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        let d = self.message.as_bytes();
        let len = str_len(self.message, STATUS_MSG_MAX_LEN)?;

        if buff.len() < 4 + d.len() {
            return Err(WireError::InvalidLength);
        }

        buff[0] = len;
        buff[1..4].fill(0);
        buff[4..][..d.len()].copy_from_slice(d);

        Ok(4 + d.len())
    }
}

impl<'a> Decode<'a> for Success<'a> {
    type Output = Self;
    type Error = WireError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 4 {
            return Err(WireError::InvalidLength);
        }

        let len = buff[0] as usize;
        let message = take_str(buff, 4, len, STATUS_MSG_MAX_LEN)?;

        Ok((Self { message }, 4 + len))
    }
}

/// Failure classification carried by [Failure] replies
///
/// Values follow the established numbering for host compatibility.
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive, strum::Display)]
#[repr(u8)]
pub enum FailureCode {
    /// Message not valid in the current state
    UnexpectedMessage = 1,
    /// Physical confirmation required first
    ButtonExpected = 2,
    /// Request payload rejected by the handler
    DataError = 3,
    /// Flow aborted by the user or a cancel message
    ActionCancelled = 4,
    /// PIN entry required first
    PinExpected = 5,
    /// PIN entry aborted
    PinCancelled = 6,
    /// PIN comparison failed
    PinInvalid = 7,
    /// Unclassified failure
    Other = 9,
    /// Operation requires a provisioned device
    NotInitialized = 11,
    /// New PIN entries did not match
    PinMismatch = 12,
    /// Flash program / erase / verification failure
    FlashFailure = 99,
}

impl Encode for FailureCode {
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

impl DecodeOwned for FailureCode {
    type Output = Self;
    type Error = WireError;

    fn decode_owned(buff: &[u8]) -> Result<(Self, usize), WireError> {
        if buff.is_empty() {
            return Err(WireError::InvalidLength);
        }
        let v = FailureCode::try_from(buff[0]).map_err(|_| WireError::InvalidEncoding)?;
        Ok((v, 1))
    }
}

/// Typed failure report closing a request
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      CODE     |    MSG_LEN    |            RESERVED           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                       MESSAGE (variable)                      /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Failure<'a> {
    /// Failure classification
    pub code: FailureCode,
    /// Human-readable failure note
    pub message: &'a str,
}

impl<'a> Failure<'a> {
    /// Create a new failure report
    pub fn new(code: FailureCode, message: &'a str) -> Self {
        Self { code, message }
    }
}

impl<'a> MsgStatic for Failure<'a> {
    const MSG_TYPE: MsgType = MsgType::Failure;
}

impl<'a> Encode for Failure<'a> {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(4 + self.message.as_bytes().len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        let d = self.message.as_bytes();
        let len = str_len(self.message, STATUS_MSG_MAX_LEN)?;

        if buff.len() < 4 + d.len() {
            return Err(WireError::InvalidLength);
        }

        buff[0] = self.code as u8;
        buff[1] = len;
        buff[2] = 0;
        buff[3] = 0;
        buff[4..][..d.len()].copy_from_slice(d);

        Ok(4 + d.len())
    }
}

impl<'a> Decode<'a> for Failure<'a> {
    type Output = Self;
    type Error = WireError;

    fn decode(buff: &'a [u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 4 {
            return Err(WireError::InvalidLength);
        }

        let code = FailureCode::try_from(buff[0]).map_err(|_| WireError::InvalidEncoding)?;
        let len = buff[1] as usize;
        let message = take_str(buff, 4, len, STATUS_MSG_MAX_LEN)?;

        Ok((Self { code, message }, 4 + len))
    }
}

/// Physical confirmation categories carried by [ButtonRequest]
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive, strum::Display)]
#[repr(u8)]
pub enum ButtonRequestKind {
    /// Unclassified confirmation
    Other = 1,
    /// Confirm a protected call
    ProtectCall = 2,
    /// Confirm a device wipe
    WipeDevice = 3,
    /// Confirm a wallet import
    LoadDevice = 4,
    /// Confirm a settings change
    ApplySettings = 5,
    /// Confirm entropy disclosure
    GetEntropy = 6,
    /// Confirm a policy change
    ApplyPolicy = 7,
    /// Confirm a protected ping
    Ping = 8,
    /// Confirm a PIN change
    ChangePin = 9,
    /// Confirm a PIN removal
    RemovePin = 10,
}

impl Encode for ButtonRequestKind {
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

impl DecodeOwned for ButtonRequestKind {
    type Output = Self;
    type Error = WireError;

    fn decode_owned(buff: &[u8]) -> Result<(Self, usize), WireError> {
        if buff.is_empty() {
            return Err(WireError::InvalidLength);
        }
        let v = ButtonRequestKind::try_from(buff[0]).map_err(|_| WireError::InvalidEncoding)?;
        Ok((v, 1))
    }
}

/// Device request for physical confirmation, answered by [ButtonAck]
/// (or [Cancel])
#[derive(Copy, Clone, Debug, PartialEq, Encode, Decode)]
#[encdec(error = "WireError")]
pub struct ButtonRequest {
    /// Confirmation category, for host-side display
    pub kind: ButtonRequestKind,

    #[encdec(with = "arr")]
    pub reserved: [u8; 3],
}

impl ButtonRequest {
    /// Create a new button request
    pub fn new(kind: ButtonRequestKind) -> Self {
        Self {
            kind,
            reserved: [0u8; 3],
        }
    }
}

impl MsgStatic for ButtonRequest {
    const MSG_TYPE: MsgType = MsgType::ButtonRequest;
}

bitflags::bitflags! {
    /// Device state flags reported via [Features]
    pub struct FeatureFlags: u8 {
        /// Device holds key material (node or mnemonic)
        const INITIALIZED = 1 << 0;
        /// A PIN is set
        const PIN_PROTECTION = 1 << 1;
        /// Passphrase protection is enabled
        const PASSPHRASE_PROTECTION = 1 << 2;
        /// The PIN is cached in the current session
        const PIN_CACHED = 1 << 3;
        /// The passphrase is cached in the current session
        const PASSPHRASE_CACHED = 1 << 4;
        /// Key material was imported rather than derived on-device
        const IMPORTED = 1 << 5;
    }
}

crate::encdec_bitflags!(FeatureFlags);

/// Policy table entry, reported via [Features]
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyEntry {
    /// Policy name
    pub name: String<POLICY_NAME_MAX_LEN>,
    /// Whether the policy is enabled
    pub enabled: bool,
}

impl PolicyEntry {
    /// Create a policy entry, rejecting over-length names
    pub fn new(name: &str, enabled: bool) -> Result<Self, WireError> {
        let mut s = String::new();
        s.push_str(name).map_err(|_| WireError::InvalidLength)?;
        Ok(Self { name: s, enabled })
    }
}

impl Encode for PolicyEntry {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        Ok(2 + self.name.as_bytes().len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        let d = self.name.as_bytes();

        if buff.len() < 2 + d.len() {
            return Err(WireError::InvalidLength);
        }

        buff[0] = d.len() as u8;
        buff[1] = self.enabled as u8;
        buff[2..][..d.len()].copy_from_slice(d);

        Ok(2 + d.len())
    }
}

impl DecodeOwned for PolicyEntry {
    type Output = Self;
    type Error = WireError;

    fn decode_owned(buff: &[u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 2 {
            return Err(WireError::InvalidLength);
        }

        let len = buff[0] as usize;
        let enabled = buff[1] != 0;
        let name = take_str(buff, 2, len, POLICY_NAME_MAX_LEN)?;

        Ok((Self::new(name, enabled)?, 2 + len))
    }
}

/// Device feature / state report
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   VER_MAJOR   |   VER_MINOR   |   VER_PATCH   |     FLAGS     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   VENDOR_LEN  | DEVICE_ID_LEN |   LABEL_LEN   |  LANGUAGE_LEN |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  POLICY_COUNT |                   RESERVED                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /        VENDOR + DEVICE_ID + LABEL + LANGUAGE (variable)       /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /          POLICIES (NAME_LEN, ENABLED, NAME) repeated          /
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Features {
    /// Firmware major version
    pub ver_major: u8,
    /// Firmware minor version
    pub ver_minor: u8,
    /// Firmware patch version
    pub ver_patch: u8,
    /// Device state flags
    pub flags: FeatureFlags,
    /// Vendor string
    pub vendor: String<VENDOR_MAX_LEN>,
    /// Device UUID rendered as hex, empty until storage is formatted
    pub device_id: String<DEVICE_ID_MAX_LEN>,
    /// User label, empty when unset
    pub label: String<LABEL_MAX_LEN>,
    /// Display language
    pub language: String<LANGUAGE_MAX_LEN>,
    /// Policy table
    pub policies: Vec<PolicyEntry, POLICY_MAX_COUNT>,
}

impl MsgStatic for Features {
    const MSG_TYPE: MsgType = MsgType::Features;
}

impl Default for Features {
    fn default() -> Self {
        Self {
            ver_major: 0,
            ver_minor: 0,
            ver_patch: 0,
            flags: FeatureFlags::empty(),
            vendor: String::new(),
            device_id: String::new(),
            label: String::new(),
            language: String::new(),
            policies: Vec::new(),
        }
    }
}

impl Encode for Features {
    type Error = WireError;

    fn encode_len(&self) -> Result<usize, WireError> {
        let mut n = 12
            + self.vendor.as_bytes().len()
            + self.device_id.as_bytes().len()
            + self.label.as_bytes().len()
            + self.language.as_bytes().len();

        for p in &self.policies {
            n += p.encode_len()?;
        }

        Ok(n)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        if buff.len() < self.encode_len()? {
            return Err(WireError::InvalidLength);
        }

        buff[0] = self.ver_major;
        buff[1] = self.ver_minor;
        buff[2] = self.ver_patch;
        buff[3] = self.flags.bits();
        buff[4] = self.vendor.as_bytes().len() as u8;
        buff[5] = self.device_id.as_bytes().len() as u8;
        buff[6] = self.label.as_bytes().len() as u8;
        buff[7] = self.language.as_bytes().len() as u8;
        buff[8] = self.policies.len() as u8;
        buff[9..12].fill(0);

        let mut index = 12;
        for d in [
            self.vendor.as_bytes(),
            self.device_id.as_bytes(),
            self.label.as_bytes(),
            self.language.as_bytes(),
        ] {
            buff[index..][..d.len()].copy_from_slice(d);
            index += d.len();
        }

        for p in &self.policies {
            index += p.encode(&mut buff[index..])?;
        }

        Ok(index)
    }
}

impl DecodeOwned for Features {
    type Output = Self;
    type Error = WireError;

    fn decode_owned(buff: &[u8]) -> Result<(Self, usize), WireError> {
        if buff.len() < 12 {
            return Err(WireError::InvalidLength);
        }

        let vendor_len = buff[4] as usize;
        let device_id_len = buff[5] as usize;
        let label_len = buff[6] as usize;
        let language_len = buff[7] as usize;
        let policy_count = buff[8] as usize;

        if policy_count > POLICY_MAX_COUNT {
            return Err(WireError::InvalidLength);
        }

        let mut index = 12;

        let mut vendor = String::new();
        vendor
            .push_str(take_str(buff, index, vendor_len, VENDOR_MAX_LEN)?)
            .map_err(|_| WireError::InvalidLength)?;
        index += vendor_len;

        let mut device_id = String::new();
        device_id
            .push_str(take_str(buff, index, device_id_len, DEVICE_ID_MAX_LEN)?)
            .map_err(|_| WireError::InvalidLength)?;
        index += device_id_len;

        let mut label = String::new();
        label
            .push_str(take_str(buff, index, label_len, LABEL_MAX_LEN)?)
            .map_err(|_| WireError::InvalidLength)?;
        index += label_len;

        let mut language = String::new();
        language
            .push_str(take_str(buff, index, language_len, LANGUAGE_MAX_LEN)?)
            .map_err(|_| WireError::InvalidLength)?;
        index += language_len;

        let mut policies = Vec::new();
        for _ in 0..policy_count {
            let (p, n) = PolicyEntry::decode_owned(&buff[index..])?;
            policies.push(p).map_err(|_| WireError::InvalidLength)?;
            index += n;
        }

        Ok((
            Self {
                ver_major: buff[0],
                ver_minor: buff[1],
                ver_patch: buff[2],
                flags: FeatureFlags::from_bits_truncate(buff[3]),
                vendor,
                device_id,
                label,
                language,
                policies,
            },
            index,
        ))
    }
}
