// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Versioned configuration record.
//!
//! One [`ConfigRecord`] holds everything the device persists: the wallet
//! secret (node or mnemonic, never both), PIN, failure arena, and user
//! settings. The on-flash layout is fixed-offset little-endian so the
//! arena can be programmed in place, optional fields pair a presence
//! flag with zero-filled space.
//!
//! ## Encoding (568 bytes):
//! ```text
//!  offset  len  field
//!       0    4  VERSION (u32)
//!       4    1  FLAGS            +3 reserved
//!       8  112  NODE
//!     120  244  MNEMONIC         (len u8, 240 bytes, 3 reserved)
//!     364   12  PIN              (len u8, 9 bytes, 2 reserved)
//!     376   64  PIN_FAIL_ARENA   (16 x u32)
//!     440   36  LABEL            (len u8, 32 bytes, 3 reserved)
//!     476   20  LANGUAGE         (len u8, 16 bytes, 3 reserved)   [v2+]
//!     496   72  POLICIES         (count u8, 4 x 17 bytes, 3 res)  [v3+]
//! ```
//!
//! Decoding accepts any supported prior version and migrates forward,
//! filling added fields with defaults. Versions newer than
//! [`RecordVersion::CURRENT`] are rejected, encoding always writes the
//! current layout.

use byteorder::{ByteOrder, LittleEndian};
use encdec::{DecodeOwned, Encode};
use heapless::Vec;
use num_enum::TryFromPrimitive;
use static_assertions::const_assert;
use zeroize::Zeroize;

use keywarden_wire::{
    secrets::{HdNode, NODE_WIRE_LEN},
    LABEL_MAX_LEN, LANGUAGE_MAX_LEN, MNEMONIC_MAX_LEN, PIN_MAX_LEN, POLICY_MAX_COUNT,
    POLICY_NAME_MAX_LEN,
};

use super::StorageError;
use crate::storage::arena::ARENA_WORDS;
use crate::types::BoundedStr;

/// Encoded length of the current record version
pub const RECORD_LEN: usize = 568;

/// Default display language for fresh and migrated records
pub const DEFAULT_LANGUAGE: &str = "english";

const VERSION_OFFSET: usize = 0;
const FLAGS_OFFSET: usize = 4;
const NODE_OFFSET: usize = 8;
const MNEMONIC_OFFSET: usize = 120;
const PIN_OFFSET: usize = 364;

/// Offset of the failure arena within the record, fixed so the storage
/// manager can program failure words in place
pub const ARENA_OFFSET: usize = 376;

const LABEL_OFFSET: usize = 440;
const LANGUAGE_OFFSET: usize = 476;
const POLICY_OFFSET: usize = 496;
const POLICY_ENTRY_LEN: usize = 1 + POLICY_NAME_MAX_LEN + 1;

// Pin the layout contracts the offsets above encode
const_assert!(NODE_OFFSET + NODE_WIRE_LEN == MNEMONIC_OFFSET);
const_assert!(MNEMONIC_OFFSET + 1 + MNEMONIC_MAX_LEN + 3 == PIN_OFFSET);
const_assert!(PIN_OFFSET + 1 + PIN_MAX_LEN + 2 == ARENA_OFFSET);
const_assert!(ARENA_OFFSET % 4 == 0);
const_assert!(ARENA_OFFSET + ARENA_WORDS * 4 == LABEL_OFFSET);
const_assert!(LABEL_OFFSET + 1 + LABEL_MAX_LEN + 3 == LANGUAGE_OFFSET);
const_assert!(LANGUAGE_OFFSET + 1 + LANGUAGE_MAX_LEN + 3 == POLICY_OFFSET);
const_assert!(POLICY_OFFSET + 1 + POLICY_MAX_COUNT * POLICY_ENTRY_LEN + 3 == RECORD_LEN);

/// Record layout versions
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, TryFromPrimitive)]
#[repr(u32)]
pub enum RecordVersion {
    /// Initial layout, through LABEL
    V1 = 1,
    /// Added LANGUAGE
    V2 = 2,
    /// Added POLICIES
    V3 = 3,
}

impl RecordVersion {
    /// Version written by [`ConfigRecord::encode`]
    pub const CURRENT: RecordVersion = RecordVersion::V3;

    /// Encoded record length for this version
    pub fn encoded_len(&self) -> usize {
        match self {
            RecordVersion::V1 => LANGUAGE_OFFSET,
            RecordVersion::V2 => POLICY_OFFSET,
            RecordVersion::V3 => RECORD_LEN,
        }
    }
}

bitflags::bitflags! {
    /// Record field presence / option flags
    struct RecordFlags: u8 {
        const HAS_NODE = 1 << 0;
        const HAS_MNEMONIC = 1 << 1;
        const HAS_PIN = 1 << 2;
        const PASSPHRASE_PROTECTION = 1 << 3;
        const IMPORTED = 1 << 4;
    }
}

/// Policy table entry
#[derive(Clone, PartialEq, Debug)]
pub struct Policy {
    /// Policy name
    pub name: BoundedStr<POLICY_NAME_MAX_LEN>,
    /// Whether the policy is enabled
    pub enabled: bool,
}

/// Persisted device configuration.
///
/// Absent optional fields are never serialized as present, the presence
/// flags and zero-filled space stay in sync by construction.
#[derive(Clone, PartialEq, Debug)]
pub struct ConfigRecord {
    /// Imported extended key node, exclusive with `mnemonic`
    pub node: Option<HdNode>,
    /// BIP-39 recovery phrase, exclusive with `node`
    pub mnemonic: Option<BoundedStr<MNEMONIC_MAX_LEN>>,
    /// Device PIN
    pub pin: Option<BoundedStr<PIN_MAX_LEN>>,
    /// PIN failure arena, all-ones when no failures are recorded
    pub pin_fail_arena: [u32; ARENA_WORDS],
    /// Whether a passphrase is required in addition to the PIN
    pub passphrase_protection: bool,
    /// Whether the wallet secret was imported rather than generated
    pub imported: bool,
    /// User label
    pub label: BoundedStr<LABEL_MAX_LEN>,
    /// Display language
    pub language: BoundedStr<LANGUAGE_MAX_LEN>,
    /// Policy table
    pub policies: Vec<Policy, POLICY_MAX_COUNT>,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        let mut language = BoundedStr::new();
        language.set(DEFAULT_LANGUAGE);

        Self {
            node: None,
            mnemonic: None,
            pin: None,
            pin_fail_arena: [u32::MAX; ARENA_WORDS],
            passphrase_protection: false,
            imported: false,
            label: BoundedStr::new(),
            language,
            policies: default_policies(),
        }
    }
}

impl Zeroize for ConfigRecord {
    fn zeroize(&mut self) {
        self.node.zeroize();
        self.mnemonic.zeroize();
        self.pin.zeroize();
        self.pin_fail_arena.zeroize();
        self.passphrase_protection = false;
        self.imported = false;
        self.label.zeroize();
        self.language.zeroize();
        self.policies.clear();
    }
}

/// Default policy table for fresh and migrated records
pub fn default_policies() -> Vec<Policy, POLICY_MAX_COUNT> {
    let mut policies = Vec::new();

    let mut name = BoundedStr::new();
    name.set("Exchange");

    let _ = policies.push(Policy {
        name,
        enabled: false,
    });

    policies
}

impl Encode for ConfigRecord {
    type Error = StorageError;

    fn encode_len(&self) -> Result<usize, StorageError> {
        Ok(RECORD_LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, StorageError> {
        if buff.len() < RECORD_LEN {
            return Err(StorageError::InvalidLength);
        }

        let b = &mut buff[..RECORD_LEN];
        b.fill(0);

        LittleEndian::write_u32(&mut b[VERSION_OFFSET..], RecordVersion::CURRENT as u32);

        let mut flags = RecordFlags::empty();

        if let Some(node) = &self.node {
            flags |= RecordFlags::HAS_NODE;
            node.encode(&mut b[NODE_OFFSET..NODE_OFFSET + NODE_WIRE_LEN])?;
        }
        if let Some(mnemonic) = &self.mnemonic {
            flags |= RecordFlags::HAS_MNEMONIC;
            put_str(b, MNEMONIC_OFFSET, mnemonic.as_str());
        }
        if let Some(pin) = &self.pin {
            flags |= RecordFlags::HAS_PIN;
            put_str(b, PIN_OFFSET, pin.as_str());
        }
        if self.passphrase_protection {
            flags |= RecordFlags::PASSPHRASE_PROTECTION;
        }
        if self.imported {
            flags |= RecordFlags::IMPORTED;
        }

        b[FLAGS_OFFSET] = flags.bits();

        for (i, w) in self.pin_fail_arena.iter().enumerate() {
            LittleEndian::write_u32(&mut b[ARENA_OFFSET + i * 4..], *w);
        }

        put_str(b, LABEL_OFFSET, self.label.as_str());
        put_str(b, LANGUAGE_OFFSET, self.language.as_str());

        b[POLICY_OFFSET] = self.policies.len() as u8;
        for (i, p) in self.policies.iter().enumerate() {
            let o = POLICY_OFFSET + 1 + i * POLICY_ENTRY_LEN;
            put_str(b, o, p.name.as_str());
            b[o + 1 + POLICY_NAME_MAX_LEN] = p.enabled as u8;
        }

        Ok(RECORD_LEN)
    }
}

impl DecodeOwned for ConfigRecord {
    type Output = Self;
    type Error = StorageError;

    fn decode_owned(buff: &[u8]) -> Result<(Self, usize), StorageError> {
        if buff.len() < 4 {
            return Err(StorageError::InvalidLength);
        }

        // Reject versions newer than we understand rather than guessing
        let v = LittleEndian::read_u32(&buff[VERSION_OFFSET..]);
        let version =
            RecordVersion::try_from(v).map_err(|_| StorageError::UnsupportedVersion)?;

        let n = version.encoded_len();
        if buff.len() < n {
            return Err(StorageError::InvalidLength);
        }

        let flags =
            RecordFlags::from_bits(buff[FLAGS_OFFSET]).ok_or(StorageError::InvalidEncoding)?;

        // An initialized record carries exactly one secret form
        if flags.contains(RecordFlags::HAS_NODE) && flags.contains(RecordFlags::HAS_MNEMONIC) {
            return Err(StorageError::InvalidEncoding);
        }

        let node = match flags.contains(RecordFlags::HAS_NODE) {
            true => {
                let (node, _) =
                    HdNode::decode_owned(&buff[NODE_OFFSET..NODE_OFFSET + NODE_WIRE_LEN])?;
                Some(node)
            }
            false => None,
        };

        let mnemonic = match flags.contains(RecordFlags::HAS_MNEMONIC) {
            true => Some(take_str(buff, MNEMONIC_OFFSET)?),
            false => None,
        };

        let pin = match flags.contains(RecordFlags::HAS_PIN) {
            true => Some(take_str(buff, PIN_OFFSET)?),
            false => None,
        };

        let mut pin_fail_arena = [0u32; ARENA_WORDS];
        for (i, w) in pin_fail_arena.iter_mut().enumerate() {
            *w = LittleEndian::read_u32(&buff[ARENA_OFFSET + i * 4..]);
        }

        let label = take_str(buff, LABEL_OFFSET)?;

        // Fields added after the stored version migrate to defaults
        let language = match version >= RecordVersion::V2 {
            true => take_str(buff, LANGUAGE_OFFSET)?,
            false => {
                let mut l = BoundedStr::new();
                l.set(DEFAULT_LANGUAGE);
                l
            }
        };

        let policies = match version >= RecordVersion::V3 {
            true => take_policies(buff)?,
            false => default_policies(),
        };

        Ok((
            Self {
                node,
                mnemonic,
                pin,
                pin_fail_arena,
                passphrase_protection: flags.contains(RecordFlags::PASSPHRASE_PROTECTION),
                imported: flags.contains(RecordFlags::IMPORTED),
                label,
                language,
                policies,
            },
            n,
        ))
    }
}

/// Write a length-prefixed string block at `offset`, space for the block
/// is zero-filled by the caller
fn put_str(buff: &mut [u8], offset: usize, s: &str) {
    let d = s.as_bytes();

    buff[offset] = d.len() as u8;
    buff[offset + 1..offset + 1 + d.len()].copy_from_slice(d);
}

/// Read a length-prefixed string block of capacity `M` at `offset`
fn take_str<const M: usize>(buff: &[u8], offset: usize) -> Result<BoundedStr<M>, StorageError> {
    let len = buff[offset] as usize;
    if len > M {
        return Err(StorageError::InvalidEncoding);
    }

    let s = core::str::from_utf8(&buff[offset + 1..offset + 1 + len])
        .map_err(|_| StorageError::InvalidEncoding)?;

    BoundedStr::try_from_str(s).ok_or(StorageError::InvalidEncoding)
}

fn take_policies(buff: &[u8]) -> Result<Vec<Policy, POLICY_MAX_COUNT>, StorageError> {
    let count = buff[POLICY_OFFSET] as usize;
    if count > POLICY_MAX_COUNT {
        return Err(StorageError::InvalidEncoding);
    }

    let mut policies = Vec::new();
    for i in 0..count {
        let o = POLICY_OFFSET + 1 + i * POLICY_ENTRY_LEN;

        let name = take_str(buff, o)?;
        let enabled = buff[o + 1 + POLICY_NAME_MAX_LEN] != 0;

        let _ = policies.push(Policy { name, enabled });
    }

    Ok(policies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> ConfigRecord {
        let mut r = ConfigRecord {
            mnemonic: BoundedStr::try_from_str(
                "legal winner thank year wave sausage worth useful legal winner thank yellow",
            ),
            pin: BoundedStr::try_from_str("123456"),
            passphrase_protection: true,
            imported: true,
            ..Default::default()
        };

        r.label.set("wallet one");
        r.language.set("english");
        r.pin_fail_arena[0] = u32::MAX << 5;

        r.policies.clear();
        let mut name = BoundedStr::new();
        name.set("Exchange");
        r.policies.push(Policy {
            name,
            enabled: true,
        }).unwrap();

        r
    }

    #[test]
    fn encode_decode() {
        let r = full_record();

        let mut buff = [0xffu8; RECORD_LEN];
        let n = r.encode(&mut buff).unwrap();
        assert_eq!(n, RECORD_LEN);

        let (d, m) = ConfigRecord::decode_owned(&buff).unwrap();
        assert_eq!(m, n);
        assert_eq!(d, r);
    }

    #[test]
    fn encode_decode_node() {
        let mut r = ConfigRecord::default();
        r.node = Some(HdNode {
            depth: 2,
            fingerprint: 0x1234_5678,
            child_num: 7,
            chain_code: [0xaa; 32],
            private_key: [0xbb; 32],
            public_key: [0xcc; 33],
        });

        let mut buff = [0u8; RECORD_LEN];
        r.encode(&mut buff).unwrap();

        let (d, _) = ConfigRecord::decode_owned(&buff).unwrap();
        assert_eq!(d, r);
    }

    #[test]
    fn empty_record_has_no_secrets() {
        let r = ConfigRecord::default();

        let mut buff = [0u8; RECORD_LEN];
        r.encode(&mut buff).unwrap();

        let (d, _) = ConfigRecord::decode_owned(&buff).unwrap();
        assert_eq!(d.node, None);
        assert_eq!(d.mnemonic, None);
        assert_eq!(d.pin, None);
        assert_eq!(d.pin_fail_arena, [u32::MAX; ARENA_WORDS]);
        assert_eq!(d.language.as_str(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn both_secrets_rejected() {
        let r = full_record();

        let mut buff = [0u8; RECORD_LEN];
        r.encode(&mut buff).unwrap();

        // Force both presence flags on
        buff[FLAGS_OFFSET] |= (RecordFlags::HAS_NODE | RecordFlags::HAS_MNEMONIC).bits();

        assert_eq!(
            ConfigRecord::decode_owned(&buff),
            Err(StorageError::InvalidEncoding)
        );
    }

    #[test]
    fn migrates_v1() {
        let r = full_record();

        let mut buff = [0u8; RECORD_LEN];
        r.encode(&mut buff).unwrap();

        // Rewrite as a v1 image: truncate and stamp the old version
        let mut v1 = [0u8; LANGUAGE_OFFSET];
        v1.copy_from_slice(&buff[..LANGUAGE_OFFSET]);
        LittleEndian::write_u32(&mut v1[VERSION_OFFSET..], RecordVersion::V1 as u32);

        let (d, n) = ConfigRecord::decode_owned(&v1).unwrap();
        assert_eq!(n, LANGUAGE_OFFSET);

        // Carried fields survive, added fields take defaults
        assert_eq!(d.mnemonic, r.mnemonic);
        assert_eq!(d.pin, r.pin);
        assert_eq!(d.pin_fail_arena, r.pin_fail_arena);
        assert_eq!(d.label, r.label);
        assert_eq!(d.language.as_str(), DEFAULT_LANGUAGE);
        assert_eq!(d.policies, default_policies());
    }

    #[test]
    fn migrates_v2() {
        let r = full_record();

        let mut buff = [0u8; RECORD_LEN];
        r.encode(&mut buff).unwrap();

        let mut v2 = [0u8; POLICY_OFFSET];
        v2.copy_from_slice(&buff[..POLICY_OFFSET]);
        LittleEndian::write_u32(&mut v2[VERSION_OFFSET..], RecordVersion::V2 as u32);

        let (d, n) = ConfigRecord::decode_owned(&v2).unwrap();
        assert_eq!(n, POLICY_OFFSET);

        assert_eq!(d.language, r.language);
        assert_eq!(d.policies, default_policies());
    }

    #[test]
    fn newer_version_rejected() {
        let r = ConfigRecord::default();

        let mut buff = [0u8; RECORD_LEN];
        r.encode(&mut buff).unwrap();

        LittleEndian::write_u32(&mut buff[VERSION_OFFSET..], RecordVersion::CURRENT as u32 + 1);

        assert_eq!(
            ConfigRecord::decode_owned(&buff),
            Err(StorageError::UnsupportedVersion)
        );
    }

    #[test]
    fn truncated_rejected() {
        let r = ConfigRecord::default();

        let mut buff = [0u8; RECORD_LEN];
        r.encode(&mut buff).unwrap();

        assert_eq!(
            ConfigRecord::decode_owned(&buff[..RECORD_LEN - 1]),
            Err(StorageError::InvalidLength)
        );
    }

    #[test]
    fn zeroize_clears_secrets() {
        let mut r = full_record();

        r.zeroize();

        assert_eq!(r.node, None);
        assert_eq!(r.mnemonic, None);
        assert_eq!(r.pin, None);
        assert_eq!(r.pin_fail_arena, [0u32; ARENA_WORDS]);
    }
}
