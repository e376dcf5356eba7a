// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Crash-safe device storage.
//!
//! [`Store`] owns a RAM shadow of the persisted [`ConfigRecord`] plus the
//! device identity, and commits by rotating whole blocks through the
//! three-sector storage ring: erase the next sector, program the block
//! body, program the validity magic last, then verify the readback by
//! CRC before retiring the old sector. Power loss at any point leaves
//! exactly one claimed, intact sector.
//!
//! ## Block layout:
//! ```text
//!  offset  len  field
//!       0    4  MAGIC "stor"     programmed last
//!       4   12  UUID
//!      16   25  UUID ASCII       24 hex chars, NUL terminated
//!      41  568  CONFIG RECORD    see [record]
//! ```
//!
//! The PIN failure arena inside the record is the one exception to
//! whole-block writes: failures are made durable with a single in-place
//! word program, see [`arena`].

pub mod arena;
pub mod record;

use crc::{Crc, CRC_32_ISO_HDLC};
use encdec::{DecodeOwned, Encode};
use rand_core::CryptoRngCore;
use static_assertions::const_assert;
use zeroize::Zeroize;

use keywarden_wire::{secrets::HdNode, WireError, PIN_MAX_LEN};

use crate::flash::{Flash, FlashError, Region, STORAGE_RING, STORAGE_SECTOR_LEN};
use crate::types::BoundedStr;

use record::{ConfigRecord, Policy, ARENA_OFFSET, RECORD_LEN};

/// Storage block magic
pub const STORAGE_MAGIC: [u8; 4] = *b"stor";

/// Device UUID length in bytes
pub const UUID_LEN: usize = 12;

/// Rendered UUID length, 24 hex chars and a trailing NUL
pub const UUID_STR_LEN: usize = 25;

/// Length of the identity header ahead of the record
pub const META_LEN: usize = 4 + UUID_LEN + UUID_STR_LEN;

/// Full storage block length
pub const BLOCK_LEN: usize = META_LEN + RECORD_LEN;

/// Maximum session passphrase length in bytes
pub const PASSPHRASE_MAX_LEN: usize = 50;

// A block must fit its sector, with the arena inside the block
const_assert!(BLOCK_LEN <= STORAGE_SECTOR_LEN);
const_assert!(META_LEN + ARENA_OFFSET + arena::ARENA_WORDS * 4 <= BLOCK_LEN);

const BLOCK_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Storage errors
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[repr(u8)]
pub enum StorageError {
    /// Invalid argument or buffer length
    #[cfg_attr(feature = "thiserror", error("invalid length"))]
    InvalidLength = 0x01,

    /// Record or block encoding invalid
    #[cfg_attr(feature = "thiserror", error("invalid encoding"))]
    InvalidEncoding = 0x02,

    /// Record version newer than this firmware understands
    #[cfg_attr(feature = "thiserror", error("unsupported record version"))]
    UnsupportedVersion = 0x03,

    /// Flash operation failed
    #[cfg_attr(feature = "thiserror", error("flash operation failed"))]
    Flash = 0x04,
}

impl From<WireError> for StorageError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::InvalidLength => StorageError::InvalidLength,
            _ => StorageError::InvalidEncoding,
        }
    }
}

impl From<encdec::Error> for StorageError {
    fn from(e: encdec::Error) -> Self {
        StorageError::from(WireError::from(e))
    }
}

impl From<FlashError> for StorageError {
    fn from(_: FlashError) -> Self {
        StorageError::Flash
    }
}

/// Device identity, minted at provisioning and preserved across commits
#[derive(Clone, PartialEq, Debug)]
pub struct StorageMeta {
    /// Device UUID
    pub uuid: [u8; UUID_LEN],
    uuid_str: [u8; UUID_STR_LEN],
}

impl StorageMeta {
    /// Mint a fresh identity from the hardware RNG
    fn generate<RNG: CryptoRngCore>(rng: &mut RNG) -> Self {
        let mut uuid = [0u8; UUID_LEN];
        rng.fill_bytes(&mut uuid);

        Self::from_uuid(uuid)
    }

    /// Rebuild an identity from a stored UUID, re-rendering the ASCII
    /// form rather than trusting the flash copy
    fn from_uuid(uuid: [u8; UUID_LEN]) -> Self {
        const HEX: &[u8; 16] = b"0123456789abcdef";

        let mut uuid_str = [0u8; UUID_STR_LEN];
        for (i, b) in uuid.iter().enumerate() {
            uuid_str[i * 2] = HEX[(b >> 4) as usize];
            uuid_str[i * 2 + 1] = HEX[(b & 0x0f) as usize];
        }

        Self { uuid, uuid_str }
    }

    /// Device ID as rendered hex
    pub fn device_id(&self) -> &str {
        core::str::from_utf8(&self.uuid_str[..UUID_STR_LEN - 1]).unwrap_or_default()
    }
}

/// Volatile session cache, never written to flash
#[derive(Default)]
struct Session {
    pin: Option<BoundedStr<PIN_MAX_LEN>>,
    passphrase: Option<BoundedStr<PASSPHRASE_MAX_LEN>>,
}

impl Session {
    fn clear(&mut self) {
        self.pin.zeroize();
        self.passphrase.zeroize();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Storage manager.
///
/// All mutation happens through the RAM shadow and becomes durable via
/// [`Store::commit`], with the single exception of the PIN failure
/// arena which programs failure words in place.
pub struct Store<F: Flash> {
    flash: F,
    meta: Option<StorageMeta>,
    shadow: ConfigRecord,
    active: Option<Region>,
    session: Session,
}

impl<F: Flash> Store<F> {
    /// Create a store over a flash device, see [`Store::init`]
    pub fn new(flash: F) -> Self {
        Self {
            flash,
            meta: None,
            shadow: ConfigRecord::default(),
            active: None,
            session: Session::default(),
        }
    }

    /// Scan the storage ring and adopt the active sector.
    ///
    /// The first sector carrying the magic wins. A claimed sector whose
    /// record does not decode fails safe: the store is formatted fresh
    /// and uninitialized rather than guessing at contents. When no
    /// sector is claimed a fresh identity is minted and committed.
    pub fn init<RNG: CryptoRngCore>(&mut self, rng: &mut RNG) -> Result<(), StorageError> {
        self.session.clear();
        self.shadow.zeroize();
        self.shadow = ConfigRecord::default();
        self.meta = None;
        self.active = None;

        for region in STORAGE_RING {
            let mut magic = [0u8; 4];
            if self.flash.read(region, 0, &mut magic).is_err() || magic != STORAGE_MAGIC {
                continue;
            }

            let mut block = [0u8; BLOCK_LEN];
            let parsed = match self.flash.read(region, 0, &mut block) {
                Ok(()) => Self::parse_block(&block),
                Err(e) => Err(StorageError::from(e)),
            };
            block.zeroize();

            match parsed {
                Ok((meta, shadow)) => {
                    #[cfg(feature = "log")]
                    log::debug!("storage active in {} ({})", region, meta.device_id());

                    self.meta = Some(meta);
                    self.shadow = shadow;
                    self.active = Some(region);

                    return Ok(());
                }
                Err(_e) => {
                    // The first claimed sector is authoritative
                    #[cfg(feature = "log")]
                    log::warn!("corrupt record in {}: {:?}", region, _e);
                    break;
                }
            }
        }

        self.format(rng)
    }

    /// Format a fresh store: new identity, empty record, first sector
    fn format<RNG: CryptoRngCore>(&mut self, rng: &mut RNG) -> Result<(), StorageError> {
        self.meta = Some(StorageMeta::generate(rng));
        self.shadow.zeroize();
        self.shadow = ConfigRecord::default();

        if !self.write_block(STORAGE_RING[0]) {
            return Err(StorageError::Flash);
        }

        self.active = Some(STORAGE_RING[0]);

        #[cfg(feature = "log")]
        log::info!("storage formatted, device id {}", self.device_id());

        Ok(())
    }

    /// Commit the shadow record to the next sector in the ring.
    ///
    /// The old sector is retired only once the new image verifies, so a
    /// failure at any step leaves the previous commit intact and
    /// reports `false`.
    pub fn commit(&mut self) -> bool {
        let target = match self.active {
            Some(r) => r.next_storage(),
            None => STORAGE_RING[0],
        };

        if !self.write_block(target) {
            return false;
        }

        if let Some(old) = self.active {
            if old != target && self.flash.erase(old).is_err() {
                // Both sectors now carry magic, scan priority decides on
                // the next boot and the next commit retries this target
                #[cfg(feature = "log")]
                log::warn!("failed to retire {}", old);
                return false;
            }
        }

        self.active = Some(target);

        #[cfg(feature = "log")]
        log::debug!("committed to {}", target);

        true
    }

    /// Erase all storage sectors and the session cache, then
    /// re-provision an empty record under a fresh identity
    pub fn wipe<RNG: CryptoRngCore>(&mut self, rng: &mut RNG) -> bool {
        let mut ok = true;
        for region in STORAGE_RING {
            if self.flash.erase(region).is_err() {
                ok = false;
            }
        }

        self.session.clear();
        self.shadow.zeroize();
        self.shadow = ConfigRecord::default();
        self.meta = None;
        self.active = None;

        ok && self.format(rng).is_ok()
    }

    /// Copy the active block (identity header and record) into `buff`.
    ///
    /// Returns `false` when `buff` is not exactly [`BLOCK_LEN`] or the
    /// store has no identity yet.
    pub fn read(&self, buff: &mut [u8]) -> bool {
        if buff.len() != BLOCK_LEN {
            return false;
        }

        let mut block = [0u8; BLOCK_LEN];
        let ok = self.encode_block(&mut block).is_ok();
        if ok {
            buff.copy_from_slice(&block);
        }
        block.zeroize();

        ok
    }

    fn parse_block(block: &[u8; BLOCK_LEN]) -> Result<(StorageMeta, ConfigRecord), StorageError> {
        if block[..4] != STORAGE_MAGIC {
            return Err(StorageError::InvalidEncoding);
        }

        let mut uuid = [0u8; UUID_LEN];
        uuid.copy_from_slice(&block[4..4 + UUID_LEN]);

        let (record, _) = ConfigRecord::decode_owned(&block[META_LEN..])?;

        Ok((StorageMeta::from_uuid(uuid), record))
    }

    fn encode_block(&self, block: &mut [u8; BLOCK_LEN]) -> Result<(), StorageError> {
        let meta = self.meta.as_ref().ok_or(StorageError::InvalidEncoding)?;

        block[..4].copy_from_slice(&STORAGE_MAGIC);
        block[4..4 + UUID_LEN].copy_from_slice(&meta.uuid);
        block[4 + UUID_LEN..META_LEN].copy_from_slice(&meta.uuid_str);

        self.shadow.encode(&mut block[META_LEN..])?;

        Ok(())
    }

    fn write_block(&mut self, target: Region) -> bool {
        let mut block = [0u8; BLOCK_LEN];
        let mut check = [0u8; BLOCK_LEN];

        let ok = self.write_block_inner(target, &mut block, &mut check);

        block.zeroize();
        check.zeroize();

        ok
    }

    fn write_block_inner(
        &mut self,
        target: Region,
        block: &mut [u8; BLOCK_LEN],
        check: &mut [u8; BLOCK_LEN],
    ) -> bool {
        if self.encode_block(block).is_err() {
            return false;
        }

        if self.flash.erase(target).is_err() {
            return false;
        }

        // Body first, the magic that claims the sector goes last so an
        // interrupted write leaves the sector unclaimed
        if self.flash.program(target, 4, &block[4..]).is_err() {
            return false;
        }
        if self.flash.program(target, 0, &block[..4]).is_err() {
            return false;
        }

        // Trust the sector only once the programmed image checks out
        if self.flash.read(target, 0, check).is_err() {
            return false;
        }

        BLOCK_CRC.checksum(&check[..]) == BLOCK_CRC.checksum(&block[..])
    }

    /// Check a candidate PIN, recording the outcome in the failure arena.
    ///
    /// The comparison is constant time over the full PIN capacity. A
    /// wrong candidate clears the next arena bit with a durable in-place
    /// word program before this returns. A correct candidate resets a
    /// non-zero count via a full commit rotation.
    ///
    /// Returns `false` when no PIN is set.
    pub fn is_pin_correct(&mut self, candidate: &str) -> bool {
        let ok = match &self.shadow.pin {
            Some(pin) => pin.ct_eq(candidate),
            None => false,
        };

        if !ok {
            self.record_pin_failure();
            return false;
        }

        if self.pin_fails() != 0 {
            arena::reset(&mut self.shadow.pin_fail_arena);
            if !self.commit() {
                // Count reset stays pending, flash still holds it
                #[cfg(feature = "log")]
                log::warn!("failed to reset pin failure count");
            }
        }

        true
    }

    fn record_pin_failure(&mut self) {
        let update = match arena::increment(&mut self.shadow.pin_fail_arena) {
            Some(u) => u,
            None => return,
        };

        let region = match self.active {
            Some(r) => r,
            None => return,
        };

        let offset = META_LEN + ARENA_OFFSET + update.word * 4;
        if self
            .flash
            .program(region, offset, &update.value.to_le_bytes())
            .is_err()
        {
            #[cfg(feature = "log")]
            log::warn!("failed to persist pin failure");
        }
    }

    /// Current PIN failure count.
    ///
    /// A corrupt arena reports the ceiling, throttling as if fully
    /// exhausted rather than unlocking.
    pub fn pin_fails(&self) -> u32 {
        match arena::fail_count(&self.shadow.pin_fail_arena) {
            Ok(n) => n,
            Err(_) => {
                #[cfg(feature = "log")]
                log::warn!("pin failure arena corrupt");
                arena::CEILING
            }
        }
    }

    /// Set the wallet mnemonic, displacing any stored node
    pub fn set_mnemonic(&mut self, mnemonic: &str) -> Result<(), StorageError> {
        let m = BoundedStr::try_from_str(mnemonic).ok_or(StorageError::InvalidLength)?;

        self.shadow.node.zeroize();
        self.shadow.mnemonic.zeroize();
        self.shadow.mnemonic = Some(m);

        Ok(())
    }

    /// Set the wallet node, displacing any stored mnemonic
    pub fn set_node(&mut self, node: HdNode) {
        self.shadow.mnemonic.zeroize();
        self.shadow.node.zeroize();
        self.shadow.node = Some(node);
    }

    /// Set the device PIN
    pub fn set_pin(&mut self, pin: &str) -> Result<(), StorageError> {
        let p = BoundedStr::try_from_str(pin).ok_or(StorageError::InvalidLength)?;

        self.shadow.pin.zeroize();
        self.shadow.pin = Some(p);

        Ok(())
    }

    /// Remove the device PIN
    pub fn clear_pin(&mut self) {
        self.shadow.pin.zeroize();
    }

    /// Set the user label
    pub fn set_label(&mut self, label: &str) -> Result<(), StorageError> {
        match self.shadow.label.set(label) {
            true => Ok(()),
            false => Err(StorageError::InvalidLength),
        }
    }

    /// Set the display language
    pub fn set_language(&mut self, language: &str) -> Result<(), StorageError> {
        match self.shadow.language.set(language) {
            true => Ok(()),
            false => Err(StorageError::InvalidLength),
        }
    }

    /// Enable or disable passphrase protection
    pub fn set_passphrase_protection(&mut self, on: bool) {
        self.shadow.passphrase_protection = on;
    }

    /// Mark the wallet secret as imported
    pub fn set_imported(&mut self, imported: bool) {
        self.shadow.imported = imported;
    }

    /// Update a policy table entry, `false` when the name is unknown
    pub fn set_policy(&mut self, name: &str, enabled: bool) -> bool {
        for p in self.shadow.policies.iter_mut() {
            if p.name.as_str() == name {
                p.enabled = enabled;
                return true;
            }
        }

        false
    }

    /// Check whether a policy name exists in the table
    pub fn has_policy(&self, name: &str) -> bool {
        self.shadow.policies.iter().any(|p| p.name.as_str() == name)
    }

    /// Whether a wallet secret (node or mnemonic) is stored
    pub fn is_initialized(&self) -> bool {
        self.shadow.node.is_some() || self.shadow.mnemonic.is_some()
    }

    /// Whether a PIN is set
    pub fn has_pin(&self) -> bool {
        self.shadow.pin.is_some()
    }

    /// Whether a passphrase is required in addition to the PIN
    pub fn passphrase_protection(&self) -> bool {
        self.shadow.passphrase_protection
    }

    /// Whether the wallet secret was imported
    pub fn imported(&self) -> bool {
        self.shadow.imported
    }

    /// User label
    pub fn label(&self) -> &str {
        self.shadow.label.as_str()
    }

    /// Display language
    pub fn language(&self) -> &str {
        self.shadow.language.as_str()
    }

    /// Policy table
    pub fn policies(&self) -> &[Policy] {
        &self.shadow.policies
    }

    /// Device ID as rendered hex, empty until the store is formatted
    pub fn device_id(&self) -> &str {
        self.meta.as_ref().map(|m| m.device_id()).unwrap_or_default()
    }

    /// Device identity, [`None`] until the store is formatted
    pub fn meta(&self) -> Option<&StorageMeta> {
        self.meta.as_ref()
    }

    /// Stored wallet node, if any
    pub fn node(&self) -> Option<&HdNode> {
        self.shadow.node.as_ref()
    }

    /// Stored mnemonic, if any
    pub fn mnemonic(&self) -> Option<&str> {
        self.shadow.mnemonic.as_ref().map(|m| m.as_str())
    }

    /// Sector currently holding the committed record
    pub fn active_region(&self) -> Option<Region> {
        self.active
    }

    /// Cache an entered PIN in the volatile session
    pub fn cache_pin(&mut self, pin: &str) {
        if let Some(p) = BoundedStr::try_from_str(pin) {
            self.session.pin.zeroize();
            self.session.pin = Some(p);
        }
    }

    /// Cache an entered passphrase in the volatile session
    pub fn cache_passphrase(&mut self, passphrase: &str) {
        if let Some(p) = BoundedStr::try_from_str(passphrase) {
            self.session.passphrase.zeroize();
            self.session.passphrase = Some(p);
        }
    }

    /// Drop the cached session PIN, leaving any passphrase in place
    pub fn uncache_pin(&mut self) {
        self.session.pin.zeroize();
    }

    /// Whether a PIN is cached for this session
    pub fn is_pin_cached(&self) -> bool {
        self.session.pin.is_some()
    }

    /// Whether a passphrase is cached for this session
    pub fn is_passphrase_cached(&self) -> bool {
        self.session.passphrase.is_some()
    }

    /// Cached session passphrase, if any
    pub fn passphrase(&self) -> Option<&str> {
        self.session.passphrase.as_ref().map(|p| p.as_str())
    }

    /// Zeroize and drop all session state
    pub fn clear_session(&mut self) {
        self.session.clear();
    }
}

/// Suggested delay in seconds before accepting another PIN attempt.
///
/// Free attempts first, then exponential back-off capped at 4096
/// seconds per attempt.
pub fn pin_delay_secs(fails: u32) -> u32 {
    match fails {
        0..=2 => 0,
        n => 1 << (n - 2).min(12),
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::*;
    use crate::flash::RamFlash;

    fn store(flash: &mut RamFlash) -> Store<&mut RamFlash> {
        let mut s = Store::new(flash);
        s.init(&mut OsRng {}).unwrap();
        s
    }

    #[test]
    fn formats_fresh_flash() {
        let mut flash = RamFlash::new();
        let s = store(&mut flash);

        assert!(!s.is_initialized());
        assert_eq!(s.active_region(), Some(Region::Storage1));
        assert_eq!(s.device_id().len(), 24);
        assert!(s.device_id().chars().all(|c| c.is_ascii_hexdigit()));

        // Sector claimed on flash
        let mut magic = [0u8; 4];
        flash.read(Region::Storage1, 0, &mut magic).unwrap();
        assert_eq!(magic, STORAGE_MAGIC);
    }

    #[test]
    fn identity_survives_reinit() {
        let mut flash = RamFlash::new();

        let id = {
            let mut s = store(&mut flash);
            s.set_label("persistent").unwrap();
            assert!(s.commit());
            String::from(s.device_id())
        };

        let s = store(&mut flash);
        assert_eq!(s.device_id(), id);
        assert_eq!(s.label(), "persistent");
    }

    #[test]
    fn commit_rotates_through_ring() {
        let mut flash = RamFlash::new();
        let mut s = store(&mut flash);

        assert_eq!(s.active_region(), Some(Region::Storage1));

        assert!(s.commit());
        assert_eq!(s.active_region(), Some(Region::Storage2));

        assert!(s.commit());
        assert_eq!(s.active_region(), Some(Region::Storage3));

        assert!(s.commit());
        assert_eq!(s.active_region(), Some(Region::Storage1));

        // Only the active sector is claimed
        drop(s);
        for (region, claimed) in [
            (Region::Storage1, true),
            (Region::Storage2, false),
            (Region::Storage3, false),
        ] {
            let mut magic = [0u8; 4];
            flash.read(region, 0, &mut magic).unwrap();
            assert_eq!(magic == STORAGE_MAGIC, claimed, "{}", region);
        }
    }

    #[test]
    fn read_requires_exact_length() {
        let mut flash = RamFlash::new();
        let s = store(&mut flash);

        let mut short = [0u8; BLOCK_LEN - 1];
        assert!(!s.read(&mut short));

        let mut block = [0u8; BLOCK_LEN];
        assert!(s.read(&mut block));
        assert_eq!(&block[..4], &STORAGE_MAGIC);
    }

    #[test]
    fn pin_failure_is_durable_without_commit() {
        let mut flash = RamFlash::new();

        {
            let mut s = store(&mut flash);
            s.set_pin("1234").unwrap();
            assert!(s.commit());

            assert!(!s.is_pin_correct("9999"));
            assert!(!s.is_pin_correct("0000"));
            assert_eq!(s.pin_fails(), 2);
        }

        // Failures survive a restart though no commit happened
        let mut s = store(&mut flash);
        assert_eq!(s.pin_fails(), 2);

        // Correct entry resets the count via rotation
        assert!(s.is_pin_correct("1234"));
        assert_eq!(s.pin_fails(), 0);
        assert_eq!(s.active_region(), Some(Region::Storage3));
    }

    #[test]
    fn pin_reset_survives_restart() {
        let mut flash = RamFlash::new();

        {
            let mut s = store(&mut flash);
            s.set_pin("1234").unwrap();
            assert!(s.commit());
            assert!(!s.is_pin_correct("9999"));
            assert!(s.is_pin_correct("1234"));
        }

        let s = store(&mut flash);
        assert_eq!(s.pin_fails(), 0);
    }

    #[test]
    fn no_pin_fails_closed() {
        let mut flash = RamFlash::new();
        let mut s = store(&mut flash);

        assert!(!s.is_pin_correct(""));
        assert!(!s.is_pin_correct("1234"));
    }

    #[test]
    fn corrupt_record_formats_fresh() {
        let mut flash = RamFlash::new();

        let id = {
            let mut s = store(&mut flash);
            s.set_label("doomed").unwrap();
            assert!(s.commit());
            String::from(s.device_id())
        };

        // Zero the record version in place, programs can always clear bits
        flash
            .program(Region::Storage2, META_LEN, &[0u8; 4])
            .unwrap();

        let s = store(&mut flash);
        assert!(!s.is_initialized());
        assert_eq!(s.label(), "");
        assert_ne!(s.device_id(), id);
        assert_eq!(s.active_region(), Some(Region::Storage1));
    }

    #[test]
    fn wipe_mints_new_identity() {
        let mut flash = RamFlash::new();
        let mut s = store(&mut flash);

        s.set_mnemonic("legal winner thank year wave sausage worth useful legal winner thank yellow")
            .unwrap();
        s.set_pin("1234").unwrap();
        s.cache_pin("1234");
        assert!(s.commit());

        let id = String::from(s.device_id());

        assert!(s.wipe(&mut OsRng {}));

        assert!(!s.is_initialized());
        assert!(!s.has_pin());
        assert!(!s.is_pin_cached());
        assert_ne!(s.device_id(), id);
        assert_eq!(s.active_region(), Some(Region::Storage1));
    }

    #[test]
    fn session_cache_is_volatile() {
        let mut flash = RamFlash::new();

        {
            let mut s = store(&mut flash);
            s.cache_pin("1234");
            s.cache_passphrase("open sesame");

            assert!(s.is_pin_cached());
            assert!(s.is_passphrase_cached());
            assert_eq!(s.passphrase(), Some("open sesame"));

            s.clear_session();
            assert!(!s.is_pin_cached());
            assert!(!s.is_passphrase_cached());
        }

        {
            let mut s = store(&mut flash);
            s.cache_pin("1234");
        }

        let s = store(&mut flash);
        assert!(!s.is_pin_cached());
    }

    #[test]
    fn secret_forms_are_exclusive() {
        let mut flash = RamFlash::new();
        let mut s = store(&mut flash);

        s.set_mnemonic("legal winner thank year wave sausage worth useful legal winner thank yellow")
            .unwrap();
        s.set_node(HdNode::default());
        assert!(s.mnemonic().is_none());
        assert!(s.node().is_some());

        s.set_mnemonic("zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong")
            .unwrap();
        assert!(s.node().is_none());
        assert!(s.mnemonic().is_some());
    }

    #[test]
    fn delay_schedule() {
        assert_eq!(pin_delay_secs(0), 0);
        assert_eq!(pin_delay_secs(2), 0);
        assert_eq!(pin_delay_secs(3), 2);
        assert_eq!(pin_delay_secs(4), 4);
        assert_eq!(pin_delay_secs(10), 256);
        assert_eq!(pin_delay_secs(14), 4096);
        // Capped from here on
        assert_eq!(pin_delay_secs(100), 4096);
        assert_eq!(pin_delay_secs(arena::CEILING), 4096);
    }
}
