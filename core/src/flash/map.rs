// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Fixed flash region map.
//!
//! The map is ordered, non-overlapping and known at build time, with
//! three equal storage sectors forming the commit rotation ring.
//!
//! ```text
//! 0x00000 +-------------------+
//!         |    BOOTLOADER     |  64 KiB
//! 0x10000 +-------------------+
//!         |      CONFIG       |  32 KiB
//! 0x18000 +-------------------+
//!         |     STORAGE 1     |  16 KiB \
//! 0x1c000 +-------------------+          \
//!         |     STORAGE 2     |  16 KiB   rotation ring
//! 0x20000 +-------------------+          /
//!         |     STORAGE 3     |  16 KiB /
//! 0x24000 +-------------------+
//!         |        APP        |  880 KiB
//! 0x100000+-------------------+
//! ```

use static_assertions::const_assert;

/// Flash region identifiers
#[derive(Copy, Clone, PartialEq, Eq, Debug, strum::Display, strum::EnumIter)]
pub enum Region {
    /// Immutable bootloader image
    Bootloader,
    /// Device configuration constants
    Config,
    /// Storage sector 1, first in scan priority
    Storage1,
    /// Storage sector 2
    Storage2,
    /// Storage sector 3
    Storage3,
    /// Application image
    App,
}

/// One fixed region of device flash
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct FlashRegion {
    /// Region identifier
    pub region: Region,
    /// Offset of the region from the start of flash
    pub start: usize,
    /// Region length in bytes
    pub len: usize,
}

/// Total flash length in bytes
pub const FLASH_TOTAL_LEN: usize = 1024 * 1024;

/// Length of each storage sector in bytes
pub const STORAGE_SECTOR_LEN: usize = 16 * 1024;

/// Fixed region map, indexed by [`Region`] discriminant
pub const FLASH_MAP: [FlashRegion; 6] = [
    FlashRegion {
        region: Region::Bootloader,
        start: 0x0000_0000,
        len: 64 * 1024,
    },
    FlashRegion {
        region: Region::Config,
        start: 0x0001_0000,
        len: 32 * 1024,
    },
    FlashRegion {
        region: Region::Storage1,
        start: 0x0001_8000,
        len: STORAGE_SECTOR_LEN,
    },
    FlashRegion {
        region: Region::Storage2,
        start: 0x0001_c000,
        len: STORAGE_SECTOR_LEN,
    },
    FlashRegion {
        region: Region::Storage3,
        start: 0x0002_0000,
        len: STORAGE_SECTOR_LEN,
    },
    FlashRegion {
        region: Region::App,
        start: 0x0002_4000,
        len: FLASH_TOTAL_LEN - 0x0002_4000,
    },
];

/// Storage rotation ring, in scan priority order
pub const STORAGE_RING: [Region; 3] = [Region::Storage1, Region::Storage2, Region::Storage3];

// Regions are adjacent and in address order, so the map cannot overlap
const_assert!(FLASH_MAP[0].start == 0);
const_assert!(FLASH_MAP[1].start == FLASH_MAP[0].start + FLASH_MAP[0].len);
const_assert!(FLASH_MAP[2].start == FLASH_MAP[1].start + FLASH_MAP[1].len);
const_assert!(FLASH_MAP[3].start == FLASH_MAP[2].start + FLASH_MAP[2].len);
const_assert!(FLASH_MAP[4].start == FLASH_MAP[3].start + FLASH_MAP[3].len);
const_assert!(FLASH_MAP[5].start == FLASH_MAP[4].start + FLASH_MAP[4].len);
const_assert!(FLASH_MAP[5].start + FLASH_MAP[5].len == FLASH_TOTAL_LEN);

impl Region {
    /// Fetch the map entry for a region
    pub fn info(self) -> &'static FlashRegion {
        &FLASH_MAP[self as usize]
    }

    /// Fetch the successor of a storage sector in the rotation ring
    pub fn next_storage(self) -> Region {
        match self {
            Region::Storage1 => Region::Storage2,
            Region::Storage2 => Region::Storage3,
            _ => Region::Storage1,
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn map_indexed_by_discriminant() {
        for (i, r) in Region::iter().enumerate() {
            assert_eq!(FLASH_MAP[i].region, r);
            assert_eq!(r.info().region, r);
        }
    }

    #[test]
    fn map_ordered_without_overlap() {
        for w in FLASH_MAP.windows(2) {
            assert!(
                w[0].start + w[0].len <= w[1].start,
                "{} overlaps {}",
                w[0].region,
                w[1].region
            );
        }
    }

    #[test]
    fn ring_covers_storage_sectors() {
        for r in STORAGE_RING {
            assert_eq!(r.info().len, STORAGE_SECTOR_LEN);
        }

        // Ring successor walks 1 -> 2 -> 3 -> 1
        assert_eq!(Region::Storage1.next_storage(), Region::Storage2);
        assert_eq!(Region::Storage2.next_storage(), Region::Storage3);
        assert_eq!(Region::Storage3.next_storage(), Region::Storage1);
    }
}
