// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Flash access abstraction for the trust core.
//!
//! Storage code is written against the [`Flash`] trait and the fixed
//! [`map`] so the same logic runs over MCU flash drivers and the
//! in-memory [`ram::RamFlash`] used by tests and the simulator.
//!
//! NOR semantics apply throughout: programming can only clear bits
//! (`1 -> 0`), erase returns a whole region to `0xff`. Callers that need
//! to set bits must rewrite via erase.

pub mod map;
pub use map::{FlashRegion, Region, FLASH_MAP, FLASH_TOTAL_LEN, STORAGE_RING, STORAGE_SECTOR_LEN};

#[cfg(feature = "std")]
pub mod ram;
#[cfg(feature = "std")]
pub use ram::RamFlash;

/// Flash operation errors
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[repr(u8)]
pub enum FlashError {
    /// Access outside the bounds of the region
    #[cfg_attr(feature = "thiserror", error("access out of region bounds"))]
    OutOfBounds = 0x01,

    /// Program operation failed or did not verify
    #[cfg_attr(feature = "thiserror", error("program failed"))]
    Program = 0x02,

    /// Erase operation failed
    #[cfg_attr(feature = "thiserror", error("erase failed"))]
    Erase = 0x03,
}

/// Flash device abstraction.
///
/// Offsets are relative to the start of the addressed [`Region`], accesses
/// are byte granular and must not cross the region end.
pub trait Flash {
    /// Read `buff.len()` bytes from `offset` within `region`
    fn read(&self, region: Region, offset: usize, buff: &mut [u8]) -> Result<(), FlashError>;

    /// Program `data` at `offset` within `region`.
    ///
    /// Programming only clears bits, bits already at zero stay zero.
    fn program(&mut self, region: Region, offset: usize, data: &[u8]) -> Result<(), FlashError>;

    /// Erase `region` back to the unprogrammed (`0xff`) state
    fn erase(&mut self, region: Region) -> Result<(), FlashError>;
}

/// Blanket [`Flash`] impl for mutable references
impl<T: Flash> Flash for &mut T {
    fn read(&self, region: Region, offset: usize, buff: &mut [u8]) -> Result<(), FlashError> {
        T::read(self, region, offset, buff)
    }

    fn program(&mut self, region: Region, offset: usize, data: &[u8]) -> Result<(), FlashError> {
        T::program(self, region, offset, data)
    }

    fn erase(&mut self, region: Region) -> Result<(), FlashError> {
        T::erase(self, region)
    }
}
