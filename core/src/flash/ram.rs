// Copyright (c) 2022-2023 The MobileCoin Foundation

//! In-memory flash with NOR semantics, backing tests and the simulator.
//!
//! Programs AND into the existing contents (bits can only be cleared) and
//! erase fills a region with `0xff`, matching what the storage code must
//! assume about real parts. Programs can be forced to fail at a chosen
//! address to model power loss or a controller fault mid-commit.

use super::{Flash, FlashError, Region, FLASH_TOTAL_LEN};

/// In-memory NOR flash model
pub struct RamFlash {
    mem: Vec<u8>,
    fail_program_at: Option<(Region, usize)>,
}

impl RamFlash {
    /// Create a fully-erased flash image
    pub fn new() -> Self {
        Self {
            mem: vec![0xff; FLASH_TOTAL_LEN],
            fail_program_at: None,
        }
    }

    /// Fail any program starting at `offset` within `region`.
    ///
    /// The fault is sticky until [`Self::clear_fault`] is called, the
    /// targeted bytes are left untouched as if power was lost before the
    /// write completed.
    pub fn fail_program_at(&mut self, region: Region, offset: usize) {
        self.fail_program_at = Some((region, offset));
    }

    /// Clear a programmed fault
    pub fn clear_fault(&mut self) {
        self.fail_program_at = None;
    }

    fn span(region: Region, offset: usize, len: usize) -> Result<core::ops::Range<usize>, FlashError> {
        let info = region.info();

        let end = offset.checked_add(len).ok_or(FlashError::OutOfBounds)?;
        if end > info.len {
            return Err(FlashError::OutOfBounds);
        }

        Ok(info.start + offset..info.start + end)
    }
}

impl Default for RamFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl Flash for RamFlash {
    fn read(&self, region: Region, offset: usize, buff: &mut [u8]) -> Result<(), FlashError> {
        let span = Self::span(region, offset, buff.len())?;

        buff.copy_from_slice(&self.mem[span]);

        Ok(())
    }

    fn program(&mut self, region: Region, offset: usize, data: &[u8]) -> Result<(), FlashError> {
        if self.fail_program_at == Some((region, offset)) {
            return Err(FlashError::Program);
        }

        let span = Self::span(region, offset, data.len())?;

        // NOR program, only clears bits
        for (m, d) in self.mem[span].iter_mut().zip(data.iter()) {
            *m &= *d;
        }

        Ok(())
    }

    fn erase(&mut self, region: Region) -> Result<(), FlashError> {
        let span = Self::span(region, 0, region.info().len)?;

        self.mem[span].fill(0xff);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erased_reads_ones() {
        let f = RamFlash::new();

        let mut b = [0u8; 8];
        f.read(Region::Storage1, 128, &mut b).unwrap();

        assert_eq!(b, [0xff; 8]);
    }

    #[test]
    fn program_only_clears_bits() {
        let mut f = RamFlash::new();

        f.program(Region::Storage1, 0, &[0xf0]).unwrap();
        // Attempting to set bits has no effect
        f.program(Region::Storage1, 0, &[0x1f]).unwrap();

        let mut b = [0u8; 1];
        f.read(Region::Storage1, 0, &mut b).unwrap();
        assert_eq!(b[0], 0x10);
    }

    #[test]
    fn erase_restores_region() {
        let mut f = RamFlash::new();

        f.program(Region::Storage2, 64, &[0x00; 16]).unwrap();
        f.erase(Region::Storage2).unwrap();

        let mut b = [0u8; 16];
        f.read(Region::Storage2, 64, &mut b).unwrap();
        assert_eq!(b, [0xff; 16]);
    }

    #[test]
    fn bounds_checked() {
        let mut f = RamFlash::new();
        let len = Region::Storage1.info().len;

        let mut b = [0u8; 4];
        assert_eq!(
            f.read(Region::Storage1, len - 2, &mut b),
            Err(FlashError::OutOfBounds)
        );
        assert_eq!(
            f.program(Region::Storage1, len, &[0x00]),
            Err(FlashError::OutOfBounds)
        );

        // Regions are isolated, adjacent sectors must be unaffected by erase
        f.program(Region::Storage2, 0, &[0x00]).unwrap();
        f.erase(Region::Storage1).unwrap();

        f.read(Region::Storage2, 0, &mut b[..1]).unwrap();
        assert_eq!(b[0], 0x00);
    }

    #[test]
    fn injected_fault_fails_program() {
        let mut f = RamFlash::new();

        f.fail_program_at(Region::Storage1, 0);

        assert_eq!(
            f.program(Region::Storage1, 0, &[0x00]),
            Err(FlashError::Program)
        );
        // Other offsets still program
        f.program(Region::Storage1, 4, &[0x00]).unwrap();

        f.clear_fault();
        f.program(Region::Storage1, 0, &[0x00]).unwrap();
    }
}
