// Copyright (c) 2022-2023 The MobileCoin Foundation

/// [Engine][super::Engine] errors
///
/// These are contract violations the outer loop treats as fatal. Policy
/// and flow failures travel as typed
/// [Failure][keywarden_wire::device::Failure] replies instead.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[repr(u8)]
pub enum Error {
    /// Storage initialisation failed
    #[cfg_attr(feature = "thiserror", error("storage initialisation failed"))]
    StorageInit = 0x01,

    /// Reply encoding failed or exceeded frame capacity
    #[cfg_attr(feature = "thiserror", error("reply encoding failed"))]
    EncodingFailed = 0x02,
}
