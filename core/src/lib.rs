// Copyright (c) 2022-2023 The MobileCoin Foundation

//! KeyWarden hardware wallet trust core
//!
//! This provides a common [Engine][engine] supporting device management,
//! secret storage and PIN enforcement for execution on hardware wallets.
//!
//! Interactions with the [Engine][engine] are performed via
//! [Event][engine::Event]s and [Output][engine::Output]s, see
//! [keywarden_wire] for message objects and wire encodings.
//!
//! ## Operations
//!
//! Prior to interacting with a device the host should issue an
//! [`Initialize`][keywarden_wire::device::Initialize] to fetch a
//! [`Features`][keywarden_wire::device::Features] report containing the
//! firmware version, device id, and flags for configured protections.
//! `Initialize` also aborts any flow left over from a prior host session,
//! [`GetFeatures`][keywarden_wire::device::GetFeatures] fetches the same
//! report without disturbing device state.
//!
//! ### Protected flows
//!
//! Operations with side effects run as request / acknowledge round-trips.
//! The engine parks the requested action and replies with a
//! [`ButtonRequest`][keywarden_wire::device::ButtonRequest], completing
//! (or rejecting) the action when the matching
//! [`ButtonAck`][keywarden_wire::device::ButtonAck] arrives and the user
//! confirms on-device. Actions guarded by the PIN add a
//! [`PinMatrixRequest`][keywarden_wire::pin::PinMatrixRequest] /
//! [`PinMatrixAck`][keywarden_wire::pin::PinMatrixAck] stage, with failed
//! attempts recorded to flash _before_ the failure reply is sent so power
//! loss cannot erase them (see [storage]).
//!
//! 1. Issue [`LoadDevice`][keywarden_wire::secrets::LoadDevice] with a
//!    mnemonic or node to import a wallet secret, confirm on-device
//! 2. Issue [`ChangePin`][keywarden_wire::secrets::ChangePin] to set,
//!    change or remove the PIN (new entries are collected twice and
//!    compared on-device)
//! 3. Issue [`ApplySettings`][keywarden_wire::secrets::ApplySettings] /
//!    [`ApplyPolicy`][keywarden_wire::secrets::ApplyPolicy] to update
//!    device configuration
//! 4. Issue [`WipeDevice`][keywarden_wire::device::WipeDevice] to erase
//!    all persistent state
//!
//! ### Framing
//!
//! Messages are carried over fixed 64-byte segments, reassembled and
//! dispatched via [Transport][transport::Transport] and
//! [`Engine::poll_segment`][engine::Engine::poll_segment]. Unknown or
//! undecodable messages are counted and dropped without a reply.

#![cfg_attr(not(feature = "std"), no_std)]

pub use keywarden_wire::{self as wire};

pub mod engine;

pub mod flash;

pub mod storage;

pub mod transport;

pub mod types;
