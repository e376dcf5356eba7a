// Copyright (c) 2022-2023 The MobileCoin Foundation

use encdec::{Decode, DecodeOwned};

use keywarden_wire::{
    device::{
        ButtonAck, Cancel, ClearSession, GetFeatures, Initialize, Ping, PingFlags, WipeDevice,
    },
    entropy::GetEntropy,
    pin::PinMatrixAck,
    secrets::{ApplyPolicy, ApplySettings, ChangePin, LoadDevice},
    MsgType, WireError,
};

/// [`Engine`][super::Engine] input events, decoded from reassembled
/// request frames
#[derive(Clone, Debug, strum::Display)]
pub enum Event<'a> {
    /// Reset flows and session, fetch features
    Initialize,

    /// Fetch features without disturbing engine state
    GetFeatures,

    /// Liveness check
    Ping { message: &'a str, flags: PingFlags },

    /// Change, set or remove the device PIN
    ChangePin { remove: bool },

    /// Erase all persistent state
    WipeDevice,

    /// Fetch entropy from the device RNG
    GetEntropy { size: u32 },

    /// Import a wallet onto a wiped device
    LoadDevice(LoadDevice<'a>),

    /// Host response to a PIN matrix request
    PinMatrixAck { pin: &'a str },

    /// Abort the pending flow
    Cancel,

    /// Clear volatile session secrets
    ClearSession,

    /// Update label / language / passphrase settings
    ApplySettings(ApplySettings<'a>),

    /// Host acknowledgement of a button request
    ButtonAck,

    /// Enable or disable a named policy
    ApplyPolicy { name: &'a str, enabled: bool },
}

/// Helper for decoding framed payloads to events
fn decode_event<'a, T>(buff: &'a [u8]) -> Result<Event<'a>, WireError>
where
    T: Decode<'a, Error = WireError>,
    Event<'a>: From<T::Output>,
{
    T::decode(buff).map(|(v, _n)| Event::from(v))
}

impl<'a> Event<'a> {
    /// Parse an incoming frame to an engine event.
    ///
    /// Device-bound message types only; replies and unassigned
    /// identifiers report [WireError::Unhandled] so the transport can
    /// count them.
    #[cfg_attr(feature = "noinline", inline(never))]
    pub fn parse(msg_id: u16, buff: &'a [u8]) -> Result<Self, WireError> {
        let msg_type = MsgType::try_from(msg_id).map_err(|_| WireError::Unhandled)?;

        match msg_type {
            MsgType::Initialize => decode_event::<Initialize>(buff),
            MsgType::GetFeatures => decode_event::<GetFeatures>(buff),
            MsgType::Ping => decode_event::<Ping>(buff),
            MsgType::ChangePin => ChangePin::decode_owned(buff).map(|(v, _n)| Event::from(v)),
            MsgType::WipeDevice => decode_event::<WipeDevice>(buff),
            MsgType::GetEntropy => decode_event::<GetEntropy>(buff),
            MsgType::LoadDevice => decode_event::<LoadDevice>(buff),
            MsgType::PinMatrixAck => decode_event::<PinMatrixAck>(buff),
            MsgType::Cancel => decode_event::<Cancel>(buff),
            MsgType::ClearSession => decode_event::<ClearSession>(buff),
            MsgType::ApplySettings => decode_event::<ApplySettings>(buff),
            MsgType::ButtonAck => decode_event::<ButtonAck>(buff),
            MsgType::ApplyPolicy => decode_event::<ApplyPolicy>(buff),
            _ => Err(WireError::Unhandled),
        }
    }
}

impl From<Initialize> for Event<'_> {
    fn from(_: Initialize) -> Self {
        Event::Initialize
    }
}

impl From<GetFeatures> for Event<'_> {
    fn from(_: GetFeatures) -> Self {
        Event::GetFeatures
    }
}

impl<'a> From<Ping<'a>> for Event<'a> {
    fn from(p: Ping<'a>) -> Self {
        Event::Ping {
            message: p.message,
            flags: p.flags,
        }
    }
}

impl From<ChangePin> for Event<'_> {
    fn from(c: ChangePin) -> Self {
        Event::ChangePin { remove: c.remove }
    }
}

impl From<WipeDevice> for Event<'_> {
    fn from(_: WipeDevice) -> Self {
        Event::WipeDevice
    }
}

impl From<GetEntropy> for Event<'_> {
    fn from(g: GetEntropy) -> Self {
        Event::GetEntropy { size: g.size }
    }
}

impl<'a> From<LoadDevice<'a>> for Event<'a> {
    fn from(l: LoadDevice<'a>) -> Self {
        Event::LoadDevice(l)
    }
}

impl<'a> From<PinMatrixAck<'a>> for Event<'a> {
    fn from(a: PinMatrixAck<'a>) -> Self {
        Event::PinMatrixAck { pin: a.pin }
    }
}

impl From<Cancel> for Event<'_> {
    fn from(_: Cancel) -> Self {
        Event::Cancel
    }
}

impl From<ClearSession> for Event<'_> {
    fn from(_: ClearSession) -> Self {
        Event::ClearSession
    }
}

impl<'a> From<ApplySettings<'a>> for Event<'a> {
    fn from(s: ApplySettings<'a>) -> Self {
        Event::ApplySettings(s)
    }
}

impl From<ButtonAck> for Event<'_> {
    fn from(_: ButtonAck) -> Self {
        Event::ButtonAck
    }
}

impl<'a> From<ApplyPolicy<'a>> for Event<'a> {
    fn from(p: ApplyPolicy<'a>) -> Self {
        Event::ApplyPolicy {
            name: p.name,
            enabled: p.enabled,
        }
    }
}
