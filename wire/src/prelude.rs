// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Prelude to simplify downstream use of wire objects
//!

pub use crate::{
    device::{
        ButtonAck, ButtonRequest, ButtonRequestKind, Cancel, ClearSession, Failure, FailureCode,
        FeatureFlags, Features, GetFeatures, Initialize, Ping, PingFlags, PolicyEntry, Success,
        WipeDevice,
    },
    entropy::{Entropy, GetEntropy},
    frame::{FrameHeader, Segmenter, FIRST_SEGMENT_BODY, FRAME_HDR_LEN, SEGMENT_LEN},
    pin::{PinMatrixAck, PinMatrixKind, PinMatrixRequest},
    secrets::{ApplyPolicy, ApplySettings, ChangePin, HdNode, LoadDevice, LoadDeviceFlags},
    MsgStatic, MsgType, WireError, ENTROPY_MAX_LEN, LABEL_MAX_LEN, LANGUAGE_MAX_LEN,
    MNEMONIC_MAX_LEN, MSG_MAX_LEN, PIN_MAX_LEN, POLICY_MAX_COUNT, POLICY_NAME_MAX_LEN,
};
