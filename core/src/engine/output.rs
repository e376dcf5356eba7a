// Copyright (c) 2022-2023 The MobileCoin Foundation

use encdec::Encode;
use heapless::{String, Vec};

use keywarden_wire::{
    device::{ButtonRequest, ButtonRequestKind, Failure, FailureCode, Features, Success},
    pin::{PinMatrixKind, PinMatrixRequest},
    MsgType, WireError, ENTROPY_MAX_LEN, STATUS_MSG_MAX_LEN,
};

/// [`Engine`][super::Engine] output replies, encoded to response frames.
///
/// Every dispatched [Event][super::Event] produces exactly one of these.
#[derive(Clone, PartialEq, Debug)]
pub enum Output {
    /// Device state report
    Features(Features),

    /// Request completed
    Success { message: String<STATUS_MSG_MAX_LEN> },

    /// Request refused or failed
    Failure {
        code: FailureCode,
        message: &'static str,
    },

    /// Physical confirmation required to continue
    ButtonRequest(ButtonRequestKind),

    /// PIN matrix entry required to continue
    PinMatrixRequest(PinMatrixKind),

    /// Requested random bytes
    Entropy(Vec<u8, ENTROPY_MAX_LEN>),
}

impl Output {
    /// Build a [Output::Success] reply, truncating over-long messages
    pub fn success(message: &str) -> Self {
        let mut end = message.len().min(STATUS_MSG_MAX_LEN);
        while !message.is_char_boundary(end) {
            end -= 1;
        }

        let mut m = String::new();
        let _ = m.push_str(&message[..end]);
        Self::Success { message: m }
    }

    /// Build a [Output::Failure] reply
    pub fn failure(code: FailureCode, message: &'static str) -> Self {
        Self::Failure { code, message }
    }

    /// Fetch the wire message type for a reply
    pub fn msg_type(&self) -> MsgType {
        match self {
            Output::Features(_) => MsgType::Features,
            Output::Success { .. } => MsgType::Success,
            Output::Failure { .. } => MsgType::Failure,
            Output::ButtonRequest(_) => MsgType::ButtonRequest,
            Output::PinMatrixRequest(_) => MsgType::PinMatrixRequest,
            Output::Entropy(_) => MsgType::Entropy,
        }
    }

    /// Encode a reply payload for framing
    #[cfg_attr(feature = "noinline", inline(never))]
    pub fn encode(&self, buff: &mut [u8]) -> Result<usize, WireError> {
        match self {
            Output::Features(f) => f.encode(buff),
            Output::Success { message } => Success::new(message).encode(buff),
            Output::Failure { code, message } => Failure::new(*code, message).encode(buff),
            Output::ButtonRequest(kind) => ButtonRequest::new(*kind).encode(buff),
            Output::PinMatrixRequest(kind) => PinMatrixRequest::new(*kind).encode(buff),
            Output::Entropy(bytes) => keywarden_wire::entropy::Entropy::new(bytes).encode(buff),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_types() {
        let tests = [
            (Output::Features(Features::default()), MsgType::Features),
            (Output::success("ok"), MsgType::Success),
            (
                Output::failure(FailureCode::Other, "no"),
                MsgType::Failure,
            ),
            (
                Output::ButtonRequest(ButtonRequestKind::ProtectCall),
                MsgType::ButtonRequest,
            ),
            (
                Output::PinMatrixRequest(PinMatrixKind::Current),
                MsgType::PinMatrixRequest,
            ),
            (Output::Entropy(Vec::new()), MsgType::Entropy),
        ];

        for (o, t) in tests {
            assert_eq!(o.msg_type(), t);
        }
    }

    #[test]
    fn success_truncates() {
        let long = core::str::from_utf8(&[b'a'; STATUS_MSG_MAX_LEN + 40]).unwrap();
        match Output::success(long) {
            Output::Success { message } => assert_eq!(message.len(), STATUS_MSG_MAX_LEN),
            _ => unreachable!(),
        }
    }

    #[test]
    fn encode_failure() {
        let mut buff = [0u8; 64];

        let o = Output::failure(FailureCode::PinInvalid, "PIN invalid");
        let n = o.encode(&mut buff).unwrap();

        // code byte, message length, reserved, then the message body
        assert_eq!(&buff[..4], &[0x07, 11, 0x00, 0x00]);
        assert_eq!(&buff[4..n], b"PIN invalid");
    }
}
