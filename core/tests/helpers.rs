#![allow(unused)]

use std::{cell::RefCell, rc::Rc};

use bip39::{Language, Mnemonic, Seed};
use encdec::{Decode, DecodeOwned, Encode};
use log::{debug, trace};

use keywarden_core::{
    engine::{Driver, Engine, SEED_LEN},
    flash::RamFlash,
    transport::Transport,
    wire::{
        device::{ButtonRequest, ButtonRequestKind, Failure, FailureCode, Features, Success},
        entropy::Entropy,
        frame::{FrameHeader, Segmenter, FIRST_SEGMENT_BODY, FRAME_HDR_LEN, SEGMENT_LEN},
        pin::{PinMatrixKind, PinMatrixRequest},
        secrets::{HdNode, LoadDevice},
        MsgType, MSG_MAX_LEN,
    },
};

/// Valid 24-word test mnemonic
pub const MNEMONIC: &str = "legal winner thank year wave sausage worth useful legal winner thank year wave sausage worth useful legal winner thank year wave sausage worth title";

pub fn init_logging() {
    let _ = simplelog::SimpleLogger::init(log::LevelFilter::Debug, Default::default());
}

/// Driver state, shared so tests can script and inspect it while the
/// engine holds the driver
#[derive(Default)]
pub struct DriverState {
    /// Decline confirmation prompts
    pub deny: bool,
    /// Confirmations presented
    pub confirms: Vec<ButtonRequestKind>,
    /// Outbound reply segments
    pub outbox: Vec<[u8; SEGMENT_LEN]>,
}

/// Driver implementation for test use, real BIP39 handling via the
/// host library
#[derive(Clone, Default)]
pub struct TestDriver(pub Rc<RefCell<DriverState>>);

impl Driver for TestDriver {
    fn confirm(&mut self, kind: ButtonRequestKind, title: &str, body: &str) -> bool {
        debug!("confirm [{}] {}: {}", kind, title, body);

        let mut state = self.0.borrow_mut();
        state.confirms.push(kind);

        !state.deny
    }

    fn layout_home(&mut self) {}

    fn verify_mnemonic(&self, phrase: &str, skip_checksum: bool) -> bool {
        match skip_checksum {
            true => !phrase.is_empty(),
            false => Mnemonic::validate(phrase, Language::English).is_ok(),
        }
    }

    fn mnemonic_to_seed(&self, mnemonic: &str, passphrase: &str, seed: &mut [u8; SEED_LEN]) {
        if let Ok(m) = Mnemonic::from_phrase(mnemonic, Language::English) {
            seed.copy_from_slice(Seed::new(&m, passphrase).as_bytes());
        }
    }

    fn derive_node_from_seed(&self, seed: &[u8], node: &mut HdNode) -> bool {
        // Stand-in derivation, the platform owns the real BIP32 math
        node.private_key.copy_from_slice(&seed[..32]);
        node.chain_code.copy_from_slice(&seed[32..64]);
        node.public_key[0] = 0x02;

        true
    }

    fn tx_segment(&mut self, seg: &[u8; SEGMENT_LEN]) -> bool {
        self.0.borrow_mut().outbox.push(*seg);
        true
    }
}

/// Host-side harness, driving an engine over the segment transport
pub struct Host<'a> {
    pub engine: Engine<TestDriver, &'a mut RamFlash>,
    pub transport: Transport,
    pub driver: TestDriver,
}

impl<'a> Host<'a> {
    /// Boot an engine over the provided flash
    pub fn new(flash: &'a mut RamFlash) -> Self {
        let driver = TestDriver::default();

        let mut engine = Engine::new(driver.clone(), flash);
        engine.init().unwrap();

        Self {
            engine,
            transport: Transport::new(),
            driver,
        }
    }

    /// Decline (or resume approving) confirmation prompts
    pub fn deny(&mut self, deny: bool) {
        self.driver.0.borrow_mut().deny = deny;
    }

    /// Send one framed request, returning the reassembled reply, if any
    pub fn request(&mut self, msg_id: u16, payload: &[u8]) -> Option<(u16, Vec<u8>)> {
        trace!("request: id {} ({} bytes)", msg_id, payload.len());

        for seg in Segmenter::new(msg_id, payload) {
            self.engine.poll_segment(&mut self.transport, &seg).unwrap();
        }

        self.reply()
    }

    /// Reassemble one reply frame from the driver outbox
    pub fn reply(&mut self) -> Option<(u16, Vec<u8>)> {
        let mut state = self.driver.0.borrow_mut();
        if state.outbox.is_empty() {
            return None;
        }
        let segs: Vec<[u8; SEGMENT_LEN]> = state.outbox.drain(..).collect();
        drop(state);

        let hdr = FrameHeader::parse(&segs[0]).unwrap();
        let len = hdr.len as usize;

        let mut payload = Vec::with_capacity(len);
        payload.extend_from_slice(&segs[0][FRAME_HDR_LEN..FRAME_HDR_LEN + len.min(FIRST_SEGMENT_BODY)]);
        for seg in &segs[1..] {
            let n = (len - payload.len()).min(SEGMENT_LEN);
            payload.extend_from_slice(&seg[..n]);
        }
        assert_eq!(payload.len(), len, "incomplete reply frame");

        debug!("reply: id {} ({} bytes)", hdr.msg_id, len);

        Some((hdr.msg_id, payload))
    }
}

/// Encode a wire message to owned bytes
pub fn encode<T: Encode>(msg: &T) -> Vec<u8>
where
    T::Error: std::fmt::Debug,
{
    let mut buff = vec![0u8; MSG_MAX_LEN];
    let n = msg.encode(&mut buff).unwrap();
    buff.truncate(n);
    buff
}

/// Import the test wallet over the wire, approving on-device
pub fn load_wallet(host: &mut Host, pin: Option<&str>) {
    let req = LoadDevice {
        mnemonic: Some(MNEMONIC),
        pin,
        label: Some("wallet one"),
        ..Default::default()
    };

    let kind = expect_button(host.request(MsgType::LoadDevice as u16, &encode(&req)));
    assert_eq!(kind, ButtonRequestKind::LoadDevice);

    let msg = expect_success(host.request(MsgType::ButtonAck as u16, &[]));
    assert_eq!(msg, "Device loaded");
}

pub fn expect_success(reply: Option<(u16, Vec<u8>)>) -> String {
    let (id, payload) = reply.expect("expected a success reply, got none");
    assert_eq!(id, MsgType::Success as u16, "unexpected reply type");

    let (m, _) = Success::decode(&payload).unwrap();
    String::from(m.message)
}

pub fn expect_failure(reply: Option<(u16, Vec<u8>)>) -> FailureCode {
    let (id, payload) = reply.expect("expected a failure reply, got none");
    assert_eq!(id, MsgType::Failure as u16, "unexpected reply type");

    let (f, _) = Failure::decode(&payload).unwrap();
    f.code
}

pub fn expect_button(reply: Option<(u16, Vec<u8>)>) -> ButtonRequestKind {
    let (id, payload) = reply.expect("expected a button request, got none");
    assert_eq!(id, MsgType::ButtonRequest as u16, "unexpected reply type");

    let (b, _) = ButtonRequest::decode(&payload).unwrap();
    b.kind
}

pub fn expect_pin_request(reply: Option<(u16, Vec<u8>)>) -> PinMatrixKind {
    let (id, payload) = reply.expect("expected a pin matrix request, got none");
    assert_eq!(id, MsgType::PinMatrixRequest as u16, "unexpected reply type");

    let (r, _) = PinMatrixRequest::decode(&payload).unwrap();
    r.kind
}

pub fn expect_features(reply: Option<(u16, Vec<u8>)>) -> Features {
    let (id, payload) = reply.expect("expected a features reply, got none");
    assert_eq!(id, MsgType::Features as u16, "unexpected reply type");

    let (f, _) = Features::decode_owned(&payload).unwrap();
    f
}

pub fn expect_entropy(reply: Option<(u16, Vec<u8>)>) -> Vec<u8> {
    let (id, payload) = reply.expect("expected an entropy reply, got none");
    assert_eq!(id, MsgType::Entropy as u16, "unexpected reply type");

    let (e, _) = Entropy::decode(&payload).unwrap();
    e.bytes.to_vec()
}
