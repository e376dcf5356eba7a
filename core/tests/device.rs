//! Device management integration tests, driving the engine over the
//! framed segment transport the way a host application would.

use bip39::{Language, Mnemonic, Seed};

use keywarden_core::{
    flash::RamFlash,
    wire::{
        device::{ButtonRequestKind, FailureCode, FeatureFlags, Ping, PingFlags},
        entropy::GetEntropy,
        frame::{FIRST_SEGMENT_BODY, SEGMENT_LEN},
        pin::{PinMatrixAck, PinMatrixKind},
        secrets::{ApplySettings, ChangePin},
        MsgType,
    },
};

mod helpers;
use helpers::*;

#[test]
fn initialize_reports_device_identity() {
    init_logging();

    let mut flash = RamFlash::new();
    let mut host = Host::new(&mut flash);

    let f = expect_features(host.request(MsgType::Initialize as u16, &[]));

    assert!(!f.flags.contains(FeatureFlags::INITIALIZED));
    assert_eq!(f.vendor.as_str(), "keywarden");
    assert_eq!(f.device_id.len(), 24);
    assert!(f.device_id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(f.policies.len(), 1);
    assert_eq!(f.policies[0].name.as_str(), "Exchange");
}

#[test]
fn load_device_round_trip() -> anyhow::Result<()> {
    init_logging();

    let mut flash = RamFlash::new();
    let mut host = Host::new(&mut flash);

    let req = keywarden_core::wire::secrets::LoadDevice {
        mnemonic: Some(MNEMONIC),
        pin: Some("1234"),
        label: Some("wallet one"),
        ..Default::default()
    };
    let encoded = encode(&req);

    // Large enough to span three segments
    assert!(encoded.len() > FIRST_SEGMENT_BODY + SEGMENT_LEN);

    let kind = expect_button(host.request(MsgType::LoadDevice as u16, &encoded));
    assert_eq!(kind, ButtonRequestKind::LoadDevice);

    // Reassembled and dispatched exactly once
    assert_eq!(host.transport.stats().rx_frames, 1);

    let msg = expect_success(host.request(MsgType::ButtonAck as u16, &[]));
    assert_eq!(msg, "Device loaded");

    let f = expect_features(host.request(MsgType::GetFeatures as u16, &[]));
    assert!(f.flags.contains(
        FeatureFlags::INITIALIZED
            | FeatureFlags::IMPORTED
            | FeatureFlags::PIN_PROTECTION
            | FeatureFlags::PIN_CACHED
    ));
    assert_eq!(f.label.as_str(), "wallet one");

    // Root node matches the BIP39 seed for the imported phrase
    let seed = Seed::new(&Mnemonic::from_phrase(MNEMONIC, Language::English)?, "");
    let node = host.engine.root_node().expect("root node unavailable");
    assert_eq!(&node.private_key[..], &seed.as_bytes()[..32]);

    Ok(())
}

#[test]
fn declined_confirmation_over_wire() {
    init_logging();

    let mut flash = RamFlash::new();
    let mut host = Host::new(&mut flash);

    host.deny(true);

    let req = Ping::new("anyone home", PingFlags::BUTTON_PROTECTION);
    let kind = expect_button(host.request(MsgType::Ping as u16, &encode(&req)));
    assert_eq!(kind, ButtonRequestKind::Ping);

    let code = expect_failure(host.request(MsgType::ButtonAck as u16, &[]));
    assert_eq!(code, FailureCode::ActionCancelled);

    assert_eq!(
        host.driver.0.borrow().confirms,
        vec![ButtonRequestKind::Ping]
    );
}

#[test]
fn unknown_id_dropped_without_reply() {
    init_logging();

    let mut flash = RamFlash::new();
    let mut host = Host::new(&mut flash);

    assert!(host.request(999, &[0x01, 0x02]).is_none());
    assert_eq!(host.transport.stats().unknown_msgs, 1);

    // Transport still healthy afterwards
    let req = Ping::new("still here", PingFlags::empty());
    let msg = expect_success(host.request(MsgType::Ping as u16, &encode(&req)));
    assert_eq!(msg, "still here");
}

#[test]
fn undecodable_payload_dropped_without_reply() {
    init_logging();

    let mut flash = RamFlash::new();
    let mut host = Host::new(&mut flash);

    // A one byte ping is truncated mid-header
    assert!(host.request(MsgType::Ping as u16, &[0x01]).is_none());
    assert_eq!(host.transport.stats().decode_failures, 1);
}

#[test]
fn pin_failures_survive_restart() {
    init_logging();

    let mut flash = RamFlash::new();

    {
        let mut host = Host::new(&mut flash);
        load_wallet(&mut host, Some("1234"));

        let msg = expect_success(host.request(MsgType::ClearSession as u16, &[]));
        assert_eq!(msg, "Session cleared");

        // Settings are PIN protected once the cache is cleared
        let req = ApplySettings {
            label: Some("renamed"),
            ..Default::default()
        };
        let kind = expect_button(host.request(MsgType::ApplySettings as u16, &encode(&req)));
        assert_eq!(kind, ButtonRequestKind::ApplySettings);

        let stage = expect_pin_request(host.request(MsgType::ButtonAck as u16, &[]));
        assert_eq!(stage, PinMatrixKind::Current);

        let bad = PinMatrixAck::new("9999");
        let code = expect_failure(host.request(MsgType::PinMatrixAck as u16, &encode(&bad)));
        assert_eq!(code, FailureCode::PinInvalid);
        assert_eq!(host.engine.store().pin_fails(), 1);
    }

    // The failure count is already durable before any commit
    {
        let mut host = Host::new(&mut flash);
        assert_eq!(host.engine.store().pin_fails(), 1);

        let req = ApplySettings {
            label: Some("renamed"),
            ..Default::default()
        };
        host.request(MsgType::ApplySettings as u16, &encode(&req));
        host.request(MsgType::ButtonAck as u16, &[]);

        let ack = PinMatrixAck::new("1234");
        let msg = expect_success(host.request(MsgType::PinMatrixAck as u16, &encode(&ack)));
        assert_eq!(msg, "Settings applied");
        assert_eq!(host.engine.store().pin_fails(), 0);
    }

    // And the reset survives too
    let host = Host::new(&mut flash);
    assert_eq!(host.engine.store().pin_fails(), 0);
    assert_eq!(host.engine.store().label(), "renamed");
}

#[test]
fn cached_pin_skips_matrix() {
    init_logging();

    let mut flash = RamFlash::new();
    let mut host = Host::new(&mut flash);

    // PIN is cached on load, so protected ops go straight through
    load_wallet(&mut host, Some("1234"));

    let req = ApplySettings {
        label: Some("quick"),
        ..Default::default()
    };
    let kind = expect_button(host.request(MsgType::ApplySettings as u16, &encode(&req)));
    assert_eq!(kind, ButtonRequestKind::ApplySettings);

    let msg = expect_success(host.request(MsgType::ButtonAck as u16, &[]));
    assert_eq!(msg, "Settings applied");
}

#[test]
fn change_pin_over_wire() {
    init_logging();

    let mut flash = RamFlash::new();
    let mut host = Host::new(&mut flash);

    load_wallet(&mut host, None);

    // No PIN configured, a change goes straight to new entry
    let kind = expect_button(host.request(MsgType::ChangePin as u16, &encode(&ChangePin::default())));
    assert_eq!(kind, ButtonRequestKind::ChangePin);

    let stage = expect_pin_request(host.request(MsgType::ButtonAck as u16, &[]));
    assert_eq!(stage, PinMatrixKind::NewFirst);

    let first = PinMatrixAck::new("4321");
    let stage = expect_pin_request(host.request(MsgType::PinMatrixAck as u16, &encode(&first)));
    assert_eq!(stage, PinMatrixKind::NewSecond);

    let second = PinMatrixAck::new("4321");
    let msg = expect_success(host.request(MsgType::PinMatrixAck as u16, &encode(&second)));
    assert_eq!(msg, "PIN changed");

    // Changing again demands the current PIN even though it is cached
    host.request(MsgType::ChangePin as u16, &encode(&ChangePin::default()));
    let stage = expect_pin_request(host.request(MsgType::ButtonAck as u16, &[]));
    assert_eq!(stage, PinMatrixKind::Current);

    host.request(MsgType::Cancel as u16, &[]);

    // Removal verifies the current PIN then drops protection
    let remove = ChangePin { remove: true };
    let kind = expect_button(host.request(MsgType::ChangePin as u16, &encode(&remove)));
    assert_eq!(kind, ButtonRequestKind::RemovePin);

    let stage = expect_pin_request(host.request(MsgType::ButtonAck as u16, &[]));
    assert_eq!(stage, PinMatrixKind::Current);

    let ack = PinMatrixAck::new("4321");
    let msg = expect_success(host.request(MsgType::PinMatrixAck as u16, &encode(&ack)));
    assert_eq!(msg, "PIN removed");

    let f = expect_features(host.request(MsgType::GetFeatures as u16, &[]));
    assert!(!f.flags.contains(FeatureFlags::PIN_PROTECTION));
}

#[test]
fn wipe_regenerates_identity_over_wire() {
    init_logging();

    let mut flash = RamFlash::new();
    let mut host = Host::new(&mut flash);

    load_wallet(&mut host, Some("1234"));

    let f = expect_features(host.request(MsgType::GetFeatures as u16, &[]));
    let before = f.device_id.clone();

    let kind = expect_button(host.request(MsgType::WipeDevice as u16, &[]));
    assert_eq!(kind, ButtonRequestKind::WipeDevice);

    let msg = expect_success(host.request(MsgType::ButtonAck as u16, &[]));
    assert_eq!(msg, "Device wiped");

    let f = expect_features(host.request(MsgType::GetFeatures as u16, &[]));
    assert!(!f.flags.contains(FeatureFlags::INITIALIZED));
    assert_eq!(f.device_id.len(), 24);
    assert_ne!(f.device_id, before);
}

#[test]
fn entropy_over_wire() {
    init_logging();

    let mut flash = RamFlash::new();
    let mut host = Host::new(&mut flash);

    let req = GetEntropy::new(32);
    let kind = expect_button(host.request(MsgType::GetEntropy as u16, &encode(&req)));
    assert_eq!(kind, ButtonRequestKind::GetEntropy);

    let bytes = expect_entropy(host.request(MsgType::ButtonAck as u16, &[]));
    assert_eq!(bytes.len(), 32);
}
