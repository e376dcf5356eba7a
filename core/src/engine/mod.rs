// Copyright (c) 2022-2023 The MobileCoin Foundation

//! The [Engine] provides the device management state machine for
//! hardware wallets.
//!
//! This handles [Event] inputs and returns [Output] responses to the
//! caller, persisting configuration via [Store] and deferring platform
//! concerns (confirmation UI, seed derivation, segment transmit) to the
//! [Driver] trait. See [keywarden_wire] for message objects and wire
//! encodings.
//!
//! Flows requiring physical confirmation or PIN entry run as a
//! request / acknowledge round-trip: the engine parks the requested
//! action, replies with a button or PIN matrix request, and completes
//! (or aborts) the action when the matching acknowledgement arrives.

use core::mem;

use heapless::Vec;
use rand_core::{CryptoRngCore, OsRng};
use zeroize::Zeroize;

use keywarden_wire::{
    device::{ButtonRequestKind, FailureCode, FeatureFlags, Features, PingFlags, PolicyEntry},
    frame::SEGMENT_LEN,
    pin::PinMatrixKind,
    secrets::{ApplySettings, HdNode, LoadDevice, LoadDeviceFlags},
    WireError, ENTROPY_MAX_LEN, LABEL_MAX_LEN, LANGUAGE_MAX_LEN, MNEMONIC_MAX_LEN, MSG_MAX_LEN,
    PIN_MAX_LEN, POLICY_NAME_MAX_LEN, STATUS_MSG_MAX_LEN,
};

use crate::{
    flash::Flash,
    storage::Store,
    transport::{Transport, TransportError},
    types::BoundedStr,
};

mod error;
pub use error::Error;

mod event;
pub use event::Event;

mod output;
pub use output::Output;

/// Firmware version reported via [Features]
pub const VERSION: [u8; 3] = [0, 3, 0];

/// Vendor string reported via [Features]
pub const VENDOR: &str = "keywarden";

/// Wallet seed length in bytes
pub const SEED_LEN: usize = 64;

/// Engine flow state
#[derive(strum::Display)]
enum State {
    /// No flow in progress
    Idle,
    /// Confirmation requested, awaiting the button acknowledgement
    Confirm(PendingAction),
    /// PIN matrix requested, awaiting the entry
    PinEntry {
        action: PendingAction,
        stage: PinMatrixKind,
    },
}

/// Deferred action held while confirmation / PIN entry runs
#[derive(Zeroize)]
enum PendingAction {
    /// Echo a protected ping
    Ping {
        message: BoundedStr<STATUS_MSG_MAX_LEN>,
        pin_protected: bool,
    },
    /// Erase all persistent state
    Wipe,
    /// Import a wallet secret with initial settings
    Load {
        node: Option<HdNode>,
        mnemonic: Option<BoundedStr<MNEMONIC_MAX_LEN>>,
        pin: Option<BoundedStr<PIN_MAX_LEN>>,
        language: Option<BoundedStr<LANGUAGE_MAX_LEN>>,
        label: Option<BoundedStr<LABEL_MAX_LEN>>,
        passphrase_protection: bool,
    },
    /// Update label / language / passphrase settings
    Settings {
        label: Option<BoundedStr<LABEL_MAX_LEN>>,
        language: Option<BoundedStr<LANGUAGE_MAX_LEN>>,
        use_passphrase: Option<bool>,
    },
    /// Enable or disable a policy
    Policy {
        name: BoundedStr<POLICY_NAME_MAX_LEN>,
        enabled: bool,
    },
    /// Disclose random bytes
    Entropy { size: u32 },
    /// Change, set or remove the PIN, `first` holds the first new entry
    ChangePin {
        remove: bool,
        first: Option<BoundedStr<PIN_MAX_LEN>>,
    },
}

impl PendingAction {
    fn button_kind(&self) -> ButtonRequestKind {
        match self {
            PendingAction::Ping { .. } => ButtonRequestKind::Ping,
            PendingAction::Wipe => ButtonRequestKind::WipeDevice,
            PendingAction::Load { .. } => ButtonRequestKind::LoadDevice,
            PendingAction::Settings { .. } => ButtonRequestKind::ApplySettings,
            PendingAction::Policy { .. } => ButtonRequestKind::ApplyPolicy,
            PendingAction::Entropy { .. } => ButtonRequestKind::GetEntropy,
            PendingAction::ChangePin { remove: false, .. } => ButtonRequestKind::ChangePin,
            PendingAction::ChangePin { remove: true, .. } => ButtonRequestKind::RemovePin,
        }
    }

    fn prompt(&self) -> (&'static str, &'static str) {
        match self {
            PendingAction::Ping { .. } => ("Ping", ""),
            PendingAction::Wipe => ("Wipe device", "Erase all device data?"),
            PendingAction::Load { .. } => ("Import wallet", "Load the provided wallet secret?"),
            PendingAction::Settings { .. } => ("Apply settings", "Update device settings?"),
            PendingAction::Policy { .. } => ("Apply policy", "Change policy configuration?"),
            PendingAction::Entropy { .. } => {
                ("Provide entropy", "Disclose random bytes to the host?")
            }
            PendingAction::ChangePin { remove: false, .. } => {
                ("Change PIN", "Set a new device PIN?")
            }
            PendingAction::ChangePin { remove: true, .. } => {
                ("Remove PIN", "Remove PIN protection?")
            }
        }
    }

    /// Whether the action runs the PIN stage when a PIN is set and not
    /// session-cached
    fn pin_protected(&self) -> bool {
        match self {
            PendingAction::Ping { pin_protected, .. } => *pin_protected,
            PendingAction::Settings { .. } | PendingAction::Policy { .. } => true,
            _ => false,
        }
    }
}

/// [`Driver`] trait provides platform support for [`Engine`] instances
pub trait Driver {
    /// Present a confirmation prompt, blocking until the user approves
    /// or declines
    fn confirm(&mut self, kind: ButtonRequestKind, title: &str, body: &str) -> bool;

    /// Restore the idle / home layout
    fn layout_home(&mut self);

    /// Validate a mnemonic phrase (word list and checksum)
    fn verify_mnemonic(&self, phrase: &str, skip_checksum: bool) -> bool;

    /// Stretch a mnemonic and passphrase into a wallet seed
    fn mnemonic_to_seed(&self, mnemonic: &str, passphrase: &str, seed: &mut [u8; SEED_LEN]);

    /// Derive the wallet root node from a seed
    fn derive_node_from_seed(&self, seed: &[u8], node: &mut HdNode) -> bool;

    /// Transmit one outbound segment, reporting link acceptance
    fn tx_segment(&mut self, seg: &[u8; SEGMENT_LEN]) -> bool;
}

impl<T: Driver> Driver for &mut T {
    fn confirm(&mut self, kind: ButtonRequestKind, title: &str, body: &str) -> bool {
        T::confirm(self, kind, title, body)
    }

    fn layout_home(&mut self) {
        T::layout_home(self)
    }

    fn verify_mnemonic(&self, phrase: &str, skip_checksum: bool) -> bool {
        T::verify_mnemonic(self, phrase, skip_checksum)
    }

    fn mnemonic_to_seed(&self, mnemonic: &str, passphrase: &str, seed: &mut [u8; SEED_LEN]) {
        T::mnemonic_to_seed(self, mnemonic, passphrase, seed)
    }

    fn derive_node_from_seed(&self, seed: &[u8], node: &mut HdNode) -> bool {
        T::derive_node_from_seed(self, seed, node)
    }

    fn tx_segment(&mut self, seg: &[u8; SEGMENT_LEN]) -> bool {
        T::tx_segment(self, seg)
    }
}

/// [Engine] implements hardware-independent device management for
/// hardware wallets
pub struct Engine<DRV: Driver, F: Flash, RNG: CryptoRngCore = OsRng> {
    state: State,
    store: Store<F>,

    drv: DRV,
    rng: RNG,
}

impl<DRV: Driver, F: Flash> Engine<DRV, F> {
    /// Create a new engine instance with the provided driver and flash,
    /// using the default [OsRng]
    pub fn new(drv: DRV, flash: F) -> Self {
        Self::new_with_rng(drv, flash, OsRng {})
    }
}

impl<DRV: Driver, F: Flash, RNG: CryptoRngCore> Engine<DRV, F, RNG> {
    /// Create a new engine instance with the provided driver, flash
    /// and rng
    pub fn new_with_rng(drv: DRV, flash: F, rng: RNG) -> Self {
        Self {
            state: State::Idle,
            store: Store::new(flash),
            drv,
            rng,
        }
    }

    /// Bring up persistent storage and show the home layout, must be
    /// called once before handling events
    pub fn init(&mut self) -> Result<(), Error> {
        if let Err(_e) = self.store.init(&mut self.rng) {
            #[cfg(feature = "log")]
            log::error!("storage init failed: {:?}", _e);
            return Err(Error::StorageInit);
        }

        self.drv.layout_home();

        Ok(())
    }

    /// Access the underlying store
    pub fn store(&self) -> &Store<F> {
        &self.store
    }

    /// Handle an incoming event, producing exactly one reply
    #[cfg_attr(feature = "noinline", inline(never))]
    pub fn update(&mut self, evt: &Event) -> Output {
        // Variant name only, events can carry PINs and mnemonics
        #[cfg(feature = "log")]
        log::debug!("event: {}", evt);

        let state = mem::replace(&mut self.state, State::Idle);

        let out = match (state, evt) {
            // Always answered, aborting any pending flow and the session
            (state, Event::Initialize) => {
                self.abort(state);
                self.store.clear_session();

                Output::Features(self.features())
            }

            // Answered without disturbing a pending flow
            (state, Event::GetFeatures) => {
                self.state = state;

                Output::Features(self.features())
            }

            (state, Event::Cancel) => {
                self.abort(state);

                Output::failure(FailureCode::ActionCancelled, "Aborted")
            }

            (State::Confirm(action), Event::ButtonAck) => self.handle_confirm(action),

            (State::PinEntry { action, stage }, Event::PinMatrixAck { pin }) => {
                self.handle_pin_entry(action, stage, pin)
            }

            // A pending flow refuses everything else without losing its
            // place
            (state @ State::Confirm(_), _) => {
                self.state = state;

                Output::failure(FailureCode::ButtonExpected, "Confirmation pending")
            }
            (state @ State::PinEntry { .. }, _) => {
                self.state = state;

                Output::failure(FailureCode::PinExpected, "PIN entry pending")
            }

            (State::Idle, Event::Ping { message, flags }) => self.handle_ping(message, *flags),

            (State::Idle, Event::ChangePin { remove }) => {
                self.request_confirm(PendingAction::ChangePin {
                    remove: *remove,
                    first: None,
                })
            }

            (State::Idle, Event::WipeDevice) => self.request_confirm(PendingAction::Wipe),

            (State::Idle, Event::GetEntropy { size }) => {
                self.request_confirm(PendingAction::Entropy { size: *size })
            }

            (State::Idle, Event::LoadDevice(req)) => self.handle_load(req),

            (State::Idle, Event::ApplySettings(req)) => self.handle_settings(req),

            (State::Idle, Event::ApplyPolicy { name, enabled }) => {
                self.handle_policy(name, *enabled)
            }

            (State::Idle, Event::ClearSession) => {
                self.store.clear_session();

                Output::success("Session cleared")
            }

            (State::Idle, Event::ButtonAck | Event::PinMatrixAck { .. }) => {
                Output::failure(FailureCode::UnexpectedMessage, "No flow pending")
            }
        };

        #[cfg(feature = "log")]
        log::trace!("state: {}", self.state);

        out
    }

    /// Abort any pending flow, zeroizing held state
    fn abort(&mut self, state: State) {
        match state {
            State::Idle => (),
            State::Confirm(mut action) | State::PinEntry { mut action, .. } => {
                action.zeroize();
                self.drv.layout_home();
            }
        }
    }

    /// Build a [Features] report from the current store state
    fn features(&self) -> Features {
        let mut flags = FeatureFlags::empty();

        if self.store.is_initialized() {
            flags |= FeatureFlags::INITIALIZED;
        }
        if self.store.has_pin() {
            flags |= FeatureFlags::PIN_PROTECTION;
        }
        if self.store.passphrase_protection() {
            flags |= FeatureFlags::PASSPHRASE_PROTECTION;
        }
        if self.store.is_pin_cached() {
            flags |= FeatureFlags::PIN_CACHED;
        }
        if self.store.is_passphrase_cached() {
            flags |= FeatureFlags::PASSPHRASE_CACHED;
        }
        if self.store.imported() {
            flags |= FeatureFlags::IMPORTED;
        }

        let mut f = Features {
            ver_major: VERSION[0],
            ver_minor: VERSION[1],
            ver_patch: VERSION[2],
            flags,
            ..Default::default()
        };

        let _ = f.vendor.push_str(VENDOR);
        let _ = f.device_id.push_str(self.store.device_id());
        let _ = f.label.push_str(self.store.label());
        let _ = f.language.push_str(self.store.language());

        for p in self.store.policies() {
            if let Ok(e) = PolicyEntry::new(p.name.as_str(), p.enabled) {
                let _ = f.policies.push(e);
            }
        }

        f
    }

    /// Whether protected actions must run the PIN stage
    fn pin_entry_required(&self) -> bool {
        self.store.has_pin() && !self.store.is_pin_cached()
    }

    fn request_confirm(&mut self, action: PendingAction) -> Output {
        let kind = action.button_kind();
        self.state = State::Confirm(action);

        Output::ButtonRequest(kind)
    }

    fn request_pin(&mut self, action: PendingAction, stage: PinMatrixKind) -> Output {
        self.state = State::PinEntry { action, stage };

        Output::PinMatrixRequest(stage)
    }

    fn handle_ping(&mut self, message: &str, flags: PingFlags) -> Output {
        if !flags.contains(PingFlags::BUTTON_PROTECTION)
            && !(flags.contains(PingFlags::PIN_PROTECTION) && self.pin_entry_required())
        {
            return Output::success(message);
        }

        let message = match BoundedStr::try_from_str(message) {
            Some(m) => m,
            None => return Output::failure(FailureCode::DataError, "Message too long"),
        };
        let action = PendingAction::Ping {
            message,
            pin_protected: flags.contains(PingFlags::PIN_PROTECTION),
        };

        match flags.contains(PingFlags::BUTTON_PROTECTION) {
            true => self.request_confirm(action),
            false => self.request_pin(action, PinMatrixKind::Current),
        }
    }

    fn handle_load(&mut self, req: &LoadDevice) -> Output {
        if self.store.is_initialized() {
            return Output::failure(
                FailureCode::UnexpectedMessage,
                "Device already initialized, wipe first",
            );
        }

        let (node, mnemonic) = match (&req.node, req.mnemonic) {
            (Some(n), None) => (Some(n.clone()), None),
            (None, Some(m)) => {
                let skip = req.flags.contains(LoadDeviceFlags::SKIP_CHECKSUM);
                if !self.drv.verify_mnemonic(m, skip) {
                    return Output::failure(FailureCode::DataError, "Mnemonic checksum invalid");
                }

                match BoundedStr::try_from_str(m) {
                    Some(b) => (None, Some(b)),
                    None => return Output::failure(FailureCode::DataError, "Field too long"),
                }
            }
            _ => {
                return Output::failure(
                    FailureCode::DataError,
                    "Expected exactly one of node or mnemonic",
                )
            }
        };

        let (pin, language, label) = match (
            bounded::<PIN_MAX_LEN>(req.pin),
            bounded::<LANGUAGE_MAX_LEN>(req.language),
            bounded::<LABEL_MAX_LEN>(req.label),
        ) {
            (Some(p), Some(lg), Some(lb)) => (p, lg, lb),
            _ => return Output::failure(FailureCode::DataError, "Field too long"),
        };

        self.request_confirm(PendingAction::Load {
            node,
            mnemonic,
            pin,
            language,
            label,
            passphrase_protection: req.flags.contains(LoadDeviceFlags::PASSPHRASE_PROTECTION),
        })
    }

    fn handle_settings(&mut self, req: &ApplySettings) -> Output {
        if req.is_empty() {
            return Output::failure(FailureCode::DataError, "No settings provided");
        }

        let (label, language) = match (
            bounded::<LABEL_MAX_LEN>(req.label),
            bounded::<LANGUAGE_MAX_LEN>(req.language),
        ) {
            (Some(lb), Some(lg)) => (lb, lg),
            _ => return Output::failure(FailureCode::DataError, "Field too long"),
        };

        self.request_confirm(PendingAction::Settings {
            label,
            language,
            use_passphrase: req.use_passphrase,
        })
    }

    fn handle_policy(&mut self, name: &str, enabled: bool) -> Output {
        if !self.store.has_policy(name) {
            return Output::failure(FailureCode::DataError, "Unknown policy");
        }

        let name = match BoundedStr::try_from_str(name) {
            Some(n) => n,
            None => return Output::failure(FailureCode::DataError, "Field too long"),
        };

        self.request_confirm(PendingAction::Policy { name, enabled })
    }

    /// Run the platform confirmation for an acknowledged button request
    fn handle_confirm(&mut self, mut action: PendingAction) -> Output {
        let kind = action.button_kind();
        let (title, body) = action.prompt();

        let approved = match &action {
            // The ping body is the host-provided message
            PendingAction::Ping { message, .. } => self.drv.confirm(kind, title, message.as_str()),
            _ => self.drv.confirm(kind, title, body),
        };

        if !approved {
            action.zeroize();
            self.drv.layout_home();

            return Output::failure(FailureCode::ActionCancelled, "Not confirmed");
        }

        self.execute_confirmed(action)
    }

    /// Route an approved action through PIN verification when required
    fn execute_confirmed(&mut self, action: PendingAction) -> Output {
        let needs_pin = match &action {
            // A PIN change always proves the current PIN, the session
            // cache is not sufficient
            PendingAction::ChangePin { .. } => self.store.has_pin(),
            a => a.pin_protected() && self.pin_entry_required(),
        };

        match needs_pin {
            true => self.request_pin(action, PinMatrixKind::Current),
            false => self.execute_verified(action),
        }
    }

    fn handle_pin_entry(
        &mut self,
        mut action: PendingAction,
        stage: PinMatrixKind,
        pin: &str,
    ) -> Output {
        // An empty entry is the user backing out, not an attempt
        if pin.is_empty() {
            action.zeroize();
            self.drv.layout_home();

            return Output::failure(FailureCode::PinCancelled, "PIN entry cancelled");
        }

        match stage {
            PinMatrixKind::Current => {
                if !self.store.is_pin_correct(pin) {
                    // The failure is already durable in the arena
                    #[cfg(feature = "log")]
                    log::info!("pin rejected, {} failures recorded", self.store.pin_fails());

                    action.zeroize();
                    self.drv.layout_home();

                    return Output::failure(FailureCode::PinInvalid, "PIN invalid");
                }

                self.store.cache_pin(pin);
                self.execute_verified(action)
            }

            PinMatrixKind::NewFirst => match action {
                PendingAction::ChangePin { remove, .. } => match BoundedStr::try_from_str(pin) {
                    Some(p) => self.request_pin(
                        PendingAction::ChangePin {
                            remove,
                            first: Some(p),
                        },
                        PinMatrixKind::NewSecond,
                    ),
                    None => {
                        self.drv.layout_home();
                        Output::failure(FailureCode::DataError, "PIN too long")
                    }
                },
                mut a => {
                    a.zeroize();
                    self.drv.layout_home();
                    Output::failure(FailureCode::UnexpectedMessage, "No PIN change pending")
                }
            },

            PinMatrixKind::NewSecond => match action {
                PendingAction::ChangePin {
                    first: Some(mut first),
                    ..
                } => {
                    let matched = first.ct_eq(pin);
                    first.zeroize();

                    match matched {
                        true => self.do_set_pin(pin),
                        false => {
                            self.drv.layout_home();
                            Output::failure(FailureCode::PinMismatch, "PIN entries do not match")
                        }
                    }
                }
                mut a => {
                    a.zeroize();
                    self.drv.layout_home();
                    Output::failure(FailureCode::UnexpectedMessage, "No PIN change pending")
                }
            },
        }
    }

    /// Apply an action that has passed confirmation and PIN stages
    fn execute_verified(&mut self, action: PendingAction) -> Output {
        match action {
            PendingAction::Ping { mut message, .. } => {
                let out = Output::success(message.as_str());
                message.zeroize();
                self.drv.layout_home();

                out
            }

            PendingAction::Wipe => {
                let ok = self.store.wipe(&mut self.rng);
                self.drv.layout_home();

                match ok {
                    true => Output::success("Device wiped"),
                    false => Output::failure(FailureCode::FlashFailure, "Flash erase failed"),
                }
            }

            PendingAction::Load {
                node,
                mut mnemonic,
                mut pin,
                language,
                label,
                passphrase_protection,
            } => {
                match (node, &mnemonic) {
                    (Some(n), _) => self.store.set_node(n),
                    (None, Some(m)) => {
                        // Bounds match the record capacity, checked on
                        // request
                        let _ = self.store.set_mnemonic(m.as_str());
                    }
                    (None, None) => (),
                }

                if let Some(p) = &pin {
                    let _ = self.store.set_pin(p.as_str());
                    self.store.cache_pin(p.as_str());
                }
                if let Some(l) = &language {
                    let _ = self.store.set_language(l.as_str());
                }
                if let Some(l) = &label {
                    let _ = self.store.set_label(l.as_str());
                }

                self.store.set_passphrase_protection(passphrase_protection);
                self.store.set_imported(true);

                mnemonic.zeroize();
                pin.zeroize();

                self.finish_commit("Device loaded")
            }

            PendingAction::Settings {
                label,
                language,
                use_passphrase,
            } => {
                if let Some(l) = &label {
                    let _ = self.store.set_label(l.as_str());
                }
                if let Some(l) = &language {
                    let _ = self.store.set_language(l.as_str());
                }
                if let Some(on) = use_passphrase {
                    self.store.set_passphrase_protection(on);
                }

                self.finish_commit("Settings applied")
            }

            PendingAction::Policy { name, enabled } => {
                match self.store.set_policy(name.as_str(), enabled) {
                    true => self.finish_commit("Policy applied"),
                    false => {
                        self.drv.layout_home();
                        Output::failure(FailureCode::DataError, "Unknown policy")
                    }
                }
            }

            PendingAction::Entropy { size } => {
                let n = (size as usize).min(ENTROPY_MAX_LEN);

                let mut bytes = Vec::<u8, ENTROPY_MAX_LEN>::new();
                let _ = bytes.resize_default(n);
                self.rng.fill_bytes(&mut bytes);

                self.drv.layout_home();

                Output::Entropy(bytes)
            }

            PendingAction::ChangePin { remove: true, .. } => {
                self.store.clear_pin();
                self.store.uncache_pin();

                self.finish_commit("PIN removed")
            }

            // Current PIN verified, collect the new one
            PendingAction::ChangePin { remove: false, .. } => self.request_pin(
                PendingAction::ChangePin {
                    remove: false,
                    first: None,
                },
                PinMatrixKind::NewFirst,
            ),
        }
    }

    fn do_set_pin(&mut self, pin: &str) -> Output {
        if self.store.set_pin(pin).is_err() {
            self.drv.layout_home();
            return Output::failure(FailureCode::DataError, "PIN too long");
        }

        self.store.cache_pin(pin);
        self.finish_commit("PIN changed")
    }

    /// Commit the shadow record and close out a flow
    fn finish_commit(&mut self, message: &'static str) -> Output {
        let ok = self.store.commit();
        self.drv.layout_home();

        match ok {
            true => Output::success(message),
            false => Output::failure(FailureCode::FlashFailure, "Commit failed"),
        }
    }

    /// Fetch the wallet root node for signing operations.
    ///
    /// Returns [`None`] while the device is locked (PIN set and not
    /// cached, or passphrase protection enabled with no cached
    /// passphrase) or uninitialized.
    pub fn root_node(&self) -> Option<HdNode> {
        if self.store.has_pin() && !self.store.is_pin_cached() {
            return None;
        }
        if self.store.passphrase_protection() && !self.store.is_passphrase_cached() {
            return None;
        }

        if let Some(n) = self.store.node() {
            return Some(n.clone());
        }

        let mnemonic = self.store.mnemonic()?;
        let passphrase = self.store.passphrase().unwrap_or("");

        let mut seed = [0u8; SEED_LEN];
        self.drv.mnemonic_to_seed(mnemonic, passphrase, &mut seed);

        let mut node = HdNode::default();
        let ok = self.drv.derive_node_from_seed(&seed, &mut node);
        seed.zeroize();

        match ok {
            true => Some(node),
            false => {
                node.zeroize();
                None
            }
        }
    }

    /// Cache a session passphrase collected by the platform
    pub fn cache_passphrase(&mut self, passphrase: &str) {
        self.store.cache_passphrase(passphrase);
    }

    /// Feed one inbound segment, dispatching and replying when it
    /// completes a frame.
    ///
    /// Unknown message ids and undecodable payloads are counted on the
    /// transport and dropped without a reply. Returns `true` when a
    /// frame was dispatched.
    #[cfg_attr(feature = "noinline", inline(never))]
    pub fn poll_segment(
        &mut self,
        transport: &mut Transport,
        seg: &[u8],
    ) -> Result<bool, Error> {
        let (msg_id, len) = match transport.push_segment(seg) {
            Some(v) => v,
            None => return Ok(false),
        };

        // Copy out and clear the transport buffer, requests can carry
        // PIN or mnemonic bytes
        let mut msg = [0u8; MSG_MAX_LEN];
        msg[..len].copy_from_slice(transport.payload());
        transport.reset_rx();

        let res = self.dispatch(msg_id, &msg[..len]);
        msg.zeroize();

        match res {
            Ok(out) => {
                self.send_output(transport, &out)?;
                Ok(true)
            }
            Err(WireError::Unhandled) => {
                transport.note_unknown(msg_id);
                Ok(false)
            }
            Err(_) => {
                transport.note_decode_failure(msg_id);
                Ok(false)
            }
        }
    }

    fn dispatch(&mut self, msg_id: u16, msg: &[u8]) -> Result<Output, WireError> {
        let evt = Event::parse(msg_id, msg)?;

        Ok(self.update(&evt))
    }

    /// Encode and transmit a reply via the driver
    fn send_output(&mut self, transport: &mut Transport, out: &Output) -> Result<(), Error> {
        let mut rsp = [0u8; MSG_MAX_LEN];

        let n = match out.encode(&mut rsp) {
            Ok(n) => n,
            Err(_e) => {
                rsp.zeroize();
                #[cfg(feature = "log")]
                log::error!("reply encode failed: {:?}", _e);
                return Err(Error::EncodingFailed);
            }
        };

        let drv = &mut self.drv;
        let res = transport.send(out.msg_type() as u16, &rsp[..n], |seg| drv.tx_segment(seg));
        rsp.zeroize();

        match res {
            Ok(()) => Ok(()),
            // The link dropped the reply, nothing to unwind
            Err(TransportError::TxFailed) => {
                #[cfg(feature = "log")]
                log::warn!("reply transmit failed");
                Ok(())
            }
            Err(TransportError::Overflow) => Err(Error::EncodingFailed),
        }
    }
}

/// Bound an optional wire string, `None` when it exceeds the capacity
fn bounded<const N: usize>(s: Option<&str>) -> Option<Option<BoundedStr<N>>> {
    match s {
        Some(v) => BoundedStr::try_from_str(v).map(Some),
        None => Some(None),
    }
}
