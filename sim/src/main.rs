// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::{
    io::{ErrorKind, Read, Write},
    net::{TcpListener, TcpStream},
};

use anyhow::Context;
use bip39::{Language, Mnemonic, Seed};
use clap::Parser;
use log::{debug, error, info, warn, LevelFilter};

use keywarden_core::{
    engine::{Driver, Engine, SEED_LEN},
    flash::RamFlash,
    storage::pin_delay_secs,
    transport::Transport,
    wire::{device::ButtonRequestKind, frame::SEGMENT_LEN, secrets::HdNode},
};

/// KeyWarden trust core simulator
///
/// Runs the wallet engine against in-memory flash, exposing the 64-byte
/// segment transport on a TCP socket for protocol-level poking without
/// hardware. Flash contents persist across connections, so dropping a
/// connection behaves like a device reboot (the session cache is cleared
/// and storage is re-adopted from flash).
#[derive(Clone, Debug, PartialEq, Parser)]
pub struct Args {
    /// Socket address to listen on
    #[clap(long, default_value = "127.0.0.1:7332", env = "KEYWARDEN_SIM_BIND")]
    bind: String,

    /// Decline all confirmation prompts
    #[clap(long)]
    deny: bool,

    /// Cache a session passphrase at connection setup
    #[clap(long, env = "KEYWARDEN_SIM_PASSPHRASE")]
    passphrase: Option<String>,

    /// Log level
    #[clap(long, default_value = "debug")]
    log_level: LevelFilter,
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging
    let _ = simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default());

    let listener = TcpListener::bind(&args.bind)
        .with_context(|| format!("failed to bind {}", args.bind))?;

    info!("listening on {}", listener.local_addr()?);

    // One device's worth of flash, shared across connections
    let mut flash = RamFlash::new();

    for stream in listener.incoming() {
        match stream {
            Ok(s) => {
                if let Err(e) = serve(s, &mut flash, &args) {
                    error!("connection error: {:#}", e);
                }
            }
            Err(e) => error!("accept failed: {}", e),
        }
    }

    Ok(())
}

/// Run the engine for one host connection
fn serve(stream: TcpStream, flash: &mut RamFlash, args: &Args) -> anyhow::Result<()> {
    let peer = stream.peer_addr()?;
    info!("host connected: {}", peer);

    let drv = SimDriver {
        stream: stream.try_clone()?,
        deny: args.deny,
    };

    let mut engine = Engine::new(drv, &mut *flash);
    engine.init()?;

    if let Some(p) = &args.passphrase {
        engine.cache_passphrase(p);
    }

    let mut transport = Transport::new();
    let mut reader = stream;
    let mut seg = [0u8; SEGMENT_LEN];
    let mut last_fails = engine.store().pin_fails();

    loop {
        match reader.read_exact(&mut seg) {
            Ok(()) => (),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("segment read failed"),
        }

        engine.poll_segment(&mut transport, &seg)?;

        let fails = engine.store().pin_fails();
        if fails != last_fails && fails != 0 {
            warn!(
                "{} pin failures recorded, next attempt should be delayed {}s",
                fails,
                pin_delay_secs(fails)
            );
        }
        last_fails = fails;
    }

    info!("host disconnected: {}", peer);
    debug!("transport stats: {:?}", transport.stats());

    Ok(())
}

/// Platform driver backed by the terminal and host BIP39 support
struct SimDriver {
    stream: TcpStream,
    deny: bool,
}

impl Driver for SimDriver {
    fn confirm(&mut self, kind: ButtonRequestKind, title: &str, body: &str) -> bool {
        let approved = !self.deny;

        info!(
            "confirm [{}] {}: {} ({})",
            kind,
            title,
            body,
            if approved { "approved" } else { "declined" }
        );

        approved
    }

    fn layout_home(&mut self) {
        debug!("home layout");
    }

    fn verify_mnemonic(&self, phrase: &str, skip_checksum: bool) -> bool {
        match skip_checksum {
            true => !phrase.is_empty(),
            false => Mnemonic::validate(phrase, Language::English).is_ok(),
        }
    }

    fn mnemonic_to_seed(&self, mnemonic: &str, passphrase: &str, seed: &mut [u8; SEED_LEN]) {
        match Mnemonic::from_phrase(mnemonic, Language::English) {
            Ok(m) => seed.copy_from_slice(Seed::new(&m, passphrase).as_bytes()),
            // Checksum-skipped imports cannot be stretched by the host lib
            Err(_) => warn!("stored mnemonic fails validation, using a zero seed"),
        }
    }

    fn derive_node_from_seed(&self, seed: &[u8], node: &mut HdNode) -> bool {
        // Stand-in derivation, signing is out of scope for the simulator
        node.private_key.copy_from_slice(&seed[..32]);
        node.chain_code.copy_from_slice(&seed[32..64]);
        node.public_key[0] = 0x02;

        true
    }

    fn tx_segment(&mut self, seg: &[u8; SEGMENT_LEN]) -> bool {
        self.stream.write_all(seg).is_ok()
    }
}
