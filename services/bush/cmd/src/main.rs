//! Command-line tool for bush packets.
//!
//! Generates key pairs, fragments a data packet into hex-encoded wire
//! fragments, and reassembles hex-encoded fragments back into packets.

use anyhow::{bail, Context, Result};
use bush_crypto::{Address, KeyPair, PublicKey, SymmetricKey};
use bush_upackets::{EncryptionScheme, UPackets};
use bush_wire::{DataPacket, Identity, Packet};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::BushConfig;
use logging::BushLogFormatter;

/// Build, fragment and reassemble bush packets
#[derive(Parser, Debug)]
#[command(name = "bush", version, about = "Fragment and reassemble bush packets")]
struct Args {
    /// Configuration file path
    #[arg(long, global = true, default_value = "bush.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Largest wire fragment in bytes, overriding file and environment
    #[arg(long, global = true)]
    max_fragment_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a secp256k1 key pair
    Keygen,

    /// Build a data packet from a file and print its fragments, one hex line each
    Fragment {
        /// Master private key (hex)
        #[arg(long)]
        master_key: String,

        /// Session private key (hex); signs the packet
        #[arg(long)]
        session_key: String,

        /// Recipient public key (hex, 65 bytes); encrypts the header
        #[arg(long)]
        peer_key: String,

        /// Destination address; defaults to the recipient's address
        #[arg(long)]
        destination: Option<String>,

        /// Method name, at most 32 ASCII bytes
        #[arg(long)]
        method: String,

        /// File holding the packet body
        #[arg(long)]
        input: PathBuf,

        /// Body encryption scheme
        #[arg(long, value_enum, default_value_t = SchemeArg::Ec)]
        scheme: SchemeArg,

        /// Body key (hex): 32 bytes for symmetric, a public key for ec.
        /// Defaults to the recipient key under ec.
        #[arg(long)]
        body_key: Option<String>,

        /// Packet timestamp in milliseconds; defaults to now
        #[arg(long)]
        timestamp: Option<u64>,
    },

    /// Reassemble hex fragments, one per line, and print each packet
    Reassemble {
        /// Recipient private key (hex); decrypts headers and ec bodies
        #[arg(long)]
        key: String,

        /// File of hex fragments, one per line
        #[arg(long)]
        input: PathBuf,

        /// Symmetric body key (hex, 32 bytes) used for every sender
        #[arg(long)]
        body_key: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchemeArg {
    Ec,
    Symmetric,
    None,
}

impl From<SchemeArg> for EncryptionScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Ec => EncryptionScheme::Ec,
            SchemeArg::Symmetric => EncryptionScheme::Symmetric,
            SchemeArg::None => EncryptionScheme::None,
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("warn")
        .add_directive(format!("bush={}", args.log_level).parse()?)
        .add_directive(format!("bush_crypto={}", args.log_level).parse()?)
        .add_directive(format!("bush_wire={}", args.log_level).parse()?)
        .add_directive(format!("bush_upackets={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(BushLogFormatter::new())
        .init();

    let mut config = BushConfig::load_from_file(&args.config)?;
    if let Some(size) = args.max_fragment_size {
        config.max_fragment_size = size;
    }
    component_debug!("config", "Effective configuration: {:?}", config);

    match args.command {
        Command::Keygen => keygen(),
        Command::Fragment {
            master_key,
            session_key,
            peer_key,
            destination,
            method,
            input,
            scheme,
            body_key,
            timestamp,
        } => {
            let request = FragmentRequest {
                master: parse_key_pair(&master_key).context("invalid --master-key")?,
                session: parse_key_pair(&session_key).context("invalid --session-key")?,
                peer: parse_public_key(&peer_key).context("invalid --peer-key")?,
                destination: destination
                    .map(|d| d.parse::<Address>())
                    .transpose()
                    .context("invalid --destination")?,
                method,
                scheme: scheme.into(),
                body_key: body_key
                    .map(|k| decode_hex(&k))
                    .transpose()
                    .context("invalid --body-key")?,
                timestamp: timestamp.unwrap_or_else(now_millis),
            };
            fragment(&config, request, &input).await
        }
        Command::Reassemble {
            key,
            input,
            body_key,
        } => {
            let key = parse_key_pair(&key).context("invalid --key")?;
            let body_key = body_key
                .map(|k| decode_hex(&k).and_then(|b| Ok(SymmetricKey::from_slice(&b)?)))
                .transpose()
                .context("invalid --body-key")?;
            reassemble(&config, &key, body_key, &input)
        }
    }
}

fn keygen() -> Result<()> {
    let pair = KeyPair::generate();
    let mut out = std::io::stdout().lock();
    writeln!(out, "private: {}", hex::encode(pair.secret_bytes()))?;
    writeln!(out, "public:  {}", hex::encode(pair.public_key().to_bytes()))?;
    writeln!(out, "address: {}", pair.address())?;
    Ok(())
}

struct FragmentRequest {
    master: KeyPair,
    session: KeyPair,
    peer: PublicKey,
    destination: Option<Address>,
    method: String,
    scheme: EncryptionScheme,
    body_key: Option<Vec<u8>>,
    timestamp: u64,
}

async fn fragment(config: &BushConfig, request: FragmentRequest, input: &Path) -> Result<()> {
    let body = std::fs::read(input).with_context(|| format!("failed to read {:?}", input))?;
    let engine = UPackets::new(config.upackets_config()?)?;

    let endorsement = request
        .master
        .endorse(request.session.public_key())
        .context("failed to endorse session key")?;
    let identity = Identity::new(
        request.master.address(),
        request.destination.unwrap_or_else(|| request.peer.address()),
        endorsement,
        request.timestamp,
    );
    let mut packet: Packet = DataPacket::new(identity, &request.method, body)
        .context("invalid data packet")?
        .into();

    let body_key = match (request.scheme, request.body_key) {
        (_, Some(key)) => key,
        (EncryptionScheme::Ec, None) => request.peer.to_bytes().to_vec(),
        (EncryptionScheme::Symmetric, None) => bail!("--body-key is required for the symmetric scheme"),
        (EncryptionScheme::None, None) => Vec::new(),
    };

    let fragments = engine
        .fragment(
            request.scheme,
            &mut packet,
            &request.session,
            &request.peer,
            &body_key,
        )
        .await
        .context("fragmentation failed")?;

    component_info!(
        "fragment",
        "Fragmented {} packet into {} fragments ({} scheme)",
        packet.kind(),
        fragments.len(),
        request.scheme
    );

    let mut out = std::io::stdout().lock();
    for fragment in &fragments {
        writeln!(out, "{}", hex::encode(fragment))?;
    }
    Ok(())
}

fn reassemble(
    config: &BushConfig,
    key: &KeyPair,
    body_key: Option<SymmetricKey>,
    input: &Path,
) -> Result<()> {
    let content =
        std::fs::read_to_string(input).with_context(|| format!("failed to read {:?}", input))?;
    let engine = UPackets::new(config.upackets_config()?)?;
    let lookup = |_: &str| body_key.clone();

    let mut out = std::io::stdout().lock();
    let mut failures = 0usize;
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let bytes = decode_hex(line).with_context(|| format!("line {}", number + 1))?;

        match engine.feed(&bytes, key, &lookup) {
            Ok(Some(packet)) => writeln!(out, "{}", describe(&packet))?,
            Ok(None) => {}
            Err(e) => {
                failures += 1;
                component_error!("reassemble", "Line {}: {}", number + 1, e);
            }
        }
    }

    if engine.pending() > 0 {
        component_warn!(
            "reassemble",
            "{} packets still incomplete at end of input",
            engine.pending()
        );
    }
    if failures > 0 {
        bail!("{} fragments failed to reassemble", failures);
    }
    Ok(())
}

fn describe(packet: &Packet) -> String {
    let identity = packet.identity();
    let mut line = format!(
        "{} from {} to {} at {}",
        packet.kind(),
        identity.master_address,
        identity.destination_address,
        identity.timestamp
    );
    if let Packet::Data(data) = packet {
        line.push_str(&format!(
            " method={} bytes={} checksum={}",
            data.method(),
            data.data().len(),
            hex::encode(data.checksum())
        ));
    }
    line
}

fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let value = value.trim();
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value).context("not valid hex")
}

fn parse_key_pair(value: &str) -> Result<KeyPair> {
    Ok(KeyPair::from_secret_bytes(&decode_hex(value)?)?)
}

fn parse_public_key(value: &str) -> Result<PublicKey> {
    Ok(PublicKey::from_slice(&decode_hex(value)?)?)
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
