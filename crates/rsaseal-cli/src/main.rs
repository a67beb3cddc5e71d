//! rsaseal: seal JSON documents under an RSA public key, open them with the private key
//!
//! Commands:
//!   seal <input>          - encrypt a JSON document into a text or binary envelope
//!   open <input>          - decrypt an envelope and print the JSON document
//!   inspect <input>       - show block layout of an envelope without decrypting
//!   fingerprint <key>     - print the SHA-256 fingerprint of a PEM key
//!   keys list             - list keys visible through the key store
//!   config show           - display current configuration
//!
//! `<input>` may be `-` for stdin. Output goes to stdout unless `-o` is given.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rsaseal_core::config::expand_tilde;
use rsaseal_core::{CarrierKind, SealConfig};
use rsaseal_crypto::{
    binary, text, ChunkParams, Envelope, EnvelopeOptions, KeyMaterial, ModulusSize,
};
use rsaseal_keys::{KeyQuery, KeyStore, LoadedKey};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "rsaseal",
    version,
    about = "Chunked RSA-OAEP envelopes for JSON documents",
    long_about = "rsaseal: seal JSON documents of any size under an RSA public key, \
                  as Base64 text or raw binary envelopes"
)]
struct Cli {
    /// Path to rsaseal.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "RSASEAL_CONFIG",
        default_value = "~/.config/rsaseal/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "RSASEAL_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "RSASEAL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(clap::Args, Debug)]
struct KeyArgs {
    /// Key name, `sha256:<fingerprint>`, or path to a PEM file
    #[arg(long, short = 'k')]
    key: String,

    /// Environment variable holding the passphrase of an encrypted private key
    #[arg(long)]
    passphrase_env: Option<String>,
}

#[derive(clap::Args, Debug)]
struct CarrierArgs {
    /// Envelope carrier (default from [envelope] carrier)
    #[arg(long)]
    carrier: Option<CarrierKind>,

    /// Text carrier delimiter (default from [envelope] delimiter)
    #[arg(long)]
    delimiter: Option<char>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seal a JSON document
    Seal {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        carrier: CarrierArgs,
        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// JSON input file, or `-` for stdin
        input: PathBuf,
    },

    /// Open an envelope and print the JSON document
    Open {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        carrier: CarrierArgs,
        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Envelope file, or `-` for stdin
        input: PathBuf,
    },

    /// Show an envelope's block layout without decrypting it
    ///
    /// Only the key's modulus size is used, so a public key is enough.
    Inspect {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        carrier: CarrierArgs,
        /// Envelope file, or `-` for stdin
        input: PathBuf,
    },

    /// Print the SHA-256 fingerprint of a PEM key
    Fingerprint {
        /// PEM file (private or public key)
        path: PathBuf,
        /// Environment variable holding the passphrase of an encrypted private key
        #[arg(long)]
        passphrase_env: Option<String>,
    },

    /// Key store management
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeysAction {
    /// List keys in the user and system key directories
    List,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = SealConfig::load(&config_path)?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match cli.log_format.clone() {
        Some(format) => format,
        None => LogFormat::from_str(&config.log.format, true)
            .map_err(|e| anyhow::anyhow!("invalid [log] format: {e}"))?,
    };
    init_logging(&level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "rsaseal starting"
    );

    match cli.command {
        Commands::Seal { key, carrier, output, input } => {
            cmd_seal(&config, &key, &carrier, output.as_deref(), &input)
        }
        Commands::Open { key, carrier, output, input } => {
            cmd_open(&config, &key, &carrier, output.as_deref(), &input)
        }
        Commands::Inspect { key, carrier, input } => cmd_inspect(&config, &key, &carrier, &input),
        Commands::Fingerprint { path, passphrase_env } => {
            cmd_fingerprint(&path, passphrase_env.as_deref())
        }
        Commands::Keys { action: KeysAction::List } => cmd_keys_list(&config),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

/// Logs go to stderr; stdout carries envelopes and documents.
fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn read_passphrase(var: Option<&str>) -> Result<Option<SecretString>> {
    match var {
        None => Ok(None),
        Some(var) => {
            let value = std::env::var(var)
                .with_context(|| format!("passphrase variable {var} is not set"))?;
            Ok(Some(SecretString::from(value)))
        }
    }
}

/// An existing file is always a path; anything else goes through the query syntax.
fn parse_key_query(key: &str) -> Result<KeyQuery> {
    if Path::new(key).is_file() {
        return Ok(KeyQuery::Path(PathBuf::from(key)));
    }
    key.parse::<KeyQuery>()
        .with_context(|| format!("invalid key '{key}'"))
}

fn resolve_key(config: &SealConfig, args: &KeyArgs, private: bool) -> Result<LoadedKey> {
    let query = parse_key_query(&args.key)?;
    let mut store = KeyStore::from_config(&config.keys);
    if let Some(passphrase) = read_passphrase(args.passphrase_env.as_deref())? {
        store = store.with_passphrase(passphrase);
    }

    let found = if private {
        store.find_private(&query)
    } else {
        store.find(&query)
    }
    .with_context(|| format!("resolving key '{}'", args.key))?;

    tracing::debug!(source = %found.source, "using key");
    Ok(found)
}

fn envelope_for(config: &SealConfig, args: &CarrierArgs) -> (Envelope, CarrierKind) {
    let mut options = EnvelopeOptions::from(&config.envelope);
    if let Some(delimiter) = args.delimiter {
        options.delimiter = delimiter;
    }
    let carrier = args.carrier.unwrap_or(config.envelope.carrier);
    (Envelope::json().with_options(options), carrier)
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("writing stdout")?;
            stdout.flush().context("flushing stdout")
        }
    }
}

fn text_input(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).context("text envelope is not valid UTF-8 (wrong --carrier?)")
}

// ── `rsaseal seal` ────────────────────────────────────────────────────────────

fn cmd_seal(
    config: &SealConfig,
    key_args: &KeyArgs,
    carrier_args: &CarrierArgs,
    output: Option<&Path>,
    input: &Path,
) -> Result<()> {
    let key = resolve_key(config, key_args, false)?;
    let (envelope, carrier) = envelope_for(config, carrier_args);

    let document: serde_json::Value = serde_json::from_slice(&read_input(input)?)
        .with_context(|| format!("parsing JSON from {}", input.display()))?;

    let sealed = match carrier {
        CarrierKind::Text => {
            let mut line = envelope.seal_text(&document, key.material.encrypter())?;
            line.push('\n');
            line.into_bytes()
        }
        CarrierKind::Binary => envelope.seal_binary(&document, key.material.encrypter())?,
    };

    tracing::debug!(carrier = %carrier, bytes = sealed.len(), "sealed");
    write_output(output, &sealed)
}

// ── `rsaseal open` ────────────────────────────────────────────────────────────

fn cmd_open(
    config: &SealConfig,
    key_args: &KeyArgs,
    carrier_args: &CarrierArgs,
    output: Option<&Path>,
    input: &Path,
) -> Result<()> {
    let key = resolve_key(config, key_args, true)?;
    let decrypter = key.material.decrypter()?;
    let (envelope, carrier) = envelope_for(config, carrier_args);
    let data = read_input(input)?;

    let document: serde_json::Value = match carrier {
        CarrierKind::Text => envelope.open_text(&text_input(data)?, decrypter)?,
        CarrierKind::Binary => envelope.open_binary(&data, decrypter)?,
    };

    let mut rendered = serde_json::to_string_pretty(&document).context("rendering JSON")?;
    rendered.push('\n');
    write_output(output, rendered.as_bytes())
}

// ── `rsaseal inspect` ─────────────────────────────────────────────────────────

fn cmd_inspect(
    config: &SealConfig,
    key_args: &KeyArgs,
    carrier_args: &CarrierArgs,
    input: &Path,
) -> Result<()> {
    let key = resolve_key(config, key_args, false)?;
    let params = ChunkParams::for_modulus(key.material.modulus_byte_size())?;
    let (envelope, carrier) = envelope_for(config, carrier_args);
    let data = read_input(input)?;

    println!("Key:         {}", key.source);
    println!(
        "Modulus:     {} bytes ({} bits)",
        params.modulus_len(),
        params.modulus_len() * 8
    );
    println!("Chunk size:  {} bytes", params.plaintext_len());
    println!("Carrier:     {carrier}");

    let blocks = match carrier {
        CarrierKind::Text => {
            let blocks = text::decode_blocks(&text_input(data)?, envelope.options().delimiter)?;
            let malformed = blocks
                .iter()
                .filter(|b| b.len() != params.modulus_len())
                .count();
            if malformed > 0 {
                println!("Malformed:   {malformed} block(s) not {} bytes", params.modulus_len());
            }
            blocks.len()
        }
        CarrierKind::Binary => {
            let remainder = binary::remainder_len(data.len(), params.modulus_len());
            if remainder > 0 {
                println!("Remainder:   {remainder} trailing byte(s) ignored");
            }
            data.len() / params.modulus_len()
        }
    };

    println!("Blocks:      {blocks}");
    if blocks > 0 {
        println!(
            "Payload:     {}..={} bytes",
            (blocks - 1) * params.plaintext_len() + 1,
            blocks * params.plaintext_len()
        );
    }
    Ok(())
}

// ── `rsaseal fingerprint` ─────────────────────────────────────────────────────

fn cmd_fingerprint(path: &Path, passphrase_env: Option<&str>) -> Result<()> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let passphrase = read_passphrase(passphrase_env)?;
    let material = KeyMaterial::from_pem(&pem, passphrase.as_ref())
        .with_context(|| format!("loading key {}", path.display()))?;

    println!(
        "sha256:{}  {}-bit {}",
        material.fingerprint()?,
        material.modulus_byte_size() * 8,
        if material.has_private() { "private" } else { "public" }
    );
    Ok(())
}

// ── `rsaseal keys list` ───────────────────────────────────────────────────────

fn cmd_keys_list(config: &SealConfig) -> Result<()> {
    let entries = KeyStore::from_config(&config.keys)
        .list()
        .context("scanning key directories")?;

    if entries.is_empty() {
        println!(
            "No keys found in {} or {}",
            expand_tilde(&config.keys.user_dir).display(),
            expand_tilde(&config.keys.system_dir).display()
        );
        return Ok(());
    }

    for entry in entries {
        println!(
            "{:<20} sha256:{}  {:>5}-bit  {:<7}  {}",
            entry.name,
            &entry.fingerprint[..16],
            entry.bits,
            if entry.has_private { "private" } else { "public" },
            entry.source
        );
    }
    Ok(())
}

// ── `rsaseal config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &SealConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
