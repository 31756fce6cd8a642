//! Gibson CLI Client
//!
//! Command-line interface for interacting with a Gibson server.

use clap::{Parser, Subcommand, ValueEnum};
use gibson::{Client, Config, GibsonError, KeyValueSet, MetaField, ProtocolVariant, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// Gibson CLI
#[derive(Parser, Debug)]
#[command(name = "gibson-cli")]
#[command(about = "CLI for the Gibson cache server")]
#[command(version)]
struct Args {
    /// Server address (host:port, unix:/path or /path)
    #[arg(short, long, default_value = "127.0.0.1:10128")]
    address: String,

    /// Reply layout spoken by the server
    #[arg(short, long, value_enum, default_value = "encoded")]
    protocol: ProtocolArg,

    /// Connect/read/write timeout in milliseconds (0 = none)
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProtocolArg {
    Legacy,
    Encoded,
}

impl From<ProtocolArg> for ProtocolVariant {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Legacy => ProtocolVariant::Legacy,
            ProtocolArg::Encoded => ProtocolVariant::Encoded,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set a key-value pair
    Set {
        key: String,
        value: String,
        /// Time to live in seconds (0 = forever)
        #[arg(long, default_value = "0")]
        ttl: u32,
    },

    /// Set the time to live of a key
    Ttl { key: String, seconds: u32 },

    /// Get a value by key
    Get { key: String },

    /// Delete a key
    Del { key: String },

    /// Increment a numeric value
    Inc { key: String },

    /// Decrement a numeric value
    Dec { key: String },

    /// Make a key read-only for some seconds
    Lock { key: String, seconds: u32 },

    /// Remove a lock
    Unlock { key: String },

    /// Read a metadata field (size, encoding, access, created, ttl, left, lock)
    Meta { key: String, field: String },

    /// Set every key matching a prefix
    Mset { prefix: String, value: String },

    /// Set the time to live of every key matching a prefix
    Mttl { prefix: String, seconds: u32 },

    /// Get every key matching a prefix
    Mget { prefix: String },

    /// Delete every key matching a prefix
    Mdel { prefix: String },

    /// Increment every key matching a prefix
    Minc { prefix: String },

    /// Decrement every key matching a prefix
    Mdec { prefix: String },

    /// Lock every key matching a prefix
    Mlock { prefix: String, seconds: u32 },

    /// Unlock every key matching a prefix
    Munlock { prefix: String },

    /// Count keys matching a prefix
    Count { prefix: String },

    /// List keys matching a prefix
    Keys { prefix: String },

    /// Show server statistics
    Stats,

    /// Ping the server
    Ping,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,gibson=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let address = match args.address.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
    };

    let config = Config::builder()
        .address(address)
        .protocol(args.protocol.into())
        .connect_timeout_ms(args.timeout_ms)
        .read_timeout_ms(args.timeout_ms)
        .write_timeout_ms(args.timeout_ms)
        .build();

    tracing::debug!("Connecting to {}", config.address);

    let mut client = Client::new(config);
    if let Err(e) = client.connect() {
        tracing::error!("Failed to connect: {}", e);
        std::process::exit(1);
    }

    let outcome = run(&mut client, args.command);
    let reason = client.last_error();
    if client.is_connected() {
        let _ = client.quit();
    }

    if let Err(e) = outcome {
        eprintln!("error: {} ({})", e, reason);
        std::process::exit(1);
    }
}

fn run(client: &mut Client, command: Commands) -> Result<(), GibsonError> {
    match command {
        Commands::Set { key, value, ttl } => print_value(&client.set(key, value, ttl)?),
        Commands::Ttl { key, seconds } => print_ok(client.ttl(key, seconds)?),
        Commands::Get { key } => print_value(&client.get(key)?),
        Commands::Del { key } => print_ok(client.del(key)?),
        Commands::Inc { key } => print_value(&client.inc(key)?),
        Commands::Dec { key } => print_value(&client.dec(key)?),
        Commands::Lock { key, seconds } => print_ok(client.lock(key, seconds)?),
        Commands::Unlock { key } => print_ok(client.unlock(key)?),
        Commands::Meta { key, field } => {
            let field = MetaField::from_name(&field).ok_or_else(|| {
                GibsonError::InvalidArgument(format!("unknown meta field '{}'", field))
            })?;
            println!("{}", client.meta(key, field)?);
        }
        Commands::Mset { prefix, value } => println!("{}", client.mset(prefix, value)?),
        Commands::Mttl { prefix, seconds } => println!("{}", client.mttl(prefix, seconds)?),
        Commands::Mget { prefix } => print_set(&client.mget(prefix)?),
        Commands::Mdel { prefix } => println!("{}", client.mdel(prefix)?),
        Commands::Minc { prefix } => println!("{}", client.minc(prefix)?),
        Commands::Mdec { prefix } => println!("{}", client.mdec(prefix)?),
        Commands::Mlock { prefix, seconds } => println!("{}", client.mlock(prefix, seconds)?),
        Commands::Munlock { prefix } => println!("{}", client.munlock(prefix)?),
        Commands::Count { prefix } => println!("{}", client.count(prefix)?),
        Commands::Keys { prefix } => {
            for key in client.keys(prefix)? {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
        Commands::Stats => print_set(&client.stats()?),
        Commands::Ping => print_ok(client.ping()?),
    }
    Ok(())
}

fn print_ok(_: ()) {
    println!("OK");
}

fn print_value(value: &Value) {
    println!("{}", value);
}

/// One `name: value` line per pair, names aligned
fn print_set(set: &KeyValueSet) {
    let width = set.keys().map(|k| k.len()).max().unwrap_or(0);
    for (key, value) in set.iter() {
        println!("{:<width$} : {}", String::from_utf8_lossy(key), value, width = width);
    }
}
