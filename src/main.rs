//! mqtt-wire - MQTT v3.1.1 wire inspector
//!
//! Usage:
//!   mqtt-wire [OPTIONS] decode [--role server|client] [--chunk N] (--hex HEX | --file PATH)
//!   mqtt-wire [OPTIONS] listen [--bind ADDR]
//!
//! Options:
//!   -c, --config <FILE>    Configuration file path
//!   -l, --log-level        Log level (error, warn, info, debug, trace)
//!   -h, --help             Print help

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use mqtt_wire::config::{Config, ParserConfig};
use mqtt_wire::parser::{Event, Role};
use mqtt_wire::protocol::{Packet, PingResp};
use mqtt_wire::transport::Connection;

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }

    fn from_config(level: &str) -> Self {
        match level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }
}

/// Which side of the connection the bytes came from
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum RoleArg {
    /// Bytes sent by a client (CONNECT first)
    #[default]
    Server,
    /// Bytes sent by a server (CONNACK first)
    Client,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Server => Role::Server,
            RoleArg::Client => Role::Client,
        }
    }
}

/// mqtt-wire - MQTT v3.1.1 packet decoder
#[derive(Parser, Debug)]
#[command(name = "mqtt-wire")]
#[command(version)]
#[command(about = "Decode MQTT v3.1.1 byte streams")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a captured byte stream and print every event
    Decode {
        /// Parse as the server (client traffic) or the client (server traffic)
        #[arg(short, long, value_enum, default_value_t)]
        role: RoleArg,

        /// Feed the parser this many bytes at a time (0 = all at once)
        #[arg(long, default_value_t = 0)]
        chunk: usize,

        /// Hex-encoded bytes; whitespace and ':' are ignored
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        hex: Option<String>,

        /// Raw capture file
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Accept TCP connections and log decoded packets
    Listen {
        /// TCP bind address
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error loading config file: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        },
        None => Config::from_env()?,
    };

    // CLI overrides config, config overrides default (info)
    let log_level = args
        .log_level
        .unwrap_or_else(|| LogLevel::from_config(&file_config.log.level));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = &args.config {
        debug!("Loaded configuration from {:?}", path);
    }

    match args.command {
        Command::Decode {
            role,
            chunk,
            hex,
            file,
        } => {
            let data = match (hex, file) {
                (Some(hex), _) => decode_hex(&hex)?,
                (None, Some(path)) => std::fs::read(path)?,
                (None, None) => return Err("one of --hex or --file is required".into()),
            };
            Ok(decode(&file_config.parser, role.into(), chunk, &data))
        }
        Command::Listen { bind } => {
            let bind = bind.unwrap_or(file_config.listen.bind);
            listen(bind, file_config.parser).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run `data` through a parser and print each event. Fails if any event is a Failure.
fn decode(config: &ParserConfig, role: Role, chunk: usize, data: &[u8]) -> ExitCode {
    let mut parser = config.parser(role);
    let chunk = if chunk == 0 { data.len().max(1) } else { chunk };

    let mut failed = false;
    for piece in data.chunks(chunk) {
        for event in parser.data_received(piece) {
            match event {
                Event::Packet(packet) => println!("{:?}", packet),
                Event::Failure(failure) => {
                    match failure.packet_type() {
                        Some(packet_type) => println!("Failure ({}): {}", packet_type, failure),
                        None => println!("Failure: {}", failure),
                    }
                    failed = true;
                }
            }
        }
    }

    if parser.buffered_len() > 0 {
        println!("Incomplete: {} bytes left over", parser.buffered_len());
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn decode_hex(input: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();

    if digits.len() % 2 != 0 {
        return Err("hex input has an odd number of digits".to_string());
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| format!("invalid hex byte '{}'", String::from_utf8_lossy(pair)))
        })
        .collect()
}

async fn listen(bind: SocketAddr, config: ParserConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("Listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                let parser = config.parser(Role::Server);
                tokio::spawn(async move {
                    if let Err(e) = serve(Connection::new(stream, parser), addr).await {
                        debug!("Connection {} ended with error: {}", addr, e);
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

async fn serve(
    mut conn: Connection<TcpStream>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Connection from {}", addr);

    while let Some(event) = conn.next_event().await? {
        match event {
            Event::Packet(Packet::PingReq(_)) => {
                debug!("{}: PingReq", addr);
                conn.send(&PingResp.into()).await?;
            }
            Event::Packet(Packet::Disconnect(_)) => {
                info!("{}: Disconnect", addr);
                break;
            }
            Event::Packet(packet) => {
                info!("{}: {:?}", addr, packet);
            }
            Event::Failure(failure) => {
                warn!(
                    packet_type = ?failure.packet_type(),
                    "{}: protocol violation: {}",
                    addr,
                    failure
                );
                break;
            }
        }
    }

    if let Err(e) = conn.close().await {
        error!("{}: close failed: {}", addr, e);
    }
    info!("Connection from {} closed", addr);
    Ok(())
}
