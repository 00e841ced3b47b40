use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use timed_serial::config::{ConfigLoader, SerialConfig};
use timed_serial::port::{SyncSerialTransport, TimedPort, TokioSerialTransport, Transport};
use timed_serial::registry::{PortRegistry, SystemPortRegistry};
use timed_serial::{logging, AppResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "timed-serial",
    version,
    about = "List serial ports and perform exact-count, timeout-bounded reads and writes."
)]
struct Cli {
    /// Configuration file to use instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive, e.g. "debug" or "timed_serial=trace".
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List visible serial ports, optionally filtered by USB ids.
    List {
        /// USB vendor id (decimal or 0x-prefixed hex).
        #[arg(long, value_parser = parse_id)]
        vid: Option<u16>,

        /// USB product id (decimal or 0x-prefixed hex).
        #[arg(long, value_parser = parse_id)]
        pid: Option<u16>,
    },

    /// Read exactly COUNT bytes and print them as hex.
    Read {
        /// Port name or configured alias.
        port: String,
        count: usize,
        #[command(flatten)]
        io: IoArgs,
    },

    /// Write a hex-encoded payload in full.
    Write {
        /// Port name or configured alias.
        port: String,
        /// Payload as hex, e.g. "deadbeef".
        data: String,
        #[command(flatten)]
        io: IoArgs,
    },
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Deadline in milliseconds (0 waits forever). Defaults to the
    /// configured read or write timeout.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Baud rate. Defaults to the configured baud.
    #[arg(long)]
    baud: Option<u32>,

    /// Use the blocking serialport backend instead of tokio-serial.
    #[arg(long)]
    blocking: bool,
}

fn parse_id(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid USB id '{s}': {e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    logging::init(&config.logging)?;

    match cli.command {
        Command::List { vid, pid } => list_ports(vid, pid),
        Command::Read { port, count, io } => {
            let mut port = build_port(&port, &io, &config.serial);
            let timeout = io.timeout_ms.map(Duration::from_millis);
            let token = cancel_on_ctrl_c();

            let data = port
                .session_until(&token, |port| {
                    Box::pin(async move {
                        match timeout {
                            Some(timeout) => port.read_timeout(count, timeout).await,
                            None => port.read(count).await,
                        }
                    })
                })
                .await?;
            println!("{}", hex::encode(data));
            Ok(())
        }
        Command::Write { port, data, io } => {
            let payload = hex::decode(data.trim())?;
            let mut port = build_port(&port, &io, &config.serial);
            let timeout = io.timeout_ms.map(Duration::from_millis);
            let token = cancel_on_ctrl_c();

            let written = port
                .session_until(&token, |port| {
                    Box::pin(async move {
                        match timeout {
                            Some(timeout) => port.write_timeout(&payload, timeout).await,
                            None => port.write(&payload).await,
                        }
                    })
                })
                .await?;
            info!(bytes = written, "Payload written");
            println!("{written}");
            Ok(())
        }
    }
}

fn list_ports(vid: Option<u16>, pid: Option<u16>) -> AppResult<()> {
    let registry = SystemPortRegistry;
    let ports = match (vid, pid) {
        (Some(vid), Some(pid)) => registry.list_matching(vid, pid)?,
        (Some(vid), None) => registry.by_vendor(vid)?,
        (None, Some(pid)) => registry.by_product(pid)?,
        (None, None) => registry.list()?,
    };

    if ports.is_empty() {
        eprintln!("No matching serial ports found.");
    }
    for port in ports {
        println!(
            "{}\t{}\t{:?}\t{}",
            port.name,
            port.identity,
            port.kind,
            port.product.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn build_port(name: &str, io: &IoArgs, serial: &SerialConfig) -> TimedPort<Box<dyn Transport>> {
    let name = serial.resolve_port(name);
    let line = serial.port_configuration(io.baud);
    debug!(port = %name, baud = line.baud_rate, blocking = io.blocking, "Preparing port");

    let transport: Box<dyn Transport> = if io.blocking {
        Box::new(SyncSerialTransport::new(name, line).with_poll_slice(serial.native_poll_slice()))
    } else {
        Box::new(TokioSerialTransport::new(name, line))
    };
    let mut port = TimedPort::new(transport);
    port.configure(serial);
    port
}

/// A token cancelled by the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("0x0403"), Ok(0x0403));
        assert_eq!(parse_id("0X6001"), Ok(0x6001));
        assert_eq!(parse_id("1027"), Ok(1027));
        assert!(parse_id("0xfffff").is_err());
        assert!(parse_id("ftdi").is_err());
    }

    #[test]
    fn test_read_command_parsing() {
        let cli = Cli::try_parse_from([
            "timed-serial",
            "read",
            "/dev/ttyUSB0",
            "16",
            "--timeout-ms",
            "250",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Read { port, count, io } => {
                assert_eq!(port, "/dev/ttyUSB0");
                assert_eq!(count, 16);
                assert_eq!(io.timeout_ms, Some(250));
                assert!(!io.blocking);
            }
            other => panic!("Expected read command, got: {:?}", other),
        }
    }

    #[test]
    fn test_list_filters_accept_hex() {
        let cli = Cli::try_parse_from(["timed-serial", "list", "--vid", "0x2341"]).unwrap();
        match cli.command {
            Command::List { vid, pid } => {
                assert_eq!(vid, Some(0x2341));
                assert_eq!(pid, None);
            }
            other => panic!("Expected list command, got: {:?}", other),
        }
    }

    #[test]
    fn test_build_port_uses_alias_and_defaults() {
        let mut serial = SerialConfig::default();
        serial
            .port_aliases
            .insert("probe".to_string(), "/dev/ttyACM0".to_string());
        serial.read_timeout_ms = 300;
        let io = IoArgs {
            timeout_ms: None,
            baud: Some(9600),
            blocking: true,
        };

        let port = build_port("probe", &io, &serial);
        assert_eq!(port.name(), "/dev/ttyACM0");
        assert!(!port.is_open());
        assert_eq!(port.default_timeouts().0, Duration::from_millis(300));
    }
}
