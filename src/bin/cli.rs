//! rtupoll CLI - Modbus RTU polling from the command line
//!
//! One-shot reads and writes, periodic polling, raw frames, line-terminated
//! ASCII commands and ADAM-4055 DI/DO control.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use rtupoll_core::cli::{format_ascii, format_outcome, format_status, CliResult, DataView, ExitCodes, OutputFormat};
use rtupoll_core::config::{AppConfig, ConfigError};
use rtupoll_core::core::adam::Adam4055;
use rtupoll_core::core::ascii::AsciiLink;
use rtupoll_core::core::bus::Bus;
use rtupoll_core::core::master::RtuMaster;
use rtupoll_core::core::protocol::checksum::append_crc;
use rtupoll_core::core::protocol::{Frame, Outcome};
use rtupoll_core::core::transport::{list_ports, TransportError};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// CLI output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Human-readable text
    Text,
    /// JSON format for scripting
    Json,
    /// Hex dump of the received frame
    Hex,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
            Format::Hex => OutputFormat::Hex,
        }
    }
}

/// Data table to read
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Table {
    /// Coils (0x01)
    Coils,
    /// Discrete inputs (0x02)
    Discrete,
    /// Holding registers (0x03)
    Holding,
    /// Input registers (0x04)
    Input,
}

impl Table {
    fn view(self, count: u16) -> DataView {
        match self {
            Table::Coils | Table::Discrete => DataView::Bits(usize::from(count)),
            Table::Holding | Table::Input => DataView::Registers,
        }
    }
}

/// Output state
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Switch {
    /// Output energised
    On,
    /// Output released
    Off,
}

/// rtupoll CLI
#[derive(Parser, Debug)]
#[command(
    name = "rtupoll",
    version,
    about = "Modbus RTU master and serial device poller",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text, global = true)]
    format: Format,

    /// Verbose output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "RTUPOLL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Also write JSON logs to daily files in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(flatten)]
    line: LineArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Serial line overrides
#[derive(Args, Debug)]
struct LineArgs {
    /// Serial port name (e.g., COM3, /dev/ttyUSB0)
    #[arg(short, long, env = "RTUPOLL_PORT", global = true)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Parity (none, odd, even)
    #[arg(long, global = true)]
    parity: Option<String>,

    /// Data bits (5-8)
    #[arg(long, global = true)]
    data_bits: Option<u8>,

    /// Stop bits (1, 2)
    #[arg(long, global = true)]
    stop_bits: Option<String>,

    /// Response timeout (ms)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

impl LineArgs {
    fn apply(&self, config: &mut AppConfig) -> Result<(), TransportError> {
        if let Some(port) = &self.port {
            config.serial.port.clone_from(port);
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(parity) = &self.parity {
            config.serial.parity = parity.parse()?;
        }
        if let Some(bits) = self.data_bits {
            if !(5..=8).contains(&bits) {
                return Err(TransportError::InvalidConfiguration(format!("data bits: {bits}")));
            }
            config.serial.data_bits = bits;
        }
        if let Some(stop) = &self.stop_bits {
            config.serial.stop_bits = stop.parse()?;
        }
        if let Some(ms) = self.timeout_ms {
            config.rtu.read_timeout_ms = ms;
            config.ascii.read_timeout_ms = ms;
            config.adam.read_timeout_ms = ms;
        }
        Ok(())
    }
}

/// Register/coil selection shared by read and poll
#[derive(Args, Debug)]
struct ReadArgs {
    /// Data table
    #[arg(value_enum)]
    table: Table,

    /// Slave address
    #[arg(short, long, default_value = "1")]
    slave: u8,

    /// Start address
    #[arg(short, long, default_value = "0")]
    address: u16,

    /// Number of registers or bits
    #[arg(short, long, default_value = "1")]
    count: u16,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts,

    /// Read once
    Read(ReadArgs),

    /// Read repeatedly
    Poll {
        #[command(flatten)]
        read: ReadArgs,

        /// Delay between cycles (ms)
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,

        /// Number of cycles (0 = until Ctrl+C)
        #[arg(short = 'n', long, default_value = "0")]
        cycles: u64,
    },

    /// Write a single holding register (0x06)
    WriteRegister {
        /// Slave address
        #[arg(short, long, default_value = "1")]
        slave: u8,

        /// Register address
        #[arg(short, long)]
        address: u16,

        /// Value to write
        #[arg(long, value_parser = parse_u16)]
        value: u16,
    },

    /// Write a single coil (0x05)
    WriteCoil {
        /// Slave address
        #[arg(short, long, default_value = "1")]
        slave: u8,

        /// Coil address
        #[arg(short, long)]
        address: u16,

        /// Switch the coil on (off when absent)
        #[arg(long)]
        on: bool,
    },

    /// Send a raw frame; the CRC is appended
    Raw {
        /// Frame bytes as hex, spaces allowed (e.g. "01 03 00 00 00 02")
        #[arg(long)]
        hex: String,
    },

    /// Send a line-terminated ASCII command
    Ascii {
        /// Command text, without terminator
        #[arg(short = 'c', long)]
        command: String,
    },

    /// ADAM-4055 DI/DO module
    Adam {
        /// Module address (overrides config)
        #[arg(short, long, value_parser = parse_u8)]
        module: Option<u8>,

        #[command(subcommand)]
        action: AdamAction,
    },
}

#[derive(Subcommand, Debug)]
enum AdamAction {
    /// Read inputs and outputs
    Status,
    /// Set all eight outputs
    SetOutputs {
        /// Output mask (decimal or 0x-prefixed hex)
        #[arg(value_parser = parse_u8)]
        value: u8,
    },
    /// Switch one output
    SetOutput {
        /// Output bit (0-7)
        #[arg(value_parser = clap::value_parser!(u8).range(0..8))]
        bit: u8,
        /// New state
        #[arg(value_enum)]
        state: Switch,
    },
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid value {s:?}: {e}"))
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let value = parse_u16(s)?;
    u8::try_from(value).map_err(|_| format!("value {s:?} out of range"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(&cli);

    let result = match run(&cli) {
        Ok(result) => result,
        Err(e) => CliResult::error(ExitCodes::ERROR, format!("{e:#}")),
    };

    if let Some(msg) = result.message() {
        if result.is_success() {
            if !cli.quiet {
                println!("{msg}");
            }
        } else {
            eprintln!("Error: {msg}");
        }
    }
    result.to_exit_code()
}

fn init_logging(cli: &Cli) -> Option<WorkerGuard> {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "rtupoll.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    guard
}

fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    match &cli.config {
        Some(path) => AppConfig::load(path),
        None => match AppConfig::default_path() {
            Ok(path) => AppConfig::load(&path),
            Err(ConfigError::NoConfigDir) => Ok(AppConfig::default()),
            Err(e) => Err(e),
        },
    }
}

fn run(cli: &Cli) -> anyhow::Result<CliResult> {
    if let Commands::ListPorts = cli.command {
        return show_ports(cli);
    }

    let mut config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => return Ok(CliResult::error(ExitCodes::CONFIG_ERROR, e.to_string())),
    };
    if let Err(e) = cli.line.apply(&mut config) {
        return Ok(CliResult::error(ExitCodes::CONFIG_ERROR, e.to_string()));
    }
    let format = OutputFormat::from(cli.format);

    match &cli.command {
        Commands::ListPorts => show_ports(cli),
        Commands::Read(args) => {
            let master = RtuMaster::new(config.serial.clone(), config.rtu);
            if let Some(failed) = open(master.bus()) {
                return Ok(failed);
            }
            Ok(report(&read(&master, args), args.table.view(args.count), format))
        }
        Commands::Poll {
            read: args,
            interval_ms,
            cycles,
        } => {
            let master = RtuMaster::new(config.serial.clone(), config.rtu);
            if let Some(failed) = open(master.bus()) {
                return Ok(failed);
            }
            poll(&master, args, Duration::from_millis(*interval_ms), *cycles, format)
        }
        Commands::WriteRegister { slave, address, value } => {
            let master = RtuMaster::new(config.serial.clone(), config.rtu);
            if let Some(failed) = open(master.bus()) {
                return Ok(failed);
            }
            let outcome = master.write_single_register(*slave, *address, *value);
            Ok(report(&outcome, DataView::Raw, format))
        }
        Commands::WriteCoil { slave, address, on } => {
            let master = RtuMaster::new(config.serial.clone(), config.rtu);
            if let Some(failed) = open(master.bus()) {
                return Ok(failed);
            }
            let outcome = master.write_single_coil(*slave, *address, *on);
            Ok(report(&outcome, DataView::Raw, format))
        }
        Commands::Raw { hex } => {
            let compact: String = hex.split_whitespace().collect();
            let mut bytes = ::hex::decode(&compact).with_context(|| format!("invalid hex frame {hex:?}"))?;
            if bytes.len() < 2 {
                anyhow::bail!("frame needs at least an address and a function code");
            }
            append_crc(&mut bytes);
            let master = RtuMaster::new(config.serial.clone(), config.rtu);
            if let Some(failed) = open(master.bus()) {
                return Ok(failed);
            }
            let outcome = master.send_and_receive(&Frame::from_raw(bytes));
            Ok(report(&outcome, DataView::Raw, format))
        }
        Commands::Ascii { command } => {
            let link = AsciiLink::new(config.serial.clone(), config.ascii.read_timeout(), &config.ascii.terminator);
            if let Some(failed) = open(link.bus()) {
                return Ok(failed);
            }
            let outcome = link.send_and_receive(command);
            let result = CliResult::from_ascii(&outcome);
            if result.is_success() || matches!(format, OutputFormat::Json) {
                println!("{}", format_ascii(&outcome, format));
            }
            Ok(result)
        }
        Commands::Adam { module, action } => {
            let address = module.unwrap_or(config.adam.address);
            let adam = Adam4055::new(config.serial.clone(), address, config.adam.read_timeout());
            if let Some(failed) = open(adam.bus()) {
                return Ok(failed);
            }
            let outcome = match action {
                AdamAction::Status => adam.status().map(|status| Some(format_status(&status, format))),
                AdamAction::SetOutputs { value } => adam.set_outputs(*value).map(|()| None),
                AdamAction::SetOutput { bit, state } => {
                    adam.set_output(*bit, matches!(state, Switch::On)).map(|()| None)
                }
            };
            match outcome {
                Ok(Some(text)) => {
                    println!("{text}");
                    Ok(CliResult::success())
                }
                Ok(None) => Ok(CliResult::success()),
                Err(e) => Ok(CliResult::from(&e)),
            }
        }
    }
}

/// Open the line, classifying a failure as a connection error
fn open(bus: &Bus) -> Option<CliResult> {
    match bus.open(false) {
        Ok(()) => None,
        Err(e) => Some(CliResult::error(ExitCodes::CONNECTION_FAILED, e.to_string())),
    }
}

fn read(master: &RtuMaster, args: &ReadArgs) -> Outcome {
    match args.table {
        Table::Coils => master.read_coils(args.slave, args.address, args.count),
        Table::Discrete => master.read_discrete_inputs(args.slave, args.address, args.count),
        Table::Holding => master.read_holding_registers(args.slave, args.address, args.count),
        Table::Input => master.read_input_registers(args.slave, args.address, args.count),
    }
}

fn report(outcome: &Outcome, view: DataView, format: OutputFormat) -> CliResult {
    let result = CliResult::from_outcome(outcome);
    if outcome.response().is_some() || matches!(format, OutputFormat::Json) {
        println!("{}", format_outcome(outcome, view, format));
    }
    result
}

fn poll(
    master: &RtuMaster,
    args: &ReadArgs,
    interval: Duration,
    cycles: u64,
    format: OutputFormat,
) -> anyhow::Result<CliResult> {
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    let view = args.table.view(args.count);
    let mut last;
    let mut cycle = 0u64;
    loop {
        cycle += 1;
        let outcome = read(master, args);
        tracing::debug!(cycle, success = outcome.is_success(), "Poll cycle");
        last = report(&outcome, view, format);
        if let Some(msg) = last.message() {
            eprintln!("cycle {cycle}: {msg}");
        }

        if cycles != 0 && cycle >= cycles {
            break;
        }
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                tracing::info!(cycle, "Polling stopped");
                break;
            }
        }
    }

    master.bus().close(true);
    Ok(last)
}

fn show_ports(cli: &Cli) -> anyhow::Result<CliResult> {
    let ports = match list_ports() {
        Ok(ports) => ports,
        Err(e) => return Ok(CliResult::from(&e)),
    };

    match cli.format {
        Format::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.port_name,
                        "type": format!("{:?}", p.port_type)
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if ports.is_empty() {
                if !cli.quiet {
                    println!("No serial ports found.");
                }
            } else {
                for port in &ports {
                    println!("{}", port.port_name);
                }
            }
        }
    }
    Ok(CliResult::success())
}
