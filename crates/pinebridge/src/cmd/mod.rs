use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use pine_session::SessionConfig;
use pine_transport::{ConnectionConfig, Resolver};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod mock;
pub mod probe;
pub mod request;
pub mod resolve;
pub mod targets;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one PINE request and print the answer.
    Request(RequestArgs),
    /// Check which emulators are reachable.
    Probe(ProbeArgs),
    /// List supported emulator targets.
    Targets(TargetsArgs),
    /// Show where a target's PINE endpoint lives.
    Resolve(ResolveArgs),
    /// Keep a supervised connection and print emulator status.
    Watch(WatchArgs),
    /// Run a stub emulator for local development.
    Mock(MockArgs),
    /// Show version information.
    Version(VersionArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Request(_) => "request",
            Command::Probe(_) => "probe",
            Command::Targets(_) => "targets",
            Command::Resolve(_) => "resolve",
            Command::Watch(_) => "watch",
            Command::Mock(_) => "mock",
            Command::Version(_) => "version",
        }
    }
}

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub format: OutputFormat,
    pub runtime_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl Context {
    pub fn resolver(&self) -> Resolver {
        let resolver = Resolver::from_env();
        match &self.runtime_dir {
            Some(dir) => resolver.with_runtime_dir(dir),
            None => resolver,
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            exchange_timeout: self.timeout,
            ..ConnectionConfig::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connection: self.connection_config(),
            resolver: self.resolver(),
            ..SessionConfig::default()
        }
    }
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Request(args) => request::run(args, ctx),
        Command::Probe(args) => probe::run(args, ctx),
        Command::Targets(args) => targets::run(args, ctx),
        Command::Resolve(args) => resolve::run(args, ctx),
        Command::Watch(args) => watch::run(args, ctx),
        Command::Mock(args) => mock::run(args, ctx),
        Command::Version(args) => version::run(args, ctx),
    }
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Operation name (read8..read64, write8..write64, version, savestate,
    /// loadstate, title, id, uuid, gameversion, status).
    pub operation: String,
    /// Request parameter as key=value (address, data, slot). Repeatable.
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,
    /// Talk to this target instead of probing pcsx2 then rpcs3.
    #[arg(long)]
    pub target: Option<String>,
    /// IPC slot for --target (0 = the target's default).
    #[arg(long, requires = "target")]
    pub slot: Option<u16>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Probe only this target.
    #[arg(long)]
    pub target: Option<String>,
    /// IPC slot for --target (0 = the target's default).
    #[arg(long, requires = "target")]
    pub slot: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub struct TargetsArgs {}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Target name.
    pub target: String,
    /// IPC slot (0 = the target's default).
    #[arg(long, default_value = "0")]
    pub slot: u16,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Status polling interval (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Pause between failed probe passes (e.g. 5s, 250ms).
    #[arg(long, default_value = "5s")]
    pub retry_interval: String,
    /// Exit after printing N status reports.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct MockArgs {
    /// Target to impersonate.
    pub target: String,
    /// IPC slot to listen on (0 = the target's default).
    #[arg(long, default_value = "0")]
    pub slot: u16,
    /// Answer every request with this result code.
    #[arg(long, value_name = "CODE")]
    pub result_code: Option<u8>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Run `on_interrupt` on Ctrl-C instead of terminating the process.
pub fn install_ctrlc_handler(on_interrupt: impl FnMut() + Send + 'static) -> CliResult<()> {
    ctrlc::set_handler(on_interrupt).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

fn parse_key_value(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got \"{input}\""))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in \"{input}\""));
    }
    Ok((key.trim().to_string(), value.trim().to_string()))
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
