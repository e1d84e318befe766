mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::{parse_duration, Command, Context};
use crate::logging::{command_span, init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pinebridge", version, about = "Bridge to PINE-speaking emulators")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "PINEBRIDGE_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    /// Directory holding emulator sockets. Defaults to XDG_RUNTIME_DIR on
    /// Linux, TMPDIR on macOS, else /tmp.
    #[arg(long, value_name = "DIR", global = true)]
    runtime_dir: Option<PathBuf>,

    /// Deadline for one request/answer exchange (e.g. 15s, 500ms).
    #[arg(long, value_name = "DURATION", default_value = "15s", global = true)]
    timeout: String,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);
    let span = command_span(cli.command.name(), cli.runtime_dir.as_deref());
    let _entered = span.enter();

    let result = parse_duration(&cli.timeout).and_then(|timeout| {
        let ctx = Context {
            format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
            runtime_dir: cli.runtime_dir,
            timeout,
        };
        cmd::run(cli.command, &ctx)
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
