use std::path::Path;

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing::Span;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Install the stderr subscriber. Stdout stays reserved for command output.
///
/// Thread names are kept so supervisor and stub-emulator events can be told
/// apart from the command thread.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

/// Root span for one CLI invocation.
///
/// `target` is filled in by the command once it knows which emulator it is
/// talking to.
pub fn command_span(command: &'static str, runtime_dir: Option<&Path>) -> Span {
    let span = tracing::info_span!(
        "pinebridge",
        command,
        runtime_dir = tracing::field::Empty,
        target = tracing::field::Empty,
    );
    if let Some(dir) = runtime_dir {
        span.record("runtime_dir", tracing::field::display(dir.display()));
    }
    span
}
