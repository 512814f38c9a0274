// src/logging.rs
// Process-wide logger setup for the tagbot binary. The control core only uses
// the `log` macros; this module picks the level and sink once at startup.

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Environment variable that can override the configured filter (env_logger syntax)
pub const LOG_ENV: &str = "TAGBOT_LOG";

/// Log verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Nothing is logged
    Off,
    /// Failures only
    Error,
    /// Failures and recoverable trouble
    Warn,
    /// State transitions, shots and hits
    #[default]
    Info,
    /// Per-cycle decisions
    Debug,
    /// Everything
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default verbosity; `TAGBOT_LOG` overrides it
    pub level: LogLevel,
    /// Also write records to this file, next to stderr
    pub log_file: Option<PathBuf>,
}

/// Copies every formatted record to the console and to a second sink
struct TeeWriter<W: Write> {
    console: io::Stderr,
    file: W,
}

impl<W: Write> Write for TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.console.write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.console.flush()?;
        self.file.flush()
    }
}

/// Formats a record as `SSSSS.mmm    LEVEL: [target] message`, time counted from logger start
fn write_record(
    buf: &mut impl Write,
    elapsed_secs: f64,
    record: &log::Record,
) -> io::Result<()> {
    writeln!(
        buf,
        "{:09.3} {:>8}: [{}] {}",
        elapsed_secs,
        record.level(),
        record.target(),
        record.args()
    )
}

/// Installs the global logger. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> io::Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(config.level.into());
    builder.parse_env(LOG_ENV);

    let started = Instant::now();
    builder.format(move |buf, record| {
        write_record(buf, started.elapsed().as_secs_f64(), record)
    });

    if let Some(path) = &config.log_file {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(TeeWriter {
            console: io::stderr(),
            file,
        })));
    }

    builder
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    log::debug!("Logging at level {:?}", config.level);
    if let Some(path) = &config.log_file {
        log::debug!("Logging to stderr and {}", path.display());
    }
    Ok(())
}
