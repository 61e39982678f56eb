use crate::domain::settings::LogSettings;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub struct LoggingGuard {
    // Keeps the file writer alive so buffered lines get flushed on exit
    _guards: Vec<WorkerGuard>,
}

static RAW_TERMINAL: AtomicBool = AtomicBool::new(false);

/// Tell the console layer whether the terminal is in raw mode, where a bare
/// `\n` moves down without returning to column 0.
pub fn set_raw_terminal(raw: bool) {
    RAW_TERMINAL.store(raw, Ordering::Relaxed);
}

/// Console writer that ends lines with `\r\n` while the terminal is raw.
struct ConsoleWriter<W> {
    inner: W,
    raw: bool,
}

fn console_writer() -> ConsoleWriter<io::Stderr> {
    ConsoleWriter {
        inner: io::stderr(),
        raw: RAW_TERMINAL.load(Ordering::Relaxed),
    }
}

impl<W: Write> Write for ConsoleWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.raw {
            return self.inner.write(buf);
        }
        let mut out = Vec::with_capacity(buf.len() + 4);
        let mut prev = 0u8;
        for &byte in buf {
            if byte == b'\n' && prev != b'\r' {
                out.push(b'\r');
            }
            out.push(byte);
            prev = byte;
        }
        self.inner.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn parse_rotation(rotation: &str) -> Rotation {
    match rotation.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

/// Build the filter. `RUST_LOG` wins, then the command line, then settings.
fn build_filter(settings: &LogSettings, level_override: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(level_override.unwrap_or(&settings.level)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_logger(
    settings: &LogSettings,
    level_override: Option<&str>,
) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();

    let level_filter = build_filter(settings, level_override);

    // Console layer. stdout is left to the terminal while raw mode is on.
    let console_layer = if settings.console_logging_enabled {
        Some(
            fmt::layer()
                .with_writer(console_writer)
                .with_file(settings.show_file_line)
                .with_line_number(settings.show_file_line)
                .with_thread_ids(settings.show_thread_ids)
                .with_target(settings.show_target)
                .with_ansi(settings.ansi_colors),
        )
    } else {
        None
    };

    // File layer
    let file_layer = if settings.file_logging_enabled {
        let file_appender = tracing_appender::rolling::RollingFileAppender::new(
            parse_rotation(&settings.rotation),
            &settings.log_dir,
            &settings.file_name_prefix,
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);
        Some(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_file(settings.show_file_line)
                .with_line_number(settings.show_file_line)
                .with_thread_ids(settings.show_thread_ids)
                .with_target(settings.show_target),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!("Logging initialized");

    Ok(LoggingGuard { _guards: guards })
}
