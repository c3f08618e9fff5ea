/*
================================================================================
                            LeafScope Logging
================================================================================

Console logging goes through the `log` facade with an `env_logger` backend.
Every record from this crate is also kept in a ring buffer of the last
MAX_LOG_LINES lines so that it can be exported (`--export-logs`) or dumped
next to a panic report.

Log levels:
- RUST_LOG set: used as is
- Debug builds: DEBUG and above for the leafscope target
- Release builds: ERROR only

Files (under dirs::data_dir()/leafscope/logs):
- debug.log: exported ring buffer
- panic.log: panic message, backtrace and the buffered lines

================================================================================
*/

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use env_logger::fmt::{Color, Formatter};
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;

const LOG_TARGET: &str = "leafscope";
const MAX_LOG_LINES: usize = 1000;

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

static SHARED_LOG_BUFFER: Lazy<LogBuffer> = Lazy::new(|| {
    Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LOG_LINES)))
});

/// Buffer shared by the logger, the panic hook and the exporter
pub fn shared_log_buffer() -> LogBuffer {
    Arc::clone(&SHARED_LOG_BUFFER)
}

struct BufferLogger {
    log_buffer: LogBuffer,
}

impl BufferLogger {
    fn push(&self, line: String) {
        if let Ok(mut buffer) = self.log_buffer.lock() {
            if buffer.len() == MAX_LOG_LINES {
                buffer.pop_front();
            }
            buffer.push_back(line);
        }
    }
}

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with(LOG_TARGET) && metadata.level() <= LevelFilter::Debug
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");
        let line = match record.line() {
            Some(line) => format!("{timestamp} {:<5} {}:{line} {}", record.level(), record.target(), record.args()),
            None => format!("{timestamp} {:<5} {} {}", record.level(), record.target(), record.args()),
        };
        self.push(line);
    }

    fn flush(&self) {}
}

struct CompositeLogger {
    console_logger: env_logger::Logger,
    buffer_logger: BufferLogger,
}

impl log::Log for CompositeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console_logger.enabled(metadata) || self.buffer_logger.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console_logger.enabled(record.metadata()) {
            self.console_logger.log(record);
        }
        if self.buffer_logger.enabled(record.metadata()) {
            self.buffer_logger.log(record);
        }
    }

    fn flush(&self) {
        self.console_logger.flush();
        self.buffer_logger.flush();
    }
}

/// Install the console + buffer logger. `verbose` forces debug output.
pub fn setup_logger(verbose: bool) -> LogBuffer {
    let shared_buffer = shared_log_buffer();
    let mut builder = env_logger::Builder::new();

    // Filter out all other crates' logs unless RUST_LOG says otherwise
    builder.filter(None, LevelFilter::Off);

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else if verbose || cfg!(debug_assertions) {
        builder.filter(Some(LOG_TARGET), LevelFilter::Debug);
    } else {
        builder.filter(Some(LOG_TARGET), LevelFilter::Error);
    }

    builder.format(|buf: &mut Formatter, record: &Record| {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let module_info = match (record.module_path(), record.line()) {
            (Some(module), Some(line)) => format!("{module}:{line}"),
            (Some(module), None) => module.to_string(),
            (None, Some(line)) => format!("line:{line}"),
            (None, None) => "unknown".to_string(),
        };

        let mut level_style = buf.style();
        let mut meta_style = buf.style();

        match record.level() {
            Level::Error => level_style.set_color(Color::Red).set_bold(true),
            Level::Warn => level_style.set_color(Color::Yellow).set_bold(true),
            Level::Info => level_style.set_color(Color::Green).set_bold(true),
            Level::Debug => level_style.set_color(Color::Blue).set_bold(true),
            Level::Trace => level_style.set_color(Color::White),
        };

        // Color::Rgb does not render on the macOS terminal
        #[cfg(target_os = "macos")]
        meta_style.set_color(Color::Blue);
        #[cfg(not(target_os = "macos"))]
        meta_style.set_color(Color::Rgb(120, 120, 120));

        writeln!(
            buf,
            "{} {} {} {}",
            meta_style.value(timestamp),
            level_style.value(record.level()),
            meta_style.value(module_info),
            record.args()
        )
    });

    let composite_logger = CompositeLogger {
        console_logger: builder.build(),
        buffer_logger: BufferLogger {
            log_buffer: Arc::clone(&shared_buffer),
        },
    };

    if log::set_boxed_logger(Box::new(composite_logger)).is_ok() {
        // Always Trace so both sinks can apply their own filters
        log::set_max_level(LevelFilter::Trace);
    } else {
        eprintln!("Logger already initialized");
    }

    shared_buffer
}

pub fn get_log_directory(app_name: &str) -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(app_name).join("logs")
}

/// Write the buffered log lines to `<log dir>/debug.log`
pub fn export_debug_logs(app_name: &str, log_buffer: &LogBuffer) -> Result<PathBuf, std::io::Error> {
    let log_dir = get_log_directory(app_name);
    export_debug_logs_to(&log_dir, log_buffer)
}

fn export_debug_logs_to(log_dir: &std::path::Path, log_buffer: &LogBuffer) -> Result<PathBuf, std::io::Error> {
    std::fs::create_dir_all(log_dir)?;
    let path = log_dir.join("debug.log");
    let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&path)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");
    writeln!(file, "{timestamp} [DEBUG EXPORT] leafscope {}", crate::build_info::BuildInfo::display_version())?;

    let lines: Vec<String> = log_buffer
        .lock()
        .map(|buffer| buffer.iter().cloned().collect())
        .unwrap_or_default();
    writeln!(file, "{timestamp} [DEBUG EXPORT] {} buffered entries", lines.len())?;
    for line in lines {
        writeln!(file, "{line}")?;
    }

    Ok(path)
}

/// Write panics with a backtrace and the buffered log lines to `panic.log`
pub fn setup_panic_hook(app_name: &str, log_buffer: LogBuffer) {
    let log_file_path = get_log_directory(app_name).join("panic.log");

    panic::set_hook(Box::new(move |info| {
        let backtrace = backtrace::Backtrace::new();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        let header_msg = format!("[PANIC] at {location} - {info}");
        let backtrace_lines: Vec<String> = format!("{backtrace:?}")
            .lines()
            .map(|line| format!("[BACKTRACE] {}", line.trim()))
            .collect();

        eprintln!("\n{header_msg}");
        for line in &backtrace_lines {
            eprintln!("{line}");
        }

        let written = (|| -> std::io::Result<()> {
            if let Some(parent) = log_file_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&log_file_path)?;

            writeln!(file, "{timestamp} {header_msg}")?;
            for line in &backtrace_lines {
                writeln!(file, "{timestamp} {line}")?;
            }
            writeln!(file)?;
            writeln!(file, "{timestamp} [PANIC] Last {MAX_LOG_LINES} log entries:")?;
            if let Ok(buffer) = log_buffer.lock() {
                for log in buffer.iter() {
                    writeln!(file, "{log}")?;
                }
            }
            Ok(())
        })();

        match written {
            Ok(()) => eprintln!("\nA complete crash log has been written to: {}", log_file_path.display()),
            Err(e) => eprintln!("\nFailed to write crash log {}: {}", log_file_path.display(), e),
        }
    }));
}
