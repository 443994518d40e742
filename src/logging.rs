use std::fmt::Debug;
use std::io::Write;
use std::sync::Mutex;

/// Logging capability handed to the gateway and the pipeline.
///
/// `log` is for routine context (a request went out, a response came back),
/// `warn` for recoverable oddities, and `error` for failures that break the
/// operation in progress. Implementations must not fail or block.
pub trait Logger: Send + Sync {
    fn log(&self, message: &str, data: &dyn Debug);
    fn warn(&self, message: &str, data: &dyn Debug);
    fn error(&self, message: &str, data: &dyn Debug, error: &dyn std::error::Error);
}

/// Forwards to the `log` facade under the `satseg_client` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacade;

impl Logger for LogFacade {
    fn log(&self, message: &str, data: &dyn Debug) {
        log::info!(target: "satseg_client", "{} {:?}", message, data);
    }

    fn warn(&self, message: &str, data: &dyn Debug) {
        log::warn!(target: "satseg_client", "{} {:?}", message, data);
    }

    fn error(&self, message: &str, data: &dyn Debug, error: &dyn std::error::Error) {
        log::error!(target: "satseg_client", "{} {:?}: {}", message, data, error);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Log,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub data: String,
}

/// Keeps every entry in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.records().iter().filter(|r| r.level == level).count()
    }

    fn push(&self, level: LogLevel, message: &str, data: String) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                message: message.to_string(),
                data,
            });
        }
    }
}

impl Logger for MemoryLogger {
    fn log(&self, message: &str, data: &dyn Debug) {
        self.push(LogLevel::Log, message, format!("{:?}", data));
    }

    fn warn(&self, message: &str, data: &dyn Debug) {
        self.push(LogLevel::Warn, message, format!("{:?}", data));
    }

    fn error(&self, message: &str, data: &dyn Debug, error: &dyn std::error::Error) {
        self.push(LogLevel::Error, message, format!("{:?}: {}", data, error));
    }
}

/// Installs env_logger as the `log` backend. Safe to call more than once.
pub fn init_logging(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .try_init();
}
