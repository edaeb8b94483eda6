//! Logging infrastructure for flowkey
//!
//! Logs to ~/.flowkey/logs/ with daily files and 7-day cleanup.
//!
//! A thread-local context (provider, model) is prefixed to every line.
//! Nothing is written until `init` has been called.

use crate::storage;
use crate::util::truncate_str;
use chrono::Local;
use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

/// Thread-local logging context
#[derive(Default, Clone)]
pub struct LogContext {
    pub provider: Option<String>,
    pub model: Option<String>,
}

thread_local! {
    static LOG_CONTEXT: RefCell<LogContext> = RefCell::new(LogContext::default());
}

/// Update provider and model in the current context
pub fn set_provider_info(provider: &str, model: &str) {
    LOG_CONTEXT.with(|c| {
        let mut ctx = c.borrow_mut();
        ctx.provider = Some(provider.to_string());
        ctx.model = Some(model.to_string());
    });
}

fn context_prefix() -> String {
    LOG_CONTEXT.with(|c| context_prefix_for(&c.borrow()))
}

fn context_prefix_for(ctx: &LogContext) -> String {
    let mut parts = Vec::new();

    if let Some(ref provider) = ctx.provider {
        parts.push(format!("prv:{}", provider));
    }
    if let Some(ref model) = ctx.model {
        parts.push(format!("mod:{}", model));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("[{}] ", parts.join("|"))
    }
}

struct Logger {
    file: File,
}

impl Logger {
    fn new() -> Option<Self> {
        let log_dir = storage::logs_dir().ok()?;
        fs::create_dir_all(&log_dir).ok()?;

        let path = log_path()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()?;

        Some(Self { file })
    }

    fn write(&mut self, level: &str, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let ctx = context_prefix();
        let line = format!("[{}] [{}] {}{}\n", timestamp, level, ctx, message);
        let _ = self.file.write_all(line.as_bytes());
        let _ = self.file.flush();
    }
}

fn write(level: &str, message: &str) {
    if let Ok(mut guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_mut() {
            logger.write(level, message);
        }
    }
}

/// Initialize the logger (call once at startup)
pub fn init() {
    if let Ok(mut guard) = LOGGER.lock() {
        if guard.is_none() {
            *guard = Logger::new();
        }
    }
}

pub fn info(message: &str) {
    write("INFO", message);
}

pub fn error(message: &str) {
    write("ERROR", message);
}

pub fn warn(message: &str) {
    write("WARN", message);
}

/// Log a debug message (only if FLOWKEY_TRACE is set)
pub fn debug(message: &str) {
    if std::env::var("FLOWKEY_TRACE").is_ok() {
        write("DEBUG", message);
    }
}

/// Per-attempt diagnostic record from diagram generation
pub fn attempt(index: u32, max_attempts: u32, status: &str, detail: &str) {
    let msg = format!(
        "ATTEMPT[{}/{}] {} {}",
        index,
        max_attempts,
        status,
        truncate_str(detail, 300)
    );
    write("DIAGRAM", &msg);
}

/// Get path to today's log file
pub fn log_path() -> Option<PathBuf> {
    let log_dir = storage::logs_dir().ok()?;
    let date = Local::now().format("%Y-%m-%d");
    Some(log_dir.join(format!("flowkey-{}.log", date)))
}

/// Clean up old logs (keep last 7 days)
pub fn cleanup_old_logs() {
    let Ok(log_dir) = storage::logs_dir() else {
        return;
    };
    let Ok(entries) = fs::read_dir(&log_dir) else {
        return;
    };
    let cutoff = Local::now() - chrono::Duration::days(7);
    for entry in entries.flatten() {
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            let modified: chrono::DateTime<Local> = modified.into();
            if modified < cutoff {
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}
