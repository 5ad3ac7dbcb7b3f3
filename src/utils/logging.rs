use chrono::Local;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Maximum number of log entries to keep in memory
const MAX_LOG_ENTRIES: usize = 1000;

/// A log entry with timestamp and message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, target: &str, message: String) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S.%3f").to_string(),
            level: level.to_string().to_uppercase(),
            target: target.to_string(),
            message,
        }
    }

    /// Format for display in a debug panel
    pub fn format_for_display(&self) -> String {
        format!(
            "[{}] {} [{}] {}",
            self.timestamp, self.level, self.target, self.message
        )
    }
}

/// Thread-safe ring buffer for log entries
#[derive(Clone)]
pub struct LogRingBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl LogRingBuffer {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LOG_ENTRIES))),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= MAX_LOG_ENTRIES {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    pub fn get_recent(&self, count: usize) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().rev().take(count).rev().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Entries whose target matches, oldest first
    pub fn entries_for_target(&self, target: &str) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries
                .iter()
                .filter(|e| e.target == target)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a compact-formatted line ("LEVEL target: message") into its parts
fn parse_compact_line(message: &str) -> (Level, &str, &str) {
    let (level, rest) = if let Some(rest) = message.strip_prefix("TRACE ") {
        (Level::TRACE, rest)
    } else if let Some(rest) = message.strip_prefix("DEBUG ") {
        (Level::DEBUG, rest)
    } else if let Some(rest) = message.strip_prefix("INFO ") {
        (Level::INFO, rest)
    } else if let Some(rest) = message.strip_prefix("WARN ") {
        (Level::WARN, rest)
    } else if let Some(rest) = message.strip_prefix("ERROR ") {
        (Level::ERROR, rest)
    } else {
        return (Level::INFO, "general", message);
    };

    let rest = rest.trim_start();
    match rest.find(':') {
        // A target never contains spaces
        Some(colon_pos) if !rest[..colon_pos].contains(' ') => {
            (level, &rest[..colon_pos], rest[colon_pos + 1..].trim())
        }
        _ => (level, "general", rest),
    }
}

/// Custom writer that captures formatted tracing output into the ring buffer
#[derive(Clone)]
pub struct RingBufferWriter {
    buffer: LogRingBuffer,
}

impl RingBufferWriter {
    pub fn new(buffer: LogRingBuffer) -> Self {
        Self { buffer }
    }
}

impl std::io::Write for RingBufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(message) = std::str::from_utf8(buf) {
            let message = message.trim();
            if !message.is_empty() {
                let (level, target, msg) = parse_compact_line(message);
                self.buffer
                    .push(LogEntry::new(level, target, msg.to_string()));
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RingBufferWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Global log buffer, set once by `init_tracing`
static LOG_BUFFER: OnceLock<LogRingBuffer> = OnceLock::new();

/// Get the global log buffer, if tracing was initialized through this module
pub fn get_log_buffer() -> Option<LogRingBuffer> {
    LOG_BUFFER.get().cloned()
}

/// Initialize tracing with the ring buffer writer.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this twice
/// keeps the first subscriber and returns the same buffer.
pub fn init_tracing() -> LogRingBuffer {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    if let Some(existing) = LOG_BUFFER.get() {
        return existing.clone();
    }

    let buffer = LOG_BUFFER.get_or_init(LogRingBuffer::new).clone();
    let writer = RingBufferWriter::new(buffer.clone());

    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .without_time()
        .compact();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!(target: "engine", "Tracing initialized");
    }

    buffer
}

/// Log a pipeline request with its sequence number and trigger
#[macro_export]
macro_rules! trace_request {
    ($seq:expr, $reason:expr) => {
        tracing::debug!(target: "pipeline", "Request #{} issued ({})", $seq, $reason);
    };
}

/// Log a selection mutation with the resulting selection size
#[macro_export]
macro_rules! trace_selection {
    ($op:expr, $count:expr) => {
        tracing::debug!(target: "selection", "{} -> {} selected", $op, $count);
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ring_buffer_caps_entries() {
        let buffer = LogRingBuffer::new();
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            buffer.push(LogEntry::new(Level::INFO, "test", format!("entry {}", i)));
        }
        assert_eq!(buffer.len(), MAX_LOG_ENTRIES);
        let recent = buffer.get_recent(1);
        assert_eq!(recent[0].message, format!("entry {}", MAX_LOG_ENTRIES + 9));
    }

    #[test]
    fn test_writer_parses_compact_format() {
        let buffer = LogRingBuffer::new();
        let mut writer = RingBufferWriter::new(buffer.clone());
        writer
            .write_all(b" WARN pipeline: worker unavailable, computing inline\n")
            .unwrap();
        writer.write_all(b"plain line without level").unwrap();

        let entries = buffer.get_recent(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, "WARN");
        assert_eq!(entries[0].target, "pipeline");
        assert_eq!(entries[0].message, "worker unavailable, computing inline");
        assert_eq!(entries[1].target, "general");
        assert_eq!(buffer.entries_for_target("pipeline").len(), 1);
    }
}
