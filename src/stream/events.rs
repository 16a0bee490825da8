//! Capture notifications.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Emitted after a capture has been stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureEvent {
    /// Id assigned by the store.
    pub id: u64,
    /// Capture time as `%Y%m%d_%H%M%S`.
    pub timestamp: String,
    /// Rounded-up confidence.
    pub confidence: f64,
    /// Category label.
    #[serde(rename = "type")]
    pub category: String,
    /// `"lat, lng"` or `"Unknown"`.
    pub location: String,
}

/// Receiver of capture events.
pub trait NotificationSink {
    /// Deliver one event.
    fn notify(&mut self, event: &CaptureEvent) -> Result<()>;
}

/// Sink that logs events at info level.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&mut self, event: &CaptureEvent) -> Result<()> {
        info!(
            "Captured {} #{} ({:.2}) at {}",
            event.category, event.id, event.confidence, event.location
        );
        Ok(())
    }
}

/// Sink that writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Append events to the file at `path`.
    pub fn append_to(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> NotificationSink for JsonLinesSink<W> {
    fn notify(&mut self, event: &CaptureEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event).map_err(|e| Error::EventWrite { source: e })?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event() -> CaptureEvent {
        CaptureEvent {
            id: 4,
            timestamp: "20240309_070501".to_string(),
            confidence: 0.88,
            category: "pothole".to_string(),
            location: "Unknown".to_string(),
        }
    }

    #[test]
    fn test_json_lines_shape() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.notify(&event()).unwrap();
        sink.notify(&event()).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["id"], 4);
        assert_eq!(value["type"], "pothole");
        assert_eq!(value["timestamp"], "20240309_070501");
        assert_eq!(value["location"], "Unknown");
    }

    #[test]
    fn test_log_sink_accepts() {
        assert!(LogSink.notify(&event()).is_ok());
    }
}
