use std::io::Write;
use std::sync::Mutex;

use crate::alerting::domain::alert_sink::{AlertSink, SinkError};

/// Rings the terminal bell (ASCII BEL) on the given writer.
///
/// Works anywhere a terminal is attached, so it is the fallback when no
/// sound player is installed.
pub struct TerminalBellSink<W: Write + Send> {
    out: Mutex<W>,
}

impl TerminalBellSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> TerminalBellSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> AlertSink for TerminalBellSink<W> {
    fn name(&self) -> &str {
        "bell"
    }

    fn fire(&self) -> Result<(), SinkError> {
        let mut out = self
            .out
            .lock()
            .map_err(|e| SinkError::Unavailable(format!("Lock poisoned: {e}")))?;
        out.write_all(b"\x07")?;
        out.flush()?;
        Ok(())
    }
}
