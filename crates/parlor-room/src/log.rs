//! The shared results log.
//!
//! Game modules append one line per finished game. The sink is shared by
//! every room (the registry clones it into each), append-only, and best
//! effort — a failing log never takes a game down with it.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

/// Cloneable handle to the append-only results sink.
#[derive(Clone)]
pub struct ResultsLog {
    sink: Option<Arc<Mutex<Box<dyn Write + Send>>>>,
}

impl ResultsLog {
    /// Opens (creating if needed) an append-mode log file.
    pub fn to_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::to_writer(file))
    }

    /// Logs into an arbitrary writer. Tests use an in-memory buffer.
    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Some(Arc::new(Mutex::new(Box::new(writer)))),
        }
    }

    /// A log that swallows everything.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Appends one line (terminator added here) and flushes.
    pub fn append(&self, line: &str) {
        let Some(sink) = &self.sink else { return };
        let mut sink = sink.lock();
        if let Err(e) = writeln!(sink, "{line}").and_then(|()| sink.flush()) {
            tracing::warn!(error = %e, "results log write failed");
        }
    }
}

impl Default for ResultsLog {
    fn default() -> Self {
        Self::disabled()
    }
}
