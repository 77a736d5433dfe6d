//! Structured session events
//!
//! Success and error events from the strategy and the pipeline are emitted as
//! ordinary `tracing` events under the [`EVENT_TARGET`] target. An
//! [`EventLog`] supplies the JSON layer that appends them, one object per
//! line, to the session's `events.jsonl` once a session has opened it:
//!
//! ```text
//! {"timestamp":"...","level":"INFO","message":"Document handled","kind":"success","source":"strategy","url":"https://..."}
//! ```

use parking_lot::Mutex;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Target shared by every session event
pub const EVENT_TARGET: &str = "statewalk::events";

/// Records that `source` handled `url`
pub fn record_success(source: &'static str, url: &str, message: &str) {
    info!(target: EVENT_TARGET, kind = "success", source, url, "{}", message);
}

/// Records that `source` failed on `url`
pub fn record_error(source: &'static str, url: &str, message: &str, error: &dyn Display) {
    warn!(target: EVENT_TARGET, kind = "error", source, url, error = %error, "{}", message);
}

/// Destination of session events
///
/// Clones share the same file. Until [`EventLog::open`] is called, events
/// are discarded.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    file: Arc<Mutex<Option<File>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts appending events to `path`, creating it if needed
    pub fn open(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *self.file.lock() = Some(file);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.file.lock().is_some()
    }

    /// JSON lines layer that only sees [`EVENT_TARGET`] events
    pub fn layer<S>(&self) -> impl Layer<S> + Send + Sync + 'static
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_target(false)
            .with_writer(self.clone())
            .with_filter(Targets::new().with_target(EVENT_TARGET, Level::INFO))
    }
}

impl<'a> MakeWriter<'a> for EventLog {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Writer handed out per event by [`EventLog`]
pub struct EventWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for EventWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.lock().as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.lock().as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
