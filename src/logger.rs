use std::fs::{File, create_dir_all};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Log event types that determine which receivers should log the message
/// Ordered from the most detailed to the most aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogEvent {
    /// One line per serving record appended to the ledger
    Ledger,
    /// One line per match request outcome (served or the no-match reason)
    Allocation,
    /// Registration of entities, budget credits, strategy and constraint installation
    Registry,
    /// Scenario narration from the host
    Scenario,
    /// Validation results (pass/fail messages, validation checks)
    Validation,
}

impl LogEvent {
    const ALL: [LogEvent; 5] = [
        LogEvent::Ledger,
        LogEvent::Allocation,
        LogEvent::Registry,
        LogEvent::Scenario,
        LogEvent::Validation,
    ];

    /// This event and every coarser one
    fn and_coarser(self) -> impl Iterator<Item = LogEvent> {
        Self::ALL.into_iter().filter(move |evt| *evt >= self)
    }
}

/// Trait for log receivers that can receive log messages
/// Receivers are `Send` so a logger can be shared between request threads behind a lock
pub trait LogReceiver: Send {
    /// Check if this receiver should handle the given log event
    fn should_log(&self, event: LogEvent) -> bool;

    /// Write a string to this receiver
    fn write(&mut self, s: &str) -> io::Result<()>;

    /// Flush this receiver
    fn flush(&mut self) -> io::Result<()>;
}

/// Console log receiver (writes to stdout)
pub struct ConsoleReceiver {
    enabled_events: Vec<LogEvent>,
}

impl ConsoleReceiver {
    /// Returns a boxed receiver ready to be added to a logger
    pub fn new(enabled_events: Vec<LogEvent>) -> Box<dyn LogReceiver> {
        Box::new(Self { enabled_events })
    }
}

impl LogReceiver for ConsoleReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(s.as_bytes())?;
        stdout.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// File log receiver (writes to a file)
pub struct FileReceiver {
    file: File,
    enabled_events: Vec<LogEvent>,
}

impl FileReceiver {
    /// Create a receiver writing to `path`, truncating an existing file and creating parent directories
    pub fn new(path: &Path, enabled_events: Vec<LogEvent>) -> io::Result<Box<dyn LogReceiver>> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Box::new(Self { file, enabled_events }))
    }
}

impl LogReceiver for FileReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        write!(self.file, "{}", s)?;
        self.file.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Receiver that keeps everything in memory, used by tests and by scenarios that inspect their own output
pub struct MemoryReceiver {
    enabled_events: Vec<LogEvent>,
    lines: std::sync::Arc<parking_lot::Mutex<Vec<String>>>,
}

impl MemoryReceiver {
    /// Returns the receiver together with a handle to the captured lines
    pub fn new(enabled_events: Vec<LogEvent>) -> (Box<dyn LogReceiver>, std::sync::Arc<parking_lot::Mutex<Vec<String>>>) {
        let lines = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        (Box::new(Self { enabled_events, lines: lines.clone() }), lines)
    }
}

impl LogReceiver for MemoryReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        self.lines.lock().push(s.trim_end_matches('\n').to_string());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Unique identifier for a receiver
pub type ReceiverId = usize;

static RECEIVER_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Main logger that manages multiple receivers
pub struct Logger {
    receivers: Vec<(ReceiverId, Box<dyn LogReceiver>)>,
}

impl Logger {
    /// Create a new logger with no receivers
    pub fn new() -> Self {
        Self {
            receivers: Vec::new(),
        }
    }

    /// Add a receiver to the logger and return its unique ID
    pub fn add_receiver(&mut self, receiver: Box<dyn LogReceiver>) -> ReceiverId {
        let id = RECEIVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.receivers.push((id, receiver));
        id
    }

    /// Remove a receiver by its ID
    pub fn remove_receiver(&mut self, id: ReceiverId) {
        self.receivers.retain(|(receiver_id, _)| *receiver_id != id);
    }

    /// True when at least one receiver listens to `event`
    /// Lets hot paths skip formatting when nobody is listening
    pub fn is_enabled(&self, event: LogEvent) -> bool {
        self.receivers.iter().any(|(_, receiver)| receiver.should_log(event))
    }

    /// True when an `errln`/`warnln` for `event` would reach at least one receiver
    pub fn is_warning_enabled(&self, event: LogEvent) -> bool {
        event.and_coarser().any(|evt| self.is_enabled(evt))
    }

    /// Write a message with a specific log event type
    pub fn log(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            if receiver.should_log(event) {
                receiver.write(message)?;
            }
        }
        Ok(())
    }

    /// Write a message with newline
    pub fn logln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log(event, &format!("{}\n", message))
    }

    /// Write a prefixed line to every receiver listening to `event` or any coarser event
    /// Each receiver receives the message only once
    fn log_with_prefix(&mut self, event: LogEvent, prefix: &str, message: &str) -> io::Result<()> {
        let formatted_message = format!("{} {}\n", prefix, message);
        for (_, receiver) in &mut self.receivers {
            if event.and_coarser().any(|evt| receiver.should_log(evt)) {
                receiver.write(&formatted_message)?;
            }
        }
        Ok(())
    }

    /// Error line, propagated upward: Ledger -> Allocation -> Registry -> Scenario -> Validation
    pub fn errln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_with_prefix(event, "ERROR", message)
    }

    /// Warning line, propagated upward like `errln`
    pub fn warnln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_with_prefix(event, "WARNING", message)
    }

    /// Flush all receivers
    pub fn flush(&mut self) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            receiver.flush()?;
        }
        Ok(())
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitize a string to be used as a filename
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Macro to log a formatted string (like println! but for logger)
#[macro_export]
macro_rules! logln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.logln($event, &format!($($arg)*));
        }
    };
}

/// Macro to log a formatted string without newline (like print! but for logger)
#[macro_export]
macro_rules! log {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.log($event, &format!($($arg)*));
        }
    };
}

/// Error line to the event and every coarser event
#[macro_export]
macro_rules! errln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.errln($event, &format!($($arg)*));
        }
    };
}

/// Warning line to the event and every coarser event
#[macro_export]
macro_rules! warnln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.warnln($event, &format!($($arg)*));
        }
    };
}
