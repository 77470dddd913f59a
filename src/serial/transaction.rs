//! Command/response transaction engine
//!
//! A transaction writes one command and then resolves it from the lines that
//! follow: the first line matching the success pattern resolves it with the
//! full history, the first line matching the error pattern fails it, and the
//! timeout either fails it (a success pattern was required) or resolves it
//! with whatever arrived (fire-and-collect).
//!
//! Ordering protocol: the line listener is registered *before* the write is
//! launched, and the write is never awaited by the transaction. A fast modem
//! can answer before the flush completes, and those lines must not be lost.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;

use super::interface::SerialChannel;
use super::reader::strip_line_endings;
use super::types::{ChannelEvent, CommandSpec};

pub const WIRE_TARGET: &str = "sigfox_modem::wire";

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Command '{command}' timeout after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Received ({pattern})")]
    DeviceError { pattern: String, history: Vec<String> },

    #[error("Command '{pending}' still in flight")]
    Busy { pending: String },
}

pub type Result<T> = std::result::Result<T, TransactionError>;

/// Trace of every command sent and line received, logged under
/// [`WIRE_TARGET`] when enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireTrace {
    enabled: bool,
}

impl WireTrace {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn sent(&self, command: &str) {
        if self.enabled {
            log::info!(target: WIRE_TARGET, "Sending {}", command);
        }
    }

    fn received(&self, line: &str) {
        if self.enabled {
            log::info!(target: WIRE_TARGET, "Received => '{}'", line);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

/// Per-transaction state: the history and the settled flag.
#[derive(Debug)]
pub struct Transaction {
    command: String,
    spec: CommandSpec,
    history: Vec<String>,
    outcome: Option<Outcome>,
}

impl Transaction {
    pub fn new(command: &str, spec: CommandSpec) -> Self {
        Self { command: command.to_string(), spec, history: Vec::new(), outcome: None }
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn is_settled(&self) -> bool {
        self.outcome.is_some()
    }

    /// Record a line and test it. Returns the outcome the first time one is
    /// reached; once settled, further lines change nothing.
    pub fn on_line(&mut self, raw: &str) -> Option<Outcome> {
        if self.outcome.is_some() {
            return None;
        }
        let line = strip_line_endings(raw);
        let outcome = match &self.spec.success {
            Some(success) if success.matches(&line) => Some(Outcome::Success),
            _ if self.spec.error.matches(&line) => Some(Outcome::Error),
            _ => None,
        };
        self.history.push(line);
        self.outcome = outcome;
        outcome
    }

    /// Settle from a matched outcome.
    pub fn finish(self, outcome: Outcome) -> Result<Vec<String>> {
        match outcome {
            Outcome::Success => Ok(self.history),
            Outcome::Error => Err(TransactionError::DeviceError {
                pattern: self.spec.error.to_string(),
                history: self.history,
            }),
        }
    }

    /// Settle because the deadline passed without an outcome.
    pub fn expire(self) -> Result<Vec<String>> {
        if self.spec.is_collect() {
            return Ok(self.history);
        }
        if self.history.is_empty() {
            log::warn!("Command '{}' timeout after {:?}; no lines received", self.command, self.spec.timeout);
        } else {
            log::warn!(
                "Command '{}' timeout after {:?}; partial lines: {:?}",
                self.command,
                self.spec.timeout,
                self.history
            );
        }
        Err(TransactionError::Timeout { command: self.command, timeout: self.spec.timeout })
    }
}

/// Drive `lines` through a transaction without any I/O; a transaction still
/// open after the last line is expired.
pub fn drive_lines(lines: &[&str], spec: CommandSpec) -> Result<Vec<String>> {
    let mut tx = Transaction::new("TEST", spec);
    for line in lines {
        if let Some(outcome) = tx.on_line(line) {
            return tx.finish(outcome);
        }
    }
    tx.expire()
}

/// Idle/busy flag. Only one transaction may listen at a time.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct TransactionEngine {
    channel: Arc<SerialChannel>,
    trace: WireTrace,
    busy: AtomicBool,
    pending: std::sync::Mutex<String>,
}

impl TransactionEngine {
    pub fn new(channel: Arc<SerialChannel>, trace: WireTrace) -> Self {
        Self {
            channel,
            trace,
            busy: AtomicBool::new(false),
            pending: std::sync::Mutex::new(String::new()),
        }
    }

    /// Send `command` (terminated by `\r`) and resolve it according to `spec`.
    ///
    /// Fails with [`TransactionError::Busy`] if another transaction is still
    /// listening. A failed write is reported through the channel events and
    /// the log; the transaction itself then ends by its timeout.
    pub async fn send_command(&self, command: &str, spec: CommandSpec) -> Result<Vec<String>> {
        let _guard = match BusyGuard::acquire(&self.busy) {
            Some(guard) => guard,
            None => {
                let pending = self.pending.lock().map(|p| p.clone()).unwrap_or_default();
                return Err(TransactionError::Busy { pending });
            }
        };
        if let Ok(mut pending) = self.pending.lock() {
            *pending = command.to_string();
        }

        // Listener first, then the write.
        let mut lines_rx = self.channel.subscribe_lines();
        self.fire_write(command);

        let started = Instant::now();
        let deadline = sleep(spec.timeout);
        tokio::pin!(deadline);
        let mut tx = Transaction::new(command, spec);
        let mut source_closed = false;

        loop {
            tokio::select! {
                biased;
                received = lines_rx.recv(), if !source_closed => {
                    match received {
                        Ok(line) => {
                            self.trace.received(&line);
                            if let Some(outcome) = tx.on_line(&line) {
                                log::debug!("Command '{}' settled {:?} after {:?}", command, outcome, started.elapsed());
                                return tx.finish(outcome);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            log::warn!("Command '{}' missed {} lines", command, skipped);
                        }
                        // The line source is gone; the timeout still decides.
                        Err(RecvError::Closed) => source_closed = true,
                    }
                }
                _ = &mut deadline => return tx.expire(),
            }
        }
    }

    fn fire_write(&self, command: &str) {
        self.trace.sent(command);
        let channel = self.channel.clone();
        let payload = format!("{}\r", command);
        let command = command.to_string();
        tokio::spawn(async move {
            if let Err(e) = channel.write_and_flush(payload.as_bytes()).await {
                let msg = format!("Write of '{}' failed: {}", command, e);
                log::error!("{}", msg);
                channel.notify(ChannelEvent::WriteFailed(msg));
            }
        });
    }
}
