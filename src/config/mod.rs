//! Driver configuration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::serial::interface::{DEFAULT_BAUD_RATE, DEFAULT_READY_TIMEOUT};
use crate::serial::{CommandSpec, ResponseMatcher, WireTrace};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub baud_rate: u32,
    pub ready_timeout_ms: u64,
    /// Plain commands that must answer with the success reply
    pub command_timeout_ms: u64,
    /// Informational queries answered without a terminator
    pub query_timeout_ms: u64,
    /// `AT$SF` frame transmission
    pub send_timeout_ms: u64,
    pub success_reply: String,
    pub error_reply: String,
    pub trace_lines: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            ready_timeout_ms: DEFAULT_READY_TIMEOUT.as_millis() as u64,
            command_timeout_ms: 5000,
            query_timeout_ms: 250,
            send_timeout_ms: 10000,
            success_reply: "OK".to_string(),
            error_reply: "ERROR".to_string(),
            trace_lines: false,
        }
    }
}

impl DriverConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn wire_trace(&self) -> WireTrace {
        WireTrace::new(self.trace_lines)
    }

    pub fn success_matcher(&self) -> ResponseMatcher {
        ResponseMatcher::contains(self.success_reply.as_str())
    }

    pub fn error_matcher(&self) -> ResponseMatcher {
        ResponseMatcher::contains(self.error_reply.as_str())
    }

    pub fn command_spec(&self) -> CommandSpec {
        CommandSpec::expect(
            self.success_matcher(),
            self.error_matcher(),
            Duration::from_millis(self.command_timeout_ms),
        )
    }

    pub fn query_spec(&self) -> CommandSpec {
        CommandSpec::collect(self.error_matcher(), Duration::from_millis(self.query_timeout_ms))
    }

    pub fn send_spec(&self) -> CommandSpec {
        CommandSpec::expect(
            self.success_matcher(),
            self.error_matcher(),
            Duration::from_millis(self.send_timeout_ms),
        )
    }
}
