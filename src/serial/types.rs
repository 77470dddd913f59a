//! Response matching and command description types
use std::fmt;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pattern tested against a single received line
#[derive(Debug, Clone)]
pub enum ResponseMatcher {
    Contains(String),
    Prefix(String),
    Pattern(Regex),
}

impl ResponseMatcher {
    pub fn contains(text: impl Into<String>) -> Self {
        ResponseMatcher::Contains(text.into())
    }

    pub fn prefix(text: impl Into<String>) -> Self {
        ResponseMatcher::Prefix(text.into())
    }

    pub fn pattern(expr: &str) -> Result<Self, regex::Error> {
        Ok(ResponseMatcher::Pattern(Regex::new(expr)?))
    }

    pub fn matches(&self, line: &str) -> bool {
        match self {
            ResponseMatcher::Contains(s) => line.contains(s.as_str()),
            ResponseMatcher::Prefix(p) => line.starts_with(p.as_str()),
            ResponseMatcher::Pattern(re) => re.is_match(line),
        }
    }
}

impl fmt::Display for ResponseMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMatcher::Contains(s) => write!(f, "{}", s),
            ResponseMatcher::Prefix(p) => write!(f, "{}", p),
            ResponseMatcher::Pattern(re) => write!(f, "{}", re.as_str()),
        }
    }
}

/// How a single command is resolved.
///
/// `success: None` is fire-and-collect mode: only an error line ends the
/// transaction early, otherwise it runs to the timeout and returns whatever
/// was received.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub success: Option<ResponseMatcher>,
    pub error: ResponseMatcher,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn expect(success: ResponseMatcher, error: ResponseMatcher, timeout: Duration) -> Self {
        Self { success: Some(success), error, timeout }
    }

    pub fn collect(error: ResponseMatcher, timeout: Duration) -> Self {
        Self { success: None, error, timeout }
    }

    pub fn is_collect(&self) -> bool {
        self.success.is_none()
    }
}

/// Asynchronous notifications about the channel itself, independent of any
/// in-flight transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelEvent {
    Opened,
    Closed,
    Error(String),
    WriteFailed(String),
}
