pub mod catalog;
pub mod driver;
pub mod metadata;

pub use catalog::InfoCode;
pub use driver::{ModemDriver, Payload, RadioInfo};
pub use metadata::{MetadataField, MetadataValue, ModuleMetadata};

use crate::serial::{SerialError, TransactionError};

#[derive(Debug, thiserror::Error)]
pub enum ModemError {
    #[error("{0}")]
    Validation(String),

    #[error("Unexpected response to '{command}': {response:?}")]
    InvalidResponse { command: String, response: Option<String> },

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("Serial communication error: {0}")]
    Serial(#[from] SerialError),
}

impl ModemError {
    /// Readiness or transaction deadline exceeded
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ModemError::Transaction(TransactionError::Timeout { .. })
                | ModemError::Serial(SerialError::ReadyTimeout)
        )
    }
}

pub type Result<T> = std::result::Result<T, ModemError>;
