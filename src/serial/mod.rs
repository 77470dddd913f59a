pub mod interface;
pub mod reader;
pub mod transaction;
pub mod types;

pub use interface::SerialChannel;
pub use transaction::{TransactionEngine, TransactionError, WireTrace};
pub use types::{ChannelEvent, CommandSpec, ResponseMatcher};

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Port not open")]
    NotOpen,

    #[error("port ready timeout")]
    ReadyTimeout,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] tokio_serial::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;
