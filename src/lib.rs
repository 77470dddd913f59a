//! AT-command driver for Sigfox radio modems.
//!
//! The [`serial`] module owns the port and runs command/response
//! transactions over it; [`modem`] builds the modem's queries and frame
//! transmission on top of those transactions.
pub mod config;
pub mod modem;
pub mod serial;

pub use config::DriverConfig;
pub use modem::{ModemDriver, ModemError};
