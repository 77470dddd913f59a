use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;

use super::catalog::{self, InfoCode, MAX_PAYLOAD_LEN};
use super::metadata::{self, ModuleMetadata};
use super::{ModemError, Result};
use crate::config::DriverConfig;
use crate::serial::{self, ChannelEvent, CommandSpec, SerialChannel, TransactionEngine};

/// `AT$GI?` reply, `"<x>,<y>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioInfo {
    pub x: i32,
    pub y: i32,
}

impl RadioInfo {
    pub fn parse(line: &str) -> Option<Self> {
        let (x, y) = line.split_once(',')?;
        Some(Self { x: x.trim().parse().ok()?, y: y.trim().parse().ok()? })
    }

    /// The modem needs `AT$RC` before the next frame
    pub fn needs_channel_reset(&self) -> bool {
        self.x == 0 || self.y < 3
    }
}

/// Binary frame payload parsed from user text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn from_hex(text: &str) -> Result<Self> {
        hex::decode(text.trim())
            .map(Payload)
            .map_err(|e| ModemError::Validation(format!("A buffer is required ({})", e)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// High-level driver for a Sigfox AT modem.
///
/// All calls go through a single [`TransactionEngine`]; calls are expected to
/// be awaited one after the other, and an overlapping call is rejected.
pub struct ModemDriver {
    config: DriverConfig,
    channel: Arc<SerialChannel>,
    engine: TransactionEngine,
}

impl ModemDriver {
    /// Open `port_name` in the background and return immediately.
    pub fn open(port_name: &str, config: DriverConfig) -> Result<Self> {
        if port_name.trim().is_empty() {
            return Err(ModemError::Validation("Portname is required!".to_string()));
        }
        let channel = SerialChannel::open(port_name, config.baud_rate, config.ready_timeout());
        Ok(Self::with_channel(channel, config))
    }

    /// Drive a modem reachable through any stream produced by `connector`.
    pub fn connect<F, S>(port_name: &str, config: DriverConfig, connector: F) -> Self
    where
        F: Future<Output = serial::Result<S>> + Send + 'static,
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let channel = SerialChannel::connect(port_name, config.ready_timeout(), connector);
        Self::with_channel(channel, config)
    }

    pub fn from_stream<S>(port_name: &str, config: DriverConfig, stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::connect(port_name, config, async move { Ok(stream) })
    }

    fn with_channel(channel: SerialChannel, config: DriverConfig) -> Self {
        let channel = Arc::new(channel);
        let engine = TransactionEngine::new(channel.clone(), config.wire_trace());
        Self { config, channel, engine }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn port_name(&self) -> &str {
        self.channel.port_name()
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Transport notifications (open, close, errors, failed writes)
    pub fn subscribe_events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.channel.subscribe_events()
    }

    pub async fn wait_port_ready(&self) -> Result<()> {
        Ok(self.channel.wait_ready(self.config.ready_timeout()).await?)
    }

    pub async fn send_command(&self, command: &str, spec: CommandSpec) -> Result<Vec<String>> {
        Ok(self.engine.send_command(command, spec).await?)
    }

    async fn query(&self, command: &str) -> Result<Vec<String>> {
        self.send_command(command, self.config.query_spec()).await
    }

    async fn query_first_line(&self, command: &str) -> Result<Option<String>> {
        Ok(self.query(command).await?.into_iter().next())
    }

    /// `AT` must answer with the success reply; returns the first line seen.
    pub async fn check_module_is_alive(&self) -> Result<String> {
        let history = self.send_command(catalog::CMD_ALIVE, self.config.command_spec()).await?;
        log::debug!("Module on {} is responding", self.port_name());
        history.into_iter().next().ok_or_else(|| ModemError::InvalidResponse {
            command: catalog::CMD_ALIVE.to_string(),
            response: None,
        })
    }

    pub async fn get_module_information(&self, code: InfoCode) -> Result<Option<String>> {
        self.query_first_line(&code.command()).await
    }

    pub async fn get_module_radio_information(&self) -> Result<RadioInfo> {
        let line = self.query_first_line(catalog::CMD_RADIO_INFO).await?;
        let info = line.as_deref().and_then(RadioInfo::parse).ok_or_else(|| ModemError::InvalidResponse {
            command: catalog::CMD_RADIO_INFO.to_string(),
            response: line.clone(),
        })?;
        log::debug!("radioInfo is {:?}", info);
        Ok(info)
    }

    pub async fn get_module_temperature(&self) -> Result<Option<String>> {
        self.query_first_line(catalog::CMD_TEMPERATURE).await
    }

    pub async fn get_module_voltages(&self) -> Result<Vec<String>> {
        self.query(catalog::CMD_VOLTAGES).await
    }

    /// Every information code, then temperature and voltages, in that order.
    pub async fn get_module_metadata(&self) -> Result<ModuleMetadata> {
        metadata::collect_metadata(self).await
    }

    /// Transmit one uplink frame of 1 to 12 bytes; returns the bytes sent.
    pub async fn send_bytes(&self, payload: &[u8]) -> Result<usize> {
        if payload.is_empty() {
            return Err(ModemError::Validation("Buffer minimum length is 1 byte".to_string()));
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ModemError::Validation(format!(
                "Buffer maximum length is {} bytes",
                MAX_PAYLOAD_LEN
            )));
        }

        let radio = self.get_module_radio_information().await?;
        if radio.needs_channel_reset() {
            log::info!("Resetting channel before send ({:?})", radio);
            self.send_command(catalog::CMD_RESET_CHANNEL, self.config.command_spec()).await?;
        }

        let command = catalog::send_frame_command(payload);
        self.send_command(&command, self.config.send_spec()).await?;
        log::info!("Sent {} byte frame on {}", payload.len(), self.port_name());
        Ok(payload.len())
    }

    /// Close the port. Consumes the driver, so it happens once.
    pub async fn close(self) -> Result<()> {
        Ok(self.channel.close().await?)
    }
}
