use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;

use super::reader::line_reader_task;
use super::types::ChannelEvent;
use super::{Result, SerialError};

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(2000);

const LINE_CAPACITY: usize = 256;
const EVENT_CAPACITY: usize = 32;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Owns the duplex stream to the modem.
///
/// The stream is opened asynchronously in a background task started at
/// construction. Readiness is tracked by a `watch` flag that flips to `true`
/// once the stream is open; received lines are fanned out over a `broadcast`
/// channel so a transaction can subscribe before its command is written.
pub struct SerialChannel {
    port_name: String,
    ready_timeout: Duration,
    ready_tx: Arc<watch::Sender<bool>>,
    writer: Arc<Mutex<Option<BoxedWriter>>>,
    lines_tx: broadcast::Sender<String>,
    events_tx: broadcast::Sender<ChannelEvent>,
    io_task: JoinHandle<()>,
}

impl SerialChannel {
    /// Open a real serial port (8N1, no flow control).
    pub fn open(port_name: &str, baud_rate: u32, ready_timeout: Duration) -> Self {
        let path = port_name.to_string();
        Self::connect(port_name, ready_timeout, async move {
            let port = tokio_serial::new(&path, baud_rate)
                .data_bits(tokio_serial::DataBits::Eight)
                .parity(tokio_serial::Parity::None)
                .stop_bits(tokio_serial::StopBits::One)
                .flow_control(tokio_serial::FlowControl::None)
                .open_native_async()?;
            Ok::<_, SerialError>(port)
        })
    }

    /// Build a channel around any stream produced by `connector`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect<F, S>(port_name: &str, ready_timeout: Duration, connector: F) -> Self
    where
        F: Future<Output = Result<S>> + Send + 'static,
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (ready_tx, _ready_rx) = watch::channel(false);
        let ready_tx = Arc::new(ready_tx);
        let writer: Arc<Mutex<Option<BoxedWriter>>> = Arc::new(Mutex::new(None));
        let (lines_tx, _lines_rx) = broadcast::channel(LINE_CAPACITY);
        let (events_tx, _events_rx) = broadcast::channel(EVENT_CAPACITY);

        let io_task = tokio::spawn(io_task(
            port_name.to_string(),
            connector,
            ready_tx.clone(),
            writer.clone(),
            lines_tx.clone(),
            events_tx.clone(),
        ));

        Self {
            port_name: port_name.to_string(),
            ready_timeout,
            ready_tx,
            writer,
            lines_tx,
            events_tx,
            io_task,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_open(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Register a line listener. Only lines arriving after this call are seen.
    pub fn subscribe_lines(&self) -> broadcast::Receiver<String> {
        self.lines_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events_tx.subscribe()
    }

    pub(crate) fn notify(&self, event: ChannelEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Wait for the port to open, giving up after `wait`.
    ///
    /// Each caller waits independently. A timeout leaves the channel untouched,
    /// so the port may still open later.
    pub async fn wait_ready(&self, wait: Duration) -> Result<()> {
        let mut ready_rx = self.ready_tx.subscribe();
        let opened = async { ready_rx.wait_for(|open| *open).await.map(|_| ()) };
        match timeout(wait, opened).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(SerialError::NotOpen),
            Err(_) => Err(SerialError::ReadyTimeout),
        }
    }

    /// Write `data` once the port is ready and wait until it has been flushed.
    pub async fn write_and_flush(&self, data: &[u8]) -> Result<()> {
        self.wait_ready(self.ready_timeout).await?;
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SerialError::NotOpen)?;
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Shut the stream down and stop the line reader.
    pub async fn close(&self) -> Result<()> {
        let writer = self.writer.lock().await.take();
        self.io_task.abort();
        let was_open = self.ready_tx.send_replace(false);
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                log::warn!("Error shutting down {}: {}", self.port_name, e);
            }
        }
        if was_open {
            log::info!("Port {} is now closed", self.port_name);
        }
        let _ = self.events_tx.send(ChannelEvent::Closed);
        Ok(())
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        self.io_task.abort();
    }
}

async fn io_task<F, S>(
    port_name: String,
    connector: F,
    ready_tx: Arc<watch::Sender<bool>>,
    writer: Arc<Mutex<Option<BoxedWriter>>>,
    lines_tx: broadcast::Sender<String>,
    events_tx: broadcast::Sender<ChannelEvent>,
) where
    F: Future<Output = Result<S>> + Send + 'static,
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let stream = match connector.await {
        Ok(stream) => stream,
        Err(e) => {
            let msg = format!("Cannot open {}: {}", port_name, e);
            log::error!("{}", msg);
            let _ = events_tx.send(ChannelEvent::Error(msg));
            return;
        }
    };

    let (read_half, write_half) = tokio::io::split(stream);
    *writer.lock().await = Some(Box::new(write_half));
    ready_tx.send_replace(true);
    log::info!("Port {} is now open", port_name);
    let _ = events_tx.send(ChannelEvent::Opened);

    line_reader_task(port_name.clone(), read_half, lines_tx, events_tx).await;

    // Unplugged or failed: writes must wait for a port that is open again.
    ready_tx.send_replace(false);
    writer.lock().await.take();
    log::info!("Port {} is no longer readable", port_name);
}
