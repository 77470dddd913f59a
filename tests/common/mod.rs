#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadBuf};

use sigfox_modem_lib::{DriverConfig, ModemDriver};

pub type Received = Arc<Mutex<Vec<String>>>;

/// Short timeouts so tests do not wait on the modem defaults.
pub fn fast_config() -> DriverConfig {
    DriverConfig {
        ready_timeout_ms: 500,
        command_timeout_ms: 300,
        query_timeout_ms: 60,
        send_timeout_ms: 500,
        ..DriverConfig::default()
    }
}

/// Fake modem on the far end of a duplex pipe.
///
/// Every `\r`-terminated command is recorded and answered with the lines
/// `respond` returns (each sent verbatim, so include `\r\n`).
pub fn spawn_modem<F>(respond: F) -> (DuplexStream, Received)
where
    F: Fn(&str) -> Vec<String> + Send + 'static,
{
    let (host, device) = tokio::io::duplex(4096);
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    tokio::spawn(async move {
        let (rd, mut wr) = tokio::io::split(device);
        let mut reader = BufReader::new(rd);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\r', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let command = String::from_utf8_lossy(&buf).trim_end_matches('\r').to_string();
            log.lock().expect("received log").push(command.clone());
            for line in respond(&command) {
                if wr.write_all(line.as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    });

    (host, received)
}

pub fn reply(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| format!("{}\r\n", l)).collect()
}

/// Replies of a healthy modem
pub fn sigfox_replies(radio: &'static str) -> impl Fn(&str) -> Vec<String> + Send + 'static {
    move |command: &str| {
        match command {
            "AT" | "AT$RC" => reply(&["OK"]),
            "AT$GI?" => reply(&[radio]),
            "AT$T?" => reply(&["263"]),
            "AT$V?" => reply(&["3300", "3250"]),
            c if c.starts_with("AT$SF=") => reply(&["OK"]),
            c if c.starts_with("AT$I=") => {
                let info = format!("info-{}", &c[5..]);
                reply(&[info.as_str()])
            }
            _ => reply(&["ERROR"]),
        }
    }
}

pub fn driver_with(respond: impl Fn(&str) -> Vec<String> + Send + 'static) -> (ModemDriver, Received) {
    let (stream, received) = spawn_modem(respond);
    (ModemDriver::from_stream("mock", fast_config(), stream), received)
}

pub fn commands(received: &Received) -> Vec<String> {
    received.lock().expect("received log").clone()
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Stream whose reads work but whose every write fails, like a port that
/// was unplugged mid-session.
pub struct UnwritableStream {
    inner: DuplexStream,
}

impl AsyncRead for UnwritableStream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for UnwritableStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged")))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Host end that cannot be written to, plus the device end; keep the device
/// end alive or the reader sees end of stream.
pub fn unwritable_modem() -> (UnwritableStream, DuplexStream) {
    let (host, device) = tokio::io::duplex(1024);
    (UnwritableStream { inner: host }, device)
}
