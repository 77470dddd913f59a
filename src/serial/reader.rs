//! Line source: splits the raw byte stream into text lines and broadcasts them
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;

use super::types::ChannelEvent;

/// Longest line kept; a longer one is cut down to its last `MAX_LINE_LEN` bytes.
const MAX_LINE_LEN: usize = 4096;

/// Remove every carriage return and newline from a received line.
pub fn strip_line_endings(line: &str) -> String {
    line.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Read newline-terminated records until EOF or an I/O error.
///
/// Lines are delivered to every current subscriber of `lines_tx` in arrival
/// order. Blank records are dropped here, so a transaction history never
/// contains empty lines even when the modem sends them.
pub(crate) async fn line_reader_task<R>(
    port_name: String,
    reader: R,
    lines_tx: broadcast::Sender<String>,
    events_tx: broadcast::Sender<ChannelEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut partial: Vec<u8> = Vec::with_capacity(256);
    let mut decode_errors: u64 = 0;
    let mut trims: u64 = 0;

    loop {
        let (taken, complete) = match reader.fill_buf().await {
            Ok([]) => {
                log::info!("Port {} reached end of stream", port_name);
                let _ = events_tx.send(ChannelEvent::Closed);
                break;
            }
            Ok(chunk) => match chunk.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    partial.extend_from_slice(&chunk[..=pos]);
                    (pos + 1, true)
                }
                None => {
                    partial.extend_from_slice(chunk);
                    (chunk.len(), false)
                }
            },
            Err(e) => {
                let msg = format!("IO error on {}: {}", port_name, e);
                log::error!("{}", msg);
                let _ = events_tx.send(ChannelEvent::Error(msg));
                break;
            }
        };
        reader.consume(taken);

        if partial.len() > MAX_LINE_LEN {
            partial.drain(..partial.len() - MAX_LINE_LEN);
            trims += 1;
            log::debug!("Trimmed long line on {} ({} so far)", port_name, trims);
        }
        if !complete {
            continue;
        }

        let text = match std::str::from_utf8(&partial) {
            Ok(s) => s.to_string(),
            Err(_) => {
                decode_errors += 1;
                log::debug!("Non UTF-8 line on {} ({} so far)", port_name, decode_errors);
                String::from_utf8_lossy(&partial).to_string()
            }
        };
        partial.clear();
        let line = strip_line_endings(&text);
        if line.trim().is_empty() {
            continue;
        }
        // No subscriber means no transaction is listening; the line is dropped.
        let _ = lines_tx.send(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn strips_all_line_endings() {
        assert_eq!(strip_line_endings("OK\r\n"), "OK");
        assert_eq!(strip_line_endings("\rA\rB\n"), "AB");
        assert_eq!(strip_line_endings("plain"), "plain");
    }

    #[tokio::test]
    async fn splits_stream_into_lines_and_skips_blanks() {
        let (mut device, host) = tokio::io::duplex(256);
        let (lines_tx, mut lines_rx) = broadcast::channel(16);
        let (events_tx, mut events_rx) = broadcast::channel(4);

        let task = tokio::spawn(line_reader_task("test".into(), host, lines_tx, events_tx));

        device.write_all(b"1,5\r\n\r\nOK\r\n").await.expect("write");
        drop(device);
        task.await.expect("reader task");

        assert_eq!(lines_rx.recv().await.expect("line"), "1,5");
        assert_eq!(lines_rx.recv().await.expect("line"), "OK");
        assert_eq!(events_rx.recv().await.expect("event"), ChannelEvent::Closed);
    }

    #[tokio::test]
    async fn long_line_keeps_its_tail() {
        let (mut device, host) = tokio::io::duplex(16 * 1024);
        let (lines_tx, mut lines_rx) = broadcast::channel(16);
        let (events_tx, _events_rx) = broadcast::channel(4);

        let task = tokio::spawn(line_reader_task("test".into(), host, lines_tx, events_tx));

        let mut long = "A".repeat(10_000);
        long.push_str("OK\r\n");
        device.write_all(long.as_bytes()).await.expect("write");
        device.write_all(b"next\r\n").await.expect("write");
        drop(device);
        task.await.expect("reader task");

        let line = lines_rx.recv().await.expect("long line");
        assert!(line.len() <= MAX_LINE_LEN);
        assert!(line.ends_with("AOK"), "tail lost: {}", &line[line.len() - 8..]);
        assert_eq!(lines_rx.recv().await.expect("line"), "next");
    }
}
