//! Terminal input, read on its own task so the client can keep printing
//! server lines while the player types

use log::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Forwards every line of `reader` until EOF or until the receiver is gone
pub fn spawn_line_reader<R>(reader: R) -> mpsc::UnboundedReceiver<String>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Input read failed: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    spawn_line_reader(BufReader::new(tokio::io::stdin()))
}

/// Next non-empty line, or None once input has ended
pub async fn next_nonempty(input: &mut mpsc::UnboundedReceiver<String>) -> Option<String> {
    while let Some(line) = input.recv().await {
        let line = line.trim();
        if !line.is_empty() {
            return Some(line.to_string());
        }
    }
    None
}
