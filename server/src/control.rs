//! Per-player control channel handle
//!
//! A control connection is served by two tasks: a line reader that forwards
//! what the client types after `JOIN` into a small backlog (lines beyond it
//! are dropped, since only prompt answers are ever read), and a frame writer
//! that owns the
//! write half. Game code only ever enqueues frames, so sending never blocks
//! and never happens while the game lock is held. When the writer task is
//! gone every send fails, which is how transport failure reaches game logic.

use crate::error::ChannelClosed;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};

/// Unread client lines kept per connection
pub const REPLY_BACKLOG: usize = 16;

/// Units of work for the writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    Line(String),
    /// Zero-byte liveness write
    Probe,
    Close,
}

/// Cloneable handle to one player's control channel
#[derive(Debug, Clone)]
pub struct ControlHandle {
    frames: mpsc::UnboundedSender<ControlFrame>,
    replies: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl ControlHandle {
    /// Attaches to a connected stream, spawning its reader and writer tasks
    pub fn spawn<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_BACKLOG);
        let (eof_tx, eof_rx) = oneshot::channel();

        tokio::spawn(write_frames(writer, frame_rx, eof_rx));
        tokio::spawn(read_lines(reader, reply_tx, eof_tx));

        Self::from_channels(frame_tx, reply_rx)
    }

    /// A handle whose client side is played by the returned [`ControlPeer`]
    pub fn in_memory() -> (Self, ControlPeer) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_BACKLOG);
        let handle = Self::from_channels(frame_tx, reply_rx);
        let peer = ControlPeer {
            frames: frame_rx,
            replies: reply_tx,
        };
        (handle, peer)
    }

    fn from_channels(
        frames: mpsc::UnboundedSender<ControlFrame>,
        replies: mpsc::Receiver<String>,
    ) -> Self {
        Self {
            frames,
            replies: Arc::new(Mutex::new(replies)),
        }
    }

    pub fn send_line(&self, line: &str) -> Result<(), ChannelClosed> {
        self.frames
            .send(ControlFrame::Line(line.to_string()))
            .map_err(|_| ChannelClosed)
    }

    pub fn probe(&self) -> Result<(), ChannelClosed> {
        self.frames
            .send(ControlFrame::Probe)
            .map_err(|_| ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }

    /// Asks the writer to flush and shut the connection down
    pub fn close(&self) {
        let _ = self.frames.send(ControlFrame::Close);
    }

    /// Waits up to `timeout` for the next line typed by the client
    ///
    /// Lines that arrived before the call are stale and discarded, so only an
    /// answer to a prompt sent just before counts. Returns None on timeout or
    /// when the client has gone away.
    pub async fn read_reply(&self, timeout: Duration) -> Option<String> {
        let mut replies = self.replies.lock().await;
        while let Ok(stale) = replies.try_recv() {
            debug!("Discarding unsolicited control line {:?}", stale);
        }
        match tokio::time::timeout(timeout, replies.recv()).await {
            Ok(reply) => reply,
            Err(_) => None,
        }
    }
}

async fn write_frames<W>(
    mut writer: W,
    mut frames: mpsc::UnboundedReceiver<ControlFrame>,
    mut peer_eof: oneshot::Receiver<()>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            frame = frames.recv() => {
                let result = match frame {
                    Some(ControlFrame::Line(line)) => {
                        writer.write_all(format!("{}\n", line).as_bytes()).await
                    }
                    Some(ControlFrame::Probe) => writer.flush().await,
                    Some(ControlFrame::Close) | None => break,
                };
                if let Err(e) = result {
                    debug!("Control write failed: {}", e);
                    break;
                }
            },
            _ = &mut peer_eof => break,
        }
    }

    // Dropping `frames` here is what makes later sends fail
    frames.close();
    let _ = writer.shutdown().await;
}

async fn read_lines<R>(
    reader: R,
    replies: mpsc::Sender<String>,
    _eof: oneshot::Sender<()>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !offer(&replies, line) {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Control read failed: {}", e);
                break;
            }
        }
    }
}

/// Queues a client line unless the backlog is full. False once nobody
/// can read replies any more.
fn offer(replies: &mpsc::Sender<String>, line: String) -> bool {
    match replies.try_send(line) {
        Ok(()) => true,
        Err(TrySendError::Full(line)) => {
            debug!("Reply backlog full, dropping control line {:?}", line);
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// The client end of an in-memory control channel
#[derive(Debug)]
pub struct ControlPeer {
    frames: mpsc::UnboundedReceiver<ControlFrame>,
    replies: mpsc::Sender<String>,
}

impl ControlPeer {
    /// Next line sent to this player, skipping probes. None once closed.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            match self.frames.recv().await? {
                ControlFrame::Line(line) => return Some(line),
                ControlFrame::Probe => continue,
                ControlFrame::Close => return None,
            }
        }
    }

    /// Reads lines until one satisfies `pred`, returning it
    pub async fn wait_for<F>(&mut self, mut pred: F) -> Option<String>
    where
        F: FnMut(&str) -> bool,
    {
        while let Some(line) = self.next_line().await {
            if pred(&line) {
                return Some(line);
            }
        }
        None
    }

    /// Every line already delivered, without waiting
    pub fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(frame) = self.frames.try_recv() {
            if let ControlFrame::Line(line) = frame {
                lines.push(line);
            }
        }
        lines
    }

    pub fn reply(&self, line: &str) {
        offer(&self.replies, line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_in_memory_lines_and_probes() {
        let (handle, mut peer) = ControlHandle::in_memory();

        assert_ok!(handle.probe());
        assert_ok!(handle.send_line("hello"));
        assert_eq!(peer.next_line().await.as_deref(), Some("hello"));

        handle.close();
        assert_eq!(peer.next_line().await, None);
    }

    #[tokio::test]
    async fn test_dropped_peer_fails_sends() {
        let (handle, peer) = ControlHandle::in_memory();
        drop(peer);

        assert!(handle.is_closed());
        assert_err!(handle.probe());
        assert_err!(handle.send_line("anyone?"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_reply_discards_stale_lines_and_times_out() {
        let (handle, peer) = ControlHandle::in_memory();
        peer.reply("typed earlier");

        let waiting = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.read_reply(Duration::from_secs(30)).await })
        };
        tokio::task::yield_now().await;
        peer.reply("yes");
        assert_eq!(waiting.await.unwrap().as_deref(), Some("yes"));

        let silent = handle.read_reply(Duration::from_secs(30)).await;
        assert_eq!(silent, None);
    }

    #[tokio::test]
    async fn test_unsolicited_lines_are_capped() {
        let (handle, peer) = ControlHandle::in_memory();
        for i in 0..10_000 {
            peer.reply(&format!("chatter {}", i));
        }

        let mut retained = Vec::new();
        {
            let mut replies = handle.replies.lock().await;
            while let Ok(line) = replies.try_recv() {
                retained.push(line);
            }
        }
        assert_eq!(retained.len(), REPLY_BACKLOG);
        assert_eq!(retained[0], "chatter 0");

        // An answer typed after the backlog was drained still gets through
        let waiting = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.read_reply(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        peer.reply("yes");
        assert_eq!(waiting.await.unwrap().as_deref(), Some("yes"));
    }

    #[tokio::test]
    async fn test_spawned_reader_keeps_serving_past_a_full_backlog() {
        let (server_side, mut client_side) = duplex(64 * 1024);
        let handle = ControlHandle::spawn(server_side);

        for i in 0..1_000 {
            client_side
                .write_all(format!("spam {}\n", i).as_bytes())
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_closed());

        let waiting = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.read_reply(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        client_side.write_all(b"no\n").await.unwrap();
        assert_eq!(waiting.await.unwrap().as_deref(), Some("no"));
    }

    #[tokio::test]
    async fn test_spawned_handle_writes_lines_to_stream() {
        let (server_side, mut client_side) = duplex(1024);
        let handle = ControlHandle::spawn(server_side);

        handle.send_line("=== Round 1 ===").unwrap();
        handle.close();

        let mut received = String::new();
        client_side.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "=== Round 1 ===\n");
    }

    #[tokio::test]
    async fn test_spawned_handle_forwards_replies() {
        let (server_side, mut client_side) = duplex(1024);
        let handle = ControlHandle::spawn(server_side);

        let waiting = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.read_reply(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        client_side.write_all(b"YES\n").await.unwrap();

        assert_eq!(waiting.await.unwrap().as_deref(), Some("YES"));
    }

    #[tokio::test]
    async fn test_client_hangup_fails_next_probe() {
        let (server_side, client_side) = duplex(1024);
        let handle = ControlHandle::spawn(server_side);
        drop(client_side);

        let mut failed = false;
        for _ in 0..100 {
            if handle.probe().is_err() {
                failed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(failed, "probe kept succeeding after the client hung up");
    }
}
