//! Control-connection admission: greeting, `JOIN`, seating, and the tasks
//! every seated player gets.

use crate::control::ControlHandle;
use crate::error::AdmissionError;
use crate::player_registry::PlayerId;
use crate::state::ServerState;
use log::{debug, info, warn};
use shared::{hello_line, joined_notice, parse_join, GREETING};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

/// Longest `JOIN` line accepted, newline included
pub const MAX_JOIN_LINE: u64 = 256;

/// Greets a fresh connection and reads its `JOIN <name>` line
///
/// The line must arrive within `timeout` and fit in [`MAX_JOIN_LINE`] bytes.
pub async fn read_join<S>(stream: &mut BufReader<S>, timeout: Duration) -> Result<String, AdmissionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(format!("{}\n", GREETING).as_bytes()).await?;
    stream.flush().await?;

    let mut line = String::new();
    let mut limited = (&mut *stream).take(MAX_JOIN_LINE);
    let read = tokio::time::timeout(timeout, limited.read_line(&mut line))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no JOIN before the deadline"))??;
    if read == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "closed before JOIN").into());
    }
    if !line.ends_with('\n') {
        return Err(AdmissionError::Malformed);
    }

    parse_join(&line)
        .map(str::to_string)
        .ok_or(AdmissionError::Malformed)
}

impl ServerState {
    /// Serves one control connection from greeting to hand-off
    ///
    /// Rejected connections get the reason as a single line and are closed;
    /// nobody else hears about them.
    pub async fn serve_control<S>(self: Arc<Self>, stream: S, addr: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut stream = BufReader::new(stream);
        let name = match read_join(&mut stream, self.config.join_timeout).await {
            Ok(name) => name,
            Err(AdmissionError::Io(e)) => {
                debug!("Connection from {} dropped during handshake: {}", addr, e);
                return;
            }
            Err(e) => {
                warn!("Rejected {}: {}", addr, e);
                let _ = stream.write_all(format!("{}\n", e).as_bytes()).await;
                let _ = stream.shutdown().await;
                return;
            }
        };

        // The buffered reader travels with the stream so nothing typed
        // right after JOIN is lost
        let control = ControlHandle::spawn(stream);
        if let Err(e) = self.admit(&name, control.clone(), addr).await {
            warn!("Rejected {} from {}: {}", name, addr, e);
            let _ = control.send_line(&e.to_string());
            control.close();
        }
    }

    /// Seats `name` and starts whatever the join triggers
    ///
    /// Spawns the player's disconnect monitor and, when this join is the one
    /// that reached the minimum, the coordinator of the new game.
    pub async fn admit(
        self: &Arc<Self>,
        name: &str,
        control: ControlHandle,
        addr: SocketAddr,
    ) -> Result<PlayerId, AdmissionError> {
        let admission = {
            let mut session = self.session().await;
            let admission = session.admit(name, control.clone(), addr, self.config.min_players)?;
            // Enqueued under the lock so the welcome precedes any broadcast
            let _ = control.send_line(&hello_line(name));
            admission
        };

        self.broadcast(&joined_notice(name, admission.game_running))
            .await;

        tokio::spawn(Arc::clone(self).monitor_player(name.to_string(), admission.id, control));
        if let Some(generation) = admission.started {
            info!("{} brought the table to the minimum, starting game {}", name, generation);
            tokio::spawn(Arc::clone(self).run_game(generation));
        }
        Ok(admission.id)
    }
}
