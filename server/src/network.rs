//! Server network layer: the TCP control listener and the UDP guess socket

use crate::config::GameConfig;
use crate::state::ServerState;
use log::{debug, error, info, warn};
use shared::MAX_DATAGRAM_SIZE;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};

/// Main server owning both listening sockets
pub struct Server {
    state: Arc<ServerState>,
    listener: TcpListener,
    guesses: Arc<UdpSocket>,
}

impl Server {
    /// Binds the control and guess ports named by `config`
    pub async fn bind(config: GameConfig) -> io::Result<Self> {
        Self::with_state(Arc::new(ServerState::new(config))).await
    }

    /// Binds around an existing state, e.g. one with seeded secrets
    pub async fn with_state(state: Arc<ServerState>) -> io::Result<Self> {
        let listener = TcpListener::bind(state.config.control_addr()).await?;
        let guesses = Arc::new(UdpSocket::bind(state.config.guess_addr()).await?);
        info!(
            "Control channel on {}, guesses on {}",
            listener.local_addr()?,
            guesses.local_addr()?
        );

        Ok(Server {
            state,
            listener,
            guesses,
        })
    }

    pub fn control_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn guess_addr(&self) -> io::Result<SocketAddr> {
        self.guesses.local_addr()
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Serves forever: guesses on a spawned task, connections on this one
    pub async fn run(self) -> io::Result<()> {
        self.spawn_guess_listener();

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("Control connection from {}", addr);
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                    }
                    tokio::spawn(Arc::clone(&self.state).serve_control(stream, addr));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// Spawns the task that answers every guess datagram
    fn spawn_guess_listener(&self) {
        let socket = Arc::clone(&self.guesses);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let datagram = String::from_utf8_lossy(&buffer[..len]);
                        let Some(reply) = state.handle_datagram(&datagram, addr).await else {
                            continue;
                        };
                        if let Err(e) = socket.send_to(reply.to_string().as_bytes(), addr).await {
                            warn!("Failed to answer guess from {}: {}", addr, e);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving guess: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{GuessReply, GREETING};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    fn loopback_config() -> GameConfig {
        GameConfig {
            bind_address: "127.0.0.1".to_string(),
            control_port: 0,
            guess_port: 0,
            ..GameConfig::default()
        }
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_ports() {
        let server = Server::bind(loopback_config()).await.unwrap();

        assert_ne!(server.control_addr().unwrap().port(), 0);
        assert_ne!(server.guess_addr().unwrap().port(), 0);
        assert_eq!(server.state().config.max_players, 4);
    }

    #[tokio::test]
    async fn test_guess_before_join_is_not_active() {
        let server = Server::bind(loopback_config()).await.unwrap();
        let guess_addr = server.guess_addr().unwrap();
        tokio::spawn(server.run());

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(b"nobody:50", guess_addr).await.unwrap();

        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = socket.recv_from(&mut buffer).await.unwrap();
        let reply: GuessReply = std::str::from_utf8(&buffer[..len]).unwrap().parse().unwrap();
        assert_eq!(reply, GuessReply::NotActive);
    }

    #[tokio::test]
    async fn test_accepts_control_connections() {
        let server = Server::bind(loopback_config()).await.unwrap();
        let control_addr = server.control_addr().unwrap();
        let state = server.state();
        tokio::spawn(server.run());

        let stream = TcpStream::connect(control_addr).await.unwrap();
        let mut stream = BufReader::new(stream);
        let mut line = String::new();
        stream.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim_end(), GREETING);

        stream.get_mut().write_all(b"JOIN alice\n").await.unwrap();
        line.clear();
        stream.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim_end(), "Hello alice! You have joined the game.");
        assert_eq!(state.session().await.registry().names(), vec!["alice"]);
    }
}
