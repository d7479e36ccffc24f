//! Client network layer: one TCP control connection plus a UDP socket for guesses

use crate::game::{ClientGameState, ControlEvent, UserAction};
use log::{debug, info, warn};
use shared::{join_line, GuessReply, GuessRequest, MAX_DATAGRAM_SIZE};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// How the client talks to one server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub control_port: u16,
    pub guess_port: u16,
    pub reply_timeout: Duration,
    pub retries: u32,
}

/// Sends one guess and waits for its reply, re-sending after each timeout
///
/// Returns None when every attempt went unanswered.
pub async fn exchange_guess(
    socket: &UdpSocket,
    server: SocketAddr,
    request: &GuessRequest,
    reply_timeout: Duration,
    retries: u32,
) -> io::Result<Option<GuessReply>> {
    let datagram = request.encode();
    let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

    for attempt in 0..=retries {
        if attempt > 0 {
            debug!("No reply to {:?}, retry {} of {}", datagram, attempt, retries);
        }
        socket.send_to(datagram.as_bytes(), server).await?;

        let Ok(received) = timeout(reply_timeout, socket.recv_from(&mut buffer)).await else {
            continue;
        };
        let (len, _) = received?;
        let text = String::from_utf8_lossy(&buffer[..len]);
        let reply = text
            .parse::<GuessReply>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        return Ok(Some(reply));
    }

    Ok(None)
}

pub struct Client {
    control: Lines<BufReader<OwnedReadHalf>>,
    control_writer: OwnedWriteHalf,
    guesses: UdpSocket,
    guess_addr: SocketAddr,
    reply_timeout: Duration,
    retries: u32,
    state: ClientGameState,
}

impl Client {
    /// Opens both channels and sends `JOIN <name>`
    pub async fn connect(config: &ClientConfig, name: &str) -> io::Result<Self> {
        let control_addr = resolve(&config.server, config.control_port).await?;
        let guess_addr = resolve(&config.server, config.guess_port).await?;

        let stream = TcpStream::connect(control_addr).await?;
        stream.set_nodelay(true)?;
        let (reader, mut writer) = stream.into_split();
        writer.write_all(format!("{}\n", join_line(name)).as_bytes()).await?;

        let bind_addr = if guess_addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let guesses = UdpSocket::bind(bind_addr).await?;
        info!("Connected to {}, guessing via {}", control_addr, guess_addr);

        Ok(Client {
            control: BufReader::new(reader).lines(),
            control_writer: writer,
            guesses,
            guess_addr,
            reply_timeout: config.reply_timeout,
            retries: config.retries,
            state: ClientGameState::new(name),
        })
    }

    /// Prints server lines and forwards input until the server hangs up,
    /// input ends, or the player types `exit`
    pub async fn run(mut self, mut input: mpsc::UnboundedReceiver<String>) -> io::Result<()> {
        loop {
            tokio::select! {
                line = self.control.next_line() => {
                    let Some(line) = line? else {
                        println!("Server closed the connection.");
                        return Ok(());
                    };
                    if !self.show_control_line(&line) {
                        return Ok(());
                    }
                }
                typed = input.recv() => {
                    let Some(typed) = typed else {
                        return self.leave().await;
                    };
                    match self.state.route_input(&typed) {
                        UserAction::Quit => return self.leave().await,
                        UserAction::AnswerPrompt(answer) => {
                            self.control_writer
                                .write_all(format!("{}\n", answer).as_bytes())
                                .await?;
                        }
                        UserAction::Guess(guess) => self.guess(&guess).await?,
                        UserAction::Ignored => println!("Wait for the next round to start."),
                    }
                }
            }
        }
    }

    /// Prints one control line; false when the server refused the join
    fn show_control_line(&mut self, line: &str) -> bool {
        match self.state.handle_line(line) {
            ControlEvent::Rejected(reason) => {
                println!("{}", reason);
                false
            }
            ControlEvent::Prompt(question) => {
                println!("{}", question);
                true
            }
            ControlEvent::Disconnect(notice) => {
                println!("\x1b[1;31m{}\x1b[0m", notice);
                true
            }
            ControlEvent::RoundOpened => {
                println!("{}", line);
                println!("Type a number and press enter.");
                true
            }
            _ => {
                println!("{}", line);
                true
            }
        }
    }

    async fn guess(&mut self, guess: &str) -> io::Result<()> {
        let request = GuessRequest::new(self.state.name(), guess);
        match exchange_guess(
            &self.guesses,
            self.guess_addr,
            &request,
            self.reply_timeout,
            self.retries,
        )
        .await
        {
            Ok(Some(reply)) => {
                println!("{}", reply);
                self.state.record_reply(reply);
            }
            Ok(None) => println!("No response from server, try again."),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => warn!("{}", e),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn leave(mut self) -> io::Result<()> {
        info!("Leaving the game");
        self.control_writer.shutdown().await
    }
}

async fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    lookup_host((host, port)).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("could not resolve {}:{}", host, port),
        )
    })
}
