//! # Game Client Library
//!
//! Terminal client for the number-guessing game. It holds the player's TCP
//! control connection, prints every line the server sends, and turns typed
//! lines into either guesses on the UDP guess channel or answers to server
//! prompts.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The client's view of the game, derived purely from control lines:
//! - Whether the join succeeded
//! - Whether a round is open for guessing
//! - Whether a `[PROMPT]:` question is waiting for the next typed line
//!
//! ### Input Module (`input`)
//! Reads terminal lines on a separate task so server output keeps flowing
//! while the player types.
//!
//! ### Network Module (`network`)
//! Connection setup and the guess exchange. Guess datagrams can be lost, so
//! an unanswered guess is re-sent a bounded number of times.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig {
//!         server: "127.0.0.1".to_string(),
//!         control_port: 6000,
//!         guess_port: 6001,
//!         reply_timeout: Duration::from_secs(5),
//!         retries: 2,
//!     };
//!
//!     let client = Client::connect(&config, "alice").await?;
//!     client.run(client::input::spawn_stdin_reader()).await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
