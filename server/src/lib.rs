//! # Number Guessing Game Server
//!
//! This library provides the authoritative server for a small multiplayer
//! number-guessing game. Players hold a reliable TCP control channel for the
//! lobby, round announcements and prompts, and send their guesses as UDP
//! datagrams on a port shared by everyone.
//!
//! ## Core Responsibilities
//!
//! ### Session Coordination
//! Players join and leave at any time. The join that first reaches the
//! minimum player count starts a game; from then on a coordinator task runs
//! rounds back to back until too few players are left.
//!
//! ### Partial Failure
//! Silent disconnects are found by periodic liveness probes and by failed
//! broadcasts. Both detections go through one idempotent departure path, so
//! every departure is announced exactly once. When only one player is left
//! mid-game, that player is asked whether to continue.
//!
//! ### Fair Guessing
//! Guesses are rate limited per player and evaluated atomically, so a round
//! has at most one winner no matter how many correct guesses race.
//!
//! ## Architecture Design
//!
//! All mutable game state lives in one [`game::GameSession`] behind a single
//! async mutex in [`state::ServerState`]. Tasks take the lock for bookkeeping
//! only; control-channel writes are queued to per-connection writer tasks
//! and performed after the lock is released.
//!
//! ## Module Organization
//!
//! - `config`: defaults, JSON file and command-line layering
//! - `error`: admission and configuration errors
//! - `control`: the per-player control channel handle
//! - `player_registry`: who is seated, with cooldowns and scores
//! - `game`: the session aggregate and its state transitions
//! - `broadcast`: announcements with self-healing delivery
//! - `monitor`: disconnect detection and the lone-survivor prompt
//! - `round`: the round coordinator
//! - `guess`: guess validation and scoring
//! - `session`: greeting and `JOIN` handling
//! - `network`: listening sockets
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig::default();
//!     config.validate()?;
//!
//!     // Control channel on 6000/tcp, guesses on 6001/udp
//!     let server = Server::bind(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod control;
pub mod error;
pub mod game;
pub mod guess;
pub mod monitor;
pub mod network;
pub mod player_registry;
pub mod round;
pub mod session;
pub mod state;
