//! Shared server state: the game lock plus the configuration every task reads.
//!
//! The behaviour is spread over `impl ServerState` blocks in the modules
//! that own each concern (`broadcast`, `monitor`, `round`, `guess`,
//! `session`).

use crate::config::GameConfig;
use crate::game::GameSession;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex as StdMutex;
use tokio::sync::{Mutex, MutexGuard, Notify};

pub struct ServerState {
    pub config: GameConfig,
    session: Mutex<GameSession>,
    /// Wakes the round coordinator early, e.g. when a winner is found
    pub(crate) round_wake: Notify,
    secrets: StdMutex<StdRng>,
}

impl ServerState {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic secrets, for reproducible games
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        let session = GameSession::new(config.max_players);
        Self {
            config,
            session: Mutex::new(session),
            round_wake: Notify::new(),
            secrets: StdMutex::new(rng),
        }
    }

    /// Takes the game lock. Never hold the guard across network I/O.
    pub async fn session(&self) -> MutexGuard<'_, GameSession> {
        self.session.lock().await
    }

    /// Draws a fresh secret uniformly from the configured range
    pub(crate) fn draw_secret(&self) -> i32 {
        let range = self.config.guess_range;
        match self.secrets.lock() {
            Ok(mut rng) => rng.gen_range(range.low..=range.high),
            Err(poisoned) => poisoned.into_inner().gen_range(range.low..=range.high),
        }
    }
}
