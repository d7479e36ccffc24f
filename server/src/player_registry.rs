//! Registry of the players currently seated in the game
//!
//! This module is the single source of truth for "who is playing":
//! - Admission with name uniqueness and a capacity limit
//! - Per-player control handle, guess cooldown and score
//! - Ordered snapshots for broadcasting and roster display
//!
//! The registry itself is plain data; callers reach it through the game lock
//! so every view taken here is consistent.

use crate::control::ControlHandle;
use crate::error::AdmissionError;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::time::Instant;

/// Distinguishes two sessions that used the same name
pub type PlayerId = u64;

/// A seated player and their per-session state
#[derive(Debug)]
pub struct Player {
    /// Unique per admission, never reused
    pub id: PlayerId,
    pub name: String,
    pub control: ControlHandle,
    /// Peer address of the control connection
    pub control_addr: SocketAddr,
    /// Where this player's guesses come from; learned on the first datagram of a round
    pub guess_addr: Option<SocketAddr>,
    /// Time of the last accepted guess, None until one is accepted this round
    pub last_guess: Option<Instant>,
    pub score: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: String, control: ControlHandle, control_addr: SocketAddr) -> Self {
        Self {
            id,
            name,
            control,
            control_addr,
            guess_addr: None,
            last_guess: None,
            score: 0,
        }
    }
}

/// Lightweight copy of a player's addressing data, taken under the lock
#[derive(Debug, Clone)]
pub struct PlayerRef {
    pub id: PlayerId,
    pub name: String,
    pub control: ControlHandle,
}

pub struct PlayerRegistry {
    players: HashMap<String, Player>,
    next_player_id: PlayerId,
    max_players: usize,
}

impl PlayerRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            players: HashMap::new(),
            next_player_id: 1,
            max_players,
        }
    }

    /// Seats a new player
    ///
    /// Name collisions are checked before capacity so a duplicate name is
    /// reported as such even when the game is full.
    pub fn join(
        &mut self,
        name: &str,
        control: ControlHandle,
        addr: SocketAddr,
    ) -> Result<&Player, AdmissionError> {
        if self.players.contains_key(name) {
            return Err(AdmissionError::NameTaken);
        }
        if self.players.len() >= self.max_players {
            return Err(AdmissionError::Full {
                max: self.max_players,
            });
        }

        let id = self.next_player_id;
        self.next_player_id += 1;

        info!("Player {} ({}) joined from {}", name, id, addr);
        let player = self
            .players
            .entry(name.to_string())
            .or_insert_with(|| Player::new(id, name.to_string(), control, addr));
        Ok(player)
    }

    /// Removes a player by name. Idempotent.
    pub fn remove(&mut self, name: &str) -> bool {
        self.players.remove(name).is_some()
    }

    /// Removes `name` only if it still belongs to session `id`
    ///
    /// Departure paths carry the id they observed so a stale detection can
    /// never evict a newer player who reused the name.
    pub fn remove_session(&mut self, name: &str, id: PlayerId) -> Option<Player> {
        if self.players.get(name)?.id != id {
            return None;
        }
        let player = self.players.remove(name);
        if player.is_some() {
            info!("Player {} ({}) removed", name, id);
        }
        player
    }

    pub fn contains(&self, name: &str, id: PlayerId) -> bool {
        self.players.get(name).is_some_and(|p| p.id == id)
    }

    pub fn get(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.get_mut(name)
    }

    pub fn count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Players in join order
    fn ordered(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.id);
        players
    }

    pub fn snapshot(&self) -> Vec<PlayerRef> {
        self.ordered()
            .into_iter()
            .map(|p| PlayerRef {
                id: p.id,
                name: p.name.clone(),
                control: p.control.clone(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.ordered().into_iter().map(|p| p.name.clone()).collect()
    }

    pub fn scores(&self) -> Vec<(String, u32)> {
        self.ordered()
            .into_iter()
            .map(|p| (p.name.clone(), p.score))
            .collect()
    }

    /// Forgets every cooldown timestamp, as at the start of a round
    pub fn reset_cooldowns(&mut self) {
        for player in self.players.values_mut() {
            player.last_guess = None;
        }
    }

    /// Drops the per-round guess address cache
    pub fn clear_guess_addrs(&mut self) {
        for player in self.players.values_mut() {
            player.guess_addr = None;
        }
    }
}
