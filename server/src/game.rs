//! The game session aggregate: players, the open round, and the flags that
//! decide whether a game is running.
//!
//! Every method here is synchronous bookkeeping meant to run under the one
//! game lock. Network effects (announcements, prompts) are returned to the
//! caller as values and performed after the lock is released.

use crate::control::ControlHandle;
use crate::error::AdmissionError;
use crate::player_registry::{Player, PlayerId, PlayerRef, PlayerRegistry};
use log::{debug, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// One instance of secret-number play
#[derive(Debug, Clone)]
pub struct Round {
    pub number: u32,
    pub(crate) secret: i32,
    pub(crate) winner: Option<String>,
    pub started_at: Instant,
    pub duration: Duration,
}

impl Round {
    pub fn new(number: u32, secret: i32, started_at: Instant, duration: Duration) -> Self {
        Self {
            number,
            secret,
            winner: None,
            started_at,
            duration,
        }
    }

    pub fn secret(&self) -> i32 {
        self.secret
    }

    pub fn has_winner(&self) -> bool {
        self.winner.is_some()
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.duration.saturating_sub(self.elapsed(now))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.elapsed(now) >= self.duration
    }
}

/// State of the lone-survivor negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Survivor {
    None,
    /// `prompt` tells this negotiation apart from earlier ones with the
    /// same player
    AwaitingReply {
        player: PlayerId,
        deadline: Instant,
        prompt: u64,
    },
    /// The survivor chose to play on alone until the round ends
    Granted { player: PlayerId },
}

/// What a departure means for the running game
#[derive(Debug)]
pub enum Continuation {
    /// Nothing to decide: no game running, or still enough players
    Unaffected,
    /// Exactly one player is left mid-game and must be asked
    ///
    /// `cancelled` completes once the negotiation is dropped by the session,
    /// e.g. because someone joined.
    AskSurvivor {
        survivor: PlayerRef,
        generation: u64,
        prompt: u64,
        cancelled: oneshot::Receiver<()>,
    },
    /// The game was ended by this departure
    EndGame,
}

#[derive(Debug)]
pub struct Departure {
    pub player: Player,
    pub continuation: Continuation,
}

/// Outcome of the survivor's answer once applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurvivorDecision {
    Continue,
    Ended,
    /// The game ended or the negotiation was cancelled while waiting
    Moot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub id: PlayerId,
    /// Set when this join started a new game, carrying its generation
    pub started: Option<u64>,
    pub game_running: bool,
}

pub struct GameSession {
    pub(crate) registry: PlayerRegistry,
    pub(crate) round: Option<Round>,
    started: bool,
    generation: u64,
    survivor: Survivor,
    prompts: u64,
    /// Dropped whenever the pending negotiation is, waking its prompt task
    prompt_cancel: Option<oneshot::Sender<()>>,
}

impl GameSession {
    pub fn new(max_players: usize) -> Self {
        Self {
            registry: PlayerRegistry::new(max_players),
            round: None,
            started: false,
            generation: 0,
            survivor: Survivor::None,
            prompts: 0,
            prompt_cancel: None,
        }
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PlayerRegistry {
        &mut self.registry
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn survivor(&self) -> Survivor {
        self.survivor
    }

    /// Whether the game identified by `generation` is still the running one
    pub fn is_current(&self, generation: u64) -> bool {
        self.started && self.generation == generation
    }

    /// Seats a player and flips the game on if this join reaches the minimum
    pub fn admit(
        &mut self,
        name: &str,
        control: ControlHandle,
        addr: SocketAddr,
        min_players: usize,
    ) -> Result<Admission, AdmissionError> {
        let id = self.registry.join(name, control, addr)?.id;

        if self.registry.count() >= min_players && self.survivor != Survivor::None {
            debug!("Lone survivor negotiation cancelled by {} joining", name);
            self.clear_survivor();
        }

        let game_running = self.started;
        let started = self.try_start(min_players);
        Ok(Admission {
            id,
            started,
            game_running,
        })
    }

    /// Starts a game if none is running and enough players are seated
    ///
    /// Returns the new generation exactly once per threshold crossing.
    pub fn try_start(&mut self, min_players: usize) -> Option<u64> {
        if self.started || self.registry.count() < min_players {
            return None;
        }
        self.started = true;
        self.generation += 1;
        self.clear_survivor();
        info!(
            "Game {} started with {} players",
            self.generation,
            self.registry.count()
        );
        Some(self.generation)
    }

    /// Ends the running game. Idempotent; `generation` restricts the call to
    /// one specific game when given.
    pub fn end_game(&mut self, generation: Option<u64>) -> bool {
        if !self.started || generation.is_some_and(|g| g != self.generation) {
            return false;
        }
        self.started = false;
        self.round = None;
        self.clear_survivor();
        self.registry.clear_guess_addrs();
        info!("Game {} ended", self.generation);
        true
    }

    fn clear_survivor(&mut self) {
        self.survivor = Survivor::None;
        self.prompt_cancel = None;
    }

    /// Whether the game has too few players and no continuation decision in force
    pub fn should_abandon(&self, min_players: usize) -> bool {
        let count = self.registry.count();
        if count == 0 {
            return true;
        }
        count < min_players && self.survivor == Survivor::None
    }

    /// Opens round `number` with `secret`, resetting every cooldown
    pub fn begin_round(
        &mut self,
        generation: u64,
        number: u32,
        secret: i32,
        duration: Duration,
        now: Instant,
    ) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.round = Some(Round::new(number, secret, now, duration));
        self.registry.reset_cooldowns();
        self.registry.clear_guess_addrs();
        true
    }

    /// Closes the open round; a granted solo continuation ends with it
    pub fn close_round(&mut self) -> Option<Round> {
        let round = self.round.take();
        self.registry.clear_guess_addrs();
        if matches!(self.survivor, Survivor::Granted { .. }) {
            self.survivor = Survivor::None;
        }
        round
    }

    /// The single "mark player gone" operation
    ///
    /// Returns None when the player was already removed by another path, so
    /// the caller announces and evaluates each departure exactly once.
    pub fn depart(
        &mut self,
        name: &str,
        id: PlayerId,
        min_players: usize,
        prompt_timeout: Duration,
        now: Instant,
    ) -> Option<Departure> {
        let player = self.registry.remove_session(name, id)?;
        let continuation = self.continuation_after_departure(min_players, prompt_timeout, now);
        Some(Departure {
            player,
            continuation,
        })
    }

    fn continuation_after_departure(
        &mut self,
        min_players: usize,
        prompt_timeout: Duration,
        now: Instant,
    ) -> Continuation {
        if !self.started {
            return Continuation::Unaffected;
        }

        let remaining = self.registry.count();
        if remaining == 1 && min_players > 1 {
            let Some(survivor) = self.registry.snapshot().into_iter().next() else {
                return Continuation::Unaffected;
            };
            match self.survivor {
                Survivor::AwaitingReply { player, .. } if player == survivor.id => {
                    return Continuation::Unaffected;
                }
                Survivor::Granted { player } if player == survivor.id => {
                    return Continuation::Unaffected;
                }
                _ => {}
            }
            self.prompts += 1;
            let (cancel, cancelled) = oneshot::channel();
            self.prompt_cancel = Some(cancel);
            self.survivor = Survivor::AwaitingReply {
                player: survivor.id,
                deadline: now + prompt_timeout,
                prompt: self.prompts,
            };
            return Continuation::AskSurvivor {
                survivor,
                generation: self.generation,
                prompt: self.prompts,
                cancelled,
            };
        }

        if remaining < min_players {
            self.end_game(None);
            return Continuation::EndGame;
        }
        Continuation::Unaffected
    }

    /// Applies the lone survivor's answer to negotiation `prompt` of game
    /// `generation`
    pub fn resolve_survivor(
        &mut self,
        generation: u64,
        player: PlayerId,
        prompt: u64,
        accepted: bool,
    ) -> SurvivorDecision {
        let awaiting = matches!(
            self.survivor,
            Survivor::AwaitingReply { player: p, prompt: n, .. } if p == player && n == prompt
        );
        if !awaiting || !self.is_current(generation) {
            return SurvivorDecision::Moot;
        }

        if accepted {
            self.survivor = Survivor::Granted { player };
            self.prompt_cancel = None;
            SurvivorDecision::Continue
        } else {
            self.end_game(Some(generation));
            SurvivorDecision::Ended
        }
    }
}
