//! Round life-cycle coordinator
//!
//! One coordinator task runs per started game:
//! `WAITING -> ROUND_ACTIVE -> ROUND_SETTLING -> (ROUND_ACTIVE | ENDED)`.
//! It never owns a player; it only observes the session under the lock on
//! every tick and stops as soon as its game generation is no longer current.

use crate::state::ServerState;
use log::{debug, info};
use shared::{
    round_banner, score_summary, time_remaining_notice, time_up_notice, NOT_ENOUGH_PLAYERS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

/// How an open round came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Won,
    TimedOut { secret: i32 },
    /// Too few players with no continuation decision; the game was ended here
    Abandoned,
    /// Another path ended or replaced the game
    Superseded,
}

enum Tick {
    Running { remaining: Duration },
    Over(RoundOutcome),
}

impl ServerState {
    /// Runs game `generation` round after round until it ends
    pub async fn run_game(self: Arc<Self>, generation: u64) {
        info!("Coordinator for game {} running", generation);
        let mut number = 1;

        loop {
            if !self.open_round(generation, number).await {
                return;
            }

            match self.await_outcome(generation).await {
                RoundOutcome::Won => info!("Round {} won", number),
                RoundOutcome::TimedOut { secret } => {
                    info!("Round {} timed out", number);
                    self.broadcast(&time_up_notice(secret)).await;
                }
                RoundOutcome::Abandoned => {
                    self.broadcast(NOT_ENOUGH_PLAYERS).await;
                    return;
                }
                RoundOutcome::Superseded => {
                    debug!("Game {} superseded during round {}", generation, number);
                    return;
                }
            }

            let scores = {
                let session = self.session().await;
                if !session.is_current(generation) {
                    return;
                }
                session.registry().scores()
            };
            self.broadcast(&score_summary(&scores)).await;

            sleep(self.config.intermission).await;
            number += 1;
        }
    }

    /// Draws a secret and opens round `number`, or ends the game when it
    /// cannot continue. Returns whether a round is now open.
    async fn open_round(self: &Arc<Self>, generation: u64, number: u32) -> bool {
        let secret = self.draw_secret();
        let config = &self.config;

        let banner = {
            let mut session = self.session().await;
            if !session.is_current(generation) {
                return false;
            }
            if session.should_abandon(config.min_players) {
                session.end_game(Some(generation));
                None
            } else {
                session.begin_round(
                    generation,
                    number,
                    secret,
                    config.round_duration,
                    Instant::now(),
                );
                Some(round_banner(
                    number,
                    &session.registry().names(),
                    config.guess_range.low,
                    config.guess_range.high,
                    config.guess_cooldown.as_secs(),
                    config.round_duration.as_secs(),
                ))
            }
        };

        match banner {
            Some(banner) => {
                info!("Round {} of game {} started", number, generation);
                debug!("Round {} secret is {}", number, secret);
                self.broadcast(&banner).await;
                true
            }
            None => {
                info!("Game {} ended before round {}: too few players", generation, number);
                self.broadcast(NOT_ENOUGH_PLAYERS).await;
                false
            }
        }
    }

    /// Sleeps in fixed ticks until the open round is decided
    async fn await_outcome(self: &Arc<Self>, generation: u64) -> RoundOutcome {
        let mut ticker = interval(self.config.round_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        let notice_every = self.config.time_notice_interval;
        let mut next_notice = notice_every;

        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                _ = self.round_wake.notified() => {},
            }

            let remaining = match self.check_round(generation).await {
                Tick::Over(outcome) => return outcome,
                Tick::Running { remaining } => remaining,
            };

            let elapsed = self.config.round_duration.saturating_sub(remaining);
            if elapsed >= next_notice {
                while next_notice <= elapsed {
                    next_notice += notice_every;
                }
                let secs = remaining.as_secs_f64().ceil() as u64;
                self.broadcast(&time_remaining_notice(secs)).await;
            }
        }
    }

    /// One observation of the round under the lock
    async fn check_round(&self, generation: u64) -> Tick {
        let now = Instant::now();
        let mut session = self.session().await;

        if !session.is_current(generation) {
            return Tick::Over(RoundOutcome::Superseded);
        }
        let Some(round) = session.round() else {
            return Tick::Over(RoundOutcome::Superseded);
        };

        if round.has_winner() {
            session.close_round();
            return Tick::Over(RoundOutcome::Won);
        }
        if session.should_abandon(self.config.min_players) {
            session.end_game(Some(generation));
            return Tick::Over(RoundOutcome::Abandoned);
        }
        if round.is_expired(now) {
            let secret = round.secret();
            session.close_round();
            return Tick::Over(RoundOutcome::TimedOut { secret });
        }
        Tick::Running {
            remaining: round.remaining(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::control::{ControlHandle, ControlPeer};
    use shared::{GuessReply, GuessRequest};

    fn test_addr() -> std::net::SocketAddr {
        "127.0.0.1:6001".parse().unwrap()
    }

    fn quick_config() -> GameConfig {
        GameConfig {
            guess_cooldown: Duration::from_secs(1),
            round_duration: Duration::from_secs(20),
            ..GameConfig::default()
        }
    }

    async fn seat_all(state: &Arc<ServerState>, names: &[&str]) -> (Vec<ControlPeer>, u64) {
        let mut peers = Vec::new();
        let mut generation = None;
        let mut session = state.session().await;
        for name in names {
            let (handle, peer) = ControlHandle::in_memory();
            let admission = session
                .admit(name, handle, test_addr(), state.config.min_players)
                .unwrap();
            generation = generation.or(admission.started);
            peers.push(peer);
        }
        (peers, generation.unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_times_out_and_reveals_secret() {
        let state = Arc::new(ServerState::with_seed(quick_config(), 1));
        let (mut peers, generation) = seat_all(&state, &["alice", "bob", "carol"]).await;
        tokio::spawn(Arc::clone(&state).run_game(generation));

        let banner = peers[0].wait_for(|l| l.starts_with("=== Round")).await.unwrap();
        assert!(banner.contains("=== Round 1 ==="));
        assert!(banner.contains("Players: alice, bob, carol"));
        let secret = state.session().await.round().unwrap().secret();
        let wrong = if secret == 1 { 2 } else { 1 };

        for name in ["alice", "bob", "carol"] {
            let reply = state
                .process_guess(&GuessRequest::new(name, wrong.to_string()), test_addr())
                .await;
            assert_ne!(reply, GuessReply::Correct);
        }

        let expected = time_up_notice(secret);
        for peer in peers.iter_mut() {
            assert_eq!(peer.wait_for(|l| l.starts_with("Time's up")).await, Some(expected.clone()));
            let summary = peer.next_line().await.unwrap();
            assert_eq!(summary, "=== Scores ===\nalice: 0\nbob: 0\ncarol: 0");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_score_summary_lists_only_connected_players() {
        let state = Arc::new(ServerState::with_seed(quick_config(), 2));
        let (mut peers, generation) = seat_all(&state, &["alice", "bob", "carol"]).await;
        tokio::spawn(Arc::clone(&state).run_game(generation));
        peers[0].wait_for(|l| l.starts_with("=== Round")).await.unwrap();

        let carol = state.session().await.registry().get("carol").unwrap().id;
        state.depart("carol", carol).await;

        let summary = peers[0].wait_for(|l| l.starts_with("=== Scores")).await.unwrap();
        assert_eq!(summary, "=== Scores ===\nalice: 0\nbob: 0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_winner_ends_round_early_and_next_round_follows() {
        let state = Arc::new(ServerState::with_seed(quick_config(), 3));
        let (mut peers, generation) = seat_all(&state, &["alice", "bob"]).await;
        tokio::spawn(Arc::clone(&state).run_game(generation));
        peers[1].wait_for(|l| l.starts_with("=== Round 1")).await.unwrap();

        let started = Instant::now();
        let secret = state.session().await.round().unwrap().secret();
        let reply = state
            .process_guess(&GuessRequest::new("alice", secret.to_string()), test_addr())
            .await;
        assert_eq!(reply, GuessReply::Correct);

        let summary = peers[1].wait_for(|l| l.starts_with("=== Scores")).await.unwrap();
        assert_eq!(summary, "=== Scores ===\nalice: 1\nbob: 0");
        assert!(started.elapsed() < Duration::from_secs(2));

        let next = peers[1].wait_for(|l| l.starts_with("=== Round")).await.unwrap();
        assert!(next.starts_with("=== Round 2 ==="));
        assert!(started.elapsed() >= state.config.intermission);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_time_notices() {
        let state = Arc::new(ServerState::with_seed(quick_config(), 4));
        let (mut peers, generation) = seat_all(&state, &["alice", "bob"]).await;
        tokio::spawn(Arc::clone(&state).run_game(generation));

        let notice = peers[0].wait_for(|l| l.starts_with("Time remaining")).await;
        assert_eq!(notice, Some(time_remaining_notice(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_below_minimum_ends_game() {
        let config = GameConfig {
            min_players: 3,
            ..quick_config()
        };
        let state = Arc::new(ServerState::with_seed(config, 5));
        let (mut peers, generation) = seat_all(&state, &["alice", "bob", "carol"]).await;
        let coordinator = tokio::spawn(Arc::clone(&state).run_game(generation));
        peers[0].wait_for(|l| l.starts_with("=== Round")).await.unwrap();

        let bob = state.session().await.registry().get("bob").unwrap().id;
        state.depart("bob", bob).await;

        let line = peers[0].wait_for(|l| l == NOT_ENOUGH_PLAYERS).await;
        assert_eq!(line.as_deref(), Some(NOT_ENOUGH_PLAYERS));
        coordinator.await.unwrap();
        assert!(!state.session().await.is_started());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_coordinator_stops_after_restart() {
        let state = Arc::new(ServerState::with_seed(quick_config(), 6));
        let (mut peers, generation) = seat_all(&state, &["alice", "bob"]).await;
        let stale = tokio::spawn(Arc::clone(&state).run_game(generation));
        peers[0].wait_for(|l| l.starts_with("=== Round")).await.unwrap();

        let restarted = {
            let mut session = state.session().await;
            session.end_game(None);
            session.try_start(2).unwrap()
        };
        assert_ne!(restarted, generation);

        tokio::time::timeout(Duration::from_secs(5), stale)
            .await
            .expect("stale coordinator kept running")
            .unwrap();
        assert!(state.session().await.is_current(restarted));
    }
}
