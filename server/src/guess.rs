//! Guess validation and scoring
//!
//! Each datagram is evaluated in a single critical section, so the winner
//! flag is checked and set atomically: once one guess is `Correct!`, every
//! later guess in that round sees the flag.

use crate::config::GuessRange;
use crate::game::GameSession;
use crate::state::ServerState;
use log::{debug, info};
use shared::{winner_notice, GuessReply, GuessRequest};
use std::cmp::Ordering;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Per-guess rules taken from the configuration
#[derive(Debug, Clone, Copy)]
pub struct GuessRules {
    pub range: GuessRange,
    pub cooldown: Duration,
}

/// The answer to one datagram plus what the whole table must hear
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessVerdict {
    pub reply: GuessReply,
    pub announcement: Option<String>,
}

impl GuessVerdict {
    fn reply(reply: GuessReply) -> Self {
        Self {
            reply,
            announcement: None,
        }
    }
}

impl GameSession {
    /// Evaluates a guess against the open round
    pub fn evaluate_guess(
        &mut self,
        request: &GuessRequest,
        from: SocketAddr,
        rules: &GuessRules,
        now: Instant,
    ) -> GuessVerdict {
        let Some(round) = self.round.as_mut() else {
            return GuessVerdict::reply(GuessReply::NotActive);
        };
        let Some(player) = self.registry.get_mut(&request.name) else {
            return GuessVerdict::reply(GuessReply::NotActive);
        };
        if round.winner.is_some() {
            return GuessVerdict::reply(GuessReply::AlreadyWon);
        }

        if player.guess_addr != Some(from) {
            debug!("Guesses from {} now arrive from {}", player.name, from);
            player.guess_addr = Some(from);
        }

        if let Some(last) = player.last_guess {
            let since = now.saturating_duration_since(last);
            if since < rules.cooldown {
                let wait = rules.cooldown - since;
                return GuessVerdict::reply(GuessReply::TooSoon {
                    wait_secs: wait.as_secs_f64().ceil() as u64,
                });
            }
        }

        let Ok(value) = request.guess.trim().parse::<i32>() else {
            return GuessVerdict::reply(GuessReply::InvalidFormat);
        };
        if !rules.range.contains(value) {
            return GuessVerdict::reply(GuessReply::OutOfBounds);
        }

        player.last_guess = Some(now);
        match value.cmp(&round.secret) {
            Ordering::Less => GuessVerdict::reply(GuessReply::Higher),
            Ordering::Greater => GuessVerdict::reply(GuessReply::Lower),
            Ordering::Equal => {
                round.winner = Some(player.name.clone());
                player.score += 1;
                info!(
                    "{} won round {} with {} (score {})",
                    player.name, round.number, value, player.score
                );
                GuessVerdict {
                    reply: GuessReply::Correct,
                    announcement: Some(winner_notice(&player.name, round.secret)),
                }
            }
        }
    }
}

impl ServerState {
    pub fn guess_rules(&self) -> GuessRules {
        GuessRules {
            range: self.config.guess_range,
            cooldown: self.config.guess_cooldown,
        }
    }

    /// Answers one guess; a winning guess is announced on the control channel
    pub async fn process_guess(self: &Arc<Self>, request: &GuessRequest, from: SocketAddr) -> GuessReply {
        let rules = self.guess_rules();
        let (verdict, failed) = {
            let mut session = self.session().await;
            let verdict = session.evaluate_guess(request, from, &rules, Instant::now());
            // Queued before the lock drops so the score summary cannot overtake it
            let failed = match &verdict.announcement {
                Some(announcement) => session.deliver(announcement),
                None => Vec::new(),
            };
            (verdict, failed)
        };

        if verdict.announcement.is_some() {
            let notices = self.prune(failed).await;
            self.announce(notices).await;
            self.round_wake.notify_one();
        }
        verdict.reply
    }

    /// Parses a raw datagram and answers it. Datagrams without a `name:`
    /// prefix get no reply.
    pub async fn handle_datagram(self: &Arc<Self>, datagram: &str, from: SocketAddr) -> Option<GuessReply> {
        let Some(request) = GuessRequest::parse(datagram) else {
            debug!("Dropping malformed datagram from {}: {:?}", from, datagram);
            return None;
        };
        Some(self.process_guess(&request, from).await)
    }
}
