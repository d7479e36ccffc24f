//! Disconnect detection and the lone-survivor negotiation
//!
//! Each seated player gets a monitor task that probes the control channel on
//! a fixed interval. Probe failures and broadcast delivery failures both end
//! up in [`ServerState::depart`], which removes the player under the lock
//! and reports the departure only to whichever path got there first.
//!
//! When a departure leaves a single player in a running game, the survivor is
//! asked whether to continue. The exchange runs on its own task with a
//! bounded deadline and never holds the game lock while waiting.

use crate::control::ControlHandle;
use crate::game::{Continuation, Departure, GameSession, SurvivorDecision};
use crate::player_registry::{PlayerId, PlayerRef};
use crate::state::ServerState;
use log::{debug, info, warn};
use shared::{
    continue_alone_notice, disconnect_notice, is_affirmative, prompt_line, ENDED_BY_SURVIVOR,
    LONE_SURVIVOR_QUESTION, NOT_ENOUGH_PLAYERS, SURVIVOR_SILENT,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{interval, Instant, MissedTickBehavior};

impl ServerState {
    /// Probes `name`'s control channel until it fails or the player is gone
    pub async fn monitor_player(self: Arc<Self>, name: String, id: PlayerId, control: ControlHandle) {
        let mut ticker = interval(self.config.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if !self.session().await.registry().contains(&name, id) {
                debug!("Monitor for {} stopping, player already removed", name);
                return;
            }

            if control.probe().is_err() {
                info!("Lost control channel of {}", name);
                self.depart(&name, id).await;
                return;
            }
        }
    }

    /// Removes a player and runs the disconnect protocol. Idempotent.
    pub async fn depart(self: &Arc<Self>, name: &str, id: PlayerId) {
        let departure = {
            let mut session = self.session().await;
            self.depart_locked(&mut session, name, id)
        };
        if let Some(departure) = departure {
            let notices = self.settle(departure);
            self.announce(notices).await;
        }
    }

    pub(crate) fn depart_locked(
        &self,
        session: &mut GameSession,
        name: &str,
        id: PlayerId,
    ) -> Option<Departure> {
        session.depart(
            name,
            id,
            self.config.min_players,
            self.config.prompt_timeout,
            Instant::now(),
        )
    }

    /// Turns a departure into the announcements it owes and starts the
    /// survivor prompt when one is due
    pub(crate) fn settle(self: &Arc<Self>, departure: Departure) -> VecDeque<String> {
        let name = &departure.player.name;
        info!("{} ({}) has disconnected", name, departure.player.control_addr);
        departure.player.control.close();

        let mut notices = VecDeque::from([disconnect_notice(name)]);
        match departure.continuation {
            Continuation::Unaffected => {}
            Continuation::EndGame => {
                info!("Game ended: too few players after {} left", name);
                notices.push_back(NOT_ENOUGH_PLAYERS.to_string());
            }
            Continuation::AskSurvivor {
                survivor,
                generation,
                prompt,
                cancelled,
            } => {
                let state = Arc::clone(self);
                tokio::spawn(state.ask_survivor(survivor, generation, prompt, cancelled));
            }
        }
        notices
    }

    async fn ask_survivor(
        self: Arc<Self>,
        survivor: PlayerRef,
        generation: u64,
        prompt: u64,
        cancelled: oneshot::Receiver<()>,
    ) {
        info!("Asking {} whether to continue alone", survivor.name);
        if survivor
            .control
            .send_line(&prompt_line(LONE_SURVIVOR_QUESTION))
            .is_err()
        {
            self.depart(&survivor.name, survivor.id).await;
            return;
        }

        let reply = tokio::select! {
            reply = survivor.control.read_reply(self.config.prompt_timeout) => reply,
            _ = cancelled => {
                debug!("Prompt {} to {} withdrawn", prompt, survivor.name);
                return;
            }
        };
        let accepted = reply.as_deref().is_some_and(is_affirmative);
        let decision = self
            .session()
            .await
            .resolve_survivor(generation, survivor.id, prompt, accepted);

        match decision {
            SurvivorDecision::Continue => {
                info!("{} continues alone", survivor.name);
                self.broadcast(&continue_alone_notice(&survivor.name)).await;
            }
            SurvivorDecision::Ended => {
                let notice = if reply.is_some() {
                    ENDED_BY_SURVIVOR
                } else {
                    SURVIVOR_SILENT
                };
                info!("Game ended by lone survivor {}: {}", survivor.name, notice);
                self.broadcast(notice).await;
                // The survivor leaves with the game they ended
                self.depart(&survivor.name, survivor.id).await;
            }
            SurvivorDecision::Moot => {
                warn!(
                    "Ignoring answer from {}, the game moved on while waiting",
                    survivor.name
                );
            }
        }
    }
}
