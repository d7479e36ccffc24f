//! Control-channel broadcasting with self-healing delivery

use crate::game::GameSession;
use crate::player_registry::PlayerRef;
use crate::state::ServerState;
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;

impl GameSession {
    /// Enqueues `message` for every seated player and returns the players
    /// whose channel is already gone
    ///
    /// Runs under the game lock, so anything broadcast later is queued
    /// behind it on every channel.
    pub(crate) fn deliver(&self, message: &str) -> Vec<PlayerRef> {
        let recipients = self.registry().snapshot();
        debug!("Broadcasting to {} players: {:?}", recipients.len(), message);
        recipients
            .into_iter()
            .filter(|player| player.control.send_line(message).is_err())
            .collect()
    }
}

impl ServerState {
    /// Sends `message` to every seated player
    ///
    /// A player whose handle fails is removed through the same departure path
    /// the disconnect monitor uses, and the resulting notices are delivered
    /// to whoever is left before this call returns.
    pub async fn broadcast(self: &Arc<Self>, message: &str) {
        self.announce(VecDeque::from([message.to_string()])).await;
    }

    /// Delivers queued announcements in order, appending the ones produced by
    /// departures discovered along the way
    pub(crate) async fn announce(self: &Arc<Self>, mut queue: VecDeque<String>) {
        while let Some(message) = queue.pop_front() {
            let failed = self.session().await.deliver(&message);
            let notices = self.prune(failed).await;
            queue.extend(notices);
        }
    }

    /// Runs the departure path for players a delivery failed on, returning
    /// the notices those departures owe
    pub(crate) async fn prune(self: &Arc<Self>, failed: Vec<PlayerRef>) -> VecDeque<String> {
        let mut notices = VecDeque::new();
        for player in failed {
            warn!("Delivery to {} failed, treating as disconnect", player.name);
            let departure = {
                let mut session = self.session().await;
                self.depart_locked(&mut session, &player.name, player.id)
            };
            if let Some(departure) = departure {
                notices.extend(self.settle(departure));
            }
        }
        notices
    }
}
