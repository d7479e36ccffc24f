//! Client-side view of the game, built only from what the server says

use shared::{
    closes_round, is_disconnect_notice, parse_prompt, GuessReply, GREETING, ROUND_OPEN_MARKER,
};

/// Lines the server sends when it refuses a join
const REJECTIONS: [&str; 3] = ["Username already taken", "Game is full", "Invalid command"];

/// What a control line meant to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Greeting,
    Joined,
    Rejected(String),
    RoundOpened,
    RoundClosed,
    /// The server asked a question; the next input line answers it
    Prompt(String),
    Disconnect(String),
    Info(String),
}

/// Where one line typed by the player should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Quit,
    AnswerPrompt(String),
    Guess(String),
    /// Guessing is closed and nothing was asked
    Ignored,
}

#[derive(Debug, Clone)]
pub struct ClientGameState {
    name: String,
    joined: bool,
    round_open: bool,
    pending_prompt: Option<String>,
    rounds_seen: u32,
    last_reply: Option<GuessReply>,
}

impl ClientGameState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            joined: false,
            round_open: false,
            pending_prompt: None,
            rounds_seen: 0,
            last_reply: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn can_guess(&self) -> bool {
        self.round_open
    }

    pub fn pending_prompt(&self) -> Option<&str> {
        self.pending_prompt.as_deref()
    }

    pub fn rounds_seen(&self) -> u32 {
        self.rounds_seen
    }

    pub fn last_reply(&self) -> Option<GuessReply> {
        self.last_reply
    }

    /// Updates the view from one control line
    pub fn handle_line(&mut self, line: &str) -> ControlEvent {
        let line = line.trim_end();

        if let Some(question) = parse_prompt(line) {
            self.pending_prompt = Some(question.to_string());
            return ControlEvent::Prompt(question.to_string());
        }
        if line == GREETING {
            return ControlEvent::Greeting;
        }
        if !self.joined {
            if line.starts_with(&format!("Hello {}!", self.name)) {
                self.joined = true;
                return ControlEvent::Joined;
            }
            if REJECTIONS.iter().any(|r| line.starts_with(r)) {
                return ControlEvent::Rejected(line.to_string());
            }
        }
        if line.starts_with(ROUND_OPEN_MARKER) {
            self.round_open = true;
            self.rounds_seen += 1;
            self.last_reply = None;
            return ControlEvent::RoundOpened;
        }
        if closes_round(line) {
            self.round_open = false;
            return ControlEvent::RoundClosed;
        }
        if is_disconnect_notice(line) {
            return ControlEvent::Disconnect(line.to_string());
        }
        ControlEvent::Info(line.to_string())
    }

    /// Routes a line typed by the player. A pending prompt takes it first.
    pub fn route_input(&mut self, input: &str) -> UserAction {
        let input = input.trim();
        if input.eq_ignore_ascii_case("exit") {
            return UserAction::Quit;
        }
        if self.pending_prompt.take().is_some() {
            return UserAction::AnswerPrompt(input.to_string());
        }
        if self.round_open && !input.is_empty() {
            return UserAction::Guess(input.to_string());
        }
        UserAction::Ignored
    }

    /// Records the server's answer to a guess
    pub fn record_reply(&mut self, reply: GuessReply) {
        if reply.is_final() || reply == GuessReply::NotActive {
            self.round_open = false;
        }
        self.last_reply = Some(reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        disconnect_notice, hello_line, prompt_line, round_banner, time_up_notice, winner_notice,
        LONE_SURVIVOR_QUESTION,
    };

    fn joined_state() -> ClientGameState {
        let mut state = ClientGameState::new("alice");
        assert_eq!(state.handle_line(GREETING), ControlEvent::Greeting);
        assert_eq!(state.handle_line(&hello_line("alice")), ControlEvent::Joined);
        state
    }

    fn open_round(state: &mut ClientGameState) {
        let roster = vec!["alice".to_string(), "bob".to_string()];
        let banner = round_banner(1, &roster, 1, 100, 10, 60);
        let events: Vec<ControlEvent> = banner.lines().map(|l| state.handle_line(l)).collect();
        assert!(events.contains(&ControlEvent::RoundOpened));
    }

    #[test]
    fn test_join_and_rejection() {
        let state = joined_state();
        assert!(state.is_joined());
        assert!(!state.can_guess());

        let mut rejected = ClientGameState::new("bob");
        let event = rejected.handle_line("Username already taken. Use another.");
        assert!(matches!(event, ControlEvent::Rejected(_)));
        assert!(!rejected.is_joined());
    }

    #[test]
    fn test_round_banner_opens_guessing() {
        let mut state = joined_state();
        assert_eq!(state.route_input("50"), UserAction::Ignored);

        open_round(&mut state);
        assert!(state.can_guess());
        assert_eq!(state.rounds_seen(), 1);
        assert_eq!(state.route_input(" 50 "), UserAction::Guess("50".to_string()));
    }

    #[test]
    fn test_round_closing_lines_stop_guessing() {
        for closing in [time_up_notice(7), winner_notice("bob", 7)] {
            let mut state = joined_state();
            open_round(&mut state);
            assert_eq!(state.handle_line(&closing), ControlEvent::RoundClosed);
            assert!(!state.can_guess());
        }
    }

    #[test]
    fn test_prompt_takes_next_input() {
        let mut state = joined_state();
        open_round(&mut state);

        let event = state.handle_line(&prompt_line(LONE_SURVIVOR_QUESTION));
        assert_eq!(event, ControlEvent::Prompt(LONE_SURVIVOR_QUESTION.to_string()));
        assert_eq!(state.pending_prompt(), Some(LONE_SURVIVOR_QUESTION));

        assert_eq!(state.route_input("yes"), UserAction::AnswerPrompt("yes".to_string()));
        assert_eq!(state.pending_prompt(), None);
        assert_eq!(state.route_input("42"), UserAction::Guess("42".to_string()));
    }

    #[test]
    fn test_exit_always_quits() {
        let mut state = joined_state();
        state.handle_line(&prompt_line(LONE_SURVIVOR_QUESTION));
        assert_eq!(state.route_input("EXIT"), UserAction::Quit);
    }

    #[test]
    fn test_disconnect_notice_is_flagged() {
        let mut state = joined_state();
        let notice = disconnect_notice("bob");
        assert_eq!(state.handle_line(&notice), ControlEvent::Disconnect(notice.clone()));
    }

    #[test]
    fn test_final_replies_close_guessing() {
        let mut state = joined_state();
        open_round(&mut state);

        state.record_reply(GuessReply::Higher);
        assert!(state.can_guess());
        state.record_reply(GuessReply::AlreadyWon);
        assert!(!state.can_guess());
        assert_eq!(state.last_reply(), Some(GuessReply::AlreadyWon));
    }
}
