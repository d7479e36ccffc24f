use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_CONTROL_PORT: u16 = 6000;
pub const DEFAULT_GUESS_PORT: u16 = 6001;
pub const MAX_DATAGRAM_SIZE: usize = 1024;

pub const JOIN_COMMAND: &str = "JOIN";
pub const PROMPT_PREFIX: &str = "[PROMPT]:";
pub const AFFIRMATIVE: &str = "yes";

pub const GREETING: &str = "Welcome! Please join with 'JOIN <username>'";
pub const ROUND_OPEN_MARKER: &str = "Guess a number between";
pub const LONE_SURVIVOR_QUESTION: &str =
    "You are the only one left. Do you want to continue? (yes/no)";
pub const NOT_ENOUGH_PLAYERS: &str = "Not enough players to continue. Ending game.";
pub const ENDED_BY_SURVIVOR: &str = "Game ended by the remaining player.";
pub const SURVIVOR_SILENT: &str = "No response from the remaining player. Ending game.";

/// Extracts the player name from a `JOIN <name>` line.
///
/// Names must be a single token without `:`, since the guess datagram uses
/// the first colon as its separator.
pub fn parse_join(line: &str) -> Option<&str> {
    let mut parts = line.trim().splitn(2, ' ');
    if parts.next()? != JOIN_COMMAND {
        return None;
    }
    let name = parts.next()?.trim();
    if name.is_empty() || name.contains(':') || name.contains(char::is_whitespace) {
        return None;
    }
    Some(name)
}

pub fn join_line(name: &str) -> String {
    format!("{} {}", JOIN_COMMAND, name)
}

pub fn prompt_line(question: &str) -> String {
    format!("{}{}", PROMPT_PREFIX, question)
}

/// Returns the question carried by a `[PROMPT]:` line.
pub fn parse_prompt(line: &str) -> Option<&str> {
    line.strip_prefix(PROMPT_PREFIX)
}

pub fn is_affirmative(reply: &str) -> bool {
    reply.trim().eq_ignore_ascii_case(AFFIRMATIVE)
}

/// A `name:guessText` datagram from the guess channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessRequest {
    pub name: String,
    pub guess: String,
}

impl GuessRequest {
    pub fn new(name: impl Into<String>, guess: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guess: guess.into(),
        }
    }

    /// Splits a datagram on its first `:`. Returns None when there is no separator.
    pub fn parse(datagram: &str) -> Option<Self> {
        let (name, guess) = datagram.trim().split_once(':')?;
        Some(Self::new(name, guess))
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.name, self.guess)
    }
}

/// Every reply the server sends on the guess channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessReply {
    Higher,
    Lower,
    Correct,
    OutOfBounds,
    InvalidFormat,
    TooSoon { wait_secs: u64 },
    AlreadyWon,
    NotActive,
}

impl GuessReply {
    /// Whether the reply ends the player's attempts for this round.
    pub fn is_final(&self) -> bool {
        matches!(self, GuessReply::Correct | GuessReply::AlreadyWon)
    }
}

impl fmt::Display for GuessReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuessReply::Higher => write!(f, "Higher"),
            GuessReply::Lower => write!(f, "Lower"),
            GuessReply::Correct => write!(f, "Correct!"),
            GuessReply::OutOfBounds => write!(f, "Out of bounds!"),
            GuessReply::InvalidFormat => write!(f, "Invalid guess format."),
            GuessReply::TooSoon { wait_secs } => {
                write!(f, "Too soon! Wait {} seconds before next guess.", wait_secs)
            }
            GuessReply::AlreadyWon => write!(f, "Game already won."),
            GuessReply::NotActive => write!(f, "Game not active or player not registered."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised guess reply: {0:?}")]
pub struct UnknownReply(pub String);

impl FromStr for GuessReply {
    type Err = UnknownReply;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let reply = match s {
            "Higher" => GuessReply::Higher,
            "Lower" => GuessReply::Lower,
            "Correct!" => GuessReply::Correct,
            "Out of bounds!" => GuessReply::OutOfBounds,
            "Invalid guess format." => GuessReply::InvalidFormat,
            "Game already won." => GuessReply::AlreadyWon,
            "Game not active or player not registered." => GuessReply::NotActive,
            _ => {
                let wait_secs = s
                    .strip_prefix("Too soon! Wait ")
                    .and_then(|rest| rest.strip_suffix(" seconds before next guess."))
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| UnknownReply(s.to_string()))?;
                GuessReply::TooSoon { wait_secs }
            }
        };
        Ok(reply)
    }
}

pub fn hello_line(name: &str) -> String {
    format!("Hello {}! You have joined the game.", name)
}

pub fn joined_notice(name: &str, game_running: bool) -> String {
    if game_running {
        format!("{} joined the game.", name)
    } else {
        format!("{} joined. Waiting for more players...", name)
    }
}

pub fn disconnect_notice(name: &str) -> String {
    format!("**{} has disconnected from the game.**", name)
}

pub fn is_disconnect_notice(line: &str) -> bool {
    line.contains("has disconnected from the game")
}

pub fn continue_alone_notice(name: &str) -> String {
    format!("{} chose to continue alone.", name)
}

pub fn round_banner(
    number: u32,
    roster: &[String],
    low: i32,
    high: i32,
    cooldown_secs: u64,
    duration_secs: u64,
) -> String {
    format!(
        "=== Round {} ===\nPlayers: {}\nGame started!\n{} {} and {}.\nOne guess every {} seconds, {} seconds on the clock.",
        number,
        roster.join(", "),
        ROUND_OPEN_MARKER,
        low,
        high,
        cooldown_secs,
        duration_secs
    )
}

pub fn time_remaining_notice(secs: u64) -> String {
    format!("Time remaining: {} seconds.", secs)
}

pub fn time_up_notice(secret: i32) -> String {
    format!("Time's up! No one guessed the number. It was {}.", secret)
}

pub fn winner_notice(name: &str, secret: i32) -> String {
    format!("{} guessed the number {} correctly!", name, secret)
}

pub fn score_summary(scores: &[(String, u32)]) -> String {
    let mut summary = String::from("=== Scores ===");
    for (name, score) in scores {
        summary.push_str(&format!("\n{}: {}", name, score));
    }
    summary
}

/// Lines that close the guessing window on the client side.
pub fn closes_round(line: &str) -> bool {
    line.starts_with("Time's up!")
        || line.ends_with("correctly!")
        || line == NOT_ENOUGH_PLAYERS
        || line == ENDED_BY_SURVIVOR
        || line == SURVIVOR_SILENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join_accepts_single_token() {
        assert_eq!(parse_join("JOIN alice"), Some("alice"));
        assert_eq!(parse_join("JOIN alice\r\n"), Some("alice"));
        assert_eq!(parse_join(&join_line("bob")), Some("bob"));
    }

    #[test]
    fn test_parse_join_rejects_malformed() {
        assert_eq!(parse_join("HELLO alice"), None);
        assert_eq!(parse_join("JOIN"), None);
        assert_eq!(parse_join("JOIN "), None);
        assert_eq!(parse_join("JOIN a:b"), None);
        assert_eq!(parse_join("JOIN two words"), None);
        assert_eq!(parse_join("join alice"), None);
    }

    #[test]
    fn test_prompt_framing() {
        let line = prompt_line(LONE_SURVIVOR_QUESTION);
        assert!(line.starts_with("[PROMPT]:"));
        assert_eq!(parse_prompt(&line), Some(LONE_SURVIVOR_QUESTION));
        assert_eq!(parse_prompt("Higher"), None);
    }

    #[test]
    fn test_affirmative_is_case_insensitive_exact_match() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative(" YES \n"));
        assert!(is_affirmative("Yes"));
        assert!(!is_affirmative("y"));
        assert!(!is_affirmative("yes please"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative(""));
    }

    #[test]
    fn test_guess_request_splits_on_first_colon() {
        let request = GuessRequest::parse("alice:42\n").unwrap();
        assert_eq!(request.name, "alice");
        assert_eq!(request.guess, "42");

        let request = GuessRequest::parse("alice:4:2").unwrap();
        assert_eq!(request.guess, "4:2");

        assert!(GuessRequest::parse("alice42").is_none());
        assert_eq!(GuessRequest::new("bob", "7").encode(), "bob:7");
    }

    #[test]
    fn test_guess_reply_wire_text() {
        assert_eq!(GuessReply::Higher.to_string(), "Higher");
        assert_eq!(GuessReply::Correct.to_string(), "Correct!");
        assert_eq!(
            GuessReply::TooSoon { wait_secs: 7 }.to_string(),
            "Too soon! Wait 7 seconds before next guess."
        );
        assert_eq!(
            GuessReply::NotActive.to_string(),
            "Game not active or player not registered."
        );
    }

    #[test]
    fn test_guess_reply_parses_server_text() {
        let replies = [
            GuessReply::Higher,
            GuessReply::Lower,
            GuessReply::Correct,
            GuessReply::OutOfBounds,
            GuessReply::InvalidFormat,
            GuessReply::TooSoon { wait_secs: 3 },
            GuessReply::AlreadyWon,
            GuessReply::NotActive,
        ];
        for reply in replies {
            assert_eq!(reply.to_string().parse::<GuessReply>(), Ok(reply));
        }
        let err = "Maybe".parse::<GuessReply>().unwrap_err();
        assert_eq!(err.to_string(), "unrecognised guess reply: \"Maybe\"");
        assert!("Too soon! Wait x seconds before next guess."
            .parse::<GuessReply>()
            .is_err());
    }

    #[test]
    fn test_round_banner_lines() {
        let roster = vec!["alice".to_string(), "bob".to_string()];
        let banner = round_banner(3, &roster, 1, 100, 10, 60);
        let lines: Vec<&str> = banner.lines().collect();
        assert_eq!(lines[0], "=== Round 3 ===");
        assert_eq!(lines[1], "Players: alice, bob");
        assert_eq!(lines[3], "Guess a number between 1 and 100.");
        assert!(lines[4].contains("10 seconds"));
        assert!(lines[4].contains("60 seconds"));
    }

    #[test]
    fn test_score_summary_lists_players_in_order() {
        let scores = vec![("alice".to_string(), 2), ("bob".to_string(), 0)];
        assert_eq!(score_summary(&scores), "=== Scores ===\nalice: 2\nbob: 0");
        assert_eq!(score_summary(&[]), "=== Scores ===");
    }

    #[test]
    fn test_round_closing_lines() {
        assert!(closes_round(&time_up_notice(5)));
        assert!(closes_round(&winner_notice("alice", 5)));
        assert!(closes_round(NOT_ENOUGH_PLAYERS));
        assert!(!closes_round("Time remaining: 10 seconds."));
        assert!(is_disconnect_notice(&disconnect_notice("bob")));
    }
}
