use thiserror::Error;

/// Why a connection was refused a seat in the game.
///
/// The `Display` text is the exact line sent back to the rejected client.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Username already taken. Use another.")]
    NameTaken,

    #[error("Game is full (max {max} players).")]
    Full { max: usize },

    #[error("Invalid command. Use 'JOIN <username>'")]
    Malformed,

    #[error("control channel failed during join: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The peer side of a control channel is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("control channel closed")]
pub struct ChannelClosed;
