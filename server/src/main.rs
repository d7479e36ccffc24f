use clap::Parser;
use log::{error, info};
use server::config::{ConfigFile, GameConfig};
use server::network::Server;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multiplayer number guessing game server", long_about = None)]
struct Args {
    /// JSON file with settings; command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind both sockets to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// TCP port of the control channel
    #[arg(long)]
    control_port: Option<u16>,

    /// UDP port for guesses
    #[arg(long)]
    guess_port: Option<u16>,

    /// Players needed to start a game
    #[arg(long)]
    min_players: Option<usize>,

    /// Maximum number of seated players
    #[arg(short, long)]
    max_players: Option<usize>,

    /// Seconds between two guesses of one player
    #[arg(long)]
    cooldown: Option<u64>,

    /// Round length in seconds
    #[arg(long)]
    round_secs: Option<u64>,

    /// Lowest possible secret
    #[arg(long, allow_negative_numbers = true)]
    low: Option<i32>,

    /// Highest possible secret
    #[arg(long, allow_negative_numbers = true)]
    high: Option<i32>,
}

impl Args {
    /// Layers defaults, the config file and these flags, in that order
    fn into_config(self) -> Result<GameConfig, Box<dyn std::error::Error>> {
        let mut config = GameConfig::default();
        if let Some(path) = &self.config {
            info!("Loading settings from {}", path.display());
            ConfigFile::load(path)?.apply(&mut config);
        }

        if let Some(host) = self.host {
            config.bind_address = host;
        }
        if let Some(port) = self.control_port {
            config.control_port = port;
        }
        if let Some(port) = self.guess_port {
            config.guess_port = port;
        }
        if let Some(min) = self.min_players {
            config.min_players = min;
        }
        if let Some(max) = self.max_players {
            config.max_players = max;
        }
        if let Some(secs) = self.cooldown {
            config.guess_cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = self.round_secs {
            config.round_duration = Duration::from_secs(secs);
        }
        if let Some(low) = self.low {
            config.guess_range.low = low;
        }
        if let Some(high) = self.high {
            config.guess_range.high = high;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;
    info!(
        "Starting server: {} to {} players, guesses {}..={}, {}s rounds",
        config.min_players,
        config.max_players,
        config.guess_range.low,
        config.guess_range.high,
        config.round_duration.as_secs()
    );

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
