use clap::Parser;
use client::input;
use client::network::{Client, ClientConfig};
use log::info;
use shared::{DEFAULT_CONTROL_PORT, DEFAULT_GUESS_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1")]
    server: String,

    /// TCP port of the control channel
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// UDP port for guesses
    #[arg(long, default_value_t = DEFAULT_GUESS_PORT)]
    guess_port: u16,

    /// Player name; asked for on stdin when missing
    #[arg(short, long)]
    name: Option<String>,

    /// Seconds to wait for a guess reply before re-sending
    #[arg(long, default_value = "5")]
    reply_timeout: u64,

    /// How often an unanswered guess is re-sent
    #[arg(short, long, default_value = "2")]
    retries: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut stdin = input::spawn_stdin_reader();

    let name = match args.name {
        Some(name) => name,
        None => {
            println!("Enter your username:");
            input::next_nonempty(&mut stdin)
                .await
                .ok_or("no username given")?
        }
    };

    let config = ClientConfig {
        server: args.server,
        control_port: args.control_port,
        guess_port: args.guess_port,
        reply_timeout: Duration::from_secs(args.reply_timeout),
        retries: args.retries,
    };

    info!("Connecting to {} as {}", config.server, name);
    info!("Type a number to guess, 'exit' to quit");

    let client = Client::connect(&config, &name).await?;
    client.run(stdin).await?;

    Ok(())
}
