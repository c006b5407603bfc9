//! LED PWM Control Tool
//!
//! CLI for the LED device node, and the controller end of the command relay.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ledpwm_client::{DeviceClient, DEFAULT_NODE_PATH};
use ledpwm_hw::relay::{self, CommandFrame};
use ledpwm_hw::{ChannelId, ChannelState, ChannelTable, Field, CHANNEL_COUNT};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledpwmctl")]
#[command(about = "Control tool for the LED PWM device")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Device node path
    #[arg(long, default_value = DEFAULT_NODE_PATH)]
    node: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the whole channel table
    Table {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one field of a channel
    Get {
        /// Channel (0-3)
        channel: u8,
        /// Field: on, duty, period
        field: String,
    },
    /// Set one field of a channel
    Set {
        /// Channel (0-3)
        channel: u8,
        /// Field: on, duty, period
        field: String,
        /// New value
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },
    /// Replace the whole table, one ENABLED,DUTY,PERIOD triple per channel
    Write {
        #[arg(num_args = CHANNEL_COUNT, required = true)]
        channels: Vec<String>,
    },
    /// Send a command frame to a board relay that connects to us
    Remote {
        /// Address to accept the relay connection on
        #[arg(long, default_value = "0.0.0.0:4323")]
        listen: String,

        #[command(subcommand)]
        action: RemoteCommands,
    },
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// Read one field of a remote channel
    Get {
        /// Channel (0-3)
        channel: u8,
        /// Field: on, duty, period
        field: String,
    },
    /// Set one field of a remote channel
    Set {
        /// Channel (0-3)
        channel: u8,
        /// Field: on, duty, period
        field: String,
        /// New value
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Remote { listen, action } => handle_remote(&listen, action).await,
        command => handle_device(&cli.node, command).await,
    }
}

async fn handle_device(node: &str, command: Commands) -> Result<()> {
    let mut client = DeviceClient::connect(node)
        .await
        .context("Failed to open device node. Is ledpwmd running?")?;

    match command {
        Commands::Table { json } => {
            let table = client.read_table().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(table.channels())?);
            } else {
                print_table(&table);
            }
        }
        Commands::Get { channel, field } => {
            let (channel, field) = parse_target(channel, &field)?;
            let value = client.get(channel, field).await?;
            println!("{} {} is {}", channel, field, value);
        }
        Commands::Set {
            channel,
            field,
            value,
        } => {
            let (channel, field) = parse_target(channel, &field)?;
            client.set(channel, field, value).await?;
            println!("{} {} set to {}", channel, field, value);
        }
        Commands::Write { channels } => {
            let table = parse_table(&channels)?;
            client.write_table(&table).await?;
            println!("Channel table written");
        }
        Commands::Remote { .. } => bail!("remote commands do not use the device node"),
    }

    Ok(())
}

async fn handle_remote(listen: &str, action: RemoteCommands) -> Result<()> {
    let frame = match action {
        RemoteCommands::Get { channel, field } => {
            let (channel, field) = parse_target(channel, &field)?;
            CommandFrame::read(channel, field)
        }
        RemoteCommands::Set {
            channel,
            field,
            value,
        } => {
            let (channel, field) = parse_target(channel, &field)?;
            CommandFrame::write(channel, field, value)
        }
    };

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to listen on {}", listen))?;
    info!("Waiting for relay connection on {}", listen);
    let (mut stream, peer) = listener.accept().await?;
    info!("Relay connected from {}", peer);

    match relay::request(&mut stream, &frame).await? {
        Some(value) => println!("{} {} is {}", frame.channel, frame.field, value),
        None => println!("{} {} set to {}", frame.channel, frame.field, frame.value),
    }
    Ok(())
}

fn parse_target(channel: u8, field: &str) -> Result<(ChannelId, Field)> {
    Ok((ChannelId::try_from(channel)?, field.parse::<Field>()?))
}

/// Parses one `ENABLED,DUTY,PERIOD` triple.
fn parse_channel_state(text: &str) -> Result<ChannelState> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let [enabled, duty, period] = parts.as_slice() else {
        bail!("Expected ENABLED,DUTY,PERIOD, got {:?}", text);
    };
    let enabled = match enabled.to_lowercase().as_str() {
        "1" | "on" | "true" => true,
        "0" | "off" | "false" => false,
        other => bail!("Invalid enabled flag: {}", other),
    };
    Ok(ChannelState::new(
        enabled,
        duty.parse().with_context(|| format!("Invalid duty cycle: {}", duty))?,
        period.parse().with_context(|| format!("Invalid period: {}", period))?,
    ))
}

fn parse_table(channels: &[String]) -> Result<ChannelTable> {
    let states = channels
        .iter()
        .map(|text| parse_channel_state(text))
        .collect::<Result<Vec<_>>>()?;
    let states: [ChannelState; CHANNEL_COUNT] = match states.as_slice().try_into() {
        Ok(states) => states,
        Err(_) => bail!("Expected {} channels, got {}", CHANNEL_COUNT, states.len()),
    };
    Ok(ChannelTable::new(states))
}

fn print_table(table: &ChannelTable) {
    println!("Channel  Enabled  Duty  Period");
    for (id, state) in ChannelId::all().zip(table.channels()) {
        println!(
            "{:<8} {:<8} {:>3}%  {}ms",
            id.to_string(),
            if state.enabled { "yes" } else { "no" },
            state.duty_cycle,
            state.period
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_channel_state() {
        assert_eq!(
            parse_channel_state("1,50,1000").unwrap(),
            ChannelState::new(true, 50, 1000)
        );
        assert_eq!(
            parse_channel_state("off, 10, 4000").unwrap(),
            ChannelState::new(false, 10, 4000)
        );
        assert!(parse_channel_state("1,50").is_err());
        assert!(parse_channel_state("maybe,50,1000").is_err());
    }

    #[test]
    fn test_parse_table_needs_every_channel() {
        let channels: Vec<String> = ["1,50,250", "1,50,500", "1,50,1000", "0,0,0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let table = parse_table(&channels).unwrap();
        assert!(!table.channels()[3].enabled);
        assert!(parse_table(&channels[..3]).is_err());
    }

    #[test]
    fn test_parse_target() {
        let (channel, field) = parse_target(2, "duty").unwrap();
        assert_eq!(channel.index(), 2);
        assert_eq!(field, Field::DutyCycle);
        assert!(parse_target(4, "duty").is_err());
        assert!(parse_target(0, "colour").is_err());
    }

    #[test]
    fn test_parse_set_command() {
        let cli = Cli::try_parse_from(["ledpwmctl", "set", "0", "duty", "10"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Set { channel: 0, value: 10, .. }
        ));
    }
}
