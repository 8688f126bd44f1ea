use std::io::BufRead;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::warn;

use symphony_control_lib::config::ControllerConfig;
use symphony_control_lib::control_interface::{
    Area, CliPowerState, ControlInterface, Intensity, LightingCommand,
};
use symphony_control_lib::util::discovery::{DiscoveredController, Discovery};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli).await
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "symphony_control",
    about = "Controls Light Symphony lighting controllers",
    version
)]
pub struct Cli {
    /// IP address of the controller; discovered by broadcast when omitted
    #[clap(long, global = true, env = "SYMPHONY_IP")]
    pub ip: Option<Ipv4Addr>,

    /// Broadcast address used for discovery
    #[clap(long, global = true, env = "SYMPHONY_BROADCAST")]
    pub broadcast: Option<Ipv4Addr>,

    /// Controller configuration file (YAML or JSON)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats for the `discover` command.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Finds the controller on the local network.
    #[clap(name = "discover")]
    Discover {
        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
    /// Turns every area on or off.
    #[clap(name = "all")]
    All {
        #[clap(value_enum)]
        state: CliPowerState,
    },
    /// Turns one area on or off. Area 0 addresses every area.
    #[clap(name = "area")]
    Area {
        area: u8,
        #[clap(value_enum)]
        state: CliPowerState,
    },
    /// Sets an area's intensity (1-10).
    #[clap(name = "intensity")]
    Intensity { area: u8, level: u8 },
    /// Sets an area's brightness as a percentage, rounded down to intensity steps.
    #[clap(name = "brightness")]
    Brightness { area: u8, percent: u8 },
    /// Reads commands from stdin, one per line, and sends them in order.
    #[clap(name = "batch")]
    Batch,
}

fn load_config(cli: &Cli) -> Result<ControllerConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config_file(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(ip) = cli.ip {
        config.ip_address = Some(ip);
    }
    if let Some(broadcast) = cli.broadcast {
        config.broadcast_address = broadcast;
    }
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ControllerConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON config {}", path.display()))?,
        _ => serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config {}", path.display()))?,
    };
    Ok(config)
}

async fn handle_cli(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Discover { output } => {
            let ip_address = Discovery::discover(&config).await?;
            let controller = DiscoveredController { ip_address };
            match output {
                OutputFormat::Plaintext => {
                    Discovery::pretty_print(&controller, config.command_port);
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string(&controller)?;
                    println!("{}", json);
                }
                OutputFormat::Yaml => {
                    let yaml = serde_yaml::to_string(&controller)?;
                    println!("{}", yaml);
                }
            }
        }
        Commands::All { state } => {
            let control = ControlInterface::new(config);
            control.set_all(state.into()).await?;
            println!("All areas turned {:?}", state);
        }
        Commands::Area { area, state } => {
            let control = ControlInterface::new(config);
            if area == 0 {
                control.set_all(state.into()).await?;
                println!("All areas turned {:?}", state);
            } else {
                control.set_area(area, state.into())?.await?;
                println!("Area {} turned {:?}", area, state);
            }
        }
        Commands::Intensity { area, level } => {
            let control = ControlInterface::new(config);
            control.set_intensity(area, level)?.await?;
            println!("Area {} intensity set to {}", area, level);
        }
        Commands::Brightness { area, percent } => {
            let command = brightness_command(area, percent)?;
            let control = ControlInterface::new(config);
            control.send_command(command).await?;
            println!("Area {} brightness set to {}% ({})", area, percent, command);
        }
        Commands::Batch => {
            let commands = read_batch(std::io::stdin().lock())?;
            let control = ControlInterface::new(config);
            run_batch(&control, commands).await?;
        }
    }

    Ok(())
}

/// Maps a brightness percentage onto an intensity command, checking the area first.
fn brightness_command(area: u8, percent: u8) -> Result<LightingCommand> {
    if percent > 100 {
        bail!("Brightness {} is invalid, must be between 0 and 100", percent);
    }
    let area = Area::new(area)?;
    let intensity = Intensity::from_brightness(percent)?;
    Ok(LightingCommand::Intensity { area, intensity })
}

/// Parses one command per line, skipping blank lines and `#` comments.
fn read_batch<R: BufRead>(reader: R) -> Result<Vec<LightingCommand>> {
    let mut commands = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command = line
            .parse::<LightingCommand>()
            .map_err(|e| anyhow!("line {}: {}", index + 1, e))?;
        commands.push(command);
    }
    Ok(commands)
}

async fn run_batch(control: &ControlInterface, commands: Vec<LightingCommand>) -> Result<()> {
    // Queue everything first; the controller interface sends them in order.
    let pending: Vec<_> = commands
        .into_iter()
        .map(|command| (command, control.send_command(command)))
        .collect();

    let mut failures = 0;
    for (command, result) in pending {
        match result.await {
            Ok(()) => println!("{}: ok", command),
            Err(e) => {
                warn!("{} failed: {}", command, e);
                println!("{}: {}", command, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} command(s) failed", failures);
    }
    Ok(())
}
