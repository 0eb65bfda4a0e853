mod logging;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::logging::{init_logging, LogFormat, LogLevel};
use pmr171_core::config::BridgeConfig;
use pmr171_core::protocol::{list_ports, DeviceChannel, PortInfo};
use pmr171_core::rigctl::RigctlServer;

#[derive(Parser, Debug)]
#[command(name = "pmr171-bridge", version, about = "rigctl bridge for the PMR-171")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, value_name = "FILE", global = true, env = "PMR171_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports.
    Ports,
    /// Open the radio and serve rigctl clients until Ctrl+C.
    Run(RunArgs),
    /// Write the effective configuration to a JSON file.
    SaveConfig(SaveConfigArgs),
}

#[derive(Args, Debug)]
struct SaveConfigArgs {
    /// Destination file.
    #[arg(value_name = "FILE")]
    path: PathBuf,

    #[command(flatten)]
    overrides: RunArgs,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Serial port name or tcp://host:port.
    #[arg(long, value_name = "PORT")]
    port: Option<String>,

    /// Serial baud rate.
    #[arg(long, value_name = "BAUD")]
    baud: Option<u32>,

    /// rigctl listen address.
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,
}

impl RunArgs {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(port) = &self.port {
            config.serial.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(BridgeConfig::default()),
    }
}

fn save_config(mut config: BridgeConfig, args: &SaveConfigArgs) -> Result<()> {
    args.overrides.apply(&mut config);
    config.validate()?;
    config
        .save(&args.path)
        .with_context(|| format!("failed to write config {}", args.path.display()))?;
    info!(path = %args.path.display(), "configuration saved");
    Ok(())
}

fn print_ports(ports: &[PortInfo], out: &mut impl Write) -> io::Result<()> {
    for (i, port) in ports.iter().enumerate() {
        writeln!(out, "{}: {}", i + 1, port)?;
    }
    Ok(())
}

/// Ask the operator to pick one of `ports` by its 1-based number
fn select_port(ports: &[PortInfo], input: &mut impl BufRead, out: &mut impl Write) -> Result<String> {
    if ports.is_empty() {
        bail!("no serial ports found");
    }
    writeln!(out, "Available serial ports:")?;
    print_ports(ports, out)?;

    let mut line = String::new();
    loop {
        write!(out, "Select port number: ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            bail!("no port selected");
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=ports.len()).contains(&n) => return Ok(ports[n - 1].name.clone()),
            Ok(_) => writeln!(out, "Invalid number, try again.")?,
            Err(_) => writeln!(out, "Please enter a number.")?,
        }
    }
}

async fn run(config: BridgeConfig) -> Result<()> {
    let serial = config.serial.clone();
    let channel_config = config.channel_config();

    let channel = tokio::task::spawn_blocking(move || -> Result<DeviceChannel> {
        let endpoint = match serial.port {
            Some(port) => port,
            None => select_port(&list_ports(), &mut io::stdin().lock(), &mut io::stdout())?,
        };
        info!(%endpoint, baud = serial.baud_rate, "opening radio link");
        DeviceChannel::open(&endpoint, serial.baud_rate, channel_config)
            .with_context(|| format!("failed to open {endpoint}"))
    })
    .await??;

    let channel = Arc::new(channel);
    let server = RigctlServer::bind(config.server.listen, Arc::clone(&channel))
        .await
        .with_context(|| format!("failed to listen on {}", config.server.listen))?;

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    info!(stats = %channel.stats()?, "radio link closed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let mut config = load_config(cli.config.as_ref())?;
    match cli.command {
        Command::Ports => {
            let ports = list_ports();
            if ports.is_empty() {
                println!("No serial ports found.");
            }
            print_ports(&ports, &mut io::stdout())?;
            Ok(())
        }
        Command::Run(args) => {
            args.apply(&mut config);
            config.validate()?;
            run(config).await
        }
        Command::SaveConfig(args) => save_config(config, &args),
    }
}
