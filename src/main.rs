//! Ferry CLI
//!
//! Commands:
//!   ferry serve [--stderr]          - Run the dispatcher over standard streams
//!   ferry describe <name> [--kind]  - Resolve a name and print its descriptor
//!   ferry send <json>               - Send one raw command and print the reply

mod logging;

use clap::{Parser, Subcommand};
use ferry::wire::{self, Command, LineTransport};
use ferry::{Bridge, BridgeConfig, Kind, Value};
use ferry_guest::memory::MemoryRuntime;
use ferry_guest::Dispatcher;
use logging::LogTarget;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Bridge to a foreign runtime over a line-delimited JSON protocol", long_about = None)]
struct Cli {
    /// Bridge config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when FERRY_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve commands from stdin against the in-memory runtime
    Serve {
        /// Answer on stderr instead of stdout
        #[arg(long)]
        stderr: bool,
    },

    /// Resolve a name and print its descriptor as JSON
    Describe {
        /// Fully-qualified foreign name
        name: String,

        /// Restrict the lookup to one kind: func, class, const or global
        #[arg(long)]
        kind: Option<Kind>,
    },

    /// Send one raw command, e.g. '{"cmd":"getConst","data":"PHP_EOL"}'
    Send {
        json: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))?,
        None => BridgeConfig::default(),
    };
    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());

    match cli.command {
        Commands::Serve { stderr } => {
            // Frames own one stream, logs get the other
            let target = if stderr { LogTarget::Stdout } else { LogTarget::Stderr };
            logging::init(&log_level, target);
            serve_command(stderr)
        }
        Commands::Describe { name, kind } => {
            logging::init(&log_level, LogTarget::Stderr);
            describe_command(config, &name, kind)
        }
        Commands::Send { json } => {
            logging::init(&log_level, LogTarget::Stderr);
            send_command(config, &json)
        }
    }
}

fn serve_command(answer_on_stderr: bool) -> anyhow::Result<()> {
    // The default hook prints to stderr, which may be the response stream
    std::panic::set_hook(Box::new(|info| {
        tracing::error!(%info, "panic in dispatcher");
    }));

    let mut dispatcher = Dispatcher::new(MemoryRuntime::new());
    let reader = BufReader::new(std::io::stdin());
    let served = if answer_on_stderr {
        dispatcher.serve(&mut LineTransport::new(reader, std::io::stderr()))?
    } else {
        dispatcher.serve(&mut LineTransport::new(reader, std::io::stdout()))?
    };
    tracing::info!(served, "input closed, dispatcher stopped");
    Ok(())
}

fn describe_command(config: BridgeConfig, name: &str, kind: Option<Kind>) -> anyhow::Result<()> {
    let bridge = Bridge::in_process_with_config(MemoryRuntime::new(), config)?;
    let descriptor = match bridge.resolve(name, kind)? {
        Value::Function(function) => wire::Value::from(function.info()),
        Value::Class(class) => wire::Value::from(class.info()),
        value => value.to_wire(bridge.id())?,
    };
    let json: serde_json::Value = wire::from_value(descriptor)
        .map_err(|e| anyhow::anyhow!("Descriptor has no JSON form: {}", e))?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn send_command(config: BridgeConfig, text: &str) -> anyhow::Result<()> {
    let command: Command =
        serde_json::from_str(text).map_err(|e| anyhow::anyhow!("Invalid command: {}", e))?;
    let bridge = Bridge::in_process_with_config(MemoryRuntime::new(), config)?;
    let envelope = bridge.request(&command)?;
    println!("{}", envelope.into_json());
    Ok(())
}
