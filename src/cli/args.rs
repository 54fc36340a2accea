use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::app::{BusKind, Config};

#[derive(Parser, Debug)]
#[command(name = "chatgate")]
#[command(version)]
#[command(about = "A conversational prompt gateway with a bounded worker pool", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "CHATGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Number of provider workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Per-prompt deadline in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Bus to publish answers to
    #[arg(long, value_enum)]
    pub bus: Option<BusArg>,

    /// NATS broker address
    #[arg(long)]
    pub nats_url: Option<String>,

    /// Don't check provider reachability at startup
    #[arg(long)]
    pub skip_ping: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Serve JSON-lines requests on stdin (default)
    Serve,
    /// Check that the provider is reachable
    Ping,
    /// Write a default configuration file
    Init {
        /// Where to write it (defaults to the user config directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BusArg {
    /// In-process bus
    Memory,
    /// NATS broker
    Nats,
}

impl From<BusArg> for BusKind {
    fn from(arg: BusArg) -> Self {
        match arg {
            BusArg::Memory => BusKind::Memory,
            BusArg::Nats => BusKind::Nats,
        }
    }
}

impl Cli {
    /// Flags win over every configuration source
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.dispatcher.workers = workers;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.dispatcher.prompt_timeout_ms = timeout_ms;
        }
        if let Some(bus) = self.bus {
            config.bus.kind = bus.into();
        }
        if let Some(url) = &self.nats_url {
            config.bus.url = url.clone();
        }
    }
}
