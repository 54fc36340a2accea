use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    app::{load_config, BusKind, BusSettings, Config},
    cli::{handle_command, Cli},
    gateway::{write_replies, Gateway, Inbound, LineInbound},
    provider::{OpenAiProvider, Provider},
    transport::{InMemoryBus, NatsTransport, Topic, Transport},
};

/// Main runtime orchestrator
pub struct Orchestrator {
    cli: Cli,
    config: Config,
}

impl Orchestrator {
    /// Create a new orchestrator from CLI args
    pub fn new(cli: Cli) -> Result<Self> {
        let mut config = match load_config(cli.config.as_deref()) {
            Ok(cfg) => cfg,
            // An explicit file that fails to load is fatal, ambient ones are not
            Err(e) if cli.config.is_some() => return Err(e),
            Err(e) => {
                warn!("Failed to load config: {:#}. Using defaults.", e);
                Config::default()
            }
        };
        cli.apply_overrides(&mut config);

        Ok(Self { cli, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the orchestrator
    pub async fn run(self) -> Result<()> {
        if let Some(command) = &self.cli.command {
            if handle_command(command, &self.config).await? {
                return Ok(());
            }
        }

        self.serve().await
    }

    /// Serve JSON-lines requests from stdin until EOF or Ctrl-C
    async fn serve(self) -> Result<()> {
        let config = self.config;
        let credential = config.provider.api_key()?;
        let provider: Arc<dyn Provider> = Arc::new(OpenAiProvider::new(&config.provider)?);

        if self.cli.skip_ping {
            info!("skipping provider ping");
        } else {
            provider
                .ping(&credential)
                .await
                .with_context(|| format!("Provider at {} is not reachable", config.provider.base_url))?;
            info!(provider = provider.name(), "provider reachable");
        }

        let transport = build_transport(&config.bus);
        let shutdown = CancellationToken::new();
        let gateway = Arc::new(Gateway::new(
            &config,
            provider,
            transport,
            &credential,
            shutdown.clone(),
        ));
        gateway.start()?;

        eprintln!(
            "Starting chatgate: {} workers, {} conversations, bus {}",
            config.dispatcher.workers.to_string().green(),
            config.sessions.capacity.to_string().green(),
            format!("{:?}", config.bus.kind).to_lowercase().cyan()
        );

        let interrupt = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                interrupt.cancel();
            }
        });

        let capacity = config.inbound.message_queue_capacity;
        let requests = LineInbound::new(BufReader::new(tokio::io::stdin())).listen(capacity, shutdown.clone());
        let (reply_tx, reply_rx) = mpsc::channel(capacity.max(1));
        let writer = tokio::spawn(write_replies(tokio::io::stdout(), reply_rx));

        Arc::clone(&gateway).run(requests, reply_tx).await;
        gateway.shutdown().await;

        writer.await.context("Reply writer panicked")??;
        info!("chatgate stopped");
        Ok(())
    }
}

/// Pick the bus implementation named by `settings`
pub fn build_transport(settings: &BusSettings) -> Arc<dyn Transport> {
    match settings.kind {
        BusKind::Memory => {
            info!(topic = %settings.topic, "publishing to in-memory bus");
            Arc::new(InMemoryBus::with_topics([Topic::new(settings.topic.clone())]))
        }
        BusKind::Nats => {
            info!(
                url = %settings.url,
                timeout = ?Duration::from_millis(settings.write_timeout_ms),
                "publishing to NATS"
            );
            Arc::new(NatsTransport::from_settings(settings))
        }
    }
}
