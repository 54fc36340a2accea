use anyhow::{Context, Result};
use colored::Colorize;

use crate::{
    app::{init_config, Config},
    provider::{OpenAiProvider, Provider},
};

use super::Commands;

/// Handle CLI subcommands. Returns `false` when the caller should go on
/// serving.
pub async fn handle_command(command: &Commands, config: &Config) -> Result<bool> {
    match command {
        Commands::Serve => Ok(false),
        Commands::Ping => {
            ping_provider(config).await?;
            Ok(true)
        }
        Commands::Init { path } => {
            match init_config(path.clone())? {
                Some(written) => println!("Configuration written to {}", written.display()),
                None => println!("Configuration already exists, leaving it untouched"),
            }
            Ok(true)
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(true)
        }
        Commands::Version => {
            show_version();
            Ok(true)
        }
    }
}

/// Check the configured provider answers
pub async fn ping_provider(config: &Config) -> Result<()> {
    let credential = config.provider.api_key()?;
    let provider = OpenAiProvider::new(&config.provider)?;

    provider
        .ping(&credential)
        .await
        .with_context(|| format!("Provider at {} is not reachable", config.provider.base_url))?;

    println!(
        "  [OK] Provider: {} ({})",
        config.provider.base_url.green(),
        config.provider.model
    );
    Ok(())
}

/// Show version information
pub fn show_version() {
    println!("chatgate v{}", env!("CARGO_PKG_VERSION"));
    println!("   A conversational prompt gateway with a bounded worker pool");
}
