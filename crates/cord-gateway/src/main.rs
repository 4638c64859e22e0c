//! cord - gateway client
//!
//! Connects a bot token to the gateway and logs every event it receives.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cord_gateway::{ClientSettings, GatewayClient, GatewayEvent};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "cord")]
#[command(about = "Gateway client with rate-limited REST dispatch")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and log gateway events until Ctrl-C
    Run {
        /// Path to a TOML settings file
        #[arg(short, long, env = "CORD_CONFIG")]
        config: Option<PathBuf>,

        /// API token (overrides the settings file)
        #[arg(long, env = "CORD_API_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Log frame traffic
        #[arg(long)]
        debug: bool,
    },

    /// Write a sample settings file
    InitConfig {
        /// Path to write settings
        #[arg(short, long, default_value = "cord.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            token,
            debug,
        } => {
            let settings = load_settings(config.as_deref(), token, debug)?;
            init_tracing(log_directive(&settings))?;
            if let Some(path) = &config {
                info!(config = %path.display(), "settings loaded");
            }
            run(settings).await?;
        }
        Commands::InitConfig { output } => {
            init_tracing(log_directive(&ClientSettings::default()))?;
            init_config(&output)?;
        }
    }

    Ok(())
}

fn init_tracing(directive: &str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();
    Ok(())
}

/// Frame logging is emitted at debug level, so `debugging` has to open the filter.
fn log_directive(settings: &ClientSettings) -> &'static str {
    if settings.debugging {
        "cord=debug"
    } else {
        "cord=info"
    }
}

fn load_settings(
    config: Option<&Path>,
    token: Option<String>,
    debug: bool,
) -> anyhow::Result<ClientSettings> {
    let mut settings = match config {
        Some(path) => ClientSettings::from_file(path)?,
        None => ClientSettings::default(),
    };
    if let Some(token) = token {
        settings.api_token = token;
    }
    if debug {
        settings.debugging = true;
    }
    Ok(settings)
}

async fn run(settings: ClientSettings) -> anyhow::Result<()> {
    let client = GatewayClient::new(settings)?;
    client.register_handler("log", Arc::new(log_event));
    client.start().await?;
    info!(client = %client.id(), "connected");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutting down");
            client.disconnect().await;
        }
        result = client.closed() => {
            if let Err(err) = result {
                error!(error = %err, "gateway session ended");
                return Err(err.into());
            }
        }
    }

    Ok(())
}

fn log_event(client: &GatewayClient, event: &GatewayEvent) {
    match event {
        GatewayEvent::Ready(ready) => info!(
            user = %ready.user.id,
            guilds = ready.guilds.len(),
            "ready"
        ),
        GatewayEvent::SocketClosed { code, reason, .. } => {
            info!(code, reason = %reason, "socket closed");
        }
        GatewayEvent::SocketErrored(reason) => error!(error = %reason, "socket error"),
        GatewayEvent::HeartbeatSent { .. } => {}
        GatewayEvent::GuildCreate(guild) => info!(
            guild = %guild.id,
            name = guild.name.as_deref().unwrap_or_default(),
            cached = client.with_cache(cord_gateway::GuildCache::guild_count),
            "guild available"
        ),
        other => info!(event = other.name(), "event"),
    }
}

fn init_config(output: &Path) -> anyhow::Result<()> {
    std::fs::write(output, ClientSettings::sample_toml())?;

    println!("Settings written to {}", output.display());
    println!();
    println!("Add your API token, then run:");
    println!("  cord run --config {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debugging_in_file_opens_debug_filter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cord.toml");
        let mut settings = ClientSettings::new("file-token");
        settings.debugging = true;
        std::fs::write(&path, settings.to_toml().expect("serialize")).expect("write");

        let loaded = load_settings(Some(path.as_path()), None, false).expect("load");
        assert!(loaded.debugging);
        assert_eq!(log_directive(&loaded), "cord=debug");
    }

    #[test]
    fn test_cli_overrides_apply_to_filter() {
        let loaded = load_settings(None, Some("cli-token".to_string()), true).expect("load");
        assert_eq!(loaded.api_token, "cli-token");
        assert_eq!(log_directive(&loaded), "cord=debug");
    }

    #[test]
    fn test_default_filter_is_info() {
        assert_eq!(log_directive(&ClientSettings::default()), "cord=info");
    }
}
