//! # parlor
//!
//! Parlor room server binary. Loads settings, starts the room coordinator
//! and serves the HTTP/WebSocket gateway until Ctrl-C.

mod banner;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parlor_rooms::spawn_coordinator;
use parlor_server::config::ServerConfig;
use parlor_server::server::ParlorServer;
use parlor_server::shutdown::ShutdownCoordinator;
use parlor_settings::ParlorSettings;

/// Parlor room server.
#[derive(Parser, Debug)]
#[command(name = "parlor", about = "Ephemeral chat room server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.parlor/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    /// Skip the terminal QR code for the network URL.
    #[arg(long)]
    no_qr: bool,
}

impl Cli {
    fn apply(&self, settings: &mut ParlorSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

fn load(cli: &Cli) -> Result<ParlorSettings> {
    let path = cli.config.clone().unwrap_or_else(parlor_settings::settings_path);
    let mut settings = parlor_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;

    if settings.logging.json {
        parlor_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        parlor_core::logging::init_subscriber(&settings.logging.level);
    }

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let (coordinator, coordinator_task) =
        spawn_coordinator(settings.rooms.clone(), shutdown.token());

    let config = ServerConfig::from(&settings);
    let drain_timeout = config.shutdown_timeout();
    let server = ParlorServer::new(config, coordinator, Arc::clone(&shutdown));
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;

    tracing::info!("Parlor listening on http://{addr}");
    if let Some(ref url) = settings.server.public_url {
        tracing::info!(public_url = %url, "public URL");
    }
    let urls = banner::access_urls(addr, settings.server.public_url.as_deref(), banner::lan_ipv4());
    let env = std::env::var(banner::ENV_VAR).ok();
    match banner::render(&urls, banner::show_qr(cli.no_qr, env.as_deref())) {
        Ok(text) => println!("{text}"),
        Err(e) => tracing::warn!(error = %e, "failed to render startup banner"),
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    shutdown
        .graceful_shutdown(vec![handle, coordinator_task], Some(drain_timeout))
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["parlor"]);
        let mut settings = ParlorSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 3005);
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);
        assert!(!cli.no_qr);
    }

    #[test]
    fn no_qr_flag_parses() {
        let cli = Cli::parse_from(["parlor", "--no-qr"]);
        assert!(cli.no_qr);
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from([
            "parlor",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--log-level",
            "debug",
            "--json-logs",
        ]);
        let mut settings = ParlorSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["parlor", "--port", "99999"]).is_err());
    }

    #[test]
    fn load_reads_explicit_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"rooms": {{"hostGraceSecs": 5}}}}"#).unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::parse_from(["parlor", "--config", path, "--port", "0"]);
        let settings = load(&cli).unwrap();
        assert_eq!(settings.rooms.host_grace_secs, 5);
        assert_eq!(settings.server.port, 0);
    }

    #[test]
    fn load_reports_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::parse_from(["parlor", "--config", path]);
        let err = load(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to load settings"));
    }
}
