use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use swingbox::{router, telemetry, AppState, Library, YtDlpFetcher};
use swingconf::SwingConfig;
use swingdeck::{AudioOutput, NullOutput, PlayerSettings, SwingPlayer};

/// Web-controlled auto-panning audio player
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (replaces ./swingbox.toml in the search order)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding downloaded sounds
    #[arg(long)]
    downloads_dir: Option<PathBuf>,

    /// OTLP gRPC endpoint for OpenTelemetry (e.g., "127.0.0.1:4317")
    #[arg(long)]
    otlp_endpoint: Option<String>,

    /// Run without a sound card; every control still works
    #[arg(long)]
    no_audio: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = SwingConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(host) = cli.host {
        config.infra.bind.host = host;
    }
    if let Some(port) = cli.port {
        config.infra.bind.http_port = port;
    }
    if let Some(dir) = cli.downloads_dir {
        config.infra.paths.downloads_dir = dir;
    }
    if let Some(endpoint) = cli.otlp_endpoint {
        config.infra.telemetry.otlp_endpoint = Some(endpoint);
    }

    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    telemetry::init(
        config.infra.telemetry.otlp_endpoint.as_deref(),
        &config.infra.telemetry.log_level,
    )
    .context("Failed to initialize telemetry")?;

    for file in &sources.files {
        tracing::info!(path = %file.display(), "config file loaded");
    }
    if !sources.env_overrides.is_empty() {
        tracing::info!(vars = ?sources.env_overrides, "config env overrides");
    }

    let settings = PlayerSettings::try_from(&config.bootstrap.player)
        .context("Invalid [player] configuration")?;
    let output = build_output(cli.no_audio);
    tracing::info!(output = output.name(), "audio output selected");
    let player = SwingPlayer::new(output, settings);

    let library = Library::new(&config.infra.paths.downloads_dir);
    library
        .ensure_dir()
        .with_context(|| {
            format!(
                "Failed to create downloads directory {}",
                config.infra.paths.downloads_dir.display()
            )
        })?;
    tracing::info!(dir = %library.root().display(), "library ready");

    let state = AppState {
        player: player.clone(),
        library: Arc::new(library),
        fetcher: Arc::new(YtDlpFetcher::new(config.bootstrap.fetcher.clone())),
        start_time: Instant::now(),
    };

    let addr = config.infra.bind.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("SwingBox listening on http://{}", addr);
    tracing::info!("   Control UI: GET http://{}/", addr);
    tracing::info!("   Socket: ws://{}/ws", addr);
    tracing::info!("   Health: GET http://{}/health", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    player.stop();
    tracing::info!("Shutdown complete");
    telemetry::shutdown();

    Ok(())
}

#[cfg(feature = "device-audio")]
fn build_output(no_audio: bool) -> Arc<dyn AudioOutput> {
    if no_audio {
        return Arc::new(NullOutput::new());
    }
    match swingdeck::CpalOutput::new() {
        Ok(output) => Arc::new(output),
        Err(e) => {
            tracing::warn!(error = %e, "No usable audio device, running silent");
            Arc::new(NullOutput::new())
        }
    }
}

#[cfg(not(feature = "device-audio"))]
fn build_output(no_audio: bool) -> Arc<dyn AudioOutput> {
    if !no_audio {
        tracing::warn!("Built without device-audio; running silent");
    }
    Arc::new(NullOutput::new())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
