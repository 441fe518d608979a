use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use realtime_voice::{
    create_router, AppState, ChatClient, Config, ControllerConfig, HttpRealtimeClient,
    Microphone, MicrophoneFactory, MicrophoneSource, SessionController,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "realtime-voice", version, about = "Realtime voice chat client")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/realtime-voice")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream audio to the realtime service for a while, then hang up
    Stream {
        /// Replay this WAV file as the microphone
        #[arg(long, conflicts_with = "synthetic")]
        file: Option<PathBuf>,

        /// Use a generated tone as the microphone
        #[arg(long)]
        synthetic: bool,

        /// Seconds to stream before stopping (Ctrl-C stops early)
        #[arg(long, default_value_t = 10)]
        duration_secs: u64,
    },
    /// Serve the HTTP control API
    Serve {
        /// Replay this WAV file as the microphone instead of a generated tone
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Send one text message and print the reply
    Chat { message: String },
}

fn microphone_source(file: Option<PathBuf>) -> MicrophoneSource {
    match file {
        Some(path) => MicrophoneSource::File(path),
        None => MicrophoneSource::Synthetic { frequency_hz: 440.0 },
    }
}

fn build_controller(cfg: &Config, source: MicrophoneSource) -> SessionController {
    let microphone: Arc<dyn Microphone> = Arc::from(MicrophoneFactory::create(source));
    let client = Arc::new(HttpRealtimeClient::new(cfg.realtime.clone()));
    SessionController::new(ControllerConfig::from(&cfg.audio), microphone, client)
}

async fn stream(cfg: &Config, file: Option<PathBuf>, synthetic: bool, duration: Duration) -> Result<()> {
    if file.is_none() && !synthetic {
        warn!("No --file given; streaming a generated tone");
    }

    let mut controller = build_controller(cfg, microphone_source(file));

    controller.start().await.context("Failed to start conversation")?;
    info!("{}", controller.status_text());

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    let result = controller.stop().await;
    let stats = controller.stats();
    info!(
        "Conversation ended: {} chunks sent, {} dropped, {} bytes",
        stats.chunks_forwarded, stats.transport_failures, stats.bytes_forwarded
    );
    result.context("Error stopping conversation")?;

    Ok(())
}

async fn serve(cfg: &Config, file: Option<PathBuf>) -> Result<()> {
    let controller = build_controller(cfg, microphone_source(file));
    let chat = ChatClient::new(cfg.realtime.clone());
    let app = create_router(AppState::new(controller, chat));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Loaded config: {}", cfg.service.name);
    info!("Realtime endpoint: {} ({})", cfg.realtime.endpoint, cfg.realtime.deployment);

    match cli.command {
        Command::Stream {
            file,
            synthetic,
            duration_secs,
        } => stream(&cfg, file, synthetic, Duration::from_secs(duration_secs)).await,
        Command::Serve { file } => serve(&cfg, file).await,
        Command::Chat { message } => {
            let chat = ChatClient::new(cfg.realtime.clone());
            let reply = chat.send_text_message(&message, &[]).await?;
            println!("{}", reply);
            Ok(())
        }
    }
}
