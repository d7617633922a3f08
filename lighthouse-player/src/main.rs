//! Lighthouse player: entry point.
//!
//! ```text
//! lighthouse-player                      Play the configured animation
//! lighthouse-player --animation dot      Override the animation
//! lighthouse-player --config <path>      Load a custom config TOML
//! lighthouse-player --gen-config         Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lighthouse_core::Session;
use lighthouse_player::animation::{AnimationKind, Dot, Fill, Sweep};
use lighthouse_player::config::PlayerConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "lighthouse-player", about = "Play animations on the Lighthouse display")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "lighthouse-player.toml")]
    config: PathBuf,

    /// Animation to play instead of the configured one.
    #[arg(short, long, value_enum)]
    animation: Option<AnimationKind>,

    /// Frame rate in Hz, overriding the configured one.
    #[arg(short, long)]
    frame_rate: Option<f64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&PlayerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let mut config = PlayerConfig::load(&cli.config);
    if let Some(animation) = cli.animation {
        config.animation.name = animation;
    }
    if let Some(hz) = cli.frame_rate {
        config.lighthouse.frame_rate = hz;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("lighthouse-player v{}", env!("CARGO_PKG_VERSION"));
    info!("endpoint: {}", config.lighthouse.url);
    info!("user: {}", config.lighthouse.username);
    info!("animation: {}", config.animation.name);
    if config.lighthouse.username.is_empty() || config.lighthouse.token.is_empty() {
        warn!("username or token is empty; the server will reject frames");
    }

    let session = Session::new(config.session_config())?;
    match config.animation.name {
        AnimationKind::Fill => session.set_frame_source(Fill::new()).await,
        AnimationKind::Dot => session.set_frame_source(Dot::new()).await,
        AnimationKind::Sweep => session.set_frame_source(Sweep::new()).await,
    }

    session.start().await?;
    info!("playing; use Ctrl-C to stop");

    let mut state = session.subscribe_state();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Ctrl-C received, shutting down"),
        _ = state.wait_for(|s| s.is_disconnected()) => {
            let reason = session.last_error().unwrap_or_else(|| "unknown".into());
            error!("connection lost: {reason}");
        }
    }

    match session.close().await {
        Ok(frames) => info!("sent {frames} frames"),
        Err(e) => error!("frame loop ended with error: {e}"),
    }
    Ok(())
}
