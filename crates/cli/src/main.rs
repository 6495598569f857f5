//! echopost binary: load config, connect to Telegram, run the reaction
//! pipeline until the event stream ends or ctrl-c is received.

use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    rand::{SeedableRng, rngs::StdRng},
    secrecy::Secret,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    echopost_config::EchopostConfig,
    echopost_pipeline::{MonitorConfig, RATE_WINDOW, ReactionPipeline},
    echopost_telegram::{TelegramChannel, TelegramConfig},
};

#[derive(Parser)]
#[command(name = "echopost", about = "echopost — Telegram channel auto-reply monitor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file (overrides the standard search locations).
    #[arg(long, global = true, env = "ECHOPOST_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring (default when no subcommand is provided).
    Run,
    /// Validate the config file and exit.
    CheckConfig,
}

fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    match &cli.command {
        Some(Commands::CheckConfig) => check_config(&cli),
        Some(Commands::Run) | None => run(&cli).await,
    }
}

/// Load from `--config` or the standard locations, then validate. Any
/// configuration problem is fatal here, before anything connects.
fn load_validated(cli: &Cli) -> anyhow::Result<EchopostConfig> {
    let config = match &cli.config {
        Some(path) => echopost_config::load_config(path)?,
        None => echopost_config::discover_and_load()?,
    };
    config.validate()?;
    Ok(config)
}

fn check_config(cli: &Cli) -> anyhow::Result<()> {
    let config = load_validated(cli)?;
    println!(
        "config ok: channel {}, {} reply message(s), {} replies/hour max",
        config.telegram.channel,
        config.monitor.reply_messages.len(),
        config.monitor.max_replies_per_hour,
    );
    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_validated(cli)?;

    let telegram = TelegramConfig {
        token: Secret::new(config.telegram.token.clone()),
        channel: config.telegram.channel.clone(),
    };
    let monitor = MonitorConfig {
        max_replies_per_window: config.monitor.max_replies_per_hour as usize,
        window: RATE_WINDOW,
        delay_min: Duration::from_secs(config.monitor.reply_delay_min_secs),
        delay_max: Duration::from_secs(config.monitor.reply_delay_max_secs),
        reply_messages: config.monitor.reply_messages.clone(),
    };

    let channel = TelegramChannel::connect(&telegram)
        .await
        .context("failed to connect to telegram")?;

    let sink = Arc::new(channel.reply_sink());
    let pipeline = ReactionPipeline::new(monitor, sink, channel.bot_user_id(), StdRng::from_os_rng())?;

    let cancel = pipeline.cancellation_token();
    let events = channel.subscribe(cancel.clone());

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, shutting down");
                cancel.cancel();
            }
        }
    });

    info!(channel = %config.telegram.channel, "monitor is active, waiting for new posts");
    pipeline.run(events).await;
    info!("monitor stopped");
    Ok(())
}
