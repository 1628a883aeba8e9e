//! Macro USD Bot
//!
//! Scores US economic releases into a USD bias and reports on Telegram.

use clap::{Parser, Subcommand};
use macro_usd_bot::{
    bot::MacroBot,
    config::Config,
    ingester::{HttpFetcher, IndicatorStore, YahooPriceSource},
    notify::{format::to_plain_text, NarrativeFormatter, Notifier},
    scheduler::{ReleaseEvent, ReleaseSchedule},
    scoring::ScoringEngine,
    storage::Database,
    tracker::HitRateTracker,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "macro-usd-bot")]
#[command(about = "Scores US macro releases into a USD bias reading")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (defaults to ./config.toml, then ~/.config/macro-usd-bot/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot: scheduled readings, Telegram commands, hit-rate tracking
    Run,
    /// Print a reading from the latest data
    Score {
        /// Only score the indicators of one release (NFP, CPI, ...)
        #[arg(short, long)]
        event: Option<String>,
        /// Also send the reading to the default chat
        #[arg(long)]
        send: bool,
    },
    /// Show hit-rate statistics
    Hitrate {
        #[arg(short, long)]
        days: Option<i64>,
    },
    /// Export predictions with their measurements to CSV
    Export {
        path: String,
        #[arg(short, long, default_value = "90")]
        days: i64,
    },
    /// Delete predictions older than the retention window
    Cleanup {
        #[arg(short, long)]
        days: Option<i64>,
    },
    /// List upcoming releases
    Schedule {
        #[arg(short, long, default_value = "14")]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Score { event, send } => score(config, event.as_deref(), send).await,
        Commands::Hitrate { days } => show_hit_rate(config, days).await,
        Commands::Export { path, days } => export(config, &path, days).await,
        Commands::Cleanup { days } => cleanup(config, days).await,
        Commands::Schedule { days } => show_schedule(days),
    }
}

async fn build_bot(config: Config, shutdown: watch::Receiver<bool>) -> anyhow::Result<MacroBot> {
    let store = IndicatorStore::from_config(&config.sources)?;
    let engine = ScoringEngine::new(config.indicator_table()?);
    let db = Database::connect(&config.database.path).await?;
    let prices = YahooPriceSource::new(HttpFetcher::from_config(&config.sources)?);
    let tracker = HitRateTracker::new(db, Arc::new(prices), config.tracker.horizons(), shutdown);
    let notifier = Notifier::from_config(&config.telegram)?;

    tracing::info!(
        "Sources: [{}], {} indicators, horizons {:?} min",
        store.source_names().join(", "),
        engine.table().len(),
        tracker.horizons()
    );
    Ok(MacroBot::new(config, store, engine, tracker, notifier))
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting Macro USD bot");

    if !config.telegram.is_active() {
        tracing::warn!("Telegram is not configured - readings will only be logged");
    }

    let (tx, rx) = watch::channel(false);
    let bot = Arc::new(build_bot(config, rx.clone()).await?);

    let releases = bot.schedule().upcoming(chrono::Utc::now(), 7);
    for release in &releases {
        tracing::info!("Upcoming: {} at {}", release.event, release.at.format("%a %Y-%m-%d %H:%M %Z"));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            let _ = tx.send(true);
        }
    });

    bot.run(rx).await?;
    Ok(())
}

async fn score(config: Config, event: Option<&str>, send: bool) -> anyhow::Result<()> {
    let (_tx, rx) = watch::channel(false);
    let bot = build_bot(config, rx).await?;

    let message = match event {
        Some(code) => {
            let event = ReleaseEvent::parse(code)
                .ok_or_else(|| anyhow::anyhow!("Unknown release event: {}", code))?;
            let indicators: Vec<String> = event.indicators().iter().map(|s| s.to_string()).collect();
            let result = bot.reading(&indicators).await;
            NarrativeFormatter::reading(&result, event.title(), chrono::Utc::now())
        }
        None => bot.manual_reading().await?.1,
    };

    println!("{}", to_plain_text(&message));

    if send {
        if bot.notifier().default_chat().is_none() {
            anyhow::bail!("--send needs telegram.bot_token and telegram.chat_id");
        }
        bot.notifier().send(&message).await?;
        println!("\nSent to Telegram.");
    }
    Ok(())
}

async fn show_hit_rate(config: Config, days: Option<i64>) -> anyhow::Result<()> {
    let days = days.unwrap_or(config.tracker.metrics_days);
    let (_tx, rx) = watch::channel(false);
    let bot = build_bot(config, rx).await?;
    let report = bot.tracker().performance(days).await?;

    println!("\n=== Hit Rate (last {} days) ===\n", days);
    println!("Total predictions: {}", report.total_predictions);
    println!("\n{:<10} {:>10} {:>8} {:>10}", "Horizon", "Measured", "Hits", "Hit rate");
    println!("{}", "-".repeat(42));
    for h in &report.horizons {
        println!(
            "{:<10} {:>10} {:>8} {:>10}",
            format!("{}min", h.horizon_mins),
            h.measured,
            h.hits,
            rate(h.hit_rate())
        );
    }

    if !report.by_event.is_empty() {
        println!("\n{:<10} {:>12} {:>10} {:>10}", "Event", "Predictions", "Measured", "Hit rate");
        println!("{}", "-".repeat(46));
        for e in &report.by_event {
            println!(
                "{:<10} {:>12} {:>10} {:>10}",
                e.event_type,
                e.predictions,
                e.measured,
                rate(e.hit_rate())
            );
        }
    }
    Ok(())
}

async fn export(config: Config, path: &str, days: i64) -> anyhow::Result<()> {
    let (_tx, rx) = watch::channel(false);
    let bot = build_bot(config, rx).await?;
    let rows = bot.tracker().export(path, days).await?;
    println!("Exported {} predictions to {}", rows, path);
    Ok(())
}

async fn cleanup(config: Config, days: Option<i64>) -> anyhow::Result<()> {
    let days = days.unwrap_or(config.tracker.retention_days);
    let (_tx, rx) = watch::channel(false);
    let bot = build_bot(config, rx).await?;
    let deleted = bot.tracker().cleanup(days).await?;
    println!("Deleted {} predictions older than {} days", deleted, days);
    Ok(())
}

fn show_schedule(days: i64) -> anyhow::Result<()> {
    let schedule = ReleaseSchedule::default();
    let releases = schedule.upcoming(chrono::Utc::now(), days);

    println!("\n=== Upcoming releases (next {} days, {}) ===\n", days, schedule.timezone());
    let (checks, fixed): (Vec<_>, Vec<_>) = releases.iter().partition(|r| r.event.same_day_only());
    if fixed.is_empty() {
        println!("None");
    }
    for release in fixed {
        println!(
            "{:<22} {:<14} {}",
            release.at.format("%a %Y-%m-%d %H:%M"),
            release.event.code(),
            release.event.title()
        );
    }
    if !checks.is_empty() {
        println!("\nFOMC decision checked every business day at 14:00");
    }
    Ok(())
}

fn rate(value: Option<f64>) -> String {
    value
        .map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}
