//! The running bot: command replies, scheduled release processing and the
//! Telegram polling loop.

pub mod command;


pub use command::Command;

use crate::config::Config;
use crate::error::{BotError, Result};
use crate::ingester::IndicatorStore;
use crate::notify::{NarrativeFormatter, Notifier, Update};
use crate::scheduler::{ReleaseSchedule, ScheduledRelease};
use crate::scoring::{AggregateResult, IndicatorObservation, ScoringEngine};
use crate::tracker::HitRateTracker;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Event code logged for readings requested with /score
pub const MANUAL_EVENT: &str = "MANUAL";
/// Minutes to wait before re-fetching when a release has no data yet
const RELEASE_RETRY_MINS: [u64; 3] = [3, 5, 10];
/// Pause after a failed getUpdates call
const POLL_ERROR_BACKOFF_SECS: u64 = 5;
/// Days of upcoming releases shown by /status
const STATUS_WINDOW_DAYS: i64 = 7;

pub struct MacroBot {
    config: Config,
    store: IndicatorStore,
    engine: ScoringEngine,
    tracker: HitRateTracker,
    notifier: Notifier,
    schedule: ReleaseSchedule,
}

impl MacroBot {
    pub fn new(
        config: Config,
        store: IndicatorStore,
        engine: ScoringEngine,
        tracker: HitRateTracker,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            tracker,
            notifier,
            schedule: ReleaseSchedule::default(),
        }
    }

    pub fn tracker(&self) -> &HitRateTracker {
        &self.tracker
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn schedule(&self) -> &ReleaseSchedule {
        &self.schedule
    }

    /// Fetch and score the given indicators
    pub async fn reading(&self, indicators: &[String]) -> AggregateResult {
        let observations = self.store.fetch(indicators).await;
        self.score(indicators, &observations)
    }

    /// Reading for a scheduled release; same-day events only count data
    /// dated on the release day
    async fn release_reading(&self, release: &ScheduledRelease, indicators: &[String]) -> AggregateResult {
        let mut observations = self.store.fetch(indicators).await;
        if release.event.same_day_only() {
            let day = release.at.date_naive();
            observations.retain(|_, obs| obs.period == Some(day));
        }
        self.score(indicators, &observations)
    }

    fn score(&self, indicators: &[String], observations: &HashMap<String, IndicatorObservation>) -> AggregateResult {
        let result = self.engine.evaluate(observations);
        tracing::info!(
            "Reading over {} indicators: score {:+.2} {} ({}), {} contributing",
            indicators.len(),
            result.score,
            result.classification,
            result.confidence,
            result.components.len()
        );
        result
    }

    /// Reading over every configured indicator, logged as a manual prediction
    pub async fn manual_reading(&self) -> Result<(AggregateResult, String)> {
        let result = self.reading(&self.engine.table().names()).await;
        let message = NarrativeFormatter::reading(&result, MANUAL_EVENT, Utc::now());
        if !result.is_empty() {
            self.tracker.log_prediction(MANUAL_EVENT, &result).await?;
        }
        Ok((result, message))
    }

    /// Score a scheduled release, broadcast it and log it.
    ///
    /// Retries a few times while the release has no data yet.
    pub async fn process_release(
        &self,
        release: ScheduledRelease,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Option<AggregateResult>> {
        let event = release.event;
        let indicators: Vec<String> = event.indicators().iter().map(|s| s.to_string()).collect();

        let mut result = self.release_reading(&release, &indicators).await;
        for delay in RELEASE_RETRY_MINS {
            if !result.is_empty() {
                break;
            }
            tracing::info!("No data for {} yet, retrying in {} min", event, delay);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(delay * 60)) => {}
                _ = shutdown.changed() => return Ok(None),
            }
            for name in &indicators {
                self.store.cache().invalidate(name);
            }
            result = self.release_reading(&release, &indicators).await;
        }

        if result.is_empty() {
            tracing::warn!("No data available for {}, nothing sent", event);
            return Ok(None);
        }

        let id = self.tracker.log_prediction(event.code(), &result).await?;
        let message = NarrativeFormatter::reading(&result, event.title(), Utc::now());
        if let Err(e) = self.notifier.send(&message).await {
            tracing::error!("Failed to deliver {} reading #{}: {}", event, id, e);
        }
        tracing::info!("{} reading sent: score {:+.2}", event, result.score);
        Ok(Some(result))
    }

    /// Reply text for a chat command
    pub async fn handle_command(&self, command: &Command) -> String {
        tracing::info!("Command {}", command);
        match command {
            Command::Start | Command::Help => NarrativeFormatter::help(),
            Command::Status => {
                let now = Utc::now();
                let upcoming = self.schedule.upcoming(now, STATUS_WINDOW_DAYS);
                let last = match self.tracker.recent(1).await {
                    Ok(mut records) => records.pop(),
                    Err(e) => {
                        tracing::warn!("Could not load last reading: {}", e);
                        None
                    }
                };
                NarrativeFormatter::status(&self.store.source_names(), &upcoming, last.as_ref(), now)
            }
            Command::Score => match self.manual_reading().await {
                Ok((_, message)) => message,
                Err(e) => {
                    tracing::error!("/score failed: {}", e);
                    NarrativeFormatter::error("calculate the score")
                }
            },
            Command::HitRate => match self.tracker.performance(self.config.tracker.metrics_days).await {
                Ok(report) => NarrativeFormatter::hit_rate_report(&report),
                Err(e) => {
                    tracing::error!("/hitrate failed: {}", e);
                    NarrativeFormatter::error("load the hit rate")
                }
            },
            Command::Unknown(name) => NarrativeFormatter::unknown_command(name),
        }
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return;
        };

        let reply = self.handle_command(&command).await;
        let chat_id = message.chat.id.to_string();
        if let Err(e) = self.notifier.send_to(&chat_id, &reply).await {
            tracing::warn!("Reply to {} in chat {} failed: {}", command, chat_id, e);
        }
    }

    /// Long-poll Telegram for commands until shutdown
    pub async fn poll_commands(&self, mut shutdown: watch::Receiver<bool>) {
        let Some(client) = self.notifier.client().cloned() else {
            tracing::info!("Telegram disabled, command polling not started");
            return;
        };

        if let Err(e) = client.delete_webhook(false).await {
            tracing::warn!("deleteWebhook failed: {}", e);
        }

        let timeout = self.config.telegram.poll_timeout_secs;
        let mut offset: i64 = 0;
        tracing::info!("Polling Telegram for commands");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let updates = tokio::select! {
                r = client.get_updates(offset, timeout) => r,
                _ = shutdown.changed() => break,
            };

            let pause = match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                    continue;
                }
                Err(BotError::RateLimited { retry_after_secs }) => {
                    tracing::warn!("Telegram rate limit, retrying in {}s", retry_after_secs);
                    retry_after_secs
                }
                Err(e) => {
                    tracing::warn!("getUpdates failed: {}", e);
                    POLL_ERROR_BACKOFF_SECS
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(pause)) => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("Command polling stopped");
    }

    /// Run polling, the release scheduler and measurements until shutdown
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Result<()> {
        match self.tracker.resume_pending().await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Resumed measurements for {} predictions", n),
            Err(e) => tracing::warn!("Could not resume pending measurements: {}", e),
        }
        if let Err(e) = self.tracker.cleanup(self.config.tracker.retention_days).await {
            tracing::warn!("Prediction cleanup failed: {}", e);
        }

        let cache = self.store.cache();
        cache.start_cleanup_task(cache.ttl_secs().max(1) as u64);

        let poller = {
            let bot = Arc::clone(&self);
            let rx = shutdown.clone();
            tokio::spawn(async move { bot.poll_commands(rx).await })
        };

        let mut releases = Vec::new();
        let release_shutdown = shutdown.clone();
        self.schedule
            .run(shutdown, |release| {
                let bot = Arc::clone(&self);
                let rx = release_shutdown.clone();
                releases.push(tokio::spawn(async move {
                    if let Err(e) = bot.process_release(release, rx).await {
                        tracing::error!("Release processing failed: {}", e);
                    }
                }));
                async {}
            })
            .await;

        if let Err(e) = poller.await {
            tracing::warn!("Polling task ended abnormally: {}", e);
        }
        for handle in releases {
            if let Err(e) = handle.await {
                tracing::warn!("Release task ended abnormally: {}", e);
            }
        }
        self.tracker.wait_idle().await;
        tracing::info!("Bot stopped");
        Ok(())
    }
}
