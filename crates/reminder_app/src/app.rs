use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reminder_domain::{
    scheduler::DEFAULT_TICK_SECS,
    storage::{FileStore, KeyValueStore},
    ReminderService,
};
use reminder_extract::{client::DEFAULT_TIMEOUT, GeminiExtractor};
use tracing::{info, warn};

use crate::notifier::ConsoleNotifier;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub tick_period: Duration,
    pub extract_base_url: Option<String>,
    pub extract_model: Option<String>,
    pub extract_timeout: Duration,
    pub api_key: Option<String>,
    /// Answer given by the console host when asked for notification permission.
    pub grant_notifications: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup("REMINDERS_DATA_DIR").filter(|dir| !dir.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("REMINDERS_TICK_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(value) if value > 0 => config.tick_period = Duration::from_secs(value),
                _ => warn!(value = %secs, "ignoring invalid REMINDERS_TICK_SECS"),
            }
        }
        config.extract_base_url = non_blank(lookup("REMINDERS_EXTRACT_URL"));
        config.extract_model = non_blank(lookup("REMINDERS_EXTRACT_MODEL"));
        if let Some(secs) = lookup("REMINDERS_EXTRACT_TIMEOUT_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(value) if value > 0 => config.extract_timeout = Duration::from_secs(value),
                _ => warn!(value = %secs, "ignoring invalid REMINDERS_EXTRACT_TIMEOUT_SECS"),
            }
        }
        config.api_key =
            non_blank(lookup("GEMINI_API_KEY")).or_else(|| non_blank(lookup("API_KEY")));
        if let Some(answer) = lookup("REMINDERS_NOTIFICATIONS") {
            config.grant_notifications = !answer.trim().eq_ignore_ascii_case("deny");
        }
        Ok(config)
    }

    fn extractor(&self) -> Result<Option<GeminiExtractor>> {
        let Some(api_key) = self.api_key.as_deref() else {
            info!("no extraction api key configured, natural-language input disabled");
            return Ok(None);
        };
        let mut builder = GeminiExtractor::builder(api_key).timeout(self.extract_timeout);
        if let Some(url) = &self.extract_base_url {
            builder = builder.base_url(url);
        }
        if let Some(model) = &self.extract_model {
            builder = builder.model(model);
        }
        let extractor = builder.build().context("failed to set up extraction client")?;
        info!(endpoint = extractor.endpoint(), "extraction service configured");
        Ok(Some(extractor))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .map(|dir| dir.join("reminders"))
                .unwrap_or_else(|| PathBuf::from(".reminders")),
            tick_period: Duration::from_secs(DEFAULT_TICK_SECS),
            extract_base_url: None,
            extract_model: None,
            extract_timeout: DEFAULT_TIMEOUT,
            api_key: None,
            grant_notifications: true,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Wires the service for the configured data directory.
pub fn build_service(config: &AppConfig) -> Result<Arc<ReminderService>> {
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "unable to prepare data directory {}",
            config.data_dir.display()
        )
    })?;
    info!(path = %config.data_dir.display(), "using data directory");

    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.data_dir));
    let notifier = ConsoleNotifier::new(Arc::clone(&storage), config.grant_notifications);
    let mut builder = ReminderService::builder()
        .with_storage(storage)
        .with_notification_sink(Arc::new(notifier));
    if let Some(extractor) = config.extractor()? {
        builder = builder.with_extractor(Arc::new(extractor));
    }
    Ok(Arc::new(builder.build()))
}
