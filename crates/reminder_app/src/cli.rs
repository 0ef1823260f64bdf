use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use reminder_domain::{
    agenda::AgendaView,
    draft::{AppointmentDraft, ExtractionOutcome},
    scheduler::ReminderStatus,
    ticker::{ReminderTicker, TickerConfig},
    AppointmentId, ExtractionError, PermissionState, ReminderService,
};
use tracing::{info, warn};

use crate::app::AppConfig;

const NOT_UNDERSTOOD: &str =
    "Could not understand the appointment details. Please be more specific or fill in the fields manually.";
const SERVICE_UNAVAILABLE: &str =
    "The extraction service is unavailable right now. Please try again later or fill in the fields manually.";
const EMPTY_TEXT: &str = "The description is empty; using the given fields.";

#[derive(Debug, Parser)]
#[command(
    name = "reminders",
    about = "Personal appointments with due-time reminders",
    version
)]
pub struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    pub verbose: bool,
    /// Directory holding the saved appointments.
    #[arg(long, global = true, env = "REMINDERS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show appointments ordered by when they occur.
    List(ListArgs),

    /// Create an appointment, optionally from a free-text description.
    Add(DraftArgs),

    /// Change an existing appointment.
    Edit {
        id: String,
        #[command(flatten)]
        fields: DraftArgs,
    },

    /// Delete an appointment.
    Remove { id: String },

    /// Turn a description into appointment fields without saving anything.
    Extract {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Run a single reminder pass.
    Tick,

    /// Show or request notification permission.
    Permission {
        #[command(subcommand)]
        action: Option<PermissionAction>,
    },

    /// Keep running and show reminders as appointments come due.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Emit JSON instead of a human-readable list.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Default, Args)]
pub struct DraftArgs {
    #[arg(long)]
    pub title: Option<String>,
    /// Date as YYYY-MM-DD.
    #[arg(long)]
    pub date: Option<String>,
    /// Time as HH:MM (24-hour).
    #[arg(long)]
    pub time: Option<String>,
    /// Natural-language description, e.g. "dentist tomorrow at 2:30pm".
    /// Explicit fields take precedence over what is extracted.
    #[arg(long)]
    pub text: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum PermissionAction {
    /// Ask the host for permission. A denial is never asked again.
    Request,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between due-checks.
    #[arg(long)]
    pub tick_secs: Option<u64>,
}

/// Runs one command against the service, writing user-facing output to `out`.
pub async fn execute(
    command: Command,
    service: &Arc<ReminderService>,
    config: &AppConfig,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::List(args) => print_agenda(&service.agenda(), service, args.json, out),
        Command::Add(fields) => {
            let mut draft = AppointmentDraft::blank();
            fill_draft(service, &mut draft, fields, out).await?;
            let saved = service
                .save_draft(&draft)
                .context("appointment not saved")?;
            writeln!(out, "Added {} ({})", saved.title, saved.id)?;
            Ok(())
        }
        Command::Edit { id, fields } => {
            let id = AppointmentId::from(id.as_str());
            let Some(existing) = service.get(&id) else {
                bail!("no appointment with id {id}");
            };
            let mut draft = AppointmentDraft::edit(&existing);
            fill_draft(service, &mut draft, fields, out).await?;
            let saved = service
                .save_draft(&draft)
                .context("appointment not saved")?;
            writeln!(out, "Updated {} ({})", saved.title, saved.id)?;
            Ok(())
        }
        Command::Remove { id } => {
            let id = AppointmentId::from(id.as_str());
            let known = service.get(&id).is_some();
            service.remove(&id);
            if known {
                writeln!(out, "Removed {id}")?;
            } else {
                writeln!(out, "Nothing to remove for {id}")?;
            }
            Ok(())
        }
        Command::Extract { text } => {
            let text = text.join(" ");
            match service.extract(&text).await? {
                Some(partial) => writeln!(out, "{}", serde_json::to_string_pretty(&partial)?)?,
                None => writeln!(out, "{NOT_UNDERSTOOD}")?,
            }
            Ok(())
        }
        Command::Tick => {
            let report = service.tick();
            writeln!(
                out,
                "delivered {}, awaiting permission {}, failed {}",
                report.delivered.len(),
                report.awaiting_permission.len(),
                report.failed.len()
            )?;
            Ok(())
        }
        Command::Permission { action } => {
            let state = match action {
                Some(PermissionAction::Request) => service.request_permission().await,
                None => service.permission_state(),
            };
            writeln!(out, "Notification permission: {state}")?;
            Ok(())
        }
        Command::Watch(args) => {
            let period = args
                .tick_secs
                .filter(|secs| *secs > 0)
                .map(std::time::Duration::from_secs)
                .unwrap_or(config.tick_period);
            watch(service, period, out).await
        }
    }
}

async fn fill_draft(
    service: &ReminderService,
    draft: &mut AppointmentDraft,
    fields: DraftArgs,
    out: &mut impl Write,
) -> Result<()> {
    if let Some(text) = fields.text.as_deref() {
        let ticket = draft.begin_extraction()?;
        match service.extract(text).await {
            Ok(partial) => {
                if draft.apply_extraction(ticket, partial) == ExtractionOutcome::NotUnderstood {
                    info!("extraction gave nothing usable");
                    writeln!(out, "{NOT_UNDERSTOOD}")?;
                }
            }
            Err(ExtractionError::Unconfigured) => {
                writeln!(out, "Natural-language input is not configured; using the given fields.")?;
            }
            Err(ExtractionError::EmptyText) => {
                writeln!(out, "{EMPTY_TEXT}")?;
            }
            Err(err @ ExtractionError::Failed(_)) => {
                warn!(error = %err, "extraction failed, continuing with explicit fields");
                writeln!(out, "{SERVICE_UNAVAILABLE}")?;
            }
        }
    }
    if let Some(title) = fields.title {
        draft.title = title;
    }
    if let Some(date) = fields.date {
        draft.date = date;
    }
    if let Some(time) = fields.time {
        draft.time = time;
    }
    Ok(())
}

fn print_agenda(
    view: &AgendaView,
    service: &ReminderService,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(view)?)?;
        return Ok(());
    }
    match view {
        AgendaView::Loading => writeln!(out, "Loading appointments...")?,
        AgendaView::Empty => writeln!(out, "No appointments scheduled.")?,
        AgendaView::Ready(entries) => {
            for entry in entries {
                let appointment = &entry.appointment;
                let status = match service.status(&appointment.id) {
                    Some(ReminderStatus::Notified) => " (reminded)",
                    Some(ReminderStatus::Due) => " (due)",
                    _ => "",
                };
                let marker = if entry.is_past { "x" } else { "-" };
                writeln!(
                    out,
                    "{marker} {} at {}  {}{status}  [{}]",
                    entry.date_label, entry.time_label, appointment.title, appointment.id
                )?;
            }
        }
    }
    Ok(())
}

/// Explains why reminders may be held back. Never prompts: permission only
/// changes through `permission request`.
fn announce_permission(permission: PermissionState, out: &mut impl Write) -> Result<()> {
    match permission {
        PermissionState::Granted => {}
        PermissionState::Unset => writeln!(
            out,
            "Notification permission is unset; run `reminders permission request` to receive reminders."
        )?,
        PermissionState::Denied => writeln!(
            out,
            "Notification permission is denied; reminders will not be shown."
        )?,
    }
    Ok(())
}

async fn watch(
    service: &Arc<ReminderService>,
    period: std::time::Duration,
    out: &mut impl Write,
) -> Result<()> {
    announce_permission(service.permission_state(), out)?;

    let ticker = ReminderTicker::spawn(
        Arc::clone(service),
        TickerConfig {
            period,
            tick_immediately: true,
        },
    );
    writeln!(out, "Watching for due appointments. Press Ctrl-C to stop.")?;
    out.flush()?;

    tokio::signal::ctrl_c()
        .await
        .context("unable to listen for shutdown signal")?;
    info!("shutdown requested");
    ticker.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use reminder_domain::{
        extraction::AppointmentExtractor, storage::MemoryStore, NotificationSink,
        PartialAppointment,
    };

    use super::*;
    use crate::notifier::ConsoleNotifier;

    /// Extractor that answers every request the same way.
    struct FixedExtractor(std::result::Result<Option<PartialAppointment>, String>);

    #[async_trait]
    impl AppointmentExtractor for FixedExtractor {
        async fn extract(
            &self,
            _text: &str,
            _today: NaiveDate,
        ) -> std::result::Result<Option<PartialAppointment>, ExtractionError> {
            self.0.clone().map_err(ExtractionError::failed)
        }
    }

    fn service_extracting(
        answer: std::result::Result<Option<PartialAppointment>, String>,
    ) -> Arc<ReminderService> {
        Arc::new(
            ReminderService::builder()
                .with_storage(Arc::new(MemoryStore::new()))
                .with_extractor(Arc::new(FixedExtractor(answer)))
                .build(),
        )
    }

    const FIELDS: [&str; 6] = ["--title", "Dentist", "--date", "2099-03-05", "--time", "09:00"];

    fn service() -> Arc<ReminderService> {
        Arc::new(
            ReminderService::builder()
                .with_storage(Arc::new(MemoryStore::new()))
                .build(),
        )
    }

    async fn run(service: &Arc<ReminderService>, args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("reminders").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        execute(cli.command, service, &AppConfig::default(), &mut out).await?;
        Ok(String::from_utf8(out)?)
    }

    #[tokio::test]
    async fn add_then_list() {
        let service = service();
        let added = run(
            &service,
            &["add", "--title", "Dentist", "--date", "2099-03-05", "--time", "14:30"],
        )
        .await
        .unwrap();
        assert!(added.starts_with("Added Dentist"));

        let listed = run(&service, &["list"]).await.unwrap();
        assert!(listed.contains("Thursday, March 5, 2099 at 02:30 PM  Dentist"));
    }

    #[tokio::test]
    async fn empty_list_says_so() {
        let listed = run(&service(), &["list"]).await.unwrap();
        assert_eq!(listed.trim(), "No appointments scheduled.");
    }

    #[tokio::test]
    async fn add_without_all_fields_fails() {
        let service = service();
        let err = run(&service, &["add", "--title", "Dentist"]).await.unwrap_err();
        assert!(format!("{err:#}").contains("required"));
        assert!(service.list().is_empty());
    }

    #[tokio::test]
    async fn text_without_extractor_falls_back_to_fields() {
        let service = service();
        let output = run(
            &service,
            &[
                "add", "--text", "dentist tomorrow", "--title", "Dentist", "--date",
                "2099-03-05", "--time", "09:00",
            ],
        )
        .await
        .unwrap();
        assert!(output.contains("not configured"));
        assert_eq!(service.list().len(), 1);
    }

    #[tokio::test]
    async fn edit_keeps_unspecified_fields() {
        let service = service();
        let appointment = service.add("Dentist", "2099-03-05", "14:30").unwrap();
        run(&service, &["edit", appointment.id.as_str(), "--time", "16:00"])
            .await
            .unwrap();
        let edited = service.get(&appointment.id).unwrap();
        assert_eq!(edited.title, "Dentist");
        assert_eq!(edited.time, "16:00");
    }

    #[tokio::test]
    async fn edit_unknown_id_fails() {
        let err = run(&service(), &["edit", "missing", "--title", "x"]).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn remove_unknown_id_is_harmless() {
        let output = run(&service(), &["remove", "missing"]).await.unwrap();
        assert!(output.contains("Nothing to remove"));
    }

    #[tokio::test]
    async fn extract_without_extractor_is_an_error() {
        let err = run(&service(), &["extract", "dentist", "tomorrow"]).await.unwrap_err();
        assert!(err.downcast_ref::<ExtractionError>().is_some());
    }

    #[tokio::test]
    async fn permission_defaults_to_denied_without_host() {
        let output = run(&service(), &["permission", "request"]).await.unwrap();
        assert_eq!(output.trim(), "Notification permission: denied");
    }

    #[tokio::test]
    async fn unavailable_service_is_reported_apart_from_not_understood() {
        let args: Vec<&str> = ["add", "--text", "dentist tomorrow"]
            .into_iter()
            .chain(FIELDS)
            .collect();

        let failing = service_extracting(Err("connection refused".into()));
        let unavailable = run(&failing, &args).await.unwrap();
        assert!(unavailable.contains(SERVICE_UNAVAILABLE));
        assert!(!unavailable.contains(NOT_UNDERSTOOD));
        assert_eq!(failing.list().len(), 1);

        let confused = service_extracting(Ok(None));
        let not_understood = run(&confused, &args).await.unwrap();
        assert!(not_understood.contains(NOT_UNDERSTOOD));
        assert!(!not_understood.contains(SERVICE_UNAVAILABLE));
        assert_eq!(confused.list().len(), 1);
    }

    #[tokio::test]
    async fn empty_description_is_not_sent_for_extraction() {
        let service = service_extracting(Err("must not be called".into()));
        let args: Vec<&str> = ["add", "--text", "  "].into_iter().chain(FIELDS).collect();
        let output = run(&service, &args).await.unwrap();
        assert!(output.contains(EMPTY_TEXT));
        assert!(!output.contains(SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn extracted_fields_fill_the_draft() {
        let service = service_extracting(Ok(Some(PartialAppointment {
            title: Some("Dentist".into()),
            date: Some("2099-03-05".into()),
            time: Some("14:30".into()),
        })));
        let output = run(&service, &["add", "--text", "dentist at 2:30pm"]).await.unwrap();
        assert!(output.starts_with("Added Dentist"));
        assert_eq!(service.list()[0].time, "14:30");
    }

    #[tokio::test]
    async fn watch_notice_leaves_unset_permission_alone() {
        let notifier = Arc::new(ConsoleNotifier::new(Arc::new(MemoryStore::new()), true));
        let service = ReminderService::builder()
            .with_notification_sink(notifier.clone())
            .build();

        let mut out = Vec::new();
        announce_permission(service.permission_state(), &mut out).unwrap();
        let notice = String::from_utf8(out).unwrap();

        assert!(notice.contains("permission request"));
        assert_eq!(service.permission_state(), PermissionState::Unset);
        assert_eq!(notifier.permission(), PermissionState::Unset);
    }

    #[test]
    fn granted_permission_needs_no_notice() {
        let mut out = Vec::new();
        announce_permission(PermissionState::Granted, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
