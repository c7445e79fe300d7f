//! State-advance protocol.
//!
//! [`AotwManager`] binds one day's date to the rotation settings and the
//! external collaborators, then runs either the daily decision
//! ([`daily`]) or the weekly resolution ([`resolution`]).

pub mod daily;
pub mod messages;
pub mod resolution;

use crate::album::Artifact;
use crate::calendar::{self, Period};
use crate::config::{AotwConfig, Environment, RotationSettings};
use crate::error::{AotwError, Result};
use crate::group::{Group, Participant};
use crate::services::traits::{
    ArtifactStore, Notifier, PlaylistSync, SubmissionSource, TextEnrichment,
};
use crate::services::{
    ConsoleNotifier, DryRunPlaylistSync, FileArtifactStore, JsonFileSubmissionSource,
    SpotifyPlaylistSync, WebhookNotifier,
};
use chrono::NaiveDate;
use daily::DailyAction;
use resolution::{ResolutionContext, ResolutionReport};
use std::sync::Arc;
use tracing::{debug, info};

/// External services used by the protocol.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub submissions: Arc<dyn SubmissionSource>,
    pub playlist: Arc<dyn PlaylistSync>,
    pub store: Arc<dyn ArtifactStore>,
    pub enrichment: Option<Arc<dyn TextEnrichment>>,
}

impl Collaborators {
    /// Default adapters for `config.environment`.
    ///
    /// Test prints mail and leaves the playlist alone; prod needs a
    /// webhook endpoint and a playlist access token.
    pub fn for_config(config: &AotwConfig) -> Result<Self> {
        let submissions = Arc::new(JsonFileSubmissionSource::new(config.submissions_file()));
        let store = Arc::new(FileArtifactStore::new(config.artifact_dir()));

        let (notifier, playlist): (Arc<dyn Notifier>, Arc<dyn PlaylistSync>) =
            match config.environment {
                Environment::Test => (Arc::new(ConsoleNotifier), Arc::new(DryRunPlaylistSync)),
                Environment::Prod => {
                    let endpoint = config.notify_webhook_url.as_deref().ok_or_else(|| {
                        AotwError::Config("NOTIFY_WEBHOOK_URL is required in prod".to_owned())
                    })?;
                    let token = config.spotify_access_token.as_deref().ok_or_else(|| {
                        AotwError::Config("SPOTIFY_ACCESS_TOKEN is required in prod".to_owned())
                    })?;
                    (
                        Arc::new(WebhookNotifier::new(endpoint, config.sender_email.clone())),
                        Arc::new(SpotifyPlaylistSync::new(token)),
                    )
                }
            };

        Ok(Self {
            notifier,
            submissions,
            playlist,
            store,
            enrichment: None,
        })
    }

    pub fn with_enrichment(mut self, enrichment: Arc<dyn TextEnrichment>) -> Self {
        self.enrichment = Some(enrichment);
        self
    }
}

/// Read-only summary of the current period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub today: NaiveDate,
    pub period: Period,
    pub chooser: String,
    pub artifact: Option<Artifact>,
    pub next_action: DailyAction,
    pub days_until_next_period: u8,
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "today:    {}", self.today)?;
        writeln!(f, "current:  {}", self.period)?;
        writeln!(f, "chooser:  {}", self.chooser)?;
        match &self.artifact {
            Some(artifact) => writeln!(
                f,
                "album:    {artifact} (playlist {})",
                if artifact.playlist_synced { "synced" } else { "not synced" }
            )?,
            None => writeln!(f, "album:    not picked yet")?,
        }
        writeln!(f, "today's action: {}", self.next_action)?;
        write!(f, "next period in {} days", self.days_until_next_period)
    }
}

/// Runs the protocol for one date.
pub struct AotwManager {
    settings: RotationSettings,
    group: Group,
    form_link: String,
    playlist_id: String,
    playlist_link: String,
    today: NaiveDate,
    collaborators: Collaborators,
}

impl AotwManager {
    /// Validate `config` and bind it to `today`.
    pub fn new(config: &AotwConfig, today: NaiveDate, collaborators: Collaborators) -> Result<Self> {
        let (settings, group) = config.validate()?;
        Ok(Self {
            settings,
            group,
            form_link: config.form_link.clone(),
            playlist_id: config.playlist_id.clone(),
            playlist_link: config.playlist_link.clone(),
            today,
            collaborators,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    /// The period containing today.
    pub fn period(&self) -> Period {
        Period::for_date(self.today, self.settings.anchor_weekday, self.settings.period_days)
    }

    /// The participant choosing this period.
    pub fn chooser(&self) -> Result<&Participant> {
        self.group.chooser_for_period(self.period().number)
    }

    fn today_weekday(&self) -> u8 {
        calendar::weekday_ordinal(self.today)
    }

    /// Run today's scheduled action and return what was done.
    ///
    /// Mail failures propagate; the caller decides whether to retry.
    pub async fn run_daily(&self) -> Result<DailyAction> {
        let today = self.today_weekday();
        let anchor = self.settings.anchor_weekday;
        let reminders = &self.settings.reminder_weekdays;
        let period = self.period();

        let artifact_exists = if daily::needs_artifact_check(today, anchor, reminders) {
            self.collaborators.store.get(period.number).await?.is_some()
        } else {
            false
        };

        let action = daily::decide(today, anchor, reminders, artifact_exists);
        info!(
            "{period} on {} {}: {action}",
            calendar::ordinal_to_day_name(today)?,
            self.today
        );

        let message = match action {
            DailyAction::AnnounceNewPeriod => {
                let chooser = self.chooser()?;
                info!("{} chooses for {period}", chooser.contact_address());
                messages::new_period(chooser.display_name(), &self.form_link, &self.playlist_link)
            }
            DailyAction::SendReminder { days_left } => messages::reminder(days_left),
            DailyAction::AbortNoArtifact => {
                info!("no album picked for {period}; skipping reminder");
                return Ok(action);
            }
            DailyAction::NoOp => return Ok(action),
        };

        let recipients = self.group.addresses();
        self.collaborators
            .notifier
            .send(&recipients, &message.subject, &message.body)
            .await?;
        debug!(
            "sent {:?} via {} to {} recipients",
            message.subject,
            self.collaborators.notifier.id(),
            recipients.len()
        );
        Ok(action)
    }

    /// Advance the current period's resolution as far as possible.
    ///
    /// Safe to re-run; completed stages are skipped. Returns
    /// [`AotwError::Busy`] when another run holds the period.
    pub async fn resolve(&self) -> Result<ResolutionReport> {
        let period = self.period();
        let chooser = self.chooser()?;
        let recipients = self.group.addresses();
        info!("resolving {period} for {}", chooser.contact_address());

        let ctx = ResolutionContext {
            period,
            chooser,
            recipients: &recipients,
            playlist_id: &self.playlist_id,
            playlist_link: &self.playlist_link,
            submissions: self.collaborators.submissions.as_ref(),
            store: self.collaborators.store.as_ref(),
            playlist: self.collaborators.playlist.as_ref(),
            notifier: self.collaborators.notifier.as_ref(),
            enrichment: self.collaborators.enrichment.as_deref(),
        };
        resolution::resolve(&ctx).await
    }

    /// Current period, chooser, stored album and today's action, without
    /// sending anything.
    pub async fn status(&self) -> Result<StatusReport> {
        let period = self.period();
        let artifact = self.collaborators.store.get(period.number).await?;
        let today = self.today_weekday();
        let anchor = self.settings.anchor_weekday;

        Ok(StatusReport {
            today: self.today,
            period,
            chooser: self.chooser()?.display_name().to_owned(),
            next_action: daily::decide(
                today,
                anchor,
                &self.settings.reminder_weekdays,
                artifact.is_some(),
            ),
            artifact,
            days_until_next_period: match calendar::days_until_weekday(today, anchor) {
                0 => 7,
                n => n,
            },
        })
    }
}
