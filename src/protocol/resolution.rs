//! Weekly resolution pipeline: Capture → Persist → Sync → Announce.
//!
//! Capture, Persist and Sync check the stored artifact before acting, so a
//! re-run resumes at the first incomplete stage. Announce always sends.
//! The whole pipeline runs under the period lock from
//! [`ArtifactStore::lock`].

use crate::album::{Artifact, Submission};
use crate::calendar::Period;
use crate::error::Result;
use crate::group::Participant;
use crate::protocol::messages;
use crate::services::traits::{
    ArtifactStore, Notifier, PlaylistSync, SubmissionSource, TextEnrichment, TrackQuery,
};
use tracing::{debug, info, warn};

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Persist,
    Sync,
    Announce,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Capture, Stage::Persist, Stage::Sync, Stage::Announce];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture => write!(f, "capture"),
            Self::Persist => write!(f, "persist"),
            Self::Sync => write!(f, "sync"),
            Self::Announce => write!(f, "announce"),
        }
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage did its work.
    Completed(String),
    /// Already done by an earlier run.
    Skipped(String),
    /// Nothing to do yet; later stages wait for a retry.
    Halted(String),
    /// An external call failed; later stages wait for a retry.
    Failed(String),
    /// An earlier stage stopped the pipeline.
    NotReached,
}

impl StageOutcome {
    fn allows_next(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Skipped(_))
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

/// Result of one resolution run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    pub period: Period,
    pub chooser: String,
    pub stages: Vec<StageRecord>,
}

impl ResolutionReport {
    fn new(period: Period, chooser: &Participant) -> Self {
        Self {
            period,
            chooser: chooser.display_name().to_owned(),
            stages: Vec::with_capacity(Stage::ALL.len()),
        }
    }

    fn record(&mut self, stage: Stage, outcome: StageOutcome) -> bool {
        let proceed = outcome.allows_next();
        match &outcome {
            StageOutcome::Completed(summary) => info!("{stage}: {summary}"),
            StageOutcome::Skipped(summary) => debug!("{stage} skipped: {summary}"),
            StageOutcome::Halted(summary) => info!("{stage} halted: {summary}"),
            StageOutcome::Failed(error) => warn!("{stage} failed: {error}"),
            StageOutcome::NotReached => {}
        }
        self.stages.push(StageRecord { stage, outcome });
        proceed
    }

    fn finish(mut self) -> Self {
        for stage in Stage::ALL {
            if !self.stages.iter().any(|r| r.stage == stage) {
                self.stages.push(StageRecord {
                    stage,
                    outcome: StageOutcome::NotReached,
                });
            }
        }
        self
    }

    /// Outcome of `stage`, if recorded.
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    /// First stage that failed with an external error.
    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|r| matches!(r.outcome, StageOutcome::Failed(_)))
            .map(|r| r.stage)
    }

    /// `true` when every stage completed or was already done.
    pub fn is_complete(&self) -> bool {
        Stage::ALL
            .iter()
            .all(|stage| self.outcome(*stage).is_some_and(StageOutcome::allows_next))
    }
}

impl std::fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} (chooser: {})", self.period, self.chooser)?;
        for record in &self.stages {
            let line = match &record.outcome {
                StageOutcome::Completed(s) => format!("done     {s}"),
                StageOutcome::Skipped(s) => format!("skipped  {s}"),
                StageOutcome::Halted(s) => format!("halted   {s}"),
                StageOutcome::Failed(s) => format!("FAILED   {s}"),
                StageOutcome::NotReached => "-".to_owned(),
            };
            writeln!(f, "  {:<9}{line}", record.stage.to_string())?;
        }
        Ok(())
    }
}

/// Pick the chooser's latest in-period submission.
///
/// Ties on timestamp go to the greater submission id, so the result does
/// not depend on input order.
pub fn select_submission<'a>(
    submissions: &'a [Submission],
    chooser: &Participant,
    period: &Period,
) -> Option<&'a Submission> {
    submissions
        .iter()
        .filter(|s| chooser.has_address(&s.submitter_address))
        .filter(|s| period.contains(s.timestamp.naive_utc()))
        .max_by(|a, b| a.recency_key().cmp(&b.recency_key()))
}

/// Everything one resolution run needs.
pub struct ResolutionContext<'a> {
    pub period: Period,
    pub chooser: &'a Participant,
    pub recipients: &'a [String],
    pub playlist_id: &'a str,
    pub playlist_link: &'a str,
    pub submissions: &'a dyn SubmissionSource,
    pub store: &'a dyn ArtifactStore,
    pub playlist: &'a dyn PlaylistSync,
    pub notifier: &'a dyn Notifier,
    pub enrichment: Option<&'a dyn TextEnrichment>,
}

/// Run the pipeline for `ctx.period`.
///
/// Returns `Err` only when the period lock cannot be taken; stage failures
/// are reported in the [`ResolutionReport`].
pub async fn resolve(ctx: &ResolutionContext<'_>) -> Result<ResolutionReport> {
    let period_number = ctx.period.number;
    let _guard = ctx.store.lock(period_number).await?;
    let mut report = ResolutionReport::new(ctx.period, ctx.chooser);

    // Capture
    let (outcome, stored, selected) = capture(ctx).await;
    if !report.record(Stage::Capture, outcome) {
        return Ok(report.finish());
    }

    // Persist
    let mut artifact = match (stored, selected) {
        (Some(existing), _) => {
            report.record(
                Stage::Persist,
                StageOutcome::Skipped(format!("{existing} already stored")),
            );
            existing
        }
        (None, Some(submission)) => {
            let artifact = Artifact::from_submission(&submission, period_number);
            match ctx.store.put(period_number, &artifact).await {
                Ok(()) => {
                    report.record(
                        Stage::Persist,
                        StageOutcome::Completed(format!("stored {artifact}")),
                    );
                    artifact
                }
                Err(e) => {
                    report.record(Stage::Persist, StageOutcome::Failed(e.to_string()));
                    return Ok(report.finish());
                }
            }
        }
        (None, None) => return Ok(report.finish()),
    };

    // Sync
    if artifact.playlist_synced {
        report.record(
            Stage::Sync,
            StageOutcome::Skipped("playlist already up to date".to_owned()),
        );
    } else {
        let query = TrackQuery::for_artifact(&artifact);
        let synced = match ctx.playlist.replace_playlist(ctx.playlist_id, &query).await {
            Ok(link) => {
                artifact.mark_synced(link);
                ctx.store.put(period_number, &artifact).await
            }
            Err(e) => Err(e),
        };
        let outcome = match synced {
            Ok(()) => StageOutcome::Completed(format!("playlist now holds {artifact}")),
            Err(e) => StageOutcome::Failed(e.to_string()),
        };
        if !report.record(Stage::Sync, outcome) {
            return Ok(report.finish());
        }
    }

    // Announce
    let extra = match ctx.enrichment {
        Some(enrichment) => match enrichment.generate(&messages::enrichment_prompt(&artifact)).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("announcement enrichment unavailable: {e}");
                None
            }
        },
        None => None,
    };
    let message = messages::chosen(
        &artifact,
        ctx.chooser.display_name(),
        ctx.playlist_link,
        extra.as_deref(),
    );
    let outcome = match ctx
        .notifier
        .send(ctx.recipients, &message.subject, &message.body)
        .await
    {
        Ok(()) => StageOutcome::Completed(format!(
            "announced {artifact} to {} recipients",
            ctx.recipients.len()
        )),
        Err(e) => StageOutcome::Failed(e.to_string()),
    };
    report.record(Stage::Announce, outcome);

    Ok(report.finish())
}

/// Capture stage. Returns the stored artifact if one exists, otherwise the
/// selected submission.
async fn capture(
    ctx: &ResolutionContext<'_>,
) -> (StageOutcome, Option<Artifact>, Option<Submission>) {
    match ctx.store.get(ctx.period.number).await {
        Ok(Some(existing)) => {
            return (
                StageOutcome::Skipped(format!("{existing} already captured")),
                Some(existing),
                None,
            );
        }
        Ok(None) => {}
        Err(e) => return (StageOutcome::Failed(e.to_string()), None, None),
    }

    let marker = ctx.period.start.and_utc();
    let submissions = match ctx.submissions.fetch_since(marker).await {
        Ok(submissions) => submissions,
        Err(e) => return (StageOutcome::Failed(e.to_string()), None, None),
    };

    match select_submission(&submissions, ctx.chooser, &ctx.period) {
        Some(selected) => (
            StageOutcome::Completed(format!(
                "selected {} by {} (submitted {})",
                selected.title, selected.creator, selected.timestamp
            )),
            None,
            Some(selected.clone()),
        ),
        None => (
            StageOutcome::Halted(format!(
                "no submission from {} yet ({} fetched)",
                ctx.chooser.contact_address(),
                submissions.len()
            )),
            None,
            None,
        ),
    }
}
