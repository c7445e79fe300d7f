//! Integration tests for the daily decision and the weekly resolution.
//!
//! Uses in-memory fakes for mail, submissions and the playlist so each
//! stage can be made to fail on demand.

use aotw::album::{Artifact, Submission};
use aotw::protocol::daily::DailyAction;
use aotw::protocol::resolution::{Stage, StageOutcome};
use aotw::services::traits::{
    ArtifactStore, Notifier, PlaylistSync, SubmissionSource, TextEnrichment, TrackQuery,
};
use aotw::services::{FileArtifactStore, MemoryArtifactStore};
use aotw::{AotwConfig, AotwError, AotwManager, Collaborators};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct SentMail {
    recipients: Vec<String>,
    subject: String,
    body: String,
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn id(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> aotw::Result<()> {
        self.sent.lock().unwrap().push(SentMail {
            recipients: recipients.to_vec(),
            subject: subject.to_owned(),
            body: body.to_owned(),
        });
        Ok(())
    }
}

struct StaticSource {
    submissions: Vec<Submission>,
}

#[async_trait]
impl SubmissionSource for StaticSource {
    async fn fetch_since(&self, marker: DateTime<Utc>) -> aotw::Result<Vec<Submission>> {
        Ok(self
            .submissions
            .iter()
            .filter(|s| s.timestamp >= marker)
            .cloned()
            .collect())
    }
}

/// Fails the first `failures` calls, then succeeds.
struct FlakyPlaylist {
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyPlaylist {
    fn failing(times: usize) -> Self {
        Self {
            failures: AtomicUsize::new(times),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PlaylistSync for FlakyPlaylist {
    async fn replace_playlist(
        &self,
        _playlist_id: &str,
        query: &TrackQuery,
    ) -> aotw::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AotwError::Sync("503 service unavailable".to_owned()));
        }
        Ok(Some(format!("https://music.example.com/{}", query.title)))
    }
}

struct FixedEnrichment(Option<&'static str>);

#[async_trait]
impl TextEnrichment for FixedEnrichment {
    async fn generate(&self, _prompt: &str) -> aotw::Result<String> {
        self.0
            .map(str::to_owned)
            .ok_or_else(|| AotwError::Fetch("generator offline".to_owned()))
    }
}

fn config() -> AotwConfig {
    AotwConfig {
        aotw_day: "Wednesday".to_owned(),
        reminder_days: vec!["Monday".to_owned()],
        participant_emails: vec![
            "a@example.com".to_owned(),
            "b@example.com".to_owned(),
            "c@example.com".to_owned(),
        ],
        form_link: "https://forms.example.com/aotw".to_owned(),
        playlist_id: "pl-1".to_owned(),
        playlist_link: "https://music.example.com/playlist/pl-1".to_owned(),
        ..AotwConfig::default()
    }
}

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

/// Friday of the period anchored on Wednesday 2024-05-15 (period 20, chooser c).
fn friday() -> NaiveDate {
    date(5, 17)
}

fn submission(id: &str, who: &str, day: u32, hour: u32, title: &str) -> Submission {
    Submission {
        id: id.to_owned(),
        submitter_address: who.to_owned(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap(),
        title: title.to_owned(),
        creator: "Joni Mitchell".to_owned(),
        extra: BTreeMap::new(),
    }
}

struct Harness {
    notifier: Arc<RecordingNotifier>,
    playlist: Arc<FlakyPlaylist>,
    store: MemoryArtifactStore,
    manager: AotwManager,
}

fn harness(today: NaiveDate, submissions: Vec<Submission>, playlist_failures: usize) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let playlist = Arc::new(FlakyPlaylist::failing(playlist_failures));
    let store = MemoryArtifactStore::new();
    let collaborators = Collaborators {
        notifier: notifier.clone(),
        submissions: Arc::new(StaticSource { submissions }),
        playlist: playlist.clone(),
        store: Arc::new(store.clone()),
        enrichment: None,
    };
    let manager = AotwManager::new(&config(), today, collaborators).unwrap();
    Harness {
        notifier,
        playlist,
        store,
        manager,
    }
}

#[tokio::test]
async fn test_full_resolution_announces_chosen_album() {
    let h = harness(
        friday(),
        vec![
            submission("1", "c@example.com", 15, 10, "Court and Spark"),
            submission("2", "c@example.com", 16, 10, "Blue"),
            submission("3", "a@example.com", 16, 11, "Hejira"),
        ],
        0,
    );

    let report = h.manager.resolve().await.unwrap();
    assert!(report.is_complete(), "{report}");
    assert_eq!(report.period.number, 20);
    assert_eq!(report.chooser, "c");

    let stored = h.store.get(20).await.unwrap().unwrap();
    assert_eq!(stored.title, "Blue");
    assert!(stored.playlist_synced);
    assert_eq!(
        stored.external_link.as_deref(),
        Some("https://music.example.com/Blue")
    );

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "New AOTW: Blue by Joni Mitchell");
    assert_eq!(sent[0].recipients.len(), 3);
    assert!(sent[0].body.contains("c picked Blue"));
}

#[tokio::test]
async fn test_sync_failure_resumes_on_next_run() {
    let h = harness(
        friday(),
        vec![submission("1", "c@example.com", 16, 10, "Blue")],
        1,
    );

    let first = h.manager.resolve().await.unwrap();
    assert!(matches!(
        first.outcome(Stage::Capture),
        Some(StageOutcome::Completed(_))
    ));
    assert!(matches!(
        first.outcome(Stage::Persist),
        Some(StageOutcome::Completed(_))
    ));
    assert_eq!(first.failed_stage(), Some(Stage::Sync));
    assert_eq!(first.outcome(Stage::Announce), Some(&StageOutcome::NotReached));
    assert!(h.notifier.sent().is_empty());
    assert!(!h.store.get(20).await.unwrap().unwrap().playlist_synced);

    let second = h.manager.resolve().await.unwrap();
    assert!(matches!(
        second.outcome(Stage::Capture),
        Some(StageOutcome::Skipped(_))
    ));
    assert!(matches!(
        second.outcome(Stage::Persist),
        Some(StageOutcome::Skipped(_))
    ));
    assert!(matches!(
        second.outcome(Stage::Sync),
        Some(StageOutcome::Completed(_))
    ));
    assert!(second.is_complete());
    assert_eq!(h.store.len(), 1);
    assert_eq!(h.playlist.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_rerun_after_completion_only_repeats_announce() {
    let h = harness(
        friday(),
        vec![submission("1", "c@example.com", 16, 10, "Blue")],
        0,
    );

    h.manager.resolve().await.unwrap();
    let again = h.manager.resolve().await.unwrap();

    for stage in [Stage::Capture, Stage::Persist, Stage::Sync] {
        assert!(matches!(again.outcome(stage), Some(StageOutcome::Skipped(_))));
    }
    assert_eq!(h.playlist.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.len(), 1);
    // Announce is at-least-once.
    assert_eq!(h.notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_no_submission_halts_without_side_effects() {
    let h = harness(
        friday(),
        vec![
            submission("1", "a@example.com", 16, 10, "Hejira"),
            // Previous period.
            submission("2", "c@example.com", 10, 10, "Ladies of the Canyon"),
        ],
        0,
    );

    let report = h.manager.resolve().await.unwrap();
    assert!(matches!(
        report.outcome(Stage::Capture),
        Some(StageOutcome::Halted(_))
    ));
    for stage in [Stage::Persist, Stage::Sync, Stage::Announce] {
        assert_eq!(report.outcome(stage), Some(&StageOutcome::NotReached));
    }
    assert!(report.failed_stage().is_none());
    assert!(h.store.is_empty());
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.playlist.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_equal_timestamps_pick_greatest_id() {
    let h = harness(
        friday(),
        vec![
            submission("resp-b", "c@example.com", 16, 10, "Blue"),
            submission("resp-c", "C@Example.com", 16, 10, "Hejira"),
            submission("resp-a", "c@example.com", 16, 10, "Court and Spark"),
        ],
        0,
    );

    h.manager.resolve().await.unwrap();
    assert_eq!(h.store.get(20).await.unwrap().unwrap().title, "Hejira");
}

#[tokio::test]
async fn test_concurrent_resolution_is_rejected() {
    let h = harness(
        friday(),
        vec![submission("1", "c@example.com", 16, 10, "Blue")],
        0,
    );

    let guard = h.store.lock(20).await.unwrap();
    let err = h.manager.resolve().await.unwrap_err();
    assert!(matches!(err, AotwError::Busy(20)));
    assert!(h.store.is_empty());

    drop(guard);
    assert!(h.manager.resolve().await.unwrap().is_complete());
}

#[tokio::test]
async fn test_enrichment_is_best_effort() {
    let notifier = Arc::new(RecordingNotifier::default());
    let store = MemoryArtifactStore::new();
    let base = Collaborators {
        notifier: notifier.clone(),
        submissions: Arc::new(StaticSource {
            submissions: vec![submission("1", "c@example.com", 16, 10, "Blue")],
        }),
        playlist: Arc::new(FlakyPlaylist::failing(0)),
        store: Arc::new(store.clone()),
        enrichment: None,
    };

    let offline = base
        .clone()
        .with_enrichment(Arc::new(FixedEnrichment(None)));
    let manager = AotwManager::new(&config(), friday(), offline).unwrap();
    assert!(manager.resolve().await.unwrap().is_complete());

    let online = base.with_enrichment(Arc::new(FixedEnrichment(Some("Recorded in 1971."))));
    let manager = AotwManager::new(&config(), friday(), online).unwrap();
    assert!(manager.resolve().await.unwrap().is_complete());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(!sent[0].body.contains("Recorded in 1971."));
    assert!(sent[1].body.ends_with("Recorded in 1971."));
}

#[tokio::test]
async fn test_file_store_persists_and_releases_lock() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileArtifactStore::new(dir.path().to_path_buf());
    let notifier = Arc::new(RecordingNotifier::default());
    let collaborators = Collaborators {
        notifier: notifier.clone(),
        submissions: Arc::new(StaticSource {
            submissions: vec![submission("1", "c@example.com", 16, 10, "Blue")],
        }),
        playlist: Arc::new(FlakyPlaylist::failing(0)),
        store: Arc::new(FileArtifactStore::new(dir.path().to_path_buf())),
        enrichment: None,
    };
    let manager = AotwManager::new(&config(), friday(), collaborators).unwrap();

    assert!(manager.resolve().await.unwrap().is_complete());
    assert!(store.artifact_path(20).exists());
    assert!(!dir.path().join("aotw_20.lock").exists());

    let raw = std::fs::read_to_string(store.artifact_path(20)).unwrap();
    let artifact: Artifact = serde_json::from_str(&raw).unwrap();
    assert_eq!(artifact.period_number, 20);
    assert!(artifact.playlist_synced);
}

#[tokio::test]
async fn test_anchor_day_announces_new_period() {
    let h = harness(date(5, 15), Vec::new(), 0);

    let action = h.manager.run_daily().await.unwrap();
    assert_eq!(action, DailyAction::AnnounceNewPeriod);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "New AOTW!");
    assert!(sent[0].body.contains("It is c's turn"));
    assert!(sent[0].body.contains("https://forms.example.com/aotw"));
}

#[tokio::test]
async fn test_reminder_day_depends_on_stored_album() {
    let monday = date(5, 20);
    let h = harness(monday, Vec::new(), 0);

    assert_eq!(
        h.manager.run_daily().await.unwrap(),
        DailyAction::AbortNoArtifact
    );
    assert!(h.notifier.sent().is_empty());

    let period = h.manager.period().number;
    let artifact = Artifact::from_submission(
        &submission("1", "a@example.com", 20, 9, "Blue"),
        period,
    );
    h.store.put(period, &artifact).await.unwrap();

    assert_eq!(
        h.manager.run_daily().await.unwrap(),
        DailyAction::SendReminder { days_left: 2 }
    );
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "AOTW Reminder - 2 Days Left to Listen");
}

#[tokio::test]
async fn test_other_days_send_nothing() {
    let h = harness(date(5, 17), Vec::new(), 0);
    assert_eq!(h.manager.run_daily().await.unwrap(), DailyAction::NoOp);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_monday_reminder_sees_album_resolved_on_friday() {
    let store = MemoryArtifactStore::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let collaborators = Collaborators {
        notifier: notifier.clone(),
        submissions: Arc::new(StaticSource {
            submissions: vec![submission("1", "c@example.com", 16, 10, "Blue")],
        }),
        playlist: Arc::new(FlakyPlaylist::failing(0)),
        store: Arc::new(store.clone()),
        enrichment: None,
    };

    let on_friday = AotwManager::new(&config(), friday(), collaborators.clone()).unwrap();
    let report = on_friday.resolve().await.unwrap();
    assert!(report.is_complete(), "{report}");
    assert_eq!(report.period.number, 20);

    // 2024-05-20: the raw day count has already moved on to 21.
    let on_monday = AotwManager::new(&config(), date(5, 20), collaborators).unwrap();
    let period = on_monday.period();
    assert_eq!(period.number, 20);
    assert_eq!(period.anchor_date, date(5, 15));
    assert_eq!(on_monday.chooser().unwrap().contact_address(), "c@example.com");

    assert_eq!(
        on_monday.run_daily().await.unwrap(),
        DailyAction::SendReminder { days_left: 2 }
    );
    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].subject, "AOTW Reminder - 2 Days Left to Listen");
    assert_eq!(store.len(), 1);
}
