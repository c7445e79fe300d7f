//! Contracts for the external services the protocol depends on.
//!
//! Every collaborator is `Send + Sync` and injected as `Arc<dyn _>`; errors
//! are reported through [`AotwError`](crate::AotwError) variants named per
//! method.

use crate::album::{Artifact, Submission};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outgoing mail. New delivery backends only need to implement this trait.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Stable backend identifier (e.g. `console`, `webhook`).
    fn id(&self) -> &'static str;

    /// Deliver one message. Fails with [`AotwError::Delivery`](crate::AotwError::Delivery).
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()>;
}

/// Source of raw album submissions (form responses, mailbox replies).
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// All well-formed submissions at or after `marker`.
    ///
    /// Malformed entries are dropped by the source. Fails with
    /// [`AotwError::Fetch`](crate::AotwError::Fetch).
    async fn fetch_since(&self, marker: DateTime<Utc>) -> Result<Vec<Submission>>;
}

/// Album lookup used to fill the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackQuery {
    pub creator: String,
    pub title: String,
}

impl TrackQuery {
    pub fn for_artifact(artifact: &Artifact) -> Self {
        Self {
            creator: artifact.creator.clone(),
            title: artifact.title.clone(),
        }
    }
}

/// Streaming playlist editor.
#[async_trait]
pub trait PlaylistSync: Send + Sync {
    /// Replace the playlist's contents with the album matching `query`.
    ///
    /// Returns a public link to the matched album when the service has one.
    /// Fails with [`AotwError::NotFound`](crate::AotwError::NotFound) or
    /// [`AotwError::Sync`](crate::AotwError::Sync).
    async fn replace_playlist(&self, playlist_id: &str, query: &TrackQuery)
    -> Result<Option<String>>;
}

/// Held while a run mutates one period. Releases on drop.
pub struct PeriodGuard {
    period_number: u32,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl PeriodGuard {
    pub fn new(period_number: u32, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            period_number,
            release: Some(Box::new(release)),
        }
    }

    pub fn period_number(&self) -> u32 {
        self.period_number
    }
}

impl Drop for PeriodGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for PeriodGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodGuard")
            .field("period_number", &self.period_number)
            .finish()
    }
}

/// Persistence for per-period artifacts, keyed by period number.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn get(&self, period_number: u32) -> Result<Option<Artifact>>;

    async fn put(&self, period_number: u32, artifact: &Artifact) -> Result<()>;

    /// Exclusive access to `period_number` across invocations.
    ///
    /// Fails with [`AotwError::Busy`](crate::AotwError::Busy) when another
    /// run holds the period.
    async fn lock(&self, period_number: u32) -> Result<PeriodGuard>;
}

/// Optional text generation for announcement flavour. Best effort.
#[async_trait]
pub trait TextEnrichment: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
