//! Submission sources.

use crate::album::Submission;
use crate::error::{AotwError, Result};
use crate::services::traits::SubmissionSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Reads the logged form responses: a JSON array of response objects.
///
/// A missing file means no submissions yet. Entries that fail to parse
/// are skipped with a warning.
pub struct JsonFileSubmissionSource {
    path: PathBuf,
}

impl JsonFileSubmissionSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SubmissionSource for JsonFileSubmissionSource {
    async fn fetch_since(&self, marker: DateTime<Utc>) -> Result<Vec<Submission>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no submissions logged at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(AotwError::Fetch(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let entries: Vec<Value> = serde_json::from_slice(&bytes).map_err(|e| {
            AotwError::Fetch(format!(
                "submissions log {} is not a JSON array: {e}",
                self.path.display()
            ))
        })?;

        Ok(parse_entries(&entries, marker))
    }
}

/// Parse raw entries, dropping malformed ones and those before `marker`.
pub fn parse_entries(entries: &[Value], marker: DateTime<Utc>) -> Vec<Submission> {
    let mut submissions = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        match Submission::from_json(entry) {
            Ok(submission) if submission.timestamp >= marker => submissions.push(submission),
            Ok(_) => {}
            Err(e) => warn!("ignoring malformed submission #{idx}: {e}"),
        }
    }
    submissions
}
