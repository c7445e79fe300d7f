//! Submissions and the per-period album record.

use crate::error::{AotwError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Current [`Artifact`] schema version.
pub const ARTIFACT_SCHEMA_VERSION: u8 = 1;

/// Submission fields with dedicated struct members.
const KNOWN_SUBMISSION_KEYS: [&str; 6] = [
    "id",
    "response_id",
    "user_email",
    "timestamp",
    "album",
    "artist",
];

/// One candidate pick, as received from the submission source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Source-assigned identifier; used as the tie-breaker for equal timestamps.
    pub id: String,
    pub submitter_address: String,
    pub timestamp: DateTime<Utc>,
    /// Album title.
    pub title: String,
    /// Album artist.
    pub creator: String,
    /// Any further string answers carried by the submission.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Submission {
    /// Parse a logged form response.
    ///
    /// Expects `user_email`, `timestamp` (RFC 3339), `album` and `artist`.
    /// `id` (or `response_id`) is optional. Other string fields go to `extra`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| AotwError::Parse("submission is not a JSON object".to_owned()))?;

        let field = |key: &str| -> Result<String> {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .ok_or_else(|| AotwError::Parse(format!("submission missing field '{key}'")))
        };

        let raw_timestamp = field("timestamp")?;
        let timestamp = DateTime::parse_from_rfc3339(&raw_timestamp)
            .map_err(|e| AotwError::Parse(format!("bad timestamp {raw_timestamp:?}: {e}")))?
            .with_timezone(&Utc);

        let id = object
            .get("id")
            .or_else(|| object.get("response_id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let extra = object
            .iter()
            .filter(|(key, _)| !KNOWN_SUBMISSION_KEYS.contains(&key.as_str()))
            .filter_map(|(key, v)| v.as_str().map(|s| (key.clone(), s.to_owned())))
            .collect();

        Ok(Self {
            id,
            submitter_address: field("user_email")?,
            timestamp,
            title: field("album")?,
            creator: field("artist")?,
            extra,
        })
    }

    /// Ordering key: later timestamp wins, then greater id.
    pub fn recency_key(&self) -> (DateTime<Utc>, &str) {
        (self.timestamp, self.id.as_str())
    }
}

/// The resolved album for one period.
///
/// Older records written with `week`/`album`/`artist`/`spotify_link`/
/// `playlist_updated` keys still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default = "default_schema_version")]
    pub schema_version: u8,
    #[serde(alias = "week")]
    pub period_number: u32,
    #[serde(alias = "album")]
    pub title: String,
    #[serde(alias = "artist")]
    pub creator: String,
    #[serde(default, alias = "spotify_link")]
    pub external_link: Option<String>,
    #[serde(default, alias = "playlist_updated", deserialize_with = "null_as_false")]
    pub playlist_synced: bool,
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

fn default_schema_version() -> u8 {
    ARTIFACT_SCHEMA_VERSION
}

fn null_as_false<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl Artifact {
    /// Create an unsynced artifact for `period_number` from a submission.
    pub fn from_submission(submission: &Submission, period_number: u32) -> Self {
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            period_number,
            title: submission.title.clone(),
            creator: submission.creator.clone(),
            external_link: None,
            playlist_synced: false,
            submitted_by: Some(submission.submitter_address.clone()),
            submitted_at: Some(submission.timestamp),
            extra: submission.extra.clone(),
        }
    }

    /// Record a successful playlist update.
    pub fn mark_synced(&mut self, external_link: Option<String>) {
        self.playlist_synced = true;
        if external_link.is_some() {
            self.external_link = external_link;
        }
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} by {}", self.title, self.creator)
    }
}
