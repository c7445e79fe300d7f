//! Run configuration.
//!
//! Settings come from the process environment (after loading a `.env` file
//! when present) or from a TOML file. In the test environment every
//! variable `X` is looked up as `DEV_X` first.

use crate::calendar::{self, DEFAULT_PERIOD_DAYS};
use crate::error::{AotwError, Result};
use crate::group::Group;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Zone used for the run date when none is configured.
pub const DEFAULT_TIMEZONE: &str = "US/Pacific";

/// Which set of collaborators and storage paths a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Mock email, dry-run playlist, `albums/test/` storage.
    #[default]
    Test,
    /// Real delivery and playlist updates.
    Prod,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::Prod => write!(f, "prod"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = AotwError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(Self::Test),
            "prod" => Ok(Self::Prod),
            other => Err(AotwError::Config(format!(
                "unknown environment {other:?} (expected 'test' or 'prod')"
            ))),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AotwConfig {
    pub environment: Environment,
    /// Anchor weekday name (`AOTW_DAY`).
    pub aotw_day: String,
    /// Reminder weekday names (`REMINDER_DAYS`).
    pub reminder_days: Vec<String>,
    /// Participant addresses in rotation order (`PARTICIPANT_EMAILS`).
    pub participant_emails: Vec<String>,
    /// From-address for outgoing mail (`SENDER_EMAIL`).
    pub sender_email: String,
    /// Public submission form link (`AOTW_FORM_LINK`).
    pub form_link: String,
    /// Submission form identifier (`AOTW_FORM_ID`).
    pub form_id: String,
    /// Target playlist identifier (`PLAYLIST_ID`).
    pub playlist_id: String,
    /// Public playlist link (`PLAYLIST_LINK`).
    pub playlist_link: String,
    /// Root directory for artifacts and logged submissions (`AOTW_STORAGE_DIR`).
    pub storage_dir: Option<PathBuf>,
    /// Logged submissions file (`AOTW_SUBMISSIONS_PATH`).
    pub submissions_path: Option<PathBuf>,
    /// Period length in days (`AOTW_PERIOD_DAYS`).
    pub period_days: u32,
    /// Mail relay endpoint used in prod (`NOTIFY_WEBHOOK_URL`).
    pub notify_webhook_url: Option<String>,
    /// Pre-issued playlist API token (`SPOTIFY_ACCESS_TOKEN`).
    #[serde(skip_serializing)]
    pub spotify_access_token: Option<String>,
    /// IANA zone whose calendar decides "today" (`AOTW_TIMEZONE`).
    pub timezone: String,
}

impl Default for AotwConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            aotw_day: String::new(),
            reminder_days: Vec::new(),
            participant_emails: Vec::new(),
            sender_email: String::new(),
            form_link: String::new(),
            form_id: String::new(),
            playlist_id: String::new(),
            playlist_link: String::new(),
            storage_dir: None,
            submissions_path: None,
            period_days: DEFAULT_PERIOD_DAYS,
            notify_webhook_url: None,
            spotify_access_token: None,
            timezone: DEFAULT_TIMEZONE.to_owned(),
        }
    }
}

/// Typed rotation settings derived from [`AotwConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationSettings {
    pub anchor_weekday: u8,
    pub reminder_weekdays: Vec<u8>,
    pub period_days: u32,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

impl AotwConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env(environment: Environment) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("loaded environment from {}", path.display()),
            Err(e) if e.not_found() => tracing::debug!("no .env file found"),
            Err(e) => return Err(AotwError::Config(format!("cannot read .env: {e}"))),
        }
        Self::from_lookup(environment, |key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(environment: Environment, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Option<String> {
            let value = if environment == Environment::Test {
                lookup(&format!("DEV_{key}")).or_else(|| lookup(key))
            } else {
                lookup(key)
            };
            value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
        };

        let period_days = match get("AOTW_PERIOD_DAYS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                AotwError::Config(format!("invalid AOTW_PERIOD_DAYS {raw:?}: {e}"))
            })?,
            None => DEFAULT_PERIOD_DAYS,
        };

        Ok(Self {
            environment,
            aotw_day: get("AOTW_DAY").unwrap_or_default(),
            reminder_days: get("REMINDER_DAYS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            participant_emails: get("PARTICIPANT_EMAILS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            sender_email: get("SENDER_EMAIL").unwrap_or_default(),
            form_link: get("AOTW_FORM_LINK").unwrap_or_default(),
            form_id: get("AOTW_FORM_ID").unwrap_or_default(),
            playlist_id: get("PLAYLIST_ID").unwrap_or_default(),
            playlist_link: get("PLAYLIST_LINK").unwrap_or_default(),
            storage_dir: get("AOTW_STORAGE_DIR").map(PathBuf::from),
            submissions_path: get("AOTW_SUBMISSIONS_PATH").map(PathBuf::from),
            period_days,
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL"),
            spotify_access_token: get("SPOTIFY_ACCESS_TOKEN"),
            timezone: get("AOTW_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_owned()),
        })
    }

    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AotwError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// The playlist token is never written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AotwError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Anchor weekday ordinal.
    pub fn anchor_weekday(&self) -> Result<u8> {
        if self.aotw_day.trim().is_empty() {
            return Err(AotwError::Config("AOTW_DAY is not set".to_owned()));
        }
        calendar::day_name_to_ordinal(&self.aotw_day)
    }

    /// Reminder weekday ordinals.
    pub fn reminder_weekdays(&self) -> Result<Vec<u8>> {
        self.reminder_days
            .iter()
            .map(|day| calendar::day_name_to_ordinal(day))
            .collect()
    }

    /// The configured run timezone.
    pub fn run_timezone(&self) -> Result<Tz> {
        self.timezone.trim().parse::<Tz>().map_err(|e| {
            AotwError::Config(format!("invalid AOTW_TIMEZONE {:?}: {e}", self.timezone))
        })
    }

    /// Civil date of `now` in the run timezone.
    pub fn run_date(&self, now: DateTime<Utc>) -> Result<NaiveDate> {
        Ok(calendar::date_in_timezone(now, self.run_timezone()?))
    }

    /// The participant group, in configured order.
    pub fn group(&self) -> Result<Group> {
        Group::from_addresses(&self.participant_emails)
    }

    /// Validate everything the protocol needs.
    pub fn validate(&self) -> Result<(RotationSettings, Group)> {
        if self.period_days == 0 {
            return Err(AotwError::Config(
                "period length must be at least one day".to_owned(),
            ));
        }
        if let Some(raw) = &self.notify_webhook_url {
            url::Url::parse(raw)
                .map_err(|e| AotwError::Config(format!("invalid NOTIFY_WEBHOOK_URL: {e}")))?;
        }
        self.run_timezone()?;
        let settings = RotationSettings {
            anchor_weekday: self.anchor_weekday()?,
            reminder_weekdays: self.reminder_weekdays()?,
            period_days: self.period_days,
        };
        Ok((settings, self.group()?))
    }

    /// Root directory for all persisted data.
    pub fn storage_root(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|dir| dir.join("aotw"))
                .unwrap_or_else(|| PathBuf::from("aotw-data"))
        })
    }

    /// Directory holding `aotw_{n}.json` records for this environment.
    pub fn artifact_dir(&self) -> PathBuf {
        let albums = self.storage_root().join("albums");
        match self.environment {
            Environment::Prod => albums,
            Environment::Test => albums.join("test"),
        }
    }

    /// Logged form submissions file.
    pub fn submissions_file(&self) -> PathBuf {
        self.submissions_path.clone().unwrap_or_else(|| {
            self.storage_root()
                .join("form_submissions")
                .join("submissions.json")
        })
    }
}
