//! Album of the Week: a weekly album rotation for a small group.
//!
//! Each period one participant picks an album. Once a day the scheduler
//! announces a new period or reminds everyone to listen; once a week it
//! resolves the period:
//! Capture → Persist → Sync → Announce
//!
//! # Architecture
//!
//! - **Calendar**: weekday ordinals, period numbers and bounds ([`calendar`])
//! - **Rotation**: who chooses for a period ([`group`])
//! - **Protocol**: the daily decision and the resumable weekly resolution ([`protocol`])
//! - **Services**: mail, submissions, playlist and artifact storage behind async traits ([`services`])

pub mod album;
pub mod calendar;
pub mod config;
pub mod error;
pub mod group;
pub mod protocol;
pub mod services;

pub use album::{Artifact, Submission};
pub use config::{AotwConfig, Environment};
pub use error::{AotwError, Result};
pub use group::{Group, Participant};
pub use protocol::{AotwManager, Collaborators};
