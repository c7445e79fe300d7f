//! External collaborators behind narrow async traits.
//!
//! The protocol only sees the traits in [`traits`]; each adapter module
//! provides one or more implementations that can be swapped per
//! environment.

pub mod lock;
pub mod notifier;
pub mod playlist;
pub mod store;
pub mod submissions;
pub mod traits;

pub use notifier::{ConsoleNotifier, WebhookNotifier};
pub use playlist::{DryRunPlaylistSync, SpotifyPlaylistSync};
pub use store::{FileArtifactStore, MemoryArtifactStore};
pub use submissions::JsonFileSubmissionSource;
pub use traits::{
    ArtifactStore, Notifier, PeriodGuard, PlaylistSync, SubmissionSource, TextEnrichment,
    TrackQuery,
};
