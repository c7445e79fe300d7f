//! Email subjects and bodies.

use crate::album::Artifact;

/// A composed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

/// "New period" announcement naming the chooser.
pub fn new_period(chooser_name: &str, form_link: &str, playlist_link: &str) -> Message {
    Message {
        subject: "New AOTW!".to_owned(),
        body: format!(
            "Time for a new AOTW! It is {chooser_name}'s turn to choose an album.\n\n\
             Please submit your AOTW here: {form_link}\n\n\
             Here's the playlist: {playlist_link}"
        ),
    }
}

/// Listening reminder.
pub fn reminder(days_left: u8) -> Message {
    Message {
        subject: format!("AOTW Reminder - {days_left} Days Left to Listen"),
        body: format!("Remember to listen to the AOTW! You have {days_left} days left to listen."),
    }
}

/// Announcement of the chosen album, with an optional extra paragraph.
pub fn chosen(
    artifact: &Artifact,
    chooser_name: &str,
    playlist_link: &str,
    extra: Option<&str>,
) -> Message {
    let mut body = format!(
        "{chooser_name} picked {} by {} as this week's AOTW.\n\n\
         The playlist has been updated: {playlist_link}",
        artifact.title, artifact.creator
    );
    if let Some(link) = &artifact.external_link {
        body.push_str(&format!("\n\nAlbum link: {link}"));
    }
    if let Some(extra) = extra.map(str::trim).filter(|e| !e.is_empty()) {
        body.push_str("\n\n");
        body.push_str(extra);
    }
    Message {
        subject: format!("New AOTW: {} by {}", artifact.title, artifact.creator),
        body,
    }
}

/// Prompt handed to the optional text generator.
pub fn enrichment_prompt(artifact: &Artifact) -> String {
    format!(
        "Share one short, surprising fact about the album \"{}\" by {}. \
         Two sentences at most.",
        artifact.title, artifact.creator
    )
}
