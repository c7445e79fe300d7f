//! Daily decision: announce, remind, abort or do nothing.
//!
//! Evaluated fresh on every invocation; nothing about "today's action" is
//! persisted.

use crate::calendar;

/// What today's run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyAction {
    /// Anchor day: announce the new period and its chooser.
    AnnounceNewPeriod,
    /// Reminder day, but nothing has been picked yet.
    AbortNoArtifact,
    /// Reminder day with a pick on record.
    SendReminder { days_left: u8 },
    /// Nothing scheduled today.
    NoOp,
}

impl std::fmt::Display for DailyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AnnounceNewPeriod => write!(f, "announce new period"),
            Self::AbortNoArtifact => write!(f, "abort (no album picked)"),
            Self::SendReminder { days_left } => write!(f, "send reminder ({days_left} days left)"),
            Self::NoOp => write!(f, "no-op"),
        }
    }
}

/// Whether [`decide`] needs to know if the period has an artifact.
pub fn needs_artifact_check(today_weekday: u8, anchor_weekday: u8, reminder_weekdays: &[u8]) -> bool {
    today_weekday != anchor_weekday && reminder_weekdays.contains(&today_weekday)
}

/// Pick today's action. The anchor day always announces, whether or not
/// the previous period was resolved.
pub fn decide(
    today_weekday: u8,
    anchor_weekday: u8,
    reminder_weekdays: &[u8],
    artifact_exists: bool,
) -> DailyAction {
    if today_weekday == anchor_weekday {
        DailyAction::AnnounceNewPeriod
    } else if reminder_weekdays.contains(&today_weekday) {
        if artifact_exists {
            DailyAction::SendReminder {
                days_left: calendar::days_until_weekday(today_weekday, anchor_weekday),
            }
        } else {
            DailyAction::AbortNoArtifact
        }
    } else {
        DailyAction::NoOp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONDAY: u8 = 0;
    const WEDNESDAY: u8 = 2;
    const FRIDAY: u8 = 4;

    #[test]
    fn anchor_day_announces() {
        assert_eq!(
            decide(WEDNESDAY, WEDNESDAY, &[MONDAY], false),
            DailyAction::AnnounceNewPeriod
        );
        assert_eq!(
            decide(WEDNESDAY, WEDNESDAY, &[WEDNESDAY], true),
            DailyAction::AnnounceNewPeriod
        );
    }

    #[test]
    fn reminder_day_without_artifact_aborts() {
        assert_eq!(
            decide(MONDAY, WEDNESDAY, &[MONDAY], false),
            DailyAction::AbortNoArtifact
        );
    }

    #[test]
    fn reminder_day_with_artifact_reminds() {
        assert_eq!(
            decide(MONDAY, WEDNESDAY, &[MONDAY], true),
            DailyAction::SendReminder { days_left: 2 }
        );
        assert_eq!(
            decide(FRIDAY, WEDNESDAY, &[MONDAY, FRIDAY], true),
            DailyAction::SendReminder { days_left: 5 }
        );
    }

    #[test]
    fn other_days_are_no_ops() {
        assert_eq!(decide(FRIDAY, WEDNESDAY, &[MONDAY], true), DailyAction::NoOp);
        assert_eq!(decide(FRIDAY, WEDNESDAY, &[], false), DailyAction::NoOp);
    }

    #[test]
    fn every_day_maps_to_exactly_one_action() {
        for anchor in 0..7u8 {
            for today in 0..7u8 {
                for exists in [false, true] {
                    let action = decide(today, anchor, &[0, 4], exists);
                    let expected_announce = today == anchor;
                    assert_eq!(
                        matches!(action, DailyAction::AnnounceNewPeriod),
                        expected_announce
                    );
                    if !expected_announce && ![0u8, 4].contains(&today) {
                        assert_eq!(action, DailyAction::NoOp);
                    }
                }
            }
        }
    }

    #[test]
    fn artifact_check_only_on_non_anchor_reminder_days() {
        assert!(needs_artifact_check(MONDAY, WEDNESDAY, &[MONDAY]));
        assert!(!needs_artifact_check(WEDNESDAY, WEDNESDAY, &[WEDNESDAY]));
        assert!(!needs_artifact_check(FRIDAY, WEDNESDAY, &[MONDAY]));
    }
}
