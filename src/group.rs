//! Participants and the rotation that picks each period's chooser.

use crate::error::{AotwError, Result};
use serde::{Deserialize, Serialize};

/// A member of the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    display_name: String,
    contact_address: String,
}

impl Participant {
    /// Create a participant with an explicit display name.
    pub fn new(display_name: impl Into<String>, contact_address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            contact_address: contact_address.into(),
        }
    }

    /// Create a participant named after the local part of the address.
    pub fn from_address(contact_address: &str) -> Self {
        let address = contact_address.trim();
        let name = address.split('@').next().unwrap_or(address);
        Self::new(name, address)
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn contact_address(&self) -> &str {
        &self.contact_address
    }

    /// Case-insensitive address comparison.
    pub fn has_address(&self, address: &str) -> bool {
        self.contact_address.eq_ignore_ascii_case(address.trim())
    }
}

/// Ordered, non-empty set of participants. Order is rotation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    participants: Vec<Participant>,
}

impl Group {
    /// Build a group, rejecting empty input and duplicate addresses.
    pub fn new(participants: Vec<Participant>) -> Result<Self> {
        if participants.is_empty() {
            return Err(AotwError::EmptyGroup);
        }
        for (idx, participant) in participants.iter().enumerate() {
            if participants[..idx]
                .iter()
                .any(|earlier| earlier.has_address(participant.contact_address()))
            {
                return Err(AotwError::DuplicateParticipant(
                    participant.contact_address().to_owned(),
                ));
            }
        }
        Ok(Self { participants })
    }

    /// Build a group from contact addresses, in order.
    pub fn from_addresses<S: AsRef<str>>(addresses: &[S]) -> Result<Self> {
        let participants = addresses
            .iter()
            .map(AsRef::as_ref)
            .filter(|address| !address.trim().is_empty())
            .map(Participant::from_address)
            .collect();
        Self::new(participants)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// All contact addresses, in rotation order.
    pub fn addresses(&self) -> Vec<String> {
        self.participants
            .iter()
            .map(|p| p.contact_address.clone())
            .collect()
    }

    /// The chooser for `period_number`.
    pub fn chooser_for_period(&self, period_number: u32) -> Result<&Participant> {
        chooser_for_period(period_number, &self.participants)
    }
}

/// `participants[period_number mod len]`; an empty slice is an error.
pub fn chooser_for_period(period_number: u32, participants: &[Participant]) -> Result<&Participant> {
    if participants.is_empty() {
        return Err(AotwError::EmptyGroup);
    }
    let idx = period_number as usize % participants.len();
    Ok(&participants[idx])
}
