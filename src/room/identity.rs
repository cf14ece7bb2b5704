//! Ephemeral per-session participant identity.
//!
//! Nothing here is persisted: every session draws a fresh id, and rejoining
//! a room produces a new participant.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

/// Presence colors handed out to participants.
pub const PALETTE: [&str; 5] = ["#f97316", "#22c55e", "#3b82f6", "#e11d48", "#a855f7"];

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const PARTICIPANT_ID_LEN: usize = 8;
const NAME_ID_PREFIX_LEN: usize = 4;

/// Random lowercase base36 string of `len` characters.
#[must_use]
pub fn random_base36(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect()
}

/// A participant as published in the room's presence set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// Identity generated once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    participant: Participant,
}

impl SessionIdentity {
    #[must_use]
    pub fn generate() -> Self {
        let id = random_base36(PARTICIPANT_ID_LEN);
        let color = PALETTE.choose(&mut rand::rng()).copied().unwrap_or(PALETTE[0]);
        Self::from_parts(&id, color)
    }

    /// Build an identity from a known id. The display name is derived from it.
    #[must_use]
    pub fn from_parts(id: &str, color: &str) -> Self {
        let prefix: String = id.chars().take(NAME_ID_PREFIX_LEN).collect();
        Self {
            participant: Participant { id: id.to_owned(), name: format!("User-{prefix}"), color: color.to_owned() },
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.participant.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.participant.name
    }

    #[must_use]
    pub fn color(&self) -> &str {
        &self.participant.color
    }

    #[must_use]
    pub fn participant(&self) -> &Participant {
        &self.participant
    }
}
