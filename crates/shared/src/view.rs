use serde::{Deserialize, Serialize};

// ============================================================================
// Session bootstrap view
// ============================================================================

/// Initial state of a joined room, embedded in the session page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub room_id: String,
    pub invite_code: String,
    /// Active participants, oldest join first
    pub participants: Vec<ParticipantView>,
    /// Fields dropped because they could not be encoded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omitted_fields: Vec<OmittedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub participant_id: String,
    pub is_creator: bool,
    pub is_guest: bool,
    pub joined_at: String,
    #[serde(default)]
    pub character: Option<CharacterView>,
}

/// Display fields of the character a participant is playing.
///
/// `name` and `class` are `None` only when the stored value had to be
/// omitted; an empty class is sent as `Some("")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterView {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmittedField {
    pub participant_id: String,
    pub field: String,
}

impl SessionView {
    pub fn participant(&self, participant_id: &str) -> Option<&ParticipantView> {
        self.participants
            .iter()
            .find(|p| p.participant_id == participant_id)
    }

    /// Characters currently seated, in participant order
    pub fn seated_characters(&self) -> impl Iterator<Item = &CharacterView> {
        self.participants.iter().filter_map(|p| p.character.as_ref())
    }
}

// ============================================================================
// Tests
// ============================================================================
