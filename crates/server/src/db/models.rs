use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Campaign {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Room {
    pub id: String,
    pub campaign_id: String,
    pub invite_code: String,
    pub password_hash: Option<String>,
    pub passwordless: bool,
    pub guest_count: i64,
    pub created_by: String,
    pub archived_at: Option<String>,
    pub created_at: Option<String>,
}

/// A player-authored character. `owner_key` is the actor key of the owner,
/// either a user or a guest identity.
#[derive(Debug, Clone, FromRow)]
pub struct Character {
    pub id: String,
    pub owner_key: String,
    pub owner_user_id: Option<String>,
    pub name: String,
    pub class: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RoomParticipant {
    pub id: String,
    pub room_id: String,
    pub actor_key: String,
    pub user_id: Option<String>,
    pub is_creator: bool,
    pub character_id: Option<String>,
    pub joined_at: String,
    pub last_seen_at: String,
    pub left_at: Option<String>,
}

impl RoomParticipant {
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

/// One active participant joined with its bound character. Character text is
/// read as raw bytes so undecodable values can be dropped field by field.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub participant_id: String,
    pub actor_key: String,
    pub is_creator: bool,
    pub joined_at: String,
    pub character_id: Option<String>,
    pub character_name: Option<Vec<u8>>,
    pub character_class: Option<Vec<u8>>,
}

/// Outcome of writing a participant's character binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatWrite {
    Written,
    /// Another active participant in the room holds the character
    CharacterTaken,
    ParticipantInactive,
}
