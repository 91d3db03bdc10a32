//! Invite codes: issuing them to new rooms and resolving them back.

use rand::Rng;
use uuid::Uuid;

use crate::{
    config::RoomsConfig,
    db::{now_timestamp, Database, Room, RoomParticipant},
    error::AppError,
};

/// Upper-case letters and digits minus 0/O, 1/I/L. No two symbols differ
/// only by case, so case-normalized lookups can't collide.
pub const INVITE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| INVITE_ALPHABET[rng.gen_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of user-typed input
pub fn normalize_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

fn is_well_formed(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| INVITE_ALPHABET.contains(&b))
}

/// Fields of a room before it has a code
pub struct NewRoom {
    pub campaign_id: String,
    pub created_by: String,
    pub password_hash: Option<String>,
    pub guest_count: i64,
}

pub struct InviteRegistry<'a> {
    db: &'a Database,
    config: &'a RoomsConfig,
}

impl<'a> InviteRegistry<'a> {
    pub fn new(db: &'a Database, config: &'a RoomsConfig) -> Self {
        Self { db, config }
    }

    /// A code no existing room holds, archived rooms included
    pub async fn generate(&self) -> Result<String, AppError> {
        for _ in 0..self.config.max_code_attempts {
            let code = generate_code(self.config.invite_code_length);
            if !self.db.invite_code_in_use(&code).await? {
                return Ok(code);
            }
            tracing::debug!("Invite code collision, regenerating");
        }
        Err(AppError::Internal("Could not find a free invite code".to_string()))
    }

    /// Create a room under a fresh code and seat its creator
    pub async fn create_room(&self, new_room: NewRoom) -> Result<Room, AppError> {
        let now = now_timestamp();
        let mut room = Room {
            id: Uuid::new_v4().to_string(),
            campaign_id: new_room.campaign_id,
            invite_code: String::new(),
            passwordless: new_room.password_hash.is_none(),
            password_hash: new_room.password_hash,
            guest_count: new_room.guest_count,
            created_by: new_room.created_by.clone(),
            archived_at: None,
            created_at: None,
        };
        let creator = RoomParticipant {
            id: Uuid::new_v4().to_string(),
            room_id: room.id.clone(),
            actor_key: format!("user:{}", new_room.created_by),
            user_id: Some(new_room.created_by),
            is_creator: true,
            character_id: None,
            joined_at: now.clone(),
            last_seen_at: now,
            left_at: None,
        };

        // the unique column is the real guard; another request may take
        // the same code between generating and inserting
        for _ in 0..self.config.max_code_attempts {
            room.invite_code = self.generate().await?;
            if self.db.create_room(&room, &creator).await? {
                tracing::info!("Created room {} with invite code {}", room.id, room.invite_code);
                return Ok(room);
            }
            tracing::debug!("Invite code {} taken, regenerating", room.invite_code);
        }
        Err(AppError::Internal("Could not find a free invite code".to_string()))
    }

    /// Look up an active room by invite code, ignoring case and whitespace
    pub async fn resolve(&self, code: &str) -> Result<Room, AppError> {
        let code = normalize_code(code);
        if !is_well_formed(&code) {
            return Err(AppError::RoomNotFound);
        }
        self.db
            .get_room_by_code(&code)
            .await?
            .ok_or(AppError::RoomNotFound)
    }
}
