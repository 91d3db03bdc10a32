//! Room membership and character seating.

use uuid::Uuid;

use crate::{
    access::Admission,
    actor::Actor,
    db::{now_timestamp, Database, Room, RoomParticipant, SeatWrite},
    error::AppError,
};

pub struct ParticipantManager<'a> {
    db: &'a Database,
}

impl<'a> ParticipantManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create or refresh the admitted actor's record in the room.
    ///
    /// Idempotent per (room, actor). A record that had left is reactivated
    /// only if a guest slot is free; the atomic insert can still report
    /// `RoomFull` when a concurrent join took the last slot after admission.
    pub async fn join(&self, admission: &Admission) -> Result<RoomParticipant, AppError> {
        let room = &admission.room;
        let actor_key = admission.actor.key();
        let now = now_timestamp();

        match &admission.existing {
            Some(existing) if existing.is_active() => {
                self.db.touch_participant(&existing.id, &now).await?;
                tracing::debug!("{} rejoined room {}", actor_key, room.id);
            }
            Some(existing) => {
                if !self.db.reactivate_within_capacity(existing, &now).await? {
                    return Err(AppError::RoomFull);
                }
                tracing::info!("{} returned to room {}", actor_key, room.id);
            }
            None => {
                let participant = RoomParticipant {
                    id: Uuid::new_v4().to_string(),
                    room_id: room.id.clone(),
                    actor_key: actor_key.clone(),
                    user_id: admission.actor.user_id(),
                    is_creator: false,
                    character_id: None,
                    joined_at: now.clone(),
                    last_seen_at: now,
                    left_at: None,
                };
                if self.db.insert_guest_within_capacity(&participant).await? {
                    tracing::info!(guest = admission.actor.is_guest(), "{} joined room {}", actor_key, room.id);
                } else {
                    // lost a race with our own earlier request, or the room filled up
                    let concurrent = self.db.get_participant(&room.id, &actor_key).await?;
                    if !concurrent.is_some_and(|p| p.is_active()) {
                        return Err(AppError::RoomFull);
                    }
                }
            }
        }

        self.reload(&room.id, &actor_key).await
    }

    /// The actor's active record, required before binding or viewing
    pub async fn active_participant(&self, room: &Room, actor: &Actor) -> Result<RoomParticipant, AppError> {
        self.db
            .get_participant(&room.id, &actor.key())
            .await?
            .filter(|p| p.is_active())
            .ok_or_else(|| AppError::Forbidden("Join the room first".to_string()))
    }

    /// Seat `participant` as `character_id`, replacing any previous binding.
    ///
    /// Ownership is checked against the acting identity: user characters
    /// belong to the user, guest characters to the guest identity that made
    /// them, so a guest can never take a user's character.
    pub async fn bind_character(
        &self,
        participant: &RoomParticipant,
        actor: &Actor,
        character_id: &str,
    ) -> Result<RoomParticipant, AppError> {
        let owner_key = self
            .db
            .get_character_owner(character_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Character not found".to_string()))?;

        if owner_key != actor.key() {
            return Err(AppError::NotCharacterOwner);
        }

        if participant.character_id.as_deref() == Some(character_id) {
            return Ok(participant.clone());
        }

        if let Some(holder) = self.db.find_seat(&participant.room_id, character_id).await? {
            if holder != participant.id {
                return Err(AppError::CharacterAlreadySeated);
            }
        }

        // the partial unique index settles races the check above can't see
        match self
            .db
            .set_participant_character(&participant.id, Some(character_id))
            .await?
        {
            SeatWrite::Written => {}
            SeatWrite::CharacterTaken => return Err(AppError::CharacterAlreadySeated),
            SeatWrite::ParticipantInactive => {
                return Err(AppError::Forbidden("Join the room first".to_string()))
            }
        }

        tracing::info!(
            "Participant {} in room {} now plays {}",
            participant.id,
            participant.room_id,
            character_id
        );
        self.reload(&participant.room_id, &participant.actor_key).await
    }

    pub async fn unbind_character(&self, participant: &RoomParticipant) -> Result<RoomParticipant, AppError> {
        if self.db.set_participant_character(&participant.id, None).await? == SeatWrite::ParticipantInactive {
            return Err(AppError::Forbidden("Join the room first".to_string()));
        }
        self.reload(&participant.room_id, &participant.actor_key).await
    }

    /// Give up the slot and release the seat; the character itself is untouched
    pub async fn leave(&self, participant: &RoomParticipant) -> Result<(), AppError> {
        if participant.is_creator {
            return Err(AppError::BadRequest("The room creator cannot leave".to_string()));
        }
        if self.db.leave_participant(&participant.id).await? {
            tracing::info!("{} left room {}", participant.actor_key, participant.room_id);
        }
        Ok(())
    }

    async fn reload(&self, room_id: &str, actor_key: &str) -> Result<RoomParticipant, AppError> {
        self.db
            .get_participant(room_id, actor_key)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Participant {actor_key} vanished from room {room_id}")))
    }
}
