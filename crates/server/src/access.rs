//! Admission control for join attempts.
//!
//! A join attempt moves Unresolved → Resolved (invite code found) → Gated
//! (password checked, unless the room is passwordless) → Admitted or Denied
//! (capacity). The capacity check here is a fast pre-check; the participant
//! insert repeats it atomically.

use crate::{
    actor::Actor,
    config::RoomsConfig,
    db::{Database, Room, RoomParticipant},
    error::AppError,
    invite::InviteRegistry,
    routes::auth::verify_password,
};

/// Proof that `actor` may hold a participant record in `room`
#[derive(Debug, Clone)]
pub struct Admission {
    pub room: Room,
    pub actor: Actor,
    /// The actor's record in this room, active or not
    pub existing: Option<RoomParticipant>,
}

impl Admission {
    pub fn is_creator(&self) -> bool {
        self.actor.is_user(&self.room.created_by)
    }

    /// Holds an active record, so its slot is already counted
    pub fn is_returning(&self) -> bool {
        self.existing.as_ref().is_some_and(|p| p.is_active())
    }
}

pub struct RoomAccessPolicy<'a> {
    db: &'a Database,
    registry: InviteRegistry<'a>,
}

impl<'a> RoomAccessPolicy<'a> {
    pub fn new(db: &'a Database, config: &'a RoomsConfig) -> Self {
        Self {
            db,
            registry: InviteRegistry::new(db, config),
        }
    }

    pub async fn admit(
        &self,
        code: &str,
        actor: Actor,
        password: Option<&str>,
    ) -> Result<Admission, AppError> {
        let room = self.registry.resolve(code).await?;

        let admission = Admission {
            existing: self.db.get_participant(&room.id, &actor.key()).await?,
            room,
            actor,
        };

        // the creator set the password and is never counted as a guest
        if admission.is_creator() {
            return Ok(admission);
        }

        if let Err(e) = check_password(&admission.room, password) {
            tracing::info!(room = %admission.room.id, actor = %actor.key(), "Join denied: {}", e.code());
            return Err(e);
        }

        if !admission.is_returning() {
            let guests = self.db.count_active_guests(&admission.room.id).await?;
            if guests >= admission.room.guest_count {
                tracing::info!(
                    room = %admission.room.id,
                    actor = %actor.key(),
                    "Join denied: room full ({}/{})",
                    guests,
                    admission.room.guest_count
                );
                return Err(AppError::RoomFull);
            }
        }

        Ok(admission)
    }
}

/// Gate a join on the room password.
///
/// No password, or an empty one, is `PasswordRequired`; a wrong one is
/// `InvalidPassword`, so callers can tell a prompt from a retry.
pub fn check_password(room: &Room, supplied: Option<&str>) -> Result<(), AppError> {
    if room.passwordless {
        return Ok(());
    }

    let supplied = supplied
        .filter(|p| !p.is_empty())
        .ok_or(AppError::PasswordRequired)?;
    let hash = room
        .password_hash
        .as_deref()
        .ok_or_else(|| AppError::Internal(format!("Room {} is gated but has no password", room.id)))?;

    if verify_password(supplied, hash)? {
        Ok(())
    } else {
        Err(AppError::InvalidPassword)
    }
}
