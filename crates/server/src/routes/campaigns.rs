//! Campaign and room creation for signed-in game masters

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    actor::RequestActor,
    db::Campaign,
    error::AppError,
    invite::{InviteRegistry, NewRoom},
    routes::auth::hash_password,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub campaign_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    /// Omit for a passwordless room
    #[serde(default)]
    pub password: Option<String>,
    pub guest_count: i64,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub room_id: String,
    pub invite_code: String,
    pub passwordless: bool,
    pub guest_count: i64,
    pub join_path: String,
}

/// POST /campaigns
pub async fn create_campaign(
    State(state): State<AppState>,
    actor: RequestActor,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<Json<CampaignResponse>, AppError> {
    let owner_id = actor.user_id()?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Campaign name is required".to_string()));
    }

    let campaign = Campaign {
        id: Uuid::new_v4().to_string(),
        owner_id,
        name: name.to_string(),
        created_at: None,
    };
    state.db.create_campaign(&campaign).await?;
    tracing::info!("Created campaign {} for {}", campaign.id, campaign.owner_id);

    Ok(Json(CampaignResponse {
        campaign_id: campaign.id,
        name: campaign.name,
    }))
}

/// POST /campaigns/:id/rooms
pub async fn create_room(
    State(state): State<AppState>,
    actor: RequestActor,
    Path(campaign_id): Path<String>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    let user_id = actor.user_id()?;

    let campaign = state
        .db
        .get_campaign(&campaign_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;
    if campaign.owner_id != user_id {
        return Err(AppError::Forbidden("Only the campaign owner can open rooms".to_string()));
    }

    if req.guest_count < 0 {
        return Err(AppError::BadRequest("guest_count cannot be negative".to_string()));
    }

    let password_hash = match req.password.as_deref() {
        None => None,
        Some("") => {
            return Err(AppError::BadRequest(
                "Room password cannot be empty; omit it for a passwordless room".to_string(),
            ))
        }
        Some(password) => Some(hash_password(password)?),
    };

    let room = InviteRegistry::new(&state.db, &state.config.rooms)
        .create_room(NewRoom {
            campaign_id: campaign.id,
            created_by: user_id,
            password_hash,
            guest_count: req.guest_count,
        })
        .await?;

    Ok(Json(RoomResponse {
        join_path: format!("/r/{}", room.invite_code),
        room_id: room.id,
        invite_code: room.invite_code,
        passwordless: room.passwordless,
        guest_count: room.guest_count,
    }))
}
