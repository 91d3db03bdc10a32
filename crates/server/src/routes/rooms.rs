//! Invite-link endpoints under /r/:code

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use shared::SessionView;

use crate::{
    access::RoomAccessPolicy,
    actor::{Actor, RequestActor},
    db::{Room, RoomParticipant},
    error::AppError,
    invite::InviteRegistry,
    participants::ParticipantManager,
    session::{render_page, SessionBootstrap},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BindCharacterRequest {
    pub character_id: String,
}

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub participant_id: String,
    pub room_id: String,
    pub is_creator: bool,
    pub character_id: Option<String>,
    pub joined_at: String,
}

impl From<RoomParticipant> for ParticipantResponse {
    fn from(p: RoomParticipant) -> Self {
        Self {
            participant_id: p.id,
            room_id: p.room_id,
            is_creator: p.is_creator,
            character_id: p.character_id,
            joined_at: p.joined_at,
        }
    }
}

async fn resolve(state: &AppState, code: &str) -> Result<Room, AppError> {
    InviteRegistry::new(&state.db, &state.config.rooms).resolve(code).await
}

/// POST /r/:code/join
///
/// The body is optional; a passwordless room can be joined with none.
pub async fn join(
    State(state): State<AppState>,
    RequestActor { actor, jar }: RequestActor,
    Path(code): Path<String>,
    req: Option<Json<JoinRequest>>,
) -> Result<(CookieJar, Json<ParticipantResponse>), AppError> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let admission = RoomAccessPolicy::new(&state.db, &state.config.rooms)
        .admit(&code, actor, req.password.as_deref())
        .await?;
    let participant = ParticipantManager::new(&state.db).join(&admission).await?;

    Ok((jar, Json(participant.into())))
}

/// PUT /r/:code/character
pub async fn bind_character(
    State(state): State<AppState>,
    RequestActor { actor, jar }: RequestActor,
    Path(code): Path<String>,
    Json(req): Json<BindCharacterRequest>,
) -> Result<(CookieJar, Json<ParticipantResponse>), AppError> {
    let room = resolve(&state, &code).await?;
    let manager = ParticipantManager::new(&state.db);
    let participant = manager.active_participant(&room, &actor).await?;
    let participant = manager
        .bind_character(&participant, &actor, &req.character_id)
        .await?;

    Ok((jar, Json(participant.into())))
}

/// DELETE /r/:code/character
pub async fn unbind_character(
    State(state): State<AppState>,
    RequestActor { actor, jar }: RequestActor,
    Path(code): Path<String>,
) -> Result<(CookieJar, Json<ParticipantResponse>), AppError> {
    let room = resolve(&state, &code).await?;
    let manager = ParticipantManager::new(&state.db);
    let participant = manager.active_participant(&room, &actor).await?;
    let participant = manager.unbind_character(&participant).await?;

    Ok((jar, Json(participant.into())))
}

/// POST /r/:code/leave
pub async fn leave(
    State(state): State<AppState>,
    RequestActor { actor, jar }: RequestActor,
    Path(code): Path<String>,
) -> Result<(CookieJar, StatusCode), AppError> {
    let room = resolve(&state, &code).await?;
    let manager = ParticipantManager::new(&state.db);
    let participant = manager.active_participant(&room, &actor).await?;
    manager.leave(&participant).await?;

    Ok((jar, StatusCode::NO_CONTENT))
}

/// DELETE /r/:code
///
/// Archiving retires the invite code for good; it is never reissued.
pub async fn archive(
    State(state): State<AppState>,
    actor: RequestActor,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    let user_id = actor.user_id()?;
    let room = resolve(&state, &code).await?;

    if room.created_by != user_id {
        let campaign = state
            .db
            .get_campaign(&room.campaign_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Room {} has no campaign", room.id)))?;
        if campaign.owner_id != user_id {
            return Err(AppError::Forbidden("Only the game master can close this room".to_string()));
        }
    }

    state.db.archive_room(&room.id).await?;
    tracing::info!("Archived room {} ({})", room.id, room.invite_code);
    Ok(StatusCode::NO_CONTENT)
}

async fn session_view(state: &AppState, actor: &Actor, code: &str) -> Result<SessionView, AppError> {
    let room = resolve(state, code).await?;
    ParticipantManager::new(&state.db)
        .active_participant(&room, actor)
        .await?;
    SessionBootstrap::new(&state.db).build(&room).await
}

/// GET /r/:code/session.json
pub async fn session_json(
    State(state): State<AppState>,
    RequestActor { actor, jar }: RequestActor,
    Path(code): Path<String>,
) -> Result<(CookieJar, Json<SessionView>), AppError> {
    let view = session_view(&state, &actor, &code).await?;
    Ok((jar, Json(view)))
}

/// GET /r/:code/session
pub async fn session_page(
    State(state): State<AppState>,
    RequestActor { actor, jar }: RequestActor,
    Path(code): Path<String>,
) -> Result<(CookieJar, Html<String>), AppError> {
    let view = session_view(&state, &actor, &code).await?;
    Ok((jar, Html(render_page(&view)?)))
}
