use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{actor::RequestActor, db::Character, error::AppError, state::AppState};

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateCharacterRequest {
    pub name: String,
    #[serde(default)]
    pub class: String,
}

#[derive(Debug, Serialize)]
pub struct CharacterResponse {
    pub character_id: String,
    pub name: String,
    pub class: String,
}

/// POST /characters
///
/// Guests may create characters too; they are owned by the guest identity
/// in the session cookie.
pub async fn create_character(
    State(state): State<AppState>,
    RequestActor { actor, jar }: RequestActor,
    Json(req): Json<CreateCharacterRequest>,
) -> Result<(CookieJar, Json<CharacterResponse>), AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Character name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Character name must be at most {MAX_NAME_LEN} characters"
        )));
    }

    let character = Character {
        id: Uuid::new_v4().to_string(),
        owner_key: actor.key(),
        owner_user_id: actor.user_id(),
        name: name.to_string(),
        class: req.class.trim().to_string(),
        created_at: None,
    };
    state.db.create_character(&character).await?;

    Ok((
        jar,
        Json(CharacterResponse {
            character_id: character.id,
            name: character.name,
            class: character.class,
        }),
    ))
}
