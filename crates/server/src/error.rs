use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::BootstrapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No room uses that invite code")]
    RoomNotFound,

    #[error("This room requires a password")]
    PasswordRequired,

    #[error("Incorrect room password")]
    InvalidPassword,

    #[error("This room has no free guest slots")]
    RoomFull,

    #[error("That character is already seated in this room")]
    CharacterAlreadySeated,

    #[error("You do not own that character")]
    NotCharacterOwner,

    #[error("Serialization error: {0}")]
    Serialization(#[from] BootstrapError),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Stable identifier clients switch on
    pub fn code(&self) -> &'static str {
        match self {
            AppError::RoomNotFound => "room_not_found",
            AppError::PasswordRequired => "password_required",
            AppError::InvalidPassword => "invalid_password",
            AppError::RoomFull => "room_full",
            AppError::CharacterAlreadySeated => "character_already_seated",
            AppError::NotCharacterOwner => "not_character_owner",
            AppError::Serialization(_) => "serialization_error",
            AppError::AuthError(_) => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Internal(_) | AppError::Database(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RoomNotFound | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PasswordRequired | AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidPassword | AppError::NotCharacterOwner | AppError::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            AppError::RoomFull | AppError::CharacterAlreadySeated => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Serialization(_) | AppError::Internal(_) | AppError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // don't leak driver details to clients
            AppError::Database(e) => {
                tracing::error!("Database error: {:#}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(serde_json::json!({
                "error": self.code(),
                "message": message,
            })),
        )
            .into_response()
    }
}
