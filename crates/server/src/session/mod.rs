//! Session bootstrap: the initial view of a room and its page embedding.

use shared::{encode_for_script, text_field, CharacterView, OmittedField, ParticipantView, SessionView};

use crate::{
    actor::is_guest_key,
    db::{Database, Room, SessionRow},
    error::AppError,
};

pub struct SessionBootstrap<'a> {
    db: &'a Database,
}

impl<'a> SessionBootstrap<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Active participants and their characters, oldest join first.
    ///
    /// Reads straight from the database on every call so a bind is visible
    /// on the next page load.
    pub async fn build(&self, room: &Room) -> Result<SessionView, AppError> {
        let rows = self.db.list_session_rows(&room.id).await?;
        let mut omitted_fields = Vec::new();

        let participants = rows
            .into_iter()
            .map(|row| participant_view(row, &mut omitted_fields))
            .collect();

        Ok(SessionView {
            room_id: room.id.clone(),
            invite_code: room.invite_code.clone(),
            participants,
            omitted_fields,
        })
    }
}

fn participant_view(row: SessionRow, omitted: &mut Vec<OmittedField>) -> ParticipantView {
    let mut decode = |field: &str, bytes: Option<Vec<u8>>| -> Option<String> {
        match text_field(field, bytes?) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("Omitting {} of participant {}: {}", field, row.participant_id, e);
                omitted.push(OmittedField {
                    participant_id: row.participant_id.clone(),
                    field: field.to_string(),
                });
                None
            }
        }
    };

    let character = row.character_id.clone().map(|id| CharacterView {
        name: decode("name", row.character_name.clone()),
        class: decode("class", row.character_class.clone()),
        id,
    });

    ParticipantView {
        is_guest: is_guest_key(&row.actor_key),
        participant_id: row.participant_id,
        is_creator: row.is_creator,
        joined_at: row.joined_at,
        character,
    }
}

/// Script-safe JSON for `view`.
///
/// A view holds only strings and bools, so encoding can't fail in practice;
/// undecodable stored text is already dropped in [`SessionBootstrap::build`].
pub fn render_payload(view: &SessionView) -> Result<String, AppError> {
    Ok(encode_for_script(view)?)
}

/// Page shell that hydrates the client from the embedded payload.
///
/// User text only ever appears inside the JSON payload.
pub fn render_page(view: &SessionView) -> Result<String, AppError> {
    let payload = render_payload(view)?;
    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Tavernkeep</title>
</head>
<body>
    <div id="session-root"></div>
    <script id="session-bootstrap" type="application/json">{payload}</script>
    <script>
        window.tavernkeepSession = JSON.parse(document.getElementById("session-bootstrap").textContent);
    </script>
</body>
</html>"#
    ))
}
