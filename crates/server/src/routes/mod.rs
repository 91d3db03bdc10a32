use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
mod campaigns;
mod characters;
mod health;
mod rooms;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // Game master setup
        .route("/campaigns", post(campaigns::create_campaign))
        .route("/campaigns/:id/rooms", post(campaigns::create_room))
        .route("/characters", post(characters::create_character))
        // Invite links
        .route("/r/:code", delete(rooms::archive))
        .route("/r/:code/join", post(rooms::join))
        .route(
            "/r/:code/character",
            put(rooms::bind_character).delete(rooms::unbind_character),
        )
        .route("/r/:code/leave", post(rooms::leave))
        .route("/r/:code/session", get(rooms::session_page))
        .route("/r/:code/session.json", get(rooms::session_json))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, db::Database};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use shared::SessionView;
    use tower::ServiceExt;

    enum Caller<'a> {
        Anonymous,
        Bearer(&'a str),
        Cookie(&'a str),
        /// Raw Authorization header value
        Authorization(&'a str),
    }

    struct Reply {
        status: StatusCode,
        cookie: Option<String>,
        body: Vec<u8>,
    }

    impl Reply {
        fn json(&self) -> Value {
            serde_json::from_slice(&self.body).unwrap()
        }

        fn text(&self) -> String {
            String::from_utf8(self.body.clone()).unwrap()
        }
    }

    async fn app() -> Router {
        let db = Database::in_memory().await.unwrap();
        create_router(AppState::new(db, Config::default()))
    }

    async fn send(app: &Router, method: &str, uri: &str, caller: Caller<'_>, body: Option<Value>) -> Reply {
        let mut req = Request::builder().method(method).uri(uri);
        req = match caller {
            Caller::Anonymous => req,
            Caller::Bearer(token) => req.header(header::AUTHORIZATION, format!("Bearer {token}")),
            Caller::Cookie(cookie) => req.header(header::COOKIE, cookie),
            Caller::Authorization(value) => req.header(header::AUTHORIZATION, value),
        };
        let body = match body {
            Some(value) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec();
        Reply { status, cookie, body }
    }

    /// Register a game master and open a room; returns (token, invite code)
    async fn open_room(app: &Router, guest_count: i64, password: Option<&str>) -> (String, String) {
        let auth = send(
            app,
            "POST",
            "/auth/register",
            Caller::Anonymous,
            Some(json!({ "email": "gm@example.com", "password": "dungeon-master" })),
        )
        .await;
        assert_eq!(auth.status, StatusCode::OK);
        let token = auth.json()["token"].as_str().unwrap().to_string();

        let campaign = send(
            app,
            "POST",
            "/campaigns",
            Caller::Bearer(&token),
            Some(json!({ "name": "Curse of Strahd" })),
        )
        .await;
        let campaign_id = campaign.json()["campaign_id"].as_str().unwrap().to_string();

        let room = send(
            app,
            "POST",
            &format!("/campaigns/{campaign_id}/rooms"),
            Caller::Bearer(&token),
            Some(json!({ "guest_count": guest_count, "password": password })),
        )
        .await;
        assert_eq!(room.status, StatusCode::OK);
        let code = room.json()["invite_code"].as_str().unwrap().to_string();
        (token, code)
    }

    async fn join_as_guest(app: &Router, code: &str, password: Option<&str>) -> (Reply, Option<String>) {
        let reply = send(
            app,
            "POST",
            &format!("/r/{code}/join"),
            Caller::Anonymous,
            Some(json!({ "password": password })),
        )
        .await;
        let cookie = reply.cookie.clone();
        (reply, cookie)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let reply = send(&app, "GET", "/health", Caller::Anonymous, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json()["status"], "ok");
    }

    #[tokio::test]
    async fn test_password_errors_are_distinguishable() {
        let app = app().await;
        let (_, code) = open_room(&app, 2, Some("mellon")).await;

        let (missing, _) = join_as_guest(&app, &code, None).await;
        assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
        assert_eq!(missing.json()["error"], "password_required");

        let (wrong, _) = join_as_guest(&app, &code, Some("friend")).await;
        assert_eq!(wrong.status, StatusCode::FORBIDDEN);
        assert_eq!(wrong.json()["error"], "invalid_password");

        let (ok, cookie) = join_as_guest(&app, &code, Some("mellon")).await;
        assert_eq!(ok.status, StatusCode::OK);
        assert!(cookie.unwrap().starts_with("tavernkeep_guest="));
    }

    #[tokio::test]
    async fn test_passwordless_join_needs_no_body() {
        let app = app().await;
        let (_, code) = open_room(&app, 2, None).await;

        let reply = send(&app, "POST", &format!("/r/{code}/join"), Caller::Anonymous, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert!(reply.cookie.unwrap().starts_with("tavernkeep_guest="));
    }

    #[tokio::test]
    async fn test_non_bearer_authorization_is_rejected() {
        let app = app().await;
        let (_, code) = open_room(&app, 2, None).await;

        let basic = send(
            &app,
            "POST",
            &format!("/r/{code}/join"),
            Caller::Authorization("Basic Z206bWVsbG9u"),
            Some(json!({})),
        )
        .await;
        assert_eq!(basic.status, StatusCode::UNAUTHORIZED);
        assert_eq!(basic.json()["error"], "unauthorized");
        assert!(basic.cookie.is_none());

        let garbage = send(&app, "POST", &format!("/r/{code}/join"), Caller::Bearer("not-a-jwt"), Some(json!({}))).await;
        assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let app = app().await;
        let (reply, _) = join_as_guest(&app, "ZZZZZZZZ", None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.json()["error"], "room_not_found");
    }

    #[tokio::test]
    async fn test_guest_flow_through_invite_link() {
        let app = app().await;
        let (token, code) = open_room(&app, 1, None).await;

        let (joined, cookie) = join_as_guest(&app, &code, None).await;
        assert_eq!(joined.status, StatusCode::OK);
        let cookie = cookie.unwrap();
        let participant_id = joined.json()["participant_id"].as_str().unwrap().to_string();

        // rejoining with the same cookie is the same participant
        let again = send(&app, "POST", &format!("/r/{code}/join"), Caller::Cookie(&cookie), Some(json!({}))).await;
        assert_eq!(again.status, StatusCode::OK);
        assert_eq!(again.json()["participant_id"], participant_id.as_str());

        let (full, _) = join_as_guest(&app, &code, None).await;
        assert_eq!(full.status, StatusCode::CONFLICT);
        assert_eq!(full.json()["error"], "room_full");

        let created = send(
            &app,
            "POST",
            "/characters",
            Caller::Cookie(&cookie),
            Some(json!({ "name": "O'Malley the Brave", "class": "Bard" })),
        )
        .await;
        assert_eq!(created.status, StatusCode::OK);
        let character_id = created.json()["character_id"].as_str().unwrap().to_string();

        // the game master can't seat a guest's character
        let stolen = send(
            &app,
            "PUT",
            &format!("/r/{code}/character"),
            Caller::Bearer(&token),
            Some(json!({ "character_id": character_id })),
        )
        .await;
        assert_eq!(stolen.status, StatusCode::FORBIDDEN);
        assert_eq!(stolen.json()["error"], "not_character_owner");

        let bound = send(
            &app,
            "PUT",
            &format!("/r/{code}/character"),
            Caller::Cookie(&cookie),
            Some(json!({ "character_id": character_id })),
        )
        .await;
        assert_eq!(bound.status, StatusCode::OK);
        assert_eq!(bound.json()["character_id"], character_id.as_str());

        let page = send(&app, "GET", &format!("/r/{code}/session"), Caller::Cookie(&cookie), None).await;
        assert_eq!(page.status, StatusCode::OK);
        let html = page.text();
        assert!(!html.contains("O'Malley"));
        assert!(html.contains(r"O\u0027Malley the Brave"));

        let view = send(&app, "GET", &format!("/r/{code}/session.json"), Caller::Bearer(&token), None).await;
        assert_eq!(view.status, StatusCode::OK);
        let view: SessionView = serde_json::from_slice(&view.body).unwrap();
        assert_eq!(view.participants.len(), 2);
        assert!(view.participants[0].is_creator);
        let seated = view.participants[1].character.as_ref().unwrap();
        assert_eq!(seated.name.as_deref(), Some("O'Malley the Brave"));

        let left = send(&app, "POST", &format!("/r/{code}/leave"), Caller::Cookie(&cookie), None).await;
        assert_eq!(left.status, StatusCode::NO_CONTENT);
        let (after, _) = join_as_guest(&app, &code, None).await;
        assert_eq!(after.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_requires_membership() {
        let app = app().await;
        let (_, code) = open_room(&app, 2, None).await;

        let outsider = send(&app, "GET", &format!("/r/{code}/session.json"), Caller::Anonymous, None).await;
        assert_eq!(outsider.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_archived_room_no_longer_resolves() {
        let app = app().await;
        let (token, code) = open_room(&app, 2, None).await;

        let (_, cookie) = join_as_guest(&app, &code, None).await;
        let denied = send(&app, "DELETE", &format!("/r/{code}"), Caller::Cookie(&cookie.unwrap()), None).await;
        assert_eq!(denied.status, StatusCode::UNAUTHORIZED);

        let archived = send(&app, "DELETE", &format!("/r/{code}"), Caller::Bearer(&token), None).await;
        assert_eq!(archived.status, StatusCode::NO_CONTENT);

        let (gone, _) = join_as_guest(&app, &code, None).await;
        assert_eq!(gone.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_room_setup_requires_sign_in() {
        let app = app().await;
        let reply = send(&app, "POST", "/campaigns", Caller::Anonymous, Some(json!({ "name": "x" }))).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }
}
