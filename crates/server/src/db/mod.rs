use anyhow::Result;
use chrono::SecondsFormat;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;

mod models;

pub use models::*;

/// Fixed-width RFC 3339 so timestamps sort lexically
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

const ACTIVE_GUESTS: &str =
    "SELECT COUNT(*) FROM room_participants WHERE room_id = ? AND is_creator = 0 AND left_at IS NULL";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database, migrated
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                invite_code TEXT UNIQUE NOT NULL,
                password_hash TEXT,
                passwordless INTEGER NOT NULL,
                guest_count INTEGER NOT NULL CHECK (guest_count >= 0),
                created_by TEXT NOT NULL REFERENCES users(id),
                archived_at TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                id TEXT PRIMARY KEY,
                owner_key TEXT NOT NULL,
                owner_user_id TEXT REFERENCES users(id),
                name TEXT NOT NULL,
                class TEXT NOT NULL DEFAULT '',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS room_participants (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                actor_key TEXT NOT NULL,
                user_id TEXT REFERENCES users(id),
                is_creator INTEGER NOT NULL DEFAULT 0,
                character_id TEXT REFERENCES characters(id) ON DELETE SET NULL,
                joined_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL,
                left_at TEXT,
                UNIQUE (room_id, actor_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // One seat per character among a room's active participants
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_room_participants_seat
            ON room_participants (room_id, character_id)
            WHERE character_id IS NOT NULL AND left_at IS NULL
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    // User operations
    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    // Campaign operations
    pub async fn create_campaign(&self, campaign: &Campaign) -> Result<()> {
        sqlx::query("INSERT INTO campaigns (id, owner_id, name) VALUES (?, ?, ?)")
            .bind(&campaign.id)
            .bind(&campaign.owner_id)
            .bind(&campaign.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(
            "SELECT id, owner_id, name, created_at FROM campaigns WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(campaign)
    }

    // Room operations

    /// Insert a room and seat its creator in one transaction.
    ///
    /// Returns `false` without writing anything when the invite code is
    /// already taken.
    pub async fn create_room(&self, room: &Room, creator: &RoomParticipant) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO rooms (id, campaign_id, invite_code, password_hash, passwordless, guest_count, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&room.id)
        .bind(&room.campaign_id)
        .bind(&room.invite_code)
        .bind(&room.password_hash)
        .bind(room.passwordless)
        .bind(room.guest_count)
        .bind(&room.created_by)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        sqlx::query(
            r#"
            INSERT INTO room_participants (id, room_id, actor_key, user_id, is_creator, joined_at, last_seen_at)
            VALUES (?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&creator.id)
        .bind(&creator.room_id)
        .bind(&creator.actor_key)
        .bind(&creator.user_id)
        .bind(&creator.joined_at)
        .bind(&creator.last_seen_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn invite_code_in_use(&self, code: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM rooms WHERE invite_code = ?)",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Look up a room that has not been archived
    pub async fn get_room_by_code(&self, code: &str) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            SELECT id, campaign_id, invite_code, password_hash, passwordless, guest_count,
                   created_by, archived_at, created_at
            FROM rooms WHERE invite_code = ? AND archived_at IS NULL
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(room)
    }

    pub async fn archive_room(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE rooms SET archived_at = ? WHERE id = ? AND archived_at IS NULL",
        )
        .bind(now_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // Character operations
    pub async fn create_character(&self, character: &Character) -> Result<()> {
        sqlx::query(
            "INSERT INTO characters (id, owner_key, owner_user_id, name, class) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&character.id)
        .bind(&character.owner_key)
        .bind(&character.owner_user_id)
        .bind(&character.name)
        .bind(&character.class)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Owner key of a character. Only the key is read, so a row whose text
    /// columns don't decode can still be bound.
    pub async fn get_character_owner(&self, id: &str) -> Result<Option<String>> {
        let owner_key = sqlx::query_scalar::<_, String>("SELECT owner_key FROM characters WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner_key)
    }

    // Participant operations
    pub async fn get_participant(&self, room_id: &str, actor_key: &str) -> Result<Option<RoomParticipant>> {
        let participant = sqlx::query_as::<_, RoomParticipant>(
            r#"
            SELECT id, room_id, actor_key, user_id, is_creator, character_id, joined_at, last_seen_at, left_at
            FROM room_participants WHERE room_id = ? AND actor_key = ?
            "#,
        )
        .bind(room_id)
        .bind(actor_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    pub async fn count_active_guests(&self, room_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(ACTIVE_GUESTS)
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert a guest participant only while the room has a free slot.
    ///
    /// The count and the insert are one statement, and SQLite runs writers
    /// one at a time, so concurrent joins cannot both take the last slot.
    /// Returns `false` if the room was full or the actor already has a record.
    pub async fn insert_guest_within_capacity(&self, participant: &RoomParticipant) -> Result<bool> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO room_participants (id, room_id, actor_key, user_id, is_creator, joined_at, last_seen_at)
            SELECT ?, ?, ?, ?, 0, ?, ?
            WHERE ({ACTIVE_GUESTS})
                < (SELECT guest_count FROM rooms WHERE id = ? AND archived_at IS NULL)
            ON CONFLICT (room_id, actor_key) DO NOTHING
            "#
        ))
        .bind(&participant.id)
        .bind(&participant.room_id)
        .bind(&participant.actor_key)
        .bind(&participant.user_id)
        .bind(&participant.joined_at)
        .bind(&participant.last_seen_at)
        .bind(&participant.room_id)
        .bind(&participant.room_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Bring back a participant that left, subject to the same capacity rule
    /// as a new guest. The creator is never counted.
    pub async fn reactivate_within_capacity(&self, participant: &RoomParticipant, now: &str) -> Result<bool> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE room_participants
            SET left_at = NULL, joined_at = ?, last_seen_at = ?
            WHERE id = ? AND left_at IS NOT NULL
              AND (is_creator = 1
                   OR ({ACTIVE_GUESTS})
                      < (SELECT guest_count FROM rooms WHERE id = ? AND archived_at IS NULL))
            "#
        ))
        .bind(now)
        .bind(now)
        .bind(&participant.id)
        .bind(&participant.room_id)
        .bind(&participant.room_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn touch_participant(&self, id: &str, now: &str) -> Result<()> {
        sqlx::query("UPDATE room_participants SET last_seen_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Active participant in the room currently playing `character_id`
    pub async fn find_seat(&self, room_id: &str, character_id: &str) -> Result<Option<String>> {
        let id = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM room_participants
            WHERE room_id = ? AND character_id = ? AND left_at IS NULL
            "#,
        )
        .bind(room_id)
        .bind(character_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Replace the participant's binding. `None` releases the seat.
    pub async fn set_participant_character(
        &self,
        participant_id: &str,
        character_id: Option<&str>,
    ) -> Result<SeatWrite> {
        let result = sqlx::query(
            "UPDATE room_participants SET character_id = ? WHERE id = ? AND left_at IS NULL",
        )
        .bind(character_id)
        .bind(participant_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(r) if r.rows_affected() == 0 => Ok(SeatWrite::ParticipantInactive),
            Ok(_) => Ok(SeatWrite::Written),
            Err(e) if is_unique_violation(&e) => Ok(SeatWrite::CharacterTaken),
            Err(e) => Err(e.into()),
        }
    }

    /// Mark a participant as gone and free its seat
    pub async fn leave_participant(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE room_participants SET left_at = ?, character_id = NULL
            WHERE id = ? AND left_at IS NULL
            "#,
        )
        .bind(now_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active participants with their characters, oldest join first
    pub async fn list_session_rows(&self, room_id: &str) -> Result<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT p.id AS participant_id, p.actor_key, p.is_creator, p.joined_at, p.character_id,
                   CAST(c.name AS BLOB) AS character_name,
                   CAST(c.class AS BLOB) AS character_class
            FROM room_participants p
            LEFT JOIN characters c ON c.id = p.character_id
            WHERE p.room_id = ? AND p.left_at IS NULL
            ORDER BY p.joined_at ASC, p.rowid ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
