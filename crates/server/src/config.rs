use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub rooms: RoomsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
    /// Lifetime of the signed cookie that identifies an anonymous guest
    #[serde(default = "default_guest_token_expiry_hours")]
    pub guest_token_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfig {
    #[serde(default = "default_invite_code_length")]
    pub invite_code_length: usize,
    /// Fresh codes to try before giving up on a room insert
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,
}

fn default_guest_token_expiry_hours() -> u64 { 24 * 30 }
fn default_invite_code_length() -> usize { 8 }
fn default_max_code_attempts() -> u32 { 8 }

/// Shorter codes make collisions likely at realistic room counts
pub const MIN_INVITE_CODE_LENGTH: usize = 6;

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            invite_code_length: default_invite_code_length(),
            max_code_attempts: default_max_code_attempts(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: "./data/tavernkeep.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_expiry_hours: 24,
                guest_token_expiry_hours: default_guest_token_expiry_hours(),
            },
            rooms: RoomsConfig::default(),
        }
    }
}

impl Config {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        // Try to load from environment variable
        if let Ok(path) = std::env::var("TAVERNKEEP_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("tavernkeep-server.toml"),
            PathBuf::from("config/tavernkeep-server.toml"),
            PathBuf::from("/etc/tavernkeep/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // Return default config if no file found
        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        if config.rooms.invite_code_length < MIN_INVITE_CODE_LENGTH {
            tracing::warn!(
                "invite_code_length {} is too short, using {}",
                config.rooms.invite_code_length,
                MIN_INVITE_CODE_LENGTH
            );
            config.rooms.invite_code_length = MIN_INVITE_CODE_LENGTH;
        }
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rooms_section_is_optional() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 3000

            [database]
            path = "/tmp/tk.db"

            [auth]
            jwt_secret = "s3cret"
            token_expiry_hours = 12
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.guest_token_expiry_hours, 720);
        assert_eq!(config.rooms.invite_code_length, 8);
        assert_eq!(config.rooms.max_code_attempts, 8);
    }

    #[test]
    fn test_short_invite_codes_are_clamped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [server]
            host = "127.0.0.1"
            port = 3000
            [database]
            path = "/tmp/tk.db"
            [auth]
            jwt_secret = "s3cret"
            token_expiry_hours = 12
            [rooms]
            invite_code_length = 3
            "#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.rooms.invite_code_length, MIN_INVITE_CODE_LENGTH);
    }
}
