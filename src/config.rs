use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_days: i64,
    pub refresh_token_days: i64,
    /// Emails that receive the admin flag when they register. Stored lower-case.
    pub admin_emails: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    /// Lower-case extensions without the leading dot.
    pub allowed_extensions: BTreeSet<String>,
    pub max_content_length: usize,
}

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/naya.db".to_string()),
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .unwrap_or(5000),
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET_KEY")
                    .unwrap_or_else(|_| "jwt-secret-change-in-production".to_string()),
                access_token_days: env::var("JWT_ACCESS_TOKEN_DAYS")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()
                    .unwrap_or(7),
                refresh_token_days: env::var("JWT_REFRESH_TOKEN_DAYS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
                admin_emails: parse_list(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            },
            uploads: UploadConfig {
                dir: PathBuf::from(
                    env::var("UPLOAD_FOLDER").unwrap_or_else(|_| "uploads".to_string()),
                ),
                allowed_extensions: match env::var("ALLOWED_EXTENSIONS") {
                    Ok(raw) if !raw.trim().is_empty() => parse_list(&raw),
                    _ => default_extensions(),
                },
                max_content_length: env::var("MAX_CONTENT_LENGTH")
                    .unwrap_or_else(|_| "16777216".to_string())
                    .parse()
                    .unwrap_or(16 * 1024 * 1024),
            },
        })
    }

    /// Configuration for tests and local tooling: in-memory database, uploads under `upload_dir`.
    pub fn for_testing(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            auth: AuthConfig {
                jwt_secret: "test-secret".to_string(),
                access_token_days: 7,
                refresh_token_days: 30,
                admin_emails: parse_list("admin@example.com"),
            },
            uploads: UploadConfig {
                dir: upload_dir.into(),
                allowed_extensions: default_extensions(),
                max_content_length: 16 * 1024 * 1024,
            },
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn default_extensions() -> BTreeSet<String> {
    DEFAULT_ALLOWED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

fn parse_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|item| item.trim().trim_start_matches('.').to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_normalizes_entries() {
        let parsed = parse_list(" Admin@Example.com, ,other@example.com ");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains("admin@example.com"));

        let exts = parse_list(".PNG,jpg");
        assert!(exts.contains("png"));
        assert!(exts.contains("jpg"));
    }

    #[test]
    fn test_testing_config_uses_default_extensions() {
        let config = Config::for_testing("/tmp/uploads");
        assert_eq!(config.uploads.allowed_extensions.len(), 5);
        assert!(config.uploads.allowed_extensions.contains("webp"));
        assert!(config.auth.admin_emails.contains("admin@example.com"));
    }
}
