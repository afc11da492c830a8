//! Configuration for the workspace MCP server.

use std::path::PathBuf;
use std::str::FromStr;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Default workspace directory, relative to the current directory.
pub const DEFAULT_WORKSPACE_DIR: &str = "mcp_workspace";

/// Default SQLite database file name inside the workspace.
pub const DEFAULT_DATABASE_NAME: &str = "notes.db";

/// Default outbound HTTP timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default number of response-body characters returned by `web_request`.
pub const DEFAULT_PREVIEW_LIMIT: usize = 1_000;

/// Environment variable for the workspace directory.
pub const WORKSPACE_DIR_ENV: &str = "WORKSPACE_DIR";

/// Environment variable for the database file name.
pub const DATABASE_NAME_ENV: &str = "WORKSPACE_DATABASE";

/// Environment variable for the HTTP timeout.
pub const REQUEST_TIMEOUT_ENV: &str = "WORKSPACE_REQUEST_TIMEOUT_MS";

/// Environment variable for the response preview limit.
pub const PREVIEW_LIMIT_ENV: &str = "WORKSPACE_PREVIEW_LIMIT";

/// Environment variable for the OpenWeatherMap API key.
pub const WEATHER_API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding user files and the database.
    pub workspace_dir: PathBuf,

    /// Database file name inside `workspace_dir`.
    pub database_name: String,

    /// Timeout for outbound HTTP requests in milliseconds.
    pub request_timeout_ms: u64,

    /// Maximum number of response-body characters returned to the client.
    pub preview_limit: usize,

    /// OpenWeatherMap API key, if weather lookups are enabled.
    pub weather_api_key: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from(DEFAULT_WORKSPACE_DIR),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            weather_api_key: None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let workspace_dir = std::env::var(WORKSPACE_DIR_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.workspace_dir);

        let database_name = std::env::var(DATABASE_NAME_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.database_name);

        let weather_api_key = std::env::var(WEATHER_API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty());

        Self {
            workspace_dir,
            database_name,
            request_timeout_ms: parse_env(REQUEST_TIMEOUT_ENV, defaults.request_timeout_ms),
            preview_limit: parse_env(PREVIEW_LIMIT_ENV, defaults.preview_limit),
            weather_api_key,
        }
    }

    /// Use a different workspace directory.
    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    /// Full path of the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.workspace_dir.join(&self.database_name)
    }

    /// Whether a workspace-relative file name belongs to the database (including its journals).
    pub fn is_reserved(&self, name: &str) -> bool {
        name.starts_with(&self.database_name)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn parse_env<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
