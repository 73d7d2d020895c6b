//! Bot configuration
//!
//! Configuration lives in a TOML file. Secrets (bot token, webhook secret,
//! spreadsheet name) are never stored in the file itself; the file names the
//! environment variables that carry them and they are resolved at runtime.

use crate::layout::{column_letters, MAX_DAY_OF_MONTH, MAX_SHEET_COLUMNS, MAX_SHEET_ROWS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main bot configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    pub bot: BotSection,
    #[serde(default)]
    pub server: ServerSection,
    pub sheets: SheetsSection,
    #[serde(default)]
    pub layout: LayoutSection,
    /// Team roster; list order decides each member's column block
    #[serde(default)]
    pub members: Vec<MemberEntry>,
}

/// Telegram bot section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotSection {
    /// Bot identifier used in logs and health output (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Environment variable containing the Bot API token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Bot API base URL
    #[serde(default = "default_telegram_base_url")]
    pub api_base_url: String,
    /// Environment variable containing the webhook secret token
    pub webhook_secret_env: Option<String>,
    /// HTTP timeout for outbound API calls in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// HTTP server section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path segment Telegram posts updates to
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    /// Public base URL of this service, used by `set-webhook`
    pub public_url: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
            public_url: None,
        }
    }
}

/// Google Sheets section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SheetsSection {
    /// Path to the service-account key file
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Spreadsheet id; takes precedence over any name
    pub spreadsheet_id: Option<String>,
    /// Spreadsheet title, looked up through Drive
    pub spreadsheet_name: Option<String>,
    /// Environment variable containing the spreadsheet title
    pub spreadsheet_name_env: Option<String>,
    /// Worksheet (tab) that receives the figures
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    #[serde(default = "default_sheets_base_url")]
    pub sheets_base_url: String,
    #[serde(default = "default_drive_base_url")]
    pub drive_base_url: String,
}

/// Cell layout of the worksheet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutSection {
    /// Added to the day of month to get the row
    #[serde(default = "default_day_row_offset")]
    pub day_row_offset: u32,
    /// Column of the first member's block (1 = A)
    #[serde(default = "default_first_member_column")]
    pub first_member_column: u32,
    /// Width of each member's column block
    #[serde(default = "default_member_column_stride")]
    pub member_column_stride: u32,
    #[serde(default)]
    pub volume_column_offset: u32,
    #[serde(default = "default_new_users_column_offset")]
    pub new_users_column_offset: u32,
    /// Offset from UTC used to decide "today"; server local time when unset
    pub utc_offset_minutes: Option<i32>,
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            day_row_offset: default_day_row_offset(),
            first_member_column: default_first_member_column(),
            member_column_stride: default_member_column_stride(),
            volume_column_offset: 0,
            new_users_column_offset: default_new_users_column_offset(),
            utc_offset_minutes: None,
        }
    }
}

/// A single roster entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberEntry {
    pub name: String,
    pub telegram_user_id: i64,
}

fn default_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}

fn default_telegram_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_webhook_path() -> String {
    "webhook".to_string()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_worksheet() -> String {
    "vol_t7".to_string()
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_drive_base_url() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_day_row_offset() -> u32 {
    2
}

fn default_first_member_column() -> u32 {
    2
}

fn default_member_column_stride() -> u32 {
    4
}

fn default_new_users_column_offset() -> u32 {
    1
}

/// Largest UTC offset in use anywhere (UTC+14)
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// How the target spreadsheet is identified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetRef {
    Id(String),
    Name(String),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid bot ID format: {0}")]
    InvalidBotId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BotConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bot_id(&self.bot.id)?;
        self.validate_members()?;
        self.validate_layout()?;

        if self.sheets.worksheet.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "sheets.worksheet must not be empty".to_string(),
            ));
        }

        if self.sheets.spreadsheet_id.is_none()
            && self.sheets.spreadsheet_name.is_none()
            && self.sheets.spreadsheet_name_env.is_none()
        {
            return Err(ConfigError::InvalidConfig(
                "one of sheets.spreadsheet_id, sheets.spreadsheet_name or sheets.spreadsheet_name_env is required"
                    .to_string(),
            ));
        }

        let path = &self.server.webhook_path;
        if path.is_empty() || path.contains('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "server.webhook_path '{path}' must be a single non-empty path segment"
            )));
        }

        Ok(())
    }

    fn validate_members(&self) -> Result<(), ConfigError> {
        if self.members.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "at least one [[members]] entry is required".to_string(),
            ));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for member in &self.members {
            if member.name.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "member names must not be empty".to_string(),
                ));
            }
            if !names.insert(member.name.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate member name '{}'",
                    member.name
                )));
            }
            if !ids.insert(member.telegram_user_id) {
                return Err(ConfigError::InvalidConfig(format!(
                    "telegram user id {} is assigned to more than one member",
                    member.telegram_user_id
                )));
            }
        }

        Ok(())
    }

    fn validate_layout(&self) -> Result<(), ConfigError> {
        let layout = &self.layout;

        if layout.first_member_column == 0 {
            return Err(ConfigError::InvalidConfig(
                "layout.first_member_column is 1-based and must be at least 1".to_string(),
            ));
        }
        if layout.member_column_stride == 0 {
            return Err(ConfigError::InvalidConfig(
                "layout.member_column_stride must be at least 1".to_string(),
            ));
        }
        for (field, offset) in [
            ("volume_column_offset", layout.volume_column_offset),
            ("new_users_column_offset", layout.new_users_column_offset),
        ] {
            if offset >= layout.member_column_stride {
                return Err(ConfigError::InvalidConfig(format!(
                    "layout.{field} ({offset}) must be smaller than member_column_stride ({})",
                    layout.member_column_stride
                )));
            }
        }

        // the bottom row (day 31) and the last member's block must stay on the grid
        let last_row = u64::from(MAX_DAY_OF_MONTH) + u64::from(layout.day_row_offset);
        if last_row > u64::from(MAX_SHEET_ROWS) {
            return Err(ConfigError::InvalidConfig(format!(
                "layout.day_row_offset ({}) puts day {MAX_DAY_OF_MONTH} past row {MAX_SHEET_ROWS}",
                layout.day_row_offset
            )));
        }
        let last_member = self.members.len().saturating_sub(1) as u64;
        let last_column = u64::from(layout.first_member_column)
            + last_member * u64::from(layout.member_column_stride)
            + u64::from(layout.member_column_stride - 1);
        if last_column > u64::from(MAX_SHEET_COLUMNS) {
            return Err(ConfigError::InvalidConfig(format!(
                "layout puts the last member's columns past column {MAX_SHEET_COLUMNS} ({})",
                column_letters(MAX_SHEET_COLUMNS)
            )));
        }

        if let Some(minutes) = layout.utc_offset_minutes {
            if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
                return Err(ConfigError::InvalidConfig(format!(
                    "layout.utc_offset_minutes ({minutes}) is outside -840..=840"
                )));
            }
        }

        Ok(())
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name
            .and_then(|name| std::env::var(name).ok())
            .filter(|value| !value.is_empty())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get the Bot API token from its environment variable
    pub fn get_bot_token(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.bot.token_env)
    }

    /// Get the webhook secret token, if one is configured
    pub fn get_webhook_secret(&self) -> Option<String> {
        Self::get_env_var_optional(self.bot.webhook_secret_env.as_ref())
    }

    /// Decide which spreadsheet to open: id, then name, then name from env
    pub fn resolve_spreadsheet(&self) -> Result<SpreadsheetRef, ConfigError> {
        if let Some(id) = &self.sheets.spreadsheet_id {
            return Ok(SpreadsheetRef::Id(id.clone()));
        }
        if let Some(name) = &self.sheets.spreadsheet_name {
            return Ok(SpreadsheetRef::Name(name.clone()));
        }
        match &self.sheets.spreadsheet_name_env {
            Some(env) => Ok(SpreadsheetRef::Name(Self::get_env_var_required(env)?)),
            None => Err(ConfigError::InvalidConfig(
                "no spreadsheet configured".to_string(),
            )),
        }
    }

    /// Listening port; the `PORT` environment variable wins when set
    pub fn effective_port(&self) -> u16 {
        std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(self.server.port)
    }

    /// Full webhook URL derived from `server.public_url`
    pub fn webhook_url(&self) -> Option<String> {
        self.server.public_url.as_ref().map(|base| {
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                self.server.webhook_path
            )
        })
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[bot]
id = "test-bot"

[sheets]
spreadsheet_id = "sheet-123"
worksheet = "vol_t7"

[[members]]
name = "Khoa Dao"
telegram_user_id = 7626921008

[[members]]
name = "Hung Luu"
telegram_user_id = 515315411

[[members]]
name = "Thao Vy"
telegram_user_id = 5939326062
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate bot ID format
fn validate_bot_id(bot_id: &str) -> Result<(), ConfigError> {
    let valid_chars = bot_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if bot_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidBotId(format!(
            "Bot ID '{bot_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[bot]
id = "team-vol-bot"
token_env = "MY_BOT_TOKEN"
webhook_secret_env = "MY_WEBHOOK_SECRET"

[server]
port = 10000
public_url = "https://bot.example.com/"

[sheets]
credentials_path = "/etc/bot/credentials.json"
spreadsheet_name = "Team KPI"
worksheet = "vol_t8"

[layout]
day_row_offset = 3
member_column_stride = 5
utc_offset_minutes = 420

[[members]]
name = "Khoa Dao"
telegram_user_id = 7626921008
"#;

        let config = BotConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.bot.id, "team-vol-bot");
        assert_eq!(config.bot.token_env, "MY_BOT_TOKEN");
        assert_eq!(config.server.port, 10000);
        assert_eq!(config.server.webhook_path, "webhook");
        assert_eq!(config.sheets.worksheet, "vol_t8");
        assert_eq!(config.layout.day_row_offset, 3);
        assert_eq!(config.layout.first_member_column, 2);
        assert_eq!(config.layout.member_column_stride, 5);
        assert_eq!(config.layout.utc_offset_minutes, Some(420));
        assert_eq!(
            config.webhook_url().as_deref(),
            Some("https://bot.example.com/webhook")
        );
    }

    #[test]
    fn test_defaults_match_team_sheet() {
        let config = BotConfig::test_config();
        assert_eq!(config.bot.token_env, "TELEGRAM_BOT_TOKEN");
        assert_eq!(config.bot.api_base_url, "https://api.telegram.org");
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.sheets.credentials_path,
            PathBuf::from("credentials.json")
        );
        assert_eq!(config.layout.day_row_offset, 2);
        assert_eq!(config.layout.first_member_column, 2);
        assert_eq!(config.layout.member_column_stride, 4);
        assert_eq!(config.layout.volume_column_offset, 0);
        assert_eq!(config.layout.new_users_column_offset, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_bot_id() {
        assert!(validate_bot_id("invalid@bot").is_err());
        assert!(validate_bot_id("").is_err());
        assert!(validate_bot_id("valid-bot_123.test").is_ok());
    }

    #[test]
    fn test_duplicate_user_id_rejected() {
        let mut config = BotConfig::test_config();
        config.members.push(MemberEntry {
            name: "Someone Else".to_string(),
            telegram_user_id: 515315411,
        });

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
        assert!(err.to_string().contains("515315411"));
    }

    #[test]
    fn test_duplicate_member_name_rejected() {
        let mut config = BotConfig::test_config();
        config.members.push(MemberEntry {
            name: "Thao Vy".to_string(),
            telegram_user_id: 1,
        });

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_roster_rejected() {
        let mut config = BotConfig::test_config();
        config.members.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metric_offset_must_fit_stride() {
        let mut config = BotConfig::test_config();
        config.layout.member_column_stride = 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("new_users_column_offset"));
    }

    #[test]
    fn test_zero_first_column_rejected() {
        let mut config = BotConfig::test_config();
        config.layout.first_member_column = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_layout_must_fit_sheet_grid() {
        let mut config = BotConfig::test_config();
        config.layout.day_row_offset = u32::MAX - 5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("day_row_offset"));

        let mut config = BotConfig::test_config();
        config.layout.first_member_column = u32::MAX;
        assert!(config.validate().is_err());

        let mut config = BotConfig::test_config();
        config.layout.member_column_stride = u32::MAX / 2;
        assert!(config.validate().is_err());

        // the last member's block may end exactly on column ZZZ
        let mut config = BotConfig::test_config();
        let members = config.members.len() as u32;
        config.layout.first_member_column = MAX_SHEET_COLUMNS - members * 4 + 1;
        assert!(config.validate().is_ok());
        config.layout.first_member_column += 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_utc_offset_bounds() {
        let mut config = BotConfig::test_config();
        config.layout.utc_offset_minutes = Some(-600);
        assert!(config.validate().is_ok());

        config.layout.utc_offset_minutes = Some(15 * 60);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_spreadsheet_selector_rejected() {
        let mut config = BotConfig::test_config();
        config.sheets.spreadsheet_id = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("spreadsheet"));
    }

    #[test]
    fn test_webhook_path_with_slash_rejected() {
        let mut config = BotConfig::test_config();
        config.server.webhook_path = "hooks/telegram".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spreadsheet_id_wins_over_name() {
        let mut config = BotConfig::test_config();
        config.sheets.spreadsheet_name = Some("Team KPI".to_string());
        assert_eq!(
            config.resolve_spreadsheet().unwrap(),
            SpreadsheetRef::Id("sheet-123".to_string())
        );

        config.sheets.spreadsheet_id = None;
        assert_eq!(
            config.resolve_spreadsheet().unwrap(),
            SpreadsheetRef::Name("Team KPI".to_string())
        );
    }

    #[test]
    fn test_missing_token_env_reports_variable_name() {
        let mut config = BotConfig::test_config();
        config.bot.token_env = "TEAMSHEET_TEST_TOKEN_THAT_IS_NEVER_SET".to_string();

        match config.get_bot_token() {
            Err(ConfigError::EnvVarNotFound(name)) => {
                assert_eq!(name, "TEAMSHEET_TEST_TOKEN_THAT_IS_NEVER_SET")
            }
            other => panic!("expected EnvVarNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_webhook_url_absent_without_public_url() {
        let config = BotConfig::test_config();
        assert_eq!(config.webhook_url(), None);
    }
}
