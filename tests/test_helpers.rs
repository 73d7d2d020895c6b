//! Test helpers and utilities for integration tests

use serde_json::json;
use teamsheet_bot::chat::Update;
use teamsheet_bot::config::BotConfig;

#[allow(dead_code)]
pub const KHOA_DAO: i64 = 7626921008;
#[allow(dead_code)]
pub const HUNG_LUU: i64 = 515315411;
#[allow(dead_code)]
pub const THAO_VY: i64 = 5939326062;
#[allow(dead_code)]
pub const TEAM_CHAT: i64 = -1001234567890;

/// Create a test configuration for integration tests
#[allow(dead_code)]
pub fn test_config() -> BotConfig {
    BotConfig::from_toml_str(
        r#"
[bot]
id = "teamsheet-test"

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
"#,
    )
    .expect("test config should be valid")
}

/// Webhook payload for a text message in the team chat
#[allow(dead_code)]
pub fn text_update_json(update_id: i64, user_id: i64, text: &str) -> serde_json::Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id * 10,
            "from": {
                "id": user_id,
                "is_bot": false,
                "first_name": "Member",
                "language_code": "vi"
            },
            "chat": {
                "id": TEAM_CHAT,
                "title": "Team KPI",
                "type": "supergroup"
            },
            "date": 1_717_000_000,
            "text": text
        }
    })
}

#[allow(dead_code)]
pub fn text_update(update_id: i64, user_id: i64, text: &str) -> Update {
    serde_json::from_value(text_update_json(update_id, user_id, text))
        .expect("test update should deserialize")
}
