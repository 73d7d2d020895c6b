//! Text command parsing
//!
//! Two commands are understood:
//!
//! - `/vol <number>` records the member's cumulative volume for today
//! - `/user <count>` records the member's new-user count for today
//!
//! Matching is case-insensitive. The `/vol@my_bot 12` form that Telegram
//! produces in group chats is accepted as well. Anything else is not a
//! command and is ignored by the caller.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which figure a command records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Volume,
    NewUsers,
}

impl Metric {
    /// Command keyword without the leading slash
    pub fn keyword(&self) -> &'static str {
        match self {
            Metric::Volume => "vol",
            Metric::NewUsers => "user",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "vol" => Some(Metric::Volume),
            "user" => Some(Metric::NewUsers),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.keyword())
    }
}

/// Value carried by a command
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Volume(f64),
    Count(u64),
}

impl MetricValue {
    /// JSON representation written into the cell
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetricValue::Volume(v) => serde_json::json!(v),
            MetricValue::Count(n) => serde_json::json!(n),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // whole numbers print without a trailing ".0"
            MetricValue::Volume(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{}", *v as i64)
            }
            MetricValue::Volume(v) => write!(f, "{v}"),
            MetricValue::Count(n) => write!(f, "{n}"),
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub metric: Metric,
    pub value: MetricValue,
}

/// Errors for recognised commands whose argument is unusable
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("missing value, usage: {usage}")]
    MissingArgument { usage: &'static str },

    #[error("'{input}' is not a number")]
    InvalidNumber { input: String },

    #[error("'{input}' is not a whole number of users")]
    InvalidCount { input: String },
}

impl CommandError {
    fn missing(metric: Metric) -> Self {
        let usage = match metric {
            Metric::Volume => "/vol <number>",
            Metric::NewUsers => "/user <count>",
        };
        CommandError::MissingArgument { usage }
    }
}

/// Extract the command keyword this text starts with, if it is one of ours.
///
/// Used to label failure replies even when the argument cannot be parsed.
pub fn command_metric(text: &str) -> Option<Metric> {
    let normalized = text.trim().to_lowercase();
    normalized.split_whitespace().next().and_then(metric_of)
}

/// `/vol`, `/VOL`, `/vol@some_bot` all map to the volume metric
fn metric_of(head: &str) -> Option<Metric> {
    let keyword = head.strip_prefix('/')?;
    let keyword = keyword.split('@').next().unwrap_or(keyword);
    Metric::from_keyword(keyword)
}

/// Parse message text into a command.
///
/// Returns `Ok(None)` for text that is not one of the bot's commands.
pub fn parse_command(text: &str) -> Result<Option<Command>, CommandError> {
    let normalized = text.trim().to_lowercase();
    let mut parts = normalized.split_whitespace();

    let Some(metric) = parts.next().and_then(metric_of) else {
        return Ok(None);
    };

    let Some(argument) = parts.next() else {
        return Err(CommandError::missing(metric));
    };

    // exactly one value; "/vol 10 5" is a typo, not 105
    let rest: Vec<&str> = parts.collect();
    if !rest.is_empty() {
        let input = format!("{argument} {}", rest.join(" "));
        return Err(match metric {
            Metric::Volume => CommandError::InvalidNumber { input },
            Metric::NewUsers => CommandError::InvalidCount { input },
        });
    }

    let value = match metric {
        Metric::Volume => MetricValue::Volume(parse_volume(argument)?),
        Metric::NewUsers => MetricValue::Count(parse_count(argument)?),
    };

    Ok(Some(Command { metric, value }))
}

fn parse_volume(input: &str) -> Result<f64, CommandError> {
    let cleaned = input.replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CommandError::InvalidNumber {
            input: input.to_string(),
        }),
    }
}

fn parse_count(input: &str) -> Result<u64, CommandError> {
    input
        .replace(',', "")
        .parse::<u64>()
        .map_err(|_| CommandError::InvalidCount {
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_volume_command() {
        let cmd = parse_command("/vol 1500").unwrap().unwrap();
        assert_eq!(cmd.metric, Metric::Volume);
        assert_eq!(cmd.value, MetricValue::Volume(1500.0));
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trimmed() {
        let cmd = parse_command("   /VOL 12.5  ").unwrap().unwrap();
        assert_eq!(cmd.value, MetricValue::Volume(12.5));

        let cmd = parse_command("/User 7").unwrap().unwrap();
        assert_eq!(cmd.metric, Metric::NewUsers);
        assert_eq!(cmd.value, MetricValue::Count(7));
    }

    #[test]
    fn test_thousands_separators_accepted() {
        let cmd = parse_command("/vol 1,250,000").unwrap().unwrap();
        assert_eq!(cmd.value, MetricValue::Volume(1_250_000.0));

        let cmd = parse_command("/user 1,024").unwrap().unwrap();
        assert_eq!(cmd.value, MetricValue::Count(1024));
    }

    #[test]
    fn test_bot_mention_suffix_accepted() {
        let cmd = parse_command("/vol@team_kpi_bot 300").unwrap().unwrap();
        assert_eq!(cmd.metric, Metric::Volume);
        assert_eq!(cmd.value, MetricValue::Volume(300.0));
    }

    #[test]
    fn test_non_commands_are_ignored() {
        assert_eq!(parse_command("hello team").unwrap(), None);
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("/start").unwrap(), None);
        assert_eq!(parse_command("/volume 12").unwrap(), None);
        assert_eq!(parse_command("vol 12").unwrap(), None);
    }

    #[test]
    fn test_missing_argument() {
        let err = parse_command("/vol").unwrap_err();
        assert_eq!(
            err,
            CommandError::MissingArgument {
                usage: "/vol <number>"
            }
        );

        assert!(matches!(
            parse_command("/user   ").unwrap_err(),
            CommandError::MissingArgument { .. }
        ));
    }

    #[test]
    fn test_invalid_volume() {
        let err = parse_command("/vol abc").unwrap_err();
        assert_eq!(
            err,
            CommandError::InvalidNumber {
                input: "abc".to_string()
            }
        );
        assert!(parse_command("/vol inf").is_err());
        assert!(parse_command("/vol NaN").is_err());
    }

    #[test]
    fn test_invalid_count() {
        assert!(matches!(
            parse_command("/user 2.5").unwrap_err(),
            CommandError::InvalidCount { .. }
        ));
        assert!(matches!(
            parse_command("/user -3").unwrap_err(),
            CommandError::InvalidCount { .. }
        ));
    }

    #[test]
    fn test_extra_words_are_rejected() {
        assert_eq!(
            parse_command("/vol 10 5").unwrap_err(),
            CommandError::InvalidNumber {
                input: "10 5".to_string()
            }
        );
        assert_eq!(
            parse_command("/user 3 4").unwrap_err(),
            CommandError::InvalidCount {
                input: "3 4".to_string()
            }
        );
        assert!(parse_command("/vol 1,500 today").is_err());
    }

    #[test]
    fn test_negative_volume_is_allowed() {
        // corrections may bring the cumulative figure down
        let cmd = parse_command("/vol -20").unwrap().unwrap();
        assert_eq!(cmd.value, MetricValue::Volume(-20.0));
    }

    #[test]
    fn test_command_metric_detection() {
        assert_eq!(command_metric("/vol oops"), Some(Metric::Volume));
        assert_eq!(command_metric("/USER@bot"), Some(Metric::NewUsers));
        assert_eq!(command_metric("/help"), None);
        assert_eq!(command_metric("text"), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(MetricValue::Volume(1500.0).to_string(), "1500");
        assert_eq!(MetricValue::Volume(12.75).to_string(), "12.75");
        assert_eq!(MetricValue::Count(9).to_string(), "9");
        assert_eq!(Metric::Volume.to_string(), "/vol");
    }

    #[test]
    fn test_value_json() {
        assert_eq!(MetricValue::Volume(2.5).to_json(), serde_json::json!(2.5));
        assert_eq!(MetricValue::Count(4).to_json(), serde_json::json!(4));
    }
}
