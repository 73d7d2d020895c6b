//! Team roster and sender allow-list
//!
//! Only messages from users listed in the roster are processed. A member's
//! position in the roster decides which column block of the worksheet holds
//! their figures.

use crate::config::MemberEntry;
use std::collections::HashMap;

/// A roster member resolved from a Telegram user id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Zero-based position in the roster
    pub index: u32,
    pub name: String,
}

/// Static allow-list built from configuration
#[derive(Debug, Clone, Default)]
pub struct Roster {
    by_user_id: HashMap<i64, RosterEntry>,
}

impl Roster {
    pub fn from_members(members: &[MemberEntry]) -> Self {
        let by_user_id = members
            .iter()
            .enumerate()
            .map(|(index, member)| {
                (
                    member.telegram_user_id,
                    RosterEntry {
                        index: index as u32,
                        name: member.name.clone(),
                    },
                )
            })
            .collect();

        Self { by_user_id }
    }

    /// Look up the roster entry for a Telegram user id
    pub fn lookup(&self, user_id: i64) -> Option<&RosterEntry> {
        self.by_user_id.get(&user_id)
    }
}
