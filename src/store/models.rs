use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::parser::Frequency;

/// Subscription tier; gates how many pending reminders a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    Free,
    Pro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReminderStatus {
    Pending,
    Done,
}

/// Payload handed to the store. The caller may have edited the parsed
/// values (e.g. adjusted the date in a picker) before confirming, so this
/// is its own shape rather than a `ParsedReminder`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReminder {
    pub content: String,
    pub raw_text: String,
    pub is_recurring: bool,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub days_of_week: Option<BTreeSet<u8>>,
    pub next_run_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub raw_text: String,
    pub is_recurring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<BTreeSet<u8>>,
    pub next_run_at: DateTime<FixedOffset>,
    pub status: ReminderStatus,
    pub created_at: DateTime<FixedOffset>,
}
