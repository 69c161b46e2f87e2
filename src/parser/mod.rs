use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm::Provider;

pub mod fallback;

/// How a recurring reminder repeats. Advancement after firing belongs to
/// the scheduler, not the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// Structured reminder extracted from a natural-language phrase.
///
/// A short-lived value: built by one interpreter call, optionally edited by
/// the caller (date picker), then handed to the store unchanged in shape.
/// Weekday numbering is 0=Sunday .. 6=Saturday throughout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedReminder {
    pub content: String,
    pub is_recurring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<BTreeSet<u8>>,
    pub next_run_at: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub confidence: f64,
}

/// Tries the LLM interpreter first and falls back to the deterministic
/// pattern interpreter when it declines (`Ok(None)`) or fails (`Err`).
/// Interpreter failure never escapes this function.
pub async fn resolve(
    provider: &Provider,
    text: &str,
    now: DateTime<FixedOffset>,
) -> Option<ParsedReminder> {
    match provider.interpret(text, now).await {
        Ok(Some(parsed)) => Some(parsed),
        Ok(None) => fallback::interpret(text, now),
        Err(err) => {
            warn!("LLM interpreter failed, using pattern fallback: {:#}", err);
            fallback::interpret(text, now)
        }
    }
}
