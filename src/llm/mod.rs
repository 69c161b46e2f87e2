use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use crate::parser::{Frequency, ParsedReminder};

pub mod openai;
pub mod prompt;

pub type Provider = dyn LLMProvider + Send + Sync;

/// A language-model backend able to turn a phrase into a structured
/// reminder. `Ok(None)` means the model declined (no JSON object in the
/// reply); `Err` covers transport failures and malformed replies. Both are
/// recoverable through the caller's fallback path.
#[async_trait]
pub trait LLMProvider {
    async fn interpret(
        &self,
        text: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<ParsedReminder>>;
}

/// Default confidence when the model omits the field.
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Reply fields as the model sent them, before any trust is placed in them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReminder {
    content: Option<String>,
    is_recurring: Option<bool>,
    frequency: Option<Frequency>,
    days_of_week: Option<Vec<i64>>,
    next_run_at: Option<String>,
    time: Option<String>,
    confidence: Option<f64>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("reply JSON is not a reminder object: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("nextRunAt is missing")]
    MissingNextRunAt,
    #[error("nextRunAt {0:?} is not a datetime")]
    BadNextRunAt(String),
    #[error("frequency must be present exactly when isRecurring is true")]
    FrequencyMismatch,
    #[error("day of week {0} is outside 0..=6")]
    DayOutOfRange(i64),
}

/// Extracts the first-`{`-to-last-`}` substring, tolerating prose the model
/// may wrap around the JSON it was asked for.
fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

/// Decodes a completion reply into a validated reminder. `Ok(None)` when
/// the reply contains no JSON object at all; `Err` when an object is
/// present but malformed. The prompt's schema description is the contract
/// this enforces.
pub fn decode_reply(
    reply: &str,
    text: &str,
    now: DateTime<FixedOffset>,
) -> Result<Option<ParsedReminder>, DecodeError> {
    let Some(object) = extract_json_object(reply) else {
        return Ok(None);
    };
    let raw: RawReminder = serde_json::from_str(object)?;

    let next_run_at = raw.next_run_at.ok_or(DecodeError::MissingNextRunAt)?;
    let next_run_at = parse_next_run_at(&next_run_at, now)?;

    let is_recurring = raw.is_recurring.unwrap_or(false);
    if is_recurring != raw.frequency.is_some() {
        return Err(DecodeError::FrequencyMismatch);
    }

    let days_of_week = match raw.days_of_week {
        Some(days) if !days.is_empty() => {
            let mut set = BTreeSet::new();
            for day in days {
                if !(0..=6).contains(&day) {
                    return Err(DecodeError::DayOutOfRange(day));
                }
                set.insert(day as u8);
            }
            Some(set)
        }
        _ => None,
    };

    Ok(Some(ParsedReminder {
        content: raw
            .content
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| text.to_string()),
        is_recurring,
        frequency: raw.frequency,
        days_of_week,
        next_run_at,
        time: raw.time,
        confidence: raw.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
    }))
}

fn parse_next_run_at(
    value: &str,
    now: DateTime<FixedOffset>,
) -> Result<DateTime<FixedOffset>, DecodeError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed);
    }
    // Models sometimes drop the offset; anchor a bare datetime at the
    // caller's offset.
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        && let Some(parsed) = naive.and_local_timezone(*now.offset()).single()
    {
        return Ok(parsed);
    }
    Err(DecodeError::BadNextRunAt(value.to_string()))
}
