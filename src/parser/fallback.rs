//! Deterministic pattern interpreter over Portuguese time, weekday and
//! recurrence expressions. Pure: everything is derived from `text` and
//! `now`, no I/O, always terminates.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::{Frequency, ParsedReminder};

/// Reported for every pattern match: recognized, not verified.
const PATTERN_CONFIDENCE: f64 = 0.7;

static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})h(\d{0,2})").unwrap());
static WEEKDAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(segunda|terça|quarta|quinta|sexta|sábado|domingo)").unwrap());
static RECURRENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(toda|todo)s?\s+(dia|semana|mês)").unwrap());

fn weekday_ordinal(name: &str) -> Option<u8> {
    match name.to_lowercase().as_str() {
        "domingo" => Some(0),
        "segunda" => Some(1),
        "terça" => Some(2),
        "quarta" => Some(3),
        "quinta" => Some(4),
        "sexta" => Some(5),
        "sábado" => Some(6),
        _ => None,
    }
}

/// Extracts a reminder from fixed lexical patterns. Returns `None` when the
/// text carries no temporal signal at all.
///
/// Matched weekdays land in `days_of_week` as metadata only; `next_run_at`
/// is not projected onto the nearest named weekday (the date picker is the
/// correction mechanism). The `time` field keeps the raw matched token
/// ("7h" stays "7h"), unlike the LLM path's normalized "HH:MM".
pub fn interpret(text: &str, now: DateTime<FixedOffset>) -> Option<ParsedReminder> {
    let time_match = TIME_RE.captures(text);
    let weekday_names: Vec<&str> = WEEKDAY_RE.find_iter(text).map(|m| m.as_str()).collect();
    let recurrence = RECURRENCE_RE.find(text);

    if time_match.is_none() && weekday_names.is_empty() && recurrence.is_none() {
        return None;
    }

    let mut next_run_at = now;
    let mut time = None;
    if let Some(caps) = &time_match {
        let hours: u32 = caps[1].parse().unwrap_or(0);
        let minutes: u32 = match caps.get(2).map(|m| m.as_str()) {
            Some("") | None => 0,
            Some(digits) => digits.parse().unwrap_or(0),
        };
        // A token like "99h" does not form a clock time; drop the signal.
        if let Some(time_of_day) = NaiveTime::from_hms_opt(hours, minutes, 0)
            && let Some(candidate) = now.with_time(time_of_day).single()
        {
            // Roll forward exactly one day when the time has already
            // elapsed today, never more.
            next_run_at = if candidate > now {
                candidate
            } else {
                candidate + Duration::days(1)
            };
            time = Some(format!(
                "{}h{}",
                &caps[1],
                caps.get(2).map_or("", |m| m.as_str())
            ));
        }
    }

    let days_of_week: BTreeSet<u8> = weekday_names
        .iter()
        .filter_map(|name| weekday_ordinal(name))
        .collect();
    let days_of_week = (!days_of_week.is_empty()).then_some(days_of_week);

    let (is_recurring, frequency) = match recurrence {
        Some(marker) => {
            let marker = marker.as_str().to_lowercase();
            let frequency = if marker.contains("dia") {
                Frequency::Daily
            } else if marker.contains("semana") {
                Frequency::Weekly
            } else {
                Frequency::Monthly
            };
            (true, Some(frequency))
        }
        None => (false, None),
    };

    Some(ParsedReminder {
        content: text.to_string(),
        is_recurring,
        frequency,
        days_of_week,
        next_run_at,
        time,
        confidence: PATTERN_CONFIDENCE,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    // Monday, 2024-05-06 12:00 in São Paulo.
    fn noon() -> DateTime<FixedOffset> {
        brt().with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn no_signal_returns_none() {
        assert!(interpret("oi", noon()).is_none());
        assert!(interpret("comprar pão e leite", noon()).is_none());
        assert!(interpret("", noon()).is_none());
    }

    #[test]
    fn weekly_multi_day_with_time() {
        let parsed = interpret("academia toda segunda e quarta às 7h", noon()).unwrap();
        assert!(parsed.is_recurring);
        assert_eq!(parsed.frequency, Some(Frequency::Weekly));
        assert_eq!(
            parsed.days_of_week,
            Some(BTreeSet::from([1, 3])),
            "segunda=1, quarta=3"
        );
        assert_eq!(parsed.time.as_deref(), Some("7h"));
        assert_eq!(parsed.content, "academia toda segunda e quarta às 7h");
        assert_eq!(parsed.confidence, 0.7);
    }

    #[test]
    fn monthly_without_days() {
        let parsed = interpret("pagar aluguel todo mês", noon()).unwrap();
        assert!(parsed.is_recurring);
        assert_eq!(parsed.frequency, Some(Frequency::Monthly));
        assert!(parsed.days_of_week.is_none());
    }

    #[test]
    fn daily_marker() {
        let parsed = interpret("tomar remédio todos os dias às 8h", noon()).unwrap();
        // "todos os dias" does not match the marker shape; the time alone
        // still qualifies the text.
        assert_eq!(parsed.time.as_deref(), Some("8h"));

        let parsed = interpret("tomar remédio todo dia", noon()).unwrap();
        assert_eq!(parsed.frequency, Some(Frequency::Daily));
    }

    #[test]
    fn elapsed_time_rolls_forward_one_day() {
        // 7h is already past noon, so the date advances exactly one day.
        let parsed = interpret("academia às 7h", noon()).unwrap();
        assert_eq!(parsed.next_run_at.hour(), 7);
        assert_eq!(parsed.next_run_at.minute(), 0);
        assert_eq!(parsed.next_run_at - noon(), Duration::hours(19));
    }

    #[test]
    fn future_time_stays_today() {
        let parsed = interpret("reunião às 15h30", noon()).unwrap();
        assert_eq!(parsed.next_run_at.hour(), 15);
        assert_eq!(parsed.next_run_at.minute(), 30);
        assert_eq!(parsed.next_run_at.date_naive(), noon().date_naive());
        assert_eq!(parsed.time.as_deref(), Some("15h30"));
    }

    #[test]
    fn exact_current_time_counts_as_elapsed() {
        let parsed = interpret("almoço às 12h", noon()).unwrap();
        assert_eq!(parsed.next_run_at - noon(), Duration::days(1));
    }

    #[test]
    fn weekday_matching_is_case_insensitive_and_deduplicated() {
        let parsed = interpret("Segunda e SEGUNDA e segunda", noon()).unwrap();
        assert_eq!(parsed.days_of_week, Some(BTreeSet::from([1])));
    }

    #[test]
    fn all_seven_weekdays_map_to_ordinals() {
        let parsed = interpret(
            "domingo segunda terça quarta quinta sexta sábado",
            noon(),
        )
        .unwrap();
        assert_eq!(
            parsed.days_of_week,
            Some(BTreeSet::from([0, 1, 2, 3, 4, 5, 6]))
        );
    }

    #[test]
    fn invalid_clock_value_is_not_a_time() {
        let parsed = interpret("coisa às 99h segunda", noon()).unwrap();
        assert!(parsed.time.is_none());
        assert_eq!(parsed.next_run_at, noon());
        assert_eq!(parsed.days_of_week, Some(BTreeSet::from([1])));
    }

    #[test]
    fn rendered_time_token_round_trips() {
        for text in ["7h", "14h30", "às 9h05 na clínica"] {
            let parsed = interpret(text, noon()).unwrap();
            let rendered = parsed.time.unwrap();
            let caps = TIME_RE.captures(&rendered).unwrap();
            assert_eq!(caps[1].parse::<u32>().unwrap(), parsed.next_run_at.hour());
            let minutes = caps.get(2).map_or("", |m| m.as_str());
            let minutes: u32 = if minutes.is_empty() {
                0
            } else {
                minutes.parse().unwrap()
            };
            assert_eq!(minutes, parsed.next_run_at.minute());
        }
    }

    #[test]
    fn content_preserves_original_casing() {
        let parsed = interpret("Dentista Sexta às 10h", noon()).unwrap();
        assert_eq!(parsed.content, "Dentista Sexta às 10h");
        assert_eq!(parsed.days_of_week, Some(BTreeSet::from([5])));
    }
}
