use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

use crate::llm::Provider;
use crate::store::ReminderStore;

pub mod llm;
pub mod parser;
pub mod routes;
pub mod store;

// TODO: replace with the authenticated user id once auth lands.
pub const STUB_USER_ID: &str = "temp-user-id";

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<Provider>,
    pub store: Arc<ReminderStore>,
}

/// Reads the TIMEZONE environment variable as an IANA zone name.
pub fn get_timezone_override() -> Option<Tz> {
    std::env::var("TIMEZONE").ok()?.parse().ok()
}

/// Current time in the configured zone (TIMEZONE override, else the system
/// zone, else UTC) as a fixed offset. The interpreters take this as an
/// explicit parameter; nothing below this point reads a clock.
pub fn local_now() -> DateTime<FixedOffset> {
    let tz = get_timezone_override().or_else(|| iana_time_zone::get_timezone().ok()?.parse().ok());
    match tz {
        Some(tz) => Utc::now().with_timezone(&tz).fixed_offset(),
        None => Utc::now().fixed_offset(),
    }
}
