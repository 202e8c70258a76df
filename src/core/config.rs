use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store_path: String,
    /// Hours added to appointment times before they are stored. The
    /// desktop client in the reference deployment interprets naive
    /// times as UTC while callers pass local (JST) times.
    pub tz_offset_hours: i64,
    pub confirm_before_send: bool,
    pub call_timeout: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let store_path =
            env::var("MAILROOM_STORE_PATH").unwrap_or_else(|_| "./mailbox.json".to_string());
        let tz_offset_hours = tz_offset_hours(env::var("MAILROOM_TZ_OFFSET_HOURS").ok());
        let confirm_before_send = env::var("MAILROOM_CONFIRM_SEND")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let call_timeout = env::var("MAILROOM_CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            store_path,
            tz_offset_hours,
            confirm_before_send,
            call_timeout,
        }
    }
}

const DEFAULT_TZ_OFFSET_HOURS: i64 = 9;

// Anything that is not a whole number of hours within a day of UTC
// falls back to the default.
fn tz_offset_hours(raw: Option<String>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|hours| (-24..=24).contains(hours))
        .unwrap_or(DEFAULT_TZ_OFFSET_HOURS)
}
