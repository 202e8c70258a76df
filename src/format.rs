//! Text rendering of lookup and search results for tool responses.
//! Every function returns a non-empty block, including when there is
//! nothing to show.

use chrono::NaiveDate;

use crate::calendar::CalendarEntry;
use crate::directory::{DirectoryError, UserInfo};
use crate::mail::{self, MailEntry};
use crate::session::SessionError;

pub const DETAILS_PREVIEW_CHARS: usize = 100;
pub const NO_APPOINTMENTS: &str = "No appointments found for the specified period.";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const RECEIVED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn user_info(user: &UserInfo) -> String {
    let fields = [
        ("Email", &user.email),
        ("Department", &user.department),
        ("Job Title", &user.job_title),
        ("Company", &user.company),
        ("Phone", &user.phone),
        ("Location", &user.location),
        ("Manager", &user.manager),
    ];

    let mut lines = vec![
        String::from("User Information:"),
        format!("Name: {}", user.name),
    ];
    lines.extend(
        fields
            .iter()
            .filter_map(|&(label, value)| value.as_ref().map(|v| format!("{label}: {v}"))),
    );
    lines.join("\n")
}

pub fn directory_failure(err: &DirectoryError) -> String {
    match err {
        DirectoryError::NotFound(_) | DirectoryError::DetailsUnavailable(_) => err.to_string(),
        DirectoryError::Unavailable(cause) => {
            format!("Failed to connect to the directory: {cause}")
        }
    }
}

/// A session that could not be opened or did not finish, prefixed with
/// what the tool was doing.
pub fn session_failure(context: &str, err: &SessionError) -> String {
    match err {
        SessionError::TimedOut(limit) => format!(
            "Timed out waiting for the mail store after {}s.",
            limit.as_secs()
        ),
        _ => format!("{context}: {err}"),
    }
}

pub fn calendar(entries: &[CalendarEntry]) -> String {
    if entries.is_empty() {
        return NO_APPOINTMENTS.to_string();
    }

    let mut lines = vec![format!("Calendar appointments ({}):", entries.len())];
    for entry in entries {
        lines.push(String::from("\n---"));
        lines.push(format!("Subject: {}", entry.subject));
        lines.push(format!("Start: {}", entry.start.format(TIME_FORMAT)));
        lines.push(format!("End: {}", entry.end.format(TIME_FORMAT)));
        lines.push(format!("Location: {}", or_na(&entry.location)));
        lines.push(format!(
            "Details: {}",
            mail::preview(&entry.body, DETAILS_PREVIEW_CHARS)
        ));
        lines.push(format!("Categories: {}", or_na(&entry.categories)));
        lines.push(format!("Busy Status: {}", entry.busy_status));
    }
    lines.join("\n")
}

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}

pub fn mail_search(entries: &[MailEntry], date: NaiveDate, keyword: &str) -> String {
    if entries.is_empty() {
        return format!("No emails found on {date} with keyword '{keyword}'.");
    }

    let mut lines = vec![format!(
        "Found {} email(s) on {date} with keyword '{keyword}':",
        entries.len()
    )];
    for (idx, entry) in entries.iter().enumerate() {
        lines.push(String::from("-----"));
        lines.push(format!("Email {}:", idx + 1));
        lines.push(format!("Sender: {}", entry.sender));
        lines.push(format!("Subject: {}", entry.subject));
        lines.push(format!(
            "Received: {}",
            entry.received_time.format(RECEIVED_FORMAT)
        ));
        lines.push(format!("Body Preview: {}", entry.body_preview));
    }
    lines.join("\n")
}
