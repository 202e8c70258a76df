//! The external mail, calendar and directory store.
//!
//! Everything else in the crate talks to the store through
//! [`MailboxStore`] and the per-invocation [`StoreConnection`] it
//! hands out. The store owns the authoritative data; what comes back
//! from here are request-scoped copies.
//!
//! [`memory::InMemoryStore`] is the bundled implementation, loaded
//! from a JSON fixture by the binary and seeded directly by tests.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;

pub use memory::InMemoryStore;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("could not connect to the mail store: {0}")]
    Unreachable(String),
    #[error("item could not be read: {0}")]
    ItemUnreadable(String),
    #[error("store rejected the operation: {0}")]
    Rejected(String),
    #[error("store error: {0}")]
    Backend(String),
}

/// One item out of an enumeration. A failed read only affects that item.
pub type ItemRead<T> = Result<T, StoreError>;

/// Entry point to the store. Each call to `connect` initializes a
/// fresh connection context that belongs to the calling thread only.
pub trait MailboxStore: Send + Sync {
    fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError>;
}

/// A live connection to the store. Not shared between invocations.
pub trait StoreConnection: Send {
    /// Create the throwaway draft that recipient resolution runs against.
    fn create_scratch_item(&mut self) -> Result<ScratchItem, StoreError>;

    /// Close the draft without saving or sending it.
    fn discard_scratch_item(&mut self, item: ScratchItem) -> Result<(), StoreError>;

    /// Resolve a free-text name or address. `None` means the store
    /// could not resolve it to a single recipient.
    fn resolve_recipient(
        &mut self,
        scratch: &ScratchItem,
        query: &str,
    ) -> Result<Option<Recipient>, StoreError>;

    /// Extended directory profile of a resolved recipient. `None` for
    /// recipients that are not directory users.
    fn directory_profile(
        &mut self,
        recipient: &Recipient,
    ) -> Result<Option<DirectoryProfile>, StoreError>;

    fn list_calendar(
        &mut self,
        restriction: &CalendarRestriction,
    ) -> Result<Vec<ItemRead<StoredAppointment>>, StoreError>;

    /// Save a new calendar entry.
    fn create_calendar_entry(
        &mut self,
        entry: &NewAppointment,
    ) -> Result<AppointmentId, StoreError>;

    /// Send a saved entry out as a meeting invitation.
    fn send_meeting_request(&mut self, id: &AppointmentId) -> Result<(), StoreError>;

    /// Enumerate the inbox in its natural order. `received_on` is a
    /// restriction hint; implementations may return a superset.
    fn scan_inbox(
        &mut self,
        received_on: NaiveDate,
    ) -> Result<Vec<ItemRead<InboxItem>>, StoreError>;

    /// Show a composed message to the user and report whether they
    /// approved sending it.
    fn confirm_message(&mut self, message: &OutgoingMessage) -> Result<bool, StoreError>;

    fn send_message(&mut self, message: &OutgoingMessage) -> Result<(), StoreError>;

    /// Release the connection context.
    fn disconnect(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchItem {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    DirectoryUser,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub display_name: String,
    pub address: String,
    pub kind: AddressKind,
}

/// Directory attributes as the store reports them. Any of the
/// optional fields may be missing or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryProfile {
    pub name: String,
    pub primary_smtp_address: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub business_telephone_number: Option<String>,
    pub office_location: Option<String>,
    pub manager: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusyStatus {
    Free = 0,
    #[default]
    Busy = 1,
    Tentative = 2,
    OutOfOffice = 3,
}

impl TryFrom<i64> for BusyStatus {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BusyStatus::Free),
            1 => Ok(BusyStatus::Busy),
            2 => Ok(BusyStatus::Tentative),
            3 => Ok(BusyStatus::OutOfOffice),
            other => Err(other),
        }
    }
}

impl fmt::Display for BusyStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            BusyStatus::Free => "Free",
            BusyStatus::Busy => "Busy",
            BusyStatus::Tentative => "Tentative",
            BusyStatus::OutOfOffice => "Out of Office",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrenceState {
    NotRecurring,
    Master,
    Occurrence,
    Exception,
}

/// Server-side restriction for a calendar enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRestriction {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub include_recurrences: bool,
    pub sort_by_start: bool,
}

impl CalendarRestriction {
    /// The filter expression in the store's restriction syntax.
    pub fn filter_expression(&self) -> String {
        const STORE_FORMAT: &str = "%m/%d/%Y %I:%M %p";
        format!(
            "[Start] >= '{}' AND [End] <= '{}'",
            self.start.format(STORE_FORMAT),
            self.end.format(STORE_FORMAT)
        )
    }

    pub fn admits(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start >= self.start && end <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAppointment {
    pub subject: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location: Option<String>,
    pub body: Option<String>,
    pub categories: Option<String>,
    pub busy_status: BusyStatus,
    pub recurrence_state: RecurrenceState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub subject: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location: String,
    pub body: String,
    pub categories: String,
    pub busy_status: BusyStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemClass {
    Mail,
    MeetingRequest,
    Receipt,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxItem {
    pub class: ItemClass,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub received_time: NaiveDateTime,
    pub sender: Option<String>,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub cc: String,
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn it_renders_the_store_filter_expression() {
        let restriction = CalendarRestriction {
            start: at(17, 0, 0),
            end: at(18, 13, 30),
            include_recurrences: true,
            sort_by_start: true,
        };
        assert_eq!(
            restriction.filter_expression(),
            "[Start] >= '01/17/2025 12:00 AM' AND [End] <= '01/18/2025 01:30 PM'"
        );
    }

    #[test]
    fn it_admits_only_fully_contained_ranges() {
        let restriction = CalendarRestriction {
            start: at(17, 0, 0),
            end: at(18, 0, 0),
            include_recurrences: true,
            sort_by_start: true,
        };
        assert!(restriction.admits(at(17, 9, 0), at(17, 10, 0)));
        assert!(restriction.admits(at(17, 23, 0), at(18, 0, 0)));
        assert!(!restriction.admits(at(16, 23, 0), at(17, 1, 0)));
        assert!(!restriction.admits(at(17, 23, 0), at(18, 1, 0)));
    }

    #[test]
    fn it_converts_busy_status_codes() {
        assert_eq!(BusyStatus::try_from(0), Ok(BusyStatus::Free));
        assert_eq!(BusyStatus::try_from(3), Ok(BusyStatus::OutOfOffice));
        assert_eq!(BusyStatus::try_from(7), Err(7));
        assert_eq!(BusyStatus::default(), BusyStatus::Busy);
    }
}
