//! Calendar enumeration over a time window and creation of new entries.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::session::Session;
use crate::store::{
    BusyStatus, CalendarRestriction, NewAppointment, RecurrenceState, StoreError, StoredAppointment,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub subject: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location: String,
    pub body: String,
    pub categories: String,
    pub busy_status: BusyStatus,
}

impl From<StoredAppointment> for CalendarEntry {
    fn from(appointment: StoredAppointment) -> Self {
        Self {
            subject: appointment.subject.unwrap_or_default(),
            start: appointment.start,
            end: appointment.end,
            location: appointment.location.unwrap_or_default(),
            body: appointment.body.unwrap_or_default(),
            categories: appointment.categories.unwrap_or_default(),
            busy_status: appointment.busy_status,
        }
    }
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Entries that lie entirely inside `[window_start, window_end)`,
/// ordered by start. Recurring series are expanded by the store and
/// only concrete occurrences are returned.
pub fn list(
    session: &mut Session,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Result<Vec<CalendarEntry>, CalendarError> {
    let restriction = CalendarRestriction {
        start: window_start,
        end: window_end,
        include_recurrences: true,
        sort_by_start: true,
    };
    tracing::debug!("Calendar restriction: {}", restriction.filter_expression());

    let items = session.store().list_calendar(&restriction)?;

    let mut entries: Vec<CalendarEntry> = items
        .into_iter()
        .filter_map(|item| match item {
            Ok(appointment) => Some(appointment),
            Err(e) => {
                tracing::warn!("Skipping unreadable calendar entry: {}", e);
                None
            }
        })
        .filter(|appointment| {
            if appointment.recurrence_state == RecurrenceState::Master {
                tracing::warn!(
                    "Store returned an unexpanded recurring series: {:?}",
                    appointment.subject
                );
                return false;
            }
            restriction.admits(appointment.start, appointment.end)
        })
        .map(CalendarEntry::from)
        .collect();

    entries.sort_by_key(|e| e.start);
    Ok(entries)
}

/// Categorized entries and entries with a non-default availability
/// are sent out as meeting invitations after they are saved.
pub fn must_notify(entry: &NewAppointment) -> bool {
    !entry.categories.is_empty() || entry.busy_status != BusyStatus::Busy
}

/// Save `entry`. Returns `false` on any failure; the cause is logged.
pub fn create(session: &mut Session, entry: &NewAppointment) -> bool {
    let id = match session.store().create_calendar_entry(entry) {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("Error adding appointment: {}", e);
            return false;
        }
    };

    if must_notify(entry)
        && let Err(e) = session.store().send_meeting_request(&id)
    {
        tracing::error!("Error sending meeting request for {}: {}", id.0, e);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{
        CalendarRecord, InMemoryStore, Mailbox, Recurrence, RecurrenceUnit, StoreFaults,
    };
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn record(subject: &str, start: NaiveDateTime, end: NaiveDateTime) -> CalendarRecord {
        CalendarRecord {
            id: None,
            subject: Some(subject.to_string()),
            start,
            end,
            location: None,
            body: None,
            categories: None,
            busy_status: BusyStatus::Busy,
            recurrence: None,
            meeting_sent: false,
            unreadable: false,
        }
    }

    fn new_appointment(categories: &str, busy_status: BusyStatus) -> NewAppointment {
        NewAppointment {
            subject: String::from("Sync"),
            start: at(17, 18),
            end: at(17, 19),
            location: String::new(),
            body: String::new(),
            categories: categories.to_string(),
            busy_status,
        }
    }

    #[test]
    fn it_keeps_only_contained_entries_in_start_order() {
        let store = InMemoryStore::new(Mailbox {
            calendar: vec![
                record("Late", at(17, 15), at(17, 16)),
                record("Early", at(17, 9), at(17, 10)),
                record("Spans start", at(16, 23), at(17, 1)),
                record("Spans end", at(17, 23), at(18, 1)),
                record("Next day", at(18, 9), at(18, 10)),
            ],
            ..Default::default()
        });
        let mut session = Session::open(&store).unwrap();
        let entries = list(&mut session, at(17, 0), at(18, 0)).unwrap();

        let subjects: Vec<&str> = entries.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Early", "Late"]);
        for entry in &entries {
            assert!(entry.start >= at(17, 0) && entry.end <= at(18, 0));
        }
    }

    #[test]
    fn it_returns_only_in_window_occurrences_of_a_series() {
        let mut weekly = record("Weekly review", at(3, 14), at(3, 15));
        weekly.recurrence = Some(Recurrence {
            every: RecurrenceUnit::Weekly,
            interval: 1,
            occurrences: 4,
        });
        let store = InMemoryStore::new(Mailbox {
            calendar: vec![weekly],
            ..Default::default()
        });
        let mut session = Session::open(&store).unwrap();
        let entries = list(&mut session, at(15, 0), at(22, 0)).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start, at(17, 14));
    }

    #[test]
    fn it_never_returns_an_unexpanded_series() {
        let mut weekly = record("Weekly review", at(17, 14), at(17, 15));
        weekly.recurrence = Some(Recurrence {
            every: RecurrenceUnit::Weekly,
            interval: 1,
            occurrences: 4,
        });
        let store = InMemoryStore::new(Mailbox {
            calendar: vec![weekly, record("Planning", at(17, 9), at(17, 10))],
            ..Default::default()
        })
        .with_faults(StoreFaults {
            ignore_recurrence_expansion: true,
            ..Default::default()
        });
        let mut session = Session::open(&store).unwrap();
        let entries = list(&mut session, at(17, 0), at(18, 0)).unwrap();

        let subjects: Vec<&str> = entries.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Planning"]);
    }

    #[test]
    fn it_skips_unreadable_entries() {
        let mut broken = record("Broken", at(17, 11), at(17, 12));
        broken.unreadable = true;
        let store = InMemoryStore::new(Mailbox {
            calendar: vec![broken, record("Fine", at(17, 9), at(17, 10))],
            ..Default::default()
        });
        let mut session = Session::open(&store).unwrap();
        let entries = list(&mut session, at(17, 0), at(18, 0)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].subject, "Fine");
    }

    #[test]
    fn it_returns_an_empty_list_when_nothing_matches() {
        let store = InMemoryStore::new(Mailbox::default());
        let mut session = Session::open(&store).unwrap();
        assert!(list(&mut session, at(17, 0), at(18, 0)).unwrap().is_empty());
    }

    #[test]
    fn it_decides_when_to_notify() {
        assert!(!must_notify(&new_appointment("", BusyStatus::Busy)));
        assert!(must_notify(&new_appointment("Customer", BusyStatus::Busy)));
        assert!(must_notify(&new_appointment("", BusyStatus::Tentative)));
    }

    #[test]
    fn it_saves_and_sends_invitations_when_required() {
        let store = InMemoryStore::new(Mailbox::default());
        let mut session = Session::open(&store).unwrap();
        assert!(create(&mut session, &new_appointment("", BusyStatus::Busy)));
        assert!(create(&mut session, &new_appointment("", BusyStatus::OutOfOffice)));
        session.close();

        let calendar = store.snapshot().unwrap().calendar;
        assert_eq!(calendar.len(), 2);
        assert!(!calendar[0].meeting_sent);
        assert!(calendar[1].meeting_sent);
    }

    #[test]
    fn it_returns_false_when_the_store_fails() {
        let store = InMemoryStore::new(Mailbox::default()).with_faults(StoreFaults {
            fail_save: true,
            ..Default::default()
        });
        let mut session = Session::open(&store).unwrap();
        assert!(!create(&mut session, &new_appointment("", BusyStatus::Busy)));

        let store = InMemoryStore::new(Mailbox::default()).with_faults(StoreFaults {
            fail_meeting_request: true,
            ..Default::default()
        });
        let mut session = Session::open(&store).unwrap();
        assert!(create(&mut session, &new_appointment("", BusyStatus::Busy)));
        assert!(!create(&mut session, &new_appointment("Customer", BusyStatus::Busy)));
    }
}
