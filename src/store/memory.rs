//! In-memory [`MailboxStore`] backed by a [`Mailbox`] value.
//!
//! The binary loads it from a JSON fixture; tests seed it directly and
//! use [`StoreFaults`] and [`StoreStats`] to exercise failure paths and
//! check that every connection is released.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{
    AddressKind, AppointmentId, BusyStatus, CalendarRestriction, DirectoryProfile, InboxItem,
    ItemClass, ItemRead, MailboxStore, NewAppointment, OutgoingMessage, Recipient,
    RecurrenceState, ScratchItem, StoreConnection, StoreError, StoredAppointment,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Mailbox {
    pub directory: Vec<DirectoryRecord>,
    pub calendar: Vec<CalendarRecord>,
    pub inbox: Vec<InboxRecord>,
    pub sent: Vec<OutgoingMessage>,
    /// Answer given when a message is shown for confirmation.
    pub approve_sends: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub display_name: String,
    pub address: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default = "default_address_kind")]
    pub kind: AddressKind,
    #[serde(default)]
    pub profile: Option<DirectoryProfile>,
}

fn default_address_kind() -> AddressKind {
    AddressKind::DirectoryUser
}

impl DirectoryRecord {
    fn matches_exactly(&self, needle: &str) -> bool {
        self.display_name.to_lowercase() == needle
            || self.address.to_lowercase() == needle
            || self.aliases.iter().any(|a| a.to_lowercase() == needle)
    }

    fn matches_partially(&self, needle: &str) -> bool {
        self.display_name.to_lowercase().contains(needle)
            || self.address.to_lowercase().contains(needle)
    }

    fn recipient(&self) -> Recipient {
        Recipient {
            display_name: self.display_name.clone(),
            address: self.address.clone(),
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceUnit {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recurrence {
    pub every: RecurrenceUnit,
    #[serde(default = "default_interval")]
    pub interval: u32,
    pub occurrences: u32,
}

fn default_interval() -> u32 {
    1
}

impl Recurrence {
    fn offset(&self, n: u32) -> Duration {
        let steps = i64::from(self.interval) * i64::from(n);
        match self.every {
            RecurrenceUnit::Daily => Duration::days(steps),
            RecurrenceUnit::Weekly => Duration::weeks(steps),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub busy_status: BusyStatus,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub meeting_sent: bool,
    /// Simulates an entry whose properties fail to load.
    #[serde(default)]
    pub unreadable: bool,
}

impl CalendarRecord {
    fn appointment(&self, offset: Duration, state: RecurrenceState) -> StoredAppointment {
        StoredAppointment {
            subject: self.subject.clone(),
            start: self.start + offset,
            end: self.end + offset,
            location: self.location.clone(),
            body: self.body.clone(),
            categories: self.categories.clone(),
            busy_status: self.busy_status,
            recurrence_state: state,
        }
    }

    fn instances(&self, include_recurrences: bool) -> Vec<StoredAppointment> {
        match &self.recurrence {
            None => vec![self.appointment(Duration::zero(), RecurrenceState::NotRecurring)],
            Some(_) if !include_recurrences => {
                vec![self.appointment(Duration::zero(), RecurrenceState::Master)]
            }
            Some(rule) => (0..rule.occurrences)
                .map(|n| self.appointment(rule.offset(n), RecurrenceState::Occurrence))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxRecord {
    #[serde(default = "default_item_class")]
    pub class: ItemClass,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub received_time: NaiveDateTime,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Simulates an item whose properties fail to load.
    #[serde(default)]
    pub unreadable: bool,
}

fn default_item_class() -> ItemClass {
    ItemClass::Mail
}

/// Switches for making individual store operations fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreFaults {
    pub refuse_connect: bool,
    pub refuse_scratch_item: bool,
    pub fail_disconnect: bool,
    pub fail_save: bool,
    pub fail_meeting_request: bool,
    pub fail_send: bool,
    pub fail_resolve: bool,
    /// Hand back recurring series unexpanded even when expansion is
    /// requested.
    pub ignore_recurrence_expansion: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub connects: usize,
    pub disconnects: usize,
    pub scratch_created: usize,
    pub scratch_discarded: usize,
    pub confirmations: usize,
}

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    scratch_created: AtomicUsize,
    scratch_discarded: AtomicUsize,
    confirmations: AtomicUsize,
    next_id: AtomicUsize,
}

pub struct InMemoryStore {
    mailbox: Arc<Mutex<Mailbox>>,
    faults: StoreFaults,
    counters: Arc<Counters>,
}

impl InMemoryStore {
    pub fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox: Arc::new(Mutex::new(mailbox)),
            faults: StoreFaults::default(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_faults(mut self, faults: StoreFaults) -> Self {
        self.faults = faults;
        self
    }

    /// Load a mailbox from a JSON fixture file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read mailbox fixture {}", path.display()))?;
        let mailbox: Mailbox = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse mailbox fixture {}", path.display()))?;
        Ok(Self::new(mailbox))
    }

    /// Copy of the current mailbox contents.
    pub fn snapshot(&self) -> Result<Mailbox, StoreError> {
        Ok(lock(&self.mailbox)?.clone())
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            connects: self.counters.connects.load(Ordering::SeqCst),
            disconnects: self.counters.disconnects.load(Ordering::SeqCst),
            scratch_created: self.counters.scratch_created.load(Ordering::SeqCst),
            scratch_discarded: self.counters.scratch_discarded.load(Ordering::SeqCst),
            confirmations: self.counters.confirmations.load(Ordering::SeqCst),
        }
    }
}

impl MailboxStore for InMemoryStore {
    fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        if self.faults.refuse_connect {
            return Err(StoreError::Unreachable(String::from(
                "mail client is not running",
            )));
        }
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            mailbox: Arc::clone(&self.mailbox),
            faults: self.faults,
            counters: Arc::clone(&self.counters),
        }))
    }
}

fn lock(mailbox: &Mutex<Mailbox>) -> Result<MutexGuard<'_, Mailbox>, StoreError> {
    mailbox
        .lock()
        .map_err(|_| StoreError::Backend(String::from("mailbox lock poisoned")))
}

struct MemoryConnection {
    mailbox: Arc<Mutex<Mailbox>>,
    faults: StoreFaults,
    counters: Arc<Counters>,
}

impl MemoryConnection {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counters.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}-{n}")
    }
}

impl StoreConnection for MemoryConnection {
    fn create_scratch_item(&mut self) -> Result<ScratchItem, StoreError> {
        if self.faults.refuse_scratch_item {
            return Err(StoreError::Rejected(String::from(
                "could not create a draft item",
            )));
        }
        self.counters.scratch_created.fetch_add(1, Ordering::SeqCst);
        Ok(ScratchItem {
            id: self.next_id("scratch"),
        })
    }

    fn discard_scratch_item(&mut self, _item: ScratchItem) -> Result<(), StoreError> {
        self.counters
            .scratch_discarded
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resolve_recipient(
        &mut self,
        _scratch: &ScratchItem,
        query: &str,
    ) -> Result<Option<Recipient>, StoreError> {
        if self.faults.fail_resolve {
            return Err(StoreError::Backend(String::from("address book is offline")));
        }
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }
        let mailbox = lock(&self.mailbox)?;

        let exact: Vec<&DirectoryRecord> = mailbox
            .directory
            .iter()
            .filter(|r| r.matches_exactly(&needle))
            .collect();
        let candidates = if exact.is_empty() {
            mailbox
                .directory
                .iter()
                .filter(|r| r.matches_partially(&needle))
                .collect()
        } else {
            exact
        };

        match candidates.as_slice() {
            [only] => Ok(Some(only.recipient())),
            _ => Ok(None),
        }
    }

    fn directory_profile(
        &mut self,
        recipient: &Recipient,
    ) -> Result<Option<DirectoryProfile>, StoreError> {
        if recipient.kind != AddressKind::DirectoryUser {
            return Ok(None);
        }
        let mailbox = lock(&self.mailbox)?;
        Ok(mailbox
            .directory
            .iter()
            .find(|r| r.address == recipient.address)
            .and_then(|r| r.profile.clone()))
    }

    fn list_calendar(
        &mut self,
        restriction: &CalendarRestriction,
    ) -> Result<Vec<ItemRead<StoredAppointment>>, StoreError> {
        tracing::debug!("Restricting calendar: {}", restriction.filter_expression());
        let mailbox = lock(&self.mailbox)?;
        let expand = restriction.include_recurrences && !self.faults.ignore_recurrence_expansion;

        let mut readable = Vec::new();
        let mut unreadable = Vec::new();
        for (index, record) in mailbox.calendar.iter().enumerate() {
            if record.unreadable {
                unreadable.push(Err(StoreError::ItemUnreadable(format!(
                    "calendar entry {index}"
                ))));
                continue;
            }
            readable.extend(
                record
                    .instances(expand)
                    .into_iter()
                    .filter(|a| restriction.admits(a.start, a.end)),
            );
        }
        if restriction.sort_by_start {
            readable.sort_by_key(|a| a.start);
        }

        Ok(unreadable
            .into_iter()
            .chain(readable.into_iter().map(Ok))
            .collect())
    }

    fn create_calendar_entry(
        &mut self,
        entry: &NewAppointment,
    ) -> Result<AppointmentId, StoreError> {
        if self.faults.fail_save {
            return Err(StoreError::Rejected(String::from(
                "calendar folder is read-only",
            )));
        }
        let id = self.next_id("appointment");
        let mut mailbox = lock(&self.mailbox)?;
        mailbox.calendar.push(CalendarRecord {
            id: Some(id.clone()),
            subject: Some(entry.subject.clone()),
            start: entry.start,
            end: entry.end,
            location: Some(entry.location.clone()),
            body: Some(entry.body.clone()),
            categories: Some(entry.categories.clone()),
            busy_status: entry.busy_status,
            recurrence: None,
            meeting_sent: false,
            unreadable: false,
        });
        Ok(AppointmentId(id))
    }

    fn send_meeting_request(&mut self, id: &AppointmentId) -> Result<(), StoreError> {
        if self.faults.fail_meeting_request {
            return Err(StoreError::Backend(String::from(
                "meeting request could not be sent",
            )));
        }
        let mut mailbox = lock(&self.mailbox)?;
        let record = mailbox
            .calendar
            .iter_mut()
            .find(|r| r.id.as_deref() == Some(id.0.as_str()))
            .ok_or_else(|| StoreError::Backend(format!("no calendar entry {}", id.0)))?;
        record.meeting_sent = true;
        Ok(())
    }

    // Full scan in natural order, like the desktop client's Items collection.
    fn scan_inbox(
        &mut self,
        _received_on: NaiveDate,
    ) -> Result<Vec<ItemRead<InboxItem>>, StoreError> {
        let mailbox = lock(&self.mailbox)?;
        Ok(mailbox
            .inbox
            .iter()
            .enumerate()
            .map(|(index, record)| {
                if record.unreadable {
                    return Err(StoreError::ItemUnreadable(format!("inbox item {index}")));
                }
                Ok(InboxItem {
                    class: record.class,
                    subject: record.subject.clone(),
                    body: record.body.clone(),
                    received_time: record.received_time,
                    sender: record.sender.clone(),
                    recipients: record.recipients.clone(),
                })
            })
            .collect())
    }

    fn confirm_message(&mut self, _message: &OutgoingMessage) -> Result<bool, StoreError> {
        self.counters.confirmations.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.mailbox)?.approve_sends)
    }

    fn send_message(&mut self, message: &OutgoingMessage) -> Result<(), StoreError> {
        if self.faults.fail_send {
            return Err(StoreError::Rejected(String::from(
                "outbox is not available",
            )));
        }
        lock(&self.mailbox)?.sent.push(message.clone());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), StoreError> {
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_disconnect {
            return Err(StoreError::Backend(String::from(
                "connection context already torn down",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn person(name: &str, address: &str) -> DirectoryRecord {
        DirectoryRecord {
            display_name: name.to_string(),
            address: address.to_string(),
            aliases: vec![],
            kind: AddressKind::DirectoryUser,
            profile: None,
        }
    }

    fn standup() -> CalendarRecord {
        CalendarRecord {
            id: None,
            subject: Some(String::from("Standup")),
            start: at(13, 9),
            end: at(13, 10),
            location: None,
            body: None,
            categories: None,
            busy_status: BusyStatus::Busy,
            recurrence: Some(Recurrence {
                every: RecurrenceUnit::Daily,
                interval: 2,
                occurrences: 4,
            }),
            meeting_sent: false,
            unreadable: false,
        }
    }

    #[test]
    fn it_resolves_unique_matches_only() {
        let store = InMemoryStore::new(Mailbox {
            directory: vec![
                person("Taro Yamada", "taro.yamada@example.co.jp"),
                person("Hanako Yamada", "hanako.yamada@example.co.jp"),
            ],
            ..Default::default()
        });
        let mut conn = store.connect().unwrap();
        let scratch = conn.create_scratch_item().unwrap();

        let found = conn.resolve_recipient(&scratch, "taro").unwrap().unwrap();
        assert_eq!(found.address, "taro.yamada@example.co.jp");

        let exact = conn
            .resolve_recipient(&scratch, "HANAKO.YAMADA@example.co.jp")
            .unwrap();
        assert!(exact.is_some());

        assert!(conn.resolve_recipient(&scratch, "yamada").unwrap().is_none());
        assert!(conn.resolve_recipient(&scratch, "  ").unwrap().is_none());
    }

    #[test]
    fn it_expands_recurrences_only_when_asked() {
        let store = InMemoryStore::new(Mailbox {
            calendar: vec![standup()],
            ..Default::default()
        });
        let mut conn = store.connect().unwrap();
        let mut restriction = CalendarRestriction {
            start: at(1, 0),
            end: at(31, 0),
            include_recurrences: false,
            sort_by_start: true,
        };

        let masters = conn.list_calendar(&restriction).unwrap();
        assert_eq!(masters.len(), 1);
        assert_eq!(
            masters[0].as_ref().unwrap().recurrence_state,
            RecurrenceState::Master
        );

        restriction.include_recurrences = true;
        let starts: Vec<NaiveDateTime> = conn
            .list_calendar(&restriction)
            .unwrap()
            .into_iter()
            .map(|a| a.unwrap().start)
            .collect();
        assert_eq!(starts, vec![at(13, 9), at(15, 9), at(17, 9), at(19, 9)]);
    }

    #[test]
    fn it_loads_a_json_fixture() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{
                "directory": [{{"display_name": "Taro Yamada", "address": "taro@example.co.jp"}}],
                "calendar": [{{"subject": "Sync", "start": "2025-01-17T09:00:00", "end": "2025-01-17T10:00:00"}}],
                "inbox": [{{"subject": "Hello", "received_time": "2025-01-17T08:30:00"}}]
            }}"#
        )?;

        let store = InMemoryStore::from_path(file.path())?;
        let mailbox = store.snapshot()?;
        assert_eq!(mailbox.directory[0].kind, AddressKind::DirectoryUser);
        assert_eq!(mailbox.calendar[0].busy_status, BusyStatus::Busy);
        assert_eq!(mailbox.inbox[0].class, ItemClass::Mail);
        assert!(!mailbox.approve_sends);
        Ok(())
    }

    #[test]
    fn it_counts_connections() {
        let store = InMemoryStore::new(Mailbox::default());
        let mut conn = store.connect().unwrap();
        conn.disconnect().unwrap();
        assert_eq!(store.stats().connects, 1);
        assert_eq!(store.stats().disconnects, 1);

        let refusing = InMemoryStore::new(Mailbox::default()).with_faults(StoreFaults {
            refuse_connect: true,
            ..Default::default()
        });
        assert!(matches!(refusing.connect(), Err(StoreError::Unreachable(_))));
    }
}
