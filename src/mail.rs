//! Keyword search over the inbox for a single received date, plus
//! message dispatch.

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::session::Session;
use crate::store::{InboxItem, ItemClass, OutgoingMessage, StoreError};

pub const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailEntry {
    pub subject: String,
    pub received_time: NaiveDateTime,
    pub sender: String,
    pub recipients: Vec<String>,
    pub body_preview: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("sending was cancelled at confirmation")]
    Cancelled,
}

/// Mail messages received on `target_date` whose subject or body
/// contains `keyword`, ignoring case. Results keep the store's order.
pub fn search(
    session: &mut Session,
    target_date: NaiveDate,
    keyword: &str,
) -> Result<Vec<MailEntry>, MailError> {
    let needle = keyword.to_lowercase();
    let items = session.store().scan_inbox(target_date)?;

    let mut found = Vec::new();
    for item in items {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Error while processing mail item: {}", e);
                continue;
            }
        };
        if item.class != ItemClass::Mail {
            continue;
        }
        if item.received_time.date() != target_date {
            continue;
        }
        if matches_keyword(&item, &needle) {
            found.push(entry(item));
        }
    }
    Ok(found)
}

fn matches_keyword(item: &InboxItem, needle: &str) -> bool {
    let subject = item.subject.as_deref().unwrap_or_default().to_lowercase();
    let body = item.body.as_deref().unwrap_or_default().to_lowercase();
    subject.contains(needle) || body.contains(needle)
}

fn entry(item: InboxItem) -> MailEntry {
    MailEntry {
        body_preview: preview(item.body.as_deref().unwrap_or_default(), PREVIEW_CHARS),
        subject: item.subject.unwrap_or_default(),
        received_time: item.received_time,
        sender: item.sender.unwrap_or_default(),
        recipients: item.recipients,
    }
}

/// Trim, put each line break on a single space and cut to `limit`
/// characters, marking the cut with `...`.
pub fn preview(body: &str, limit: usize) -> String {
    let flattened = body
        .trim()
        .replace("\r\n", " ")
        .replace(['\r', '\n'], " ");
    truncate(&flattened, limit)
}

pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Compose and send a plain-text message. With `confirm` set the store
/// first shows the message to the user, who may cancel.
pub fn send(
    session: &mut Session,
    message: &OutgoingMessage,
    confirm: bool,
) -> Result<(), MailError> {
    if confirm && !session.store().confirm_message(message)? {
        tracing::info!("Message to {} cancelled at confirmation", message.to);
        return Err(MailError::Cancelled);
    }
    session.store().send_message(message)?;
    tracing::info!("Message sent to {}", message.to);
    Ok(())
}
