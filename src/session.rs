//! Scoped access to the store for a single tool invocation.
//!
//! [`Session::open`] connects and creates the scratch draft that
//! recipient resolution needs. The session is closed exactly once:
//! explicitly through [`Session::close`] or, on any other exit path
//! (early return, panic), by `Drop`. Cleanup failures are logged and
//! never replace the outcome of the work that ran inside the session.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::store::{MailboxStore, Recipient, ScratchItem, StoreConnection, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("mail store session unavailable: {0}")]
    Unavailable(#[source] StoreError),
    #[error("timed out waiting for the mail store after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("mail store call aborted: {0}")]
    Aborted(String),
}

pub struct Session {
    connection: Box<dyn StoreConnection>,
    scratch: Option<ScratchItem>,
    closed: bool,
}

impl Session {
    pub fn open(store: &dyn MailboxStore) -> Result<Self, SessionError> {
        let mut connection = store.connect().map_err(SessionError::Unavailable)?;
        let scratch = match connection.create_scratch_item() {
            Ok(item) => item,
            Err(e) => {
                tracing::error!("Failed to create scratch item: {}", e);
                release(connection.as_mut(), None);
                return Err(SessionError::Unavailable(e));
            }
        };
        tracing::debug!("Session opened with scratch item {}", scratch.id);

        Ok(Self {
            connection,
            scratch: Some(scratch),
            closed: false,
        })
    }

    pub fn store(&mut self) -> &mut dyn StoreConnection {
        self.connection.as_mut()
    }

    /// Resolve a name against the scratch item's recipient list.
    pub fn resolve_recipient(&mut self, query: &str) -> Result<Option<Recipient>, StoreError> {
        let scratch = self
            .scratch
            .as_ref()
            .ok_or_else(|| StoreError::Backend(String::from("scratch item already released")))?;
        self.connection.resolve_recipient(scratch, query)
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        release(self.connection.as_mut(), self.scratch.take());
        tracing::debug!("Session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Tolerates partially opened sessions: whatever was acquired is released.
fn release(connection: &mut dyn StoreConnection, scratch: Option<ScratchItem>) {
    if let Some(item) = scratch
        && let Err(e) = connection.discard_scratch_item(item)
    {
        tracing::error!("Error discarding scratch item: {}", e);
    }
    if let Err(e) = connection.disconnect() {
        tracing::error!("Error during session cleanup: {}", e);
    }
}

/// Run `work` on a blocking thread inside a fresh session. The session
/// is released when `work` finishes even if the caller stopped waiting
/// because `timeout` elapsed.
pub async fn run_in_session<T, F>(
    store: Arc<dyn MailboxStore>,
    timeout: Option<Duration>,
    work: F,
) -> Result<T, SessionError>
where
    F: FnOnce(&mut Session) -> T + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || -> Result<T, SessionError> {
        let mut session = Session::open(store.as_ref())?;
        let out = work(&mut session);
        session.close();
        Ok(out)
    });

    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| SessionError::TimedOut(limit))?,
        None => task.await,
    };
    joined.map_err(|e| SessionError::Aborted(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{InMemoryStore, Mailbox, StoreFaults};

    fn store_with(faults: StoreFaults) -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new(Mailbox::default()).with_faults(faults))
    }

    #[test]
    fn it_releases_everything_on_close() {
        let store = store_with(StoreFaults::default());
        let session = Session::open(store.as_ref()).unwrap();
        session.close();

        let stats = store.stats();
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.scratch_created, 1);
        assert_eq!(stats.scratch_discarded, 1);
        assert_eq!(stats.disconnects, 1);
    }

    #[test]
    fn it_releases_on_drop() {
        let store = store_with(StoreFaults::default());
        {
            let _session = Session::open(store.as_ref()).unwrap();
        }
        assert_eq!(store.stats().disconnects, 1);
        assert_eq!(store.stats().scratch_discarded, 1);
    }

    #[test]
    fn it_reports_a_refused_connection() {
        let store = store_with(StoreFaults {
            refuse_connect: true,
            ..Default::default()
        });
        let result = Session::open(store.as_ref());
        assert!(matches!(result, Err(SessionError::Unavailable(_))));
        assert_eq!(store.stats().disconnects, 0);
    }

    #[test]
    fn it_disconnects_when_the_scratch_item_fails() {
        let store = store_with(StoreFaults {
            refuse_scratch_item: true,
            ..Default::default()
        });
        let result = Session::open(store.as_ref());
        assert!(matches!(result, Err(SessionError::Unavailable(_))));

        let stats = store.stats();
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.scratch_discarded, 0);
        assert_eq!(stats.disconnects, 1);
    }

    #[test]
    fn it_swallows_cleanup_failures() {
        let store = store_with(StoreFaults {
            fail_disconnect: true,
            ..Default::default()
        });
        let session = Session::open(store.as_ref()).unwrap();
        session.close();
        assert_eq!(store.stats().disconnects, 1);
    }

    #[tokio::test]
    async fn it_closes_once_after_the_work_returns() {
        let store = store_with(StoreFaults::default());
        let out = run_in_session(store.clone(), None, |_session| 42)
            .await
            .unwrap();
        assert_eq!(out, 42);
        assert_eq!(store.stats().connects, 1);
        assert_eq!(store.stats().disconnects, 1);
    }

    #[tokio::test]
    async fn it_closes_when_the_work_panics() {
        let store = store_with(StoreFaults::default());
        let result: Result<(), SessionError> =
            run_in_session(store.clone(), None, |_session| panic!("boom")).await;
        assert!(matches!(result, Err(SessionError::Aborted(_))));
        assert_eq!(store.stats().disconnects, 1);
    }

    #[tokio::test]
    async fn it_times_out_but_still_releases() {
        let store = store_with(StoreFaults::default());
        let result = run_in_session(
            store.clone(),
            Some(Duration::from_millis(10)),
            |_session| std::thread::sleep(Duration::from_millis(200)),
        )
        .await;
        assert!(matches!(result, Err(SessionError::TimedOut(_))));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.stats().disconnects, 1);
    }
}
