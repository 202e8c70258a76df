use std::sync::Arc;
use std::time::Duration;

use crate::core::AppConfig;
use crate::openai::BoxedToolCall;
use crate::session::{Session, SessionError, run_in_session};
use crate::store::MailboxStore;

pub mod directory;
pub use directory::DirectorySearchTool;

pub mod calendar;
pub use calendar::{AddAppointmentTool, CalendarTool};

pub mod email;
pub use email::{EmailSearchTool, SendEmailTool};

/// Store handle shared by the tools. Every call opens its own session.
#[derive(Clone)]
pub struct MailboxAccess {
    store: Arc<dyn MailboxStore>,
    timeout: Option<Duration>,
}

impl MailboxAccess {
    pub fn new(store: Arc<dyn MailboxStore>, timeout: Option<Duration>) -> Self {
        Self { store, timeout }
    }

    pub async fn run<T, F>(&self, work: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut Session) -> T + Send + 'static,
        T: Send + 'static,
    {
        run_in_session(Arc::clone(&self.store), self.timeout, work).await
    }
}

/// Every tool, configured from `config`.
pub fn all(store: Arc<dyn MailboxStore>, config: &AppConfig) -> Vec<BoxedToolCall> {
    let access = MailboxAccess::new(store, config.call_timeout);
    vec![
        Box::new(DirectorySearchTool::outlook(access.clone())),
        Box::new(DirectorySearchTool::contact(access.clone())),
        Box::new(EmailSearchTool::new(access.clone())),
        Box::new(CalendarTool::new(access.clone())),
        Box::new(AddAppointmentTool::new(
            access.clone(),
            config.tz_offset_hours,
        )),
        Box::new(SendEmailTool::new(access, config.confirm_before_send)),
    ]
}
