//! Resolve a free-text name or address to a directory user.

use thiserror::Error;

use crate::session::Session;
use crate::store::{DirectoryProfile, StoreError};
use crate::text::normalize;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub manager: Option<String>,
}

impl From<DirectoryProfile> for UserInfo {
    fn from(profile: DirectoryProfile) -> Self {
        Self {
            name: profile.name,
            email: present(profile.primary_smtp_address),
            phone: present(profile.business_telephone_number),
            department: normalize(profile.department.as_deref()),
            job_title: normalize(profile.job_title.as_deref()),
            company: normalize(profile.company_name.as_deref()),
            location: normalize(profile.office_location.as_deref()),
            manager: normalize(profile.manager.as_deref()),
        }
    }
}

// Empty strings from the store mean the attribute is not set.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("User not found: {0}")]
    NotFound(String),
    #[error("Could not retrieve user information: {0}")]
    DetailsUnavailable(String),
    #[error("directory unavailable: {0}")]
    Unavailable(#[source] StoreError),
}

/// Look `query` up in the directory. Every call goes to the store;
/// nothing is cached between calls.
pub fn resolve(session: &mut Session, query: &str) -> Result<UserInfo, DirectoryError> {
    tracing::info!("Searching for user: {}", query);

    let recipient = session
        .resolve_recipient(query)
        .map_err(DirectoryError::Unavailable)?
        .ok_or_else(|| {
            tracing::warn!("Could not resolve user: {}", query);
            DirectoryError::NotFound(query.to_string())
        })?;

    tracing::debug!("Resolved {} to {}", query, recipient.display_name);

    let profile = session
        .store()
        .directory_profile(&recipient)
        .map_err(DirectoryError::Unavailable)?
        .ok_or_else(|| {
            tracing::warn!("Could not get directory details for: {}", query);
            DirectoryError::DetailsUnavailable(query.to_string())
        })?;

    tracing::debug!("Raw department value: {:?}", profile.department);
    Ok(UserInfo::from(profile))
}
