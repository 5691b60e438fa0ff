//! Shared types for the view state and its callers.

use serde::{Deserialize, Serialize};
use stockroom_core::NoticeId;

/// Connectivity state of the client, as observed by the last fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// Last fetch reached the store.
    #[default]
    Online,
    /// Last fetch failed; the list shown is empty rather than stale.
    Offline,
}

/// How a delete request is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Remove one record optimistically; undoable until the grace period ends.
    #[default]
    Single,
    /// Remove every record sharing the clicked item's name and category, at once.
    Group,
}

/// Whether a saved draft created a record or updated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient banner message; expires after the configured notice lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: NoticeId,
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(id: NoticeId, message: impl Into<String>) -> Self {
        Self {
            id,
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(id: NoticeId, message: impl Into<String>) -> Self {
        Self {
            id,
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
