//! Reflog entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wrgl_types::ObjectSum;

/// One recorded movement of a ref.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflog {
    /// Previous target, `None` when the ref was created.
    pub old_oid: Option<ObjectSum>,
    pub new_oid: ObjectSum,
    pub author_name: String,
    pub author_email: String,
    pub time: DateTime<Utc>,
    /// What moved the ref: `commit`, `fetch`, `receive-pack`, ...
    pub action: String,
    pub message: String,
}

/// Who is moving a ref and why; the store fills in the old/new targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefChange {
    pub author_name: String,
    pub author_email: String,
    pub action: String,
    pub message: String,
}

impl RefChange {
    pub fn new(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            author_name: String::new(),
            author_email: String::new(),
            action: action.into(),
            message: message.into(),
        }
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    pub(crate) fn into_reflog(self, old: Option<ObjectSum>, new: ObjectSum) -> Reflog {
        Reflog {
            old_oid: old,
            new_oid: new,
            author_name: self.author_name,
            author_email: self.author_email,
            time: Utc::now(),
            action: self.action,
            message: self.message,
        }
    }
}
