use crate::error::{Error, Result};
use google_gmail1::api::BatchModifyMessagesRequest;
use std::fmt;

/// System label Gmail uses to flag unread messages.
pub const UNREAD_LABEL: &str = "UNREAD";

pub const ACTION_NAMES: &[&str] = &["mark_as_read", "mark_as_unread", "move"];

/// State change applied in bulk to matched messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    MarkAsRead,
    MarkAsUnread,
    /// Adds the label with this id
    Move(String),
}

impl Action {
    /// Builds an action from its rule-file name and parameter. `move` requires
    /// a non-empty destination; the other kinds ignore `param`.
    pub fn new(name: &str, param: Option<&str>) -> Result<Self> {
        match name {
            "mark_as_read" => Ok(Action::MarkAsRead),
            "mark_as_unread" => Ok(Action::MarkAsUnread),
            "move" => match param.map(str::trim) {
                Some(label) if !label.is_empty() => Ok(Action::Move(label.to_string())),
                _ => Err(Error::MissingMoveDestination),
            },
            _ => Err(Error::UnknownAction(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::MarkAsRead => "mark_as_read",
            Action::MarkAsUnread => "mark_as_unread",
            Action::Move(_) => "move",
        }
    }

    /// batchModify request for one chunk of message ids.
    pub fn request(&self, ids: &[String]) -> BatchModifyMessagesRequest {
        let ids = Some(ids.to_vec());
        match self {
            Action::MarkAsRead => BatchModifyMessagesRequest {
                ids,
                add_label_ids: None,
                remove_label_ids: Some(vec![UNREAD_LABEL.to_string()]),
            },
            Action::MarkAsUnread => BatchModifyMessagesRequest {
                ids,
                add_label_ids: Some(vec![UNREAD_LABEL.to_string()]),
                remove_label_ids: None,
            },
            Action::Move(label) => BatchModifyMessagesRequest {
                ids,
                add_label_ids: Some(vec![label.clone()]),
                remove_label_ids: None,
            },
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move(label) => write!(f, "move to {}", label),
            other => f.write_str(other.name()),
        }
    }
}
