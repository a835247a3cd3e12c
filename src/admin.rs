use std::collections::HashMap;

use teloxide::types::UserId;
use thiserror::Error;

use crate::config::ButtonLabels;
use crate::group::{self, Group, GroupError};

/// What the next message of an administrator is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingAction {
    AddGroup,
    RemoveGroup,
    EditWelcome,
    EditButtons,
}

/// At most one pending action per administrator, consumed by their next
/// message whether or not that message is a valid payload.
#[derive(Debug, Default)]
pub struct AdminSessions {
    pending: HashMap<UserId, PendingAction>,
}

impl AdminSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever the admin was doing before.
    pub fn begin(&mut self, admin: UserId, action: PendingAction) {
        self.pending.insert(admin, action);
    }

    pub fn take(&mut self, admin: UserId) -> Option<PendingAction> {
        self.pending.remove(&admin)
    }

    pub fn pending(&self, admin: UserId) -> Option<PendingAction> {
        self.pending.get(&admin).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminEdit {
    AddGroup(Group),
    RemoveGroup(String),
    Welcome(String),
    Buttons(ButtonLabels),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("error while parsing arguments in posix-shell manner")]
    Quoting,
    #[error("expected {expected} arguments, found {found}")]
    ArgumentCount { expected: &'static str, found: usize },
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error("text is empty")]
    Empty,
    #[error("expected three comma-separated labels, found {0}")]
    ButtonCount(usize),
}

fn split_args(payload: &str) -> Result<Vec<String>, PayloadError> {
    shlex::split(payload).ok_or(PayloadError::Quoting)
}

/// `<chat> [link]`
pub fn parse_group(payload: &str) -> Result<Group, PayloadError> {
    let args = split_args(payload)?;
    match args.as_slice() {
        [chat] => Ok(Group::new(chat, None)?),
        [chat, link] => Ok(Group::new(chat, Some(link.as_str()))?),
        _ => Err(PayloadError::ArgumentCount {
            expected: "1 or 2",
            found: args.len(),
        }),
    }
}

/// `<chat>`
pub fn parse_chat(payload: &str) -> Result<String, PayloadError> {
    let args = split_args(payload)?;
    match args.as_slice() {
        [chat] => Ok(group::normalize_chat(chat)?),
        _ => Err(PayloadError::ArgumentCount {
            expected: "1",
            found: args.len(),
        }),
    }
}

pub fn parse_payload(action: PendingAction, payload: &str) -> Result<AdminEdit, PayloadError> {
    let payload = payload.trim();
    match action {
        PendingAction::AddGroup => parse_group(payload).map(AdminEdit::AddGroup),
        PendingAction::RemoveGroup => parse_chat(payload).map(AdminEdit::RemoveGroup),
        PendingAction::EditWelcome if payload.is_empty() => Err(PayloadError::Empty),
        PendingAction::EditWelcome => Ok(AdminEdit::Welcome(payload.to_string())),
        PendingAction::EditButtons => {
            let parts: Vec<&str> = payload.split(',').map(str::trim).collect();
            match parts.as_slice() {
                [list, verify, exclusive] if parts.iter().all(|p| !p.is_empty()) => {
                    Ok(AdminEdit::Buttons(ButtonLabels {
                        list: list.to_string(),
                        verify: verify.to_string(),
                        exclusive: exclusive.to_string(),
                    }))
                }
                _ => Err(PayloadError::ButtonCount(parts.len())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_action_is_single_shot() {
        let mut sessions = AdminSessions::new();
        let admin = UserId(1);

        sessions.begin(admin, PendingAction::AddGroup);
        sessions.begin(admin, PendingAction::RemoveGroup);
        assert_eq!(sessions.pending(admin), Some(PendingAction::RemoveGroup));
        assert_eq!(sessions.pending(UserId(2)), None);

        assert_eq!(sessions.take(admin), Some(PendingAction::RemoveGroup));
        assert_eq!(sessions.take(admin), None);
    }

    #[test]
    fn add_group_payload() {
        assert_eq!(
            parse_payload(PendingAction::AddGroup, " @chan "),
            Ok(AdminEdit::AddGroup(Group {
                chat: "@chan".into(),
                link: "https://t.me/chan".into(),
            }))
        );
        assert_eq!(
            parse_payload(PendingAction::AddGroup, "-1001 'https://t.me/+abc'"),
            Ok(AdminEdit::AddGroup(Group {
                chat: "-1001".into(),
                link: "https://t.me/+abc".into(),
            }))
        );
        assert_eq!(
            parse_payload(PendingAction::AddGroup, "a b c"),
            Err(PayloadError::ArgumentCount {
                expected: "1 or 2",
                found: 3
            })
        );
        assert_eq!(
            parse_payload(PendingAction::AddGroup, "\"@chan"),
            Err(PayloadError::Quoting)
        );
        assert_eq!(
            parse_payload(PendingAction::AddGroup, "-1001"),
            Err(PayloadError::Group(GroupError::MissingLink("-1001".into())))
        );
    }

    #[test]
    fn remove_group_payload() {
        assert_eq!(
            parse_payload(PendingAction::RemoveGroup, "t.me/chan"),
            Ok(AdminEdit::RemoveGroup("@chan".into()))
        );
        assert!(matches!(
            parse_payload(PendingAction::RemoveGroup, "not-a-chat"),
            Err(PayloadError::Group(GroupError::InvalidChat(_)))
        ));
        assert!(matches!(
            parse_payload(PendingAction::RemoveGroup, ""),
            Err(PayloadError::ArgumentCount { found: 0, .. })
        ));
    }

    #[test]
    fn text_payloads() {
        assert_eq!(
            parse_payload(PendingAction::EditWelcome, "  Привет!  "),
            Ok(AdminEdit::Welcome("Привет!".into()))
        );
        assert_eq!(
            parse_payload(PendingAction::EditWelcome, "   "),
            Err(PayloadError::Empty)
        );
        assert_eq!(
            parse_payload(PendingAction::EditButtons, "Группы, Проверить ,VIP"),
            Ok(AdminEdit::Buttons(ButtonLabels {
                list: "Группы".into(),
                verify: "Проверить".into(),
                exclusive: "VIP".into(),
            }))
        );
        assert_eq!(
            parse_payload(PendingAction::EditButtons, "one, two"),
            Err(PayloadError::ButtonCount(2))
        );
        assert_eq!(
            parse_payload(PendingAction::EditButtons, "one, , three"),
            Err(PayloadError::ButtonCount(3))
        );
    }
}
