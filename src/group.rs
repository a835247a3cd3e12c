use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    static ref CHAT_REGEX: Regex = Regex::new(r"^(-?\d+|@\w{1,32})$").unwrap();
    static ref PUBLIC_LINK_REGEX: Regex =
        Regex::new(r"^(?:https?://)?t\.me/(\w{1,32})/?$").unwrap();
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupError {
    #[error("{0:?} is neither a numeric chat id nor a @username")]
    InvalidChat(String),
    #[error("{0:?} is not a valid link")]
    InvalidLink(String),
    #[error("an invite link is required for chat {0}")]
    MissingLink(String),
}

/// A chat the user has to join before access is granted.
///
/// `chat` is what membership lookups are made against, `link` is what the
/// user gets to click on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub chat: String,
    pub link: String,
}

impl Group {
    pub fn new(chat: &str, link: Option<&str>) -> Result<Self, GroupError> {
        if let (Some(name), None) = (public_link_name(chat), link) {
            return Ok(Self {
                chat: format!("@{name}"),
                link: chat.to_string(),
            });
        }

        let chat = normalize_chat(chat)?;
        let link = match link {
            Some(link) => match Url::parse(link) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => link.to_string(),
                _ => return Err(GroupError::InvalidLink(link.to_string())),
            },
            None => match chat.strip_prefix('@') {
                Some(name) => format!("https://t.me/{name}"),
                None => return Err(GroupError::MissingLink(chat)),
            },
        };

        Ok(Self { chat, link })
    }
}

/// Turns user input into the identifier stored in [`Group::chat`].
///
/// Public `t.me` links are accepted and mapped to their `@username`.
pub fn normalize_chat(input: &str) -> Result<String, GroupError> {
    let input = input.trim();
    if let Some(name) = public_link_name(input) {
        return Ok(format!("@{name}"));
    }
    if CHAT_REGEX.is_match(input) {
        Ok(input.to_string())
    } else {
        Err(GroupError::InvalidChat(input.to_string()))
    }
}

fn public_link_name(input: &str) -> Option<&str> {
    PUBLIC_LINK_REGEX
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Entry of `groups.json`; older files only hold invite links.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum StoredGroup {
    Full(Group),
    Link(String),
}

impl From<StoredGroup> for Group {
    fn from(value: StoredGroup) -> Self {
        match value {
            StoredGroup::Full(group) => group,
            StoredGroup::Link(link) => match Group::new(&link, None) {
                Ok(group) => group,
                Err(_) => {
                    log::warn!("Group link {link} cannot be resolved to a chat, lookups will fail");
                    Group {
                        chat: link.clone(),
                        link,
                    }
                }
            },
        }
    }
}
