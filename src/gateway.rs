use futures_core::future::BoxFuture;
use reqwest::Url;
use teloxide::adaptors::throttle::Limits;
use teloxide::adaptors::Throttle;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton,
    KeyboardMarkup, Recipient, ReplyMarkup, UpdateKind,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl From<&teloxide::types::User> for Sender {
    fn from(user: &teloxide::types::User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Incoming {
    pub chat_id: ChatId,
    pub from: Sender,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub query_id: String,
    pub chat_id: ChatId,
    pub from: Sender,
    pub data: String,
}

#[derive(Debug, Clone)]
pub enum EventKind {
    Message(Incoming),
    Callback(CallbackEvent),
    Other,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub id: i32,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Member,
    Left,
    Kicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Url(String),
    Callback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Url(url.into()),
        }
    }

    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Buttons attached to the message itself.
    Inline(Vec<Vec<Button>>),
    /// Replacement for the user's keyboard; each button sends its label.
    Reply(Vec<Vec<String>>),
}

/// Everything the bot needs from the Bot API.
pub trait Gateway: Send + Sync {
    fn fetch_events(&self, offset: Option<i32>, timeout: u32)
        -> BoxFuture<'_, Result<Vec<Event>, ApiError>>;

    fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    ) -> BoxFuture<'_, Result<(), ApiError>>;

    /// `chat` is a numeric chat id or a `@username`.
    fn member_status(&self, chat: &str, user: UserId)
        -> BoxFuture<'_, Result<MemberStatus, ApiError>>;

    fn answer_callback(&self, query_id: String) -> BoxFuture<'_, Result<(), ApiError>>;

    fn register_commands(&self, commands: Vec<BotCommand>) -> BoxFuture<'_, Result<(), ApiError>>;
}

pub struct TelegramGateway {
    bot: Throttle<Bot>,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot: bot.throttle(Limits::default()),
        }
    }
}

fn recipient(chat: &str) -> Recipient {
    match chat.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat.to_string()),
    }
}

fn convert_update(update: Update) -> Event {
    let id = update.id.0 as i32;
    let kind = match update.kind {
        UpdateKind::Message(msg) => match &msg.from {
            Some(from) => EventKind::Message(Incoming {
                chat_id: msg.chat.id,
                from: Sender::from(from),
                text: msg.text().unwrap_or_default().to_string(),
            }),
            None => EventKind::Other,
        },
        UpdateKind::CallbackQuery(q) => EventKind::Callback(CallbackEvent {
            chat_id: q
                .message
                .as_ref()
                .map(|m| m.chat().id)
                .unwrap_or_else(|| ChatId::from(q.from.id)),
            from: Sender::from(&q.from),
            data: q.data.clone().unwrap_or_default(),
            query_id: q.id,
        }),
        _ => EventKind::Other,
    };
    Event { id, kind }
}

fn inline_button(button: Button) -> Option<InlineKeyboardButton> {
    match button.action {
        ButtonAction::Callback(data) => Some(InlineKeyboardButton::callback(button.text, data)),
        ButtonAction::Url(link) => match Url::parse(&link) {
            Ok(url) => Some(InlineKeyboardButton::url(button.text, url)),
            Err(e) => {
                log::warn!("Dropping button {:?} with invalid link {link}: {e}", button.text);
                None
            }
        },
    }
}

fn reply_markup(keyboard: Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Inline(rows) => ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(
            rows.into_iter()
                .map(|row| row.into_iter().filter_map(inline_button).collect::<Vec<_>>()),
        )),
        Keyboard::Reply(rows) => ReplyMarkup::Keyboard(KeyboardMarkup::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>()),
        )),
    }
}

impl Gateway for TelegramGateway {
    fn fetch_events(
        &self,
        offset: Option<i32>,
        timeout: u32,
    ) -> BoxFuture<'_, Result<Vec<Event>, ApiError>> {
        Box::pin(async move {
            let mut request = self.bot.get_updates().timeout(timeout);
            if let Some(offset) = offset {
                request = request.offset(offset);
            }
            let updates = request.await?;
            Ok(updates.into_iter().map(convert_update).collect())
        })
    }

    fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            log::debug!("Send message to {chat_id}: {text}");
            let mut request = self.bot.send_message(chat_id, text);
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(reply_markup(keyboard));
            }
            request.await?;
            Ok(())
        })
    }

    fn member_status(
        &self,
        chat: &str,
        user: UserId,
    ) -> BoxFuture<'_, Result<MemberStatus, ApiError>> {
        let chat = recipient(chat);
        Box::pin(async move {
            let member = self.bot.get_chat_member(chat, user).await?;
            Ok(match member.kind {
                ChatMemberKind::Left => MemberStatus::Left,
                ChatMemberKind::Banned(_) => MemberStatus::Kicked,
                _ => MemberStatus::Member,
            })
        })
    }

    fn answer_callback(&self, query_id: String) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.bot.answer_callback_query(query_id).await?;
            Ok(())
        })
    }

    fn register_commands(&self, commands: Vec<BotCommand>) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.bot.set_my_commands(commands).await?;
            Ok(())
        })
    }
}
