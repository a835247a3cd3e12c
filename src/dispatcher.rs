use teloxide::types::{ChatId, UserId};
use thiserror::Error;

use crate::admin::{self, AdminEdit, AdminSessions, PendingAction};
use crate::commands::{Command, MenuItem};
use crate::gateway::{ApiError, CallbackEvent, Event, EventKind, Gateway, Incoming, Keyboard};
use crate::messages;
use crate::store::{Store, StoreError};
use crate::verifier::{self, Verdict};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything a handler can touch. Owned by the polling loop.
pub struct App<G> {
    gateway: G,
    store: Store,
    sessions: AdminSessions,
}

impl<G: Gateway> App<G> {
    pub fn new(gateway: G, store: Store) -> Self {
        Self {
            gateway,
            store,
            sessions: AdminSessions::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn sessions(&self) -> &AdminSessions {
        &self.sessions
    }

    fn is_admin(&self, user: UserId) -> bool {
        self.store.config().is_admin(user.0)
    }

    async fn reply(
        &self,
        chat_id: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    ) -> Result<(), HandlerError> {
        self.gateway.send_text(chat_id, text, keyboard).await?;
        Ok(())
    }

    pub async fn handle_event(&mut self, event: Event) -> Result<(), HandlerError> {
        match event.kind {
            EventKind::Callback(query) => self.handle_callback(query).await,
            EventKind::Message(msg) => self.handle_message(msg).await,
            EventKind::Other => Ok(()),
        }
    }

    async fn handle_callback(&mut self, query: CallbackEvent) -> Result<(), HandlerError> {
        log::info!("Callback {:?} from {}", query.data, query.from.id);
        let result = match query.data.as_str() {
            messages::CALLBACK_LIST_GROUPS => self.list_groups(query.chat_id).await,
            messages::CALLBACK_VERIFY => self.verify(query.chat_id, query.from.id).await,
            messages::CALLBACK_EXCLUSIVE => self.exclusive(query.chat_id, query.from.id).await,
            _ => Ok(()),
        };

        let answered = self.gateway.answer_callback(query.query_id).await;
        result?;
        answered?;
        Ok(())
    }

    async fn handle_message(&mut self, msg: Incoming) -> Result<(), HandlerError> {
        let user = msg.from.id;
        log::info!("Message from {user}: {}", msg.text);

        if let Err(e) = self.store.record_user(&msg.from) {
            log::warn!("Couldn't record user {user}: {e}");
        }

        let is_admin = self.is_admin(user);

        if is_admin {
            if let Some(action) = self.sessions.take(user) {
                return self.apply_pending(user, action, &msg).await;
            }
        }

        if let Some((command, args)) = Command::match_prefix(&msg.text) {
            log::info!("{} command from {user}", command.token());
            if command.requires_admin() && !is_admin {
                return self.reply(msg.chat_id, messages::no_access(), None).await;
            }
            return self.handle_command(command, args, &msg).await;
        }

        if is_admin {
            if let Some(item) = MenuItem::from_label(&msg.text) {
                return self.handle_menu(item, &msg).await;
            }
        }

        Ok(())
    }

    async fn handle_command(
        &mut self,
        command: Command,
        args: &str,
        msg: &Incoming,
    ) -> Result<(), HandlerError> {
        let chat_id = msg.chat_id;
        let user = msg.from.id;
        match command {
            Command::Start => {
                let config = self.store.config();
                let keyboard = messages::welcome_keyboard(config, self.store.groups());
                self.reply(chat_id, config.welcome_text.clone(), Some(keyboard))
                    .await
            }
            Command::Verify => self.verify(chat_id, user).await,
            Command::ListGroups => self.list_groups(chat_id).await,
            Command::Exclusive => self.exclusive(chat_id, user).await,
            Command::Admin => {
                self.reply(
                    chat_id,
                    messages::admin_panel(),
                    Some(messages::admin_keyboard()),
                )
                .await
            }
            Command::Help => self.reply(chat_id, messages::help(), None).await,
            Command::Groups => self.handle_menu(MenuItem::GroupList, msg).await,
            Command::AddGroup if args.is_empty() => {
                self.begin_action(chat_id, user, PendingAction::AddGroup)
                    .await
            }
            Command::AddGroup => {
                let reply = match admin::parse_group(args) {
                    Ok(group) => self.apply_edit(user, AdminEdit::AddGroup(group))?,
                    Err(e) => messages::invalid_payload(PendingAction::AddGroup, &e),
                };
                self.reply(chat_id, reply, None).await
            }
            Command::RemoveGroup if args.is_empty() => {
                self.begin_action(chat_id, user, PendingAction::RemoveGroup)
                    .await
            }
            Command::RemoveGroup => {
                let reply = match admin::parse_chat(args) {
                    Ok(chat) => self.apply_edit(user, AdminEdit::RemoveGroup(chat))?,
                    Err(e) => messages::invalid_payload(PendingAction::RemoveGroup, &e),
                };
                self.reply(chat_id, reply, None).await
            }
            Command::Welcome => {
                self.begin_action(chat_id, user, PendingAction::EditWelcome)
                    .await
            }
            Command::Buttons => {
                self.begin_action(chat_id, user, PendingAction::EditButtons)
                    .await
            }
        }
    }

    async fn handle_menu(&mut self, item: MenuItem, msg: &Incoming) -> Result<(), HandlerError> {
        let chat_id = msg.chat_id;
        let user = msg.from.id;
        match item {
            MenuItem::GroupList => {
                let text = messages::current_groups(self.store.groups());
                self.reply(chat_id, text, None).await
            }
            MenuItem::AddGroup => self.begin_action(chat_id, user, PendingAction::AddGroup).await,
            MenuItem::RemoveGroup => {
                self.begin_action(chat_id, user, PendingAction::RemoveGroup)
                    .await
            }
            MenuItem::EditWelcome => {
                self.begin_action(chat_id, user, PendingAction::EditWelcome)
                    .await
            }
            MenuItem::EditButtons => {
                self.begin_action(chat_id, user, PendingAction::EditButtons)
                    .await
            }
            MenuItem::Stats => {
                let text = messages::user_count(self.store.users().len());
                self.reply(chat_id, text, None).await
            }
            MenuItem::DetailedStats => {
                log::info!("Generating detailed stats for admin {user}");
                let tz = self.store.config().timezone();
                let text = messages::joins_per_day(self.store.users(), tz);
                self.reply(chat_id, text, None).await
            }
            MenuItem::Users => {
                let text = messages::user_list(self.store.users());
                self.reply(chat_id, text, None).await
            }
        }
    }

    async fn begin_action(
        &mut self,
        chat_id: ChatId,
        admin: UserId,
        action: PendingAction,
    ) -> Result<(), HandlerError> {
        self.sessions.begin(admin, action);
        self.reply(chat_id, messages::prompt(action), None).await
    }

    async fn apply_pending(
        &mut self,
        admin: UserId,
        action: PendingAction,
        msg: &Incoming,
    ) -> Result<(), HandlerError> {
        let reply = match admin::parse_payload(action, &msg.text) {
            Ok(edit) => self.apply_edit(admin, edit)?,
            Err(e) => {
                log::info!("Admin {admin} sent an invalid payload for {action:?}: {e}");
                messages::invalid_payload(action, &e)
            }
        };
        self.reply(msg.chat_id, reply, None).await
    }

    fn apply_edit(&mut self, admin: UserId, edit: AdminEdit) -> Result<String, StoreError> {
        match edit {
            AdminEdit::AddGroup(group) => {
                let chat = group.chat.clone();
                if self.store.add_group(group)? {
                    log::info!("Admin {admin} added group {chat}");
                } else {
                    log::info!("Admin {admin} added group {chat}, which was already required");
                }
                Ok(messages::group_added())
            }
            AdminEdit::RemoveGroup(chat) => {
                if self.store.remove_group(&chat)? {
                    log::info!("Admin {admin} removed group {chat}");
                } else {
                    log::info!("Admin {admin} removed group {chat}, which was not required");
                }
                Ok(messages::group_removed())
            }
            AdminEdit::Welcome(text) => {
                self.store.config_mut().welcome_text = text;
                self.store.save_config()?;
                log::info!("Admin {admin} updated welcome text");
                Ok(messages::welcome_updated())
            }
            AdminEdit::Buttons(labels) => {
                self.store.config_mut().set_button_labels(labels);
                self.store.save_config()?;
                log::info!("Admin {admin} updated button labels");
                Ok(messages::buttons_updated())
            }
        }
    }

    async fn list_groups(&self, chat_id: ChatId) -> Result<(), HandlerError> {
        let (text, keyboard) = messages::required_groups(self.store.groups());
        self.reply(chat_id, text, keyboard).await
    }

    async fn has_access(&self, user: UserId) -> bool {
        match verifier::verify(&self.gateway, self.store.groups(), user).await {
            Verdict::Granted => {
                log::info!("User {user} subscribed to all groups");
                true
            }
            Verdict::Missing { chat, status } => {
                log::info!("User {user} missing subscription to {chat} ({status:?})");
                false
            }
            Verdict::Unavailable { chat, error } => {
                log::warn!("Membership lookup of {user} in {chat} failed, denying access: {error}");
                false
            }
        }
    }

    async fn verify(&mut self, chat_id: ChatId, user: UserId) -> Result<(), HandlerError> {
        if !self.has_access(user).await {
            return self.reply(chat_id, messages::access_denied(), None).await;
        }
        self.store.record_exclusive_user(user)?;
        self.reply(chat_id, messages::access_granted(), None).await
    }

    async fn exclusive(&mut self, chat_id: ChatId, user: UserId) -> Result<(), HandlerError> {
        if !self.has_access(user).await {
            return self.reply(chat_id, messages::access_denied(), None).await;
        }
        self.store.record_exclusive_user(user)?;
        let text = messages::exclusive_content(&self.store.config().exclusive_link);
        self.reply(chat_id, text, None).await
    }
}
