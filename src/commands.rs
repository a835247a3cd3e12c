use teloxide::macros::BotCommands;

#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Поддерживаются следующие команды:")]
pub enum Command {
    #[command(description = "приветствие и список групп.")]
    Start,
    #[command(description = "проверить подписку.")]
    Verify,
    #[command(description = "показать группы для подписки.")]
    ListGroups,
    #[command(description = "получить эксклюзивную ссылку.")]
    Exclusive,
    #[command(description = "панель администратора.")]
    Admin,
    #[command(description = "показать этот текст.")]
    Help,
    #[command(description = "текущие группы (для администраторов).")]
    Groups,
    #[command(description = "добавить группу (для администраторов).")]
    AddGroup,
    #[command(description = "удалить группу (для администраторов).")]
    RemoveGroup,
    #[command(description = "изменить приветствие (для администраторов).")]
    Welcome,
    #[command(description = "изменить названия кнопок (для администраторов).")]
    Buttons,
}

impl Command {
    /// Matching order; the first command whose token prefixes the text wins.
    const ALL: [Command; 11] = [
        Command::Start,
        Command::Verify,
        Command::ListGroups,
        Command::Exclusive,
        Command::Admin,
        Command::Help,
        Command::Groups,
        Command::AddGroup,
        Command::RemoveGroup,
        Command::Welcome,
        Command::Buttons,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Command::Start => "/start",
            Command::Verify => "/verify",
            Command::ListGroups => "/listgroups",
            Command::Exclusive => "/exclusive",
            Command::Admin => "/admin",
            Command::Help => "/help",
            Command::Groups => "/groups",
            Command::AddGroup => "/addgroup",
            Command::RemoveGroup => "/removegroup",
            Command::Welcome => "/welcome",
            Command::Buttons => "/buttons",
        }
    }

    pub fn requires_admin(self) -> bool {
        matches!(
            self,
            Command::Admin
                | Command::Groups
                | Command::AddGroup
                | Command::RemoveGroup
                | Command::Welcome
                | Command::Buttons
        )
    }

    /// Literal prefix match. Returns the command and the trimmed rest of the
    /// text, with a trailing `@botname` mention dropped.
    pub fn match_prefix(text: &str) -> Option<(Command, &str)> {
        let command = Self::ALL
            .into_iter()
            .find(|c| text.starts_with(c.token()))?;
        let rest = &text[command.token().len()..];
        let rest = match rest.strip_prefix('@') {
            Some(mention) => mention
                .split_once(char::is_whitespace)
                .map_or("", |(_, args)| args),
            None => rest,
        };
        Some((command, rest.trim()))
    }
}

/// Labels of the admin reply keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuItem {
    GroupList,
    AddGroup,
    RemoveGroup,
    EditWelcome,
    EditButtons,
    Stats,
    DetailedStats,
    Users,
}

impl MenuItem {
    pub const ROWS: [&'static [MenuItem]; 3] = [
        &[MenuItem::GroupList, MenuItem::AddGroup, MenuItem::RemoveGroup],
        &[MenuItem::EditWelcome, MenuItem::EditButtons],
        &[MenuItem::Stats, MenuItem::DetailedStats, MenuItem::Users],
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuItem::GroupList => "Список групп",
            MenuItem::AddGroup => "Добавить группу",
            MenuItem::RemoveGroup => "Удалить группу",
            MenuItem::EditWelcome => "Изменить приветствие",
            MenuItem::EditButtons => "Изменить кнопки",
            MenuItem::Stats => "Статистика",
            MenuItem::DetailedStats => "Подробная статистика",
            MenuItem::Users => "Пользователи",
        }
    }

    pub fn from_label(text: &str) -> Option<MenuItem> {
        Self::ROWS
            .iter()
            .flat_map(|row| row.iter().copied())
            .find(|item| item.label() == text)
    }
}
