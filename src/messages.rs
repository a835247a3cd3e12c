use std::collections::BTreeMap;

use chrono_tz::Tz;
use teloxide::utils::command::BotCommands;

use crate::admin::{PayloadError, PendingAction};
use crate::commands::{Command, MenuItem};
use crate::config::Config;
use crate::gateway::{Button, Keyboard};
use crate::group::Group;
use crate::store::UserRecord;

pub const CALLBACK_LIST_GROUPS: &str = "list_groups";
pub const CALLBACK_VERIFY: &str = "verify";
pub const CALLBACK_EXCLUSIVE: &str = "exclusive";

/// Telegram's limit for a text message, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;
const TAIL_RESERVE: usize = 32;

fn text_len(text: &str) -> usize {
    text.encode_utf16().count()
}

fn push_line(text: &mut String, line: &str) {
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(line);
}

/// Appends `lines` to `text`, one per line, cutting off what doesn't fit
/// into a single message.
fn append_lines(mut text: String, lines: Vec<String>) -> String {
    let mut full = text.clone();
    for line in &lines {
        push_line(&mut full, line);
    }
    if text_len(&full) <= MAX_MESSAGE_LEN {
        return full;
    }

    let total = lines.len();
    for (i, line) in lines.iter().enumerate() {
        if text_len(&text) + 1 + text_len(line) > MAX_MESSAGE_LEN - TAIL_RESERVE {
            push_line(&mut text, &format!("…и ещё {}", total - i));
            break;
        }
        push_line(&mut text, line);
    }
    text
}

fn group_buttons(groups: &[Group]) -> Vec<Vec<Button>> {
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| vec![Button::url(format!("Группа {}", i + 1), &group.link)])
        .collect()
}

pub fn welcome_keyboard(config: &Config, groups: &[Group]) -> Keyboard {
    let mut rows = group_buttons(groups);
    rows.push(vec![Button::callback(&config.button_list, CALLBACK_LIST_GROUPS)]);
    rows.push(vec![Button::callback(&config.button_verify, CALLBACK_VERIFY)]);
    rows.push(vec![Button::callback(
        &config.button_exclusive,
        CALLBACK_EXCLUSIVE,
    )]);
    Keyboard::Inline(rows)
}

/// Text and keyboard for the public group list.
pub fn required_groups(groups: &[Group]) -> (String, Option<Keyboard>) {
    if groups.is_empty() {
        (String::from("Список групп пуст"), None)
    } else {
        (
            String::from("Необходимые группы:"),
            Some(Keyboard::Inline(group_buttons(groups))),
        )
    }
}

pub fn admin_keyboard() -> Keyboard {
    Keyboard::Reply(
        MenuItem::ROWS
            .iter()
            .map(|row| row.iter().map(|item| item.label().to_string()).collect())
            .collect(),
    )
}

pub fn access_granted() -> String {
    String::from("Подписка подтверждена. Доступ открыт!")
}

pub fn access_denied() -> String {
    String::from(
        "Вы еще не подписались на все требуемые группы. Пожалуйста, проверьте \
         свои подписки и попробуйте снова.",
    )
}

pub fn exclusive_content(link: &str) -> String {
    format!("Эксклюзивная ссылка: {link}")
}

pub fn admin_panel() -> String {
    String::from("Панель администратора")
}

pub fn no_access() -> String {
    String::from("Нет доступа")
}

pub fn help() -> String {
    Command::descriptions().to_string()
}

pub fn current_groups(groups: &[Group]) -> String {
    if groups.is_empty() {
        return String::from("Текущие группы:\nнет");
    }
    let lines: Vec<String> = groups
        .iter()
        .map(|g| format!("{} - {}", g.chat, g.link))
        .collect();
    format!("Текущие группы:\n{}", lines.join("\n"))
}

pub fn prompt(action: PendingAction) -> String {
    match action {
        PendingAction::AddGroup => String::from(
            "Отправьте группу: @username или ссылку t.me, для закрытых групп \
             числовой ID и ссылку-приглашение через пробел",
        ),
        PendingAction::RemoveGroup => {
            String::from("Отправьте @username или ID группы для удаления")
        }
        PendingAction::EditWelcome => String::from("Отправьте новый приветственный текст"),
        PendingAction::EditButtons => {
            String::from("Названия кнопок через запятую: список, проверка, эксклюзив")
        }
    }
}

pub fn group_added() -> String {
    String::from("Группа добавлена")
}

pub fn group_removed() -> String {
    String::from("Группа удалена")
}

pub fn welcome_updated() -> String {
    String::from("Приветствие обновлено")
}

pub fn buttons_updated() -> String {
    String::from("Кнопки обновлены")
}

pub fn invalid_payload(action: PendingAction, error: &PayloadError) -> String {
    match action {
        PendingAction::AddGroup => format!(
            "Не удалось добавить группу: {error}\nИспользование: /addgroup <@username|ID> [ссылка]"
        ),
        PendingAction::RemoveGroup => format!(
            "Не удалось удалить группу: {error}\nИспользование: /removegroup <@username|ID>"
        ),
        PendingAction::EditWelcome => String::from("Приветствие не может быть пустым"),
        PendingAction::EditButtons => {
            String::from("Неверный формат. Три названия через запятую")
        }
    }
}

pub fn user_count(count: usize) -> String {
    format!("Пользователей: {count}")
}

pub fn user_list(users: &BTreeMap<u64, UserRecord>) -> String {
    if users.is_empty() {
        return String::from("Нет данных");
    }
    let lines = users
        .iter()
        .map(|(id, user)| format!("{id} - {}", user.display_name()))
        .collect();
    append_lines(String::new(), lines)
}

/// First-seen users per calendar day in `tz`.
pub fn joins_per_day(users: &BTreeMap<u64, UserRecord>, tz: Tz) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for user in users.values() {
        let day = user.joined_at.with_timezone(&tz).format("%Y-%m-%d").to_string();
        *counts.entry(day).or_default() += 1;
    }

    if counts.is_empty() {
        return String::from("Нет данных");
    }

    let lines = counts
        .into_iter()
        .map(|(day, count)| format!("{day}: {count}"))
        .collect();
    append_lines(String::from("Новые пользователи по дням:"), lines)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::gateway::ButtonAction;

    fn user(name: Option<&str>, first: &str, ts: i64) -> UserRecord {
        UserRecord {
            username: name.map(String::from),
            first_name: Some(first.to_string()),
            last_name: None,
            joined_at: Utc.timestamp_opt(ts, 0).unwrap(),
        }
    }

    #[test]
    fn welcome_keyboard_lists_groups_then_actions() {
        let groups = vec![
            Group::new("@one", None).unwrap(),
            Group::new("@two", None).unwrap(),
        ];
        let Keyboard::Inline(rows) = welcome_keyboard(&Config::default(), &groups) else {
            panic!("expected inline keyboard");
        };

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0][0], Button::url("Группа 1", "https://t.me/one"));
        assert_eq!(rows[1][0].text, "Группа 2");
        let actions: Vec<_> = rows[2..].iter().map(|r| r[0].action.clone()).collect();
        assert_eq!(
            actions,
            vec![
                ButtonAction::Callback(CALLBACK_LIST_GROUPS.into()),
                ButtonAction::Callback(CALLBACK_VERIFY.into()),
                ButtonAction::Callback(CALLBACK_EXCLUSIVE.into()),
            ]
        );
    }

    #[test]
    fn user_list_prefers_username() {
        let mut users = BTreeMap::new();
        users.insert(2, user(None, "Boris", 0));
        users.insert(1, user(Some("anna"), "Anna", 0));
        assert_eq!(user_list(&users), "1 - anna\n2 - Boris");
        assert_eq!(user_list(&BTreeMap::new()), "Нет данных");
    }

    #[test]
    fn long_user_lists_fit_into_one_message() {
        let users: BTreeMap<u64, UserRecord> = (0..1000)
            .map(|id| (id, user(Some("someone_with_a_long_name"), "X", 0)))
            .collect();

        let text = user_list(&users);
        assert!(text.encode_utf16().count() <= MAX_MESSAGE_LEN);
        assert!(text.starts_with("0 - someone_with_a_long_name\n"));

        let shown = text.lines().filter(|l| l.contains(" - ")).count();
        let tail = text.lines().last().unwrap();
        assert_eq!(tail, format!("…и ещё {}", 1000 - shown));
    }

    #[test]
    fn joins_are_counted_in_local_days() {
        let mut users = BTreeMap::new();
        // 2024-03-01 22:30 UTC is already March 2nd in Moscow
        users.insert(1, user(None, "a", 1_709_332_200));
        users.insert(2, user(None, "b", 1_709_290_800));
        users.insert(3, user(None, "c", 1_709_294_400));

        assert_eq!(
            joins_per_day(&users, chrono_tz::Europe::Moscow),
            "Новые пользователи по дням:\n2024-03-01: 2\n2024-03-02: 1"
        );
        assert_eq!(
            joins_per_day(&users, chrono_tz::UTC),
            "Новые пользователи по дням:\n2024-03-01: 3"
        );
    }
}
