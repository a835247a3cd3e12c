use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::group::Group;
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Contents of `config.json`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub token: String,
    pub admin_ids: Vec<u64>,
    pub exclusive_link: String,
    pub welcome_text: String,
    pub button_list: String,
    pub button_verify: String,
    pub button_exclusive: String,
    pub timezone: String,
    pub poll_timeout_secs: u32,
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            admin_ids: Vec::new(),
            exclusive_link: String::new(),
            welcome_text: String::from(
                "Добро пожаловать! Подпишитесь на наши группы. Используйте кнопки ниже.",
            ),
            button_list: String::from("Список групп"),
            button_verify: String::from("Проверить подписку"),
            button_exclusive: String::from("Эксклюзив"),
            timezone: String::from("Europe/Moscow"),
            poll_timeout_secs: 10,
            poll_interval_secs: 1,
        }
    }
}

// keeps the token out of the logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"***")
            .field("admin_ids", &self.admin_ids)
            .field("exclusive_link", &self.exclusive_link)
            .field("timezone", &self.timezone)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn button_labels(&self) -> ButtonLabels {
        ButtonLabels {
            list: self.button_list.clone(),
            verify: self.button_verify.clone(),
            exclusive: self.button_exclusive.clone(),
        }
    }

    pub fn set_button_labels(&mut self, labels: ButtonLabels) {
        self.button_list = labels.list;
        self.button_verify = labels.verify;
        self.button_exclusive = labels.exclusive;
    }

    pub fn timezone(&self) -> Tz {
        Tz::from_str(&self.timezone).unwrap_or_else(|_| {
            log::warn!("Unknown timezone {:?}, using UTC", self.timezone);
            Tz::UTC
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonLabels {
    pub list: String,
    pub verify: String,
    pub exclusive: String,
}

/// Process-level settings taken from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub token: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os("GATEKEEPER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let token = std::env::var("TELOXIDE_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self { data_dir, token }
    }
}

pub fn prompt_line(question: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{question}")?;
    stdout.flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(line.trim().to_string())
}

fn parse_admin_ids(input: &str) -> Result<Vec<u64>, std::num::ParseIntError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Fills in whatever the bot cannot run without, asking on the terminal.
///
/// Blocks until a token and at least one admin id are known, then writes the
/// result back to the data directory and returns the token to run with.
///
/// A token from the environment takes precedence and is never written to disk.
pub fn configure(
    store: &mut Store,
    env_token: Option<String>,
    mut prompt: impl FnMut(&str) -> io::Result<String>,
) -> Result<String, ConfigError> {
    log::info!("Loading configuration");

    if env_token.is_none() {
        while store.config().token.is_empty() {
            store.config_mut().token = prompt("Введите токен Telegram бота: ")?;
            if !store.config().token.is_empty() {
                log::info!("Token saved");
            }
        }
    }

    while store.config().admin_ids.is_empty() {
        let input = prompt("Введите ID администраторов через запятую: ")?;
        match parse_admin_ids(&input) {
            Ok(ids) if !ids.is_empty() => {
                store.config_mut().admin_ids = ids;
                log::info!("Admin IDs saved");
            }
            Ok(_) => {}
            Err(e) => log::warn!("Invalid admin id list {input:?}: {e}"),
        }
    }

    if store.groups().is_empty() {
        let input = prompt("Группы для подписки через запятую (@username или ссылка t.me): ")?;
        for entry in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match Group::new(entry, None) {
                Ok(group) => {
                    store.add_group(group)?;
                }
                Err(e) => log::warn!("Skipping group {entry:?}: {e}"),
            }
        }
        log::info!("Group list saved");
    }

    if store.config().exclusive_link.is_empty() {
        store.config_mut().exclusive_link = prompt("Ссылка для эксклюзива: ")?;
        log::info!("Exclusive link saved");
    }

    store.save_config()?;
    log::info!("Configuration complete");
    Ok(env_token.unwrap_or_else(|| store.config().token.clone()))
}
