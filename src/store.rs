use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use teloxide::types::UserId;
use thiserror::Error;

use crate::config::Config;
use crate::gateway::Sender;
use crate::group::{Group, StoredGroup};

const CONFIG_FILE: &str = "config.json";
const GROUPS_FILE: &str = "groups.json";
const USERS_FILE: &str = "users.json";
const EXCLUSIVE_USERS_FILE: &str = "exclusive_users.json";
const TEMP_FILE_SUFFIX: &str = ".tmp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(with = "joined_at")]
    pub joined_at: DateTime<Utc>,
}

/// Unix seconds. Older `users.json` files carry fractional seconds.
mod joined_at {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Whole(i64),
        Fractional(f64),
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        chrono::serde::ts_seconds::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let (secs, nanos) = match Seconds::deserialize(deserializer)? {
            Seconds::Whole(secs) => (secs, 0),
            Seconds::Fractional(secs) if secs.is_finite() => {
                let whole = secs.floor();
                (whole as i64, ((secs - whole) * 1e9) as u32)
            }
            Seconds::Fractional(secs) => {
                return Err(D::Error::custom(format!("invalid timestamp {secs}")))
            }
        };
        Utc.timestamp_opt(secs, nanos)
            .single()
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
    }
}

impl UserRecord {
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.first_name.as_deref())
            .unwrap_or("")
    }
}

/// JSON documents in the data directory.
///
/// Every document is read once on open and rewritten in full whenever it
/// changes. Nothing is written when a mutation turns out to be a no-op.
pub struct Store {
    dir: PathBuf,
    config: Config,
    groups: Vec<Group>,
    users: BTreeMap<u64, UserRecord>,
    exclusive_users: Vec<u64>,
}

impl Store {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let config = load_json(&dir.join(CONFIG_FILE));
        let groups = load_json::<Vec<StoredGroup>>(&dir.join(GROUPS_FILE))
            .into_iter()
            .map(Group::from)
            .collect();
        let users = load_json(&dir.join(USERS_FILE));
        let exclusive_users = load_json(&dir.join(EXCLUSIVE_USERS_FILE));

        Self {
            dir,
            config,
            groups,
            users,
            exclusive_users,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Changes are only persisted by [`Store::save_config`].
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn save_config(&self) -> Result<(), StoreError> {
        write_json(&self.dir.join(CONFIG_FILE), &self.config)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Returns `false` if a group with the same chat is already required.
    pub fn add_group(&mut self, group: Group) -> Result<bool, StoreError> {
        if self.groups.iter().any(|g| g.chat == group.chat) {
            return Ok(false);
        }
        self.groups.push(group);
        self.save_groups()?;
        Ok(true)
    }

    pub fn remove_group(&mut self, chat: &str) -> Result<bool, StoreError> {
        let before = self.groups.len();
        self.groups.retain(|g| g.chat != chat);
        if self.groups.len() == before {
            return Ok(false);
        }
        self.save_groups()?;
        Ok(true)
    }

    fn save_groups(&self) -> Result<(), StoreError> {
        write_json(&self.dir.join(GROUPS_FILE), &self.groups)
    }

    pub fn users(&self) -> &BTreeMap<u64, UserRecord> {
        &self.users
    }

    /// Stores a profile snapshot the first time a user is seen.
    pub fn record_user(&mut self, user: &Sender) -> Result<bool, StoreError> {
        if self.users.contains_key(&user.id.0) {
            return Ok(false);
        }
        self.users.insert(
            user.id.0,
            UserRecord {
                username: user.username.clone(),
                first_name: Some(user.first_name.clone()),
                last_name: user.last_name.clone(),
                joined_at: Utc::now(),
            },
        );
        write_json(&self.dir.join(USERS_FILE), &self.users)?;
        Ok(true)
    }

    pub fn exclusive_users(&self) -> &[u64] {
        &self.exclusive_users
    }

    pub fn record_exclusive_user(&mut self, user_id: UserId) -> Result<bool, StoreError> {
        if self.exclusive_users.contains(&user_id.0) {
            return Ok(false);
        }
        self.exclusive_users.push(user_id.0);
        write_json(&self.dir.join(EXCLUSIVE_USERS_FILE), &self.exclusive_users)?;
        Ok(true)
    }
}

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            log::warn!("Couldn't read {}: {e}", path.display());
            return T::default();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        log::warn!("Invalid content in {}, starting empty: {e}", path.display());
        T::default()
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        path: path.to_owned(),
        source,
    })?;

    let io_error = |source| StoreError::Io {
        path: path.to_owned(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let tmp = PathBuf::from(format!("{}{}", path.display(), TEMP_FILE_SUFFIX));
    std::fs::write(&tmp, bytes).map_err(io_error)?;
    std::fs::rename(&tmp, path).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(id: u64, name: &str) -> Sender {
        Sender {
            id: UserId(id),
            username: Some(name.to_lowercase()),
            first_name: name.to_string(),
            last_name: None,
        }
    }

    #[test]
    fn recording_a_user_twice_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path());

        assert!(store.record_user(&sender(7, "Anna")).unwrap());
        let first = std::fs::read_to_string(dir.path().join(USERS_FILE)).unwrap();

        let renamed = Sender {
            username: Some("someone_else".into()),
            ..sender(7, "Anna")
        };
        assert!(!store.record_user(&renamed).unwrap());
        let second = std::fs::read_to_string(dir.path().join(USERS_FILE)).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.users().len(), 1);
        assert_eq!(store.users()[&7].username.as_deref(), Some("anna"));
    }

    #[test]
    fn fractional_join_times_are_kept_on_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(USERS_FILE),
            r#"{
                "42": {"username": "old", "first_name": "Old", "last_name": null, "joined_at": 1700000000.123},
                "43": {"username": null, "first_name": "Int", "last_name": "X", "joined_at": 1700086400}
            }"#,
        )
        .unwrap();

        let mut store = Store::open(dir.path());
        assert_eq!(store.users().len(), 2);
        assert_eq!(store.users()[&42].joined_at.timestamp(), 1_700_000_000);
        assert_eq!(store.users()[&43].joined_at.timestamp(), 1_700_086_400);

        assert!(store.record_user(&sender(7, "Anna")).unwrap());
        let reloaded = Store::open(dir.path());
        assert_eq!(
            reloaded.users().keys().copied().collect::<Vec<_>>(),
            vec![7, 42, 43]
        );
        assert_eq!(reloaded.users()[&42].display_name(), "old");
        assert_eq!(reloaded.users()[&42].joined_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn group_list_is_unique_by_chat() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path());

        assert!(store.add_group(Group::new("@one", None).unwrap()).unwrap());
        let duplicate = Group::new("@one", Some("https://t.me/+other")).unwrap();
        assert!(!store.add_group(duplicate).unwrap());
        assert!(!store.remove_group("@missing").unwrap());
        assert_eq!(store.groups().len(), 1);

        assert!(store.remove_group("@one").unwrap());
        assert!(Store::open(dir.path()).groups().is_empty());
    }

    #[test]
    fn exclusive_users_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path());

        assert!(store.record_exclusive_user(UserId(5)).unwrap());
        assert!(!store.record_exclusive_user(UserId(5)).unwrap());
        assert!(store.record_exclusive_user(UserId(6)).unwrap());

        assert_eq!(Store::open(dir.path()).exclusive_users(), &[5, 6]);
    }

    #[test]
    fn broken_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();
        std::fs::write(dir.path().join(USERS_FILE), "[1, 2]").unwrap();
        std::fs::write(dir.path().join(GROUPS_FILE), r#"["https://t.me/news"]"#).unwrap();

        let store = Store::open(dir.path());
        assert_eq!(store.config(), &Config::default());
        assert!(store.users().is_empty());
        assert_eq!(store.groups()[0].chat, "@news");
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"token": "t", "admin_ids": [1], "welcome_text": "Hi"}"#,
        )
        .unwrap();

        let store = Store::open(dir.path());
        assert_eq!(store.config().welcome_text, "Hi");
        assert_eq!(store.config().button_verify, Config::default().button_verify);
        assert!(store.config().is_admin(1));
    }
}
