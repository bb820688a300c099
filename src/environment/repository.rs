use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{from_str, to_string_pretty};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::types::{ResetRequest, StoredUser, UserProfile};

const TOKEN_KEY: &str = "token";
const USER_KEY: &str = "user";
const REGISTERED_USERS_KEY: &str = "registeredUsers";
const RESET_REQUESTS_KEY: &str = "passwordResetRequests";

/// The injected browser-storage analogue. One string value per key, no
/// transactional guarantees, single writer per process.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<std::collections::HashMap<String, String>>,
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
        }
    }
}

/// One file per key under a data directory.
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    pub fn new(directory: PathBuf) -> Result<Self, String> {
        if !directory.exists() {
            std::fs::create_dir_all(&directory)
                .map_err(|e| format!("Could not create {}: {e:?}", directory.display()))?;
        }
        Ok(Self { directory })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path(key);
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("Could not read {}: {e:?}", path.display());
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        let path = self.path(key);
        if let Err(e) = std::fs::write(&path, value) {
            log::error!("Could not write to {}: {e:?}", path.display());
        }
    }

    fn remove(&self, key: &str) {
        let path = self.path(key);
        if !path.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&path) {
            log::error!("Could not remove {}: {e:?}", path.display());
        }
    }
}

/// Owns the persisted schema: session token, current-user snapshot, the
/// registered-users list, password-reset requests, and per-user favorites
/// and interests. Everything except the token is a JSON blob.
#[derive(Clone)]
pub struct Repository {
    storage: Arc<dyn KeyValueStorage>,
}

impl Repository {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }

    // Session

    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn set_token(&self, token: &str) {
        self.storage.set(TOKEN_KEY, token);
    }

    pub fn clear_token(&self) {
        self.storage.remove(TOKEN_KEY);
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.read_json(USER_KEY)
    }

    pub fn set_current_user(&self, user: &UserProfile) {
        self.write_json(USER_KEY, user);
    }

    pub fn clear_session(&self) {
        self.storage.remove(USER_KEY);
        self.storage.remove(TOKEN_KEY);
    }

    // Registered users

    pub fn registered_users(&self) -> Vec<StoredUser> {
        self.read_json(REGISTERED_USERS_KEY).unwrap_or_default()
    }

    pub fn update_or_insert_user(&self, new_user: StoredUser) {
        let mut users = self.registered_users();
        let mut found = false;
        for user in users.iter_mut() {
            if user.profile.id == new_user.profile.id {
                *user = new_user.clone();
                found = true;
                break;
            }
        }

        if !found {
            users.push(new_user);
        }

        self.write_json(REGISTERED_USERS_KEY, &users);
    }

    pub fn remove_user(&self, id: u64) -> Result<(), String> {
        let mut users = self.registered_users();
        let Some(idx) = users.iter().position(|user| user.profile.id == id) else {
            return Err(format!("Unknown User {id}"));
        };
        users.remove(idx);
        self.write_json(REGISTERED_USERS_KEY, &users);

        // a deleted account may be the one that is logged in
        if self.current_user().map(|u| u.id) == Some(id) {
            self.clear_session();
        }
        Ok(())
    }

    pub fn user_by_username(&self, username: &str) -> Option<StoredUser> {
        self.registered_users()
            .into_iter()
            .find(|u| u.profile.username == username)
    }

    pub fn user_by_email(&self, email: &str) -> Option<StoredUser> {
        self.registered_users()
            .into_iter()
            .find(|u| u.profile.email == email)
    }

    pub fn user_by_token(&self, token: &str) -> Option<StoredUser> {
        self.registered_users()
            .into_iter()
            .find(|u| u.matches_token(token))
    }

    // Password reset

    pub fn reset_requests(&self) -> Vec<ResetRequest> {
        self.read_json(RESET_REQUESTS_KEY).unwrap_or_default()
    }

    pub fn save_reset_requests(&self, requests: &[ResetRequest]) {
        self.write_json(RESET_REQUESTS_KEY, &requests);
    }

    // Favorites & interests, keyed per user

    pub fn favorites(&self, user_id: u64) -> HashSet<String> {
        self.read_json(&format!("favorites_{user_id}"))
            .unwrap_or_default()
    }

    pub fn toggle_favorite(&self, user_id: u64, photo_id: &str) -> bool {
        let mut favorites = self.favorites(user_id);
        let now_set = if favorites.contains(photo_id) {
            favorites.remove(photo_id);
            false
        } else {
            favorites.insert(photo_id.to_string());
            true
        };
        self.write_json(&format!("favorites_{user_id}"), &favorites);
        now_set
    }

    pub fn is_favorite(&self, user_id: u64, photo_id: &str) -> bool {
        self.favorites(user_id).contains(photo_id)
    }

    pub fn interests(&self, user_id: u64) -> Vec<String> {
        self.read_json(&format!("interests_{user_id}"))
            .unwrap_or_default()
    }

    pub fn set_interests(&self, user_id: u64, interests: &[String]) {
        self.write_json(&format!("interests_{user_id}"), &interests);
    }

    // Blob access. Reads are defensive: a blob that no longer parses is
    // removed so the next write starts from a clean slate.

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = self.storage.get(key)?;
        match from_str(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("Could not parse stored value for {key}: {e:?}");
                self.storage.remove(key);
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) {
        match to_string_pretty(value) {
            Ok(data) => self.storage.set(key, &data),
            Err(e) => log::error!("Could not serialize value for {key}: {e:?}"),
        }
    }
}
