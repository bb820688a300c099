use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use super::model::StringError;
use super::repository::Repository;
use super::types::{AuthError, ResetRequest, StoredUser, UserProfile};

const MOCK_TOKEN_PREFIXES: [&str; 2] = ["mock-token-", "mock-access-token-"];
const COMMON_PASSWORDS: [&str; 6] = ["password", "123456", "qwerty", "admin", "111111", "000000"];

/// Artificial latency for the purely local flows, so the mock feels like a
/// network service to the UI.
const MOCK_DELAY: Duration = Duration::from_secs(1);

/// The auth collaborator the screens talk to.
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError>;
    async fn user_info(&self, token: &str) -> Result<UserProfile, AuthError>;
    async fn update_user(
        &self,
        user_id: u64,
        token: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, AuthError>;
    async fn delete_user(&self, user_id: u64, token: &str) -> Result<(), AuthError>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub profile: UserProfile,
    pub token: String,
}

#[derive(Default, Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Deserialize)]
struct RemoteAuth {
    id: u64,
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "accessToken")]
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct RemoteUserList {
    users: Vec<UserProfile>,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    skip: u64,
    #[serde(default)]
    limit: u64,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserList {
    pub users: Vec<UserProfile>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

/// Mock account service: locally registered accounts (persisted through the
/// repository) are checked first, anything else is delegated to the remote
/// mock-auth HTTP API. Intentionally insecure, demo-grade.
#[derive(Clone)]
pub struct AccountService {
    base: Url,
    client: reqwest::Client,
    repository: Repository,
}

impl AccountService {
    pub fn new(base_url: &str, repository: Repository) -> Result<Self, String> {
        let base = Url::parse(base_url).string_error("auth api url")?;
        Ok(Self {
            base,
            client: reqwest::Client::new(),
            repository,
        })
    }

    fn is_mock_token(token: &str) -> bool {
        MOCK_TOKEN_PREFIXES.iter().any(|p| token.starts_with(p))
    }

    /// Register a new local account. The generated token carries the mock
    /// prefix so later validation never leaves the repository.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        Self::validate_password_strength(password)?;
        if self.repository.user_by_username(username).is_some() {
            return Err(AuthError::Remote(format!(
                "username {username} is already taken"
            )));
        }
        if self.repository.user_by_email(email).is_some() {
            return Err(AuthError::Remote(format!(
                "an account for {email} already exists"
            )));
        }

        let id = Utc::now().timestamp_millis() as u64;
        let token = format!("mock-token-{id}");
        let user = StoredUser {
            profile: UserProfile {
                id,
                username: username.to_string(),
                email: email.to_string(),
                ..Default::default()
            },
            password: password.to_string(),
            token: Some(token.clone()),
            access_token: None,
            updated_at: Some(Utc::now()),
        };
        self.repository.update_or_insert_user(user.clone());
        Ok(Session {
            profile: user.profile,
            token,
        })
    }

    pub async fn all_users(&self, token: &str, limit: u64, skip: u64) -> Result<UserList, AuthError> {
        let url = self
            .base
            .join(&format!("/users?limit={limit}&skip={skip}"))
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        let list: RemoteUserList = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?
            .json()
            .await
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        Ok(UserList {
            users: list.users,
            total: list.total,
            skip: list.skip,
            limit: list.limit,
        })
    }

    pub async fn update_user_role(
        &self,
        user_id: u64,
        token: &str,
        role: &str,
    ) -> Result<UserProfile, AuthError> {
        let url = self
            .base
            .join(&format!("/users/{user_id}"))
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        self.client
            .put(url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "role": role }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?
            .json()
            .await
            .map_err(|e| AuthError::Remote(format!("{e:?}")))
    }

    // Password reset. Requests live in the repository, expire after an hour
    // and are single use. The "email" is a log line.

    pub async fn request_password_reset(&self, email: &str) -> Result<ResetRequest, AuthError> {
        tokio::time::sleep(MOCK_DELAY).await;

        if self.repository.user_by_email(email).is_none() {
            return Err(AuthError::UserNotFound);
        }

        let now = Utc::now();
        let mut hasher = DefaultHasher::new();
        (email, now.timestamp_nanos_opt()).hash(&mut hasher);
        let request = ResetRequest {
            email: email.to_string(),
            token: format!("reset-token-{}-{:x}", now.timestamp_millis(), hasher.finish()),
            expires_at: now + ChronoDuration::hours(1),
            used: false,
        };

        let mut requests = self.repository.reset_requests();
        requests.push(request.clone());
        self.repository.save_reset_requests(&requests);

        log::info!(
            "Password reset link: /reset-password?token={}",
            request.token
        );
        Ok(request)
    }

    pub fn validate_reset_token(&self, token: &str) -> Result<String, AuthError> {
        let requests = self.repository.reset_requests();
        let Some(request) = requests.iter().find(|r| r.token == token && !r.used) else {
            return Err(AuthError::ResetTokenInvalid);
        };
        if Utc::now() > request.expires_at {
            return Err(AuthError::ResetTokenExpired);
        }
        Ok(request.email.clone())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        tokio::time::sleep(MOCK_DELAY).await;
        Self::validate_password_strength(new_password)?;

        let mut requests = self.repository.reset_requests();
        let Some(request) = requests.iter_mut().find(|r| r.token == token && !r.used) else {
            return Err(AuthError::ResetTokenInvalid);
        };
        if Utc::now() > request.expires_at {
            return Err(AuthError::ResetTokenExpired);
        }

        let Some(mut user) = self.repository.user_by_email(&request.email) else {
            return Err(AuthError::UserNotFound);
        };
        if user.password == new_password {
            return Err(AuthError::PasswordReused);
        }

        user.password = new_password.to_string();
        user.updated_at = Some(Utc::now());
        self.repository.update_or_insert_user(user);

        request.used = true;
        self.repository.save_reset_requests(&requests);
        Ok(())
    }

    pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
        if password.len() < 6 {
            return Err(AuthError::WeakPassword(
                "must be at least 6 characters".to_string(),
            ));
        }
        if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
            return Err(AuthError::WeakPassword("too common".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountApi for AccountService {
    async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        if let Some(user) = self.repository.user_by_username(username) {
            if user.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            let token = user
                .token
                .clone()
                .or(user.access_token.clone())
                .unwrap_or_else(|| format!("mock-token-{}", user.profile.id));
            return Ok(Session {
                profile: user.profile,
                token,
            });
        }

        let url = self
            .base
            .join("/auth/login")
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        if !response.status().is_success() {
            return Err(AuthError::InvalidCredentials);
        }
        let auth: RemoteAuth = response
            .json()
            .await
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;

        // the login payload is sparse, fetch the full profile
        let url = self
            .base
            .join(&format!("/users/{}", auth.id))
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        let profile: UserProfile = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?
            .json()
            .await
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;

        let token = auth
            .access_token
            .or(auth.token)
            .ok_or_else(|| AuthError::Remote("login response carried no token".to_string()))?;
        Ok(Session { profile, token })
    }

    async fn user_info(&self, token: &str) -> Result<UserProfile, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        if Self::is_mock_token(token) {
            return self
                .repository
                .user_by_token(token)
                .map(|u| u.profile)
                .ok_or(AuthError::InvalidToken);
        }

        let url = self
            .base
            .join("/auth/me")
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidToken),
            status if !status.is_success() => {
                Err(AuthError::Remote(format!("auth/me failed: {status}")))
            }
            _ => response
                .json()
                .await
                .map_err(|e| AuthError::Remote(format!("{e:?}"))),
        }
    }

    async fn update_user(
        &self,
        user_id: u64,
        token: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, AuthError> {
        if let Some(mut user) = self
            .repository
            .registered_users()
            .into_iter()
            .find(|u| u.profile.id == user_id)
        {
            if let Some(email) = update.email {
                user.profile.email = email;
            }
            if let Some(first_name) = update.first_name {
                user.profile.first_name = first_name;
            }
            if let Some(last_name) = update.last_name {
                user.profile.last_name = last_name;
            }
            if let Some(image) = update.image {
                user.profile.image = Some(image);
            }
            user.updated_at = Some(Utc::now());
            self.repository.update_or_insert_user(user.clone());

            if self.repository.current_user().map(|u| u.id) == Some(user_id) {
                self.repository.set_current_user(&user.profile);
            }
            return Ok(user.profile);
        }

        let url = self
            .base
            .join(&format!("/users/{user_id}"))
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        self.client
            .put(url)
            .bearer_auth(token)
            .json(&update)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?
            .json()
            .await
            .map_err(|e| AuthError::Remote(format!("{e:?}")))
    }

    async fn delete_user(&self, user_id: u64, token: &str) -> Result<(), AuthError> {
        if self
            .repository
            .registered_users()
            .iter()
            .any(|u| u.profile.id == user_id)
        {
            return self
                .repository
                .remove_user(user_id)
                .map_err(AuthError::Remote);
        }

        let url = self
            .base
            .join(&format!("/users/{user_id}"))
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        self.client
            .delete(url)
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Remote(format!("{e:?}")))?;
        Ok(())
    }
}
