use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Photo API Types

/// A single photo as returned by the photo API. Only `id` is interpreted by
/// the feed logic (deduplication key); everything else is carried for the UI.
#[derive(Default, Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Photo {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub alt_description: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub urls: PhotoUrls,
    #[serde(default)]
    pub user: Option<PhotoAuthor>,
}

impl Photo {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[derive(Default, Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct PhotoUrls {
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub full: String,
    #[serde(default)]
    pub regular: String,
    #[serde(default)]
    pub small: String,
    #[serde(default)]
    pub thumb: String,
}

#[derive(Default, Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct PhotoAuthor {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Default, Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Collection {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub total_photos: u64,
    #[serde(default)]
    pub cover_photo: Option<Photo>,
}

// Filter Types

/// The color filter dimension. Serialized values match the photo API's
/// `color` query parameter.
#[derive(
    Copy,
    Clone,
    Debug,
    Serialize,
    Deserialize,
    Eq,
    PartialEq,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Color {
    BlackAndWhite,
    Black,
    White,
    Yellow,
    Orange,
    Red,
    Purple,
    Magenta,
    Green,
    Teal,
    Blue,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Serialize,
    Deserialize,
    Eq,
    PartialEq,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Landscape,
    Portrait,
    Squarish,
}

// Account Types

/// Session user snapshot. Remote accounts come from the mock-auth HTTP API
/// (camelCase payloads), locally registered accounts from the repository.
#[derive(Default, Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

/// A locally registered account, persisted as part of the registered-users
/// blob. Carries the (plaintext, demo-grade) password and the mock tokens.
#[derive(Default, Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub password: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredUser {
    pub fn matches_token(&self, token: &str) -> bool {
        self.token.as_deref() == Some(token) || self.access_token.as_deref() == Some(token)
    }
}

/// A pending password-reset request. Single use, expires after one hour.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ResetRequest {
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

// Errors

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthError {
    /// No session token is persisted at all
    MissingToken,
    /// The persisted token does not resolve to any account
    InvalidToken,
    InvalidCredentials,
    UserNotFound,
    WeakPassword(String),
    PasswordReused,
    ResetTokenInvalid,
    ResetTokenExpired,
    /// The mock-auth HTTP API rejected or failed the request
    Remote(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "no session token stored"),
            AuthError::InvalidToken => write!(f, "session token is invalid or expired"),
            AuthError::InvalidCredentials => write!(f, "invalid credentials"),
            AuthError::UserNotFound => write!(f, "user not found"),
            AuthError::WeakPassword(reason) => write!(f, "password rejected: {reason}"),
            AuthError::PasswordReused => {
                write!(f, "new password cannot be the same as the old password")
            }
            AuthError::ResetTokenInvalid => write!(f, "invalid or already used reset token"),
            AuthError::ResetTokenExpired => write!(f, "reset token has expired"),
            AuthError::Remote(e) => write!(f, "auth service error: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}
