use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_GOAL: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub goal: u32,
    #[serde(default)]
    pub theme: Theme,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            goal: DEFAULT_GOAL,
            theme: Theme::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub country: String,
    pub timezone: String,
    #[serde(default)]
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
    pub count: u32,
    pub created_at: DateTime<Utc>,
}

/// Credentials and auth bookkeeping for one login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password_salt: String,
    pub password_hash: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub verification_token: Option<String>,
    #[serde(default)]
    pub reset_token: Option<String>,
    #[serde(default)]
    pub failed_logins: u32,
    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,
}

/// Everything persisted to the data file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Store {
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
    #[serde(default)]
    pub profiles: BTreeMap<String, UserProfile>,
    /// user id -> date (YYYY-MM-DD) -> record
    #[serde(default)]
    pub records: BTreeMap<String, BTreeMap<String, DailyRecord>>,
}

// ---- requests ----

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
    #[serde(default)]
    pub country: String,
    pub goal: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CountChangeRequest {
    pub date: Option<String>,
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct CountResetRequest {
    pub date: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryView {
    #[default]
    Month,
    Week,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub view: HistoryView,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreferencesUpdate {
    pub goal: Option<u32>,
    pub theme: Option<Theme>,
}

#[derive(Debug, Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm: bool,
}

// ---- responses ----

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            token: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub today: String,
    pub goal: u32,
    pub theme: Theme,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub percent: f64,
    pub remaining: u32,
    pub goal_met: bool,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub date: String,
    pub count: u32,
    pub goal: u32,
    pub progress: Progress,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryCell {
    pub day: u32,
    pub date: String,
    pub count: u32,
    pub goal_met: bool,
}

#[derive(Debug, Serialize)]
pub struct HistorySeries {
    pub view: &'static str,
    pub title: String,
    pub start_date: String,
    pub end_date: String,
    pub previous: String,
    pub next: String,
    pub goal: u32,
    pub days: Vec<HistoryCell>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub date: String,
    pub label: String,
    pub count: u32,
    pub goal: u32,
    pub percent: f64,
}

#[derive(Debug, Serialize)]
pub struct HistoryList {
    pub records: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub country: String,
    pub timezone: String,
}

impl From<&UserProfile> for AccountResponse {
    fn from(profile: &UserProfile) -> Self {
        Self {
            name: profile.name.clone(),
            surname: profile.surname.clone(),
            email: profile.email.clone(),
            country: profile.country.clone(),
            timezone: profile.timezone.clone(),
        }
    }
}
