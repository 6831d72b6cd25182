use serde::{Deserialize, Serialize};

use super::repo_types::UserProfile;

// Request fields are all optional; `validation` reports which one is missing.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub id: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_check: Option<String>,
    pub nickname: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignInRequest {
    pub id: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    pub auth_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub content: Option<String>,
    pub password: Option<String>,
    pub password_check: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CloseAccountRequest {
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutQuery {
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessMessage {
    pub success: bool,
    pub message: String,
}

impl SuccessMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub success: bool,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub is_success: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdated {
    pub success: bool,
    pub message: String,
    pub user: UserProfile,
}

/// Fields shown on the profile edit form.
#[derive(Debug, Serialize)]
pub struct EditableProfile {
    pub id: String,
    pub nickname: String,
    pub content: Option<String>,
}
