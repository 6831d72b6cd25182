//! Input checks shared by every account route.
//!
//! Each check returns either the cleaned-up input or the first [`Rejection`] hit, in the
//! order the form fields are listed.

use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{SignInRequest, SignUpRequest};
use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingId,
    MissingEmail,
    InvalidEmail,
    MissingPassword,
    PasswordTooShort,
    MissingPasswordCheck,
    PasswordMismatch,
    MissingNickname,
}

impl Rejection {
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingId => "id is required",
            Self::MissingEmail => "email is required",
            Self::InvalidEmail => "email is not a valid address",
            Self::MissingPassword => "password is required",
            Self::PasswordTooShort => "password must be at least 6 characters",
            Self::MissingPasswordCheck => "please enter the password again",
            Self::PasswordMismatch => "passwords do not match",
            Self::MissingNickname => "nickname is required",
        }
    }
}

impl From<Rejection> for ApiError {
    fn from(r: Rejection) -> Self {
        ApiError::bad_request(r.message())
    }
}

/// A sign-up form that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub id: String,
    pub email: String,
    pub password: String,
    pub nickname: String,
    pub content: Option<String>,
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed text, with blank treated as absent.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Passwords are taken verbatim; only emptiness counts as missing.
fn secret(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// A single password that must be present and long enough.
pub fn password(value: Option<&str>) -> Result<&str, Rejection> {
    let password = secret(value).ok_or(Rejection::MissingPassword)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Rejection::PasswordTooShort);
    }
    Ok(password)
}

/// A password plus its confirmation.
pub fn password_pair<'a>(
    value: Option<&'a str>,
    check: Option<&'a str>,
) -> Result<&'a str, Rejection> {
    let password = password(value)?;
    let check = secret(check).ok_or(Rejection::MissingPasswordCheck)?;
    if password != check {
        return Err(Rejection::PasswordMismatch);
    }
    Ok(password)
}

pub fn sign_up(req: &SignUpRequest) -> Result<SignUp, Rejection> {
    let id = present(req.id.as_deref()).ok_or(Rejection::MissingId)?;
    let email = present(req.email.as_deref())
        .ok_or(Rejection::MissingEmail)?
        .to_lowercase();
    if !is_valid_email(&email) {
        return Err(Rejection::InvalidEmail);
    }
    let password = password_pair(req.password.as_deref(), req.password_check.as_deref())?;
    let nickname = present(req.nickname.as_deref()).ok_or(Rejection::MissingNickname)?;

    Ok(SignUp {
        id: id.to_string(),
        email,
        password: password.to_string(),
        nickname: nickname.to_string(),
        content: present(req.content.as_deref()).map(str::to_string),
    })
}

pub fn sign_in(req: &SignInRequest) -> Result<(&str, &str), Rejection> {
    let id = present(req.id.as_deref()).ok_or(Rejection::MissingId)?;
    let password = secret(req.password.as_deref()).ok_or(Rejection::MissingPassword)?;
    Ok((id, password))
}
