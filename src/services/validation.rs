// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Input checks for phone numbers, names and email addresses.

use validator::ValidateEmail;

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 50;
/// E.164 allows at most 15 digits.
const PHONE_MAX_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid phone number")]
    InvalidPhone,

    #[error("Invalid name")]
    InvalidName,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Email domain has no mail exchange")]
    NoMailExchange,
}

/// International number: optional `+`, no leading zero, 2–15 digits.
/// Returns the trimmed number.
pub fn validate_phone(input: &str) -> Result<&str, ValidationError> {
    let phone = input.trim();
    let digits = phone.strip_prefix('+').unwrap_or(phone);

    let well_formed = (2..=PHONE_MAX_DIGITS).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !digits.starts_with('0');

    if well_formed {
        Ok(phone)
    } else {
        Err(ValidationError::InvalidPhone)
    }
}

/// Letters, spaces and hyphens; 2–50 characters after trimming.
/// Returns the trimmed name.
pub fn validate_name(input: &str) -> Result<&str, ValidationError> {
    let name = input.trim();
    let len = name.chars().count();

    let well_formed = (NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len)
        && name
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '-')
        && name.chars().any(char::is_alphabetic);

    if well_formed {
        Ok(name)
    } else {
        Err(ValidationError::InvalidName)
    }
}

/// Syntax check only. The domain must contain a dot.
/// Returns the trimmed address.
pub fn validate_email_syntax(input: &str) -> Result<&str, ValidationError> {
    let email = input.trim();
    if !email.validate_email() {
        return Err(ValidationError::InvalidEmail);
    }
    match email_domain(email) {
        Some(domain) if domain.contains('.') && !domain.ends_with('.') => Ok(email),
        _ => Err(ValidationError::InvalidEmail),
    }
}

/// Part after the last `@`.
pub fn email_domain(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
}
