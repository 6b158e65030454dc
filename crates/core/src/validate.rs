//! Input validation rules shared by the credential and item flows.

use crate::error::{DomainError, DomainResult};

/// Minimum accepted password length (in bytes).
pub const MIN_PASSWORD_LEN: usize = 8;

/// Basic email shape check: longer than 3 characters, contains `@` and `.`.
pub fn is_valid_email(email: &str) -> bool {
    email.len() > 3 && email.contains('@') && email.contains('.')
}

pub fn validate_email(email: &str) -> DomainResult<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(DomainError::validation("invalid email format"))
    }
}

pub fn validate_password(password: &str) -> DomainResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Item names must be non-empty once surrounding whitespace is removed.
pub fn validate_item_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("item name is required"));
    }
    Ok(())
}
