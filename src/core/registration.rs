use crate::errors::RegistrationError;
use crate::models::attendance::ParticipantIdentity;
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Check the registration form and build the guest identity.
pub fn register_guest(name: &str, email: &str) -> Result<ParticipantIdentity, RegistrationError> {
    let name = name.trim();
    let email = email.trim();

    if name.is_empty() {
        return Err(RegistrationError::EmptyName);
    }
    if !is_valid_email(email) {
        return Err(RegistrationError::InvalidEmail(email.to_string()));
    }

    Ok(ParticipantIdentity::Guest {
        name: name.to_string(),
        email: Some(email.to_string()),
    })
}
