use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// A registered account. The password is stored only as an argon2 hash;
/// plaintext never reaches the repository layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.trim().chars().count();
    if !(3..=150).contains(&len) || username.trim() != username {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_bounds() {
        assert!(validate_username("bob").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(" padded ").is_err());
        assert!(validate_username(&"x".repeat(151)).is_err());
    }
}
