//! Credentials for the identity endpoint

use crate::config::{secret_string, SecretString};
use secrecy::ExposeSecret;

/// Username and password exchanged for a bearer token
///
/// The password is zeroized on drop and redacted from `Debug` output.
#[derive(Debug, Clone)]
pub struct Credential {
    username: String,
    password: SecretString,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Convenience constructor for plain strings
    pub fn from_plain(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(username, secret_string(password.into()))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Exposes the password for the duration of the borrow
    pub fn password(&self) -> &str {
        self.password.expose_secret().as_ref()
    }
}
