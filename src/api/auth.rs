//! Registry credentials for authenticated image operations.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Header carrying encoded registry credentials.
pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// Credentials for one registry.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Account name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Account password or token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Account e-mail.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

impl AuthConfig {
    /// Encode the credentials the way the engine expects them.
    ///
    /// The JSON record, with empty fields left out and a trailing newline, is
    /// encoded as URL-safe base64 with padding.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Encode` if serialisation fails.
    pub fn encode(&self) -> Result<String> {
        let mut json = serde_json::to_vec(self).map_err(|error| ApiError::Encode {
            what: "registry auth",
            message: error.to_string(),
        })?;
        json.push(b'\n');
        Ok(URL_SAFE.encode(json))
    }

    /// Returns the header name and encoded value.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Encode` if serialisation fails.
    pub fn registry_auth_header(&self) -> Result<(&'static str, String)> {
        Ok((REGISTRY_AUTH_HEADER, self.encode()?))
    }
}
