//! Session credential loaded from the login cookie file.

use std::fmt;
use std::path::Path;

use vidup_protocol::CookieFile;
use vidup_protocol::constants::CSRF_COOKIE;

use crate::error::UploadError;

/// Cookie header plus CSRF token, attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    cookie: String,
    csrf: String,
}

impl Credential {
    pub fn new(cookie: impl Into<String>, csrf: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
            csrf: csrf.into(),
        }
    }

    /// Reads the cookie file written by the login flow.
    pub fn load(path: &Path) -> Result<Self, UploadError> {
        let raw = std::fs::read(path).map_err(|e| {
            UploadError::Credential(format!("cannot read {}: {e}", path.display()))
        })?;
        if raw.is_empty() {
            return Err(UploadError::Credential(format!(
                "{} is empty, log in first",
                path.display()
            )));
        }
        let file: CookieFile = serde_json::from_slice(&raw)
            .map_err(|e| UploadError::Credential(format!("malformed cookie file: {e}")))?;
        Self::from_cookie_file(&file)
    }

    /// Joins the cookies as `name=value;` pairs and picks out the CSRF token.
    pub fn from_cookie_file(file: &CookieFile) -> Result<Self, UploadError> {
        let cookies = &file.data.cookie_info.cookies;
        if cookies.is_empty() {
            return Err(UploadError::Credential("cookie file holds no cookies".into()));
        }

        let mut cookie = String::new();
        let mut csrf = String::new();
        for entry in cookies {
            cookie.push_str(&entry.name);
            cookie.push('=');
            cookie.push_str(&entry.value);
            cookie.push(';');
            if entry.name == CSRF_COOKIE {
                csrf = entry.value.clone();
            }
        }

        Ok(Self { cookie, csrf })
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    /// Value of the `bili_jct` cookie; empty if the file had none.
    pub fn csrf(&self) -> &str {
        &self.csrf
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("cookie", &"<redacted>")
            .field("csrf", &"<redacted>")
            .finish()
    }
}
