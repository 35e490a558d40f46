//! Session construction options.

use std::time::Duration;

use crate::envelope::DEFAULT_EXPECTED_VERSION;
use crate::error::{Error, Result};
use crate::paginate::DEFAULT_MAX_REQUEST_BYTES;
use crate::retry::RetryPolicy;

/// Read when no auth token is given explicitly.
pub const AUTH_TOKEN_ENV: &str = "VIZLINK_AUTH_TOKEN";

/// Read when no encryption key is given explicitly.
pub const ENCRYPTION_KEY_ENV: &str = "VIZLINK_ENCRYPTION_KEY";

/// Everything a [`Session`](crate::Session) needs besides its transport.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub auth_token: Option<String>,
    pub encryption_key: Option<String>,
    pub retry: RetryPolicy,
    pub expected_version: String,
    pub max_request_bytes: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auth_token: None,
            encryption_key: None,
            retry: RetryPolicy::default(),
            expected_version: DEFAULT_EXPECTED_VERSION.into(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    pub fn retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.retry = RetryPolicy::new(max_attempts, backoff);
        self
    }

    pub fn expected_version(mut self, version: impl Into<String>) -> Self {
        self.expected_version = version.into();
        self
    }

    pub fn max_request_bytes(mut self, bytes: u64) -> Self {
        self.max_request_bytes = bytes;
        self
    }

    /// Fill unset credentials from the process environment.
    pub fn resolve(self) -> Result<Self> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Fill unset credentials from `lookup`. Empty values count as unset.
    pub fn resolve_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: Option<String>, env: &str| {
            explicit
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(env).filter(|v| !v.is_empty()))
        };
        self.auth_token = pick(self.auth_token, AUTH_TOKEN_ENV);
        self.encryption_key = pick(self.encryption_key, ENCRYPTION_KEY_ENV);

        if self.auth_token.is_none() {
            return Err(Error::MissingAuthToken(AUTH_TOKEN_ENV));
        }
        if self.expected_version.is_empty() {
            return Err(Error::Config("expected version must not be empty".into()));
        }
        Ok(self)
    }
}

impl std::fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("encryption", &self.encryption_key.is_some())
            .field("retry", &self.retry)
            .field("expected_version", &self.expected_version)
            .field("max_request_bytes", &self.max_request_bytes)
            .finish()
    }
}
