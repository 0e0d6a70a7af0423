use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::traits::{User, UserId};

pub const DEFAULT_TABLE: &str = "saved_movies";

/// Connection settings shared by [`super::SupabaseAuth`] and [`super::SupabaseTable`].
#[derive(Debug, Clone)]
pub struct SupabaseOptions {
    /// Project URL, e.g. `https://abcd.supabase.co`.
    pub url: String,
    /// Public anon key, sent as the `apikey` header.
    pub anon_key: String,
    /// Table holding the watchlist rows.
    pub table: String,
    pub timeout: Duration,
}

impl SupabaseOptions {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            table: DEFAULT_TABLE.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

// ── GoTrue responses ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

#[derive(Debug, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

/// An authenticated session held in memory.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

/// Refresh this long before the access token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 30;

impl Session {
    pub fn from_token(token: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|secs| now + chrono::Duration::seconds(secs)),
            user: token.user.into_user(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) <= now)
    }
}

impl AuthUser {
    pub fn into_user(self) -> User {
        User {
            id: UserId(self.id),
            email: self.email,
        }
    }
}
