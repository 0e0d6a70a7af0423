use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use reqwest::Client;
use tokio::sync::watch;

use super::error::SupabaseError;
use super::types::{Session, SupabaseOptions, TokenResponse};
use crate::traits::{IdentityProvider, User};

/// Supabase GoTrue client holding the current session in memory.
///
/// Every sign-in, refresh that changes the user, and sign-out is published
/// on a `watch` channel so hosts can react to identity changes.
pub struct SupabaseAuth {
    options: SupabaseOptions,
    http: Client,
    session: RwLock<Option<Session>>,
    identity_tx: watch::Sender<Option<User>>,
}

impl SupabaseAuth {
    pub fn new(options: SupabaseOptions) -> Result<Self, SupabaseError> {
        if options.url.trim().is_empty() || options.anon_key.trim().is_empty() {
            return Err(SupabaseError::Auth(
                "Supabase URL and anon key are required".into(),
            ));
        }
        let http = Client::builder().timeout(options.timeout).build()?;
        let (identity_tx, _) = watch::channel(None);
        Ok(Self {
            options,
            http,
            session: RwLock::new(None),
            identity_tx,
        })
    }

    pub fn options(&self) -> &SupabaseOptions {
        &self.options
    }

    fn token_url(&self, grant_type: &str) -> String {
        format!(
            "{}/auth/v1/token?grant_type={grant_type}",
            self.options.base_url()
        )
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, SupabaseError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "Supabase auth error");
            Err(SupabaseError::Api {
                status,
                message: body,
            })
        }
    }

    async fn request_token(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<TokenResponse, SupabaseError> {
        let resp = self
            .http
            .post(self.token_url(grant_type))
            .header("apikey", &self.options.anon_key)
            .json(&body)
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        resp.json::<TokenResponse>()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))
    }

    /// Authenticate with email and password.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, SupabaseError> {
        let token = self
            .request_token(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;

        let session = Session::from_token(token, Utc::now());
        let user = session.user.clone();
        tracing::info!(user_id = %user.id, "Signed in");
        self.store_session(Some(session));
        Ok(user)
    }

    /// Exchange the refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<Session, SupabaseError> {
        let token = self
            .request_token(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await?;
        let session = Session::from_token(token, Utc::now());
        tracing::debug!(user_id = %session.user.id, "Session refreshed");
        self.store_session(Some(session.clone()));
        Ok(session)
    }

    /// A bearer token for the current session, refreshed when close to expiry.
    pub async fn access_token(&self) -> Result<String, SupabaseError> {
        let session = self.current_session().ok_or(SupabaseError::NotSignedIn)?;
        if !session.is_expired(Utc::now()) {
            return Ok(session.access_token);
        }

        match session.refresh_token.as_deref() {
            Some(refresh_token) => Ok(self.refresh(refresh_token).await?.access_token),
            None => {
                tracing::info!("Session expired without a refresh token");
                self.store_session(None);
                Err(SupabaseError::NotSignedIn)
            }
        }
    }

    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the session and notify subscribers when the user changed.
    fn store_session(&self, session: Option<Session>) {
        let user = session.as_ref().map(|s| s.user.clone());
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
        self.identity_tx.send_if_modified(|current| {
            if *current == user {
                false
            } else {
                *current = user;
                true
            }
        });
    }
}

impl IdentityProvider for SupabaseAuth {
    type Error = SupabaseError;

    async fn current_user(&self) -> Result<Option<User>, SupabaseError> {
        Ok(self.current_session().map(|s| s.user))
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.identity_tx.subscribe()
    }

    async fn sign_out(&self) -> Result<(), SupabaseError> {
        let Some(session) = self.current_session() else {
            return Ok(());
        };

        // The local session is dropped even if the server call fails.
        self.store_session(None);
        tracing::info!(user_id = %session.user.id, "Signed out");

        let resp = self
            .http
            .post(format!("{}/auth/v1/logout", self.options.base_url()))
            .header("apikey", &self.options.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;

        match resp {
            Ok(resp) => {
                Self::check_response(resp).await?;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Logout request failed");
                Err(e.into())
            }
        }
    }
}
