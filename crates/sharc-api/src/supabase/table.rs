use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use serde::de::IgnoredAny;

use super::auth::SupabaseAuth;
use super::error::SupabaseError;
use crate::traits::{MovieStatus, Rating, UserId, WatchlistRow, WatchlistTable};

/// PostgREST client for the watchlist table.
///
/// Requests are authorized with the session held by [`SupabaseAuth`], so
/// row-level security scopes every query to the signed-in user.
pub struct SupabaseTable {
    auth: Arc<SupabaseAuth>,
    http: Client,
    endpoint: String,
}

impl SupabaseTable {
    pub fn new(auth: Arc<SupabaseAuth>) -> Result<Self, SupabaseError> {
        let options = auth.options();
        let http = Client::builder().timeout(options.timeout).build()?;
        let endpoint = format!("{}/rest/v1/{}", options.base_url(), options.table);
        Ok(Self {
            auth,
            http,
            endpoint,
        })
    }

    async fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, SupabaseError> {
        let token = self.auth.access_token().await?;
        Ok(req
            .header("apikey", &self.auth.options().anon_key)
            .bearer_auth(token))
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, SupabaseError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "Supabase table error");
            Err(SupabaseError::Api {
                status,
                message: body,
            })
        }
    }

    fn row_filter(user: &UserId, movie_id: u64) -> [(&'static str, String); 2] {
        [
            ("user_id", format!("eq.{user}")),
            ("movie_id", format!("eq.{movie_id}")),
        ]
    }

    /// PATCH a single column and return how many rows matched.
    async fn patch_row(
        &self,
        user: &UserId,
        movie_id: u64,
        body: serde_json::Value,
    ) -> Result<u64, SupabaseError> {
        let req = self
            .http
            .patch(&self.endpoint)
            .query(&Self::row_filter(user, movie_id))
            .query(&[("select", "movie_id")])
            .header("Prefer", "return=representation")
            .json(&body);

        let resp = self.authorized(req).await?.send().await?;
        let resp = Self::check_response(resp).await?;
        let rows: Vec<IgnoredAny> = resp
            .json()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))?;

        Ok(rows.len() as u64)
    }
}

impl WatchlistTable for SupabaseTable {
    type Error = SupabaseError;

    async fn list(&self, user: &UserId) -> Result<Vec<WatchlistRow>, SupabaseError> {
        let req = self.http.get(&self.endpoint).query(&[
            ("user_id", format!("eq.{user}")),
            ("select", "*".to_string()),
            ("order", "created_at.asc".to_string()),
        ]);

        let resp = self.authorized(req).await?.send().await?;
        let resp = Self::check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))
    }

    async fn insert(&self, row: &WatchlistRow) -> Result<(), SupabaseError> {
        let req = self
            .http
            .post(&self.endpoint)
            .header("Prefer", "return=minimal")
            .json(row);

        let resp = self.authorized(req).await?.send().await?;
        Self::check_response(resp).await?;
        Ok(())
    }

    async fn delete(&self, user: &UserId, movie_id: u64) -> Result<(), SupabaseError> {
        let req = self
            .http
            .delete(&self.endpoint)
            .query(&Self::row_filter(user, movie_id));

        let resp = self.authorized(req).await?.send().await?;
        Self::check_response(resp).await?;
        Ok(())
    }

    async fn update_status(
        &self,
        user: &UserId,
        movie_id: u64,
        status: MovieStatus,
    ) -> Result<u64, SupabaseError> {
        self.patch_row(user, movie_id, serde_json::json!({ "status": status }))
            .await
    }

    async fn update_rating(
        &self,
        user: &UserId,
        movie_id: u64,
        rating: Rating,
    ) -> Result<u64, SupabaseError> {
        self.patch_row(user, movie_id, serde_json::json!({ "rating": rating }))
            .await
    }
}
