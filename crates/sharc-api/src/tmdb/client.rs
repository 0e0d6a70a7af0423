use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;

use super::error::TmdbError;
use super::types::{TmdbGenreList, TmdbMovieDetails, TmdbPagedResponse};
use crate::traits::{
    searchable_query, DiscoverPage, DiscoverQuery, Genre, MovieCatalog, MovieDetails,
    MovieSummary,
};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";

/// Connection settings for [`TmdbClient`].
#[derive(Debug, Clone)]
pub struct TmdbOptions {
    pub api_key: String,
    pub base_url: String,
    pub image_base_url: String,
    pub timeout: Duration,
}

impl TmdbOptions {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Poster and backdrop widths served by the image CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    W200,
    W342,
    W500,
    Original,
}

impl ImageSize {
    fn as_path(self) -> &'static str {
        match self {
            Self::W200 => "w200",
            Self::W342 => "w342",
            Self::W500 => "w500",
            Self::Original => "original",
        }
    }
}

/// TMDB v3 API client.
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    image_base_url: String,
    http: Client,
}

impl TmdbClient {
    pub fn new(options: TmdbOptions) -> Result<Self, TmdbError> {
        if options.api_key.trim().is_empty() {
            return Err(TmdbError::NotConfigured("TMDB API key is required".into()));
        }
        Url::parse(&options.base_url)
            .map_err(|e| TmdbError::NotConfigured(format!("invalid base URL: {e}")))?;

        let http = Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            api_key: options.api_key,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            image_base_url: options.image_base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Full image URL for a poster/backdrop path, `None` when there is no path.
    pub fn image_url(&self, path: Option<&str>, size: ImageSize) -> Option<String> {
        let path = path.filter(|p| !p.is_empty())?;
        let sep = if path.starts_with('/') { "" } else { "/" };
        Some(format!(
            "{}/{}{sep}{path}",
            self.image_base_url,
            size.as_path()
        ))
    }

    /// Map error statuses to [`TmdbError`] variants.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, TmdbError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        tracing::warn!(status = status.as_u16(), "TMDB API error");
        match status {
            StatusCode::UNAUTHORIZED => {
                Err(TmdbError::NotConfigured("invalid TMDB API key".into()))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(TmdbError::RateLimited),
            _ => {
                let body = resp.text().await.unwrap_or_default();
                Err(TmdbError::Api {
                    status: status.as_u16(),
                    message: body,
                })
            }
        }
    }

    fn discover_params(&self, query: &DiscoverQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("api_key", self.api_key.clone()),
            ("page", query.page.max(1).to_string()),
            ("sort_by", query.sort.to_tmdb_str().to_string()),
            ("vote_count.gte", query.min_vote_count.to_string()),
        ];
        if let Some(genre) = query.genre {
            params.push(("with_genres", genre.to_string()));
        }
        if let Some((from, to)) = query.released_between {
            params.push(("primary_release_date.gte", from.format("%Y-%m-%d").to_string()));
            params.push(("primary_release_date.lte", to.format("%Y-%m-%d").to_string()));
        }
        params
    }
}

impl MovieCatalog for TmdbClient {
    type Error = TmdbError;

    async fn list_genres(&self) -> Result<Vec<Genre>, TmdbError> {
        let resp = self
            .http
            .get(format!("{}/genre/movie/list", self.base_url))
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let list: TmdbGenreList = resp
            .json()
            .await
            .map_err(|e| TmdbError::Parse(e.to_string()))?;

        Ok(list.genres.into_iter().map(|g| g.into_genre()).collect())
    }

    async fn discover(&self, query: &DiscoverQuery) -> Result<DiscoverPage, TmdbError> {
        tracing::debug!(
            page = query.page,
            sort = query.sort.to_tmdb_str(),
            genre = ?query.genre,
            "TMDB discover"
        );

        let resp = self
            .http
            .get(format!("{}/discover/movie", self.base_url))
            .query(&self.discover_params(query))
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let page: TmdbPagedResponse = resp
            .json()
            .await
            .map_err(|e| TmdbError::Parse(e.to_string()))?;

        Ok(page.into_page())
    }

    async fn search(&self, query: &str) -> Result<Vec<MovieSummary>, TmdbError> {
        let Some(query) = searchable_query(query) else {
            return Ok(Vec::new());
        };

        tracing::debug!(query, "TMDB movie search");

        let resp = self
            .http
            .get(format!("{}/search/movie", self.base_url))
            .query(&[("api_key", self.api_key.as_str()), ("query", query)])
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let page: TmdbPagedResponse = resp
            .json()
            .await
            .map_err(|e| TmdbError::Parse(e.to_string()))?;

        Ok(page.into_page().results)
    }

    async fn get_details(&self, id: u64) -> Result<Option<MovieDetails>, TmdbError> {
        let resp = self
            .http
            .get(format!("{}/movie/{id}", self.base_url))
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            tracing::debug!(id, "TMDB movie not found");
            return Ok(None);
        }

        let resp = Self::check_response(resp).await?;
        let details: TmdbMovieDetails = resp
            .json()
            .await
            .map_err(|e| TmdbError::Parse(e.to_string()))?;

        Ok(Some(details.into_details()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use httpmock::prelude::*;
    use httpmock::MockServer;

    use super::*;
    use crate::traits::SortKey;

    fn client_for(server: &MockServer) -> TmdbClient {
        TmdbClient::new(TmdbOptions {
            api_key: "test-key".into(),
            base_url: server.base_url(),
            image_base_url: "https://image.tmdb.org/t/p/".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let err = TmdbClient::new(TmdbOptions::new("  ")).err().unwrap();
        assert!(matches!(err, TmdbError::NotConfigured(_)));
    }

    #[test]
    fn test_image_url() {
        let client = TmdbClient::new(TmdbOptions::new("k")).unwrap();
        assert_eq!(
            client.image_url(Some("/x.jpg"), ImageSize::W342).as_deref(),
            Some("https://image.tmdb.org/t/p/w342/x.jpg")
        );
        assert_eq!(client.image_url(None, ImageSize::W200), None);
        assert_eq!(client.image_url(Some(""), ImageSize::W200), None);
    }

    #[tokio::test]
    async fn test_discover_sends_filters() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/discover/movie")
                .query_param("api_key", "test-key")
                .query_param("page", "2")
                .query_param("sort_by", "title.asc")
                .query_param("vote_count.gte", "500")
                .query_param("with_genres", "878");
            then.status(200).json_body(serde_json::json!({
                "page": 2,
                "results": [{"id": 27205, "title": "Inception", "vote_average": 8.4}],
                "total_pages": 3
            }));
        });

        let client = client_for(&server);
        let query = DiscoverQuery::new(Some(878), SortKey::TitleAsc, 500).with_page(2);
        let page = client.discover(&query).await.unwrap();

        mock.assert();
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.results[0].title, "Inception");
    }

    #[tokio::test]
    async fn test_new_releases_uses_date_window() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/discover/movie")
                .query_param("sort_by", "primary_release_date.desc")
                .query_param("vote_count.gte", "50")
                .query_param("primary_release_date.gte", "2024-03-01")
                .query_param("primary_release_date.lte", "2024-03-31");
            then.status(200).json_body(serde_json::json!({
                "page": 1,
                "results": [{"id": 1, "title": "A"}, {"id": 2, "title": "B"}, {"id": 3, "title": "C"}],
                "total_pages": 1
            }));
        });

        let client = client_for(&server);
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let movies = client.new_releases(today, 2).await.unwrap();

        mock.assert();
        assert_eq!(movies.len(), 2);
        assert_eq!(movies[1].id, 2);
    }

    #[tokio::test]
    async fn test_short_search_skips_request() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/search/movie");
            then.status(200).json_body(serde_json::json!({"results": []}));
        });

        let client = client_for(&server);
        assert!(client.search(" a ").await.unwrap().is_empty());
        assert!(client.search("").await.unwrap().is_empty());
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_search_trims_query() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/search/movie")
                .query_param("query", "inception");
            then.status(200).json_body(serde_json::json!({
                "results": [{"id": 27205, "title": "Inception", "release_date": "2010-07-15"}]
            }));
        });

        let client = client_for(&server);
        let results = client.search("  inception ").await.unwrap();
        mock.assert();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_details_not_found_is_none() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/movie/999999999");
            then.status(404)
                .json_body(serde_json::json!({"status_code": 34, "success": false}));
        });

        let client = client_for(&server);
        assert!(client.get_details(999_999_999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/genre/movie/list");
            then.status(401);
        });
        server.mock(|when, then| {
            when.method(GET).path("/movie/1");
            then.status(429);
        });
        server.mock(|when, then| {
            when.method(GET).path("/movie/2");
            then.status(500).body("boom");
        });

        let client = client_for(&server);
        assert!(matches!(
            client.list_genres().await,
            Err(TmdbError::NotConfigured(_))
        ));
        assert!(matches!(
            client.get_details(1).await,
            Err(TmdbError::RateLimited)
        ));
        match client.get_details(2).await {
            Err(TmdbError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
