//! Trait definitions for the external services sharc talks to.
//!
//! The TMDB catalog and the Supabase auth/table clients implement these
//! traits, so the watchlist store and the runtime stay service-agnostic and
//! can be driven by in-memory doubles in tests.

use std::future::Future;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Queries shorter than this (after trimming) never reach the catalog.
pub const MIN_QUERY_LEN: usize = 2;

/// Days covered by the "new releases" row, counting back from today.
pub const NEW_RELEASES_WINDOW_DAYS: i64 = 30;

/// Vote-count floor for the "new releases" row.
pub const NEW_RELEASES_MIN_VOTES: u32 = 50;

/// Read access to the movie catalog.
pub trait MovieCatalog: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// List every movie genre the catalog knows about.
    fn list_genres(&self) -> impl Future<Output = Result<Vec<Genre>, Self::Error>> + Send;

    /// Fetch one page of filtered, sorted catalog results.
    fn discover(
        &self,
        query: &DiscoverQuery,
    ) -> impl Future<Output = Result<DiscoverPage, Self::Error>> + Send;

    /// Free-text title search. Short queries resolve to an empty list
    /// without a request.
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<MovieSummary>, Self::Error>> + Send;

    /// Full details for one movie, `None` when the catalog has no such id.
    fn get_details(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<Option<MovieDetails>, Self::Error>> + Send;

    /// Recently released movies, newest first, capped at `limit`.
    fn new_releases(
        &self,
        today: NaiveDate,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<MovieSummary>, Self::Error>> + Send {
        let query = DiscoverQuery::new_releases(today);
        async move {
            let page = self.discover(&query).await?;
            Ok(page.results.into_iter().take(limit).collect())
        }
    }
}

/// The authentication backend. Only the consumed surface lives here.
pub trait IdentityProvider: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The currently signed-in user, if any.
    fn current_user(&self) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send;

    /// A receiver that observes every identity change.
    fn subscribe(&self) -> watch::Receiver<Option<User>>;

    /// End the session. Subscribers observe `None` afterwards.
    fn sign_out(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// The remote per-user table backing the watchlist.
pub trait WatchlistTable: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All rows belonging to `user`.
    fn list(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<Vec<WatchlistRow>, Self::Error>> + Send;

    /// Insert a new row keyed by `(user_id, movie_id)`.
    fn insert(&self, row: &WatchlistRow) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Delete the row for `(user, movie_id)`.
    fn delete(
        &self,
        user: &UserId,
        movie_id: u64,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Set the status column. Returns the number of rows matched.
    fn update_status(
        &self,
        user: &UserId,
        movie_id: u64,
        status: MovieStatus,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    /// Set the rating column. Returns the number of rows matched.
    fn update_rating(
        &self,
        user: &UserId,
        movie_id: u64,
        rating: Rating,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send;
}

/// Trim a search query and reject it when it is too short to send.
pub fn searchable_query(query: &str) -> Option<&str> {
    let trimmed = query.trim();
    (trimmed.chars().count() >= MIN_QUERY_LEN).then_some(trimmed)
}

// ── Catalog types ───────────────────────────────────────────────

/// A movie as it appears in catalog listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    /// ISO date, possibly partial or empty.
    pub release_date: String,
    pub vote_average: f32,
    pub genre_ids: Vec<u64>,
}

impl MovieSummary {
    /// The four-digit year, when the release date carries one.
    pub fn release_year(&self) -> Option<&str> {
        release_year(&self.release_date)
    }
}

/// Full details for a single movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: String,
    pub runtime_minutes: Option<u32>,
    pub vote_average: f32,
    pub overview: String,
    pub genres: Vec<Genre>,
}

impl MovieDetails {
    pub fn release_year(&self) -> Option<&str> {
        release_year(&self.release_date)
    }

    /// Runtime rendered as `2h 28m`.
    pub fn runtime_display(&self) -> Option<String> {
        match self.runtime_minutes {
            Some(0) | None => None,
            Some(m) if m < 60 => Some(format!("{m}m")),
            Some(m) => Some(format!("{}h {}m", m / 60, m % 60)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

/// One page of discover results.
#[derive(Debug, Clone)]
pub struct DiscoverPage {
    pub results: Vec<MovieSummary>,
    pub page: u32,
    pub total_pages: u32,
}

impl DiscoverPage {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Sort order accepted by the discover endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    RatingDesc,
    ReleaseDateDesc,
    TitleAsc,
}

impl SortKey {
    pub const ALL: &[SortKey] = &[Self::RatingDesc, Self::ReleaseDateDesc, Self::TitleAsc];

    /// TMDB `sort_by` value.
    pub fn to_tmdb_str(self) -> &'static str {
        match self {
            Self::RatingDesc => "vote_average.desc",
            Self::ReleaseDateDesc => "primary_release_date.desc",
            Self::TitleAsc => "title.asc",
        }
    }

    /// Parse the short names used on the command line and in config.
    pub fn from_short_str(s: &str) -> Option<Self> {
        match s {
            "rating" => Some(Self::RatingDesc),
            "release-date" => Some(Self::ReleaseDateDesc),
            "title" => Some(Self::TitleAsc),
            _ => None,
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RatingDesc => write!(f, "Rating (High to Low)"),
            Self::ReleaseDateDesc => write!(f, "Release Date (Newest)"),
            Self::TitleAsc => write!(f, "Title (A-Z)"),
        }
    }
}

/// Filters for one discover request.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverQuery {
    pub genre: Option<u64>,
    pub sort: SortKey,
    pub min_vote_count: u32,
    /// One-based.
    pub page: u32,
    /// Inclusive release-date bounds.
    pub released_between: Option<(NaiveDate, NaiveDate)>,
}

impl DiscoverQuery {
    pub fn new(genre: Option<u64>, sort: SortKey, min_vote_count: u32) -> Self {
        Self {
            genre,
            sort,
            min_vote_count,
            page: 1,
            released_between: None,
        }
    }

    /// The last [`NEW_RELEASES_WINDOW_DAYS`] days, newest first.
    pub fn new_releases(today: NaiveDate) -> Self {
        let from = today - Duration::days(NEW_RELEASES_WINDOW_DAYS);
        Self {
            genre: None,
            sort: SortKey::ReleaseDateDesc,
            min_vote_count: NEW_RELEASES_MIN_VOTES,
            page: 1,
            released_between: Some((from, today)),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }
}

// ── Identity types ──────────────────────────────────────────────

/// Opaque identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
}

// ── Watchlist types ─────────────────────────────────────────────

/// Where a saved movie sits in the user's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovieStatus {
    #[default]
    #[serde(rename = "watchList")]
    WatchList,
    #[serde(rename = "watching")]
    Watching,
    #[serde(rename = "watched")]
    Watched,
}

impl MovieStatus {
    pub const ALL: &[MovieStatus] = &[Self::WatchList, Self::Watching, Self::Watched];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WatchList => "Want to Watch",
            Self::Watching => "Watching",
            Self::Watched => "Watched",
        }
    }

    /// Value stored in the remote `status` column.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::WatchList => "watchList",
            Self::Watching => "watching",
            Self::Watched => "watched",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "watchList" => Some(Self::WatchList),
            "watching" => Some(Self::Watching),
            "watched" => Some(Self::Watched),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovieStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user rating between 1 and 10 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Result<Self, InvalidRating> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidRating(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = InvalidRating;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/10", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rating must be between 1 and 10, got {0}")]
pub struct InvalidRating(pub u8);

/// One row of the remote watchlist table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistRow {
    pub user_id: UserId,
    pub movie_id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub status: MovieStatus,
    pub rating: Option<Rating>,
}

fn release_year(date: &str) -> Option<&str> {
    let year = date.get(..4)?;
    year.chars().all(|c| c.is_ascii_digit()).then_some(year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searchable_query() {
        assert_eq!(searchable_query("  inception "), Some("inception"));
        assert_eq!(searchable_query("up"), Some("up"));
        assert_eq!(searchable_query("a"), None);
        assert_eq!(searchable_query("   "), None);
        assert_eq!(searchable_query(" x  "), None);
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert_eq!(Rating::new(1).unwrap().get(), 1);
        assert_eq!(Rating::new(10).unwrap().get(), 10);
        assert_eq!(Rating::new(11), Err(InvalidRating(11)));
    }

    #[test]
    fn test_rating_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Rating>("7").is_ok());
        assert!(serde_json::from_str::<Rating>("0").is_err());
        assert!(serde_json::from_str::<Rating>("42").is_err());
    }

    #[test]
    fn test_status_wire_values() {
        assert_eq!(
            serde_json::to_string(&MovieStatus::WatchList).unwrap(),
            r#""watchList""#
        );
        for status in MovieStatus::ALL {
            assert_eq!(MovieStatus::from_wire_str(status.as_wire_str()), Some(*status));
        }
        assert_eq!(MovieStatus::from_wire_str("completed"), None);
        assert_eq!(MovieStatus::default(), MovieStatus::WatchList);
    }

    #[test]
    fn test_row_deserializes_null_rating() {
        let json = r#"{
            "user_id": "2b1c0a4e-77e1-4c1d-9a5c-4c4b1d2f6e10",
            "movie_id": 27205,
            "title": "Inception",
            "poster_path": "/x.jpg",
            "release_date": "2010-07-16",
            "status": "watching",
            "rating": null
        }"#;
        let row: WatchlistRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.movie_id, 27205);
        assert_eq!(row.status, MovieStatus::Watching);
        assert!(row.rating.is_none());
    }

    #[test]
    fn test_new_releases_window() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let query = DiscoverQuery::new_releases(today);
        assert_eq!(query.sort, SortKey::ReleaseDateDesc);
        assert_eq!(query.min_vote_count, NEW_RELEASES_MIN_VOTES);
        assert_eq!(
            query.released_between,
            Some((NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), today))
        );
    }

    #[test]
    fn test_release_year_and_runtime() {
        let details = MovieDetails {
            id: 27205,
            title: "Inception".into(),
            poster_path: None,
            backdrop_path: None,
            release_date: "2010-07-16".into(),
            runtime_minutes: Some(148),
            vote_average: 8.4,
            overview: String::new(),
            genres: vec![],
        };
        assert_eq!(details.release_year(), Some("2010"));
        assert_eq!(details.runtime_display().as_deref(), Some("2h 28m"));
        assert_eq!(release_year(""), None);
        assert_eq!(release_year("20"), None);
    }
}
