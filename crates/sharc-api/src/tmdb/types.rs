use serde::Deserialize;

use crate::traits::{DiscoverPage, Genre, MovieDetails, MovieSummary};

// ── Listing responses (discover / search) ───────────────────────

#[derive(Debug, Deserialize)]
pub struct TmdbPagedResponse {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<TmdbMovie>,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Debug, Deserialize)]
pub struct TmdbMovie {
    pub id: u64,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f32>,
    pub genre_ids: Option<Vec<u64>>,
}

// ── Detail response ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TmdbMovieDetails {
    pub id: u64,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<u32>,
    pub vote_average: Option<f32>,
    pub overview: Option<String>,
    pub genres: Option<Vec<TmdbGenre>>,
}

// ── Genres ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TmdbGenreList {
    pub genres: Vec<TmdbGenre>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbGenre {
    pub id: u64,
    pub name: String,
}

fn first_page() -> u32 {
    1
}

// ── Conversions to shared trait types ───────────────────────────

impl TmdbMovie {
    pub fn into_summary(self) -> MovieSummary {
        MovieSummary {
            id: self.id,
            title: self.title.unwrap_or_default(),
            poster_path: self.poster_path,
            release_date: self.release_date.unwrap_or_default(),
            vote_average: self.vote_average.unwrap_or(0.0),
            genre_ids: self.genre_ids.unwrap_or_default(),
        }
    }
}

impl TmdbPagedResponse {
    pub fn into_page(self) -> DiscoverPage {
        DiscoverPage {
            results: self.results.into_iter().map(TmdbMovie::into_summary).collect(),
            page: self.page,
            total_pages: self.total_pages,
        }
    }
}

impl TmdbMovieDetails {
    pub fn into_details(self) -> MovieDetails {
        MovieDetails {
            id: self.id,
            title: self.title.unwrap_or_default(),
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            release_date: self.release_date.unwrap_or_default(),
            runtime_minutes: self.runtime,
            vote_average: self.vote_average.unwrap_or(0.0),
            overview: self.overview.unwrap_or_default(),
            genres: self
                .genres
                .map(|g| g.into_iter().map(TmdbGenre::into_genre).collect())
                .unwrap_or_default(),
        }
    }
}

impl TmdbGenre {
    pub fn into_genre(self) -> Genre {
        Genre {
            id: self.id,
            name: self.name,
        }
    }
}
