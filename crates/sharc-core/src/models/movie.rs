pub use sharc_api::traits::{
    DiscoverPage, DiscoverQuery, Genre, MovieDetails, MovieSummary, SortKey,
};

use serde::{Deserialize, Serialize};

/// The catalog fields copied into the watchlist when a movie is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieCore {
    pub id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub release_date: String,
    pub vote_average: f32,
}

impl From<&MovieSummary> for MovieCore {
    fn from(movie: &MovieSummary) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            poster_path: movie.poster_path.clone(),
            release_date: movie.release_date.clone(),
            vote_average: movie.vote_average,
        }
    }
}

impl From<&MovieDetails> for MovieCore {
    fn from(movie: &MovieDetails) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            poster_path: movie.poster_path.clone(),
            release_date: movie.release_date.clone(),
            vote_average: movie.vote_average,
        }
    }
}
