pub use sharc_api::traits::{MovieStatus, Rating, User, UserId, WatchlistRow};

use serde::{Deserialize, Serialize};

use super::MovieCore;

/// A movie in the signed-in user's watchlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedMovie {
    pub id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub release_date: String,
    pub vote_average: f32,
    pub status: MovieStatus,
    pub rating: Option<Rating>,
}

impl SavedMovie {
    pub fn new(movie: MovieCore, status: MovieStatus) -> Self {
        Self {
            id: movie.id,
            title: movie.title,
            poster_path: movie.poster_path,
            release_date: movie.release_date,
            vote_average: movie.vote_average,
            status,
            rating: None,
        }
    }

    /// The remote table does not store the vote average; it reads back as 0.
    pub fn from_row(row: WatchlistRow) -> Self {
        Self {
            id: row.movie_id,
            title: row.title,
            poster_path: row.poster_path,
            release_date: row.release_date.unwrap_or_default(),
            vote_average: 0.0,
            status: row.status,
            rating: row.rating,
        }
    }

    pub fn to_row(&self, user: &UserId) -> WatchlistRow {
        WatchlistRow {
            user_id: user.clone(),
            movie_id: self.id,
            title: self.title.clone(),
            poster_path: self.poster_path.clone(),
            release_date: (!self.release_date.is_empty()).then(|| self.release_date.clone()),
            status: self.status,
            rating: self.rating,
        }
    }
}
