//! Plain-text rendering for terminal output.

use sharc_core::models::{Genre, MovieDetails, MovieSummary, SavedMovie};
use sharc_core::store::MutationOutcome;

pub fn genre_line(genre: &Genre) -> String {
    format!("{:>6}  {}", genre.id, genre.name)
}

pub fn summary_line(movie: &MovieSummary) -> String {
    let year = movie
        .release_year()
        .map(|y| format!(" ({y})"))
        .unwrap_or_default();
    format!(
        "{:>8}  {}{year}  {}",
        movie.id,
        movie.title,
        vote(movie.vote_average)
    )
}

pub fn saved_line(movie: &SavedMovie) -> String {
    let year = movie
        .release_date
        .get(..4)
        .map(|y| format!(" ({y})"))
        .unwrap_or_default();
    let rating = movie
        .rating
        .map(|r| format!("  rated {r}"))
        .unwrap_or_default();
    format!(
        "{:>8}  [{}] {}{year}{rating}",
        movie.id, movie.status, movie.title
    )
}

pub fn details(movie: &MovieDetails, poster_url: Option<&str>) -> String {
    let mut lines = vec![match movie.release_year() {
        Some(year) => format!("{} ({year})", movie.title),
        None => movie.title.clone(),
    }];

    let mut facts = vec![vote(movie.vote_average)];
    if let Some(runtime) = movie.runtime_display() {
        facts.push(runtime);
    }
    if !movie.genres.is_empty() {
        facts.push(
            movie
                .genres
                .iter()
                .map(|g| g.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        );
    }
    lines.push(facts.join("  ·  "));

    if !movie.overview.is_empty() {
        lines.push(String::new());
        lines.push(movie.overview.clone());
    }
    if let Some(url) = poster_url {
        lines.push(String::new());
        lines.push(format!("Poster: {url}"));
    }
    lines.join("\n")
}

pub fn outcome(action: &str, id: u64, outcome: MutationOutcome) -> String {
    match outcome {
        MutationOutcome::Applied => format!("{action}: movie {id}"),
        MutationOutcome::NoIdentity => "Not signed in; nothing changed.".to_string(),
        MutationOutcome::NotFound => format!("Movie {id} is not in your watchlist."),
        MutationOutcome::Discarded => {
            "Account changed while saving; run `sharc list` to check.".to_string()
        }
    }
}

fn vote(average: f32) -> String {
    if average > 0.0 {
        format!("★ {average:.1}")
    } else {
        "★ –".to_string()
    }
}

#[cfg(test)]
mod tests {
    use sharc_core::models::{MovieStatus, Rating};

    use super::*;

    fn matrix() -> MovieSummary {
        MovieSummary {
            id: 603,
            title: "The Matrix".into(),
            poster_path: None,
            release_date: "1999-03-31".into(),
            vote_average: 8.2,
            genre_ids: vec![878],
        }
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(summary_line(&matrix()), "     603  The Matrix (1999)  ★ 8.2");

        let mut undated = matrix();
        undated.release_date.clear();
        undated.vote_average = 0.0;
        assert_eq!(summary_line(&undated), "     603  The Matrix  ★ –");
    }

    #[test]
    fn test_saved_line_shows_status_and_rating() {
        let movie = SavedMovie {
            id: 603,
            title: "The Matrix".into(),
            poster_path: None,
            release_date: "1999-03-31".into(),
            vote_average: 0.0,
            status: MovieStatus::Watched,
            rating: Some(Rating::new(9).unwrap()),
        };
        assert_eq!(
            saved_line(&movie),
            "     603  [Watched] The Matrix (1999)  rated 9/10"
        );
    }

    #[test]
    fn test_details_block() {
        let movie = MovieDetails {
            id: 27205,
            title: "Inception".into(),
            poster_path: Some("/x.jpg".into()),
            backdrop_path: None,
            release_date: "2010-07-16".into(),
            runtime_minutes: Some(148),
            vote_average: 8.4,
            overview: "A thief who steals corporate secrets.".into(),
            genres: vec![Genre {
                id: 878,
                name: "Science Fiction".into(),
            }],
        };
        let text = details(&movie, Some("https://image.tmdb.org/t/p/w342/x.jpg"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Inception (2010)");
        assert_eq!(lines[1], "★ 8.4  ·  2h 28m  ·  Science Fiction");
        assert_eq!(lines[3], "A thief who steals corporate secrets.");
        assert_eq!(lines[5], "Poster: https://image.tmdb.org/t/p/w342/x.jpg");
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            outcome("Removed", 603, MutationOutcome::Applied),
            "Removed: movie 603"
        );
        assert_eq!(
            outcome("Rated", 42, MutationOutcome::NotFound),
            "Movie 42 is not in your watchlist."
        );
    }
}
