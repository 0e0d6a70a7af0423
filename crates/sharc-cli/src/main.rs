mod cli;
mod error;
mod logging;
mod output;

use std::process;

use clap::Parser;

use sharc_core::config::AppConfig;
use sharc_core::models::{MovieStatus, SortKey};
use sharc_runtime::Runtime;

use crate::cli::{Cli, Command, Credentials};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(2);
        }
    };

    let _log_guard = match logging::init(&config.logging, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(e.exit_code());
        }
    };

    if let Err(e) = run(cli, config).await {
        tracing::debug!(error = ?e, "Command failed");
        eprintln!("error: {e}");
        process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), CliError> {
    let runtime = Runtime::with_config(config)?;

    if cli.command.needs_sign_in() {
        sign_in(&runtime, &cli.credentials).await?;
    }

    match cli.command {
        Command::Genres => {
            for genre in runtime.genres().await? {
                println!("{}", output::genre_line(&genre));
            }
        }
        Command::Discover { genre, sort, pages } => {
            let sort = sort
                .map(SortKey::from)
                .unwrap_or_else(|| runtime.config().default_sort());
            let page = runtime.browse(genre, sort).await?;

            if let Some(id) = genre {
                let name = page
                    .genres
                    .iter()
                    .find(|g| g.id == id)
                    .map(|g| g.name.as_str())
                    .unwrap_or("Unknown genre");
                println!("{name}, by {sort}");
            } else {
                println!("All genres, by {sort}");
            }
            for movie in &page.movies {
                println!("{}", output::summary_line(movie));
            }

            for _ in 1..pages {
                if !runtime.has_more().await {
                    break;
                }
                for movie in runtime.load_more().await?.unwrap_or_default() {
                    println!("{}", output::summary_line(&movie));
                }
            }
        }
        Command::NewReleases => {
            let movies = runtime.new_releases().await?;
            if movies.is_empty() {
                println!("No new releases in the last 30 days.");
            }
            for movie in &movies {
                println!("{}", output::summary_line(movie));
            }
        }
        Command::Search { query, all } => {
            let query = query.join(" ");
            let movies = if all {
                runtime.search_all(&query).await?
            } else {
                runtime.search(&query).await.unwrap_or_default()
            };
            if movies.is_empty() {
                println!("No results for \"{query}\".");
            }
            for movie in &movies {
                println!("{}", output::summary_line(movie));
            }
        }
        Command::Show { id } => {
            let movie = runtime.details(id).await?;
            let poster = runtime.poster_url(movie.poster_path.as_deref());
            println!("{}", output::details(&movie, poster.as_deref()));
        }
        Command::List { status } => {
            let movies = match status {
                Some(status) => runtime.watchlist_by_status(status.into())?,
                None => runtime.watchlist()?.movies,
            };
            if movies.is_empty() {
                println!("Your watchlist is empty.");
            }
            for movie in &movies {
                println!("{}", output::saved_line(movie));
            }
        }
        Command::Add { id, status } => {
            let status = MovieStatus::from(status);
            let outcome = runtime.add_to_watchlist(id, status).await?;
            println!("{}", output::outcome(&format!("Saved as {status}"), id, outcome));
        }
        Command::Remove { id } => {
            let outcome = runtime.remove_from_watchlist(id).await?;
            println!("{}", output::outcome("Removed", id, outcome));
        }
        Command::Status { id, status } => {
            let status = MovieStatus::from(status);
            let outcome = runtime.set_status(id, status).await?;
            println!("{}", output::outcome(&format!("Marked {status}"), id, outcome));
        }
        Command::Rate { id, rating } => {
            let outcome = runtime.rate(id, rating).await?;
            println!("{}", output::outcome(&format!("Rated {rating}"), id, outcome));
        }
    }

    Ok(())
}

async fn sign_in(runtime: &Runtime, credentials: &Credentials) -> Result<(), CliError> {
    let (Some(email), Some(password)) = (&credentials.email, &credentials.password) else {
        return Err(CliError::Usage(
            "watchlist commands need --email and --password (or SHARC_EMAIL / SHARC_PASSWORD)"
                .into(),
        ));
    };
    let user = runtime.sign_in(email, password).await?;
    tracing::debug!(user_id = %user.id, "Signed in");
    Ok(())
}
