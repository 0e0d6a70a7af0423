use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use sharc_core::models::{MovieStatus, Rating, SortKey};

#[derive(Debug, Parser)]
#[command(name = "sharc")]
#[command(about = "Discover movies and keep a synced watchlist")]
#[command(version)]
pub struct Cli {
    /// Log more (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub credentials: Credentials,

    #[command(subcommand)]
    pub command: Command,
}

/// Sign-in details for watchlist commands.
#[derive(Debug, Args)]
pub struct Credentials {
    #[arg(long, env = "SHARC_EMAIL", global = true)]
    pub email: Option<String>,

    #[arg(long, env = "SHARC_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List catalog genres
    Genres,
    /// Browse popular movies with filters
    Discover {
        /// Genre id (see `sharc genres`)
        #[arg(long)]
        genre: Option<u64>,

        /// Sort order; defaults to the configured one
        #[arg(long, value_enum)]
        sort: Option<SortArg>,

        /// Number of pages to load
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=20))]
        pages: u32,
    },
    /// Movies released in the last 30 days
    NewReleases,
    /// Search the catalog by title
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Show every match instead of the short preview
        #[arg(long)]
        all: bool,
    },
    /// Show details for one movie
    Show { id: u64 },
    /// Print your watchlist
    List {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Save a movie to your watchlist
    Add {
        id: u64,

        #[arg(long, value_enum, default_value_t = StatusArg::Watchlist)]
        status: StatusArg,
    },
    /// Remove a movie from your watchlist
    Remove { id: u64 },
    /// Change a saved movie's status
    Status {
        id: u64,
        #[arg(value_enum)]
        status: StatusArg,
    },
    /// Rate a saved movie from 1 to 10
    Rate {
        id: u64,
        #[arg(value_parser = parse_rating)]
        rating: Rating,
    },
}

impl Command {
    pub fn needs_sign_in(&self) -> bool {
        matches!(
            self,
            Self::List { .. }
                | Self::Add { .. }
                | Self::Remove { .. }
                | Self::Status { .. }
                | Self::Rate { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Rating,
    ReleaseDate,
    Title,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Rating => SortKey::RatingDesc,
            SortArg::ReleaseDate => SortKey::ReleaseDateDesc,
            SortArg::Title => SortKey::TitleAsc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Watchlist,
    Watching,
    Watched,
}

impl From<StatusArg> for MovieStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Watchlist => MovieStatus::WatchList,
            StatusArg::Watching => MovieStatus::Watching,
            StatusArg::Watched => MovieStatus::Watched,
        }
    }
}

fn parse_rating(s: &str) -> Result<Rating, String> {
    let value: u8 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    Rating::new(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sharc").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_discover_flags() {
        let cli = parse(&["discover", "--genre", "878", "--sort", "release-date", "--pages", "3"])
            .unwrap();
        match cli.command {
            Command::Discover { genre, sort, pages } => {
                assert_eq!(genre, Some(878));
                assert_eq!(sort.map(SortKey::from), Some(SortKey::ReleaseDateDesc));
                assert_eq!(pages, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_add_defaults_to_watchlist() {
        let cli = parse(&["add", "27205"]).unwrap();
        assert!(cli.command.needs_sign_in());
        match cli.command {
            Command::Add { id, status } => {
                assert_eq!(id, 27205);
                assert_eq!(MovieStatus::from(status), MovieStatus::WatchList);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rating_bounds() {
        let cli = parse(&["rate", "27205", "10"]).unwrap();
        assert!(matches!(cli.command, Command::Rate { rating, .. } if rating.get() == 10));
        assert!(parse(&["rate", "27205", "0"]).is_err());
        assert!(parse(&["rate", "27205", "11"]).is_err());
        assert!(parse(&["rate", "27205", "nine"]).is_err());
    }

    #[test]
    fn test_search_joins_words_and_needs_no_sign_in() {
        let cli = parse(&["search", "the", "matrix", "--all"]).unwrap();
        assert!(!cli.command.needs_sign_in());
        match cli.command {
            Command::Search { query, all } => {
                assert_eq!(query.join(" "), "the matrix");
                assert!(all);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_credentials_are_global() {
        let cli = parse(&["list", "--email", "a@b.c", "--password", "pw", "--status", "watched"])
            .unwrap();
        assert_eq!(cli.credentials.email.as_deref(), Some("a@b.c"));
        assert_eq!(cli.credentials.password.as_deref(), Some("pw"));
    }
}
