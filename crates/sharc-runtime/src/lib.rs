use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use sharc_api::supabase::{SupabaseAuth, SupabaseTable};
use sharc_api::tmdb::{ImageSize, TmdbClient};
use sharc_api::traits::{IdentityProvider, MovieCatalog};
use sharc_core::browse::DiscoverFeed;
use sharc_core::config::AppConfig;
use sharc_core::models::{
    Genre, MovieCore, MovieDetails, MovieStatus, MovieSummary, Rating, SavedMovie, SortKey, User,
};
use sharc_core::search::DebouncedSearch;
use sharc_core::store::{MutationOutcome, StoreEvent, StoreOptions, StoreSnapshot, WatchlistStore};

pub type Store = WatchlistStore<SupabaseAuth, SupabaseTable>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("watchlist error: {0}")]
    Store(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// First screen of the browse view: genre filters plus the first page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowsePage {
    pub genres: Vec<Genre>,
    pub movies: Vec<MovieSummary>,
    pub has_more: bool,
}

/// Supabase clients and the store they feed. Absent when the backend is
/// not configured; catalog features keep working without it.
struct Backend {
    auth: Arc<SupabaseAuth>,
    store: Arc<Store>,
    identity_task: JoinHandle<()>,
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.identity_task.abort();
    }
}

pub struct Runtime {
    config: AppConfig,
    catalog: Arc<TmdbClient>,
    search: DebouncedSearch<TmdbClient>,
    feed: Mutex<DiscoverFeed>,
    backend: Option<Backend>,
}

impl Runtime {
    /// Build from the user's config file and environment.
    pub fn new() -> Result<Self, RuntimeError> {
        let config = AppConfig::load().map_err(|e| RuntimeError::Config(e.to_string()))?;
        Self::with_config(config)
    }

    /// Build from an explicit config. Must run inside a tokio runtime: the
    /// identity subscription task is spawned here.
    pub fn with_config(config: AppConfig) -> Result<Self, RuntimeError> {
        let catalog = Arc::new(
            TmdbClient::new(config.tmdb_options())
                .map_err(|e| RuntimeError::Config(e.to_string()))?,
        );
        let search = DebouncedSearch::new(
            catalog.clone(),
            config.debounce(),
            config.search.preview_limit,
        );
        let feed = Mutex::new(DiscoverFeed::new(
            config.browse.min_vote_count,
            config.default_sort(),
        ));

        let backend = if config.backend.url.trim().is_empty() {
            tracing::info!("Supabase not configured, watchlist disabled");
            None
        } else {
            Some(Self::connect_backend(&config)?)
        };

        Ok(Self {
            config,
            catalog,
            search,
            feed,
            backend,
        })
    }

    fn connect_backend(config: &AppConfig) -> Result<Backend, RuntimeError> {
        let auth = Arc::new(
            SupabaseAuth::new(config.supabase_options())
                .map_err(|e| RuntimeError::Config(e.to_string()))?,
        );
        let table = Arc::new(
            SupabaseTable::new(auth.clone()).map_err(|e| RuntimeError::Config(e.to_string()))?,
        );
        let store = Arc::new(WatchlistStore::new(
            auth.clone(),
            table,
            StoreOptions {
                remote_timeout: config.remote_timeout(),
            },
        ));
        let identity_task = spawn_identity_watch(store.clone(), auth.subscribe());

        Ok(Backend {
            auth,
            store,
            identity_task,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn backend(&self) -> Result<&Backend, RuntimeError> {
        self.backend
            .as_ref()
            .ok_or_else(|| RuntimeError::Config("Supabase URL and anon key are not set".into()))
    }

    /// The watchlist store, for hosts that render it directly.
    pub fn store(&self) -> Result<&Arc<Store>, RuntimeError> {
        Ok(&self.backend()?.store)
    }

    // ── Identity ────────────────────────────────────────────────

    /// Sign in and wait until the watchlist for the new user is loaded.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, RuntimeError> {
        let backend = self.backend()?;
        let previous = backend
            .auth
            .current_user()
            .await
            .map_err(|e| RuntimeError::Auth(e.to_string()))?;
        let mut events = backend.store.subscribe_events();

        let user = backend
            .auth
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| RuntimeError::Auth(e.to_string()))?;

        if previous.as_ref() == Some(&user) && backend.store.is_initialized() {
            return Ok(user);
        }
        self.await_sync(&mut events).await?;
        Ok(user)
    }

    pub async fn sign_out(&self) -> Result<(), RuntimeError> {
        let backend = self.backend()?;
        let result = backend.auth.sign_out().await;
        // The subscription task resets the store asynchronously; reset here
        // too so callers observe an empty watchlist on return.
        backend.store.reset();
        result.map_err(|e| RuntimeError::Auth(e.to_string()))
    }

    pub async fn current_user(&self) -> Result<Option<User>, RuntimeError> {
        self.backend()?
            .auth
            .current_user()
            .await
            .map_err(|e| RuntimeError::Auth(e.to_string()))
    }

    async fn await_sync(
        &self,
        events: &mut broadcast::Receiver<StoreEvent>,
    ) -> Result<usize, RuntimeError> {
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(StoreEvent::Synced { count }) => return Ok(count),
                    Ok(StoreEvent::FetchFailed { message }) => {
                        return Err(RuntimeError::Store(message))
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(RuntimeError::Store("store shut down".into()))
                    }
                }
            }
        };
        tokio::time::timeout(self.config.remote_timeout() * 2, wait)
            .await
            .map_err(|_| RuntimeError::Store("timed out waiting for the watchlist".into()))?
    }

    // ── Catalog ─────────────────────────────────────────────────

    pub async fn genres(&self) -> Result<Vec<Genre>, RuntimeError> {
        self.catalog
            .list_genres()
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))
    }

    /// Reset the discover feed to new filters and load genres and the first
    /// page together.
    pub async fn browse(
        &self,
        genre: Option<u64>,
        sort: SortKey,
    ) -> Result<BrowsePage, RuntimeError> {
        let mut feed = self.feed.lock().await;
        feed.reset(genre, sort);

        let (genres, _) = futures::try_join!(
            self.catalog.list_genres(),
            feed.load_next(self.catalog.as_ref()),
        )
        .map_err(|e| RuntimeError::Api(e.to_string()))?;

        Ok(BrowsePage {
            genres,
            movies: feed.movies().to_vec(),
            has_more: feed.has_more(),
        })
    }

    /// Load the next discover page. Returns `None` without a request when
    /// another load is in flight.
    pub async fn load_more(&self) -> Result<Option<Vec<MovieSummary>>, RuntimeError> {
        let Ok(mut feed) = self.feed.try_lock() else {
            tracing::debug!("Discover load already in flight");
            return Ok(None);
        };
        let before = feed.movies().len();
        feed.load_next(self.catalog.as_ref())
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;
        Ok(Some(feed.movies()[before..].to_vec()))
    }

    pub async fn has_more(&self) -> bool {
        self.feed.lock().await.has_more()
    }

    pub async fn new_releases(&self) -> Result<Vec<MovieSummary>, RuntimeError> {
        let today = Utc::now().date_naive();
        self.catalog
            .new_releases(today, self.config.browse.new_releases_limit)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))
    }

    /// Debounced preview search; `None` when superseded by a newer query.
    pub async fn search(&self, text: &str) -> Option<Vec<MovieSummary>> {
        self.search.query(text).await
    }

    /// Undebounced full search.
    pub async fn search_all(&self, text: &str) -> Result<Vec<MovieSummary>, RuntimeError> {
        self.catalog
            .search(text)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))
    }

    pub async fn details(&self, id: u64) -> Result<MovieDetails, RuntimeError> {
        self.catalog
            .get_details(id)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?
            .ok_or_else(|| RuntimeError::NotFound(format!("movie {id}")))
    }

    pub fn poster_url(&self, path: Option<&str>) -> Option<String> {
        self.catalog.image_url(path, ImageSize::W342)
    }

    // ── Watchlist ───────────────────────────────────────────────

    pub fn watchlist(&self) -> Result<StoreSnapshot, RuntimeError> {
        Ok(self.backend()?.store.snapshot())
    }

    pub fn watchlist_by_status(&self, status: MovieStatus) -> Result<Vec<SavedMovie>, RuntimeError> {
        Ok(self.backend()?.store.by_status(status))
    }

    pub async fn refresh_watchlist(&self) -> Result<(), RuntimeError> {
        self.backend()?
            .store
            .fetch_movies()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Store(e.to_string()))
    }

    /// Look a movie up in the catalog and save it with `status`.
    pub async fn add_to_watchlist(
        &self,
        id: u64,
        status: MovieStatus,
    ) -> Result<MutationOutcome, RuntimeError> {
        let backend = self.backend()?;
        let signed_in = backend
            .auth
            .current_user()
            .await
            .map_err(|e| RuntimeError::Auth(e.to_string()))?;
        if signed_in.is_none() {
            tracing::debug!(movie_id = id, "Not signed in, ignoring add");
            return Ok(MutationOutcome::NoIdentity);
        }

        let store = &backend.store;
        let details = self.details(id).await?;
        store
            .add_movie(MovieCore::from(&details), status)
            .await
            .map_err(|e| RuntimeError::Store(e.to_string()))
    }

    pub async fn remove_from_watchlist(&self, id: u64) -> Result<MutationOutcome, RuntimeError> {
        self.backend()?
            .store
            .remove_movie(id)
            .await
            .map_err(|e| RuntimeError::Store(e.to_string()))
    }

    pub async fn set_status(
        &self,
        id: u64,
        status: MovieStatus,
    ) -> Result<MutationOutcome, RuntimeError> {
        self.backend()?
            .store
            .update_movie_status(id, status)
            .await
            .map_err(|e| RuntimeError::Store(e.to_string()))
    }

    pub async fn rate(&self, id: u64, rating: Rating) -> Result<MutationOutcome, RuntimeError> {
        self.backend()?
            .store
            .update_movie_rating(id, rating)
            .await
            .map_err(|e| RuntimeError::Store(e.to_string()))
    }
}

/// Forward identity changes to the store for as long as the provider lives.
///
/// Sign-out resets inline. Sign-in resets inline and fetches on a separate
/// task, tagged with the generation of that reset, so a sign-out arriving
/// before or during the fetch is applied without waiting and the fetch is
/// discarded by the store.
fn spawn_identity_watch(
    store: Arc<Store>,
    mut identity: watch::Receiver<Option<User>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while identity.changed().await.is_ok() {
            let user = identity.borrow_and_update().clone();
            let generation = store.reset();
            let Some(user) = user else {
                tracing::info!("Signed out, watchlist cleared");
                continue;
            };

            tracing::info!(user_id = %user.id, "Identity changed, loading watchlist");
            let store = store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.fetch_movies_for(generation).await {
                    tracing::warn!(error = %e, "Initial watchlist load failed");
                }
            });
        }
        tracing::debug!("Identity provider closed");
    })
}
