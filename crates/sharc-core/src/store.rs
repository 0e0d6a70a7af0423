//! The watchlist store: the signed-in user's saved movies, cached locally
//! and kept in step with the remote table.
//!
//! Every mutation goes to the remote table first. Local state changes only
//! after the remote call succeeds, so the cache never claims a write the
//! table did not confirm. `fetch_movies` replaces the cache wholesale and is
//! the recovery path after any failed or missed mutation.
//!
//! Identity changes bump a generation counter. Fetches and mutations record
//! the generation before their remote call and drop their result if it moved,
//! so a response for a previous user can never land in the current cache.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use sharc_api::traits::{IdentityProvider, WatchlistTable};

use crate::error::StoreError;
use crate::models::{MovieCore, MovieStatus, Rating, SavedMovie, User};

const EVENT_CAPACITY: usize = 64;

/// Tunables for [`WatchlistStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Upper bound for each remote call; expiry counts as a failure.
    pub remote_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(10),
        }
    }
}

/// A consistent copy of the store's state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub movies: Vec<SavedMovie>,
    pub loading: bool,
    /// False until the first fetch for the current identity has finished.
    /// An empty `movies` list means nothing before this is true.
    pub initialized: bool,
}

/// Result of a mutation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The remote write succeeded and the cache was updated.
    Applied,
    /// Nobody is signed in; nothing was attempted.
    NoIdentity,
    /// The remote table had no row for this movie; the cache is unchanged.
    NotFound,
    /// The identity changed while the remote call was in flight.
    Discarded,
}

/// Result of a fetch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded { count: usize },
    /// Nobody is signed in; the cache is empty and initialized.
    SignedOut,
    /// The identity changed while the query was in flight.
    Discarded,
}

/// The kind of mutation, for logs and failure notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Add,
    Remove,
    UpdateStatus,
    UpdateRating,
}

impl std::fmt::Display for MutationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
            Self::UpdateStatus => write!(f, "update status"),
            Self::UpdateRating => write!(f, "update rating"),
        }
    }
}

/// Notifications for hosts that want to surface store activity.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Synced {
        count: usize,
    },
    FetchFailed {
        message: String,
    },
    MutationFailed {
        action: MutationAction,
        movie_id: u64,
        message: String,
    },
    Reset,
}

#[derive(Debug, Default)]
struct StoreState {
    movies: Vec<SavedMovie>,
    loading: bool,
    initialized: bool,
    generation: u64,
}

/// Watchlist cache backed by a remote table and scoped to one identity.
pub struct WatchlistStore<I, T> {
    identity: Arc<I>,
    table: Arc<T>,
    options: StoreOptions,
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl<I, T> WatchlistStore<I, T>
where
    I: IdentityProvider,
    T: WatchlistTable,
{
    pub fn new(identity: Arc<I>, table: Arc<T>, options: StoreOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            identity,
            table,
            options,
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.read();
        StoreSnapshot {
            movies: state.movies.clone(),
            loading: state.loading,
            initialized: state.initialized,
        }
    }

    pub fn movies(&self) -> Vec<SavedMovie> {
        self.read().movies.clone()
    }

    pub fn get(&self, id: u64) -> Option<SavedMovie> {
        self.read().movies.iter().find(|m| m.id == id).cloned()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.read().movies.iter().any(|m| m.id == id)
    }

    pub fn by_status(&self, status: MovieStatus) -> Vec<SavedMovie> {
        self.read()
            .movies
            .iter()
            .filter(|m| m.status == status)
            .cloned()
            .collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.read().initialized
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // ── Identity changes ────────────────────────────────────────

    /// Apply an identity notification: reset on sign-out, reset and refetch
    /// on sign-in.
    pub async fn on_identity_change(
        &self,
        user: Option<User>,
    ) -> Result<FetchOutcome, StoreError> {
        match user {
            None => {
                self.reset();
                Ok(FetchOutcome::SignedOut)
            }
            Some(user) => {
                info!(user_id = %user.id, "Identity changed, reloading watchlist");
                let generation = self.reset();
                self.fetch_movies_for(generation).await
            }
        }
    }

    /// Drop the cache and mark it uninitialized. In-flight work started
    /// before this call will not be applied.
    ///
    /// Returns the new generation, for tagging a fetch issued on behalf of
    /// the identity that caused the reset.
    pub fn reset(&self) -> u64 {
        let generation = {
            let mut state = self.write();
            state.generation += 1;
            state.movies.clear();
            state.loading = false;
            state.initialized = false;
            state.generation
        };
        debug!(generation, "Watchlist reset");
        self.emit(StoreEvent::Reset);
        generation
    }

    // ── Fetch ───────────────────────────────────────────────────

    /// Replace the cache with the current user's remote rows.
    pub async fn fetch_movies(&self) -> Result<FetchOutcome, StoreError> {
        self.fetch_movies_for(self.generation()).await
    }

    /// Like [`fetch_movies`](Self::fetch_movies), but tagged with a
    /// generation captured earlier, usually the one returned by
    /// [`reset`](Self::reset). Nothing is applied if another reset happened
    /// since, even before this call starts.
    pub async fn fetch_movies_for(&self, generation: u64) -> Result<FetchOutcome, StoreError> {
        if self.generation() != generation {
            debug!(generation, "Skipping fetch for a superseded identity");
            return Ok(FetchOutcome::Discarded);
        }

        let user = match self.current_user().await {
            Ok(user) => user,
            Err(e) => {
                self.finish_failed_fetch(generation, &e);
                return Err(e);
            }
        };

        let Some(user) = user else {
            let applied = self.apply_if_current(generation, |state| {
                state.movies.clear();
                state.loading = false;
                state.initialized = true;
            });
            return Ok(if applied {
                FetchOutcome::SignedOut
            } else {
                FetchOutcome::Discarded
            });
        };

        if !self.apply_if_current(generation, |state| state.loading = true) {
            return Ok(FetchOutcome::Discarded);
        }

        let result = self.with_timeout(self.table.list(&user.id)).await;

        match result {
            Ok(rows) => {
                let movies: Vec<SavedMovie> = rows.into_iter().map(SavedMovie::from_row).collect();
                let count = movies.len();
                let applied = self.apply_if_current(generation, move |state| {
                    state.movies = movies;
                    state.loading = false;
                    state.initialized = true;
                });
                if !applied {
                    debug!(user_id = %user.id, "Discarding stale watchlist response");
                    return Ok(FetchOutcome::Discarded);
                }
                debug!(user_id = %user.id, count, "Watchlist loaded");
                self.emit(StoreEvent::Synced { count });
                Ok(FetchOutcome::Loaded { count })
            }
            Err(e) => {
                self.finish_failed_fetch(generation, &e);
                Err(e)
            }
        }
    }

    fn finish_failed_fetch(&self, generation: u64, error: &StoreError) {
        let applied = self.apply_if_current(generation, |state| {
            state.loading = false;
            state.initialized = true;
        });
        if applied {
            warn!(error = %error, "Failed to load watchlist");
            self.emit(StoreEvent::FetchFailed {
                message: error.to_string(),
            });
        } else {
            debug!(error = %error, "Ignoring failure of stale watchlist fetch");
        }
    }

    // ── Mutations ───────────────────────────────────────────────

    /// Save a catalog movie with the given status.
    pub async fn add_movie(
        &self,
        movie: MovieCore,
        status: MovieStatus,
    ) -> Result<MutationOutcome, StoreError> {
        let movie_id = movie.id;
        let generation = self.generation();
        let Some(user) = self.mutation_user(MutationAction::Add, movie_id).await? else {
            return Ok(MutationOutcome::NoIdentity);
        };

        let saved = SavedMovie::new(movie, status);
        let row = saved.to_row(&user.id);
        self.remote(MutationAction::Add, movie_id, self.table.insert(&row))
            .await?;

        let applied = self.apply_if_current(generation, move |state| {
            match state.movies.iter_mut().find(|m| m.id == saved.id) {
                Some(existing) => *existing = saved,
                None => state.movies.push(saved),
            }
        });
        Ok(self.mutation_result(MutationAction::Add, movie_id, applied))
    }

    pub async fn remove_movie(&self, movie_id: u64) -> Result<MutationOutcome, StoreError> {
        let generation = self.generation();
        let Some(user) = self
            .mutation_user(MutationAction::Remove, movie_id)
            .await?
        else {
            return Ok(MutationOutcome::NoIdentity);
        };

        self.remote(
            MutationAction::Remove,
            movie_id,
            self.table.delete(&user.id, movie_id),
        )
        .await?;

        let applied = self.apply_if_current(generation, |state| {
            state.movies.retain(|m| m.id != movie_id);
        });
        Ok(self.mutation_result(MutationAction::Remove, movie_id, applied))
    }

    pub async fn update_movie_status(
        &self,
        movie_id: u64,
        status: MovieStatus,
    ) -> Result<MutationOutcome, StoreError> {
        let generation = self.generation();
        let Some(user) = self
            .mutation_user(MutationAction::UpdateStatus, movie_id)
            .await?
        else {
            return Ok(MutationOutcome::NoIdentity);
        };

        let matched = self
            .remote(
                MutationAction::UpdateStatus,
                movie_id,
                self.table.update_status(&user.id, movie_id, status),
            )
            .await?;
        if matched == 0 {
            debug!(movie_id, "No remote row to update status");
            return Ok(MutationOutcome::NotFound);
        }

        let applied = self.apply_if_current(generation, |state| {
            if let Some(movie) = state.movies.iter_mut().find(|m| m.id == movie_id) {
                movie.status = status;
            }
        });
        Ok(self.mutation_result(MutationAction::UpdateStatus, movie_id, applied))
    }

    pub async fn update_movie_rating(
        &self,
        movie_id: u64,
        rating: Rating,
    ) -> Result<MutationOutcome, StoreError> {
        let generation = self.generation();
        let Some(user) = self
            .mutation_user(MutationAction::UpdateRating, movie_id)
            .await?
        else {
            return Ok(MutationOutcome::NoIdentity);
        };

        let matched = self
            .remote(
                MutationAction::UpdateRating,
                movie_id,
                self.table.update_rating(&user.id, movie_id, rating),
            )
            .await?;
        if matched == 0 {
            debug!(movie_id, "No remote row to update rating");
            return Ok(MutationOutcome::NotFound);
        }

        let applied = self.apply_if_current(generation, |state| {
            if let Some(movie) = state.movies.iter_mut().find(|m| m.id == movie_id) {
                movie.rating = Some(rating);
            }
        });
        Ok(self.mutation_result(MutationAction::UpdateRating, movie_id, applied))
    }

    // ── Internals ───────────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Run `f` under the write lock if no identity change happened since
    /// `generation` was read.
    fn apply_if_current(&self, generation: u64, f: impl FnOnce(&mut StoreState)) -> bool {
        let mut state = self.write();
        if state.generation != generation {
            return false;
        }
        f(&mut state);
        true
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn current_user(&self) -> Result<Option<User>, StoreError> {
        match tokio::time::timeout(self.options.remote_timeout, self.identity.current_user()).await
        {
            Ok(Ok(user)) => Ok(user),
            Ok(Err(e)) => Err(StoreError::Identity(e.to_string())),
            Err(_) => Err(StoreError::Timeout(self.options.remote_timeout)),
        }
    }

    /// Resolve the user for a mutation, reporting identity failures.
    async fn mutation_user(
        &self,
        action: MutationAction,
        movie_id: u64,
    ) -> Result<Option<User>, StoreError> {
        match self.current_user().await {
            Ok(Some(user)) => Ok(Some(user)),
            Ok(None) => {
                debug!(%action, movie_id, "Not signed in, ignoring");
                Ok(None)
            }
            Err(e) => {
                self.report_failure(action, movie_id, &e);
                Err(e)
            }
        }
    }

    async fn with_timeout<R, E>(
        &self,
        fut: impl Future<Output = Result<R, E>>,
    ) -> Result<R, StoreError>
    where
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.options.remote_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StoreError::Remote(e.to_string())),
            Err(_) => Err(StoreError::Timeout(self.options.remote_timeout)),
        }
    }

    /// Run a remote mutation, reporting failures.
    async fn remote<R>(
        &self,
        action: MutationAction,
        movie_id: u64,
        fut: impl Future<Output = Result<R, T::Error>>,
    ) -> Result<R, StoreError> {
        self.with_timeout(fut).await.inspect_err(|e| {
            self.report_failure(action, movie_id, e);
        })
    }

    fn report_failure(&self, action: MutationAction, movie_id: u64, error: &StoreError) {
        warn!(%action, movie_id, error = %error, "Watchlist mutation failed");
        self.emit(StoreEvent::MutationFailed {
            action,
            movie_id,
            message: error.to_string(),
        });
    }

    fn mutation_result(
        &self,
        action: MutationAction,
        movie_id: u64,
        applied: bool,
    ) -> MutationOutcome {
        if applied {
            debug!(%action, movie_id, "Watchlist updated");
            MutationOutcome::Applied
        } else {
            debug!(%action, movie_id, "Identity changed mid-flight, dropping local update");
            MutationOutcome::Discarded
        }
    }
}
