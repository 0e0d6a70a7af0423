use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sharc_api::traits::{searchable_query, MovieCatalog, MovieSummary};

/// Search-as-you-type over a catalog.
///
/// Each submission waits out a quiet period first. A submission that is
/// overtaken by a newer one before its request is sent, or before its
/// response arrives, resolves to `None` so callers only render the latest.
pub struct DebouncedSearch<C> {
    catalog: Arc<C>,
    delay: Duration,
    limit: usize,
    latest: AtomicU64,
}

impl<C: MovieCatalog> DebouncedSearch<C> {
    pub fn new(catalog: Arc<C>, delay: Duration, limit: usize) -> Self {
        Self {
            catalog,
            delay,
            limit,
            latest: AtomicU64::new(0),
        }
    }

    pub async fn query(&self, text: &str) -> Option<Vec<MovieSummary>> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(query) = searchable_query(text) else {
            return Some(Vec::new());
        };

        tokio::time::sleep(self.delay).await;
        if self.is_superseded(ticket) {
            return None;
        }

        let result = self.catalog.search(query).await;
        if self.is_superseded(ticket) {
            tracing::debug!(query, "Dropping superseded search results");
            return None;
        }

        match result {
            Ok(mut movies) => {
                movies.truncate(self.limit);
                Some(movies)
            }
            Err(e) => {
                tracing::warn!(query, error = %e, "Search failed");
                Some(Vec::new())
            }
        }
    }

    fn is_superseded(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) != ticket
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;

    use sharc_api::traits::{DiscoverPage, DiscoverQuery, Genre, MovieDetails};

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("search backend down")]
    struct Down;

    #[derive(Default)]
    struct CountingCatalog {
        calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl MovieCatalog for CountingCatalog {
        type Error = Down;

        async fn list_genres(&self) -> Result<Vec<Genre>, Down> {
            Ok(vec![])
        }

        async fn discover(&self, _query: &DiscoverQuery) -> Result<DiscoverPage, Down> {
            Err(Down)
        }

        async fn search(&self, query: &str) -> Result<Vec<MovieSummary>, Down> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            if self.fail.load(Ordering::SeqCst) {
                return Err(Down);
            }
            Ok((1..=8)
                .map(|id| MovieSummary {
                    id,
                    title: format!("{query} {id}"),
                    poster_path: None,
                    release_date: String::new(),
                    vote_average: 0.0,
                    genre_ids: vec![],
                })
                .collect())
        }

        async fn get_details(&self, _id: u64) -> Result<Option<MovieDetails>, Down> {
            Ok(None)
        }
    }

    fn search() -> (Arc<CountingCatalog>, DebouncedSearch<CountingCatalog>) {
        let catalog = Arc::new(CountingCatalog::default());
        let search = DebouncedSearch::new(catalog.clone(), Duration::from_millis(300), 5);
        (catalog, search)
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_skips_catalog() {
        let (catalog, search) = search();
        assert_eq!(search.query(" a ").await, Some(vec![]));
        assert_eq!(search.query("").await, Some(vec![]));
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_are_trimmed_and_capped() {
        let (catalog, search) = search();
        let results = search.query("  matrix ").await.unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(catalog.queries.lock().unwrap().as_slice(), ["matrix"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_latest_keystroke_is_sent() {
        let (catalog, search) = search();
        let (first, second, third) = tokio::join!(
            search.query("ma"),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                search.query("mat").await
            },
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                search.query("matrix").await
            },
        );

        assert_eq!(first, None);
        assert_eq!(second, None);
        assert_eq!(third.map(|r| r.len()), Some(5));
        assert_eq!(catalog.queries.lock().unwrap().as_slice(), ["matrix"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_the_box_supersedes_pending_query() {
        let (catalog, search) = search();
        let (pending, cleared) = tokio::join!(search.query("matrix"), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            search.query("").await
        });
        assert_eq!(pending, None);
        assert_eq!(cleared, Some(vec![]));
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_as_empty() {
        let (catalog, search) = search();
        catalog.fail.store(true, Ordering::SeqCst);
        assert_eq!(search.query("matrix").await, Some(vec![]));
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
    }
}
