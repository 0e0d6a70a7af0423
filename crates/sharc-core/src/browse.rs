use std::collections::HashSet;

use sharc_api::traits::{DiscoverQuery, MovieCatalog, MovieSummary, SortKey};

/// Paged discover results for infinite scrolling.
///
/// `load_next` takes `&mut self`, so at most one page load is in flight per
/// feed. Hosts sharing a feed put it behind an async mutex and skip a load
/// when the lock is already held.
#[derive(Debug, Clone)]
pub struct DiscoverFeed {
    genre: Option<u64>,
    sort: SortKey,
    min_vote_count: u32,
    movies: Vec<MovieSummary>,
    seen: HashSet<u64>,
    next_page: u32,
    has_more: bool,
}

impl DiscoverFeed {
    pub fn new(min_vote_count: u32, sort: SortKey) -> Self {
        Self {
            genre: None,
            sort,
            min_vote_count,
            movies: Vec::new(),
            seen: HashSet::new(),
            next_page: 1,
            has_more: true,
        }
    }

    /// Change filters and start over from page 1.
    pub fn reset(&mut self, genre: Option<u64>, sort: SortKey) {
        self.genre = genre;
        self.sort = sort;
        self.movies.clear();
        self.seen.clear();
        self.next_page = 1;
        self.has_more = true;
    }

    /// Fetch and append the next page. Returns how many new movies were
    /// added; zero when no pages remain.
    ///
    /// On error the accumulated results and the page cursor are kept, so
    /// the same page is retried by the next call.
    pub async fn load_next<C: MovieCatalog>(&mut self, catalog: &C) -> Result<usize, C::Error> {
        if !self.has_more {
            return Ok(0);
        }

        let query = self.query();
        let page = match catalog.discover(&query).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(page = query.page, error = %e, "Failed to load discover page");
                return Err(e);
            }
        };

        self.has_more = page.has_next();
        self.next_page = page.page.saturating_add(1);

        let before = self.movies.len();
        for movie in page.results {
            if self.seen.insert(movie.id) {
                self.movies.push(movie);
            }
        }
        let added = self.movies.len() - before;
        tracing::debug!(page = page.page, added, has_more = self.has_more, "Discover page loaded");
        Ok(added)
    }

    /// The query the next `load_next` call will send.
    pub fn query(&self) -> DiscoverQuery {
        DiscoverQuery::new(self.genre, self.sort, self.min_vote_count).with_page(self.next_page)
    }

    pub fn movies(&self) -> &[MovieSummary] {
        &self.movies
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn genre(&self) -> Option<u64> {
        self.genre
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use sharc_api::traits::{DiscoverPage, Genre, MovieDetails};

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("catalog unavailable")]
    struct Unavailable;

    /// Serves fixed pages and records every query it receives.
    #[derive(Default)]
    struct PagedCatalog {
        pages: Vec<Vec<u64>>,
        queries: Mutex<Vec<DiscoverQuery>>,
        fail: AtomicBool,
    }

    impl PagedCatalog {
        fn new(pages: Vec<Vec<u64>>) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }
    }

    fn movie(id: u64) -> MovieSummary {
        MovieSummary {
            id,
            title: format!("Movie {id}"),
            poster_path: None,
            release_date: "2020-01-01".into(),
            vote_average: 7.0,
            genre_ids: vec![],
        }
    }

    impl MovieCatalog for PagedCatalog {
        type Error = Unavailable;

        async fn list_genres(&self) -> Result<Vec<Genre>, Unavailable> {
            Ok(vec![])
        }

        async fn discover(&self, query: &DiscoverQuery) -> Result<DiscoverPage, Unavailable> {
            self.queries.lock().unwrap().push(query.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(Unavailable);
            }
            let ids = self
                .pages
                .get(query.page as usize - 1)
                .cloned()
                .unwrap_or_default();
            Ok(DiscoverPage {
                results: ids.into_iter().map(movie).collect(),
                page: query.page,
                total_pages: self.pages.len() as u32,
            })
        }

        async fn search(&self, _query: &str) -> Result<Vec<MovieSummary>, Unavailable> {
            Ok(vec![])
        }

        async fn get_details(&self, _id: u64) -> Result<Option<MovieDetails>, Unavailable> {
            Ok(None)
        }
    }

    fn ids(feed: &DiscoverFeed) -> Vec<u64> {
        feed.movies().iter().map(|m| m.id).collect()
    }

    #[tokio::test]
    async fn test_pages_accumulate_without_duplicates() {
        let catalog = PagedCatalog::new(vec![vec![1, 2, 3], vec![3, 4], vec![5]]);
        let mut feed = DiscoverFeed::new(500, SortKey::RatingDesc);

        assert_eq!(feed.load_next(&catalog).await.unwrap(), 3);
        assert!(feed.has_more());
        assert_eq!(feed.load_next(&catalog).await.unwrap(), 1);
        assert_eq!(feed.load_next(&catalog).await.unwrap(), 1);
        assert!(!feed.has_more());
        assert_eq!(ids(&feed), vec![1, 2, 3, 4, 5]);

        // Exhausted: no further requests.
        assert_eq!(feed.load_next(&catalog).await.unwrap(), 0);
        assert_eq!(catalog.queries.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_queries_carry_filters_and_pages() {
        let catalog = PagedCatalog::new(vec![vec![1], vec![2]]);
        let mut feed = DiscoverFeed::new(500, SortKey::RatingDesc);
        feed.reset(Some(878), SortKey::TitleAsc);
        feed.load_next(&catalog).await.unwrap();
        feed.load_next(&catalog).await.unwrap();

        let queries = catalog.queries.lock().unwrap();
        assert_eq!(queries[0].page, 1);
        assert_eq!(queries[1].page, 2);
        assert!(queries
            .iter()
            .all(|q| q.genre == Some(878) && q.sort == SortKey::TitleAsc && q.min_vote_count == 500));
    }

    #[tokio::test]
    async fn test_reset_starts_over() {
        let catalog = PagedCatalog::new(vec![vec![1, 2], vec![3]]);
        let mut feed = DiscoverFeed::new(500, SortKey::RatingDesc);
        feed.load_next(&catalog).await.unwrap();
        feed.load_next(&catalog).await.unwrap();
        assert!(!feed.has_more());

        feed.reset(None, SortKey::ReleaseDateDesc);
        assert!(feed.movies().is_empty());
        assert!(feed.has_more());
        assert_eq!(feed.query().page, 1);
        assert_eq!(feed.sort(), SortKey::ReleaseDateDesc);

        feed.load_next(&catalog).await.unwrap();
        assert_eq!(ids(&feed), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_error_keeps_results_and_retries_same_page() {
        let catalog = PagedCatalog::new(vec![vec![1, 2], vec![3]]);
        let mut feed = DiscoverFeed::new(500, SortKey::RatingDesc);
        feed.load_next(&catalog).await.unwrap();

        catalog.fail.store(true, Ordering::SeqCst);
        assert!(feed.load_next(&catalog).await.is_err());
        assert_eq!(ids(&feed), vec![1, 2]);
        assert!(feed.has_more());

        catalog.fail.store(false, Ordering::SeqCst);
        feed.load_next(&catalog).await.unwrap();
        assert_eq!(ids(&feed), vec![1, 2, 3]);
        let pages: Vec<u32> = catalog.queries.lock().unwrap().iter().map(|q| q.page).collect();
        assert_eq!(pages, vec![1, 2, 2]);
    }

    #[tokio::test]
    async fn test_empty_catalog_has_no_more() {
        let catalog = PagedCatalog::new(vec![]);
        let mut feed = DiscoverFeed::new(500, SortKey::RatingDesc);
        assert_eq!(feed.load_next(&catalog).await.unwrap(), 0);
        assert!(!feed.has_more());
    }
}
