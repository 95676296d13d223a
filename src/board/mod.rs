//! Board composition: which categories a page features, and which polls
//! lead each category board.
//!
//! Featured picks are remembered in the session store under
//! `featured_polls_{category}` so re-renders within one session show the
//! same leading polls. Everything else is reshuffled freely.

use crate::db::{load_featured, save_featured, KeyValueStore};
use crate::models::{Board, Poll};
use crate::taxonomy::{self, PollMetadata};
use log::{debug, warn};
use rand::Rng;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_BOARD_COUNT: usize = 3;
pub const DEFAULT_FEATURED_SIZE: usize = 3;

#[derive(Debug, Clone)]
pub struct BoardOptions {
    pub count: usize,
    pub featured_size: usize,
    /// Shortlist used when the caller gives no override.
    pub preferred: Vec<String>,
    /// Explicit categories requested by the caller (e.g. a query parameter).
    pub overrides: Option<Vec<String>>,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_BOARD_COUNT,
            featured_size: DEFAULT_FEATURED_SIZE,
            preferred: vec![
                "event:wedding".to_string(),
                "vehicle:party-bus".to_string(),
                "vehicle:limousine".to_string(),
            ],
            overrides: None,
        }
    }
}

/// Active polls grouped by normalized category.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    pools: HashMap<String, Vec<Poll>>,
    categories: HashMap<String, Vec<String>>,
}

impl CategoryIndex {
    /// Normalize every active poll against the taxonomy.
    pub fn build(polls: &[Poll]) -> Self {
        Self::from_tagged(
            polls
                .iter()
                .filter(|p| p.active)
                .map(|p| (p.clone(), taxonomy::normalize(&PollMetadata::from(p)))),
        )
    }

    pub fn from_tagged(tagged: impl IntoIterator<Item = (Poll, Vec<String>)>) -> Self {
        let mut index = Self::default();
        for (poll, keys) in tagged {
            if !poll.active {
                continue;
            }
            for key in &keys {
                index.pools.entry(key.clone()).or_default().push(poll.clone());
            }
            index.categories.insert(poll.id.clone(), keys);
        }
        index
    }

    pub fn pool(&self, category_key: &str) -> &[Poll] {
        self.pools.get(category_key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn poll_count(&self, category_key: &str) -> usize {
        self.pool(category_key).len()
    }

    pub fn categories_of(&self, poll_id: &str) -> &[String] {
        self.categories.get(poll_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every populated category, most populous first (catalog order breaks ties).
    pub fn keys_by_population(&self) -> Vec<String> {
        let mut keys: Vec<&String> = self.pools.keys().collect();
        keys.sort_by(|a, b| {
            self.poll_count(b)
                .cmp(&self.poll_count(a))
                .then_with(|| taxonomy::catalog_rank(a).cmp(&taxonomy::catalog_rank(b)))
                .then_with(|| a.cmp(b))
        });
        keys.into_iter().cloned().collect()
    }
}

fn dedup_keys<'a>(keys: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for key in keys {
        let key = key.trim();
        if !key.is_empty() && !out.iter().any(|k| k == key) {
            out.push(key.to_string());
        }
    }
    out
}

/// Pick exactly `options.count` categories (fewer only if fewer exist).
pub fn select_categories(index: &CategoryIndex, options: &BoardOptions) -> Vec<String> {
    let mut chosen = match &options.overrides {
        Some(list) if !list.is_empty() => dedup_keys(list),
        _ => dedup_keys(options.preferred.iter().filter(|k| index.poll_count(k.trim()) > 0)),
    };

    if chosen.len() < options.count {
        for key in index.keys_by_population() {
            if chosen.len() >= options.count {
                break;
            }
            if !chosen.contains(&key) {
                chosen.push(key);
            }
        }
    }
    chosen.truncate(options.count);
    chosen
}

/// Uniform Fisher–Yates shuffle.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Uniform sample of up to `n` items without replacement.
pub fn sample<T, R: Rng + ?Sized>(mut items: Vec<T>, n: usize, rng: &mut R) -> Vec<T> {
    let n = n.min(items.len());
    for i in 0..n {
        let j = rng.random_range(i..items.len());
        items.swap(i, j);
    }
    items.truncate(n);
    items
}

pub struct BoardComposer<'a> {
    session: &'a dyn KeyValueStore,
    options: BoardOptions,
}

impl<'a> BoardComposer<'a> {
    pub fn new(session: &'a dyn KeyValueStore, options: BoardOptions) -> Self {
        Self { session, options }
    }

    /// Compose the boards for one page. Polls claimed by an earlier board
    /// are never offered to a later one.
    pub async fn compose<R: Rng + ?Sized>(&self, index: &CategoryIndex, rng: &mut R) -> Vec<Board> {
        let categories = select_categories(index, &self.options);
        debug!("Composing boards for {:?}", categories);

        let mut claimed: HashSet<String> = HashSet::new();
        let mut boards = Vec::with_capacity(categories.len());
        for key in categories {
            let board = self.compose_one(&key, index, &claimed, rng).await;
            claimed.extend(board.featured.iter().map(|p| p.id.clone()));
            claimed.extend(board.rest.iter().map(|p| p.id.clone()));
            boards.push(board);
        }
        boards
    }

    async fn compose_one<R: Rng + ?Sized>(
        &self,
        key: &str,
        index: &CategoryIndex,
        claimed: &HashSet<String>,
        rng: &mut R,
    ) -> Board {
        let size = self.options.featured_size;
        let pool: Vec<&Poll> = index.pool(key).iter().filter(|p| !claimed.contains(&p.id)).collect();

        let mut featured: Vec<Poll> = Vec::new();
        for id in load_featured(self.session, key).await {
            if featured.len() >= size {
                break;
            }
            if featured.iter().any(|p| p.id == id) {
                continue;
            }
            if let Some(poll) = pool.iter().find(|p| p.id == id) {
                featured.push((*poll).clone());
            }
        }

        if featured.len() < size {
            let candidates: Vec<&Poll> = pool
                .iter()
                .copied()
                .filter(|p| !featured.iter().any(|f| f.id == p.id))
                .collect();
            let extra = sample(candidates, size - featured.len(), rng);
            featured.extend(extra.into_iter().cloned());

            let ids: Vec<String> = featured.iter().map(|p| p.id.clone()).collect();
            if let Err(e) = save_featured(self.session, key, &ids).await {
                warn!("Could not persist featured selection for {}: {}", key, e);
            }
        }

        let mut rest: Vec<Poll> = pool
            .iter()
            .filter(|p| !featured.iter().any(|f| f.id == p.id))
            .map(|p| (*p).clone())
            .collect();
        shuffle(&mut rest, rng);

        Board {
            category_key: key.to_string(),
            featured,
            rest,
        }
    }
}

/// Visible-subset filters. Applied after composition so the featured
/// selection itself never changes while a visitor types.
#[derive(Debug, Clone, Default)]
pub struct BoardFilter {
    pub query: Option<String>,
    pub category: Option<String>,
}

impl BoardFilter {
    pub fn is_empty(&self) -> bool {
        self.query.as_deref().map_or(true, |q| q.trim().is_empty()) && self.category.is_none()
    }

    pub fn matches(&self, poll: &Poll, index: &CategoryIndex) -> bool {
        if let Some(category) = &self.category {
            if !index.categories_of(&poll.id).iter().any(|k| k == category) {
                return false;
            }
        }

        let Some(query) = self.query.as_deref().map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty()) else {
            return true;
        };
        poll.question.to_lowercase().contains(&query)
            || poll.tags.iter().any(|t| t.to_lowercase().contains(&query))
            || index
                .categories_of(&poll.id)
                .iter()
                .any(|k| taxonomy::title_for(k).to_lowercase().contains(&query))
    }

    pub fn apply(&self, board: &Board, index: &CategoryIndex) -> Board {
        Board {
            category_key: board.category_key.clone(),
            featured: board.featured.iter().filter(|p| self.matches(p, index)).cloned().collect(),
            rest: board.rest.iter().filter(|p| self.matches(p, index)).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::db::{featured_key, MemoryStore};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn poll(id: &str) -> Poll {
        Poll::new(id, &format!("Question {}", id), &["A", "B"])
    }

    // ("p1", "a,b") tags p1 with categories a and b
    fn tagged(entries: &[(&str, &str)]) -> CategoryIndex {
        CategoryIndex::from_tagged(
            entries
                .iter()
                .map(|(id, keys)| (poll(id), keys.split(',').map(|k| k.to_string()).collect())),
        )
    }

    fn ids(polls: &[Poll]) -> Vec<String> {
        polls.iter().map(|p| p.id.clone()).collect()
    }

    fn options(count: usize, preferred: &str) -> BoardOptions {
        BoardOptions {
            count,
            featured_size: 3,
            preferred: preferred.split(',').map(|k| k.to_string()).collect(),
            overrides: None,
        }
    }

    #[test]
    fn preferred_are_filtered_then_topped_up_by_population() {
        let index = tagged(&[
            ("p1", "a"),
            ("p2", "b"),
            ("p3", "b"),
            ("p4", "c"),
            ("p5", "c"),
            ("p6", "c"),
        ]);
        let chosen = select_categories(&index, &options(3, "a,missing"));
        assert_eq!(chosen, vec!["a", "c", "b"]);

        let two = select_categories(&index, &options(2, "a,b,c"));
        assert_eq!(two, vec!["a", "b"]);
    }

    #[test]
    fn overrides_win_over_preferred() {
        let index = tagged(&[("p1", "a"), ("p2", "b")]);
        let mut opts = options(2, "a");
        opts.overrides = Some(vec!["b".to_string(), "b".to_string()]);
        assert_eq!(select_categories(&index, &opts), vec!["b", "a"]);
    }

    #[test]
    fn inactive_polls_are_not_indexed() {
        let index = CategoryIndex::from_tagged(vec![
            (poll("p1"), vec!["a".to_string()]),
            (poll("p2").inactive(), vec!["a".to_string()]),
        ]);
        assert_eq!(index.poll_count("a"), 1);
    }

    #[test]
    fn sample_and_shuffle_keep_elements() {
        let mut rng = SmallRng::seed_from_u64(7);
        let picked = sample((0..10).collect::<Vec<_>>(), 4, &mut rng);
        assert_eq!(picked.len(), 4);
        assert_eq!(picked.iter().collect::<HashSet<_>>().len(), 4);
        assert_eq!(sample(vec![1, 2], 5, &mut rng).len(), 2);

        let mut items: Vec<u32> = (0..20).collect();
        shuffle(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn featured_and_rest_partition_the_pool() {
        let index = tagged(&[
            ("p1", "a"),
            ("p2", "a"),
            ("p3", "a"),
            ("p4", "a"),
            ("p5", "a"),
            ("q1", "b"),
        ]);
        let session = MemoryStore::new();
        let composer = BoardComposer::new(&session, options(2, "a,b"));
        let boards = composer.compose(&index, &mut SmallRng::seed_from_u64(1)).await;

        assert_eq!(boards.len(), 2);
        let a = &boards[0];
        assert_eq!(a.featured.len(), 3);
        assert_eq!(a.rest.len(), 2);
        let featured: HashSet<String> = ids(&a.featured).into_iter().collect();
        let rest: HashSet<String> = ids(&a.rest).into_iter().collect();
        assert!(featured.is_disjoint(&rest));
        assert_eq!(featured.union(&rest).count(), 5);

        let b = &boards[1];
        assert_eq!(ids(&b.featured), vec!["q1"]);
        assert!(b.rest.is_empty());
    }

    #[tokio::test]
    async fn featured_set_is_stable_within_a_session() {
        let entries: Vec<(String, Vec<String>)> =
            (0..12).map(|i| (format!("p{}", i), vec!["a".to_string()])).collect();
        let index = CategoryIndex::from_tagged(entries.iter().map(|(id, keys)| (poll(id), keys.clone())));
        let session = MemoryStore::new();
        let composer = BoardComposer::new(&session, options(1, "a"));

        let first = composer.compose(&index, &mut SmallRng::seed_from_u64(1)).await;
        let second = composer.compose(&index, &mut SmallRng::seed_from_u64(99)).await;
        assert_eq!(ids(&first[0].featured), ids(&second[0].featured));

        let stored = load_featured(&session, "a").await;
        assert_eq!(stored, ids(&first[0].featured));

        // A fresh session gets its own pick and remembers it too
        let other_session = MemoryStore::new();
        let other = BoardComposer::new(&other_session, options(1, "a"))
            .compose(&index, &mut SmallRng::seed_from_u64(5))
            .await;
        assert_eq!(other[0].featured.len(), 3);
    }

    #[tokio::test]
    async fn stale_session_ids_are_refilled() {
        let index = tagged(&[("p1", "a"), ("p2", "a"), ("p3", "a"), ("p4", "a")]);
        let session = MemoryStore::new();
        session
            .set(&featured_key("a"), r#"["gone","p2","p2"]"#)
            .await
            .unwrap();

        let composer = BoardComposer::new(&session, options(1, "a"));
        let boards = composer.compose(&index, &mut SmallRng::seed_from_u64(3)).await;
        let featured = ids(&boards[0].featured);
        assert_eq!(featured.len(), 3);
        assert_eq!(featured[0], "p2");
        assert_eq!(load_featured(&session, "a").await, featured);
    }

    #[tokio::test]
    async fn polls_are_claimed_by_the_first_board() {
        let index = tagged(&[
            ("shared", "a,b"),
            ("a1", "a"),
            ("b1", "b"),
        ]);
        let session = MemoryStore::new();
        let composer = BoardComposer::new(&session, options(2, "a,b"));
        let boards = composer.compose(&index, &mut SmallRng::seed_from_u64(11)).await;

        let seen: Vec<String> = boards
            .iter()
            .flat_map(|b| ids(&b.featured).into_iter().chain(ids(&b.rest)))
            .collect();
        assert_eq!(seen.iter().filter(|id| *id == "shared").count(), 1);
        assert!(ids(&boards[0].featured).contains(&"shared".to_string()));
        assert_eq!(ids(&boards[1].featured), vec!["b1"]);
    }

    #[tokio::test]
    async fn filters_do_not_disturb_featured_selection() {
        let index = CategoryIndex::build(&[
            Poll::new("w1", "Best wedding limo color?", &["Black", "White"]),
            Poll::new("w2", "Wedding guest shuttle?", &["Yes", "No"]),
            Poll::new("w3", "Bridal party size?", &["Small", "Big"]),
            Poll::new("w4", "Rehearsal dinner ride?", &["Yes", "No"]),
        ]);
        let session = MemoryStore::new();
        let mut opts = options(1, "event:wedding");
        opts.featured_size = 3;
        let composer = BoardComposer::new(&session, opts);
        let boards = composer.compose(&index, &mut SmallRng::seed_from_u64(2)).await;
        let board = &boards[0];
        assert_eq!(board.total_polls(), 4);

        let filter = BoardFilter { query: Some("SHUTTLE".to_string()), category: None };
        let visible = filter.apply(board, &index);
        assert_eq!(visible.total_polls(), 1);

        let again = composer.compose(&index, &mut SmallRng::seed_from_u64(8)).await;
        assert_eq!(ids(&again[0].featured), ids(&board.featured));

        let by_category = BoardFilter { query: None, category: Some("vehicle:limousine".to_string()) };
        let limo_only = by_category.apply(board, &index);
        assert_eq!(limo_only.total_polls(), 1);
        assert!(BoardFilter::default().is_empty());
    }

    proptest! {
        #[test]
        fn featured_is_bounded_and_partitions_the_pool(
            pool_size in 0usize..15,
            featured_size in 0usize..6,
            remembered in prop::collection::vec(0usize..20, 0..5),
            seed in any::<u64>(),
        ) {
            let index = CategoryIndex::from_tagged((0..pool_size).map(|i| (poll(&format!("p{}", i)), vec!["a".to_string()])));
            let session = MemoryStore::new();
            let stored: Vec<String> = remembered.iter().map(|i| format!("p{}", i)).collect();

            let boards = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(async {
                    save_featured(&session, "a", &stored).await.unwrap();
                    let mut opts = options(1, "a");
                    opts.featured_size = featured_size;
                    BoardComposer::new(&session, opts)
                        .compose(&index, &mut SmallRng::seed_from_u64(seed))
                        .await
                });

            if pool_size == 0 {
                prop_assert!(boards.is_empty());
                return Ok(());
            }
            let board = &boards[0];
            prop_assert_eq!(board.featured.len(), featured_size.min(pool_size));

            let featured: HashSet<String> = ids(&board.featured).into_iter().collect();
            let rest: HashSet<String> = ids(&board.rest).into_iter().collect();
            prop_assert_eq!(featured.len(), board.featured.len());
            prop_assert!(featured.is_disjoint(&rest));
            let all: HashSet<String> = featured.union(&rest).cloned().collect();
            let expected: HashSet<String> = (0..pool_size).map(|i| format!("p{}", i)).collect();
            prop_assert_eq!(all, expected);
        }
    }
}
