use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::blocking::{BlockingIndex, BlockingStrategy, block_pairs};
use crate::cluster::{Edge, assemble_groups};
use crate::config::DedupConfig;
use crate::error::{DedupError, Result};
use crate::fields::PreparedRecord;
use crate::models::{DuplicateDetectionRequest, DuplicateGroup, MediaMetadata, SimilarityResult};
use crate::scorer::{PairwiseScorer, ScoreOptions};

/// Pairs scored between two cancellation checks inside one block.
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Shared flag a caller flips to stop a running detection.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Detects duplicate groups in a batch of recognized media records.
///
/// Holds only immutable configuration, so one engine can serve concurrent
/// callers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct DuplicateEngine {
    config: DedupConfig,
    scorer: PairwiseScorer,
    blocking: Arc<dyn BlockingStrategy>,
}

impl Default for DuplicateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DuplicateEngine {
    pub fn new() -> Self {
        Self::from_valid_config(DedupConfig::default())
    }

    pub fn with_config(config: DedupConfig) -> Result<Self> {
        if let Err(err) = config.validate() {
            warn!(error = %err, "rejecting duplicate detection config");
            return Err(err);
        }
        Ok(Self::from_valid_config(config))
    }

    /// Replaces the configured blocking strategy with a custom one.
    pub fn with_blocking_strategy(mut self, strategy: Arc<dyn BlockingStrategy>) -> Self {
        self.blocking = strategy;
        self
    }

    fn from_valid_config(config: DedupConfig) -> Self {
        let scorer = PairwiseScorer::new(config.profiles.clone()).with_match_floor(config.match_floor);
        let blocking = config.blocking.strategy();
        Self {
            config,
            scorer,
            blocking,
        }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn is_duplicate(&self, a: &MediaMetadata, b: &MediaMetadata) -> (bool, f64) {
        self.scorer.is_duplicate(a, b)
    }

    pub fn compare(&self, a: &MediaMetadata, b: &MediaMetadata, request: &DuplicateDetectionRequest) -> SimilarityResult {
        self.scorer.compare(a, b, &score_options(request))
    }

    /// Every group in `items`, re-evaluating records already grouped before.
    pub fn find_all_duplicates(&self, items: &[MediaMetadata]) -> Vec<DuplicateGroup> {
        let request = DuplicateDetectionRequest::new().with_include_existing(true);
        match self.detect_duplicates(items, &request, &CancelToken::new()) {
            Ok(groups) => groups,
            Err(err) => {
                warn!(error = %err, "duplicate detection failed");
                Vec::new()
            }
        }
    }

    pub fn detect_duplicates(
        &self,
        items: &[MediaMetadata],
        request: &DuplicateDetectionRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<DuplicateGroup>> {
        if cancel.is_cancelled() {
            return Err(DedupError::Cancelled);
        }
        let started = Instant::now();

        if request.batch_size == 0 {
            debug!(batch_size = self.config.default_batch_size, "using default batch size");
        }
        let cap = self.config.batch_cap(request.batch_size);
        let selected: Vec<&MediaMetadata> = items
            .iter()
            .filter(|item| request.accepts(item.media_type))
            .filter(|item| request.include_existing || item.duplicate_group_id.is_none())
            .take(cap)
            .collect();

        info!(
            items = items.len(),
            selected = selected.len(),
            "starting duplicate detection"
        );
        if selected.len() < 2 {
            return Ok(Vec::new());
        }

        let prepared: Vec<PreparedRecord<'_>> = selected.iter().map(|item| PreparedRecord::new(item)).collect();
        let index = BlockingIndex::build(&selected, self.blocking.as_ref());
        debug!(
            blocks = index.blocks().len(),
            largest_block = index.largest_block(),
            comparisons = index.candidate_pair_count(),
            "built blocking index"
        );

        let options = score_options(request);
        let score_block = |block: &[usize]| -> Result<Vec<Edge>> {
            let mut edges = Vec::new();
            for (n, (left, right)) in block_pairs(block).enumerate() {
                if n % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                    return Err(DedupError::Cancelled);
                }
                let result = self.scorer.compare_prepared(&prepared[left], &prepared[right], &options);
                if result.is_duplicate {
                    edges.push(Edge {
                        left,
                        right,
                        score: result.score,
                        matched_attributes: result.matched_attributes,
                    });
                }
            }
            Ok(edges)
        };

        let per_block: Vec<Vec<Edge>> = if self.config.parallel {
            index
                .blocks()
                .par_iter()
                .map(|block| score_block(block.as_slice()))
                .collect::<Result<_>>()?
        } else {
            index
                .blocks()
                .iter()
                .map(|block| score_block(block.as_slice()))
                .collect::<Result<_>>()?
        };

        if cancel.is_cancelled() {
            return Err(DedupError::Cancelled);
        }

        let edges: Vec<Edge> = per_block.into_iter().flatten().collect();
        let groups = assemble_groups(&selected, &edges, &self.config.canonical_order);

        info!(
            groups = groups.len(),
            edges = edges.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "duplicate detection finished"
        );
        Ok(groups)
    }

    /// Runs [`Self::detect_duplicates`] on the blocking thread pool.
    pub async fn detect_duplicates_async(
        self: Arc<Self>,
        items: Vec<MediaMetadata>,
        request: DuplicateDetectionRequest,
        cancel: CancelToken,
    ) -> Result<Vec<DuplicateGroup>> {
        tokio::task::spawn_blocking(move || self.detect_duplicates(&items, &request, &cancel))
            .await
            .map_err(|err| DedupError::Task(err.to_string()))?
    }
}

fn score_options(request: &DuplicateDetectionRequest) -> ScoreOptions {
    ScoreOptions {
        methods: request.method_set(),
        threshold: request.threshold_override(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use super::*;
    use crate::blocking::{BlockingKind, ExhaustiveBlocking};
    use crate::models::MediaType;

    const GENRES: [&str; 6] = ["drama", "comedy", "horror", "western", "documentary", "animation"];

    /// Deterministic pseudo-random source for synthetic catalogs.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn word(&mut self, len: usize) -> String {
            (0..len)
                .map(|_| (b'a' + (self.next() % 26) as u8) as char)
                .collect()
        }
    }

    fn synthetic_catalog(count: usize) -> Vec<MediaMetadata> {
        let mut rng = Lcg(42);
        (0..count)
            .map(|i| MediaMetadata {
                year: Some(1950 + (rng.next() % 70) as i32),
                genre: Some(GENRES[(rng.next() % GENRES.len() as u64) as usize].to_string()),
                director: Some(format!("{} {}", rng.word(5), rng.word(8))),
                duration: Some(4800 + (rng.next() % 4000) as u32),
                confidence: 0.5,
                ..MediaMetadata::new(
                    format!("item-{i:04}"),
                    MediaType::Video,
                    format!("{} {}", rng.word(7), rng.word(6)),
                )
            })
            .collect()
    }

    fn movie(id: &str, title: &str, year: i32) -> MediaMetadata {
        MediaMetadata {
            year: Some(year),
            director: Some("Ridley Scott".to_string()),
            genre: Some("Science Fiction".to_string()),
            ..MediaMetadata::new(id, MediaType::Video, title)
        }
    }

    fn member_sets(groups: &[DuplicateGroup]) -> Vec<BTreeSet<String>> {
        groups
            .iter()
            .map(|g| g.members.iter().map(|m| m.id.clone()).collect())
            .collect()
    }

    #[test]
    fn synthetic_catalog_with_one_true_pair() {
        let mut items = synthetic_catalog(999);
        let twin = MediaMetadata {
            id: "item-twin".to_string(),
            resolution: Some("720p".to_string()),
            file_size: Some(700_000_000),
            ..items[17].clone()
        };
        items.push(twin);

        let started = Instant::now();
        let groups = DuplicateEngine::new().find_all_duplicates(&items);
        assert!(started.elapsed() < Duration::from_secs(5));

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.file_count, 2);
        assert_eq!(group.member_ids(), vec!["item-0017", "item-twin"]);
        assert_eq!(group.canonical_member.id, "item-twin");
        assert!(group.average_similarity >= 0.9);
    }

    #[test]
    fn empty_and_single_inputs_yield_no_groups() {
        let engine = DuplicateEngine::new();
        assert!(engine.find_all_duplicates(&[]).is_empty());
        assert!(engine.find_all_duplicates(&[movie("a", "Alien", 1979)]).is_empty());
    }

    #[test]
    fn grouping_is_transitive() {
        let mut a = MediaMetadata::new("a", MediaType::Video, "Blade Runner");
        let mut b = MediaMetadata::new("b", MediaType::Video, "Do Androids Dream of Electric Sheep");
        let mut c = MediaMetadata::new("c", MediaType::Video, "Replicant Hunt");
        a.external_ids.insert("imdb".to_string(), "tt0083658".to_string());
        b.external_ids.insert("imdb".to_string(), "tt0083658".to_string());
        b.file_hash = Some("cafebabe".to_string());
        c.file_hash = Some("cafebabe".to_string());

        let engine = DuplicateEngine::new().with_blocking_strategy(Arc::new(ExhaustiveBlocking));
        assert!(!engine.is_duplicate(&a, &c).0);

        let groups = engine.find_all_duplicates(&[a, b, c]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec!["a", "b", "c"]);
        assert_eq!(
            groups[0].match_types,
            vec!["external_id:imdb".to_string(), "file_hash".to_string()]
        );
    }

    #[test]
    fn higher_threshold_only_splits_groups() {
        let items = vec![
            movie("1", "Alien", 1979),
            movie("2", "Alien", 1979),
            movie("3", "Aliens", 1986),
            movie("4", "Alien 3", 1992),
            movie("5", "Alien Resurrection", 1997),
            movie("6", "Prometheus", 2012),
        ];
        let engine = DuplicateEngine::new().with_blocking_strategy(Arc::new(ExhaustiveBlocking));

        let partition = |threshold: f64| {
            let request = DuplicateDetectionRequest::new().with_min_similarity(threshold);
            member_sets(&engine.detect_duplicates(&items, &request, &CancelToken::new()).unwrap())
        };

        let grouped_members = |groups: &[BTreeSet<String>]| groups.iter().map(BTreeSet::len).sum::<usize>();

        let thresholds = [0.4, 0.6, 0.8, 0.95];
        for pair in thresholds.windows(2) {
            let loose = partition(pair[0]);
            let strict = partition(pair[1]);
            // Group count may rise when a weak link inside a chain drops out,
            // but no record joins a group.
            assert!(grouped_members(&strict) <= grouped_members(&loose));
            for group in &strict {
                assert!(
                    loose.iter().any(|outer| group.is_subset(outer)),
                    "{group:?} not contained at {}",
                    pair[0]
                );
            }
        }
    }

    #[test]
    fn request_filters_media_types_and_existing_groups() {
        let mut items = vec![
            movie("v1", "Dune", 1984),
            movie("v2", "Dune", 1984),
            MediaMetadata {
                media_type: MediaType::Book,
                author: Some("Frank Herbert".to_string()),
                ..movie("b1", "Dune", 1965)
            },
            MediaMetadata {
                media_type: MediaType::Book,
                author: Some("Frank Herbert".to_string()),
                ..movie("b2", "Dune", 1965)
            },
        ];
        let engine = DuplicateEngine::new();
        let cancel = CancelToken::new();

        let books_only = DuplicateDetectionRequest::new().with_media_types([MediaType::Book]);
        let groups = engine.detect_duplicates(&items, &books_only, &cancel).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].media_type, MediaType::Book);

        items[0].duplicate_group_id = Some("previous-run".to_string());
        let fresh_only = DuplicateDetectionRequest::new();
        let groups = engine.detect_duplicates(&items, &fresh_only, &cancel).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].media_type, MediaType::Book);

        let groups = engine
            .detect_duplicates(&items, &fresh_only.with_include_existing(true), &cancel)
            .unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn batch_size_caps_considered_records() {
        let items = vec![
            movie("1", "Heat", 1995),
            movie("2", "Ronin", 1998),
            movie("3", "Heat", 1995),
        ];
        let engine = DuplicateEngine::new();
        let cancel = CancelToken::new();

        let capped = DuplicateDetectionRequest::new().with_batch_size(2);
        assert!(engine.detect_duplicates(&items, &capped, &cancel).unwrap().is_empty());

        let uncapped = DuplicateDetectionRequest::new();
        assert_eq!(engine.detect_duplicates(&items, &uncapped, &cancel).unwrap().len(), 1);
    }

    #[test]
    fn cancelled_token_stops_detection() {
        let items = synthetic_catalog(50);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = DuplicateEngine::new().detect_duplicates(&items, &DuplicateDetectionRequest::new(), &cancel);
        assert!(matches!(result, Err(DedupError::Cancelled)));
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let mut items = synthetic_catalog(300);
        for i in [3usize, 40, 122] {
            let mut twin = items[i].clone();
            twin.id = format!("{}-copy", twin.id);
            items.push(twin);
        }

        let parallel = DuplicateEngine::new();
        let sequential = DuplicateEngine::with_config(DedupConfig {
            parallel: false,
            ..DedupConfig::default()
        })
        .unwrap();

        let a = member_sets(&parallel.find_all_duplicates(&items));
        let b = member_sets(&sequential.find_all_duplicates(&items));
        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        let mut items = synthetic_catalog(200);
        let mut twin = items[5].clone();
        twin.id = "twin".to_string();
        items.push(twin);

        let engine = Arc::new(DuplicateEngine::new());
        let expected = member_sets(&engine.find_all_duplicates(&items));

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let engine = Arc::clone(&engine);
                    let items = &items;
                    scope.spawn(move || member_sets(&engine.find_all_duplicates(items)))
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn invalid_config_is_rejected() {
        DedupConfig::default().validate().unwrap();

        let mut config = DedupConfig::default();
        config.profiles.get_mut(MediaType::Video).threshold = -0.1;
        assert!(matches!(
            DuplicateEngine::with_config(config),
            Err(DedupError::InvalidProfile(_))
        ));

        let exhaustive = DuplicateEngine::with_config(DedupConfig {
            blocking: BlockingKind::Exhaustive,
            ..DedupConfig::default()
        });
        assert!(exhaustive.is_ok());
    }

    #[tokio::test]
    async fn async_wrapper_runs_on_blocking_pool() {
        let items = vec![movie("1", "Gladiator", 2000), movie("2", "Gladiator", 2000)];
        let engine = Arc::new(DuplicateEngine::new());

        let groups = Arc::clone(&engine)
            .detect_duplicates_async(items.clone(), DuplicateDetectionRequest::new(), CancelToken::new())
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = engine
            .detect_duplicates_async(items, DuplicateDetectionRequest::new(), cancel)
            .await;
        assert!(matches!(result, Err(DedupError::Cancelled)));
    }
}
