//! Diagram state cache.
//!
//! `DiagramCache` stores, per block position, the last-seen source hash and
//! the rendered markup for that source, plus where the block sits in its
//! `Unrendered → Pending → Rendered | Failed` lifecycle. One cache exists per
//! document; it lives until the document is discarded.
//!
//! Every transition into `Pending` hands out a [`RenderTicket`]. A completion
//! is written back only if its ticket still names the entry's position,
//! source hash and generation, so a result that raced a source change or a
//! reorder is a guaranteed no-op.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use super::engine::DiagramError;

/// Fingerprint of a diagram block's raw source.
pub fn compute_source_hash(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// Lifecycle of a diagram block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagramStatus {
    /// Seen, but no render has been requested (empty or still streaming).
    Unrendered,
    /// A render has been requested and not yet completed.
    Pending,
    /// The engine produced markup for the cached source hash.
    Rendered,
    /// The engine rejected the cached source.
    Failed,
}

impl DiagramStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramStatus::Unrendered => "unrendered",
            DiagramStatus::Pending => "pending",
            DiagramStatus::Rendered => "rendered",
            DiagramStatus::Failed => "failed",
        }
    }
}

/// Cached state for one block position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramCacheEntry {
    pub position: usize,
    pub source_hash: u64,
    /// Engine output for `source_hash`; empty unless `Rendered`.
    pub rendered_markup: String,
    pub status: DiagramStatus,
    /// Bumped whenever the entry is re-armed or invalidated.
    pub generation: u64,
    /// Engine error message when `Failed`.
    pub error: Option<String>,
}

/// Cancellation token for one requested render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTicket {
    pub position: usize,
    pub source_hash: u64,
    pub generation: u64,
}

/// Outcome of writing a completed render back into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The entry moved to the given status.
    Applied(DiagramStatus),
    /// The ticket no longer matches; the result was dropped.
    Stale,
}

/// Cache statistics for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of cached entries.
    pub entry_count: usize,
    /// Entries awaiting an engine result.
    pub pending_count: usize,
    /// Number of times rendered markup was reused.
    pub hit_count: u64,
    /// Number of times a block needed a new render.
    pub miss_count: u64,
}

/// Position-keyed diagram state for one document.
#[derive(Debug, Default)]
pub struct DiagramCache {
    entries: BTreeMap<usize, DiagramCacheEntry>,
    /// Markup evicted from a position during the current pass, by source hash.
    retired: HashMap<u64, String>,
    next_generation: u64,
    hit_count: u64,
    miss_count: u64,
}

impl DiagramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for a block position.
    pub fn get(&self, position: usize) -> Option<&DiagramCacheEntry> {
        self.entries.get(&position)
    }

    /// Rendered markup for `position` if it was produced from `source_hash`.
    ///
    /// Counts a hit or a miss.
    pub fn lookup_rendered(&mut self, position: usize, source_hash: u64) -> Option<&str> {
        let reusable = self.entries.get(&position).is_some_and(|entry| {
            entry.status == DiagramStatus::Rendered
                && entry.source_hash == source_hash
                && !entry.rendered_markup.is_empty()
        });
        if reusable {
            self.hit_count += 1;
            self.entries
                .get(&position)
                .map(|entry| entry.rendered_markup.as_str())
        } else {
            self.miss_count += 1;
            None
        }
    }

    /// Markup rendered for `source_hash` at any position other than `position`,
    /// including markup evicted earlier in the current pass.
    pub fn find_rendered_by_hash(&self, source_hash: u64, position: usize) -> Option<&str> {
        self.entries
            .values()
            .find(|entry| {
                entry.position != position
                    && entry.status == DiagramStatus::Rendered
                    && entry.source_hash == source_hash
                    && !entry.rendered_markup.is_empty()
            })
            .map(|entry| entry.rendered_markup.as_str())
            .or_else(|| self.retired.get(&source_hash).map(String::as_str))
    }

    /// Start a render pass: markup evicted during the previous pass is dropped.
    pub fn begin_pass(&mut self) {
        self.retired.clear();
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn store(&mut self, position: usize, source_hash: u64, status: DiagramStatus) -> u64 {
        let generation = self.bump_generation();
        let previous = self.entries.insert(
            position,
            DiagramCacheEntry {
                position,
                source_hash,
                rendered_markup: String::new(),
                status,
                generation,
                error: None,
            },
        );
        if let Some(old) = previous
            && old.status == DiagramStatus::Rendered
            && old.source_hash != source_hash
            && !old.rendered_markup.is_empty()
        {
            self.retired.insert(old.source_hash, old.rendered_markup);
        }
        generation
    }

    /// Move `position` to `Pending` for `source_hash` and hand out its ticket.
    ///
    /// Any previously cached markup for the position is dropped, and tickets
    /// issued earlier become stale.
    pub fn arm(&mut self, position: usize, source_hash: u64) -> RenderTicket {
        let generation = self.store(position, source_hash, DiagramStatus::Pending);
        RenderTicket {
            position,
            source_hash,
            generation,
        }
    }

    /// Record `position` as seen but not rendered, invalidating its tickets.
    pub fn mark_unrendered(&mut self, position: usize, source_hash: u64) {
        let unchanged = self.entries.get(&position).is_some_and(|entry| {
            entry.status == DiagramStatus::Unrendered && entry.source_hash == source_hash
        });
        if !unchanged {
            self.store(position, source_hash, DiagramStatus::Unrendered);
        }
    }

    /// Store markup rendered elsewhere for the same source at `position`.
    pub fn adopt(&mut self, position: usize, source_hash: u64, markup: String) {
        self.store(position, source_hash, DiagramStatus::Rendered);
        self.retired.remove(&source_hash);
        if let Some(entry) = self.entries.get_mut(&position) {
            entry.rendered_markup = markup;
        }
        self.hit_count += 1;
    }

    /// Whether `ticket` still names a `Pending` entry.
    pub fn is_current(&self, ticket: &RenderTicket) -> bool {
        self.entries.get(&ticket.position).is_some_and(|entry| {
            entry.status == DiagramStatus::Pending
                && entry.source_hash == ticket.source_hash
                && entry.generation == ticket.generation
        })
    }

    /// Write an engine result back if `ticket` is still current.
    pub fn resolve(
        &mut self,
        ticket: &RenderTicket,
        result: Result<String, DiagramError>,
    ) -> Resolution {
        if !self.is_current(ticket) {
            return Resolution::Stale;
        }
        let Some(entry) = self.entries.get_mut(&ticket.position) else {
            return Resolution::Stale;
        };
        match result {
            Ok(markup) if !markup.trim().is_empty() => {
                entry.rendered_markup = markup;
                entry.status = DiagramStatus::Rendered;
                entry.error = None;
            }
            Ok(_) => {
                entry.status = DiagramStatus::Failed;
                entry.error = Some(DiagramError::EmptyOutput.to_string());
            }
            Err(e) => {
                entry.status = DiagramStatus::Failed;
                entry.error = Some(e.to_string());
            }
        }
        Resolution::Applied(entry.status)
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            pending_count: self
                .entries
                .values()
                .filter(|e| e.status == DiagramStatus::Pending)
                .count(),
            hit_count: self.hit_count,
            miss_count: self.miss_count,
        }
    }

    /// Drop entries whose position fails `keep`, returning how many went.
    ///
    /// Tickets issued for dropped positions become stale.
    pub fn forget_unless(&mut self, mut keep: impl FnMut(usize) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|&position, _| keep(position));
        before - self.entries.len()
    }

    /// Clear all cached entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.retired.clear();
        self.hit_count = 0;
        self.miss_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_hash_is_stable() {
        assert_eq!(compute_source_hash("A->B"), compute_source_hash("A->B"));
        assert_ne!(compute_source_hash("A->B"), compute_source_hash("A->C"));
    }

    #[test]
    fn test_arm_then_resolve() {
        let mut cache = DiagramCache::new();
        let ticket = cache.arm(0, 42);
        assert_eq!(cache.get(0).unwrap().status, DiagramStatus::Pending);
        assert!(cache.is_current(&ticket));

        let outcome = cache.resolve(&ticket, Ok("<svg/>".to_string()));
        assert_eq!(outcome, Resolution::Applied(DiagramStatus::Rendered));
        assert_eq!(cache.get(0).unwrap().rendered_markup, "<svg/>");
        assert!(!cache.is_current(&ticket));
    }

    #[test]
    fn test_lookup_requires_matching_hash() {
        let mut cache = DiagramCache::new();
        let ticket = cache.arm(3, 7);
        cache.resolve(&ticket, Ok("<svg>x</svg>".to_string()));

        assert_eq!(cache.lookup_rendered(3, 7), Some("<svg>x</svg>"));
        assert_eq!(cache.lookup_rendered(3, 8), None);
        assert_eq!(cache.lookup_rendered(4, 7), None);

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 2);
    }

    #[test]
    fn test_rearm_makes_old_ticket_stale() {
        let mut cache = DiagramCache::new();
        let old = cache.arm(0, 1);
        let new = cache.arm(0, 2);

        assert_eq!(
            cache.resolve(&old, Ok("<svg>old</svg>".to_string())),
            Resolution::Stale
        );
        assert_eq!(cache.get(0).unwrap().status, DiagramStatus::Pending);
        assert_eq!(
            cache.resolve(&new, Ok("<svg>new</svg>".to_string())),
            Resolution::Applied(DiagramStatus::Rendered)
        );
        assert_eq!(cache.get(0).unwrap().rendered_markup, "<svg>new</svg>");
    }

    #[test]
    fn test_same_hash_rearm_is_still_stale() {
        let mut cache = DiagramCache::new();
        let first = cache.arm(0, 1);
        cache.mark_unrendered(0, 9);
        let second = cache.arm(0, 1);
        assert_ne!(first.generation, second.generation);
        assert_eq!(cache.resolve(&first, Ok("<svg/>".into())), Resolution::Stale);
    }

    #[test]
    fn test_failure_and_empty_output() {
        let mut cache = DiagramCache::new();
        let ticket = cache.arm(0, 1);
        let outcome = cache.resolve(&ticket, Err(DiagramError::Parse("bad".to_string())));
        assert_eq!(outcome, Resolution::Applied(DiagramStatus::Failed));
        let entry = cache.get(0).unwrap();
        assert!(entry.rendered_markup.is_empty());
        assert!(entry.error.as_deref().unwrap().contains("bad"));

        let ticket = cache.arm(1, 2);
        assert_eq!(
            cache.resolve(&ticket, Ok("   ".to_string())),
            Resolution::Applied(DiagramStatus::Failed)
        );
    }

    #[test]
    fn test_rearm_drops_previous_markup() {
        let mut cache = DiagramCache::new();
        let ticket = cache.arm(0, 1);
        cache.resolve(&ticket, Ok("<svg>one</svg>".to_string()));
        cache.arm(0, 2);
        assert!(cache.get(0).unwrap().rendered_markup.is_empty());
        assert_eq!(cache.lookup_rendered(0, 1), None);
    }

    #[test]
    fn test_find_rendered_by_hash_and_adopt() {
        let mut cache = DiagramCache::new();
        let ticket = cache.arm(0, 11);
        cache.resolve(&ticket, Ok("<svg>moved</svg>".to_string()));

        assert_eq!(cache.find_rendered_by_hash(11, 0), None);
        let markup = cache.find_rendered_by_hash(11, 1).map(str::to_string);
        assert_eq!(markup.as_deref(), Some("<svg>moved</svg>"));

        cache.adopt(1, 11, markup.unwrap());
        let entry = cache.get(1).unwrap();
        assert_eq!(entry.status, DiagramStatus::Rendered);
        assert_eq!(entry.rendered_markup, "<svg>moved</svg>");
    }

    #[test]
    fn test_overwritten_markup_is_adoptable_until_next_pass() {
        let mut cache = DiagramCache::new();
        let ticket = cache.arm(0, 11);
        cache.resolve(&ticket, Ok("<svg>first</svg>".to_string()));

        // Another block takes position 0 before the moved one is visited.
        cache.arm(0, 22);
        assert_eq!(cache.find_rendered_by_hash(11, 1), Some("<svg>first</svg>"));

        cache.begin_pass();
        assert_eq!(cache.find_rendered_by_hash(11, 1), None);
    }

    #[test]
    fn test_mark_unrendered_is_idempotent() {
        let mut cache = DiagramCache::new();
        cache.mark_unrendered(0, 5);
        let generation = cache.get(0).unwrap().generation;
        cache.mark_unrendered(0, 5);
        assert_eq!(cache.get(0).unwrap().generation, generation);
        cache.mark_unrendered(0, 6);
        assert_ne!(cache.get(0).unwrap().generation, generation);
    }

    #[test]
    fn test_forget_unless_makes_tickets_stale() {
        let mut cache = DiagramCache::new();
        let kept = cache.arm(0, 1);
        let dropped = cache.arm(1, 2);
        assert_eq!(cache.forget_unless(|position| position == 0), 1);
        assert!(cache.is_current(&kept));
        assert!(!cache.is_current(&dropped));
        assert_eq!(
            cache.resolve(&dropped, Ok("<svg/>".to_string())),
            Resolution::Stale
        );
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn test_stats_and_clear() {
        let mut cache = DiagramCache::new();
        cache.arm(0, 1);
        cache.arm(1, 2);
        cache.lookup_rendered(0, 1);
        let stats = cache.stats();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.pending_count, 2);
        assert_eq!(stats.miss_count, 1);

        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
