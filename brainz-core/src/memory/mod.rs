//! Per-agent episodic memory: a mergeable short-term store and an
//! immutable long-term store fed by promotion.
//!
//! Insertion order of operations is fixed:
//!
//! 1. merge into a similar short-term entry (and stop), else
//! 2. run the promotion pass (the newcomer counts toward its group), then
//! 3. evict the weakest short-term entry if still at capacity, then
//! 4. store the newcomer.

pub mod record;

pub use record::Memory;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::config::MemoryConfig;
use crate::consolidation::promote_short_term;
use crate::eviction::{Admission, admit_long_term, weakest_short_term};
use crate::types::{Location, SimTime, SourceId};

/// What to look memories up by.
#[derive(Debug, Clone, Copy)]
pub enum RecallKey<'a> {
    /// Memories about this subject.
    About(&'a SourceId),
    /// Memories affecting this stat.
    Stat(&'a str),
}

/// Outcome of [`MemoryStore::add_memory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddReport {
    /// Folded into an existing short-term entry.
    pub merged: bool,
    /// Long-term memories created by the promotion pass.
    pub promoted: usize,
    /// Short-term entries evicted to make room.
    pub evicted_short: usize,
    /// Long-term entries evicted to admit a stronger promotion.
    pub evicted_long: usize,
    /// Promotions dropped because long-term was full of stronger memories.
    pub rejected_long: usize,
    /// The newcomer now sits in short-term as its own entry.
    pub stored: bool,
}

/// Bounded short-term and long-term memory for one agent.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    short_term: Vec<Memory>,
    long_term: Vec<Memory>,
    config: MemoryConfig,
    rng: StdRng,
}

impl MemoryStore {
    /// Create an empty store. `seed` drives eviction tie-breaks.
    #[must_use]
    pub fn new(config: MemoryConfig, seed: u64) -> Self {
        Self {
            short_term: Vec::with_capacity(config.short_term_capacity),
            long_term: Vec::new(),
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Record a memory.
    pub fn add_memory(&mut self, memory: Memory) -> AddReport {
        let mut report = AddReport::default();
        let radius = self.config.similarity_radius;

        if let Some(existing) = self.short_term.iter_mut().find(|existing| {
            existing.same_subject(&memory, radius) && !existing.ready_to_return(memory.created_at)
        }) {
            existing.merge(&memory);
            debug!(stat = %existing.stat, influence = existing.influence, "memory merged");
            report.merged = true;
            return report;
        }

        let pass = promote_short_term(
            &mut self.short_term,
            Some(&memory),
            self.config.promotion_threshold,
            memory.created_at,
        );
        for promotion in pass.promoted {
            report.promoted += 1;
            debug!(
                stat = %promotion.memory.stat,
                influence = promotion.memory.influence,
                merged_from = promotion.sources.len(),
                "memory promoted to long-term"
            );
            match admit_long_term(&mut self.long_term, self.config.long_term_capacity, promotion.memory) {
                Admission::Inserted => {}
                Admission::Replaced(evicted) => {
                    report.evicted_long += 1;
                    debug!(stat = %evicted.stat, influence = evicted.influence, "long-term memory evicted");
                }
                Admission::Rejected(rejected) => {
                    report.rejected_long += 1;
                    debug!(stat = %rejected.stat, influence = rejected.influence, "promotion rejected, long-term full");
                }
            }
        }
        if pass.candidate_consumed {
            return report;
        }

        let capacity = self.config.short_term_capacity;
        if capacity == 0 {
            return report;
        }
        while self.short_term.len() >= capacity {
            let Some(idx) = weakest_short_term(&self.short_term, &mut self.rng) else {
                break;
            };
            let evicted = self.short_term.swap_remove(idx);
            report.evicted_short += 1;
            debug!(stat = %evicted.stat, influence = evicted.influence, "short-term memory evicted");
        }

        self.short_term.push(memory);
        report.stored = true;
        report
    }

    /// Memories (both stores) matching `key`, optionally within `radius` of a point.
    #[must_use]
    pub fn recall(&self, key: RecallKey<'_>, within: Option<(Location, f32)>) -> Vec<&Memory> {
        self.all()
            .filter(|m| match key {
                RecallKey::About(source) => m.about.as_ref() == Some(source),
                RecallKey::Stat(stat) => m.stat == stat,
            })
            .filter(|m| within.is_none_or(|(center, radius)| m.location.within(&center, radius)))
            .collect()
    }

    /// Memories (both stores) about influences on `stat`.
    #[must_use]
    pub fn recall_influencing_stat(&self, stat: &str) -> Vec<&Memory> {
        self.recall(RecallKey::Stat(stat), None)
    }

    /// Whether a short-term memory about `source` on `stat` is still cooling down.
    #[must_use]
    pub fn remembers_unready(&self, source: &SourceId, stat: &str, now: SimTime) -> bool {
        self.short_term
            .iter()
            .any(|m| m.about.as_ref() == Some(source) && m.stat == stat && !m.ready_to_return(now))
    }

    /// Short-term entries.
    #[must_use]
    pub fn short_term(&self) -> &[Memory] {
        &self.short_term
    }

    /// Long-term entries.
    #[must_use]
    pub fn long_term(&self) -> &[Memory] {
        &self.long_term
    }

    /// Total entries across both stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.short_term.len() + self.long_term.len()
    }

    /// Whether both stores are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn all(&self) -> impl Iterator<Item = &Memory> {
        self.short_term.iter().chain(self.long_term.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InteractableId;

    fn store() -> MemoryStore {
        MemoryStore::new(MemoryConfig::default(), 7)
    }

    fn pantry() -> SourceId {
        SourceId::Interactable(InteractableId(1))
    }

    fn about(source: SourceId, stat: &str, influence: f32, at: f64, cooldown: f32) -> Memory {
        Memory::new(Some(source), Location::default(), stat, influence, true, SimTime::from_secs(at), cooldown)
    }

    #[test]
    fn similar_memory_within_cooldown_merges() {
        let mut memories = store();
        memories.add_memory(about(pantry(), "hunger", 5.0, 0.0, 30.0));
        let report = memories.add_memory(about(pantry(), "hunger", 5.0, 10.0, 30.0));

        assert!(report.merged);
        assert_eq!(memories.short_term().len(), 1);
        assert!((memories.short_term()[0].influence - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn distinct_memories_complete_promotion() {
        let mut memories = store();
        memories.add_memory(about(pantry(), "hunger", 40.0, 0.0, 5.0));
        memories.add_memory(about(pantry(), "hunger", 40.0, 10.0, 5.0));
        let report = memories.add_memory(about(pantry(), "hunger", 30.0, 20.0, 5.0));

        assert_eq!(report.promoted, 1);
        assert!(!report.stored);
        assert!(memories.short_term().is_empty());
        assert_eq!(memories.long_term().len(), 1);
        assert!((memories.long_term()[0].influence - 110.0).abs() < 1e-4);
    }

    #[test]
    fn short_term_never_exceeds_capacity() {
        let config = MemoryConfig {
            short_term_capacity: 3,
            promotion_threshold: 1_000.0,
            ..MemoryConfig::default()
        };
        let mut memories = MemoryStore::new(config, 1);
        for i in 0..10u16 {
            let source = SourceId::Interactable(InteractableId(u32::from(i)));
            let report = memories.add_memory(about(source, "hunger", 1.0 + f32::from(i), f64::from(i), 0.0));
            assert!(report.stored);
        }
        assert_eq!(memories.short_term().len(), 3);
        assert!(memories.short_term().iter().all(|m| m.influence >= 8.0));
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let config = MemoryConfig {
            short_term_capacity: 0,
            ..MemoryConfig::default()
        };
        let mut memories = MemoryStore::new(config, 1);
        let report = memories.add_memory(about(pantry(), "hunger", 3.0, 0.0, 0.0));
        assert!(!report.stored);
        assert!(memories.is_empty());
    }

    #[test]
    fn recall_by_stat_spans_both_stores() {
        let mut memories = store();
        memories.add_memory(about(pantry(), "hunger", 60.0, 0.0, 0.0));
        memories.add_memory(about(pantry(), "hunger", 60.0, 1.0, 0.0));
        memories.add_memory(about(SourceId::Behavior("nap".into()), "energy", 5.0, 2.0, 0.0));
        memories.add_memory(about(SourceId::Interactable(InteractableId(4)), "hunger", -2.0, 3.0, 0.0));

        assert_eq!(memories.long_term().len(), 1);
        assert_eq!(memories.recall_influencing_stat("hunger").len(), 2);
        assert_eq!(memories.recall(RecallKey::About(&pantry()), None).len(), 1);
    }

    #[test]
    fn recall_filters_by_range() {
        let mut memories = store();
        let near = Memory::new(Some(pantry()), Location::new(1.0, 0.0, 0.0), "hunger", -4.0, true, SimTime::ZERO, 0.0);
        let far_source = SourceId::Interactable(InteractableId(9));
        let far = Memory::new(Some(far_source), Location::new(50.0, 0.0, 0.0), "hunger", -4.0, true, SimTime::ZERO, 0.0);
        memories.add_memory(near);
        memories.add_memory(far);

        let found = memories.recall(RecallKey::Stat("hunger"), Some((Location::default(), 5.0)));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].about, Some(pantry()));
    }

    #[test]
    fn unready_memories_gate_the_source() {
        let mut memories = store();
        memories.add_memory(about(pantry(), "hunger", -10.0, 0.0, 20.0));
        assert!(memories.remembers_unready(&pantry(), "hunger", SimTime::from_secs(5.0)));
        assert!(!memories.remembers_unready(&pantry(), "hunger", SimTime::from_secs(20.0)));
        assert!(!memories.remembers_unready(&pantry(), "energy", SimTime::from_secs(5.0)));
    }
}
