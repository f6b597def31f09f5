//! Memory eviction: which memory gives way when a store is full.
//!
//! Both stores evict the memory with the weakest |influence|:
//!
//! - **Short-term** ties are broken at random, so equally faint impressions
//!   do not always lose in insertion order.
//! - **Long-term** ties are broken by age (oldest first). A newcomer weaker
//!   than everything already consolidated is rejected instead.

use ordered_float::OrderedFloat;
use rand::Rng;

use crate::memory::record::Memory;

fn strength(memory: &Memory) -> OrderedFloat<f32> {
    OrderedFloat(memory.influence.abs())
}

/// Index of the short-term memory to evict, ties broken by `rng`.
pub fn weakest_short_term<R: Rng + ?Sized>(memories: &[Memory], rng: &mut R) -> Option<usize> {
    let weakest = memories.iter().map(strength).min()?;
    let tied: Vec<usize> = memories
        .iter()
        .enumerate()
        .filter(|(_, m)| strength(m) == weakest)
        .map(|(i, _)| i)
        .collect();
    match tied.len() {
        0 => None,
        1 => Some(tied[0]),
        n => Some(tied[rng.gen_range(0..n)]),
    }
}

/// Index of the long-term memory to evict: weakest, then oldest.
#[must_use]
pub fn weakest_long_term(memories: &[Memory]) -> Option<usize> {
    memories
        .iter()
        .enumerate()
        .min_by_key(|(_, m)| (strength(m), OrderedFloat(m.created_at.secs())))
        .map(|(i, _)| i)
}

/// What happened to a memory offered to the long-term store.
#[derive(Debug)]
pub enum Admission {
    /// Stored without displacing anything.
    Inserted,
    /// Stored after evicting the contained memory.
    Replaced(Memory),
    /// Not stored; it was no stronger than the weakest resident.
    Rejected(Memory),
}

/// Insert into the long-term store, evicting the weakest resident at capacity.
pub fn admit_long_term(long_term: &mut Vec<Memory>, capacity: usize, memory: Memory) -> Admission {
    if long_term.len() < capacity {
        long_term.push(memory);
        return Admission::Inserted;
    }
    match weakest_long_term(long_term) {
        Some(idx) if strength(&long_term[idx]) < strength(&memory) => {
            let evicted = long_term.swap_remove(idx);
            long_term.push(memory);
            Admission::Replaced(evicted)
        }
        _ => Admission::Rejected(memory),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
