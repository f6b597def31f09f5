//! Memory Consolidation: short-term groups becoming long-term knowledge.
//!
//! Short-term memories are grouped by `(about, stat)`. A group whose summed
//! influence reaches the promotion threshold (in magnitude) collapses into a
//! single immutable long-term memory, and its members leave short-term.
//!
//! A memory still waiting to be inserted can be counted toward its group, so
//! the insertion that completes a group promotes it immediately.

use ordered_float::OrderedFloat;

use crate::memory::record::Memory;
use crate::types::{MemoryId, SimTime, SourceId};

/// A long-term memory produced from a short-term group.
#[derive(Debug, Clone)]
pub struct Promotion {
    /// The consolidated long-term memory.
    pub memory: Memory,
    /// IDs of the short-term memories folded into it.
    pub sources: Vec<MemoryId>,
}

/// Result of one promotion pass.
#[derive(Debug, Default)]
pub struct PromotionPass {
    /// Groups that crossed the threshold, in first-seen order.
    pub promoted: Vec<Promotion>,
    /// Whether the pending candidate was folded into a promotion.
    pub candidate_consumed: bool,
}

struct Group<'a> {
    about: Option<&'a SourceId>,
    stat: &'a str,
    members: Vec<&'a Memory>,
}

/// Group short-term memories (plus an optional pending candidate) and promote
/// every group whose summed |influence| reaches `threshold`.
///
/// Promoted short-term entries are removed from `short_term`.
pub fn promote_short_term(
    short_term: &mut Vec<Memory>,
    candidate: Option<&Memory>,
    threshold: f32,
    now: SimTime,
) -> PromotionPass {
    let mut pass = PromotionPass::default();
    if threshold <= 0.0 {
        return pass;
    }

    let mut groups: Vec<Group<'_>> = Vec::new();
    for memory in short_term.iter().chain(candidate) {
        match groups
            .iter_mut()
            .find(|g| g.about == memory.about.as_ref() && g.stat == memory.stat)
        {
            Some(group) => group.members.push(memory),
            None => groups.push(Group {
                about: memory.about.as_ref(),
                stat: &memory.stat,
                members: vec![memory],
            }),
        }
    }

    let candidate_id = candidate.map(|c| c.id);
    let mut consumed: Vec<MemoryId> = Vec::new();
    for group in &groups {
        let total: f32 = group.members.iter().map(|m| m.influence).sum();
        if total.abs() < threshold {
            continue;
        }
        let sources: Vec<MemoryId> = group.members.iter().map(|m| m.id).collect();
        if candidate_id.is_some_and(|id| sources.contains(&id)) {
            pass.candidate_consumed = true;
        }
        consumed.extend(sources.iter().copied());
        pass.promoted.push(Promotion {
            memory: aggregate(&group.members, total, now),
            sources,
        });
    }

    if !consumed.is_empty() {
        short_term.retain(|m| !consumed.contains(&m.id));
    }
    pass
}

/// Collapse a group into one long-term memory.
///
/// The verdict is a magnitude-weighted vote; place and cooldown come from
/// the most recent member.
fn aggregate(members: &[&Memory], total: f32, now: SimTime) -> Memory {
    let vote: f32 = members
        .iter()
        .map(|m| if m.is_good { m.influence.abs() } else { -m.influence.abs() })
        .sum();
    let latest = members
        .iter()
        .max_by_key(|m| OrderedFloat(m.created_at.secs()))
        .copied();
    let (about, location, stat, cooldown) = match latest {
        Some(m) => (m.about.clone(), m.location, m.stat.clone(), m.cooldown),
        None => (None, Default::default(), String::new(), 0.0),
    };
    Memory::new(about, location, stat, total, vote >= 0.0, now, cooldown)
}
