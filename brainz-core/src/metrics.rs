//! Runtime Metrics & Instrumentation
//!
//! Provides a per-phase tick profiler and Prometheus-compatible counters
//! for the arbitration engine.
//!
//! Every world tick and per-agent arbitration runs inside a `tracing` span
//! named from [`spans`]. This module adds lightweight counters and a timing
//! history, split into stats, behavior and arbitration time, that can be
//! queried at runtime or exported for dashboards.
//!
//! Design: Lock-free counters using `AtomicU64`.
//! The timing history uses `parking_lot::Mutex` for rare reads.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Counters (lock-free)
// ---------------------------------------------------------------------------

/// Atomic counters for high-frequency events, one set per world.
#[derive(Debug)]
pub struct BrainzCounters {
    /// Arbitration passes that ran (not gated out by the agent's schedule).
    pub decisions: AtomicU64,
    /// Behaviors that reached `Executing`.
    pub behaviors_started: AtomicU64,
    /// Behaviors that ran to their end time.
    pub behaviors_finished: AtomicU64,
    /// Behaviors finished early (preempted, timed out, or group collapse).
    pub behaviors_interrupted: AtomicU64,
    /// `reserve_for` calls refused for lack of space.
    pub reservations_refused: AtomicU64,
    /// Influencers accepted by agents.
    pub influencers_added: AtomicU64,
    /// Influencers rejected by memory gating.
    pub influencers_rejected: AtomicU64,
    /// Memories folded into an existing short-term entry.
    pub memories_merged: AtomicU64,
    /// Short-term groups promoted to long-term.
    pub memories_promoted: AtomicU64,
    /// Memories evicted from either store.
    pub memories_evicted: AtomicU64,
}

impl BrainzCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            decisions: AtomicU64::new(0),
            behaviors_started: AtomicU64::new(0),
            behaviors_finished: AtomicU64::new(0),
            behaviors_interrupted: AtomicU64::new(0),
            reservations_refused: AtomicU64::new(0),
            influencers_added: AtomicU64::new(0),
            influencers_rejected: AtomicU64::new(0),
            memories_merged: AtomicU64::new(0),
            memories_promoted: AtomicU64::new(0),
            memories_evicted: AtomicU64::new(0),
        }
    }

    /// Add `n` to a counter.
    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(u64::try_from(n).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Increment a counter by one.
    pub fn bump(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            decisions: self.decisions.load(Ordering::Relaxed),
            behaviors_started: self.behaviors_started.load(Ordering::Relaxed),
            behaviors_finished: self.behaviors_finished.load(Ordering::Relaxed),
            behaviors_interrupted: self.behaviors_interrupted.load(Ordering::Relaxed),
            reservations_refused: self.reservations_refused.load(Ordering::Relaxed),
            influencers_added: self.influencers_added.load(Ordering::Relaxed),
            influencers_rejected: self.influencers_rejected.load(Ordering::Relaxed),
            memories_merged: self.memories_merged.load(Ordering::Relaxed),
            memories_promoted: self.memories_promoted.load(Ordering::Relaxed),
            memories_evicted: self.memories_evicted.load(Ordering::Relaxed),
        }
    }
}

impl Default for BrainzCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CounterSnapshot {
    /// Arbitration passes.
    pub decisions: u64,
    /// Behaviors started.
    pub behaviors_started: u64,
    /// Behaviors finished on time.
    pub behaviors_finished: u64,
    /// Behaviors finished early.
    pub behaviors_interrupted: u64,
    /// Refused reservations.
    pub reservations_refused: u64,
    /// Accepted influencers.
    pub influencers_added: u64,
    /// Rejected influencers.
    pub influencers_rejected: u64,
    /// Merged memories.
    pub memories_merged: u64,
    /// Promoted groups.
    pub memories_promoted: u64,
    /// Evicted memories.
    pub memories_evicted: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows: [(&str, &str, u64); 10] = [
            ("brainz_decisions_total", "Arbitration passes run", self.decisions),
            ("brainz_behaviors_started_total", "Behaviors started", self.behaviors_started),
            ("brainz_behaviors_finished_total", "Behaviors finished on time", self.behaviors_finished),
            ("brainz_behaviors_interrupted_total", "Behaviors finished early", self.behaviors_interrupted),
            ("brainz_reservations_refused_total", "Reservations refused", self.reservations_refused),
            ("brainz_influencers_added_total", "Influencers accepted", self.influencers_added),
            ("brainz_influencers_rejected_total", "Influencers rejected by memory", self.influencers_rejected),
            ("brainz_memories_merged_total", "Short-term memories merged", self.memories_merged),
            ("brainz_memories_promoted_total", "Short-term groups promoted", self.memories_promoted),
            ("brainz_memories_evicted_total", "Memories evicted", self.memories_evicted),
        ];
        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tick Profiler
// ---------------------------------------------------------------------------

/// The three kinds of per-agent work inside a world tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Stat drift and influencer application.
    Stats = 0,
    /// Advancing running behaviors (arrival, handshakes, end times).
    Behaviors = 1,
    /// Scoring behaviors and switching to the winner.
    Arbitration = 2,
}

/// What one world tick cost and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct TickSample {
    /// Agents ticked.
    pub agents: usize,
    /// Arbitration passes that reached a decision.
    pub decisions: usize,
    /// Wall-clock time for the whole tick (milliseconds).
    pub total_ms: f64,
    /// Time per [`Phase`], summed over agents (milliseconds).
    pub phase_ms: [f64; 3],
}

impl TickSample {
    /// Mean cost of one agent in this tick (microseconds).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn us_per_agent(&self) -> f64 {
        if self.agents == 0 {
            return 0.0;
        }
        self.total_ms * 1000.0 / self.agents as f64
    }
}

/// Accumulates one tick's phases. Owned by the ticking code, so timing a
/// phase never takes the profiler's lock.
#[derive(Debug)]
pub struct TickRecorder {
    start: Instant,
    sample: TickSample,
}

impl TickRecorder {
    /// Run `f`, charging its duration to `phase`.
    pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = f();
        self.sample.phase_ms[phase as usize] += started.elapsed().as_secs_f64() * 1000.0;
        out
    }

    /// Count an arbitration pass that reached a decision.
    pub fn count_decision(&mut self) {
        self.sample.decisions += 1;
    }
}

const HISTORY_LEN: usize = 256;

/// Rolling record of world ticks, split by phase and normalised per agent.
#[derive(Debug)]
pub struct TickProfiler {
    budget_ms: f64,
    history: Mutex<VecDeque<TickSample>>,
    ticks: AtomicU64,
}

impl TickProfiler {
    /// Create a profiler with a per-tick budget in milliseconds.
    #[must_use]
    pub fn new(budget_ms: f64) -> Self {
        Self {
            budget_ms,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LEN)),
            ticks: AtomicU64::new(0),
        }
    }

    /// Start a tick over `agents` agents.
    #[must_use]
    pub fn begin_tick(&self, agents: usize) -> TickRecorder {
        TickRecorder {
            start: Instant::now(),
            sample: TickSample {
                agents,
                ..TickSample::default()
            },
        }
    }

    /// Close a tick started with [`TickProfiler::begin_tick`].
    pub fn finish(&self, recorder: TickRecorder) {
        let mut sample = recorder.sample;
        sample.total_ms = recorder.start.elapsed().as_secs_f64() * 1000.0;
        self.record(sample);
    }

    /// Store a finished sample; the oldest is dropped once the history is full.
    pub fn record(&self, sample: TickSample) {
        let mut history = self.history.lock();
        if history.len() == HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(sample);
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// The most recent tick.
    #[must_use]
    pub fn last(&self) -> Option<TickSample> {
        self.history.lock().back().copied()
    }

    /// Whether the most recent tick exceeded the budget.
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.last().is_some_and(|s| s.total_ms > self.budget_ms)
    }

    /// Ticks recorded since creation.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// The configured budget in milliseconds.
    #[must_use]
    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }

    /// Aggregate the retained history.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn summary(&self) -> TickSummary {
        let history = self.history.lock();
        let n = history.len();
        if n == 0 {
            return TickSummary {
                budget_ms: self.budget_ms,
                ..TickSummary::default()
            };
        }

        let mut totals: Vec<f64> = history.iter().map(|s| s.total_ms).collect();
        totals.sort_by(f64::total_cmp);
        let total_ms: f64 = totals.iter().sum();
        let agent_ticks: usize = history.iter().map(|s| s.agents).sum();
        let decisions: usize = history.iter().map(|s| s.decisions).sum();
        let mut phase_ms = [0.0; 3];
        for sample in history.iter() {
            for (acc, ms) in phase_ms.iter_mut().zip(sample.phase_ms) {
                *acc += ms;
            }
        }
        let phase_total: f64 = phase_ms.iter().sum();
        let share = |ms: f64| if phase_total > 0.0 { ms / phase_total } else { 0.0 };

        TickSummary {
            ticks: n,
            budget_ms: self.budget_ms,
            mean_ms: total_ms / n as f64,
            p95_ms: totals[((n as f64 * 0.95) as usize).min(n - 1)],
            max_ms: totals[n - 1],
            over_budget_ratio: totals.iter().filter(|&&t| t > self.budget_ms).count() as f64 / n as f64,
            us_per_agent: if agent_ticks > 0 {
                total_ms * 1000.0 / agent_ticks as f64
            } else {
                0.0
            },
            decisions_per_tick: decisions as f64 / n as f64,
            stats_share: share(phase_ms[Phase::Stats as usize]),
            behaviors_share: share(phase_ms[Phase::Behaviors as usize]),
            arbitration_share: share(phase_ms[Phase::Arbitration as usize]),
        }
    }
}

/// Where tick time went over the retained history.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct TickSummary {
    /// Ticks in the history window.
    pub ticks: usize,
    /// Per-tick budget (milliseconds).
    pub budget_ms: f64,
    /// Mean tick time (milliseconds).
    pub mean_ms: f64,
    /// 95th percentile tick time (milliseconds).
    pub p95_ms: f64,
    /// Slowest tick (milliseconds).
    pub max_ms: f64,
    /// Fraction of ticks over budget.
    pub over_budget_ratio: f64,
    /// Mean cost of one agent for one tick (microseconds).
    pub us_per_agent: f64,
    /// Mean arbitration passes reaching a decision per tick.
    pub decisions_per_tick: f64,
    /// Share of phase time spent on stats and influencers.
    pub stats_share: f64,
    /// Share of phase time spent advancing running behaviors.
    pub behaviors_share: f64,
    /// Share of phase time spent arbitrating.
    pub arbitration_share: f64,
}

// ---------------------------------------------------------------------------
// Tracing Span Names
// ---------------------------------------------------------------------------

/// Span names used with `tracing::debug_span!`.
pub mod spans {
    /// One world tick.
    pub const WORLD_TICK: &str = "brainz::tick";
    /// Stat and influencer update for one agent.
    pub const STATS_TICK: &str = "brainz::stats";
    /// One agent's arbitration pass.
    pub const ARBITRATE: &str = "brainz::arbitrate";
    /// Behavior lifecycle updates (arrival, end time, handshakes).
    pub const BEHAVIOR_UPDATE: &str = "brainz::behavior::update";
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_default_zero() {
        let snap = BrainzCounters::new().snapshot();
        assert_eq!(snap, CounterSnapshot::default());
    }

    #[test]
    fn counters_increment_and_snapshot() {
        let c = BrainzCounters::new();
        BrainzCounters::bump(&c.decisions);
        BrainzCounters::add(&c.influencers_added, 4);
        BrainzCounters::bump(&c.reservations_refused);

        let snap = c.snapshot();
        assert_eq!(snap.decisions, 1);
        assert_eq!(snap.influencers_added, 4);
        assert_eq!(snap.reservations_refused, 1);
        assert_eq!(snap.memories_promoted, 0);
    }

    #[test]
    fn prometheus_format_valid() {
        let c = BrainzCounters::new();
        BrainzCounters::add(&c.behaviors_started, 42);
        let prom = c.snapshot().to_prometheus();
        assert!(prom.contains("brainz_behaviors_started_total 42"));
        assert!(prom.contains("# TYPE brainz_decisions_total counter"));
        assert!(prom.contains("# HELP"));
    }

    fn sample(agents: usize, decisions: usize, total_ms: f64, phase_ms: [f64; 3]) -> TickSample {
        TickSample {
            agents,
            decisions,
            total_ms,
            phase_ms,
        }
    }

    #[test]
    fn empty_profiler_summarises_to_zero() {
        let profiler = TickProfiler::new(2.0);
        let summary = profiler.summary();
        assert_eq!(summary.ticks, 0);
        assert!((summary.budget_ms - 2.0).abs() < f64::EPSILON);
        assert!(profiler.last().is_none());
        assert!(!profiler.is_over_budget());
    }

    #[test]
    fn phase_shares_split_agent_work() {
        let profiler = TickProfiler::new(2.0);
        profiler.record(sample(10, 2, 1.0, [0.2, 0.2, 0.6]));
        profiler.record(sample(10, 4, 1.0, [0.2, 0.2, 0.6]));

        let summary = profiler.summary();
        assert!((summary.stats_share - 0.2).abs() < 1e-9);
        assert!((summary.behaviors_share - 0.2).abs() < 1e-9);
        assert!((summary.arbitration_share - 0.6).abs() < 1e-9);
        assert!((summary.decisions_per_tick - 3.0).abs() < 1e-9);
        // 2ms over 20 agent-ticks
        assert!((summary.us_per_agent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn per_agent_cost_weights_by_population() {
        let profiler = TickProfiler::new(5.0);
        profiler.record(sample(1, 0, 1.0, [0.0; 3]));
        profiler.record(sample(99, 0, 3.0, [0.0; 3]));
        let summary = profiler.summary();
        assert!((summary.us_per_agent - 40.0).abs() < 1e-9);
        assert!((summary.mean_ms - 2.0).abs() < 1e-9);
        assert!(summary.stats_share.abs() < f64::EPSILON);
        assert!((sample(4, 0, 2.0, [0.0; 3]).us_per_agent() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn over_budget_tracks_last_tick_and_ratio() {
        let profiler = TickProfiler::new(2.0);
        profiler.record(sample(1, 0, 3.0, [0.0; 3]));
        assert!(profiler.is_over_budget());
        profiler.record(sample(1, 0, 1.0, [0.0; 3]));
        assert!(!profiler.is_over_budget());
        assert!((profiler.summary().over_budget_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn history_keeps_most_recent_ticks() {
        let profiler = TickProfiler::new(2.0);
        for i in 0..300 {
            profiler.record(sample(1, 0, f64::from(i), [0.0; 3]));
        }
        let summary = profiler.summary();
        assert_eq!(profiler.tick_count(), 300);
        assert_eq!(summary.ticks, HISTORY_LEN);
        assert!((summary.max_ms - 299.0).abs() < f64::EPSILON);
        assert!(summary.p95_ms <= summary.max_ms);
        assert!((profiler.last().map_or(0.0, |s| s.total_ms) - 299.0).abs() < f64::EPSILON);
    }

    #[test]
    fn recorder_charges_phases_and_decisions() {
        let profiler = TickProfiler::new(100.0);
        let mut recorder = profiler.begin_tick(3);
        let value = recorder.time(Phase::Arbitration, || 7);
        recorder.count_decision();
        profiler.finish(recorder);

        assert_eq!(value, 7);
        let last = profiler.last().expect("recorded");
        assert_eq!(last.agents, 3);
        assert_eq!(last.decisions, 1);
        assert!(last.phase_ms[Phase::Arbitration as usize] >= 0.0);
        assert!(last.total_ms >= last.phase_ms.iter().sum::<f64>());
    }
}
