//! Animation bookkeeping above the compute backends.
//!
//! The sequencer owns the generation log, decides when the animation is
//! complete, cycles rules in the header variant, and keeps the log centered
//! when the viewport changes size. Work is driven by a host tick; each tick
//! runs at most one generation or one rule change.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::compute::ComputeBackend;
use crate::config::Config;
use crate::error::{BackendError, CaError};
use crate::events::{EventHub, SequencerEvent};
use crate::generation::Row;
use crate::render::{FrameView, RenderStyle, Renderer};
use crate::rules::{pick_different, RuleSet, RuleTable};

/// Dwell before a completed pattern is replaced in cycling mode
pub const DEFAULT_RULE_CHANGE_DELAY: Duration = Duration::from_millis(1800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Producing generations
    Running,
    /// Last row reached. Terminal in single-shot mode; in cycling mode the
    /// rule changes after the dwell delay.
    Complete,
    /// Halted by the host or by a backend failure
    Stopped,
}

/// What a call to `advance`/`tick` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// A generation was appended
    Advanced { generation: usize },
    /// A generation was appended and it was the last one
    Completed { generation: usize },
    /// Dwell elapsed and a new rule was seeded
    RuleCycled { rule: u8 },
    /// A generation is already in flight; this tick was dropped
    Dropped,
    /// A finished generation was stale (stop, resize or restart happened
    /// while it was in flight) and was thrown away
    Discarded,
    /// Nothing to do in the current phase
    Idle,
}

/// Work handed to an asynchronous backend by [`AnimationSequencer::begin_advance`].
///
/// Carries its own copy of the current row, so the backend never sees the log.
#[derive(Debug, Clone)]
pub struct PendingGeneration {
    epoch: u64,
    generation: usize,
    row: Row,
    rule: RuleTable,
}

impl PendingGeneration {
    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn rule(&self) -> RuleTable {
        self.rule
    }

    /// Index the computed row will have in the log
    pub fn generation(&self) -> usize {
        self.generation
    }
}

pub struct AnimationSequencer {
    cols: usize,
    rows: usize,
    rule: RuleTable,
    phase: Phase,
    log: Vec<Row>,

    cycling: bool,
    rule_change_delay: Duration,
    candidates: RuleSet,
    completed_at: Option<Instant>,

    // Bumped by every operation that invalidates in-flight work
    epoch: u64,
    in_flight: Option<u64>,

    backend: Option<Box<dyn ComputeBackend>>,
    rng: StdRng,
    events: EventHub,
}

impl AnimationSequencer {
    /// Single-shot sequencer seeded with one live cell at `cols / 2`.
    pub fn new(cols: usize, rows: usize, rule: RuleTable) -> Result<Self, CaError> {
        if cols == 0 || rows == 0 {
            return Err(CaError::Dimension { cols, rows });
        }
        let mut seq = Self {
            cols,
            rows,
            rule,
            phase: Phase::Running,
            log: Vec::with_capacity(rows),
            cycling: false,
            rule_change_delay: DEFAULT_RULE_CHANGE_DELAY,
            candidates: RuleSet::All,
            completed_at: None,
            epoch: 0,
            in_flight: None,
            backend: None,
            rng: StdRng::from_os_rng(),
            events: EventHub::default(),
        };
        seq.reseed();
        Ok(seq)
    }

    /// Build from a validated host configuration
    pub fn from_config(config: &Config) -> Result<Self, CaError> {
        config.validate()?;
        let rule = RuleTable::from_number(config.initial_rule)?;
        let mut seq = Self::new(config.cols, config.rows, rule)?
            .with_candidates(RuleSet::from(config.cycle_rules.clone()));
        seq.cycling = config.cycling_enabled;
        seq.rule_change_delay = Duration::from_millis(config.rule_change_delay_ms);
        if let Some(seed) = config.seed {
            seq.rng = StdRng::seed_from_u64(seed);
        }
        Ok(seq)
    }

    /// Enable cycling mode with the given dwell delay
    pub fn with_cycling(mut self, rule_change_delay: Duration) -> Self {
        self.cycling = true;
        self.rule_change_delay = rule_change_delay;
        self
    }

    pub fn with_candidates(mut self, candidates: RuleSet) -> Self {
        self.candidates = candidates;
        self
    }

    /// Deterministic rule picks
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_backend(mut self, backend: Box<dyn ComputeBackend>) -> Self {
        self.attach_backend(backend);
        self
    }

    pub fn attach_backend(&mut self, backend: Box<dyn ComputeBackend>) {
        log::info!("Sequencer using {} backend", backend.name());
        self.backend = Some(backend);
    }

    pub fn detach_backend(&mut self) -> Option<Box<dyn ComputeBackend>> {
        self.backend.take()
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.name())
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SequencerEvent) + 'static) {
        self.events.subscribe(listener);
    }

    // --- Accessors ---

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn rule(&self) -> RuleTable {
        self.rule
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_cycling(&self) -> bool {
        self.cycling
    }

    pub fn rule_change_delay(&self) -> Duration {
        self.rule_change_delay
    }

    /// Index of the newest row in the log
    pub fn current_generation(&self) -> usize {
        self.log.len().saturating_sub(1)
    }

    /// Every generation so far, oldest first
    pub fn history(&self) -> &[Row] {
        &self.log
    }

    pub fn current_row(&self) -> &Row {
        // The log always holds at least the seed row
        &self.log[self.log.len() - 1]
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Borrowed view for a renderer
    pub fn frame(&self) -> FrameView<'_> {
        FrameView {
            history: &self.log,
            upto_generation: self.current_generation(),
            cols: self.cols,
            rows: self.rows,
        }
    }

    pub fn render(&self, renderer: &mut dyn Renderer, cell_size: f32, style: &RenderStyle) {
        renderer.render(&self.frame(), cell_size, style);
    }

    // --- Stepping ---

    /// Compute one generation with the attached backend.
    ///
    /// Either the row is appended or, on failure, nothing is appended and the
    /// sequencer stops and reports the error.
    pub fn advance(&mut self) -> Result<AdvanceOutcome, CaError> {
        if self.phase != Phase::Running {
            return Ok(AdvanceOutcome::Idle);
        }
        if self.backend.is_none() {
            log::debug!("advance() with no backend attached");
            return Ok(AdvanceOutcome::Idle);
        }
        let Some(pending) = self.begin_advance() else {
            return Ok(if self.in_flight.is_some() {
                AdvanceOutcome::Dropped
            } else {
                AdvanceOutcome::Idle
            });
        };

        let result = match self.backend.as_mut() {
            Some(backend) => backend.compute_next_generation(&pending.row, pending.rule),
            None => Err(BackendError::Failed("backend detached".into())),
        };
        self.finish_advance(pending, result)
    }

    /// Start a generation for an asynchronous backend.
    ///
    /// Returns `None` when not running or when a generation is already in
    /// flight; in the latter case the tick is dropped, not queued.
    pub fn begin_advance(&mut self) -> Option<PendingGeneration> {
        if self.phase != Phase::Running {
            return None;
        }
        if self.in_flight.is_some() {
            log::debug!("Tick dropped: generation {} still in flight", self.current_generation() + 1);
            return None;
        }
        if self.current_generation() + 1 >= self.rows {
            self.mark_complete();
            return None;
        }
        self.in_flight = Some(self.epoch);
        Some(PendingGeneration {
            epoch: self.epoch,
            generation: self.current_generation() + 1,
            row: self.current_row().clone(),
            rule: self.rule,
        })
    }

    /// Deliver the result for work started with [`begin_advance`](Self::begin_advance).
    pub fn finish_advance(
        &mut self,
        pending: PendingGeneration,
        result: Result<Row, BackendError>,
    ) -> Result<AdvanceOutcome, CaError> {
        if self.in_flight != Some(pending.epoch) || pending.epoch != self.epoch || self.phase != Phase::Running {
            log::debug!("Discarding stale generation {}", pending.generation);
            return Ok(AdvanceOutcome::Discarded);
        }
        self.in_flight = None;

        let row = match result {
            Ok(row) if row.len() == self.cols => row,
            Ok(row) => {
                return Err(self.fail(BackendError::ShapeMismatch {
                    expected: self.cols,
                    actual: row.len(),
                }))
            }
            Err(e) => return Err(self.fail(e)),
        };

        self.log.push(row);
        let generation = self.current_generation();
        log::debug!("Generation {} ({})", generation, self.rule);
        self.events.emit(SequencerEvent::Advanced { generation });

        if generation + 1 >= self.rows {
            self.mark_complete();
            Ok(AdvanceOutcome::Completed { generation })
        } else {
            Ok(AdvanceOutcome::Advanced { generation })
        }
    }

    /// Fail the generation currently in flight, e.g. when an asynchronous
    /// backend disconnected before answering.
    pub fn abort_in_flight(&mut self, error: BackendError) -> Option<CaError> {
        if self.in_flight.take().is_some() && self.phase == Phase::Running {
            Some(self.fail(error))
        } else {
            None
        }
    }

    /// One host tick: advance while running, or cycle the rule once the
    /// dwell delay after completion has passed.
    pub fn tick(&mut self, now: Instant) -> Result<AdvanceOutcome, CaError> {
        match self.phase {
            Phase::Running => {
                let outcome = self.advance()?;
                if let AdvanceOutcome::Completed { .. } = outcome {
                    self.completed_at = Some(now);
                }
                Ok(outcome)
            }
            Phase::Complete => Ok(self.maybe_cycle(now)),
            Phase::Stopped => Ok(AdvanceOutcome::Idle),
        }
    }

    /// The completion half of [`tick`](Self::tick), for hosts that drive an
    /// asynchronous backend with `begin_advance`/`finish_advance`.
    pub fn maybe_cycle(&mut self, now: Instant) -> AdvanceOutcome {
        if self.phase != Phase::Complete || !self.cycling {
            return AdvanceOutcome::Idle;
        }
        let since = *self.completed_at.get_or_insert(now);
        if now.saturating_duration_since(since) < self.rule_change_delay {
            return AdvanceOutcome::Idle;
        }
        match self.cycle_rule() {
            Some(rule) => AdvanceOutcome::RuleCycled { rule },
            None => AdvanceOutcome::Idle,
        }
    }

    /// Replace a completed pattern with a different rule (cycling mode only).
    /// Returns the new rule number, or `None` if not applicable.
    pub fn cycle_rule(&mut self) -> Option<u8> {
        if self.phase != Phase::Complete || !self.cycling {
            return None;
        }
        let previous = self.rule.number();
        let next = pick_different(previous, &self.candidates, &mut self.rng);
        self.rule = RuleTable::new(next);
        self.reseed();
        log::info!("Cycling rule {} -> {}", previous, next);
        self.events.emit(SequencerEvent::RuleChanged { previous, current: next });
        Some(next)
    }

    // --- Host control ---

    /// Halt ticking. Safe while a generation is in flight; its result will be
    /// discarded.
    pub fn stop(&mut self) {
        if self.phase == Phase::Stopped {
            return;
        }
        self.phase = Phase::Stopped;
        self.in_flight = None;
        self.epoch += 1;
        log::info!("Sequencer stopped at generation {}", self.current_generation());
        self.events.emit(SequencerEvent::Stopped);
    }

    /// Reseed with the current rule and resume
    pub fn restart(&mut self) {
        self.reseed();
        log::info!("Sequencer restarted with {}", self.rule);
    }

    /// Switch to `rule`, reseeding the log
    pub fn set_rule(&mut self, rule: RuleTable) {
        let previous = self.rule.number();
        self.rule = rule;
        self.reseed();
        if previous != rule.number() {
            log::info!("Rule set {} -> {}", previous, rule.number());
            self.events.emit(SequencerEvent::RuleChanged {
                previous,
                current: rule.number(),
            });
        }
    }

    pub fn set_cycling(&mut self, enabled: bool) {
        self.cycling = enabled;
    }

    pub fn set_rule_change_delay(&mut self, delay: Duration) {
        self.rule_change_delay = delay;
    }

    /// Adapt to new dimensions, keeping the pattern centered.
    ///
    /// Every logged row is shifted by `new_cols / 2 - cols / 2`; cells pushed
    /// off an edge are dropped and new cells are 0. If fewer rows fit, the
    /// newest generations are dropped. Zero dimensions are ignored.
    pub fn resize(&mut self, cols: usize, rows: usize) -> bool {
        if cols == 0 || rows == 0 {
            log::warn!("Ignoring resize to {}x{}", cols, rows);
            return false;
        }
        if cols == self.cols && rows == self.rows {
            return false;
        }

        if cols != self.cols {
            for row in &mut self.log {
                *row = row.recentered(cols);
            }
        }
        if self.log.len() > rows {
            self.log.truncate(rows);
        }
        log::info!("Resized {}x{} -> {}x{}", self.cols, self.rows, cols, rows);
        self.cols = cols;
        self.rows = rows;

        // Work computed for the old width is useless now
        self.in_flight = None;
        self.epoch += 1;

        if self.phase != Phase::Stopped {
            if self.current_generation() + 1 >= self.rows {
                if self.phase == Phase::Running {
                    self.mark_complete();
                }
            } else {
                self.phase = Phase::Running;
                self.completed_at = None;
            }
        }
        self.events.emit(SequencerEvent::Resized { cols, rows });
        true
    }

    // --- Internals ---

    fn reseed(&mut self) {
        self.log.clear();
        self.log.push(Row::seed_centered(self.cols));
        self.completed_at = None;
        self.in_flight = None;
        self.epoch += 1;
        self.phase = if self.rows <= 1 { Phase::Complete } else { Phase::Running };
    }

    fn mark_complete(&mut self) {
        self.phase = Phase::Complete;
        self.completed_at = None;
        log::debug!("{} complete after {} generations", self.rule, self.log.len());
        self.events.emit(SequencerEvent::Completed {
            rule: self.rule.number(),
            generations: self.log.len(),
        });
    }

    fn fail(&mut self, error: BackendError) -> CaError {
        log::error!("Compute backend failed at generation {}: {}", self.current_generation() + 1, error);
        self.phase = Phase::Stopped;
        self.in_flight = None;
        self.epoch += 1;
        self.events.emit(SequencerEvent::Error(error.clone()));
        self.events.emit(SequencerEvent::Stopped);
        CaError::Backend(error)
    }
}

impl std::fmt::Debug for AnimationSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationSequencer")
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("rule", &self.rule.number())
            .field("phase", &self.phase)
            .field("generation", &self.current_generation())
            .field("cycling", &self.cycling)
            .field("backend", &self.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::CpuBackend;
    use crate::generation::next_row;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// CPU backend that fails on its `fail_on`-th call (1-based)
    struct FailOn {
        calls: usize,
        fail_on: usize,
    }

    impl ComputeBackend for FailOn {
        fn name(&self) -> &str {
            "fail-on"
        }

        fn compute_next_generation(&mut self, current: &Row, rule: RuleTable) -> Result<Row, BackendError> {
            self.calls += 1;
            if self.calls == self.fail_on {
                Err(BackendError::Validation("context lost".into()))
            } else {
                Ok(next_row(current, &rule))
            }
        }
    }

    fn cpu_sequencer(cols: usize, rows: usize, rule: u8) -> AnimationSequencer {
        AnimationSequencer::new(cols, rows, RuleTable::new(rule))
            .expect("valid dimensions")
            .with_backend(Box::new(CpuBackend))
    }

    fn recorded(seq: &mut AnimationSequencer) -> Rc<RefCell<Vec<SequencerEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        seq.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    #[test]
    fn starts_with_centered_seed() {
        let seq = cpu_sequencer(9, 4, 30);
        assert_eq!(seq.phase(), Phase::Running);
        assert_eq!(seq.current_generation(), 0);
        assert_eq!(seq.history(), &[Row::seed_centered(9)]);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert_eq!(
            AnimationSequencer::new(0, 5, RuleTable::new(30)).err(),
            Some(CaError::Dimension { cols: 0, rows: 5 })
        );
        assert!(AnimationSequencer::new(5, 0, RuleTable::new(30)).is_err());
    }

    #[test]
    fn log_follows_the_rule() {
        let mut seq = cpu_sequencer(21, 50, 110);
        for n in 1..=12 {
            assert_eq!(seq.advance(), Ok(AdvanceOutcome::Advanced { generation: n }));
            assert_eq!(seq.history().len(), n + 1);
        }
        let rule = seq.rule();
        for pair in seq.history().windows(2) {
            assert_eq!(pair[1], next_row(&pair[0], &rule));
        }
    }

    #[test]
    fn completes_at_last_row() {
        let mut seq = cpu_sequencer(7, 4, 90);
        let events = recorded(&mut seq);
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Advanced { generation: 1 }));
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Advanced { generation: 2 }));
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Completed { generation: 3 }));
        assert_eq!(seq.phase(), Phase::Complete);
        assert_eq!(seq.current_generation(), 3);

        // Single-shot: completion is terminal
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Idle));
        assert_eq!(seq.cycle_rule(), None);
        assert_eq!(seq.history().len(), 4);
        assert!(events
            .borrow()
            .contains(&SequencerEvent::Completed { rule: 90, generations: 4 }));
    }

    #[test]
    fn single_row_sequencer_is_complete_immediately() {
        let mut seq = cpu_sequencer(5, 1, 30);
        assert_eq!(seq.phase(), Phase::Complete);
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Idle));
    }

    #[test_log::test]
    fn cycling_waits_for_dwell_then_changes_rule() {
        let mut seq = cpu_sequencer(9, 3, 30)
            .with_cycling(Duration::from_millis(1800))
            .with_rng_seed(42);
        let events = recorded(&mut seq);
        let t0 = Instant::now();

        assert_eq!(seq.tick(t0), Ok(AdvanceOutcome::Advanced { generation: 1 }));
        assert_eq!(seq.tick(t0), Ok(AdvanceOutcome::Completed { generation: 2 }));
        assert_eq!(seq.tick(t0 + Duration::from_millis(1000)), Ok(AdvanceOutcome::Idle));
        assert_eq!(seq.rule().number(), 30);

        let outcome = seq.tick(t0 + Duration::from_millis(1800));
        let Ok(AdvanceOutcome::RuleCycled { rule }) = outcome.clone() else {
            panic!("expected a rule change, got {outcome:?}");
        };
        assert_ne!(rule, 30);
        assert_eq!(seq.rule().number(), rule);
        assert_eq!(seq.phase(), Phase::Running);
        assert_eq!(seq.history(), &[Row::seed_centered(9)]);
        assert!(events
            .borrow()
            .contains(&SequencerEvent::RuleChanged { previous: 30, current: rule }));
    }

    #[test]
    fn cycling_restricted_to_named_rules() {
        let mut seq = cpu_sequencer(5, 2, 110)
            .with_cycling(Duration::ZERO)
            .with_candidates(RuleSet::named())
            .with_rng_seed(3);
        let t0 = Instant::now();
        for _ in 0..20 {
            let before = seq.rule().number();
            assert_eq!(seq.tick(t0), Ok(AdvanceOutcome::Completed { generation: 1 }));
            let Ok(AdvanceOutcome::RuleCycled { rule }) = seq.tick(t0) else {
                panic!("expected a rule change");
            };
            assert_ne!(rule, before);
            assert!(RuleSet::named().contains(rule));
        }
    }

    #[test_log::test]
    fn backend_failure_stops_without_partial_append() {
        let mut seq = AnimationSequencer::new(11, 20, RuleTable::new(30))
            .expect("valid dimensions")
            .with_backend(Box::new(FailOn { calls: 0, fail_on: 3 }));
        let events = recorded(&mut seq);

        assert!(seq.advance().is_ok());
        assert!(seq.advance().is_ok());
        let err = seq.advance();
        assert_eq!(
            err,
            Err(CaError::Backend(BackendError::Validation("context lost".into())))
        );
        assert_eq!(seq.phase(), Phase::Stopped);
        assert_eq!(seq.history().len(), 3);

        // No further work until restarted
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Idle));
        assert_eq!(seq.tick(Instant::now()), Ok(AdvanceOutcome::Idle));
        assert_eq!(seq.history().len(), 3);

        let events = events.borrow();
        assert!(events.contains(&SequencerEvent::Error(BackendError::Validation("context lost".into()))));
        assert_eq!(events.last(), Some(&SequencerEvent::Stopped));
    }

    #[test]
    fn restart_after_failure_reseeds() {
        let mut seq = AnimationSequencer::new(11, 20, RuleTable::new(30))
            .expect("valid dimensions")
            .with_backend(Box::new(FailOn { calls: 0, fail_on: 1 }));
        assert!(seq.advance().is_err());
        seq.restart();
        assert_eq!(seq.phase(), Phase::Running);
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Advanced { generation: 1 }));
    }

    #[test]
    fn wrong_length_rows_are_rejected() {
        let mut seq = cpu_sequencer(8, 10, 30);
        let pending = seq.begin_advance().expect("pending");
        let result = seq.finish_advance(pending, Ok(Row::zeros(7)));
        assert_eq!(
            result,
            Err(CaError::Backend(BackendError::ShapeMismatch { expected: 8, actual: 7 }))
        );
        assert_eq!(seq.history().len(), 1);
        assert_eq!(seq.phase(), Phase::Stopped);
    }

    #[test]
    fn ticks_during_flight_are_dropped() {
        let mut seq = cpu_sequencer(9, 10, 30);
        let pending = seq.begin_advance().expect("first tick starts work");
        assert!(seq.is_in_flight());
        assert!(seq.begin_advance().is_none());
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Dropped));

        let row = next_row(pending.row(), &pending.rule());
        assert_eq!(seq.finish_advance(pending, Ok(row)), Ok(AdvanceOutcome::Advanced { generation: 1 }));
        assert!(!seq.is_in_flight());
        assert_eq!(seq.history().len(), 2);
    }

    #[test]
    fn stop_during_flight_discards_result() {
        let mut seq = cpu_sequencer(9, 10, 30);
        let pending = seq.begin_advance().expect("pending");
        seq.stop();
        seq.stop();
        assert_eq!(seq.phase(), Phase::Stopped);

        let row = next_row(pending.row(), &pending.rule());
        assert_eq!(seq.finish_advance(pending.clone(), Ok(row.clone())), Ok(AdvanceOutcome::Discarded));
        assert_eq!(seq.history().len(), 1);

        // Restarting does not resurrect the old result
        seq.restart();
        assert_eq!(seq.finish_advance(pending, Ok(row)), Ok(AdvanceOutcome::Discarded));
        assert_eq!(seq.history().len(), 1);
    }

    #[test]
    fn abort_in_flight_reports_failure() {
        let mut seq = cpu_sequencer(9, 10, 30);
        let _pending = seq.begin_advance().expect("pending");
        let err = seq.abort_in_flight(BackendError::WorkerDisconnected);
        assert_eq!(err, Some(CaError::Backend(BackendError::WorkerDisconnected)));
        assert_eq!(seq.phase(), Phase::Stopped);
        assert_eq!(seq.abort_in_flight(BackendError::WorkerDisconnected), None);
    }

    #[test]
    fn resize_recenters_history() {
        let mut seq = cpu_sequencer(10, 10, 90);
        seq.advance().expect("step");
        seq.advance().expect("step");
        let before: Vec<Vec<usize>> = seq
            .history()
            .iter()
            .map(|r| r.cells().iter().enumerate().filter(|(_, &c)| c == 1).map(|(i, _)| i).collect())
            .collect();

        assert!(seq.resize(14, 10));
        assert_eq!(seq.cols(), 14);
        for (row, ones) in seq.history().iter().zip(&before) {
            assert_eq!(row.len(), 14);
            let shifted: Vec<usize> = ones.iter().map(|i| i + 2).collect();
            let actual: Vec<usize> = row.cells().iter().enumerate().filter(|(_, &c)| c == 1).map(|(i, _)| i).collect();
            assert_eq!(actual, shifted);
        }
        assert_eq!(seq.phase(), Phase::Running);
    }

    #[test]
    fn resize_ignores_zero_dimensions() {
        let mut seq = cpu_sequencer(10, 10, 90);
        assert!(!seq.resize(0, 10));
        assert!(!seq.resize(10, 0));
        assert_eq!((seq.cols(), seq.rows()), (10, 10));
    }

    #[test]
    fn resize_discards_in_flight_work() {
        let mut seq = cpu_sequencer(10, 10, 30);
        let pending = seq.begin_advance().expect("pending");
        seq.resize(12, 10);
        let row = next_row(pending.row(), &pending.rule());
        assert_eq!(seq.finish_advance(pending, Ok(row)), Ok(AdvanceOutcome::Discarded));
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Advanced { generation: 1 }));
        assert_eq!(seq.current_row().len(), 12);
    }

    #[test]
    fn shrinking_rows_can_complete() {
        let mut seq = cpu_sequencer(10, 10, 30);
        for _ in 0..5 {
            seq.advance().expect("step");
        }
        seq.resize(10, 4);
        assert_eq!(seq.history().len(), 4);
        assert_eq!(seq.phase(), Phase::Complete);

        // Growing again resumes filling
        seq.resize(10, 8);
        assert_eq!(seq.phase(), Phase::Running);
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Advanced { generation: 4 }));
    }

    #[test]
    fn set_rule_reseeds_and_notifies() {
        let mut seq = cpu_sequencer(9, 10, 30);
        let events = recorded(&mut seq);
        seq.advance().expect("step");
        seq.set_rule(RuleTable::new(150));
        assert_eq!(seq.rule().number(), 150);
        assert_eq!(seq.history().len(), 1);
        assert_eq!(
            events.borrow().last(),
            Some(&SequencerEvent::RuleChanged { previous: 30, current: 150 })
        );
    }

    #[test]
    fn no_backend_means_no_progress() {
        let mut seq = AnimationSequencer::new(9, 10, RuleTable::new(30)).expect("valid dimensions");
        assert_eq!(seq.advance(), Ok(AdvanceOutcome::Idle));
        assert!(!seq.is_in_flight());
        assert!(seq.detach_backend().is_none());
    }
}
