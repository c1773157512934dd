//! Timed, cooperative step scheduler.
//!
//! A [`StepScheduler`] owns an ordered list of steps and runs exactly one per
//! timer tick against a caller-owned context. Steps report their outcome as
//! a [`StepResult`]; panics are caught and reported as
//! [`StepError::Unexpected`]. Errors go to a [`StepErrorHandler`], after which
//! the cursor is guaranteed to have moved.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Outcome of a single step.
pub type StepResult = std::result::Result<(), StepError>;

/// Failure category reported by a step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// The behaviour under test was wrong.
    #[error("step failed: {0}")]
    Failure(String),
    /// The harness could not set up or drive the step.
    #[error("internal harness failure: {0}")]
    Internal(String),
    /// The step panicked.
    #[error("unexpected failure inside step: {0}")]
    Unexpected(String),
}

impl StepError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }
}

/// Lifecycle of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Executing,
    Stopped,
}

/// What a single [`StepScheduler::tick`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The scheduler was not running.
    Inactive,
    /// Step at cursor `index` completed.
    Executed { index: usize },
    /// Step at cursor `index` failed and the handler recovered.
    Recovered { index: usize, error: StepError },
    /// A non-looping scheduler ran out of steps (or has none).
    Finished,
}

/// Position of the scheduler within its step list.
///
/// The index grows without bound in looping mode; the step executed is
/// `index % step_count`, and `index / step_count` is the current cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCursor {
    index: usize,
    step_count: usize,
}

impl StepCursor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Completed passes over the step list.
    pub fn cycle(&self) -> usize {
        self.index.checked_div(self.step_count).unwrap_or(0)
    }

    /// Index of the step within the current cycle.
    pub fn position(&self) -> usize {
        self.index.checked_rem(self.step_count).unwrap_or(0)
    }

    pub fn advance(&mut self, steps: usize) {
        self.index += steps;
    }

    pub fn set(&mut self, index: usize) {
        self.index = index;
    }

    /// Moves to step 0 of the next cycle, abandoning the rest of this one.
    pub fn skip_to_next_cycle(&mut self) {
        if self.step_count > 0 {
            self.index += self.step_count - self.position();
        }
    }
}

/// Handle a step uses to talk back to its scheduler.
#[derive(Debug, Default)]
pub struct StepControl {
    stop_requested: bool,
}

impl StepControl {
    /// Stops the scheduler once the current step returns.
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}

/// Recovery policy for failed steps.
pub trait StepErrorHandler<C> {
    /// Called with the failing step's error. Returning `Err` stops the
    /// scheduler and surfaces the error from `tick`. The handler may move
    /// the cursor; if it does not, the scheduler advances it by one.
    fn handle(
        &mut self,
        ctx: &mut C,
        cursor: &mut StepCursor,
        error: StepError,
    ) -> std::result::Result<(), StepError>;
}

/// Default handler: re-raise every error.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailFast;

impl<C> StepErrorHandler<C> for FailFast {
    fn handle(
        &mut self,
        _ctx: &mut C,
        _cursor: &mut StepCursor,
        error: StepError,
    ) -> std::result::Result<(), StepError> {
        Err(error)
    }
}

/// Logs the error and jumps to the first step of the next cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipToNextCycle;

impl<C> StepErrorHandler<C> for SkipToNextCycle {
    fn handle(
        &mut self,
        _ctx: &mut C,
        cursor: &mut StepCursor,
        error: StepError,
    ) -> std::result::Result<(), StepError> {
        tracing::warn!(index = cursor.index(), %error, "abandoning cycle after step error");
        cursor.skip_to_next_cycle();
        Ok(())
    }
}

type Step<C> = Box<dyn FnMut(&mut C, &mut StepControl) -> StepResult>;

/// Runs one step per timer tick against a context of type `C`.
pub struct StepScheduler<C> {
    steps: Vec<Step<C>>,
    cursor: StepCursor,
    looping: bool,
    state: SchedulerState,
    interval: Duration,
    next_due: Option<Duration>,
    handler: Box<dyn StepErrorHandler<C>>,
}

impl<C> StepScheduler<C> {
    pub fn new(interval: Duration) -> Self {
        Self {
            steps: Vec::new(),
            cursor: StepCursor::default(),
            looping: false,
            state: SchedulerState::Idle,
            interval,
            next_due: None,
            handler: Box::new(FailFast),
        }
    }

    /// Wraps around to step 0 after the last step instead of finishing.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_handler(mut self, handler: impl StepErrorHandler<C> + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Appends a step. Steps must be registered before [`start`](Self::start).
    pub fn add_step(&mut self, step: impl FnMut(&mut C, &mut StepControl) -> StepResult + 'static) {
        if self.state != SchedulerState::Idle {
            tracing::warn!(state = ?self.state, "step registered after the scheduler started");
        }
        self.steps.push(Box::new(step));
        self.cursor.step_count = self.steps.len();
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running | SchedulerState::Executing)
    }

    pub fn cursor(&self) -> StepCursor {
        self.cursor
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arms the timer. No-op while already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.state = SchedulerState::Running;
        self.next_due = None;
    }

    /// Disarms the timer. The cursor is kept so a later `start` resumes.
    pub fn stop(&mut self) {
        if self.state != SchedulerState::Stopped {
            self.state = SchedulerState::Stopped;
            self.next_due = None;
        }
    }

    /// Drives the timer at time `now`, firing at most one tick. The first
    /// poll after `start` only schedules the first tick one interval out.
    pub fn poll(
        &mut self,
        now: Duration,
        ctx: &mut C,
    ) -> std::result::Result<Option<TickOutcome>, StepError> {
        if self.state != SchedulerState::Running {
            return Ok(None);
        }
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                self.tick(ctx).map(Some)
            }
            Some(_) => Ok(None),
            None => {
                self.next_due = Some(now + self.interval);
                Ok(None)
            }
        }
    }

    /// Hands an error raised outside a step, by a listener the current step
    /// installed, to the error handler. The cursor moves only if the handler
    /// moves it.
    ///
    /// # Errors
    ///
    /// Re-raises whatever the handler re-raises, after stopping.
    pub fn report_error(&mut self, ctx: &mut C, error: StepError) -> std::result::Result<(), StepError> {
        tracing::debug!(index = self.cursor.index, %error, "error reported outside a step");
        let handled = self.handler.handle(ctx, &mut self.cursor, error);
        if handled.is_err() {
            self.stop();
        }
        handled
    }

    /// Executes the step under the cursor.
    pub fn tick(&mut self, ctx: &mut C) -> std::result::Result<TickOutcome, StepError> {
        if self.state != SchedulerState::Running {
            return Ok(TickOutcome::Inactive);
        }

        let count = self.steps.len();
        let this_index = self.cursor.index;
        if count == 0 || (!self.looping && this_index >= count) {
            self.stop();
            return Ok(TickOutcome::Finished);
        }

        self.state = SchedulerState::Executing;
        let mut control = StepControl::default();
        let step = &mut self.steps[this_index % count];
        let result = panic::catch_unwind(AssertUnwindSafe(|| step(ctx, &mut control)))
            .unwrap_or_else(|payload| Err(StepError::Unexpected(panic_message(payload.as_ref()))));

        let outcome = match result {
            Ok(()) => {
                self.cursor.index += 1;
                Ok(TickOutcome::Executed { index: this_index })
            }
            Err(error) => {
                tracing::debug!(index = this_index, %error, "step reported an error");
                let handled = self.handler.handle(ctx, &mut self.cursor, error.clone());
                if self.cursor.index == this_index {
                    self.cursor.index += 1;
                }
                match handled {
                    Ok(()) => Ok(TickOutcome::Recovered {
                        index: this_index,
                        error,
                    }),
                    Err(error) => {
                        self.stop();
                        Err(error)
                    }
                }
            }
        };

        if self.state == SchedulerState::Executing {
            self.state = if control.stop_requested {
                self.next_due = None;
                SchedulerState::Stopped
            } else {
                SchedulerState::Running
            };
        }

        outcome
    }
}

impl<C> std::fmt::Debug for StepScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepScheduler")
            .field("steps", &self.steps.len())
            .field("cursor", &self.cursor)
            .field("looping", &self.looping)
            .field("state", &self.state)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Trace {
        entered: Vec<&'static str>,
        errors: usize,
    }

    /// Counts errors and leaves the cursor alone.
    struct CountErrors;

    impl StepErrorHandler<Trace> for CountErrors {
        fn handle(
            &mut self,
            ctx: &mut Trace,
            _cursor: &mut StepCursor,
            _error: StepError,
        ) -> std::result::Result<(), StepError> {
            ctx.errors += 1;
            Ok(())
        }
    }

    fn scheduler_abc(handler: impl StepErrorHandler<Trace> + 'static) -> StepScheduler<Trace> {
        let mut scheduler = StepScheduler::new(Duration::from_millis(10))
            .looping(true)
            .with_handler(handler);
        let mut a_calls = 0;
        scheduler.add_step(move |trace: &mut Trace, _: &mut StepControl| {
            trace.entered.push("A");
            a_calls += 1;
            if a_calls == 2 {
                Err(StepError::internal("second A"))
            } else {
                Ok(())
            }
        });
        scheduler.add_step(|trace: &mut Trace, _: &mut StepControl| {
            trace.entered.push("B");
            Ok(())
        });
        scheduler.add_step(|trace: &mut Trace, _: &mut StepControl| {
            trace.entered.push("C");
            Ok(())
        });
        scheduler
    }

    #[test]
    fn forced_advance_after_unhandled_cursor() {
        let mut trace = Trace::default();
        let mut scheduler = scheduler_abc(CountErrors);
        scheduler.start();

        for _ in 0..7 {
            scheduler.tick(&mut trace).unwrap();
        }

        assert_eq!(scheduler.cursor().index(), 7);
        assert_eq!(trace.entered, ["A", "B", "C", "A", "B", "C", "A"]);
        assert_eq!(trace.errors, 1);
    }

    #[test]
    fn skip_to_next_cycle_abandons_remaining_steps() {
        let mut trace = Trace::default();
        let mut scheduler = scheduler_abc(SkipToNextCycle);
        scheduler.start();

        for _ in 0..6 {
            scheduler.tick(&mut trace).unwrap();
        }

        // second A fails at index 3 and jumps to 6
        assert_eq!(trace.entered, ["A", "B", "C", "A", "A", "B"]);
        assert_eq!(scheduler.cursor().index(), 8);
    }

    /// Sends the cursor back to the first step.
    struct Rewind;

    impl StepErrorHandler<Trace> for Rewind {
        fn handle(
            &mut self,
            ctx: &mut Trace,
            cursor: &mut StepCursor,
            _error: StepError,
        ) -> std::result::Result<(), StepError> {
            ctx.errors += 1;
            cursor.set(0);
            Ok(())
        }
    }

    /// Jumps over the next step.
    struct SkipOne;

    impl StepErrorHandler<Trace> for SkipOne {
        fn handle(
            &mut self,
            ctx: &mut Trace,
            cursor: &mut StepCursor,
            _error: StepError,
        ) -> std::result::Result<(), StepError> {
            ctx.errors += 1;
            cursor.advance(2);
            Ok(())
        }
    }

    #[test]
    fn handler_that_moves_the_cursor_is_not_forced_forward() {
        let mut scheduler = StepScheduler::new(Duration::from_millis(1)).with_handler(Rewind);
        scheduler.add_step(|trace: &mut Trace, _: &mut StepControl| {
            trace.entered.push("A");
            Ok(())
        });
        let mut failed = false;
        scheduler.add_step(move |trace: &mut Trace, _: &mut StepControl| {
            trace.entered.push("B");
            if failed {
                Ok(())
            } else {
                failed = true;
                Err(StepError::failure("first B"))
            }
        });

        let mut trace = Trace::default();
        scheduler.start();
        for _ in 0..4 {
            scheduler.tick(&mut trace).unwrap();
        }

        assert_eq!(trace.entered, ["A", "B", "A", "B"]);
        assert_eq!(scheduler.cursor().index(), 2);
        assert_eq!(trace.errors, 1);
    }

    #[test]
    fn handler_can_jump_over_steps() {
        let mut trace = Trace::default();
        let mut scheduler = StepScheduler::new(Duration::from_millis(1))
            .looping(true)
            .with_handler(SkipOne);
        let mut a_calls = 0;
        scheduler.add_step(move |trace: &mut Trace, _: &mut StepControl| {
            trace.entered.push("A");
            a_calls += 1;
            if a_calls == 1 {
                Err(StepError::internal("first A"))
            } else {
                Ok(())
            }
        });
        scheduler.add_step(|trace: &mut Trace, _: &mut StepControl| {
            trace.entered.push("B");
            Ok(())
        });
        scheduler.add_step(|trace: &mut Trace, _: &mut StepControl| {
            trace.entered.push("C");
            Ok(())
        });
        scheduler.start();

        for _ in 0..3 {
            scheduler.tick(&mut trace).unwrap();
        }

        assert_eq!(trace.entered, ["A", "C", "A"]);
        assert_eq!(scheduler.cursor().index(), 4);
    }

    #[test]
    fn errors_reported_outside_steps_go_to_the_handler() {
        let mut trace = Trace::default();
        let mut scheduler = scheduler_abc(SkipToNextCycle);
        scheduler.start();
        scheduler.tick(&mut trace).unwrap();
        scheduler.tick(&mut trace).unwrap();

        scheduler
            .report_error(&mut trace, StepError::internal("listener failed"))
            .unwrap();
        assert_eq!(scheduler.cursor().index(), 3);
        assert!(scheduler.is_running());

        let mut fail_fast: StepScheduler<Trace> = StepScheduler::new(Duration::from_millis(1));
        fail_fast.add_step(|_, _| Ok(()));
        fail_fast.start();
        let err = fail_fast
            .report_error(&mut trace, StepError::internal("listener failed"))
            .unwrap_err();
        assert_eq!(err, StepError::internal("listener failed"));
        assert_eq!(fail_fast.state(), SchedulerState::Stopped);
        assert_eq!(fail_fast.cursor().index(), 0);
    }

    #[test]
    fn always_failing_step_still_makes_progress() {
        let mut scheduler = StepScheduler::new(Duration::from_millis(1))
            .looping(true)
            .with_handler(CountErrors);
        scheduler.add_step(|_: &mut Trace, _: &mut StepControl| Err(StepError::failure("nope")));
        scheduler.add_step(|_: &mut Trace, _: &mut StepControl| Err(StepError::failure("nope")));

        let mut trace = Trace::default();
        scheduler.start();
        let mut previous = scheduler.cursor().index();
        for _ in 0..10 {
            scheduler.tick(&mut trace).unwrap();
            assert!(scheduler.cursor().index() > previous);
            previous = scheduler.cursor().index();
        }
        assert!(scheduler.cursor().index() >= 10);
        assert_eq!(trace.errors, 10);
    }

    #[test]
    fn fail_fast_stops_and_surfaces_the_error() {
        let mut scheduler: StepScheduler<Trace> = StepScheduler::new(Duration::from_millis(1));
        scheduler.add_step(|_, _| Err(StepError::internal("boom")));
        scheduler.start();

        let err = scheduler.tick(&mut Trace::default()).unwrap_err();
        assert_eq!(err, StepError::internal("boom"));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(scheduler.cursor().index(), 1);
    }

    #[test]
    fn panicking_steps_become_unexpected_errors() {
        let mut scheduler = StepScheduler::new(Duration::from_millis(1)).with_handler(CountErrors);
        scheduler.add_step(|_: &mut Trace, _: &mut StepControl| -> StepResult { panic!("kaboom") });
        scheduler.start();

        let outcome = scheduler.tick(&mut Trace::default()).unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Recovered {
                index: 0,
                error: StepError::Unexpected("kaboom".to_string()),
            }
        );
    }

    #[test]
    fn non_looping_scheduler_finishes() {
        let mut scheduler = StepScheduler::new(Duration::from_millis(1));
        scheduler.add_step(|trace: &mut Trace, _: &mut StepControl| {
            trace.entered.push("only");
            Ok(())
        });
        let mut trace = Trace::default();
        scheduler.start();

        assert_eq!(scheduler.tick(&mut trace).unwrap(), TickOutcome::Executed { index: 0 });
        assert_eq!(scheduler.tick(&mut trace).unwrap(), TickOutcome::Finished);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(trace.entered, ["only"]);
    }

    #[test]
    fn stop_from_a_step_applies_after_it_returns() {
        let mut scheduler = StepScheduler::new(Duration::from_millis(1)).looping(true);
        scheduler.add_step(|trace: &mut Trace, control: &mut StepControl| {
            control.stop();
            trace.entered.push("stopper");
            Ok(())
        });
        let mut trace = Trace::default();
        scheduler.start();

        scheduler.tick(&mut trace).unwrap();
        assert_eq!(trace.entered, ["stopper"]);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(scheduler.cursor().index(), 1);
        assert_eq!(scheduler.tick(&mut trace).unwrap(), TickOutcome::Inactive);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut scheduler: StepScheduler<Trace> = StepScheduler::new(Duration::from_millis(10));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        scheduler.start();
        scheduler.start();
        assert_eq!(scheduler.state(), SchedulerState::Running);
    }

    #[test]
    fn poll_fires_one_tick_per_interval() {
        let mut scheduler = StepScheduler::new(Duration::from_millis(10)).looping(true);
        scheduler.add_step(|trace: &mut Trace, _: &mut StepControl| {
            trace.entered.push("tick");
            Ok(())
        });
        let mut trace = Trace::default();
        scheduler.start();

        for millis in (0..=40).step_by(5) {
            scheduler
                .poll(Duration::from_millis(millis), &mut trace)
                .unwrap();
        }

        // armed at 0, fires at 10, 20, 30, 40
        assert_eq!(trace.entered.len(), 4);
    }
}
