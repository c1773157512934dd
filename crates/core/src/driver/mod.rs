//! Sampling animation driver.
//!
//! For every testable property of a target the driver runs a three step
//! cycle on a looping [`StepScheduler`]:
//!
//! 1. **set up** - build an animation for the property and bind it,
//! 2. **run** - start the animation clock and hold the step timer while a
//!    listener samples the property on each time-advanced event,
//! 3. **clean up** - validate the samples and record a verdict.
//!
//! Sampling is interrupt driven: once enough samples are in, the listener
//! tears the animation down and releases the step timer so clean up can
//! run. Step errors are scored against the current property and the
//! scheduler resumes at the next property's set up.

mod validate;

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crate::animation::{AnimationFactory, QueryReceiver, Timing};
use crate::filter::PropertyFilterPolicy;
use crate::host::{
    AnimationTarget, CandidateProvider, DiagnosticTranslator, JsonTranslator, KnownIssueTable,
    KnownIssues, TableCandidates,
};
use crate::report::{ReportSink, ResultSet, RunSummary, TracingReportSink, Verdict};
use crate::scheduler::{
    panic_message, StepControl, StepCursor, StepError, StepErrorHandler, StepResult, StepScheduler,
};
use crate::timeline::{AnimationClock, TimeManager};
use crate::{HarnessConfig, HarnessError, PropertyUnderTest, Result};

pub use validate::{validate_measurements, Measurement};

/// Lookup tables and sinks the driver consults besides the target.
pub struct Collaborators {
    pub candidates: Box<dyn CandidateProvider>,
    pub translator: Box<dyn DiagnosticTranslator>,
    pub known_issues: Box<dyn KnownIssues>,
    pub sink: Box<dyn ReportSink>,
}

impl Collaborators {
    /// Table-backed collaborators built from configuration, reporting
    /// through tracing.
    pub fn from_config(config: &HarnessConfig) -> Self {
        let mut candidates = TableCandidates::with_defaults();
        candidates.extend(config.candidates.clone());
        Self {
            candidates: Box::new(candidates),
            translator: Box::new(JsonTranslator),
            known_issues: Box::new(KnownIssueTable::new(config.known_issues.clone())),
            sink: Box::new(TracingReportSink),
        }
    }

    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// State of the property currently being sampled.
#[derive(Debug)]
struct SamplingSession {
    clock: AnimationClock,
    queries: Option<QueryReceiver>,
    listening: bool,
    measurements: Vec<Measurement>,
    /// Time-advanced events (or queries, for enumerated animations) seen.
    current_measurement: usize,
    /// Slots filled in `measurements`.
    index_measurement: usize,
}

impl SamplingSession {
    fn new(clock: AnimationClock, number_of_measurements: usize) -> Self {
        Self {
            clock,
            queries: None,
            listening: false,
            measurements: vec![Measurement::default(); number_of_measurements],
            current_measurement: 0,
            index_measurement: 0,
        }
    }

    fn record(&mut self, measurement: Measurement) {
        if let Some(slot) = self.measurements.get_mut(self.index_measurement) {
            *slot = measurement;
            self.index_measurement += 1;
        }
    }

    /// Records every pending query notification, in order, until the buffer
    /// is full.
    fn collect_queries(&mut self) {
        let Some(receiver) = &self.queries else {
            return;
        };
        while let Some(event) = receiver.try_next() {
            if let Some(slot) = self.measurements.get_mut(self.current_measurement) {
                *slot = Measurement::new(event.ordinal, Some(event.value));
                self.current_measurement += 1;
                self.index_measurement = self.current_measurement;
            }
        }
    }
}

/// Everything the driver's steps operate on, owned by one test run.
pub struct TestContext {
    target: Box<dyn AnimationTarget>,
    factory: AnimationFactory,
    policy: PropertyFilterPolicy,
    translator: Box<dyn DiagnosticTranslator>,
    sink: Box<dyn ReportSink>,
    time: TimeManager,
    timing: Timing,
    number_of_measurements: usize,
    properties: Vec<PropertyUnderTest>,
    current_property: usize,
    session: Option<SamplingSession>,
    results: ResultSet,
    test_result: bool,
    outcome: Option<bool>,
    resume_requested: bool,
}

impl TestContext {
    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn time(&self) -> &TimeManager {
        &self.time
    }

    /// Properties that survived filtering, in test order.
    pub fn properties(&self) -> &[PropertyUnderTest] {
        &self.properties
    }

    pub fn current_property(&self) -> Option<&PropertyUnderTest> {
        self.properties.get(self.current_property)
    }

    pub fn outcome(&self) -> Option<bool> {
        self.outcome
    }

    fn register(&mut self, property: &PropertyUnderTest, verdict: Verdict, message: &str) {
        let name = property.qualified_name();
        self.sink.record_verdict(&name, verdict, message);
        self.results.record(name, verdict, message);
    }

    /// Discovers and filters the target's properties.
    fn prepare(&mut self) {
        let discovered = self.target.properties();
        let mut selected = Vec::with_capacity(discovered.len());
        for property in discovered {
            if let Some(reason) = self.policy.evaluate(&property).reason() {
                self.register(&property, Verdict::Ignore, reason.message());
            } else if !self.factory.supports(&property) {
                self.register(
                    &property,
                    Verdict::Ignore,
                    "Ignore: no animation data for property type.",
                );
            } else {
                selected.push(property);
            }
        }

        tracing::info!(
            element = self.target.type_name(),
            count = selected.len(),
            "properties to test"
        );
        self.properties = selected;
        self.current_property = 0;
    }

    fn set_up(&mut self, control: &mut StepControl) -> StepResult {
        if self.current_property >= self.properties.len() {
            self.finish();
            control.stop();
            return Ok(());
        }

        let property = self.properties[self.current_property].clone();
        tracing::debug!(property = %property, "setting up animation");

        let base = self.target.current_value(&property);
        let animation = self
            .factory
            .create(&property, base.as_ref())
            .ok_or_else(|| StepError::internal(format!("cannot provide animation for {property}")))?;
        self.target.bind(&property).map_err(|err| {
            StepError::internal(format!("cannot bind animation to {property}: {err}"))
        })?;

        let clock = AnimationClock::new(animation, self.timing);
        self.session = Some(SamplingSession::new(clock, self.number_of_measurements));
        Ok(())
    }

    fn start_sampling(&mut self, control: &mut StepControl) -> StepResult {
        let now = self.time.now();
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| StepError::internal("no available animation clock"))?;

        // Enumerated animations are sampled through their query channel;
        // a plain read may not be the only query in a frame.
        session.queries = session.clock.subscribe_queries();
        session.clock.begin(now);
        session.listening = true;

        // the step timer restarts once sampling has finished
        control.stop();
        Ok(())
    }

    /// Listener for time-advanced events of the global clock.
    ///
    /// Errors belong to the property being sampled; the driver routes them
    /// through the scheduler's recovery like a failed step.
    fn on_time_advanced(&mut self) -> StepResult {
        let now = self.time.now();
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let Some(property) = self.properties.get(self.current_property) else {
            return Ok(());
        };
        if !session.listening || !session.clock.advance_to(now) {
            return Ok(());
        }

        let sampling_window =
            session.clock.current_iteration() > 1 || session.clock.current_global_speed() < 0.0;
        let mut complete = false;

        if sampling_window {
            if session.current_measurement >= self.number_of_measurements {
                complete = true;
            } else if session.clock.is_enumerated() {
                // the read only provokes a query; the channel records it
                self.time.pause();
                let read = self.target.read(property, &mut session.clock);
                self.time.resume();
                read.map_err(|err| StepError::internal(format!("cannot read {property}: {err}")))?;
            } else {
                if session.current_measurement % 2 == 0 {
                    self.time.pause();
                    let read = self.target.read(property, &mut session.clock);
                    self.time.resume();
                    let value = read
                        .map_err(|err| StepError::internal(format!("cannot read {property}: {err}")))?;
                    session.record(Measurement::new(0, value));
                }
                session.current_measurement += 1;
            }
        }

        if !complete {
            self.target.on_frame(property, &mut session.clock);
            session.collect_queries();
        }

        if complete {
            self.end_sampling();
        }
        Ok(())
    }

    /// Stops the animation, detaches listeners and releases the step timer.
    fn end_sampling(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.clock.stop();
            session.queries = None;
            session.listening = false;
        }
        self.resume_requested = true;
    }

    fn clean_up(&mut self, _control: &mut StepControl) -> StepResult {
        let property = self
            .properties
            .get(self.current_property)
            .cloned()
            .ok_or_else(|| StepError::internal("clean up ran past the last property"))?;
        let session = self
            .session
            .take()
            .ok_or_else(|| StepError::internal("clean up without an active sampling session"))?;

        let samples = self.describe_samples(&property, &session.measurements);
        let recorded = samples[..session.index_measurement].join(" ");
        tracing::debug!(property = %property, samples = %recorded, "sampled values");

        let passed = if !validate_measurements(&session.measurements, session.index_measurement) {
            self.register(&property, Verdict::Fail, "Fail.");
            false
        } else if !self.target.verify_after_animation(&property) {
            self.register(
                &property,
                Verdict::Fail,
                "Fail. Control verification failed after animation.",
            );
            false
        } else {
            self.register(&property, Verdict::Pass, "Pass.");
            true
        };

        self.test_result &= passed;
        self.target.unbind(&property);
        self.current_property += 1;
        Ok(())
    }

    /// Best-effort rendering of each slot; never fails.
    fn describe_samples(&self, property: &PropertyUnderTest, measurements: &[Measurement]) -> Vec<String> {
        let type_name = property.value_kind.type_name();
        measurements
            .iter()
            .map(|measurement| match &measurement.value {
                Some(value) => self
                    .translator
                    .translate(type_name, value)
                    .unwrap_or_else(|_| value.to_string()),
                None => "(null)".to_string(),
            })
            .collect()
    }

    /// Scores a failed step against the current property and resynchronises
    /// on the next property's set up.
    fn recover(&mut self, cursor: &mut StepCursor, error: &StepError) {
        let verdict = match error {
            StepError::Failure(_) => Verdict::Fail,
            StepError::Internal(_) | StepError::Unexpected(_) => Verdict::InternalFailure,
        };
        tracing::warn!(index = cursor.index(), %error, "recovering from step error");

        if let Some(mut session) = self.session.take() {
            session.clock.stop();
        }
        // a listener may have failed mid-read, or with the step timer held
        self.time.resume();
        self.resume_requested = true;
        if let Some(property) = self.properties.get(self.current_property).cloned() {
            self.register(&property, verdict, &error.to_string());
            self.target.unbind(&property);
        }
        self.test_result = false;

        cursor.skip_to_next_cycle();
        self.current_property = cursor.cycle();
    }

    fn finish(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        let passed = self.test_result && self.results.overall_pass();
        self.outcome = Some(passed);
        let summary = self.summary().to_string();
        self.sink.report_final(passed, &summary);
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            target: self.target.type_name().to_string(),
            passed: self
                .outcome
                .unwrap_or_else(|| self.test_result && self.results.overall_pass()),
            results: self.results.clone(),
        }
    }
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("target", &self.target.type_name())
            .field("time", &self.time)
            .field("properties", &self.properties.len())
            .field("current_property", &self.current_property)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

/// Error policy of the driver's scheduler.
#[derive(Debug, Default, Clone, Copy)]
struct RecoverToNextProperty;

impl StepErrorHandler<TestContext> for RecoverToNextProperty {
    fn handle(
        &mut self,
        ctx: &mut TestContext,
        cursor: &mut StepCursor,
        error: StepError,
    ) -> std::result::Result<(), StepError> {
        ctx.recover(cursor, &error);
        Ok(())
    }
}

/// Drives every testable property of one target through an animation.
#[derive(Debug)]
pub struct SamplingAnimationDriver {
    scheduler: StepScheduler<TestContext>,
    context: TestContext,
    frame_interval: Duration,
    max_frames: u64,
    started: bool,
}

impl SamplingAnimationDriver {
    /// Driver with table-backed collaborators taken from `config`.
    ///
    /// # Errors
    ///
    /// Fails if a known-issue or selection expression is invalid.
    pub fn new(target: Box<dyn AnimationTarget>, config: &HarnessConfig) -> Result<Self> {
        Self::with_collaborators(target, config, Collaborators::from_config(config))
    }

    /// # Errors
    ///
    /// Fails if a known-issue or selection expression is invalid.
    pub fn with_collaborators(
        target: Box<dyn AnimationTarget>,
        config: &HarnessConfig,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let mut policy =
            PropertyFilterPolicy::for_target(target.type_name(), collaborators.known_issues.as_ref())?;
        if let Some(selection) = &config.selection {
            policy = policy.with_selection(selection)?;
        }

        let mut scheduler = StepScheduler::new(config.scheduler.interval())
            .looping(true)
            .with_handler(RecoverToNextProperty);
        scheduler.add_step(TestContext::set_up);
        scheduler.add_step(TestContext::start_sampling);
        scheduler.add_step(TestContext::clean_up);

        let context = TestContext {
            target,
            factory: AnimationFactory::new(config.values.clone(), collaborators.candidates),
            policy,
            translator: collaborators.translator,
            sink: collaborators.sink,
            time: TimeManager::new(),
            timing: Timing::forever(config.animation_duration()),
            number_of_measurements: config.sampling.number_of_measurements,
            properties: Vec::new(),
            current_property: 0,
            session: None,
            results: ResultSet::new(),
            test_result: true,
            outcome: None,
            resume_requested: false,
        };

        Ok(Self {
            scheduler,
            context,
            frame_interval: config.scheduler.frame_interval(),
            max_frames: config.sampling.max_frames,
            started: false,
        })
    }

    /// Filters the target's properties and starts the step timer. Returns
    /// immediately; progress is made by [`advance`](Self::advance).
    pub fn run(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.context.prepare();
        self.scheduler.start();
    }

    /// Advances the global clock by `delta`, delivers the time-advanced
    /// event and gives the step timer a chance to fire.
    ///
    /// # Errors
    ///
    /// Only if a step error escapes the scheduler's handler.
    pub fn advance(&mut self, delta: Duration) -> Result<()> {
        if self.context.time.advance(delta) {
            let context = &mut self.context;
            let listened = panic::catch_unwind(AssertUnwindSafe(|| context.on_time_advanced()))
                .unwrap_or_else(|payload| Err(StepError::Unexpected(panic_message(payload.as_ref()))));
            if let Err(error) = listened {
                self.scheduler.report_error(&mut self.context, error)?;
            }
        }
        if std::mem::take(&mut self.context.resume_requested) && self.context.outcome.is_none() {
            self.scheduler.start();
        }
        let now = self.context.time.now();
        self.scheduler.poll(now, &mut self.context)?;
        Ok(())
    }

    /// Runs frame by frame until every property has been processed.
    ///
    /// There is no per-property timeout. A property that never yields enough
    /// samples, such as an enumerated property whose reads are served from a
    /// cache and never query the animation, holds the run until the frame
    /// budget is spent. The error then names that property, and the verdicts
    /// recorded so far stay available through [`results`](Self::results);
    /// properties after it are not tested.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Stalled`] if the frame budget runs out.
    pub fn run_to_completion(&mut self) -> Result<RunSummary> {
        self.run();
        let mut frames = 0;
        while !self.is_finished() {
            if frames >= self.max_frames {
                let property = self
                    .context
                    .current_property()
                    .map_or_else(|| "<none>".to_string(), PropertyUnderTest::qualified_name);
                return Err(HarnessError::Stalled { frames, property });
            }
            self.advance(self.frame_interval)?;
            frames += 1;
        }
        Ok(self.summary())
    }

    pub fn is_finished(&self) -> bool {
        self.context.outcome.is_some()
    }

    /// Overall verdict, once every property has been processed.
    pub fn outcome(&self) -> Option<bool> {
        self.context.outcome
    }

    pub fn results(&self) -> &ResultSet {
        &self.context.results
    }

    pub fn context(&self) -> &TestContext {
        &self.context
    }

    pub fn scheduler(&self) -> &StepScheduler<TestContext> {
        &self.scheduler
    }

    pub fn summary(&self) -> RunSummary {
        self.context.summary()
    }
}
