//! Core library for the animation conformance harness.
//!
//! The harness drives every animatable property of a UI element through a
//! generated animation and checks that reading the property while it
//! animates shows real progress. Each module owns one piece of that loop:
//! value and property descriptions, animations and their clocks, the timed
//! step scheduler, property filtering, the host interfaces and the sampling
//! driver that ties them together.

pub mod animation;
pub mod config;
pub mod driver;
pub mod error;
pub mod filter;
pub mod host;
pub mod property;
pub mod report;
pub mod scheduler;
pub mod timeline;
pub mod value;

pub use animation::{Animation, AnimationFactory, EnumeratedValueAnimation, QueryEvent, QueryReceiver};
pub use config::{HarnessConfig, SamplingConfig, SchedulerConfig, ValueConfig};
pub use driver::{validate_measurements, Collaborators, Measurement, SamplingAnimationDriver};
pub use error::{HarnessError, Result};
pub use filter::{FilterDecision, PropertyFilterPolicy, SkipReason};
pub use host::{AnimationTarget, CandidateProvider, DiagnosticTranslator, KnownIssues};
pub use property::PropertyUnderTest;
pub use report::{ReportSink, ResultSet, RunSummary, TracingReportSink, Verdict};
pub use scheduler::{StepError, StepResult, StepScheduler};
pub use timeline::{AnimationClock, TimeManager};
pub use value::{Value, ValueKind};
