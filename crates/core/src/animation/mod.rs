//! Animation value sources and the factory that picks one per property.

mod enumerated;

use std::time::Duration;

use crate::{config::ValueConfig, host::CandidateProvider, PropertyUnderTest, Value, ValueKind};

pub use enumerated::{EnumeratedValueAnimation, QueryEvent, QueryReceiver};

/// Timing shared by every animation the harness creates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Length of one forward pass.
    pub duration: Duration,
    /// Play the pass backwards after each forward pass.
    pub auto_reverse: bool,
}

impl Timing {
    /// Forever-repeating, auto-reversing timing of the given duration.
    pub fn forever(duration: Duration) -> Self {
        Self {
            duration,
            auto_reverse: true,
        }
    }
}

/// Continuous animation interpolating between two values.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearAnimation {
    pub from: Value,
    pub to: Value,
}

impl LinearAnimation {
    pub fn new(from: Value, to: Value) -> Self {
        Self { from, to }
    }

    /// Value at `progress` in `[0, 1]`. Kinds that cannot interpolate jump
    /// from `from` to `to` halfway through.
    pub fn value_at(&self, progress: f64) -> Value {
        Value::lerp(&self.from, &self.to, progress).unwrap_or_else(|| {
            if progress < 0.5 {
                self.from.clone()
            } else {
                self.to.clone()
            }
        })
    }
}

/// Value source bound to a property for one test cycle.
#[derive(Debug)]
pub enum Animation {
    Enumerated(EnumeratedValueAnimation),
    Linear(LinearAnimation),
}

impl Animation {
    pub fn is_enumerated(&self) -> bool {
        matches!(self, Animation::Enumerated(_))
    }

    /// Current value of the animation. Enumerated animations count this as
    /// a query; linear ones read off `progress`.
    pub fn current_value(&mut self, progress: f64) -> Value {
        match self {
            Animation::Enumerated(animation) => animation.query(),
            Animation::Linear(animation) => animation.value_at(progress),
        }
    }
}

/// Builds the animation used to exercise a property.
pub struct AnimationFactory {
    values: ValueConfig,
    candidates: Box<dyn CandidateProvider>,
}

impl AnimationFactory {
    pub fn new(values: ValueConfig, candidates: Box<dyn CandidateProvider>) -> Self {
        Self { values, candidates }
    }

    /// Whether the factory can produce any animation for the property.
    pub fn supports(&self, property: &PropertyUnderTest) -> bool {
        match property.value_kind {
            ValueKind::Double | ValueKind::Point | ValueKind::Color | ValueKind::Int => true,
            _ => self.candidate_values(property).is_some(),
        }
    }

    /// Creates an animation for `property`, seeded from its current value.
    /// Returns `None` when no animation data exists for the property type.
    pub fn create(&self, property: &PropertyUnderTest, base: Option<&Value>) -> Option<Animation> {
        let animation = match property.value_kind {
            ValueKind::Double => Animation::Linear(self.double_animation(base)),
            ValueKind::Point => Animation::Linear(LinearAnimation::new(
                Value::Point { x: 0.0, y: 0.0 },
                Value::Point { x: 100.0, y: 200.0 },
            )),
            ValueKind::Color => Animation::Linear(LinearAnimation::new(Value::RED, Value::BLUE)),
            ValueKind::Int => Animation::Enumerated(self.int_animation(base)),
            _ => Animation::Enumerated(EnumeratedValueAnimation::new(
                self.candidate_values(property)?,
            )),
        };
        Some(animation)
    }

    fn candidate_values(&self, property: &PropertyUnderTest) -> Option<Vec<Value>> {
        self.candidates
            .candidate_values(property.value_kind.type_name(), &property.name)
    }

    fn double_animation(&self, base: Option<&Value>) -> LinearAnimation {
        let base = base
            .and_then(Value::as_f64)
            .filter(|value| !value.is_nan())
            .unwrap_or(1.0);
        let start = base * self.values.low_multiplier;
        let mut end = base * self.values.high_multiplier;
        if (start - end).abs() < f64::EPSILON {
            end = self.values.distinct_value;
        }
        LinearAnimation::new(Value::Double(start), Value::Double(end))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn int_animation(&self, base: Option<&Value>) -> EnumeratedValueAnimation {
        let fallback = self.values.distinct_value.round_ties_even() as i64;
        let base = match base {
            Some(Value::Int(value)) if (2..=1000).contains(value) => *value,
            _ => fallback,
        };
        #[allow(clippy::cast_precision_loss)]
        let start = (base as f64 * self.values.low_multiplier) as i64;
        #[allow(clippy::cast_precision_loss)]
        let end = (base as f64 * self.values.high_multiplier) as i64;
        EnumeratedValueAnimation::new((start..end).map(Value::Int).collect())
    }
}

impl std::fmt::Debug for AnimationFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationFactory")
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}
