//! Interfaces to the UI framework and the lookup tables around it.
//!
//! The harness never talks to a concrete toolkit. A host wires an element
//! in through [`AnimationTarget`] and supplies value tables through the
//! remaining traits; table-backed defaults are provided for configuration
//! driven runs.

use std::collections::BTreeMap;

use crate::timeline::AnimationClock;
use crate::{HarnessError, PropertyUnderTest, Result, Value};

/// Element whose properties are driven by animations.
pub trait AnimationTarget {
    /// Type name of the element, used for known-issue lookups.
    fn type_name(&self) -> &str;

    /// Every property the element exposes, in test order.
    fn properties(&self) -> Vec<PropertyUnderTest>;

    /// Un-animated value of a property; seeds generated animations.
    fn current_value(&self, property: &PropertyUnderTest) -> Option<Value>;

    /// Prepares `property` to be driven by an animation clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the element cannot host an animation on the
    /// property.
    fn bind(&mut self, property: &PropertyUnderTest) -> Result<()> {
        let _ = property;
        Ok(())
    }

    /// Releases whatever [`bind`](Self::bind) set up.
    fn unbind(&mut self, property: &PropertyUnderTest) {
        let _ = property;
    }

    /// Reads the effective value of an animated property. `Ok(None)` is a
    /// read that produced no value; an error means the element could not be
    /// read at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the property cannot be read while animating.
    fn read(&mut self, property: &PropertyUnderTest, clock: &mut AnimationClock) -> Result<Option<Value>> {
        let _ = property;
        Ok(Some(clock.current_value()))
    }

    /// Runs the framework's own per-frame work (layout, rendering), which
    /// may query the animation independently of the harness.
    fn on_frame(&mut self, property: &PropertyUnderTest, clock: &mut AnimationClock) {
        let _ = (property, clock);
    }

    /// Checks the element is still healthy after being animated.
    fn verify_after_animation(&mut self, property: &PropertyUnderTest) -> bool {
        let _ = property;
        true
    }
}

/// Candidate values for properties the factory cannot interpolate.
pub trait CandidateProvider {
    /// `None` means the property type has no animation data.
    fn candidate_values(&self, type_name: &str, property_name: &str) -> Option<Vec<Value>>;
}

/// Renders sampled values for diagnostics.
pub trait DiagnosticTranslator {
    /// # Errors
    ///
    /// Returns an error if the value has no representation; callers fall
    /// back to `Display`.
    fn translate(&self, type_name: &str, value: &Value) -> Result<String>;
}

/// Deny-list of properties with known animation defects.
pub trait KnownIssues {
    /// Regex matched against `"{Owner}.{Name}"`, or `None` for no issues.
    fn filter_expression(&self, target_type: &str) -> Option<String>;
}

/// Candidate lookup keyed by type name, with per-property overrides keyed
/// by `"{Type}.{Property}"`.
#[derive(Debug, Clone, Default)]
pub struct TableCandidates {
    table: BTreeMap<String, Vec<Value>>,
}

impl TableCandidates {
    pub fn new(table: BTreeMap<String, Vec<Value>>) -> Self {
        Self { table }
    }

    /// Candidate table pre-filled with the values every host understands.
    pub fn with_defaults() -> Self {
        let mut table = Self::default();
        table.insert("Boolean", vec![Value::Bool(true), Value::Bool(false)]);
        table.insert(
            "String",
            vec![Value::Text("alpha".into()), Value::Text("beta".into())],
        );
        table
    }

    pub fn insert(&mut self, key: impl Into<String>, values: Vec<Value>) {
        self.table.insert(key.into(), values);
    }

    /// Merges `other` over this table.
    pub fn extend(&mut self, other: BTreeMap<String, Vec<Value>>) {
        self.table.extend(other);
    }
}

impl CandidateProvider for TableCandidates {
    fn candidate_values(&self, type_name: &str, property_name: &str) -> Option<Vec<Value>> {
        self.table
            .get(&format!("{type_name}.{property_name}"))
            .or_else(|| self.table.get(type_name))
            .cloned()
    }
}

/// Known-issue patterns keyed by element type.
#[derive(Debug, Clone, Default)]
pub struct KnownIssueTable {
    table: BTreeMap<String, Vec<String>>,
}

impl KnownIssueTable {
    pub fn new(table: BTreeMap<String, Vec<String>>) -> Self {
        Self { table }
    }

    pub fn insert<I, S>(&mut self, target_type: impl Into<String>, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table
            .entry(target_type.into())
            .or_default()
            .extend(patterns.into_iter().map(Into::into));
    }
}

impl KnownIssues for KnownIssueTable {
    fn filter_expression(&self, target_type: &str) -> Option<String> {
        let patterns = self.table.get(target_type)?;
        if patterns.is_empty() {
            return None;
        }
        Some(
            patterns
                .iter()
                .map(|pattern| format!("(?:{pattern})"))
                .collect::<Vec<_>>()
                .join("|"),
        )
    }
}

/// Renders values as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTranslator;

impl DiagnosticTranslator for JsonTranslator {
    fn translate(&self, _type_name: &str, value: &Value) -> Result<String> {
        match value {
            Value::Unit => Err(HarnessError::msg("unit values have no markup form")),
            Value::Double(v) if !v.is_finite() => {
                Err(HarnessError::msg(format!("non-finite double {v}")))
            }
            _ => Ok(serde_json::to_string(value)?),
        }
    }
}
