use std::fmt;

use crate::Value;

/// One sampled observation of an animated property.
///
/// Unused slots of a cycle's measurement buffer keep the default: ordinal
/// 0 and no value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    /// Query ordinal reported by the animation; 0 on channels that do not
    /// count queries.
    pub query_ordinal: u64,
    pub value: Option<Value>,
}

impl Measurement {
    pub fn new(query_ordinal: u64, value: Option<Value>) -> Self {
        Self {
            query_ordinal,
            value,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "Measurement ({value}, {})", self.query_ordinal),
            None => write!(f, "Measurement ((null), {})", self.query_ordinal),
        }
    }
}

/// Checks that the first `recorded` measurements show real progress.
///
/// Every recorded value must be present. Equal adjacent values are
/// accepted only when the query ordinals differ, proving two distinct
/// queries took place.
pub fn validate_measurements(measurements: &[Measurement], recorded: usize) -> bool {
    let recorded = &measurements[..recorded.min(measurements.len())];
    if let Some(missing) = recorded.iter().position(|m| m.value.is_none()) {
        tracing::warn!(measurement = missing, "validation failure: measurement was null");
        return false;
    }

    for pair in recorded.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        if current.value == next.value && current.query_ordinal == next.query_ordinal {
            tracing::warn!(
                first = %current,
                second = %next,
                "validation failure: value and query ordinal both repeated"
            );
            return false;
        }
    }
    true
}
