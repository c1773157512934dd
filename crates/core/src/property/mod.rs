use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ValueKind;

/// Description of one property of a target, as produced by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyUnderTest {
    pub name: String,
    /// Name of the type that declares the property.
    pub owner_type: String,
    pub value_kind: ValueKind,
    #[serde(default)]
    pub is_read_only: bool,
    /// Whether the property carries metadata allowing it to be animated.
    #[serde(default = "default_animatable")]
    pub is_animatable: bool,
    /// Set by discovery for properties with a known animation defect.
    #[serde(default)]
    pub known_defective: bool,
}

fn default_animatable() -> bool {
    true
}

impl PropertyUnderTest {
    /// Writable, animatable property with no known issues.
    pub fn new(owner_type: impl Into<String>, name: impl Into<String>, value_kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            owner_type: owner_type.into(),
            value_kind,
            is_read_only: false,
            is_animatable: true,
            known_defective: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }

    pub fn not_animatable(mut self) -> Self {
        self.is_animatable = false;
        self
    }

    pub fn known_defective(mut self) -> Self {
        self.known_defective = true;
        self
    }

    /// `"{Owner}.{Name}"`, the form matched by known-issue filters.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner_type, self.name)
    }
}

impl fmt::Display for PropertyUnderTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner_type, self.name)
    }
}
