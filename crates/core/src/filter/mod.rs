use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{host::KnownIssues, HarnessError, PropertyUnderTest, Result};

/// Why a property is left out of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ReadOnly,
    NotAnimatable,
    KnownIssue,
    NotSelected,
}

impl SkipReason {
    pub fn message(self) -> &'static str {
        match self {
            SkipReason::ReadOnly => "Ignore: read-only property cannot be animated.",
            SkipReason::NotAnimatable => "Ignore: property without animation metadata cannot be animated.",
            SkipReason::KnownIssue => "Ignore: property has a known animation issue.",
            SkipReason::NotSelected => "Ignore: property does not match filter criteria.",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of [`PropertyFilterPolicy::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Test,
    Skip(SkipReason),
}

impl FilterDecision {
    pub fn should_skip(self) -> bool {
        matches!(self, FilterDecision::Skip(_))
    }

    pub fn reason(self) -> Option<SkipReason> {
        match self {
            FilterDecision::Test => None,
            FilterDecision::Skip(reason) => Some(reason),
        }
    }
}

/// Decides, per property, whether a run should exercise it.
///
/// Rules apply in order and the first match wins: read-only, not
/// animatable, known issue, then (when configured) the selection filter.
#[derive(Debug, Clone, Default)]
pub struct PropertyFilterPolicy {
    known_issues: Option<Regex>,
    selection: Option<Regex>,
}

impl PropertyFilterPolicy {
    /// Policy with no deny-list and no selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the policy for a target, compiling its deny-list expression.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidFilter`] if the expression is not a
    /// valid regex.
    pub fn for_target(target_type: &str, known_issues: &dyn KnownIssues) -> Result<Self> {
        let known_issues = known_issues
            .filter_expression(target_type)
            .filter(|expression| !expression.is_empty())
            .map(|expression| compile(&expression))
            .transpose()?;
        Ok(Self {
            known_issues,
            selection: None,
        })
    }

    /// Restricts the run to properties whose qualified name matches.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidFilter`] for an invalid regex.
    pub fn with_selection(mut self, pattern: &str) -> Result<Self> {
        self.selection = Some(compile(pattern)?);
        Ok(self)
    }

    pub fn evaluate(&self, property: &PropertyUnderTest) -> FilterDecision {
        if property.is_read_only {
            return FilterDecision::Skip(SkipReason::ReadOnly);
        }
        if !property.is_animatable {
            return FilterDecision::Skip(SkipReason::NotAnimatable);
        }

        let qualified = property.qualified_name();
        let denied = self
            .known_issues
            .as_ref()
            .is_some_and(|expression| expression.is_match(&qualified));
        if property.known_defective || denied {
            return FilterDecision::Skip(SkipReason::KnownIssue);
        }

        match &self.selection {
            Some(selection) if !selection.is_match(&qualified) => {
                FilterDecision::Skip(SkipReason::NotSelected)
            }
            _ => FilterDecision::Test,
        }
    }

    pub fn should_skip(&self, property: &PropertyUnderTest) -> bool {
        self.evaluate(property).should_skip()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| HarnessError::InvalidFilter {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::KnownIssueTable;
    use crate::ValueKind;

    fn policy() -> PropertyFilterPolicy {
        let mut table = KnownIssueTable::default();
        table.insert("Button", ["Button\\.Foreground", "Timeline"]);
        PropertyFilterPolicy::for_target("Button", &table).unwrap()
    }

    fn property(name: &str) -> PropertyUnderTest {
        PropertyUnderTest::new("Button", name, ValueKind::Double)
    }

    #[test]
    fn read_only_wins_over_known_issue() {
        let decision = policy().evaluate(&property("Foreground").read_only());
        assert_eq!(decision, FilterDecision::Skip(SkipReason::ReadOnly));
    }

    #[test]
    fn rules_apply_in_order() {
        let policy = policy();
        assert_eq!(
            policy.evaluate(&property("Tag").not_animatable().known_defective()),
            FilterDecision::Skip(SkipReason::NotAnimatable)
        );
        assert_eq!(
            policy.evaluate(&property("Foreground")).reason(),
            Some(SkipReason::KnownIssue)
        );
        assert_eq!(
            policy.evaluate(&property("Width").known_defective()).reason(),
            Some(SkipReason::KnownIssue)
        );
        assert_eq!(policy.evaluate(&property("Width")), FilterDecision::Test);
    }

    #[test]
    fn empty_deny_list_skips_nothing() {
        let policy = PropertyFilterPolicy::for_target("Ellipse", &KnownIssueTable::default()).unwrap();
        assert!(!policy.should_skip(&PropertyUnderTest::new("Ellipse", "Fill", ValueKind::Color)));
    }

    #[test]
    fn selection_only_keeps_matching_properties() {
        let policy = policy().with_selection("Width|Height").unwrap();
        assert_eq!(policy.evaluate(&property("Width")), FilterDecision::Test);
        assert_eq!(
            policy.evaluate(&property("Opacity")).reason(),
            Some(SkipReason::NotSelected)
        );
        assert_eq!(
            policy.evaluate(&property("Height").read_only()).reason(),
            Some(SkipReason::ReadOnly)
        );
    }

    #[test]
    fn invalid_expressions_are_reported() {
        let err = PropertyFilterPolicy::new().with_selection("(").unwrap_err();
        assert!(format!("{err}").contains("invalid property filter"));
    }
}
