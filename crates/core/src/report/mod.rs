use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome assigned to one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Ignore,
    InternalFailure,
}

impl Verdict {
    /// Whether this verdict takes part in the overall pass/fail decision.
    pub fn is_scored(self) -> bool {
        !matches!(self, Verdict::Ignore)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Ignore => "ignore",
            Verdict::InternalFailure => "internal failure",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictEntry {
    pub property: String,
    pub message: String,
}

/// Append-only verdicts, bucketed by kind in recording order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    buckets: BTreeMap<Verdict, Vec<VerdictEntry>>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, property: impl Into<String>, verdict: Verdict, message: impl Into<String>) {
        self.buckets.entry(verdict).or_default().push(VerdictEntry {
            property: property.into(),
            message: message.into(),
        });
    }

    pub fn entries(&self, verdict: Verdict) -> &[VerdictEntry] {
        self.buckets.get(&verdict).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Property names that received `verdict`, in order.
    pub fn properties(&self, verdict: Verdict) -> Vec<&str> {
        self.entries(verdict)
            .iter()
            .map(|entry| entry.property.as_str())
            .collect()
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.entries(verdict).len()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True unless some scored verdict is not a pass.
    pub fn overall_pass(&self) -> bool {
        self.buckets
            .iter()
            .filter(|(verdict, _)| verdict.is_scored())
            .all(|(verdict, entries)| *verdict == Verdict::Pass || entries.is_empty())
    }
}

/// Final tally of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub target: String,
    pub passed: bool,
    pub results: ResultSet,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} pass, {} fail, {} internal failure, {} ignored)",
            self.target,
            if self.passed { "PASS" } else { "FAIL" },
            self.results.count(Verdict::Pass),
            self.results.count(Verdict::Fail),
            self.results.count(Verdict::InternalFailure),
            self.results.count(Verdict::Ignore),
        )
    }
}

/// Destination for verdicts. Never consulted for control flow.
pub trait ReportSink {
    fn record_verdict(&mut self, property: &str, verdict: Verdict, message: &str);
    fn report_final(&mut self, passed: bool, summary: &str);
}

/// Sink that emits tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReportSink;

impl ReportSink for TracingReportSink {
    fn record_verdict(&mut self, property: &str, verdict: Verdict, message: &str) {
        match verdict {
            Verdict::Pass | Verdict::Ignore => {
                tracing::info!(property, %verdict, message, "property verdict");
            }
            Verdict::Fail | Verdict::InternalFailure => {
                tracing::warn!(property, %verdict, message, "property verdict");
            }
        }
    }

    fn report_final(&mut self, passed: bool, summary: &str) {
        if passed {
            tracing::info!(summary, "animation run passed");
        } else {
            tracing::warn!(summary, "animation run failed");
        }
    }
}
