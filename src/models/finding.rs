use serde::{Deserialize, Serialize};
use std::fmt;

/// Urgency of a finding. Declaration order is urgency order, so the derived
/// `Ord` sorts CRITICAL first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
            Priority::Info => "INFO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Some(Priority::Critical),
            "HIGH" => Some(Priority::High),
            "MEDIUM" => Some(Priority::Medium),
            "LOW" => Some(Priority::Low),
            "INFO" => Some(Priority::Info),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPair {
    pub current: f64,
    pub target: f64,
}

impl MetricPair {
    /// Relative gap between current and target; absolute when the target is zero.
    pub fn deviation(&self) -> f64 {
        let gap = (self.current - self.target).abs();
        if self.target.abs() > f64::EPSILON {
            gap / self.target.abs()
        } else {
            gap
        }
    }
}

/// One prioritized, verifiable unit of recommended work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub location: Option<Location>,
    pub metric: Option<MetricPair>,
    pub acceptance_criteria: Vec<String>,
    pub tags: Vec<String>,
}

impl Finding {
    pub fn new(priority: Priority, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            priority,
            title: title.into(),
            description: description.into(),
            location: None,
            metric: None,
            acceptance_criteria: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: Option<usize>) -> Self {
        self.location = Some(Location {
            file: file.into(),
            line,
        });
        self
    }

    pub fn with_metric(mut self, current: f64, target: f64) -> Self {
        self.metric = Some(MetricPair { current, target });
        self
    }

    pub fn with_criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acceptance_criteria.extend(criteria.into_iter().map(Into::into));
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// A finding must point somewhere or measure something.
    pub fn is_verifiable(&self) -> bool {
        self.location.is_some() || self.metric.is_some()
    }

    pub fn deviation(&self) -> f64 {
        self.metric.map(|m| m.deviation()).unwrap_or(0.0)
    }
}
