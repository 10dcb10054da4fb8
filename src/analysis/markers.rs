use crate::models::finding::Priority;
use crate::models::snapshot::MarkerOccurrence;
use regex::Regex;
use std::collections::BTreeMap;

const MAX_MARKER_TEXT: usize = 120;

/// Whole-word scan for unresolved-work markers (`TODO`, `FIXME`, ...).
///
/// Plain line scan, so it works on files the parser rejected.
pub struct MarkerScanner {
    pattern: Regex,
    priorities: BTreeMap<String, Priority>,
}

impl MarkerScanner {
    /// `None` when no keywords are configured.
    pub fn new(keywords: &BTreeMap<String, Priority>) -> Option<Self> {
        if keywords.is_empty() {
            return None;
        }
        // Longest first so `FIXME` wins over a configured `FIX`.
        let mut words: Vec<&String> = keywords.keys().collect();
        words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<String>>()
            .join("|");

        match Regex::new(&format!(r"\b({})\b", alternation)) {
            Ok(pattern) => Some(Self {
                pattern,
                priorities: keywords.clone(),
            }),
            Err(e) => {
                log::warn!("marker keywords rejected: {}", e);
                None
            }
        }
    }

    /// One occurrence per line (the first keyword on it), ordered by line.
    pub fn scan(&self, source: &str) -> Vec<MarkerOccurrence> {
        let mut found = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            let Some(m) = self.pattern.find(line) else {
                continue;
            };
            let keyword = m.as_str().to_string();
            let priority = self
                .priorities
                .get(&keyword)
                .copied()
                .unwrap_or(Priority::Medium);
            found.push(MarkerOccurrence {
                keyword,
                line: idx + 1,
                priority,
                text: line.trim().chars().take(MAX_MARKER_TEXT).collect(),
            });
        }
        found
    }
}

/// Markers per thousand lines.
pub fn marker_density(markers: usize, lines: usize) -> f64 {
    if lines == 0 {
        return 0.0;
    }
    markers as f64 * 1000.0 / lines as f64
}
