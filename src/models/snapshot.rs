use crate::models::finding::Priority;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionComplexity {
    pub name: String,
    pub line: usize,
    pub complexity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerOccurrence {
    pub keyword: String,
    pub line: usize,
    pub priority: Priority,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub line: usize,
    pub message: String,
}

/// Structural metrics for one file, recomputed from disk on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub language: String,
    pub line_count: usize,
    pub functions: Vec<FunctionComplexity>,
    pub markers: Vec<MarkerOccurrence>,
    pub imports: usize,
    pub is_test: bool,
    pub has_inline_tests: bool,
    pub parse_error: Option<ParseFailure>,
}

impl SourceFile {
    /// Highest per-function complexity, 0 for files without functions.
    pub fn max_complexity(&self) -> usize {
        self.functions.iter().map(|f| f.complexity).max().unwrap_or(0)
    }
}

/// Everything one scan learned about the tree. Holds no timestamps so that
/// scanning an unchanged tree twice serializes to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseSnapshot {
    pub files: BTreeMap<String, SourceFile>,
    pub total_files: usize,
    pub total_lines: usize,
    pub oversized_files: usize,
    pub complex_files: usize,
    pub test_files: usize,
    pub parse_failures: usize,
    pub total_markers: usize,
}

impl CodebaseSnapshot {
    /// Build a snapshot and its aggregate counts from per-file metrics.
    pub fn from_files<I>(files: I, max_file_lines: usize, max_complexity: usize) -> Self
    where
        I: IntoIterator<Item = SourceFile>,
    {
        let files: BTreeMap<String, SourceFile> =
            files.into_iter().map(|f| (f.path.clone(), f)).collect();

        let mut snapshot = CodebaseSnapshot {
            total_files: files.len(),
            ..Default::default()
        };
        for file in files.values() {
            snapshot.total_lines += file.line_count;
            snapshot.total_markers += file.markers.len();
            if file.line_count > max_file_lines {
                snapshot.oversized_files += 1;
            }
            if file.max_complexity() > max_complexity {
                snapshot.complex_files += 1;
            }
            if file.is_test {
                snapshot.test_files += 1;
            }
            if file.parse_error.is_some() {
                snapshot.parse_failures += 1;
            }
        }
        snapshot.files = files;
        snapshot
    }

    pub fn source_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values().filter(|f| !f.is_test)
    }

    pub fn test_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values().filter(|f| f.is_test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, lines: usize, complexities: &[usize], is_test: bool) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            language: "rust".to_string(),
            line_count: lines,
            functions: complexities
                .iter()
                .enumerate()
                .map(|(i, c)| FunctionComplexity {
                    name: format!("f{i}"),
                    line: i + 1,
                    complexity: *c,
                })
                .collect(),
            markers: Vec::new(),
            imports: 0,
            is_test,
            has_inline_tests: false,
            parse_error: None,
        }
    }

    #[test]
    fn aggregates_counts_against_thresholds() {
        let snapshot = CodebaseSnapshot::from_files(
            vec![
                file("src/b.rs", 401, &[12, 1], false),
                file("src/a.rs", 20, &[3], false),
                file("tests/a.rs", 10, &[], true),
            ],
            300,
            10,
        );

        assert_eq!(snapshot.total_files, 3);
        assert_eq!(snapshot.total_lines, 431);
        assert_eq!(snapshot.oversized_files, 1);
        assert_eq!(snapshot.complex_files, 1);
        assert_eq!(snapshot.test_files, 1);
        let keys: Vec<&String> = snapshot.files.keys().collect();
        assert_eq!(keys, vec!["src/a.rs", "src/b.rs", "tests/a.rs"]);
    }

    #[test]
    fn max_complexity_is_zero_without_functions() {
        assert_eq!(file("a.rs", 1, &[], false).max_complexity(), 0);
        assert_eq!(file("a.rs", 1, &[2, 7, 4], false).max_complexity(), 7);
    }
}
