use crate::models::snapshot::{CodebaseSnapshot, SourceFile};
use std::collections::BTreeSet;
use std::path::Path;

const TEST_DIRS: [&str; 4] = ["tests", "test", "__tests__", "spec"];

/// Test classification by path: a test directory component, or a
/// `test_*`, `*_test`, `*.test`, `*.spec`, `*_spec` file stem.
pub fn is_test_path(relative_path: &str) -> bool {
    let path = Path::new(relative_path);
    let in_test_dir = path
        .parent()
        .map(|p| {
            p.components()
                .any(|c| TEST_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
        })
        .unwrap_or(false);

    in_test_dir || stripped_test_stem(&file_stem(relative_path)).is_some()
}

pub fn has_inline_tests(source: &str) -> bool {
    source.contains("#[cfg(test)]")
}

/// Stems of the source files a test file is taken to exercise.
fn covered_stem(relative_path: &str) -> String {
    let stem = file_stem(relative_path);
    stripped_test_stem(&stem).unwrap_or(stem)
}

fn stripped_test_stem(stem: &str) -> Option<String> {
    if let Some(rest) = stem.strip_prefix("test_") {
        return Some(rest.to_string());
    }
    for suffix in ["_test", ".test", ".spec", "_spec"] {
        if let Some(rest) = stem.strip_suffix(suffix) {
            return Some(rest.to_string());
        }
    }
    None
}

fn file_stem(relative_path: &str) -> String {
    Path::new(relative_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Which source stems have a paired test file anywhere in the tree.
#[derive(Debug, Clone, Default)]
pub struct TestPairing {
    covered: BTreeSet<String>,
}

impl TestPairing {
    pub fn from_snapshot(snapshot: &CodebaseSnapshot) -> Self {
        Self {
            covered: snapshot.test_files().map(|f| covered_stem(&f.path)).collect(),
        }
    }

    pub fn is_tested(&self, file: &SourceFile) -> bool {
        file.has_inline_tests || self.covered.contains(&file_stem(&file.path))
    }
}
