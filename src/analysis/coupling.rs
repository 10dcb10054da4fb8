use crate::analysis::language::SourceLanguage;
use std::collections::BTreeSet;

/// Import fan-out: number of distinct modules a file pulls in.
pub fn count_imports(source: &str, language: SourceLanguage) -> usize {
    extract_imports(source, language).len()
}

/// Distinct import targets, found with a per-line heuristic
/// (`use`, `import`, `from`, `require`).
pub fn extract_imports(source: &str, language: SourceLanguage) -> BTreeSet<String> {
    let mut imports = BTreeSet::new();
    let mut in_go_block = false;

    for line in source.lines() {
        let trimmed = line.trim();
        let found = match language {
            SourceLanguage::Python => extract_python_import(trimmed),
            SourceLanguage::Rust => extract_rust_use(trimmed),
            SourceLanguage::Go => {
                if in_go_block {
                    if trimmed.starts_with(')') {
                        in_go_block = false;
                        None
                    } else {
                        extract_import_path(trimmed)
                    }
                } else if trimmed == "import (" {
                    in_go_block = true;
                    None
                } else if trimmed.starts_with("import ") {
                    extract_import_path(trimmed)
                } else {
                    None
                }
            }
            SourceLanguage::Java => trimmed
                .strip_prefix("import ")
                .map(|rest| rest.trim_start_matches("static ").trim_end_matches(';').trim().to_string())
                .filter(|s| !s.is_empty()),
            SourceLanguage::TypeScript | SourceLanguage::Tsx | SourceLanguage::JavaScript => {
                if trimmed.starts_with("import ") || trimmed.contains("require(") {
                    extract_import_path(trimmed)
                } else {
                    None
                }
            }
        };
        if let Some(target) = found {
            imports.insert(target);
        }
    }
    imports
}

fn extract_rust_use(line: &str) -> Option<String> {
    let rest = line
        .strip_prefix("pub use ")
        .or_else(|| line.strip_prefix("pub(crate) use "))
        .or_else(|| line.strip_prefix("use "))?;
    // `use crate::foo::{bar, baz};` -> `crate::foo`
    let path = rest
        .trim_end_matches(';')
        .split("::{")
        .next()
        .unwrap_or("")
        .trim();
    (!path.is_empty()).then(|| path.to_string())
}

fn extract_import_path(line: &str) -> Option<String> {
    // import ... from 'path' | require("path") | "path"
    for quote in ['\'', '"', '`'] {
        if let Some(end) = line.rfind(quote) {
            if let Some(start) = line[..end].rfind(quote) {
                let path = &line[start + 1..end];
                if !path.is_empty() {
                    return Some(path.to_string());
                }
            }
        }
    }
    None
}

fn extract_python_import(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix("from ") {
        return rest.split_whitespace().next().map(|s| s.to_string());
    }
    let module = line.strip_prefix("import ")?.split(',').next()?.trim();
    let module = module.split(" as ").next().unwrap_or(module).trim();
    (!module.is_empty()).then(|| module.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_imports_for_multiple_languages() {
        let js = "import { a } from './a';\nconst b = require(\"./b\");\nconsole.log(a);\n";
        let rust = "use crate::models::finding::Finding;\npub use std::collections::{BTreeMap, BTreeSet};\nfn main() {}\n";
        let python = "import os\nfrom pathlib import Path\nimport numpy as np\n";

        let js_imports = extract_imports(js, SourceLanguage::JavaScript);
        assert!(js_imports.contains("./a"));
        assert!(js_imports.contains("./b"));

        let rust_imports = extract_imports(rust, SourceLanguage::Rust);
        assert!(rust_imports.contains("crate::models::finding::Finding"));
        assert!(rust_imports.contains("std::collections"));

        let py_imports = extract_imports(python, SourceLanguage::Python);
        assert_eq!(py_imports.len(), 3);
        assert!(py_imports.contains("numpy"));
    }

    #[test]
    fn go_import_block_counts_each_package() {
        let go = "package main\n\nimport (\n\t\"fmt\"\n\t\"os\"\n)\n\nfunc main() { fmt.Println(\"hi\") }\n";
        assert_eq!(count_imports(go, SourceLanguage::Go), 2);
    }

    #[test]
    fn duplicate_imports_count_once() {
        let py = "import os\nimport os\n";
        assert_eq!(count_imports(py, SourceLanguage::Python), 1);
    }
}
