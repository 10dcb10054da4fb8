use crate::analysis::complexity::analyze_complexity;
use crate::analysis::coupling::count_imports;
use crate::analysis::coverage::{has_inline_tests, is_test_path};
use crate::analysis::language::SourceLanguage;
use crate::analysis::markers::MarkerScanner;
use crate::commands::settings::EngineSettings;
use crate::models::snapshot::{CodebaseSnapshot, ParseFailure, SourceFile};
use std::fs;
use std::path::{Path, PathBuf};

/// Measure every recognised source file under `root`.
///
/// Unreadable files are skipped with a warning; files that fail to parse
/// are kept with `parse_error` set. Output is ordered by path and carries
/// no timestamps, so an unchanged tree always yields the same snapshot.
pub fn scan_codebase(root: &Path, settings: &EngineSettings) -> CodebaseSnapshot {
    let scanner = MarkerScanner::new(&settings.marker_keywords);
    let files: Vec<SourceFile> = walk_sources(root, settings)
        .into_iter()
        .filter_map(|(path, language)| {
            let relative = relative_path(root, &path);
            measure_file(&path, relative, language, scanner.as_ref())
        })
        .collect();

    let snapshot = CodebaseSnapshot::from_files(
        files,
        settings.max_file_lines,
        settings.max_function_complexity,
    );
    log::info!(
        "scanned {} files ({} lines, {} parse failures) under {}",
        snapshot.total_files,
        snapshot.total_lines,
        snapshot.parse_failures,
        root.display()
    );
    snapshot
}

fn measure_file(
    path: &Path,
    relative: String,
    language: SourceLanguage,
    scanner: Option<&MarkerScanner>,
) -> Option<SourceFile> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("skipping unreadable file {}: {}", relative, e);
            return None;
        }
    };

    let (source, utf8_error) = match String::from_utf8(bytes) {
        Ok(source) => (source, None),
        Err(e) => {
            let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
            let line = valid.iter().filter(|b| **b == b'\n').count() + 1;
            let source = String::from_utf8_lossy(e.as_bytes()).into_owned();
            (
                source,
                Some(ParseFailure {
                    line,
                    message: "file is not valid UTF-8".to_string(),
                }),
            )
        }
    };

    let (functions, parse_error) = match utf8_error {
        Some(failure) => (Vec::new(), Some(failure)),
        None => {
            let measured = analyze_complexity(&source, language);
            (measured.functions, measured.parse_error)
        }
    };
    if let Some(failure) = &parse_error {
        log::debug!("{}:{} {}", relative, failure.line, failure.message);
    }

    Some(SourceFile {
        language: language.name().to_string(),
        line_count: source.lines().count(),
        functions,
        markers: scanner.map(|s| s.scan(&source)).unwrap_or_default(),
        imports: count_imports(&source, language),
        is_test: is_test_path(&relative),
        has_inline_tests: has_inline_tests(&source),
        parse_error,
        path: relative,
    })
}

/// Recognised source files, skipping hidden directories, `ignoreDirs` and
/// `ignorePatterns`. Sorted by path.
pub(crate) fn walk_sources(root: &Path, settings: &EngineSettings) -> Vec<(PathBuf, SourceLanguage)> {
    let mut files = Vec::new();
    walk_recursive(root, root, settings, &mut files);
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
}

fn walk_recursive(
    root: &Path,
    dir: &Path,
    settings: &EngineSettings,
    files: &mut Vec<(PathBuf, SourceLanguage)>,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("cannot read directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if name.starts_with('.') || settings.ignore_dirs.iter().any(|d| d == &name) {
                continue;
            }
            walk_recursive(root, &path, settings, files);
        } else if file_type.is_file() {
            let Some(language) = SourceLanguage::from_path(&path) else {
                continue;
            };
            let relative = relative_path(root, &path);
            if settings
                .ignore_patterns
                .iter()
                .any(|p| p.matches(&relative) || p.matches(&name))
            {
                continue;
            }
            files.push((path, language));
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
