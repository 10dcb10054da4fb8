use crate::analysis::history::ENGINE_DIR;
use crate::commands::fsio::write_atomic;
use crate::error::Result;
use crate::models::finding::Priority;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 1;

/// Typed view of `.selfdev/settings.json` after migration and clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub max_file_lines: usize,
    pub max_function_complexity: usize,
    pub max_imports: usize,
    pub readme_target_length: usize,
    pub readme_minimum_length: usize,
    pub readme_recommended_length: usize,
    pub coverage_target: f64,
    pub marker_density_target: f64,
    pub max_marker_findings: usize,
    pub marker_keywords: BTreeMap<String, Priority>,
    pub ignore_dirs: Vec<String>,
    pub ignore_patterns: Vec<glob::Pattern>,
    pub tracked_documents: Vec<String>,
    pub requirements_dir: String,
    pub principles_dir: String,
    pub history_limit: usize,
    pub fix_ratio_window: usize,
    pub trend_window: usize,
    pub git_timeout_secs: u64,
    pub excerpt_lines: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings::from_value(&migrate_settings(json!({})))
    }
}

impl EngineSettings {
    fn from_value(settings: &Value) -> Self {
        let uint = |key: &str| settings.get(key).and_then(Value::as_u64).unwrap_or(0);
        let float = |key: &str| settings.get(key).and_then(Value::as_f64).unwrap_or(0.0);

        let marker_keywords = settings
            .get("markerKeywords")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| Some((k.clone(), Priority::parse(v.as_str()?)?)))
                    .collect()
            })
            .unwrap_or_default();

        let ignore_patterns = string_list(settings, "ignorePatterns")
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();

        EngineSettings {
            max_file_lines: uint("maxFileLines") as usize,
            max_function_complexity: uint("maxFunctionComplexity") as usize,
            max_imports: uint("maxImports") as usize,
            readme_target_length: uint("readmeTargetLength") as usize,
            readme_minimum_length: uint("readmeMinimumLength") as usize,
            readme_recommended_length: uint("readmeRecommendedLength") as usize,
            coverage_target: uint("coverageTarget") as f64,
            marker_density_target: float("markerDensityTarget"),
            max_marker_findings: uint("maxMarkerFindings") as usize,
            marker_keywords,
            ignore_dirs: string_list(settings, "ignoreDirs"),
            ignore_patterns,
            tracked_documents: string_list(settings, "trackedDocuments"),
            requirements_dir: settings["requirementsDir"].as_str().unwrap_or("requirements").to_string(),
            principles_dir: settings["principlesDir"].as_str().unwrap_or("principles").to_string(),
            history_limit: uint("historyLimit") as usize,
            fix_ratio_window: uint("fixRatioWindow") as usize,
            trend_window: uint("trendWindow") as usize,
            git_timeout_secs: uint("gitTimeoutSecs"),
            excerpt_lines: uint("excerptLines") as usize,
        }
    }
}

/// Effective settings for `root`. Missing or corrupt files fall back to
/// defaults; nothing is written.
pub fn load_settings(root: &Path) -> EngineSettings {
    EngineSettings::from_value(&load_settings_value(root))
}

pub fn load_settings_value(root: &Path) -> Value {
    let path = settings_path(root);
    let original = match fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("settings at {} unparsable, using defaults: {}", path.display(), e);
            json!({})
        }),
        Err(_) => json!({}),
    };
    migrate_settings(original)
}

/// Merge a partial object into the stored settings and persist the result.
pub fn save_settings(root: &Path, partial: &Value) -> Result<Value> {
    let mut merged = load_settings_value(root);
    merge_settings(&mut merged, partial);
    let migrated = migrate_settings(merged);

    let raw = serde_json::to_string_pretty(&migrated)?;
    write_atomic(&settings_path(root), raw.as_bytes())?;
    Ok(migrated)
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join(ENGINE_DIR).join("settings.json")
}

fn string_list(settings: &Value, key: &str) -> Vec<String> {
    settings
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn migrate_settings(input: Value) -> Value {
    let defaults = default_settings();
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if version < 1 {
        migrate_keyword_list(&mut out);
    }

    deep_merge_defaults(&mut out, &defaults);
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "maxFileLines": 300,
        "maxFunctionComplexity": 10,
        "maxImports": 15,
        "readmeTargetLength": 5000,
        "readmeMinimumLength": 500,
        "readmeRecommendedLength": 2000,
        "coverageTarget": 80,
        "markerDensityTarget": 5.0,
        "maxMarkerFindings": 10,
        "markerKeywords": default_marker_keywords(),
        "ignoreDirs": ["node_modules", "target", "__pycache__", "vendor", "dist", "build"],
        "ignorePatterns": [],
        "trackedDocuments": ["requirements.md", "principles.md"],
        "requirementsDir": "requirements",
        "principlesDir": "principles",
        "historyLimit": 500,
        "fixRatioWindow": 10,
        "trendWindow": 5,
        "gitTimeoutSecs": 10,
        "excerptLines": 20
    })
}

fn default_marker_keywords() -> Value {
    json!({
        "TODO": "MEDIUM",
        "FIXME": "HIGH",
        "XXX": "MEDIUM",
        "HACK": "MEDIUM",
        "BUG": "HIGH"
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        // A user-supplied keyword table replaces the defaults entirely.
        if key == "markerKeywords" && target_obj.contains_key(key) {
            continue;
        }
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

/// Schema 0 stored marker keywords as a bare list.
fn migrate_keyword_list(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };
    let Some(list) = obj.get("markerKeywords").and_then(Value::as_array).cloned() else {
        return;
    };

    let defaults = default_marker_keywords();
    let table: Map<String, Value> = list
        .iter()
        .filter_map(Value::as_str)
        .map(|keyword| {
            let priority = defaults.get(keyword).cloned().unwrap_or_else(|| json!("MEDIUM"));
            (keyword.to_string(), priority)
        })
        .collect();
    obj.insert("markerKeywords".to_string(), Value::Object(table));
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "maxFileLines", 50, 5000, 300);
    clamp_u64(obj, "maxFunctionComplexity", 2, 100, 10);
    clamp_u64(obj, "maxImports", 1, 200, 15);
    clamp_u64(obj, "readmeTargetLength", 100, 100_000, 5000);
    clamp_u64(obj, "readmeMinimumLength", 0, 100_000, 500);
    clamp_u64(obj, "readmeRecommendedLength", 0, 100_000, 2000);
    clamp_u64(obj, "coverageTarget", 1, 100, 80);
    clamp_f64(obj, "markerDensityTarget", 0.1, 1000.0, 5.0);
    clamp_u64(obj, "maxMarkerFindings", 0, 1000, 10);
    clamp_u64(obj, "historyLimit", 10, 100_000, 500);
    clamp_u64(obj, "fixRatioWindow", 1, 1000, 10);
    clamp_u64(obj, "trendWindow", 2, 100, 5);
    clamp_u64(obj, "gitTimeoutSecs", 1, 600, 10);
    clamp_u64(obj, "excerptLines", 0, 500, 20);

    for key in ["ignoreDirs", "ignorePatterns", "trackedDocuments"] {
        sanitize_string_list(obj, key);
    }
    if let Some(Value::Array(patterns)) = obj.get_mut("ignorePatterns") {
        patterns.retain(|p| p.as_str().is_some_and(|s| glob::Pattern::new(s).is_ok()));
    }
    ensure_string(obj, "requirementsDir", "requirements");
    ensure_string(obj, "principlesDir", "principles");

    // Keep only keywords with a recognised priority.
    let keywords = obj
        .entry("markerKeywords".to_string())
        .or_insert_with(default_marker_keywords);
    match keywords.as_object_mut() {
        Some(table) => table.retain(|keyword, priority| {
            !keyword.trim().is_empty() && priority.as_str().and_then(Priority::parse).is_some()
        }),
        None => *keywords = default_marker_keywords(),
    }
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn clamp_f64(map: &mut Map<String, Value>, key: &str, min: f64, max: f64, default: f64) {
    let raw = map
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn sanitize_string_list(map: &mut Map<String, Value>, key: &str) {
    let cleaned: Vec<Value> = map
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|v| v.as_str().is_some_and(|s| !s.trim().is_empty()))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    map.insert(key.to_string(), Value::Array(cleaned));
}

fn ensure_string(map: &mut Map<String, Value>, key: &str, default: &str) {
    let value = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default)
        .to_string();
    map.insert(key.to_string(), json!(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = EngineSettings::default();
        assert_eq!(settings.max_file_lines, 300);
        assert_eq!(settings.max_function_complexity, 10);
        assert_eq!(settings.max_imports, 15);
        assert_eq!(settings.coverage_target, 80.0);
        assert_eq!(settings.marker_density_target, 5.0);
        assert_eq!(settings.marker_keywords.get("FIXME"), Some(&Priority::High));
        assert_eq!(settings.marker_keywords.get("TODO"), Some(&Priority::Medium));
        assert_eq!(settings.tracked_documents, vec!["requirements.md", "principles.md"]);
        assert_eq!(settings.git_timeout_secs, 10);
        assert!(settings.ignore_dirs.contains(&"node_modules".to_string()));
    }

    #[test]
    fn migrates_keyword_list_and_clamps_numbers() {
        let migrated = migrate_settings(json!({
            "markerKeywords": ["TODO", "BUG", "NOTE"],
            "maxFileLines": 3,
            "trendWindow": 1000,
            "markerDensityTarget": -4.0
        }));

        assert_eq!(migrated["schema_version"], json!(SETTINGS_SCHEMA_VERSION));
        assert_eq!(migrated["markerKeywords"]["BUG"], json!("HIGH"));
        assert_eq!(migrated["markerKeywords"]["NOTE"], json!("MEDIUM"));
        assert!(migrated["markerKeywords"].get("FIXME").is_none());
        assert_eq!(migrated["maxFileLines"], json!(50));
        assert_eq!(migrated["trendWindow"], json!(100));
        assert_eq!(migrated["markerDensityTarget"], json!(0.1));
    }

    #[test]
    fn drops_invalid_priorities_and_globs() {
        let migrated = migrate_settings(json!({
            "schema_version": 1,
            "markerKeywords": { "TODO": "LOW", "FIXME": "URGENT" },
            "ignorePatterns": ["*.gen.rs", "[unclosed"]
        }));
        assert_eq!(migrated["markerKeywords"], json!({ "TODO": "LOW" }));
        assert_eq!(migrated["ignorePatterns"], json!(["*.gen.rs"]));
    }

    #[test]
    fn merges_partial_settings_without_losing_existing_values() {
        let mut existing = default_settings();
        merge_settings(&mut existing, &json!({ "maxFileLines": 400 }));
        let migrated = migrate_settings(existing);

        assert_eq!(migrated["maxFileLines"], json!(400));
        assert_eq!(migrated["maxFunctionComplexity"], json!(10));
    }

    #[test]
    fn corrupt_file_falls_back_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let settings = load_settings(dir.path());
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn save_settings_persists_merged_values() {
        let dir = tempfile::tempdir().unwrap();
        save_settings(dir.path(), &json!({ "maxImports": 30 })).unwrap();
        save_settings(dir.path(), &json!({ "trendWindow": 8 })).unwrap();

        let settings = load_settings(dir.path());
        assert_eq!(settings.max_imports, 30);
        assert_eq!(settings.trend_window, 8);
    }

    #[test]
    fn missing_settings_do_not_create_files() {
        let dir = tempfile::tempdir().unwrap();
        let _ = load_settings(dir.path());
        assert!(!dir.path().join(ENGINE_DIR).exists());
    }
}
