use super::{mean, AnalysisContext, Perspective};
use crate::models::finding::{Finding, Priority};
use crate::models::perspective::{PerspectiveId, PerspectiveOutcome};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const CHANGELOG_MISSING_SCORE: f64 = 0.3;
const DOC_EXTENSIONS: [&str; 5] = ["md", "markdown", "txt", "rst", "adoc"];

/// Documentation and package metadata as a newcomer meets them.
pub struct UserPerspective;

impl Perspective for UserPerspective {
    fn id(&self) -> PerspectiveId {
        PerspectiveId::User
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> PerspectiveOutcome {
        let settings = ctx.settings;
        let readme = find_root_file(ctx.root, &["readme"]);
        let changelog = find_root_file(ctx.root, &["changelog", "changes", "history"]);
        let manifests: Vec<&str> = ["Cargo.toml", "package.json", "pyproject.toml"]
            .into_iter()
            .filter(|name| ctx.root.join(name).is_file())
            .collect();

        if readme.is_none() && changelog.is_none() && manifests.is_empty() {
            return PerspectiveOutcome::missing(
                Finding::new(
                    Priority::Critical,
                    "Create README.md",
                    "No README, package manifest or changelog found. Users need documentation to understand the project.",
                )
                .at("README.md", None)
                .with_metric(0.0, settings.readme_recommended_length as f64)
                .with_criteria([
                    "Create README.md in project root",
                    "Include project description",
                    "Add basic usage instructions",
                ])
                .with_tags(["documentation"]),
            );
        }

        let mut components = Vec::new();
        let mut findings = Vec::new();

        match &readme {
            Some(path) => {
                let name = relative_name(ctx.root, path);
                let length = fs::read_to_string(path)
                    .map(|content| content.chars().count())
                    .unwrap_or(0);
                components.push((length as f64 / settings.readme_target_length as f64).min(1.0));
                if length < settings.readme_minimum_length {
                    findings.push(
                        Finding::new(
                            Priority::High,
                            "Enhance README documentation",
                            format!(
                                "{} is minimal ({} characters). Add installation instructions, usage examples, and feature descriptions.",
                                name, length
                            ),
                        )
                        .at(name, None)
                        .with_metric(length as f64, settings.readme_recommended_length as f64)
                        .with_criteria([
                            "Include installation instructions",
                            "Add at least 2 usage examples",
                            "Document main features",
                        ])
                        .with_tags(["documentation"]),
                    );
                }
            }
            None => {
                components.push(0.0);
                findings.push(
                    Finding::new(
                        Priority::Critical,
                        "Create README.md",
                        "No README found. Users need documentation to understand the project.",
                    )
                    .at("README.md", None)
                    .with_metric(0.0, settings.readme_recommended_length as f64)
                    .with_criteria([
                        "Create README.md in project root",
                        "Include project description",
                        "Add basic usage instructions",
                    ])
                    .with_tags(["documentation"]),
                );
            }
        }

        for manifest in manifests {
            let (score, finding) = check_manifest(ctx.root, manifest);
            components.push(score);
            findings.extend(finding);
        }

        if changelog.is_some() {
            components.push(1.0);
        } else {
            components.push(CHANGELOG_MISSING_SCORE);
            findings.push(
                Finding::new(
                    Priority::Low,
                    "Create CHANGELOG.md",
                    "No changelog found. Users benefit from knowing what changed between versions.",
                )
                .at("CHANGELOG.md", None)
                .with_criteria(["Create CHANGELOG.md following Keep a Changelog format"])
                .with_tags(["documentation"]),
            );
        }

        PerspectiveOutcome::new(mean(&components), findings)
    }
}

/// 1.0 with a description, 0.5 without, 0.0 when unparsable.
fn check_manifest(root: &Path, name: &str) -> (f64, Option<Finding>) {
    let raw = match fs::read_to_string(root.join(name)) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("could not read {}: {}", name, e);
            return (0.0, Some(unparsable_manifest(name)));
        }
    };

    let description = match name {
        "package.json" => serde_json::from_str::<Value>(&raw).ok().map(|pkg| {
            pkg.get("description")
                .and_then(Value::as_str)
                .is_some_and(|d| !d.trim().is_empty())
        }),
        _ => raw.parse::<toml::Table>().ok().map(|table| toml_description(&table)),
    };

    match description {
        Some(true) => (1.0, None),
        Some(false) => (
            0.5,
            Some(
                Finding::new(
                    Priority::Medium,
                    "Add package description",
                    format!("{} lacks a description field.", name),
                )
                .at(name, None)
                .with_criteria([format!("Add meaningful description to {}", name)])
                .with_tags(["metadata"]),
            ),
        ),
        None => (0.0, Some(unparsable_manifest(name))),
    }
}

fn toml_description(table: &toml::Table) -> bool {
    let has = |section: Option<&toml::Value>| {
        section
            .and_then(|s| s.get("description"))
            .and_then(toml::Value::as_str)
            .is_some_and(|d| !d.trim().is_empty())
    };
    let poetry = table.get("tool").and_then(|t| t.get("poetry"));
    has(table.get("package")) || has(table.get("project")) || has(poetry)
}

fn unparsable_manifest(name: &str) -> Finding {
    Finding::new(
        Priority::High,
        format!("Fix {}", name),
        format!("{} could not be parsed.", name),
    )
    .at(name, None)
    .with_criteria([format!("{} parses without errors", name)])
    .with_tags(["metadata"])
}

/// First root-level file whose stem matches one of `stems`, case-insensitively.
fn find_root_file(root: &Path, stems: &[&str]) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .map_or(true, |ext| DOC_EXTENSIONS.contains(&ext.as_str()))
        })
        .filter(|path| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_ascii_lowercase())
                .is_some_and(|stem| stems.contains(&stem.as_str()))
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::Fixture;
    use super::*;

    #[test]
    fn empty_project_is_critical() {
        let fixture = Fixture::new(Vec::new());
        let outcome = UserPerspective.analyze(&fixture.ctx());
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].priority, Priority::Critical);
    }

    #[test]
    fn short_readme_gets_high_finding() {
        let fixture = Fixture::new(Vec::new());
        fs::write(fixture.root.path().join("README.md"), "x".repeat(100)).unwrap();
        fs::write(fixture.root.path().join("CHANGELOG.md"), "# Changes").unwrap();

        let outcome = UserPerspective.analyze(&fixture.ctx());
        // mean(100 / 5000, 1.0)
        assert!((outcome.score - 0.51).abs() < 1e-9);
        let high = outcome
            .findings
            .iter()
            .find(|f| f.priority == Priority::High)
            .unwrap();
        let metric = high.metric.unwrap();
        assert_eq!(metric.current, 100.0);
        assert_eq!(metric.target, 2000.0);
    }

    #[test]
    fn manifests_are_scored_by_description() {
        let fixture = Fixture::new(Vec::new());
        let root = fixture.root.path();
        fs::write(root.join("README.md"), "r".repeat(5000)).unwrap();
        fs::write(root.join("CHANGELOG.md"), "# Changes").unwrap();
        fs::write(root.join("Cargo.toml"), "[package]\nname = \"x\"\ndescription = \"tool\"\n").unwrap();
        fs::write(root.join("package.json"), "{\"name\": \"x\"}").unwrap();
        fs::write(root.join("pyproject.toml"), "[project\nbroken").unwrap();

        let outcome = UserPerspective.analyze(&fixture.ctx());
        // mean(1.0 readme, 1.0 cargo, 0.5 package.json, 0.0 pyproject, 1.0 changelog)
        assert!((outcome.score - 0.7).abs() < 1e-9);
        assert!(outcome.findings.iter().any(|f| f.title == "Add package description"));
        assert!(outcome.findings.iter().any(|f| f.title == "Fix pyproject.toml"));
    }

    #[test]
    fn missing_changelog_scores_point_three() {
        let fixture = Fixture::new(Vec::new());
        fs::write(fixture.root.path().join("README.md"), "r".repeat(6000)).unwrap();

        let outcome = UserPerspective.analyze(&fixture.ctx());
        assert!((outcome.score - 0.65).abs() < 1e-9);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].priority, Priority::Low);
    }
}
