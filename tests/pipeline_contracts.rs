use git2::{Repository, Signature, Time};
use selfdev_lib::commands::increments::{
    current_increment_prompt, redo_increment, revert_increment, revert_increments_from,
    verify_increment, IncrementTracker,
};
use selfdev_lib::commands::scoring::{export_state, run_analysis, AnalysisRequest};
use selfdev_lib::commands::settings::{load_settings, save_settings};
use selfdev_lib::commands::state::{detect_regression, OrganismStateStore};
use selfdev_lib::models::finding::Priority;
use selfdev_lib::models::history::HistoryAvailability;
use selfdev_lib::models::increment::IncrementStatus;
use selfdev_lib::models::organism::FitnessRecord;
use selfdev_lib::models::perspective::PerspectiveId;
use selfdev_lib::EngineError;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const BASE_TIME: i64 = 1_700_000_000;

fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("create parent dir");
    fs::write(path, content).expect("write file");
}

/// Stage everything and commit at `BASE_TIME + offset` so history order is
/// fixed regardless of wall-clock speed.
fn commit_all(repo: &Repository, message: &str, offset: i64) -> String {
    let mut index = repo.index().expect("open git index");
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .expect("stage files");
    index.write().expect("write git index");
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    let signature = Signature::new("Test User", "test@example.com", &Time::new(BASE_TIME + offset, 0))
        .expect("signature");

    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .expect("commit")
        .to_string()
}

fn create_workspace_with_git_repo() -> (TempDir, Repository) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    write_file(
        temp_dir.path(),
        "src/main.rs",
        "fn main() {\n    println!(\"hello\");\n}\n",
    );
    write_file(temp_dir.path(), ".gitignore", ".selfdev/\n");
    let repo = Repository::init(temp_dir.path()).expect("init git repo");
    commit_all(&repo, "init", 0);
    (temp_dir, repo)
}

fn repo_head(root: &Path) -> String {
    let repo = Repository::open(root).expect("open repo");
    let head = repo.head().expect("head").peel_to_commit().expect("head commit");
    head.id().to_string()
}

fn busy_python_file() -> String {
    let mut lines = vec!["def busy(x):".to_string()];
    for i in 0..11 {
        lines.push(format!("    if x == {}:", i));
        lines.push(format!("        x += {}", i + 1));
    }
    lines.push("    return x".to_string());
    let mut n = 0;
    while lines.len() < 401 {
        lines.push(format!("value_{} = {}", n, n));
        n += 1;
    }
    lines.join("\n") + "\n"
}

#[test]
fn oversized_complex_file_is_flagged_by_system_perspective() {
    let (tmp, repo) = create_workspace_with_git_repo();
    write_file(tmp.path(), "src/busy.py", &busy_python_file());
    commit_all(&repo, "add busy module", 10);

    let mut request = AnalysisRequest::new(tmp.path());
    request.perspectives = vec![PerspectiveId::System];
    let report = run_analysis(&request).expect("run analysis");

    let system = &report.results[0];
    let size = system
        .findings
        .iter()
        .find(|f| f.title == "Refactor src/busy.py")
        .expect("line ceiling finding");
    let size_metric = size.metric.expect("size metric");
    assert_eq!((size_metric.current, size_metric.target), (401.0, 300.0));

    let complexity = system
        .findings
        .iter()
        .find(|f| f.title == "Reduce complexity of busy in src/busy.py")
        .expect("complexity ceiling finding");
    let complexity_metric = complexity.metric.expect("complexity metric");
    assert_eq!((complexity_metric.current, complexity_metric.target), (12.0, 10.0));
}

#[test]
fn tree_without_tests_scores_zero_for_test_perspective() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    write_file(temp_dir.path(), "app/a.py", "def a():\n    return 1\n");
    write_file(temp_dir.path(), "app/b.py", "def b():\n    return 2\n");
    write_file(temp_dir.path(), "app/c.py", "def c():\n    return 3\n");

    let report = run_analysis(&AnalysisRequest::new(temp_dir.path())).expect("run analysis");
    assert_eq!(report.score(PerspectiveId::Test), Some(0.0));
    let critical = report
        .ranked
        .iter()
        .find(|r| r.perspective == PerspectiveId::Test)
        .expect("test finding");
    assert_eq!(critical.finding.priority, Priority::Critical);
    assert_eq!(critical.finding.title, "Create tests");
}

#[test]
fn every_perspective_score_is_bounded_and_ranking_is_ordered() {
    let (tmp, repo) = create_workspace_with_git_repo();
    write_file(tmp.path(), "src/busy.py", &busy_python_file());
    write_file(tmp.path(), "src/todo.rs", "// TODO: wire up\n// FIXME: broken\npub fn x() {}\n");
    write_file(tmp.path(), "README.md", "# demo\n");
    commit_all(&repo, "fix: add modules", 20);

    let report = run_analysis(&AnalysisRequest::new(tmp.path())).expect("run analysis");
    assert_eq!(report.results.len(), PerspectiveId::ALL.len());
    for result in &report.results {
        assert!(
            (0.0..=1.0).contains(&result.score),
            "{} scored {}",
            result.perspective,
            result.score
        );
    }
    assert!(report
        .ranked
        .windows(2)
        .all(|pair| pair[0].finding.priority <= pair[1].finding.priority));
    assert_eq!(report.history, HistoryAvailability::Available);
}

#[test]
fn repeated_analysis_of_unchanged_tree_is_identical() {
    let (tmp, repo) = create_workspace_with_git_repo();
    write_file(tmp.path(), "src/lib.rs", "pub fn a(x: bool) -> u8 {\n    if x { 1 } else { 0 }\n}\n");
    commit_all(&repo, "add lib", 5);

    let first = run_analysis(&AnalysisRequest::new(tmp.path())).expect("first run");
    let second = run_analysis(&AnalysisRequest::new(tmp.path())).expect("second run");
    assert_eq!(
        serde_json::to_string(&first).expect("serialize"),
        serde_json::to_string(&second).expect("serialize")
    );
    assert!(!tmp.path().join(".selfdev").exists());
}

#[test]
fn advancing_generations_persist_and_round_trip() {
    let (tmp, _repo) = create_workspace_with_git_repo();

    for expected in 1..=2u64 {
        let report = run_analysis(&AnalysisRequest::new(tmp.path()).advancing()).expect("run analysis");
        let outcome = report.generation.expect("generation outcome");
        assert_eq!(outcome.generation, expected);
    }

    let export = export_state(tmp.path());
    let head = repo_head(tmp.path());
    assert_eq!(export.state.last_git_hash.as_deref(), Some(head.as_str()));
    assert!(export.state.created_at.is_some());
    assert!(export.state.last_updated >= export.state.created_at);
    assert_eq!(export.state.generation, 2);
    assert_eq!(export.state.fitness_history.len(), 2);
    assert_eq!(export.state.fitness_history[1].generation, 2);

    let store = OrganismStateStore::new(tmp.path());
    store.save(&store.load()).expect("first save");
    let first = fs::read(store.path()).expect("read state");
    store.save(&store.load()).expect("second save");
    let second = fs::read(store.path()).expect("read state");
    assert_eq!(first, second);
}

#[test]
fn regression_is_flagged_against_prior_best() {
    let history: Vec<FitnessRecord> = [0.50, 0.65, 0.40]
        .iter()
        .enumerate()
        .map(|(i, overall)| FitnessRecord {
            generation: i as u64 + 1,
            overall: *overall,
            timestamp: String::new(),
            scores: Default::default(),
        })
        .collect();
    assert!(detect_regression(&history));
    assert!(!detect_regression(&history[..2]));
}

#[test]
fn document_drift_is_reported_until_incorporated() {
    let (tmp, repo) = create_workspace_with_git_repo();
    write_file(tmp.path(), "requirements.md", "# Requirements\n\n- R1: analyze\n");
    commit_all(&repo, "docs: add requirements", 30);

    let drift_titles = |report: &selfdev_lib::AnalysisReport| -> Vec<String> {
        report
            .ranked
            .iter()
            .filter(|r| r.finding.tags.iter().any(|t| t == "drift"))
            .map(|r| r.finding.title.clone())
            .collect()
    };

    let first = run_analysis(&AnalysisRequest::new(tmp.path()).advancing()).expect("first run");
    assert_eq!(drift_titles(&first), vec!["Incorporate changes to requirements.md"]);
    assert_eq!(
        export_state(tmp.path()).state.document_checks.get("requirements.md"),
        Some(&(BASE_TIME + 30))
    );

    let second = run_analysis(&AnalysisRequest::new(tmp.path())).expect("second run");
    assert!(drift_titles(&second).is_empty());

    write_file(tmp.path(), "requirements.md", "# Requirements\n\n- R1: analyze\n- R2: rank\n");
    commit_all(&repo, "docs: add R2", 40);
    let third = run_analysis(&AnalysisRequest::new(tmp.path())).expect("third run");
    assert_eq!(drift_titles(&third).len(), 1);
}

#[test]
fn increment_is_done_after_matching_commit() {
    let (tmp, repo) = create_workspace_with_git_repo();
    write_file(
        tmp.path(),
        "requirements/increment_0007-todo-knowledge-schema.md",
        "# Knowledge Schema\n\n**Status:** todo\n\n## Description\nStore knowledge.\n",
    );
    commit_all(&repo, "queue knowledge schema work", 10);

    let pending = verify_increment(tmp.path(), 7).expect("verify");
    assert_eq!(pending.status, IncrementStatus::Todo);
    assert!(pending.matching_commits.is_empty());

    write_file(tmp.path(), "src/knowledge.rs", "pub struct Knowledge;\n");
    commit_all(&repo, "INCREMENT 0007: Knowledge Schema", 20);

    let verified = verify_increment(tmp.path(), 7).expect("verify");
    assert!(verified.completed());
    assert_eq!(verified.matching_commits.len(), 1);
    assert!(tmp
        .path()
        .join("requirements/increment_0007-done-knowledge-schema.md")
        .exists());
    assert!(current_increment_prompt(tmp.path()).expect("prompt").is_none());
}

#[test]
fn revert_plan_lists_matching_commits_newest_first_without_mutation() {
    let (tmp, repo) = create_workspace_with_git_repo();
    write_file(
        tmp.path(),
        "requirements/increment_0003-done-ranking.md",
        "# Ranking\n\n**Status:** done\n\n## Description\nRank findings.\n",
    );
    let first = commit_all(&repo, "INCREMENT 0003: Ranking", 100);
    write_file(tmp.path(), "src/a.rs", "pub fn a() {}\n");
    let second = commit_all(&repo, "increment 0003: follow-up", 200);
    write_file(tmp.path(), "src/b.rs", "pub fn b() {}\n");
    commit_all(&repo, "unrelated", 250);
    write_file(tmp.path(), "src/c.rs", "pub fn c() {}\n");
    let third = commit_all(&repo, "INCREMENT_0003 final touches", 300);

    let plan = revert_increment(tmp.path(), 3).expect("plan revert");
    let hashes: Vec<&str> = plan.instructions.iter().map(|i| i.hash.as_str()).collect();
    assert_eq!(hashes, vec![third.as_str(), second.as_str(), first.as_str()]);
    assert!(plan
        .instructions
        .windows(2)
        .all(|pair| pair[0].timestamp > pair[1].timestamp));

    let again = revert_increment(tmp.path(), 3).expect("plan revert");
    assert_eq!(plan, again);
    let tracker = IncrementTracker::new(tmp.path(), &load_settings(tmp.path()));
    assert_eq!(tracker.find(3).expect("increment").status, IncrementStatus::Done);

    let redo = redo_increment(tmp.path(), 3).expect("redo");
    assert!(redo.requires_verification);
    assert_eq!(redo.revert, plan);
    assert_eq!(redo.prompt.description, "Rank findings.");
}

#[test]
fn done_increment_cannot_restart() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    write_file(
        temp_dir.path(),
        "requirements/increment_0001-done-setup.md",
        "# Setup\n\n**Status:** done\n",
    );
    let tracker = IncrementTracker::new(temp_dir.path(), &load_settings(temp_dir.path()));
    let err = tracker.start(1).expect_err("done -> doing must be rejected");
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            id: 1,
            from: IncrementStatus::Done,
            to: IncrementStatus::Doing
        }
    ));
    assert!(err.to_string().contains("0001"));
}

#[test]
fn saved_settings_change_the_requirement_queue_location() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let saved = save_settings(temp_dir.path(), &json!({ "requirementsDir": "queue" })).expect("save settings");
    assert_eq!(saved["requirementsDir"], json!("queue"));
    assert_eq!(saved["maxFileLines"], json!(300));

    write_file(temp_dir.path(), "queue/increment_0002-todo-next.md", "# Next\n\nDo the next thing.\n");
    let prompt = current_increment_prompt(temp_dir.path())
        .expect("prompt")
        .expect("pending increment");
    assert_eq!(prompt.id, 2);
    assert_eq!(prompt.commit_message, "INCREMENT 0002: Next");
    assert_eq!(prompt.progress.total, 1);
}

#[test]
fn inline_test_modules_alone_count_for_test_perspective() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    write_file(
        temp_dir.path(),
        "src/lib.rs",
        "pub fn add(a: u8, b: u8) -> u8 {\n    a + b\n}\n\n#[cfg(test)]\nmod tests {\n    #[test]\n    fn adds() {\n        assert_eq!(super::add(1, 2), 3);\n    }\n}\n",
    );
    write_file(temp_dir.path(), "src/util.rs", "pub fn noop() {}\n");

    let report = run_analysis(&AnalysisRequest::new(temp_dir.path())).expect("run analysis");
    let score = report.score(PerspectiveId::Test).expect("test score");
    assert!(score > 0.0, "inline tests scored {}", score);
    assert!(!report
        .ranked
        .iter()
        .any(|r| r.perspective == PerspectiveId::Test && r.finding.title == "Create tests"));
}

#[test]
fn reverted_increment_needs_a_fresh_implementation_commit() {
    let (tmp, repo) = create_workspace_with_git_repo();
    write_file(
        tmp.path(),
        "requirements/increment_0007-todo-knowledge.md",
        "# Knowledge\n\n**Status:** todo\n\n## Description\nStore knowledge.\n",
    );
    commit_all(&repo, "queue knowledge work", 10);

    write_file(tmp.path(), "src/knowledge.rs", "pub struct Knowledge;\n");
    let implementation = commit_all(&repo, "INCREMENT 0007: Knowledge", 20);
    let verified = verify_increment(tmp.path(), 7).expect("verify");
    assert_eq!(verified.status, IncrementStatus::Done);
    assert_eq!(verified.matching_commits, vec![implementation]);

    let tracker = IncrementTracker::new(tmp.path(), &load_settings(tmp.path()));
    let reverted = tracker.apply_revert(7).expect("apply revert");
    assert_eq!(reverted.status, IncrementStatus::Todo);
    let revert_commit = commit_all(&repo, "REVERT INCREMENT 0007", 30);

    let plan = revert_increment(tmp.path(), 7).expect("plan revert");
    assert!(plan.instructions.iter().all(|i| i.hash != revert_commit));
    assert!(plan.instructions.is_empty());

    let after_revert = verify_increment(tmp.path(), 7).expect("verify");
    assert_eq!(after_revert.previous, IncrementStatus::Todo);
    assert_eq!(after_revert.status, IncrementStatus::Todo);
    assert!(after_revert.matching_commits.is_empty());
    assert!(tmp
        .path()
        .join("requirements/increment_0007-todo-knowledge.md")
        .exists());

    write_file(tmp.path(), "src/knowledge.rs", "pub struct Knowledge(u32);\n");
    let redo = commit_all(&repo, "INCREMENT 0007: Knowledge (redo)", 40);
    let redone = verify_increment(tmp.path(), 7).expect("verify");
    assert!(redone.completed());
    assert_eq!(redone.matching_commits, vec![redo.clone()]);

    let plan = revert_increment(tmp.path(), 7).expect("plan revert");
    let hashes: Vec<&str> = plan.instructions.iter().map(|i| i.hash.as_str()).collect();
    assert_eq!(hashes, vec![redo.as_str()]);
}

#[test]
fn range_revert_over_finished_queue_starts_at_last_done() {
    let (tmp, repo) = create_workspace_with_git_repo();
    for (id, slug) in [(1, "setup"), (2, "scan"), (3, "rank")] {
        write_file(
            tmp.path(),
            &format!("requirements/increment_{:04}-done-{}.md", id, slug),
            &format!("# {}\n\n**Status:** done\n", slug),
        );
    }
    commit_all(&repo, "queue finished work", 5);
    let mut hashes = Vec::new();
    for id in 1..=3u32 {
        write_file(tmp.path(), &format!("src/part{}.rs", id), "pub fn part() {}\n");
        hashes.push(commit_all(&repo, &format!("INCREMENT {:04}", id), 10 * id as i64));
    }
    assert!(current_increment_prompt(tmp.path()).expect("prompt").is_none());

    let range = revert_increments_from(tmp.path(), 2).expect("plan range");
    let ids: Vec<u32> = range.plans.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![3, 2]);
    assert_eq!((range.from, range.to), (3, 2));
    assert_eq!(range.commit_message, "REVERT INCREMENTS 0003-0002");
    assert_eq!(range.plans[0].instructions[0].hash, hashes[2]);
    assert_eq!(range.plans[1].instructions[0].hash, hashes[1]);

    commit_all(&repo, &range.commit_message, 50);
    assert!(revert_increment(tmp.path(), 3).expect("plan").instructions.is_empty());
    assert!(revert_increment(tmp.path(), 2).expect("plan").instructions.is_empty());
    let untouched = revert_increment(tmp.path(), 1).expect("plan");
    assert_eq!(untouched.instructions.len(), 1);
    assert_eq!(untouched.instructions[0].hash, hashes[0]);
}

#[test]
fn drift_older_than_history_limit_is_still_reported() {
    let (tmp, repo) = create_workspace_with_git_repo();
    save_settings(tmp.path(), &json!({ "historyLimit": 10 })).expect("save settings");
    write_file(tmp.path(), "requirements.md", "# Requirements\n\n- R1: analyze\n");
    commit_all(&repo, "docs: add requirements", 30);
    run_analysis(&AnalysisRequest::new(tmp.path()).advancing()).expect("advancing run");

    write_file(tmp.path(), "requirements.md", "# Requirements\n\n- R1: analyze\n- R2: rank\n");
    commit_all(&repo, "docs: add R2", 40);
    for n in 0..12 {
        write_file(tmp.path(), &format!("src/step{}.rs", n), "pub fn step() {}\n");
        commit_all(&repo, &format!("step {}", n), 50 + n);
    }

    let report = run_analysis(&AnalysisRequest::new(tmp.path())).expect("run analysis");
    let drift: Vec<_> = report
        .ranked
        .iter()
        .filter(|r| r.finding.tags.iter().any(|t| t == "drift"))
        .collect();
    assert_eq!(drift.len(), 1);
    let description = &drift[0].finding.description;
    assert!(description.contains("changed in 1 commit(s)"));
    assert!(description.contains("Latest: docs: add R2"));
    assert!(description.contains("+- R2: rank"));
}
