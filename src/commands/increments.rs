use crate::commands::fsio::write_atomic;
use crate::commands::git::load_history;
use crate::commands::settings::{load_settings, EngineSettings};
use crate::commands::state::OrganismStateStore;
use crate::error::{EngineError, Result};
use crate::models::history::CommitRecord;
use crate::models::increment::{
    Increment, IncrementPrompt, IncrementStatus, PrincipleRef, Progress, RedoPlan,
    ResolvedPrinciple, RevertPlan, RevertRangePlan, UndoInstruction, Verification,
};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const STATUS_FIELD: &str = "**Status:**";
const REQUIREMENT_FIELD: &str = "**Requirement ID:**";

/// Lines that close a free-form description when no `## Description`
/// section exists.
const SECTION_MARKERS: [&str; 7] = [
    "**Acceptance Criteria",
    "## Acceptance Criteria",
    "**Related Principles",
    "## Related Principles",
    "**Current Inventory",
    "**Screenshot Assets",
    "**Platform Reference",
];

/// Lifecycle of the requirement queue under `requirementsDir`.
///
/// Every record is a markdown file `increment_<NNNN>[-_]<status>[-_]<slug>.md`.
/// The `**Status:**` field inside the file is authoritative; the filename is
/// rewritten to mirror it on every transition.
#[derive(Debug, Clone)]
pub struct IncrementTracker {
    requirements_dir: PathBuf,
    principles_dir: PathBuf,
}

struct FileName {
    id: u32,
    digits: String,
    first_sep: char,
    second_sep: char,
    status: IncrementStatus,
    slug: String,
}

impl IncrementTracker {
    pub fn new(root: &Path, settings: &EngineSettings) -> Self {
        Self {
            requirements_dir: root.join(&settings.requirements_dir),
            principles_dir: root.join(&settings.principles_dir),
        }
    }

    pub fn requirements_dir(&self) -> &Path {
        &self.requirements_dir
    }

    /// All increments sorted by id. A missing queue directory is an empty
    /// queue; two files carrying the same id are rejected.
    pub fn load_queue(&self) -> Result<Vec<Increment>> {
        let entries = match fs::read_dir(&self.requirements_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("no requirement queue at {}", self.requirements_dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(EngineError::io(&self.requirements_dir, e)),
        };

        let mut queue: BTreeMap<u32, Increment> = BTreeMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(file_name) = parse_file_name(&name) else {
                continue;
            };
            let content = fs::read_to_string(&path).map_err(|e| EngineError::io(&path, e))?;
            let increment = parse_increment(&file_name, &content, path);
            if queue.insert(increment.id, increment).is_some() {
                return Err(EngineError::DuplicateIncrement(file_name.id));
            }
        }
        Ok(queue.into_values().collect())
    }

    pub fn find(&self, id: u32) -> Result<Increment> {
        self.load_queue()?
            .into_iter()
            .find(|inc| inc.id == id)
            .ok_or(EngineError::UnknownIncrement(id))
    }

    /// Lowest-id increment that is not done.
    pub fn current_increment(&self) -> Result<Option<Increment>> {
        Ok(self
            .load_queue()?
            .into_iter()
            .find(|inc| inc.status != IncrementStatus::Done))
    }

    pub fn progress(&self) -> Result<Progress> {
        let queue = self.load_queue()?;
        Ok(progress_of(&queue))
    }

    /// `todo -> doing`.
    pub fn start(&self, id: u32) -> Result<Increment> {
        let increment = self.find(id)?;
        self.advance(increment, IncrementStatus::Doing)
    }

    /// Mark `id` done when at least one commit message names it and that
    /// commit is newer than the latest revert of `id`. Without such a commit
    /// the status is left untouched; a done increment is returned as is.
    ///
    /// `todo` walks through `doing` to `done`; every step is checked before
    /// the file is rewritten once.
    pub fn verify_completion(&self, id: u32, commits: &[CommitRecord]) -> Result<Verification> {
        let mut increment = self.find(id)?;
        let previous = increment.status;
        let matching: Vec<String> = live_commits(id, commits)
            .iter()
            .map(|c| c.hash.clone())
            .collect();

        if previous != IncrementStatus::Done && !matching.is_empty() {
            let steps: &[IncrementStatus] = match previous {
                IncrementStatus::Todo => &[IncrementStatus::Doing, IncrementStatus::Done],
                _ => &[IncrementStatus::Done],
            };
            let mut from = previous;
            for &to in steps {
                if !from.can_advance_to(to) {
                    return Err(EngineError::InvalidTransition { id, from, to });
                }
                from = to;
            }
            increment = self.persist(increment, IncrementStatus::Done)?;
        } else if matching.is_empty() {
            log::info!("increment {}: no commit references it yet", increment.label());
        }

        Ok(Verification {
            id,
            matching_commits: matching,
            previous,
            status: increment.status,
        })
    }

    /// Out-of-band `done -> todo`. Applying the undo instructions to the
    /// repository is left to the caller.
    pub fn apply_revert(&self, id: u32) -> Result<Increment> {
        let increment = self.find(id)?;
        if increment.status != IncrementStatus::Done {
            return Err(EngineError::InvalidTransition {
                id,
                from: increment.status,
                to: IncrementStatus::Todo,
            });
        }
        self.persist(increment, IncrementStatus::Todo)
    }

    /// Undo steps for every commit naming `id` since its latest revert,
    /// newest first. Works for ids missing from the queue so history can
    /// still be unwound.
    pub fn plan_revert(&self, id: u32, commits: &[CommitRecord]) -> Result<RevertPlan> {
        let known = self.load_queue()?.into_iter().find(|inc| inc.id == id);
        Ok(revert_plan(id, known.as_ref(), commits))
    }

    /// Plans for every increment from `id` down to the current one (or the
    /// last done one when the queue is finished), highest id first.
    pub fn plan_revert_from(&self, id: u32, commits: &[CommitRecord]) -> Result<RevertRangePlan> {
        let queue = self.load_queue()?;
        let anchor = queue
            .iter()
            .find(|inc| inc.status != IncrementStatus::Done)
            .or_else(|| queue.iter().rev().find(|inc| inc.status == IncrementStatus::Done))
            .map(|inc| inc.id)
            .unwrap_or(id);

        let (low, high) = if anchor <= id { (anchor, id) } else { (id, anchor) };
        let plans = (low..=high)
            .rev()
            .map(|n| revert_plan(n, queue.iter().find(|inc| inc.id == n), commits))
            .collect();

        Ok(RevertRangePlan {
            from: high,
            to: low,
            plans,
            commit_message: format!("REVERT INCREMENTS {:04}-{:04}", high, low),
        })
    }

    /// Revert plan plus the reconstructed prompt; the re-implementation
    /// still has to pass `verify_completion`.
    pub fn redo(&self, id: u32, commits: &[CommitRecord]) -> Result<RedoPlan> {
        let prompt = self.todo_prompt(id)?;
        let revert = self.plan_revert(id, commits)?;
        Ok(RedoPlan {
            commit_message: format!("{} (redo)", prompt.commit_message),
            revert,
            prompt,
            requires_verification: true,
        })
    }

    pub fn todo_prompt(&self, id: u32) -> Result<IncrementPrompt> {
        let queue = self.load_queue()?;
        let increment = queue
            .iter()
            .find(|inc| inc.id == id)
            .ok_or(EngineError::UnknownIncrement(id))?;
        let needs_inspection = increment.description.trim().is_empty();
        if needs_inspection {
            log::warn!(
                "increment {}: no description could be extracted from {}",
                increment.label(),
                increment.path.display()
            );
        }

        Ok(IncrementPrompt {
            id,
            title: increment.title.clone(),
            requirement: increment.requirement.clone(),
            status: increment.status,
            description: increment.description.clone(),
            acceptance_criteria: increment.acceptance_criteria.clone(),
            principles: self.resolve_principles(&increment.principles),
            commit_message: increment.commit_message(),
            needs_inspection,
            progress: progress_of(&queue),
        })
    }

    /// Load `<principlesDir>/<CODE>.md` for each distinct code. Missing
    /// principle files are skipped.
    pub fn resolve_principles(&self, refs: &[PrincipleRef]) -> Vec<ResolvedPrinciple> {
        let mut seen = HashSet::new();
        refs.iter()
            .filter(|r| seen.insert(r.code.clone()))
            .filter_map(|r| {
                let path = self.principles_dir.join(format!("{}.md", r.code));
                let content = fs::read_to_string(&path).ok()?;
                let title = content
                    .lines()
                    .find_map(|line| line.strip_prefix("# "))
                    .map(|t| t.trim().to_string())
                    .unwrap_or_else(|| r.code.clone());
                Some(ResolvedPrinciple {
                    code: r.code.clone(),
                    title,
                    content: content.trim().to_string(),
                })
            })
            .collect()
    }

    fn advance(&self, increment: Increment, next: IncrementStatus) -> Result<Increment> {
        if !increment.status.can_advance_to(next) {
            return Err(EngineError::InvalidTransition {
                id: increment.id,
                from: increment.status,
                to: next,
            });
        }
        self.persist(increment, next)
    }

    /// Rewrite the status field, then rename the file so its name mirrors
    /// the new status.
    fn persist(&self, mut increment: Increment, next: IncrementStatus) -> Result<Increment> {
        let content =
            fs::read_to_string(&increment.path).map_err(|e| EngineError::io(&increment.path, e))?;
        write_atomic(&increment.path, with_status(&content, next).as_bytes())?;

        let name = increment
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if let Some(parsed) = parse_file_name(&name) {
            let renamed = increment.path.with_file_name(format!(
                "increment_{}{}{}{}{}.md",
                parsed.digits,
                parsed.first_sep,
                next.as_str(),
                parsed.second_sep,
                parsed.slug
            ));
            if renamed != increment.path {
                fs::rename(&increment.path, &renamed).map_err(|e| EngineError::io(&renamed, e))?;
                increment.path = renamed;
            }
        }

        log::info!("increment {}: {} -> {}", increment.label(), increment.status, next);
        increment.status = next;
        Ok(increment)
    }
}

fn progress_of(queue: &[Increment]) -> Progress {
    Progress {
        done: queue
            .iter()
            .filter(|inc| inc.status == IncrementStatus::Done)
            .count(),
        total: queue.len(),
    }
}

fn revert_plan(id: u32, increment: Option<&Increment>, commits: &[CommitRecord]) -> RevertPlan {
    let mut matching = live_commits(id, commits);
    matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    RevertPlan {
        id,
        title: increment.map(|inc| inc.title.clone()),
        status: increment.map(|inc| inc.status),
        instructions: matching.into_iter().map(UndoInstruction::for_commit).collect(),
        commit_message: format!("REVERT INCREMENT {:04}", id),
    }
}

/// Commits whose message carries `INCREMENT <NNNN>` or `increment_NNNN`,
/// in any case and with any zero padding. `REVERT INCREMENT...` commits
/// are never implementation commits.
pub fn matching_commits(id: u32, commits: &[CommitRecord]) -> Vec<&CommitRecord> {
    let Ok(token) = Regex::new(&format!(r"(?i)\bincrement[\s_-]*0*{}\b", id)) else {
        return Vec::new();
    };
    commits
        .iter()
        .filter(|c| !is_revert_message(&c.message) && token.is_match(&c.message))
        .collect()
}

/// Matching commits newer than the latest revert covering `id`.
pub fn live_commits(id: u32, commits: &[CommitRecord]) -> Vec<&CommitRecord> {
    let reverted_at = latest_revert(id, commits);
    matching_commits(id, commits)
        .into_iter()
        .filter(|c| reverted_at.map_or(true, |at| c.timestamp > at))
        .collect()
}

/// Time of the newest `REVERT INCREMENT <id>` or `REVERT INCREMENTS
/// <high>-<low>` commit covering `id`.
pub fn latest_revert(id: u32, commits: &[CommitRecord]) -> Option<i64> {
    commits
        .iter()
        .filter(|c| reverted_range(&c.message).is_some_and(|(low, high)| (low..=high).contains(&id)))
        .map(|c| c.timestamp)
        .max()
}

fn is_revert_message(message: &str) -> bool {
    Regex::new(r"(?i)^\s*revert\s+increments?\b")
        .map(|re| re.is_match(message))
        .unwrap_or(false)
}

fn reverted_range(message: &str) -> Option<(u32, u32)> {
    let re = Regex::new(r"(?i)^\s*revert\s+increments?[\s_-]*(\d+)(?:\s*-\s*(\d+))?").ok()?;
    let caps = re.captures(message)?;
    let first: u32 = caps[1].parse().ok()?;
    let second: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => first,
    };
    Some((first.min(second), first.max(second)))
}

fn parse_file_name(name: &str) -> Option<FileName> {
    let stem = name.strip_suffix(".md")?;
    let rest = stem.strip_prefix("increment_")?;

    let digits_end = rest.find(|c: char| !c.is_ascii_digit())?;
    let (digits, rest) = rest.split_at(digits_end);
    let id = digits.parse().ok()?;

    let mut chars = rest.chars();
    let first_sep = chars.next().filter(|c| *c == '-' || *c == '_')?;
    let rest = chars.as_str();
    let sep_at = rest.find(['-', '_'])?;
    let status = IncrementStatus::parse(&rest[..sep_at])?;
    let second_sep = rest[sep_at..].chars().next()?;
    let slug = &rest[sep_at + 1..];
    if slug.is_empty() {
        return None;
    }

    Some(FileName {
        id,
        digits: digits.to_string(),
        first_sep,
        second_sep,
        status,
        slug: slug.to_string(),
    })
}

fn parse_increment(file_name: &FileName, content: &str, path: PathBuf) -> Increment {
    let status = field_value(content, STATUS_FIELD)
        .and_then(|value| IncrementStatus::parse(&value))
        .unwrap_or(file_name.status);

    let title = content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .or_else(|| content.lines().find_map(any_heading))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| file_name.slug.clone());

    let requirement = field_value(content, REQUIREMENT_FIELD)
        .and_then(|v| v.split_whitespace().next().map(str::to_string))
        .or_else(|| requirement_prefix(&title))
        .unwrap_or_default();

    let description = heading_section(content, "Description")
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| body_description(content));

    let criteria_block = heading_section(content, "Acceptance Criteria")
        .or_else(|| bold_section(content, "**Acceptance Criteria"));
    let acceptance_criteria = criteria_block
        .map(|block| block.lines().filter_map(clean_criterion).collect())
        .unwrap_or_default();

    let principles = heading_section(content, "Related Principles")
        .or_else(|| bold_section(content, "**Related Principles"))
        .map(|block| principle_links(&block))
        .unwrap_or_default();

    Increment {
        id: file_name.id,
        status,
        title,
        slug: file_name.slug.clone(),
        requirement,
        description,
        acceptance_criteria,
        principles,
        path,
    }
}

fn any_heading(line: &str) -> Option<&str> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

fn field_value(content: &str, field: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.trim()
            .strip_prefix(field)
            .map(|value| value.trim().to_string())
    })
}

/// `R1: Title` or `OA-7 - Title` style prefixes.
fn requirement_prefix(title: &str) -> Option<String> {
    let re = Regex::new(r"^([A-Z][A-Za-z0-9_]*(?:-\d+)?)\s*[:\x{2014}\x{2013}]\s").ok()?;
    re.captures(title).map(|c| c[1].to_string())
}

/// Lines under `## <name>` up to the next level-two heading.
fn heading_section(content: &str, name: &str) -> Option<String> {
    let header = format!("## {}", name);
    let mut lines = content.lines();
    lines.find(|line| line.trim_end() == header)?;
    let body: Vec<&str> = lines.take_while(|line| !line.starts_with("## ")).collect();
    Some(body.join("\n").trim().to_string())
}

/// Lines after a bold `**Name...**` header up to the next bold header,
/// heading or horizontal rule.
fn bold_section(content: &str, prefix: &str) -> Option<String> {
    let mut lines = content.lines();
    lines.find(|line| {
        let line = line.trim();
        line.starts_with(prefix) && (line.ends_with("**") || line.ends_with("**:"))
    })?;
    let body: Vec<&str> = lines
        .take_while(|line| {
            let after_bold = line.strip_prefix("**").and_then(|rest| rest.chars().next());
            !(after_bold.is_some_and(|c| c.is_ascii_uppercase())
                || any_heading(line).is_some()
                || line.starts_with("---"))
        })
        .collect();
    Some(body.join("\n").trim().to_string())
}

/// Body text between the first heading and the first known section, with
/// metadata fields left out.
fn body_description(content: &str) -> String {
    let mut lines = content.lines();
    if !lines.any(|line| any_heading(line).is_some()) {
        return String::new();
    }
    let body: Vec<&str> = lines
        .take_while(|line| {
            let trimmed = line.trim_end();
            trimmed != "---" && !SECTION_MARKERS.iter().any(|m| trimmed.starts_with(m))
        })
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with(STATUS_FIELD) && !trimmed.starts_with(REQUIREMENT_FIELD)
        })
        .collect();
    body.join("\n").trim().to_string()
}

fn clean_criterion(line: &str) -> Option<String> {
    let mut text = line.trim();
    for checkbox in ["- [ ]", "- [x]", "- [X]"] {
        if let Some(rest) = text.strip_prefix(checkbox) {
            text = rest;
            break;
        }
    }
    text = text.trim_start();
    if let Some(rest) = text.strip_prefix('-') {
        text = rest.trim_start();
    }
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = text[digits..].strip_prefix('.') {
            text = rest.trim_start();
        }
    }
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// `[CODE - title](path)` links; the code is the text before the first
/// dash separator.
fn principle_links(block: &str) -> Vec<PrincipleRef> {
    let Ok(link) = Regex::new(r"\[([^\]]+)\]\(([^)]+)\)") else {
        return Vec::new();
    };
    link.captures_iter(block)
        .filter_map(|c| {
            let code = c[1]
                .split(['\u{2014}', '\u{2013}'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            (!code.is_empty()).then(|| PrincipleRef {
                code,
                path: c[2].to_string(),
            })
        })
        .collect()
}

/// Replace the status field, or add one under the first heading. CRLF
/// files stay CRLF.
fn with_status(content: &str, status: IncrementStatus) -> String {
    let eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let field = format!("{} {}", STATUS_FIELD, status);
    let mut replaced = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if !replaced && line.trim_start().starts_with(STATUS_FIELD) {
                replaced = true;
                field.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !replaced {
        let at = lines
            .iter()
            .position(|line| any_heading(line).is_some())
            .map(|i| i + 1)
            .unwrap_or(0);
        lines.insert(at, String::new());
        lines.insert(at + 1, field);
        if at + 2 < lines.len() && !lines[at + 2].trim().is_empty() {
            lines.insert(at + 2, String::new());
        }
    }

    let mut out = lines.join(eol);
    if content.is_empty() || content.ends_with('\n') {
        out.push_str(eol);
    }
    out
}

fn tracker_with_history(root: &Path) -> (IncrementTracker, Vec<CommitRecord>) {
    let settings = load_settings(root);
    let state = OrganismStateStore::new(root).load();
    let history = load_history(root, &settings, &state, None);
    (IncrementTracker::new(root, &settings), history.commits)
}

/// Prompt for the lowest unfinished increment, or `None` when the queue is
/// empty or finished.
pub fn current_increment_prompt(root: &Path) -> Result<Option<IncrementPrompt>> {
    let tracker = IncrementTracker::new(root, &load_settings(root));
    match tracker.current_increment()? {
        Some(increment) => tracker.todo_prompt(increment.id).map(Some),
        None => Ok(None),
    }
}

pub fn verify_increment(root: &Path, id: u32) -> Result<Verification> {
    let (tracker, commits) = tracker_with_history(root);
    tracker.verify_completion(id, &commits)
}

pub fn revert_increment(root: &Path, id: u32) -> Result<RevertPlan> {
    let (tracker, commits) = tracker_with_history(root);
    tracker.plan_revert(id, &commits)
}

pub fn revert_increments_from(root: &Path, id: u32) -> Result<RevertRangePlan> {
    let (tracker, commits) = tracker_with_history(root);
    tracker.plan_revert_from(id, &commits)
}

pub fn redo_increment(root: &Path, id: u32) -> Result<RedoPlan> {
    let (tracker, commits) = tracker_with_history(root);
    tracker.redo(id, &commits)
}
