//! Architectural Enforcement
//!
//! Source scanners used by the integration tests in `tests/`:
//! - No sleeping in production code (the reveal is paced by an interval)
//! - No blocking I/O in production code
//! - The session engine stays free of terminal dependencies
//!
//! Production code is everything in a source file before its first
//! `#[cfg(test)]`.

use std::fs;
use std::path::{Path, PathBuf};

/// Source directories holding production code, relative to the workspace root
pub const PRODUCTION_DIRS: [&str; 2] = ["chat/core/src", "cli/src"];

/// A forbidden pattern found in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the pattern
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// What was found
    pub kind: &'static str,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.kind,
            self.text
        )
    }
}

/// A rule: a label and the substrings that break it
pub struct Rule {
    /// Shown in violation reports
    pub kind: &'static str,
    /// Any of these in a code line is a violation
    pub patterns: &'static [&'static str],
}

/// The workspace root (two levels above this crate)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Scan every production directory for the given rules
pub fn scan_production_code(rules: &[Rule]) -> Vec<Violation> {
    let root = workspace_root();
    let mut violations = Vec::new();
    for dir in PRODUCTION_DIRS {
        check_directory(&root.join(dir), rules, &mut violations);
    }
    violations
}

fn check_directory(dir: &Path, rules: &[Rule], violations: &mut Vec<Violation>) {
    if !dir.exists() {
        return;
    }

    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };
            violations.extend(check_source(entry.path(), &content, rules));
        }
    }
}

/// Check one file's production code against the rules
pub fn check_source(path: &Path, content: &str, rules: &[Rule]) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }

        // Skip comments
        let code_part = line.split("//").next().unwrap_or(line);

        for rule in rules {
            if rule.patterns.iter().any(|p| code_part.contains(p)) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    kind: rule.kind,
                    text: line.trim().to_string(),
                });
            }
        }
    }

    violations
}

/// Panic with a readable report if there are violations
pub fn assert_clean(violations: &[Violation], what: &str) {
    if violations.is_empty() {
        return;
    }
    for violation in violations {
        eprintln!("  {violation}");
    }
    panic!(
        "\nFound {} {what} violation(s) in production code.",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLEEP: Rule = Rule {
        kind: "sleep",
        patterns: &["::sleep(", ".sleep("],
    };

    #[test]
    fn test_detects_production_sleep() {
        let source = "async fn pace() {\n    tokio::time::sleep(d).await;\n}\n";
        let found = check_source(Path::new("pace.rs"), source, &[SLEEP]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 2);
    }

    #[test]
    fn test_ignores_test_module_and_comments() {
        let source = "\
// thread::sleep( is not used here
fn tick() {}

#[cfg(test)]
mod tests {
    async fn wait() { tokio::time::sleep(d).await; }
}
";
        assert!(check_source(Path::new("tick.rs"), source, &[SLEEP]).is_empty());
    }

    #[test]
    fn test_workspace_root_has_manifest() {
        assert!(workspace_root().join("Cargo.toml").exists());
    }
}
