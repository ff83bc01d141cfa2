//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Production code MUST NOT use blocking I/O.
//! **Required**: `tokio::fs` for the sign-in store and config file, async
//! `reqwest` for the answer endpoint.

use std::fs;

use architectural_enforcement::{assert_clean, scan_production_code, workspace_root, Rule};

#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = scan_production_code(&[
        Rule {
            kind: "Blocking file I/O",
            patterns: &["std::fs::", "use std::fs"],
        },
        Rule {
            kind: "Blocking network I/O",
            patterns: &["std::net::", "use std::net"],
        },
        Rule {
            kind: "Blocking process I/O",
            patterns: &["std::process::Command"],
        },
        Rule {
            kind: "Blocking HTTP client",
            patterns: &["reqwest::blocking"],
        },
        Rule {
            kind: "Blocking stdin",
            patterns: &["std::io::stdin()", "io::stdin().lines()"],
        },
    ]);

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O found in production code!");
        eprintln!("Use tokio::fs, tokio::io::stdin and async reqwest.\n");
    }
    assert_clean(&violations, "blocking I/O");
}

#[test]
fn test_session_engine_has_no_terminal_dependencies() {
    let manifest = fs::read_to_string(workspace_root().join("chat/core/Cargo.toml"))
        .expect("chat/core/Cargo.toml should be readable");

    let dependencies = manifest
        .split("[dev-dependencies]")
        .next()
        .unwrap_or_default();

    for ui_crate in ["crossterm", "ratatui", "termion"] {
        assert!(
            !dependencies.contains(ui_crate),
            "chat-core must stay headless but depends on {ui_crate}"
        );
    }
}
