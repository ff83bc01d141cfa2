//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the session engine and the terminal MUST
//! NOT sleep. The reveal is paced by `tokio::time::interval` and request
//! limits use `tokio::time::timeout`.
//! **Exceptions**: test code

use architectural_enforcement::{assert_clean, scan_production_code, Rule};

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan_production_code(&[Rule {
        kind: "Sleep",
        patterns: &["::sleep(", ".sleep(", "sleep_until("],
    }]);

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code!");
        eprintln!("Use tokio::time::interval() for pacing and tokio::time::timeout() for limits.\n");
    }
    assert_clean(&violations, "sleep");
}
