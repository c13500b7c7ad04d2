//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Engine and CLI code MUST NOT call sleep methods. Waiting for
//! an assistant reply is driven by the poll deadline in a `select!`.
//! **Exceptions**: test code

use architectural_enforcement::{check_directory, check_sleep, workspace_root, SleepPolicy};

#[test]
fn test_no_sleep_in_production_code() {
    let root = workspace_root();
    let policy = SleepPolicy { allow_tests: true };

    let mut violations = Vec::new();
    for dir in ["client/core/src", "client/cli/src"] {
        violations.extend(check_directory(&root.join(dir), |content| {
            check_sleep(content, policy)
        }));
    }

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse polling::sleep_until_deadline in a select! instead.");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

#[test]
fn test_scanned_directories_exist() {
    let root = workspace_root();
    assert!(root.join("client/core/src/polling.rs").exists());
    assert!(root.join("client/cli/src/main.rs").exists());
}
