//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Engine and CLI code MUST NOT block the runtime.
//! **Required**: Use `tokio::fs` and async `reqwest`, not `std::fs`,
//! `std::net` or `reqwest::blocking`
//! **Exceptions**: test code, and plain `fn`s outside the storage and
//! gateway modules (config loading before the first await)

use architectural_enforcement::{
    check_blocking_io, check_directory, workspace_root, BlockingIoPolicy,
};

/// Modules only ever reached from async code
const ASYNC_ONLY: [&str; 2] = ["client/core/src/storage", "client/core/src/gateway"];

#[test]
fn test_no_blocking_io_in_production_code() {
    let root = workspace_root();
    let startup = BlockingIoPolicy {
        allow_sync_fns: true,
    };

    let mut violations = Vec::new();
    for dir in ["client/core/src", "client/cli/src"] {
        violations.extend(check_directory(&root.join(dir), |content| {
            check_blocking_io(content, startup)
        }));
    }
    for dir in ASYNC_ONLY {
        violations.extend(check_directory(&root.join(dir), |content| {
            check_blocking_io(content, BlockingIoPolicy::default())
        }));
    }
    violations.sort();
    violations.dedup();

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse tokio::fs::read_to_string().await, tokio::fs::write().await");
        eprintln!("and the async reqwest client instead.");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

#[test]
fn test_async_only_directories_exist() {
    let root = workspace_root();
    for dir in ASYNC_ONLY {
        assert!(root.join(dir).is_dir(), "{dir} is missing");
    }
}
