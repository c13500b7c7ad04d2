//! Architectural Enforcement
//!
//! Source scanners backing the integration tests in `tests/`:
//! - No sleep() calls in engine or CLI code; waiting for a reply is driven
//!   by the poll deadline, never by sleeping in a loop
//! - No blocking I/O inside async code; storage and uploads go through
//!   `tokio::fs`, HTTP through async `reqwest`
//!
//! These checks are designed to catch violations early in the development cycle.

use std::fs;
use std::path::{Path, PathBuf};

/// Workspace root, two levels above this crate
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Scan every `.rs` file under `dir` with `check`, returning
/// `path:line - finding` entries
pub fn check_directory(dir: &Path, check: impl Fn(&str) -> Vec<(usize, String)>) -> Vec<String> {
    let mut violations = Vec::new();
    if !dir.exists() {
        return violations;
    }

    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            if let Ok(content) = fs::read_to_string(entry.path()) {
                for (line, finding) in check(&content) {
                    violations.push(format!("{}:{} - {}", entry.path().display(), line, finding));
                }
            }
        }
    }
    violations
}

// ============================================
// Sleep
// ============================================

/// Which sleeps a directory may contain
#[derive(Clone, Copy, Debug, Default)]
pub struct SleepPolicy {
    /// Sleeps inside `#[test]`/`#[tokio::test]` functions
    pub allow_tests: bool,
}

/// Sleep calls in `content` not covered by `policy`, as (line number, code)
pub fn check_sleep(content: &str, policy: SleepPolicy) -> Vec<(usize, String)> {
    let lines: Vec<&str> = content.lines().collect();
    let mut found = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let code_part = code_part(line);

        if !(code_part.contains("::sleep(") || code_part.contains(".sleep(")) {
            continue;
        }
        if policy.allow_tests && is_in_test_function(&lines, idx) {
            continue;
        }
        found.push((idx + 1, line.trim().to_string()));
    }
    found
}

// ============================================
// Blocking I/O
// ============================================

/// Where blocking I/O may appear
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockingIoPolicy {
    /// Blocking calls inside plain `fn`s, such as config loading at startup
    pub allow_sync_fns: bool,
}

/// Blocking I/O calls in `content` not covered by `policy`, as
/// (line number, description)
///
/// Test functions are always skipped.
pub fn check_blocking_io(content: &str, policy: BlockingIoPolicy) -> Vec<(usize, String)> {
    let lines: Vec<&str> = content.lines().collect();
    let mut found = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let code_part = code_part(line);

        let Some(kind) = blocking_io_kind(code_part) else {
            continue;
        };
        if is_in_test_function(&lines, idx) {
            continue;
        }
        if policy.allow_sync_fns && enclosing_fn_is_async(&lines, idx) == Some(false) {
            continue;
        }
        found.push((idx + 1, format!("{kind}: {}", line.trim())));
    }
    found
}

fn blocking_io_kind(code: &str) -> Option<&'static str> {
    if code.contains("std::fs::") || code.contains("use std::fs") {
        Some("Blocking file I/O")
    } else if code.contains("std::net::") || code.contains("use std::net") {
        Some("Blocking network I/O")
    } else if code.contains("std::process::Command") {
        Some("Blocking process I/O")
    } else if code.contains("reqwest::blocking") {
        Some("Blocking HTTP client")
    } else if code.contains("std::io::stdin()") || code.contains("std::io::stdout()") {
        Some("Blocking stdin/stdout")
    } else {
        None
    }
}

// ============================================
// Helpers
// ============================================

/// The line without its trailing comment
fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Check if line is inside a test function
fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    // Scan backwards for #[test] or #[tokio::test]
    for line in lines[..current_idx].iter().rev() {
        let line = line.trim();

        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }

        if (line.starts_with("fn ") || line.starts_with("async fn ")) && !line.contains("test") {
            return false;
        }

        // Stop at module boundaries
        if line.starts_with("mod ") || line.starts_with("impl ") {
            return false;
        }
    }
    false
}

/// Whether the nearest enclosing function is `async`; `None` outside any function
fn enclosing_fn_is_async(lines: &[&str], current_idx: usize) -> Option<bool> {
    for line in lines[..current_idx].iter().rev() {
        let line = strip_visibility(line.trim());

        if line.starts_with("async fn ") {
            return Some(true);
        }
        if line.starts_with("fn ") {
            return Some(false);
        }

        // Stop at module boundaries
        if line.starts_with("mod ") || (line.starts_with("impl") && line.contains('{')) {
            return None;
        }
    }
    None
}

fn strip_visibility(line: &str) -> &str {
    ["pub(crate) ", "pub(super) ", "pub "]
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRICT: SleepPolicy = SleepPolicy { allow_tests: false };
    const STARTUP: BlockingIoPolicy = BlockingIoPolicy { allow_sync_fns: true };

    #[test]
    fn test_sleep_in_poll_loop_is_flagged() {
        let code = "\
async fn wait_for_reply(session: &mut Session) {
    loop {
        tokio::time::sleep(Duration::from_secs(3)).await;
        session.poll_for_response().await;
    }
}";
        let found = check_sleep(code, STRICT);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 3);
    }

    #[test]
    fn test_deadline_wait_and_comments_pass() {
        let code = "\
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    // never std::thread::sleep(...) here
    tokio::time::sleep_until(deadline).await;
}";
        assert!(check_sleep(code, STRICT).is_empty());
    }

    #[test]
    fn test_sleep_in_test_function_is_allowed() {
        let code = "\
#[tokio::test]
async fn test_delay() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}";
        assert!(check_sleep(code, SleepPolicy { allow_tests: true }).is_empty());
        assert_eq!(check_sleep(code, STRICT).len(), 1);
    }

    #[test]
    fn test_blocking_write_in_async_fn_is_flagged() {
        let code = "\
impl FileStore {
    pub async fn persist(&self, json: String) -> Result<(), StorageError> {
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}";
        let found = check_blocking_io(code, STARTUP);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 3);
        assert!(found[0].1.starts_with("Blocking file I/O"));
    }

    #[test]
    fn test_blocking_io_in_sync_fn_is_allowed() {
        let code = "\
pub fn load_config(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content)
}";
        assert!(check_blocking_io(code, STARTUP).is_empty());
    }

    #[test]
    fn test_sync_helper_on_async_path_is_flagged_when_strict() {
        let code = "\
impl FileStore {
    fn persist(&self) -> Result<(), StorageError> {
        std::fs::write(&self.path, self.to_json()?)?;
        Ok(())
    }
}";
        assert!(check_blocking_io(code, STARTUP).is_empty());
        assert_eq!(check_blocking_io(code, BlockingIoPolicy::default()).len(), 1);
    }

    #[test]
    fn test_blocking_io_in_test_and_comments_is_allowed() {
        let code = "\
// std::fs::write is never used here
async fn open() -> Store {
    tokio::fs::read_to_string(path).await
}

#[tokio::test]
async fn test_reads_fixture() {
    let raw = std::fs::read_to_string(\"fixture.json\").unwrap();
}";
        assert!(check_blocking_io(code, STARTUP).is_empty());
    }

    #[test]
    fn test_blocking_imports_and_clients_are_flagged() {
        let code = "\
use std::net::TcpStream;

async fn fetch() {
    let body = reqwest::blocking::get(url);
}";
        let lines: Vec<usize> = check_blocking_io(code, STARTUP)
            .into_iter()
            .map(|(line, _)| line)
            .collect();
        assert_eq!(lines, vec![1, 4]);
    }
}
