//! Cost and test oracle contracts plus subprocess-backed adapters.
//!
//! The engine validates every rewrite against two external oracles:
//! a resource-cost oracle (`measure(file) -> cost | None`) and a test-suite
//! oracle (`run(project_dir) -> passed`). Both are invoked as blocking
//! subprocesses with an OS-level wait timeout; a timeout is treated
//! identically to a failed result.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, warn};
use wait_timeout::ChildExt;

// ============================================================================
// Contracts
// ============================================================================

/// External measurement of a program's runtime resource cost.
///
/// `None` means measurement failure and aborts the transaction.
pub trait CostOracle: Send + Sync {
    fn measure(&self, file: &Path) -> Option<f64>;
}

/// External process asserting behavioral correctness after a rewrite.
pub trait TestOracle: Send + Sync {
    fn run(&self, project_dir: &Path) -> bool;
}

// ============================================================================
// Subprocess Runner
// ============================================================================

struct CommandOutcome {
    success: bool,
    stdout: String,
}

/// Spawn a command and wait for it with a timeout.
///
/// On timeout the child is killed and reaped, and `None` is returned.
fn run_with_timeout(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Option<CommandOutcome> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(program, error = %e, "oracle command failed to spawn");
            return None;
        }
    };

    match child.wait_timeout(timeout) {
        Ok(Some(status)) => {
            let stdout = child
                .stdout
                .take()
                .map(|mut s| {
                    let mut buf = Vec::new();
                    s.read_to_end(&mut buf).ok();
                    String::from_utf8_lossy(&buf).into_owned()
                })
                .unwrap_or_default();
            Some(CommandOutcome {
                success: status.success(),
                stdout,
            })
        }
        Ok(None) => {
            // Timeout: kill and reap the child.
            let _ = child.kill();
            let _ = child.wait();
            warn!(program, ?timeout, "oracle command timed out");
            None
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            warn!(program, error = %e, "oracle command wait failed");
            None
        }
    }
}

// ============================================================================
// Command Adapters
// ============================================================================

/// Cost oracle backed by an external measurement command.
///
/// The target file path is appended as the final argument. The measured cost
/// is read from the last non-empty line of stdout.
#[derive(Debug, Clone)]
pub struct CommandCostOracle {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandCostOracle {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        CommandCostOracle {
            program: program.into(),
            args,
            timeout,
        }
    }
}

impl CostOracle for CommandCostOracle {
    fn measure(&self, file: &Path) -> Option<f64> {
        let mut args = self.args.clone();
        args.push(file.to_string_lossy().into_owned());

        let outcome = run_with_timeout(&self.program, &args, None, self.timeout)?;
        if !outcome.success {
            warn!(file = %file.display(), "cost measurement exited nonzero");
            return None;
        }

        let cost = outcome
            .stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())?
            .trim()
            .parse::<f64>()
            .ok()?;
        debug!(file = %file.display(), cost, "cost measured");
        Some(cost)
    }
}

/// Test oracle backed by an external command run in the project directory.
///
/// Exit code zero means the suite passed; nonzero, spawn failure, or timeout
/// all mean failure.
#[derive(Debug, Clone)]
pub struct CommandTestOracle {
    pub command: Vec<String>,
    pub timeout: Duration,
}

impl CommandTestOracle {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        CommandTestOracle { command, timeout }
    }
}

impl TestOracle for CommandTestOracle {
    fn run(&self, project_dir: &Path) -> bool {
        let Some((program, args)) = self.command.split_first() else {
            warn!("empty test command");
            return false;
        };
        match run_with_timeout(program, args, Some(project_dir), self.timeout) {
            Some(outcome) => outcome.success,
            None => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn cost_oracle_parses_last_stdout_line() {
        let oracle = CommandCostOracle::new(
            "sh",
            vec!["-c".to_string(), "echo measuring; echo 42.5".to_string()],
            Duration::from_secs(5),
        );
        // The file path lands in the sh positional args and is ignored.
        assert_eq!(oracle.measure(&PathBuf::from("/dev/null")), Some(42.5));
    }

    #[test]
    fn cost_oracle_nonzero_exit_is_none() {
        let oracle = CommandCostOracle::new(
            "sh",
            vec!["-c".to_string(), "echo 10; exit 3".to_string()],
            Duration::from_secs(5),
        );
        assert_eq!(oracle.measure(&PathBuf::from("/dev/null")), None);
    }

    #[test]
    fn cost_oracle_unparseable_output_is_none() {
        let oracle = CommandCostOracle::new(
            "sh",
            vec!["-c".to_string(), "echo not-a-number".to_string()],
            Duration::from_secs(5),
        );
        assert_eq!(oracle.measure(&PathBuf::from("/dev/null")), None);
    }

    #[test]
    fn cost_oracle_timeout_is_none() {
        let oracle = CommandCostOracle::new(
            "sh",
            vec!["-c".to_string(), "sleep 5; echo 1".to_string()],
            Duration::from_millis(100),
        );
        assert_eq!(oracle.measure(&PathBuf::from("/dev/null")), None);
    }

    #[test]
    fn test_oracle_exit_codes() {
        let dir = TempDir::new().unwrap();
        let pass = CommandTestOracle::new(
            vec!["sh".to_string(), "-c".to_string(), "exit 0".to_string()],
            Duration::from_secs(5),
        );
        let fail = CommandTestOracle::new(
            vec!["sh".to_string(), "-c".to_string(), "exit 1".to_string()],
            Duration::from_secs(5),
        );
        assert!(pass.run(dir.path()));
        assert!(!fail.run(dir.path()));
    }

    #[test]
    fn test_oracle_timeout_is_failure() {
        let dir = TempDir::new().unwrap();
        let oracle = CommandTestOracle::new(
            vec!["sh".to_string(), "-c".to_string(), "sleep 5".to_string()],
            Duration::from_millis(100),
        );
        assert!(!oracle.run(dir.path()));
    }

    #[test]
    fn missing_program_is_failure() {
        let dir = TempDir::new().unwrap();
        let oracle = CommandTestOracle::new(
            vec!["definitely-not-a-real-binary-xyz".to_string()],
            Duration::from_secs(1),
        );
        assert!(!oracle.run(dir.path()));
    }
}
