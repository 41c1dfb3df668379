//! Component H: the task executor. Renders each task to a script, uploads
//! it via SSH, runs it once, and removes it, per §4.5.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{CyrisError, Result};
use crate::model::{TaskKind, TaskRecord, TaskState};
use crate::ssh::channel::{shell_quote, SshChannel};
use crate::tasks::kinds::render;

const MAX_SSH_RETRIES: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_secs(2);
const CAP_BACKOFF: Duration = Duration::from_secs(30);

fn backoff_for(attempt: u32) -> Duration {
    let exp = BASE_BACKOFF.as_secs_f64() * 2f64.powi(attempt as i32);
    let capped = exp.min(CAP_BACKOFF.as_secs_f64());
    let jitter: f64 = rand::thread_rng().gen_range(0.9..1.1);
    Duration::from_secs_f64(capped * jitter)
}

/// Executes one task against a guest over an established SSH session.
/// Non-zero script exit is never retried; only transient SSH-layer
/// failures (connect refused, timeout, auth flapping on first boot) are.
#[instrument(skip(channel, task), fields(guest_id = guest_id))]
pub async fn execute_task(channel: &SshChannel, guest_id: &str, task: &TaskKind) -> TaskRecord {
    let mut record = TaskRecord::new(guest_id, task);
    record.state = TaskState::Running;

    let rendered = match render(task) {
        Ok(r) => r,
        Err(e) => {
            record.state = TaskState::Failed;
            record.error = Some(e.to_string());
            return record;
        }
    };

    let remote_path = format!("/tmp/cyris-{}.sh", record.task_id);
    let command = build_invocation(&remote_path, &rendered.args);
    let started = std::time::Instant::now();

    let mut attempt = 0;
    loop {
        match run_once(channel, task, &remote_path, &rendered.body, &command).await {
            Ok((exit_code, evidence)) => {
                record.execution_time_ms = Some(started.elapsed().as_millis() as u64);
                record.evidence = Some(truncate_evidence(&evidence));
                if exit_code == 0 {
                    record.state = TaskState::Succeeded;
                } else {
                    record.state = TaskState::Failed;
                    record.error = Some(format!("script exited {exit_code}"));
                }
                return record;
            }
            Err(e) if e.is_transient() && attempt < MAX_SSH_RETRIES => {
                let delay = backoff_for(attempt);
                warn!(attempt, error = %e, ?delay, "transient task execution failure, retrying");
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                record.state = TaskState::Failed;
                record.error = Some(e.to_string());
                record.execution_time_ms = Some(started.elapsed().as_millis() as u64);
                return record;
            }
        }
    }
}

async fn run_once(channel: &SshChannel, task: &TaskKind, remote_path: &str, body: &str, command: &str) -> Result<(i32, String)> {
    if let TaskKind::CopyContent { local_path, remote_path: content_remote_path, mode, .. } = task {
        upload_content(channel, local_path, content_remote_path, mode.as_deref()).await?;
    }
    channel.upload(std::path::Path::new(remote_path), body.as_bytes(), 0o700).await?;
    let result = channel.exec(command, Duration::from_secs(300)).await;
    channel.remove_remote_file(remote_path, Duration::from_secs(10)).await.ok();
    result
}

/// Reads `local_path` on the operator host and uploads its bytes to
/// `remote_path` on the guest, so the `chmod`/`stat` the rendered script
/// runs afterwards observe the operator's actual content, not whatever
/// (or nothing) already lived at that path.
async fn upload_content(channel: &SshChannel, local_path: &str, remote_path: &str, mode: Option<&str>) -> Result<()> {
    let contents = tokio::fs::read(local_path)
        .await
        .map_err(|e| CyrisError::Validation(format!("cannot read local_path '{local_path}': {e}")))?;
    let mode = mode.and_then(|m| i32::from_str_radix(m, 8).ok()).unwrap_or(0o644);
    channel.upload(std::path::Path::new(remote_path), &contents, mode).await
}

fn build_invocation(remote_path: &str, args: &[String]) -> String {
    let quoted_args: Vec<String> = args.iter().map(|a| shell_quote(a)).collect();
    format!("chmod +x {} && {} {}", shell_quote(remote_path), shell_quote(remote_path), quoted_args.join(" "))
}

/// The executor contract keeps only the last 4 KiB of combined output as
/// evidence, per §4.5's `execute_program` row.
fn truncate_evidence(s: &str) -> String {
    const LIMIT: usize = 4096;
    if s.len() <= LIMIT {
        s.to_string()
    } else {
        s[s.len() - LIMIT..].to_string()
    }
}

/// Runs a guest's declared tasks strictly in order, stopping at the first
/// `fatal` failure but otherwise continuing so later tasks' evidence is
/// still collected.
#[instrument(skip(channel, tasks))]
pub async fn execute_guest_tasks(channel: &SshChannel, guest_id: &str, tasks: &[TaskKind]) -> Vec<TaskRecord> {
    let mut records = Vec::with_capacity(tasks.len());
    for task in tasks {
        let record = execute_task(channel, guest_id, task).await;
        let failed = record.state == TaskState::Failed;
        let fatal = task.fatal();
        records.push(record);
        if failed && fatal {
            info!(guest_id, "fatal task failed, stopping guest's remaining tasks");
            break;
        }
    }
    records
}

pub fn unique_task_id() -> Uuid {
    Uuid::new_v4()
}

pub fn now_ts() -> chrono::DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_evidence_to_last_4kib() {
        let big = "x".repeat(5000);
        let truncated = truncate_evidence(&big);
        assert_eq!(truncated.len(), 4096);
    }

    #[test]
    fn invocation_quotes_every_argument() {
        let cmd = build_invocation("/tmp/cyris-abc.sh", &["a b".to_string(), "c;d".to_string()]);
        assert!(cmd.contains("'a b'"));
        assert!(cmd.contains("'c;d'"));
    }
}
