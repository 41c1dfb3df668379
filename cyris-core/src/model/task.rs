use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The six provisioning task kinds from §4.5, each carrying exactly the
/// parameters its contract needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    AddAccount {
        username: String,
        password: String,
        #[serde(default)]
        full_name: Option<String>,
        #[serde(default)]
        fatal: bool,
    },
    ModifyAccount {
        username: String,
        #[serde(default)]
        new_password: Option<String>,
        #[serde(default)]
        new_username: Option<String>,
        #[serde(default)]
        fatal: bool,
    },
    InstallPackage {
        manager: PackageManager,
        name: String,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        fatal: bool,
    },
    CopyContent {
        local_path: String,
        remote_path: String,
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        fatal: bool,
    },
    ExecuteProgram {
        interpreter: String,
        /// Either an inline script body or a path to one, disambiguated by
        /// whether it exists on the operator's filesystem at parse time.
        inline_or_path: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        as_user: Option<String>,
        #[serde(default = "default_expect_exit")]
        expect_exit: i32,
        #[serde(default)]
        fatal: bool,
    },
    EmulateAttack {
        attack_type: AttackType,
        target: String,
        #[serde(default = "default_count")]
        count: u32,
        #[serde(default = "default_duration_secs")]
        duration_secs: u64,
        #[serde(default)]
        fatal: bool,
    },
}

fn default_expect_exit() -> i32 {
    0
}
fn default_count() -> u32 {
    1
}
fn default_duration_secs() -> u64 {
    30
}

impl TaskKind {
    pub fn fatal(&self) -> bool {
        match self {
            TaskKind::AddAccount { fatal, .. }
            | TaskKind::ModifyAccount { fatal, .. }
            | TaskKind::InstallPackage { fatal, .. }
            | TaskKind::CopyContent { fatal, .. }
            | TaskKind::ExecuteProgram { fatal, .. }
            | TaskKind::EmulateAttack { fatal, .. } => *fatal,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::AddAccount { .. } => "add_account",
            TaskKind::ModifyAccount { .. } => "modify_account",
            TaskKind::InstallPackage { .. } => "install_package",
            TaskKind::CopyContent { .. } => "copy_content",
            TaskKind::ExecuteProgram { .. } => "execute_program",
            TaskKind::EmulateAttack { .. } => "emulate_attack",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    Apt,
    Yum,
    Dnf,
    Zypper,
    Pkg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    SshBrute,
    PortScan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

/// A task's outcome, appended to the range record as it executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub guest_id: String,
    pub kind: String,
    pub state: TaskState,
    /// Captured tool output proving the task achieved its declared effect.
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub execution_time_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(guest_id: impl Into<String>, kind: &TaskKind) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            guest_id: guest_id.into(),
            kind: kind.name().to_string(),
            state: TaskState::Pending,
            evidence: None,
            execution_time_ms: None,
            error: None,
            recorded_at: Utc::now(),
        }
    }
}
