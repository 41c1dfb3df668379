//! Component D: privilege broker, per §4.6.
//!
//! Detects the execution environment (interactive tty vs SSH remote vs
//! non-interactive) and falls back between a pty-style prompt and a
//! stdin-piped password, finally assuming privilege is already cached in
//! non-interactive environments.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{CyrisError, Result};
use crate::exec::streaming::{run, RunOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Unknown,
    Available,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    PtyPrompt,
    StdinPassword,
    NonInteractive,
}

/// Detects the caller's environment: is stdin a terminal, is this an SSH
/// remote session, is a controlling tty present.
fn detect_environment() -> (bool, bool) {
    use std::io::IsTerminal;
    let stdin_is_tty = std::io::stdin().is_terminal();
    let is_ssh_session = std::env::var("SSH_TTY").is_ok() || std::env::var("SSH_CONNECTION").is_ok();
    (stdin_is_tty, is_ssh_session)
}

fn select_methods() -> Vec<Method> {
    let (stdin_is_tty, is_ssh_session) = detect_environment();
    if stdin_is_tty && !is_ssh_session {
        vec![Method::PtyPrompt, Method::StdinPassword, Method::NonInteractive]
    } else if stdin_is_tty && is_ssh_session {
        vec![Method::StdinPassword, Method::NonInteractive]
    } else {
        vec![Method::NonInteractive]
    }
}

pub struct PrivilegeBroker {
    state: std::sync::Mutex<BrokerState>,
    cached_password: std::sync::Mutex<Option<String>>,
}

impl Default for PrivilegeBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegeBroker {
    pub fn new() -> Self {
        Self { state: std::sync::Mutex::new(BrokerState::Unknown), cached_password: std::sync::Mutex::new(None) }
    }

    pub fn has_cached(&self) -> (bool, Option<u64>) {
        let state = *self.state.lock().unwrap();
        (state == BrokerState::Available, None)
    }

    pub fn invalidate(&self) {
        *self.state.lock().unwrap() = BrokerState::Unknown;
        *self.cached_password.lock().unwrap() = None;
    }

    /// Ensures elevated privilege is available for `required_tools`,
    /// probing with `sudo -n true` first (works when passwordless sudo or
    /// a cached credential is already configured), then falling back
    /// through the method chain.
    pub async fn ensure(&self, operation_label: &str, required_tools: &[&str]) -> Result<bool> {
        if self.has_cached().0 {
            return Ok(true);
        }

        let probe = run(&["sudo".into(), "-n".into(), "true".into()], RunOptions::default(), |_, _| {}).await;
        if let Ok(result) = probe {
            if result.returncode == 0 {
                *self.state.lock().unwrap() = BrokerState::Available;
                return Ok(true);
            }
        }

        for method in select_methods() {
            match self.try_method(method, operation_label).await {
                Ok(true) => {
                    *self.state.lock().unwrap() = BrokerState::Available;
                    return Ok(true);
                }
                Ok(false) => continue,
                Err(e) => {
                    debug!(?method, error = %e, "privilege method failed, trying fallback");
                    continue;
                }
            }
        }

        warn!(
            "could not obtain privilege for '{operation_label}' (needs: {}); remediation: add a sudoers entry for the current user covering these tools with NOPASSWD",
            required_tools.join(", ")
        );
        Err(CyrisError::Permission(format!(
            "no privilege escalation method succeeded for '{operation_label}'; configure passwordless sudo for: {}",
            required_tools.join(", ")
        )))
    }

    async fn try_method(&self, method: Method, operation_label: &str) -> Result<bool> {
        match method {
            Method::PtyPrompt | Method::StdinPassword => {
                let password = std::env::var("CYRIS_SUDO_PASSWORD").ok();
                let Some(password) = password else { return Ok(false) };
                let opts = RunOptions {
                    allow_password_prompt: true,
                    password_line: Some(password.clone()),
                    timeout: Duration::from_secs(15),
                    ..Default::default()
                };
                let result = run(&["sudo".into(), "-S".into(), "-p".into(), "Password:".into(), "true".into()], opts, |_, _| {})
                    .await?;
                if result.returncode == 0 {
                    *self.cached_password.lock().unwrap() = Some(password);
                    Ok(true)
                } else {
                    debug!(operation_label, "sudo rejected the supplied credential");
                    Ok(false)
                }
            }
            Method::NonInteractive => {
                debug!(operation_label, "non-interactive environment, assuming privilege is pre-cached");
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown_and_reports_no_cached_state() {
        let broker = PrivilegeBroker::new();
        assert_eq!(broker.has_cached(), (false, None));
    }

    #[test]
    fn invalidate_clears_cached_state() {
        let broker = PrivilegeBroker::new();
        *broker.state.lock().unwrap() = BrokerState::Available;
        broker.invalidate();
        assert_eq!(broker.has_cached(), (false, None));
    }
}
