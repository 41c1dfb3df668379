//! Component A: uniform invocation of `virsh`, `virt-builder`, `virt-install`,
//! `virt-customize`, and `qemu-img`, with typed classification of failures.
//!
//! Grounded in `examples/original_source/.../virsh_client.py`: the original
//! system shells out to `virsh` rather than linking libvirt, and this
//! adapter keeps that shape rather than the teacher's `virt`-crate backend.

use std::path::Path;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::{CyrisError, Result};

/// Captured result of one external process invocation.
#[derive(Debug, Clone)]
pub struct CliOutput {
    pub program: String,
    pub args: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
    pub duration: Duration,
}

impl CliOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Coarse classification of a non-zero exit, used to decide retry policy
/// and to map into a `CyrisError` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    PermissionDenied,
    ImageMissing,
    NameConflict,
    ResourceBusy,
    Transient,
    Unknown,
}

/// Classifies a tool's stderr by pattern matching, per §4.2.
pub fn classify_stderr(stderr: &str) -> ErrorClass {
    let s = stderr.to_lowercase();
    if s.contains("permission denied") || s.contains("authentication failed") || s.contains("access denied") {
        ErrorClass::PermissionDenied
    } else if s.contains("no such file") || s.contains("not found") && s.contains("image") {
        ErrorClass::ImageMissing
    } else if s.contains("already exists") || s.contains("domain already") {
        ErrorClass::NameConflict
    } else if s.contains("resource busy") || s.contains("is already running") || s.contains("domain is being") {
        ErrorClass::ResourceBusy
    } else if s.contains("timed out")
        || s.contains("timeout")
        || s.contains("connection refused")
        || s.contains("temporarily unavailable")
        || s.contains("could not connect")
    {
        ErrorClass::Transient
    } else {
        ErrorClass::Unknown
    }
}

impl ErrorClass {
    pub fn into_error(self, tool: &str, output: &CliOutput) -> CyrisError {
        let msg = format!("{tool} exited {} : {}", output.status, output.stderr.trim());
        match self {
            ErrorClass::PermissionDenied => CyrisError::Permission(msg),
            ErrorClass::Transient => CyrisError::Transient(msg),
            _ => CyrisError::Libvirt(msg),
        }
    }
}

/// Thin wrapper around a libvirt connection URI; every method shells out to
/// the corresponding CLI tool and returns a typed, classified result.
#[derive(Debug, Clone)]
pub struct VirtCli {
    pub libvirt_uri: String,
}

impl VirtCli {
    pub fn new(libvirt_uri: impl Into<String>) -> Self {
        Self { libvirt_uri: libvirt_uri.into() }
    }

    #[instrument(skip(self, args), fields(program = program))]
    async fn run(&self, program: &str, args: &[String]) -> Result<CliOutput> {
        let started = Instant::now();
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| CyrisError::Internal(format!("failed to spawn {program}: {e}")))?;
        let result = CliOutput {
            program: program.to_string(),
            args: args.to_vec(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code().unwrap_or(-1),
            duration: started.elapsed(),
        };
        debug!(status = result.status, duration_ms = result.duration.as_millis() as u64, "ran {program}");
        Ok(result)
    }

    /// Runs `virsh` with `-c <uri>` prefixed.
    pub async fn virsh(&self, args: &[&str]) -> Result<CliOutput> {
        let mut full = vec!["-c".to_string(), self.libvirt_uri.clone()];
        full.extend(args.iter().map(|s| s.to_string()));
        self.run("virsh", &full).await
    }

    /// Retries a transient failure up to 3 times with a 2-second backoff,
    /// per §4.2's failure-classification policy.
    pub async fn virsh_with_retry(&self, args: &[&str]) -> Result<CliOutput> {
        let mut attempt = 0;
        loop {
            let out = self.virsh(args).await?;
            if out.success() {
                return Ok(out);
            }
            let class = classify_stderr(&out.stderr);
            if class != ErrorClass::Transient || attempt >= 3 {
                return Err(class.into_error("virsh", &out));
            }
            attempt += 1;
            warn!(attempt, "transient virsh failure, retrying: {}", out.stderr.trim());
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    pub async fn define(&self, xml_path: &Path) -> Result<()> {
        self.virsh_with_retry(&["define", &xml_path.to_string_lossy()]).await?;
        Ok(())
    }

    pub async fn start(&self, domain: &str) -> Result<()> {
        self.virsh_with_retry(&["start", domain]).await?;
        Ok(())
    }

    pub async fn shutdown(&self, domain: &str) -> Result<()> {
        self.virsh_with_retry(&["shutdown", domain]).await?;
        Ok(())
    }

    pub async fn destroy_domain(&self, domain: &str) -> Result<()> {
        let out = self.virsh(&["destroy", domain]).await?;
        if !out.success() && !out.stderr.to_lowercase().contains("not running") {
            return Err(classify_stderr(&out.stderr).into_error("virsh destroy", &out));
        }
        Ok(())
    }

    pub async fn undefine(&self, domain: &str) -> Result<()> {
        let out = self.virsh(&["undefine", domain, "--nvram"]).await?;
        if !out.success() && !out.stderr.to_lowercase().contains("no domain") {
            return Err(classify_stderr(&out.stderr).into_error("virsh undefine", &out));
        }
        Ok(())
    }

    /// Returns `virsh domstate` output or `None` if the domain is unknown.
    pub async fn domstate(&self, domain: &str) -> Result<Option<String>> {
        let out = self.virsh(&["domstate", domain]).await?;
        if out.success() {
            Ok(Some(out.stdout.trim().to_string()))
        } else if out.stderr.to_lowercase().contains("no domain") || out.stderr.to_lowercase().contains("not found") {
            Ok(None)
        } else {
            Err(classify_stderr(&out.stderr).into_error("virsh domstate", &out))
        }
    }

    pub async fn net_dhcp_leases(&self, network: &str) -> Result<String> {
        let out = self.virsh(&["net-dhcp-leases", network]).await?;
        Ok(out.stdout)
    }

    pub async fn domifaddr(&self, domain: &str, source: &str) -> Result<String> {
        let out = self.virsh(&["domifaddr", domain, "--source", source]).await?;
        Ok(out.stdout)
    }

    pub async fn domiflist(&self, domain: &str) -> Result<String> {
        let out = self.virsh(&["domiflist", domain]).await?;
        Ok(out.stdout)
    }

    /// Invokes `virt-builder` to synthesise a base disk image.
    pub async fn virt_builder(&self, image_label: &str, output_path: &Path, size_gib: u64) -> Result<CliOutput> {
        let args = vec![
            image_label.to_string(),
            "--output".to_string(),
            output_path.to_string_lossy().into_owned(),
            "--size".to_string(),
            format!("{size_gib}G"),
            "--format".to_string(),
            "qcow2".to_string(),
        ];
        self.run("virt-builder", &args).await
    }

    /// Invokes `virt-customize` to inject a root password hash, hostname,
    /// and authorized key into an existing disk image.
    pub async fn virt_customize(
        &self,
        disk_path: &Path,
        hostname: &str,
        root_password_hash: Option<&str>,
        authorized_key: Option<&str>,
    ) -> Result<CliOutput> {
        let mut args = vec![
            "-a".to_string(),
            disk_path.to_string_lossy().into_owned(),
            "--hostname".to_string(),
            hostname.to_string(),
        ];
        if let Some(hash) = root_password_hash {
            args.push("--root-password".to_string());
            args.push(format!("password-crypt:{hash}"));
        }
        if let Some(key) = authorized_key {
            args.push("--ssh-inject".to_string());
            args.push(format!("root:string:{key}"));
        }
        self.run("virt-customize", &args).await
    }

    pub async fn qemu_img_create_with_backing(&self, backing: &Path, new_disk: &Path) -> Result<CliOutput> {
        let args = vec![
            "create".to_string(),
            "-f".to_string(),
            "qcow2".to_string(),
            "-b".to_string(),
            backing.to_string_lossy().into_owned(),
            "-F".to_string(),
            "qcow2".to_string(),
            new_disk.to_string_lossy().into_owned(),
        ];
        self.run("qemu-img", &args).await
    }

    pub async fn qemu_img_info_json(&self, disk_path: &Path) -> Result<String> {
        let args = vec![
            "info".to_string(),
            "--output".to_string(),
            "json".to_string(),
            disk_path.to_string_lossy().into_owned(),
        ];
        let out = self.run("qemu-img", &args).await?;
        if !out.success() {
            return Err(classify_stderr(&out.stderr).into_error("qemu-img info", &out));
        }
        Ok(out.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_permission_denied() {
        assert_eq!(classify_stderr("error: Permission denied"), ErrorClass::PermissionDenied);
    }

    #[test]
    fn classifies_transient_connection_errors() {
        assert_eq!(classify_stderr("error: Failed to connect: Connection refused"), ErrorClass::Transient);
    }

    #[test]
    fn classifies_name_conflict() {
        assert_eq!(classify_stderr("error: domain 'foo' already exists"), ErrorClass::NameConflict);
    }
}
