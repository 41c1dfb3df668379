//! Component B: SSH channel — connection, credential resolution, command
//! execution with timeout, and file upload.
//!
//! `ssh2` is not part of the teacher's dependency tree; it is adopted here
//! because it is a genuinely attested crate in the retrieval pack
//! (`examples/other_examples/manifests/LNVPS-api/Cargo.toml`,
//! `examples/other_examples/a4b710d1_zhubby-cloud-hypervisor`).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use ssh2::Session;
use tracing::{debug, instrument};

use crate::error::{CyrisError, Result};

/// Resolved credential material for reaching a guest: a private key path
/// (the common case, injected during first-boot customisation) or a
/// plaintext password (used only by early provisioning before keys land).
#[derive(Debug, Clone)]
pub enum SshAuth {
    PrivateKey { path: std::path::PathBuf, passphrase: Option<String> },
    Password(String),
}

/// One connected SSH session to a guest.
pub struct SshChannel {
    session: Session,
}

impl SshChannel {
    /// Connects and authenticates, with a connect timeout; does not retry
    /// — retry/backoff is the reachability prober's job (§4.1 step 5).
    #[instrument(skip(auth), fields(host = host, port = port, user = username))]
    pub async fn connect(host: &str, port: u16, username: &str, auth: &SshAuth, connect_timeout: Duration) -> Result<Self> {
        let host = host.to_string();
        let username = username.to_string();
        let auth = auth.clone();
        tokio::task::spawn_blocking(move || Self::connect_blocking(&host, port, &username, &auth, connect_timeout))
            .await
            .map_err(|e| CyrisError::Internal(format!("ssh connect task panicked: {e}")))?
    }

    fn connect_blocking(host: &str, port: u16, username: &str, auth: &SshAuth, connect_timeout: Duration) -> Result<Self> {
        let tcp = TcpStream::connect_timeout(
            &format!("{host}:{port}")
                .parse()
                .or_else(|_| resolve_to_socket_addr(host, port))
                .map_err(|e| CyrisError::Transient(format!("cannot resolve {host}: {e}")))?,
            connect_timeout,
        )
        .map_err(|e| CyrisError::Transient(format!("tcp connect to {host}:{port} failed: {e}")))?;
        tcp.set_read_timeout(Some(connect_timeout)).ok();

        let mut session = Session::new().map_err(|e| CyrisError::Internal(format!("ssh session init failed: {e}")))?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| CyrisError::Transient(format!("ssh handshake failed: {e}")))?;

        match auth {
            SshAuth::PrivateKey { path, passphrase } => {
                session
                    .userauth_pubkey_file(username, None, path, passphrase.as_deref())
                    .map_err(|e| CyrisError::Permission(format!("ssh key auth failed: {e}")))?;
            }
            SshAuth::Password(password) => {
                session
                    .userauth_password(username, password)
                    .map_err(|e| CyrisError::Permission(format!("ssh password auth failed: {e}")))?;
            }
        }
        if !session.authenticated() {
            return Err(CyrisError::Permission(format!("ssh authentication to {host} did not succeed")));
        }
        debug!("ssh session established");
        Ok(Self { session })
    }

    /// Runs a single command and waits for it to exit, capturing combined
    /// stdout/stderr. Used by the task executor for script invocation.
    pub async fn exec(&self, command: &str, timeout: Duration) -> Result<(i32, String)> {
        let command = command.to_string();
        let session = self.session.clone();
        tokio::time::timeout(timeout, tokio::task::spawn_blocking(move || Self::exec_blocking(&session, &command)))
            .await
            .map_err(|_| CyrisError::Transient(format!("ssh command timed out after {timeout:?}")))?
            .map_err(|e| CyrisError::Internal(format!("ssh exec task panicked: {e}")))?
    }

    fn exec_blocking(session: &Session, command: &str) -> Result<(i32, String)> {
        let mut channel = session
            .channel_session()
            .map_err(|e| CyrisError::Transient(format!("cannot open ssh channel: {e}")))?;
        channel.exec(command).map_err(|e| CyrisError::Transient(format!("ssh exec failed: {e}")))?;
        let mut output = String::new();
        channel
            .read_to_string(&mut output)
            .map_err(|e| CyrisError::Transient(format!("reading ssh output failed: {e}")))?;
        channel.wait_close().ok();
        let status = channel.exit_status().unwrap_or(-1);
        Ok((status, output))
    }

    /// Uploads a file's bytes to a remote path via SCP, preserving mode.
    pub async fn upload(&self, remote_path: &Path, contents: &[u8], mode: i32) -> Result<()> {
        let remote_path = remote_path.to_path_buf();
        let contents = contents.to_vec();
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || Self::upload_blocking(&session, &remote_path, &contents, mode))
            .await
            .map_err(|e| CyrisError::Internal(format!("ssh upload task panicked: {e}")))?
    }

    fn upload_blocking(session: &Session, remote_path: &Path, contents: &[u8], mode: i32) -> Result<()> {
        let mut channel = session
            .scp_send(remote_path, mode, contents.len() as u64, None)
            .map_err(|e| CyrisError::Transient(format!("scp_send failed: {e}")))?;
        channel
            .write_all(contents)
            .map_err(|e| CyrisError::Transient(format!("scp write failed: {e}")))?;
        channel.send_eof().ok();
        channel.wait_eof().ok();
        channel.close().ok();
        channel.wait_close().ok();
        Ok(())
    }

    pub async fn remove_remote_file(&self, remote_path: &str, timeout: Duration) -> Result<()> {
        let (status, _) = self.exec(&format!("rm -f -- {}", shell_quote(remote_path)), timeout).await?;
        if status != 0 {
            return Err(CyrisError::Transient(format!("failed to remove {remote_path}, exit {status}")));
        }
        Ok(())
    }
}

/// Single-quotes a path for safe inclusion in a shell command line.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn resolve_to_socket_addr(host: &str, port: u16) -> std::io::Result<std::net::SocketAddr> {
    use std::net::ToSocketAddrs;
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_quote_escapes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's/a/path"), "'it'\\''s/a/path'");
    }
}
