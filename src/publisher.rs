//! Push the generated site to a remote host with rsync over ssh

use crate::config::PublishConfig;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

const PUSH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("rsync command not found, please install rsync")]
    RsyncNotFound,

    #[error("rsync failed (exit code {code:?}): {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("rsync timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to run rsync: {0}")]
    Io(#[from] std::io::Error),
}

pub type PublishResult<T> = Result<T, PublishError>;

/// What a push did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Pushed,
    /// The remote host is still the placeholder
    Skipped,
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// `rsync` arguments for pushing `site_dir`
pub fn rsync_args(config: &PublishConfig, site_dir: &Path) -> Vec<String> {
    let ssh_key = expand_home(&config.ssh_key);
    vec![
        "-avz".to_string(),
        "--delete".to_string(),
        "-e".to_string(),
        format!("ssh -i {} -o StrictHostKeyChecking=no", ssh_key.display()),
        format!("{}/", site_dir.display()),
        remote_destination(config),
    ]
}

fn remote_destination(config: &PublishConfig) -> String {
    format!("{}@{}:{}", config.remote_user, config.remote_host, config.remote_path)
}

/// Push `site_dir` to the configured remote
pub async fn push_to_remote(config: &PublishConfig, site_dir: &Path) -> PublishResult<PublishOutcome> {
    push_with(config, site_dir, "rsync").await
}

async fn push_with(config: &PublishConfig, site_dir: &Path, program: &str) -> PublishResult<PublishOutcome> {
    if !config.is_configured() {
        warn!(
            "[publisher] Remote host not configured (still '{}'). Skipping push. \
             Set publish.remote_host or PUBLISH_REMOTE_HOST.",
            config.remote_host
        );
        return Ok(PublishOutcome::Skipped);
    }

    let destination = remote_destination(config);
    info!("[publisher] Pushing site to {} ...", destination);

    let child = Command::new(program)
        .args(rsync_args(config, site_dir))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PublishError::RsyncNotFound,
            _ => PublishError::Io(e),
        })?;

    let output = match tokio::time::timeout(PUSH_TIMEOUT, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            error!("[publisher] rsync timed out after {:?}", PUSH_TIMEOUT);
            return Err(PublishError::Timeout(PUSH_TIMEOUT));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!("[publisher] rsync failed (exit code {:?}): {}", output.status.code(), stderr);
        return Err(PublishError::Failed {
            code: output.status.code(),
            stderr,
        });
    }

    info!("[publisher] Successfully pushed to {}", destination);
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        debug!("[publisher] rsync output:\n{}", stdout);
    }
    Ok(PublishOutcome::Pushed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> PublishConfig {
        PublishConfig {
            remote_host: "news.example.org".to_string(),
            remote_user: "www".to_string(),
            remote_path: "/srv/news/".to_string(),
            ssh_key: "/keys/id_ed25519".to_string(),
            ..PublishConfig::default()
        }
    }

    #[test]
    fn test_rsync_args() {
        let args = rsync_args(&configured(), Path::new("/tmp/site"));
        assert_eq!(
            args,
            vec![
                "-avz",
                "--delete",
                "-e",
                "ssh -i /keys/id_ed25519 -o StrictHostKeyChecking=no",
                "/tmp/site/",
                "www@news.example.org:/srv/news/",
            ]
        );
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.ssh/id_rsa"), home.join(".ssh/id_rsa"));
            assert_eq!(expand_home("~"), home);
        }
        assert_eq!(expand_home("/abs/key"), PathBuf::from("/abs/key"));
        assert_eq!(expand_home("rel/~/key"), PathBuf::from("rel/~/key"));
    }

    #[tokio::test]
    async fn test_placeholder_host_is_skipped() {
        let outcome = push_to_remote(&PublishConfig::default(), Path::new("site")).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let err = push_with(&configured(), Path::new("site"), "rsync-definitely-not-installed")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::RsyncNotFound));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit() {
        let err = push_with(&configured(), Path::new("site"), "false").await.unwrap_err();
        assert!(matches!(err, PublishError::Failed { code: Some(1), .. }));
    }
}
