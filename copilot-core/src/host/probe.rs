//! Locating executables on the host.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

#[async_trait]
pub trait CommandProbe: Send + Sync {
    /// Absolute path of `command` if it resolves on `PATH`.
    async fn which(&self, command: &str) -> Option<PathBuf>;
}

/// Shells out to `which` (Unix) or `where` (Windows).
pub struct SystemCommandProbe {
    locator: &'static str,
}

impl SystemCommandProbe {
    pub fn unix() -> Self {
        Self { locator: "which" }
    }

    pub fn windows() -> Self {
        Self { locator: "where" }
    }
}

#[async_trait]
impl CommandProbe for SystemCommandProbe {
    async fn which(&self, command: &str) -> Option<PathBuf> {
        let output = Command::new(self.locator)
            .arg(command)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        // `where` prints every match; the first one is what would run.
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
    }
}

/// Probe for the current OS.
pub fn default_probe() -> Arc<dyn CommandProbe> {
    if cfg!(windows) {
        Arc::new(SystemCommandProbe::windows())
    } else {
        Arc::new(SystemCommandProbe::unix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unknown_command_not_found() {
        let probe = SystemCommandProbe::unix();
        assert!(probe
            .which("copilot-definitely-not-installed-binary")
            .await
            .is_none());
    }
}
