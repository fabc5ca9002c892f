//! Supervises an external cache engine through its systemd unit.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::cache::{CacheError, EngineSupervisor};

#[derive(Debug, Clone)]
pub struct SystemctlSupervisor {
    program: String,
    unit: String,
}

impl SystemctlSupervisor {
    pub fn new(unit: impl Into<String>) -> Self {
        Self::with_program("systemctl", unit)
    }

    /// Use a different control binary with the same `stop|start <unit>` calling convention.
    pub fn with_program(program: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            unit: unit.into(),
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    async fn run(&self, action: &str) -> Result<(), CacheError> {
        let output = Command::new(&self.program)
            .arg(action)
            .arg(&self.unit)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|err| {
                CacheError::unavailable(format!(
                    "failed to spawn `{} {action} {}`: {err}",
                    self.program, self.unit
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CacheError::unavailable(format!(
                "`{} {action} {}` exited with {}: {}",
                self.program,
                self.unit,
                output.status,
                stderr.trim()
            )));
        }

        info!(
            target = "warbler::infra::engine_process",
            unit = %self.unit,
            action,
            "cache engine unit transitioned"
        );
        Ok(())
    }
}

#[async_trait]
impl EngineSupervisor for SystemctlSupervisor {
    async fn stop(&self) -> Result<(), CacheError> {
        self.run("stop").await
    }

    async fn start(&self) -> Result<(), CacheError> {
        self.run("start").await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_is_ok() {
        let supervisor = SystemctlSupervisor::with_program("true", "redis");
        supervisor.stop().await.expect("stop");
        supervisor.start().await.expect("start");
    }

    #[tokio::test]
    async fn failing_command_reports_unavailable() {
        let supervisor = SystemctlSupervisor::with_program("false", "redis");
        let err = supervisor.stop().await.expect_err("must fail");
        assert!(matches!(err, CacheError::Unavailable(_)));
    }

    #[tokio::test]
    async fn missing_binary_reports_unavailable() {
        let supervisor = SystemctlSupervisor::with_program("warbler-no-such-binary", "redis");
        assert!(supervisor.start().await.is_err());
    }
}
