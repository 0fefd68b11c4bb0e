//! Запуск shell-скриптов управления MTProxy.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

pub const NEW_PROXY: &str = "new_proxy.sh";
pub const LIST_PROXIES: &str = "list_proxies.sh";
pub const DELETE_PROXY: &str = "delete_proxy.sh";
pub const STATS_PROXY: &str = "stats_proxy.sh";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Не удалось запустить {script}: {source}")]
    Spawn {
        script: String,
        source: std::io::Error,
    },
    #[error("{script} завершился с кодом {code:?}: {stderr}")]
    Failed {
        script: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{script} не завершился за {} с", timeout.as_secs())]
    TimedOut { script: String, timeout: Duration },
}

#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn invoke(&self, script: &str, args: &[String]) -> Result<String, ScriptError>;
}

/// Команда, которую администратор может выполнить на сервере вручную.
pub fn manual_command(script: &str, args: &[String]) -> String {
    let mut command = format!("bash scripts/{}", script);
    for arg in args {
        command.push(' ');
        command.push_str(arg);
    }
    command
}

#[derive(Debug, Clone)]
pub struct ShellScripts {
    project_root: PathBuf,
    scripts_dir: PathBuf,
    timeout: Duration,
}

impl ShellScripts {
    pub fn new(project_root: PathBuf, scripts_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            project_root,
            scripts_dir,
            timeout,
        }
    }
}

#[async_trait]
impl ScriptRunner for ShellScripts {
    async fn invoke(&self, script: &str, args: &[String]) -> Result<String, ScriptError> {
        let path = self.scripts_dir.join(script);
        tracing::info!(script = script, args = ?args, "Running proxy script");

        let child = Command::new("bash")
            .arg(&path)
            .args(args)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                tracing::error!(script = script, error = %source, "Failed to spawn script");
                ScriptError::Spawn {
                    script: script.to_string(),
                    source,
                }
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ScriptError::Spawn {
                script: script.to_string(),
                source,
            })?,
            Err(_) => {
                tracing::error!(
                    script = script,
                    timeout_secs = self.timeout.as_secs(),
                    "Script timed out"
                );
                return Err(ScriptError::TimedOut {
                    script: script.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            tracing::warn!(
                script = script,
                code = ?output.status.code(),
                stderr = %stderr,
                "Script returned non-zero status"
            );
            return Err(ScriptError::Failed {
                script: script.to_string(),
                code: output.status.code(),
                stderr,
            });
        }

        tracing::info!(script = script, "Script finished successfully");
        Ok(stdout)
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Подменяет скрипты заранее заданными ответами и запоминает вызовы.
    #[derive(Default)]
    pub struct FakeScripts {
        responses: Mutex<HashMap<String, Result<String, String>>>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl FakeScripts {
        pub fn respond(self, script: &str, stdout: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(script.to_string(), Ok(stdout.to_string()));
            self
        }

        pub fn fail(self, script: &str, stderr: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(script.to_string(), Err(stderr.to_string()));
            self
        }

        pub fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScriptRunner for FakeScripts {
        async fn invoke(&self, script: &str, args: &[String]) -> Result<String, ScriptError> {
            self.calls
                .lock()
                .unwrap()
                .push((script.to_string(), args.to_vec()));
            match self.responses.lock().unwrap().get(script) {
                Some(Ok(stdout)) => Ok(stdout.clone()),
                Some(Err(stderr)) => Err(ScriptError::Failed {
                    script: script.to_string(),
                    code: Some(1),
                    stderr: stderr.clone(),
                }),
                None => Err(ScriptError::Spawn {
                    script: script.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such script"),
                }),
            }
        }
    }
}
