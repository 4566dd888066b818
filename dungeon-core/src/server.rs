//! Supervision of a local model server process.
//!
//! Used when a channel is served by Ollama: the server is started before the
//! game and killed after it.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::Instant;

/// Errors from starting the model server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Model server exited before becoming ready ({0})")]
    Exited(ExitStatus),

    #[error("Model server did not become ready within {0:?}")]
    Timeout(Duration),

    #[error("Readiness check failed: {0}")]
    Check(String),
}

/// How to launch the server and how to tell that it is up.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Polled with GET until it answers with a success status.
    pub health_url: String,
    pub timeout: Duration,
    pub check_interval: Duration,
}

impl ServerConfig {
    /// `ollama serve`, checked at the server's base URL.
    pub fn ollama(base_url: &str, timeout: Duration) -> Self {
        Self {
            program: "ollama".to_string(),
            args: vec!["serve".to_string()],
            health_url: base_url.to_string(),
            timeout,
            check_interval: Duration::from_secs(1),
        }
    }
}

/// A running, ready model server.
#[derive(Debug)]
pub struct ModelServer {
    child: Child,
}

impl ModelServer {
    /// Start the server and wait until it answers.
    ///
    /// The child is killed if it does not come up within `config.timeout`.
    pub async fn ensure_ready(config: &ServerConfig) -> Result<Self, ServerError> {
        tracing::info!(program = %config.program, "starting model server");

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ServerError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let deadline = Instant::now() + config.timeout;

        loop {
            match http.get(&config.health_url).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!("model server is ready");
                    return Ok(Self { child });
                }
                Ok(response) => {
                    tracing::debug!(status = %response.status(), "model server not ready yet");
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    tracing::debug!("model server not accepting connections yet");
                }
                Err(e) => {
                    tracing::error!(error = %e, "unexpected error checking model server");
                    let _ = child.kill().await;
                    return Err(ServerError::Check(e.to_string()));
                }
            }

            if let Ok(Some(status)) = child.try_wait() {
                tracing::error!(%status, "model server exited unexpectedly");
                return Err(ServerError::Exited(status));
            }

            if Instant::now() >= deadline {
                let _ = child.kill().await;
                return Err(ServerError::Timeout(config.timeout));
            }

            tokio::time::sleep(config.check_interval).await;
        }
    }

    /// Stop the server and wait for it to exit.
    pub async fn teardown(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!(error = %e, "failed to stop model server");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn config(program: &str, args: &[&str], timeout: Duration) -> ServerConfig {
        ServerConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            // Nothing listens on the discard port.
            health_url: "http://127.0.0.1:9".to_string(),
            timeout,
            check_interval: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_ollama_config() {
        let config = ServerConfig::ollama("http://localhost:11434", Duration::from_secs(30));
        assert_eq!(config.program, "ollama");
        assert_eq!(config.args, vec!["serve"]);
        assert_eq!(config.health_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = ModelServer::ensure_ready(&config(
            "definitely-not-a-real-model-server",
            &[],
            Duration::from_secs(1),
        ))
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_process_exits_early() {
        let err = ModelServer::ensure_ready(&config("sh", &["-c", "exit 3"], Duration::from_secs(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Exited(status) if status.code() == Some(3)));
    }

    #[tokio::test]
    async fn test_never_ready_times_out() {
        let err = ModelServer::ensure_ready(&config("sleep", &["30"], Duration::from_millis(300)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Timeout(_)));
    }
}
