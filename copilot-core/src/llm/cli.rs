//! CLI-backed providers: spawn `cursor-agent` or `claude` in print mode.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use super::provider::LlmProvider;
use super::types::{
    CompletionRequest, CompletionResponse, LlmError, ModelInfo, ProviderId, ResponseFormat,
};

const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

/// Env vars that make a nested `claude` believe it runs inside another session.
const CLAUDE_SESSION_VARS: [&str; 3] = [
    "CLAUDECODE",
    "CLAUDE_CODE_SSE_PORT",
    "CLAUDE_CODE_ENTRYPOINT",
];

/// LLM provider that shells out to an agent CLI.
///
/// - `cursor-cli`: `cursor-agent -p --output-format text --model {model} "{prompt}"`
/// - `claude-agent-sdk`: `claude -p --output-format json --model {model} "{prompt}"`
pub struct CliProvider {
    id: ProviderId,
    program: String,
    model: String,
    timeout_secs: u64,
}

impl CliProvider {
    /// Create a provider for one of the CLI-backed ids.
    pub fn new(id: ProviderId, model: impl Into<String>) -> Result<Self, LlmError> {
        let program = id.cli_command().ok_or_else(|| {
            LlmError::NotAvailable(format!("{} is not a CLI provider", id.as_str()))
        })?;
        Ok(Self {
            id,
            program: program.to_string(),
            model: model.into(),
            timeout_secs: 60,
        })
    }

    /// Set the timeout in seconds for CLI invocations.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Use an explicit executable path instead of resolving on `PATH`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.id == ProviderId::ClaudeAgentSdk {
            let extra: Vec<String> = std::env::vars()
                .map(|(k, _)| k)
                .filter(|k| k.starts_with("CLAUDE") && !CLAUDE_SESSION_VARS.contains(&k.as_str()))
                .collect();
            for var in CLAUDE_SESSION_VARS.iter().copied().chain(extra.iter().map(|s| s.as_str())) {
                cmd.env_remove(var);
            }
        }
        cmd
    }

    fn print_args(&self, prompt: &str) -> Vec<String> {
        let format = match self.id {
            ProviderId::ClaudeAgentSdk => "json",
            _ => "text",
        };
        let mut args = vec![
            "-p".to_string(),
            "--output-format".to_string(),
            format.to_string(),
        ];
        if !self.model.is_empty() && self.model != "auto" {
            args.push("--model".to_string());
            args.push(self.model.clone());
        }
        args.push(prompt.to_string());
        args
    }
}

/// Flatten system + user prompt into the single argument a print-mode CLI takes.
pub fn build_cli_prompt(request: &CompletionRequest) -> String {
    let mut prompt = String::new();
    if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.is_empty()) {
        prompt.push_str(system);
        prompt.push_str("\n\n");
    }
    prompt.push_str(&request.user_prompt);
    if request.response_format == ResponseFormat::Json {
        prompt.push_str("\n\nRespond with a single JSON object and nothing else.");
    }
    prompt
}

/// Pull the reply text out of `claude --output-format json` output.
pub fn parse_claude_envelope(stdout: &str) -> Result<(String, Option<String>), LlmError> {
    let value: serde_json::Value =
        serde_json::from_str(stdout.trim()).map_err(|e| LlmError::ParseFailed(e.to_string()))?;

    if value.get("is_error").and_then(|v| v.as_bool()) == Some(true) {
        let message = value
            .get("result")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return Err(LlmError::CliError(message.to_string()));
    }

    let content = value
        .get("result")
        .and_then(|v| v.as_str())
        .ok_or_else(|| LlmError::InvalidFormat("missing 'result' field".to_string()))?
        .to_string();

    let model = value
        .get("modelUsage")
        .and_then(|v| v.as_object())
        .and_then(|m| m.keys().next().cloned());

    Ok((content, model))
}

#[async_trait]
impl LlmProvider for CliProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = build_cli_prompt(&request);
        let t0 = Instant::now();

        tracing::debug!(
            provider = %self.id,
            model = %self.model,
            timeout_secs = self.timeout_secs,
            "CLI provider: spawning"
        );

        let mut cmd = self.command();
        cmd.args(self.print_args(&prompt));

        let output = timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| {
                tracing::warn!(provider = %self.id, "CLI provider: timed out");
                LlmError::Timeout(self.timeout_secs)
            })?
            .map_err(|e| LlmError::SpawnFailed(e.to_string()))?;

        let latency_ms = t0.elapsed().as_millis() as u64;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                provider = %self.id,
                exit_code = ?output.status.code(),
                "CLI provider: non-zero exit"
            );
            return Err(LlmError::CliError(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (content, model) = match self.id {
            ProviderId::ClaudeAgentSdk => parse_claude_envelope(&stdout)?,
            _ => (stdout.trim().to_string(), None),
        };

        tracing::debug!(provider = %self.id, latency_ms, "CLI provider: response received");

        Ok(CompletionResponse {
            content,
            model: model.or_else(|| Some(self.model.clone())),
            latency_ms,
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let ids: &[&str] = match self.id {
            ProviderId::ClaudeAgentSdk => &["haiku", "sonnet", "opus"],
            _ => &["auto", "sonnet-4", "gpt-5"],
        };
        Ok(ids
            .iter()
            .map(|id| ModelInfo {
                id: id.to_string(),
                name: id.to_string(),
                provider: self.id.as_str().to_string(),
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let mut cmd = self.command();
        cmd.arg("--version");
        let output = timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS), cmd.output())
            .await
            .map_err(|_| LlmError::Timeout(HEALTH_CHECK_TIMEOUT_SECS))?
            .map_err(|e| LlmError::NotAvailable(format!("{}: {}", self.program, e)))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(LlmError::NotAvailable(format!(
                "{} exited with {:?}",
                self.program,
                output.status.code()
            )))
        }
    }

    fn id(&self) -> ProviderId {
        self.id
    }

    fn model(&self) -> &str {
        &self.model
    }
}
