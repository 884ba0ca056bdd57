//! Extensions backed by shell commands, declared in a TOML manifest:
//!
//! ```toml
//! name = "redact"
//! on_user_input = "python3 redact.py"
//! after_response = "./post.sh"
//! ```
//!
//! Each hook command runs with `sh -c` in the manifest's directory. It gets
//! `{"event", "value", "context"}` as JSON on stdin and answers with
//! `{"value": ...}` on stdout. Empty output or a `null` value means no change.

use super::{ChatContext, ChatExtension, ExtensionError, HookPoint};
use crate::provider::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const HOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandManifest {
    pub name: String,
    #[serde(default)]
    pub on_user_input: Option<String>,
    #[serde(default)]
    pub before_request: Option<String>,
    #[serde(default)]
    pub on_stream_delta: Option<String>,
    #[serde(default)]
    pub after_response: Option<String>,
}

impl CommandManifest {
    /// Parse and validate a manifest.
    pub fn parse(content: &str) -> Result<Self, ExtensionError> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| ExtensionError::Contract(e.to_string()))?;
        if manifest.name.trim().is_empty() {
            return Err(ExtensionError::Contract("'name' must not be empty".into()));
        }
        if HookPoint::ALL.iter().all(|p| manifest.command(*p).is_none()) {
            return Err(ExtensionError::Contract(format!(
                "extension '{}' declares no hooks",
                manifest.name
            )));
        }
        Ok(manifest)
    }

    #[must_use]
    pub fn command(&self, point: HookPoint) -> Option<&str> {
        let cmd = match point {
            HookPoint::OnUserInput => &self.on_user_input,
            HookPoint::BeforeRequest => &self.before_request,
            HookPoint::OnStreamDelta => &self.on_stream_delta,
            HookPoint::AfterResponse => &self.after_response,
        };
        cmd.as_deref().filter(|c| !c.trim().is_empty())
    }
}

#[derive(Serialize)]
struct HookInput<'a, T: Serialize + ?Sized> {
    event: &'static str,
    value: &'a T,
    context: &'a ChatContext,
}

#[derive(Deserialize)]
struct HookOutput {
    #[serde(default)]
    value: Value,
}

#[derive(Debug)]
pub struct CommandExtension {
    manifest: CommandManifest,
    dir: PathBuf,
    timeout: Duration,
}

impl CommandExtension {
    pub fn new(manifest: CommandManifest, dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            dir: dir.into(),
            timeout: HOOK_TIMEOUT,
        }
    }

    /// Load a manifest file. Commands run relative to its directory.
    pub fn from_file(path: &Path) -> Result<Self, ExtensionError> {
        let load_err = |reason: String| ExtensionError::Load {
            spec: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let manifest = CommandManifest::parse(&content).map_err(|e| load_err(e.to_string()))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Ok(Self::new(manifest, dir))
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the hook command. `Ok(None)` when the hook is not declared or
    /// answered with no value.
    async fn run<T: Serialize + ?Sized>(
        &self,
        point: HookPoint,
        value: &T,
        ctx: &ChatContext,
    ) -> Result<Option<Value>, ExtensionError> {
        let Some(command) = self.manifest.command(point) else {
            return Ok(None);
        };
        let fail = |reason: String| ExtensionError::hook(&self.manifest.name, point, reason);

        let payload = serde_json::to_vec(&HookInput {
            event: point.as_str(),
            value,
            context: ctx,
        })
        .map_err(|e| fail(format!("failed to encode input: {e}")))?;

        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.dir)
            .env("R9S_HOOK_EVENT", point.as_str())
            .env("R9S_EXTENSION_NAME", &self.manifest.name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(format!("spawn failed: {e}")))?;

        let stdin = child.stdin.take();
        let exchange = async move {
            if let Some(mut stdin) = stdin {
                // The command may exit without reading its input.
                if let Err(e) = stdin.write_all(&payload).await
                    && e.kind() != std::io::ErrorKind::BrokenPipe
                {
                    return Err(e);
                }
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(fail(format!("I/O error: {e}"))),
            Err(_) => return Err(fail(format!("timed out after {:?}", self.timeout))),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(fail(if stderr.is_empty() {
                format!("command exited with {}", output.status)
            } else {
                stderr
            }));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(None);
        }
        let parsed: HookOutput = serde_json::from_str(stdout.trim())
            .map_err(|e| fail(format!("invalid output, expected {{\"value\": ...}}: {e}")))?;
        Ok((!parsed.value.is_null()).then_some(parsed.value))
    }

    async fn run_text(
        &self,
        point: HookPoint,
        text: &str,
        ctx: &ChatContext,
    ) -> Result<Option<String>, ExtensionError> {
        match self.run(point, text, ctx).await? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(ExtensionError::hook(
                &self.manifest.name,
                point,
                format!("expected a string value, got {other}"),
            )),
        }
    }
}

#[async_trait]
impl ChatExtension for CommandExtension {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    async fn on_user_input(
        &self,
        text: &str,
        ctx: &ChatContext,
    ) -> Result<Option<String>, ExtensionError> {
        self.run_text(HookPoint::OnUserInput, text, ctx).await
    }

    async fn before_request(
        &self,
        messages: &[Message],
        ctx: &ChatContext,
    ) -> Result<Option<Vec<Message>>, ExtensionError> {
        let Some(value) = self.run(HookPoint::BeforeRequest, messages, ctx).await? else {
            return Ok(None);
        };
        serde_json::from_value(value).map(Some).map_err(|e| {
            ExtensionError::hook(
                &self.manifest.name,
                HookPoint::BeforeRequest,
                format!("value is not a message list: {e}"),
            )
        })
    }

    async fn on_stream_delta(
        &self,
        delta: &str,
        ctx: &ChatContext,
    ) -> Result<Option<String>, ExtensionError> {
        self.run_text(HookPoint::OnStreamDelta, delta, ctx).await
    }

    async fn after_response(
        &self,
        text: &str,
        ctx: &ChatContext,
    ) -> Result<Option<String>, ExtensionError> {
        self.run_text(HookPoint::AfterResponse, text, ctx).await
    }
}
