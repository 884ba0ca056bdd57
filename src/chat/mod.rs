//! The chat session loop.
//!
//! A turn is strictly sequential: read input, run `on_user_input`, append the
//! user message, run `before_request`, send, echo the reply as it streams,
//! run `after_response`, append the assistant message and save. A failed or
//! interrupted turn leaves the history exactly as it was before the turn.


use crate::error::Error;
use crate::extension::{ChatContext, ExtensionPipeline};
use crate::i18n::{Lang, t, tf};
use crate::provider::{ChatApi, ChatRequest, Message, StreamEvent};
use crate::session::ChatSession;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const STREAM_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Use the streaming endpoint. When off, `on_stream_delta` never runs.
    pub stream: bool,
    pub lang: Lang,
    /// Where the session is saved after each turn; `None` keeps it in memory.
    pub history_path: Option<PathBuf>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            stream: true,
            lang: Lang::En,
            history_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Input ended or the user asked to exit.
    Finished,
    /// Ctrl+C. The turn in progress was discarded.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnOutcome {
    Completed,
    Interrupted,
}

pub struct ChatLoop {
    api: Arc<dyn ChatApi>,
    pipeline: ExtensionPipeline,
    session: ChatSession,
    options: ChatOptions,
    interrupt: CancellationToken,
}

impl ChatLoop {
    pub fn new(
        api: Arc<dyn ChatApi>,
        pipeline: ExtensionPipeline,
        session: ChatSession,
        options: ChatOptions,
    ) -> Self {
        Self {
            api,
            pipeline,
            session,
            options,
            interrupt: CancellationToken::new(),
        }
    }

    /// Cancel the running turn and end the loop when `token` fires.
    #[must_use]
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = token;
        self
    }

    #[must_use]
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    fn context(&self) -> ChatContext {
        ChatContext {
            base_url: self.session.meta.base_url.clone(),
            model: self.session.meta.model.clone(),
            system_prompt: self.session.meta.system_prompt.clone(),
            history_file: self.options.history_path.clone(),
            history: self.session.messages.clone(),
        }
    }

    fn report_hook_failures(&mut self) {
        for failure in self.pipeline.take_failures() {
            let msg = match &failure {
                crate::extension::ExtensionError::Hook {
                    extension,
                    hook,
                    reason,
                } => tf(
                    self.options.lang,
                    "chat.err.hook_failed",
                    &[
                        ("ext", extension.as_str()),
                        ("hook", hook.as_str()),
                        ("err", reason.as_str()),
                    ],
                ),
                other => other.to_string(),
            };
            crate::terminal::notice(&msg);
        }
    }

    /// One message from stdin, one reply, then exit.
    pub async fn run_piped<R, W>(&mut self, mut input: R, out: &mut W) -> Result<ChatOutcome, Error>
    where
        R: AsyncRead + Unpin,
        W: Write,
    {
        let mut text = String::new();
        let interrupt = self.interrupt.clone();
        tokio::select! {
            biased;
            () = interrupt.cancelled() => return Ok(ChatOutcome::Interrupted),
            read = input.read_to_string(&mut text) => { read?; }
        }

        let text = text.trim();
        if text.is_empty() {
            return Ok(ChatOutcome::Finished);
        }
        match self.turn(text.to_string(), out, None).await? {
            TurnOutcome::Completed => Ok(ChatOutcome::Finished),
            TurnOutcome::Interrupted => Ok(ChatOutcome::Interrupted),
        }
    }

    /// Line-by-line conversation until `/exit`, end of input, a fatal error,
    /// or an interrupt.
    pub async fn run_interactive<R, W>(&mut self, mut input: R, out: &mut W) -> Result<ChatOutcome, Error>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let lang = self.options.lang;
        self.print_banner(out)?;
        let interrupt = self.interrupt.clone();

        loop {
            write!(out, "{}", t(lang, "chat.prompt.user"))?;
            out.flush()?;

            let mut line = String::new();
            let read = tokio::select! {
                biased;
                () = interrupt.cancelled() => {
                    writeln!(out)?;
                    return Ok(ChatOutcome::Interrupted);
                }
                read = input.read_line(&mut line) => read?,
            };
            if read == 0 {
                writeln!(out)?;
                return Ok(ChatOutcome::Finished);
            }

            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if text.starts_with('/') {
                match text {
                    "/exit" => return Ok(ChatOutcome::Finished),
                    "/help" => self.print_help(out)?,
                    "/clear" => {
                        self.session.messages.clear();
                        writeln!(out, "{}", t(lang, "chat.msg.history_cleared"))?;
                    }
                    cmd => writeln!(out, "{}", tf(lang, "chat.err.unknown_command", &[("cmd", cmd)]))?,
                }
                continue;
            }

            let prefix = t(lang, "chat.prompt.assistant");
            match self.turn(text.to_string(), out, Some(prefix)).await {
                Ok(TurnOutcome::Completed) => {}
                Ok(TurnOutcome::Interrupted) => {
                    writeln!(out)?;
                    writeln!(out, "{}", t(lang, "chat.msg.interrupted"))?;
                    return Ok(ChatOutcome::Interrupted);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let err = e.to_string();
                    writeln!(out)?;
                    writeln!(out, "{}", tf(lang, "chat.err.request_failed", &[("err", err.as_str())]))?;
                }
            }
        }
    }

    fn print_banner<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let lang = self.options.lang;
        let meta = &self.session.meta;
        writeln!(out, "{}", t(lang, "chat.title"))?;
        writeln!(out, "{}: {}", t(lang, "chat.base_url"), meta.base_url)?;
        writeln!(out, "{}: {}", t(lang, "chat.model"), meta.model)?;
        if meta.system_prompt.is_some() {
            writeln!(out, "{}", t(lang, "chat.system_prompt_set"))?;
        }
        if !self.pipeline.is_empty() {
            writeln!(out, "{}: {}", t(lang, "chat.extensions"), self.pipeline.names().join(", "))?;
        }
        if let Some(path) = &self.options.history_path {
            writeln!(out, "{}: {}", t(lang, "chat.session"), path.display())?;
        }
        self.print_help(out)?;
        writeln!(out)
    }

    fn print_help<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let lang = self.options.lang;
        for key in [
            "chat.commands.title",
            "chat.commands.exit",
            "chat.commands.clear",
            "chat.commands.help",
        ] {
            writeln!(out, "{}", t(lang, key))?;
        }
        Ok(())
    }

    async fn turn<W: Write>(
        &mut self,
        input: String,
        out: &mut W,
        prefix: Option<&str>,
    ) -> Result<TurnOutcome, Error> {
        let checkpoint = self.session.messages.len();

        let ctx = self.context();
        let text = self.pipeline.on_user_input(input, &ctx).await;
        self.report_hook_failures();
        self.session.messages.push(Message::user(text));

        let ctx = self.context();
        let mut messages = Vec::with_capacity(self.session.messages.len() + 1);
        if let Some(prompt) = &self.session.meta.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(self.session.messages.iter().cloned());
        let messages = self.pipeline.before_request(messages, &ctx).await;
        self.report_hook_failures();

        let request = ChatRequest {
            model: self.session.meta.model.clone(),
            messages,
        };
        tracing::debug!(
            turn = self.session.turns(),
            messages = request.messages.len(),
            "sending chat turn"
        );

        let interrupt = self.interrupt.clone();
        let reply = tokio::select! {
            biased;
            () = interrupt.cancelled() => None,
            reply = self.exchange(request, &ctx, out, prefix) => Some(reply),
        };

        let reply = match reply {
            None => {
                self.session.messages.truncate(checkpoint);
                return Ok(TurnOutcome::Interrupted);
            }
            Some(Err(e)) => {
                self.session.messages.truncate(checkpoint);
                return Err(e);
            }
            Some(Ok(reply)) => reply,
        };

        let reply = self.pipeline.after_response(reply, &ctx).await;
        self.report_hook_failures();
        self.session.messages.push(Message::assistant(reply));
        self.session.touch();

        if let Some(path) = &self.options.history_path {
            self.session.save(path)?;
        }
        Ok(TurnOutcome::Completed)
    }

    /// Send the request and echo the reply. Returns the raw assistant text.
    async fn exchange<W: Write>(
        &mut self,
        request: ChatRequest,
        ctx: &ChatContext,
        out: &mut W,
        prefix: Option<&str>,
    ) -> Result<String, Error> {
        if !self.options.stream {
            let text = self.api.complete(request).await?;
            if let Some(prefix) = prefix {
                write!(out, "{prefix}")?;
            }
            writeln!(out, "{text}")?;
            out.flush()?;
            return Ok(text);
        }

        let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);
        let api = Arc::clone(&self.api);
        let pipeline = &mut self.pipeline;
        let echo = &mut *out;

        let receive = async move {
            let mut parts: Vec<String> = Vec::new();
            while let Some(event) = rx.recv().await {
                let StreamEvent::TextDelta(delta) = event else {
                    break;
                };
                let piece = pipeline.on_stream_delta(delta, ctx).await;
                if piece.is_empty() {
                    continue;
                }
                if parts.is_empty()
                    && let Some(prefix) = prefix
                {
                    write!(echo, "{prefix}")?;
                }
                write!(echo, "{piece}")?;
                echo.flush()?;
                parts.push(piece);
            }
            Ok::<_, std::io::Error>(parts)
        };

        let (sent, received) = tokio::join!(api.stream(request, tx), receive);
        self.report_hook_failures();
        sent?;
        let parts = received?;

        if parts.is_empty()
            && let Some(prefix) = prefix
        {
            write!(out, "{prefix}")?;
        }
        writeln!(out)?;
        out.flush()?;
        Ok(parts.concat())
    }
}
