//! `r9s chat`: resolve settings, open or create the session, run the loop.

use super::{ChatArgs, ChatMode, Context};
use crate::bots::{Bot, BotStore};
use crate::chat::{ChatLoop, ChatOptions, ChatOutcome};
use crate::config::{
    SessionLayer, Source, extension_specs, resolve_api_key, resolve_base_url, resolve_lang_pref,
    resolve_model, resolve_system_prompt,
};
use crate::error::Error;
use crate::extension;
use crate::i18n::{Lang, t, tf};
use crate::provider::{self, R9sClient};
use crate::session::{ChatSession, SessionStore};
use crate::terminal;
use anyhow::Result;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

pub(super) async fn run(ctx: &Context<'_>, args: ChatArgs) -> Result<ExitCode> {
    let bot = match &args.bot {
        Some(name) => Some(BotStore::new(ctx.paths.bots_dir()).load(name)?),
        None => None,
    };
    let bot_layer = bot.as_ref().map(Bot::layer).unwrap_or_default();
    let lang = Lang::resolve(
        resolve_lang_pref(ctx.lang_flag.as_deref(), &bot_layer, ctx.env).as_deref(),
    );
    let interactive = io::stdin().is_terminal();
    let store = SessionStore::new(ctx.paths.chat_dir());

    let (history_path, loaded) = match args.mode {
        Some(ChatMode::Resume) => match select_session(&store, interactive, lang) {
            Ok(Some(path)) => {
                let session = ChatSession::load(&path)?;
                (Some(path), Some(session))
            }
            Ok(None) => {
                terminal::info(t(lang, "common.cancelled"));
                return Ok(ExitCode::SUCCESS);
            }
            Err(e) => {
                terminal::error(&localized(&e, lang));
                return Ok(ExitCode::FAILURE);
            }
        },
        None if args.no_history => (None, None),
        None => {
            let path = args
                .history_file
                .clone()
                .unwrap_or_else(|| store.default_path());
            let loaded = if path.exists() {
                Some(ChatSession::load(&path)?)
            } else {
                None
            };
            (Some(path), loaded)
        }
    };

    let meta = loaded.as_ref().map(|s| &s.meta);
    let session_layer = SessionLayer {
        base_url: meta.map(|m| m.base_url.as_str()),
        model: meta.map(|m| m.model.as_str()),
        system_prompt: meta.and_then(|m| m.system_prompt.as_deref()),
    };

    let api_key =
        resolve_api_key(args.api_key.as_deref(), ctx.env).ok_or(provider::Error::MissingApiKey)?;
    let base_url = resolve_base_url(args.base_url.as_deref(), &bot_layer, ctx.env, &session_layer);
    if base_url.source == Source::Default {
        terminal::notice(&tf(
            lang,
            "chat.msg.default_base_url",
            &[("url", base_url.value.as_str())],
        ));
    }
    let model = resolve_model(args.model.as_deref(), &bot_layer, ctx.env, &session_layer)
        .ok_or(Error::MissingModel)?
        .value;
    let system_prompt = resolve_system_prompt(
        args.system_prompt.as_deref(),
        args.system_prompt_file.as_deref(),
        &bot_layer,
        ctx.env,
        &session_layer,
    )?;

    let specs = extension_specs(ctx.env, &bot_layer, &args.ext);
    let pipeline = extension::load_all(&specs)?;
    let client = R9sClient::new(
        &base_url.value,
        api_key,
        ctx.settings.chat_timeouts(args.timeout),
    )?;
    tracing::debug!(
        base_url = %base_url.value,
        model = %model,
        extensions = ?specs,
        history = ?history_path,
        "chat configured"
    );

    let session = match loaded {
        Some(mut session) => {
            session.update_meta(&base_url.value, &model, system_prompt.as_deref());
            session
        }
        None => ChatSession::new(
            session_id(history_path.as_deref()),
            base_url.value,
            model,
            system_prompt,
        ),
    };

    let interrupt = CancellationToken::new();
    let trigger = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let options = ChatOptions {
        stream: !args.no_stream,
        lang,
        history_path,
    };
    let mut chat =
        ChatLoop::new(Arc::new(client), pipeline, session, options).with_interrupt(interrupt);
    let mut out = io::stdout();
    let outcome = if interactive {
        chat.run_interactive(BufReader::new(tokio::io::stdin()), &mut out)
            .await?
    } else {
        chat.run_piped(tokio::io::stdin(), &mut out).await?
    };

    Ok(match outcome {
        ChatOutcome::Finished => ExitCode::SUCCESS,
        ChatOutcome::Interrupted => super::interrupted(),
    })
}

/// Ask which saved session to continue. `None` when the user gives up.
fn select_session(
    store: &SessionStore,
    interactive: bool,
    lang: Lang,
) -> Result<Option<PathBuf>, Error> {
    if !interactive {
        return Err(Error::ResumeRequiresTty);
    }
    let sessions = store.list()?;
    if sessions.is_empty() {
        return Err(Error::NoSessions(store.dir().to_path_buf()));
    }

    let items: Vec<String> = sessions.iter().map(|s| s.display()).collect();
    let mut input = io::stdin().lock();
    let mut out = io::stdout();
    let choice = terminal::prompt_choice(
        &mut input,
        &mut out,
        &items,
        t(lang, "chat.resume.select"),
        t(lang, "common.invalid_choice"),
        None,
    )?;
    Ok(choice.map(|i| sessions[i].path.clone()))
}

fn localized(err: &Error, lang: Lang) -> String {
    match err {
        Error::ResumeRequiresTty => t(lang, "chat.err.resume_requires_tty").to_string(),
        Error::NoSessions(dir) => tf(
            lang,
            "chat.resume.none",
            &[("dir", dir.display().to_string().as_str())],
        ),
        other => other.to_string(),
    }
}

/// Sessions are named after their file; in-memory ones get a random id.
fn session_id(path: Option<&Path>) -> String {
    path.and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_id_from_file_stem() {
        assert_eq!(
            session_id(Some(Path::new("/tmp/chat/20250101_120000_abcd1234.json"))),
            "20250101_120000_abcd1234"
        );
        let random = session_id(None);
        assert_eq!(random.len(), 32);
        assert!(random.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_resume_requires_terminal() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let err = select_session(&store, false, Lang::En).unwrap_err();
        assert!(matches!(err, Error::ResumeRequiresTty));
        assert_eq!(
            localized(&err, Lang::En),
            "Resume requires an interactive TTY (no stdin piping)."
        );
    }

    #[test]
    fn test_resume_without_sessions() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("chat"));
        let err = select_session(&store, true, Lang::En).unwrap_err();
        assert!(matches!(err, Error::NoSessions(_)));
        assert!(localized(&err, Lang::En).starts_with("No saved sessions found in: "));
    }
}
