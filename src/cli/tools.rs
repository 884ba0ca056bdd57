//! `r9s set` and `r9s reset`.

use super::{Context, ResetArgs, SetArgs};
use crate::config::{BotLayer, SessionLayer, Source, resolve_api_key, resolve_base_url};
use crate::error::Error;
use crate::i18n::{Lang, t, tf};
use crate::provider::{self, R9sClient};
use crate::terminal;
use crate::tools::{BackupRecord, ToolIntegration, ToolRegistry, ToolSettings};
use anyhow::Result;
use std::io::{self, BufRead, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;

pub(super) async fn set(ctx: &Context<'_>, args: SetArgs) -> Result<ExitCode> {
    let lang = ctx.lang;
    let registry = ToolRegistry::builtin(&ctx.paths);
    let interactive = io::stdin().is_terminal();
    let mut out = io::stdout();

    let Some(tool) = select_tool(
        &registry,
        args.tool.as_deref(),
        interactive,
        &mut io::stdin().lock(),
        &mut out,
        lang,
        "set.select_tool",
    )?
    else {
        return Ok(cancelled(lang));
    };

    let api_key = match resolve_api_key(args.api_key.as_deref(), ctx.env) {
        Some(key) => key,
        None => terminal::prompt_secret(t(lang, "set.prompt.api_key"))?,
    };
    if api_key.trim().is_empty() {
        return Err(provider::Error::MissingApiKey.into());
    }

    let resolved = resolve_base_url(
        args.base_url.as_deref(),
        &BotLayer::default(),
        ctx.env,
        &SessionLayer::default(),
    );
    let base_url = if resolved.source == Source::Default && interactive {
        let prompt = tf(
            lang,
            "set.prompt.base_url",
            &[("default", resolved.value.as_str())],
        );
        terminal::read_line(&mut io::stdin().lock(), &mut out, &prompt)?
            .filter(|answer| !answer.is_empty())
            .unwrap_or(resolved.value)
    } else {
        resolved.value
    };

    // Also validates the base URL before anything is written.
    let client = R9sClient::new(&base_url, api_key.clone(), ctx.settings.models_timeouts())?;

    let flag_model = args
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from);
    let model = match flag_model {
        Some(model) => {
            verify_model(&client, &model, lang).await;
            model
        }
        None => match pick_model(&client, lang, &mut out).await? {
            Some(model) => model,
            None => return Ok(cancelled(lang)),
        },
    };

    let profile = tool.profile();
    terminal::header(&tf(
        lang,
        "set.summary.title",
        &[("tool", profile.primary_name.as_str())],
    ));
    terminal::info(&format!(
        "  {}: {}",
        t(lang, "set.summary.config"),
        profile.config_path.display()
    ));
    terminal::info(&format!("  base_url: {base_url}"));
    terminal::info(&format!("  api_key: {}", terminal::masked_key(&api_key)));
    terminal::info(&format!("  model: {model}"));

    if !args.yes
        && !terminal::prompt_yes_no(
            &mut io::stdin().lock(),
            &mut out,
            t(lang, "set.confirm"),
            t(lang, "common.yes_no"),
        )?
    {
        return Ok(cancelled(lang));
    }

    let result = tool.set_config(&ToolSettings {
        base_url,
        api_key,
        model,
    })?;
    let target = result.target_path.display().to_string();
    terminal::success(&tf(lang, "set.done", &[("path", target.as_str())]));
    match &result.backup_path {
        Some(backup) => {
            let backup = backup.display().to_string();
            terminal::info(&tf(lang, "set.backup", &[("path", backup.as_str())]));
        }
        None => terminal::info(t(lang, "set.no_backup")),
    }
    Ok(ExitCode::SUCCESS)
}

pub(super) fn reset(ctx: &Context<'_>, args: &ResetArgs) -> Result<ExitCode> {
    let lang = ctx.lang;
    let registry = ToolRegistry::builtin(&ctx.paths);
    let interactive = io::stdin().is_terminal();
    let mut out = io::stdout();

    let Some(tool) = select_tool(
        &registry,
        args.tool.as_deref(),
        interactive,
        &mut io::stdin().lock(),
        &mut out,
        lang,
        "reset.select_tool",
    )?
    else {
        return Ok(cancelled(lang));
    };
    let profile = tool.profile();

    let backups = tool.list_backups()?;
    if backups.is_empty() {
        let dir = profile.backup_dir.display().to_string();
        terminal::warning(&tf(
            lang,
            "reset.none",
            &[
                ("tool", profile.primary_name.as_str()),
                ("dir", dir.as_str()),
            ],
        ));
        return Ok(ExitCode::FAILURE);
    }

    let index = if args.yes {
        0
    } else {
        let items: Vec<String> = backups.iter().map(BackupRecord::file_name).collect();
        match terminal::prompt_choice(
            &mut io::stdin().lock(),
            &mut out,
            &items,
            t(lang, "reset.select"),
            t(lang, "common.invalid_choice"),
            Some(0),
        )? {
            Some(i) => i,
            None => return Ok(cancelled(lang)),
        }
    };
    let backup = &backups[index];
    let backup_path = backup.backup_path.display().to_string();

    if !args.yes {
        let config = profile.config_path.display().to_string();
        let question = tf(
            lang,
            "reset.confirm",
            &[
                ("backup", backup.file_name().as_str()),
                ("path", config.as_str()),
            ],
        );
        if !terminal::prompt_yes_no(
            &mut io::stdin().lock(),
            &mut out,
            &question,
            t(lang, "common.yes_no"),
        )? {
            return Ok(cancelled(lang));
        }
    }

    let restored = tool.reset_config(&backup.backup_path)?;
    let restored = restored.display().to_string();
    terminal::success(&tf(
        lang,
        "reset.done",
        &[("path", restored.as_str()), ("backup", backup_path.as_str())],
    ));
    Ok(ExitCode::SUCCESS)
}

fn cancelled(lang: Lang) -> ExitCode {
    terminal::info(t(lang, "common.cancelled"));
    ExitCode::SUCCESS
}

/// Resolve `name`, or ask with a menu of primary names when it is missing or
/// unknown. Without a terminal an unknown name is an error.
fn select_tool<R: BufRead, W: Write>(
    registry: &ToolRegistry,
    name: Option<&str>,
    interactive: bool,
    input: &mut R,
    out: &mut W,
    lang: Lang,
    menu_key: &'static str,
) -> Result<Option<Arc<dyn ToolIntegration>>, Error> {
    if let Some(name) = name {
        if let Some(tool) = registry.resolve(name) {
            return Ok(Some(tool));
        }
        if !interactive {
            return Err(Error::UnknownTool(name.to_string()));
        }
        writeln!(out, "{}", tf(lang, "set.unknown_tool", &[("name", name)]))?;
    }

    let names = registry.primary_names();
    let prompt = format!("{} ", t(lang, menu_key));
    let choice = terminal::prompt_choice(
        input,
        out,
        &names,
        &prompt,
        t(lang, "common.invalid_choice"),
        None,
    )?;
    Ok(choice.and_then(|i| registry.resolve(&names[i])))
}

/// Offer the server's model list, or plain entry when it cannot be fetched.
/// Warn when the server cannot confirm a model given on the command line.
async fn verify_model(client: &R9sClient, model: &str, lang: Lang) {
    if let Err(e) = client.get_model(model).await {
        tracing::debug!("model lookup failed: {e}");
        let err = e.to_string();
        terminal::warning(&tf(
            lang,
            "set.model_unverified",
            &[("model", model), ("err", err.as_str())],
        ));
    }
}

async fn pick_model<W: Write>(
    client: &R9sClient,
    lang: Lang,
    out: &mut W,
) -> Result<Option<String>> {
    let model = match client.list_models().await {
        Ok(models) if !models.is_empty() => {
            choose_model(&mut io::stdin().lock(), out, &models, lang)?
        }
        Ok(_) => prompt_model(&mut io::stdin().lock(), out, lang)?,
        Err(e) => {
            tracing::debug!("model listing failed: {e}");
            let err = e.to_string();
            terminal::warning(&tf(lang, "set.models_failed", &[("err", err.as_str())]));
            prompt_model(&mut io::stdin().lock(), out, lang)?
        }
    };
    Ok(model)
}

/// Numbered list of models. A number picks from the list; any other
/// non-numeric text is taken as a model name.
fn choose_model<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    models: &[String],
    lang: Lang,
) -> io::Result<Option<String>> {
    for (i, model) in models.iter().enumerate() {
        writeln!(out, "  {}) {model}", i + 1)?;
    }
    loop {
        let Some(answer) = terminal::read_line(input, out, t(lang, "set.select_model"))? else {
            return Ok(None);
        };
        if let Some(i) = terminal::parse_index(&answer, models.len()) {
            return Ok(Some(models[i].clone()));
        }
        if answer.is_empty() || answer.chars().all(|c| c.is_ascii_digit()) {
            writeln!(out, "{}", t(lang, "common.invalid_choice"))?;
            continue;
        }
        return Ok(Some(answer));
    }
}

fn prompt_model<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    lang: Lang,
) -> io::Result<Option<String>> {
    loop {
        let Some(answer) = terminal::read_line(input, out, t(lang, "set.prompt.model"))? else {
            return Ok(None);
        };
        if !answer.is_empty() {
            return Ok(Some(answer));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MapEnv, Paths, Settings};
    use tempfile::TempDir;

    fn models() -> Vec<String> {
        vec!["gpt-a".to_string(), "gpt-b".to_string()]
    }

    #[test]
    fn test_select_tool_by_alias() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::builtin(&Paths::from_home(dir.path()));
        let mut out = Vec::<u8>::new();
        let tool = select_tool(
            &registry,
            Some("Claude_Code"),
            false,
            &mut &b""[..],
            &mut out,
            Lang::En,
            "set.select_tool",
        )
        .unwrap()
        .unwrap();
        assert_eq!(tool.profile().primary_name, "claude-code");
        assert!(out.is_empty());
    }

    #[test]
    fn test_select_tool_unknown() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::builtin(&Paths::from_home(dir.path()));

        let err = select_tool(
            &registry,
            Some("vim"),
            false,
            &mut &b""[..],
            &mut Vec::<u8>::new(),
            Lang::En,
            "set.select_tool",
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::UnknownTool(name) if name == "vim"));

        let mut out = Vec::<u8>::new();
        let tool = select_tool(
            &registry,
            Some("vim"),
            true,
            &mut &b"7\n1\n"[..],
            &mut out,
            Lang::En,
            "set.select_tool",
        )
        .unwrap()
        .unwrap();
        assert_eq!(tool.profile().primary_name, "claude-code");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Unknown tool: vim"));
        assert!(text.contains("  1) claude-code"));
        assert!(text.contains("Invalid selection, try again."));
    }

    #[test]
    fn test_select_tool_end_of_input() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::builtin(&Paths::from_home(dir.path()));
        let choice = select_tool(
            &registry,
            None,
            true,
            &mut &b""[..],
            &mut Vec::<u8>::new(),
            Lang::En,
            "reset.select_tool",
        )
        .unwrap();
        assert!(choice.is_none());
    }

    #[test]
    fn test_choose_model() {
        let mut out = Vec::<u8>::new();
        let picked = choose_model(&mut &b"2\n"[..], &mut out, &models(), Lang::En).unwrap();
        assert_eq!(picked.as_deref(), Some("gpt-b"));

        let typed = choose_model(&mut &b"custom-1\n"[..], &mut Vec::<u8>::new(), &models(), Lang::En)
            .unwrap();
        assert_eq!(typed.as_deref(), Some("custom-1"));

        let mut out = Vec::<u8>::new();
        let retried =
            choose_model(&mut &b"9\n\ngpt-z\n"[..], &mut out, &models(), Lang::En).unwrap();
        assert_eq!(retried.as_deref(), Some("gpt-z"));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Invalid selection").count(), 2);
    }

    #[test]
    fn test_prompt_model_skips_blank_lines() {
        let model = prompt_model(&mut &b"\n  \nmine\n"[..], &mut Vec::<u8>::new(), Lang::En).unwrap();
        assert_eq!(model.as_deref(), Some("mine"));
        assert_eq!(
            prompt_model(&mut &b"\n"[..], &mut Vec::<u8>::new(), Lang::En).unwrap(),
            None
        );
    }

    #[test]
    fn test_reset_restores_newest_backup() {
        let dir = TempDir::new().unwrap();
        let env = MapEnv::default();
        let paths = Paths::from_home(dir.path());
        let ctx = Context {
            env: &env,
            paths: paths.clone(),
            settings: Settings::default(),
            lang_flag: None,
            lang: Lang::En,
        };
        let args = ResetArgs {
            tool: Some("claude".into()),
            yes: true,
        };

        // Nothing to restore yet.
        assert_eq!(reset(&ctx, &args).unwrap(), ExitCode::FAILURE);

        let config = dir.path().join(".claude").join("settings.json");
        std::fs::create_dir_all(config.parent().unwrap()).unwrap();
        std::fs::write(&config, "{\"theme\": \"dark\"}\n").unwrap();
        let tool = ToolRegistry::builtin(&paths).resolve("claude-code").unwrap();
        tool.set_config(&ToolSettings {
            base_url: "https://api.r9s.ai".into(),
            api_key: "sk-test".into(),
            model: "m".into(),
        })
        .unwrap();
        assert_ne!(std::fs::read_to_string(&config).unwrap(), "{\"theme\": \"dark\"}\n");

        assert_eq!(reset(&ctx, &args).unwrap(), ExitCode::SUCCESS);
        assert_eq!(std::fs::read_to_string(&config).unwrap(), "{\"theme\": \"dark\"}\n");
    }
}
