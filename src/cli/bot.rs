//! `r9s bot`: saved chat presets.

use super::{BotAction, BotCreateArgs, Context};
use crate::bots::{Bot, BotStore};
use crate::error::Error;
use crate::i18n::{Lang, t, tf};
use crate::terminal;
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

pub(super) fn run(ctx: &Context<'_>, action: BotAction) -> Result<ExitCode> {
    let store = BotStore::new(ctx.paths.bots_dir());
    let lang = ctx.lang;
    let mut out = io::stdout();

    match action {
        BotAction::Create(args) => {
            let Some(bot) = build(args, ctx.lang_flag.as_deref(), &mut io::stdin().lock(), &mut out, lang)?
            else {
                return Err(Error::MissingModel.into());
            };
            let path = store.save(&bot)?;
            let path = path.display().to_string();
            terminal::success(&tf(
                lang,
                "bot.saved",
                &[("name", bot.name.as_str()), ("path", path.as_str())],
            ));
        }
        BotAction::List => {
            let names = store.list()?;
            if names.is_empty() {
                let dir = store.dir().display().to_string();
                terminal::info(&tf(lang, "bot.none", &[("dir", dir.as_str())]));
            }
            for name in names {
                println!("{name}");
            }
        }
        BotAction::Show { name } => {
            let bot = store.load(&name)?;
            println!("{}", serde_json::to_string_pretty(&bot)?);
        }
        BotAction::Delete { name, yes } => {
            // Fail on a missing bot before asking.
            store.load(&name)?;
            if !yes {
                let question = tf(lang, "bot.confirm_delete", &[("name", name.as_str())]);
                if !terminal::prompt_yes_no(
                    &mut io::stdin().lock(),
                    &mut out,
                    &question,
                    t(lang, "common.yes_no"),
                )? {
                    terminal::info(t(lang, "common.cancelled"));
                    return Ok(ExitCode::SUCCESS);
                }
            }
            store.delete(&name)?;
            terminal::success(&tf(lang, "bot.deleted", &[("name", name.as_str())]));
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Assemble a bot from flags, asking for the model when none was given.
/// `None` when input ends before a model is entered.
fn build<R: BufRead, W: Write>(
    args: BotCreateArgs,
    lang_flag: Option<&str>,
    input: &mut R,
    out: &mut W,
    lang: Lang,
) -> Result<Option<Bot>> {
    let model = match args.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        Some(model) => model.to_string(),
        None => loop {
            match terminal::read_line(input, out, t(lang, "set.prompt.model"))? {
                None => return Ok(None),
                Some(answer) if answer.is_empty() => continue,
                Some(answer) => break answer,
            }
        },
    };

    let system_prompt_file = match args.system_prompt_file {
        Some(path) => Some(std::path::absolute(&path)?.display().to_string()),
        None => None,
    };
    let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    Ok(Some(Bot {
        name: args.name.trim().to_string(),
        model,
        base_url: non_blank(args.base_url),
        system_prompt: non_blank(args.system_prompt),
        system_prompt_file,
        lang: non_blank(lang_flag.map(String::from)),
        extensions: args.ext,
    }))
}
