//! Command-line surface: argument parsing and command dispatch.

mod bot;
mod chat;
mod tools;

use crate::config::{BotLayer, Env, Paths, ProcessEnv, Settings, resolve_lang_pref};
use crate::i18n::{Lang, t};
use crate::terminal;
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status after Ctrl+C.
const EXIT_INTERRUPTED: u8 = 130;

/// Chat with r9s, manage bots, or point local dev tools at r9s
#[derive(Parser, Debug)]
#[command(name = "r9s", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// UI language (en, zh-CN)
    #[arg(long, global = true)]
    pub lang: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with a model (interactive, or one reply for piped stdin)
    Chat(ChatArgs),
    /// Configure a local tool to use r9s
    Set(SetArgs),
    /// Restore a tool's config from a backup
    Reset(ResetArgs),
    /// Manage saved chat presets
    Bot(BotArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatMode {
    /// Pick a saved session and continue it
    Resume,
}

#[derive(Parser, Debug, Default)]
pub struct ChatArgs {
    /// `resume` to continue a saved session
    #[arg(value_enum)]
    pub mode: Option<ChatMode>,

    /// API key (default: R9S_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// API base URL (default: R9S_BASE_URL, then https://api.r9s.ai)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Model name (default: R9S_MODEL)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Load defaults from a saved bot
    #[arg(long)]
    pub bot: Option<String>,

    /// System prompt text
    #[arg(long, conflicts_with = "system_prompt_file")]
    pub system_prompt: Option<String>,

    /// Read the system prompt from a file
    #[arg(long)]
    pub system_prompt_file: Option<PathBuf>,

    /// Session file to load and save
    #[arg(long, conflicts_with = "no_history")]
    pub history_file: Option<PathBuf>,

    /// Keep the conversation in memory only
    #[arg(long)]
    pub no_history: bool,

    /// Extension to load: trim, timestamp, window:<n>, or a .toml manifest (repeatable)
    #[arg(long = "ext", value_name = "EXT")]
    pub ext: Vec<String>,

    /// Use the non-streaming endpoint
    #[arg(long)]
    pub no_stream: bool,

    /// Request timeout in seconds; for streamed replies, the longest pause allowed
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

#[derive(Parser, Debug, Default)]
pub struct SetArgs {
    /// Tool to configure (asks when omitted)
    pub tool: Option<String>,

    /// API key (default: R9S_API_KEY, then asks)
    #[arg(long)]
    pub api_key: Option<String>,

    /// API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Model to configure (asks when omitted)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Apply without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Debug, Default)]
pub struct ResetArgs {
    /// Tool to reset (asks when omitted)
    pub tool: Option<String>,

    /// Restore the newest backup without asking
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct BotArgs {
    #[command(subcommand)]
    pub action: BotAction,
}

#[derive(Subcommand, Debug)]
pub enum BotAction {
    /// Create or overwrite a bot
    Create(BotCreateArgs),
    /// List saved bots
    List,
    /// Print a bot's definition
    Show {
        name: String,
    },
    /// Delete a bot
    Delete {
        name: String,
        /// Delete without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Parser, Debug, Default)]
pub struct BotCreateArgs {
    pub name: String,

    /// Model (asks when omitted)
    #[arg(short, long)]
    pub model: Option<String>,

    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long, conflicts_with = "system_prompt_file")]
    pub system_prompt: Option<String>,

    #[arg(long)]
    pub system_prompt_file: Option<PathBuf>,

    /// Extension to load with this bot (repeatable)
    #[arg(long = "ext", value_name = "EXT")]
    pub ext: Vec<String>,
}

/// Shared state every command needs.
pub(crate) struct Context<'a> {
    pub env: &'a dyn Env,
    pub paths: Paths,
    pub settings: Settings,
    /// `--lang` as given, before resolution.
    pub lang_flag: Option<String>,
    pub lang: Lang,
}

impl<'a> Context<'a> {
    fn load(env: &'a dyn Env, lang_flag: Option<String>) -> Result<Self> {
        let paths = Paths::discover(env)?;
        let settings = Settings::load(&paths.settings_file())?;
        let lang = Lang::resolve(
            resolve_lang_pref(lang_flag.as_deref(), &BotLayer::default(), env).as_deref(),
        );
        Ok(Self {
            env,
            paths,
            settings,
            lang_flag,
            lang,
        })
    }
}

/// Run a parsed command line to completion.
pub async fn run(cli: Cli) -> ExitCode {
    let env = ProcessEnv;
    match run_inner(cli, &env).await {
        Ok(code) => code,
        Err(e) if is_interrupt(&e) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            terminal::error(&format!("Error: {e}"));
            ExitCode::FAILURE
        }
    }
}

async fn run_inner(cli: Cli, env: &dyn Env) -> Result<ExitCode> {
    let Some(command) = cli.command else {
        let lang = Lang::resolve(
            resolve_lang_pref(cli.lang.as_deref(), &BotLayer::default(), env).as_deref(),
        );
        print_overview(lang);
        return Ok(ExitCode::SUCCESS);
    };

    let ctx = Context::load(env, cli.lang)?;
    match command {
        Commands::Chat(args) => chat::run(&ctx, args).await,
        Commands::Set(args) => tools::set(&ctx, args).await,
        Commands::Reset(args) => tools::reset(&ctx, &args),
        Commands::Bot(args) => bot::run(&ctx, args.action),
    }
}

fn print_overview(lang: Lang) {
    terminal::header(t(lang, "cli.title"));
    terminal::info(t(lang, "cli.tagline"));
    println!();
    terminal::info(t(lang, "cli.examples.title"));
    for key in [
        "cli.examples.chat_interactive",
        "cli.examples.chat_pipe",
        "cli.examples.resume",
        "cli.examples.bots",
        "cli.examples.configure",
    ] {
        println!("{}", t(lang, key));
        println!();
    }
    terminal::info(t(lang, "cli.examples.more"));
}

/// Ctrl+C at a prompt surfaces as an `Interrupted` I/O error.
fn is_interrupt(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::Interrupted)
    })
}

pub(crate) fn interrupted() -> ExitCode {
    ExitCode::from(EXIT_INTERRUPTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_args() {
        let cli = Cli::try_parse_from(["r9s"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.lang.is_none());
    }

    #[test]
    fn test_parse_chat_flags() {
        let cli = Cli::try_parse_from([
            "r9s",
            "chat",
            "-m",
            "gpt-x",
            "--ext",
            "trim",
            "--ext",
            "window:4",
            "--no-stream",
            "--timeout",
            "30",
            "--lang",
            "zh",
        ])
        .unwrap();
        let Some(Commands::Chat(args)) = cli.command else {
            panic!("Expected Chat command");
        };
        assert_eq!(args.model.as_deref(), Some("gpt-x"));
        assert_eq!(args.ext, vec!["trim", "window:4"]);
        assert!(args.no_stream);
        assert_eq!(args.timeout, Some(30));
        assert_eq!(args.mode, None);
        assert_eq!(cli.lang.as_deref(), Some("zh"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(Cli::try_parse_from(["r9s", "chat", "--timeout", "0"]).is_err());
        let cli = Cli::try_parse_from(["r9s", "chat", "--timeout", "1"]).unwrap();
        let Some(Commands::Chat(args)) = cli.command else {
            panic!("Expected Chat command");
        };
        assert_eq!(args.timeout, Some(1));
    }

    #[test]
    fn test_parse_chat_resume() {
        let cli = Cli::try_parse_from(["r9s", "chat", "resume", "--model", "m"]).unwrap();
        let Some(Commands::Chat(args)) = cli.command else {
            panic!("Expected Chat command");
        };
        assert_eq!(args.mode, Some(ChatMode::Resume));
        assert_eq!(args.model.as_deref(), Some("m"));
    }

    #[test]
    fn test_chat_conflicting_flags() {
        assert!(
            Cli::try_parse_from(["r9s", "chat", "--history-file", "a.json", "--no-history"])
                .is_err()
        );
        assert!(
            Cli::try_parse_from([
                "r9s",
                "chat",
                "--system-prompt",
                "x",
                "--system-prompt-file",
                "p.txt"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_parse_set_and_reset() {
        let cli = Cli::try_parse_from(["r9s", "set", "claude", "--model", "m", "-y"]).unwrap();
        let Some(Commands::Set(args)) = cli.command else {
            panic!("Expected Set command");
        };
        assert_eq!(args.tool.as_deref(), Some("claude"));
        assert!(args.yes);

        let cli = Cli::try_parse_from(["r9s", "reset"]).unwrap();
        let Some(Commands::Reset(args)) = cli.command else {
            panic!("Expected Reset command");
        };
        assert!(args.tool.is_none());
        assert!(!args.yes);
    }

    #[test]
    fn test_parse_bot_commands() {
        let cli = Cli::try_parse_from([
            "r9s",
            "bot",
            "create",
            "helper",
            "--model",
            "m",
            "--ext",
            "trim",
        ])
        .unwrap();
        let Some(Commands::Bot(BotArgs {
            action: BotAction::Create(args),
        })) = cli.command
        else {
            panic!("Expected bot create");
        };
        assert_eq!(args.name, "helper");
        assert_eq!(args.ext, vec!["trim"]);

        let cli = Cli::try_parse_from(["r9s", "bot", "delete", "helper", "--yes"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Bot(BotArgs {
                action: BotAction::Delete { yes: true, .. }
            }))
        ));
        assert!(Cli::try_parse_from(["r9s", "bot"]).is_err());
    }

    #[test]
    fn test_is_interrupt() {
        let err = anyhow::Error::from(std::io::Error::new(
            std::io::ErrorKind::Interrupted,
            "interrupted",
        ));
        assert!(is_interrupt(&err));
        let wrapped = anyhow::Error::from(crate::error::Error::from(std::io::Error::new(
            std::io::ErrorKind::Interrupted,
            "interrupted",
        )));
        assert!(is_interrupt(&wrapped));
        assert!(!is_interrupt(&anyhow::anyhow!("boom")));
    }
}
