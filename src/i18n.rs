//! User-facing strings in English and Simplified Chinese.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    En,
    ZhCn,
}

impl Lang {
    /// Normalise a language preference. Unknown or empty values are English.
    #[must_use]
    pub fn resolve(value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return Self::En;
        };
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == '_' { '-' } else { c })
            .collect();
        match normalized.as_str() {
            "zh" | "zh-cn" | "cn" => Self::ZhCn,
            _ => Self::En,
        }
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::ZhCn => "zh-CN",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

const EN: &[(&str, &str)] = &[
    ("cli.title", "r9s CLI"),
    (
        "cli.tagline",
        "Chat with r9s, manage bots, or configure local dev tools to use r9s.",
    ),
    ("cli.examples.title", "Common usage examples:"),
    (
        "cli.examples.chat_interactive",
        "  # Chat (interactive)\n  r9s chat --model \"$R9S_MODEL\"",
    ),
    (
        "cli.examples.chat_pipe",
        "  # Chat (pipe stdin)\n  echo \"hello\" | r9s chat --model \"$R9S_MODEL\"",
    ),
    ("cli.examples.resume", "  # Resume a session\n  r9s chat resume"),
    (
        "cli.examples.bots",
        "  # Bots\n  r9s bot create mybot --model \"$R9S_MODEL\" --system-prompt \"You are a helpful assistant\"\n  r9s chat --bot mybot\n  r9s bot list",
    ),
    (
        "cli.examples.configure",
        "  # Configure a tool\n  r9s set claude-code\n  r9s reset claude-code",
    ),
    ("cli.examples.more", "Run 'r9s -h' to see all options."),
    ("chat.title", "r9s chat"),
    ("chat.base_url", "base_url"),
    ("chat.model", "model"),
    ("chat.system_prompt_set", "system_prompt: (set)"),
    ("chat.extensions", "extensions"),
    ("chat.session", "session"),
    ("chat.commands.title", "Commands:"),
    ("chat.commands.exit", "  /exit   Exit"),
    (
        "chat.commands.clear",
        "  /clear  Clear session history (does not delete history-file)",
    ),
    ("chat.commands.help", "  /help   Show help"),
    ("chat.prompt.user", "You> "),
    ("chat.prompt.assistant", "Assistant> "),
    ("chat.msg.history_cleared", "Session history cleared."),
    (
        "chat.msg.default_base_url",
        "Using default base URL {url} (set R9S_BASE_URL or pass --base-url to change)",
    ),
    ("chat.msg.interrupted", "Interrupted."),
    ("chat.err.unknown_command", "Unknown command: {cmd} (try /help)"),
    ("chat.err.request_failed", "Request failed: {err}"),
    (
        "chat.err.hook_failed",
        "Extension '{ext}' failed in {hook}: {err} (value left unchanged)",
    ),
    (
        "chat.err.resume_requires_tty",
        "Resume requires an interactive TTY (no stdin piping).",
    ),
    ("chat.resume.none", "No saved sessions found in: {dir}"),
    (
        "chat.resume.select",
        "Select a session to resume (enter number): ",
    ),
    ("common.invalid_choice", "Invalid selection, try again."),
    ("common.cancelled", "Cancelled."),
    ("common.yes_no", " [y/N] "),
    ("set.select_tool", "Select a tool to configure:"),
    ("reset.select_tool", "Select a tool to reset:"),
    ("set.unknown_tool", "Unknown tool: {name}"),
    ("set.prompt.api_key", "API key: "),
    ("set.prompt.base_url", "Base URL [{default}]: "),
    ("set.prompt.model", "Model: "),
    (
        "set.select_model",
        "Select a model (enter number or type a model name): ",
    ),
    (
        "set.models_failed",
        "Could not fetch the model list ({err}); enter the model manually.",
    ),
    (
        "set.model_unverified",
        "Could not confirm model {model} on the server ({err}); using it anyway.",
    ),
    ("set.summary.title", "About to configure {tool}:"),
    ("set.summary.config", "config"),
    ("set.confirm", "Apply these changes?"),
    ("set.done", "Updated {path}"),
    ("set.backup", "Backup saved to {path}"),
    ("set.no_backup", "No existing config, nothing backed up."),
    ("reset.none", "No backups found for {tool} in {dir}"),
    (
        "reset.select",
        "Select a backup to restore (enter number, default 1): ",
    ),
    ("reset.confirm", "Restore {backup} over {path}?"),
    ("reset.done", "Restored {path} from {backup}"),
    ("bot.saved", "Saved bot '{name}' to {path}"),
    ("bot.none", "No bots found in {dir}"),
    ("bot.deleted", "Deleted bot '{name}'"),
    ("bot.confirm_delete", "Delete bot '{name}'?"),
];

const ZH_CN: &[(&str, &str)] = &[
    (
        "cli.tagline",
        "与 r9s 对话、管理 bot，或配置本地开发工具接入 r9s。",
    ),
    ("cli.examples.title", "常用用法示例："),
    (
        "cli.examples.chat_interactive",
        "  # 对话（交互）\n  r9s chat --model \"$R9S_MODEL\"",
    ),
    (
        "cli.examples.chat_pipe",
        "  # 对话（stdin 管道）\n  echo \"hello\" | r9s chat --model \"$R9S_MODEL\"",
    ),
    ("cli.examples.resume", "  # 恢复对话\n  r9s chat resume"),
    (
        "cli.examples.bots",
        "  # Bots\n  r9s bot create mybot --model \"$R9S_MODEL\" --system-prompt \"你是一个严谨的助手\"\n  r9s chat --bot mybot\n  r9s bot list",
    ),
    (
        "cli.examples.configure",
        "  # 配置工具\n  r9s set claude-code\n  r9s reset claude-code",
    ),
    ("cli.examples.more", "运行 'r9s -h' 查看全部选项。"),
    ("chat.system_prompt_set", "system_prompt：（已设置）"),
    ("chat.session", "会话"),
    ("chat.commands.title", "快捷命令："),
    ("chat.commands.exit", "  /exit   退出"),
    (
        "chat.commands.clear",
        "  /clear  清空本次会话历史（不删除 history-file）",
    ),
    ("chat.commands.help", "  /help   帮助"),
    ("chat.msg.history_cleared", "已清空本次会话历史。"),
    (
        "chat.msg.default_base_url",
        "使用默认 base URL {url}（可设置 R9S_BASE_URL 或传入 --base-url 修改）",
    ),
    ("chat.msg.interrupted", "已中断。"),
    ("chat.err.unknown_command", "未知命令: {cmd}（可用 /help）"),
    ("chat.err.request_failed", "请求失败: {err}"),
    (
        "chat.err.hook_failed",
        "扩展 '{ext}' 在 {hook} 中出错: {err}（保持原值）",
    ),
    (
        "chat.err.resume_requires_tty",
        "resume 需要交互式终端（不能通过 stdin 管道）。",
    ),
    ("chat.resume.none", "在此目录未找到可恢复会话: {dir}"),
    ("chat.resume.select", "选择要恢复的会话（输入编号）："),
    ("common.invalid_choice", "选择无效，请重试。"),
    ("common.cancelled", "已取消。"),
    ("set.select_tool", "选择要配置的工具："),
    ("reset.select_tool", "选择要恢复的工具："),
    ("set.unknown_tool", "未知工具: {name}"),
    ("set.prompt.base_url", "Base URL [{default}]："),
    ("set.prompt.model", "模型："),
    ("set.select_model", "选择模型（输入编号或模型名）："),
    (
        "set.models_failed",
        "无法获取模型列表（{err}），请手动输入模型。",
    ),
    (
        "set.model_unverified",
        "无法在服务器上确认模型 {model}（{err}），仍将使用。",
    ),
    ("set.summary.title", "即将配置 {tool}："),
    ("set.summary.config", "配置文件"),
    ("set.confirm", "确认应用以上修改？"),
    ("set.done", "已更新 {path}"),
    ("set.backup", "备份已保存到 {path}"),
    ("set.no_backup", "原配置不存在，未创建备份。"),
    ("reset.none", "未找到 {tool} 的备份（目录 {dir}）"),
    ("reset.select", "选择要恢复的备份（输入编号，默认 1）："),
    ("reset.confirm", "用 {backup} 覆盖 {path}？"),
    ("reset.done", "已从 {backup} 恢复 {path}"),
    ("bot.saved", "已保存 bot '{name}' 到 {path}"),
    ("bot.none", "在 {dir} 中没有 bot"),
    ("bot.deleted", "已删除 bot '{name}'"),
    ("bot.confirm_delete", "删除 bot '{name}'？"),
];

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Look up `key`, falling back to English and then to the key itself.
#[must_use]
pub fn t(lang: Lang, key: &'static str) -> &'static str {
    let table = match lang {
        Lang::En => EN,
        Lang::ZhCn => ZH_CN,
    };
    lookup(table, key).or_else(|| lookup(EN, key)).unwrap_or(key)
}

/// Look up `key` and substitute `{name}` placeholders.
#[must_use]
pub fn tf(lang: Lang, key: &'static str, args: &[(&str, &str)]) -> String {
    args.iter()
        .fold(t(lang, key).to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{name}}}"), value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_aliases() {
        assert_eq!(Lang::resolve(None), Lang::En);
        assert_eq!(Lang::resolve(Some("")), Lang::En);
        assert_eq!(Lang::resolve(Some("zh")), Lang::ZhCn);
        assert_eq!(Lang::resolve(Some("ZH_CN")), Lang::ZhCn);
        assert_eq!(Lang::resolve(Some(" zh-cn ")), Lang::ZhCn);
        assert_eq!(Lang::resolve(Some("cn")), Lang::ZhCn);
        assert_eq!(Lang::resolve(Some("en_US")), Lang::En);
        assert_eq!(Lang::resolve(Some("fr")), Lang::En);
    }

    #[test]
    fn test_fallback_to_english() {
        assert_eq!(t(Lang::ZhCn, "chat.prompt.user"), "You> ");
        assert_eq!(t(Lang::ZhCn, "chat.commands.exit"), "  /exit   退出");
        assert_eq!(t(Lang::En, "no.such.key"), "no.such.key");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            tf(Lang::En, "chat.err.unknown_command", &[("cmd", "/foo")]),
            "Unknown command: /foo (try /help)"
        );
        assert_eq!(
            tf(Lang::ZhCn, "chat.err.unknown_command", &[("cmd", "/foo")]),
            "未知命令: /foo（可用 /help）"
        );
    }

    #[test]
    fn test_every_zh_key_exists_in_english() {
        for (key, _) in ZH_CN {
            assert!(lookup(EN, key).is_some(), "missing English string for {key}");
        }
    }
}
