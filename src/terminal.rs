//! Plain terminal output and line prompts for the non-chat commands.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Stylize};
use crossterm::terminal;
use std::io::{self, BufRead, IsTerminal, Write};

fn paint(text: &str, color: Color, bold: bool, tty: bool) -> String {
    if !tty {
        return text.to_string();
    }
    let styled = text.with(color);
    if bold {
        styled.bold().to_string()
    } else {
        styled.to_string()
    }
}

fn say(text: &str, color: Color, bold: bool) {
    println!("{}", paint(text, color, bold, io::stdout().is_terminal()));
}

pub fn header(msg: &str) {
    say(msg, Color::Cyan, true);
}

pub fn info(msg: &str) {
    say(msg, Color::Cyan, false);
}

pub fn success(msg: &str) {
    say(msg, Color::Green, false);
}

pub fn warning(msg: &str) {
    say(msg, Color::Yellow, false);
}

/// Diagnostics go to stderr so piped stdout stays clean.
pub fn notice(msg: &str) {
    eprintln!(
        "{}",
        paint(msg, Color::Yellow, false, io::stderr().is_terminal())
    );
}

pub fn error(msg: &str) {
    eprintln!("{}", paint(msg, Color::Red, false, io::stderr().is_terminal()));
}

/// Render an API key as its first and last four characters.
#[must_use]
pub fn masked_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

/// Print `prompt` and read one trimmed line. `None` at end of input.
pub fn read_line<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    prompt: &str,
) -> io::Result<Option<String>> {
    write!(out, "{prompt}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Parse a 1-based menu number.
#[must_use]
pub fn parse_index(text: &str, len: usize) -> Option<usize> {
    match text.trim().parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// Print a numbered menu and read a selection, re-asking on bad input.
/// An empty answer picks `default` when one is given.
pub fn prompt_choice<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    items: &[String],
    prompt: &str,
    invalid: &str,
    default: Option<usize>,
) -> io::Result<Option<usize>> {
    for (i, item) in items.iter().enumerate() {
        writeln!(out, "  {}) {item}", i + 1)?;
    }
    loop {
        let Some(answer) = read_line(input, out, prompt)? else {
            return Ok(None);
        };
        if answer.is_empty()
            && let Some(d) = default
        {
            return Ok(Some(d));
        }
        if let Some(i) = parse_index(&answer, items.len()) {
            return Ok(Some(i));
        }
        writeln!(out, "{invalid}")?;
    }
}

/// Ask a yes/no question; only `y`/`yes` confirm.
pub fn prompt_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    question: &str,
    suffix: &str,
) -> io::Result<bool> {
    let answer = read_line(input, out, &format!("{question}{suffix}"))?;
    Ok(matches!(
        answer.map(|a| a.to_lowercase()).as_deref(),
        Some("y" | "yes")
    ))
}

/// Read a secret from the terminal, echoing `*` per character.
///
/// Falls back to a plain line read when stdin is not a terminal.
pub fn prompt_secret(prompt: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    if !io::stdin().is_terminal() {
        let mut stdin = io::stdin().lock();
        return Ok(read_line(&mut stdin, &mut stdout, prompt)?.unwrap_or_default());
    }

    write!(stdout, "{prompt}")?;
    stdout.flush()?;
    terminal::enable_raw_mode()?;
    let result = read_secret_raw(&mut stdout);
    terminal::disable_raw_mode()?;
    write!(stdout, "\r\n")?;
    stdout.flush()?;
    result.map(|s| s.trim().to_string())
}

fn read_secret_raw<W: Write>(out: &mut W) -> io::Result<String> {
    let mut secret = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }
        match code {
            KeyCode::Enter => return Ok(secret),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
            }
            KeyCode::Backspace => {
                if secret.pop().is_some() {
                    write!(out, "\x08 \x08")?;
                }
            }
            KeyCode::Char(c) => {
                secret.push(c);
                write!(out, "*")?;
            }
            _ => continue,
        }
        out.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_masked_key() {
        assert_eq!(masked_key("abcd1234wxyz"), "abcd***wxyz");
        assert_eq!(masked_key("abc"), "***");
        assert_eq!(masked_key("abcd"), "****");
        assert_eq!(masked_key("abcdef"), "abcd***cdef");
    }

    #[test]
    fn test_paint_plain_when_not_tty() {
        assert_eq!(paint("hi", Color::Red, true, false), "hi");
        assert!(paint("hi", Color::Red, false, true).contains("hi"));
    }

    #[test]
    fn test_read_line_eof() {
        let mut input = Cursor::new("");
        let mut out = Vec::new();
        assert_eq!(read_line(&mut input, &mut out, "> ").unwrap(), None);
        assert_eq!(out, b"> ");
    }

    #[test]
    fn test_prompt_choice_retries_then_accepts() {
        let items = vec!["one".to_string(), "two".to_string()];
        let mut input = Cursor::new("9\nx\n2\n");
        let mut out = Vec::new();
        let choice = prompt_choice(&mut input, &mut out, &items, "pick: ", "bad", None).unwrap();
        assert_eq!(choice, Some(1));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("  1) one"));
        assert_eq!(text.matches("bad").count(), 2);
    }

    #[test]
    fn test_prompt_choice_default_on_empty() {
        let items = vec!["newest".to_string(), "older".to_string()];
        let mut input = Cursor::new("\n");
        let mut out = Vec::new();
        let choice = prompt_choice(&mut input, &mut out, &items, "pick: ", "bad", Some(0)).unwrap();
        assert_eq!(choice, Some(0));
    }

    #[test]
    fn test_prompt_yes_no() {
        let mut out = Vec::new();
        assert!(prompt_yes_no(&mut Cursor::new("Y\n"), &mut out, "ok?", " [y/N] ").unwrap());
        assert!(!prompt_yes_no(&mut Cursor::new("\n"), &mut out, "ok?", " [y/N] ").unwrap());
        assert!(!prompt_yes_no(&mut Cursor::new(""), &mut out, "ok?", " [y/N] ").unwrap());
    }
}
