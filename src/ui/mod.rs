//! Terminal prompts.
//!
//! Menus, text inputs, confirmations and checklists go through the
//! [`Prompter`] trait so the navigation flow does not care whether it talks
//! to a terminal or to a test script.

use anyhow::Result;
use std::io::{self, BufRead, Write};
use terminal_size::{terminal_size, Width};

/// Languages offered when recording audio and subtitle tracks.
pub const LANGUAGES: &[&str] = &[
    "Japanese",
    "English",
    "Spanish",
    "Portuguese",
    "French",
    "German",
    "Italian",
    "Russian",
    "Arabic",
    "Chinese",
    "Korean",
    "Polish",
    "Turkish",
    "Indonesian",
    "Thai",
    "Vietnamese",
];

/// Title styles selectable from the settings menu, as ANSI SGR parameters.
pub const THEMES: &[(&str, &str)] = &[
    ("default", "1;4"),
    ("blue", "1;34"),
    ("green", "1;32"),
    ("magenta", "1;35"),
];

const DEFAULT_WIDTH: usize = 80;
const MIN_LABEL_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub tag: String,
    pub label: String,
}

impl MenuItem {
    pub fn new(tag: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            label: label.into(),
        }
    }

    /// Item whose tag is also what the user sees.
    pub fn plain(tag: impl Into<String>) -> Self {
        Self::new(tag, "")
    }
}

pub trait Prompter {
    /// Returns the chosen tag, or `None` when the user backs out.
    fn menu(&mut self, title: &str, text: &str, items: &[MenuItem]) -> Result<Option<String>>;

    /// Returns the entered text, or `None` when the user backs out or enters
    /// nothing.
    fn input(&mut self, title: &str, text: &str, default: Option<&str>, secret: bool) -> Result<Option<String>>;

    fn yes_no(&mut self, title: &str, text: &str, default_yes: bool) -> Result<bool>;

    /// Multi-select over `items`. Backing out selects nothing.
    fn checklist(&mut self, title: &str, text: &str, items: &[&str]) -> Result<Vec<String>>;

    fn message(&mut self, title: &str, text: &str) -> Result<()>;

    /// Status line shown while a network call is in flight.
    fn busy(&mut self, text: &str);

    fn set_backtitle(&mut self, backtitle: &str);

    fn apply_theme(&mut self, _enabled: bool, _theme: &str) {}

    /// Usable terminal width in columns.
    fn width(&self) -> usize;
}

/// Shortens `text` to `max` characters, marking the cut with `..`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let mut short: String = text.chars().take(max).collect();
        short.push_str("..");
        short
    } else {
        text.to_string()
    }
}

/// Room left for a menu label once `reserved` columns of chrome are taken.
pub fn label_width(terminal_width: usize, reserved: usize) -> usize {
    terminal_width.saturating_sub(reserved).max(MIN_LABEL_WIDTH)
}

fn theme_style(theme: &str) -> &'static str {
    THEMES
        .iter()
        .find(|(name, _)| *name == theme)
        .map_or(THEMES[0].1, |(_, style)| *style)
}

/// `COLUMNS` wins over the size reported by the terminal.
fn width_from(columns: Option<&str>, tty_columns: Option<usize>) -> usize {
    columns
        .and_then(|c| c.trim().parse().ok())
        .filter(|&c: &usize| c > 0)
        .or(tty_columns.filter(|&c| c > 0))
        .unwrap_or(DEFAULT_WIDTH)
}

pub fn terminal_width() -> usize {
    let columns = std::env::var("COLUMNS").ok();
    let tty_columns = terminal_size().map(|(Width(w), _)| usize::from(w));
    width_from(columns.as_deref(), tty_columns)
}

/// Reads one line without echoing it.
pub type SecretReader = fn() -> io::Result<String>;

/// Line-oriented prompter. An empty answer means "back".
pub struct StdioPrompter<R, W> {
    input: R,
    output: W,
    style: Option<&'static str>,
    backtitle: String,
    width: usize,
    secret_reader: Option<SecretReader>,
}

impl<R: BufRead, W: Write> StdioPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            style: None,
            backtitle: String::new(),
            width: terminal_width(),
            secret_reader: None,
        }
    }

    /// Reads secret answers from the terminal with echo off. Only useful when
    /// stdin is a TTY.
    pub fn hiding_secrets(self) -> Self {
        self.with_secret_reader(rpassword::read_password)
    }

    pub fn with_secret_reader(mut self, reader: SecretReader) -> Self {
        self.secret_reader = Some(reader);
        self
    }

    fn header(&mut self, title: &str) -> Result<()> {
        writeln!(self.output)?;
        if !self.backtitle.is_empty() {
            writeln!(self.output, "{}", self.backtitle)?;
        }
        if let Some(style) = self.style {
            writeln!(self.output, "\x1b[{}m{}\x1b[0m", style, title)?;
        } else {
            writeln!(self.output, "{}", title)?;
            writeln!(self.output, "{}", "-".repeat(title.chars().count()))?;
        }
        Ok(())
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            // EOF behaves like backing out.
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> Prompter for StdioPrompter<R, W> {
    fn menu(&mut self, title: &str, text: &str, items: &[MenuItem]) -> Result<Option<String>> {
        self.header(title)?;
        writeln!(self.output, "{}", text)?;
        let tag_width = items.iter().map(|i| i.tag.chars().count()).max().unwrap_or(0);
        for item in items {
            writeln!(self.output, "  {:<width$}  {}", item.tag, item.label, width = tag_width)?;
        }

        loop {
            let Some(answer) = self.read_line("> ")? else {
                return Ok(None);
            };
            if answer.is_empty() {
                return Ok(None);
            }
            if let Some(item) = items.iter().find(|i| i.tag.eq_ignore_ascii_case(&answer)) {
                return Ok(Some(item.tag.clone()));
            }
            writeln!(self.output, "Unknown option: {}", answer)?;
        }
    }

    fn input(&mut self, title: &str, text: &str, default: Option<&str>, secret: bool) -> Result<Option<String>> {
        self.header(title)?;
        writeln!(self.output, "{}", text)?;
        let prompt = match default {
            Some(default) => format!("[{}] > ", default),
            None => "> ".to_string(),
        };

        let answer = match self.secret_reader.filter(|_| secret) {
            Some(read_secret) => {
                write!(self.output, "{}", prompt)?;
                self.output.flush()?;
                Some(read_secret()?.trim().to_string())
            }
            None => self.read_line(&prompt)?,
        };

        match answer {
            Some(answer) if !answer.is_empty() => Ok(Some(answer)),
            Some(_) => Ok(default.map(str::to_string)),
            None => Ok(None),
        }
    }

    fn yes_no(&mut self, title: &str, text: &str, default_yes: bool) -> Result<bool> {
        self.header(title)?;
        writeln!(self.output, "{}", text)?;
        let prompt = if default_yes { "[Y/n] > " } else { "[y/N] > " };

        loop {
            let Some(answer) = self.read_line(prompt)? else {
                return Ok(false);
            };
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default_yes),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }

    fn checklist(&mut self, title: &str, text: &str, items: &[&str]) -> Result<Vec<String>> {
        self.header(title)?;
        writeln!(self.output, "{}", text)?;
        for (index, item) in items.iter().enumerate() {
            writeln!(self.output, "  {:>2}  {}", index + 1, item)?;
        }
        writeln!(self.output, "Enter numbers separated by commas.")?;

        'ask: loop {
            let Some(answer) = self.read_line("> ")? else {
                return Ok(Vec::new());
            };

            let mut picked: Vec<String> = Vec::new();
            for part in answer.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match part.parse::<usize>().ok().and_then(|n| items.get(n.wrapping_sub(1))) {
                    Some(item) => {
                        if !picked.iter().any(|p| p == item) {
                            picked.push(item.to_string());
                        }
                    }
                    None => {
                        writeln!(self.output, "Unknown option: {}", part)?;
                        continue 'ask;
                    }
                }
            }
            return Ok(picked);
        }
    }

    fn message(&mut self, title: &str, text: &str) -> Result<()> {
        self.header(title)?;
        writeln!(self.output, "{}", text)?;
        self.read_line("(press Enter) ")?;
        Ok(())
    }

    fn busy(&mut self, text: &str) {
        // Status output is best effort.
        let _ = writeln!(self.output, "{}", text);
        let _ = self.output.flush();
    }

    fn set_backtitle(&mut self, backtitle: &str) {
        self.backtitle = backtitle.to_string();
    }

    fn apply_theme(&mut self, enabled: bool, theme: &str) {
        self.style = enabled.then(|| theme_style(theme));
    }

    fn width(&self) -> usize {
        self.width
    }
}
