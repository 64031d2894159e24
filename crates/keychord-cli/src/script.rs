//! Key script format
//!
//! One command per line, `#` starts a comment:
//!
//! ```text
//! down ctrl
//! down s          # modifier flags follow the held keys
//! up s +ctrl      # or are given explicitly
//! tap g           # down then up
//! wait 900        # milliseconds
//! blur            # focus loss
//! pause
//! resume
//! ```

use std::time::Duration;

use anyhow::{bail, Context, Result};
use keychord_core::{KeyName, Modifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Down {
        key: KeyName,
        modifiers: Option<Modifiers>,
    },
    Up {
        key: KeyName,
        modifiers: Option<Modifiers>,
    },
    Tap {
        key: KeyName,
        modifiers: Option<Modifiers>,
    },
    Wait(Duration),
    Blur,
    Pause,
    Resume,
}

/// A parsed command with the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub line: usize,
    pub text: String,
    pub command: Command,
}

/// Parse a whole script. Blank and comment-only lines are skipped.
pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>> {
    let mut lines = Vec::new();

    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        let command =
            parse_line(text).with_context(|| format!("Invalid script line {}: {:?}", line, text))?;
        if let Some(command) = command {
            lines.push(ScriptLine {
                line,
                text: strip_comment(text).trim().to_string(),
                command,
            });
        }
    }

    Ok(lines)
}

/// Parse a single line. Returns `None` for blank and comment-only lines.
pub fn parse_line(text: &str) -> Result<Option<Command>> {
    let mut words = strip_comment(text).split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let verb = verb.to_ascii_lowercase();
    let command = match verb.as_str() {
        "down" | "up" | "tap" => {
            let key = words
                .next()
                .with_context(|| format!("`{}` needs a key name", verb))?;
            let key = KeyName::parse(key);
            let modifiers = parse_modifiers(words)?;
            match verb.as_str() {
                "down" => Command::Down { key, modifiers },
                "up" => Command::Up { key, modifiers },
                _ => Command::Tap { key, modifiers },
            }
        }
        "wait" => {
            let ms = words.next().context("`wait` needs a duration in milliseconds")?;
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("Invalid duration: {}", ms))?;
            expect_end(words)?;
            Command::Wait(Duration::from_millis(ms))
        }
        "blur" => {
            expect_end(words)?;
            Command::Blur
        }
        "pause" => {
            expect_end(words)?;
            Command::Pause
        }
        "resume" => {
            expect_end(words)?;
            Command::Resume
        }
        other => bail!("Unknown command: {}", other),
    };

    Ok(Some(command))
}

/// A `#` at the start of a line or after whitespace begins a comment.
fn strip_comment(text: &str) -> &str {
    text.char_indices()
        .find(|&(i, c)| c == '#' && (i == 0 || text[..i].ends_with(char::is_whitespace)))
        .map_or(text, |(i, _)| &text[..i])
}

/// `+shift +ctrl +alt +meta`, or `+none` for an event reporting no modifiers.
fn parse_modifiers<'a>(words: impl Iterator<Item = &'a str>) -> Result<Option<Modifiers>> {
    let mut modifiers: Option<Modifiers> = None;

    for word in words {
        let Some(flag) = word.strip_prefix('+') else {
            bail!("Expected a modifier flag like +shift, got {}", word);
        };
        let state = modifiers.get_or_insert(Modifiers::NONE);
        match flag.to_ascii_lowercase().as_str() {
            "shift" => state.shift = true,
            "ctrl" | "control" => state.ctrl = true,
            "alt" | "option" => state.alt = true,
            "meta" | "cmd" => state.meta = true,
            "none" => {}
            other => bail!("Unknown modifier flag: +{}", other),
        }
    }

    Ok(modifiers)
}

fn expect_end<'a>(mut words: impl Iterator<Item = &'a str>) -> Result<()> {
    match words.next() {
        Some(extra) => bail!("Unexpected argument: {}", extra),
        None => Ok(()),
    }
}
