//! Canonical key names
//!
//! Every key the engine reasons about is a [`KeyName`]: a lowercase canonical
//! identifier such as `a`, `shift`, `num_1` or `/`. The vocabulary is closed;
//! [`KeyName::is_valid`] is a membership test against it.
//!
//! ## Aliases
//!
//! Some keys are commonly spelled more than one way. Registration resolves
//! these to the canonical name before anything is stored:
//!
//! - `escape` -> `esc`
//! - `control` -> `ctrl`
//! - `command` / `windows` -> `cmd`
//! - `option` -> `alt`
//! - `caps_lock` -> `caps`
//!
//! ## Shifted keys
//!
//! Symbol keys have a shifted counterpart (`/` -> `?`, `1` -> `!`, ...). An
//! event source reports the unshifted key plus a shift flag; the engine
//! translates that into the shifted name so combos can bind either one.
//!
//! ## Meta key
//!
//! `meta` is not a physical key. It names the platform's primary modifier,
//! which is `cmd` on macOS and `ctrl` everywhere else (see [`MetaKey`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Well-known names
// ============================================================================

pub const SHIFT: &str = "shift";
pub const CTRL: &str = "ctrl";
pub const ALT: &str = "alt";
pub const CMD: &str = "cmd";
pub const META: &str = "meta";
pub const CAPS: &str = "caps";
pub const TAB: &str = "tab";

/// Keys treated as modifiers when validating meta/cmd combos.
pub const MODIFIER_KEYS: &[&str] = &[META, ALT, "option", CTRL, SHIFT, CMD];

/// Every canonical unshifted key name.
const KEY_NAMES: &[&str] = &[
    // Editing and whitespace
    "backspace", "tab", "enter", "space", "esc", "pause", "print", "insert", "delete",
    // Modifiers and locks
    "shift", "ctrl", "alt", "cmd", "caps", "num", "scroll",
    // Navigation
    "pageup", "pagedown", "end", "home", "left", "up", "right", "down",
    // Digits
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
    // Letters
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q",
    "r", "s", "t", "u", "v", "w", "x", "y", "z",
    // Numpad
    "num_0", "num_1", "num_2", "num_3", "num_4", "num_5", "num_6", "num_7", "num_8",
    "num_9", "num_multiply", "num_add", "num_enter", "num_subtract", "num_decimal",
    "num_divide",
    // Function keys
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
    // Symbols
    ";", "=", ",", "-", ".", "/", "`", "[", "\\", "]", "'",
];

/// Unshifted key -> the symbol produced while shift is held.
const SHIFTED_KEYS: &[(&str, &str)] = &[
    ("/", "?"),
    (".", ">"),
    (",", "<"),
    ("'", "\""),
    (";", ":"),
    ("[", "{"),
    ("]", "}"),
    ("\\", "|"),
    ("`", "~"),
    ("=", "+"),
    ("-", "_"),
    ("1", "!"),
    ("2", "@"),
    ("3", "#"),
    ("4", "$"),
    ("5", "%"),
    ("6", "^"),
    ("7", "&"),
    ("8", "*"),
    ("9", "("),
    ("0", ")"),
];

/// Alternate spellings accepted at registration time.
const ALTERNATE_NAMES: &[(&str, &str)] = &[
    ("escape", "esc"),
    ("control", "ctrl"),
    ("command", "cmd"),
    ("break", "pause"),
    ("windows", "cmd"),
    ("option", "alt"),
    ("caps_lock", "caps"),
    ("apostrophe", "'"),
    ("semicolon", ";"),
    ("tilde", "~"),
    ("accent", "`"),
    ("scroll_lock", "scroll"),
    ("num_lock", "num"),
];

/// Return the symbol produced by `name` while shift is held, if any.
pub fn shifted_key(name: &str) -> Option<&'static str> {
    SHIFTED_KEYS
        .iter()
        .find(|(unshifted, _)| *unshifted == name)
        .map(|(_, shifted)| *shifted)
}

/// Resolve an alternate spelling to its canonical name.
///
/// Names without an alias are returned unchanged.
pub fn canonical_name(name: &str) -> &str {
    ALTERNATE_NAMES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// Check whether `name` belongs to the key vocabulary (shifted symbols included).
pub fn is_valid_key(name: &str) -> bool {
    KEY_NAMES.contains(&name) || SHIFTED_KEYS.iter().any(|(_, shifted)| *shifted == name)
}

// ============================================================================
// KeyName
// ============================================================================

/// A canonical key identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyName(String);

impl KeyName {
    /// Wrap a name as-is. No alias resolution or validation happens here.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Normalize user input: trim, lowercase ASCII letters, resolve aliases.
    ///
    /// `meta` is left alone; it is substituted at registration time once the
    /// platform meta key is known.
    pub fn parse(input: &str) -> Self {
        let lowered = input.trim().to_ascii_lowercase();
        Self(canonical_name(&lowered).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        is_valid_key(&self.0)
    }

    pub fn is_modifier(&self) -> bool {
        MODIFIER_KEYS.contains(&self.0.as_str())
    }

    pub fn is_meta(&self) -> bool {
        self.0 == META
    }

    /// The key produced when this key is pressed with shift held.
    pub fn shifted(&self) -> Option<KeyName> {
        shifted_key(&self.0).map(KeyName::from)
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for KeyName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for KeyName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for KeyName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for KeyName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Join key names with spaces, the same format combos are written in.
pub fn join_keys(keys: &[KeyName]) -> String {
    keys.iter()
        .map(KeyName::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Meta key
// ============================================================================

/// The platform's primary modifier, which `meta` resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaKey {
    Ctrl,
    Cmd,
}

impl MetaKey {
    /// Pick the meta key for the platform this binary was built for.
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            MetaKey::Cmd
        } else {
            MetaKey::Ctrl
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetaKey::Ctrl => CTRL,
            MetaKey::Cmd => CMD,
        }
    }

    pub fn key_name(self) -> KeyName {
        KeyName::from(self.as_str())
    }
}

impl Default for MetaKey {
    fn default() -> Self {
        Self::detect()
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetaKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical_name(&s.to_ascii_lowercase()) {
            "ctrl" => Ok(MetaKey::Ctrl),
            "cmd" => Ok(MetaKey::Cmd),
            "auto" => Ok(MetaKey::detect()),
            other => Err(format!("Unknown meta key: {} (expected ctrl, cmd or auto)", other)),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Modifier state reported alongside every key transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
    /// The platform meta/command flag; maps to the `cmd` key.
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        alt: false,
        ctrl: false,
        shift: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    /// Modifier keys paired with whether this state reports them held.
    pub fn flags(&self) -> [(&'static str, bool); 4] {
        [
            (CMD, self.meta),
            (CTRL, self.ctrl),
            (SHIFT, self.shift),
            (ALT, self.alt),
        ]
    }
}

/// A normalized key transition, as handed to the engine by the event source
/// and forwarded to every callback it triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: KeyName,
    pub is_keydown: bool,
    pub modifiers: Modifiers,
    /// Set on key-ups the engine generates itself (focus loss, cmd chords).
    #[serde(default)]
    pub synthetic: bool,
}

impl KeyEvent {
    pub fn down(key: impl Into<KeyName>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            is_keydown: true,
            modifiers,
            synthetic: false,
        }
    }

    pub fn up(key: impl Into<KeyName>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            is_keydown: false,
            modifiers,
            synthetic: false,
        }
    }

    pub(crate) fn synthetic_up(key: KeyName, modifiers: Modifiers) -> Self {
        Self {
            key,
            is_keydown: false,
            modifiers,
            synthetic: true,
        }
    }
}
