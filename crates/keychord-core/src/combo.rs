//! Combo definitions
//!
//! A combo is built from a [`ComboSpec`] (keys, flags and callbacks) and
//! becomes a [`Combo`] once the registry has validated it. The registry owns
//! every `Combo`; everything else refers to them by [`ComboId`].
//!
//! # Example
//!
//! ```ignore
//! let spec = ComboSpec::new("ctrl shift x")
//!     .exclusive(true)
//!     .on_keydown(|_event, _count, _repeat| println!("cut!"))
//!     .on_release(|_event, _count, _repeat| false);
//! let id = engine.register_combo(spec)?;
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::key::{join_keys, KeyEvent, KeyName};

// ============================================================================
// Identifiers and callback types
// ============================================================================

/// Handle to a registered combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComboId(pub(crate) u64);

impl ComboId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComboId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The three callback slots of a combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComboEvent {
    Keydown,
    Keyup,
    Release,
}

impl fmt::Display for ComboEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComboEvent::Keydown => write!(f, "keydown"),
            ComboEvent::Keyup => write!(f, "keyup"),
            ComboEvent::Release => write!(f, "release"),
        }
    }
}

/// What a callback says about the platform default action.
///
/// Only [`CallbackResult::AllowDefault`] lets the default through; anything
/// else asks for it to be suppressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallbackResult {
    AllowDefault,
    PreventDefault,
    #[default]
    Unspecified,
}

impl From<bool> for CallbackResult {
    fn from(allow_default: bool) -> Self {
        if allow_default {
            CallbackResult::AllowDefault
        } else {
            CallbackResult::PreventDefault
        }
    }
}

impl From<()> for CallbackResult {
    fn from(_: ()) -> Self {
        CallbackResult::Unspecified
    }
}

impl From<Option<bool>> for CallbackResult {
    fn from(value: Option<bool>) -> Self {
        value.map_or(CallbackResult::Unspecified, CallbackResult::from)
    }
}

/// A combo callback: `(triggering event, current count, is autorepeat)`.
pub type Callback = Box<dyn FnMut(&KeyEvent, u32, bool) -> CallbackResult>;

fn boxed<F, R>(mut f: F) -> Callback
where
    F: FnMut(&KeyEvent, u32, bool) -> R + 'static,
    R: Into<CallbackResult>,
{
    Box::new(move |event, count, is_autorepeat| f(event, count, is_autorepeat).into())
}

// ============================================================================
// Flags
// ============================================================================

/// Behaviour switches of a registered combo. All default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboFlags {
    /// Keys may be pressed in any order
    pub unordered: bool,
    /// Count repeated activations until release
    pub counting: bool,
    /// Replaces other active exclusive combos whose keys it covers
    pub exclusive: bool,
    /// Fires keyup only when exactly its own keys are held
    pub solitary: bool,
    /// Ordered key sequence rather than a chord
    pub sequence: bool,
    /// Request default-action suppression for every component key
    pub prevent_default: bool,
    /// Do not re-fire keydown on autorepeat
    pub prevent_repeat: bool,
    /// Ignore a held caps lock when matching
    pub normalize_caps_lock: bool,
}

/// Per-spec flag overrides. Unset flags fall back to the engine defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboOptions {
    pub unordered: Option<bool>,
    pub counting: Option<bool>,
    pub exclusive: Option<bool>,
    pub solitary: Option<bool>,
    pub sequence: Option<bool>,
    pub prevent_default: Option<bool>,
    pub prevent_repeat: Option<bool>,
    pub normalize_caps_lock: Option<bool>,
}

impl ComboOptions {
    pub fn resolve(&self, defaults: &ComboFlags) -> ComboFlags {
        ComboFlags {
            unordered: self.unordered.unwrap_or(defaults.unordered),
            counting: self.counting.unwrap_or(defaults.counting),
            exclusive: self.exclusive.unwrap_or(defaults.exclusive),
            solitary: self.solitary.unwrap_or(defaults.solitary),
            sequence: self.sequence.unwrap_or(defaults.sequence),
            prevent_default: self.prevent_default.unwrap_or(defaults.prevent_default),
            prevent_repeat: self.prevent_repeat.unwrap_or(defaults.prevent_repeat),
            normalize_caps_lock: self
                .normalize_caps_lock
                .unwrap_or(defaults.normalize_caps_lock),
        }
    }
}

// ============================================================================
// Key lists
// ============================================================================

/// Keys of a combo as written by the caller, before validation.
///
/// Strings are split on whitespace, so `"ctrl shift x"` and
/// `["ctrl", "shift", "x"]` are equivalent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyList(pub Vec<KeyName>);

impl KeyList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[KeyName] {
        &self.0
    }
}

impl From<&str> for KeyList {
    fn from(keys: &str) -> Self {
        KeyList(keys.split_whitespace().map(KeyName::parse).collect())
    }
}

impl From<String> for KeyList {
    fn from(keys: String) -> Self {
        KeyList::from(keys.as_str())
    }
}

impl From<&[&str]> for KeyList {
    fn from(keys: &[&str]) -> Self {
        KeyList(keys.iter().map(|k| KeyName::parse(k)).collect())
    }
}

impl<const N: usize> From<[&str; N]> for KeyList {
    fn from(keys: [&str; N]) -> Self {
        KeyList::from(&keys[..])
    }
}

impl From<Vec<&str>> for KeyList {
    fn from(keys: Vec<&str>) -> Self {
        KeyList::from(keys.as_slice())
    }
}

impl From<Vec<KeyName>> for KeyList {
    fn from(keys: Vec<KeyName>) -> Self {
        KeyList(keys.iter().map(|k| KeyName::parse(k.as_str())).collect())
    }
}

// ============================================================================
// ComboSpec (builder)
// ============================================================================

/// Declarative description of a combo, consumed by registration.
#[derive(Default)]
pub struct ComboSpec {
    pub(crate) keys: KeyList,
    pub(crate) options: ComboOptions,
    pub(crate) label: Option<String>,
    pub(crate) on_keydown: Option<Callback>,
    pub(crate) on_keyup: Option<Callback>,
    pub(crate) on_release: Option<Callback>,
}

impl ComboSpec {
    pub fn new(keys: impl Into<KeyList>) -> Self {
        Self {
            keys: keys.into(),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> &[KeyName] {
        self.keys.as_slice()
    }

    pub fn options(&self) -> &ComboOptions {
        &self.options
    }

    /// Replace all flag overrides at once.
    pub fn with_options(mut self, options: ComboOptions) -> Self {
        self.options = options;
        self
    }

    /// A human-readable name used in logs and reports.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn unordered(mut self, value: bool) -> Self {
        self.options.unordered = Some(value);
        self
    }

    pub fn counting(mut self, value: bool) -> Self {
        self.options.counting = Some(value);
        self
    }

    pub fn exclusive(mut self, value: bool) -> Self {
        self.options.exclusive = Some(value);
        self
    }

    pub fn solitary(mut self, value: bool) -> Self {
        self.options.solitary = Some(value);
        self
    }

    pub fn sequence(mut self, value: bool) -> Self {
        self.options.sequence = Some(value);
        self
    }

    pub fn prevent_default(mut self, value: bool) -> Self {
        self.options.prevent_default = Some(value);
        self
    }

    pub fn prevent_repeat(mut self, value: bool) -> Self {
        self.options.prevent_repeat = Some(value);
        self
    }

    pub fn normalize_caps_lock(mut self, value: bool) -> Self {
        self.options.normalize_caps_lock = Some(value);
        self
    }

    pub fn on_keydown<F, R>(mut self, f: F) -> Self
    where
        F: FnMut(&KeyEvent, u32, bool) -> R + 'static,
        R: Into<CallbackResult>,
    {
        self.on_keydown = Some(boxed(f));
        self
    }

    pub fn on_keyup<F, R>(mut self, f: F) -> Self
    where
        F: FnMut(&KeyEvent, u32, bool) -> R + 'static,
        R: Into<CallbackResult>,
    {
        self.on_keyup = Some(boxed(f));
        self
    }

    pub fn on_release<F, R>(mut self, f: F) -> Self
    where
        F: FnMut(&KeyEvent, u32, bool) -> R + 'static,
        R: Into<CallbackResult>,
    {
        self.on_release = Some(boxed(f));
        self
    }
}

impl fmt::Debug for ComboSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComboSpec")
            .field("keys", &self.keys)
            .field("options", &self.options)
            .field("label", &self.label)
            .field("on_keydown", &self.on_keydown.is_some())
            .field("on_keyup", &self.on_keyup.is_some())
            .field("on_release", &self.on_release.is_some())
            .finish()
    }
}

// ============================================================================
// Combo (registered)
// ============================================================================

/// A registered combo together with its runtime state.
pub struct Combo {
    pub(crate) id: ComboId,
    pub(crate) keys: Vec<KeyName>,
    pub(crate) flags: ComboFlags,
    pub(crate) label: Option<String>,
    pub(crate) on_keydown: Option<Callback>,
    pub(crate) on_keyup: Option<Callback>,
    pub(crate) on_release: Option<Callback>,
    pub(crate) count: u32,
    /// `None` until the combo first activates; `Some(true)` once keyup fired
    /// for the current activation.
    pub(crate) keyup_fired: Option<bool>,
}

impl Combo {
    pub fn id(&self) -> ComboId {
        self.id
    }

    pub fn keys(&self) -> &[KeyName] {
        &self.keys
    }

    pub fn flags(&self) -> &ComboFlags {
        &self.flags
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Label if one was given, otherwise the keys joined by spaces.
    pub fn display_name(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| join_keys(&self.keys))
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn keyup_fired(&self) -> Option<bool> {
        self.keyup_fired
    }

    pub fn contains(&self, key: &KeyName) -> bool {
        self.keys.contains(key)
    }

    pub fn has_callback(&self, event: ComboEvent) -> bool {
        match event {
            ComboEvent::Keydown => self.on_keydown.is_some(),
            ComboEvent::Keyup => self.on_keyup.is_some(),
            ComboEvent::Release => self.on_release.is_some(),
        }
    }

    /// Autorepeat keydowns are only delivered to combos that want them.
    pub fn allows_key_repeat(&self) -> bool {
        !self.flags.prevent_repeat && self.on_keydown.is_some()
    }

    pub(crate) fn callback_mut(&mut self, event: ComboEvent) -> Option<&mut Callback> {
        match event {
            ComboEvent::Keydown => self.on_keydown.as_mut(),
            ComboEvent::Keyup => self.on_keyup.as_mut(),
            ComboEvent::Release => self.on_release.as_mut(),
        }
    }

    /// Clear activation state after the combo leaves the active list.
    pub(crate) fn reset(&mut self) {
        self.count = 0;
        self.keyup_fired = None;
    }
}

impl fmt::Debug for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Combo")
            .field("id", &self.id)
            .field("keys", &self.keys)
            .field("flags", &self.flags)
            .field("label", &self.label)
            .field("count", &self.count)
            .field("keyup_fired", &self.keyup_fired)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.display_name())
    }
}
