//! Workaround for keys pressed while `cmd` is held
//!
//! On platforms where `cmd` is the meta key, the OS swallows the key-up of any
//! non-modifier key pressed while `cmd` is down. Left alone, such keys would
//! stay in the pressed set forever. The policy does two things while enabled
//! and `cmd` is held:
//!
//! - combos that do not themselves contain `cmd` are filtered out of matching
//! - a non-modifier key-down is immediately followed by a synthetic key-up
//!
//! Whether the quirk exists depends on the platform, so the policy is an
//! explicit engine setting rather than part of the matcher.

use crate::key::{KeyName, MetaKey, ALT, CAPS, CMD, SHIFT, TAB};
use crate::pressed::PressedKeys;

/// Keys that keep their own key-up while `cmd` is held.
const KEYS_WITH_RELIABLE_KEYUP: &[&str] = &[CMD, SHIFT, ALT, CAPS, TAB];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CmdChordPolicy {
    enabled: bool,
}

impl CmdChordPolicy {
    pub fn enabled() -> Self {
        Self { enabled: true }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Enable the workaround exactly when `cmd` is the meta key.
    pub fn for_meta_key(meta_key: MetaKey) -> Self {
        Self {
            enabled: meta_key == MetaKey::Cmd,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a combo may take part in matching given the held keys.
    pub fn allows(&self, pressed: &PressedKeys, combo_keys: &[KeyName]) -> bool {
        !(self.enabled
            && pressed.contains_name(CMD)
            && !combo_keys.iter().any(|key| key == CMD))
    }

    /// Whether the engine must synthesize a key-up right after `key` went down.
    pub fn needs_synthetic_keyup(&self, pressed: &PressedKeys, key: &KeyName) -> bool {
        self.enabled
            && pressed.contains_name(CMD)
            && !KEYS_WITH_RELIABLE_KEYUP.contains(&key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(keys: &[&str]) -> PressedKeys {
        let mut pressed = PressedKeys::new();
        for key in keys {
            pressed.insert(KeyName::from(*key));
        }
        pressed
    }

    fn names(keys: &[&str]) -> Vec<KeyName> {
        keys.iter().map(|k| KeyName::from(*k)).collect()
    }

    #[test]
    fn test_disabled_policy_allows_everything() {
        let policy = CmdChordPolicy::disabled();
        let pressed = held(&["cmd"]);
        assert!(policy.allows(&pressed, &names(&["a"])));
        assert!(!policy.needs_synthetic_keyup(&pressed, &KeyName::from("a")));
    }

    #[test]
    fn test_filters_combos_without_cmd_while_cmd_held() {
        let policy = CmdChordPolicy::enabled();
        let pressed = held(&["cmd"]);
        assert!(!policy.allows(&pressed, &names(&["a"])));
        assert!(policy.allows(&pressed, &names(&["cmd", "a"])));
        assert!(policy.allows(&held(&["ctrl"]), &names(&["a"])));
    }

    #[test]
    fn test_synthetic_keyup_skips_modifiers() {
        let policy = CmdChordPolicy::enabled();
        let pressed = held(&["cmd", "a"]);
        assert!(policy.needs_synthetic_keyup(&pressed, &KeyName::from("a")));
        assert!(!policy.needs_synthetic_keyup(&pressed, &KeyName::from("shift")));
        assert!(!policy.needs_synthetic_keyup(&pressed, &KeyName::from("tab")));
    }

    #[test]
    fn test_for_meta_key() {
        assert!(CmdChordPolicy::for_meta_key(MetaKey::Cmd).is_enabled());
        assert!(!CmdChordPolicy::for_meta_key(MetaKey::Ctrl).is_enabled());
    }
}
