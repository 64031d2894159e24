//! Active-combo tracking
//!
//! Decides which combos turn on and off as keys go down and up, and resolves
//! the ambiguity between overlapping combos.
//!
//! ## Lifecycle of one activation
//!
//! ```text
//! INACTIVE --keydown--> ACTIVE --qualifying keyup--> ACTIVE (keyup fired)
//!     ^                                                    |
//!     +------------- release (no combo key held) ----------+
//! ```
//!
//! ## Exclusive combos
//!
//! When an exclusive combo activates, any active exclusive combo whose keys
//! it covers is displaced: the first one is replaced in place, later ones are
//! dropped, and all of them have their count and keyup state reset. An
//! exclusive combo whose keys are already covered by an active exclusive combo
//! is not added at all.

use crate::combo::{ComboEvent, ComboId};
use crate::dispatch::Dispatcher;
use crate::key::{KeyEvent, KeyName};
use crate::pressed::PressedKeys;
use crate::registry::Registry;

/// Everything a combo transition touches apart from the active list.
pub(crate) struct Transition<'a> {
    pub registry: &'a mut Registry,
    pub pressed: &'a PressedKeys,
    pub dispatcher: &'a mut Dispatcher,
    pub event: &'a KeyEvent,
}

/// Whether any of `keys` is still held.
pub fn keys_remain(keys: &[KeyName], pressed: &PressedKeys) -> bool {
    keys.iter().any(|key| pressed.contains(key))
}

fn same_members(a: &[KeyName], b: &[KeyName]) -> bool {
    a.len() == b.len() && a.iter().all(|key| b.contains(key))
}

fn covers(outer: &[KeyName], inner: &[KeyName]) -> bool {
    !inner.is_empty() && inner.iter().all(|key| outer.contains(key))
}

/// Combos currently on, most recently activated first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveCombos {
    ids: Vec<ComboId>,
}

impl ActiveCombos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[ComboId] {
        &self.ids
    }

    pub fn contains(&self, id: ComboId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Activate a combo. Returns `true` if it is active afterwards.
    pub fn insert(&mut self, id: ComboId, registry: &mut Registry) -> bool {
        if self.ids.contains(&id) {
            return true;
        }
        let Some(combo) = registry.get(id) else {
            return false;
        };
        let keys = combo.keys().to_vec();
        let exclusive = combo.flags().exclusive;

        let mut replaced = false;
        let mut prepend = true;
        let mut displaced = Vec::new();

        if exclusive {
            let mut index = 0;
            while index < self.ids.len() {
                let active_id = self.ids[index];
                let Some(active) = registry.get(active_id) else {
                    index += 1;
                    continue;
                };
                if !active.flags().exclusive {
                    index += 1;
                    continue;
                }

                if covers(&keys, active.keys()) {
                    displaced.push(active_id);
                    if replaced {
                        self.ids.remove(index);
                    } else {
                        self.ids[index] = id;
                        replaced = true;
                        prepend = false;
                        index += 1;
                    }
                    continue;
                }

                if !replaced && covers(active.keys(), &keys) {
                    prepend = false;
                }
                index += 1;
            }
        }

        for displaced_id in displaced {
            if let Some(combo) = registry.get_mut(displaced_id) {
                tracing::debug!("Combo {} displaced by exclusive combo {}", displaced_id, id);
                combo.reset();
            }
        }

        if prepend {
            self.ids.insert(0, id);
        }
        if replaced || prepend {
            tracing::debug!("Combo {} is now active", id);
        }
        replaced || prepend
    }

    /// Deactivate a combo and reset its runtime state.
    pub fn remove(&mut self, id: ComboId, registry: &mut Registry) -> bool {
        if !self.forget(id) {
            return false;
        }
        if let Some(combo) = registry.get_mut(id) {
            combo.reset();
        }
        tracing::debug!("Combo {} is no longer active", id);
        true
    }

    /// Drop a combo from the list without touching the combo itself.
    pub fn forget(&mut self, id: ComboId) -> bool {
        match self.ids.iter().position(|active| *active == id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    /// Active combos that include `key`, in list order.
    pub fn containing(&self, key: &KeyName, registry: &Registry) -> Vec<ComboId> {
        self.ids
            .iter()
            .copied()
            .filter(|id| registry.get(*id).is_some_and(|combo| combo.contains(key)))
            .collect()
    }

    /// Deactivate everything without firing callbacks.
    pub fn clear(&mut self, registry: &mut Registry) {
        for id in self.ids.drain(..) {
            if let Some(combo) = registry.get_mut(id) {
                combo.reset();
            }
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// A key went down and `id` matched the resulting snapshot.
    ///
    /// `potentials` are all chord combos containing `key`; a longer exclusive
    /// one among them keeps an exclusive match from firing.
    pub(crate) fn combo_down(
        &mut self,
        t: &mut Transition<'_>,
        id: ComboId,
        key: &KeyName,
        potentials: &[ComboId],
    ) {
        let Some(combo) = t.registry.get(id) else {
            return;
        };
        if !combo.contains(key) {
            return;
        }
        t.dispatcher.prevent(combo.flags().prevent_default);

        let is_autorepeat = t.pressed.contains(key);
        if is_autorepeat && !combo.allows_key_repeat() {
            tracing::trace!("Ignoring autorepeat of '{}' for combo {}", key, id);
            return;
        }

        let len = combo.keys().len();
        let other_exclusive = combo.flags().exclusive
            && potentials
                .iter()
                .filter_map(|potential| t.registry.get(*potential))
                .any(|potential| potential.flags().exclusive && potential.keys().len() > len);

        let activated = self.insert(id, t.registry);

        let Some(combo) = t.registry.get_mut(id) else {
            return;
        };
        combo.keyup_fired = Some(false);

        if other_exclusive {
            tracing::debug!("Combo {} held back by a longer exclusive combo", id);
            return;
        }

        if combo.flags.counting && combo.on_keydown.is_some() {
            combo.count += 1;
        }
        if activated {
            t.dispatcher.fire(ComboEvent::Keydown, combo, t.event, is_autorepeat);
        }
    }

    /// `key` was released while `id` was active.
    ///
    /// `t.pressed` no longer holds `key`.
    pub(crate) fn combo_up(&mut self, t: &mut Transition<'_>, id: ComboId, key: &KeyName) {
        let Some(combo) = t.registry.get_mut(id) else {
            return;
        };
        t.dispatcher.prevent(combo.flags.prevent_default);

        let keys_remaining = keys_remain(&combo.keys, t.pressed);

        if combo.keyup_fired != Some(true) {
            let mut held = t.pressed.to_vec();
            held.push(key.clone());

            if !combo.flags.solitary || same_members(&held, &combo.keys) {
                t.dispatcher.fire(ComboEvent::Keyup, combo, t.event, false);
                if combo.flags.counting && combo.on_keyup.is_some() && combo.on_keydown.is_none() {
                    combo.count += 1;
                }
            }
        }

        if !keys_remaining {
            t.dispatcher.fire(ComboEvent::Release, combo, t.event, false);
            self.remove(id, t.registry);
        }
    }

    /// Release active combos, other than `handled`, with no key left held.
    pub(crate) fn sweep_released(&mut self, t: &mut Transition<'_>, handled: &[ComboId]) {
        let stale: Vec<ComboId> = self
            .ids
            .iter()
            .copied()
            .filter(|id| !handled.contains(id))
            .filter(|id| {
                t.registry
                    .get(*id)
                    .is_some_and(|combo| !keys_remain(combo.keys(), t.pressed))
            })
            .collect();

        for id in stale {
            if let Some(combo) = t.registry.get_mut(id) {
                t.dispatcher.fire(ComboEvent::Release, combo, t.event, false);
            }
            self.remove(id, t.registry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combo::{ComboFlags, ComboSpec};
    use crate::dispatch::DefaultPolicy;
    use crate::key::{MetaKey, Modifiers};

    fn registry_with(specs: Vec<ComboSpec>) -> (Registry, Vec<ComboId>) {
        let mut registry = Registry::new(MetaKey::Ctrl, ComboFlags::default());
        let ids = specs
            .into_iter()
            .map(|spec| registry.register(spec).unwrap())
            .collect();
        (registry, ids)
    }

    fn held(keys: &[&str]) -> PressedKeys {
        let mut pressed = PressedKeys::new();
        for key in keys {
            pressed.insert(KeyName::from(*key));
        }
        pressed
    }

    #[test]
    fn test_insert_is_idempotent_and_prepends() {
        let (mut registry, ids) = registry_with(vec![ComboSpec::new("a"), ComboSpec::new("b")]);
        let mut active = ActiveCombos::new();

        assert!(active.insert(ids[0], &mut registry));
        assert!(active.insert(ids[1], &mut registry));
        assert!(active.insert(ids[0], &mut registry));
        assert_eq!(active.ids(), &[ids[1], ids[0]]);
    }

    #[test]
    fn test_exclusive_superset_replaces_in_place() {
        let (mut registry, ids) = registry_with(vec![
            ComboSpec::new("ctrl a").exclusive(true),
            ComboSpec::new("x"),
            ComboSpec::new("ctrl a b").exclusive(true),
        ]);
        let mut active = ActiveCombos::new();
        active.insert(ids[0], &mut registry);
        active.insert(ids[1], &mut registry);
        registry.get_mut(ids[0]).unwrap().count = 4;

        assert!(active.insert(ids[2], &mut registry));
        assert_eq!(active.ids(), &[ids[1], ids[2]]);
        assert_eq!(registry.get(ids[0]).unwrap().count(), 0, "Displaced combo is reset");
    }

    #[test]
    fn test_exclusive_subset_not_added() {
        let (mut registry, ids) = registry_with(vec![
            ComboSpec::new("ctrl a b").exclusive(true),
            ComboSpec::new("ctrl a").exclusive(true),
        ]);
        let mut active = ActiveCombos::new();
        active.insert(ids[0], &mut registry);

        assert!(!active.insert(ids[1], &mut registry));
        assert_eq!(active.ids(), &[ids[0]]);
    }

    #[test]
    fn test_exclusive_replaces_once_and_drops_the_rest() {
        let (mut registry, ids) = registry_with(vec![
            ComboSpec::new("ctrl").exclusive(true),
            ComboSpec::new("a").exclusive(true),
            ComboSpec::new("ctrl a").exclusive(true),
        ]);
        let mut active = ActiveCombos::new();
        active.insert(ids[0], &mut registry);
        active.insert(ids[1], &mut registry);

        assert!(active.insert(ids[2], &mut registry));
        assert_eq!(active.ids(), &[ids[2]]);
    }

    #[test]
    fn test_non_exclusive_never_replaces() {
        let (mut registry, ids) = registry_with(vec![
            ComboSpec::new("ctrl a").exclusive(true),
            ComboSpec::new("ctrl a b"),
        ]);
        let mut active = ActiveCombos::new();
        active.insert(ids[0], &mut registry);
        active.insert(ids[1], &mut registry);
        assert_eq!(active.ids(), &[ids[1], ids[0]]);
    }

    #[test]
    fn test_remove_and_containing() {
        let (mut registry, ids) =
            registry_with(vec![ComboSpec::new("ctrl a"), ComboSpec::new("b")]);
        let mut active = ActiveCombos::new();
        active.insert(ids[0], &mut registry);
        active.insert(ids[1], &mut registry);

        assert_eq!(active.containing(&KeyName::from("a"), &registry), vec![ids[0]]);
        assert!(active.remove(ids[0], &mut registry));
        assert!(!active.remove(ids[0], &mut registry));
        assert!(active.containing(&KeyName::from("a"), &registry).is_empty());
    }

    #[test]
    fn test_combo_up_solitary_requires_exact_keys() {
        let (mut registry, ids) = registry_with(vec![
            ComboSpec::new("a").solitary(true).on_keyup(|_, _, _| ()),
        ]);
        let mut active = ActiveCombos::new();
        active.insert(ids[0], &mut registry);
        registry.get_mut(ids[0]).unwrap().keyup_fired = Some(false);

        // "b" is still held, so the solitary combo must not fire keyup
        let pressed = held(&["b"]);
        let event = KeyEvent::up("a", Modifiers::NONE);
        let mut dispatcher = Dispatcher::new(DefaultPolicy::default());
        let mut t = Transition {
            registry: &mut registry,
            pressed: &pressed,
            dispatcher: &mut dispatcher,
            event: &event,
        };
        active.combo_up(&mut t, ids[0], &KeyName::from("a"));

        assert_eq!(dispatcher.finish().callbacks_fired, 0);
        assert!(active.is_empty(), "No combo key remains, so it is released");
    }

    #[test]
    fn test_sweep_releases_combos_without_held_keys() {
        let released = std::rc::Rc::new(std::cell::Cell::new(0));
        let counter = released.clone();
        let (mut registry, ids) = registry_with(vec![
            ComboSpec::new("ctrl").on_release(move |_, _, _| counter.set(counter.get() + 1)),
            ComboSpec::new("shift"),
        ]);
        let mut active = ActiveCombos::new();
        active.insert(ids[0], &mut registry);
        active.insert(ids[1], &mut registry);

        let pressed = held(&["shift"]);
        let event = KeyEvent::up("x", Modifiers::NONE);
        let mut dispatcher = Dispatcher::new(DefaultPolicy::default());
        let mut t = Transition {
            registry: &mut registry,
            pressed: &pressed,
            dispatcher: &mut dispatcher,
            event: &event,
        };
        active.sweep_released(&mut t, &[]);

        assert_eq!(released.get(), 1);
        assert_eq!(active.ids(), &[ids[1]]);
    }
}
