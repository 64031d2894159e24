//! The engine facade
//!
//! [`Engine`] owns one registry and the per-session state that goes with it
//! (pressed keys, active combos, sequence buffer). The event source feeds it
//! normalized key transitions through [`Engine::handle_event`] and reports
//! focus loss through [`Engine::cancel`]. Every event is processed to
//! completion, callbacks included, before the call returns.
//!
//! ## Key-down pipeline
//!
//! 1. Translate the key to its shifted form when shift is reported
//! 2. Feed the sequence buffer and fire a completed sequence
//! 3. Reconcile held modifiers with the event's modifier flags
//! 4. Match the held-key snapshot and activate combos
//! 5. Record the key as held
//! 6. Synthesize the missing key-up for keys pressed under `cmd`, if enabled
//!
//! ## Key-up pipeline
//!
//! 1. Work out which of the shifted/unshifted names was actually held
//! 2. Let the sequence buffer fire keyup for a completed sequence
//! 3. Forget the key, then fire keyup/release for affected active combos
//! 4. Release any other active combo left with no key held

use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::combo::{CallbackResult, Combo, ComboEvent, ComboFlags, ComboId, ComboSpec, KeyList};
use crate::dispatch::{DefaultPolicy, Dispatcher, EventOutcome};
use crate::error::ComboError;
use crate::key::{KeyEvent, KeyName, MetaKey, Modifiers, ALT, CMD};
use crate::matcher;
use crate::policy::CmdChordPolicy;
use crate::pressed::PressedKeys;
use crate::registry::{ComboRef, Registry};
use crate::sequence::{SequenceBuffer, DEFAULT_SEQUENCE_DELAY};
use crate::tracker::{ActiveCombos, Transition};

// ============================================================================
// Configuration
// ============================================================================

/// Construction-time settings of an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Inactivity window of the sequence buffer; `None` never expires it
    pub sequence_delay: Option<Duration>,
    /// What `meta` resolves to at registration
    pub meta_key: MetaKey,
    /// Flag values for anything a combo spec leaves unset
    pub defaults: ComboFlags,
    /// Suppress the default action of every event a combo takes part in
    pub suppress_defaults: bool,
    /// Never suppress default actions, overriding everything else
    pub force_defaults: bool,
    /// Enable the cmd chord workaround; `None` follows the meta key
    pub cmd_chord_workaround: Option<bool>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sequence_delay: Some(DEFAULT_SEQUENCE_DELAY),
            meta_key: MetaKey::detect(),
            defaults: ComboFlags::default(),
            suppress_defaults: false,
            force_defaults: false,
            cmd_chord_workaround: None,
        }
    }
}

impl EngineConfig {
    pub fn cmd_chord_policy(&self) -> CmdChordPolicy {
        match self.cmd_chord_workaround {
            Some(true) => CmdChordPolicy::enabled(),
            Some(false) => CmdChordPolicy::disabled(),
            None => CmdChordPolicy::for_meta_key(self.meta_key),
        }
    }

    fn default_policy(&self) -> DefaultPolicy {
        DefaultPolicy {
            suppress_all: self.suppress_defaults,
            force_all: self.force_defaults,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug)]
pub struct Engine<C: Clock = SystemClock> {
    registry: Registry,
    pressed: PressedKeys,
    active: ActiveCombos,
    sequence: SequenceBuffer,
    policy: CmdChordPolicy,
    defaults: DefaultPolicy,
    paused: bool,
    clock: C,
}

impl Engine<SystemClock> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for Engine<SystemClock> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<C: Clock> Engine<C> {
    pub fn with_clock(config: EngineConfig, clock: C) -> Self {
        tracing::debug!(
            "Creating engine: meta key {}, sequence delay {:?}, cmd chord workaround {}",
            config.meta_key,
            config.sequence_delay,
            config.cmd_chord_policy().is_enabled()
        );
        Self {
            registry: Registry::new(config.meta_key, config.defaults),
            pressed: PressedKeys::new(),
            active: ActiveCombos::new(),
            sequence: SequenceBuffer::new(config.sequence_delay),
            policy: config.cmd_chord_policy(),
            defaults: config.default_policy(),
            paused: false,
            clock,
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a combo.
    ///
    /// # Errors
    ///
    /// Fails only for structurally invalid combos; see [`ComboError`].
    pub fn register_combo(&mut self, spec: ComboSpec) -> Result<ComboId, ComboError> {
        self.registry.register(spec)
    }

    /// An ordered combo with just a keydown callback.
    pub fn simple_combo<F, R>(
        &mut self,
        keys: impl Into<KeyList>,
        callback: F,
    ) -> Result<ComboId, ComboError>
    where
        F: FnMut(&KeyEvent, u32, bool) -> R + 'static,
        R: Into<CallbackResult>,
    {
        self.register_combo(ComboSpec::new(keys).on_keydown(callback))
    }

    /// An ordered counting combo; the callback sees the running count.
    pub fn counting_combo<F, R>(
        &mut self,
        keys: impl Into<KeyList>,
        callback: F,
    ) -> Result<ComboId, ComboError>
    where
        F: FnMut(&KeyEvent, u32, bool) -> R + 'static,
        R: Into<CallbackResult>,
    {
        self.register_combo(
            ComboSpec::new(keys)
                .counting(true)
                .unordered(false)
                .on_keydown(callback),
        )
    }

    /// An exclusive key sequence.
    pub fn sequence_combo<F, R>(
        &mut self,
        keys: impl Into<KeyList>,
        callback: F,
    ) -> Result<ComboId, ComboError>
    where
        F: FnMut(&KeyEvent, u32, bool) -> R + 'static,
        R: Into<CallbackResult>,
    {
        self.register_combo(
            ComboSpec::new(keys)
                .sequence(true)
                .exclusive(true)
                .on_keydown(callback),
        )
    }

    pub fn register_many(
        &mut self,
        specs: impl IntoIterator<Item = ComboSpec>,
    ) -> Vec<Result<ComboId, ComboError>> {
        self.registry.register_many(specs)
    }

    /// Remove a combo, or every combo bound to the given keys.
    ///
    /// Returns `false` if nothing matched. Removed combos that were active
    /// leave the active list without firing release.
    pub fn unregister_combo(&mut self, target: impl Into<ComboRef>) -> bool {
        let removed = self.registry.unregister(target);
        for id in &removed {
            self.active.forget(*id);
        }
        !removed.is_empty()
    }

    pub fn unregister_many<T: Into<ComboRef>>(
        &mut self,
        targets: impl IntoIterator<Item = T>,
    ) -> Vec<bool> {
        targets
            .into_iter()
            .map(|target| self.unregister_combo(target))
            .collect()
    }

    pub fn list_registered(&self) -> &[Combo] {
        self.registry.combos()
    }

    pub fn combo(&self, id: ComboId) -> Option<&Combo> {
        self.registry.get(id)
    }

    /// Drop every registered combo.
    pub fn clear_all(&mut self) {
        self.active.clear(&mut self.registry);
        self.registry.clear();
    }

    // ========================================================================
    // Input
    // ========================================================================

    pub fn key_down(&mut self, key: impl Into<KeyName>, modifiers: Modifiers) -> EventOutcome {
        self.handle_event(&KeyEvent::down(key, modifiers))
    }

    pub fn key_up(&mut self, key: impl Into<KeyName>, modifiers: Modifiers) -> EventOutcome {
        self.handle_event(&KeyEvent::up(key, modifiers))
    }

    /// Process one key transition from the event source.
    pub fn handle_event(&mut self, event: &KeyEvent) -> EventOutcome {
        if self.paused {
            self.pressed.clear();
            tracing::trace!("Input paused, dropping {:?}", event);
            return EventOutcome::default();
        }
        if event.key.as_str().is_empty() {
            return EventOutcome::default();
        }
        if !event.is_keydown
            && self.pressed.is_empty()
            && (event.key == ALT || event.key == self.registry.meta_key().as_str())
        {
            tracing::trace!("Ignoring key-up of '{}' with nothing held", event.key);
            return EventOutcome::default();
        }

        self.poll_timers();

        let mut dispatcher = Dispatcher::new(self.defaults);
        if event.is_keydown {
            self.process_key_down(event, &mut dispatcher);
        } else {
            self.process_key_up(event, &mut dispatcher);
        }
        dispatcher.finish()
    }

    /// Focus loss: release every held key, firing keyup/release as usual.
    pub fn cancel(&mut self) -> EventOutcome {
        let held = self.pressed.to_vec();
        if !held.is_empty() {
            tracing::debug!("Cancelling {} held key(s)", held.len());
        }

        let mut dispatcher = Dispatcher::new(self.defaults);
        for key in held {
            let event = KeyEvent::synthetic_up(key, Modifiers::NONE);
            self.process_key_up(&event, &mut dispatcher);
        }
        self.pressed.clear();
        dispatcher.finish()
    }

    /// Drop all input until [`Engine::resume_input`].
    ///
    /// Held keys are forgotten and active combos deactivated without firing
    /// any callback.
    pub fn pause_input(&mut self) {
        tracing::debug!("Pausing input");
        self.paused = true;
        self.pressed.clear();
        self.active.clear(&mut self.registry);
    }

    pub fn resume_input(&mut self) {
        tracing::debug!("Resuming input");
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// The key `meta` resolves to.
    pub fn get_meta_key_name(&self) -> KeyName {
        self.registry.meta_key().key_name()
    }

    pub fn meta_key(&self) -> MetaKey {
        self.registry.meta_key()
    }

    pub fn sequence_delay(&self) -> Option<Duration> {
        self.sequence.delay()
    }

    /// `None` disables expiry of the sequence buffer.
    pub fn set_sequence_delay(&mut self, delay: Option<Duration>) {
        self.sequence.set_delay(delay);
    }

    pub fn set_suppress_defaults(&mut self, suppress: bool) {
        self.defaults.suppress_all = suppress;
    }

    pub fn set_force_defaults(&mut self, force: bool) {
        self.defaults.force_all = force;
    }

    pub fn cmd_chord_policy(&self) -> CmdChordPolicy {
        self.policy
    }

    pub fn set_cmd_chord_policy(&mut self, policy: CmdChordPolicy) {
        self.policy = policy;
    }

    // ========================================================================
    // Timers and lifecycle
    // ========================================================================

    /// Expire the sequence buffer if its deadline has passed.
    ///
    /// Events do this on their own; hosts that want the buffer cleared on time
    /// while idle call it when [`Engine::sequence_deadline`] is reached.
    pub fn poll_timers(&mut self) -> bool {
        let now = self.clock.now();
        self.sequence.expire(now)
    }

    pub fn sequence_deadline(&self) -> Option<Instant> {
        self.sequence.deadline()
    }

    /// Forget all runtime state without firing callbacks. Registrations and
    /// the pause flag are kept.
    pub fn reset(&mut self) {
        tracing::debug!("Resetting engine state");
        self.pressed.clear();
        self.active.clear(&mut self.registry);
        self.sequence.clear();
    }

    /// Cancel the pending sequence timer, drop runtime state and stop
    /// accepting input.
    pub fn teardown(&mut self) {
        tracing::debug!("Tearing down engine");
        self.reset();
        self.paused = true;
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn pressed_keys(&self) -> &[KeyName] {
        self.pressed.as_slice()
    }

    /// Active combos, most recently activated first.
    pub fn active_combos(&self) -> Vec<&Combo> {
        self.active
            .ids()
            .iter()
            .filter_map(|id| self.registry.get(*id))
            .collect()
    }

    pub fn active_ids(&self) -> &[ComboId] {
        self.active.ids()
    }

    pub fn sequence_buffer(&self) -> &[KeyName] {
        self.sequence.keys()
    }

    // ========================================================================
    // Pipelines
    // ========================================================================

    fn process_key_down(&mut self, event: &KeyEvent, dispatcher: &mut Dispatcher) {
        let key = if event.modifiers.shift {
            event.key.shifted().unwrap_or_else(|| event.key.clone())
        } else {
            event.key.clone()
        };
        tracing::trace!("Key down: '{}' {:?}", key, event.modifiers);

        let now = self.clock.now();
        let in_progress = self.sequence.push(key.clone(), self.registry.combos(), now);
        for id in in_progress {
            if let Some(combo) = self.registry.get(id) {
                dispatcher.prevent(combo.flags().prevent_default);
            }
        }
        if let Some(id) = self.sequence.completed(&key, self.registry.combos()) {
            if let Some(combo) = self.registry.get_mut(id) {
                tracing::debug!("Sequence {} completed", combo);
                dispatcher.fire(ComboEvent::Keydown, combo, event, false);
            }
        }

        self.sync_modifiers(&key, event.modifiers);

        let snapshot = self.pressed.snapshot_with(&key);
        let matches = matcher::active_candidates(
            self.registry.combos(),
            &snapshot,
            &self.pressed,
            &self.policy,
        );
        let potentials = matcher::potential_candidates(
            self.registry.combos(),
            &key,
            &self.pressed,
            &self.policy,
        );

        let mut transition = Transition {
            registry: &mut self.registry,
            pressed: &self.pressed,
            dispatcher: &mut *dispatcher,
            event,
        };
        for id in &matches {
            self.active.combo_down(&mut transition, *id, &key, &potentials);
        }

        for id in &potentials {
            if let Some(combo) = self.registry.get(*id) {
                dispatcher.prevent(combo.flags().prevent_default);
            }
        }

        self.pressed.insert(key.clone());

        if self.policy.needs_synthetic_keyup(&self.pressed, &key) {
            tracing::debug!("Synthesizing key-up for '{}' pressed under cmd", key);
            let synthetic = KeyEvent::synthetic_up(event.key.clone(), event.modifiers);
            self.process_key_up(&synthetic, dispatcher);
        }
    }

    fn process_key_up(&mut self, event: &KeyEvent, dispatcher: &mut Dispatcher) {
        let unshifted = event.key.clone();
        let shifted = unshifted.shifted();
        let key = if event.modifiers.shift {
            match &shifted {
                Some(shifted) if self.pressed.contains(shifted) => shifted.clone(),
                _ => unshifted.clone(),
            }
        } else if self.pressed.contains(&unshifted) {
            unshifted.clone()
        } else {
            shifted.clone().unwrap_or_else(|| unshifted.clone())
        };
        tracing::trace!("Key up: '{}' {:?}", key, event.modifiers);

        if let Some(id) = self.sequence.completed(&key, self.registry.combos()) {
            if let Some(combo) = self.registry.get_mut(id) {
                dispatcher.fire(ComboEvent::Keyup, combo, event, false);
            }
        }

        if !self.pressed.contains(&key) {
            return;
        }
        let mut candidates = vec![&key, &unshifted];
        if let Some(shifted) = &shifted {
            candidates.push(shifted);
        }
        self.pressed.remove_first_of(&candidates);

        let affected = self.active.containing(&key, &self.registry);
        let mut transition = Transition {
            registry: &mut self.registry,
            pressed: &self.pressed,
            dispatcher,
            event,
        };
        for id in &affected {
            self.active.combo_up(&mut transition, *id, &key);
        }
        self.active.sweep_released(&mut transition, &affected);
    }

    /// Make held modifiers agree with the flags carried by a key-down.
    fn sync_modifiers(&mut self, key: &KeyName, modifiers: Modifiers) {
        for (name, flagged) in modifiers.flags() {
            if !flagged || key == name || self.pressed.contains_name(name) {
                continue;
            }
            tracing::trace!("Event reports '{}' held, adding it", name);
            self.pressed.insert(KeyName::from(name));
        }

        let meta_is_cmd = self.registry.meta_key() == MetaKey::Cmd;
        for (name, flagged) in modifiers.flags() {
            if flagged || key == name || !self.pressed.contains_name(name) {
                continue;
            }
            if name == CMD && !meta_is_cmd {
                continue;
            }
            tracing::trace!("Event reports '{}' released, dropping it", name);
            self.pressed.remove(&KeyName::from(name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::key::{CTRL, SHIFT};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn config() -> EngineConfig {
        EngineConfig {
            meta_key: MetaKey::Ctrl,
            ..EngineConfig::default()
        }
    }

    fn engine() -> Engine<ManualClock> {
        Engine::with_clock(config(), ManualClock::new())
    }

    /// A spec whose three callbacks append `"<tag> <event> <count>"` to `log`.
    fn logged(keys: &str, tag: &str, log: &Log) -> ComboSpec {
        let (down, up, release) = (log.clone(), log.clone(), log.clone());
        let (t1, t2, t3) = (tag.to_string(), tag.to_string(), tag.to_string());
        ComboSpec::new(keys)
            .on_keydown(move |_, count, repeat| {
                let suffix = if repeat { " repeat" } else { "" };
                down.borrow_mut().push(format!("{} keydown {}{}", t1, count, suffix));
            })
            .on_keyup(move |_, count, _| up.borrow_mut().push(format!("{} keyup {}", t2, count)))
            .on_release(move |_, count, _| {
                release.borrow_mut().push(format!("{} release {}", t3, count))
            })
    }

    /// The modifier flags a real keyboard reports for this transition.
    fn modifiers(engine: &Engine<ManualClock>, key: &str, is_keydown: bool) -> Modifiers {
        let held = |name: &str| {
            if key == name {
                is_keydown
            } else {
                engine.pressed_keys().iter().any(|k| k == name)
            }
        };
        Modifiers {
            alt: held(ALT),
            ctrl: held(CTRL),
            shift: held(SHIFT),
            meta: held(CMD),
        }
    }

    fn down(engine: &mut Engine<ManualClock>, key: &str) -> EventOutcome {
        let modifiers = modifiers(engine, key, true);
        engine.key_down(key, modifiers)
    }

    fn up(engine: &mut Engine<ManualClock>, key: &str) -> EventOutcome {
        let modifiers = modifiers(engine, key, false);
        engine.key_up(key, modifiers)
    }

    fn tap(engine: &mut Engine<ManualClock>, key: &str) {
        down(engine, key);
        up(engine, key);
    }

    fn take(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.borrow_mut())
    }

    // ========================================================================
    // Chords
    // ========================================================================

    #[test]
    fn test_ordered_combo_fires_once_regardless_of_release_order() {
        for release_order in [["ctrl", "a"], ["a", "ctrl"]] {
            let log = Log::default();
            let mut engine = engine();
            engine.register_combo(logged("ctrl a", "c", &log)).unwrap();

            down(&mut engine, "ctrl");
            assert!(take(&log).is_empty(), "Nothing fires before the last key");
            down(&mut engine, "a");
            assert_eq!(take(&log), vec!["c keydown 0"]);

            up(&mut engine, release_order[0]);
            up(&mut engine, release_order[1]);
            assert_eq!(take(&log), vec!["c keyup 0", "c release 0"]);
            assert!(engine.active_combos().is_empty());
        }
    }

    #[test]
    fn test_ordered_combo_ignores_wrong_order() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("ctrl a", "c", &log)).unwrap();

        down(&mut engine, "a");
        down(&mut engine, "ctrl");
        assert!(take(&log).is_empty());
    }

    #[test]
    fn test_unordered_combo_any_order() {
        let log = Log::default();
        let mut engine = engine();
        engine
            .register_combo(logged("up left", "u", &log).unordered(true))
            .unwrap();

        down(&mut engine, "left");
        down(&mut engine, "up");
        assert_eq!(take(&log), vec!["u keydown 0"]);
    }

    #[test]
    fn test_release_count_is_zero_after_release() {
        let log = Log::default();
        let mut engine = engine();
        let id = engine
            .register_combo(logged("ctrl a", "c", &log).counting(true))
            .unwrap();

        down(&mut engine, "ctrl");
        down(&mut engine, "a");
        up(&mut engine, "ctrl");
        up(&mut engine, "a");

        assert_eq!(take(&log), vec!["c keydown 1", "c keyup 1", "c release 1"]);
        assert_eq!(engine.combo(id).unwrap().count(), 0);
    }

    #[test]
    fn test_prevent_repeat_fires_keydown_once() {
        let log = Log::default();
        let mut engine = engine();
        engine
            .register_combo(
                ComboSpec::new("a")
                    .prevent_repeat(true)
                    .on_keydown({
                        let log = log.clone();
                        move |_, _, _| log.borrow_mut().push("keydown".to_string())
                    }),
            )
            .unwrap();

        for _ in 0..5 {
            down(&mut engine, "a");
        }
        assert_eq!(take(&log), vec!["keydown"]);
    }

    #[test]
    fn test_autorepeat_delivered_when_allowed() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("a", "a", &log)).unwrap();

        down(&mut engine, "a");
        down(&mut engine, "a");
        assert_eq!(take(&log), vec!["a keydown 0", "a keydown 0 repeat"]);
    }

    #[test]
    fn test_counting_combo_counts_while_modifier_held() {
        let counts = Rc::new(RefCell::new(Vec::<u32>::new()));
        let mut engine = engine();
        let seen = counts.clone();
        let id = engine
            .counting_combo("shift s", move |_, count, _| seen.borrow_mut().push(count))
            .unwrap();

        down(&mut engine, "shift");
        for _ in 0..5 {
            tap(&mut engine, "s");
        }
        assert_eq!(*counts.borrow(), vec![1, 2, 3, 4, 5]);

        up(&mut engine, "shift");
        assert_eq!(engine.combo(id).unwrap().count(), 0);
    }

    #[test]
    fn test_counting_single_key_resets_each_release() {
        let counts = Rc::new(RefCell::new(Vec::<u32>::new()));
        let mut engine = engine();
        let seen = counts.clone();
        engine
            .counting_combo("space", move |_, count, _| seen.borrow_mut().push(count))
            .unwrap();

        for _ in 0..3 {
            tap(&mut engine, "space");
        }
        assert_eq!(*counts.borrow(), vec![1, 1, 1]);
    }

    #[test]
    fn test_counting_keyup_only_counts_after_keyup() {
        let counts = Rc::new(RefCell::new(Vec::<u32>::new()));
        let mut engine = engine();
        let seen = counts.clone();
        engine
            .register_combo(
                ComboSpec::new("shift s")
                    .counting(true)
                    .on_keyup(move |_, count, _| seen.borrow_mut().push(count)),
            )
            .unwrap();

        down(&mut engine, "shift");
        tap(&mut engine, "s");
        tap(&mut engine, "s");
        // the callback sees the count from before this keyup
        assert_eq!(*counts.borrow(), vec![0, 1]);
        assert_eq!(engine.active_combos()[0].count(), 2);
    }

    #[test]
    fn test_exclusive_longer_combo_replaces_shorter() {
        let log = Log::default();
        let mut engine = engine();
        let short = engine
            .register_combo(logged("ctrl a", "short", &log).exclusive(true))
            .unwrap();
        let long = engine
            .register_combo(logged("ctrl a b", "long", &log).exclusive(true))
            .unwrap();

        down(&mut engine, "ctrl");
        down(&mut engine, "a");
        // the longer exclusive combo is still possible, so the short one holds back
        assert!(take(&log).is_empty());
        assert_eq!(engine.active_ids(), &[short]);

        down(&mut engine, "b");
        assert_eq!(take(&log), vec!["long keydown 0"]);
        assert_eq!(engine.active_ids(), &[long]);
        assert_eq!(engine.combo(short).unwrap().count(), 0);

        up(&mut engine, "b");
        assert_eq!(take(&log), vec!["long keyup 0"]);
        assert_eq!(engine.active_ids(), &[long], "ctrl+a is not released by b");

        up(&mut engine, "a");
        up(&mut engine, "ctrl");
        assert_eq!(take(&log), vec!["long release 0"]);
    }

    #[test]
    fn test_fuzzy_match_keeps_smaller_combo() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("ctrl a", "c", &log)).unwrap();

        down(&mut engine, "ctrl");
        down(&mut engine, "shift");
        down(&mut engine, "a");
        assert_eq!(take(&log), vec!["c keydown 0"]);
    }

    #[test]
    fn test_solitary_requires_exact_keys() {
        let log = Log::default();
        let mut engine = engine();
        engine
            .register_combo(logged("ctrl a", "s", &log).solitary(true))
            .unwrap();

        down(&mut engine, "ctrl");
        down(&mut engine, "shift");
        down(&mut engine, "a");
        assert!(take(&log).is_empty(), "Solitary combos do not fuzzy match");

        let mut engine = Engine::with_clock(config(), ManualClock::new());
        engine
            .register_combo(logged("ctrl a", "s", &log).solitary(true))
            .unwrap();
        down(&mut engine, "ctrl");
        down(&mut engine, "a");
        down(&mut engine, "b");
        up(&mut engine, "a");
        up(&mut engine, "b");
        up(&mut engine, "ctrl");
        // keyup is skipped while b is also held; release still fires
        assert_eq!(take(&log), vec!["s keydown 0", "s release 0"]);
    }

    #[test]
    fn test_normalize_caps_lock() {
        let log = Log::default();
        let mut engine = engine();
        engine
            .register_combo(logged("shift a", "n", &log).normalize_caps_lock(true))
            .unwrap();

        down(&mut engine, "caps");
        down(&mut engine, "shift");
        down(&mut engine, "a");
        assert_eq!(take(&log), vec!["n keydown 0"]);
    }

    #[test]
    fn test_duplicate_registration_both_fire() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("a", "one", &log)).unwrap();
        engine.register_combo(logged("a", "two", &log)).unwrap();

        down(&mut engine, "a");
        let mut fired = take(&log);
        fired.sort();
        assert_eq!(fired, vec!["one keydown 0", "two keydown 0"]);
    }

    #[test]
    fn test_meta_resolves_to_platform_key() {
        let mut engine = engine();
        assert_eq!(engine.get_meta_key_name(), KeyName::from("ctrl"));

        let log = Log::default();
        engine.register_combo(logged("meta s", "m", &log)).unwrap();
        down(&mut engine, "ctrl");
        down(&mut engine, "s");
        assert_eq!(take(&log), vec!["m keydown 0"]);
    }

    #[test]
    fn test_invalid_meta_combo_rejected() {
        let mut engine = engine();
        assert!(engine.register_combo(ComboSpec::new("meta a b")).is_err());
        assert!(engine.list_registered().is_empty());
    }

    // ========================================================================
    // Sequences
    // ========================================================================

    #[test]
    fn test_sequence_within_window_fires_once() {
        let log = Log::default();
        let clock = ManualClock::new();
        let mut engine = Engine::with_clock(config(), clock.clone());
        engine
            .register_combo(logged("a b c", "seq", &log).sequence(true).exclusive(true))
            .unwrap();

        for key in ["a", "b", "c"] {
            tap(&mut engine, key);
            clock.advance(Duration::from_millis(300));
        }
        assert_eq!(take(&log), vec!["seq keydown 0"]);
        assert!(engine.sequence_buffer().is_empty(), "Exclusive sequence clears the buffer");
    }

    #[test]
    fn test_sequence_times_out() {
        let log = Log::default();
        let clock = ManualClock::new();
        let mut engine = Engine::with_clock(config(), clock.clone());
        engine.sequence_combo("a b c", {
            let log = log.clone();
            move |_, _, _| log.borrow_mut().push("seq".to_string())
        })
        .unwrap();

        tap(&mut engine, "a");
        tap(&mut engine, "b");
        assert_eq!(engine.sequence_buffer(), &[KeyName::from("a"), KeyName::from("b")]);
        assert!(engine.sequence_deadline().is_some());

        clock.advance(Duration::from_millis(900));
        tap(&mut engine, "c");
        assert!(take(&log).is_empty());
        assert!(engine.sequence_buffer().is_empty());
    }

    #[test]
    fn test_poll_timers_expires_idle_buffer() {
        let clock = ManualClock::new();
        let mut engine = Engine::with_clock(config(), clock.clone());
        engine.sequence_combo("g g", |_, _, _| ()).unwrap();

        tap(&mut engine, "g");
        assert!(!engine.poll_timers());
        clock.advance(Duration::from_millis(800));
        assert!(engine.poll_timers());
        assert!(engine.sequence_buffer().is_empty());
        assert_eq!(engine.sequence_deadline(), None);
    }

    #[test]
    fn test_sequence_delay_disabled() {
        let log = Log::default();
        let clock = ManualClock::new();
        let mut engine = Engine::with_clock(config(), clock.clone());
        engine.set_sequence_delay(None);
        engine.sequence_combo("g g", {
            let log = log.clone();
            move |_, _, _| log.borrow_mut().push("gg".to_string())
        })
        .unwrap();

        tap(&mut engine, "g");
        clock.advance(Duration::from_secs(60));
        tap(&mut engine, "g");
        assert_eq!(take(&log), vec!["gg"]);
    }

    #[test]
    fn test_unrepresentable_sequence_delay_never_expires() {
        let log = Log::default();
        let clock = ManualClock::new();
        let mut engine = Engine::with_clock(config(), clock.clone());
        engine.set_sequence_delay(Some(Duration::MAX));
        engine
            .register_combo(logged("g g", "gg", &log).sequence(true).exclusive(true))
            .unwrap();

        tap(&mut engine, "g");
        assert_eq!(engine.sequence_deadline(), None);
        clock.advance(Duration::from_secs(3600));
        assert!(!engine.poll_timers());
        tap(&mut engine, "g");
        assert_eq!(take(&log), vec!["gg keydown 0"]);
    }

    #[test]
    fn test_held_key_does_not_grow_sequence_buffer() {
        let log = Log::default();
        let mut engine = engine();
        engine
            .register_combo(logged("a b", "ab", &log).sequence(true).exclusive(true))
            .unwrap();

        // autorepeat arrives as further key-downs of the held key
        for _ in 0..5000 {
            down(&mut engine, "a");
        }
        assert!(engine.sequence_buffer().len() <= 2);
        up(&mut engine, "a");
        tap(&mut engine, "b");
        assert_eq!(take(&log), vec!["ab keydown 0"]);
    }

    #[test]
    fn test_non_exclusive_sequence_fires_keyup() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("x y", "seq", &log).sequence(true)).unwrap();

        tap(&mut engine, "x");
        tap(&mut engine, "y");
        assert_eq!(take(&log), vec!["seq keydown 0", "seq keyup 0"]);
    }

    #[test]
    fn test_sequence_not_matched_as_chord() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("a b", "seq", &log).sequence(true)).unwrap();

        down(&mut engine, "a");
        down(&mut engine, "b");
        // held together this is still a sequence completion, never a chord activation
        assert_eq!(take(&log), vec!["seq keydown 0"]);
        assert!(engine.active_combos().is_empty());
    }

    // ========================================================================
    // Cancellation, pause and lifecycle
    // ========================================================================

    #[test]
    fn test_cancel_releases_everything() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("ctrl a", "c", &log)).unwrap();

        down(&mut engine, "ctrl");
        down(&mut engine, "a");
        take(&log);

        engine.cancel();
        assert_eq!(take(&log), vec!["c keyup 0", "c release 0"]);
        assert!(engine.pressed_keys().is_empty());
        assert!(engine.active_combos().is_empty());
    }

    #[test]
    fn test_pause_drops_input() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("a", "a", &log)).unwrap();

        down(&mut engine, "ctrl");
        engine.pause_input();
        assert!(engine.is_paused());
        assert!(engine.pressed_keys().is_empty());

        down(&mut engine, "a");
        assert!(take(&log).is_empty());
        assert!(engine.pressed_keys().is_empty());

        engine.resume_input();
        down(&mut engine, "a");
        assert_eq!(take(&log), vec!["a keydown 0"]);
    }

    #[test]
    fn test_unregister_active_combo() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("ctrl a", "c", &log)).unwrap();

        down(&mut engine, "ctrl");
        down(&mut engine, "a");
        assert_eq!(engine.active_combos().len(), 1);

        assert!(engine.unregister_combo("ctrl a"));
        assert!(engine.active_combos().is_empty());
        assert!(!engine.unregister_combo("ctrl a"), "Already gone");

        up(&mut engine, "a");
        up(&mut engine, "ctrl");
        assert_eq!(take(&log), vec!["c keydown 0"]);
    }

    #[test]
    fn test_unregister_many_and_clear_all() {
        let mut engine = engine();
        engine.simple_combo("a", |_, _, _| ()).unwrap();
        engine.simple_combo("b", |_, _, _| ()).unwrap();
        engine.simple_combo("c", |_, _, _| ()).unwrap();

        assert_eq!(engine.unregister_many(["a", "z"]), vec![true, false]);
        assert_eq!(engine.list_registered().len(), 2);

        engine.clear_all();
        assert!(engine.list_registered().is_empty());
    }

    #[test]
    fn test_reset_and_teardown() {
        let clock = ManualClock::new();
        let mut engine = Engine::with_clock(config(), clock);
        engine.sequence_combo("g g", |_, _, _| ()).unwrap();
        engine.simple_combo("ctrl a", |_, _, _| ()).unwrap();

        down(&mut engine, "g");
        down(&mut engine, "ctrl");
        down(&mut engine, "a");
        engine.reset();
        assert!(engine.pressed_keys().is_empty());
        assert!(engine.active_combos().is_empty());
        assert!(engine.sequence_buffer().is_empty());
        assert_eq!(engine.list_registered().len(), 2, "Registrations survive reset");

        down(&mut engine, "g");
        assert!(engine.sequence_deadline().is_some());
        engine.teardown();
        assert_eq!(engine.sequence_deadline(), None);
        assert!(engine.is_paused());
    }

    // ========================================================================
    // Event details
    // ========================================================================

    #[test]
    fn test_shifted_key_translation() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("?", "q", &log)).unwrap();

        engine.key_down("shift", Modifiers::shift());
        engine.key_down("/", Modifiers::shift());
        assert_eq!(engine.pressed_keys(), &[KeyName::from("shift"), KeyName::from("?")]);

        // shift is released first; "/" without shift still releases "?"
        engine.key_up("shift", Modifiers::NONE);
        engine.key_up("/", Modifiers::NONE);
        assert!(engine.pressed_keys().is_empty());
        assert_eq!(take(&log), vec!["q keydown 0", "q keyup 0", "q release 0"]);
    }

    #[test]
    fn test_modifier_flags_sync_pressed_keys() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("ctrl a", "c", &log)).unwrap();

        // ctrl went down while another window had focus
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        engine.key_down("a", ctrl);
        assert_eq!(take(&log), vec!["c keydown 0"]);

        engine.reset();
        down(&mut engine, "shift");
        engine.key_down("b", Modifiers::NONE);
        assert_eq!(engine.pressed_keys(), &[KeyName::from("b")], "Stale shift dropped");
    }

    #[test]
    fn test_keyup_of_unheld_alt_ignored() {
        let log = Log::default();
        let mut engine = engine();
        engine.register_combo(logged("alt", "alt", &log)).unwrap();

        let outcome = up(&mut engine, "alt");
        assert_eq!(outcome, EventOutcome::default());
        assert!(take(&log).is_empty());
    }

    #[test]
    fn test_cmd_chord_workaround() {
        let log = Log::default();
        let mut engine = Engine::with_clock(
            EngineConfig {
                meta_key: MetaKey::Cmd,
                ..EngineConfig::default()
            },
            ManualClock::new(),
        );
        assert!(engine.cmd_chord_policy().is_enabled());
        engine.register_combo(logged("a", "plain", &log)).unwrap();
        engine.register_combo(logged("cmd a", "cmd", &log)).unwrap();

        let meta = Modifiers {
            meta: true,
            ..Modifiers::NONE
        };
        engine.key_down("cmd", meta);
        engine.key_down("a", meta);

        // the OS never reports a's key-up while cmd is down
        assert_eq!(engine.pressed_keys(), &[KeyName::from("cmd")]);
        assert_eq!(take(&log), vec!["cmd keydown 0", "cmd keyup 0"]);

        engine.key_up("cmd", Modifiers::NONE);
        assert_eq!(take(&log), vec!["cmd release 0"]);
    }

    #[test]
    fn test_default_action_outcomes() {
        let mut engine = engine();
        engine
            .register_combo(ComboSpec::new("a").prevent_default(true))
            .unwrap();
        engine.simple_combo("b", |_, _, _| true).unwrap();
        engine.simple_combo("c", |_, _, _| false).unwrap();

        assert!(down(&mut engine, "a").prevent_default, "prevent_default flag");
        assert!(!down(&mut engine, "b").prevent_default, "callback allowed it");
        assert!(down(&mut engine, "c").prevent_default, "callback refused it");
        assert!(!down(&mut engine, "x").prevent_default, "no combo involved");

        engine.reset();
        engine.set_force_defaults(true);
        assert!(!down(&mut engine, "c").prevent_default, "force wins");

        engine.reset();
        engine.set_force_defaults(false);
        engine.set_suppress_defaults(true);
        assert!(down(&mut engine, "b").prevent_default, "suppress overrides the callback");
        assert!(!down(&mut engine, "x").prevent_default, "no combo involved");
    }

    #[test]
    fn test_defaults_apply_to_unset_flags() {
        let mut engine = Engine::with_clock(
            EngineConfig {
                meta_key: MetaKey::Ctrl,
                defaults: ComboFlags {
                    prevent_default: true,
                    ..ComboFlags::default()
                },
                ..EngineConfig::default()
            },
            ManualClock::new(),
        );
        engine.register_combo(ComboSpec::new("a")).unwrap();
        engine
            .register_combo(ComboSpec::new("b").prevent_default(false))
            .unwrap();

        assert!(down(&mut engine, "a").prevent_default);
        assert!(!down(&mut engine, "b").prevent_default);
    }
}
