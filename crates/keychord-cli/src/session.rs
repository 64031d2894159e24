//! An engine loaded with bindings, recording what fires

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use anyhow::{Context, Result};
use keychord_config::{BindingsConfig, ComboBinding};
use keychord_core::key::{ALT, CMD, CTRL, SHIFT};
use keychord_core::{
    Clock, ComboEvent, ComboSpec, Engine, EventOutcome, KeyEvent, KeyName, Modifiers,
};
use serde::Serialize;

use crate::script::Command;

/// One callback invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredEvent {
    pub binding: String,
    pub event: ComboEvent,
    pub action: String,
    pub key: KeyName,
    pub count: u32,
    pub autorepeat: bool,
}

/// Everything one script command caused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub line: usize,
    pub input: String,
    pub prevent_default: bool,
    pub fired: Vec<FiredEvent>,
}

impl StepReport {
    pub fn write_to(&self, out: &mut impl Write, json: bool) -> Result<()> {
        if json {
            serde_json::to_writer(&mut *out, self).context("Failed to encode step")?;
            writeln!(out)?;
            return Ok(());
        }

        for fired in &self.fired {
            write!(
                out,
                "{:>4}: {} {} -> {} (count {}",
                self.line, fired.event, fired.binding, fired.action, fired.count
            )?;
            if fired.autorepeat {
                write!(out, ", repeat")?;
            }
            writeln!(out, ")")?;
        }
        if self.prevent_default {
            writeln!(out, "{:>4}: default prevented for `{}`", self.line, self.input)?;
        }
        Ok(())
    }
}

type Log = Rc<RefCell<Vec<FiredEvent>>>;

pub struct Session<C: Clock> {
    engine: Engine<C>,
    log: Log,
}

impl<C: Clock> Session<C> {
    /// Build an engine from the bindings file and register every binding.
    pub fn new(config: &BindingsConfig, clock: C) -> Result<Self> {
        let mut engine = Engine::with_clock(config.engine_config(), clock);
        let log: Log = Rc::new(RefCell::new(Vec::new()));

        for binding in &config.bindings {
            if binding.actions.is_empty() {
                tracing::warn!("Binding '{}' has no actions and will never report", binding.name());
            }
            let spec = recording_spec(binding, &log);
            engine
                .register_combo(spec)
                .with_context(|| format!("Failed to register '{}'", binding.name()))?;
        }

        tracing::info!("Registered {} binding(s)", engine.list_registered().len());
        Ok(Self { engine, log })
    }

    pub fn engine(&self) -> &Engine<C> {
        &self.engine
    }

    /// Run a command that needs no clock. `wait` is left to the caller, which
    /// owns the notion of time.
    pub fn apply(&mut self, line: usize, input: &str, command: &Command) -> StepReport {
        let outcome = match command {
            Command::Down { key, modifiers } => self.key_event(key, true, *modifiers),
            Command::Up { key, modifiers } => self.key_event(key, false, *modifiers),
            Command::Tap { key, modifiers } => {
                let down = self.key_event(key, true, *modifiers);
                down.merge(self.key_event(key, false, *modifiers))
            }
            Command::Blur => self.engine.cancel(),
            Command::Pause => {
                self.engine.pause_input();
                EventOutcome::default()
            }
            Command::Resume => {
                self.engine.resume_input();
                EventOutcome::default()
            }
            Command::Wait(_) => {
                self.engine.poll_timers();
                EventOutcome::default()
            }
        };

        StepReport {
            line,
            input: input.to_string(),
            prevent_default: outcome.prevent_default,
            fired: self.log.borrow_mut().drain(..).collect(),
        }
    }

    /// Expire the sequence buffer if due.
    pub fn poll_timers(&mut self) -> bool {
        self.engine.poll_timers()
    }

    fn key_event(
        &mut self,
        key: &KeyName,
        is_keydown: bool,
        modifiers: Option<Modifiers>,
    ) -> EventOutcome {
        let key = if key.is_meta() {
            self.engine.get_meta_key_name()
        } else {
            key.clone()
        };
        let modifiers = modifiers
            .unwrap_or_else(|| held_modifiers(self.engine.pressed_keys(), &key, is_keydown));

        let event = if is_keydown {
            KeyEvent::down(key, modifiers)
        } else {
            KeyEvent::up(key, modifiers)
        };
        self.engine.handle_event(&event)
    }
}

/// Modifier flags a real keyboard would report given the held keys.
///
/// The key being pressed counts as held; the key being released does not.
pub fn held_modifiers(held: &[KeyName], key: &KeyName, is_keydown: bool) -> Modifiers {
    let is_held = |name: &str| {
        if key == name {
            is_keydown
        } else {
            held.iter().any(|k| k == name)
        }
    };
    Modifiers {
        alt: is_held(ALT),
        ctrl: is_held(CTRL),
        shift: is_held(SHIFT),
        meta: is_held(CMD),
    }
}

fn recording_spec(binding: &ComboBinding, log: &Log) -> ComboSpec {
    let mut spec = binding.spec();
    let name = binding.name();

    let slots = [
        (ComboEvent::Keydown, &binding.actions.on_keydown),
        (ComboEvent::Keyup, &binding.actions.on_keyup),
        (ComboEvent::Release, &binding.actions.on_release),
    ];
    for (event, action) in slots {
        let Some(action) = action.clone() else {
            continue;
        };
        let log = Rc::clone(log);
        let name = name.clone();
        let record = move |key_event: &KeyEvent, count: u32, autorepeat: bool| {
            log.borrow_mut().push(FiredEvent {
                binding: name.clone(),
                event,
                action: action.clone(),
                key: key_event.key.clone(),
                count,
                autorepeat,
            });
        };
        spec = match event {
            ComboEvent::Keydown => spec.on_keydown(record),
            ComboEvent::Keyup => spec.on_keyup(record),
            ComboEvent::Release => spec.on_release(record),
        };
    }

    spec
}
