//! Callback dispatch and default-action bookkeeping
//!
//! A [`Dispatcher`] lives for exactly one input event. Every component that
//! touches the event reports whether it wants the platform default action
//! suppressed; the dispatcher folds those requests together with the global
//! override switches and hands the verdict back as an [`EventOutcome`].

use crate::combo::{CallbackResult, Combo, ComboEvent};
use crate::key::KeyEvent;

/// Engine-wide overrides applied to every suppression request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultPolicy {
    /// Treat every suppression request as granted, even `false` ones
    pub suppress_all: bool,
    /// Never suppress, whatever combos or callbacks ask for
    pub force_all: bool,
}

/// What the engine decided about one input event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// The host should cancel the platform default action for this event
    pub prevent_default: bool,
    /// Number of combo callbacks invoked while processing the event
    pub callbacks_fired: usize,
}

impl EventOutcome {
    /// Combine the outcomes of several events handled as one unit.
    pub fn merge(self, other: EventOutcome) -> EventOutcome {
        EventOutcome {
            prevent_default: self.prevent_default || other.prevent_default,
            callbacks_fired: self.callbacks_fired + other.callbacks_fired,
        }
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    policy: DefaultPolicy,
    prevent_default: bool,
    callbacks_fired: usize,
}

impl Dispatcher {
    pub fn new(policy: DefaultPolicy) -> Self {
        Self {
            policy,
            prevent_default: false,
            callbacks_fired: 0,
        }
    }

    /// Record a suppression request, subject to the global overrides.
    pub fn prevent(&mut self, should_prevent: bool) {
        if (should_prevent || self.policy.suppress_all) && !self.policy.force_all {
            self.prevent_default = true;
        }
    }

    /// Invoke one callback slot of `combo` and apply its side effects.
    ///
    /// The callback sees the combo's count as it stands before any release
    /// reset. Anything but [`CallbackResult::AllowDefault`] requests
    /// suppression. Release zeroes the count; keyup marks the activation as
    /// having fired its keyup. Both happen whether or not a callback is set.
    pub fn fire(
        &mut self,
        kind: ComboEvent,
        combo: &mut Combo,
        event: &KeyEvent,
        is_autorepeat: bool,
    ) {
        let count = combo.count;
        let id = combo.id;

        if let Some(callback) = combo.callback_mut(kind) {
            tracing::trace!(
                "Firing {} for combo {} (count {}, autorepeat {})",
                kind,
                id,
                count,
                is_autorepeat
            );
            let result = callback(event, count, is_autorepeat);
            self.callbacks_fired += 1;
            self.prevent(result != CallbackResult::AllowDefault);
        }

        match kind {
            ComboEvent::Release => combo.count = 0,
            ComboEvent::Keyup => combo.keyup_fired = Some(true),
            ComboEvent::Keydown => {}
        }
    }

    pub fn prevent_default(&self) -> bool {
        self.prevent_default
    }

    pub fn finish(self) -> EventOutcome {
        EventOutcome {
            prevent_default: self.prevent_default,
            callbacks_fired: self.callbacks_fired,
        }
    }
}
