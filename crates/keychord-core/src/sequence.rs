//! Sequence buffer
//!
//! Remembers recent key-downs so sequence combos (`g g`, `up up down down`)
//! can be recognized regardless of what else is held. The buffer survives only
//! while it is a plausible prefix of some registered sequence and only until
//! the inactivity deadline passes.
//!
//! `shift` is invisible to sequences that do not name it: typing `?` reports
//! `shift` then `?`, and a sequence bound to `?` should still match.

use std::time::{Duration, Instant};

use crate::combo::{Combo, ComboId};
use crate::key::{KeyName, SHIFT};

/// Default inactivity window between sequence keys.
pub const DEFAULT_SEQUENCE_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone)]
pub struct SequenceBuffer {
    keys: Vec<KeyName>,
    /// `None` disables expiry entirely
    delay: Option<Duration>,
    deadline: Option<Instant>,
}

impl SequenceBuffer {
    pub fn new(delay: Option<Duration>) -> Self {
        Self {
            keys: Vec::new(),
            delay,
            deadline: None,
        }
    }

    pub fn keys(&self) -> &[KeyName] {
        &self.keys
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Change the inactivity window. A pending deadline is left alone unless
    /// expiry is being disabled.
    pub fn set_delay(&mut self, delay: Option<Duration>) {
        self.delay = delay;
        if delay.is_none() {
            self.deadline = None;
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Append a key-down and return the sequence combos still in progress.
    ///
    /// With at least one candidate the inactivity deadline is re-armed;
    /// otherwise the buffer is dropped on the spot.
    pub fn push(&mut self, key: KeyName, combos: &[Combo], now: Instant) -> Vec<ComboId> {
        let longest = combos
            .iter()
            .filter(|combo| combo.flags().sequence)
            .map(|combo| combo.keys().len())
            .max()
            .unwrap_or(0);
        self.keys.push(key);
        self.trim(longest);

        let in_progress: Vec<ComboId> = combos
            .iter()
            .filter(|combo| combo.flags().sequence && is_in_progress(&self.keys, combo.keys()))
            .map(Combo::id)
            .collect();

        if in_progress.is_empty() {
            self.clear();
        } else {
            // a delay too large to represent never expires
            self.deadline = self.delay.and_then(|delay| now.checked_add(delay));
            tracing::trace!(
                "Sequence buffer {:?} has {} candidate(s)",
                self.keys,
                in_progress.len()
            );
        }

        in_progress
    }

    /// The sequence combo completed by the buffer's tail, if any.
    ///
    /// Among several complete matches the longest wins. Completing an
    /// exclusive sequence empties the buffer so overlapping sequences cannot
    /// fire off the same keys.
    pub fn completed(&mut self, key: &KeyName, combos: &[Combo]) -> Option<ComboId> {
        let mut best: Option<(usize, ComboId, bool)> = None;

        for combo in combos.iter().filter(|combo| combo.flags().sequence) {
            if !completes(&self.keys, combo.keys(), key) {
                continue;
            }
            let len = combo.keys().len();
            if best.map_or(true, |(best_len, _, _)| len > best_len) {
                best = Some((len, combo.id(), combo.flags().exclusive));
            }
        }

        let (_, id, exclusive) = best?;
        if exclusive {
            tracing::debug!("Exclusive sequence {} completed, clearing buffer", id);
            self.clear();
        }
        Some(id)
    }

    /// Drop the buffer if the deadline has passed. Returns whether it expired.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                tracing::trace!("Sequence buffer {:?} expired", self.keys);
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Keep only the tail a sequence of `longest` keys can still use.
    ///
    /// That tail holds `longest` keys other than `shift`. Within it a run of
    /// `shift` is cut to its last `longest` entries, since a longer run cannot
    /// fall inside any match. Keys held on autorepeat stay bounded this way.
    fn trim(&mut self, longest: usize) {
        let mut visible = 0;
        let mut shift_run = 0;
        let mut kept = Vec::with_capacity(self.keys.len().min(longest * 2));

        for key in self.keys.drain(..).rev() {
            if key == SHIFT {
                shift_run += 1;
                if shift_run > longest {
                    continue;
                }
            } else {
                if visible == longest {
                    break;
                }
                visible += 1;
                shift_run = 0;
            }
            kept.push(key);
        }

        kept.reverse();
        self.keys = kept;
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.deadline = None;
    }
}

fn wants_shift(combo_keys: &[KeyName]) -> bool {
    combo_keys.iter().any(|key| key == SHIFT)
}

/// Does some trailing slice of `buffer` start `combo_keys`?
fn is_in_progress(buffer: &[KeyName], combo_keys: &[KeyName]) -> bool {
    let keep_shift = wants_shift(combo_keys);
    let visible = |key: &&KeyName| keep_shift || *key != SHIFT;

    let mut seen = 0;
    for start in (0..buffer.len()).rev() {
        if !visible(&&buffer[start]) {
            continue;
        }
        seen += 1;
        if seen > combo_keys.len() {
            return false;
        }
        let matches = buffer[start..]
            .iter()
            .filter(visible)
            .zip(combo_keys)
            .all(|(held, wanted)| held == wanted);
        if matches {
            return true;
        }
    }
    false
}

/// Does the tail of `buffer` spell out `combo_keys` exactly?
fn completes(buffer: &[KeyName], combo_keys: &[KeyName], key: &KeyName) -> bool {
    let keep_shift = wants_shift(combo_keys);
    if combo_keys.is_empty() || (!keep_shift && key == SHIFT) {
        return false;
    }

    let filtered: Vec<&KeyName> = buffer
        .iter()
        .filter(|key| keep_shift || *key != SHIFT)
        .collect();
    if filtered.len() < combo_keys.len() {
        return false;
    }

    filtered[filtered.len() - combo_keys.len()..]
        .iter()
        .zip(combo_keys)
        .all(|(held, wanted)| *held == wanted)
}
