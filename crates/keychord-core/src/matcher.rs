//! Combo matching
//!
//! Pure functions over a snapshot of held keys. There are four comparison
//! primitives:
//!
//! | mode             | ordered combo                  | unordered combo           |
//! |------------------|--------------------------------|---------------------------|
//! | exact            | same keys, same order          | same keys, any order      |
//! | fuzzy (contains) | combo keys appear in order     | combo keys all present    |
//!
//! Exact matches are combos the current key event directly completes. Fuzzy
//! matches are combos whose keys are all still held among other keys; they
//! keep larger chords from shadowing smaller ones. Solitary combos only ever
//! match exactly.
//!
//! Sequence combos are never matched here; they belong to the sequence buffer.

use std::borrow::Cow;

use crate::combo::{Combo, ComboId};
use crate::key::{KeyName, CAPS};
use crate::policy::CmdChordPolicy;
use crate::pressed::PressedKeys;

// ============================================================================
// Primitives
// ============================================================================

/// Snapshot equals `keys` element-wise.
pub fn exact_ordered(snapshot: &[KeyName], keys: &[KeyName]) -> bool {
    snapshot == keys
}

/// Snapshot and `keys` have the same length and membership.
pub fn exact_unordered(snapshot: &[KeyName], keys: &[KeyName]) -> bool {
    snapshot.len() == keys.len() && snapshot.iter().all(|key| keys.contains(key))
}

/// Every key of `keys` is in `snapshot`, at non-decreasing positions.
pub fn fuzzy_ordered(keys: &[KeyName], snapshot: &[KeyName]) -> bool {
    let mut previous = 0;
    for key in keys {
        match snapshot.iter().position(|held| held == key) {
            Some(index) if index >= previous => previous = index,
            _ => return false,
        }
    }
    true
}

/// Every key of `keys` is in `snapshot`.
pub fn fuzzy_unordered(keys: &[KeyName], snapshot: &[KeyName]) -> bool {
    keys.iter().all(|key| snapshot.contains(key))
}

/// Drop the first `caps` entry from a snapshot.
pub fn strip_caps(snapshot: &[KeyName]) -> Cow<'_, [KeyName]> {
    match snapshot.iter().position(|key| key == CAPS) {
        Some(index) => {
            let mut stripped = snapshot.to_vec();
            stripped.remove(index);
            Cow::Owned(stripped)
        }
        None => Cow::Borrowed(snapshot),
    }
}

// ============================================================================
// Combo-level matching
// ============================================================================

/// Does `snapshot` exactly activate `combo`?
pub fn is_exact_match(combo: &Combo, snapshot: &[KeyName]) -> bool {
    let snapshot = if combo.flags().normalize_caps_lock {
        strip_caps(snapshot)
    } else {
        Cow::Borrowed(snapshot)
    };

    if combo.flags().unordered {
        exact_unordered(&snapshot, combo.keys())
    } else {
        exact_ordered(&snapshot, combo.keys())
    }
}

/// Is `combo` contained in `snapshot`?
pub fn is_fuzzy_match(combo: &Combo, snapshot: &[KeyName]) -> bool {
    if combo.flags().unordered {
        fuzzy_unordered(combo.keys(), snapshot)
    } else {
        fuzzy_ordered(combo.keys(), snapshot)
    }
}

/// Combos activated by `snapshot`: exact matches first, then fuzzy ones.
///
/// `pressed` is the held set before the current key went down; the cmd chord
/// policy judges combos against it.
pub fn active_candidates(
    combos: &[Combo],
    snapshot: &[KeyName],
    pressed: &PressedKeys,
    policy: &CmdChordPolicy,
) -> Vec<ComboId> {
    let chords = || combos.iter().filter(|combo| !combo.flags().sequence);

    let mut matches: Vec<ComboId> = chords()
        .filter(|combo| is_exact_match(combo, snapshot) && policy.allows(pressed, combo.keys()))
        .map(Combo::id)
        .collect();

    let fuzzy: Vec<ComboId> = chords()
        .filter(|combo| !matches.contains(&combo.id()))
        .filter(|combo| !combo.flags().solitary && policy.allows(pressed, combo.keys()))
        .filter(|combo| is_fuzzy_match(combo, snapshot))
        .map(Combo::id)
        .collect();

    matches.extend(fuzzy);
    matches
}

/// Every chord combo containing `key`, whether or not it activates.
///
/// Used for default-action suppression and exclusivity decisions.
pub fn potential_candidates(
    combos: &[Combo],
    key: &KeyName,
    pressed: &PressedKeys,
    policy: &CmdChordPolicy,
) -> Vec<ComboId> {
    combos
        .iter()
        .filter(|combo| !combo.flags().sequence)
        .filter(|combo| combo.contains(key) && policy.allows(pressed, combo.keys()))
        .map(Combo::id)
        .collect()
}
