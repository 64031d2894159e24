//! Combo registry
//!
//! Stores registered combos in registration order and validates specs on the
//! way in.
//!
//! ## Validation
//!
//! 1. Aliases are resolved (`escape` -> `esc`, `windows` -> `cmd`, ...)
//! 2. `meta` is replaced with the platform meta key
//! 3. Unknown key names and empty key lists are logged; the combo is still stored
//! 4. A combo written with `meta` or `cmd` may name at most one non-modifier
//!    key; anything more is rejected with [`ComboError::MetaWithMultipleKeys`]
//!
//! The registry never deduplicates: registering the same keys twice yields two
//! independent combos that both fire.

use crate::combo::{Combo, ComboFlags, ComboId, ComboSpec, KeyList};
use crate::error::ComboError;
use crate::key::{join_keys, KeyName, MetaKey, CMD};

/// What to unregister: a specific combo, or every combo bound to some keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComboRef {
    Id(ComboId),
    Keys(KeyList),
}

impl From<ComboId> for ComboRef {
    fn from(id: ComboId) -> Self {
        ComboRef::Id(id)
    }
}

impl From<KeyList> for ComboRef {
    fn from(keys: KeyList) -> Self {
        ComboRef::Keys(keys)
    }
}

impl From<&str> for ComboRef {
    fn from(keys: &str) -> Self {
        ComboRef::Keys(KeyList::from(keys))
    }
}

impl From<String> for ComboRef {
    fn from(keys: String) -> Self {
        ComboRef::Keys(KeyList::from(keys))
    }
}

impl From<&[&str]> for ComboRef {
    fn from(keys: &[&str]) -> Self {
        ComboRef::Keys(KeyList::from(keys))
    }
}

impl<const N: usize> From<[&str; N]> for ComboRef {
    fn from(keys: [&str; N]) -> Self {
        ComboRef::Keys(KeyList::from(keys))
    }
}

impl From<Vec<&str>> for ComboRef {
    fn from(keys: Vec<&str>) -> Self {
        ComboRef::Keys(KeyList::from(keys))
    }
}

/// Registered combos, in registration order.
#[derive(Debug)]
pub struct Registry {
    combos: Vec<Combo>,
    next_id: u64,
    meta_key: MetaKey,
    defaults: ComboFlags,
}

impl Registry {
    pub fn new(meta_key: MetaKey, defaults: ComboFlags) -> Self {
        Self {
            combos: Vec::new(),
            next_id: 1,
            meta_key,
            defaults,
        }
    }

    pub fn meta_key(&self) -> MetaKey {
        self.meta_key
    }

    pub fn defaults(&self) -> &ComboFlags {
        &self.defaults
    }

    /// Validate and store a combo.
    ///
    /// # Errors
    ///
    /// Returns [`ComboError::MetaWithMultipleKeys`] if the spec mixes `meta`
    /// or `cmd` with more than one non-modifier key. Nothing is stored then.
    pub fn register(&mut self, spec: ComboSpec) -> Result<ComboId, ComboError> {
        let keys = validate_keys(spec.keys.as_slice(), self.meta_key)?;
        let flags = spec.options.resolve(&self.defaults);

        let id = ComboId(self.next_id);
        self.next_id += 1;

        tracing::debug!(
            "Registered combo {}: '{}' ({:?})",
            id,
            join_keys(&keys),
            flags
        );

        self.combos.push(Combo {
            id,
            keys,
            flags,
            label: spec.label,
            on_keydown: spec.on_keydown,
            on_keyup: spec.on_keyup,
            on_release: spec.on_release,
            count: 0,
            keyup_fired: None,
        });

        Ok(id)
    }

    pub fn register_many(
        &mut self,
        specs: impl IntoIterator<Item = ComboSpec>,
    ) -> Vec<Result<ComboId, ComboError>> {
        specs.into_iter().map(|spec| self.register(spec)).collect()
    }

    /// Remove combos matching `target`, returning the ids that were removed.
    ///
    /// Key-based removal compares against each combo under its own ordering
    /// rule: unordered combos match as sets, ordered combos as sequences.
    /// An empty key list matches nothing.
    pub fn unregister(&mut self, target: impl Into<ComboRef>) -> Vec<ComboId> {
        let removed: Vec<ComboId> = match target.into() {
            ComboRef::Id(id) => self
                .combos
                .iter()
                .filter(|combo| combo.id == id)
                .map(|combo| combo.id)
                .collect(),
            ComboRef::Keys(keys) => {
                if keys.is_empty() {
                    tracing::debug!("Ignoring unregister request with no keys");
                    return Vec::new();
                }
                let keys = resolve_meta(keys.as_slice(), self.meta_key);
                self.combos
                    .iter()
                    .filter(|combo| {
                        if combo.flags.unordered {
                            same_members(&keys, &combo.keys)
                        } else {
                            keys == combo.keys
                        }
                    })
                    .map(|combo| combo.id)
                    .collect()
            }
        };

        self.combos.retain(|combo| !removed.contains(&combo.id));
        for id in &removed {
            tracing::debug!("Unregistered combo {}", id);
        }
        removed
    }

    pub fn unregister_many<T: Into<ComboRef>>(
        &mut self,
        targets: impl IntoIterator<Item = T>,
    ) -> Vec<Vec<ComboId>> {
        targets
            .into_iter()
            .map(|target| self.unregister(target))
            .collect()
    }

    pub fn combos(&self) -> &[Combo] {
        &self.combos
    }

    pub fn get(&self, id: ComboId) -> Option<&Combo> {
        self.combos.iter().find(|combo| combo.id == id)
    }

    pub fn get_mut(&mut self, id: ComboId) -> Option<&mut Combo> {
        self.combos.iter_mut().find(|combo| combo.id == id)
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    /// Drop every registered combo.
    pub fn clear(&mut self) {
        tracing::debug!("Clearing {} registered combo(s)", self.combos.len());
        self.combos.clear();
    }
}

fn resolve_meta(keys: &[KeyName], meta_key: MetaKey) -> Vec<KeyName> {
    keys.iter()
        .map(|key| {
            if key.is_meta() {
                meta_key.key_name()
            } else {
                key.clone()
            }
        })
        .collect()
}

fn same_members(a: &[KeyName], b: &[KeyName]) -> bool {
    a.len() == b.len() && a.iter().all(|key| b.contains(key))
}

/// Resolve and check the keys of a combo spec.
///
/// Keys arrive alias-resolved (see [`KeyList`]); this substitutes `meta`,
/// logs soft problems and rejects structural ones.
pub fn validate_keys(keys: &[KeyName], meta_key: MetaKey) -> Result<Vec<KeyName>, ComboError> {
    if keys.is_empty() {
        tracing::warn!("Registering a combo with no keys");
    }

    let uses_meta = keys.iter().any(|key| key.is_meta() || key == CMD);
    if keys.iter().any(|key| key == CMD) {
        tracing::debug!("Use the \"meta\" key rather than \"cmd\" for cross-platform combos");
    }

    let resolved = resolve_meta(keys, meta_key);

    for key in resolved.iter().filter(|key| !key.is_valid()) {
        tracing::warn!(
            "Unrecognized key \"{}\" in combo '{}'; the combo is still registered",
            key,
            join_keys(keys)
        );
    }

    if uses_meta {
        let non_modifiers: Vec<KeyName> = keys
            .iter()
            .filter(|key| !key.is_modifier())
            .cloned()
            .collect();
        if non_modifiers.len() > 1 {
            tracing::warn!(
                "Rejecting combo '{}': meta and cmd combos allow one non-modifier key",
                join_keys(keys)
            );
            return Err(ComboError::MetaWithMultipleKeys {
                keys: keys.to_vec(),
                non_modifiers,
            });
        }
    }

    Ok(resolved)
}
