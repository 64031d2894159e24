//! Error types for combo registration

use thiserror::Error;

use crate::key::{join_keys, KeyName};

/// Structural problems that prevent a combo from being registered.
///
/// Softer problems (unknown key names, empty key lists) are only logged; the
/// combo is still stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComboError {
    /// A `meta`/`cmd` combo names more than one non-modifier key
    #[error(
        "meta and cmd combos cannot have more than one non-modifier key: '{}' (non-modifiers: {})",
        join_keys(.keys),
        join_keys(.non_modifiers)
    )]
    MetaWithMultipleKeys {
        keys: Vec<KeyName>,
        non_modifiers: Vec<KeyName>,
    },
}
