//! Keyboard combo, sequence and counter recognition
//!
//! `keychord-core` turns a stream of normalized key transitions into combo
//! callbacks. It knows nothing about where keys come from: an event source
//! hands [`Engine::handle_event`] a [`KeyEvent`] per physical transition and
//! calls [`Engine::cancel`] when focus is lost.
//!
//! ```ignore
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.simple_combo("meta s", |_event, _count, _repeat| save())?;
//! engine.sequence_combo("up up down down", |_, _, _| cheat())?;
//!
//! let outcome = engine.key_down("s", Modifiers { ctrl: true, ..Modifiers::NONE });
//! if outcome.prevent_default {
//!     // cancel the platform action
//! }
//! ```

pub mod clock;
pub mod combo;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod key;
pub mod matcher;
pub mod policy;
pub mod pressed;
pub mod registry;
pub mod sequence;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use combo::{
    CallbackResult, Combo, ComboEvent, ComboFlags, ComboId, ComboOptions, ComboSpec, KeyList,
};
pub use dispatch::{DefaultPolicy, EventOutcome};
pub use engine::{Engine, EngineConfig};
pub use error::ComboError;
pub use key::{KeyEvent, KeyName, MetaKey, Modifiers};
pub use policy::CmdChordPolicy;
pub use registry::{validate_keys, ComboRef};
pub use sequence::DEFAULT_SEQUENCE_DELAY;
