//! Bindings file support for keychord
//!
//! Bindings are written in KDL. A file holds an optional `global` block with
//! engine settings, an optional `defaults` block with combo flags, and any
//! number of `combo`, `sequence` and `counter` nodes.
//!
//! ```text
//! global {
//!     meta-key "auto"
//!     sequence-delay 800
//! }
//!
//! combo "meta s" label="save" {
//!     prevent-default
//!     on-keydown "save"
//! }
//!
//! // children on one line end with `;`
//! sequence "g g" { on-keydown "top"; }
//! ```

mod error;
mod model;
mod parser;

pub use error::{ConfigError, InvalidKey, SourceLocation};
pub use model::*;
pub use parser::{parse_config, parse_config_str};
