//! Bindings file data model

use std::path::PathBuf;
use std::time::Duration;

use keychord_core::key::join_keys;
use keychord_core::{ComboFlags, ComboOptions, ComboSpec, EngineConfig, KeyName, MetaKey};
use serde::Serialize;

use crate::error::SourceLocation;

/// Where `keychord` looks for bindings when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/keychord/bindings.kdl";

/// Expand a leading `~` in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize)]
pub struct BindingsConfig {
    pub global: GlobalConfig,
    /// Flag defaults applied to every binding
    pub defaults: ComboOptions,
    pub bindings: Vec<ComboBinding>,
}

impl BindingsConfig {
    /// Engine settings described by the `global` and `defaults` blocks.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            sequence_delay: self.global.sequence_delay,
            meta_key: self.global.meta_key,
            defaults: self.defaults.resolve(&ComboFlags::default()),
            suppress_defaults: self.global.suppress_defaults,
            force_defaults: self.global.force_defaults,
            cmd_chord_workaround: self.global.cmd_chord_workaround,
        }
    }
}

/// Global settings
#[derive(Debug, Clone, Serialize)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
    /// `None` keeps sequences alive until the next non-matching key
    pub sequence_delay: Option<Duration>,
    pub meta_key: MetaKey,
    pub suppress_defaults: bool,
    pub force_defaults: bool,
    pub cmd_chord_workaround: Option<bool>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            log_level: LogLevel::default(),
            sequence_delay: engine.sequence_delay,
            meta_key: engine.meta_key,
            suppress_defaults: engine.suppress_defaults,
            force_defaults: engine.force_defaults,
            cmd_chord_workaround: engine.cmd_chord_workaround,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Which node a binding was declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    /// `combo "<keys>" { ... }`
    Combo,
    /// `sequence "<keys>" { ... }`: an exclusive sequence unless overridden
    Sequence,
    /// `counter "<keys>" { ... }`: an ordered counting combo unless overridden
    Counter,
}

impl BindingKind {
    pub fn node_name(self) -> &'static str {
        match self {
            BindingKind::Combo => "combo",
            BindingKind::Sequence => "sequence",
            BindingKind::Counter => "counter",
        }
    }
}

/// Named actions reported when a binding fires
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BindingActions {
    pub on_keydown: Option<String>,
    pub on_keyup: Option<String>,
    pub on_release: Option<String>,
}

impl BindingActions {
    pub fn is_empty(&self) -> bool {
        self.on_keydown.is_none() && self.on_keyup.is_none() && self.on_release.is_none()
    }
}

/// One combo declared in the bindings file
#[derive(Debug, Clone, Serialize)]
pub struct ComboBinding {
    pub kind: BindingKind,
    /// Keys as written, aliases resolved
    pub keys: Vec<KeyName>,
    pub label: Option<String>,
    /// Flags set explicitly inside the node
    pub options: ComboOptions,
    pub actions: BindingActions,
    pub location: SourceLocation,
}

impl ComboBinding {
    /// Explicit flags with the node kind's implied flags filled in.
    pub fn effective_options(&self) -> ComboOptions {
        let mut options = self.options;
        match self.kind {
            BindingKind::Combo => {}
            BindingKind::Sequence => {
                options.sequence.get_or_insert(true);
                options.exclusive.get_or_insert(true);
            }
            BindingKind::Counter => {
                options.counting.get_or_insert(true);
                options.unordered.get_or_insert(false);
            }
        }
        options
    }

    /// A spec for registration, without callbacks.
    pub fn spec(&self) -> ComboSpec {
        let spec = ComboSpec::new(self.keys.clone()).with_options(self.effective_options());
        match &self.label {
            Some(label) => spec.label(label.clone()),
            None => spec,
        }
    }

    /// The label, or the keys joined by spaces.
    pub fn name(&self) -> String {
        self.label.clone().unwrap_or_else(|| join_keys(&self.keys))
    }
}
