//! KDL bindings parser

use std::path::Path;
use std::time::Duration;

use keychord_core::{validate_keys, ComboOptions, KeyName, DEFAULT_SEQUENCE_DELAY};

use crate::error::{ConfigError, InvalidKey, SourceLocation};
use crate::model::*;

/// Extract source location from a KDL node's name span
fn get_node_location(node: &kdl::KdlNode, source: &str) -> SourceLocation {
    let span = node.name().span();
    let offset = span.offset();
    let (line, column) = offset_to_line_col(source, offset);
    SourceLocation::new(line, column, offset, span.len())
}

/// Extract source location from a KDL entry
fn get_entry_location(entry: &kdl::KdlEntry, source: &str) -> SourceLocation {
    let span = entry.span();
    let offset = span.offset();
    let (line, column) = offset_to_line_col(source, offset);
    SourceLocation::new(line, column, offset, span.len())
}

/// Convert byte offset to line and column (1-indexed)
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Parse a bindings file from the given path
pub fn parse_config(path: &Path) -> Result<BindingsConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse bindings from a string
pub fn parse_config_str(content: &str) -> Result<BindingsConfig, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl carries its own miette version; rebuild the span for ours
        let span = miette::SourceSpan::from((e.span.offset(), e.span.len()));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = BindingsConfig::default();
    let mut invalid_keys = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node, content)?;
            }
            "defaults" => {
                config.defaults = parse_flags(node, content)?;
            }
            "combo" => {
                config
                    .bindings
                    .push(parse_binding(node, BindingKind::Combo, content, &mut invalid_keys)?);
            }
            "sequence" => {
                config.bindings.push(parse_binding(
                    node,
                    BindingKind::Sequence,
                    content,
                    &mut invalid_keys,
                )?);
            }
            "counter" => {
                config.bindings.push(parse_binding(
                    node,
                    BindingKind::Counter,
                    content,
                    &mut invalid_keys,
                )?);
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    if !invalid_keys.is_empty() {
        return Err(ConfigError::invalid_keys(content, invalid_keys));
    }

    // `meta` resolution depends on the global block, which may come last
    for binding in &config.bindings {
        validate_keys(&binding.keys, config.global.meta_key).map_err(|source| {
            ConfigError::InvalidCombo {
                keys: binding.name(),
                src: content.to_string(),
                span: binding.location.span(),
                source,
            }
        })?;
    }

    tracing::debug!("Parsed {} binding(s)", config.bindings.len());
    Ok(config)
}

fn parse_global(node: &kdl::KdlNode, source: &str) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    let Some(children) = node.children() else {
        return Ok(global);
    };

    for child in children.nodes() {
        let name = child.name().value();
        match name {
            "log-level" => {
                let value = string_value(child, source)?;
                global.log_level = value.parse().map_err(|e: String| {
                    ConfigError::invalid_value(source, name, get_node_location(child, source), e)
                })?;
            }
            "meta-key" => {
                let value = string_value(child, source)?;
                global.meta_key = value.parse().map_err(|e: String| {
                    ConfigError::invalid_value(source, name, get_node_location(child, source), e)
                })?;
            }
            "sequence-delay" => {
                global.sequence_delay = parse_sequence_delay(child, source)?;
            }
            "suppress-defaults" => {
                global.suppress_defaults = flag_value(child, source)?;
            }
            "force-defaults" => {
                global.force_defaults = flag_value(child, source)?;
            }
            "cmd-chord-workaround" => {
                global.cmd_chord_workaround = Some(flag_value(child, source)?);
            }
            name => {
                tracing::warn!("Unknown global config option: {}", name);
            }
        }
    }

    Ok(global)
}

/// `sequence-delay 800` in milliseconds; a negative number or `false` disables expiry.
fn parse_sequence_delay(
    node: &kdl::KdlNode,
    source: &str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(entry) = node.entries().first() else {
        return Err(missing_value(node, source));
    };

    let value = entry.value();
    if let Some(ms) = value.as_i64() {
        return Ok(u64::try_from(ms).ok().map(Duration::from_millis));
    }
    if let Some(enabled) = value.as_bool() {
        return Ok(enabled.then_some(DEFAULT_SEQUENCE_DELAY));
    }

    Err(ConfigError::invalid_value(
        source,
        "sequence-delay",
        get_entry_location(entry, source),
        "expected milliseconds or a boolean",
    ))
}

/// Parse the flag children of a `defaults` block or a binding.
fn parse_flags(node: &kdl::KdlNode, source: &str) -> Result<ComboOptions, ConfigError> {
    let mut options = ComboOptions::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if !apply_flag(&mut options, child, source)? {
                tracing::warn!("Unknown combo option: {}", child.name().value());
            }
        }
    }

    Ok(options)
}

/// Set the flag named by `node`. Returns false when the node is not a flag.
fn apply_flag(
    options: &mut ComboOptions,
    node: &kdl::KdlNode,
    source: &str,
) -> Result<bool, ConfigError> {
    let slot = match node.name().value() {
        "unordered" => &mut options.unordered,
        "counting" => &mut options.counting,
        "exclusive" => &mut options.exclusive,
        "solitary" => &mut options.solitary,
        "sequence" => &mut options.sequence,
        "prevent-default" => &mut options.prevent_default,
        "prevent-repeat" => &mut options.prevent_repeat,
        "normalize-caps-lock" => &mut options.normalize_caps_lock,
        _ => return Ok(false),
    };

    *slot = Some(flag_value(node, source)?);
    Ok(true)
}

fn parse_binding(
    node: &kdl::KdlNode,
    kind: BindingKind,
    source: &str,
    invalid_keys: &mut Vec<InvalidKey>,
) -> Result<ComboBinding, ConfigError> {
    let mut keys = Vec::new();
    let mut label = None;

    for entry in node.entries() {
        match entry.name().map(|name| name.value()) {
            None => {
                let Some(written) = entry.value().as_string() else {
                    return Err(ConfigError::invalid_value(
                        source,
                        kind.node_name(),
                        get_entry_location(entry, source),
                        "keys must be strings",
                    ));
                };
                for part in written.split_whitespace() {
                    let key = KeyName::parse(part);
                    if !key.is_valid() && !key.is_meta() {
                        invalid_keys.push(InvalidKey {
                            key: part.to_string(),
                            binding: written.to_string(),
                            location: get_entry_location(entry, source),
                        });
                    }
                    keys.push(key);
                }
            }
            Some("label") => {
                label = entry.value().as_string().map(str::to_string);
            }
            Some(other) => {
                tracing::warn!("Unknown {} property: {}", kind.node_name(), other);
            }
        }
    }

    if keys.is_empty() {
        return Err(ConfigError::MissingField {
            field: format!("keys (e.g., `{} \"ctrl s\" {{ ... }}`)", kind.node_name()),
            src: source.to_string(),
            span: get_node_location(node, source).span(),
        });
    }

    let mut options = ComboOptions::default();
    let mut actions = BindingActions::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "on-keydown" => actions.on_keydown = Some(string_value(child, source)?.to_string()),
                "on-keyup" => actions.on_keyup = Some(string_value(child, source)?.to_string()),
                "on-release" => actions.on_release = Some(string_value(child, source)?.to_string()),
                "label" => label = Some(string_value(child, source)?.to_string()),
                name => {
                    if !apply_flag(&mut options, child, source)? {
                        tracing::warn!("Unknown {} option: {}", kind.node_name(), name);
                    }
                }
            }
        }
    }

    Ok(ComboBinding {
        kind,
        keys,
        label,
        options,
        actions,
        location: get_node_location(node, source),
    })
}

/// A bare flag node means `true`; otherwise its first entry must be a boolean.
fn flag_value(node: &kdl::KdlNode, source: &str) -> Result<bool, ConfigError> {
    match node.entries().first() {
        None => Ok(true),
        Some(entry) => entry.value().as_bool().ok_or_else(|| {
            ConfigError::invalid_value(
                source,
                node.name().value(),
                get_entry_location(entry, source),
                "expected a boolean",
            )
        }),
    }
}

fn string_value<'a>(node: &'a kdl::KdlNode, source: &str) -> Result<&'a str, ConfigError> {
    let Some(entry) = node.entries().first() else {
        return Err(missing_value(node, source));
    };
    entry.value().as_string().ok_or_else(|| {
        ConfigError::invalid_value(
            source,
            node.name().value(),
            get_entry_location(entry, source),
            "expected a string",
        )
    })
}

fn missing_value(node: &kdl::KdlNode, source: &str) -> ConfigError {
    ConfigError::MissingField {
        field: format!("value for `{}`", node.name().value()),
        src: source.to_string(),
        span: get_node_location(node, source).span(),
    }
}
