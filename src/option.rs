//! Option descriptors and the format-string grammar that declares them.
//!
//! An option is declared from a format string such as:
//!
//! ```text
//! -c, --count <n:number>
//! --cache [dir:file]
//! --no-banner
//! -d, --debug, !--verbose-debug
//! ```
//!
//! The first long token and the first short token become the canonical
//! names; extra tokens become aliases (`!` marks an alias hidden from help).
//! A `--no-` prefix on the canonical long marks the option negated: its
//! default is `true` and presence stores `false`. A `<name>` value token
//! makes the option require a value, `[name]` makes the value optional, and
//! either may carry a `:type` annotation.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::argument::Validator;
use crate::error::{Error, Result};
use crate::util::camel_case;
use crate::value::{Value, ValueKind};

/// Whether and how an option consumes a value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValueArity {
    /// Boolean flag; presence stores `true` (or `false` when negated).
    #[default]
    None,
    /// `[name]` — consumes a value when one is available, otherwise `true`.
    Optional(String),
    /// `<name>` — a value must follow.
    Required(String),
}

impl ValueArity {
    pub fn takes_value(&self) -> bool {
        !matches!(self, ValueArity::None)
    }
}

/// Input handed to an option callback when the parser recognizes the option.
#[derive(Debug, Clone)]
pub struct CallbackPayload {
    /// Canonical `argv` key of the option.
    pub name: String,
    /// The coerced value about to be stored.
    pub value: Value,
    /// The value currently in `argv` for this key, if any.
    pub previous: Option<Value>,
}

/// What the parser should do with the recognized value.
#[derive(Debug, Clone)]
pub enum CallbackAction {
    /// Store this value (possibly rewritten by the callback).
    Set(Value),
    /// Leave `argv` untouched.
    Suppress,
}

pub type OptionCallback = Rc<dyn Fn(CallbackPayload) -> anyhow::Result<CallbackAction>>;

/// Extra parameters accepted alongside a format string.
#[derive(Clone, Default)]
pub struct OptParams {
    pub desc: Option<String>,
    pub group: Option<String>,
    pub default: Option<Value>,
    pub required: bool,
    pub hidden: bool,
    /// Overrides the `:type` annotation from the format string.
    pub kind: Option<ValueKind>,
    pub callback: Option<OptionCallback>,
    pub validator: Option<Validator>,
}

impl OptParams {
    pub fn desc(desc: impl Into<String>) -> Self {
        Self {
            desc: Some(desc.into()),
            ..Default::default()
        }
    }
}

/// A named option declared on a context.
#[derive(Clone, Default)]
pub struct Opt {
    /// Canonical long name without dashes and without any `no-` prefix.
    pub long: Option<String>,
    /// Canonical short name (single character, without the dash).
    pub short: Option<String>,
    pub negated: bool,
    pub arity: ValueArity,
    pub kind: ValueKind,
    pub default: Option<Value>,
    pub required: bool,
    pub hidden: bool,
    pub desc: Option<String>,
    pub group: String,
    /// Long aliases as typed (minus the leading dashes) mapped to visibility.
    pub long_aliases: IndexMap<String, bool>,
    /// Short aliases mapped to visibility.
    pub short_aliases: IndexMap<String, bool>,
    pub callback: Option<OptionCallback>,
    pub validator: Option<Validator>,
}

impl Opt {
    /// Parse a format string into an option descriptor.
    pub fn parse(format: &str) -> Result<Self> {
        let fail = |reason: &str| Error::InvalidOptionFormat {
            format: format.to_string(),
            reason: reason.to_string(),
        };

        let mut opt = Opt::default();
        let mut saw_value = false;

        for token in format
            .split(|c: char| c == ',' || c == '|' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            if let Some(inner) = strip_value_token(token) {
                let (required, body) = inner;
                if saw_value {
                    return Err(fail("multiple value placeholders"));
                }
                saw_value = true;
                let (name, kind) = match body.split_once(':') {
                    Some((name, kind)) => (name, Some(kind.parse::<ValueKind>()?)),
                    None => (body, None),
                };
                if name.is_empty() {
                    return Err(fail("empty value placeholder"));
                }
                if let Some(kind) = kind {
                    opt.kind = kind;
                }
                opt.arity = if required {
                    ValueArity::Required(name.to_string())
                } else {
                    ValueArity::Optional(name.to_string())
                };
                continue;
            }

            let (token, visible) = match token.strip_prefix('!') {
                Some(rest) => (rest, false),
                None => (token, true),
            };

            if let Some(name) = token.strip_prefix("--") {
                if name.is_empty() || !is_valid_name(name) {
                    return Err(fail("malformed long name"));
                }
                if opt.long.is_none() {
                    if !visible {
                        return Err(fail("canonical long name cannot be hidden"));
                    }
                    match name.strip_prefix("no-") {
                        Some(stripped) if !stripped.is_empty() => {
                            opt.negated = true;
                            opt.long = Some(stripped.to_string());
                        }
                        _ => opt.long = Some(name.to_string()),
                    }
                } else {
                    opt.long_aliases.insert(name.to_string(), visible);
                }
                continue;
            }

            if let Some(name) = token.strip_prefix('-') {
                let mut chars = name.chars();
                let c = chars.next().ok_or_else(|| fail("empty short name"))?;
                if chars.next().is_some() || !c.is_ascii_alphanumeric() && c != '?' {
                    return Err(fail("short name must be a single character"));
                }
                if opt.short.is_none() {
                    if !visible {
                        return Err(fail("canonical short name cannot be hidden"));
                    }
                    opt.short = Some(c.to_string());
                } else {
                    opt.short_aliases.insert(c.to_string(), visible);
                }
                continue;
            }

            return Err(fail("expected a dashed name or value placeholder"));
        }

        if opt.long.is_none() && opt.short.is_none() {
            return Err(fail("at least one long or short name is required"));
        }
        if opt.negated && opt.arity.takes_value() {
            return Err(fail("a negated option cannot take a value"));
        }

        Ok(opt)
    }

    pub(crate) fn apply_params(&mut self, params: OptParams) {
        if params.desc.is_some() {
            self.desc = params.desc;
        }
        if let Some(group) = params.group {
            self.group = group;
        }
        if params.default.is_some() {
            self.default = params.default;
        }
        if let Some(kind) = params.kind {
            self.kind = kind;
        }
        self.required |= params.required;
        self.hidden |= params.hidden;
        if params.callback.is_some() {
            self.callback = params.callback;
        }
        if params.validator.is_some() {
            self.validator = params.validator;
        }
    }

    /// Key under which the parsed value lands in `argv`.
    pub fn canonical_key(&self, camel: bool) -> String {
        let name = self
            .long
            .as_deref()
            .or(self.short.as_deref())
            .unwrap_or_default();
        if camel { camel_case(name) } else { name.to_string() }
    }

    /// Every long key the lookup should answer to, canonical first.
    pub(crate) fn long_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(long) = &self.long {
            if self.negated {
                keys.push(format!("no-{long}"));
            } else {
                keys.push(long.clone());
            }
        }
        keys.extend(self.long_aliases.keys().cloned());
        keys
    }

    /// Every short key the lookup should answer to, canonical first.
    pub(crate) fn short_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(short) = &self.short {
            keys.push(short.clone());
        }
        keys.extend(self.short_aliases.keys().cloned());
        keys
    }

    /// Effective default: negated options implicitly default to `true`.
    pub fn default_value(&self) -> Option<Value> {
        if self.default.is_some() {
            return self.default.clone();
        }
        if self.negated {
            return Some(Value::Bool(true));
        }
        None
    }

    /// Display form used in help output and error messages.
    pub fn label(&self) -> String {
        let mut out = String::new();
        if let Some(short) = &self.short {
            out.push('-');
            out.push_str(short);
        }
        if let Some(long) = &self.long {
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push_str("--");
            if self.negated {
                out.push_str("no-");
            }
            out.push_str(long);
        }
        match &self.arity {
            ValueArity::None => {}
            ValueArity::Optional(name) => {
                out.push_str(&format!(" [{name}]"));
            }
            ValueArity::Required(name) => {
                out.push_str(&format!(" <{name}>"));
            }
        }
        out
    }
}

impl std::fmt::Debug for Opt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opt")
            .field("long", &self.long)
            .field("short", &self.short)
            .field("negated", &self.negated)
            .field("arity", &self.arity)
            .field("kind", &self.kind)
            .field("group", &self.group)
            .field("hidden", &self.hidden)
            .finish()
    }
}

fn strip_value_token(token: &str) -> Option<(bool, &str)> {
    if let Some(rest) = token.strip_prefix('<') {
        return rest.strip_suffix('>').map(|body| (true, body));
    }
    if let Some(rest) = token.strip_prefix('[') {
        return rest.strip_suffix(']').map(|body| (false, body));
    }
    None
}

fn is_valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !name.starts_with('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_and_short_with_typed_value() {
        let opt = Opt::parse("-c, --count <n:number>").unwrap();
        assert_eq!(opt.long.as_deref(), Some("count"));
        assert_eq!(opt.short.as_deref(), Some("c"));
        assert_eq!(opt.arity, ValueArity::Required("n".to_string()));
        assert_eq!(opt.kind, ValueKind::Number);
        assert_eq!(opt.canonical_key(true), "count");
    }

    #[test]
    fn negated_long_strips_prefix_and_defaults_true() {
        let opt = Opt::parse("--no-banner").unwrap();
        assert!(opt.negated);
        assert_eq!(opt.long.as_deref(), Some("banner"));
        assert_eq!(opt.long_keys(), vec!["no-banner".to_string()]);
        assert_eq!(opt.default_value(), Some(Value::Bool(true)));
        assert_eq!(opt.canonical_key(true), "banner");
    }

    #[test]
    fn extra_tokens_become_aliases() {
        let opt = Opt::parse("-v | --verbose | --chatty | !--noisy").unwrap();
        assert_eq!(opt.long.as_deref(), Some("verbose"));
        assert_eq!(opt.long_aliases.get("chatty"), Some(&true));
        assert_eq!(opt.long_aliases.get("noisy"), Some(&false));
        assert_eq!(
            opt.long_keys(),
            vec![
                "verbose".to_string(),
                "chatty".to_string(),
                "noisy".to_string()
            ]
        );
    }

    #[test]
    fn optional_value_uses_brackets() {
        let opt = Opt::parse("--cache [dir]").unwrap();
        assert_eq!(opt.arity, ValueArity::Optional("dir".to_string()));
        assert_eq!(opt.kind, ValueKind::String);
    }

    #[test]
    fn camel_case_key_comes_from_long_name() {
        let opt = Opt::parse("--log-level <level>").unwrap();
        assert_eq!(opt.canonical_key(true), "logLevel");
        assert_eq!(opt.canonical_key(false), "log-level");
    }

    #[test]
    fn short_only_option_keys_off_the_short_name() {
        let opt = Opt::parse("-x").unwrap();
        assert_eq!(opt.canonical_key(true), "x");
        assert!(opt.long_keys().is_empty());
    }

    #[test]
    fn malformed_formats_are_rejected() {
        for format in [
            "",
            "count",
            "--",
            "-xy",
            "--count <a> <b>",
            "--count <>",
            "--no-flag <v>",
            "!--only-hidden",
        ] {
            let err = Opt::parse(format).unwrap_err();
            assert_eq!(err.code(), "INVALID_OPTION_FORMAT", "format: {format:?}");
        }
    }

    #[test]
    fn label_renders_both_names_and_value() {
        let opt = Opt::parse("-o, --output <file>").unwrap();
        assert_eq!(opt.label(), "-o, --output <file>");
        let opt = Opt::parse("--no-color").unwrap();
        assert_eq!(opt.label(), "--no-color");
    }
}
