//! The argument-vector parser.
//!
//! A single pass over the tokens, descending the command tree as command
//! names are matched and resolving options against the chain of scopes
//! (nearest scope wins). Defaults are seeded whenever a context becomes
//! visible and never overwrite explicit values; positional binding and the
//! final default/required passes run after the token loop.

use indexmap::IndexMap;

use crate::command::Command;
use crate::context::{Context, Scope};
use crate::error::{Error, Result, Warning};
use crate::option::{CallbackAction, CallbackPayload, Opt, ValueArity};
use crate::value::{self, Value};

/// Root-level knobs the parser consults; commands can override
/// `treatUnknownOptionsAsArguments` through their properties.
#[derive(Debug, Clone)]
pub struct ParserSettings {
    pub camel_case: bool,
    pub treat_unknown_options_as_arguments: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            camel_case: true,
            treat_unknown_options_as_arguments: false,
        }
    }
}

/// Everything the parse produced.
#[derive(Debug)]
pub struct ParseResult<'a> {
    /// Raw positional tokens (`_`).
    pub args: Vec<String>,
    /// Canonical option/argument name mapped to its coerced value.
    pub argv: IndexMap<String, Value>,
    /// Traversed contexts, terminal first.
    pub contexts: Vec<&'a Context>,
    /// The innermost command descended into, if any.
    pub command: Option<&'a Command>,
    /// Unrecognized option names mapped to their raw tokens.
    pub unknown: IndexMap<String, String>,
    /// Load-time warnings carried over from tree construction.
    pub warnings: Vec<Warning>,
}

impl<'a> ParseResult<'a> {
    pub fn scope(&self) -> Scope<'_> {
        Scope::new(&self.contexts)
    }

    /// Scoped read where the outermost declaration wins.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scope().get(name)
    }

    /// Scoped read where the innermost declaration wins.
    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.scope().prop(name)
    }
}

/// A parse failure plus the chain of contexts reached before it, so
/// help-on-error can render for the right command.
#[derive(Debug)]
pub(crate) struct FailedParse<'a> {
    pub error: Error,
    pub contexts: Vec<&'a Context>,
}

/// Parse `tokens` against the tree rooted at `root`.
pub fn parse<'a>(
    root: &'a Context,
    tokens: &[String],
    settings: &ParserSettings,
) -> Result<ParseResult<'a>> {
    parse_internal(root, tokens, settings).map_err(|failed| failed.error)
}

pub(crate) fn parse_internal<'a>(
    root: &'a Context,
    tokens: &[String],
    settings: &ParserSettings,
) -> std::result::Result<ParseResult<'a>, FailedParse<'a>> {
    let mut machine = Machine {
        settings,
        contexts: vec![root],
        command: None,
        argv: IndexMap::new(),
        args: Vec::new(),
        unknown: IndexMap::new(),
        rest_only: false,
        opaque: false,
    };
    machine.seed_defaults(root);

    let mut outcome = machine.run(tokens);
    if outcome.is_ok() {
        outcome = machine.finalize();
    }
    match outcome {
        Ok(()) => Ok(ParseResult {
            args: machine.args,
            argv: machine.argv,
            contexts: machine.contexts,
            command: machine.command,
            unknown: machine.unknown,
            warnings: Vec::new(),
        }),
        Err(error) => Err(FailedParse {
            error,
            contexts: machine.contexts,
        }),
    }
}

struct Machine<'a, 's> {
    settings: &'s ParserSettings,
    contexts: Vec<&'a Context>,
    command: Option<&'a Command>,
    argv: IndexMap<String, Value>,
    args: Vec<String>,
    unknown: IndexMap<String, String>,
    /// Everything after `--` is positional.
    rest_only: bool,
    /// An opaque extension was entered; remaining tokens pass through.
    opaque: bool,
}

impl<'a> Machine<'a, '_> {
    fn run(&mut self, tokens: &[String]) -> Result<()> {
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;

            if self.opaque || self.rest_only {
                self.args.push(token.clone());
                continue;
            }
            if token == "--" {
                self.rest_only = true;
                continue;
            }
            if let Some(body) = token.strip_prefix("--") {
                self.long_token(token, body, tokens, &mut i)?;
                continue;
            }
            if token.len() > 1 && token.starts_with('-') {
                self.short_token(token, tokens, &mut i)?;
                continue;
            }

            let terminal = self.contexts[0];
            match terminal.find_command(token) {
                Some(cmd) => self.descend(cmd),
                None => self.args.push(token.clone()),
            }
        }
        Ok(())
    }

    fn descend(&mut self, cmd: &'a Command) {
        tracing::debug!(command = %cmd.name, "descending into command");
        self.command = Some(cmd);
        self.contexts.insert(0, cmd.context());
        self.seed_defaults(cmd.context());
        if cmd.is_opaque() {
            self.opaque = true;
        }
    }

    /// Seed declared defaults for every option the context makes visible,
    /// without overwriting values already present.
    fn seed_defaults(&mut self, ctx: &'a Context) {
        for opt in ctx.options() {
            if let Some(default) = opt.default_value() {
                let key = opt.canonical_key(self.settings.camel_case);
                self.argv.entry(key).or_insert(default);
            }
        }
    }

    fn find_long(&self, key: &str) -> Option<&'a Opt> {
        self.contexts.iter().find_map(|ctx| ctx.find_long(key))
    }

    fn find_short(&self, key: &str) -> Option<&'a Opt> {
        self.contexts.iter().find_map(|ctx| ctx.find_short(key))
    }

    fn treat_unknown_as_argument(&self) -> bool {
        for ctx in &self.contexts {
            if let Some(v) = ctx.local_prop("treatUnknownOptionsAsArguments") {
                return v.is_truthy();
            }
        }
        self.settings.treat_unknown_options_as_arguments
    }

    fn record_unknown(&mut self, name: &str, raw: &str) {
        self.unknown.insert(name.to_string(), raw.to_string());
        if self.treat_unknown_as_argument() {
            self.args.push(raw.to_string());
        }
    }

    fn long_token(
        &mut self,
        raw: &str,
        body: &str,
        tokens: &[String],
        i: &mut usize,
    ) -> Result<()> {
        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };
        let found = self.find_long(name);
        match found {
            Some(opt) => self.recognized(opt, raw, name, inline, tokens, i),
            None => {
                self.record_unknown(name, raw);
                Ok(())
            }
        }
    }

    fn short_token(&mut self, raw: &str, tokens: &[String], i: &mut usize) -> Result<()> {
        let cluster: Vec<char> = raw[1..].chars().collect();
        let mut idx = 0;
        while idx < cluster.len() {
            let c = cluster[idx];
            if c == '=' {
                break;
            }
            let key = c.to_string();
            let found = self.find_short(&key);
            match found {
                Some(opt) if opt.arity.takes_value() => {
                    // The first value-bearing short consumes the remainder
                    // of the token as its value.
                    let rest: String = cluster[idx + 1..].iter().collect();
                    let inline = match rest.strip_prefix('=') {
                        Some(stripped) => Some(stripped.to_string()),
                        None if rest.is_empty() => None,
                        None => Some(rest),
                    };
                    return self.recognized(opt, raw, &key, inline.as_deref(), tokens, i);
                }
                Some(opt) => self.recognized(opt, raw, &key, None, tokens, i)?,
                None => self.record_unknown(&key, &format!("-{c}")),
            }
            idx += 1;
        }
        Ok(())
    }

    /// Handle a recognized option: coerce its value, run the validator and
    /// callback, and store into `argv`.
    fn recognized(
        &mut self,
        opt: &'a Opt,
        raw: &str,
        matched_key: &str,
        inline: Option<&str>,
        tokens: &[String],
        i: &mut usize,
    ) -> Result<()> {
        let key = opt.canonical_key(self.settings.camel_case);

        let coerced = if opt.negated {
            Value::Bool(false)
        } else {
            match &opt.arity {
                ValueArity::None => Value::Bool(true),
                ValueArity::Required(_) => {
                    let raw_value = match inline {
                        Some(v) => v.to_string(),
                        None => {
                            if *i >= tokens.len() {
                                return Err(Error::MissingRequiredOption { name: opt.label() });
                            }
                            let v = tokens[*i].clone();
                            *i += 1;
                            v
                        }
                    };
                    value::coerce(opt.kind, &raw_value)?
                }
                ValueArity::Optional(_) => {
                    let raw_value = match inline {
                        Some(v) => Some(v.to_string()),
                        None => {
                            if *i < tokens.len() && !tokens[*i].starts_with('-') {
                                let v = tokens[*i].clone();
                                *i += 1;
                                Some(v)
                            } else {
                                None
                            }
                        }
                    };
                    match raw_value {
                        Some(v) => value::coerce(opt.kind, &v)?,
                        None => Value::Bool(true),
                    }
                }
            }
        };

        if let Some(validator) = &opt.validator {
            validator(&coerced).map_err(Error::Action)?;
        }

        match &opt.callback {
            Some(callback) => {
                let payload = CallbackPayload {
                    name: key.clone(),
                    value: coerced,
                    previous: self.argv.get(&key).cloned(),
                };
                match callback(payload) {
                    Ok(CallbackAction::Set(v)) => {
                        self.argv.insert(key, v);
                    }
                    Ok(CallbackAction::Suppress) => {}
                    Err(err) => {
                        if matches!(err.downcast_ref::<Error>(), Some(Error::NotAnOption)) {
                            // The option asked to be treated as if it were
                            // never declared.
                            self.record_unknown(matched_key, raw);
                            return Ok(());
                        }
                        return Err(Error::Action(err));
                    }
                }
            }
            None => {
                self.argv.insert(key, coerced);
            }
        }
        Ok(())
    }

    /// Post-loop passes: positional binding, remaining defaults, and
    /// required-option checks.
    fn finalize(&mut self) -> Result<()> {
        self.bind_positionals()?;

        let contexts = self.contexts.clone();
        for ctx in contexts {
            self.seed_defaults(ctx);
        }

        for ctx in &self.contexts {
            for opt in ctx.options() {
                if !opt.required {
                    continue;
                }
                let key = opt.canonical_key(self.settings.camel_case);
                if !self.argv.contains_key(&key) {
                    return Err(Error::MissingRequiredOption { name: opt.label() });
                }
            }
        }
        Ok(())
    }

    fn bind_positionals(&mut self) -> Result<()> {
        let terminal = self.contexts[0];
        let camel = self.settings.camel_case;
        let mut index = 0;

        for arg in terminal.args() {
            let key = if camel {
                arg.camel_name()
            } else {
                arg.name.clone()
            };

            if arg.multiple {
                let mut items = Vec::new();
                while index < self.args.len() {
                    items.push(coerce_positional(arg, &self.args[index])?);
                    index += 1;
                }
                if !items.is_empty() {
                    self.argv.insert(key, Value::Array(items));
                } else if arg.required {
                    return Err(Error::MissingRequiredArgument {
                        name: arg.name.clone(),
                    });
                } else if let Some(default) = &arg.default {
                    self.argv.insert(key, default.clone());
                }
                continue;
            }

            if index < self.args.len() {
                let value = coerce_positional(arg, &self.args[index])?;
                index += 1;
                self.argv.insert(key, value);
            } else if arg.required {
                return Err(Error::MissingRequiredArgument {
                    name: arg.name.clone(),
                });
            } else if let Some(default) = &arg.default {
                self.argv.insert(key, default.clone());
            }
        }
        Ok(())
    }
}

fn coerce_positional(arg: &crate::argument::Argument, raw: &str) -> Result<Value> {
    let value = value::coerce(arg.kind, raw)?;
    if let Some(validator) = &arg.validator {
        validator(&value).map_err(Error::Action)?;
    }
    Ok(value)
}
