//! The command-tree node: owns arguments, options, child commands, and the
//! lookup tables the parser consults.
//!
//! Contexts hold no parent pointers. The chain of scopes is the traversal
//! path itself: the parser (and the parse result) carry a terminal-first
//! list of contexts, and [`Scope`] answers the two directional property
//! reads over that list.

use indexmap::IndexMap;

use crate::argument::{self, Argument};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::hooks::Hooks;
use crate::lookup::Lookup;
use crate::option::{Opt, OptParams};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Context {
    pub name: String,
    pub title: Option<String>,
    pub desc: Option<String>,
    args: Vec<Argument>,
    options: Vec<Opt>,
    commands: Vec<Command>,
    lookup: Lookup,
    props: IndexMap<String, Value>,
    hooks: Hooks,
}

impl Context {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    pub fn options(&self) -> &[Opt] {
        &self.options
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn lookup(&self) -> &Lookup {
        &self.lookup
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Append a positional argument, enforcing the ordering invariants.
    pub fn argument(&mut self, arg: Argument) -> Result<&mut Self> {
        argument::check_order(&self.args, &arg)?;
        self.args.push(arg);
        Ok(self)
    }

    /// Declare an option from a format string.
    pub fn option(&mut self, format: &str) -> Result<&mut Self> {
        self.option_with(format, OptParams::default())
    }

    /// Declare an option from a format string plus parameters. The group the
    /// option displays under (if any) is part of the parameters.
    pub fn option_with(&mut self, format: &str, params: OptParams) -> Result<&mut Self> {
        let mut opt = Opt::parse(format)?;
        opt.apply_params(params);
        self.register_option(opt)?;
        Ok(self)
    }

    /// Adopt an already-constructed option descriptor.
    pub fn register_option(&mut self, opt: Opt) -> Result<()> {
        let long_keys = opt.long_keys();
        let short_keys = opt.short_keys();
        if let Some(taken) = self.lookup.has_option_key(&long_keys, &short_keys) {
            return Err(Error::AlreadyExists {
                kind: "option",
                name: taken,
            });
        }
        let index = self.options.len();
        for key in long_keys {
            self.lookup.long.insert(key, index);
        }
        for key in short_keys {
            self.lookup.short.insert(key, index);
        }
        self.options.push(opt);
        Ok(())
    }

    /// Create and register a child command, returning it for further
    /// declaration.
    pub fn command(&mut self, name: impl Into<String>) -> Result<&mut Command> {
        self.register_command(Command::new(name))
    }

    /// Adopt an already-constructed command (or extension) as a child.
    pub fn register_command(&mut self, cmd: Command) -> Result<&mut Command> {
        if cmd.name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "command name cannot be empty".to_string(),
            ));
        }
        if self.lookup.commands.contains_key(&cmd.name) {
            return Err(Error::AlreadyExists {
                kind: "command",
                name: cmd.name.clone(),
            });
        }

        let index = self.commands.len();
        self.lookup.commands.insert(cmd.name.clone(), index);
        for alias in cmd.aliases.keys() {
            // Aliases that collide with an existing name are dropped, not
            // allowed to overwrite.
            if self.lookup.commands.contains_key(alias) {
                tracing::debug!(alias, command = %cmd.name, "dropping colliding alias");
                continue;
            }
            self.lookup.commands.insert(alias.clone(), index);
        }
        self.commands.push(cmd);
        Ok(self.commands.last_mut().unwrap())
    }

    /// Resolve a long option key declared directly on this context.
    pub fn find_long(&self, key: &str) -> Option<&Opt> {
        self.lookup.long.get(key).map(|&i| &self.options[i])
    }

    /// Resolve a short option key declared directly on this context.
    pub fn find_short(&self, key: &str) -> Option<&Opt> {
        self.lookup.short.get(key).map(|&i| &self.options[i])
    }

    /// Resolve a child command by name or alias.
    pub fn find_command(&self, name: &str) -> Option<&Command> {
        self.lookup.commands.get(name).map(|&i| &self.commands[i])
    }

    pub fn find_command_mut(&mut self, name: &str) -> Option<&mut Command> {
        let index = self.lookup.commands.get(name).copied()?;
        Some(&mut self.commands[index])
    }

    /// Set a user-supplied property visible to the scoped reads.
    pub fn set_prop(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.props.insert(name.into(), value);
        self
    }

    /// Read a property declared directly on this context.
    pub fn local_prop(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }
}

/// A terminal-first chain of contexts, as traversed by the parser.
///
/// The two accessors differ only in which end of the chain wins:
/// [`get`](Scope::get) answers "what did the outermost declaration say"
/// (root wins), [`prop`](Scope::prop) answers "what is the effective
/// setting here" (terminal wins, falling back outward).
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    chain: &'a [&'a Context],
}

impl<'a> Scope<'a> {
    pub fn new(chain: &'a [&'a Context]) -> Self {
        Self { chain }
    }

    /// The terminal (innermost) context.
    pub fn terminal(&self) -> &'a Context {
        self.chain[0]
    }

    /// The root (outermost) context.
    pub fn root(&self) -> &'a Context {
        self.chain[self.chain.len() - 1]
    }

    pub fn contexts(&self) -> &'a [&'a Context] {
        self.chain
    }

    /// Topmost declaration wins: walk from the root inward and keep the
    /// first value found.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.chain.iter().rev().find_map(|ctx| ctx.local_prop(name))
    }

    /// Bottommost declaration wins: the terminal context shadows outer ones.
    pub fn prop(&self, name: &str) -> Option<&'a Value> {
        self.chain.iter().find_map(|ctx| ctx.local_prop(name))
    }

    /// Resolve a long option key, nearest scope first.
    pub fn find_long(&self, key: &str) -> Option<&'a Opt> {
        self.chain.iter().find_map(|ctx| ctx.find_long(key))
    }

    /// Resolve a short option key, nearest scope first.
    pub fn find_short(&self, key: &str) -> Option<&'a Opt> {
        self.chain.iter().find_map(|ctx| ctx.find_short(key))
    }
}
