//! Commands: named contexts with aliases, an action, and a banner override.

use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::cli::Invocation;
use crate::context::Context;
use crate::extension::ExtensionKind;
use crate::value::Value;

/// Handler invoked when dispatch selects this command. Receives the parse
/// result plus the console, help thunk, and accumulated warnings.
pub type Action = Rc<dyn Fn(&mut Invocation<'_>) -> anyhow::Result<Value>>;

/// What kind of command this is; extensions carry their resolved variant.
#[derive(Debug, Clone, Default)]
pub enum CommandKind {
    #[default]
    Standard,
    Extension(ExtensionKind),
}

/// A context specialization: a named node in the tree that the parser can
/// descend into and dispatch can invoke.
#[derive(Default)]
pub struct Command {
    ctx: Context,
    /// Alias name mapped to whether help displays it.
    pub aliases: IndexMap<String, bool>,
    pub action: Option<Action>,
    /// Overrides the root banner when this command is the terminal.
    pub banner: Option<String>,
    /// Selected when parsing matches no explicit command.
    pub default: bool,
    pub hidden: bool,
    pub kind: CommandKind,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            ctx: Context::new(name),
            ..Default::default()
        }
    }

    /// Register a visible alias.
    pub fn alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.aliases.insert(alias.into(), true);
        self
    }

    /// Register an alias hidden from help output.
    pub fn hidden_alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.aliases.insert(alias.into(), false);
        self
    }

    pub fn set_action(
        &mut self,
        action: impl Fn(&mut Invocation<'_>) -> anyhow::Result<Value> + 'static,
    ) -> &mut Self {
        self.action = Some(Rc::new(action));
        self
    }

    pub fn set_banner(&mut self, banner: impl Into<String>) -> &mut Self {
        self.banner = Some(banner.into());
        self
    }

    /// An opaque command stops the parser: every remaining token passes
    /// through verbatim. True for executable and invalid extension variants.
    pub fn is_opaque(&self) -> bool {
        matches!(
            self.kind,
            CommandKind::Extension(ExtensionKind::Executable { .. })
                | CommandKind::Extension(ExtensionKind::Invalid { .. })
        )
    }

    /// True when this command is an extension that merged a compatible
    /// in-process subtree.
    pub fn is_tree_extension(&self) -> bool {
        matches!(self.kind, CommandKind::Extension(ExtensionKind::Tree))
    }

    pub fn is_extension(&self) -> bool {
        matches!(self.kind, CommandKind::Extension(_))
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }
}

impl Deref for Command {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

impl DerefMut for Command {
    fn deref_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.ctx.name)
            .field("aliases", &self.aliases)
            .field("default", &self.default)
            .field("hidden", &self.hidden)
            .field("kind", &self.kind)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_chain_declarations_through_their_context() {
        let mut cmd = Command::new("run");
        cmd.alias("r");
        cmd.option("--fast").unwrap();
        assert_eq!(cmd.name, "run");
        assert!(cmd.find_long("fast").is_some());
        assert_eq!(cmd.aliases.get("r"), Some(&true));
        assert!(!cmd.is_opaque());
        assert!(!cmd.is_extension());
    }
}
