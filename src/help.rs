//! Help rendering interface and the built-in plain renderer.
//!
//! Help layout is deliberately minimal; richer renderers (colors, markdown,
//! templates) plug in through [`HelpRenderer`]. The engine only guarantees
//! what it feeds the renderer: the traversed scope, terminal first, plus an
//! optional error to lead with.

use indexmap::IndexMap;

use crate::context::Scope;
use crate::error::Error;
use crate::option::Opt;

/// Options passed through from the root to whichever renderer is installed.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub colors: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { colors: true }
    }
}

pub trait HelpRenderer {
    fn render(&self, scope: Scope<'_>, opts: &RenderOptions, error: Option<&Error>) -> String;
}

/// Two-column plain-text renderer.
#[derive(Debug, Default)]
pub struct DefaultRenderer;

impl HelpRenderer for DefaultRenderer {
    fn render(&self, scope: Scope<'_>, _opts: &RenderOptions, error: Option<&Error>) -> String {
        let mut out = String::new();
        let terminal = scope.terminal();

        if let Some(error) = error {
            out.push_str(&format!("Error: {error}\n\n"));
        }

        if let Some(heading) = terminal.title.as_deref().or(terminal.desc.as_deref()) {
            out.push_str(heading.trim_end());
            out.push('\n');
            out.push('\n');
        }

        out.push_str(&format!("Usage: {}\n", usage_line(&scope)));

        let commands: Vec<_> = terminal
            .commands()
            .iter()
            .filter(|cmd| !cmd.hidden)
            .collect();
        if !commands.is_empty() {
            out.push_str("\nCommands:\n");
            let mut rows: Vec<(String, String)> = commands
                .iter()
                .map(|cmd| {
                    (
                        cmd.name.clone(),
                        cmd.desc.clone().unwrap_or_default(),
                    )
                })
                .collect();
            rows.sort_by(|a, b| a.0.cmp(&b.0));
            push_rows(&mut out, rows);
        }

        let args: Vec<_> = terminal.args().iter().filter(|arg| !arg.hidden).collect();
        if !args.is_empty() {
            out.push_str("\nArguments:\n");
            let rows = args
                .iter()
                .map(|arg| {
                    let left = if arg.required {
                        format!("<{}>", arg.name)
                    } else if arg.multiple {
                        format!("[{}...]", arg.name)
                    } else {
                        format!("[{}]", arg.name)
                    };
                    (left, arg.desc.clone().unwrap_or_default())
                })
                .collect();
            push_rows(&mut out, rows);
        }

        for (group, options) in grouped_options(&scope) {
            if group.is_empty() {
                out.push_str("\nOptions:\n");
            } else {
                out.push_str(&format!("\n{group}:\n"));
            }
            let rows = options
                .iter()
                .copied()
                .map(|opt| (opt.label(), option_help(opt)))
                .collect();
            push_rows(&mut out, rows);
        }

        out
    }
}

fn usage_line(scope: &Scope<'_>) -> String {
    let mut out = String::new();
    for ctx in scope.contexts().iter().rev() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&ctx.name);
    }

    let terminal = scope.terminal();
    if !terminal.commands().iter().all(|cmd| cmd.hidden) {
        out.push_str(" <command>");
    }
    if scope
        .contexts()
        .iter()
        .any(|ctx| ctx.options().iter().any(|opt| !opt.hidden))
    {
        out.push_str(" [options]");
    }
    for arg in terminal.args() {
        if arg.hidden {
            continue;
        }
        if arg.required {
            out.push_str(&format!(" <{}>", arg.name));
        } else if arg.multiple {
            out.push_str(&format!(" [{}...]", arg.name));
        } else {
            out.push_str(&format!(" [{}]", arg.name));
        }
    }
    out
}

/// Collect visible options across the scope, grouped for display.
///
/// When the same canonical name is declared at several scopes, the
/// outermost declaration wins the user-visible entry.
fn grouped_options<'a>(scope: &Scope<'a>) -> IndexMap<String, Vec<&'a Opt>> {
    let mut seen: Vec<String> = Vec::new();
    let mut groups: IndexMap<String, Vec<&'a Opt>> = IndexMap::new();
    for ctx in scope.contexts().iter().rev() {
        for opt in ctx.options() {
            if opt.hidden {
                continue;
            }
            let key = opt.canonical_key(false);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            groups.entry(opt.group.clone()).or_default().push(opt);
        }
    }
    groups
}

fn option_help(opt: &Opt) -> String {
    let mut out = opt.desc.clone().unwrap_or_default();
    if opt.required {
        if out.is_empty() {
            out.push_str("required");
        } else {
            out.push_str(" (required)");
        }
    }
    if let Some(default) = &opt.default {
        if out.is_empty() {
            out.push_str(&format!("[default: {default}]"));
        } else {
            out.push_str(&format!(" [default: {default}]"));
        }
    }
    out
}

fn push_rows(out: &mut String, rows: Vec<(String, String)>) {
    let width = rows.iter().map(|(left, _)| left.len()).max().unwrap_or(0);
    for (left, help) in rows {
        if help.is_empty() {
            out.push_str(&format!("  {left}\n"));
        } else {
            out.push_str(&format!("  {left:width$}  {help}\n"));
        }
    }
}
