//! The root of the command tree: wires the auto-generated options, loads
//! root-level extensions, and runs the parse/dispatch loop.

use std::cell::Cell;
use std::cell::RefCell;
use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;
use semver::{Version, VersionReq};

use crate::argument::Argument;
use crate::command::{Command, CommandKind};
use crate::context::{Context, Scope};
use crate::error::{Error, Result, Warning};
use crate::extension::{self, ExtensionKind, ExtensionParams};
use crate::help::{DefaultRenderer, HelpRenderer, RenderOptions};
use crate::hooks::Hooks;
use crate::option::{CallbackAction, CallbackPayload, OptParams};
use crate::output::{self, BannerState, Console};
use crate::parser::{self, ParseResult, ParserSettings};
use crate::schema::{self, CommandSchema};
use crate::value::Value;

/// Where the root's commands come from.
#[derive(Debug)]
pub enum CommandsSource {
    /// Inline schemas keyed by command name.
    Schemas(IndexMap<String, CommandSchema>),
    /// A directory where every `*.json` file becomes a command.
    Dir(PathBuf),
    /// Individual schema files; each command is named after its stem.
    Files(Vec<PathBuf>),
}

/// A root-level extension reference.
#[derive(Debug, Clone)]
pub struct ExtensionRef {
    pub reference: String,
    pub name: Option<String>,
}

impl ExtensionRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            name: None,
        }
    }

    pub fn named(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            name: Some(name.into()),
        }
    }
}

/// Construction parameters for [`Cli`].
pub struct CliOptions {
    pub name: Option<String>,
    pub title: Option<String>,
    pub desc: Option<String>,
    pub version: Option<String>,
    pub banner: Option<String>,
    /// Semver requirement checked against the toolkit version before exec.
    pub runtime_version: Option<String>,
    pub colors: bool,
    pub hide_no_color_option: bool,
    pub hide_no_banner_option: bool,
    pub help: bool,
    pub help_exit_code: Option<i32>,
    pub show_help_on_error: bool,
    pub default_command: Option<String>,
    pub error_if_unknown_command: bool,
    pub treat_unknown_options_as_arguments: bool,
    pub camel_case: bool,
    pub show_banner_for_external_clis: bool,
    pub ignore_missing_extensions: bool,
    pub ignore_invalid_extensions: bool,
    pub commands: Option<CommandsSource>,
    /// Root options; same declaration shapes as a command schema.
    pub options: Option<serde_json::Value>,
    pub args: Vec<Argument>,
    pub extensions: Vec<ExtensionRef>,
    pub stdout: Option<Box<dyn Write>>,
    pub stderr: Option<Box<dyn Write>>,
    pub renderer: Option<Box<dyn HelpRenderer>>,
    pub render_opts: RenderOptions,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            name: None,
            title: None,
            desc: None,
            version: None,
            banner: None,
            runtime_version: None,
            colors: true,
            hide_no_color_option: false,
            hide_no_banner_option: false,
            help: false,
            help_exit_code: None,
            show_help_on_error: true,
            default_command: None,
            error_if_unknown_command: true,
            treat_unknown_options_as_arguments: false,
            camel_case: true,
            show_banner_for_external_clis: false,
            ignore_missing_extensions: false,
            ignore_invalid_extensions: false,
            commands: None,
            options: None,
            args: Vec::new(),
            extensions: Vec::new(),
            stdout: None,
            stderr: None,
            renderer: None,
            render_opts: RenderOptions::default(),
        }
    }
}

impl std::fmt::Debug for CliOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliOptions")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("help", &self.help)
            .field("default_command", &self.default_command)
            .finish_non_exhaustive()
    }
}

/// What `exec` produced: the parse result, the command dispatch selected,
/// and the action's return value when one ran.
#[derive(Debug)]
pub struct Execution<'a> {
    pub result: ParseResult<'a>,
    pub command: Option<&'a Command>,
    pub value: Option<Value>,
}

/// Everything an action receives.
pub struct Invocation<'a> {
    pub result: &'a ParseResult<'a>,
    pub console: Console,
    pub warnings: &'a [Warning],
    /// Set when dispatch redirected to help because of a failure.
    pub err: Option<&'a Error>,
    pub help_exit_code: Option<i32>,
    render_contexts: Vec<&'a Context>,
    renderer: &'a dyn HelpRenderer,
    render_opts: RenderOptions,
    hooks: &'a Hooks,
}

impl Invocation<'_> {
    /// Render help for the contexts this invocation is about.
    pub fn help(&self) -> String {
        self.hooks.emit(
            "help",
            &Value::String(self.render_contexts[0].name.clone()),
        );
        self.renderer.render(
            Scope::new(&self.render_contexts),
            &self.render_opts,
            self.err,
        )
    }
}

impl std::fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("err", &self.err)
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

/// The root context plus dispatch machinery.
pub struct Cli {
    ctx: Context,
    console: Console,
    banner_cell: Rc<RefCell<BannerState>>,
    renderer: Box<dyn HelpRenderer>,
    render_opts: RenderOptions,
    warnings: Vec<Warning>,
    version: Option<String>,
    banner: Option<String>,
    runtime_version: Option<String>,
    help_enabled: bool,
    help_exit_code: Option<i32>,
    show_help_on_error: bool,
    default_command: Option<String>,
    error_if_unknown_command: bool,
    camel_case: bool,
    treat_unknown_options_as_arguments: bool,
    show_banner_for_external_clis: bool,
    ignore_missing_extensions: bool,
    ignore_invalid_extensions: bool,
    custom_streams: bool,
    version_requested: Rc<Cell<bool>>,
}

impl Cli {
    pub fn new(options: CliOptions) -> Result<Self> {
        let custom_streams = options.stdout.is_some() || options.stderr.is_some();
        let stdout = options
            .stdout
            .unwrap_or_else(|| Box::new(std::io::stdout()));
        let stderr = options
            .stderr
            .unwrap_or_else(|| Box::new(std::io::stderr()));
        let (console, banner_cell) = output::make_streams(stdout, stderr);

        let mut ctx = Context::new(options.name.unwrap_or_else(|| "program".to_string()));
        ctx.title = options.title;
        ctx.desc = options.desc;

        for arg in options.args {
            ctx.argument(arg)?;
        }
        if let Some(decl) = &options.options {
            schema::apply_options_decl(&mut ctx, decl)?;
        }

        let mut cli = Cli {
            ctx,
            console,
            banner_cell,
            renderer: options.renderer.unwrap_or_else(|| Box::new(DefaultRenderer)),
            render_opts: options.render_opts,
            warnings: Vec::new(),
            version: options.version,
            banner: options.banner,
            runtime_version: options.runtime_version,
            help_enabled: options.help,
            help_exit_code: options.help_exit_code,
            show_help_on_error: options.show_help_on_error,
            default_command: options.default_command,
            error_if_unknown_command: options.error_if_unknown_command,
            camel_case: options.camel_case,
            treat_unknown_options_as_arguments: options.treat_unknown_options_as_arguments,
            show_banner_for_external_clis: options.show_banner_for_external_clis,
            ignore_missing_extensions: options.ignore_missing_extensions,
            ignore_invalid_extensions: options.ignore_invalid_extensions,
            custom_streams,
            version_requested: Rc::new(Cell::new(false)),
        };

        if let Some(source) = options.commands {
            cli.load_commands(source)?;
        }

        if cli.help_enabled {
            cli.register_help();
        }

        if cli.banner.is_some() && !options.hide_no_banner_option {
            cli.ctx.option_with(
                "--no-banner",
                OptParams::desc("Suppress the banner"),
            )?;
        }

        if options.colors && !options.hide_no_color_option {
            cli.ctx.option_with(
                "--no-color, !--no-colors",
                OptParams::desc("Disable colored output"),
            )?;
        }

        if cli.version.is_some()
            && cli.ctx.find_long("version").is_none()
            && cli.ctx.find_short("v").is_none()
        {
            cli.register_version_option();
        }

        // Extensions load last so subtree options can shadow the auto
        // options declared above.
        for ext in options.extensions {
            cli.extension(&ext.reference, ext.name.as_deref())?;
        }

        Ok(cli)
    }

    fn load_commands(&mut self, source: CommandsSource) -> Result<()> {
        let schemas: Vec<(String, CommandSchema)> = match source {
            CommandsSource::Schemas(map) => map.into_iter().collect(),
            CommandsSource::Dir(dir) => schema::load_dir(&dir)?,
            CommandsSource::Files(paths) => {
                let mut out = Vec::new();
                for path in paths {
                    out.push(schema::load_file(&path)?);
                }
                out
            }
        };

        for (name, command_schema) in schemas {
            let command = schema::build_command(&name, &command_schema)?;
            if command.default {
                match &self.default_command {
                    Some(existing) if *existing != command.name => {
                        return Err(Error::Conflict(format!(
                            "both {existing:?} and {:?} claim to be the default command",
                            command.name
                        )));
                    }
                    _ => self.default_command = Some(command.name.clone()),
                }
            }
            self.ctx.register_command(command)?;
        }
        Ok(())
    }

    fn register_help(&mut self) {
        if self.ctx.find_command("help").is_none() {
            let mut help = Command::new("help");
            help.desc = Some("Display help".to_string());
            help.set_action(|inv| {
                let text = inv.help();
                inv.console.out().write_str(&text)?;
                Ok(match inv.help_exit_code {
                    Some(code) => Value::Number(code as f64),
                    None => Value::Null,
                })
            });
            // Registration cannot collide: we just checked the name and the
            // command has no aliases.
            let _ = self.ctx.register_command(help);
        }
        if self.default_command.is_none() {
            self.default_command = Some("help".to_string());
        }
        if self.ctx.find_long("help").is_none() && self.ctx.find_short("h").is_none() {
            let _ = self
                .ctx
                .option_with("-h, --help", OptParams::desc("Display help"));
        }
    }

    fn register_version_option(&mut self) {
        let version = self.version.clone().unwrap_or_default();
        let out = self.console.out().clone();
        let requested = self.version_requested.clone();
        let _ = self.ctx.option_with(
            "-v, --version",
            OptParams {
                desc: Some("Output the version".to_string()),
                callback: Some(Rc::new(
                    move |_payload: CallbackPayload| -> anyhow::Result<CallbackAction> {
                        requested.set(true);
                        out.write_line(&version)?;
                        Ok(CallbackAction::Suppress)
                    },
                )),
                ..Default::default()
            },
        );
    }

    /// Register an extension under this root.
    pub fn extension(&mut self, reference: &str, name: Option<&str>) -> Result<&mut Command> {
        let params = ExtensionParams {
            ignore_missing: self.ignore_missing_extensions,
            ignore_invalid: self.ignore_invalid_extensions,
        };
        let loaded = extension::load(reference, name, &params)?;
        self.warnings.extend(loaded.warnings);
        self.ctx.register_command(loaded.command)
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Flush both output streams. Call when the consumer is done with this
    /// instance; `exec` also flushes on every completion path.
    pub fn shutdown(&self) {
        let _ = self.console.flush();
    }

    /// Parse and dispatch the process argument vector (minus the program
    /// name).
    pub fn exec(&self) -> Result<Execution<'_>> {
        let tokens: Vec<String> = std::env::args().skip(1).collect();
        self.exec_tokens(&tokens)
    }

    /// Parse and dispatch an explicit token vector.
    pub fn exec_tokens(&self, tokens: &[String]) -> Result<Execution<'_>> {
        let outcome = self.exec_inner(tokens);
        let _ = self.console.flush();
        outcome
    }

    fn exec_inner(&self, tokens: &[String]) -> Result<Execution<'_>> {
        self.preflight()?;
        self.version_requested.set(false);
        output::set_banner(&self.banner_cell, None);

        let settings = ParserSettings {
            camel_case: self.camel_case,
            treat_unknown_options_as_arguments: self.treat_unknown_options_as_arguments,
        };

        let mut result = match parser::parse_internal(&self.ctx, tokens, &settings) {
            Ok(result) => result,
            Err(failed) => {
                let synthetic = ParseResult {
                    args: Vec::new(),
                    argv: IndexMap::new(),
                    contexts: failed.contexts,
                    command: None,
                    unknown: IndexMap::new(),
                    warnings: self.warnings.clone(),
                };
                return self.fail(failed.error, synthetic);
            }
        };
        result.warnings = self.warnings.clone();

        if self.version_requested.get() {
            // The version callback already wrote the output; dispatch stops.
            return Ok(Execution {
                result,
                command: None,
                value: None,
            });
        }

        let help_flag = result
            .argv
            .get("help")
            .is_some_and(|value| value.is_truthy());
        let terminal_opaque = result.command.is_some_and(|cmd| cmd.is_opaque());

        let selected: Option<&Command> = if self.help_enabled && help_flag && !terminal_opaque {
            self.ctx.find_command("help")
        } else if result.command.is_some() {
            result.command
        } else {
            if self.error_if_unknown_command
                && !result.args.is_empty()
                && !self.ctx.commands().is_empty()
                && self.ctx.args().is_empty()
            {
                let name = result.args[0].clone();
                return self.fail(Error::UnknownCommand { name }, result);
            }
            match &self.default_command {
                Some(name) => match self.ctx.find_command(name) {
                    Some(cmd) => Some(cmd),
                    None => {
                        let err = Error::DefaultCommandNotFound { name: name.clone() };
                        return self.fail(err, result);
                    }
                },
                None => None,
            }
        };

        let Some(selected) = selected else {
            return Ok(Execution {
                result,
                command: None,
                value: None,
            });
        };

        self.resolve_banner(&result, selected);

        match self.run_command(&result, selected, None) {
            Ok(value) => Ok(Execution {
                result,
                command: Some(selected),
                value: Some(value),
            }),
            Err(err) => self.fail(err, result),
        }
    }

    /// Compare the caller's runtime requirement against the toolkit version.
    fn preflight(&self) -> Result<()> {
        let Some(required) = &self.runtime_version else {
            return Ok(());
        };
        let requirement = VersionReq::parse(required).map_err(|err| {
            Error::InvalidArgument(format!("invalid runtime version requirement: {err}"))
        })?;
        let current =
            Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0));
        if !requirement.matches(&current) {
            return Err(Error::InvalidRuntime {
                required: required.clone(),
                current: current.to_string(),
            });
        }
        Ok(())
    }

    /// The terminal command's banner overrides the root's; banners on
    /// opaque extensions are suppressed unless explicitly enabled.
    fn resolve_banner(&self, result: &ParseResult<'_>, selected: &Command) {
        let suppressed_by_flag = result
            .argv
            .get("banner")
            .is_some_and(|value| !value.is_truthy());
        let external = selected.is_extension() && !selected.is_tree_extension();

        let banner = if suppressed_by_flag || (external && !self.show_banner_for_external_clis) {
            None
        } else {
            selected.banner.clone().or_else(|| self.banner.clone())
        };
        output::set_banner(&self.banner_cell, banner);
    }

    fn run_command<'s>(
        &'s self,
        result: &ParseResult<'s>,
        command: &'s Command,
        err: Option<&Error>,
    ) -> Result<Value> {
        match &command.kind {
            CommandKind::Extension(ExtensionKind::Executable {
                executable,
                exec_args,
            }) => {
                let console = self.custom_streams.then_some(&self.console);
                extension::run_executable(
                    &command.name,
                    executable,
                    exec_args,
                    &result.args,
                    console,
                )
            }
            CommandKind::Extension(ExtensionKind::Invalid { diagnostic }) => {
                self.console
                    .err()
                    .write_line(diagnostic)
                    .map_err(anyhow::Error::from)?;
                Ok(Value::Null)
            }
            _ => {
                let Some(action) = &command.action else {
                    return Ok(Value::Null);
                };
                let mut render_opts = self.render_opts.clone();
                if result
                    .argv
                    .get("color")
                    .is_some_and(|value| !value.is_truthy())
                {
                    render_opts.colors = false;
                }
                let mut invocation = Invocation {
                    result,
                    console: self.console.clone(),
                    warnings: &self.warnings,
                    err,
                    help_exit_code: self.help_exit_code,
                    render_contexts: self.render_contexts_for(result, command),
                    renderer: self.renderer.as_ref(),
                    render_opts,
                    hooks: self.ctx.hooks(),
                };
                action(&mut invocation).map_err(|action_err| {
                    match action_err.downcast::<Error>() {
                        Ok(engine) => engine,
                        Err(other) => Error::Action(other),
                    }
                })
            }
        }
    }

    /// What the help renderer should describe: the traversed contexts, with
    /// the help command itself elided and an explicit `help <command>`
    /// argument resolved against the root.
    fn render_contexts_for<'s>(
        &'s self,
        result: &ParseResult<'s>,
        command: &'s Command,
    ) -> Vec<&'s Context> {
        let is_help = self.help_enabled && command.name == "help";
        if !is_help {
            let mut contexts = result.contexts.clone();
            if !contexts
                .iter()
                .any(|ctx| std::ptr::eq(*ctx, command.context()))
            {
                contexts.insert(0, command.context());
            }
            return contexts;
        }

        if let Some(first) = result.args.first() {
            if let Some(named) = self.ctx.find_command(first) {
                return vec![named.context(), &self.ctx];
            }
        }
        let mut contexts = result.contexts.clone();
        if contexts.len() > 1 && std::ptr::eq(contexts[0], command.context()) {
            contexts.remove(0);
        }
        contexts
    }

    /// Error path: when help is enabled and not disabled for errors, run
    /// the help action with the error attached and return its value;
    /// otherwise propagate.
    fn fail<'s>(&'s self, err: Error, result: ParseResult<'s>) -> Result<Execution<'s>> {
        if self.help_enabled && self.show_help_on_error {
            if let Some(help_cmd) = self.ctx.find_command("help") {
                self.resolve_banner(&result, help_cmd);
                let value = self.run_command(&result, help_cmd, Some(&err))?;
                return Ok(Execution {
                    result,
                    command: Some(help_cmd),
                    value: Some(value),
                });
            }
        }
        Err(err)
    }
}

impl Deref for Cli {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

impl DerefMut for Cli {
    fn deref_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }
}

impl std::fmt::Debug for Cli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cli")
            .field("name", &self.ctx.name)
            .field("version", &self.version)
            .field("help", &self.help_enabled)
            .field("default_command", &self.default_command)
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}
