//! Core parsing engine for command-line toolkits.
//!
//! Consumers declare a tree of commands, options, and positional arguments,
//! parse an argument vector against it, and dispatch to a matching handler.
//! Inner commands inherit (and may shadow) options declared by outer ones,
//! and externally supplied "extensions" graft into the tree either as
//! in-process subtrees or as spawned executables.
//!
//! ```no_run
//! use cmdkit::{Cli, CliOptions, Value};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut cli = Cli::new(CliOptions {
//!         name: Some("mytool".to_string()),
//!         version: Some("1.0.0".to_string()),
//!         help: true,
//!         ..Default::default()
//!     })?;
//!
//!     let build = cli.command("build")?;
//!     build.option("--release")?;
//!     build.set_action(|inv| {
//!         let release = inv
//!             .result
//!             .argv
//!             .get("release")
//!             .is_some_and(|v| v.is_truthy());
//!         inv.console.out().write_line(if release { "release" } else { "debug" })?;
//!         Ok(Value::Null)
//!     });
//!
//!     cli.exec()?;
//!     cli.shutdown();
//!     Ok(())
//! }
//! ```

mod argument;
mod cli;
mod command;
mod context;
mod error;
mod extension;
mod help;
mod hooks;
mod lookup;
mod manifest;
mod option;
mod output;
mod parser;
mod schema;
mod util;
mod value;

pub use argument::{Argument, Validator};
pub use cli::{Cli, CliOptions, CommandsSource, Execution, ExtensionRef, Invocation};
pub use command::{Action, Command, CommandKind};
pub use context::{Context, Scope};
pub use error::{Error, Result, Warning};
pub use extension::{ExtensionKind, ExtensionParams, LoadedExtension, load as load_extension};
pub use help::{DefaultRenderer, HelpRenderer, RenderOptions};
pub use hooks::Hooks;
pub use lookup::Lookup;
pub use manifest::{
    DEFAULT_MANIFEST_NAME, PackageManifest, SUPPORTED_SCHEMA_VERSION, ToolkitMeta, find_manifest,
    load_manifest,
};
pub use option::{CallbackAction, CallbackPayload, Opt, OptParams, OptionCallback, ValueArity};
pub use parser::{ParseResult, ParserSettings, parse};
pub use schema::{ArgumentSchema, CommandSchema, OptionParamsSchema, build_command, load_dir, load_file};
pub use util::camel_case;
pub use value::{Value, ValueKind, coerce};
