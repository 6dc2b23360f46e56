//! Declarative command definitions.
//!
//! Commands can be declared as data instead of builder calls: inline
//! schemas, a single JSON file, or a directory where every `*.json` file
//! becomes a command named after its stem. All shapes funnel through the
//! same registration paths as the builder API, so the invariants (duplicate
//! detection, argument ordering) apply identically.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::argument::Argument;
use crate::command::Command;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::option::OptParams;
use crate::util::is_valid_command_name;
use crate::value::Value;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandSchema {
    pub name: Option<String>,
    pub title: Option<String>,
    pub desc: Option<String>,
    pub aliases: Vec<String>,
    pub hidden: bool,
    /// Selected when parsing matches no explicit command.
    pub default: bool,
    pub banner: Option<String>,
    pub args: Vec<ArgumentSchema>,
    /// Either an array of format strings, or an object whose keys are
    /// format strings (starting with `-`) or group names.
    pub options: Option<serde_json::Value>,
    pub commands: IndexMap<String, CommandSchema>,
    pub treat_unknown_options_as_arguments: Option<bool>,
    /// Arbitrary user properties surfaced by the scoped reads.
    pub props: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArgumentSchema {
    pub name: String,
    pub desc: Option<String>,
    pub required: bool,
    pub multiple: bool,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub default: Option<serde_json::Value>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionParamsSchema {
    pub desc: Option<String>,
    pub hidden: bool,
    pub required: bool,
    pub default: Option<serde_json::Value>,
}

impl ArgumentSchema {
    fn build(&self) -> Result<Argument> {
        let mut arg = Argument::new(self.name.clone())
            .required(self.required)
            .multiple(self.multiple);
        arg.desc = self.desc.clone();
        arg.hidden = self.hidden;
        if let Some(kind) = &self.kind {
            arg.kind = kind.parse()?;
        }
        if let Some(default) = &self.default {
            arg.default = Some(Value::from(default.clone()));
        }
        Ok(arg)
    }
}

/// Build a command (and its whole subtree) from a schema.
pub fn build_command(name: &str, schema: &CommandSchema) -> Result<Command> {
    let name = schema.name.as_deref().unwrap_or(name);
    let mut cmd = Command::new(name);
    cmd.title = schema.title.clone();
    cmd.desc = schema.desc.clone();
    cmd.hidden = schema.hidden;
    cmd.default = schema.default;
    cmd.banner = schema.banner.clone();
    for alias in &schema.aliases {
        if alias.trim().is_empty() {
            return Err(Error::InvalidAlias(alias.clone()));
        }
        cmd.alias(alias.clone());
    }
    populate_context(&mut cmd, schema)?;
    Ok(cmd)
}

/// Apply a schema's arguments, options, nested commands, and properties to
/// an existing context.
pub fn populate_context(ctx: &mut Context, schema: &CommandSchema) -> Result<()> {
    for arg in &schema.args {
        ctx.argument(arg.build()?)?;
    }
    if let Some(options) = &schema.options {
        apply_options_decl(ctx, options)?;
    }
    for (child_name, child_schema) in &schema.commands {
        let child = build_command(child_name, child_schema)?;
        ctx.register_command(child)?;
    }
    if let Some(treat) = schema.treat_unknown_options_as_arguments {
        ctx.set_prop("treatUnknownOptionsAsArguments", Value::Bool(treat));
    }
    for (key, value) in &schema.props {
        ctx.set_prop(key.clone(), Value::from(value.clone()));
    }
    Ok(())
}

/// Interpret the flexible `options` declaration shape.
pub fn apply_options_decl(ctx: &mut Context, decl: &serde_json::Value) -> Result<()> {
    match decl {
        serde_json::Value::Array(items) => {
            for item in items {
                let format = item.as_str().ok_or_else(|| {
                    Error::InvalidOption(format!("expected a format string, found {item}"))
                })?;
                ctx.option(format)?;
            }
            Ok(())
        }
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                if key.starts_with('-') {
                    apply_option_entry(ctx, key, value, None)?;
                } else {
                    let group = value.as_object().ok_or_else(|| {
                        Error::InvalidOption(format!(
                            "group {key:?} must map formats to descriptions"
                        ))
                    })?;
                    for (format, entry) in group {
                        apply_option_entry(ctx, format, entry, Some(key))?;
                    }
                }
            }
            Ok(())
        }
        other => Err(Error::InvalidOption(format!(
            "unsupported options declaration: {other}"
        ))),
    }
}

fn apply_option_entry(
    ctx: &mut Context,
    format: &str,
    entry: &serde_json::Value,
    group: Option<&str>,
) -> Result<()> {
    let mut params = match entry {
        serde_json::Value::Null => OptParams::default(),
        serde_json::Value::String(desc) => OptParams::desc(desc.clone()),
        serde_json::Value::Object(_) => {
            let schema: OptionParamsSchema = serde_json::from_value(entry.clone())
                .map_err(|err| Error::InvalidOption(format!("option {format:?}: {err}")))?;
            OptParams {
                desc: schema.desc,
                hidden: schema.hidden,
                required: schema.required,
                default: schema.default.map(Value::from),
                ..Default::default()
            }
        }
        other => {
            return Err(Error::InvalidOption(format!(
                "option {format:?} has an unsupported declaration: {other}"
            )));
        }
    };
    if let Some(group) = group {
        params.group = Some(group.to_string());
    }
    ctx.option_with(format, params)?;
    Ok(())
}

/// Load a single command schema file. The command name comes from the
/// schema's own `name` or the file stem.
pub fn load_file(path: &Path) -> Result<(String, CommandSchema)> {
    if !path.is_file() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = fs::read_to_string(path).map_err(|err| Error::InvalidArgument(format!(
        "failed to read command file {}: {err}",
        path.display()
    )))?;
    let schema: CommandSchema = serde_json::from_str(&contents).map_err(|err| {
        Error::InvalidArgument(format!(
            "failed to parse command file {}: {err}",
            path.display()
        ))
    })?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = schema.name.clone().unwrap_or(stem);
    Ok((name, schema))
}

/// Scan a directory: every `*.json` file becomes a command named after its
/// stem. Results are sorted by name for deterministic registration.
pub fn load_dir(dir: &Path) -> Result<Vec<(String, CommandSchema)>> {
    if !dir.is_dir() {
        return Err(Error::FileNotFound {
            path: dir.to_path_buf(),
        });
    }
    let entries = fs::read_dir(dir).map_err(|err| {
        Error::InvalidArgument(format!(
            "failed to read commands directory {}: {err}",
            dir.display()
        ))
    })?;

    let mut commands = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            Error::InvalidArgument(format!("failed to read directory entry: {err}"))
        })?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if !is_valid_command_name(&stem) {
            return Err(Error::InvalidArgument(format!(
                "invalid command name {:?} (file: {})",
                stem,
                path.display()
            )));
        }
        tracing::debug!(command = %stem, path = %path.display(), "loading command file");
        let (name, schema) = load_file(&path)?;
        commands.push((name, schema));
    }

    commands.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(commands)
}
