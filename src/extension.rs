//! Extension loading: resolving an external reference into a command.
//!
//! An extension reference resolves to exactly one of three variants:
//!
//! - a toolkit-compatible package whose declarative command schema is
//!   grafted into the tree as an in-process subtree,
//! - an opaque executable spawned as a child process with everything after
//!   the extension's name passed through verbatim,
//! - an invalid stub that prints a diagnostic, when the reference cannot be
//!   loaded but the caller asked to keep going.

use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};
use std::rc::Rc;

use crate::command::{Command, CommandKind};
use crate::error::{Error, Result, Warning};
use crate::manifest::{self, PackageManifest};
use crate::option::{CallbackAction, CallbackPayload, Opt, OptParams};
use crate::output::Console;
use crate::schema;
use crate::value::Value;

/// The resolved variant of an extension command.
#[derive(Debug, Clone)]
pub enum ExtensionKind {
    /// A compatible subtree was merged into the command.
    Tree,
    /// An external program; dispatch spawns it and waits.
    Executable {
        executable: PathBuf,
        exec_args: Vec<String>,
    },
    /// Could not be loaded; dispatch prints the diagnostic instead.
    Invalid { diagnostic: String },
}

/// Policy knobs for extension resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionParams {
    /// Turn an unresolvable reference into an invalid stub instead of
    /// failing construction.
    pub ignore_missing: bool,
    /// Turn a load failure into an invalid stub instead of failing
    /// construction.
    pub ignore_invalid: bool,
}

/// A resolved extension plus any warnings recorded while loading it.
#[derive(Debug)]
pub struct LoadedExtension {
    pub command: Command,
    pub warnings: Vec<Warning>,
}

/// Resolve `reference` into an extension command.
///
/// `name` overrides the name the extension registers under; otherwise the
/// manifest name, the file stem, or the reference itself is used.
pub fn load(reference: &str, name: Option<&str>, params: &ExtensionParams) -> Result<LoadedExtension> {
    if reference.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "extension reference cannot be empty".to_string(),
        ));
    }

    // A bare name that resolves on PATH is an opaque executable.
    if let Some(executable) = find_on_path(reference) {
        let name = name.unwrap_or(reference).to_string();
        tracing::debug!(%name, executable = %executable.display(), "extension resolved on PATH");
        return Ok(LoadedExtension {
            command: executable_command(name, executable, Vec::new(), None),
            warnings: Vec::new(),
        });
    }

    let path = Path::new(reference);
    if path.exists() {
        return load_from_path(reference, path, name, params);
    }

    let display_name = name.unwrap_or(reference).to_string();
    let err = Error::InvalidExtension {
        name: display_name.clone(),
        reason: format!("{reference:?} could not be resolved"),
    };
    if params.ignore_missing {
        return Ok(invalid_stub(display_name, err));
    }
    Err(err)
}

fn load_from_path(
    reference: &str,
    path: &Path,
    name: Option<&str>,
    params: &ExtensionParams,
) -> Result<LoadedExtension> {
    let fallback_name = name
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| reference.to_string());

    let Some(manifest_path) = manifest::find_manifest(path) else {
        // No package metadata at all: a plain file is an opaque executable
        // (shebang semantics belong to the OS), a bare directory is not
        // runnable.
        if path.is_file() {
            return Ok(LoadedExtension {
                command: executable_command(fallback_name, path.to_path_buf(), Vec::new(), None),
                warnings: Vec::new(),
            });
        }
        let err = Error::NoExecutable {
            name: fallback_name.clone(),
        };
        return stub_or_fail(fallback_name, err, params);
    };

    let manifest = match manifest::load_manifest(&manifest_path) {
        Ok(manifest) => manifest,
        Err(err) => return stub_or_fail(fallback_name, err, params),
    };
    let package_dir = manifest_path.parent().unwrap_or(Path::new("."));
    let name = name.unwrap_or(&manifest.name).to_string();

    if manifest.cmdkit.is_some() {
        return match load_tree(&name, package_dir, &manifest) {
            Ok(command) => Ok(LoadedExtension {
                command,
                warnings: Vec::new(),
            }),
            Err(err) => stub_or_fail(name, err, params),
        };
    }

    // Package without toolkit metadata: run its primary binary.
    let executable = match manifest.primary_bin() {
        Some(target) => package_dir.join(target),
        None if path.is_file() => path.to_path_buf(),
        None => {
            let err = Error::NoExecutable { name: name.clone() };
            return stub_or_fail(name, err, params);
        }
    };
    if !executable.is_file() {
        let err = Error::NoExecutable { name: name.clone() };
        return stub_or_fail(name, err, params);
    }

    let mut command = executable_command(name, executable, Vec::new(), Some(&manifest));
    for alias in manifest.all_aliases() {
        command.alias(alias);
    }
    Ok(LoadedExtension {
        command,
        warnings: Vec::new(),
    })
}

/// Graft a toolkit-compatible package: load its schema entry point and
/// build the subtree in place.
fn load_tree(name: &str, package_dir: &Path, manifest: &PackageManifest) -> Result<Command> {
    let entry = manifest.entry().ok_or_else(|| Error::InvalidExtension {
        name: name.to_string(),
        reason: "manifest declares toolkit compatibility but no entry point".to_string(),
    })?;
    let entry_path = package_dir.join(entry);
    let (_, command_schema) = schema::load_file(&entry_path).map_err(|err| {
        Error::InvalidExtension {
            name: name.to_string(),
            reason: err.to_string(),
        }
    })?;

    let mut command = schema::build_command(name, &command_schema)?;
    // The registration name is the extension's, regardless of what the
    // schema file calls itself.
    command.name = name.to_string();
    command.kind = CommandKind::Extension(ExtensionKind::Tree);
    if command.desc.is_none() {
        command.desc = manifest.description.clone();
    }
    if command.banner.is_none() {
        command.banner = manifest
            .cmdkit
            .as_ref()
            .and_then(|meta| meta.banner.clone());
    }
    for alias in manifest.all_aliases() {
        if !command.aliases.contains_key(&alias) {
            command.alias(alias);
        }
    }
    tracing::debug!(%name, dir = %package_dir.display(), "loaded extension subtree");
    Ok(command)
}

fn executable_command(
    name: String,
    executable: PathBuf,
    exec_args: Vec<String>,
    manifest: Option<&PackageManifest>,
) -> Command {
    let mut command = Command::new(name);
    command.desc = manifest.and_then(|m| m.description.clone());
    command.kind = CommandKind::Extension(ExtensionKind::Executable {
        executable,
        exec_args,
    });
    suppress_version_option(&mut command);
    command
}

fn invalid_stub(name: String, err: Error) -> LoadedExtension {
    tracing::warn!(extension = %name, error = %err, "extension load failed, registering stub");
    let warning = Warning::from(&err);
    let mut command = Command::new(name);
    command.kind = CommandKind::Extension(ExtensionKind::Invalid {
        diagnostic: err.to_string(),
    });
    suppress_version_option(&mut command);
    LoadedExtension {
        command,
        warnings: vec![warning],
    }
}

fn stub_or_fail(name: String, err: Error, params: &ExtensionParams) -> Result<LoadedExtension> {
    if params.ignore_invalid {
        return Ok(invalid_stub(name, err));
    }
    Err(err)
}

/// Opaque extensions carry a hidden `-v, --version` whose callback raises
/// the not-an-option sentinel, so the root's version option never swallows
/// a token meant for the child process.
fn suppress_version_option(command: &mut Command) {
    let mut opt = Opt::parse("-v, --version").expect("static format");
    opt.apply_params(OptParams {
        hidden: true,
        callback: Some(Rc::new(
            |_payload: CallbackPayload| -> anyhow::Result<CallbackAction> {
                Err(Error::NotAnOption.into())
            },
        )),
        ..Default::default()
    });
    // The names may already be taken when a subtree declared its own.
    let _ = command.register_option(opt);
}

/// Spawn an executable extension and wait for it.
///
/// Resolves with the child's exit code; a non-zero exit is not an error.
/// When `console` is supplied the child's output is piped back through the
/// toolkit's streams, otherwise stdio is inherited.
pub(crate) fn run_executable(
    name: &str,
    executable: &Path,
    exec_args: &[String],
    passthrough: &[String],
    console: Option<&Console>,
) -> Result<Value> {
    let mut child = ProcessCommand::new(executable);
    child.args(exec_args).args(passthrough);

    tracing::debug!(
        extension = %name,
        executable = %executable.display(),
        args = ?passthrough,
        "spawning extension"
    );

    let code = match console {
        Some(console) => {
            let output = child
                .stdin(Stdio::inherit())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .map_err(|err| spawn_error(name, executable, err))?;
            if !output.stdout.is_empty() {
                console
                    .out()
                    .write_str(&String::from_utf8_lossy(&output.stdout))
                    .map_err(anyhow::Error::from)?;
            }
            if !output.stderr.is_empty() {
                console
                    .err()
                    .write_str(&String::from_utf8_lossy(&output.stderr))
                    .map_err(anyhow::Error::from)?;
            }
            output.status.code().unwrap_or(1)
        }
        None => {
            let status = child
                .status()
                .map_err(|err| spawn_error(name, executable, err))?;
            status.code().unwrap_or(1)
        }
    };

    Ok(Value::Json(serde_json::json!({ "code": code })))
}

fn spawn_error(name: &str, executable: &Path, err: std::io::Error) -> Error {
    tracing::warn!(extension = %name, executable = %executable.display(), %err, "spawn failed");
    Error::NoExecutable {
        name: name.to_string(),
    }
}

fn find_on_path(reference: &str) -> Option<PathBuf> {
    if reference.contains('/') || reference.contains(std::path::MAIN_SEPARATOR) {
        return None;
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(reference))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.is_file()
        && path
            .metadata()
            .map(|meta| meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let pid = std::process::id();
        let dir = std::env::temp_dir().join(format!("cmdkit-{prefix}-{pid}-{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_reference_fails_or_stubs() {
        let err = load("/nonexistent/ext", None, &ExtensionParams::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_EXTENSION");

        let loaded = load(
            "/nonexistent/ext",
            Some("ghost"),
            &ExtensionParams {
                ignore_missing: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(
            loaded.command.kind,
            CommandKind::Extension(ExtensionKind::Invalid { .. })
        ));
        assert_eq!(loaded.command.name, "ghost");
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(loaded.warnings[0].code, "INVALID_EXTENSION");
    }

    #[cfg(unix)]
    #[test]
    fn bare_name_resolves_on_path() {
        let loaded = load("sh", None, &ExtensionParams::default()).unwrap();
        match &loaded.command.kind {
            CommandKind::Extension(ExtensionKind::Executable { executable, .. }) => {
                assert!(executable.is_absolute());
            }
            other => panic!("expected executable variant, got {other:?}"),
        }
        assert!(loaded.command.is_opaque());
        // The hidden version suppressor is registered.
        assert!(loaded.command.find_long("version").is_some());
    }

    #[test]
    fn manifest_with_toolkit_block_grafts_a_subtree() {
        let dir = make_temp_dir("tree-ext");
        fs::write(
            dir.join("cmdkit.json"),
            r#"{
                "name": "widgets",
                "description": "widget tools",
                "aliases": ["wid"],
                "cmdkit": { "main": "./cli.json", "banner": "WIDGETS" }
            }"#,
        )
        .unwrap();
        fs::write(
            dir.join("cli.json"),
            r#"{
                "options": { "--fast": "skip checks" },
                "commands": { "list": { "desc": "list widgets" } }
            }"#,
        )
        .unwrap();

        let loaded = load(dir.to_str().unwrap(), None, &ExtensionParams::default()).unwrap();
        let cmd = &loaded.command;
        assert_eq!(cmd.name, "widgets");
        assert!(cmd.is_tree_extension());
        assert!(!cmd.is_opaque());
        assert_eq!(cmd.desc.as_deref(), Some("widget tools"));
        assert_eq!(cmd.banner.as_deref(), Some("WIDGETS"));
        assert_eq!(cmd.aliases.get("wid"), Some(&true));
        assert!(cmd.find_long("fast").is_some());
        assert!(cmd.find_command("list").is_some());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn broken_entry_point_respects_ignore_invalid() {
        let dir = make_temp_dir("broken-ext");
        fs::write(
            dir.join("cmdkit.json"),
            r#"{ "name": "broken", "cmdkit": { "main": "./missing.json" } }"#,
        )
        .unwrap();

        let err = load(dir.to_str().unwrap(), None, &ExtensionParams::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_EXTENSION");

        let loaded = load(
            dir.to_str().unwrap(),
            None,
            &ExtensionParams {
                ignore_invalid: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(
            loaded.command.kind,
            CommandKind::Extension(ExtensionKind::Invalid { .. })
        ));
        assert_eq!(loaded.warnings.len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unsupported_schema_version_is_invalid() {
        let dir = make_temp_dir("newer-ext");
        fs::write(
            dir.join("cmdkit.json"),
            r#"{ "schemaVersion": 99, "name": "future", "cmdkit": {} }"#,
        )
        .unwrap();

        let err = load(dir.to_str().unwrap(), None, &ExtensionParams::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_PACKAGE_JSON");

        let _ = fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn package_without_metadata_runs_its_bin() {
        use std::os::unix::fs::PermissionsExt;

        let dir = make_temp_dir("bin-ext");
        fs::write(
            dir.join("cmdkit.json"),
            r#"{
                "name": "tool",
                "description": "external tool",
                "bin": { "tool": "./run.sh", "t": "./run.sh" }
            }"#,
        )
        .unwrap();
        let script = dir.join("run.sh");
        fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let loaded = load(dir.to_str().unwrap(), None, &ExtensionParams::default()).unwrap();
        let cmd = &loaded.command;
        assert_eq!(cmd.name, "tool");
        assert_eq!(cmd.desc.as_deref(), Some("external tool"));
        assert_eq!(cmd.aliases.get("t"), Some(&true));
        match &cmd.kind {
            CommandKind::Extension(ExtensionKind::Executable { executable, .. }) => {
                assert!(executable.ends_with("run.sh"));
            }
            other => panic!("expected executable variant, got {other:?}"),
        }

        let _ = fs::remove_dir_all(&dir);
    }
}
