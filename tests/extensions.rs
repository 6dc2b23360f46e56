//! Extension grafting and subprocess execution through the root CLI.

use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use cmdkit::{Cli, CliOptions, Value};

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).to_string()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn make_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before UNIX_EPOCH")
        .as_nanos();
    let pid = std::process::id();
    let dir = std::env::temp_dir().join(format!("cmdkit-integ-{prefix}-{pid}-{nanos}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn tokens(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn cli_with_streams(options: CliOptions) -> (Cli, SharedBuf, SharedBuf) {
    let out = SharedBuf::default();
    let err = SharedBuf::default();
    let cli = Cli::new(CliOptions {
        stdout: Some(Box::new(out.clone())),
        stderr: Some(Box::new(err.clone())),
        ..options
    })
    .expect("failed to build cli");
    (cli, out, err)
}

#[cfg(unix)]
fn write_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    fs::write(&path, body).expect("failed to write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
    path
}

#[cfg(unix)]
#[test]
fn executable_extension_passes_tokens_through() {
    let dir = make_temp_dir("exec-ext");
    let script = write_script(&dir, "myext.sh", "#!/bin/sh\necho \"args:$@\"\nexit 3\n");

    let (mut cli, out, _err) = cli_with_streams(CliOptions {
        version: Some("9.9.9".to_string()),
        ..Default::default()
    });
    cli.extension(script.to_str().unwrap(), Some("myext")).unwrap();

    let exec = cli.exec_tokens(&tokens(&["myext", "x", "y"])).unwrap();
    assert_eq!(
        exec.value,
        Some(Value::Json(serde_json::json!({ "code": 3 })))
    );
    assert_eq!(out.contents(), "args:x y\n");
    assert_eq!(exec.result.args, vec!["x".to_string(), "y".to_string()]);

    let _ = fs::remove_dir_all(&dir);
}

#[cfg(unix)]
#[test]
fn opaque_extension_keeps_version_flag_for_the_child() {
    let dir = make_temp_dir("opaque-v");
    let script = write_script(&dir, "tool.sh", "#!/bin/sh\necho \"got:$@\"\n");

    let (mut cli, out, _err) = cli_with_streams(CliOptions {
        version: Some("1.2.3".to_string()),
        ..Default::default()
    });
    cli.extension(script.to_str().unwrap(), Some("tool")).unwrap();

    let exec = cli.exec_tokens(&tokens(&["tool", "-v", "more"])).unwrap();
    // The child received -v untouched; the root's version never fired.
    assert_eq!(out.contents(), "got:-v more\n");
    assert_eq!(
        exec.value,
        Some(Value::Json(serde_json::json!({ "code": 0 })))
    );

    let _ = fs::remove_dir_all(&dir);
}

#[cfg(unix)]
#[test]
fn nonzero_exit_does_not_error() {
    let dir = make_temp_dir("exit-code");
    let script = write_script(&dir, "fail.sh", "#!/bin/sh\nexit 42\n");

    let (mut cli, _out, _err) = cli_with_streams(CliOptions::default());
    cli.extension(script.to_str().unwrap(), Some("fail")).unwrap();

    let exec = cli.exec_tokens(&tokens(&["fail"])).unwrap();
    assert_eq!(
        exec.value,
        Some(Value::Json(serde_json::json!({ "code": 42 })))
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn tree_extension_parses_like_a_native_subtree() {
    let dir = make_temp_dir("tree-exec");
    fs::write(
        dir.join("cmdkit.json"),
        r#"{
            "name": "widgets",
            "description": "widget tools",
            "cmdkit": { "main": "./cli.json" }
        }"#,
    )
    .unwrap();
    fs::write(
        dir.join("cli.json"),
        r#"{
            "options": { "--fast": "skip checks" },
            "commands": {
                "list": {
                    "desc": "list widgets",
                    "options": { "--long": "detailed output" }
                }
            }
        }"#,
    )
    .unwrap();

    let (mut cli, _out, _err) = cli_with_streams(CliOptions {
        name: Some("tool".to_string()),
        ..Default::default()
    });
    cli.extension(dir.to_str().unwrap(), None).unwrap();

    let exec = cli
        .exec_tokens(&tokens(&["widgets", "list", "--long", "--fast"]))
        .unwrap();
    let names: Vec<_> = exec.result.contexts.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["list", "widgets", "tool"]);
    assert_eq!(exec.result.argv.get("long"), Some(&Value::Bool(true)));
    // The extension's own option is inherited by its subcommands.
    assert_eq!(exec.result.argv.get("fast"), Some(&Value::Bool(true)));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_extension_becomes_a_stub_with_warning() {
    let (mut cli, _out, err) = cli_with_streams(CliOptions {
        ignore_missing_extensions: true,
        ..Default::default()
    });
    cli.extension("/nonexistent/thing", Some("ghost")).unwrap();
    assert_eq!(cli.warnings().len(), 1);
    assert_eq!(cli.warnings()[0].code, "INVALID_EXTENSION");

    let exec = cli.exec_tokens(&tokens(&["ghost"])).unwrap();
    assert_eq!(exec.value, Some(Value::Null));
    assert!(
        err.contents().contains("could not be resolved"),
        "stub diagnostic missing: {}",
        err.contents()
    );
    assert_eq!(exec.result.warnings.len(), 1);
}

#[test]
fn missing_extension_fails_construction_by_default() {
    let mut cli = Cli::new(CliOptions::default()).unwrap();
    let err = cli.extension("/nonexistent/thing", None).unwrap_err();
    assert_eq!(err.code(), "INVALID_EXTENSION");
}

#[test]
fn extension_aliases_from_manifest_descend() {
    let dir = make_temp_dir("alias-ext");
    fs::write(
        dir.join("cmdkit.json"),
        r#"{
            "name": "widgets",
            "aliases": ["wid"],
            "cmdkit": { "main": "./cli.json" }
        }"#,
    )
    .unwrap();
    fs::write(dir.join("cli.json"), r#"{ "options": { "--fast": null } }"#).unwrap();

    let (mut cli, _out, _err) = cli_with_streams(CliOptions::default());
    cli.extension(dir.to_str().unwrap(), None).unwrap();

    let exec = cli.exec_tokens(&tokens(&["wid", "--fast"])).unwrap();
    assert_eq!(
        exec.result.command.map(|c| c.name.as_str()),
        Some("widgets")
    );
    assert_eq!(exec.result.argv.get("fast"), Some(&Value::Bool(true)));

    let _ = fs::remove_dir_all(&dir);
}

#[cfg(unix)]
#[test]
fn external_extension_suppresses_the_banner_by_default() {
    let dir = make_temp_dir("banner-ext");
    let script = write_script(&dir, "noisy.sh", "#!/bin/sh\necho out\n");

    let (mut cli, out, _err) = cli_with_streams(CliOptions {
        banner: Some("BANNER".to_string()),
        ..Default::default()
    });
    cli.extension(script.to_str().unwrap(), Some("noisy")).unwrap();
    cli.exec_tokens(&tokens(&["noisy"])).unwrap();
    assert_eq!(out.contents(), "out\n");

    let (mut cli, out, _err) = cli_with_streams(CliOptions {
        banner: Some("BANNER".to_string()),
        show_banner_for_external_clis: true,
        ..Default::default()
    });
    cli.extension(script.to_str().unwrap(), Some("noisy")).unwrap();
    cli.exec_tokens(&tokens(&["noisy"])).unwrap();
    assert_eq!(out.contents(), "BANNER\n\nout\n");

    let _ = fs::remove_dir_all(&dir);
}
