//! Extension package manifests.
//!
//! An extension package describes itself with a `cmdkit.json` at its root.
//! The manifest names the package, optionally points at an entry file, and
//! may carry a `cmdkit` metadata block declaring toolkit compatibility (the
//! entry is then a declarative command schema that gets grafted in-process).

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_MANIFEST_NAME: &str = "cmdkit.json";

/// Newest manifest schema this engine understands.
pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageManifest {
    pub schema_version: Option<u32>,
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Entry file, relative to the manifest directory.
    pub main: Option<PathBuf>,
    pub aliases: Vec<String>,
    /// Executable names mapped to their target paths.
    pub bin: IndexMap<String, String>,
    /// Toolkit-compatibility block; present means the entry point is a
    /// declarative command schema.
    pub cmdkit: Option<ToolkitMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolkitMeta {
    /// Overrides the top-level `main` for the schema entry point.
    pub main: Option<PathBuf>,
    pub banner: Option<String>,
}

impl PackageManifest {
    /// The schema entry point for toolkit-compatible packages.
    pub fn entry(&self) -> Option<&Path> {
        self.cmdkit
            .as_ref()
            .and_then(|meta| meta.main.as_deref())
            .or(self.main.as_deref())
    }

    /// The primary executable target: the `bin` entry matching the package
    /// name, or the sole entry when there is exactly one.
    pub fn primary_bin(&self) -> Option<&str> {
        if let Some(target) = self.bin.get(&self.name) {
            return Some(target.as_str());
        }
        if self.bin.len() == 1 {
            return self.bin.values().next().map(|s| s.as_str());
        }
        None
    }

    /// Aliases declared by the manifest plus every sibling `bin` name that
    /// shares the primary target.
    pub fn all_aliases(&self) -> Vec<String> {
        let mut aliases = self.aliases.clone();
        if let Some(primary) = self.primary_bin() {
            let primary = primary.to_string();
            for (bin_name, target) in &self.bin {
                if *target == primary && *bin_name != self.name && !aliases.contains(bin_name) {
                    aliases.push(bin_name.clone());
                }
            }
        }
        aliases
    }
}

/// Walk ancestors of `start` looking for the nearest manifest file.
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    let mut dir = if start.is_dir() {
        Some(start)
    } else {
        start.parent()
    };
    while let Some(current) = dir {
        let candidate = current.join(DEFAULT_MANIFEST_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

pub fn load_manifest(path: &Path) -> Result<PackageManifest> {
    let contents = fs::read_to_string(path).map_err(|err| Error::InvalidPackageManifest {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let manifest: PackageManifest =
        serde_json::from_str(&contents).map_err(|err| Error::InvalidPackageManifest {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    if manifest.name.trim().is_empty() {
        return Err(Error::InvalidPackageManifest {
            path: path.to_path_buf(),
            reason: "manifest is missing a name".to_string(),
        });
    }
    if let Some(version) = manifest.schema_version {
        if version > SUPPORTED_SCHEMA_VERSION {
            return Err(Error::InvalidPackageManifest {
                path: path.to_path_buf(),
                reason: format!(
                    "schema version {version} is newer than supported {SUPPORTED_SCHEMA_VERSION}"
                ),
            });
        }
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_deserializes_camel_case() {
        let json = r#"{
            "schemaVersion": 1,
            "name": "pkg",
            "description": "demo",
            "main": "./cli.json",
            "aliases": ["pk"],
            "bin": { "pkg": "./bin/run", "p": "./bin/run", "other": "./bin/other" },
            "cmdkit": { "banner": "PKG" }
        }"#;
        let m: PackageManifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.name, "pkg");
        assert_eq!(m.entry(), Some(Path::new("./cli.json")));
        assert_eq!(m.primary_bin(), Some("./bin/run"));
        assert_eq!(m.all_aliases(), vec!["pk".to_string(), "p".to_string()]);
        assert_eq!(
            m.cmdkit.as_ref().and_then(|c| c.banner.as_deref()),
            Some("PKG")
        );
    }

    #[test]
    fn cmdkit_block_main_wins_over_top_level() {
        let json = r#"{
            "name": "pkg",
            "main": "./index.json",
            "cmdkit": { "main": "./tree.json" }
        }"#;
        let m: PackageManifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.entry(), Some(Path::new("./tree.json")));
    }

    #[test]
    fn sole_bin_is_primary_even_without_name_match() {
        let json = r#"{ "name": "pkg", "bin": { "tool": "./bin/tool" } }"#;
        let m: PackageManifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.primary_bin(), Some("./bin/tool"));
        assert_eq!(m.all_aliases(), vec!["tool".to_string()]);
    }
}
